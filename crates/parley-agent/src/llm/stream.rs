//! Line-buffered reader over a streamed response body.

use std::sync::Arc;

use futures_util::stream::BoxStream;
use futures_util::StreamExt;

use super::{LineEvent, Provider, StreamDelta};
use crate::error::{EngineError, Result};

/// Pull reader turning raw body bytes into vendor-agnostic deltas.
///
/// Bytes are buffered until a full line is available, so a multi-byte
/// character split across network chunks is decoded intact.
pub struct DeltaStream {
    bytes: BoxStream<'static, Result<Vec<u8>>>,
    provider: Arc<dyn Provider>,
    buffer: Vec<u8>,
    eof: bool,
    finished: bool,
}

impl DeltaStream {
    pub fn new(bytes: BoxStream<'static, Result<Vec<u8>>>, provider: Arc<dyn Provider>) -> Self {
        Self {
            bytes,
            provider,
            buffer: Vec::new(),
            eof: false,
            finished: false,
        }
    }

    /// Stream over an in-memory body, split into the given chunks.
    pub fn from_chunks(chunks: Vec<Vec<u8>>, provider: Arc<dyn Provider>) -> Self {
        let bytes = futures_util::stream::iter(chunks.into_iter().map(Ok)).boxed();
        Self::new(bytes, provider)
    }

    /// Next decoded delta; `None` once the vendor's end marker or EOF is reached.
    pub async fn next_delta(&mut self) -> Option<Result<StreamDelta>> {
        loop {
            if self.finished {
                return None;
            }

            if let Some(line) = self.take_line() {
                let line = String::from_utf8_lossy(&line);
                match self.provider.decode_line(line.trim()) {
                    LineEvent::Delta(delta) => return Some(Ok(delta)),
                    LineEvent::Skip => continue,
                    LineEvent::Done => {
                        self.finished = true;
                        return None;
                    }
                    LineEvent::Failed(msg) => {
                        self.finished = true;
                        return Some(Err(EngineError::UpstreamStream(msg)));
                    }
                }
            }

            if self.eof {
                self.finished = true;
                return None;
            }

            match self.bytes.next().await {
                Some(Ok(chunk)) => self.buffer.extend_from_slice(&chunk),
                Some(Err(e)) => {
                    self.finished = true;
                    return Some(Err(e));
                }
                None => {
                    self.eof = true;
                    if !self.buffer.is_empty() {
                        self.buffer.push(b'\n');
                    }
                }
            }
        }
    }

    fn take_line(&mut self) -> Option<Vec<u8>> {
        let pos = self.buffer.iter().position(|b| *b == b'\n')?;
        let mut line: Vec<u8> = self.buffer.drain(..=pos).collect();
        line.pop();
        Some(line)
    }
}
