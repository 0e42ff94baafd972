//! Chunked message emitter.
//!
//! Turns the growing answer into bounded chunks on the outbound channel. The
//! send threshold starts small so the first words show up quickly, then grows
//! by a fixed step after every flush. A platform message never exceeds the
//! hard UTF-16 cap; when the next delta would cross it the current message is
//! closed and a new one starts with the steady-state threshold.

use parley_core::config::EngineConfig;
use tokio::sync::mpsc;

use crate::error::{EngineError, Result};
use crate::types::{split_utf16, utf16_len, MsgChunk};

pub struct ChunkEmitter {
    tx: mpsc::Sender<MsgChunk>,
    /// Text of the platform message currently being built.
    message: String,
    message_chars: usize,
    message_units: usize,
    /// Byte offset into `message` up to which text has been sent.
    sent: usize,
    send_len: usize,
    send_len_step: usize,
    per_msg_len: usize,
    powered_by: Option<String>,
    /// Whole-answer accumulator.
    answer: String,
}

impl ChunkEmitter {
    pub fn new(tx: mpsc::Sender<MsgChunk>, engine: &EngineConfig) -> Self {
        Self {
            tx,
            message: String::new(),
            message_chars: 0,
            message_units: 0,
            sent: 0,
            send_len: engine.first_send_len,
            send_len_step: engine.send_len_step.max(1),
            per_msg_len: engine.per_msg_len.max(2),
            powered_by: engine.powered_by.clone().filter(|p| !p.trim().is_empty()),
            answer: String::new(),
        }
    }

    /// Everything pushed so far.
    pub fn answer(&self) -> &str {
        &self.answer
    }

    /// Current send threshold in characters.
    pub fn send_len(&self) -> usize {
        self.send_len
    }

    /// Append one content delta, emitting a chunk when a threshold is crossed.
    pub async fn push(&mut self, text: &str) -> Result<()> {
        if text.is_empty() {
            return Ok(());
        }
        for piece in split_utf16(text, self.per_msg_len) {
            self.push_piece(piece).await?;
        }
        Ok(())
    }

    async fn push_piece(&mut self, piece: &str) -> Result<()> {
        let units = utf16_len(piece);
        if !self.message.is_empty() && self.message_units + units > self.per_msg_len {
            self.close_message().await?;
            self.send_len = self.send_len_step;
        }

        self.message.push_str(piece);
        self.message_chars += piece.chars().count();
        self.message_units += units;
        self.answer.push_str(piece);

        if self.message_chars > self.send_len {
            let hint = self.send_len;
            self.send_pending(hint, false).await?;
            self.send_len += self.send_len_step;
        }
        Ok(())
    }

    /// Send the unsent tail of the current message and start a new one.
    async fn close_message(&mut self) -> Result<()> {
        let hint = self.send_len;
        self.send_pending(hint, true).await?;
        self.message.clear();
        self.message_chars = 0;
        self.message_units = 0;
        self.sent = 0;
        Ok(())
    }

    async fn send_pending(&mut self, hint: usize, finished: bool) -> Result<()> {
        let pending = self.message[self.sent..].to_string();
        self.sent = self.message.len();
        self.send(MsgChunk::answer(pending, hint, finished)).await
    }

    /// Final flush: the rest of the answer, then the powered-by footer.
    pub async fn finish(&mut self) -> Result<()> {
        if !self.message.is_empty() {
            self.close_message().await?;
        }
        if let Some(footer) = self.powered_by.clone() {
            self.notice(&footer).await?;
        }
        Ok(())
    }

    /// Send a complete text at once, split at the hard cap.
    pub async fn direct_send(&mut self, text: &str) -> Result<()> {
        if !self.message.is_empty() {
            self.close_message().await?;
        }
        let hint = self.send_len;
        for piece in split_utf16(text, self.per_msg_len) {
            self.answer.push_str(piece);
            self.send(MsgChunk::answer(piece.to_string(), hint, true)).await?;
        }
        Ok(())
    }

    /// Standalone side message (tool notices, footer). Not part of the answer.
    pub async fn notice(&mut self, text: &str) -> Result<()> {
        self.send(MsgChunk::notice(text.to_string())).await
    }

    /// Render a fatal error for the user.
    pub async fn error(&mut self, text: &str) -> Result<()> {
        self.send(MsgChunk::error(text.to_string())).await
    }

    async fn send(&self, chunk: MsgChunk) -> Result<()> {
        self.tx
            .send(chunk)
            .await
            .map_err(|_| EngineError::OutboundClosed)
    }
}
