//! Chat history: question/answer records per user.
//!
//! The engine reads the most recent records when a session starts and writes
//! exactly one record when a session completes. Two stores ship with the
//! crate: [`MemoryHistoryStore`] and the sqlite-backed [`SqliteHistoryStore`].

mod sqlite;

pub use sqlite::SqliteHistoryStore;


use std::collections::{HashMap, VecDeque};

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::types::ChatMessage;

/// One completed exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AqRecord {
    pub question: String,
    pub answer: String,
    /// Serialized JSON array of the tool-call and tool-result messages of the exchange.
    pub tool_messages: String,
    pub token: u64,
    /// Unix seconds.
    pub create_time: i64,
}

impl AqRecord {
    pub fn new(question: &str, answer: &str, tool_messages: &[ChatMessage], token: u64) -> Self {
        let tool_messages = if tool_messages.is_empty() {
            String::new()
        } else {
            serde_json::to_string(tool_messages).unwrap_or_default()
        };
        Self {
            question: question.to_string(),
            answer: answer.to_string(),
            tool_messages,
            token,
            create_time: chrono::Utc::now().timestamp(),
        }
    }

    /// Re-materialize the stored tool messages.
    pub fn tool_messages(&self) -> serde_json::Result<Vec<ChatMessage>> {
        if self.tool_messages.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&self.tool_messages)
    }

    pub fn is_expired(&self, now: i64, expire_secs: u64) -> bool {
        self.create_time <= now - expire_secs as i64
    }
}

/// History store contract.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Up to `limit` most recent records, oldest first.
    async fn get_recent(&self, user_id: &str, limit: usize) -> Result<Vec<AqRecord>>;

    async fn insert(&self, user_id: &str, record: AqRecord) -> Result<()>;
}

/// In-process store keeping the last `capacity` records per user.
pub struct MemoryHistoryStore {
    capacity: usize,
    records: Mutex<HashMap<String, VecDeque<AqRecord>>>,
}

impl MemoryHistoryStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            records: Mutex::new(HashMap::new()),
        }
    }

    pub async fn len(&self, user_id: &str) -> usize {
        self.records
            .lock()
            .await
            .get(user_id)
            .map_or(0, VecDeque::len)
    }
}

impl Default for MemoryHistoryStore {
    fn default() -> Self {
        Self::new(10)
    }
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn get_recent(&self, user_id: &str, limit: usize) -> Result<Vec<AqRecord>> {
        let records = self.records.lock().await;
        let Some(list) = records.get(user_id) else {
            return Ok(Vec::new());
        };
        let skip = list.len().saturating_sub(limit);
        Ok(list.iter().skip(skip).cloned().collect())
    }

    async fn insert(&self, user_id: &str, record: AqRecord) -> Result<()> {
        let mut records = self.records.lock().await;
        let list = records.entry(user_id.to_string()).or_default();
        list.push_back(record);
        while list.len() > self.capacity {
            list.pop_front();
        }
        Ok(())
    }
}
