//! Scratchpad - append-only JSONL conversation log
//!
//! Every entry is one JSON object per line. The file outlives the
//! in-memory session store, so a conversation evicted from memory can
//! still be searched here. Unparseable lines are skipped on read and kept
//! on rewrite.

use std::collections::{BTreeMap, HashSet};
use std::fs::{create_dir_all, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScratchpadError {
    #[error("scratchpad io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("scratchpad serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    UserMessage,
    AgentResponse,
    ToolResult,
    Note,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::UserMessage => "user_message",
            EntryKind::AgentResponse => "agent_response",
            EntryKind::ToolResult => "tool_result",
            EntryKind::Note => "note",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScratchpadEntry {
    pub entry_id: String,
    pub conversation_id: String,
    pub content: String,
    pub entry_type: EntryKind,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub meta: Map<String, Value>,
}

impl ScratchpadEntry {
    pub fn new(
        conversation_id: impl Into<String>,
        entry_type: EntryKind,
        content: impl Into<String>,
    ) -> Self {
        Self {
            entry_id: uuid::Uuid::new_v4().to_string(),
            conversation_id: conversation_id.into(),
            content: content.into(),
            entry_type,
            timestamp: Utc::now(),
            meta: Map::new(),
        }
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: Value) -> Self {
        self.meta.insert(key.into(), value);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScratchpadStats {
    pub total_entries: usize,
    pub unique_conversations: usize,
    pub entry_types: BTreeMap<String, usize>,
}

/// File-backed conversation log. All access goes through one lock.
#[derive(Debug)]
pub struct Scratchpad {
    path: PathBuf,
    lock: Mutex<()>,
}

impl Scratchpad {
    /// Open (creating if needed) the log at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ScratchpadError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                create_dir_all(parent)?;
            }
        }
        OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, entry: &ScratchpadEntry) -> Result<(), ScratchpadError> {
        self.append_batch(std::slice::from_ref(entry))
    }

    /// Append entries in order with a single write.
    pub fn append_batch(&self, entries: &[ScratchpadEntry]) -> Result<(), ScratchpadError> {
        if entries.is_empty() {
            return Ok(());
        }
        let mut buf = String::new();
        for entry in entries {
            buf.push_str(&serde_json::to_string(entry)?);
            buf.push('\n');
        }
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut file = OpenOptions::new().append(true).open(&self.path)?;
        file.write_all(buf.as_bytes())?;
        file.flush()?;
        Ok(())
    }

    /// Entries of one conversation, oldest first, keeping the last `limit`.
    pub fn by_conversation(
        &self,
        conversation_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<ScratchpadEntry>, ScratchpadError> {
        let mut entries: Vec<_> = self
            .read_entries()?
            .into_iter()
            .filter(|e| e.conversation_id == conversation_id)
            .collect();
        entries.sort_by_key(|e| e.timestamp);
        if let Some(limit) = limit {
            let skip = entries.len().saturating_sub(limit);
            entries.drain(..skip);
        }
        Ok(entries)
    }

    /// Newest `limit` entries across all conversations, newest first.
    pub fn recent(&self, limit: usize) -> Result<Vec<ScratchpadEntry>, ScratchpadError> {
        let mut entries = self.read_entries()?;
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        entries.truncate(limit);
        Ok(entries)
    }

    /// Case-insensitive substring search, newest first.
    pub fn search(
        &self,
        query: &str,
        conversation_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<ScratchpadEntry>, ScratchpadError> {
        let needle = query.to_lowercase();
        let mut entries: Vec<_> = self
            .read_entries()?
            .into_iter()
            .filter(|e| conversation_id.map_or(true, |id| e.conversation_id == id))
            .filter(|e| e.content.to_lowercase().contains(&needle))
            .collect();
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        entries.truncate(limit);
        Ok(entries)
    }

    /// Drop every entry of a conversation. Returns how many were removed.
    pub fn clear_conversation(&self, conversation_id: &str) -> Result<usize, ScratchpadError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut kept = String::new();
        let mut removed = 0;
        for line in self.read_lines()? {
            let belongs = serde_json::from_str::<ScratchpadEntry>(&line)
                .map(|e| e.conversation_id == conversation_id)
                .unwrap_or(false);
            if belongs {
                removed += 1;
            } else {
                kept.push_str(&line);
                kept.push('\n');
            }
        }
        if removed > 0 {
            let tmp = self.path.with_extension("jsonl.tmp");
            std::fs::write(&tmp, kept)?;
            std::fs::rename(&tmp, &self.path)?;
        }
        tracing::debug!(conversation_id, removed, "scratchpad conversation cleared");
        Ok(removed)
    }

    pub fn stats(&self) -> Result<ScratchpadStats, ScratchpadError> {
        let entries = self.read_entries()?;
        let mut conversations = HashSet::new();
        let mut entry_types = BTreeMap::new();
        for entry in &entries {
            conversations.insert(entry.conversation_id.as_str());
            *entry_types
                .entry(entry.entry_type.as_str().to_string())
                .or_insert(0) += 1;
        }
        Ok(ScratchpadStats {
            total_entries: entries.len(),
            unique_conversations: conversations.len(),
            entry_types,
        })
    }

    fn read_entries(&self) -> Result<Vec<ScratchpadEntry>, ScratchpadError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut entries = Vec::new();
        for (idx, line) in self.read_lines()?.into_iter().enumerate() {
            match serde_json::from_str(&line) {
                Ok(entry) => entries.push(entry),
                Err(err) => tracing::warn!(
                    path = %self.path.display(),
                    line = idx + 1,
                    error = %err,
                    "skipping unparseable scratchpad line"
                ),
            }
        }
        Ok(entries)
    }

    /// Non-blank lines. Callers hold the lock.
    fn read_lines(&self) -> Result<Vec<String>, ScratchpadError> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        let mut lines = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line?;
            if !line.trim().is_empty() {
                lines.push(line);
            }
        }
        Ok(lines)
    }
}
