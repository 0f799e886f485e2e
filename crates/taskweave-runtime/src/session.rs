//! Session - per-conversation working memory
//!
//! Each conversation owns one blackboard and a rolling history window.
//! Sessions sit behind their own `tokio::sync::Mutex`, so two goals on the
//! same conversation run one after the other while different conversations
//! never share a blackboard.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::Mutex;

use taskweave_config::SessionConfig;
use taskweave_core::planner::HistoryItem;
use taskweave_core::types::{ExecutionPlan, PlanId, Status};
use taskweave_core::Blackboard;

/// Working memory of one conversation
#[derive(Debug, Clone)]
pub struct Session {
    pub conversation_id: String,
    pub blackboard: Blackboard,
    history: VecDeque<HistoryItem>,
    history_window: usize,
    pub last_plan: Option<ExecutionPlan>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new(conversation_id: impl Into<String>, history_window: usize) -> Self {
        let now = Utc::now();
        Self {
            conversation_id: conversation_id.into(),
            blackboard: Blackboard::new(),
            history: VecDeque::new(),
            history_window: history_window.max(1),
            last_plan: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Append a history entry, dropping the oldest beyond the window.
    pub fn push_history(&mut self, item: HistoryItem) {
        self.history.push_back(item);
        while self.history.len() > self.history_window {
            self.history.pop_front();
        }
        self.touch();
    }

    pub fn history(&self) -> impl Iterator<Item = &HistoryItem> {
        self.history.iter()
    }

    /// Last `n` entries, oldest first
    pub fn recent_history(&self, n: usize) -> Vec<HistoryItem> {
        let skip = self.history.len().saturating_sub(n);
        self.history.iter().skip(skip).cloned().collect()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.blackboard.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.blackboard.set(key, value);
        self.touch();
    }

    pub fn update(&mut self, entries: Map<String, Value>) {
        self.blackboard.update(entries);
        self.touch();
    }

    pub fn clear_blackboard(&mut self) {
        self.blackboard.clear();
        self.touch();
    }

    /// Forget everything: blackboard, history and last plan.
    pub fn clear(&mut self) {
        self.blackboard.clear();
        self.history.clear();
        self.last_plan = None;
        self.touch();
    }

    pub fn summary(&self) -> SessionSummary {
        let mut blackboard_keys: Vec<String> =
            self.blackboard.keys().map(str::to_string).collect();
        blackboard_keys.sort();
        SessionSummary {
            conversation_id: self.conversation_id.clone(),
            blackboard_keys,
            history_len: self.history.len(),
            last_plan_id: self.last_plan.as_ref().map(|p| p.plan_id.clone()),
            last_plan_status: self.last_plan.as_ref().map(|p| p.status),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Serializable overview of a session
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub conversation_id: String,
    pub blackboard_keys: Vec<String>,
    pub history_len: usize,
    pub last_plan_id: Option<PlanId>,
    pub last_plan_status: Option<Status>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

struct SessionSlot {
    session: Arc<Mutex<Session>>,
    last_used: u64,
}

#[derive(Default)]
struct SlotTable {
    slots: HashMap<String, SessionSlot>,
    clock: u64,
}

impl SlotTable {
    /// Oldest slot nobody outside the table holds. A session still
    /// referenced elsewhere may be mid-goal and must keep its identity.
    fn least_recently_used_idle(&self) -> Option<String> {
        self.slots
            .iter()
            .filter(|(_, slot)| {
                Arc::strong_count(&slot.session) == 1 && slot.session.try_lock().is_ok()
            })
            .min_by_key(|(_, slot)| slot.last_used)
            .map(|(id, _)| id.clone())
    }
}

/// Bounded map of conversation id -> session.
///
/// When full, the least recently used idle session is evicted. Sessions in
/// use are never evicted; if all are busy the store grows past its bound
/// until some are released.
pub struct SessionStore {
    table: Mutex<SlotTable>,
    history_window: usize,
    max_sessions: usize,
}

impl SessionStore {
    pub fn new(history_window: usize, max_sessions: usize) -> Self {
        Self {
            table: Mutex::new(SlotTable::default()),
            history_window: history_window.max(1),
            max_sessions: max_sessions.max(1),
        }
    }

    pub fn from_config(config: &SessionConfig) -> Self {
        Self::new(config.history_window, config.max_sessions)
    }

    /// Get or create the session for `conversation_id`.
    pub async fn session(&self, conversation_id: &str) -> Arc<Mutex<Session>> {
        let mut table = self.table.lock().await;
        table.clock += 1;
        let now = table.clock;

        if let Some(slot) = table.slots.get_mut(conversation_id) {
            slot.last_used = now;
            return slot.session.clone();
        }

        while table.slots.len() >= self.max_sessions {
            let Some(id) = table.least_recently_used_idle() else {
                tracing::debug!(
                    sessions = table.slots.len(),
                    max_sessions = self.max_sessions,
                    "every session is in use, growing past capacity"
                );
                break;
            };
            table.slots.remove(&id);
            tracing::debug!(conversation_id = %id, "evicted least recently used session");
        }

        let session = Arc::new(Mutex::new(Session::new(
            conversation_id,
            self.history_window,
        )));
        table.slots.insert(
            conversation_id.to_string(),
            SessionSlot {
                session: session.clone(),
                last_used: now,
            },
        );
        tracing::debug!(conversation_id, "created session");
        session
    }

    /// Existing session without creating one
    pub async fn get(&self, conversation_id: &str) -> Option<Arc<Mutex<Session>>> {
        let table = self.table.lock().await;
        table
            .slots
            .get(conversation_id)
            .map(|slot| slot.session.clone())
    }

    pub async fn get_value(&self, conversation_id: &str, key: &str) -> Option<Value> {
        let session = self.get(conversation_id).await?;
        let session = session.lock().await;
        session.get(key).cloned()
    }

    pub async fn set_value(&self, conversation_id: &str, key: impl Into<String>, value: Value) {
        let session = self.session(conversation_id).await;
        session.lock().await.set(key, value);
    }

    pub async fn update_values(&self, conversation_id: &str, entries: Map<String, Value>) {
        let session = self.session(conversation_id).await;
        session.lock().await.update(entries);
    }

    pub async fn clear_blackboard(&self, conversation_id: &str) -> bool {
        match self.get(conversation_id).await {
            Some(session) => {
                session.lock().await.clear_blackboard();
                true
            }
            None => false,
        }
    }

    /// Drop the session entirely. Returns whether it existed.
    pub async fn clear_session(&self, conversation_id: &str) -> bool {
        self.table
            .lock()
            .await
            .slots
            .remove(conversation_id)
            .is_some()
    }

    pub async fn summary(&self, conversation_id: &str) -> Option<SessionSummary> {
        let session = self.get(conversation_id).await?;
        let summary = session.lock().await.summary();
        Some(summary)
    }

    pub async fn len(&self) -> usize {
        self.table.lock().await.slots.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub fn history_window(&self) -> usize {
        self.history_window
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::from_config(&SessionConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_history_window_drops_oldest() {
        let mut session = Session::new("c1", 3);
        for i in 0..5 {
            session.push_history(HistoryItem::user(format!("goal {}", i)));
        }
        let contents: Vec<_> = session.history().map(|h| h.content.as_str()).collect();
        assert_eq!(contents, vec!["goal 2", "goal 3", "goal 4"]);
        assert_eq!(session.recent_history(2).len(), 2);
        assert_eq!(session.recent_history(2)[0].content, "goal 3");
        assert_eq!(session.recent_history(10).len(), 3);
    }

    #[test]
    fn test_clear_resets_everything() {
        let mut session = Session::new("c1", 10);
        session.set("sheet_url", json!("https://sheets/1"));
        session.push_history(HistoryItem::user("hello"));
        session.last_plan = Some(ExecutionPlan::new("hello", vec![]));

        session.clear();
        assert!(session.blackboard.is_empty());
        assert_eq!(session.history().count(), 0);
        assert!(session.last_plan.is_none());
    }

    #[test]
    fn test_conversations_do_not_share_blackboards() {
        tokio_test::block_on(async {
            let store = SessionStore::new(10, 10);
            store.set_value("a", "share_link", json!("https://a")).await;
            store.set_value("b", "share_link", json!("https://b")).await;

            assert_eq!(
                store.get_value("a", "share_link").await,
                Some(json!("https://a"))
            );
            assert_eq!(
                store.get_value("b", "share_link").await,
                Some(json!("https://b"))
            );
            assert_eq!(store.get_value("c", "share_link").await, None);
            assert_eq!(store.len().await, 2);
        });
    }

    #[test]
    fn test_same_conversation_returns_same_session() {
        tokio_test::block_on(async {
            let store = SessionStore::default();
            let first = store.session("c1").await;
            let second = store.session("c1").await;
            assert!(Arc::ptr_eq(&first, &second));
        });
    }

    #[test]
    fn test_evicts_least_recently_used() {
        tokio_test::block_on(async {
            let store = SessionStore::new(10, 2);
            store.session("a").await;
            store.session("b").await;
            // touch a so b becomes the oldest
            store.session("a").await;
            store.session("c").await;

            assert_eq!(store.len().await, 2);
            assert!(store.get("a").await.is_some());
            assert!(store.get("b").await.is_none());
            assert!(store.get("c").await.is_some());
        });
    }

    #[test]
    fn test_busy_session_is_never_evicted() {
        tokio_test::block_on(async {
            let store = SessionStore::new(10, 1);
            let running = store.session("a").await;
            let mut guard = running.lock().await;

            // "a" is mid-goal, so "b" must not push it out
            store.session("b").await;
            assert_eq!(store.len().await, 2);

            let again = store.session("a").await;
            assert!(Arc::ptr_eq(&running, &again));
            assert!(again.try_lock().is_err());

            guard.set("share_link", json!("https://share/a"));
            drop(guard);
            drop(running);
            drop(again);
            assert_eq!(
                store.get_value("a", "share_link").await,
                Some(json!("https://share/a"))
            );

            // once idle, the store shrinks back to its bound
            store.session("c").await;
            assert_eq!(store.len().await, 1);
            assert!(store.get("c").await.is_some());
        });
    }

    #[test]
    fn test_summary_and_clear_operations() {
        tokio_test::block_on(async {
            let store = SessionStore::default();
            let mut entries = Map::new();
            entries.insert("spreadsheet_id".to_string(), json!("sheet-1"));
            entries.insert("data_rows".to_string(), json!([["a", "b"]]));
            store.update_values("c1", entries).await;

            let summary = store.summary("c1").await.expect("summary");
            assert_eq!(summary.blackboard_keys, vec!["data_rows", "spreadsheet_id"]);
            assert_eq!(summary.history_len, 0);
            assert!(summary.last_plan_id.is_none());

            assert!(store.clear_blackboard("c1").await);
            assert_eq!(store.get_value("c1", "spreadsheet_id").await, None);
            assert!(!store.clear_blackboard("missing").await);

            assert!(store.clear_session("c1").await);
            assert!(store.summary("c1").await.is_none());
            assert!(store.is_empty().await);
        });
    }
}
