//! Change notifications for clients that keep cached views.
//!
//! Handlers publish after a mutation succeeded. Nothing in the engines reads
//! the feed, so a missed event only delays a client refresh.

use serde::Serialize;
use strum_macros::{AsRefStr, Display};
use tokio::sync::broadcast;
use utoipa::ToSchema;

const CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Display, AsRefStr, ToSchema)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Table {
    AttendanceLogs,
    LeaveRequests,
    Duties,
    DutySwaps,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ChangeEvent {
    pub table: Table,
    /// Owner of the changed row; `None` for team-wide changes.
    pub user_id: Option<u64>,
}

#[derive(Clone)]
pub struct ChangeFeed {
    sender: broadcast::Sender<ChangeEvent>,
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeFeed {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn publish(&self, table: Table, user_id: Option<u64>) {
        // no subscribers is fine
        let _ = self.sender.send(ChangeEvent { table, user_id });
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.sender.subscribe()
    }
}
