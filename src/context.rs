use chrono::{NaiveDate, NaiveDateTime};

use crate::error::{AppError, AppResult};
use crate::model::role::Role;

/// Who is acting and when. Built once per request and handed to every engine
/// call so no engine reads the clock or any global.
#[derive(Debug, Clone)]
pub struct Session {
    pub user_id: u64,
    pub role: Role,
    pub now: NaiveDateTime,
}

impl Session {
    pub fn new(user_id: u64, role: Role, now: NaiveDateTime) -> Self {
        Self { user_id, role, now }
    }

    pub fn today(&self) -> NaiveDate {
        self.now.date()
    }

    pub fn require_approver(&self) -> AppResult<()> {
        if self.role.is_approver() {
            Ok(())
        } else {
            Err(AppError::forbidden("HR/Admin only"))
        }
    }

    /// The caller acts on their own record, or is an approver.
    pub fn require_self_or_approver(&self, owner_id: u64) -> AppResult<()> {
        if self.user_id == owner_id || self.role.is_approver() {
            Ok(())
        } else {
            Err(AppError::forbidden("Not your record"))
        }
    }
}
