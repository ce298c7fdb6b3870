//! Persistence seam for the engines.
//!
//! Every cross-row invariant (one record per user and day, one open session
//! per user, one active request per user/type/start, atomic duty swaps) is
//! enforced inside a single call here, so two concurrent handlers cannot both
//! pass a read-then-write check.

#[cfg(test)]
pub mod memory;
pub mod mysql;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};

use crate::error::AppResult;
use crate::model::attendance::{AttendanceDay, NewCheckIn};
use crate::model::duty::{Duty, NewDuty};
use crate::model::duty_swap::{AssigneeClaim, DutySwap, NewDutySwap};
use crate::model::leave_request::{LeaveQuery, LeaveRequest, LeaveStatus, NewLeaveRequest};
use crate::model::location_zone::LocationZone;

/// Result of the conditional insert of a leave request.
#[derive(Debug, Clone)]
pub enum LeaveInsert {
    Inserted(LeaveRequest),
    /// An active request with the same key exists; carries its status.
    Duplicate(LeaveStatus),
}

/// Attendance mutation applied together with a request approval.
#[derive(Debug, Clone, PartialEq)]
pub enum ApprovalEffect {
    /// Record-keeping only.
    None,
    /// Upsert each date as a leave day without times.
    LeaveDays { dates: Vec<NaiveDate> },
    /// Upsert the check-in of the given shift date.
    CheckIn {
        shift_date: NaiveDate,
        check_in: NaiveDateTime,
        is_late: bool,
    },
    /// Close the session of the given shift date retroactively.
    CheckOut {
        shift_date: NaiveDate,
        check_out: NaiveDateTime,
    },
}

#[async_trait]
pub trait Store: Send + Sync {
    // ---------- attendance ----------

    async fn attendance_on(&self, user_id: u64, date: NaiveDate)
    -> AppResult<Option<AttendanceDay>>;

    /// The user's session with a check-in and no checkout, if any.
    async fn open_attendance(&self, user_id: u64) -> AppResult<Option<AttendanceDay>>;

    async fn attendance_between(
        &self,
        user_id: u64,
        from: NaiveDate,
        to: NaiveDate,
    ) -> AppResult<Vec<AttendanceDay>>;

    async fn attendance(&self, id: u64) -> AppResult<Option<AttendanceDay>>;

    /// Creates the day record. Conflicts when the user already has an open
    /// session or a record for that shift date, unless `replaces_leave` is
    /// set and the existing record is a leave day.
    async fn insert_check_in(&self, check_in: &NewCheckIn) -> AppResult<AttendanceDay>;

    /// Closes an open session; conflicts if it was closed meanwhile.
    async fn record_check_out(
        &self,
        id: u64,
        check_out: NaiveDateTime,
        early_leave_reason: Option<&str>,
    ) -> AppResult<AttendanceDay>;

    /// Admin correction of the checkout time, open or not.
    async fn override_check_out(&self, id: u64, check_out: NaiveDateTime)
    -> AppResult<AttendanceDay>;

    /// Bulk retention cleanup; returns removed rows.
    async fn purge_attendance_before(&self, horizon: NaiveDate) -> AppResult<u64>;

    // ---------- leave requests ----------

    async fn insert_leave_request(&self, request: &NewLeaveRequest) -> AppResult<LeaveInsert>;

    async fn leave_request(&self, id: u64) -> AppResult<Option<LeaveRequest>>;

    async fn leave_requests(&self, query: &LeaveQuery) -> AppResult<Vec<LeaveRequest>>;

    /// Applies the effect and flips the request from pending to approved in
    /// one unit. Conflicts if the request is no longer pending or the effect
    /// would break an attendance invariant.
    async fn approve_leave_request(
        &self,
        id: u64,
        approver_id: u64,
        effect: &ApprovalEffect,
    ) -> AppResult<LeaveRequest>;

    async fn reject_leave_request(
        &self,
        id: u64,
        approver_id: u64,
        reason: &str,
    ) -> AppResult<LeaveRequest>;

    // ---------- duties ----------

    /// Inserts duties, skipping any (assignee, date, title) that exists.
    async fn insert_duties(&self, duties: &[NewDuty]) -> AppResult<Vec<Duty>>;

    async fn duty(&self, id: u64) -> AppResult<Option<Duty>>;

    async fn duties_for(&self, user_id: u64) -> AppResult<Vec<Duty>>;

    async fn duties_between(&self, from: NaiveDate, to: NaiveDate) -> AppResult<Vec<Duty>>;

    /// Writes the mutable state columns of the duty.
    async fn update_duty(&self, duty: &Duty) -> AppResult<()>;

    // ---------- swaps ----------

    async fn insert_swap(&self, swap: &NewDutySwap) -> AppResult<DutySwap>;

    async fn swap(&self, id: u64) -> AppResult<Option<DutySwap>>;

    /// Swaps the user proposed or was asked to accept.
    async fn swaps_for(&self, user_id: u64) -> AppResult<Vec<DutySwap>>;

    async fn reject_swap(&self, id: u64) -> AppResult<DutySwap>;

    /// Exchanges the two assignees and approves the swap in one unit; every
    /// claim must still hold or nothing changes.
    async fn approve_swap(
        &self,
        id: u64,
        own: AssigneeClaim,
        target: AssigneeClaim,
    ) -> AppResult<DutySwap>;

    // ---------- zones ----------

    async fn location_zones(&self) -> AppResult<Vec<LocationZone>>;
}
