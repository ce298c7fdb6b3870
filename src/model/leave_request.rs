use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug,
    Copy,
    Clone,
    Eq,
    PartialEq,
    Hash,
    Ord,
    PartialOrd,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    EnumIter,
    ToSchema,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LeaveType {
    Sick,
    Vacation,
    Personal,
    Emergency,
    LateEntry,
    Overtime,
    ForgotCheckIn,
    ForgotCheckOut,
    WorkFromHome,
}

impl LeaveType {
    /// Incident types are counted per request and always span a single day.
    pub fn is_incident(self) -> bool {
        matches!(
            self,
            LeaveType::LateEntry
                | LeaveType::Overtime
                | LeaveType::ForgotCheckIn
                | LeaveType::ForgotCheckOut
        )
    }

    /// Corrections rewrite attendance history and carry a time of day.
    pub fn is_correction(self) -> bool {
        matches!(
            self,
            LeaveType::LateEntry | LeaveType::ForgotCheckIn | LeaveType::ForgotCheckOut
        )
    }
}

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LeaveStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct LeaveRequest {
    pub id: u64,
    pub user_id: u64,
    pub leave_type: LeaveType,
    #[schema(example = "2026-01-05", value_type = String, format = "date")]
    pub start_date: NaiveDate,
    #[schema(example = "2026-01-05", value_type = String, format = "date")]
    pub end_date: NaiveDate,
    pub reason: String,
    /// Corrected time of day for correction requests.
    #[schema(example = "09:15:00", value_type = Option<String>)]
    pub incident_time: Option<NaiveTime>,
    pub overtime_hours: Option<f64>,
    pub attachment_url: Option<String>,
    pub status: LeaveStatus,
    pub approver_id: Option<u64>,
    pub rejection_reason: Option<String>,
    pub created_at: NaiveDateTime,
}

impl LeaveRequest {
    /// Inclusive number of calendar days covered.
    pub fn day_count(&self) -> u32 {
        ((self.end_date - self.start_date).num_days() + 1).max(0) as u32
    }
}

#[derive(Debug, Clone)]
pub struct NewLeaveRequest {
    pub user_id: u64,
    pub leave_type: LeaveType,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub reason: String,
    pub incident_time: Option<NaiveTime>,
    pub overtime_hours: Option<f64>,
    pub attachment_url: Option<String>,
    pub created_at: NaiveDateTime,
}

/// Filter for listing requests.
#[derive(Debug, Clone, Default)]
pub struct LeaveQuery {
    pub user_id: Option<u64>,
    pub leave_type: Option<LeaveType>,
    pub status: Option<LeaveStatus>,
    pub start_date: Option<NaiveDate>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl LeaveQuery {
    pub fn matches(&self, request: &LeaveRequest) -> bool {
        self.user_id.is_none_or(|u| request.user_id == u)
            && self.leave_type.is_none_or(|t| request.leave_type == t)
            && self.status.is_none_or(|s| request.status == s)
            && self.start_date.is_none_or(|d| request.start_date == d)
            && self.from.is_none_or(|d| request.end_date >= d)
            && self.to.is_none_or(|d| request.start_date <= d)
    }
}
