use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum WorkType {
    Office,
    Home,
    OffSite,
    Leave,
}

/// Persisted status of an attendance day.
#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AttendanceStatus {
    Working,
    Completed,
    Leave,
}

/// What the employee sees for the current day; derived, never stored.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DayStatus {
    None,
    Working,
    Outdated,
    Completed,
    Leave,
    ActionRequired,
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Coordinates {
    #[schema(example = 23.7806)]
    pub lat: f64,
    #[schema(example = 90.4193)]
    pub lng: f64,
}

/// One record per (user, shift date). The shift date is the day the session
/// started, so an overnight session keeps a single record.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct AttendanceDay {
    pub id: u64,
    pub user_id: u64,
    #[schema(example = "2026-01-05", value_type = String, format = "date")]
    pub shift_date: NaiveDate,
    pub check_in: Option<NaiveDateTime>,
    pub check_out: Option<NaiveDateTime>,
    pub work_type: WorkType,
    pub status: AttendanceStatus,
    pub is_late: bool,
    pub proof_url: Option<String>,
    pub coordinates: Option<Coordinates>,
    pub location_name: Option<String>,
    pub location_verified: bool,
    pub early_leave_reason: Option<String>,
    pub is_corrected: bool,
}

impl AttendanceDay {
    /// Checked in without a checkout yet.
    pub fn is_open(&self) -> bool {
        self.check_in.is_some() && self.check_out.is_none()
    }
}

/// Insert payload for a live check-in.
#[derive(Debug, Clone)]
pub struct NewCheckIn {
    pub user_id: u64,
    pub shift_date: NaiveDate,
    pub check_in: NaiveDateTime,
    pub work_type: WorkType,
    pub is_late: bool,
    pub proof_url: Option<String>,
    pub coordinates: Option<Coordinates>,
    pub location_name: Option<String>,
    pub location_verified: bool,
    pub is_corrected: bool,
    /// Merge onto an existing leave record for the same day (approved
    /// work-from-home) instead of failing on the duplicate key.
    pub replaces_leave: bool,
}
