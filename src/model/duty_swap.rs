use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SwapStatus {
    Pending,
    Approved,
    Rejected,
}

/// Proposal to exchange the requestor's duty with another member's duty.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct DutySwap {
    pub id: u64,
    pub requestor_id: u64,
    pub own_duty_id: u64,
    pub target_duty_id: u64,
    pub target_user_id: u64,
    pub status: SwapStatus,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone)]
pub struct NewDutySwap {
    pub requestor_id: u64,
    pub own_duty_id: u64,
    pub target_duty_id: u64,
    pub target_user_id: u64,
    pub created_at: NaiveDateTime,
}

/// A duty and the assignee it is expected to have at swap time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssigneeClaim {
    pub duty_id: u64,
    pub expected_assignee: u64,
}
