use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

/// Disciplinary state of a duty. Escalates through the negligence protocol.
#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PenaltyStatus {
    None,
    AwaitingTribunal,
    LateCompleted,
    AcceptedFault,
    Abandoned,
    Excused,
    UnderReview,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Duty {
    pub id: u64,
    pub title: String,
    pub assignee_id: u64,
    #[schema(example = "2026-01-05", value_type = String, format = "date")]
    pub date: NaiveDate,
    pub is_done: bool,
    pub proof_url: Option<String>,
    pub penalty_status: PenaltyStatus,
    pub is_penalized: bool,
    pub appeal_reason: Option<String>,
    pub appeal_proof_url: Option<String>,
    pub abandoned_at: Option<NaiveDateTime>,
    pub cleared_by_system: bool,
    /// Set once completion has been scored; later toggles never score again.
    #[serde(skip)]
    pub completion_scored: bool,
}

impl Duty {
    /// An abandoned duty blocks the assignee's dashboard until acknowledged.
    pub fn blocks_dashboard(&self) -> bool {
        self.penalty_status == PenaltyStatus::Abandoned && !self.cleared_by_system
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewDuty {
    #[schema(example = "Kitchen cleanup")]
    pub title: String,
    #[schema(example = 7)]
    pub assignee_id: u64,
    #[schema(example = "2026-01-05", value_type = String, format = "date")]
    pub date: NaiveDate,
}
