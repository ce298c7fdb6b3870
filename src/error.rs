use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use chrono::NaiveDate;
use derive_more::Display;
use serde_json::json;

use crate::model::leave_request::LeaveStatus;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Display)]
pub enum AppError {
    #[display(fmt = "{}", _0)]
    Validation(String),

    #[display(fmt = "{}", _0)]
    Forbidden(String),

    #[display(fmt = "{} not found", _0)]
    NotFound(&'static str),

    #[display(fmt = "{}", _0)]
    Conflict(String),

    #[display(fmt = "A {} request for this date already exists", _0)]
    DuplicateRequest(LeaveStatus),

    #[display(fmt = "Already checked in for {}", _0)]
    AlreadyCheckedIn(NaiveDate),

    #[display(fmt = "No open attendance session")]
    NoOpenSession,

    #[display(
        fmt = "Session started on {} is still open and must be recovered first",
        shift_date
    )]
    StaleSession { shift_date: NaiveDate, outdated: bool },

    #[display(fmt = "{} is recorded as a leave day", _0)]
    OnLeave(NaiveDate),

    #[display(fmt = "Outside every office zone ({:.0} m from nearest)", distance_m)]
    OutsideGeofence {
        nearest: Option<String>,
        distance_m: f64,
    },

    #[display(fmt = "Leaving {} minutes early requires a reason", missing_minutes)]
    EarlyLeaveReasonRequired { missing_minutes: i64 },

    #[display(fmt = "{}", _0)]
    Dependency(String),

    #[display(fmt = "Database error")]
    Database(sqlx::Error),
}

impl std::error::Error for AppError {}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        AppError::Conflict(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        AppError::Forbidden(message.into())
    }

    /// Stable machine-readable code returned next to the message.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation",
            AppError::Forbidden(_) => "forbidden",
            AppError::NotFound(_) => "not_found",
            AppError::Conflict(_) => "conflict",
            AppError::DuplicateRequest(LeaveStatus::Approved) => "already_approved",
            AppError::DuplicateRequest(_) => "already_pending",
            AppError::AlreadyCheckedIn(_) => "already_checked_in",
            AppError::NoOpenSession => "no_open_session",
            AppError::StaleSession { .. } => "stale_session",
            AppError::OnLeave(_) => "on_leave",
            AppError::OutsideGeofence { .. } => "outside_geofence",
            AppError::EarlyLeaveReasonRequired { .. } => "early_leave_reason_required",
            AppError::Dependency(_) => "dependency_failed",
            AppError::Database(_) => "internal",
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        // Duplicate key on one of the uniqueness constraints
        if let sqlx::Error::Database(db_err) = &e {
            if db_err.code().as_deref() == Some("23000") {
                return AppError::Conflict("Record already exists".to_string());
            }
        }
        AppError::Database(e)
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_)
            | AppError::OutsideGeofence { .. }
            | AppError::EarlyLeaveReasonRequired { .. } => StatusCode::BAD_REQUEST,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_)
            | AppError::DuplicateRequest(_)
            | AppError::AlreadyCheckedIn(_)
            | AppError::NoOpenSession
            | AppError::StaleSession { .. }
            | AppError::OnLeave(_) => StatusCode::CONFLICT,
            AppError::Dependency(_) => StatusCode::BAD_GATEWAY,
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        if let AppError::Database(e) = self {
            tracing::error!(error = %e, "Storage failure");
        }

        let mut body = json!({
            "error": self.code(),
            "message": self.to_string(),
        });
        match self {
            AppError::OutsideGeofence { nearest, distance_m } => {
                body["nearest_zone"] = json!(nearest);
                body["distance_m"] = json!(distance_m.round());
            }
            AppError::EarlyLeaveReasonRequired { missing_minutes } => {
                body["missing_minutes"] = json!(missing_minutes);
            }
            AppError::StaleSession { shift_date, outdated } => {
                body["shift_date"] = json!(shift_date);
                body["outdated"] = json!(outdated);
            }
            _ => {}
        }

        HttpResponse::build(self.status_code()).json(body)
    }
}
