//! Lifecycle of one employee-day: check-in, checkout, status view and the
//! admin-side corrections.

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};
use utoipa::ToSchema;

use super::geofence::locate;
use super::{Outcome, Services, Warning};
use crate::collab::{GamificationEvent, ProofFile};
use crate::config::AttendancePolicy;
use crate::context::Session;
use crate::error::{AppError, AppResult};
use crate::model::attendance::{
    AttendanceDay, AttendanceStatus, Coordinates, DayStatus, NewCheckIn, WorkType,
};
use crate::model::leave_request::{LeaveQuery, LeaveStatus, LeaveType};

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CheckInInput {
    pub work_type: WorkType,
    pub coordinates: Option<Coordinates>,
    /// Free-form place label for home or off-site work.
    #[schema(example = "Client site, Gulshan")]
    pub location_name: Option<String>,
    pub proof: Option<ProofFile>,
    /// Marks a check-in entered after the fact.
    #[serde(default)]
    pub correction: bool,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckOutStatus {
    Completed,
    EarlyLeave,
}

/// Checkout classification. Only elapsed time since check-in matters, never
/// the clock time the shift nominally ends.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, ToSchema)]
pub struct CheckOutAssessment {
    pub status: CheckOutStatus,
    pub worked_minutes: i64,
    pub missing_minutes: i64,
}

pub fn calculate_check_out_status(
    check_in: NaiveDateTime,
    check_out: NaiveDateTime,
    min_work_minutes: i64,
) -> CheckOutAssessment {
    let worked_minutes = (check_out - check_in).num_minutes().max(0);
    let missing_minutes = (min_work_minutes - worked_minutes).max(0);
    CheckOutAssessment {
        status: if missing_minutes == 0 {
            CheckOutStatus::Completed
        } else {
            CheckOutStatus::EarlyLeave
        },
        worked_minutes,
        missing_minutes,
    }
}

/// An open session from an earlier day that has run past the stale limit.
pub fn is_outdated(day: &AttendanceDay, now: NaiveDateTime, policy: &AttendancePolicy) -> bool {
    match day.check_in {
        Some(check_in) if day.check_out.is_none() => {
            day.shift_date != now.date()
                && TimeDelta::try_hours(policy.stale_after_hours)
                    .is_some_and(|limit| now - check_in > limit)
        }
        _ => false,
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CheckOutReceipt {
    pub day: AttendanceDay,
    pub assessment: CheckOutAssessment,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DayView {
    pub status: DayStatus,
    pub day: Option<AttendanceDay>,
    /// What checking out right now would yield, for open sessions.
    pub preview: Option<CheckOutAssessment>,
}

async fn has_approved_wfh(services: &Services, user_id: u64, date: NaiveDate) -> AppResult<bool> {
    let approved = services
        .store
        .leave_requests(&LeaveQuery {
            user_id: Some(user_id),
            leave_type: Some(LeaveType::WorkFromHome),
            status: Some(LeaveStatus::Approved),
            from: Some(date),
            to: Some(date),
            ..LeaveQuery::default()
        })
        .await?;
    Ok(!approved.is_empty())
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/* =========================
Check-in
========================= */
pub async fn check_in(
    services: &Services,
    session: &Session,
    input: CheckInInput,
) -> AppResult<Outcome<AttendanceDay>> {
    let policy = &services.policy.attendance;
    let today = session.today();
    let user_id = session.user_id;

    if let Some(open) = services.store.open_attendance(user_id).await? {
        debug!(user_id, shift_date = %open.shift_date, "Check-in refused: session open");
        return Err(if open.shift_date == today {
            AppError::AlreadyCheckedIn(today)
        } else {
            AppError::StaleSession {
                shift_date: open.shift_date,
                outdated: is_outdated(&open, session.now, policy),
            }
        });
    }

    let wfh_approved = has_approved_wfh(services, user_id, today).await?;
    let replaces_leave = match services.store.attendance_on(user_id, today).await? {
        None => false,
        Some(day) if day.status == AttendanceStatus::Leave => {
            if wfh_approved && input.work_type == WorkType::Home {
                true
            } else {
                return Err(AppError::OnLeave(today));
            }
        }
        Some(_) => return Err(AppError::AlreadyCheckedIn(today)),
    };

    let mut warnings = Vec::new();
    let (location_name, location_verified) = match input.work_type {
        WorkType::Office => {
            let point = input.coordinates.ok_or_else(|| {
                AppError::validation("Office check-in needs the current coordinates")
            })?;
            let zones = services.store.location_zones().await?;
            let hit = locate(point, &zones)
                .ok_or_else(|| AppError::validation("No office zones are configured"))?;
            if !hit.inside {
                debug!(user_id, nearest = %hit.zone.name, distance_m = hit.distance_m, "Outside geofence");
                return Err(AppError::OutsideGeofence {
                    nearest: Some(hit.zone.name.clone()),
                    distance_m: hit.distance_m,
                });
            }
            (Some(hit.zone.name.clone()), true)
        }
        WorkType::Home => {
            if !wfh_approved {
                warnings.push(Warning::UnverifiedLocation);
            }
            (
                non_blank(input.location_name).or_else(|| Some("Home".to_string())),
                wfh_approved,
            )
        }
        WorkType::OffSite => (non_blank(input.location_name), false),
        WorkType::Leave => {
            return Err(AppError::validation(
                "Leave days are recorded through leave requests",
            ));
        }
    };

    let folder = vec!["attendance".to_string(), user_id.to_string(), today.to_string()];
    let proof_url = if policy.require_proof {
        let file = input
            .proof
            .as_ref()
            .ok_or_else(|| AppError::validation("A proof photo is required to check in"))?;
        let url = services
            .proofs
            .upload(file, &folder)
            .await
            .map_err(|e| AppError::Dependency(format!("Proof upload failed: {}", e)))?;
        Some(url)
    } else {
        services
            .upload_optional(input.proof.as_ref(), &folder, &mut warnings)
            .await
    };

    let is_late = session.now.time() > policy.work_start;
    let day = services
        .store
        .insert_check_in(&NewCheckIn {
            user_id,
            shift_date: today,
            check_in: session.now,
            work_type: input.work_type,
            is_late,
            proof_url,
            coordinates: input.coordinates,
            location_name,
            location_verified,
            is_corrected: input.correction,
            replaces_leave,
        })
        .await?;

    info!(user_id, attendance_id = day.id, work_type = %day.work_type, is_late, "Checked in");

    services
        .award(
            user_id,
            GamificationEvent::AttendanceCheckIn,
            json!({ "on_time": !is_late, "work_type": day.work_type }),
            &mut warnings,
        )
        .await;

    Ok(Outcome::new(day, warnings))
}

/* =========================
Check-out
========================= */
pub async fn check_out(
    services: &Services,
    session: &Session,
    reason: Option<String>,
) -> AppResult<Outcome<CheckOutReceipt>> {
    let policy = &services.policy.attendance;
    let user_id = session.user_id;

    let open = services
        .store
        .open_attendance(user_id)
        .await?
        .ok_or(AppError::NoOpenSession)?;
    if is_outdated(&open, session.now, policy) {
        return Err(AppError::StaleSession {
            shift_date: open.shift_date,
            outdated: true,
        });
    }
    let check_in = open.check_in.ok_or(AppError::NoOpenSession)?;

    let assessment = calculate_check_out_status(check_in, session.now, policy.min_work_minutes);
    let reason = non_blank(reason);
    if assessment.status == CheckOutStatus::EarlyLeave && reason.is_none() {
        return Err(AppError::EarlyLeaveReasonRequired {
            missing_minutes: assessment.missing_minutes,
        });
    }
    let early_reason = match assessment.status {
        CheckOutStatus::EarlyLeave => reason.as_deref(),
        CheckOutStatus::Completed => None,
    };

    let day = services
        .store
        .record_check_out(open.id, session.now, early_reason)
        .await?;

    info!(
        user_id,
        attendance_id = day.id,
        worked_minutes = assessment.worked_minutes,
        early = early_reason.is_some(),
        "Checked out"
    );

    Ok(Outcome::new(CheckOutReceipt { day, assessment }, Vec::new()))
}

/* =========================
Status view
========================= */
pub async fn day_status(services: &Services, session: &Session) -> AppResult<DayView> {
    let policy = &services.policy.attendance;
    let user_id = session.user_id;

    if let Some(open) = services.store.open_attendance(user_id).await? {
        let corrections = services
            .store
            .leave_requests(&LeaveQuery {
                user_id: Some(user_id),
                start_date: Some(open.shift_date),
                ..LeaveQuery::default()
            })
            .await?;
        // newest first
        let latest_correction = corrections.iter().find(|r| r.leave_type.is_correction());

        let status = if latest_correction.is_some_and(|r| r.status == LeaveStatus::Rejected) {
            DayStatus::ActionRequired
        } else if is_outdated(&open, session.now, policy) {
            DayStatus::Outdated
        } else {
            DayStatus::Working
        };
        let preview = match (status, open.check_in) {
            (DayStatus::Working, Some(check_in)) => Some(calculate_check_out_status(
                check_in,
                session.now,
                policy.min_work_minutes,
            )),
            _ => None,
        };
        return Ok(DayView {
            status,
            day: Some(open),
            preview,
        });
    }

    let today = services
        .store
        .attendance_on(user_id, session.today())
        .await?;
    let status = match today.as_ref().map(|d| d.status) {
        None => DayStatus::None,
        Some(AttendanceStatus::Leave) => DayStatus::Leave,
        Some(AttendanceStatus::Completed) => DayStatus::Completed,
        // a working record without an open session has no check-in yet
        Some(AttendanceStatus::Working) => DayStatus::None,
    };
    Ok(DayView {
        status,
        day: today,
        preview: None,
    })
}

pub async fn history(
    services: &Services,
    session: &Session,
    user_id: u64,
    from: NaiveDate,
    to: NaiveDate,
) -> AppResult<Vec<AttendanceDay>> {
    session.require_self_or_approver(user_id)?;
    if from > to {
        return Err(AppError::validation("`from` cannot be after `to`"));
    }
    services.store.attendance_between(user_id, from, to).await
}

/* =========================
Admin corrections
========================= */
pub async fn override_check_out(
    services: &Services,
    session: &Session,
    attendance_id: u64,
    check_out: NaiveDateTime,
) -> AppResult<AttendanceDay> {
    session.require_approver()?;

    let day = services
        .store
        .attendance(attendance_id)
        .await?
        .ok_or(AppError::NotFound("Attendance"))?;
    let check_in = day
        .check_in
        .ok_or_else(|| AppError::conflict("A leave day has no session to close"))?;
    if check_out <= check_in {
        return Err(AppError::validation("Checkout must be after the check-in"));
    }

    let day = services
        .store
        .override_check_out(attendance_id, check_out)
        .await?;
    info!(
        attendance_id,
        user_id = day.user_id,
        approver_id = session.user_id,
        %check_out,
        "Checkout overridden"
    );
    Ok(day)
}

/// Removes records older than the retention horizon.
pub async fn purge_expired(services: &Services, today: NaiveDate) -> AppResult<u64> {
    let horizon = TimeDelta::try_days(services.policy.attendance.retention_days)
        .and_then(|retention| today.checked_sub_signed(retention))
        .ok_or_else(|| AppError::validation("Retention period reaches past the calendar"))?;
    let removed = services.store.purge_attendance_before(horizon).await?;
    info!(%horizon, removed, "Attendance retention cleanup");
    Ok(removed)
}

pub async fn purge(services: &Services, session: &Session) -> AppResult<u64> {
    session.require_approver()?;
    purge_expired(services, session.today()).await
}
