//! Leave, overtime and correction requests: submission with duplicate
//! detection, approval side effects on attendance, rejection.

use chrono::{Days, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};
use utoipa::ToSchema;

use super::quota::{self, Period, QuotaLine};
use super::{Outcome, Services, Warning};
use crate::collab::{GamificationEvent, ProofFile};
use crate::context::Session;
use crate::error::{AppError, AppResult};
use crate::model::leave_request::{
    LeaveQuery, LeaveRequest, LeaveStatus, LeaveType, NewLeaveRequest,
};
use crate::store::{ApprovalEffect, LeaveInsert};

/// Longest span a single request may cover, inclusive.
const MAX_LEAVE_DAYS: i64 = 366;

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct LeaveSubmission {
    pub leave_type: LeaveType,
    #[schema(example = "2026-01-05", value_type = String, format = "date")]
    pub start_date: NaiveDate,
    /// Ignored for incident types, which always cover one day.
    #[schema(example = "2026-01-06", value_type = Option<String>, format = "date")]
    pub end_date: Option<NaiveDate>,
    #[schema(example = "Fever")]
    pub reason: String,
    /// Corrected time of day, required for correction types.
    #[schema(example = "09:15:00", value_type = Option<String>)]
    pub incident_time: Option<NaiveTime>,
    #[schema(example = 2.5)]
    pub overtime_hours: Option<f64>,
    pub attachment: Option<ProofFile>,
}

impl LeaveSubmission {
    fn validate(&self) -> AppResult<NaiveDate> {
        if self.reason.trim().is_empty() {
            return Err(AppError::validation("A reason is required"));
        }
        let end = if self.leave_type.is_incident() {
            self.start_date
        } else {
            self.end_date.unwrap_or(self.start_date)
        };
        if end < self.start_date {
            return Err(AppError::validation("start_date cannot be after end_date"));
        }
        if (end - self.start_date).num_days() >= MAX_LEAVE_DAYS {
            return Err(AppError::validation(format!(
                "A request can cover at most {} days",
                MAX_LEAVE_DAYS
            )));
        }
        if self.leave_type.is_correction() && self.incident_time.is_none() {
            return Err(AppError::validation(format!(
                "{} requests need the corrected time",
                self.leave_type
            )));
        }
        if self.leave_type == LeaveType::Overtime
            && !self.overtime_hours.is_some_and(|h| h.is_finite() && h > 0.0)
        {
            return Err(AppError::validation("Overtime requests need a positive number of hours"));
        }
        Ok(end)
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct QuotaView {
    pub user_id: u64,
    #[schema(value_type = String, format = "date")]
    pub period_start: NaiveDate,
    #[schema(value_type = String, format = "date")]
    pub period_end: NaiveDate,
    pub balances: Vec<QuotaLine>,
}

async fn approved_in(
    services: &Services,
    user_id: u64,
    period: Period,
) -> AppResult<Vec<LeaveRequest>> {
    services
        .store
        .leave_requests(&LeaveQuery {
            user_id: Some(user_id),
            status: Some(LeaveStatus::Approved),
            from: Some(period.start),
            to: Some(period.end),
            ..LeaveQuery::default()
        })
        .await
}

/* =========================
Submit
========================= */
pub async fn submit(
    services: &Services,
    session: &Session,
    input: LeaveSubmission,
) -> AppResult<Outcome<LeaveRequest>> {
    let user_id = session.user_id;
    let end_date = input.validate()?;

    let existing = services
        .store
        .leave_requests(&LeaveQuery {
            user_id: Some(user_id),
            leave_type: Some(input.leave_type),
            start_date: Some(input.start_date),
            ..LeaveQuery::default()
        })
        .await?;
    if let Some(active) = existing.iter().find(|r| r.status != LeaveStatus::Rejected) {
        debug!(user_id, request_id = active.id, status = %active.status, "Duplicate leave request");
        return Err(AppError::DuplicateRequest(active.status));
    }

    let mut warnings = Vec::new();
    let folder = vec!["leave".to_string(), user_id.to_string()];
    let attachment_url = services
        .upload_optional(input.attachment.as_ref(), &folder, &mut warnings)
        .await;

    let request = match services
        .store
        .insert_leave_request(&NewLeaveRequest {
            user_id,
            leave_type: input.leave_type,
            start_date: input.start_date,
            end_date,
            reason: input.reason.trim().to_string(),
            incident_time: input.incident_time,
            overtime_hours: input.overtime_hours,
            attachment_url,
            created_at: session.now,
        })
        .await?
    {
        LeaveInsert::Inserted(request) => request,
        LeaveInsert::Duplicate(status) => return Err(AppError::DuplicateRequest(status)),
    };

    info!(user_id, request_id = request.id, leave_type = %request.leave_type, "Leave request submitted");

    if let Some(&allowance) = services.policy.quotas.get(&request.leave_type) {
        let period = Period::containing(request.start_date);
        let history = approved_in(services, user_id, period).await?;
        let used = quota::leave_usage(&history, user_id, period).get(request.leave_type);
        let requested = quota::units(&request);
        if used + requested > allowance {
            warnings.push(Warning::OverQuota {
                leave_type: request.leave_type,
                used,
                requested,
                quota: allowance,
            });
        }
    }

    services
        .broadcast(
            "New leave request",
            &format!(
                "User #{} requested {} from {} to {}",
                user_id, request.leave_type, request.start_date, request.end_date
            ),
            &format!("/leave-requests/{}", request.id),
            &mut warnings,
        )
        .await;

    Ok(Outcome::new(request, warnings))
}

/// Rebuilds the checkout timestamp for a forgotten checkout. Times before the
/// overnight cutoff belong to the calendar day after the shift date.
pub fn corrected_check_out(
    shift_date: NaiveDate,
    time: NaiveTime,
    overnight_cutoff: NaiveTime,
) -> AppResult<NaiveDateTime> {
    let stamp = shift_date.and_time(time);
    if time < overnight_cutoff {
        stamp
            .checked_add_days(Days::new(1))
            .ok_or_else(|| AppError::validation("Corrected checkout is past the calendar"))
    } else {
        Ok(stamp)
    }
}

fn incident_time(request: &LeaveRequest) -> AppResult<NaiveTime> {
    request
        .incident_time
        .ok_or_else(|| AppError::validation("The request carries no corrected time"))
}

/// A corrected check-in, refused when the day already closed before it.
async fn corrected_check_in(
    services: &Services,
    request: &LeaveRequest,
    check_in: NaiveDateTime,
    is_late: bool,
) -> AppResult<ApprovalEffect> {
    let day = services
        .store
        .attendance_on(request.user_id, request.start_date)
        .await?;
    if day.and_then(|d| d.check_out).is_some_and(|out| out <= check_in) {
        return Err(AppError::validation(
            "Corrected check-in is not before the recorded checkout",
        ));
    }
    Ok(ApprovalEffect::CheckIn {
        shift_date: request.start_date,
        check_in,
        is_late,
    })
}

/// What approving the request does to attendance.
async fn approval_effect(services: &Services, request: &LeaveRequest) -> AppResult<ApprovalEffect> {
    let policy = &services.policy.attendance;
    Ok(match request.leave_type {
        LeaveType::Sick
        | LeaveType::Vacation
        | LeaveType::Personal
        | LeaveType::Emergency
        | LeaveType::WorkFromHome => ApprovalEffect::LeaveDays {
            dates: request
                .start_date
                .iter_days()
                .take_while(|d| *d <= request.end_date)
                .collect(),
        },
        LeaveType::ForgotCheckIn => {
            let time = incident_time(request)?;
            let check_in = request.start_date.and_time(time);
            corrected_check_in(services, request, check_in, time > policy.work_start).await?
        }
        // an excused late arrival: the reported time stands, the flag does not
        LeaveType::LateEntry => {
            let check_in = request.start_date.and_time(incident_time(request)?);
            corrected_check_in(services, request, check_in, false).await?
        }
        LeaveType::ForgotCheckOut => {
            let time = incident_time(request)?;
            let day = services
                .store
                .attendance_on(request.user_id, request.start_date)
                .await?
                .ok_or(AppError::NotFound("Attendance for the shift"))?;
            let check_in = day
                .check_in
                .ok_or_else(|| AppError::conflict("The shift has no check-in to close"))?;
            let check_out =
                corrected_check_out(request.start_date, time, policy.overnight_cutoff)?;
            if check_out <= check_in {
                return Err(AppError::validation("Corrected checkout precedes the check-in"));
            }
            ApprovalEffect::CheckOut {
                shift_date: request.start_date,
                check_out,
            }
        }
        LeaveType::Overtime => ApprovalEffect::None,
    })
}

/* =========================
Approve / reject
========================= */
pub async fn approve(
    services: &Services,
    session: &Session,
    request_id: u64,
) -> AppResult<Outcome<LeaveRequest>> {
    session.require_approver()?;

    let request = services
        .store
        .leave_request(request_id)
        .await?
        .ok_or(AppError::NotFound("Leave request"))?;
    if request.status != LeaveStatus::Pending {
        return Err(AppError::conflict(format!("Request is already {}", request.status)));
    }

    let effect = approval_effect(services, &request).await?;
    let approved = services
        .store
        .approve_leave_request(request_id, session.user_id, &effect)
        .await?;

    info!(
        request_id,
        user_id = approved.user_id,
        approver_id = session.user_id,
        leave_type = %approved.leave_type,
        "Leave request approved"
    );

    let mut warnings = Vec::new();
    match &effect {
        ApprovalEffect::LeaveDays { dates } => {
            services
                .award(
                    approved.user_id,
                    GamificationEvent::AttendanceLeave,
                    json!({ "days": dates.len(), "leave_type": approved.leave_type }),
                    &mut warnings,
                )
                .await;
        }
        ApprovalEffect::CheckIn { is_late, .. } => {
            services
                .award(
                    approved.user_id,
                    GamificationEvent::AttendanceCheckIn,
                    json!({ "on_time": !is_late, "corrected": true }),
                    &mut warnings,
                )
                .await;
        }
        ApprovalEffect::CheckOut { .. } | ApprovalEffect::None => {}
    }

    services
        .notify(
            approved.user_id,
            "Request approved",
            &format!("Your {} request was approved", approved.leave_type),
            &format!("/leave-requests/{}", approved.id),
            &mut warnings,
        )
        .await;

    Ok(Outcome::new(approved, warnings))
}

pub async fn reject(
    services: &Services,
    session: &Session,
    request_id: u64,
    reason: &str,
) -> AppResult<Outcome<LeaveRequest>> {
    session.require_approver()?;
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(AppError::validation("A rejection reason is required"));
    }

    let rejected = services
        .store
        .reject_leave_request(request_id, session.user_id, reason)
        .await?;
    info!(request_id, user_id = rejected.user_id, approver_id = session.user_id, "Leave request rejected");

    let mut warnings = Vec::new();
    services
        .notify(
            rejected.user_id,
            "Request rejected",
            &format!("Your {} request was rejected: {}", rejected.leave_type, reason),
            &format!("/leave-requests/{}", rejected.id),
            &mut warnings,
        )
        .await;

    Ok(Outcome::new(rejected, warnings))
}

/* =========================
Views
========================= */
/// Employees only ever see their own requests.
pub async fn list(
    services: &Services,
    session: &Session,
    mut query: LeaveQuery,
) -> AppResult<Vec<LeaveRequest>> {
    if !session.role.is_approver() {
        query.user_id = Some(session.user_id);
    }
    services.store.leave_requests(&query).await
}

pub async fn get(services: &Services, session: &Session, request_id: u64) -> AppResult<LeaveRequest> {
    let request = services
        .store
        .leave_request(request_id)
        .await?
        .ok_or(AppError::NotFound("Leave request"))?;
    session.require_self_or_approver(request.user_id)?;
    Ok(request)
}

pub async fn usage(
    services: &Services,
    session: &Session,
    user_id: Option<u64>,
) -> AppResult<QuotaView> {
    let user_id = user_id.unwrap_or(session.user_id);
    session.require_self_or_approver(user_id)?;

    let period = Period::containing(session.today());
    let history = approved_in(services, user_id, period).await?;
    let usage = quota::leave_usage(&history, user_id, period);

    Ok(QuotaView {
        user_id,
        period_start: period.start,
        period_end: period.end,
        balances: quota::balances(&usage, &services.policy.quotas),
    })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::collab::testing::proof;
    use crate::engine::attendance::{self, CheckInInput};
    use crate::engine::testing::{Harness, at, date, employee, harness, hr};
    use crate::model::attendance::{AttendanceStatus, Coordinates, WorkType};
    use crate::store::Store;

    fn ask(leave_type: LeaveType, start: NaiveDate, end: Option<NaiveDate>) -> LeaveSubmission {
        LeaveSubmission {
            leave_type,
            start_date: start,
            end_date: end,
            reason: "family matter".into(),
            incident_time: None,
            overtime_hours: None,
            attachment: None,
        }
    }

    fn correction(leave_type: LeaveType, day: NaiveDate, h: u32, m: u32) -> LeaveSubmission {
        LeaveSubmission {
            incident_time: NaiveTime::from_hms_opt(h, m, 0),
            ..ask(leave_type, day, None)
        }
    }

    async fn office_check_in(h: &Harness, user_id: u64, when: NaiveDateTime) {
        h.store.add_zone("HQ", 23.7806, 90.4193, 150.0).await;
        attendance::check_in(
            &h.services,
            &employee(user_id, when),
            CheckInInput {
                work_type: WorkType::Office,
                coordinates: Some(Coordinates {
                    lat: 23.7806,
                    lng: 90.4193,
                }),
                location_name: None,
                proof: None,
                correction: false,
            },
        )
        .await
        .unwrap();
    }

    #[actix_web::test]
    async fn duplicate_while_pending_is_refused_until_rejected() {
        let h = harness();
        let me = employee(1, at(2026, 4, 1, 10, 0));
        let day = date(2026, 4, 6);

        let first = submit(&h.services, &me, ask(LeaveType::Sick, day, None))
            .await
            .unwrap()
            .value;
        assert_eq!(first.status, LeaveStatus::Pending);

        let err = submit(&h.services, &me, ask(LeaveType::Sick, day, None))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::DuplicateRequest(LeaveStatus::Pending)));
        assert_eq!(err.code(), "already_pending");
        let all = list(&h.services, &me, LeaveQuery::default()).await.unwrap();
        assert_eq!(all.len(), 1);

        reject(&h.services, &hr(at(2026, 4, 1, 11, 0)), first.id, "short staffed")
            .await
            .unwrap();
        let again = submit(&h.services, &me, ask(LeaveType::Sick, day, None))
            .await
            .unwrap()
            .value;
        assert_ne!(again.id, first.id);
    }

    #[actix_web::test]
    async fn duplicate_of_approved_reports_approved() {
        let h = harness();
        let me = employee(1, at(2026, 4, 1, 10, 0));
        let day = date(2026, 4, 6);
        let first = submit(&h.services, &me, ask(LeaveType::Vacation, day, None))
            .await
            .unwrap()
            .value;
        approve(&h.services, &hr(at(2026, 4, 1, 11, 0)), first.id)
            .await
            .unwrap();

        let err = submit(&h.services, &me, ask(LeaveType::Vacation, day, None))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "already_approved");
    }

    #[actix_web::test]
    async fn submission_validates_its_shape() {
        let h = harness();
        let me = employee(1, at(2026, 4, 1, 10, 0));

        let blank = LeaveSubmission {
            reason: "   ".into(),
            ..ask(LeaveType::Sick, date(2026, 4, 6), None)
        };
        let backwards = ask(LeaveType::Sick, date(2026, 4, 6), Some(date(2026, 4, 5)));
        let no_time = ask(LeaveType::ForgotCheckIn, date(2026, 4, 6), None);
        let no_hours = ask(LeaveType::Overtime, date(2026, 4, 6), None);

        for input in [blank, backwards, no_time, no_hours] {
            let err = submit(&h.services, &me, input).await.unwrap_err();
            assert!(matches!(err, AppError::Validation(_)), "{:?}", err);
        }
    }

    #[actix_web::test]
    async fn incident_requests_span_one_day() {
        let h = harness();
        let me = employee(1, at(2026, 4, 1, 10, 0));
        let input = LeaveSubmission {
            end_date: Some(date(2026, 4, 9)),
            ..correction(LeaveType::LateEntry, date(2026, 4, 1), 9, 20)
        };
        let request = submit(&h.services, &me, input).await.unwrap().value;
        assert_eq!(request.end_date, request.start_date);
    }

    #[actix_web::test]
    async fn submission_broadcasts_and_warns_over_quota() {
        let h = harness();
        let me = employee(1, at(2026, 4, 1, 10, 0));
        // personal allowance is 3 days
        let outcome = submit(
            &h.services,
            &me,
            ask(LeaveType::Personal, date(2026, 4, 6), Some(date(2026, 4, 9))),
        )
        .await
        .unwrap();

        assert_eq!(outcome.value.status, LeaveStatus::Pending);
        assert!(matches!(
            outcome.warnings.as_slice(),
            [Warning::OverQuota { used: 0, requested: 4, quota: 3, .. }]
        ));
        assert_eq!(h.notifier.recipients(), vec![None]);
        assert!(h.gamification.kinds().is_empty());
    }

    #[actix_web::test]
    async fn attachment_failure_keeps_the_request() {
        let h = harness();
        h.proofs.fail.store(true, Ordering::SeqCst);
        let input = LeaveSubmission {
            attachment: Some(proof("note.pdf")),
            ..ask(LeaveType::Sick, date(2026, 4, 6), None)
        };
        let outcome = submit(&h.services, &employee(1, at(2026, 4, 1, 10, 0)), input)
            .await
            .unwrap();
        assert_eq!(outcome.value.attachment_url, None);
        assert!(matches!(
            outcome.warnings.first(),
            Some(Warning::ProofUploadFailed { .. })
        ));
    }

    #[actix_web::test]
    async fn approving_day_leave_writes_every_day_once() {
        let h = harness();
        let me = employee(1, at(2026, 4, 1, 10, 0));
        let request = submit(
            &h.services,
            &me,
            ask(LeaveType::Sick, date(2026, 4, 6), Some(date(2026, 4, 8))),
        )
        .await
        .unwrap()
        .value;

        let outcome = approve(&h.services, &hr(at(2026, 4, 1, 11, 0)), request.id)
            .await
            .unwrap();
        assert_eq!(outcome.value.status, LeaveStatus::Approved);
        assert_eq!(outcome.value.approver_id, Some(900));

        let days = h
            .store
            .attendance_between(1, date(2026, 4, 1), date(2026, 4, 30))
            .await
            .unwrap();
        assert_eq!(days.len(), 3);
        assert!(days.iter().all(|d| d.status == AttendanceStatus::Leave
            && d.work_type == WorkType::Leave
            && d.check_in.is_none()));

        assert_eq!(h.gamification.kinds(), vec![GamificationEvent::AttendanceLeave]);
        assert!(h.notifier.recipients().contains(&Some(1)));

        let err = approve(&h.services, &hr(at(2026, 4, 1, 12, 0)), request.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[actix_web::test]
    async fn employees_cannot_decide_requests() {
        let h = harness();
        let me = employee(1, at(2026, 4, 1, 10, 0));
        let request = submit(&h.services, &me, ask(LeaveType::Sick, date(2026, 4, 6), None))
            .await
            .unwrap()
            .value;

        let err = approve(&h.services, &employee(2, at(2026, 4, 1, 11, 0)), request.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
        let err = reject(&h.services, &hr(at(2026, 4, 1, 11, 0)), request.id, " ")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[actix_web::test]
    async fn forgot_checkout_after_midnight_rolls_to_the_next_day() {
        let h = harness();
        office_check_in(&h, 1, at(2026, 4, 6, 18, 0)).await;

        let request = submit(
            &h.services,
            &employee(1, at(2026, 4, 7, 14, 0)),
            correction(LeaveType::ForgotCheckOut, date(2026, 4, 6), 2, 0),
        )
        .await
        .unwrap()
        .value;
        approve(&h.services, &hr(at(2026, 4, 7, 15, 0)), request.id)
            .await
            .unwrap();

        let day = h
            .store
            .attendance_on(1, date(2026, 4, 6))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(day.check_out, Some(at(2026, 4, 7, 2, 0)));
        assert_eq!(day.status, AttendanceStatus::Completed);
        assert!(day.is_corrected);
        assert!(h.store.attendance_on(1, date(2026, 4, 7)).await.unwrap().is_none());
    }

    #[test]
    fn corrected_checkout_before_cutoff_belongs_to_the_next_day() {
        let cutoff = NaiveTime::from_hms_opt(5, 0, 0).unwrap();
        let d = date(2026, 4, 6);
        assert_eq!(
            corrected_check_out(d, NaiveTime::from_hms_opt(2, 0, 0).unwrap(), cutoff).unwrap(),
            at(2026, 4, 7, 2, 0)
        );
        assert_eq!(
            corrected_check_out(d, NaiveTime::from_hms_opt(5, 0, 0).unwrap(), cutoff).unwrap(),
            at(2026, 4, 6, 5, 0)
        );
        let err = corrected_check_out(
            NaiveDate::MAX,
            NaiveTime::from_hms_opt(2, 0, 0).unwrap(),
            cutoff,
        )
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[actix_web::test]
    async fn leave_span_is_capped_at_a_year() {
        let h = harness();
        let me = employee(1, at(2026, 4, 1, 10, 0));

        let year = ask(LeaveType::Vacation, date(2026, 1, 1), Some(date(2026, 12, 31)));
        assert_eq!(submit(&h.services, &me, year).await.unwrap().value.day_count(), 365);

        let too_long = ask(LeaveType::Vacation, date(2026, 4, 6), Some(date(2027, 4, 6)));
        let whole_calendar = ask(LeaveType::Sick, NaiveDate::MIN, Some(NaiveDate::MAX));
        for input in [too_long, whole_calendar] {
            let err = submit(&h.services, &me, input).await.unwrap_err();
            assert!(matches!(err, AppError::Validation(_)), "{:?}", err);
        }
        let all = list(&h.services, &me, LeaveQuery::default()).await.unwrap();
        assert_eq!(all.len(), 1);
    }

    #[actix_web::test]
    async fn day_leave_cannot_erase_recorded_attendance() {
        let h = harness();
        office_check_in(&h, 1, at(2026, 4, 7, 9, 0)).await;
        let request = submit(
            &h.services,
            &employee(1, at(2026, 4, 7, 10, 0)),
            ask(LeaveType::Sick, date(2026, 4, 6), Some(date(2026, 4, 8))),
        )
        .await
        .unwrap()
        .value;

        let err = approve(&h.services, &hr(at(2026, 4, 7, 11, 0)), request.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let days = h
            .store
            .attendance_between(1, date(2026, 4, 1), date(2026, 4, 30))
            .await
            .unwrap();
        assert_eq!(days.len(), 1);
        assert_eq!(days[0].check_in, Some(at(2026, 4, 7, 9, 0)));
        assert_eq!(days[0].status, AttendanceStatus::Working);
        let still = h.store.leave_request(request.id).await.unwrap().unwrap();
        assert_eq!(still.status, LeaveStatus::Pending);
        assert!(!h.gamification.kinds().contains(&GamificationEvent::AttendanceLeave));
    }

    #[actix_web::test]
    async fn corrected_check_in_after_the_checkout_is_refused() {
        let h = harness();
        office_check_in(&h, 1, at(2026, 4, 6, 8, 0)).await;
        attendance::check_out(&h.services, &employee(1, at(2026, 4, 6, 17, 0)), None)
            .await
            .unwrap();
        let request = submit(
            &h.services,
            &employee(1, at(2026, 4, 6, 19, 0)),
            correction(LeaveType::LateEntry, date(2026, 4, 6), 18, 0),
        )
        .await
        .unwrap()
        .value;

        let err = approve(&h.services, &hr(at(2026, 4, 6, 20, 0)), request.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let day = h
            .store
            .attendance_on(1, date(2026, 4, 6))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(day.check_in, Some(at(2026, 4, 6, 8, 0)));
        assert_eq!(day.check_out, Some(at(2026, 4, 6, 17, 0)));
        assert!(!day.is_corrected);
    }

    #[actix_web::test]
    async fn forgot_checkout_before_check_in_is_refused() {
        let h = harness();
        office_check_in(&h, 1, at(2026, 4, 6, 9, 0)).await;
        let request = submit(
            &h.services,
            &employee(1, at(2026, 4, 7, 9, 0)),
            correction(LeaveType::ForgotCheckOut, date(2026, 4, 6), 8, 0),
        )
        .await
        .unwrap()
        .value;

        let err = approve(&h.services, &hr(at(2026, 4, 7, 10, 0)), request.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        let still = h.store.leave_request(request.id).await.unwrap().unwrap();
        assert_eq!(still.status, LeaveStatus::Pending);
    }

    #[actix_web::test]
    async fn forgot_check_in_creates_the_day_and_scores_it() {
        let h = harness();
        let request = submit(
            &h.services,
            &employee(1, at(2026, 4, 6, 11, 0)),
            correction(LeaveType::ForgotCheckIn, date(2026, 4, 6), 9, 30),
        )
        .await
        .unwrap()
        .value;
        approve(&h.services, &hr(at(2026, 4, 6, 12, 0)), request.id)
            .await
            .unwrap();

        let day = h
            .store
            .attendance_on(1, date(2026, 4, 6))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(day.check_in, Some(at(2026, 4, 6, 9, 30)));
        assert!(day.is_late);
        assert!(day.is_corrected);

        let events = h.gamification.events.lock().unwrap();
        assert_eq!(events[0].1, GamificationEvent::AttendanceCheckIn);
        assert_eq!(events[0].2["on_time"], json!(false));
    }

    #[actix_web::test]
    async fn late_entry_rewrites_the_existing_day_in_place() {
        let h = harness();
        office_check_in(&h, 1, at(2026, 4, 6, 9, 40)).await;
        let request = submit(
            &h.services,
            &employee(1, at(2026, 4, 6, 10, 0)),
            correction(LeaveType::LateEntry, date(2026, 4, 6), 9, 40),
        )
        .await
        .unwrap()
        .value;
        approve(&h.services, &hr(at(2026, 4, 6, 11, 0)), request.id)
            .await
            .unwrap();

        let days = h
            .store
            .attendance_between(1, date(2026, 4, 6), date(2026, 4, 6))
            .await
            .unwrap();
        assert_eq!(days.len(), 1);
        assert!(!days[0].is_late);
        assert!(days[0].is_open());
    }

    #[actix_web::test]
    async fn overtime_approval_leaves_attendance_alone() {
        let h = harness();
        let input = LeaveSubmission {
            overtime_hours: Some(3.0),
            ..ask(LeaveType::Overtime, date(2026, 4, 6), None)
        };
        let request = submit(&h.services, &employee(1, at(2026, 4, 6, 20, 0)), input)
            .await
            .unwrap()
            .value;
        approve(&h.services, &hr(at(2026, 4, 7, 9, 0)), request.id)
            .await
            .unwrap();

        assert!(h.store.attendance_on(1, date(2026, 4, 6)).await.unwrap().is_none());
        assert!(h.gamification.kinds().is_empty());
    }

    #[actix_web::test]
    async fn usage_counts_approved_days_per_type() {
        let h = harness();
        let me = employee(1, at(2026, 4, 1, 10, 0));
        let boss = hr(at(2026, 4, 1, 11, 0));
        for (start, end) in [
            (date(2026, 4, 6), date(2026, 4, 6)),
            (date(2026, 5, 4), date(2026, 5, 6)),
        ] {
            let request = submit(&h.services, &me, ask(LeaveType::Sick, start, Some(end)))
                .await
                .unwrap()
                .value;
            approve(&h.services, &boss, request.id).await.unwrap();
        }
        submit(&h.services, &me, ask(LeaveType::Vacation, date(2026, 6, 1), None))
            .await
            .unwrap();

        let view = usage(&h.services, &me, None).await.unwrap();
        for line in &view.balances {
            let expected = if line.leave_type == LeaveType::Sick { 4 } else { 0 };
            assert_eq!(line.used, expected, "{}", line.leave_type);
        }

        let err = usage(&h.services, &employee(2, at(2026, 4, 1, 10, 0)), Some(1))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[actix_web::test]
    async fn employees_list_only_their_own_requests() {
        let h = harness();
        for user in [1, 2] {
            submit(
                &h.services,
                &employee(user, at(2026, 4, 1, 10, 0)),
                ask(LeaveType::Sick, date(2026, 4, 6), None),
            )
            .await
            .unwrap();
        }
        let query = LeaveQuery {
            user_id: Some(2),
            ..LeaveQuery::default()
        };
        let mine = list(&h.services, &employee(1, at(2026, 4, 1, 10, 0)), query.clone())
            .await
            .unwrap();
        assert!(mine.iter().all(|r| r.user_id == 1));

        let theirs = list(&h.services, &hr(at(2026, 4, 1, 10, 0)), query).await.unwrap();
        assert_eq!(theirs.len(), 1);
        assert_eq!(theirs[0].user_id, 2);
    }
}
