//! Escalation of missed duties: tribunal window, abandonment and the
//! acknowledgment that clears the lock screen.
//!
//! Escalation is evaluated whenever duties are loaded; there is no scheduler.
//! A missed duty is `AwaitingTribunal` from the day after its date until the
//! tribunal window closes, then `Abandoned`.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info};
use utoipa::ToSchema;

use super::{Outcome, Services};
use crate::collab::{GamificationEvent, ProofFile};
use crate::context::Session;
use crate::error::{AppError, AppResult};
use crate::model::duty::{Duty, PenaltyStatus};

/// End of the tribunal window for a duty dated `date`. Saturates at the
/// calendar end so an oversized window never closes.
pub fn tribunal_deadline(date: NaiveDate, window_hours: i64) -> NaiveDateTime {
    date.succ_opt()
        .map(|next| next.and_time(NaiveTime::default()))
        .zip(TimeDelta::try_hours(window_hours))
        .and_then(|(opens, window)| opens.checked_add_signed(window))
        .unwrap_or(NaiveDateTime::MAX)
}

/// The escalated copy of the duty, or `None` when nothing changes. Done
/// duties and duties that already got a tribunal answer never escalate.
pub fn escalate(duty: &Duty, now: NaiveDateTime, window_hours: i64) -> Option<Duty> {
    if duty.is_done
        || !matches!(
            duty.penalty_status,
            PenaltyStatus::None | PenaltyStatus::AwaitingTribunal
        )
        || duty.date >= now.date()
    {
        return None;
    }

    let deadline = tribunal_deadline(duty.date, window_hours);
    let target = if now >= deadline {
        PenaltyStatus::Abandoned
    } else {
        PenaltyStatus::AwaitingTribunal
    };
    if target == duty.penalty_status {
        return None;
    }

    let mut next = duty.clone();
    next.penalty_status = target;
    if target == PenaltyStatus::Abandoned {
        next.abandoned_at = Some(deadline);
    }
    Some(next)
}

/// The duty as of `now`, and whether loading it changed a stored row.
async fn persist_escalation(
    services: &Services,
    duty: Duty,
    now: NaiveDateTime,
) -> AppResult<(Duty, bool)> {
    match escalate(&duty, now, services.policy.duty.tribunal_window_hours) {
        Some(next) => {
            services.store.update_duty(&next).await?;
            info!(
                duty_id = next.id,
                user_id = next.assignee_id,
                from = %duty.penalty_status,
                to = %next.penalty_status,
                "Duty escalated"
            );
            Ok((next, true))
        }
        None => Ok((duty, false)),
    }
}

/// The caller's duties after escalation. `escalated` counts the rows that
/// loading them rewrote; zero means nothing changed in the store.
#[derive(Debug, Clone, Default)]
pub struct SyncedDuties {
    pub duties: Vec<Duty>,
    pub escalated: usize,
}

/// Loads the caller's duties, escalating any that are overdue.
pub async fn sync_duties(services: &Services, session: &Session) -> AppResult<SyncedDuties> {
    let duties = services.store.duties_for(session.user_id).await?;
    let mut synced = SyncedDuties {
        duties: Vec::with_capacity(duties.len()),
        escalated: 0,
    };
    for duty in duties {
        let (duty, changed) = persist_escalation(services, duty, session.now).await?;
        synced.escalated += usize::from(changed);
        synced.duties.push(duty);
    }
    Ok(synced)
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TribunalCase {
    pub duty: Duty,
    pub deadline: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct NegligenceView {
    /// Abandoned and unacknowledged; each locks the dashboard.
    pub blocking: Vec<Duty>,
    pub awaiting_tribunal: Vec<TribunalCase>,
    /// Minimum time the lock screen stays up before acknowledging.
    pub acknowledge_after_secs: u64,
    #[serde(skip)]
    pub escalated: usize,
}

pub async fn neglected(services: &Services, session: &Session) -> AppResult<NegligenceView> {
    let window = services.policy.duty.tribunal_window_hours;
    let synced = sync_duties(services, session).await?;

    let mut view = NegligenceView {
        blocking: Vec::new(),
        awaiting_tribunal: Vec::new(),
        acknowledge_after_secs: services.policy.duty.acknowledge_dwell_secs,
        escalated: synced.escalated,
    };
    for duty in synced.duties {
        if duty.blocks_dashboard() {
            view.blocking.push(duty);
        } else if duty.penalty_status == PenaltyStatus::AwaitingTribunal {
            view.awaiting_tribunal.push(TribunalCase {
                deadline: tribunal_deadline(duty.date, window),
                duty,
            });
        }
    }
    Ok(view)
}

/// Every duty the caller ever held, cleared ones included.
pub async fn history(services: &Services, session: &Session) -> AppResult<SyncedDuties> {
    sync_duties(services, session).await
}

/// Loads the caller's own duty, escalated to the current time.
async fn own_duty(services: &Services, session: &Session, duty_id: u64) -> AppResult<Duty> {
    let duty = services
        .store
        .duty(duty_id)
        .await?
        .ok_or(AppError::NotFound("Duty"))?;
    if duty.assignee_id != session.user_id {
        return Err(AppError::forbidden("Only the assignee can answer for this duty"));
    }
    let (duty, _) = persist_escalation(services, duty, session.now).await?;
    Ok(duty)
}

async fn tribunal_duty(services: &Services, session: &Session, duty_id: u64) -> AppResult<Duty> {
    let duty = own_duty(services, session, duty_id).await?;
    if duty.penalty_status != PenaltyStatus::AwaitingTribunal {
        debug!(duty_id, status = %duty.penalty_status, "Not in tribunal");
        return Err(AppError::conflict(match duty.penalty_status {
            PenaltyStatus::Abandoned => "The tribunal window has closed",
            _ => "This duty is not awaiting a tribunal answer",
        }));
    }
    Ok(duty)
}

/* =========================
Tribunal answers
========================= */
pub async fn accept_penalty(
    services: &Services,
    session: &Session,
    duty_id: u64,
) -> AppResult<Outcome<Duty>> {
    let mut duty = tribunal_duty(services, session, duty_id).await?;
    duty.is_penalized = true;
    duty.penalty_status = PenaltyStatus::AcceptedFault;
    services.store.update_duty(&duty).await?;
    info!(duty_id, user_id = session.user_id, "Penalty accepted");

    let mut warnings = Vec::new();
    services
        .award(
            session.user_id,
            GamificationEvent::DutyMissed,
            json!({ "duty_id": duty.id, "title": duty.title }),
            &mut warnings,
        )
        .await;
    Ok(Outcome::new(duty, warnings))
}

/// Late completion. The proof is what makes the redemption valid, so a
/// failed upload fails the call.
pub async fn redeem(
    services: &Services,
    session: &Session,
    duty_id: u64,
    proof: &ProofFile,
) -> AppResult<Outcome<Duty>> {
    let mut duty = tribunal_duty(services, session, duty_id).await?;
    let folder = vec!["duties".to_string(), duty.id.to_string()];
    let url = services
        .proofs
        .upload(proof, &folder)
        .await
        .map_err(|e| AppError::Dependency(format!("Proof upload failed: {}", e)))?;

    duty.is_done = true;
    duty.proof_url = Some(url);
    duty.penalty_status = PenaltyStatus::LateCompleted;
    services.store.update_duty(&duty).await?;
    info!(duty_id, user_id = session.user_id, "Duty redeemed late");

    let mut warnings = Vec::new();
    services
        .award(
            session.user_id,
            GamificationEvent::DutyLateSubmit,
            json!({ "duty_id": duty.id, "title": duty.title }),
            &mut warnings,
        )
        .await;
    Ok(Outcome::new(duty, warnings))
}

pub async fn appeal(
    services: &Services,
    session: &Session,
    duty_id: u64,
    reason: &str,
    proof: Option<&ProofFile>,
) -> AppResult<Outcome<Duty>> {
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(AppError::validation("An appeal needs a reason"));
    }
    let mut duty = tribunal_duty(services, session, duty_id).await?;

    let mut warnings = Vec::new();
    let folder = vec!["appeals".to_string(), duty.id.to_string()];
    duty.appeal_proof_url = services.upload_optional(proof, &folder, &mut warnings).await;
    duty.appeal_reason = Some(reason.to_string());
    duty.penalty_status = PenaltyStatus::UnderReview;
    services.store.update_duty(&duty).await?;
    info!(duty_id, user_id = session.user_id, "Duty appealed");

    Ok(Outcome::new(duty, warnings))
}

/// Clears an abandoned duty from the lock screen. Penalty, done flag and
/// status stay as they are.
pub async fn acknowledge(services: &Services, session: &Session, duty_id: u64) -> AppResult<Duty> {
    let mut duty = own_duty(services, session, duty_id).await?;
    if duty.penalty_status != PenaltyStatus::Abandoned {
        return Err(AppError::conflict("Only abandoned duties can be acknowledged"));
    }
    if duty.cleared_by_system {
        return Ok(duty);
    }

    duty.cleared_by_system = true;
    services.store.update_duty(&duty).await?;
    info!(duty_id, user_id = session.user_id, "Abandoned duty acknowledged");
    Ok(duty)
}
