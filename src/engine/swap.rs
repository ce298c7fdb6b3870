//! Peer-to-peer duty swaps. Ownership changes only when the target accepts,
//! and then both assignees move in one store call.

use tracing::{debug, info};

use super::{Outcome, Services};
use crate::context::Session;
use crate::error::{AppError, AppResult};
use crate::model::duty::Duty;
use crate::model::duty_swap::{AssigneeClaim, DutySwap, NewDutySwap, SwapStatus};

async fn load(services: &Services, duty_id: u64) -> AppResult<Duty> {
    services
        .store
        .duty(duty_id)
        .await?
        .ok_or(AppError::NotFound("Duty"))
}

fn swappable(duty: &Duty, session: &Session) -> AppResult<()> {
    if duty.is_done {
        return Err(AppError::conflict(format!("Duty #{} is already done", duty.id)));
    }
    if duty.date < session.today() {
        return Err(AppError::validation(format!("Duty #{} is in the past", duty.id)));
    }
    Ok(())
}

pub async fn propose(
    services: &Services,
    session: &Session,
    own_duty_id: u64,
    target_duty_id: u64,
) -> AppResult<Outcome<DutySwap>> {
    let own = load(services, own_duty_id).await?;
    let target = load(services, target_duty_id).await?;

    if own.assignee_id != session.user_id {
        return Err(AppError::forbidden("You can only offer your own duty"));
    }
    if own.assignee_id == target.assignee_id {
        return Err(AppError::validation("Both duties belong to the same person"));
    }
    swappable(&own, session)?;
    swappable(&target, session)?;

    let swap = services
        .store
        .insert_swap(&NewDutySwap {
            requestor_id: session.user_id,
            own_duty_id,
            target_duty_id,
            target_user_id: target.assignee_id,
            created_at: session.now,
        })
        .await?;
    info!(swap_id = swap.id, user_id = session.user_id, target_user_id = swap.target_user_id, "Swap proposed");

    let mut warnings = Vec::new();
    services
        .notify(
            target.assignee_id,
            "Duty swap request",
            &format!(
                "User #{} offers \"{}\" on {} for your \"{}\" on {}",
                session.user_id, own.title, own.date, target.title, target.date
            ),
            &format!("/swaps/{}", swap.id),
            &mut warnings,
        )
        .await;
    Ok(Outcome::new(swap, warnings))
}

pub async fn respond(
    services: &Services,
    session: &Session,
    swap_id: u64,
    accept: bool,
) -> AppResult<Outcome<DutySwap>> {
    let swap = services
        .store
        .swap(swap_id)
        .await?
        .ok_or(AppError::NotFound("Swap"))?;
    if swap.target_user_id != session.user_id {
        return Err(AppError::forbidden("Only the asked member can answer"));
    }
    if swap.status != SwapStatus::Pending {
        return Err(AppError::conflict(format!("Swap is already {}", swap.status)));
    }

    let mut warnings = Vec::new();
    if !accept {
        let rejected = services.store.reject_swap(swap_id).await?;
        info!(swap_id, user_id = session.user_id, "Swap rejected");
        services
            .notify(
                rejected.requestor_id,
                "Swap declined",
                &format!("User #{} declined your swap", session.user_id),
                &format!("/swaps/{}", swap_id),
                &mut warnings,
            )
            .await;
        return Ok(Outcome::new(rejected, warnings));
    }

    // current state, not what the proposal saw
    let own = load(services, swap.own_duty_id).await?;
    let target = load(services, swap.target_duty_id).await?;
    if own.assignee_id != swap.requestor_id || target.assignee_id != swap.target_user_id {
        debug!(swap_id, "Swap is stale");
        return Err(AppError::conflict("Duties changed hands since the proposal"));
    }
    swappable(&own, session)?;
    swappable(&target, session)?;

    let approved = services
        .store
        .approve_swap(
            swap_id,
            AssigneeClaim {
                duty_id: own.id,
                expected_assignee: swap.requestor_id,
            },
            AssigneeClaim {
                duty_id: target.id,
                expected_assignee: swap.target_user_id,
            },
        )
        .await?;
    info!(swap_id, own_duty_id = own.id, target_duty_id = target.id, "Swap approved");

    services
        .notify(
            approved.requestor_id,
            "Swap accepted",
            &format!("You now have \"{}\" on {}", target.title, target.date),
            &format!("/swaps/{}", swap_id),
            &mut warnings,
        )
        .await;
    Ok(Outcome::new(approved, warnings))
}

pub async fn list(services: &Services, session: &Session) -> AppResult<Vec<DutySwap>> {
    services.store.swaps_for(session.user_id).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::{Harness, at, date, employee, harness};
    use crate::model::duty::NewDuty;
    use crate::store::Store;

    async fn two_duties(h: &Harness) -> (Duty, Duty) {
        let mut duties = h
            .store
            .insert_duties(&[
                NewDuty {
                    title: "Kitchen".into(),
                    assignee_id: 1,
                    date: date(2026, 6, 2),
                },
                NewDuty {
                    title: "Plants".into(),
                    assignee_id: 2,
                    date: date(2026, 6, 3),
                },
            ])
            .await
            .unwrap();
        let b = duties.remove(1);
        (duties.remove(0), b)
    }

    #[actix_web::test]
    async fn accepting_exchanges_the_assignees() {
        let h = harness();
        let (a, b) = two_duties(&h).await;
        let alice = employee(1, at(2026, 6, 1, 9, 0));
        let bob = employee(2, at(2026, 6, 1, 10, 0));

        let swap = propose(&h.services, &alice, a.id, b.id).await.unwrap().value;
        assert_eq!(swap.status, SwapStatus::Pending);
        assert_eq!(h.notifier.recipients(), vec![Some(2)]);

        let err = respond(&h.services, &alice, swap.id, true).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let done = respond(&h.services, &bob, swap.id, true).await.unwrap().value;
        assert_eq!(done.status, SwapStatus::Approved);
        assert_eq!(h.store.duty(a.id).await.unwrap().unwrap().assignee_id, 2);
        assert_eq!(h.store.duty(b.id).await.unwrap().unwrap().assignee_id, 1);
        assert_eq!(h.notifier.recipients(), vec![Some(2), Some(1)]);

        let err = respond(&h.services, &bob, swap.id, true).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[actix_web::test]
    async fn rejecting_leaves_the_duties_alone() {
        let h = harness();
        let (a, b) = two_duties(&h).await;
        let swap = propose(&h.services, &employee(1, at(2026, 6, 1, 9, 0)), a.id, b.id)
            .await
            .unwrap()
            .value;

        let rejected = respond(&h.services, &employee(2, at(2026, 6, 1, 10, 0)), swap.id, false)
            .await
            .unwrap()
            .value;
        assert_eq!(rejected.status, SwapStatus::Rejected);
        assert_eq!(h.store.duty(a.id).await.unwrap().unwrap().assignee_id, 1);
        assert_eq!(h.store.duty(b.id).await.unwrap().unwrap().assignee_id, 2);
    }

    #[actix_web::test]
    async fn proposal_rules() {
        let h = harness();
        let (a, b) = two_duties(&h).await;

        let err = propose(&h.services, &employee(3, at(2026, 6, 1, 9, 0)), a.id, b.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let err = propose(&h.services, &employee(1, at(2026, 6, 3, 9, 0)), a.id, b.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let mut done = b.clone();
        done.is_done = true;
        h.store.update_duty(&done).await.unwrap();
        let err = propose(&h.services, &employee(1, at(2026, 6, 1, 9, 0)), a.id, b.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[actix_web::test]
    async fn stale_proposal_cannot_be_accepted() {
        let h = harness();
        let (a, b) = two_duties(&h).await;
        let c = h
            .store
            .insert_duties(&[NewDuty {
                title: "Trash".into(),
                assignee_id: 3,
                date: date(2026, 6, 4),
            }])
            .await
            .unwrap()
            .remove(0);

        let alice = employee(1, at(2026, 6, 1, 9, 0));
        let first = propose(&h.services, &alice, a.id, b.id).await.unwrap().value;
        let second = propose(&h.services, &alice, a.id, c.id).await.unwrap().value;

        respond(&h.services, &employee(3, at(2026, 6, 1, 10, 0)), second.id, true)
            .await
            .unwrap();
        // alice no longer holds duty a
        let err = respond(&h.services, &employee(2, at(2026, 6, 1, 11, 0)), first.id, true)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(h.store.duty(b.id).await.unwrap().unwrap().assignee_id, 2);

        let listed = list(&h.services, &alice).await.unwrap();
        assert_eq!(listed.len(), 2);
    }
}
