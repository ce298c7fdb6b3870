//! Duty board: creation, rotation, completion and the done toggle.

use chrono::{Datelike, Days, NaiveDate, Weekday};
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use utoipa::ToSchema;

use super::{Outcome, Services};
use crate::collab::{GamificationEvent, ProofFile};
use crate::context::Session;
use crate::error::{AppError, AppResult};
use crate::model::duty::{Duty, NewDuty, PenaltyStatus};

const MAX_ROTATION_DAYS: u32 = 366;

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RotationPlan {
    #[schema(example = json!(["Kitchen cleanup", "Plant watering"]))]
    pub titles: Vec<String>,
    /// User ids in rotation order.
    #[schema(example = json!([3, 5, 8]))]
    pub members: Vec<u64>,
    #[schema(example = "2026-01-05", value_type = String, format = "date")]
    pub start_date: NaiveDate,
    #[schema(example = 14)]
    pub days: u32,
    #[serde(default)]
    pub skip_weekends: bool,
}

fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Round-robin assignment: the n-th working day hands title j to member
/// `(n * titles + j) % members`, so every member cycles through every title.
pub fn plan_rotation(plan: &RotationPlan) -> AppResult<Vec<NewDuty>> {
    let titles: Vec<&str> = plan
        .titles
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .collect();
    if titles.is_empty() || plan.members.is_empty() {
        return Err(AppError::validation("A rotation needs titles and members"));
    }
    if plan.days == 0 || plan.days > MAX_ROTATION_DAYS {
        return Err(AppError::validation(format!(
            "A rotation covers 1 to {} days",
            MAX_ROTATION_DAYS
        )));
    }

    let dates = (0..u64::from(plan.days))
        .map(|offset| plan.start_date.checked_add_days(Days::new(offset)))
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| AppError::validation("The rotation runs past the calendar end"))?;

    let mut duties = Vec::new();
    let working_days = dates
        .into_iter()
        .filter(|d| !(plan.skip_weekends && is_weekend(*d)));
    for (n, date) in working_days.enumerate() {
        for (j, title) in titles.iter().enumerate() {
            duties.push(NewDuty {
                title: title.to_string(),
                assignee_id: plan.members[(n * titles.len() + j) % plan.members.len()],
                date,
            });
        }
    }
    Ok(duties)
}

pub async fn generate_rotation(
    services: &Services,
    session: &Session,
    plan: &RotationPlan,
) -> AppResult<Vec<Duty>> {
    session.require_approver()?;
    let planned = plan_rotation(plan)?;
    let inserted = services.store.insert_duties(&planned).await?;
    info!(
        planned = planned.len(),
        inserted = inserted.len(),
        start = %plan.start_date,
        "Rotation generated"
    );
    Ok(inserted)
}

pub async fn create(services: &Services, session: &Session, duty: NewDuty) -> AppResult<Duty> {
    session.require_approver()?;
    let title = duty.title.trim().to_string();
    if title.is_empty() {
        return Err(AppError::validation("A duty needs a title"));
    }

    let created = services
        .store
        .insert_duties(&[NewDuty { title, ..duty }])
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| AppError::conflict("That duty is already assigned for the day"))?;
    info!(duty_id = created.id, user_id = created.assignee_id, date = %created.date, "Duty created");
    Ok(created)
}

/// Team board for a date range.
pub async fn board(
    services: &Services,
    from: NaiveDate,
    to: NaiveDate,
) -> AppResult<Vec<Duty>> {
    if from > to {
        return Err(AppError::validation("`from` cannot be after `to`"));
    }
    services.store.duties_between(from, to).await
}

async fn load(services: &Services, duty_id: u64) -> AppResult<Duty> {
    services
        .store
        .duty(duty_id)
        .await?
        .ok_or(AppError::NotFound("Duty"))
}

/// Completion with proof, on time. Completing another member's duty scores
/// an assist for the helper.
pub async fn complete(
    services: &Services,
    session: &Session,
    duty_id: u64,
    proof: &ProofFile,
) -> AppResult<Outcome<Duty>> {
    let mut duty = load(services, duty_id).await?;
    if duty.is_done {
        return Err(AppError::conflict("Duty is already done"));
    }
    if duty.date < session.today() {
        return Err(AppError::conflict(
            "This duty is overdue; answer it through the tribunal instead",
        ));
    }

    let folder = vec!["duties".to_string(), duty.id.to_string()];
    let url = services
        .proofs
        .upload(proof, &folder)
        .await
        .map_err(|e| AppError::Dependency(format!("Proof upload failed: {}", e)))?;

    duty.is_done = true;
    duty.proof_url = Some(url);
    duty.completion_scored = true;
    services.store.update_duty(&duty).await?;

    let assist = duty.assignee_id != session.user_id;
    info!(duty_id, user_id = session.user_id, assignee_id = duty.assignee_id, assist, "Duty completed");

    let mut warnings = Vec::new();
    let event = if assist {
        GamificationEvent::DutyAssist
    } else {
        GamificationEvent::DutyComplete
    };
    services
        .award(
            session.user_id,
            event,
            json!({ "duty_id": duty.id, "title": duty.title, "assignee_id": duty.assignee_id }),
            &mut warnings,
        )
        .await;
    Ok(Outcome::new(duty, warnings))
}

/// Manual done toggle. Duties inside the negligence protocol are answered
/// through the tribunal, not toggled.
pub async fn set_done(
    services: &Services,
    session: &Session,
    duty_id: u64,
    done: bool,
) -> AppResult<Outcome<Duty>> {
    let mut duty = load(services, duty_id).await?;
    session.require_self_or_approver(duty.assignee_id)?;
    if duty.penalty_status != PenaltyStatus::None {
        return Err(AppError::conflict(format!(
            "Duty is {} and cannot be toggled",
            duty.penalty_status
        )));
    }
    if duty.is_done == done {
        return Ok(Outcome::new(duty, Vec::new()));
    }

    let score = done && !duty.completion_scored;
    duty.is_done = done;
    duty.completion_scored |= score;
    services.store.update_duty(&duty).await?;
    info!(duty_id, user_id = session.user_id, done, "Duty toggled");

    let mut warnings = Vec::new();
    if score {
        services
            .award(
                duty.assignee_id,
                GamificationEvent::DutyComplete,
                json!({ "duty_id": duty.id, "title": duty.title }),
                &mut warnings,
            )
            .await;
    }
    Ok(Outcome::new(duty, warnings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::testing::proof;
    use crate::engine::testing::{at, date, employee, harness, hr};

    fn plan(days: u32, skip_weekends: bool) -> RotationPlan {
        RotationPlan {
            titles: vec!["Kitchen".into(), "Plants".into()],
            members: vec![1, 2, 3],
            // a Friday
            start_date: date(2026, 5, 8),
            days,
            skip_weekends,
        }
    }

    #[test]
    fn rotation_cycles_members_through_titles() {
        let duties = plan_rotation(&plan(3, false)).unwrap();
        let assigned: Vec<(NaiveDate, &str, u64)> = duties
            .iter()
            .map(|d| (d.date, d.title.as_str(), d.assignee_id))
            .collect();
        assert_eq!(
            assigned,
            vec![
                (date(2026, 5, 8), "Kitchen", 1),
                (date(2026, 5, 8), "Plants", 2),
                (date(2026, 5, 9), "Kitchen", 3),
                (date(2026, 5, 9), "Plants", 1),
                (date(2026, 5, 10), "Kitchen", 2),
                (date(2026, 5, 10), "Plants", 3),
            ]
        );
    }

    #[test]
    fn rotation_can_skip_weekends() {
        let duties = plan_rotation(&plan(4, true)).unwrap();
        let dates: Vec<NaiveDate> = duties.iter().map(|d| d.date).collect();
        assert_eq!(
            dates,
            vec![date(2026, 5, 8), date(2026, 5, 8), date(2026, 5, 11), date(2026, 5, 11)]
        );
        // monday continues the cycle where friday stopped
        assert_eq!(duties[2].assignee_id, 3);
    }

    #[test]
    fn rotation_rejects_empty_plans() {
        let mut p = plan(3, false);
        p.members.clear();
        assert!(plan_rotation(&p).is_err());
        assert!(plan_rotation(&plan(0, false)).is_err());
    }

    #[test]
    fn rotation_past_the_calendar_end_is_refused() {
        let p = RotationPlan {
            start_date: NaiveDate::MAX,
            ..plan(2, false)
        };
        let err = plan_rotation(&p).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let last_day = RotationPlan {
            start_date: NaiveDate::MAX,
            ..plan(1, false)
        };
        assert_eq!(plan_rotation(&last_day).unwrap().len(), 2);
    }

    #[actix_web::test]
    async fn generating_twice_does_not_duplicate() {
        let h = harness();
        let boss = hr(at(2026, 5, 7, 9, 0));

        let first = generate_rotation(&h.services, &boss, &plan(2, false)).await.unwrap();
        assert_eq!(first.len(), 4);
        let second = generate_rotation(&h.services, &boss, &plan(3, false)).await.unwrap();
        assert_eq!(second.len(), 2);

        let err = generate_rotation(&h.services, &employee(1, at(2026, 5, 7, 9, 0)), &plan(1, false))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[actix_web::test]
    async fn manual_duplicate_is_a_conflict() {
        let h = harness();
        let boss = hr(at(2026, 5, 7, 9, 0));
        let duty = NewDuty {
            title: "Trash".into(),
            assignee_id: 4,
            date: date(2026, 5, 8),
        };
        create(&h.services, &boss, duty.clone()).await.unwrap();
        let err = create(&h.services, &boss, duty).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[actix_web::test]
    async fn completing_someone_elses_duty_is_an_assist() {
        let h = harness();
        let boss = hr(at(2026, 5, 7, 9, 0));
        let mine = create(&h.services, &boss, NewDuty { title: "Trash".into(), assignee_id: 1, date: date(2026, 5, 8) })
            .await
            .unwrap();
        let theirs = create(&h.services, &boss, NewDuty { title: "Trash".into(), assignee_id: 2, date: date(2026, 5, 8) })
            .await
            .unwrap();

        let me = employee(1, at(2026, 5, 8, 10, 0));
        let done = complete(&h.services, &me, mine.id, &proof("a.jpg")).await.unwrap();
        assert!(done.value.is_done);
        complete(&h.services, &me, theirs.id, &proof("b.jpg")).await.unwrap();

        let events = h.gamification.events.lock().unwrap();
        assert_eq!(
            events.iter().map(|e| (e.0, e.1)).collect::<Vec<_>>(),
            vec![
                (1, GamificationEvent::DutyComplete),
                (1, GamificationEvent::DutyAssist),
            ]
        );
    }

    #[actix_web::test]
    async fn overdue_duty_cannot_be_completed_normally() {
        let h = harness();
        let duty = create(
            &h.services,
            &hr(at(2026, 5, 7, 9, 0)),
            NewDuty { title: "Trash".into(), assignee_id: 1, date: date(2026, 5, 8) },
        )
        .await
        .unwrap();

        let err = complete(&h.services, &employee(1, at(2026, 5, 9, 9, 0)), duty.id, &proof("a.jpg"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[actix_web::test]
    async fn toggle_round_trip_scores_once() {
        let h = harness();
        let duty = create(
            &h.services,
            &hr(at(2026, 5, 7, 9, 0)),
            NewDuty { title: "Trash".into(), assignee_id: 1, date: date(2026, 5, 8) },
        )
        .await
        .unwrap();
        let me = employee(1, at(2026, 5, 8, 9, 0));

        assert!(set_done(&h.services, &me, duty.id, true).await.unwrap().value.is_done);
        assert!(!set_done(&h.services, &me, duty.id, false).await.unwrap().value.is_done);
        assert!(!set_done(&h.services, &me, duty.id, false).await.unwrap().value.is_done);
        assert_eq!(h.gamification.kinds(), vec![GamificationEvent::DutyComplete]);

        // flipping it back on does not score the same duty again
        for _ in 0..3 {
            assert!(set_done(&h.services, &me, duty.id, true).await.unwrap().value.is_done);
            assert!(!set_done(&h.services, &me, duty.id, false).await.unwrap().value.is_done);
        }
        assert_eq!(h.gamification.kinds(), vec![GamificationEvent::DutyComplete]);

        let err = set_done(&h.services, &employee(2, at(2026, 5, 8, 9, 0)), duty.id, true)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[actix_web::test]
    async fn toggling_a_proven_duty_does_not_score_again() {
        let h = harness();
        let duty = create(
            &h.services,
            &hr(at(2026, 5, 7, 9, 0)),
            NewDuty { title: "Trash".into(), assignee_id: 1, date: date(2026, 5, 8) },
        )
        .await
        .unwrap();
        let me = employee(1, at(2026, 5, 8, 10, 0));

        complete(&h.services, &me, duty.id, &proof("a.jpg")).await.unwrap();
        set_done(&h.services, &me, duty.id, false).await.unwrap();
        let again = set_done(&h.services, &me, duty.id, true).await.unwrap();
        assert!(again.value.is_done);
        assert!(again.warnings.is_empty());
        assert_eq!(h.gamification.kinds(), vec![GamificationEvent::DutyComplete]);
    }
}
