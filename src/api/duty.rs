use crate::auth::auth::AuthUser;
use crate::collab::ProofFile;
use crate::engine::duty::{self, RotationPlan};
use crate::engine::negligence::{self, NegligenceView};
use crate::error::AppError;
use crate::feed::Table;
use crate::model::duty::{Duty, NewDuty};
use crate::state::AppState;
use actix_web::{HttpResponse, web};
use chrono::{Days, NaiveDate};
use serde::Deserialize;
use serde_json::json;
use utoipa::{IntoParams, ToSchema};

#[derive(Deserialize, IntoParams)]
pub struct BoardQuery {
    /// Defaults to today
    #[param(value_type = Option<String>, format = "date")]
    pub from: Option<NaiveDate>,
    /// Defaults to 14 days after `from`
    #[param(value_type = Option<String>, format = "date")]
    pub to: Option<NaiveDate>,
}

/// Resolves the board window; a missing end defaults to two weeks on.
fn board_range(
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    today: NaiveDate,
) -> Result<(NaiveDate, NaiveDate), AppError> {
    let from = from.unwrap_or(today);
    let to = match to {
        Some(to) => to,
        None => from
            .checked_add_days(Days::new(14))
            .ok_or_else(|| AppError::validation("`from` is too close to the calendar end"))?,
    };
    Ok((from, to))
}

#[derive(Deserialize, ToSchema)]
pub struct ToggleReq {
    pub done: bool,
}

#[derive(Deserialize, ToSchema)]
pub struct AppealReq {
    #[schema(example = "I was sent to the client site that day")]
    pub reason: String,
    pub proof: Option<ProofFile>,
}

/* =========================
Board
========================= */
#[utoipa::path(
    get,
    path = "/api/duties",
    params(BoardQuery),
    responses((status = 200, description = "Duties in range, with escalations applied", body = [Duty])),
    security(("bearer_auth" = [])),
    tag = "Duties"
)]
pub async fn board(
    auth: AuthUser,
    state: web::Data<AppState>,
    query: web::Query<BoardQuery>,
) -> Result<HttpResponse, AppError> {
    let session = auth.session();
    let (from, to) = board_range(query.from, query.to, session.today())?;
    let synced = negligence::sync_duties(&state.services, &session).await?;
    if synced.escalated > 0 {
        state.feed.publish(Table::Duties, Some(auth.user_id));
    }

    let fetched = state
        .generations
        .run(
            (auth.user_id, "duty_board"),
            duty::board(&state.services, from, to),
        )
        .await;

    match fetched {
        Some(duties) => Ok(HttpResponse::Ok().json(duties?)),
        None => Ok(HttpResponse::Ok().json(json!({ "superseded": true }))),
    }
}

#[utoipa::path(
    post,
    path = "/api/duties",
    request_body = NewDuty,
    responses(
        (status = 201, description = "Duty created", body = Duty),
        (status = 403, description = "HR/Admin only"),
        (status = 409, description = "Same duty already assigned that day")
    ),
    security(("bearer_auth" = [])),
    tag = "Duties"
)]
pub async fn create_duty(
    auth: AuthUser,
    state: web::Data<AppState>,
    payload: web::Json<NewDuty>,
) -> Result<HttpResponse, AppError> {
    let duty = duty::create(&state.services, &auth.session(), payload.into_inner()).await?;
    state.feed.publish(Table::Duties, Some(duty.assignee_id));
    Ok(HttpResponse::Created().json(duty))
}

#[utoipa::path(
    post,
    path = "/api/duties/rotation",
    request_body = RotationPlan,
    responses(
        (status = 201, description = "Duties inserted; already existing ones are skipped", body = [Duty]),
        (status = 400, description = "Empty titles or members, or too many days"),
        (status = 403, description = "HR/Admin only")
    ),
    security(("bearer_auth" = [])),
    tag = "Duties"
)]
pub async fn rotation(
    auth: AuthUser,
    state: web::Data<AppState>,
    payload: web::Json<RotationPlan>,
) -> Result<HttpResponse, AppError> {
    let duties = duty::generate_rotation(&state.services, &auth.session(), &payload).await?;
    if !duties.is_empty() {
        state.feed.publish(Table::Duties, None);
    }
    Ok(HttpResponse::Created().json(duties))
}

/* =========================
Completion
========================= */
#[utoipa::path(
    post,
    path = "/api/duties/{id}/complete",
    params(("id" = u64, Path, description = "Duty id")),
    request_body = ProofFile,
    responses(
        (status = 200, description = "Duty done", body = Duty),
        (status = 409, description = "Already done or overdue"),
        (status = 502, description = "Proof could not be stored")
    ),
    security(("bearer_auth" = [])),
    tag = "Duties"
)]
pub async fn complete(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<u64>,
    payload: web::Json<ProofFile>,
) -> Result<HttpResponse, AppError> {
    let outcome = duty::complete(&state.services, &auth.session(), path.into_inner(), &payload)
        .await?;
    state
        .feed
        .publish(Table::Duties, Some(outcome.value.assignee_id));
    Ok(HttpResponse::Ok().json(outcome))
}

#[utoipa::path(
    put,
    path = "/api/duties/{id}/done",
    params(("id" = u64, Path, description = "Duty id")),
    request_body = ToggleReq,
    responses(
        (status = 200, description = "Done flag set", body = Duty),
        (status = 403, description = "Not your duty"),
        (status = 409, description = "Duty is in the negligence process")
    ),
    security(("bearer_auth" = [])),
    tag = "Duties"
)]
pub async fn set_done(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<u64>,
    payload: web::Json<ToggleReq>,
) -> Result<HttpResponse, AppError> {
    let outcome = duty::set_done(
        &state.services,
        &auth.session(),
        path.into_inner(),
        payload.done,
    )
    .await?;
    state
        .feed
        .publish(Table::Duties, Some(outcome.value.assignee_id));
    Ok(HttpResponse::Ok().json(outcome))
}

/* =========================
Negligence
========================= */
#[utoipa::path(
    get,
    path = "/api/duties/neglected",
    responses((status = 200, description = "Blocking and tribunal duties of the caller", body = NegligenceView)),
    security(("bearer_auth" = [])),
    tag = "Negligence"
)]
pub async fn neglected(
    auth: AuthUser,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let view = negligence::neglected(&state.services, &auth.session()).await?;
    if view.escalated > 0 {
        state.feed.publish(Table::Duties, Some(auth.user_id));
    }
    Ok(HttpResponse::Ok().json(view))
}

#[utoipa::path(
    get,
    path = "/api/duties/negligence-history",
    responses((status = 200, description = "Past negligence cases of the caller, newest first", body = [Duty])),
    security(("bearer_auth" = [])),
    tag = "Negligence"
)]
pub async fn negligence_history(
    auth: AuthUser,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let synced = negligence::history(&state.services, &auth.session()).await?;
    if synced.escalated > 0 {
        state.feed.publish(Table::Duties, Some(auth.user_id));
    }
    Ok(HttpResponse::Ok().json(synced.duties))
}

#[utoipa::path(
    post,
    path = "/api/duties/{id}/accept-penalty",
    params(("id" = u64, Path, description = "Duty id")),
    responses(
        (status = 200, description = "Fault accepted", body = Duty),
        (status = 403, description = "Not your duty"),
        (status = 409, description = "Duty is not awaiting tribunal")
    ),
    security(("bearer_auth" = [])),
    tag = "Negligence"
)]
pub async fn accept_penalty(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    let outcome =
        negligence::accept_penalty(&state.services, &auth.session(), path.into_inner()).await?;
    state.feed.publish(Table::Duties, Some(auth.user_id));
    Ok(HttpResponse::Ok().json(outcome))
}

#[utoipa::path(
    post,
    path = "/api/duties/{id}/redeem",
    params(("id" = u64, Path, description = "Duty id")),
    request_body = ProofFile,
    responses(
        (status = 200, description = "Completed late", body = Duty),
        (status = 403, description = "Not your duty"),
        (status = 409, description = "Duty is not awaiting tribunal"),
        (status = 502, description = "Proof could not be stored")
    ),
    security(("bearer_auth" = [])),
    tag = "Negligence"
)]
pub async fn redeem(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<u64>,
    payload: web::Json<ProofFile>,
) -> Result<HttpResponse, AppError> {
    let outcome =
        negligence::redeem(&state.services, &auth.session(), path.into_inner(), &payload).await?;
    state.feed.publish(Table::Duties, Some(auth.user_id));
    Ok(HttpResponse::Ok().json(outcome))
}

#[utoipa::path(
    post,
    path = "/api/duties/{id}/appeal",
    params(("id" = u64, Path, description = "Duty id")),
    request_body = AppealReq,
    responses(
        (status = 200, description = "Appeal under review", body = Duty),
        (status = 400, description = "Missing reason"),
        (status = 403, description = "Not your duty"),
        (status = 409, description = "Duty is not awaiting tribunal")
    ),
    security(("bearer_auth" = [])),
    tag = "Negligence"
)]
pub async fn appeal(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<u64>,
    payload: web::Json<AppealReq>,
) -> Result<HttpResponse, AppError> {
    let outcome = negligence::appeal(
        &state.services,
        &auth.session(),
        path.into_inner(),
        &payload.reason,
        payload.proof.as_ref(),
    )
    .await?;
    state.feed.publish(Table::Duties, Some(auth.user_id));
    Ok(HttpResponse::Ok().json(outcome))
}

#[utoipa::path(
    post,
    path = "/api/duties/{id}/acknowledge",
    params(("id" = u64, Path, description = "Duty id")),
    responses(
        (status = 200, description = "Lock screen cleared", body = Duty),
        (status = 403, description = "Not your duty"),
        (status = 409, description = "Duty is not abandoned")
    ),
    security(("bearer_auth" = [])),
    tag = "Negligence"
)]
pub async fn acknowledge(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    let duty = negligence::acknowledge(&state.services, &auth.session(), path.into_inner()).await?;
    state.feed.publish(Table::Duties, Some(auth.user_id));
    Ok(HttpResponse::Ok().json(duty))
}
