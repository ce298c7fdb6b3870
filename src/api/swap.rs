use crate::auth::auth::AuthUser;
use crate::engine::swap;
use crate::error::AppError;
use crate::feed::Table;
use crate::model::duty_swap::{DutySwap, SwapStatus};
use crate::state::AppState;
use actix_web::{HttpResponse, web};
use serde::Deserialize;
use utoipa::ToSchema;

#[derive(Deserialize, ToSchema)]
pub struct ProposeReq {
    /// Caller's duty to give away
    #[schema(example = 12)]
    pub own_duty_id: u64,
    /// Colleague's duty to take over
    #[schema(example = 15)]
    pub target_duty_id: u64,
}

#[derive(Deserialize, ToSchema)]
pub struct RespondReq {
    pub accept: bool,
}

#[utoipa::path(
    post,
    path = "/api/swaps",
    request_body = ProposeReq,
    responses(
        (status = 201, description = "Swap proposed", body = DutySwap),
        (status = 400, description = "Same assignee, or a duty in the past"),
        (status = 403, description = "Own duty is not the caller's"),
        (status = 404, description = "Duty not found"),
        (status = 409, description = "A duty is already done")
    ),
    security(("bearer_auth" = [])),
    tag = "Swaps"
)]
pub async fn propose(
    auth: AuthUser,
    state: web::Data<AppState>,
    payload: web::Json<ProposeReq>,
) -> Result<HttpResponse, AppError> {
    let outcome = swap::propose(
        &state.services,
        &auth.session(),
        payload.own_duty_id,
        payload.target_duty_id,
    )
    .await?;
    state
        .feed
        .publish(Table::DutySwaps, Some(outcome.value.target_user_id));
    Ok(HttpResponse::Created().json(outcome))
}

/// Only the target user may answer. Accepting exchanges the two assignees
/// atomically, provided neither duty changed hands since the proposal.
#[utoipa::path(
    put,
    path = "/api/swaps/{id}",
    params(("id" = u64, Path, description = "Swap id")),
    request_body = RespondReq,
    responses(
        (status = 200, description = "Swap decided", body = DutySwap),
        (status = 403, description = "Not the target of this swap"),
        (status = 404, description = "Swap not found"),
        (status = 409, description = "Already decided, or a duty changed since the proposal")
    ),
    security(("bearer_auth" = [])),
    tag = "Swaps"
)]
pub async fn respond(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<u64>,
    payload: web::Json<RespondReq>,
) -> Result<HttpResponse, AppError> {
    let outcome = swap::respond(
        &state.services,
        &auth.session(),
        path.into_inner(),
        payload.accept,
    )
    .await?;
    state
        .feed
        .publish(Table::DutySwaps, Some(outcome.value.requestor_id));
    if outcome.value.status == SwapStatus::Approved {
        state.feed.publish(Table::Duties, None);
    }
    Ok(HttpResponse::Ok().json(outcome))
}

#[utoipa::path(
    get,
    path = "/api/swaps",
    responses((status = 200, description = "Swaps the caller proposed or received, newest first", body = [DutySwap])),
    security(("bearer_auth" = [])),
    tag = "Swaps"
)]
pub async fn list(auth: AuthUser, state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let swaps = swap::list(&state.services, &auth.session()).await?;
    Ok(HttpResponse::Ok().json(swaps))
}
