use crate::auth::auth::AuthUser;
use crate::engine::leave::{self, LeaveSubmission, QuotaView};
use crate::error::AppError;
use crate::feed::Table;
use crate::model::leave_request::{LeaveQuery, LeaveRequest, LeaveStatus, LeaveType};
use crate::state::AppState;
use actix_web::{HttpResponse, web};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;
use utoipa::{IntoParams, ToSchema};

#[derive(Deserialize, IntoParams)]
pub struct LeaveFilter {
    /// Filter by user (approvers only; employees always see their own)
    pub user_id: Option<u64>,
    pub leave_type: Option<LeaveType>,
    pub status: Option<LeaveStatus>,
    /// Requests ending on or after this date
    #[param(value_type = Option<String>, format = "date")]
    pub from: Option<NaiveDate>,
    /// Requests starting on or before this date
    #[param(value_type = Option<String>, format = "date")]
    pub to: Option<NaiveDate>,
}

#[derive(Deserialize, ToSchema)]
pub struct RejectReq {
    #[schema(example = "Team is short-staffed that week")]
    pub reason: String,
}

#[derive(Deserialize, IntoParams)]
pub struct UsageQuery {
    /// Defaults to the caller
    pub user_id: Option<u64>,
}

/* =========================
Create leave request
========================= */
#[utoipa::path(
    post,
    path = "/api/leave",
    request_body(
        content = LeaveSubmission,
        description = "Leave, overtime or correction request",
        content_type = "application/json"
    ),
    responses(
        (status = 200, description = "Request submitted as pending; `warnings` may flag an over-quota request", body = LeaveRequest),
        (status = 400, description = "Invalid request shape"),
        (status = 409, description = "Duplicate request", body = Object, example = json!({
            "error": "already_pending",
            "message": "A pending request for this date already exists"
        }))
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn create_leave(
    auth: AuthUser,
    state: web::Data<AppState>,
    payload: web::Json<LeaveSubmission>,
) -> Result<HttpResponse, AppError> {
    let outcome = leave::submit(&state.services, &auth.session(), payload.into_inner()).await?;
    state.feed.publish(Table::LeaveRequests, Some(auth.user_id));
    Ok(HttpResponse::Ok().json(outcome))
}

/* =========================
Approve / reject
========================= */
#[utoipa::path(
    put,
    path = "/api/leave/{id}/approve",
    params(("id" = u64, Path, description = "Leave request id")),
    responses(
        (status = 200, description = "Approved; attendance updated", body = LeaveRequest),
        (status = 403, description = "HR/Admin only"),
        (status = 404, description = "Leave request not found"),
        (status = 409, description = "Already decided, or the correction conflicts with attendance")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn approve_leave(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    let outcome = leave::approve(&state.services, &auth.session(), path.into_inner()).await?;
    state
        .feed
        .publish(Table::LeaveRequests, Some(outcome.value.user_id));
    state
        .feed
        .publish(Table::AttendanceLogs, Some(outcome.value.user_id));
    Ok(HttpResponse::Ok().json(outcome))
}

#[utoipa::path(
    put,
    path = "/api/leave/{id}/reject",
    params(("id" = u64, Path, description = "Leave request id")),
    request_body = RejectReq,
    responses(
        (status = 200, description = "Rejected", body = LeaveRequest),
        (status = 400, description = "Missing reason"),
        (status = 403, description = "HR/Admin only"),
        (status = 404, description = "Leave request not found"),
        (status = 409, description = "Already decided")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn reject_leave(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<u64>,
    payload: web::Json<RejectReq>,
) -> Result<HttpResponse, AppError> {
    let outcome = leave::reject(
        &state.services,
        &auth.session(),
        path.into_inner(),
        &payload.reason,
    )
    .await?;
    state
        .feed
        .publish(Table::LeaveRequests, Some(outcome.value.user_id));
    Ok(HttpResponse::Ok().json(outcome))
}

/* =========================
Get / list
========================= */
#[utoipa::path(
    get,
    path = "/api/leave/{id}",
    params(("id" = u64, Path, description = "Leave request id")),
    responses(
        (status = 200, description = "Leave request", body = LeaveRequest),
        (status = 403, description = "Not your record"),
        (status = 404, description = "Leave request not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn get_leave(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    let request = leave::get(&state.services, &auth.session(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(request))
}

/// Newest first. A newer listing by the same user supersedes a running one.
#[utoipa::path(
    get,
    path = "/api/leave",
    params(LeaveFilter),
    responses((status = 200, description = "Matching requests", body = [LeaveRequest])),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn leave_list(
    auth: AuthUser,
    state: web::Data<AppState>,
    filter: web::Query<LeaveFilter>,
) -> Result<HttpResponse, AppError> {
    let filter = filter.into_inner();
    let query = LeaveQuery {
        user_id: filter.user_id,
        leave_type: filter.leave_type,
        status: filter.status,
        start_date: None,
        from: filter.from,
        to: filter.to,
    };
    let session = auth.session();

    let fetched = state
        .generations
        .run(
            (auth.user_id, "leave_list"),
            leave::list(&state.services, &session, query),
        )
        .await;

    match fetched {
        Some(requests) => Ok(HttpResponse::Ok().json(requests?)),
        None => Ok(HttpResponse::Ok().json(json!({ "superseded": true }))),
    }
}

#[utoipa::path(
    get,
    path = "/api/leave/usage",
    params(UsageQuery),
    responses(
        (status = 200, description = "Used, allowance and remaining per leave type for the current year", body = QuotaView),
        (status = 403, description = "Not your record")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn usage(
    auth: AuthUser,
    state: web::Data<AppState>,
    query: web::Query<UsageQuery>,
) -> Result<HttpResponse, AppError> {
    let view = leave::usage(&state.services, &auth.session(), query.user_id).await?;
    Ok(HttpResponse::Ok().json(view))
}
