use crate::auth::auth::AuthUser;
use crate::engine::attendance::{self, CheckInInput, CheckOutReceipt, DayView};
use crate::error::AppError;
use crate::feed::Table;
use crate::model::attendance::AttendanceDay;
use crate::model::location_zone::LocationZone;
use crate::state::AppState;
use actix_web::{HttpResponse, web};
use chrono::{Days, NaiveDate, NaiveDateTime};
use serde::Deserialize;
use serde_json::json;
use utoipa::{IntoParams, ToSchema};

#[derive(Deserialize, ToSchema)]
pub struct CheckOutReq {
    /// Mandatory when leaving before the minimum hours.
    #[schema(example = "Doctor appointment")]
    pub reason: Option<String>,
}

#[derive(Deserialize, IntoParams)]
pub struct HistoryQuery {
    /// Defaults to the caller; approvers may pass anyone
    pub user_id: Option<u64>,
    /// Defaults to 30 days before `to`
    #[param(value_type = Option<String>, format = "date")]
    pub from: Option<NaiveDate>,
    /// Defaults to today
    #[param(value_type = Option<String>, format = "date")]
    pub to: Option<NaiveDate>,
}

/// Resolves the history window; a missing start defaults to 30 days back.
fn history_range(
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    today: NaiveDate,
) -> Result<(NaiveDate, NaiveDate), AppError> {
    let to = to.unwrap_or(today);
    let from = match from {
        Some(from) => from,
        None => to
            .checked_sub_days(Days::new(30))
            .ok_or_else(|| AppError::validation("`to` is too close to the calendar start"))?,
    };
    Ok((from, to))
}

#[derive(Deserialize, ToSchema)]
pub struct OverrideCheckOut {
    #[schema(example = "2026-01-05T18:00:00", value_type = String, format = "date-time")]
    pub check_out: NaiveDateTime,
}

/* =========================
Check-in / check-out
========================= */
#[utoipa::path(
    post,
    path = "/api/attendance/check-in",
    request_body = CheckInInput,
    responses(
        (status = 200, description = "Checked in; `warnings` lists non-fatal problems", body = AttendanceDay),
        (status = 400, description = "Outside geofence, missing coordinates or proof"),
        (status = 409, description = "Already checked in, on leave, or an earlier session is still open"),
        (status = 502, description = "Mandatory proof could not be stored")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn check_in(
    auth: AuthUser,
    state: web::Data<AppState>,
    payload: web::Json<CheckInInput>,
) -> Result<HttpResponse, AppError> {
    let outcome =
        attendance::check_in(&state.services, &auth.session(), payload.into_inner()).await?;
    state.feed.publish(Table::AttendanceLogs, Some(auth.user_id));
    Ok(HttpResponse::Ok().json(outcome))
}

#[utoipa::path(
    post,
    path = "/api/attendance/check-out",
    request_body = CheckOutReq,
    responses(
        (status = 200, description = "Checked out", body = CheckOutReceipt),
        (status = 400, description = "Early leave without a reason", body = Object, example = json!({
            "error": "early_leave_reason_required",
            "message": "Leaving 45 minutes early requires a reason",
            "missing_minutes": 45
        })),
        (status = 409, description = "No open session, or the session is outdated")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn check_out(
    auth: AuthUser,
    state: web::Data<AppState>,
    payload: web::Json<CheckOutReq>,
) -> Result<HttpResponse, AppError> {
    let outcome =
        attendance::check_out(&state.services, &auth.session(), payload.into_inner().reason)
            .await?;
    state.feed.publish(Table::AttendanceLogs, Some(auth.user_id));
    Ok(HttpResponse::Ok().json(outcome))
}

/* =========================
Views
========================= */
#[utoipa::path(
    get,
    path = "/api/attendance/today",
    responses((status = 200, description = "Derived status of the caller's day", body = DayView)),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn today(auth: AuthUser, state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let view = attendance::day_status(&state.services, &auth.session()).await?;
    Ok(HttpResponse::Ok().json(view))
}

/// A newer request from the same user supersedes a running one; the older
/// response then carries `superseded: true` instead of data.
#[utoipa::path(
    get,
    path = "/api/attendance/history",
    params(HistoryQuery),
    responses(
        (status = 200, description = "Days in range, newest first", body = [AttendanceDay]),
        (status = 403, description = "Not your record")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn history(
    auth: AuthUser,
    state: web::Data<AppState>,
    query: web::Query<HistoryQuery>,
) -> Result<HttpResponse, AppError> {
    let session = auth.session();
    let (from, to) = history_range(query.from, query.to, session.today())?;
    let user_id = query.user_id.unwrap_or(auth.user_id);

    let fetched = state
        .generations
        .run(
            (auth.user_id, "attendance_history"),
            attendance::history(&state.services, &session, user_id, from, to),
        )
        .await;

    match fetched {
        Some(days) => Ok(HttpResponse::Ok().json(days?)),
        None => Ok(HttpResponse::Ok().json(json!({ "superseded": true }))),
    }
}

#[utoipa::path(
    get,
    path = "/api/attendance/zones",
    responses((status = 200, description = "Configured office zones", body = [LocationZone])),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn zones(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let zones = state.services.store.location_zones().await?;
    Ok(HttpResponse::Ok().json(zones))
}

/* =========================
Admin
========================= */
#[utoipa::path(
    put,
    path = "/api/attendance/{id}/check-out",
    params(("id" = u64, Path, description = "Attendance record id")),
    request_body = OverrideCheckOut,
    responses(
        (status = 200, description = "Checkout set", body = AttendanceDay),
        (status = 400, description = "Checkout before check-in"),
        (status = 403, description = "HR/Admin only"),
        (status = 404, description = "No such record")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn override_check_out(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<u64>,
    payload: web::Json<OverrideCheckOut>,
) -> Result<HttpResponse, AppError> {
    let day = attendance::override_check_out(
        &state.services,
        &auth.session(),
        path.into_inner(),
        payload.check_out,
    )
    .await?;
    state.feed.publish(Table::AttendanceLogs, Some(day.user_id));
    Ok(HttpResponse::Ok().json(day))
}

#[utoipa::path(
    delete,
    path = "/api/attendance/expired",
    responses(
        (status = 200, description = "Records past the retention horizon removed", body = Object, example = json!({ "removed": 120 })),
        (status = 403, description = "HR/Admin only")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn purge_expired(
    auth: AuthUser,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let removed = attendance::purge(&state.services, &auth.session()).await?;
    if removed > 0 {
        state.feed.publish(Table::AttendanceLogs, None);
    }
    Ok(HttpResponse::Ok().json(json!({ "removed": removed })))
}
