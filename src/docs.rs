use crate::api::attendance::{CheckOutReq, OverrideCheckOut};
use crate::api::duty::{AppealReq, ToggleReq};
use crate::api::leave_request::RejectReq;
use crate::api::swap::{ProposeReq, RespondReq};
use crate::collab::ProofFile;
use crate::engine::Warning;
use crate::engine::attendance::{CheckInInput, CheckOutAssessment, CheckOutReceipt, CheckOutStatus, DayView};
use crate::engine::duty::RotationPlan;
use crate::engine::leave::{LeaveSubmission, QuotaView};
use crate::engine::negligence::{NegligenceView, TribunalCase};
use crate::engine::quota::QuotaLine;
use crate::feed::{ChangeEvent, Table};
use crate::model::attendance::{AttendanceDay, AttendanceStatus, Coordinates, DayStatus, WorkType};
use crate::model::duty::{Duty, NewDuty, PenaltyStatus};
use crate::model::duty_swap::{DutySwap, SwapStatus};
use crate::model::leave_request::{LeaveRequest, LeaveStatus, LeaveType};
use crate::model::location_zone::LocationZone;
use crate::models::{LoginReqDto, TokenPair, UserReq};
use utoipa::Modify;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Presence API",
        version = "1.0.0",
        description = r#"
## Attendance, Leave and Duty Tracking

This API keeps the working day of a team honest: who came in, who is away, and who skipped the chores.

### 🔹 Key Features
- **Attendance**
  - Office check-in inside a geofence, work from home, off-site and leave days
  - Early-leave reasons, stale sessions and admin checkout overrides
- **Leave**
  - Leave, overtime and correction requests with yearly quotas
  - Approval writes the effect straight into attendance
- **Duties**
  - Rotations, proof of completion and a negligence tribunal for missed duties
- **Swaps**
  - Two members exchange duties; the exchange is atomic
- **Change feed**
  - Server-sent events telling clients which views to refresh

### 🔐 Security
Every endpoint except `/auth/*` needs a **JWT Bearer** access token.
Approvals, overrides and duty planning are limited to **Admin** and **HR**.

### 📦 Response Format
- JSON bodies; state-changing calls return the record plus a `warnings` list
- Non-fatal failures (scoring, notification, optional uploads) show up as warnings, not errors
"#,
    ),
    paths(
        crate::auth::handlers::login,
        crate::auth::handlers::refresh_token,
        crate::auth::handlers::logout,
        crate::auth::handlers::register,

        crate::api::attendance::check_in,
        crate::api::attendance::check_out,
        crate::api::attendance::today,
        crate::api::attendance::history,
        crate::api::attendance::zones,
        crate::api::attendance::override_check_out,
        crate::api::attendance::purge_expired,

        crate::api::leave_request::leave_list,
        crate::api::leave_request::get_leave,
        crate::api::leave_request::create_leave,
        crate::api::leave_request::approve_leave,
        crate::api::leave_request::reject_leave,
        crate::api::leave_request::usage,

        crate::api::duty::board,
        crate::api::duty::create_duty,
        crate::api::duty::rotation,
        crate::api::duty::complete,
        crate::api::duty::set_done,
        crate::api::duty::neglected,
        crate::api::duty::negligence_history,
        crate::api::duty::accept_penalty,
        crate::api::duty::redeem,
        crate::api::duty::appeal,
        crate::api::duty::acknowledge,

        crate::api::swap::propose,
        crate::api::swap::respond,
        crate::api::swap::list,

        crate::api::changes::changes
    ),
    components(
        schemas(
            UserReq,
            LoginReqDto,
            TokenPair,
            WorkType,
            AttendanceStatus,
            DayStatus,
            Coordinates,
            AttendanceDay,
            LocationZone,
            CheckInInput,
            CheckOutReq,
            CheckOutStatus,
            CheckOutAssessment,
            CheckOutReceipt,
            DayView,
            OverrideCheckOut,
            ProofFile,
            Warning,
            LeaveType,
            LeaveStatus,
            LeaveRequest,
            LeaveSubmission,
            RejectReq,
            QuotaLine,
            QuotaView,
            PenaltyStatus,
            Duty,
            NewDuty,
            RotationPlan,
            ToggleReq,
            AppealReq,
            TribunalCase,
            NegligenceView,
            SwapStatus,
            DutySwap,
            ProposeReq,
            RespondReq,
            Table,
            ChangeEvent
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Login, token rotation and user registration"),
        (name = "Attendance", description = "Check-in, check-out and day status"),
        (name = "Leave", description = "Leave, overtime and correction requests"),
        (name = "Duties", description = "Duty board and completion"),
        (name = "Negligence", description = "Missed duties and the tribunal"),
        (name = "Swaps", description = "Duty exchanges between members"),
        (name = "Changes", description = "Live change notifications"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}
