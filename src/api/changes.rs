use std::convert::Infallible;

use crate::auth::auth::AuthUser;
use crate::feed::ChangeEvent;
use crate::state::AppState;
use actix_web::{HttpResponse, web};
use futures::StreamExt;
use futures::future::ready;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tracing::debug;

/// Whether a subscriber should hear about an event. Approvers see every
/// change; employees see their own rows plus team-wide changes.
fn visible_to(auth: &AuthUser, event: &ChangeEvent) -> bool {
    auth.role.is_approver() || event.user_id.is_none_or(|owner| owner == auth.user_id)
}

fn frame(event: &ChangeEvent) -> Option<web::Bytes> {
    let payload = serde_json::to_string(event).ok()?;
    Some(web::Bytes::from(format!(
        "event: change\ndata: {}\n\n",
        payload
    )))
}

/// Server-sent events announcing which tables changed. Clients refetch the
/// named table; a `resync` event means events were dropped and every cached
/// view should be refreshed.
#[utoipa::path(
    get,
    path = "/api/changes",
    responses((status = 200, description = "text/event-stream of change events", body = ChangeEvent)),
    security(("bearer_auth" = [])),
    tag = "Changes"
)]
pub async fn changes(auth: AuthUser, state: web::Data<AppState>) -> HttpResponse {
    debug!(user_id = auth.user_id, "Change feed subscribed");
    let stream = BroadcastStream::new(state.feed.subscribe()).filter_map(move |received| {
        let bytes = match received {
            Ok(event) if visible_to(&auth, &event) => frame(&event),
            Ok(_) => None,
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                debug!(user_id = auth.user_id, skipped, "Change feed lagged");
                Some(web::Bytes::from_static(b"event: resync\ndata: {}\n\n"))
            }
        };
        ready(bytes.map(Ok::<_, Infallible>))
    });

    HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header(("Cache-Control", "no-cache"))
        .streaming(stream)
}
