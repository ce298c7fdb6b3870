//! Request handlers over persisted state. Nothing here is long-lived: each
//! call reads what it needs through the [`Store`], applies one transition and
//! reports side-effect failures as warnings next to the result.

pub mod attendance;
pub mod duty;
pub mod geofence;
pub mod leave;
pub mod negligence;
pub mod quota;
pub mod swap;

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::warn;
use utoipa::ToSchema;

use crate::collab::{Gamification, GamificationEvent, Notifier, ProofFile, ProofStorage};
use crate::config::Policy;
use crate::model::leave_request::LeaveType;
use crate::store::Store;

/// Everything an engine talks to.
#[derive(Clone)]
pub struct Services {
    pub store: Arc<dyn Store>,
    pub gamification: Arc<dyn Gamification>,
    pub notifier: Arc<dyn Notifier>,
    pub proofs: Arc<dyn ProofStorage>,
    pub policy: Policy,
}

/// Non-fatal problem that did not stop the transition.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Warning {
    GamificationFailed { detail: String },
    NotificationFailed { detail: String },
    ProofUploadFailed { detail: String },
    /// Home check-in without an approved work-from-home request.
    UnverifiedLocation,
    OverQuota {
        leave_type: LeaveType,
        used: u32,
        requested: u32,
        quota: u32,
    },
}

/// Successful result plus whatever went wrong on the side.
#[derive(Debug, Clone, Serialize)]
pub struct Outcome<T> {
    #[serde(flatten)]
    pub value: T,
    pub warnings: Vec<Warning>,
}

impl<T> Outcome<T> {
    pub fn new(value: T, warnings: Vec<Warning>) -> Self {
        Self { value, warnings }
    }
}

impl Services {
    /// Fire-and-forget scoring call.
    pub(crate) async fn award(
        &self,
        user_id: u64,
        event: GamificationEvent,
        payload: Value,
        warnings: &mut Vec<Warning>,
    ) {
        if let Err(e) = self
            .gamification
            .process_action(user_id, event, payload)
            .await
        {
            warn!(user_id, event = %event, error = %e, "Gamification call failed");
            warnings.push(Warning::GamificationFailed {
                detail: e.to_string(),
            });
        }
    }

    pub(crate) async fn notify(
        &self,
        user_id: u64,
        title: &str,
        message: &str,
        link: &str,
        warnings: &mut Vec<Warning>,
    ) {
        if let Err(e) = self.notifier.notify(user_id, title, message, link).await {
            warn!(user_id, error = %e, "Notification failed");
            warnings.push(Warning::NotificationFailed {
                detail: e.to_string(),
            });
        }
    }

    pub(crate) async fn broadcast(
        &self,
        title: &str,
        message: &str,
        link: &str,
        warnings: &mut Vec<Warning>,
    ) {
        if let Err(e) = self.notifier.broadcast(title, message, link).await {
            warn!(error = %e, "Broadcast failed");
            warnings.push(Warning::NotificationFailed {
                detail: e.to_string(),
            });
        }
    }

    /// Uploads optional proof. A failure becomes a warning and `None`.
    pub(crate) async fn upload_optional(
        &self,
        file: Option<&ProofFile>,
        folder: &[String],
        warnings: &mut Vec<Warning>,
    ) -> Option<String> {
        let file = file?;
        match self.proofs.upload(file, folder).await {
            Ok(url) => Some(url),
            Err(e) => {
                warn!(folder = %folder.join("/"), error = %e, "Proof upload failed");
                warnings.push(Warning::ProofUploadFailed {
                    detail: e.to_string(),
                });
                None
            }
        }
    }
}
