//! Narrow interfaces to the services around the attendance core.
//!
//! Gamification and notifications are fire-and-forget: a failure there never
//! rolls back the transition that caused it, it only becomes a warning.

pub mod local_storage;
pub mod outbox;
#[cfg(test)]
pub mod testing;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display};
use utoipa::ToSchema;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Display, AsRefStr)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum GamificationEvent {
    AttendanceCheckIn,
    AttendanceLeave,
    DutyComplete,
    DutyAssist,
    DutyMissed,
    DutyLateSubmit,
}

/// An uploaded proof file, already decoded.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ProofFile {
    #[schema(example = "selfie.jpg")]
    pub file_name: String,
    #[serde(with = "base64_bytes")]
    #[schema(value_type = String, format = Byte)]
    pub content: Vec<u8>,
}

#[async_trait]
pub trait Gamification: Send + Sync {
    async fn process_action(
        &self,
        user_id: u64,
        event: GamificationEvent,
        payload: serde_json::Value,
    ) -> Result<()>;
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, user_id: u64, title: &str, message: &str, link: &str) -> Result<()>;

    /// Team-visible notice.
    async fn broadcast(&self, title: &str, message: &str, link: &str) -> Result<()>;
}

#[async_trait]
pub trait ProofStorage: Send + Sync {
    /// Stores the file under the folder path and returns its public URL.
    async fn upload(&self, file: &ProofFile, folder: &[String]) -> Result<String>;
}

mod base64_bytes {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.trim())
            .map_err(serde::de::Error::custom)
    }
}
