//! Recording fakes for engine tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Result, bail};
use async_trait::async_trait;

use super::{Gamification, GamificationEvent, Notifier, ProofFile, ProofStorage};

#[derive(Default)]
pub struct RecordingGamification {
    pub events: Mutex<Vec<(u64, GamificationEvent, serde_json::Value)>>,
    pub fail: AtomicBool,
}

impl RecordingGamification {
    pub fn kinds(&self) -> Vec<GamificationEvent> {
        self.events.lock().unwrap().iter().map(|e| e.1).collect()
    }
}

#[async_trait]
impl Gamification for RecordingGamification {
    async fn process_action(
        &self,
        user_id: u64,
        event: GamificationEvent,
        payload: serde_json::Value,
    ) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            bail!("scoring service unavailable");
        }
        self.events.lock().unwrap().push((user_id, event, payload));
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    /// `None` recipient means a broadcast.
    pub sent: Mutex<Vec<(Option<u64>, String)>>,
}

impl RecordingNotifier {
    pub fn recipients(&self) -> Vec<Option<u64>> {
        self.sent.lock().unwrap().iter().map(|s| s.0).collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, user_id: u64, title: &str, _message: &str, _link: &str) -> Result<()> {
        self.sent.lock().unwrap().push((Some(user_id), title.to_string()));
        Ok(())
    }

    async fn broadcast(&self, title: &str, _message: &str, _link: &str) -> Result<()> {
        self.sent.lock().unwrap().push((None, title.to_string()));
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeProofStorage {
    pub fail: AtomicBool,
}

#[async_trait]
impl ProofStorage for FakeProofStorage {
    async fn upload(&self, file: &ProofFile, folder: &[String]) -> Result<String> {
        if self.fail.load(Ordering::SeqCst) {
            bail!("bucket unreachable");
        }
        Ok(format!("mem://{}/{}", folder.join("/"), file.file_name))
    }
}

pub fn proof(name: &str) -> ProofFile {
    ProofFile {
        file_name: name.to_string(),
        content: vec![0xFF, 0xD8],
    }
}
