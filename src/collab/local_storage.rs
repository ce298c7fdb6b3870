use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use uuid::Uuid;

use super::{ProofFile, ProofStorage};

/// Keeps proof files on local disk. The directory is expected to be served
/// statically under `public_base`.
pub struct LocalProofStorage {
    root: PathBuf,
    public_base: String,
}

impl LocalProofStorage {
    pub fn new(root: impl Into<PathBuf>, public_base: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base: public_base.into().trim_end_matches('/').to_string(),
        }
    }
}

/// Keeps letters, digits, dash, underscore and dot; anything else becomes `_`.
fn sanitize(segment: &str) -> String {
    let cleaned: String = segment
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    cleaned.trim_matches('.').to_string()
}

#[async_trait]
impl ProofStorage for LocalProofStorage {
    async fn upload(&self, file: &ProofFile, folder: &[String]) -> Result<String> {
        if file.content.is_empty() {
            bail!("proof file is empty");
        }

        let segments: Vec<String> = folder
            .iter()
            .map(|s| sanitize(s))
            .filter(|s| !s.is_empty())
            .collect();

        let dir = segments
            .iter()
            .fold(self.root.clone(), |path, s| path.join(s));
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("cannot create {}", dir.display()))?;

        let name = format!("{}-{}", Uuid::new_v4(), sanitize(&file.file_name));
        let target: PathBuf = Path::new(&dir).join(&name);
        tokio::fs::write(&target, &file.content)
            .await
            .with_context(|| format!("cannot write {}", target.display()))?;

        let mut url = self.public_base.clone();
        for s in segments.iter().chain(std::iter::once(&name)) {
            url.push('/');
            url.push_str(s);
        }
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_path_tricks() {
        assert_eq!(sanitize("../etc/passwd"), "_etc_passwd");
        assert_eq!(sanitize("photo 1.jpg"), "photo_1.jpg");
    }

    #[actix_web::test]
    async fn upload_writes_file_and_returns_public_url() {
        let root = std::env::temp_dir().join(format!("proofs-{}", Uuid::new_v4()));
        let storage = LocalProofStorage::new(&root, "/uploads/");
        let file = ProofFile {
            file_name: "selfie.jpg".into(),
            content: vec![1, 2, 3],
        };

        let url = storage
            .upload(&file, &["attendance".into(), "7".into()])
            .await
            .unwrap();

        assert!(url.starts_with("/uploads/attendance/7/"));
        assert!(url.ends_with("-selfie.jpg"));
        let stored = root
            .join("attendance")
            .join("7")
            .join(url.rsplit('/').next().unwrap());
        assert_eq!(tokio::fs::read(stored).await.unwrap(), vec![1, 2, 3]);
        let _ = tokio::fs::remove_dir_all(root).await;
    }

    #[actix_web::test]
    async fn empty_upload_is_rejected() {
        let storage = LocalProofStorage::new(std::env::temp_dir(), "/uploads");
        let file = ProofFile {
            file_name: "x.jpg".into(),
            content: vec![],
        };
        assert!(storage.upload(&file, &[]).await.is_err());
    }
}
