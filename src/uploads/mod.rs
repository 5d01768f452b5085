/// File intake: validation, naming, and disk storage for uploads
///
/// Each feature declares an `UploadPolicy` naming its fields, the accepted
/// formats, and the size ceiling. Stored files get collision-free names from
/// a per-(account, field) sequence counter plus a timestamp.
use crate::error::{ApiError, ApiResult};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// A named upload field and how many files it accepts per submission
#[derive(Debug, Clone, Copy)]
pub struct UploadField {
    pub name: &'static str,
    pub max_count: usize,
}

/// Per-feature upload rules
#[derive(Debug, Clone, Copy)]
pub struct UploadPolicy {
    /// Feature directory under the upload root
    pub feature: &'static str,
    pub allowed_extensions: &'static [&'static str],
    pub allowed_mime_types: &'static [&'static str],
    pub max_bytes: usize,
    pub fields: &'static [UploadField],
}

/// Research questionnaire uploads: documents only, 5 MiB each
pub const QUESTIONNAIRE_UPLOADS: UploadPolicy = UploadPolicy {
    feature: "questionnaires",
    allowed_extensions: &["pdf", "doc", "docx"],
    allowed_mime_types: &[
        "application/pdf",
        "application/msword",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    ],
    max_bytes: 5 * 1024 * 1024,
    fields: &[
        UploadField {
            name: "applicationUrl",
            max_count: 5,
        },
        UploadField {
            name: "researchPlanUrl",
            max_count: 5,
        },
        UploadField {
            name: "supportingDocumentsUrl",
            max_count: 5,
        },
        UploadField {
            name: "otherDocumentUrl",
            max_count: 5,
        },
    ],
};

/// Investment questionnaire uploads: PDF only, 10 MiB each
pub const INVESTMENT_UPLOADS: UploadPolicy = UploadPolicy {
    feature: "investment",
    allowed_extensions: &["pdf"],
    allowed_mime_types: &["application/pdf"],
    max_bytes: 10 * 1024 * 1024,
    fields: &[UploadField {
        name: "projectFile",
        max_count: 5,
    }],
};

impl UploadPolicy {
    pub fn field(&self, name: &str) -> Option<&UploadField> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// Monotonic per-(account, field) sequence numbers for stored filenames
#[derive(Default)]
pub struct UploadCounters {
    counters: Mutex<HashMap<(String, String), u64>>,
}

impl UploadCounters {
    pub fn next_sequence(&self, account_id: &str, field: &str) -> u64 {
        let mut counters = self.counters.lock().unwrap_or_else(|e| e.into_inner());
        let entry = counters
            .entry((account_id.to_string(), field.to_string()))
            .or_insert(0);
        *entry += 1;
        *entry
    }

    pub fn reset(&self, account_id: &str, field: &str) {
        let mut counters = self.counters.lock().unwrap_or_else(|e| e.into_inner());
        counters.remove(&(account_id.to_string(), field.to_string()));
    }
}

/// A stored upload: the public URL recorded in the database and the path on
/// disk
#[derive(Debug, Clone)]
pub struct StoredFile {
    pub url: String,
    pub path: PathBuf,
}

pub struct FileIntake {
    base_dir: PathBuf,
    counters: UploadCounters,
}

impl FileIntake {
    pub fn new(base_dir: PathBuf) -> Self {
        Self {
            base_dir,
            counters: UploadCounters::default(),
        }
    }

    /// Validate and persist one uploaded file
    pub async fn store(
        &self,
        policy: &UploadPolicy,
        account_id: &str,
        field: &str,
        original_filename: &str,
        content_type: Option<&str>,
        data: &[u8],
    ) -> ApiResult<StoredFile> {
        if policy.field(field).is_none() {
            return Err(ApiError::Upload(format!("Unexpected upload field: {}", field)));
        }

        if data.len() > policy.max_bytes {
            return Err(ApiError::Upload(format!(
                "File exceeds the {} MB limit",
                policy.max_bytes / (1024 * 1024)
            )));
        }

        let (basename, extension) = split_filename(original_filename);
        if !policy
            .allowed_extensions
            .iter()
            .any(|e| e.eq_ignore_ascii_case(&extension))
        {
            return Err(ApiError::Upload(format!(
                "File type not allowed, accepted: {}",
                policy.allowed_extensions.join(", ")
            )));
        }

        if let Some(mime) = content_type {
            if !policy.allowed_mime_types.contains(&mime) {
                return Err(ApiError::Upload(format!(
                    "Content type not allowed: {}",
                    mime
                )));
            }
        }

        let directory = self
            .base_dir
            .join(policy.feature)
            .join(account_id)
            .join(field);
        tokio::fs::create_dir_all(&directory).await?;

        // The counter restarts after each submission, so a name can recur
        // within the same millisecond; create_new detects that and the next
        // sequence number is tried
        let (filename, path) = loop {
            let sequence = self.counters.next_sequence(account_id, field);
            let filename = format!(
                "{}-{}-{}-{}-{}.{}",
                account_id,
                field,
                sequence,
                chrono::Utc::now().timestamp_millis(),
                sanitize_basename(&basename),
                extension.to_lowercase(),
            );
            let path = directory.join(&filename);

            match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(mut file) => {
                    use tokio::io::AsyncWriteExt;
                    file.write_all(data).await?;
                    file.flush().await?;
                    break (filename, path);
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e.into()),
            }
        };

        let url = format!(
            "/uploads/{}/{}/{}/{}",
            policy.feature, account_id, field, filename
        );

        tracing::debug!(account = account_id, field, %url, "upload stored");

        Ok(StoredFile { url, path })
    }

    /// Best-effort removal of stored files by their public URLs; files that
    /// are already gone are not an error
    pub async fn remove(&self, urls: &[String]) {
        for url in urls {
            let Some(relative) = url.strip_prefix("/uploads/") else {
                continue;
            };
            let path = self.base_dir.join(relative);
            match tokio::fs::remove_file(&path).await {
                Ok(()) => tracing::debug!(%url, "upload removed"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => tracing::warn!(%url, "failed to remove upload: {}", e),
            }
        }
    }

    /// Drop the sequence counters for every field of a feature, used when a
    /// submission is rolled back
    pub fn reset_counters(&self, policy: &UploadPolicy, account_id: &str) {
        for field in policy.fields {
            self.counters.reset(account_id, field.name);
        }
    }
}

/// Split into (basename, extension); the extension never includes the dot
fn split_filename(filename: &str) -> (String, String) {
    let name = Path::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(filename);
    match name.rsplit_once('.') {
        Some((base, ext)) if !base.is_empty() => (base.to_string(), ext.to_string()),
        _ => (name.to_string(), String::new()),
    }
}

/// Keep only filesystem-safe characters from a client-supplied basename
fn sanitize_basename(basename: &str) -> String {
    let cleaned: String = basename
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .take(64)
        .collect();
    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_intake() -> (FileIntake, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        (FileIntake::new(dir.path().to_path_buf()), dir)
    }

    #[tokio::test]
    async fn test_store_writes_file_and_builds_url() {
        let (intake, _dir) = test_intake();
        let stored = intake
            .store(
                &QUESTIONNAIRE_UPLOADS,
                "acc-1",
                "applicationUrl",
                "proposal.pdf",
                Some("application/pdf"),
                b"content",
            )
            .await
            .unwrap();

        assert!(stored.url.starts_with("/uploads/questionnaires/acc-1/applicationUrl/"));
        assert!(stored.url.ends_with(".pdf"));
        assert_eq!(tokio::fs::read(&stored.path).await.unwrap(), b"content");
    }

    #[tokio::test]
    async fn test_sequence_numbers_keep_names_distinct() {
        let (intake, _dir) = test_intake();
        let mut urls = Vec::new();
        for _ in 0..3 {
            let stored = intake
                .store(
                    &QUESTIONNAIRE_UPLOADS,
                    "acc-1",
                    "applicationUrl",
                    "proposal.pdf",
                    Some("application/pdf"),
                    b"content",
                )
                .await
                .unwrap();
            urls.push(stored.url);
        }

        urls.sort();
        urls.dedup();
        assert_eq!(urls.len(), 3);
    }

    #[tokio::test]
    async fn test_reset_counters_does_not_overwrite_earlier_files() {
        let (intake, _dir) = test_intake();
        let mut urls = Vec::new();

        // Back-to-back submissions land in the same millisecond, and each
        // one restarts the sequence at 1
        for i in 0..25u8 {
            let stored = intake
                .store(
                    &INVESTMENT_UPLOADS,
                    "acc-1",
                    "projectFile",
                    "proposal.pdf",
                    Some("application/pdf"),
                    &[i],
                )
                .await
                .unwrap();
            urls.push(stored.url);
            assert_eq!(tokio::fs::read(&stored.path).await.unwrap(), vec![i]);
            intake.reset_counters(&INVESTMENT_UPLOADS, "acc-1");
        }

        let mut unique = urls.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), urls.len());
    }

    #[test]
    fn test_counters_are_per_account_and_field() {
        let counters = UploadCounters::default();
        assert_eq!(counters.next_sequence("a", "f1"), 1);
        assert_eq!(counters.next_sequence("a", "f1"), 2);
        assert_eq!(counters.next_sequence("a", "f2"), 1);
        assert_eq!(counters.next_sequence("b", "f1"), 1);

        counters.reset("a", "f1");
        assert_eq!(counters.next_sequence("a", "f1"), 1);
    }

    #[tokio::test]
    async fn test_rejects_disallowed_extension() {
        let (intake, _dir) = test_intake();
        let result = intake
            .store(
                &INVESTMENT_UPLOADS,
                "acc-1",
                "projectFile",
                "malware.exe",
                None,
                b"content",
            )
            .await;
        assert!(matches!(result, Err(ApiError::Upload(_))));
    }

    #[tokio::test]
    async fn test_rejects_disallowed_mime_type() {
        let (intake, _dir) = test_intake();
        let result = intake
            .store(
                &INVESTMENT_UPLOADS,
                "acc-1",
                "projectFile",
                "fake.pdf",
                Some("text/html"),
                b"content",
            )
            .await;
        assert!(matches!(result, Err(ApiError::Upload(_))));
    }

    #[tokio::test]
    async fn test_rejects_oversized_file() {
        let (intake, _dir) = test_intake();
        let oversized = vec![0u8; INVESTMENT_UPLOADS.max_bytes + 1];
        let result = intake
            .store(
                &INVESTMENT_UPLOADS,
                "acc-1",
                "projectFile",
                "big.pdf",
                Some("application/pdf"),
                &oversized,
            )
            .await;
        assert!(matches!(result, Err(ApiError::Upload(_))));
    }

    #[tokio::test]
    async fn test_rejects_unknown_field() {
        let (intake, _dir) = test_intake();
        let result = intake
            .store(
                &INVESTMENT_UPLOADS,
                "acc-1",
                "surprise",
                "file.pdf",
                Some("application/pdf"),
                b"content",
            )
            .await;
        assert!(matches!(result, Err(ApiError::Upload(_))));
    }

    #[tokio::test]
    async fn test_remove_tolerates_missing_files() {
        let (intake, _dir) = test_intake();
        let stored = intake
            .store(
                &INVESTMENT_UPLOADS,
                "acc-1",
                "projectFile",
                "proposal.pdf",
                Some("application/pdf"),
                b"content",
            )
            .await
            .unwrap();

        intake.remove(&[stored.url.clone()]).await;
        assert!(!stored.path.exists());

        // Removing again, and removing a foreign URL, both succeed quietly
        intake.remove(&[stored.url, "https://elsewhere/x.pdf".to_string()]).await;
    }

    #[test]
    fn test_sanitize_basename() {
        assert_eq!(sanitize_basename("my report (final)"), "myreportfinal");
        assert_eq!(sanitize_basename("../../etc/passwd"), "etcpasswd");
        assert_eq!(sanitize_basename("???"), "file");
    }

    #[test]
    fn test_split_filename() {
        assert_eq!(
            split_filename("report.PDF"),
            ("report".to_string(), "PDF".to_string())
        );
        assert_eq!(
            split_filename("archive.tar.gz"),
            ("archive.tar".to_string(), "gz".to_string())
        );
        assert_eq!(split_filename("noext"), ("noext".to_string(), String::new()));
    }
}
