/// HTTP API surface
pub mod accounts;
pub mod investment;
pub mod news;
pub mod questionnaires;

use crate::context::AppContext;
use crate::error::{ApiError, ApiResult};
use crate::intake::PageRequest;
use crate::uploads::{FileIntake, StoredFile, UploadPolicy};
use axum::{
    extract::multipart::Multipart,
    response::{IntoResponse, Response},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// All versioned API routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .nest("/accounts", accounts::routes())
        .nest("/questionnaires", questionnaires::routes())
        .nest("/investment-questionnaires", investment::routes())
        .nest("/news", news::routes())
}

/// Uniform response envelope
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub current_page: u32,
    pub total_pages: i64,
    pub total_items: i64,
    pub items_per_page: u32,
}

impl Pagination {
    pub fn new(page: PageRequest, total_items: i64) -> Self {
        Self {
            current_page: page.page,
            total_pages: page.total_pages(total_items),
            total_items,
            items_per_page: page.limit,
        }
    }
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
            pagination: None,
        }
    }

    pub fn paginated(message: impl Into<String>, data: T, pagination: Pagination) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
            pagination: Some(pagination),
        }
    }
}

impl ApiResponse<()> {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: None,
            pagination: None,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

/// Common pagination query parameters
#[derive(Debug, Deserialize)]
pub struct PageParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub status: Option<String>,
}

/// A parsed multipart submission: repeated text fields plus files stored
/// through the upload policy
pub struct MultipartIntake {
    pub texts: HashMap<String, Vec<String>>,
    pub files: HashMap<String, Vec<StoredFile>>,
}

impl MultipartIntake {
    /// Single required text value
    pub fn required(&self, name: &str) -> ApiResult<String> {
        self.optional(name)
            .ok_or_else(|| ApiError::Validation(format!("{} is required", name)))
    }

    /// Single optional text value; empty strings count as absent
    pub fn optional(&self, name: &str) -> Option<String> {
        self.texts
            .get(name)
            .and_then(|v| v.first())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    /// Every value of a repeated text field
    pub fn all(&self, name: &str) -> Vec<String> {
        self.texts.get(name).cloned().unwrap_or_default()
    }

    pub fn required_i64(&self, name: &str) -> ApiResult<i64> {
        self.required(name)?
            .parse()
            .map_err(|_| ApiError::Validation(format!("{} must be a whole number", name)))
    }

    pub fn required_f64(&self, name: &str) -> ApiResult<f64> {
        self.required(name)?
            .parse()
            .map_err(|_| ApiError::Validation(format!("{} must be a number", name)))
    }

    pub fn file_urls(&self, field: &str) -> Vec<String> {
        self.files
            .get(field)
            .map(|files| files.iter().map(|f| f.url.clone()).collect())
            .unwrap_or_default()
    }

    pub fn all_file_urls(&self) -> Vec<String> {
        self.files
            .values()
            .flat_map(|files| files.iter().map(|f| f.url.clone()))
            .collect()
    }

    /// Undo this submission's stored files and sequence counters, used when
    /// anything fails after uploads have been written to disk
    pub async fn rollback(&self, intake: &FileIntake, policy: &UploadPolicy, account_id: &str) {
        intake.remove(&self.all_file_urls()).await;
        intake.reset_counters(policy, account_id);
    }
}

/// Drain a multipart stream, storing file parts through the policy
///
/// Field names matching the policy are treated as uploads, everything else
/// as text. If any part fails, files already written are removed and the
/// sequence counters rolled back before the error propagates.
pub async fn collect_multipart(
    mut multipart: Multipart,
    intake: &FileIntake,
    policy: &UploadPolicy,
    account_id: &str,
) -> ApiResult<MultipartIntake> {
    let mut texts: HashMap<String, Vec<String>> = HashMap::new();
    let mut files: HashMap<String, Vec<StoredFile>> = HashMap::new();

    let result: ApiResult<()> = async {
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::Upload(format!("Malformed multipart body: {}", e)))?
        {
            let Some(name) = field.name().map(|n| n.to_string()) else {
                continue;
            };

            if let Some(upload_field) = policy.field(&name) {
                let stored_count = files.get(&name).map(Vec::len).unwrap_or(0);
                if stored_count >= upload_field.max_count {
                    return Err(ApiError::Upload(format!(
                        "At most {} files allowed for {}",
                        upload_field.max_count, name
                    )));
                }

                let filename = field
                    .file_name()
                    .map(|f| f.to_string())
                    .ok_or_else(|| {
                        ApiError::Upload(format!("{} must be a file upload", name))
                    })?;
                let content_type = field.content_type().map(|c| c.to_string());
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::Upload(format!("Failed to read upload: {}", e)))?;

                let stored = intake
                    .store(
                        policy,
                        account_id,
                        &name,
                        &filename,
                        content_type.as_deref(),
                        &data,
                    )
                    .await?;
                files.entry(name).or_default().push(stored);
            } else {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ApiError::Validation(format!("Unreadable field {}: {}", name, e)))?;
                texts.entry(name).or_default().push(value);
            }
        }
        Ok(())
    }
    .await;

    if let Err(e) = result {
        let urls: Vec<String> = files
            .values()
            .flat_map(|stored| stored.iter().map(|f| f.url.clone()))
            .collect();
        intake.remove(&urls).await;
        intake.reset_counters(policy, account_id);
        return Err(e);
    }

    Ok(MultipartIntake { texts, files })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn intake_with(texts: &[(&str, &[&str])]) -> MultipartIntake {
        MultipartIntake {
            texts: texts
                .iter()
                .map(|(k, vs)| {
                    (
                        k.to_string(),
                        vs.iter().map(|v| v.to_string()).collect(),
                    )
                })
                .collect(),
            files: HashMap::new(),
        }
    }

    #[test]
    fn test_required_and_optional_text() {
        let intake = intake_with(&[("title", &["  Solar  "]), ("empty", &["  "])]);

        assert_eq!(intake.required("title").unwrap(), "Solar");
        assert!(intake.required("missing").is_err());
        assert!(intake.optional("empty").is_none());
    }

    #[test]
    fn test_numeric_parsing() {
        let intake = intake_with(&[("months", &["18"]), ("cost", &["250000.5"]), ("bad", &["x"])]);

        assert_eq!(intake.required_i64("months").unwrap(), 18);
        assert_eq!(intake.required_f64("cost").unwrap(), 250000.5);
        assert!(intake.required_i64("bad").is_err());
    }

    #[test]
    fn test_repeated_values() {
        let intake = intake_with(&[("governmentAssistance", &["Tax relief", "Land"])]);
        assert_eq!(intake.all("governmentAssistance").len(), 2);
        assert!(intake.all("missing").is_empty());
    }

    #[test]
    fn test_pagination_shape() {
        let page = PageRequest::new(Some(2), Some(10), 10);
        let pagination = Pagination::new(page, 25);

        assert_eq!(pagination.current_page, 2);
        assert_eq!(pagination.total_pages, 3);
        assert_eq!(pagination.total_items, 25);
        assert_eq!(pagination.items_per_page, 10);
    }
}
