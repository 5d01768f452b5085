/// News post store
use super::PageRequest;
use crate::db::models::News;
use crate::error::{ApiError, ApiResult};
use chrono::Utc;
use serde::Deserialize;
use sqlx::SqlitePool;
use uuid::Uuid;

/// Default page size for the public news feed
pub const NEWS_DEFAULT_PAGE_SIZE: u32 = 6;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsInput {
    pub title: String,
    pub subtitle: String,
    pub image_url: String,
}

/// Partial news update
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsUpdate {
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub image_url: Option<String>,
    pub active: Option<bool>,
}

pub struct NewsStore {
    db: SqlitePool,
}

impl NewsStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    pub async fn create(&self, account_id: &str, input: NewsInput) -> ApiResult<News> {
        if input.title.trim().is_empty() {
            return Err(ApiError::Validation("Title is required".to_string()));
        }

        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO news (id, account_id, title, subtitle, image_url, active, \
             created_at, updated_at) VALUES (?, ?, ?, ?, ?, 1, ?, ?)",
        )
        .bind(&id)
        .bind(account_id)
        .bind(input.title.trim())
        .bind(&input.subtitle)
        .bind(&input.image_url)
        .bind(now)
        .bind(now)
        .execute(&self.db)
        .await?;

        tracing::info!(news = %id, account = account_id, "news post created");

        self.get(&id).await
    }

    pub async fn update(&self, id: &str, update: NewsUpdate) -> ApiResult<News> {
        let existing = self.get(id).await?;

        sqlx::query(
            "UPDATE news SET title = ?, subtitle = ?, image_url = ?, active = ?, \
             updated_at = ? WHERE id = ?",
        )
        .bind(update.title.as_deref().unwrap_or(&existing.title))
        .bind(update.subtitle.as_deref().unwrap_or(&existing.subtitle))
        .bind(update.image_url.as_deref().unwrap_or(&existing.image_url))
        .bind(update.active.unwrap_or(existing.active))
        .bind(Utc::now())
        .bind(&existing.id)
        .execute(&self.db)
        .await?;

        self.get(id).await
    }

    pub async fn get(&self, id: &str) -> ApiResult<News> {
        sqlx::query_as::<_, News>("SELECT * FROM news WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| ApiError::NotFound("News post not found".to_string()))
    }

    /// Public feed: active posts only, newest first
    pub async fn list_active(&self, page: PageRequest) -> ApiResult<(Vec<News>, i64)> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM news WHERE active = 1")
            .fetch_one(&self.db)
            .await?;

        let rows = sqlx::query_as::<_, News>(
            "SELECT * FROM news WHERE active = 1 ORDER BY created_at DESC LIMIT ? OFFSET ?",
        )
        .bind(i64::from(page.limit))
        .bind(page.offset())
        .fetch_all(&self.db)
        .await?;

        Ok((rows, total))
    }

    /// Administrative listing, inactive posts included
    pub async fn list_all(&self, page: PageRequest) -> ApiResult<(Vec<News>, i64)> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM news")
            .fetch_one(&self.db)
            .await?;

        let rows = sqlx::query_as::<_, News>(
            "SELECT * FROM news ORDER BY created_at DESC LIMIT ? OFFSET ?",
        )
        .bind(i64::from(page.limit))
        .bind(page.offset())
        .fetch_all(&self.db)
        .await?;

        Ok((rows, total))
    }

    pub async fn delete(&self, id: &str) -> ApiResult<()> {
        let existing = self.get(id).await?;

        sqlx::query("DELETE FROM news WHERE id = ?")
            .bind(&existing.id)
            .execute(&self.db)
            .await?;

        tracing::info!(news = %existing.id, "news post deleted");

        Ok(())
    }
}
