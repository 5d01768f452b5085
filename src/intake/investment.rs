/// Investment questionnaire store
use super::PageRequest;
use crate::db::models::InvestmentQuestionnaire;
use crate::error::{ApiError, ApiResult};
use chrono::Utc;
use serde::Deserialize;
use sqlx::SqlitePool;
use uuid::Uuid;

/// Fields of an investment questionnaire submission
///
/// `government_assistance` holds the selected assistance kinds; it is
/// persisted as a JSON array.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvestmentFields {
    pub project_title: String,
    pub investment_objectives: String,
    pub market_demand: String,
    pub government_assistance: Vec<String>,
    pub research_gaps: String,
    pub research_objectives: String,
    pub total_project_cost: f64,
    pub country_significance: String,
    pub current_outputs: String,
    pub technology_readiness_level: String,
    pub publications: Option<String>,
    pub resources_collaborations: Option<String>,
    pub risk_assumptions: Option<String>,
}

pub struct InvestmentStore {
    db: SqlitePool,
}

impl InvestmentStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    pub async fn create(
        &self,
        account_id: &str,
        fields: InvestmentFields,
        project_files: Vec<String>,
    ) -> ApiResult<InvestmentQuestionnaire> {
        let id = Uuid::new_v4().to_string();

        let assistance = serde_json::to_string(&fields.government_assistance)
            .map_err(|e| ApiError::Internal(format!("Failed to encode assistance list: {}", e)))?;
        let files = serde_json::to_string(&project_files)
            .map_err(|e| ApiError::Internal(format!("Failed to encode file list: {}", e)))?;

        sqlx::query(
            "INSERT INTO investment_questionnaires (id, account_id, project_title, \
             investment_objectives, market_demand, government_assistance, research_gaps, \
             research_objectives, total_project_cost, country_significance, current_outputs, \
             technology_readiness_level, publications, resources_collaborations, \
             risk_assumptions, project_files, submitted_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(account_id)
        .bind(&fields.project_title)
        .bind(&fields.investment_objectives)
        .bind(&fields.market_demand)
        .bind(&assistance)
        .bind(&fields.research_gaps)
        .bind(&fields.research_objectives)
        .bind(fields.total_project_cost)
        .bind(&fields.country_significance)
        .bind(&fields.current_outputs)
        .bind(&fields.technology_readiness_level)
        .bind(&fields.publications)
        .bind(&fields.resources_collaborations)
        .bind(&fields.risk_assumptions)
        .bind(&files)
        .bind(Utc::now())
        .execute(&self.db)
        .await?;

        tracing::info!(
            questionnaire = %id,
            account = account_id,
            "investment questionnaire submitted"
        );

        self.get(&id).await
    }

    pub async fn get(&self, id: &str) -> ApiResult<InvestmentQuestionnaire> {
        sqlx::query_as::<_, InvestmentQuestionnaire>(
            "SELECT * FROM investment_questionnaires WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| ApiError::NotFound("Investment questionnaire not found".to_string()))
    }

    /// Page of submissions, newest first, with the total count
    pub async fn list(
        &self,
        page: PageRequest,
    ) -> ApiResult<(Vec<InvestmentQuestionnaire>, i64)> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM investment_questionnaires")
            .fetch_one(&self.db)
            .await?;

        let rows = sqlx::query_as::<_, InvestmentQuestionnaire>(
            "SELECT * FROM investment_questionnaires ORDER BY submitted_at DESC \
             LIMIT ? OFFSET ?",
        )
        .bind(i64::from(page.limit))
        .bind(page.offset())
        .fetch_all(&self.db)
        .await?;

        Ok((rows, total))
    }

    pub async fn list_by_account(
        &self,
        account_id: &str,
    ) -> ApiResult<Vec<InvestmentQuestionnaire>> {
        let rows = sqlx::query_as::<_, InvestmentQuestionnaire>(
            "SELECT * FROM investment_questionnaires WHERE account_id = ? \
             ORDER BY submitted_at DESC",
        )
        .bind(account_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows)
    }

    /// Delete a submission, returning its stored file URLs for cleanup
    pub async fn delete(&self, id: &str) -> ApiResult<Vec<String>> {
        let existing = self.get(id).await?;
        let urls = existing.file_urls();

        sqlx::query("DELETE FROM investment_questionnaires WHERE id = ?")
            .bind(&existing.id)
            .execute(&self.db)
            .await?;

        tracing::info!(questionnaire = %existing.id, "investment questionnaire deleted");

        Ok(urls)
    }
}
