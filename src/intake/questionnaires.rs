/// Research questionnaire store
use super::{ApprovalStatus, PageRequest};
use crate::db::models::Questionnaire;
use crate::error::{ApiError, ApiResult};
use chrono::Utc;
use serde::Deserialize;
use sqlx::SqlitePool;
use uuid::Uuid;

/// Text and numeric fields of a questionnaire submission
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionnaireFields {
    pub project_sector: String,
    pub targeted_market: String,
    pub commercialisation_timeline: String,
    pub expected_investment: String,
    pub investment_type: String,
    pub research_title: String,
    pub research_gaps: String,
    pub research_objectives: String,
    pub significance_for_country: String,
    pub novelty: String,
    pub duration_in_months: i64,
    pub market_demand: String,
    pub current_outputs: String,
    pub expected_impact: String,
    pub total_cost: f64,
    pub risks_and_assumptions: String,
}

/// Stored file URLs grouped by upload field
#[derive(Debug, Clone, Default)]
pub struct QuestionnaireFiles {
    pub application: Vec<String>,
    pub research_plan: Vec<String>,
    pub supporting: Vec<String>,
    pub other: Vec<String>,
}

pub struct QuestionnaireStore {
    db: SqlitePool,
}

impl QuestionnaireStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Persist a new submission; starts in PENDING review state
    pub async fn create(
        &self,
        account_id: &str,
        fields: QuestionnaireFields,
        files: QuestionnaireFiles,
    ) -> ApiResult<Questionnaire> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO questionnaires (id, account_id, project_sector, targeted_market, \
             commercialisation_timeline, expected_investment, investment_type, research_title, \
             research_gaps, research_objectives, significance_for_country, novelty, \
             duration_in_months, market_demand, current_outputs, expected_impact, total_cost, \
             risks_and_assumptions, application_files, research_plan_files, supporting_files, \
             other_files, approval_status, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(account_id)
        .bind(&fields.project_sector)
        .bind(&fields.targeted_market)
        .bind(&fields.commercialisation_timeline)
        .bind(&fields.expected_investment)
        .bind(&fields.investment_type)
        .bind(&fields.research_title)
        .bind(&fields.research_gaps)
        .bind(&fields.research_objectives)
        .bind(&fields.significance_for_country)
        .bind(&fields.novelty)
        .bind(fields.duration_in_months)
        .bind(&fields.market_demand)
        .bind(&fields.current_outputs)
        .bind(&fields.expected_impact)
        .bind(fields.total_cost)
        .bind(&fields.risks_and_assumptions)
        .bind(json_array(&files.application)?)
        .bind(json_array(&files.research_plan)?)
        .bind(json_array(&files.supporting)?)
        .bind(json_array(&files.other)?)
        .bind(ApprovalStatus::Pending.as_str())
        .bind(now)
        .bind(now)
        .execute(&self.db)
        .await?;

        tracing::info!(questionnaire = %id, account = account_id, "questionnaire submitted");

        self.get(&id).await
    }

    /// Replace the text fields of an existing submission; any newly stored
    /// files are appended to their field's list
    pub async fn update(
        &self,
        id: &str,
        fields: QuestionnaireFields,
        new_files: QuestionnaireFiles,
    ) -> ApiResult<Questionnaire> {
        let existing = self.get(id).await?;

        let merge = |column: &str, additions: &[String]| -> ApiResult<String> {
            let mut urls: Vec<String> = serde_json::from_str(column).unwrap_or_default();
            urls.extend_from_slice(additions);
            json_array(&urls)
        };

        sqlx::query(
            "UPDATE questionnaires SET project_sector = ?, targeted_market = ?, \
             commercialisation_timeline = ?, expected_investment = ?, investment_type = ?, \
             research_title = ?, research_gaps = ?, research_objectives = ?, \
             significance_for_country = ?, novelty = ?, duration_in_months = ?, \
             market_demand = ?, current_outputs = ?, expected_impact = ?, total_cost = ?, \
             risks_and_assumptions = ?, application_files = ?, research_plan_files = ?, \
             supporting_files = ?, other_files = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&fields.project_sector)
        .bind(&fields.targeted_market)
        .bind(&fields.commercialisation_timeline)
        .bind(&fields.expected_investment)
        .bind(&fields.investment_type)
        .bind(&fields.research_title)
        .bind(&fields.research_gaps)
        .bind(&fields.research_objectives)
        .bind(&fields.significance_for_country)
        .bind(&fields.novelty)
        .bind(fields.duration_in_months)
        .bind(&fields.market_demand)
        .bind(&fields.current_outputs)
        .bind(&fields.expected_impact)
        .bind(fields.total_cost)
        .bind(&fields.risks_and_assumptions)
        .bind(merge(&existing.application_files, &new_files.application)?)
        .bind(merge(&existing.research_plan_files, &new_files.research_plan)?)
        .bind(merge(&existing.supporting_files, &new_files.supporting)?)
        .bind(merge(&existing.other_files, &new_files.other)?)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.db)
        .await?;

        self.get(id).await
    }

    /// Record a review decision
    pub async fn update_status(
        &self,
        id: &str,
        status: ApprovalStatus,
        note: Option<String>,
    ) -> ApiResult<Questionnaire> {
        let existing = self.get(id).await?;

        sqlx::query(
            "UPDATE questionnaires SET approval_status = ?, approval_note = ?, updated_at = ? \
             WHERE id = ?",
        )
        .bind(status.as_str())
        .bind(&note)
        .bind(Utc::now())
        .bind(&existing.id)
        .execute(&self.db)
        .await?;

        tracing::info!(questionnaire = %existing.id, status = status.as_str(), "review recorded");

        self.get(id).await
    }

    pub async fn get(&self, id: &str) -> ApiResult<Questionnaire> {
        sqlx::query_as::<_, Questionnaire>("SELECT * FROM questionnaires WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| ApiError::NotFound("Questionnaire not found".to_string()))
    }

    /// Page of submissions, newest first, with the unfiltered total
    pub async fn list(&self, page: PageRequest) -> ApiResult<(Vec<Questionnaire>, i64)> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM questionnaires")
            .fetch_one(&self.db)
            .await?;

        let rows = sqlx::query_as::<_, Questionnaire>(
            "SELECT * FROM questionnaires ORDER BY created_at DESC LIMIT ? OFFSET ?",
        )
        .bind(i64::from(page.limit))
        .bind(page.offset())
        .fetch_all(&self.db)
        .await?;

        Ok((rows, total))
    }

    pub async fn list_by_status(
        &self,
        status: ApprovalStatus,
        page: PageRequest,
    ) -> ApiResult<(Vec<Questionnaire>, i64)> {
        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM questionnaires WHERE approval_status = ?")
                .bind(status.as_str())
                .fetch_one(&self.db)
                .await?;

        let rows = sqlx::query_as::<_, Questionnaire>(
            "SELECT * FROM questionnaires WHERE approval_status = ? \
             ORDER BY created_at DESC LIMIT ? OFFSET ?",
        )
        .bind(status.as_str())
        .bind(i64::from(page.limit))
        .bind(page.offset())
        .fetch_all(&self.db)
        .await?;

        Ok((rows, total))
    }

    pub async fn list_by_account(&self, account_id: &str) -> ApiResult<Vec<Questionnaire>> {
        let rows = sqlx::query_as::<_, Questionnaire>(
            "SELECT * FROM questionnaires WHERE account_id = ? ORDER BY created_at DESC",
        )
        .bind(account_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows)
    }

    /// Delete a submission, returning its stored file URLs for cleanup
    pub async fn delete(&self, id: &str) -> ApiResult<Vec<String>> {
        let existing = self.get(id).await?;
        let urls = existing.all_file_urls();

        sqlx::query("DELETE FROM questionnaires WHERE id = ?")
            .bind(&existing.id)
            .execute(&self.db)
            .await?;

        tracing::info!(questionnaire = %existing.id, "questionnaire deleted");

        Ok(urls)
    }
}

fn json_array(urls: &[String]) -> ApiResult<String> {
    serde_json::to_string(urls)
        .map_err(|e| ApiError::Internal(format!("Failed to encode file list: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{seed_test_account, test_pool};

    async fn test_store() -> QuestionnaireStore {
        let pool = test_pool().await;
        seed_test_account(&pool, "acc-1").await;
        seed_test_account(&pool, "acc-2").await;
        QuestionnaireStore::new(pool)
    }

    pub(crate) fn fields(title: &str) -> QuestionnaireFields {
        QuestionnaireFields {
            project_sector: "Agriculture".to_string(),
            targeted_market: "Domestic".to_string(),
            commercialisation_timeline: "12 months".to_string(),
            expected_investment: "Seed".to_string(),
            investment_type: "Equity".to_string(),
            research_title: title.to_string(),
            research_gaps: "Gaps".to_string(),
            research_objectives: "Objectives".to_string(),
            significance_for_country: "High".to_string(),
            novelty: "Novel approach".to_string(),
            duration_in_months: 18,
            market_demand: "Strong".to_string(),
            current_outputs: "Prototype".to_string(),
            expected_impact: "Jobs".to_string(),
            total_cost: 250_000.0,
            risks_and_assumptions: "Weather".to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_starts_pending() {
        let store = test_store().await;
        let files = QuestionnaireFiles {
            application: vec!["/uploads/questionnaires/a/applicationUrl/x.pdf".to_string()],
            ..Default::default()
        };

        let q = store.create("acc-1", fields("Drip irrigation"), files).await.unwrap();
        assert_eq!(q.approval_status, "PENDING");
        assert_eq!(q.all_file_urls().len(), 1);
    }

    #[tokio::test]
    async fn test_update_appends_files() {
        let store = test_store().await;
        let initial = QuestionnaireFiles {
            application: vec!["/uploads/q/a.pdf".to_string()],
            ..Default::default()
        };
        let q = store.create("acc-1", fields("Title"), initial).await.unwrap();

        let additions = QuestionnaireFiles {
            application: vec!["/uploads/q/b.pdf".to_string()],
            other: vec!["/uploads/q/c.pdf".to_string()],
            ..Default::default()
        };
        let updated = store
            .update(&q.id, fields("New title"), additions)
            .await
            .unwrap();

        assert_eq!(updated.research_title, "New title");
        assert_eq!(updated.all_file_urls().len(), 3);
    }

    #[tokio::test]
    async fn test_status_transitions_and_filtering() {
        let store = test_store().await;
        let a = store
            .create("acc-1", fields("First"), QuestionnaireFiles::default())
            .await
            .unwrap();
        store
            .create("acc-1", fields("Second"), QuestionnaireFiles::default())
            .await
            .unwrap();

        let reviewed = store
            .update_status(&a.id, ApprovalStatus::Approved, Some("Looks good".to_string()))
            .await
            .unwrap();
        assert_eq!(reviewed.approval_status, "APPROVED");
        assert_eq!(reviewed.approval_note.as_deref(), Some("Looks good"));

        let page = PageRequest::new(None, None, 10);
        let (approved, total) = store
            .list_by_status(ApprovalStatus::Approved, page)
            .await
            .unwrap();
        assert_eq!((approved.len(), total), (1, 1));

        let (pending, total) = store
            .list_by_status(ApprovalStatus::Pending, page)
            .await
            .unwrap();
        assert_eq!((pending.len(), total), (1, 1));
    }

    #[tokio::test]
    async fn test_list_paginates_newest_first() {
        let store = test_store().await;
        for i in 0..5 {
            store
                .create(
                    "acc-1",
                    fields(&format!("Proposal {}", i)),
                    QuestionnaireFiles::default(),
                )
                .await
                .unwrap();
        }

        let (first_page, total) = store
            .list(PageRequest::new(Some(1), Some(2), 10))
            .await
            .unwrap();
        assert_eq!(total, 5);
        assert_eq!(first_page.len(), 2);

        let (last_page, _) = store
            .list(PageRequest::new(Some(3), Some(2), 10))
            .await
            .unwrap();
        assert_eq!(last_page.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_returns_file_urls() {
        let store = test_store().await;
        let files = QuestionnaireFiles {
            application: vec!["/uploads/q/a.pdf".to_string()],
            research_plan: vec!["/uploads/q/b.pdf".to_string()],
            ..Default::default()
        };
        let q = store.create("acc-1", fields("Title"), files).await.unwrap();

        let urls = store.delete(&q.id).await.unwrap();
        assert_eq!(urls.len(), 2);
        assert!(matches!(store.get(&q.id).await, Err(ApiError::NotFound(_))));
        assert!(matches!(store.delete(&q.id).await, Err(ApiError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_list_by_account() {
        let store = test_store().await;
        store
            .create("acc-1", fields("Mine"), QuestionnaireFiles::default())
            .await
            .unwrap();
        store
            .create("acc-2", fields("Theirs"), QuestionnaireFiles::default())
            .await
            .unwrap();

        let mine = store.list_by_account("acc-1").await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].research_title, "Mine");
    }
}
