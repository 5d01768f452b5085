/// Research questionnaire routes
///
/// Submissions arrive as multipart forms: text fields alongside up to four
/// document upload fields. Review endpoints are restricted to the
/// directorate and administrators.
use super::{collect_multipart, ApiResponse, MultipartIntake, PageParams, Pagination};
use crate::account::Role;
use crate::auth::AuthAccount;
use crate::context::AppContext;
use crate::db::models::Questionnaire;
use crate::error::{ApiError, ApiResult};
use crate::intake::{ApprovalStatus, PageRequest};
use crate::intake::questionnaires::{QuestionnaireFields, QuestionnaireFiles};
use crate::require_role;
use crate::uploads::QUESTIONNAIRE_UPLOADS;
use axum::{
    extract::{multipart::Multipart, DefaultBodyLimit, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch},
    Router,
};
use serde::Deserialize;

const DEFAULT_PAGE_SIZE: u32 = 10;

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/mine", get(list_mine))
        .route("/:id", get(get_one).patch(update).delete(delete))
        .route("/:id/status", patch(update_status))
        // Four fields of five documents at 5 MiB each, plus form text
        .layer(DefaultBodyLimit::max(110 * 1024 * 1024))
}

#[derive(Debug, Deserialize)]
struct StatusRequest {
    status: String,
    note: Option<String>,
}

async fn create(
    State(ctx): State<AppContext>,
    auth: AuthAccount,
    multipart: Multipart,
) -> ApiResult<impl IntoResponse> {
    let intake =
        collect_multipart(multipart, &ctx.file_intake, &QUESTIONNAIRE_UPLOADS, &auth.id).await?;

    let fields = match parse_fields(&intake) {
        Ok(fields) => fields,
        Err(e) => {
            // Validation failed after files hit disk; undo the stores
            intake
                .rollback(&ctx.file_intake, &QUESTIONNAIRE_UPLOADS, &auth.id)
                .await;
            return Err(e);
        }
    };

    let questionnaire = match ctx
        .questionnaires
        .create(&auth.id, fields, stored_files(&intake))
        .await
    {
        Ok(questionnaire) => questionnaire,
        Err(e) => {
            intake
                .rollback(&ctx.file_intake, &QUESTIONNAIRE_UPLOADS, &auth.id)
                .await;
            return Err(e);
        }
    };
    ctx.file_intake.reset_counters(&QUESTIONNAIRE_UPLOADS, &auth.id);

    Ok((
        StatusCode::CREATED,
        ApiResponse::ok("Questionnaire submitted", questionnaire),
    ))
}

async fn update(
    State(ctx): State<AppContext>,
    auth: AuthAccount,
    Path(id): Path<String>,
    multipart: Multipart,
) -> ApiResult<ApiResponse<Questionnaire>> {
    let existing = ctx.questionnaires.get(&id).await?;
    require_owner_or_admin(&auth, &existing)?;

    let intake =
        collect_multipart(multipart, &ctx.file_intake, &QUESTIONNAIRE_UPLOADS, &auth.id).await?;

    let fields = match parse_fields(&intake) {
        Ok(fields) => fields,
        Err(e) => {
            intake
                .rollback(&ctx.file_intake, &QUESTIONNAIRE_UPLOADS, &auth.id)
                .await;
            return Err(e);
        }
    };

    let updated = match ctx
        .questionnaires
        .update(&id, fields, stored_files(&intake))
        .await
    {
        Ok(updated) => updated,
        Err(e) => {
            intake
                .rollback(&ctx.file_intake, &QUESTIONNAIRE_UPLOADS, &auth.id)
                .await;
            return Err(e);
        }
    };
    ctx.file_intake.reset_counters(&QUESTIONNAIRE_UPLOADS, &auth.id);

    Ok(ApiResponse::ok("Questionnaire updated", updated))
}

async fn update_status(
    State(ctx): State<AppContext>,
    auth: AuthAccount,
    Path(id): Path<String>,
    axum::Json(request): axum::Json<StatusRequest>,
) -> ApiResult<ApiResponse<Questionnaire>> {
    require_role!(auth, Role::Director);

    let status = ApprovalStatus::from_str(&request.status)?;
    let updated = ctx
        .questionnaires
        .update_status(&id, status, request.note)
        .await?;
    Ok(ApiResponse::ok("Review recorded", updated))
}

async fn get_one(
    State(ctx): State<AppContext>,
    auth: AuthAccount,
    Path(id): Path<String>,
) -> ApiResult<ApiResponse<Questionnaire>> {
    let questionnaire = ctx.questionnaires.get(&id).await?;
    require_owner_or_reviewer(&auth, &questionnaire)?;
    Ok(ApiResponse::ok("Questionnaire", questionnaire))
}

async fn list(
    State(ctx): State<AppContext>,
    auth: AuthAccount,
    Query(params): Query<PageParams>,
) -> ApiResult<ApiResponse<Vec<Questionnaire>>> {
    require_role!(auth, Role::Director);

    let page = PageRequest::new(params.page, params.limit, DEFAULT_PAGE_SIZE);
    let (rows, total) = match params.status {
        Some(status) => {
            let status = ApprovalStatus::from_str(&status)?;
            ctx.questionnaires.list_by_status(status, page).await?
        }
        None => ctx.questionnaires.list(page).await?,
    };

    Ok(ApiResponse::paginated(
        "Questionnaires",
        rows,
        Pagination::new(page, total),
    ))
}

async fn list_mine(
    State(ctx): State<AppContext>,
    auth: AuthAccount,
) -> ApiResult<ApiResponse<Vec<Questionnaire>>> {
    let rows = ctx.questionnaires.list_by_account(&auth.id).await?;
    Ok(ApiResponse::ok("Your questionnaires", rows))
}

async fn delete(
    State(ctx): State<AppContext>,
    auth: AuthAccount,
    Path(id): Path<String>,
) -> ApiResult<ApiResponse<()>> {
    require_role!(auth, Role::Director);

    let urls = ctx.questionnaires.delete(&id).await?;
    ctx.file_intake.remove(&urls).await;

    Ok(ApiResponse::message("Questionnaire deleted"))
}

fn require_owner_or_admin(auth: &AuthAccount, questionnaire: &Questionnaire) -> ApiResult<()> {
    if auth.id == questionnaire.account_id || auth.is_admin() {
        Ok(())
    } else {
        Err(ApiError::Authorization(
            "You can only manage your own questionnaires".to_string(),
        ))
    }
}

/// Owners see their own submissions; directors and above see all
fn require_owner_or_reviewer(auth: &AuthAccount, questionnaire: &Questionnaire) -> ApiResult<()> {
    if auth.id == questionnaire.account_id || auth.role.can_act_as(Role::Director) {
        Ok(())
    } else {
        Err(ApiError::Authorization(
            "You can only view your own questionnaires".to_string(),
        ))
    }
}

fn parse_fields(intake: &MultipartIntake) -> ApiResult<QuestionnaireFields> {
    Ok(QuestionnaireFields {
        project_sector: intake.required("projectSector")?,
        targeted_market: intake.required("targetedMarket")?,
        commercialisation_timeline: intake.required("commercialisationTimeline")?,
        expected_investment: intake.required("expectedInvestment")?,
        investment_type: intake.required("investmentType")?,
        research_title: intake.required("researchTitle")?,
        research_gaps: intake.required("researchGaps")?,
        research_objectives: intake.required("researchObjectives")?,
        significance_for_country: intake.required("significanceForCountry")?,
        novelty: intake.required("novelty")?,
        duration_in_months: intake.required_i64("durationInMonths")?,
        market_demand: intake.required("marketDemand")?,
        current_outputs: intake.required("currentOutputs")?,
        expected_impact: intake.required("expectedImpact")?,
        total_cost: intake.required_f64("totalCost")?,
        risks_and_assumptions: intake.required("risksAndAssumptions")?,
    })
}

fn stored_files(intake: &MultipartIntake) -> QuestionnaireFiles {
    QuestionnaireFiles {
        application: intake.file_urls("applicationUrl"),
        research_plan: intake.file_urls("researchPlanUrl"),
        supporting: intake.file_urls("supportingDocumentsUrl"),
        other: intake.file_urls("otherDocumentUrl"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::{AccountManager, Channel, SignUpRequest};
    use crate::config::tests::test_config;
    use crate::db::test_pool;
    use crate::intake::{InvestmentStore, NewsStore, QuestionnaireStore};
    use crate::mailer::Mailer;
    use crate::rate_limit::RateLimiters;
    use crate::sms::SmsSender;
    use crate::uploads::FileIntake;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use std::sync::Arc;
    use tower::ServiceExt;

    async fn test_ctx(upload_dir: &std::path::Path) -> AppContext {
        let config = Arc::new(test_config());
        let pool = test_pool().await;
        AppContext {
            accounts: Arc::new(AccountManager::new(pool.clone(), config.clone())),
            questionnaires: Arc::new(QuestionnaireStore::new(pool.clone())),
            investment: Arc::new(InvestmentStore::new(pool.clone())),
            news: Arc::new(NewsStore::new(pool.clone())),
            file_intake: Arc::new(FileIntake::new(upload_dir.to_path_buf())),
            mailer: Arc::new(Mailer::new(&config).unwrap()),
            sms: Arc::new(SmsSender::new(&config)),
            rate_limiters: Arc::new(RateLimiters::new(&config.rate_limit)),
            db: pool,
            config,
        }
    }

    async fn signed_in_token(ctx: &AppContext) -> String {
        let (account, otps) = ctx
            .accounts
            .register(SignUpRequest {
                first_name: "Ada".to_string(),
                last_name: "Lovelace".to_string(),
                email: "ada@example.com".to_string(),
                mobile: "+4915112345678".to_string(),
                password: "Abcd1234!".to_string(),
                confirm_password: "Abcd1234!".to_string(),
            })
            .await
            .unwrap();
        ctx.accounts
            .verify_channel(&account.email, &otps.email_otp.unwrap(), Channel::Email)
            .await
            .unwrap();
        let (_, token) = ctx
            .accounts
            .sign_in("ada@example.com", "Abcd1234!")
            .await
            .unwrap();
        token
    }

    fn multipart_submission(boundary: &str) -> String {
        let mut body = String::new();
        for (name, value) in [
            ("projectSector", "Agriculture"),
            ("targetedMarket", "Domestic"),
            ("commercialisationTimeline", "12 months"),
            ("expectedInvestment", "Seed"),
            ("investmentType", "Equity"),
            ("researchTitle", "Drip irrigation"),
            ("researchGaps", "Gaps"),
            ("researchObjectives", "Objectives"),
            ("significanceForCountry", "High"),
            ("novelty", "Novel"),
            ("durationInMonths", "18"),
            ("marketDemand", "Strong"),
            ("currentOutputs", "Prototype"),
            ("expectedImpact", "Jobs"),
            ("totalCost", "250000"),
            ("risksAndAssumptions", "Weather"),
        ] {
            body.push_str(&format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            ));
        }
        body.push_str(&format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"applicationUrl\"; \
             filename=\"proposal.pdf\"\r\nContent-Type: application/pdf\r\n\r\n\
             %PDF-1.4 test\r\n--{boundary}--\r\n"
        ));
        body
    }

    fn count_files(dir: &std::path::Path) -> usize {
        let mut count = 0;
        if let Ok(entries) = std::fs::read_dir(dir) {
            for entry in entries.flatten() {
                let path = entry.path();
                if path.is_dir() {
                    count += count_files(&path);
                } else {
                    count += 1;
                }
            }
        }
        count
    }

    fn submission_request(boundary: &str, token: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/")
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", boundary),
            )
            .body(Body::from(multipart_submission(boundary)))
            .unwrap()
    }

    #[tokio::test]
    async fn test_submission_stores_files_and_record() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = test_ctx(dir.path()).await;
        let token = signed_in_token(&ctx).await;

        let response = routes()
            .with_state(ctx.clone())
            .oneshot(submission_request("X-INTAKE-TEST", &token))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(count_files(dir.path()), 1);

        let page = PageRequest::new(None, None, 10);
        let (rows, total) = ctx.questionnaires.list(page).await.unwrap();
        assert_eq!((rows.len(), total), (1, 1));
        assert_eq!(rows[0].all_file_urls().len(), 1);
    }

    #[tokio::test]
    async fn test_store_failure_removes_written_uploads() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = test_ctx(dir.path()).await;
        let token = signed_in_token(&ctx).await;

        // Make the insert fail after the upload has been written to disk
        sqlx::query("DROP TABLE questionnaires")
            .execute(&ctx.db)
            .await
            .unwrap();

        let response = routes()
            .with_state(ctx)
            .oneshot(submission_request("X-INTAKE-TEST", &token))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(count_files(dir.path()), 0);
    }
}
