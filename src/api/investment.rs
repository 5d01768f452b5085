/// Investment questionnaire routes
use super::{collect_multipart, ApiResponse, MultipartIntake, PageParams, Pagination};
use crate::account::Role;
use crate::auth::AuthAccount;
use crate::context::AppContext;
use crate::db::models::InvestmentQuestionnaire;
use crate::error::{ApiError, ApiResult};
use crate::intake::investment::InvestmentFields;
use crate::intake::PageRequest;
use crate::require_role;
use crate::uploads::INVESTMENT_UPLOADS;
use axum::{
    extract::{multipart::Multipart, DefaultBodyLimit, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Router,
};

const DEFAULT_PAGE_SIZE: u32 = 10;

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/mine", get(list_mine))
        .route("/:id", get(get_one).delete(delete))
        // Five PDFs at 10 MiB each, plus form text
        .layer(DefaultBodyLimit::max(60 * 1024 * 1024))
}

async fn create(
    State(ctx): State<AppContext>,
    auth: AuthAccount,
    multipart: Multipart,
) -> ApiResult<impl IntoResponse> {
    let intake =
        collect_multipart(multipart, &ctx.file_intake, &INVESTMENT_UPLOADS, &auth.id).await?;

    let fields = match parse_fields(&intake) {
        Ok(fields) => fields,
        Err(e) => {
            intake
                .rollback(&ctx.file_intake, &INVESTMENT_UPLOADS, &auth.id)
                .await;
            return Err(e);
        }
    };

    let questionnaire = match ctx
        .investment
        .create(&auth.id, fields, intake.file_urls("projectFile"))
        .await
    {
        Ok(questionnaire) => questionnaire,
        Err(e) => {
            intake
                .rollback(&ctx.file_intake, &INVESTMENT_UPLOADS, &auth.id)
                .await;
            return Err(e);
        }
    };
    ctx.file_intake.reset_counters(&INVESTMENT_UPLOADS, &auth.id);

    // Confirmation email is best-effort
    let account = ctx.accounts.get_account(&auth.id).await?;
    if let Err(e) = ctx
        .mailer
        .send_submission_confirmation(
            &account.email,
            &account.full_name(),
            &questionnaire.project_title,
        )
        .await
    {
        tracing::warn!(account = %auth.id, "submission confirmation email failed: {}", e);
    }

    Ok((
        StatusCode::CREATED,
        ApiResponse::ok("Investment questionnaire submitted", questionnaire),
    ))
}

async fn get_one(
    State(ctx): State<AppContext>,
    auth: AuthAccount,
    Path(id): Path<String>,
) -> ApiResult<ApiResponse<InvestmentQuestionnaire>> {
    let questionnaire = ctx.investment.get(&id).await?;
    if auth.id != questionnaire.account_id && !auth.role.can_act_as(Role::Director) {
        return Err(ApiError::Authorization(
            "You can only view your own questionnaires".to_string(),
        ));
    }
    Ok(ApiResponse::ok("Investment questionnaire", questionnaire))
}

async fn list(
    State(ctx): State<AppContext>,
    auth: AuthAccount,
    Query(params): Query<PageParams>,
) -> ApiResult<ApiResponse<Vec<InvestmentQuestionnaire>>> {
    require_role!(auth, Role::Director);

    let page = PageRequest::new(params.page, params.limit, DEFAULT_PAGE_SIZE);
    let (rows, total) = ctx.investment.list(page).await?;

    Ok(ApiResponse::paginated(
        "Investment questionnaires",
        rows,
        Pagination::new(page, total),
    ))
}

async fn list_mine(
    State(ctx): State<AppContext>,
    auth: AuthAccount,
) -> ApiResult<ApiResponse<Vec<InvestmentQuestionnaire>>> {
    let rows = ctx.investment.list_by_account(&auth.id).await?;
    Ok(ApiResponse::ok("Your investment questionnaires", rows))
}

async fn delete(
    State(ctx): State<AppContext>,
    auth: AuthAccount,
    Path(id): Path<String>,
) -> ApiResult<ApiResponse<()>> {
    let existing = ctx.investment.get(&id).await?;
    if auth.id != existing.account_id && !auth.is_admin() {
        return Err(ApiError::Authorization(
            "You can only manage your own questionnaires".to_string(),
        ));
    }

    let urls = ctx.investment.delete(&id).await?;
    ctx.file_intake.remove(&urls).await;

    Ok(ApiResponse::message("Investment questionnaire deleted"))
}

fn parse_fields(intake: &MultipartIntake) -> ApiResult<InvestmentFields> {
    Ok(InvestmentFields {
        project_title: intake.required("projectTitle")?,
        investment_objectives: intake.required("investmentObjectives")?,
        market_demand: intake.required("marketDemand")?,
        government_assistance: intake.all("governmentAssistance"),
        research_gaps: intake.required("researchGaps")?,
        research_objectives: intake.required("researchObjectives")?,
        total_project_cost: intake.required_f64("totalProjectCost")?,
        country_significance: intake.required("countrySignificance")?,
        current_outputs: intake.required("currentOutputs")?,
        technology_readiness_level: intake.required("technologyReadinessLevel")?,
        publications: intake.optional("publications"),
        resources_collaborations: intake.optional("resourcesCollaborations"),
        risk_assumptions: intake.optional("riskAssumptions"),
    })
}
