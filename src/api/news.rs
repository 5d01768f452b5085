/// News routes: a public feed of active posts plus administrative CRUD
use super::{ApiResponse, PageParams, Pagination};
use crate::account::Role;
use crate::auth::AuthAccount;
use crate::context::AppContext;
use crate::db::models::News;
use crate::error::ApiResult;
use crate::intake::news::{NewsInput, NewsUpdate, NEWS_DEFAULT_PAGE_SIZE};
use crate::intake::PageRequest;
use crate::require_role;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/", get(list_active).post(create))
        .route("/all", get(list_all))
        .route("/:id", get(get_one).patch(update).delete(delete))
}

/// Public feed, no authentication required
async fn list_active(
    State(ctx): State<AppContext>,
    Query(params): Query<PageParams>,
) -> ApiResult<ApiResponse<Vec<News>>> {
    let page = PageRequest::new(params.page, params.limit, NEWS_DEFAULT_PAGE_SIZE);
    let (rows, total) = ctx.news.list_active(page).await?;

    Ok(ApiResponse::paginated(
        "News",
        rows,
        Pagination::new(page, total),
    ))
}

async fn list_all(
    State(ctx): State<AppContext>,
    auth: AuthAccount,
    Query(params): Query<PageParams>,
) -> ApiResult<ApiResponse<Vec<News>>> {
    require_role!(auth, Role::Admin);

    let page = PageRequest::new(params.page, params.limit, NEWS_DEFAULT_PAGE_SIZE);
    let (rows, total) = ctx.news.list_all(page).await?;

    Ok(ApiResponse::paginated(
        "News",
        rows,
        Pagination::new(page, total),
    ))
}

async fn get_one(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> ApiResult<ApiResponse<News>> {
    let post = ctx.news.get(&id).await?;
    Ok(ApiResponse::ok("News post", post))
}

async fn create(
    State(ctx): State<AppContext>,
    auth: AuthAccount,
    Json(input): Json<NewsInput>,
) -> ApiResult<impl IntoResponse> {
    require_role!(auth, Role::Director);

    let post = ctx.news.create(&auth.id, input).await?;
    Ok((StatusCode::CREATED, ApiResponse::ok("News post created", post)))
}

async fn update(
    State(ctx): State<AppContext>,
    auth: AuthAccount,
    Path(id): Path<String>,
    Json(update): Json<NewsUpdate>,
) -> ApiResult<ApiResponse<News>> {
    require_role!(auth, Role::Director);

    let post = ctx.news.update(&id, update).await?;
    Ok(ApiResponse::ok("News post updated", post))
}

async fn delete(
    State(ctx): State<AppContext>,
    auth: AuthAccount,
    Path(id): Path<String>,
) -> ApiResult<ApiResponse<()>> {
    require_role!(auth, Role::Admin);

    ctx.news.delete(&id).await?;
    Ok(ApiResponse::message("News post deleted"))
}
