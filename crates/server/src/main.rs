use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    routing::{get, post, put},
    Json, Router,
};
use server_api::{
    create_board, create_column, current_account, delete_board, get_board, list_boards,
    rename_board, rename_column,
    session::{verify_token, SessionConfig},
    upsert_item, ApiContext,
};
use shared::{
    domain::{Account, AccountId, BoardId, ColumnId},
    error::{ApiError, ErrorCode},
    protocol::{
        BoardPayload, BoardSummary, ColumnPayload, CreateBoardRequest, CreateColumnRequest,
        ItemMutation, RenameRequest, UpsertItemResponse,
    },
};
use storage::Storage;
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod config;

use config::{load_settings, prepare_database_url, DEV_SESSION_SECRET};

const MAX_BODY_BYTES: usize = 64 * 1024;

type HttpError = (StatusCode, Json<ApiError>);
type HttpResult<T> = Result<T, HttpError>;

#[derive(Clone)]
struct AppState {
    api: ApiContext,
    session: SessionConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let settings = load_settings();
    if settings.session_secret == DEV_SESSION_SECRET {
        warn!("APP__SESSION_SECRET is not set; using the development secret");
    }

    let database_url = prepare_database_url(&settings.database_url)?;
    let storage = Storage::new(&database_url).await.map_err(|error| {
        error!(
            %database_url,
            %error,
            "failed to open SQLite database; verify parent directory exists and permissions are correct"
        );
        error
    })?;

    let state = AppState {
        api: ApiContext { storage },
        session: SessionConfig {
            secret: settings.session_secret,
            ttl_seconds: settings.session_ttl_seconds,
        },
    };
    let app = build_router(Arc::new(state));

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, "server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/me", get(http_me))
        .route("/boards", get(http_list_boards).post(http_create_board))
        .route("/boards/:board_id", get(http_get_board).delete(http_delete_board))
        .route("/boards/:board_id/name", put(http_rename_board))
        .route("/boards/:board_id/columns", post(http_create_column))
        .route("/boards/:board_id/items", post(http_upsert_item))
        .route("/columns/:column_id/name", put(http_rename_column))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .with_state(state)
}

async fn healthz(State(state): State<Arc<AppState>>) -> HttpResult<&'static str> {
    state.api.storage.health_check().await.map_err(|e| {
        error!(error = %e, "storage health check failed");
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ApiError::new(ErrorCode::Internal, "storage unavailable")),
        )
    })?;
    Ok("ok")
}

async fn http_me(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> HttpResult<Json<Account>> {
    let account_id = authenticate(&state, &headers)?;
    let account = current_account(&state.api, &account_id)
        .await
        .map_err(api_error)?;
    Ok(Json(account))
}

async fn http_list_boards(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> HttpResult<Json<Vec<BoardSummary>>> {
    let owner = authenticate(&state, &headers)?;
    let boards = list_boards(&state.api, &owner).await.map_err(api_error)?;
    Ok(Json(boards))
}

async fn http_create_board(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<CreateBoardRequest>,
) -> HttpResult<Json<BoardSummary>> {
    let owner = authenticate(&state, &headers)?;
    let board = create_board(&state.api, &owner, &req.name, req.color.as_deref())
        .await
        .map_err(api_error)?;
    Ok(Json(board))
}

async fn http_delete_board(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(board_id): Path<i64>,
) -> HttpResult<StatusCode> {
    let owner = authenticate(&state, &headers)?;
    delete_board(&state.api, &owner, BoardId(board_id))
        .await
        .map_err(api_error)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn http_get_board(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(board_id): Path<i64>,
) -> HttpResult<Json<BoardPayload>> {
    let owner = authenticate(&state, &headers)?;
    let board = get_board(&state.api, &owner, BoardId(board_id))
        .await
        .map_err(api_error)?;
    Ok(Json(board))
}

async fn http_rename_board(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(board_id): Path<i64>,
    Json(req): Json<RenameRequest>,
) -> HttpResult<StatusCode> {
    let owner = authenticate(&state, &headers)?;
    rename_board(&state.api, &owner, BoardId(board_id), &req.name)
        .await
        .map_err(api_error)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn http_create_column(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(board_id): Path<i64>,
    Json(req): Json<CreateColumnRequest>,
) -> HttpResult<Json<ColumnPayload>> {
    let owner = authenticate(&state, &headers)?;
    let column = create_column(&state.api, &owner, BoardId(board_id), &req.name)
        .await
        .map_err(api_error)?;
    Ok(Json(column))
}

async fn http_rename_column(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(column_id): Path<String>,
    Json(req): Json<RenameRequest>,
) -> HttpResult<StatusCode> {
    let owner = authenticate(&state, &headers)?;
    rename_column(&state.api, &owner, &ColumnId(column_id), &req.name)
        .await
        .map_err(api_error)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn http_upsert_item(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(board_id): Path<i64>,
    Json(req): Json<ItemMutation>,
) -> HttpResult<Json<UpsertItemResponse>> {
    let owner = authenticate(&state, &headers)?;
    let id = upsert_item(&state.api, &owner, BoardId(board_id), &req)
        .await
        .map_err(api_error)?;
    Ok(Json(UpsertItemResponse { id }))
}

fn authenticate(state: &AppState, headers: &HeaderMap) -> HttpResult<AccountId> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(bearer_token)
        .ok_or_else(|| unauthorized("missing bearer token"))?;

    verify_token(&state.session, token).map_err(|e| {
        warn!(error = %e, "rejected session token");
        unauthorized("invalid or expired session token")
    })
}

/// Auth schemes are case-insensitive.
fn bearer_token(value: &str) -> Option<&str> {
    let (scheme, token) = value.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

fn unauthorized(message: &str) -> HttpError {
    (
        StatusCode::UNAUTHORIZED,
        Json(ApiError::new(ErrorCode::Unauthorized, message)),
    )
}

fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
        ErrorCode::Forbidden => StatusCode::FORBIDDEN,
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::Validation => StatusCode::BAD_REQUEST,
        ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn api_error(error: ApiError) -> HttpError {
    if error.code == ErrorCode::Internal {
        error!(message = %error.message, "request failed");
    }
    (status_for(error.code), Json(error))
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
