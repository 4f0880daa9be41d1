use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use super::*;
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode as HttpStatus},
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use shared::domain::DEFAULT_BOARD_COLOR;
use tokio::net::TcpListener;

const TOKEN: &str = "good-token";

#[derive(Clone)]
struct StubState {
    requests: Arc<AtomicUsize>,
    last_item: Arc<std::sync::Mutex<Option<ItemMutation>>>,
}

fn account() -> Account {
    Account {
        id: AccountId::from("acct-1"),
        email: "owner@example.com".to_string(),
    }
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("Bearer {TOKEN}"))
}

fn unauthorized() -> axum::response::Response {
    (
        HttpStatus::UNAUTHORIZED,
        Json(ApiError::new(ErrorCode::Unauthorized, "invalid token")),
    )
        .into_response()
}

async fn me(State(state): State<StubState>, headers: HeaderMap) -> axum::response::Response {
    state.requests.fetch_add(1, Ordering::SeqCst);
    if !authorized(&headers) {
        return unauthorized();
    }
    Json(account()).into_response()
}

async fn board(
    State(state): State<StubState>,
    headers: HeaderMap,
    Path(board_id): Path<i64>,
) -> axum::response::Response {
    state.requests.fetch_add(1, Ordering::SeqCst);
    if !authorized(&headers) {
        return unauthorized();
    }
    if board_id != 1 {
        return (
            HttpStatus::NOT_FOUND,
            Json(ApiError::not_found("board not found")),
        )
            .into_response();
    }
    Json(BoardPayload {
        id: BoardId(1),
        account_id: account().id,
        name: "Roadmap".to_string(),
        color: DEFAULT_BOARD_COLOR.to_string(),
        columns: Vec::new(),
        items: Vec::new(),
    })
    .into_response()
}

async fn items(
    State(state): State<StubState>,
    headers: HeaderMap,
    Json(item): Json<ItemMutation>,
) -> axum::response::Response {
    state.requests.fetch_add(1, Ordering::SeqCst);
    if !authorized(&headers) {
        return unauthorized();
    }
    *state.last_item.lock().expect("lock") = Some(item);
    Json(UpsertItemResponse {
        id: ItemId::from("item-9"),
    })
    .into_response()
}

async fn rename_board(State(state): State<StubState>) -> axum::response::Response {
    state.requests.fetch_add(1, Ordering::SeqCst);
    (HttpStatus::BAD_GATEWAY, "upstream exploded").into_response()
}

async fn rename_column(State(state): State<StubState>) -> axum::response::Response {
    state.requests.fetch_add(1, Ordering::SeqCst);
    (
        HttpStatus::FORBIDDEN,
        Json(ApiError::new(ErrorCode::Forbidden, "not your column")),
    )
        .into_response()
}

async fn spawn_stub() -> (String, StubState) {
    let state = StubState {
        requests: Arc::new(AtomicUsize::new(0)),
        last_item: Arc::new(std::sync::Mutex::new(None)),
    };
    let app = Router::new()
        .route("/me", get(me))
        .route("/boards/:board_id", get(board))
        .route("/boards/:board_id/items", post(items))
        .route("/boards/:board_id/name", put(rename_board))
        .route("/columns/:column_id/name", put(rename_column))
        .with_state(state.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    (format!("http://{addr}"), state)
}

#[tokio::test]
async fn connect_learns_the_account_behind_the_token() {
    let (server_url, _state) = spawn_stub().await;

    let store = HttpEntityStore::connect(&server_url, TOKEN)
        .await
        .expect("connect");
    assert_eq!(store.account(), &account());
    assert_eq!(store.current_user_id(), Some(account().id));

    let board = store
        .get_board(BoardId(1), &account().id)
        .await
        .expect("board");
    assert_eq!(board.name, "Roadmap");
}

#[tokio::test]
async fn bad_token_is_unauthorized() {
    let (server_url, _state) = spawn_stub().await;

    let Err(error) = HttpEntityStore::connect(&server_url, "forged").await else {
        panic!("connect should fail");
    };
    assert_eq!(error.code, ErrorCode::Unauthorized);
}

#[tokio::test]
async fn upsert_posts_the_item_and_returns_its_id() {
    let (server_url, state) = spawn_stub().await;
    let store = HttpEntityStore::connect(&server_url, TOKEN)
        .await
        .expect("connect");

    let mutation = ItemMutation {
        id: None,
        column_id: ColumnId::from("col-1"),
        order: 1.5,
        title: "ship it".to_string(),
    };
    let id = store
        .upsert_item(&mutation, &account().id, BoardId(1))
        .await
        .expect("upsert");

    assert_eq!(id, ItemId::from("item-9"));
    assert_eq!(
        state.last_item.lock().expect("lock").as_ref(),
        Some(&mutation)
    );
}

#[tokio::test]
async fn server_errors_keep_their_codes() {
    let (server_url, _state) = spawn_stub().await;
    let store = HttpEntityStore::connect(&server_url, TOKEN)
        .await
        .expect("connect");
    let owner = account().id;

    let missing = store
        .get_board(BoardId(2), &owner)
        .await
        .expect_err("missing board");
    assert_eq!(missing.code, ErrorCode::NotFound);
    assert_eq!(missing.message, "board not found");

    let forbidden = store
        .update_column_name(&ColumnId::from("col-1"), "Mine", &owner)
        .await
        .expect_err("forbidden");
    assert!(forbidden.is_not_found_or_forbidden());

    let opaque = store
        .update_board_name(BoardId(1), "Renamed", &owner)
        .await
        .expect_err("bad gateway");
    assert_eq!(opaque.code, ErrorCode::Internal);
}

#[tokio::test]
async fn foreign_owner_is_refused_without_a_request() {
    let (server_url, state) = spawn_stub().await;
    let store = HttpEntityStore::connect(&server_url, TOKEN)
        .await
        .expect("connect");
    let before = state.requests.load(Ordering::SeqCst);

    let error = store
        .get_board(BoardId(1), &AccountId::from("someone-else"))
        .await
        .expect_err("foreign owner");

    assert_eq!(error.code, ErrorCode::Forbidden);
    assert_eq!(state.requests.load(Ordering::SeqCst), before);
}

#[test]
fn base_url_keeps_path_prefixes() {
    let url = base_url("http://localhost:8080/api").expect("url");
    assert_eq!(url.join("boards/1").expect("join").as_str(), "http://localhost:8080/api/boards/1");

    let invalid = base_url("not a url").expect_err("invalid");
    assert_eq!(invalid.code, ErrorCode::Validation);
}
