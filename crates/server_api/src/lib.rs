pub mod session;

use shared::{
    domain::{Account, AccountId, BoardId, ColumnId, ItemId, DEFAULT_BOARD_COLOR},
    error::{ApiError, ErrorCode},
    protocol::{BoardPayload, BoardSummary, ColumnPayload, ItemMutation, ItemPayload},
};
use storage::{Storage, StoredBoard, StoredColumn};
use tracing::info;

#[derive(Clone)]
pub struct ApiContext {
    pub storage: Storage,
}

pub async fn create_account(ctx: &ApiContext, email: &str) -> Result<Account, ApiError> {
    let email = required(email, "email")?;
    if !email.contains('@') {
        return Err(ApiError::validation("email must contain '@'"));
    }
    let existing = ctx
        .storage
        .account_by_email(email)
        .await
        .map_err(internal)?;
    if existing.is_some() {
        return Err(ApiError::validation(
            "an account with this email already exists",
        ));
    }
    let account = ctx.storage.create_account(email).await.map_err(internal)?;
    info!(account_id = %account.id, "account created");
    Ok(account)
}

pub async fn current_account(ctx: &ApiContext, account_id: &AccountId) -> Result<Account, ApiError> {
    ctx.storage
        .account(account_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| ApiError::new(ErrorCode::Unauthorized, "unknown account"))
}

pub async fn list_boards(ctx: &ApiContext, owner: &AccountId) -> Result<Vec<BoardSummary>, ApiError> {
    let boards = ctx
        .storage
        .list_boards_for_account(owner)
        .await
        .map_err(internal)?;
    Ok(boards.into_iter().map(board_summary).collect())
}

pub async fn create_board(
    ctx: &ApiContext,
    owner: &AccountId,
    name: &str,
    color: Option<&str>,
) -> Result<BoardSummary, ApiError> {
    let name = required(name, "name")?;
    let color = color
        .map(str::trim)
        .filter(|color| !color.is_empty())
        .unwrap_or(DEFAULT_BOARD_COLOR);
    let board = ctx
        .storage
        .create_board(owner, name, color)
        .await
        .map_err(internal)?;
    info!(board_id = board.board_id.0, account_id = %owner, "board created");
    Ok(board_summary(board))
}

pub async fn delete_board(ctx: &ApiContext, owner: &AccountId, board_id: BoardId) -> Result<(), ApiError> {
    let deleted = ctx
        .storage
        .delete_board(board_id, owner)
        .await
        .map_err(internal)?;
    if !deleted {
        return Err(board_not_found());
    }
    info!(board_id = board_id.0, account_id = %owner, "board deleted");
    Ok(())
}

pub async fn get_board(ctx: &ApiContext, owner: &AccountId, board_id: BoardId) -> Result<BoardPayload, ApiError> {
    let contents = ctx
        .storage
        .load_board(board_id, owner)
        .await
        .map_err(internal)?
        .ok_or_else(board_not_found)?;

    Ok(BoardPayload {
        id: contents.board.board_id,
        account_id: contents.board.account_id,
        name: contents.board.name,
        color: contents.board.color,
        columns: contents.columns.into_iter().map(column_payload).collect(),
        items: contents
            .items
            .into_iter()
            .map(|item| ItemPayload {
                id: item.item_id,
                board_id: item.board_id,
                column_id: item.column_id,
                title: item.title,
                content: item.content,
                order: item.order,
            })
            .collect(),
    })
}

pub async fn rename_board(
    ctx: &ApiContext,
    owner: &AccountId,
    board_id: BoardId,
    name: &str,
) -> Result<(), ApiError> {
    let name = required(name, "name")?;
    let updated = ctx
        .storage
        .update_board_name(board_id, owner, name)
        .await
        .map_err(internal)?;
    if !updated {
        return Err(board_not_found());
    }
    info!(board_id = board_id.0, "board renamed");
    Ok(())
}

pub async fn create_column(
    ctx: &ApiContext,
    owner: &AccountId,
    board_id: BoardId,
    name: &str,
) -> Result<ColumnPayload, ApiError> {
    let name = required(name, "name")?;
    let column = ctx
        .storage
        .create_column(board_id, owner, name)
        .await
        .map_err(internal)?
        .ok_or_else(board_not_found)?;
    info!(
        board_id = board_id.0,
        column_id = %column.column_id,
        order = column.order,
        "column created"
    );
    Ok(column_payload(column))
}

pub async fn rename_column(
    ctx: &ApiContext,
    owner: &AccountId,
    column_id: &ColumnId,
    name: &str,
) -> Result<(), ApiError> {
    let name = required(name, "name")?;
    let updated = ctx
        .storage
        .update_column_name(column_id, owner, name)
        .await
        .map_err(internal)?;
    if !updated {
        return Err(ApiError::not_found("column not found"));
    }
    info!(column_id = %column_id, "column renamed");
    Ok(())
}

pub async fn upsert_item(
    ctx: &ApiContext,
    owner: &AccountId,
    board_id: BoardId,
    mutation: &ItemMutation,
) -> Result<ItemId, ApiError> {
    required(&mutation.title, "title")?;
    if !mutation.order.is_finite() {
        return Err(ApiError::validation("order must be a finite number"));
    }
    if mutation.column_id.is_provisional() || mutation.id.as_ref().is_some_and(ItemId::is_provisional) {
        return Err(ApiError::validation("provisional ids cannot be persisted"));
    }

    let item_id = ctx
        .storage
        .upsert_item(board_id, owner, mutation)
        .await
        .map_err(internal)?
        .ok_or_else(|| ApiError::not_found("item or column not found"))?;
    info!(
        board_id = board_id.0,
        item_id = %item_id,
        column_id = %mutation.column_id,
        order = mutation.order,
        created = mutation.id.is_none(),
        "item upserted"
    );
    Ok(item_id)
}

fn required<'a>(value: &'a str, field: &str) -> Result<&'a str, ApiError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ApiError::validation(format!("missing {field}")));
    }
    Ok(trimmed)
}

fn board_summary(board: StoredBoard) -> BoardSummary {
    BoardSummary {
        id: board.board_id,
        name: board.name,
        color: board.color,
        created_at: Some(board.created_at),
    }
}

fn column_payload(column: StoredColumn) -> ColumnPayload {
    ColumnPayload {
        id: column.column_id,
        board_id: column.board_id,
        name: column.name,
        order: column.order,
    }
}

fn board_not_found() -> ApiError {
    ApiError::not_found("board not found")
}

fn internal(err: anyhow::Error) -> ApiError {
    ApiError::new(ErrorCode::Internal, err.to_string())
}
