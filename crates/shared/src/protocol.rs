use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{AccountId, BoardId, ColumnId, ItemId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardSummary {
    pub id: BoardId,
    pub name: String,
    pub color: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnPayload {
    pub id: ColumnId,
    pub board_id: BoardId,
    pub name: String,
    pub order: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemPayload {
    pub id: ItemId,
    pub board_id: BoardId,
    pub column_id: ColumnId,
    pub title: String,
    #[serde(default)]
    pub content: Option<String>,
    pub order: f64,
}

/// A board with its columns and items as stored: flat, in storage order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardPayload {
    pub id: BoardId,
    pub account_id: AccountId,
    pub name: String,
    pub color: String,
    pub columns: Vec<ColumnPayload>,
    pub items: Vec<ItemPayload>,
}

/// Create-or-replace request for a card. Without `id` the store mints one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemMutation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ItemId>,
    pub column_id: ColumnId,
    pub order: f64,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpsertItemResponse {
    pub id: ItemId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBoardRequest {
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateColumnRequest {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenameRequest {
    pub name: String,
}
