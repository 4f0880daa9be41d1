//! In-memory entity store with per-operation failure injection.

use std::{collections::HashMap, sync::Mutex};

use async_trait::async_trait;
use shared::{
    domain::{AccountId, BoardId, ColumnId, ItemId, DEFAULT_BOARD_COLOR},
    error::ErrorCode,
    protocol::{BoardPayload, BoardSummary, ColumnPayload, ItemMutation, ItemPayload},
};

use crate::{error::StoreError, transport::EntityStore};

#[derive(Default)]
pub(crate) struct FakeStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    boards: Vec<(AccountId, BoardSummary)>,
    columns: Vec<ColumnPayload>,
    items: Vec<ItemPayload>,
    next_id: u64,
    failures: HashMap<&'static str, StoreError>,
    calls: Vec<&'static str>,
}

impl Inner {
    fn record(&mut self, op: &'static str) -> Result<(), StoreError> {
        self.calls.push(op);
        match self.failures.remove(op) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{}", self.next_id)
    }

    fn owned_board(&self, board_id: BoardId, owner: &AccountId) -> Result<&BoardSummary, StoreError> {
        self.boards
            .iter()
            .find(|(account, board)| board.id == board_id && account == owner)
            .map(|(_, board)| board)
            .ok_or_else(|| StoreError::new(ErrorCode::NotFound, "board not found"))
    }

    fn owns_column(&self, column_id: &ColumnId, owner: &AccountId) -> Option<BoardId> {
        let column = self.columns.iter().find(|c| &c.id == column_id)?;
        self.owned_board(column.board_id, owner).ok()?;
        Some(column.board_id)
    }
}

impl FakeStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn seed_board(&self, owner: &AccountId, name: &str) -> BoardId {
        let mut inner = self.inner.lock().expect("lock");
        let id = BoardId(inner.boards.len() as i64 + 1);
        inner.boards.push((
            owner.clone(),
            BoardSummary {
                id,
                name: name.to_string(),
                color: DEFAULT_BOARD_COLOR.to_string(),
                created_at: None,
            },
        ));
        id
    }

    pub(crate) fn seed_column(&self, board_id: BoardId, name: &str, order: f64) -> ColumnId {
        let mut inner = self.inner.lock().expect("lock");
        let id = ColumnId(inner.next_id("col"));
        inner.columns.push(ColumnPayload {
            id: id.clone(),
            board_id,
            name: name.to_string(),
            order,
        });
        id
    }

    pub(crate) fn seed_item(&self, board_id: BoardId, column_id: &ColumnId, title: &str, order: f64) -> ItemId {
        let mut inner = self.inner.lock().expect("lock");
        let id = ItemId(inner.next_id("item"));
        inner.items.push(ItemPayload {
            id: id.clone(),
            board_id,
            column_id: column_id.clone(),
            title: title.to_string(),
            content: None,
            order,
        });
        id
    }

    pub(crate) fn fail_next(&self, op: &'static str, code: ErrorCode) {
        self.inner
            .lock()
            .expect("lock")
            .failures
            .insert(op, StoreError::new(code, format!("{op} rejected")));
    }

    pub(crate) fn calls(&self) -> Vec<&'static str> {
        self.inner.lock().expect("lock").calls.clone()
    }

    pub(crate) fn items(&self) -> Vec<ItemPayload> {
        self.inner.lock().expect("lock").items.clone()
    }

    pub(crate) fn column_name(&self, column_id: &ColumnId) -> Option<String> {
        self.inner
            .lock()
            .expect("lock")
            .columns
            .iter()
            .find(|c| &c.id == column_id)
            .map(|c| c.name.clone())
    }
}

#[async_trait]
impl EntityStore for FakeStore {
    async fn get_board(&self, board_id: BoardId, owner: &AccountId) -> Result<BoardPayload, StoreError> {
        let mut inner = self.inner.lock().expect("lock");
        inner.record("get_board")?;
        let board = inner.owned_board(board_id, owner)?.clone();
        Ok(BoardPayload {
            id: board.id,
            account_id: owner.clone(),
            name: board.name,
            color: board.color,
            columns: inner
                .columns
                .iter()
                .filter(|c| c.board_id == board_id)
                .cloned()
                .collect(),
            items: inner
                .items
                .iter()
                .filter(|i| i.board_id == board_id)
                .cloned()
                .collect(),
        })
    }

    async fn create_column(
        &self,
        board_id: BoardId,
        name: &str,
        owner: &AccountId,
    ) -> Result<ColumnPayload, StoreError> {
        let mut inner = self.inner.lock().expect("lock");
        inner.record("create_column")?;
        inner.owned_board(board_id, owner)?;
        let order = inner.columns.iter().filter(|c| c.board_id == board_id).count() as f64 + 1.0;
        let column = ColumnPayload {
            id: ColumnId(inner.next_id("col")),
            board_id,
            name: name.to_string(),
            order,
        };
        inner.columns.push(column.clone());
        Ok(column)
    }

    async fn update_column_name(
        &self,
        column_id: &ColumnId,
        name: &str,
        owner: &AccountId,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().expect("lock");
        inner.record("update_column_name")?;
        inner
            .owns_column(column_id, owner)
            .ok_or_else(|| StoreError::new(ErrorCode::NotFound, "column not found"))?;
        if let Some(column) = inner.columns.iter_mut().find(|c| &c.id == column_id) {
            column.name = name.to_string();
        }
        Ok(())
    }

    async fn upsert_item(
        &self,
        item: &ItemMutation,
        owner: &AccountId,
        board_id: BoardId,
    ) -> Result<ItemId, StoreError> {
        let mut inner = self.inner.lock().expect("lock");
        inner.record("upsert_item")?;
        if inner.owns_column(&item.column_id, owner) != Some(board_id) {
            return Err(StoreError::new(ErrorCode::NotFound, "column not found"));
        }

        match &item.id {
            Some(id) => {
                let owned_boards: Vec<BoardId> = inner
                    .boards
                    .iter()
                    .filter(|(account, _)| account == owner)
                    .map(|(_, board)| board.id)
                    .collect();
                match inner.items.iter().position(|i| &i.id == id) {
                    Some(index) if owned_boards.contains(&inner.items[index].board_id) => {
                        let existing = &mut inner.items[index];
                        existing.board_id = board_id;
                        existing.column_id = item.column_id.clone();
                        existing.order = item.order;
                        existing.title = item.title.clone();
                    }
                    Some(_) => return Err(StoreError::new(ErrorCode::NotFound, "item not found")),
                    None => inner.items.push(ItemPayload {
                        id: id.clone(),
                        board_id,
                        column_id: item.column_id.clone(),
                        title: item.title.clone(),
                        content: None,
                        order: item.order,
                    }),
                }
                Ok(id.clone())
            }
            None => {
                let id = ItemId(inner.next_id("item"));
                inner.items.push(ItemPayload {
                    id: id.clone(),
                    board_id,
                    column_id: item.column_id.clone(),
                    title: item.title.clone(),
                    content: None,
                    order: item.order,
                });
                Ok(id)
            }
        }
    }

    async fn update_board_name(
        &self,
        board_id: BoardId,
        name: &str,
        owner: &AccountId,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().expect("lock");
        inner.record("update_board_name")?;
        inner.owned_board(board_id, owner)?;
        if let Some((_, board)) = inner.boards.iter_mut().find(|(_, b)| b.id == board_id) {
            board.name = name.to_string();
        }
        Ok(())
    }

    async fn create_board(
        &self,
        name: &str,
        color: Option<&str>,
        owner: &AccountId,
    ) -> Result<BoardSummary, StoreError> {
        let mut inner = self.inner.lock().expect("lock");
        inner.record("create_board")?;
        let board = BoardSummary {
            id: BoardId(inner.boards.len() as i64 + 1),
            name: name.to_string(),
            color: color.unwrap_or(DEFAULT_BOARD_COLOR).to_string(),
            created_at: None,
        };
        inner.boards.push((owner.clone(), board.clone()));
        Ok(board)
    }

    async fn delete_board(&self, board_id: BoardId, owner: &AccountId) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().expect("lock");
        inner.record("delete_board")?;
        inner.owned_board(board_id, owner)?;
        inner.boards.retain(|(_, b)| b.id != board_id);
        inner.columns.retain(|c| c.board_id != board_id);
        inner.items.retain(|i| i.board_id != board_id);
        Ok(())
    }

    async fn get_boards_for_user(&self, owner: &AccountId) -> Result<Vec<BoardSummary>, StoreError> {
        let mut inner = self.inner.lock().expect("lock");
        inner.record("get_boards_for_user")?;
        Ok(inner
            .boards
            .iter()
            .filter(|(account, _)| account == owner)
            .map(|(_, board)| board.clone())
            .collect())
    }
}
