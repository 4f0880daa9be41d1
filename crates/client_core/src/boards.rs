//! The account's board list, with optimistic removal.

use std::collections::HashSet;

use shared::{
    domain::{AccountId, BoardId},
    protocol::BoardSummary,
};
use tracing::{info, warn};

use crate::{
    error::{MutationError, StoreError},
    transport::EntityStore,
};

#[derive(Debug, Clone, Default)]
pub struct BoardList {
    confirmed: Vec<BoardSummary>,
    pending_removals: HashSet<BoardId>,
}

impl BoardList {
    pub fn new(confirmed: Vec<BoardSummary>) -> Self {
        Self {
            confirmed,
            pending_removals: HashSet::new(),
        }
    }

    pub async fn load<S>(store: &S, owner: &AccountId) -> Result<Self, MutationError>
    where
        S: EntityStore + ?Sized,
    {
        Ok(Self::new(store.get_boards_for_user(owner).await?))
    }

    /// Boards to show: confirmed minus those being removed.
    pub fn visible(&self) -> Vec<&BoardSummary> {
        self.confirmed
            .iter()
            .filter(|board| !self.pending_removals.contains(&board.id))
            .collect()
    }

    /// Hides the board immediately. `false` if it is not listed or already
    /// being removed.
    pub fn remove(&mut self, board_id: BoardId) -> bool {
        if !self.confirmed.iter().any(|board| board.id == board_id) {
            return false;
        }
        self.pending_removals.insert(board_id)
    }

    /// A failed removal keeps the board hidden until the next `replace`.
    pub fn settle_removal(
        &mut self,
        board_id: BoardId,
        result: Result<(), StoreError>,
    ) -> Result<(), MutationError> {
        match result {
            Ok(()) => {
                info!(board_id = board_id.0, "board removed");
                Ok(())
            }
            Err(error) => {
                warn!(board_id = board_id.0, error = %error, "board removal failed");
                Err(error.into())
            }
        }
    }

    pub fn replace(&mut self, confirmed: Vec<BoardSummary>) {
        self.confirmed = confirmed;
        self.pending_removals.clear();
    }

    /// Remove, confirm, then reload the list.
    pub async fn delete<S>(
        &mut self,
        store: &S,
        owner: &AccountId,
        board_id: BoardId,
    ) -> Result<(), MutationError>
    where
        S: EntityStore + ?Sized,
    {
        if !self.remove(board_id) {
            return Err(MutationError::NotFoundOrForbidden(format!(
                "board {board_id} is not listed"
            )));
        }
        let result = store.delete_board(board_id, owner).await;
        self.settle_removal(board_id, result)?;
        self.replace(store.get_boards_for_user(owner).await?);
        Ok(())
    }
}
