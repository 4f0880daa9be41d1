//! Drag-and-drop of cards, independent of any UI toolkit.
//!
//! A drag carries a small JSON descriptor of the card; the drop decides the
//! new order from the neighbors of the card it lands on.

use serde::{Deserialize, Serialize};
use shared::{
    domain::{ColumnId, ItemId},
    order::{append_after, for_drop, DropHalf, FIRST_ORDER},
};

use crate::{
    dispatcher::MutationRequest,
    error::MutationError,
    snapshot::{BoardSnapshot, ItemSnapshot},
};

pub const TRANSFER_MIME: &str = "application/kanban-card";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferDescriptor {
    pub id: ItemId,
    pub title: String,
}

#[derive(Deserialize)]
struct RawTransfer {
    id: Option<String>,
    title: Option<String>,
}

impl TransferDescriptor {
    pub fn to_json(&self) -> String {
        serde_json::json!({ "id": self.id, "title": self.title }).to_string()
    }

    pub fn parse(raw: &str) -> Result<Self, MutationError> {
        let parsed: RawTransfer = serde_json::from_str(raw)
            .map_err(|e| MutationError::TransferPayloadInvalid(e.to_string()))?;
        let id = non_blank(parsed.id, "id")?;
        let title = non_blank(parsed.title, "title")?;
        Ok(Self {
            id: ItemId(id),
            title,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DropTarget {
    /// The column body, below any cards it has.
    EmptyColumn(ColumnId),
    Card { item_id: ItemId, half: DropHalf },
}

pub fn begin_drag(item: &ItemSnapshot) -> TransferDescriptor {
    TransferDescriptor {
        id: item.id.clone(),
        title: item.title.clone(),
    }
}

pub fn complete_drop(
    snapshot: &BoardSnapshot,
    transfer: &TransferDescriptor,
    target: DropTarget,
) -> Result<MutationRequest, MutationError> {
    let (target_column_id, order) = match target {
        DropTarget::EmptyColumn(column_id) => {
            let column = snapshot.column(&column_id).ok_or_else(|| {
                MutationError::NotFoundOrForbidden(format!("column {column_id} is not on this board"))
            })?;
            let siblings = column.sibling_orders(Some(&transfer.id));
            (column_id, append_after(siblings.last().copied()))
        }
        DropTarget::Card { item_id, half } => {
            let column = snapshot
                .columns
                .iter()
                .find(|column| column.items.iter().any(|item| item.id == item_id))
                .ok_or_else(|| {
                    MutationError::NotFoundOrForbidden(format!("card {item_id} is not on this board"))
                })?;

            let order = if item_id == transfer.id {
                snapshot
                    .item(&item_id)
                    .map_or(FIRST_ORDER, |item| item.order)
            } else {
                let siblings: Vec<_> = column
                    .items
                    .iter()
                    .filter(|item| item.id != transfer.id)
                    .collect();
                let orders: Vec<f64> = siblings.iter().map(|item| item.order).collect();
                let index = siblings
                    .iter()
                    .position(|item| item.id == item_id)
                    .unwrap_or_default();
                for_drop(&orders, index, half).value()
            };
            (column.id.clone(), order)
        }
    };

    Ok(MutationRequest::MoveCard {
        item_id: transfer.id.clone(),
        title: transfer.title.clone(),
        target_column_id,
        order,
    })
}

fn non_blank(value: Option<String>, field: &str) -> Result<String, MutationError> {
    match value {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(MutationError::TransferPayloadInvalid(format!("missing {field}"))),
    }
}

#[cfg(test)]
#[path = "tests/drag_tests.rs"]
mod tests;
