//! Pure optimistic reducer: `(snapshot, mutation) -> snapshot`.
//!
//! The input is never modified. Columns and items the mutation does not touch
//! are shared with the input by pointer.

use std::sync::Arc;

use shared::{
    domain::{ColumnId, ItemId},
    order::{append_after, FIRST_ORDER},
};

use crate::snapshot::{BoardSnapshot, ColumnSnapshot, ItemSnapshot};

#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    CreateColumn {
        id: ColumnId,
        name: String,
    },
    RenameColumn {
        column_id: ColumnId,
        name: String,
    },
    CreateCard {
        id: ItemId,
        column_id: ColumnId,
        title: String,
        order: f64,
    },
    MoveCard {
        item_id: ItemId,
        title: String,
        target_column_id: ColumnId,
        order: f64,
    },
    RenameBoard {
        name: String,
    },
}

impl Mutation {
    pub(crate) fn column_ids_mut(&mut self) -> Vec<&mut ColumnId> {
        match self {
            Self::CreateColumn { id, .. } => vec![id],
            Self::RenameColumn { column_id, .. } | Self::CreateCard { column_id, .. } => {
                vec![column_id]
            }
            Self::MoveCard {
                target_column_id, ..
            } => vec![target_column_id],
            Self::RenameBoard { .. } => Vec::new(),
        }
    }

    pub(crate) fn item_ids_mut(&mut self) -> Vec<&mut ItemId> {
        match self {
            Self::CreateCard { id, .. } => vec![id],
            Self::MoveCard { item_id, .. } => vec![item_id],
            _ => Vec::new(),
        }
    }
}

pub fn apply(snapshot: &BoardSnapshot, mutation: &Mutation) -> BoardSnapshot {
    let mut next = snapshot.clone();
    match mutation {
        Mutation::CreateColumn { id, name } => {
            if next.column(id).is_none() {
                let order = append_after(next.max_column_order());
                next.columns
                    .push(Arc::new(ColumnSnapshot::empty(id.clone(), name.clone(), order)));
                next.sort_columns();
            }
        }
        Mutation::RenameColumn { column_id, name } => {
            if let Some(column) = column_mut(&mut next, column_id) {
                column.name.clone_from(name);
            }
        }
        Mutation::CreateCard {
            id,
            column_id,
            title,
            order,
        } => {
            if next.item(id).is_none() {
                if let Some(column) = column_mut(&mut next, column_id) {
                    column.items.push(Arc::new(ItemSnapshot {
                        id: id.clone(),
                        column_id: column_id.clone(),
                        title: title.clone(),
                        content: None,
                        order: *order,
                    }));
                    column.sort_items();
                }
            }
        }
        Mutation::MoveCard {
            item_id,
            title,
            target_column_id,
            order,
        } => {
            if next.column(target_column_id).is_some() {
                let removed = remove_item(&mut next, item_id);
                if let Some(column) = column_mut(&mut next, target_column_id) {
                    let order = if column.items.is_empty() {
                        FIRST_ORDER
                    } else {
                        *order
                    };
                    column.items.push(Arc::new(ItemSnapshot {
                        id: item_id.clone(),
                        column_id: target_column_id.clone(),
                        title: title.clone(),
                        content: removed.and_then(|item| item.content.clone()),
                        order,
                    }));
                    column.sort_items();
                }
            }
        }
        Mutation::RenameBoard { name } => {
            next.name.clone_from(name);
        }
    }
    next
}

/// Folds pending mutations over the confirmed snapshot in issuance order.
pub fn derive<'a, I>(confirmed: &BoardSnapshot, pending: I) -> BoardSnapshot
where
    I: IntoIterator<Item = &'a Mutation>,
{
    pending
        .into_iter()
        .fold(confirmed.clone(), |snapshot, mutation| apply(&snapshot, mutation))
}

fn column_mut<'a>(snapshot: &'a mut BoardSnapshot, id: &ColumnId) -> Option<&'a mut ColumnSnapshot> {
    snapshot
        .columns
        .iter_mut()
        .find(|column| &column.id == id)
        .map(Arc::make_mut)
}

fn remove_item(snapshot: &mut BoardSnapshot, id: &ItemId) -> Option<Arc<ItemSnapshot>> {
    for column in snapshot.columns.iter_mut() {
        if let Some(index) = column.items.iter().position(|item| &item.id == id) {
            return Some(Arc::make_mut(column).items.remove(index));
        }
    }
    None
}

#[cfg(test)]
#[path = "tests/reducer_tests.rs"]
mod tests;
