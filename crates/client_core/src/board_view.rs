//! Read-side assembly of a stored board into the nested view.

use std::{collections::HashMap, sync::Arc};

use shared::{
    domain::ColumnId,
    protocol::{BoardPayload, ItemPayload},
};
use tracing::debug;

use crate::snapshot::{BoardSnapshot, ColumnSnapshot, ItemSnapshot};

/// Buckets items by column, keeping each bucket in iteration order.
pub fn group_items_by_column<'a, I>(items: I) -> HashMap<ColumnId, Vec<ItemPayload>>
where
    I: IntoIterator<Item = &'a ItemPayload>,
{
    let mut groups: HashMap<ColumnId, Vec<ItemPayload>> = HashMap::new();
    for item in items {
        groups
            .entry(item.column_id.clone())
            .or_default()
            .push(item.clone());
    }
    groups
}

pub fn compose(board: &BoardPayload) -> BoardSnapshot {
    let mut groups = group_items_by_column(&board.items);

    let mut snapshot = BoardSnapshot {
        id: board.id,
        name: board.name.clone(),
        color: board.color.clone(),
        columns: board
            .columns
            .iter()
            .map(|column| {
                let items = groups.remove(&column.id).unwrap_or_default();
                let mut column = ColumnSnapshot {
                    id: column.id.clone(),
                    name: column.name.clone(),
                    order: column.order,
                    items: items.into_iter().map(item_snapshot).map(Arc::new).collect(),
                };
                column.sort_items();
                Arc::new(column)
            })
            .collect(),
    };
    snapshot.sort_columns();

    for (column_id, orphans) in groups {
        debug!(
            board_id = board.id.0,
            column_id = %column_id,
            count = orphans.len(),
            "dropping items whose column is not on the board"
        );
    }

    snapshot
}

fn item_snapshot(item: ItemPayload) -> ItemSnapshot {
    ItemSnapshot {
        id: item.id,
        column_id: item.column_id,
        title: item.title,
        content: item.content,
        order: item.order,
    }
}

#[cfg(test)]
#[path = "tests/board_view_tests.rs"]
mod tests;
