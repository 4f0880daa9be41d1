//! Immutable board views.
//!
//! Columns and items sit behind `Arc` so a derived snapshot shares every
//! column it did not touch with the snapshot it was derived from.

use std::sync::Arc;

use shared::domain::{BoardId, ColumnId, ItemId};

#[derive(Debug, Clone, PartialEq)]
pub struct ItemSnapshot {
    pub id: ItemId,
    pub column_id: ColumnId,
    pub title: String,
    pub content: Option<String>,
    pub order: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSnapshot {
    pub id: ColumnId,
    pub name: String,
    pub order: f64,
    /// Sorted ascending by order; ties keep insertion order.
    pub items: Vec<Arc<ItemSnapshot>>,
}

impl ColumnSnapshot {
    pub fn empty(id: ColumnId, name: impl Into<String>, order: f64) -> Self {
        Self {
            id,
            name: name.into(),
            order,
            items: Vec::new(),
        }
    }

    pub fn last_order(&self) -> Option<f64> {
        self.items.last().map(|item| item.order)
    }

    /// Orders of the column's items, skipping `excluded`.
    pub fn sibling_orders(&self, excluded: Option<&ItemId>) -> Vec<f64> {
        self.items
            .iter()
            .filter(|item| Some(&item.id) != excluded)
            .map(|item| item.order)
            .collect()
    }

    pub(crate) fn sort_items(&mut self) {
        self.items.sort_by(|a, b| a.order.total_cmp(&b.order));
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoardSnapshot {
    pub id: BoardId,
    pub name: String,
    pub color: String,
    /// Sorted ascending by order.
    pub columns: Vec<Arc<ColumnSnapshot>>,
}

impl BoardSnapshot {
    pub fn column(&self, id: &ColumnId) -> Option<&Arc<ColumnSnapshot>> {
        self.columns.iter().find(|column| &column.id == id)
    }

    pub fn item(&self, id: &ItemId) -> Option<&Arc<ItemSnapshot>> {
        self.items().find(|item| &item.id == id)
    }

    pub fn items(&self) -> impl Iterator<Item = &Arc<ItemSnapshot>> {
        self.columns.iter().flat_map(|column| column.items.iter())
    }

    pub fn item_count(&self) -> usize {
        self.columns.iter().map(|column| column.items.len()).sum()
    }

    pub fn max_column_order(&self) -> Option<f64> {
        self.columns
            .iter()
            .map(|column| column.order)
            .max_by(f64::total_cmp)
    }

    /// Titles per column in display order.
    pub fn titles(&self) -> Vec<(String, Vec<String>)> {
        self.columns
            .iter()
            .map(|column| {
                (
                    column.name.clone(),
                    column.items.iter().map(|item| item.title.clone()).collect(),
                )
            })
            .collect()
    }

    pub(crate) fn sort_columns(&mut self) {
        self.columns.sort_by(|a, b| a.order.total_cmp(&b.order));
    }
}
