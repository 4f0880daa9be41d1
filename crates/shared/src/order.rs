//! Fractional ordering for columns and cards.
//!
//! Orders are plain `f64`s that only need to sort correctly; they are never
//! renumbered. Placing an entity between two neighbors takes the midpoint, so
//! siblings are never rewritten on insert.

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Order of the only card in a column that was empty before the drop.
pub const FIRST_ORDER: f64 = 1.0;

/// Implicit predecessor of the first card.
pub const TOP_BOUND: f64 = 0.0;

pub fn between(prev: f64, next: f64) -> f64 {
    (prev + next) / 2.0
}

pub fn is_strictly_between(prev: f64, value: f64, next: f64) -> bool {
    prev < value && value < next
}

/// Order for an entity placed above `first` with nothing before it.
pub fn at_top(first: f64) -> f64 {
    between(TOP_BOUND, first)
}

/// Order for an entity placed below `last` with nothing after it.
pub fn at_bottom(last: f64) -> f64 {
    between(last, last + 1.0)
}

/// Order for a newly created entity appended after the current last one.
pub fn append_after(last: Option<f64>) -> f64 {
    last.map_or(FIRST_ORDER, |last| last + 1.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropHalf {
    Top,
    Bottom,
}

impl DropHalf {
    /// Top when the pointer is above the target's vertical midpoint.
    pub fn from_pointer(pointer_y: f64, rect_top: f64, rect_height: f64) -> Self {
        let midpoint = rect_top + rect_height / 2.0;
        if pointer_y < midpoint {
            Self::Top
        } else {
            Self::Bottom
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OrderOutcome {
    Between(f64),
    /// Neighbors were tied or inverted, or the midpoint collapsed onto one of
    /// them. The value still sorts, but ties with a neighbor.
    Degenerate(f64),
}

impl OrderOutcome {
    pub fn value(self) -> f64 {
        match self {
            Self::Between(value) | Self::Degenerate(value) => value,
        }
    }

    pub fn is_degenerate(self) -> bool {
        matches!(self, Self::Degenerate(_))
    }
}

pub fn checked_between(prev: f64, next: f64) -> OrderOutcome {
    let value = between(prev, next);
    if is_strictly_between(prev, value, next) {
        OrderOutcome::Between(value)
    } else {
        warn!(prev, next, value, "order: neighbors exhausted, accepting tied order");
        OrderOutcome::Degenerate(value)
    }
}

/// Neighbor pair bounding a drop onto `siblings[target_index]`.
///
/// `siblings` are the destination column's orders sorted ascending, without
/// the card being dragged. Returns `None` when the column has no card at
/// `target_index`.
pub fn drop_neighbors(siblings: &[f64], target_index: usize, half: DropHalf) -> Option<(f64, f64)> {
    let target = *siblings.get(target_index)?;
    let neighbors = match half {
        DropHalf::Top => {
            let prev = target_index
                .checked_sub(1)
                .and_then(|i| siblings.get(i).copied())
                .unwrap_or(TOP_BOUND);
            (prev, target)
        }
        DropHalf::Bottom => {
            let next = siblings
                .get(target_index + 1)
                .copied()
                .unwrap_or(target + 1.0);
            (target, next)
        }
    };
    Some(neighbors)
}

/// Order for a card dropped on a sibling, or `FIRST_ORDER` into an empty column.
pub fn for_drop(siblings: &[f64], target_index: usize, half: DropHalf) -> OrderOutcome {
    if siblings.is_empty() {
        return OrderOutcome::Between(FIRST_ORDER);
    }
    match drop_neighbors(siblings, target_index, half) {
        Some((prev, next)) => checked_between(prev, next),
        None => OrderOutcome::Between(append_after(siblings.last().copied())),
    }
}
