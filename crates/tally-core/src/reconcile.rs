//! Local correction of category statistics after a single mutation
//!
//! The backend recomputes its statistics on every write, but refetching them
//! after each edit is wasteful. These functions apply the same change to the
//! cached snapshot instead.
//!
//! Aggregates are keyed by category, and a `Category` already encodes its
//! kind, so the (category, kind) pair is a single key here.

use crate::models::{Category, CategoryAggregate, TransactionKind};

/// A single mutation to fold into a statistics snapshot
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AggregateDelta {
    /// A transaction moved from `old` (if any) to `new`
    Recategorize {
        old: Option<Category>,
        new: Category,
        kind: TransactionKind,
        magnitude: f64,
    },
    /// A transaction disappeared
    Remove {
        category: Option<Category>,
        kind: TransactionKind,
        magnitude: f64,
    },
}

/// Apply `delta` and return the updated snapshot
///
/// Entries whose count reaches zero are removed rather than zeroed.
pub fn reconcile(
    mut aggregates: Vec<CategoryAggregate>,
    delta: AggregateDelta,
) -> Vec<CategoryAggregate> {
    apply(&mut aggregates, delta);
    aggregates
}

/// In-place form of [`reconcile`]
pub fn apply(aggregates: &mut Vec<CategoryAggregate>, delta: AggregateDelta) {
    match delta {
        AggregateDelta::Recategorize {
            old,
            new,
            kind,
            magnitude,
        } => {
            let magnitude = magnitude.abs();
            if let Some(old) = old {
                decrement(aggregates, old, kind, magnitude);
            }
            increment(aggregates, new, kind, magnitude);
        }
        AggregateDelta::Remove {
            category,
            kind,
            magnitude,
        } => {
            if let Some(category) = category {
                decrement(aggregates, category, kind, magnitude.abs());
            }
        }
    }
}

fn position(
    aggregates: &[CategoryAggregate],
    category: Category,
    kind: TransactionKind,
) -> Option<usize> {
    aggregates
        .iter()
        .position(|a| a.category == category && a.kind() == kind)
}

fn decrement(
    aggregates: &mut Vec<CategoryAggregate>,
    category: Category,
    kind: TransactionKind,
    magnitude: f64,
) {
    // Snapshot may not include this pair (different period); nothing to undo.
    let Some(index) = position(aggregates, category, kind) else {
        return;
    };

    let entry = &mut aggregates[index];
    if entry.transaction_count <= 1 {
        aggregates.remove(index);
        return;
    }
    entry.transaction_count -= 1;
    entry.total_amount = (entry.total_amount - magnitude).max(0.0);
}

fn increment(
    aggregates: &mut Vec<CategoryAggregate>,
    category: Category,
    kind: TransactionKind,
    magnitude: f64,
) {
    match position(aggregates, category, kind) {
        Some(index) => {
            let entry = &mut aggregates[index];
            entry.total_amount += magnitude;
            entry.transaction_count += 1;
        }
        None => aggregates.push(CategoryAggregate::new(category, magnitude, 1)),
    }
}
