//! Undo history for destructive transaction edits
//!
//! Only the most recent action can be reverted; there is no redo. Entries are
//! popped by the controller once their inverse has been applied on the
//! backend, never before.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::models::{Category, Transaction, TransactionKind};

/// Default number of actions kept per session
pub const DEFAULT_CAPACITY: usize = 50;

/// A user action that can be reverted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UndoableAction {
    /// The full record as it was before deletion
    DeleteTransaction { transaction: Transaction },
    UpdateCategory {
        transaction_id: i64,
        old_category: Option<Category>,
        new_category: Category,
        kind: TransactionKind,
    },
}

impl UndoableAction {
    pub fn label(&self) -> &'static str {
        match self {
            Self::DeleteTransaction { .. } => "delete",
            Self::UpdateCategory { .. } => "category update",
        }
    }

    pub fn transaction_id(&self) -> i64 {
        match self {
            Self::DeleteTransaction { transaction } => transaction.id,
            Self::UpdateCategory { transaction_id, .. } => *transaction_id,
        }
    }

    /// Whether an inverse exists at all
    ///
    /// A category edit on an uncategorized transaction cannot be reverted:
    /// the backend has no way to clear a category.
    pub fn is_reversible(&self) -> bool {
        match self {
            Self::DeleteTransaction { .. } => true,
            Self::UpdateCategory { old_category, .. } => old_category.is_some(),
        }
    }
}

impl std::fmt::Display for UndoableAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DeleteTransaction { transaction } => write!(
                f,
                "delete #{} {} {:.2} {}",
                transaction.id, transaction.date, transaction.amount, transaction.description
            ),
            Self::UpdateCategory {
                transaction_id,
                old_category,
                new_category,
                ..
            } => write!(
                f,
                "recategorize #{} {} -> {}",
                transaction_id,
                old_category.map_or("(none)", |c| c.as_str()),
                new_category
            ),
        }
    }
}

/// Chronological stack of undoable actions
#[derive(Debug, Clone)]
pub struct ActionHistory {
    entries: VecDeque<UndoableAction>,
    capacity: usize,
}

impl Default for ActionHistory {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl ActionHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// History keeping at most `capacity` actions (minimum 1)
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity.min(DEFAULT_CAPACITY)),
            capacity,
        }
    }

    /// Append an action, evicting the oldest one when full
    pub fn record(&mut self, action: UndoableAction) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(action);
    }

    pub fn peek(&self) -> Option<&UndoableAction> {
        self.entries.back()
    }

    pub fn pop(&mut self) -> Option<UndoableAction> {
        self.entries.pop_back()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Oldest first
    pub fn iter(&self) -> impl Iterator<Item = &UndoableAction> {
        self.entries.iter()
    }
}
