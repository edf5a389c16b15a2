//! Tally Core Library
//!
//! Client-side transaction state for the finance dashboard:
//! - Transaction list controller (paging, sorting, filtering, edits)
//! - Aggregate reconciler keeping category statistics in step with edits
//! - Action history with single-level undo of deletes and category changes
//! - Remote data gateway over the dashboard REST API (plus an in-memory mock)
//! - Layered configuration (embedded defaults, config file, environment)

pub mod config;
pub mod controller;
pub mod error;
pub mod filter;
pub mod gateway;
pub mod history;
pub mod models;
pub mod reconcile;

/// Test utilities including a mock dashboard backend
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use config::{BackendKind, Config};
pub use controller::{
    ControllerEvent, ControllerOptions, ControllerSnapshot, TransactionListController,
};
pub use error::{Error, Result};
pub use filter::FilterSpec;
pub use gateway::{HttpGateway, MockGateway, TransactionGateway, TransactionQuery};
pub use history::{ActionHistory, UndoableAction};
pub use models::{
    Category, CategoryAggregate, ExpenseCategory, IncomeCategory, SortDirection, SortField,
    SortSpec, StatisticsPeriod, StatisticsQuery, Transaction, TransactionKind, TransactionPage,
};
pub use reconcile::AggregateDelta;
