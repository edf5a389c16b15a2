//! Remote data gateway abstraction
//!
//! The controller never talks HTTP directly. It holds an
//! `Arc<dyn TransactionGateway>` handed to it at construction, so a session
//! can run against the real backend or against the in-memory mock.
//!
//! # Backends
//!
//! - `HttpGateway`: the dashboard REST API (reqwest)
//! - `MockGateway`: in-memory store with failure and latency injection
//!
//! # Configuration
//!
//! Environment variables (applied on top of the config file):
//! - `TALLY_BACKEND`: `http` (default) or `mock`
//! - `TALLY_API_URL`: base URL of the REST API

mod http;
mod mock;

pub use http::HttpGateway;
pub use mock::{GatewayCall, GatewayOp, MockGateway};

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::{BackendKind, Config};
use crate::error::Result;
use crate::filter::FilterSpec;
use crate::models::{
    Category, CategoryAggregate, SortSpec, StatisticsQuery, Transaction, TransactionPage,
};

/// Parameters for one page request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionQuery {
    /// 1-based
    pub page: u32,
    pub page_size: u32,
    pub sort: SortSpec,
    /// Only set when filtering happens server-side
    pub filter: Option<FilterSpec>,
}

impl TransactionQuery {
    pub fn new(page: u32, page_size: u32, sort: SortSpec) -> Self {
        Self {
            page,
            page_size,
            sort,
            filter: None,
        }
    }

    pub fn with_filter(mut self, filter: FilterSpec) -> Self {
        self.filter = if filter.is_empty() { None } else { Some(filter) };
        self
    }

    pub fn query_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("page", self.page.to_string()),
            ("page_size", self.page_size.to_string()),
            ("sort_field", self.sort.field.as_str().to_string()),
            ("sort_direction", self.sort.direction.as_str().to_string()),
        ];
        if let Some(ref filter) = self.filter {
            params.extend(filter.query_params());
        }
        params
    }
}

/// Operations the controller needs from the backend
///
/// Each call is atomic on the backend; nothing spans several calls.
#[async_trait]
pub trait TransactionGateway: Send + Sync {
    /// Fetch one sorted (and optionally filtered) page
    async fn list_transactions(&self, query: &TransactionQuery) -> Result<TransactionPage>;

    /// Set a transaction's category; the category's kind is sent along
    async fn update_category(&self, transaction_id: i64, category: Category)
        -> Result<Transaction>;

    async fn delete_transaction(&self, transaction_id: i64) -> Result<()>;

    /// Reinstate a previously deleted record; the backend may assign a new id
    async fn restore_transaction(&self, transaction: &Transaction) -> Result<Transaction>;

    async fn category_statistics(&self, query: &StatisticsQuery)
        -> Result<Vec<CategoryAggregate>>;

    /// Ask the backend to refresh its statistics overview
    async fn refresh_overview(&self) -> Result<()>;

    /// Short description for logging
    fn describe(&self) -> String;
}

/// Build the gateway selected by `config`
pub fn connect(config: &Config) -> Result<Arc<dyn TransactionGateway>> {
    match config.backend {
        BackendKind::Http => {
            let gateway = HttpGateway::new(&config.api.base_url, config.api.timeout)?;
            Ok(Arc::new(gateway))
        }
        BackendKind::Mock => Ok(Arc::new(MockGateway::with_demo_data())),
    }
}
