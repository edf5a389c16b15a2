//! Shared command setup
//!
//! This module contains:
//! - `load_config` - Layered config plus command-line overrides
//! - `open_controller` - Gateway + controller for the configured backend
//! - `resolve_sort` / `resolve_statistics_query` - Argument parsing helpers

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use tally_core::{
    config::Config,
    gateway::{self, TransactionGateway},
    ControllerOptions, SortDirection, SortField, SortSpec, StatisticsPeriod, StatisticsQuery,
    TransactionListController,
};
use tracing::debug;

/// Load config layers, then apply `--api-url` and `--backend`
pub fn load_config(
    path: Option<&Path>,
    api_url: Option<&str>,
    backend: Option<&str>,
) -> Result<Config> {
    let mut config = Config::load(path).context("Failed to load configuration")?;

    if let Some(url) = api_url {
        config.api.base_url = url.to_string();
    }
    if let Some(backend) = backend {
        config.backend = backend.parse().map_err(|e: String| anyhow::anyhow!(e))?;
    }

    debug!(
        backend = ?config.backend,
        api = %config.api.base_url,
        page_size = config.browse.page_size,
        "Configuration loaded"
    );
    Ok(config)
}

pub fn open_gateway(config: &Config) -> Result<Arc<dyn TransactionGateway>> {
    gateway::connect(config).context("Failed to create API client")
}

/// Build a controller for `config`, optionally overriding the sort
pub fn open_controller(
    config: &Config,
    sort: Option<SortSpec>,
) -> Result<TransactionListController> {
    let mut options = ControllerOptions::from_config(config);
    if let Some(sort) = sort {
        options.sort = sort;
    }
    Ok(TransactionListController::new(open_gateway(config)?, options))
}

/// Combine `--sort`, `--desc` and `--asc` with the configured default
pub fn resolve_sort(
    config: &Config,
    field: Option<&str>,
    desc: bool,
    asc: bool,
) -> Result<Option<SortSpec>> {
    if field.is_none() && !desc && !asc {
        return Ok(None);
    }

    let mut sort = config.browse.sort;
    if let Some(field) = field {
        sort.field = field
            .parse::<SortField>()
            .map_err(|e: String| anyhow::anyhow!(e))?;
    }
    if desc {
        sort.direction = SortDirection::Desc;
    } else if asc {
        sort.direction = SortDirection::Asc;
    }
    Ok(Some(sort))
}

pub fn resolve_statistics_query(
    config: &Config,
    period: Option<&str>,
    date: Option<&str>,
) -> Result<StatisticsQuery> {
    let period = match period {
        Some(p) => p
            .parse::<StatisticsPeriod>()
            .map_err(|e: String| anyhow::anyhow!(e))?,
        None => config.statistics_period,
    };
    let date = date
        .map(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d"))
        .transpose()
        .context("Invalid --date format (use YYYY-MM-DD)")?;
    Ok(StatisticsQuery::new(period, date))
}
