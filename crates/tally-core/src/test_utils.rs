//! Test utilities for tally-core
//!
//! Provides a mock dashboard backend: an axum server exposing the same REST
//! routes as the real API, backed by a `MockGateway` store. It lets the HTTP
//! gateway be tested end to end without the real backend.

use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, patch, post},
    Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use std::net::SocketAddr;
use tokio::sync::oneshot;

use crate::error::Error;
use crate::filter::FilterSpec;
use crate::gateway::{MockGateway, TransactionGateway, TransactionQuery};
use crate::models::{
    Category, CategoryAggregate, SortDirection, SortField, SortSpec, StatisticsPeriod,
    StatisticsQuery, Transaction, TransactionKind, TransactionPage,
};

/// Mock dashboard backend for testing and offline development
pub struct MockBackendServer {
    addr: SocketAddr,
    gateway: MockGateway,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockBackendServer {
    /// Start a server seeded with the demo data set
    pub async fn start() -> Self {
        Self::start_with(MockGateway::with_demo_data()).await
    }

    /// Start a server over an existing store
    pub async fn start_with(gateway: MockGateway) -> Self {
        let app = Router::new()
            .route("/transactions/", get(handle_list))
            .route("/transactions/restore", post(handle_restore))
            .route("/transactions/:id/category", patch(handle_update_category))
            .route("/transactions/:id", delete(handle_delete))
            .route("/statistics/by-category", get(handle_statistics))
            .route("/statistics/overview", get(handle_overview))
            .with_state(gateway.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .unwrap();
        });

        Self {
            addr,
            gateway,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Get the base URL for this mock server
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// The store behind the server (shares state, records calls)
    pub fn gateway(&self) -> MockGateway {
        self.gateway.clone()
    }

    /// Stop the mock server
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockBackendServer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Error rendered the way the backend does: `{"detail": "..."}`
struct ApiError(StatusCode, String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.0, Json(serde_json::json!({ "detail": self.1 }))).into_response()
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err {
            Error::Api { status, message } => ApiError(
                StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
                message,
            ),
            other => ApiError(StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
        }
    }
}

fn unprocessable(message: String) -> ApiError {
    ApiError(StatusCode::UNPROCESSABLE_ENTITY, message)
}

#[derive(Debug, Deserialize)]
struct ListParams {
    page: Option<u32>,
    page_size: Option<u32>,
    sort_field: Option<String>,
    sort_direction: Option<String>,
    search: Option<String>,
    category: Option<String>,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
}

async fn handle_list(
    State(gateway): State<MockGateway>,
    Query(params): Query<ListParams>,
) -> Result<Json<TransactionPage>, ApiError> {
    let field = match params.sort_field {
        Some(f) => f.parse::<SortField>().map_err(unprocessable)?,
        None => SortField::Date,
    };
    let direction = match params.sort_direction {
        Some(d) => d.parse::<SortDirection>().map_err(unprocessable)?,
        None => SortDirection::Desc,
    };
    let category = params
        .category
        .map(|c| c.parse::<Category>().map_err(unprocessable))
        .transpose()?;
    let date_range = match (params.start_date, params.end_date) {
        (None, None) => None,
        (from, to) => Some((
            from.unwrap_or(NaiveDate::MIN),
            to.unwrap_or(NaiveDate::MAX),
        )),
    };

    let filter = FilterSpec::new()
        .search(params.search.as_deref())
        .category(category)
        .date_range(date_range);
    let query = TransactionQuery::new(
        params.page.unwrap_or(1),
        params.page_size.unwrap_or(10),
        SortSpec::new(field, direction),
    )
    .with_filter(filter);

    Ok(Json(gateway.list_transactions(&query).await?))
}

#[derive(Debug, Deserialize)]
struct CategoryParams {
    category: String,
    transaction_type: String,
}

async fn handle_update_category(
    State(gateway): State<MockGateway>,
    Path(id): Path<i64>,
    Query(params): Query<CategoryParams>,
) -> Result<Json<Transaction>, ApiError> {
    let kind = params
        .transaction_type
        .parse::<TransactionKind>()
        .map_err(unprocessable)?;
    let category = Category::parse_for(kind, &params.category).ok_or_else(|| {
        unprocessable(format!("Invalid {} category: {}", kind, params.category))
    })?;

    Ok(Json(gateway.update_category(id, category).await?))
}

async fn handle_delete(
    State(gateway): State<MockGateway>,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    gateway.delete_transaction(id).await?;
    Ok(Json(
        serde_json::json!({ "message": "Transaction deleted successfully" }),
    ))
}

async fn handle_restore(
    State(gateway): State<MockGateway>,
    Json(transaction): Json<Transaction>,
) -> Result<Json<Transaction>, ApiError> {
    Ok(Json(gateway.restore_transaction(&transaction).await?))
}

#[derive(Debug, Deserialize)]
struct StatisticsParams {
    period: Option<String>,
    date: Option<NaiveDate>,
}

async fn handle_statistics(
    State(gateway): State<MockGateway>,
    Query(params): Query<StatisticsParams>,
) -> Result<Json<Vec<CategoryAggregate>>, ApiError> {
    let period = match params.period {
        Some(p) => p.parse::<StatisticsPeriod>().map_err(unprocessable)?,
        None => StatisticsPeriod::Monthly,
    };
    let query = StatisticsQuery::new(period, params.date);
    Ok(Json(gateway.category_statistics(&query).await?))
}

async fn handle_overview(
    State(gateway): State<MockGateway>,
) -> Result<Json<serde_json::Value>, ApiError> {
    gateway.refresh_overview().await?;
    Ok(Json(serde_json::json!({})))
}
