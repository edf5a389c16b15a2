//! HTTP gateway for the dashboard REST API

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::{
    Category, CategoryAggregate, StatisticsQuery, Transaction, TransactionPage,
};

use super::{TransactionGateway, TransactionQuery};

/// REST client bound to one backend base URL
#[derive(Clone)]
pub struct HttpGateway {
    http_client: Client,
    base_url: String,
}

impl HttpGateway {
    /// Create a gateway with a per-request timeout
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let http_client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// FastAPI-style error body
#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: serde_json::Value,
}

/// Turn a non-success response into `Error::Api`, keeping the backend's detail
async fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = match serde_json::from_str::<ErrorBody>(&body) {
        Ok(ErrorBody {
            detail: serde_json::Value::String(s),
        }) => s,
        Ok(ErrorBody { detail }) => detail.to_string(),
        Err(_) if body.trim().is_empty() => status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string(),
        Err(_) => body,
    };

    Err(Error::Api {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl TransactionGateway for HttpGateway {
    async fn list_transactions(&self, query: &TransactionQuery) -> Result<TransactionPage> {
        let response = self
            .http_client
            .get(self.url("/transactions/"))
            .query(&query.query_params())
            .send()
            .await?;

        let page: TransactionPage = check(response).await?.json().await?;
        debug!(
            page = page.page,
            items = page.items.len(),
            total = page.total,
            "Fetched transaction page"
        );
        Ok(page)
    }

    async fn update_category(
        &self,
        transaction_id: i64,
        category: Category,
    ) -> Result<Transaction> {
        let response = self
            .http_client
            .patch(self.url(&format!("/transactions/{}/category", transaction_id)))
            .query(&[
                ("category", category.as_str()),
                ("transaction_type", category.kind().as_str()),
            ])
            .send()
            .await?;

        let updated: Transaction = check(response).await?.json().await?;
        debug!(id = transaction_id, category = %category, "Updated category");
        Ok(updated)
    }

    async fn delete_transaction(&self, transaction_id: i64) -> Result<()> {
        let response = self
            .http_client
            .delete(self.url(&format!("/transactions/{}", transaction_id)))
            .send()
            .await?;

        check(response).await?;
        debug!(id = transaction_id, "Deleted transaction");
        Ok(())
    }

    async fn restore_transaction(&self, transaction: &Transaction) -> Result<Transaction> {
        let response = self
            .http_client
            .post(self.url("/transactions/restore"))
            .json(transaction)
            .send()
            .await?;

        let restored: Transaction = check(response).await?.json().await?;
        debug!(
            old_id = transaction.id,
            new_id = restored.id,
            "Restored transaction"
        );
        Ok(restored)
    }

    async fn category_statistics(
        &self,
        query: &StatisticsQuery,
    ) -> Result<Vec<CategoryAggregate>> {
        let mut params = vec![("period", query.period.as_str().to_string())];
        if let Some(date) = query.date {
            params.push(("date", date.format("%Y-%m-%d").to_string()));
        }

        let response = self
            .http_client
            .get(self.url("/statistics/by-category"))
            .query(&params)
            .send()
            .await?;

        let aggregates: Vec<CategoryAggregate> = check(response).await?.json().await?;
        debug!(
            period = %query.period,
            categories = aggregates.len(),
            "Fetched category statistics"
        );
        Ok(aggregates)
    }

    async fn refresh_overview(&self) -> Result<()> {
        let response = self
            .http_client
            .get(self.url("/statistics/overview"))
            .send()
            .await?;

        check(response).await?;
        Ok(())
    }

    fn describe(&self) -> String {
        self.base_url.clone()
    }
}
