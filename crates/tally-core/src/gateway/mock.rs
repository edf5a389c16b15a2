//! In-memory gateway for tests and offline demos
//!
//! Behaves like the real backend: server-side sorting, filtering and
//! pagination, kind-checked category updates, restores that assign fresh ids,
//! and statistics computed from the stored transactions. Tests can queue
//! failures and per-call latency, and inspect every call made.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};

use crate::error::{Error, Result};
use crate::filter::FilterSpec;
use crate::models::{
    Category, CategoryAggregate, ExpenseCategory, IncomeCategory, SortDirection, SortField,
    StatisticsPeriod, StatisticsQuery, Transaction, TransactionPage,
};

use super::{TransactionGateway, TransactionQuery};

/// Gateway operation, used to target injected failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayOp {
    List,
    UpdateCategory,
    Delete,
    Restore,
    Statistics,
    Overview,
}

/// A call received by the mock, in arrival order
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayCall {
    List(TransactionQuery),
    UpdateCategory { id: i64, category: Category },
    Delete(i64),
    Restore(i64),
    Statistics(StatisticsQuery),
    Overview,
}

impl GatewayCall {
    pub fn op(&self) -> GatewayOp {
        match self {
            Self::List(_) => GatewayOp::List,
            Self::UpdateCategory { .. } => GatewayOp::UpdateCategory,
            Self::Delete(_) => GatewayOp::Delete,
            Self::Restore(_) => GatewayOp::Restore,
            Self::Statistics(_) => GatewayOp::Statistics,
            Self::Overview => GatewayOp::Overview,
        }
    }
}

#[derive(Default)]
struct MockState {
    transactions: Vec<Transaction>,
    next_id: i64,
    calls: Vec<GatewayCall>,
    failures: Vec<GatewayOp>,
    list_delays: VecDeque<Duration>,
}

/// Mock gateway sharing one store between clones
#[derive(Clone, Default)]
pub struct MockGateway {
    state: Arc<Mutex<MockState>>,
}

impl MockGateway {
    /// Create an empty mock backend
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock backend holding `transactions`
    ///
    /// Transactions keep their ids; new ids continue after the largest one.
    pub fn with_transactions(transactions: Vec<Transaction>) -> Self {
        let next_id = transactions.iter().map(|t| t.id).max().unwrap_or(0) + 1;
        Self {
            state: Arc::new(Mutex::new(MockState {
                transactions,
                next_id,
                ..MockState::default()
            })),
        }
    }

    /// Mock backend seeded with two months of household transactions
    pub fn with_demo_data() -> Self {
        Self::with_transactions(demo_transactions())
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        // A panicking test thread must not wedge the remaining assertions.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Make the next call of `op` fail with a 500
    pub fn fail_next(&self, op: GatewayOp) {
        self.lock().failures.push(op);
    }

    /// Delay the next page fetch by `delay` (queued, one per call)
    pub fn delay_next_list(&self, delay: Duration) {
        self.lock().list_delays.push_back(delay);
    }

    pub fn calls(&self) -> Vec<GatewayCall> {
        self.lock().calls.clone()
    }

    pub fn calls_of(&self, op: GatewayOp) -> usize {
        self.lock().calls.iter().filter(|c| c.op() == op).count()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Everything currently stored, in insertion order
    pub fn transactions(&self) -> Vec<Transaction> {
        self.lock().transactions.clone()
    }

    /// Record the call and consume a queued failure for it, if any
    fn enter(&self, call: GatewayCall) -> Result<()> {
        let mut state = self.lock();
        let op = call.op();
        state.calls.push(call);
        if let Some(index) = state.failures.iter().position(|f| *f == op) {
            state.failures.remove(index);
            return Err(Error::Api {
                status: 500,
                message: format!("injected {:?} failure", op),
            });
        }
        Ok(())
    }
}

fn sort_transactions(items: &mut [Transaction], field: SortField, direction: SortDirection) {
    items.sort_by(|a, b| {
        let ordering = match field {
            SortField::Date => a.date.cmp(&b.date),
            SortField::Description => a.description.cmp(&b.description),
            SortField::Amount => a.amount.total_cmp(&b.amount),
            SortField::Type => a.kind().as_str().cmp(b.kind().as_str()),
        }
        .then(a.id.cmp(&b.id));
        match direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    });
}

/// Resolve the period the backend would report when no date is pinned
fn statistics_window(query: &StatisticsQuery, latest: Option<NaiveDate>) -> StatisticsQuery {
    match (query.period, query.date) {
        (StatisticsPeriod::AllTime, _) | (_, Some(_)) => *query,
        (period, None) => StatisticsQuery::new(period, latest),
    }
}

#[async_trait]
impl TransactionGateway for MockGateway {
    async fn list_transactions(&self, query: &TransactionQuery) -> Result<TransactionPage> {
        self.enter(GatewayCall::List(query.clone()))?;

        let delay = self.lock().list_delays.pop_front();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if query.page == 0 || query.page_size == 0 {
            return Err(Error::Api {
                status: 422,
                message: "page and page_size must be positive".to_string(),
            });
        }

        let mut items = {
            let state = self.lock();
            match query.filter {
                Some(ref filter) => filter.apply(&state.transactions),
                None => FilterSpec::new().apply(&state.transactions),
            }
        };
        sort_transactions(&mut items, query.sort.field, query.sort.direction);

        let total = items.len() as u64;
        let offset = ((query.page - 1) as usize).saturating_mul(query.page_size as usize);
        let page_items: Vec<Transaction> = items
            .into_iter()
            .skip(offset)
            .take(query.page_size as usize)
            .collect();

        Ok(TransactionPage {
            items: page_items,
            total,
            page: query.page,
            page_size: query.page_size,
            total_pages: TransactionPage::pages_for(total, query.page_size),
        })
    }

    async fn update_category(
        &self,
        transaction_id: i64,
        category: Category,
    ) -> Result<Transaction> {
        self.enter(GatewayCall::UpdateCategory {
            id: transaction_id,
            category,
        })?;

        let mut state = self.lock();
        let tx = state
            .transactions
            .iter_mut()
            .find(|t| t.id == transaction_id)
            .ok_or_else(|| Error::Api {
                status: 404,
                message: "Transaction not found".to_string(),
            })?;
        tx.set_category(Some(category)).map_err(|e| Error::Api {
            status: 422,
            message: e.to_string(),
        })?;
        Ok(tx.clone())
    }

    async fn delete_transaction(&self, transaction_id: i64) -> Result<()> {
        self.enter(GatewayCall::Delete(transaction_id))?;

        let mut state = self.lock();
        let index = state
            .transactions
            .iter()
            .position(|t| t.id == transaction_id)
            .ok_or_else(|| Error::Api {
                status: 404,
                message: "Transaction not found".to_string(),
            })?;
        state.transactions.remove(index);
        Ok(())
    }

    async fn restore_transaction(&self, transaction: &Transaction) -> Result<Transaction> {
        self.enter(GatewayCall::Restore(transaction.id))?;

        let mut state = self.lock();
        let mut restored = transaction.clone();
        restored.id = state.next_id;
        state.next_id += 1;
        state.transactions.push(restored.clone());
        Ok(restored)
    }

    async fn category_statistics(
        &self,
        query: &StatisticsQuery,
    ) -> Result<Vec<CategoryAggregate>> {
        self.enter(GatewayCall::Statistics(*query))?;

        let state = self.lock();
        let latest = state.transactions.iter().map(|t| t.date).max();
        let window = statistics_window(query, latest);

        let mut aggregates: Vec<CategoryAggregate> = Vec::new();
        for tx in state.transactions.iter().filter(|t| window.covers(t.date)) {
            let Some(category) = tx.category() else {
                continue;
            };
            match aggregates.iter_mut().find(|a| a.category == category) {
                Some(agg) => {
                    agg.total_amount += tx.magnitude();
                    agg.transaction_count += 1;
                }
                None => {
                    let mut agg = CategoryAggregate::new(category, tx.magnitude(), 1);
                    agg.period = Some(window.period.as_str().to_string());
                    agg.date = window.date.map(|d| match window.period {
                        StatisticsPeriod::Yearly => {
                            NaiveDate::from_ymd_opt(d.year(), 12, 31).unwrap_or(d)
                        }
                        _ => d,
                    });
                    aggregates.push(agg);
                }
            }
        }
        Ok(aggregates)
    }

    async fn refresh_overview(&self) -> Result<()> {
        self.enter(GatewayCall::Overview)
    }

    fn describe(&self) -> String {
        "mock".to_string()
    }
}

fn demo_transactions() -> Vec<Transaction> {
    use ExpenseCategory as E;
    use IncomeCategory as I;

    let rows: &[(u32, u32, f64, &str, Option<Category>)] = &[
        (2, 1, 3200.0, "Salary February", Some(I::Salary.into())),
        (2, 2, -950.0, "Rent February", Some(E::Housing.into())),
        (2, 5, -64.30, "Colruyt", Some(E::Groceries.into())),
        (2, 9, -23.50, "Pizza Napoli", Some(E::EatingOut.into())),
        (2, 12, -88.12, "Electrabel", Some(E::Utilities.into())),
        (2, 14, -41.90, "Delhaize", Some(E::Groceries.into())),
        (2, 18, -120.0, "NMBS season ticket", Some(E::Transportation.into())),
        (2, 21, 45.0, "Refund webshop", Some(I::Refunds.into())),
        (2, 26, -18.99, "Cinema", None),
        (3, 1, 3200.0, "Salary March", Some(I::Salary.into())),
        (3, 2, -950.0, "Rent March", Some(E::Housing.into())),
        (3, 4, -72.15, "Colruyt", Some(E::Groceries.into())),
        (3, 7, -35.00, "Sushi bar", Some(E::EatingOut.into())),
        (3, 10, -15.00, "Red Cross", Some(E::Donations.into())),
        (3, 13, -58.40, "Aldi", Some(E::Groceries.into())),
        (3, 15, 400.0, "Freelance invoice 12", Some(I::Freelance.into())),
        (3, 19, -210.0, "Car insurance", Some(E::Insurance.into())),
        (3, 22, -27.80, "Bookshop", None),
        (3, 27, -49.99, "Concert tickets", Some(E::Entertainment.into())),
        (3, 30, -12.60, "Bakery", Some(E::Groceries.into())),
    ];

    rows.iter()
        .enumerate()
        .filter_map(|(i, (month, day, amount, description, category))| {
            let date = NaiveDate::from_ymd_opt(2024, *month, *day)?;
            let tx = Transaction::new(
                i as i64 + 1,
                "BE68 5390 0754 7034",
                date,
                *amount,
                "EUR",
                description,
                "kbc",
            );
            match category {
                Some(c) => tx.with_category(*c).ok(),
                None => Some(tx),
            }
        })
        .collect()
}
