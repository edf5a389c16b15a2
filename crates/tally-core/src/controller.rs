//! Transaction list controller
//!
//! Single source of truth for the transactions currently on screen. It owns
//! the loaded page and the category statistics snapshot, keeps both
//! consistent across edits, and records every destructive edit so the most
//! recent one can be undone.
//!
//! # Consistency model
//!
//! - `load()` is the only point where page and statistics are replaced
//!   wholesale from the backend. Every load is stamped with a generation
//!   number; a response whose generation is no longer the newest is dropped.
//! - Category updates and deletes patch the page and reconcile the
//!   statistics locally once the backend has accepted them.
//! - Mutations and undo run one at a time behind an async mutex. State is
//!   kept behind a synchronous lock that is never held across an await.
//! - Each mutation keeps an edit epoch odd while it is in flight. A load
//!   whose requests overlapped an edit waits for the edit and refetches, so a
//!   pre-edit snapshot never replaces reconciled statistics.
//! - When the loaded statistics do not say which period the backend chose,
//!   a mutation refetches them instead of reconciling locally.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::NaiveDate;
use serde::Serialize;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::filter::FilterSpec;
use crate::gateway::{TransactionGateway, TransactionQuery};
use crate::history::{ActionHistory, UndoableAction};
use crate::models::{
    Category, CategoryAggregate, SortSpec, StatisticsPeriod, StatisticsQuery, Transaction,
    TransactionPage,
};
use crate::reconcile::{self, AggregateDelta};

/// Capacity of the background event channel
const EVENT_CAPACITY: usize = 16;

/// Session settings for a controller
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerOptions {
    pub page_size: u32,
    pub sort: SortSpec,
    pub statistics: StatisticsQuery,
    /// Forward filters to the backend instead of filtering the loaded page
    pub server_side_filters: bool,
    pub history_capacity: usize,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl ControllerOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            page_size: config.browse.page_size,
            sort: config.browse.sort,
            statistics: StatisticsQuery::new(config.statistics_period, None),
            server_side_filters: config.browse.server_side_filters,
            history_capacity: config.history_capacity,
        }
    }
}

/// Outcome of work the controller runs in the background
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerEvent {
    OverviewRefreshed,
    OverviewRefreshFailed { message: String },
}

/// Everything the presentation layer reads, captured at one instant
#[derive(Debug, Clone, Serialize)]
pub struct ControllerSnapshot {
    /// Loaded page after the active filter
    pub transactions: Vec<Transaction>,
    pub statistics: Vec<CategoryAggregate>,
    pub loading: bool,
    pub error: Option<String>,
    pub current_page: u32,
    pub total_pages: u32,
    pub total_transactions: u64,
    pub sort: SortSpec,
    pub filter: FilterSpec,
    pub can_undo: bool,
    pub last_action: Option<UndoableAction>,
}

struct ControllerState {
    page: TransactionPage,
    statistics: Vec<CategoryAggregate>,
    loading: bool,
    error: Option<String>,
    current_page: u32,
    sort: SortSpec,
    filter: FilterSpec,
    statistics_query: StatisticsQuery,
    /// Window the loaded statistics actually describe
    statistics_window: StatisticsQuery,
    history: ActionHistory,
}

/// Pin an open-ended statistics query to the date the backend reported
///
/// Without a date the backend picks the period itself (the latest month for
/// monthly snapshots); the aggregates say which one it chose.
fn effective_window(query: StatisticsQuery, statistics: &[CategoryAggregate]) -> StatisticsQuery {
    if query.date.is_some() || query.period == StatisticsPeriod::AllTime {
        return query;
    }
    statistics
        .iter()
        .find_map(|a| a.date)
        .map_or(query, |date| StatisticsQuery::new(query.period, Some(date)))
}

/// Marks an edit in flight: the epoch is odd until the guard drops
struct EditEpoch<'a>(&'a AtomicU64);

impl<'a> EditEpoch<'a> {
    fn begin(epoch: &'a AtomicU64) -> Self {
        epoch.fetch_add(1, Ordering::SeqCst);
        Self(epoch)
    }
}

impl Drop for EditEpoch<'_> {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

/// Clears the undo-in-flight flag however the undo ends
struct UndoingGuard<'a>(&'a AtomicBool);

impl Drop for UndoingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct TransactionListController {
    gateway: Arc<dyn TransactionGateway>,
    page_size: u32,
    server_side_filters: bool,
    state: RwLock<ControllerState>,
    /// Generation of the newest load issued
    generation: AtomicU64,
    /// Bumped when an edit starts and again once its state patch is applied
    edit_epoch: AtomicU64,
    mutation_lock: Mutex<()>,
    undoing: AtomicBool,
    events: broadcast::Sender<ControllerEvent>,
}

impl TransactionListController {
    pub fn new(gateway: Arc<dyn TransactionGateway>, options: ControllerOptions) -> Self {
        let page_size = options.page_size.max(1);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            gateway,
            page_size,
            server_side_filters: options.server_side_filters,
            state: RwLock::new(ControllerState {
                page: TransactionPage {
                    page: 1,
                    page_size,
                    ..TransactionPage::default()
                },
                statistics: Vec::new(),
                loading: false,
                error: None,
                current_page: 1,
                sort: options.sort,
                filter: FilterSpec::default(),
                statistics_query: options.statistics,
                statistics_window: options.statistics,
                history: ActionHistory::with_capacity(options.history_capacity),
            }),
            generation: AtomicU64::new(0),
            edit_epoch: AtomicU64::new(0),
            mutation_lock: Mutex::new(()),
            undoing: AtomicBool::new(false),
            events,
        }
    }

    fn read_state(&self) -> RwLockReadGuard<'_, ControllerState> {
        // State is plain data; a panic elsewhere cannot leave it half-written
        // in a way later readers could not cope with.
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, ControllerState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Subscribe to background events (overview refresh results)
    pub fn subscribe(&self) -> broadcast::Receiver<ControllerEvent> {
        self.events.subscribe()
    }

    fn page_query(&self, state: &ControllerState) -> TransactionQuery {
        let query = TransactionQuery::new(state.current_page, self.page_size, state.sort);
        if self.server_side_filters {
            query.with_filter(state.filter.clone())
        } else {
            query
        }
    }

    // ==================== Loading ====================

    /// Fetch the current page and a fresh statistics snapshot
    ///
    /// Both requests run concurrently. On failure the previous page and
    /// statistics stay in place and `error` is set. A load overtaken by a
    /// newer one returns `Ok(())` without touching state. If an edit started
    /// or finished while the requests were out, the load waits for it and
    /// fetches again.
    pub async fn load(&self) -> Result<()> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let (query, statistics_query) = {
            let mut state = self.write_state();
            state.loading = true;
            (self.page_query(&state), state.statistics_query)
        };

        debug!(
            generation,
            page = query.page,
            sort = %query.sort,
            gateway = %self.gateway.describe(),
            "Loading transactions"
        );

        loop {
            let epoch = self.edit_epoch.load(Ordering::SeqCst);
            let result = tokio::try_join!(
                self.gateway.list_transactions(&query),
                self.gateway.category_statistics(&statistics_query),
            );

            {
                let mut state = self.write_state();
                if self.generation.load(Ordering::SeqCst) != generation {
                    debug!(generation, "Discarding stale load response");
                    return Ok(());
                }
                if result.is_err() || self.edits_settled_since(epoch) {
                    state.loading = false;
                    return Self::apply_load(&mut state, generation, statistics_query, result);
                }
            }

            debug!(generation, "Edit overlapped load; refetching");
            drop(self.mutation_lock.lock().await);
        }
    }

    /// No edit in flight and none applied since `epoch` was read
    fn edits_settled_since(&self, epoch: u64) -> bool {
        epoch % 2 == 0 && self.edit_epoch.load(Ordering::SeqCst) == epoch
    }

    fn apply_load(
        state: &mut ControllerState,
        generation: u64,
        statistics_query: StatisticsQuery,
        result: Result<(TransactionPage, Vec<CategoryAggregate>)>,
    ) -> Result<()> {
        match result {
            Ok((page, statistics)) => {
                state.statistics_window = effective_window(statistics_query, &statistics);
                state.page = page;
                state.statistics = statistics;
                state.error = None;
                Ok(())
            }
            Err(e) => {
                let err = Error::Fetch(e.to_string());
                warn!(generation, error = %e, "Failed to load transactions");
                state.error = Some(err.to_string());
                Err(err)
            }
        }
    }

    /// Fresh statistics when the loaded snapshot's period is unknown locally
    ///
    /// Returns `None` when the window is pinned (reconcile instead) or the
    /// fetch failed (the snapshot is left for the next load).
    async fn refetch_unpinned_statistics(&self) -> Option<Vec<CategoryAggregate>> {
        let window = self.read_state().statistics_window;
        if window.is_pinned() {
            return None;
        }
        match self.gateway.category_statistics(&window).await {
            Ok(statistics) => Some(statistics),
            Err(e) => {
                warn!(error = %e, "Statistics refetch after edit failed");
                None
            }
        }
    }

    /// Fold one edit into the statistics snapshot
    fn update_statistics(
        state: &mut ControllerState,
        refetched: Option<Vec<CategoryAggregate>>,
        date: NaiveDate,
        delta: AggregateDelta,
    ) {
        match refetched {
            Some(statistics) => {
                state.statistics_window = effective_window(state.statistics_window, &statistics);
                state.statistics = statistics;
            }
            None if state.statistics_window.is_pinned() => {
                if state.statistics_window.covers(date) {
                    reconcile::apply(&mut state.statistics, delta);
                }
            }
            None => {}
        }
    }

    /// Move to page `page` (1-based) and load it
    pub async fn set_page(&self, page: u32) -> Result<()> {
        {
            let mut state = self.write_state();
            let last = state.page.total_pages;
            state.current_page = if last > 0 {
                page.clamp(1, last)
            } else {
                page.max(1)
            };
        }
        self.load().await
    }

    pub async fn next_page(&self) -> Result<()> {
        let next = self.read_state().current_page.saturating_add(1);
        self.set_page(next).await
    }

    pub async fn previous_page(&self) -> Result<()> {
        let previous = self.read_state().current_page.saturating_sub(1);
        self.set_page(previous).await
    }

    /// Change the server-side ordering and reload the current page index
    pub async fn set_sort(&self, sort: SortSpec) -> Result<()> {
        self.write_state().sort = sort;
        self.load().await
    }

    pub async fn set_statistics_query(&self, query: StatisticsQuery) -> Result<()> {
        self.write_state().statistics_query = query;
        self.load().await
    }

    // ==================== Filtering ====================

    async fn filter_changed(&self) -> Result<()> {
        if !self.server_side_filters {
            return Ok(());
        }
        self.write_state().current_page = 1;
        self.load().await
    }

    pub async fn set_search_term(&self, term: Option<&str>) -> Result<()> {
        {
            let mut state = self.write_state();
            state.filter = state.filter.clone().search(term);
        }
        self.filter_changed().await
    }

    pub async fn set_category_filter(&self, category: Option<Category>) -> Result<()> {
        self.write_state().filter.category = category;
        self.filter_changed().await
    }

    pub async fn set_date_range(&self, range: Option<(NaiveDate, NaiveDate)>) -> Result<()> {
        if let Some((from, to)) = range {
            if from > to {
                return Err(Error::InvalidData(format!(
                    "Date range start {} is after end {}",
                    from, to
                )));
            }
        }
        self.write_state().filter.date_range = range;
        self.filter_changed().await
    }

    pub async fn clear_filters(&self) -> Result<()> {
        self.write_state().filter = FilterSpec::default();
        self.filter_changed().await
    }

    // ==================== Mutations ====================

    /// Move a transaction on the current page to `category`
    ///
    /// The category must belong to the transaction's kind. On success the
    /// page holds the backend's version of the record, the statistics are
    /// reconciled and the edit is recorded for undo.
    pub async fn update_category(
        &self,
        transaction_id: i64,
        category: Category,
    ) -> Result<Transaction> {
        let _serial = self.mutation_lock.lock().await;

        let (old_category, kind) = {
            let state = self.read_state();
            let tx = state.page.find(transaction_id).ok_or_else(|| {
                Error::NotFound(format!("Transaction {} is not on this page", transaction_id))
            })?;
            if category.kind() != tx.kind() {
                return Err(Error::InvalidData(format!(
                    "Cannot assign {} category '{}' to {} transaction {}",
                    category.kind(),
                    category,
                    tx.kind(),
                    transaction_id
                )));
            }
            (tx.category(), tx.kind())
        };

        let edit = EditEpoch::begin(&self.edit_epoch);
        let updated = self
            .gateway
            .update_category(transaction_id, category)
            .await
            .map_err(|e| Error::Mutation {
                action: "update category",
                message: e.to_string(),
            })?;
        let refetched = self.refetch_unpinned_statistics().await;

        {
            let mut state = self.write_state();
            state.page.replace(updated.clone());
            Self::update_statistics(
                &mut state,
                refetched,
                updated.date,
                AggregateDelta::Recategorize {
                    old: old_category,
                    new: category,
                    kind,
                    magnitude: updated.magnitude(),
                },
            );
            state.history.record(UndoableAction::UpdateCategory {
                transaction_id,
                old_category,
                new_category: category,
                kind,
            });
            drop(edit);
        }

        info!(
            id = transaction_id,
            from = old_category.map_or("(none)", |c| c.as_str()),
            to = %category,
            "Updated transaction category"
        );
        self.spawn_overview_refresh();
        Ok(updated)
    }

    /// Delete a transaction on the current page
    ///
    /// The page is not refilled; it shrinks by one until the next load.
    pub async fn delete_transaction(&self, transaction_id: i64) -> Result<()> {
        let _serial = self.mutation_lock.lock().await;

        let transaction = self
            .read_state()
            .page
            .find(transaction_id)
            .cloned()
            .ok_or_else(|| {
                Error::NotFound(format!("Transaction {} is not on this page", transaction_id))
            })?;

        let edit = EditEpoch::begin(&self.edit_epoch);
        self.gateway
            .delete_transaction(transaction_id)
            .await
            .map_err(|e| Error::Mutation {
                action: "delete transaction",
                message: e.to_string(),
            })?;
        let refetched = self.refetch_unpinned_statistics().await;

        {
            let mut state = self.write_state();
            state.page.remove(transaction_id);
            Self::update_statistics(
                &mut state,
                refetched,
                transaction.date,
                AggregateDelta::Remove {
                    category: transaction.category(),
                    kind: transaction.kind(),
                    magnitude: transaction.magnitude(),
                },
            );
            state
                .history
                .record(UndoableAction::DeleteTransaction { transaction });
            drop(edit);
        }

        info!(id = transaction_id, "Deleted transaction");
        Ok(())
    }

    /// Revert the most recent recorded action
    ///
    /// Returns `Ok(false)` when there is nothing to undo, or when the last
    /// action is a category edit of an uncategorized transaction (which the
    /// backend cannot revert); that entry stays on the stack. A rejected
    /// backend call leaves the entry in place and returns `Error::Restore`.
    /// On success the entry is popped and the page is reloaded.
    pub async fn undo(&self) -> Result<bool> {
        if self.undoing.swap(true, Ordering::SeqCst) {
            return Err(Error::UndoInProgress);
        }
        let _undoing = UndoingGuard(&self.undoing);
        let _serial = self.mutation_lock.lock().await;

        let top = self.read_state().history.peek().cloned();
        let Some(action) = top else {
            debug!("Nothing to undo");
            return Ok(false);
        };

        if !action.is_reversible() {
            info!(
                id = action.transaction_id(),
                "Cannot undo category edit of an uncategorized transaction"
            );
            return Ok(false);
        }

        let outcome = match &action {
            UndoableAction::DeleteTransaction { transaction } => self
                .gateway
                .restore_transaction(transaction)
                .await
                .map(|restored| {
                    debug!(old_id = transaction.id, new_id = restored.id, "Restored");
                }),
            UndoableAction::UpdateCategory {
                transaction_id,
                old_category,
                ..
            } => match old_category {
                Some(old) => self
                    .gateway
                    .update_category(*transaction_id, *old)
                    .await
                    .map(|_| ()),
                None => return Ok(false),
            },
        };

        if let Err(e) = outcome {
            warn!(action = action.label(), error = %e, "Undo failed");
            return Err(Error::Restore {
                action: action.label(),
                message: e.to_string(),
            });
        }

        {
            let mut state = self.write_state();
            if state.history.peek() == Some(&action) {
                state.history.pop();
            }
        }
        info!(action = %action, "Undid action");

        if let Err(e) = self.load().await {
            warn!(error = %e, "Reload after undo failed");
        }
        Ok(true)
    }

    /// Forget all recorded actions (session boundary)
    pub fn clear_history(&self) {
        self.write_state().history.clear();
    }

    fn spawn_overview_refresh(&self) {
        let gateway = Arc::clone(&self.gateway);
        let events = self.events.clone();
        tokio::spawn(async move {
            let event = match gateway.refresh_overview().await {
                Ok(()) => {
                    debug!("Statistics overview refreshed");
                    ControllerEvent::OverviewRefreshed
                }
                Err(e) => {
                    warn!(error = %e, "Statistics overview refresh failed");
                    ControllerEvent::OverviewRefreshFailed {
                        message: e.to_string(),
                    }
                }
            };
            // No subscribers is fine; the log line above is the record.
            let _ = events.send(event);
        });
    }

    // ==================== Read access ====================

    /// Transactions of the loaded page that pass the active filter
    pub fn transactions(&self) -> Vec<Transaction> {
        let state = self.read_state();
        state.filter.apply(&state.page.items)
    }

    /// The loaded page as fetched (unfiltered)
    pub fn page(&self) -> TransactionPage {
        self.read_state().page.clone()
    }

    pub fn statistics(&self) -> Vec<CategoryAggregate> {
        self.read_state().statistics.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.read_state().loading
    }

    pub fn error(&self) -> Option<String> {
        self.read_state().error.clone()
    }

    pub fn current_page(&self) -> u32 {
        self.read_state().current_page
    }

    pub fn total_pages(&self) -> u32 {
        self.read_state().page.total_pages
    }

    pub fn total_transactions(&self) -> u64 {
        self.read_state().page.total
    }

    pub fn sort(&self) -> SortSpec {
        self.read_state().sort
    }

    pub fn filter(&self) -> FilterSpec {
        self.read_state().filter.clone()
    }

    pub fn statistics_query(&self) -> StatisticsQuery {
        self.read_state().statistics_query
    }

    pub fn can_undo(&self) -> bool {
        !self.undoing.load(Ordering::SeqCst) && !self.read_state().history.is_empty()
    }

    pub fn is_undoing(&self) -> bool {
        self.undoing.load(Ordering::SeqCst)
    }

    /// The action `undo()` would revert next
    pub fn last_action(&self) -> Option<UndoableAction> {
        self.read_state().history.peek().cloned()
    }

    /// Recorded actions, oldest first
    pub fn history(&self) -> Vec<UndoableAction> {
        self.read_state().history.iter().cloned().collect()
    }

    pub fn snapshot(&self) -> ControllerSnapshot {
        let undoing = self.undoing.load(Ordering::SeqCst);
        let state = self.read_state();
        ControllerSnapshot {
            transactions: state.filter.apply(&state.page.items),
            statistics: state.statistics.clone(),
            loading: state.loading,
            error: state.error.clone(),
            current_page: state.current_page,
            total_pages: state.page.total_pages,
            total_transactions: state.page.total,
            sort: state.sort,
            filter: state.filter.clone(),
            can_undo: !undoing && !state.history.is_empty(),
            last_action: state.history.peek().cloned(),
        }
    }
}
