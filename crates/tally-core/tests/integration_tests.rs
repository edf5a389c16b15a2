//! Integration tests for tally-core
//!
//! These tests drive the controller through full sessions against the
//! in-memory backend: load → edit → reconcile → undo → reload.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use tally_core::{
    gateway::{GatewayOp, MockGateway},
    Category, CategoryAggregate, ControllerOptions, Error, ExpenseCategory, IncomeCategory,
    SortDirection, SortField, SortSpec, StatisticsPeriod, StatisticsQuery, Transaction,
    TransactionListController, UndoableAction,
};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn expense(id: i64, day: u32, amount: f64, description: &str) -> Transaction {
    Transaction::new(
        id,
        "BE68 5390 0754 7034",
        date(2024, 5, day),
        amount,
        "EUR",
        description,
        "kbc",
    )
}

fn all_time() -> StatisticsQuery {
    StatisticsQuery::new(StatisticsPeriod::AllTime, None)
}

fn controller_for(gateway: &MockGateway, page_size: u32) -> TransactionListController {
    TransactionListController::new(
        Arc::new(gateway.clone()),
        ControllerOptions {
            page_size,
            statistics: all_time(),
            ..ControllerOptions::default()
        },
    )
}

/// Σ|amount| and count per category, computed from the backend's records
fn expected_aggregates(transactions: &[Transaction]) -> HashMap<Category, (f64, u32)> {
    let mut expected: HashMap<Category, (f64, u32)> = HashMap::new();
    for tx in transactions {
        if let Some(category) = tx.category() {
            let entry = expected.entry(category).or_insert((0.0, 0));
            entry.0 += tx.magnitude();
            entry.1 += 1;
        }
    }
    expected
}

fn assert_consistent(statistics: &[CategoryAggregate], transactions: &[Transaction]) {
    let expected = expected_aggregates(transactions);
    assert_eq!(statistics.len(), expected.len(), "aggregate set differs");
    for agg in statistics {
        assert!(agg.transaction_count > 0, "zero-count aggregate survived");
        let (total, count) = expected
            .get(&agg.category)
            .unwrap_or_else(|| panic!("unexpected aggregate {}", agg.category));
        assert_eq!(agg.transaction_count, *count, "count for {}", agg.category);
        assert!(
            (agg.total_amount - total).abs() < 1e-6,
            "total for {}: {} != {}",
            agg.category,
            agg.total_amount,
            total
        );
    }
}

fn aggregate(statistics: &[CategoryAggregate], category: Category) -> Option<&CategoryAggregate> {
    statistics.iter().find(|a| a.category == category)
}

// =============================================================================
// Aggregate consistency
// =============================================================================

#[tokio::test]
async fn test_statistics_stay_consistent_across_recategorizations() {
    let gateway = MockGateway::with_demo_data();
    let ctl = controller_for(&gateway, 20);
    ctl.load().await.unwrap();
    assert_consistent(&ctl.statistics(), &gateway.transactions());

    let edits: Vec<(i64, Category)> = vec![
        // Groceries → Eating Out
        (3, ExpenseCategory::EatingOut.into()),
        // uncategorized → Entertainment
        (9, ExpenseCategory::Entertainment.into()),
        (4, ExpenseCategory::Groceries.into()),
        // sole members of Donations and Freelance Income move out
        (14, ExpenseCategory::Gifts.into()),
        (16, IncomeCategory::Business.into()),
        // same category again
        (3, ExpenseCategory::EatingOut.into()),
    ];

    for (id, category) in edits {
        ctl.update_category(id, category).await.unwrap();
        assert_consistent(&ctl.statistics(), &gateway.transactions());
    }

    let statistics = ctl.statistics();
    assert!(aggregate(&statistics, ExpenseCategory::Donations.into()).is_none());
    assert!(aggregate(&statistics, IncomeCategory::Freelance.into()).is_none());

    // A fresh snapshot from the backend agrees with the reconciled one
    let reconciled = ctl.statistics();
    ctl.load().await.unwrap();
    assert_consistent(&reconciled, &gateway.transactions());
}

#[tokio::test]
async fn test_recategorize_splits_groceries_total() {
    let gateway = MockGateway::with_transactions(vec![
        expense(1, 3, -60.0, "Weekly shop")
            .with_category(ExpenseCategory::Groceries.into())
            .unwrap(),
        expense(2, 10, -40.0, "Deli counter")
            .with_category(ExpenseCategory::Groceries.into())
            .unwrap(),
    ]);
    let ctl = controller_for(&gateway, 10);
    ctl.load().await.unwrap();

    let groceries = aggregate(&ctl.statistics(), ExpenseCategory::Groceries.into())
        .cloned()
        .unwrap();
    assert_eq!(groceries.total_amount, 100.0);
    assert_eq!(groceries.transaction_count, 2);

    ctl.update_category(2, ExpenseCategory::EatingOut.into())
        .await
        .unwrap();

    let statistics = ctl.statistics();
    let groceries = aggregate(&statistics, ExpenseCategory::Groceries.into()).unwrap();
    assert_eq!(groceries.total_amount, 60.0);
    assert_eq!(groceries.transaction_count, 1);
    let eating_out = aggregate(&statistics, ExpenseCategory::EatingOut.into()).unwrap();
    assert_eq!(eating_out.total_amount, 40.0);
    assert_eq!(eating_out.transaction_count, 1);
}

#[tokio::test]
async fn test_deleting_sole_member_removes_aggregate() {
    let gateway = MockGateway::with_transactions(vec![
        expense(1, 3, -25.0, "Market")
            .with_category(ExpenseCategory::Groceries.into())
            .unwrap(),
        expense(2, 4, -80.0, "Train")
            .with_category(ExpenseCategory::Transportation.into())
            .unwrap(),
    ]);
    let ctl = controller_for(&gateway, 10);
    ctl.load().await.unwrap();

    ctl.delete_transaction(1).await.unwrap();

    let statistics = ctl.statistics();
    assert!(aggregate(&statistics, ExpenseCategory::Groceries.into()).is_none());
    assert!(aggregate(&statistics, ExpenseCategory::Transportation.into()).is_some());
    assert!(statistics.iter().all(|a| a.transaction_count > 0));

    let page = ctl.page();
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.total, 1);
    assert_eq!(page.total_pages, 1);
}

#[tokio::test]
async fn test_delete_does_not_refill_page() {
    let gateway = MockGateway::with_demo_data();
    let ctl = controller_for(&gateway, 5);
    ctl.load().await.unwrap();
    assert_eq!(ctl.total_pages(), 4);

    let victims: Vec<i64> = ctl.transactions().iter().take(2).map(|t| t.id).collect();
    for id in victims {
        ctl.delete_transaction(id).await.unwrap();
    }

    assert_eq!(ctl.transactions().len(), 3);
    assert_eq!(ctl.total_transactions(), 18);
    assert_eq!(ctl.total_pages(), 4);
    assert_consistent(&ctl.statistics(), &gateway.transactions());

    ctl.load().await.unwrap();
    assert_eq!(ctl.transactions().len(), 5);
}

// =============================================================================
// Undo
// =============================================================================

#[tokio::test]
async fn test_undo_with_empty_history_makes_no_call() {
    let gateway = MockGateway::with_demo_data();
    let ctl = controller_for(&gateway, 5);
    ctl.load().await.unwrap();
    gateway.clear_calls();

    assert!(!ctl.undo().await.unwrap());
    assert!(gateway.calls().is_empty());
}

#[tokio::test]
async fn test_undo_delete_restores_business_fields() {
    let gateway = MockGateway::with_demo_data();
    let ctl = controller_for(&gateway, 5);
    ctl.load().await.unwrap();
    let original = ctl.transactions()[0].clone();
    assert!(original.category().is_some());
    let statistics_before = ctl.statistics();

    ctl.delete_transaction(original.id).await.unwrap();
    assert!(matches!(
        ctl.last_action(),
        Some(UndoableAction::DeleteTransaction { ref transaction }) if transaction == &original
    ));

    assert!(ctl.undo().await.unwrap());

    let restored = ctl
        .transactions()
        .into_iter()
        .find(|t| t.same_business_fields(&original))
        .expect("restored transaction on page");
    assert_ne!(restored.id, original.id);
    assert!(!ctl.can_undo());
    assert_eq!(ctl.total_transactions(), 20);
    assert_consistent(&ctl.statistics(), &gateway.transactions());
    assert_eq!(ctl.statistics().len(), statistics_before.len());
}

#[tokio::test]
async fn test_undo_category_update_restores_old_category() {
    let gateway = MockGateway::with_demo_data();
    let ctl = controller_for(&gateway, 20);
    ctl.load().await.unwrap();

    ctl.update_category(12, ExpenseCategory::Personal.into())
        .await
        .unwrap();
    assert!(ctl.undo().await.unwrap());

    let tx = ctl.page().find(12).cloned().unwrap();
    assert_eq!(tx.category(), Some(ExpenseCategory::Groceries.into()));
    assert!(aggregate(&ctl.statistics(), ExpenseCategory::Personal.into()).is_none());
    assert_consistent(&ctl.statistics(), &gateway.transactions());
}

#[tokio::test]
async fn test_undo_of_first_categorization_is_not_applicable() {
    let gateway = MockGateway::with_demo_data();
    let ctl = controller_for(&gateway, 20);
    ctl.load().await.unwrap();

    // "Bookshop" starts uncategorized
    ctl.update_category(18, ExpenseCategory::Education.into())
        .await
        .unwrap();
    gateway.clear_calls();

    assert!(!ctl.undo().await.unwrap());
    assert!(gateway.calls().is_empty());
    assert!(matches!(
        ctl.last_action(),
        Some(UndoableAction::UpdateCategory {
            transaction_id: 18,
            old_category: None,
            ..
        })
    ));
    assert!(ctl.can_undo());
}

#[tokio::test]
async fn test_failed_undo_keeps_entry() {
    let gateway = MockGateway::with_demo_data();
    let ctl = controller_for(&gateway, 5);
    ctl.load().await.unwrap();
    let id = ctl.transactions()[0].id;
    ctl.delete_transaction(id).await.unwrap();

    gateway.fail_next(GatewayOp::Restore);
    let err = ctl.undo().await.unwrap_err();
    assert!(matches!(err, Error::Restore { action: "delete", .. }));
    assert!(ctl.can_undo());

    assert!(ctl.undo().await.unwrap());
    assert!(!ctl.can_undo());
}

#[tokio::test]
async fn test_undo_reverts_most_recent_first() {
    let gateway = MockGateway::with_demo_data();
    let ctl = controller_for(&gateway, 20);
    ctl.load().await.unwrap();

    ctl.update_category(4, ExpenseCategory::Travel.into())
        .await
        .unwrap();
    ctl.delete_transaction(5).await.unwrap();
    assert_eq!(ctl.history().len(), 2);

    assert!(ctl.undo().await.unwrap());
    assert!(matches!(
        ctl.last_action(),
        Some(UndoableAction::UpdateCategory {
            transaction_id: 4,
            ..
        })
    ));

    assert!(ctl.undo().await.unwrap());
    assert!(ctl.history().is_empty());
    assert_consistent(&ctl.statistics(), &gateway.transactions());
}

#[tokio::test]
async fn test_concurrent_undo_is_rejected() {
    let gateway = MockGateway::with_demo_data();
    let ctl = Arc::new(controller_for(&gateway, 5));
    ctl.load().await.unwrap();
    let id = ctl.transactions()[0].id;
    ctl.delete_transaction(id).await.unwrap();

    // Hold the first undo in its reload
    gateway.delay_next_list(Duration::from_millis(300));
    let first = tokio::spawn({
        let ctl = Arc::clone(&ctl);
        async move { ctl.undo().await }
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(ctl.is_undoing());
    assert!(!ctl.can_undo());
    assert!(matches!(ctl.undo().await, Err(Error::UndoInProgress)));

    assert!(first.await.unwrap().unwrap());
    assert!(!ctl.is_undoing());
    assert_eq!(gateway.calls_of(GatewayOp::Restore), 1);
}

#[tokio::test]
async fn test_failed_mutations_leave_history_untouched() {
    let gateway = MockGateway::with_demo_data();
    let ctl = controller_for(&gateway, 5);
    ctl.load().await.unwrap();
    let id = ctl.transactions()[0].id;

    gateway.fail_next(GatewayOp::UpdateCategory);
    let err = ctl
        .update_category(id, ExpenseCategory::Others.into())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Mutation { .. }));
    assert!(ctl.history().is_empty());
    assert!(ctl.error().is_none());
}

#[tokio::test]
async fn test_history_capacity_evicts_oldest() {
    let gateway = MockGateway::with_demo_data();
    let ctl = TransactionListController::new(
        Arc::new(gateway.clone()),
        ControllerOptions {
            page_size: 20,
            statistics: all_time(),
            history_capacity: 2,
            ..ControllerOptions::default()
        },
    );
    ctl.load().await.unwrap();

    for id in [3, 6, 12] {
        ctl.update_category(id, ExpenseCategory::Others.into())
            .await
            .unwrap();
    }

    let ids: Vec<i64> = ctl.history().iter().map(|a| a.transaction_id()).collect();
    assert_eq!(ids, vec![6, 12]);

    ctl.clear_history();
    assert!(!ctl.can_undo());
}

// =============================================================================
// Load sequencing
// =============================================================================

#[tokio::test]
async fn test_latest_sort_wins() {
    let gateway = MockGateway::with_demo_data();
    let ctl = Arc::new(controller_for(&gateway, 5));
    ctl.load().await.unwrap();

    let by_amount = SortSpec::new(SortField::Amount, SortDirection::Asc);
    let by_description = SortSpec::new(SortField::Description, SortDirection::Asc);

    // First request resolves after the second one
    gateway.delay_next_list(Duration::from_millis(200));
    let first = tokio::spawn({
        let ctl = Arc::clone(&ctl);
        async move { ctl.set_sort(by_amount).await }
    });
    tokio::time::sleep(Duration::from_millis(30)).await;
    ctl.set_sort(by_description).await.unwrap();
    first.await.unwrap().unwrap();

    assert_eq!(ctl.sort(), by_description);
    assert!(!ctl.is_loading());
    let descriptions: Vec<String> = ctl
        .transactions()
        .into_iter()
        .map(|t| t.description)
        .collect();
    let mut sorted = descriptions.clone();
    sorted.sort();
    assert_eq!(descriptions, sorted);
    assert_eq!(descriptions[0], "Aldi");
}

#[tokio::test]
async fn test_loading_flag_tracks_in_flight_load() {
    let gateway = MockGateway::with_demo_data();
    let ctl = Arc::new(controller_for(&gateway, 5));

    gateway.delay_next_list(Duration::from_millis(200));
    let load = tokio::spawn({
        let ctl = Arc::clone(&ctl);
        async move { ctl.load().await }
    });
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert!(ctl.is_loading());

    load.await.unwrap().unwrap();
    assert!(!ctl.is_loading());
    assert_eq!(ctl.transactions().len(), 5);
}

#[tokio::test]
async fn test_load_overlapping_recategorize_keeps_statistics_consistent() {
    let gateway = MockGateway::with_demo_data();
    let ctl = Arc::new(controller_for(&gateway, 20));
    ctl.load().await.unwrap();
    assert!(aggregate(&ctl.statistics(), ExpenseCategory::Personal.into()).is_none());

    // Statistics for this load come back before the edit, the page after it
    gateway.delay_next_list(Duration::from_millis(200));
    let load = tokio::spawn({
        let ctl = Arc::clone(&ctl);
        async move { ctl.load().await }
    });
    tokio::time::sleep(Duration::from_millis(30)).await;
    ctl.update_category(12, ExpenseCategory::Personal.into())
        .await
        .unwrap();
    load.await.unwrap().unwrap();

    let statistics = ctl.statistics();
    let personal = aggregate(&statistics, ExpenseCategory::Personal.into()).unwrap();
    assert_eq!(personal.transaction_count, 1);
    assert_consistent(&statistics, &gateway.transactions());
    let tx = ctl.page().find(12).cloned().unwrap();
    assert_eq!(tx.category(), Some(ExpenseCategory::Personal.into()));
    assert_eq!(gateway.calls_of(GatewayOp::List), 3);
    assert!(!ctl.is_loading());
}

#[tokio::test]
async fn test_load_overlapping_delete_keeps_statistics_consistent() {
    let gateway = MockGateway::with_demo_data();
    let ctl = Arc::new(controller_for(&gateway, 20));
    ctl.load().await.unwrap();

    gateway.delay_next_list(Duration::from_millis(200));
    let load = tokio::spawn({
        let ctl = Arc::clone(&ctl);
        async move { ctl.load().await }
    });
    tokio::time::sleep(Duration::from_millis(30)).await;
    ctl.delete_transaction(12).await.unwrap();
    load.await.unwrap().unwrap();

    assert_consistent(&ctl.statistics(), &gateway.transactions());
    assert!(ctl.page().find(12).is_none());
    assert_eq!(ctl.total_transactions(), 19);
    assert!(ctl.can_undo());
}

#[tokio::test]
async fn test_open_month_with_empty_snapshot_refetches_after_edit() {
    let april = Transaction::new(
        1,
        "BE68 5390 0754 7034",
        date(2024, 4, 20),
        -30.0,
        "EUR",
        "Colruyt",
        "kbc",
    )
    .with_category(ExpenseCategory::Groceries.into())
    .unwrap();
    let gateway = MockGateway::with_transactions(vec![april, expense(2, 6, -12.0, "Bookshop")]);
    let ctl = TransactionListController::new(
        Arc::new(gateway.clone()),
        ControllerOptions {
            page_size: 10,
            statistics: StatisticsQuery::new(StatisticsPeriod::Monthly, None),
            ..ControllerOptions::default()
        },
    );
    ctl.load().await.unwrap();
    // The backend reports May, where nothing is categorized yet
    assert!(ctl.statistics().is_empty());

    ctl.update_category(1, ExpenseCategory::EatingOut.into())
        .await
        .unwrap();
    assert!(ctl.statistics().is_empty());

    ctl.update_category(2, ExpenseCategory::Personal.into())
        .await
        .unwrap();
    let statistics = ctl.statistics();
    assert_eq!(statistics.len(), 1);
    let personal = aggregate(&statistics, ExpenseCategory::Personal.into()).unwrap();
    assert_eq!(personal.transaction_count, 1);
    assert_eq!(personal.date, Some(date(2024, 5, 6)));

    // Pinned to May now: an April edit neither reconciles nor refetches
    gateway.clear_calls();
    ctl.update_category(1, ExpenseCategory::Groceries.into())
        .await
        .unwrap();
    assert_eq!(ctl.statistics(), statistics);
    assert_eq!(gateway.calls_of(GatewayOp::Statistics), 0);
}

#[tokio::test]
async fn test_statistics_query_change_reloads() {
    let gateway = MockGateway::with_demo_data();
    let ctl = controller_for(&gateway, 5);
    ctl.load().await.unwrap();

    let february = StatisticsQuery::new(StatisticsPeriod::Monthly, Some(date(2024, 2, 1)));
    ctl.set_statistics_query(february).await.unwrap();

    let statistics = ctl.statistics();
    let groceries = aggregate(&statistics, ExpenseCategory::Groceries.into()).unwrap();
    assert_eq!(groceries.transaction_count, 2);
    assert!(aggregate(&statistics, ExpenseCategory::Donations.into()).is_none());
    assert_eq!(ctl.statistics_query(), february);
}

// =============================================================================
// Snapshot
// =============================================================================

#[tokio::test]
async fn test_snapshot_serializes_for_presentation() {
    let gateway = MockGateway::with_demo_data();
    let ctl = controller_for(&gateway, 5);
    ctl.load().await.unwrap();
    ctl.set_search_term(Some("salary")).await.unwrap();

    let snapshot = ctl.snapshot();
    assert_eq!(snapshot.current_page, 1);
    assert_eq!(snapshot.total_transactions, 20);
    assert!(!snapshot.can_undo);

    let json = serde_json::to_value(&snapshot).unwrap();
    assert_eq!(json["total_pages"], 4);
    assert_eq!(json["filter"]["search"], "salary");
}
