//! Transaction filter builder
//!
//! A `FilterSpec` is either applied locally to the loaded page or turned into
//! backend query parameters, with the same matching rules in both places.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::{Category, Transaction};

/// Search term, category and date range narrowing the visible transactions
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSpec {
    pub search: Option<String>,
    pub category: Option<Category>,
    /// Inclusive (from, to)
    pub date_range: Option<(NaiveDate, NaiveDate)>,
}

impl FilterSpec {
    /// Create a new filter builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set search query (matches description and counterparty name)
    pub fn search(mut self, query: Option<&str>) -> Self {
        self.search = query
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(str::to_string);
        self
    }

    /// Set category filter
    pub fn category(mut self, category: Option<Category>) -> Self {
        self.category = category;
        self
    }

    /// Set date range filter
    pub fn date_range(mut self, range: Option<(NaiveDate, NaiveDate)>) -> Self {
        self.date_range = range;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.search.is_none() && self.category.is_none() && self.date_range.is_none()
    }

    pub fn matches(&self, tx: &Transaction) -> bool {
        if let Some(ref q) = self.search {
            let needle = q.to_lowercase();
            let in_description = tx.description.to_lowercase().contains(&needle);
            let in_counterparty = tx
                .counterparty_name
                .as_deref()
                .is_some_and(|n| n.to_lowercase().contains(&needle));
            if !in_description && !in_counterparty {
                return false;
            }
        }

        if let Some(category) = self.category {
            if tx.category() != Some(category) {
                return false;
            }
        }

        if let Some((from, to)) = self.date_range {
            if tx.date < from || tx.date > to {
                return false;
            }
        }

        true
    }

    /// Transactions from `items` that pass the filter, in their original order
    pub fn apply(&self, items: &[Transaction]) -> Vec<Transaction> {
        if self.is_empty() {
            return items.to_vec();
        }
        items.iter().filter(|t| self.matches(t)).cloned().collect()
    }

    /// Query parameters understood by the transactions endpoint
    pub fn query_params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if let Some(ref q) = self.search {
            params.push(("search", q.clone()));
        }
        if let Some(category) = self.category {
            params.push(("category", category.as_str().to_string()));
        }
        if let Some((from, to)) = self.date_range {
            params.push(("start_date", from.format("%Y-%m-%d").to_string()));
            params.push(("end_date", to.format("%Y-%m-%d").to_string()));
        }
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ExpenseCategory, IncomeCategory};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn sample() -> Vec<Transaction> {
        vec![
            Transaction::new(1, "A", date(2024, 1, 5), -30.0, "EUR", "Colruyt", "kbc")
                .with_category(ExpenseCategory::Groceries.into())
                .unwrap(),
            Transaction::new(2, "A", date(2024, 1, 20), -15.0, "EUR", "Card payment", "kbc")
                .with_counterparty("Pizza Hut", None)
                .with_category(ExpenseCategory::EatingOut.into())
                .unwrap(),
            Transaction::new(3, "A", date(2024, 2, 1), 2000.0, "EUR", "Salary Jan", "kbc")
                .with_category(IncomeCategory::Salary.into())
                .unwrap(),
        ]
    }

    #[test]
    fn test_empty_filter_keeps_everything() {
        let items = sample();
        assert_eq!(FilterSpec::new().apply(&items).len(), 3);
    }

    #[test]
    fn test_search_matches_counterparty_case_insensitively() {
        let filter = FilterSpec::new().search(Some("pizza"));
        let ids: Vec<i64> = filter.apply(&sample()).iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![2]);
    }

    #[test]
    fn test_blank_search_is_ignored() {
        let filter = FilterSpec::new().search(Some("   "));
        assert!(filter.is_empty());
    }

    #[test]
    fn test_category_and_date_range_combine() {
        let filter = FilterSpec::new()
            .category(Some(ExpenseCategory::Groceries.into()))
            .date_range(Some((date(2024, 1, 1), date(2024, 1, 31))));
        let ids: Vec<i64> = filter.apply(&sample()).iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![1]);

        let outside = FilterSpec::new().date_range(Some((date(2024, 1, 6), date(2024, 1, 31))));
        let ids: Vec<i64> = outside.apply(&sample()).iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![2]);
    }

    #[test]
    fn test_query_params() {
        let filter = FilterSpec::new()
            .search(Some("rent"))
            .category(Some(ExpenseCategory::Housing.into()))
            .date_range(Some((date(2024, 1, 1), date(2024, 3, 31))));

        assert_eq!(
            filter.query_params(),
            vec![
                ("search", "rent".to_string()),
                ("category", "Housing".to_string()),
                ("start_date", "2024-01-01".to_string()),
                ("end_date", "2024-03-31".to_string()),
            ]
        );
    }
}
