//! Domain models for Tally
//!
//! Wire shapes follow the dashboard backend. Records that carry a category are
//! decoded through a wire struct so that a transaction's category always
//! belongs to the same kind as the transaction itself.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::warn;

use crate::error::Error;

/// Income/Expense discriminator on a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionKind {
    Income,
    Expense,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Income => "Income",
            Self::Expense => "Expense",
        }
    }

    /// Kind implied by the sign of an amount (negative = expense)
    pub fn from_amount(amount: f64) -> Self {
        if amount < 0.0 {
            Self::Expense
        } else {
            Self::Income
        }
    }
}

impl std::str::FromStr for TransactionKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "income" => Ok(Self::Income),
            "expense" => Ok(Self::Expense),
            _ => Err(format!("Unknown transaction type: {}", s)),
        }
    }
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Categories an expense transaction may carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExpenseCategory {
    Housing,
    Utilities,
    Groceries,
    #[serde(rename = "Eating Out")]
    EatingOut,
    Transportation,
    Insurance,
    Debt,
    Investments,
    Personal,
    Gifts,
    Donations,
    Education,
    Travel,
    Entertainment,
    Others,
}

impl ExpenseCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Housing => "Housing",
            Self::Utilities => "Utilities",
            Self::Groceries => "Groceries",
            Self::EatingOut => "Eating Out",
            Self::Transportation => "Transportation",
            Self::Insurance => "Insurance",
            Self::Debt => "Debt",
            Self::Investments => "Investments",
            Self::Personal => "Personal",
            Self::Gifts => "Gifts",
            Self::Donations => "Donations",
            Self::Education => "Education",
            Self::Travel => "Travel",
            Self::Entertainment => "Entertainment",
            Self::Others => "Others",
        }
    }

    pub fn all() -> &'static [ExpenseCategory] {
        &[
            Self::Housing,
            Self::Utilities,
            Self::Groceries,
            Self::EatingOut,
            Self::Transportation,
            Self::Insurance,
            Self::Debt,
            Self::Investments,
            Self::Personal,
            Self::Gifts,
            Self::Donations,
            Self::Education,
            Self::Travel,
            Self::Entertainment,
            Self::Others,
        ]
    }
}

impl std::str::FromStr for ExpenseCategory {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::all()
            .iter()
            .copied()
            .find(|c| c.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| format!("Unknown expense category: {}", s))
    }
}

impl std::fmt::Display for ExpenseCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Categories an income transaction may carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IncomeCategory {
    Salary,
    #[serde(rename = "Investment Income")]
    Investments,
    #[serde(rename = "Business Income")]
    Business,
    #[serde(rename = "Rental Income")]
    Rental,
    #[serde(rename = "Freelance Income")]
    Freelance,
    Pension,
    Benefits,
    #[serde(rename = "Gifts Received")]
    Gifts,
    Refunds,
    #[serde(rename = "Other Income")]
    Other,
}

impl IncomeCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Salary => "Salary",
            Self::Investments => "Investment Income",
            Self::Business => "Business Income",
            Self::Rental => "Rental Income",
            Self::Freelance => "Freelance Income",
            Self::Pension => "Pension",
            Self::Benefits => "Benefits",
            Self::Gifts => "Gifts Received",
            Self::Refunds => "Refunds",
            Self::Other => "Other Income",
        }
    }

    pub fn all() -> &'static [IncomeCategory] {
        &[
            Self::Salary,
            Self::Investments,
            Self::Business,
            Self::Rental,
            Self::Freelance,
            Self::Pension,
            Self::Benefits,
            Self::Gifts,
            Self::Refunds,
            Self::Other,
        ]
    }
}

impl std::str::FromStr for IncomeCategory {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::all()
            .iter()
            .copied()
            .find(|c| c.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| format!("Unknown income category: {}", s))
    }
}

impl std::fmt::Display for IncomeCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A category from either kind-specific set
///
/// The variant fixes the kind, so a category can never be attached to a
/// transaction of the other kind by accident. Serialized as its display name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Expense(ExpenseCategory),
    Income(IncomeCategory),
}

impl Category {
    pub fn kind(&self) -> TransactionKind {
        match self {
            Self::Expense(_) => TransactionKind::Expense,
            Self::Income(_) => TransactionKind::Income,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Expense(c) => c.as_str(),
            Self::Income(c) => c.as_str(),
        }
    }

    /// Parse a category name from the set belonging to `kind`
    pub fn parse_for(kind: TransactionKind, name: &str) -> Option<Self> {
        match kind {
            TransactionKind::Expense => name.parse().ok().map(Self::Expense),
            TransactionKind::Income => name.parse().ok().map(Self::Income),
        }
    }
}

impl From<ExpenseCategory> for Category {
    fn from(c: ExpenseCategory) -> Self {
        Self::Expense(c)
    }
}

impl From<IncomeCategory> for Category {
    fn from(c: IncomeCategory) -> Self {
        Self::Income(c)
    }
}

impl std::str::FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::parse_for(TransactionKind::Expense, s)
            .or_else(|| Self::parse_for(TransactionKind::Income, s))
            .ok_or_else(|| format!("Unknown category: {}", s))
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Serialize for Category {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Category {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(serde::de::Error::custom)
    }
}

/// A financial transaction as served by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TransactionWire", into = "TransactionWire")]
pub struct Transaction {
    pub id: i64,
    pub account_number: String,
    pub date: NaiveDate,
    /// Negative = expense, positive = income
    pub amount: f64,
    pub currency: String,
    pub description: String,
    pub counterparty_name: Option<String>,
    pub counterparty_account: Option<String>,
    pub source_bank: String,
    kind: TransactionKind,
    category: Option<Category>,
}

impl Transaction {
    /// Create an uncategorized transaction whose kind follows the amount sign
    pub fn new(
        id: i64,
        account_number: &str,
        date: NaiveDate,
        amount: f64,
        currency: &str,
        description: &str,
        source_bank: &str,
    ) -> Self {
        Self {
            id,
            account_number: account_number.to_string(),
            date,
            amount,
            currency: currency.to_string(),
            description: description.to_string(),
            counterparty_name: None,
            counterparty_account: None,
            source_bank: source_bank.to_string(),
            kind: TransactionKind::from_amount(amount),
            category: None,
        }
    }

    pub fn with_counterparty(mut self, name: &str, account: Option<&str>) -> Self {
        self.counterparty_name = Some(name.to_string());
        self.counterparty_account = account.map(str::to_string);
        self
    }

    /// Override the kind, dropping a category that no longer fits
    pub fn with_kind(mut self, kind: TransactionKind) -> Self {
        self.kind = kind;
        if self.category.is_some_and(|c| c.kind() != kind) {
            self.category = None;
        }
        self
    }

    /// Attach a category; it must belong to this transaction's kind
    pub fn with_category(mut self, category: Category) -> crate::Result<Self> {
        self.set_category(Some(category))?;
        Ok(self)
    }

    pub fn kind(&self) -> TransactionKind {
        self.kind
    }

    pub fn category(&self) -> Option<Category> {
        self.category
    }

    pub fn set_category(&mut self, category: Option<Category>) -> crate::Result<()> {
        if let Some(c) = category {
            if c.kind() != self.kind {
                return Err(Error::InvalidData(format!(
                    "{} category '{}' cannot be assigned to {} transaction {}",
                    c.kind(),
                    c,
                    self.kind,
                    self.id
                )));
            }
        }
        self.category = category;
        Ok(())
    }

    /// Unsigned amount used for aggregate totals
    pub fn magnitude(&self) -> f64 {
        self.amount.abs()
    }

    /// Compare everything except the server-assigned id
    pub fn same_business_fields(&self, other: &Transaction) -> bool {
        self.account_number == other.account_number
            && self.date == other.date
            && self.amount == other.amount
            && self.currency == other.currency
            && self.description == other.description
            && self.counterparty_name == other.counterparty_name
            && self.counterparty_account == other.counterparty_account
            && self.source_bank == other.source_bank
            && self.kind == other.kind
            && self.category == other.category
    }
}

/// Backend JSON shape of a transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
struct TransactionWire {
    #[serde(default)]
    id: i64,
    account_number: String,
    transaction_date: NaiveDate,
    amount: f64,
    currency: String,
    description: String,
    #[serde(default)]
    counterparty_name: Option<String>,
    #[serde(default)]
    counterparty_account: Option<String>,
    #[serde(default)]
    transaction_type: Option<TransactionKind>,
    #[serde(default)]
    expense_category: Option<ExpenseCategory>,
    #[serde(default)]
    income_category: Option<IncomeCategory>,
    source_bank: String,
}

impl TryFrom<TransactionWire> for Transaction {
    type Error = Error;

    fn try_from(wire: TransactionWire) -> std::result::Result<Self, Self::Error> {
        if !wire.amount.is_finite() {
            return Err(Error::InvalidData(format!(
                "Transaction {} has a non-finite amount",
                wire.id
            )));
        }

        let kind = wire
            .transaction_type
            .unwrap_or_else(|| TransactionKind::from_amount(wire.amount));

        let category = match kind {
            TransactionKind::Expense => wire.expense_category.map(Category::Expense),
            TransactionKind::Income => wire.income_category.map(Category::Income),
        };

        let mismatched = match kind {
            TransactionKind::Expense => wire.income_category.map(|c| c.as_str()),
            TransactionKind::Income => wire.expense_category.map(|c| c.as_str()),
        };
        if let Some(name) = mismatched {
            warn!(
                id = wire.id,
                kind = %kind,
                category = name,
                "Ignoring category that does not match transaction kind"
            );
        }

        Ok(Self {
            id: wire.id,
            account_number: wire.account_number,
            date: wire.transaction_date,
            amount: wire.amount,
            currency: wire.currency,
            description: wire.description,
            counterparty_name: wire.counterparty_name,
            counterparty_account: wire.counterparty_account,
            source_bank: wire.source_bank,
            kind,
            category,
        })
    }
}

impl From<Transaction> for TransactionWire {
    fn from(tx: Transaction) -> Self {
        let (expense_category, income_category) = match tx.category {
            Some(Category::Expense(c)) => (Some(c), None),
            Some(Category::Income(c)) => (None, Some(c)),
            None => (None, None),
        };
        Self {
            id: tx.id,
            account_number: tx.account_number,
            transaction_date: tx.date,
            amount: tx.amount,
            currency: tx.currency,
            description: tx.description,
            counterparty_name: tx.counterparty_name,
            counterparty_account: tx.counterparty_account,
            transaction_type: Some(tx.kind),
            expense_category,
            income_category,
            source_bank: tx.source_bank,
        }
    }
}

/// One page of the server-side transaction collection
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionPage {
    pub items: Vec<Transaction>,
    pub total: u64,
    /// 1-based page index
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u32,
}

impl TransactionPage {
    /// Number of pages needed for `total` items
    pub fn pages_for(total: u64, page_size: u32) -> u32 {
        if page_size == 0 {
            return 0;
        }
        total.div_ceil(u64::from(page_size)) as u32
    }

    pub fn find(&self, id: i64) -> Option<&Transaction> {
        self.items.iter().find(|t| t.id == id)
    }

    /// Swap in a new version of a transaction, keeping its position
    pub fn replace(&mut self, transaction: Transaction) -> bool {
        match self.items.iter_mut().find(|t| t.id == transaction.id) {
            Some(slot) => {
                *slot = transaction;
                true
            }
            None => false,
        }
    }

    /// Drop a transaction from the page and shrink the totals
    ///
    /// The page is not refilled from the next server page.
    pub fn remove(&mut self, id: i64) -> Option<Transaction> {
        let index = self.items.iter().position(|t| t.id == id)?;
        let removed = self.items.remove(index);
        self.total = self.total.saturating_sub(1);
        self.total_pages = Self::pages_for(self.total, self.page_size);
        Some(removed)
    }
}

/// Per-(category, kind) total and count
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "AggregateWire", into = "AggregateWire")]
pub struct CategoryAggregate {
    pub category: Category,
    pub total_amount: f64,
    pub transaction_count: u32,
    pub period: Option<String>,
    pub date: Option<NaiveDate>,
}

impl CategoryAggregate {
    pub fn new(category: Category, total_amount: f64, transaction_count: u32) -> Self {
        Self {
            category,
            total_amount,
            transaction_count,
            period: None,
            date: None,
        }
    }

    pub fn kind(&self) -> TransactionKind {
        self.category.kind()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct AggregateWire {
    category: String,
    transaction_type: TransactionKind,
    total_amount: f64,
    transaction_count: u32,
    #[serde(default)]
    period: Option<String>,
    #[serde(default)]
    date: Option<NaiveDate>,
}

impl TryFrom<AggregateWire> for CategoryAggregate {
    type Error = Error;

    fn try_from(wire: AggregateWire) -> std::result::Result<Self, Self::Error> {
        let category =
            Category::parse_for(wire.transaction_type, &wire.category).ok_or_else(|| {
                Error::InvalidData(format!(
                    "Unknown {} category '{}' in statistics",
                    wire.transaction_type, wire.category
                ))
            })?;
        Ok(Self {
            category,
            total_amount: wire.total_amount.abs(),
            transaction_count: wire.transaction_count,
            period: wire.period,
            date: wire.date,
        })
    }
}

impl From<CategoryAggregate> for AggregateWire {
    fn from(agg: CategoryAggregate) -> Self {
        Self {
            category: agg.category.as_str().to_string(),
            transaction_type: agg.category.kind(),
            total_amount: agg.total_amount,
            transaction_count: agg.transaction_count,
            period: agg.period,
            date: agg.date,
        }
    }
}

/// Server-side sort column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortField {
    #[default]
    Date,
    Description,
    Amount,
    Type,
}

impl SortField {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Date => "date",
            Self::Description => "description",
            Self::Amount => "amount",
            Self::Type => "type",
        }
    }
}

impl std::str::FromStr for SortField {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "date" => Ok(Self::Date),
            "description" => Ok(Self::Description),
            "amount" => Ok(Self::Amount),
            "type" => Ok(Self::Type),
            _ => Err(format!("Unknown sort field: {}", s)),
        }
    }
}

impl std::fmt::Display for SortField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

impl std::str::FromStr for SortDirection {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            _ => Err(format!("Unknown sort direction: {}", s)),
        }
    }
}

impl std::fmt::Display for SortDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Active server-side ordering (defaults to newest first)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: SortField,
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn new(field: SortField, direction: SortDirection) -> Self {
        Self { field, direction }
    }
}

impl std::fmt::Display for SortSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.field, self.direction)
    }
}

/// Statistics aggregation period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatisticsPeriod {
    #[default]
    Monthly,
    Yearly,
    AllTime,
}

impl StatisticsPeriod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
            Self::AllTime => "all_time",
        }
    }
}

impl std::str::FromStr for StatisticsPeriod {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "monthly" | "month" => Ok(Self::Monthly),
            "yearly" | "year" => Ok(Self::Yearly),
            "all_time" | "alltime" | "all" => Ok(Self::AllTime),
            _ => Err(format!("Unknown statistics period: {}", s)),
        }
    }
}

impl std::fmt::Display for StatisticsPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which category statistics snapshot to request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StatisticsQuery {
    pub period: StatisticsPeriod,
    /// Target date; `None` lets the backend pick the latest month
    pub date: Option<NaiveDate>,
}

impl StatisticsQuery {
    pub fn new(period: StatisticsPeriod, date: Option<NaiveDate>) -> Self {
        Self { period, date }
    }

    /// Whether the period is known locally (all-time, or a pinned date)
    pub fn is_pinned(&self) -> bool {
        self.period == StatisticsPeriod::AllTime || self.date.is_some()
    }

    /// Whether a transaction on `date` is counted in this snapshot
    ///
    /// Without a pinned date the period is unknown locally and every
    /// transaction is assumed to be covered.
    pub fn covers(&self, date: NaiveDate) -> bool {
        match (self.period, self.date) {
            (StatisticsPeriod::AllTime, _) | (_, None) => true,
            (StatisticsPeriod::Monthly, Some(target)) => {
                target.year() == date.year() && target.month() == date.month()
            }
            (StatisticsPeriod::Yearly, Some(target)) => target.year() == date.year(),
        }
    }
}
