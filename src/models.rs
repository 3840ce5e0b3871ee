use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tabled::Tabled;

use crate::calendar::{ClosingDay, PeriodKey};
use crate::error::TrackerError;

/// Fixed spending taxonomy. Declaration order is display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Dining,
    Groceries,
    Wholesale,
    Flights,
    Hotels,
    Transit,
    Gas,
    Online,
    Shopping,
    Streaming,
    Entertainment,
    Utilities,
    Healthcare,
    General,
}

impl Category {
    pub const ALL: [Category; 14] = [
        Category::Dining,
        Category::Groceries,
        Category::Wholesale,
        Category::Flights,
        Category::Hotels,
        Category::Transit,
        Category::Gas,
        Category::Online,
        Category::Shopping,
        Category::Streaming,
        Category::Entertainment,
        Category::Utilities,
        Category::Healthcare,
        Category::General,
    ];

    pub fn id(self) -> &'static str {
        match self {
            Category::Dining => "dining",
            Category::Groceries => "groceries",
            Category::Wholesale => "wholesale",
            Category::Flights => "flights",
            Category::Hotels => "hotels",
            Category::Transit => "transit",
            Category::Gas => "gas",
            Category::Online => "online",
            Category::Shopping => "shopping",
            Category::Streaming => "streaming",
            Category::Entertainment => "entertainment",
            Category::Utilities => "utilities",
            Category::Healthcare => "healthcare",
            Category::General => "general",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Category::Dining => "Dining",
            Category::Groceries => "Groceries",
            Category::Wholesale => "Wholesale Warehouses",
            Category::Flights => "Flights",
            Category::Hotels => "Hotels",
            Category::Transit => "Transit",
            Category::Gas => "Gas Stations",
            Category::Online => "Online Shopping",
            Category::Shopping => "Retail Shopping",
            Category::Streaming => "Streaming",
            Category::Entertainment => "Entertainment",
            Category::Utilities => "Utilities",
            Category::Healthcare => "Healthcare",
            Category::General => "General",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Category::Dining => "Restaurants, takeout, and food delivery",
            Category::Groceries => "Supermarkets and grocery stores",
            Category::Wholesale => "Costco, Sam's Club, BJ's Wholesale",
            Category::Flights => "Airline tickets and purchases",
            Category::Hotels => "Hotel stays and accommodations",
            Category::Transit => "Rideshare, parking, tolls, public transit",
            Category::Gas => "Fuel and gas station purchases",
            Category::Online => "Online retail purchases",
            Category::Shopping => "In-store retail purchases",
            Category::Streaming => "Netflix, Hulu, Disney+, etc.",
            Category::Entertainment => "Movies, events, concerts",
            Category::Utilities => "Electric, water, internet bills",
            Category::Healthcare => "Medical expenses and pharmacies",
            Category::General => "All other purchases",
        }
    }

    /// Category whose reward rate stands in when a card has no direct rule.
    ///
    /// Warehouse clubs code as groceries at most issuers.
    pub fn reward_substitute(self) -> Option<Category> {
        match self {
            Category::Wholesale => Some(Category::Groceries),
            _ => None,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Category::ALL
            .into_iter()
            .find(|c| c.id() == wanted)
            .ok_or_else(|| format!("unknown category '{s}'"))
    }
}

/// Merchants with card-acceptance restrictions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Merchant {
    Costco,
}

impl fmt::Display for Merchant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Merchant::Costco => f.write_str("Costco"),
        }
    }
}

/// Card issuer. Unknown issuers are kept by name and get the default grace period.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Issuer {
    AmericanExpress,
    Chase,
    BankOfAmerica,
    CapitalOne,
    Citi,
    Discover,
    WellsFargo,
    Other(String),
}

impl Issuer {
    pub const KNOWN: [Issuer; 7] = [
        Issuer::AmericanExpress,
        Issuer::Chase,
        Issuer::BankOfAmerica,
        Issuer::CapitalOne,
        Issuer::Citi,
        Issuer::Discover,
        Issuer::WellsFargo,
    ];

    pub fn name(&self) -> &str {
        match self {
            Issuer::AmericanExpress => "American Express",
            Issuer::Chase => "Chase",
            Issuer::BankOfAmerica => "Bank of America",
            Issuer::CapitalOne => "Capital One",
            Issuer::Citi => "Citi",
            Issuer::Discover => "Discover",
            Issuer::WellsFargo => "Wells Fargo",
            Issuer::Other(name) => name,
        }
    }
}

impl fmt::Display for Issuer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<String> for Issuer {
    fn from(name: String) -> Self {
        Issuer::KNOWN
            .into_iter()
            .find(|issuer| issuer.name().eq_ignore_ascii_case(name.trim()))
            .unwrap_or(Issuer::Other(name))
    }
}

impl From<Issuer> for String {
    fn from(issuer: Issuer) -> Self {
        issuer.name().to_string()
    }
}

/// Points and cashback are not interchangeable units.
///
/// For ranking, both are valued in cents: one point is worth one cent, and a
/// cashback reward amount (`floor(dollars * percent)`) already is cents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RewardKind {
    Points,
    Cashback,
}

impl RewardKind {
    /// Value of a reward amount in cents.
    pub fn cents_value(self, reward_amount: i64) -> i64 {
        match self {
            RewardKind::Points | RewardKind::Cashback => reward_amount,
        }
    }

    /// "300 points" or "$2.00".
    pub fn format_amount(self, reward_amount: i64) -> String {
        match self {
            RewardKind::Points => format!("{reward_amount} points"),
            RewardKind::Cashback => format!("${}", Decimal::new(reward_amount, 2)),
        }
    }

    /// "3x" or "2%".
    pub fn format_rate(self, multiplier: Decimal) -> String {
        match self {
            RewardKind::Points => format!("{}x", multiplier.normalize()),
            RewardKind::Cashback => format!("{}%", multiplier.normalize()),
        }
    }
}

impl fmt::Display for RewardKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RewardKind::Points => f.write_str("points"),
            RewardKind::Cashback => f.write_str("cashback"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardRule {
    pub category: Category,
    /// Points per dollar, or percent back for cashback rules
    pub multiplier: Decimal,
    pub kind: RewardKind,
    pub description: String,
}

impl RewardRule {
    /// `floor(amount * multiplier)`: points, or cents for cashback.
    /// Saturates at the `i64` bounds.
    pub fn reward_for(&self, amount: Decimal) -> i64 {
        let saturated = if amount.is_sign_negative() != self.multiplier.is_sign_negative() {
            i64::MIN
        } else {
            i64::MAX
        };
        amount
            .checked_mul(self.multiplier)
            .and_then(|reward| i64::try_from(reward.floor()).ok())
            .unwrap_or(saturated)
    }
}

/// Static catalog entry for a card product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardDefinition {
    pub id: String,
    pub name: String,
    pub issuer: Issuer,
    pub annual_fee: u32,
    /// Day of month the statement closes (1-31)
    pub closing_day: u32,
    pub reward_rules: Vec<RewardRule>,
    /// Days from closing to due date, overriding the issuer default
    pub grace_period_override: Option<i64>,
    pub description: Option<String>,
}

impl CardDefinition {
    pub fn closing_day(&self) -> Result<ClosingDay, TrackerError> {
        ClosingDay::new(self.closing_day)
            .ok_or_else(|| TrackerError::invalid_closing_day(&self.id, self.closing_day))
    }

    pub fn rule_for(&self, category: Category) -> Option<&RewardRule> {
        self.reward_rules.iter().find(|r| r.category == category)
    }

    pub fn general_rule(&self) -> Option<&RewardRule> {
        self.rule_for(Category::General)
    }
}

/// A card in the user's collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeldCard {
    pub card: CardDefinition,
    pub is_active: bool,
    pub credit_limit: Option<Decimal>,
    pub added_date: NaiveDate,
}

impl HeldCard {
    pub fn new(card: CardDefinition, added_date: NaiveDate) -> Self {
        Self {
            card,
            is_active: true,
            credit_limit: None,
            added_date,
        }
    }

    pub fn card_id(&self) -> &str {
        &self.card.id
    }
}

/// One billing cycle of a card. Derived on demand, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Tabled)]
pub struct StatementPeriod {
    #[tabled(rename = "Card")]
    pub card_id: String,
    #[tabled(skip)]
    pub card_name: String,
    #[tabled(rename = "Period")]
    pub period_key: PeriodKey,
    #[tabled(rename = "Start")]
    pub statement_start: NaiveDate,
    #[tabled(rename = "Closes")]
    pub statement_end: NaiveDate,
    #[tabled(rename = "Due")]
    pub due_date: NaiveDate,
    #[tabled(rename = "Paid")]
    pub is_paid: bool,
}

impl StatementPeriod {
    pub fn days_until_due(&self, today: NaiveDate) -> i64 {
        (self.due_date - today).num_days()
    }

    /// A statement can only be paid once it has closed.
    pub fn is_payable(&self, today: NaiveDate) -> bool {
        self.statement_end <= today
    }
}

/// The statement currently needing attention for a card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentReminder {
    pub period: StatementPeriod,
    pub days_until_due: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UrgencyStatus {
    Paid,
    Overdue,
    Urgent,
    DueSoon,
    Upcoming,
}

impl fmt::Display for UrgencyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            UrgencyStatus::Paid => "paid",
            UrgencyStatus::Overdue => "overdue",
            UrgencyStatus::Urgent => "urgent",
            UrgencyStatus::DueSoon => "due soon",
            UrgencyStatus::Upcoming => "upcoming",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Urgency {
    pub status: UrgencyStatus,
    pub message: String,
}

/// Used for the "best-card" query result
#[derive(Debug, Clone, PartialEq, Serialize, Tabled)]
pub struct CardRecommendation {
    #[tabled(rename = "Card")]
    pub card_name: String,
    #[tabled(skip)]
    pub card_id: String,
    #[tabled(skip)]
    pub issuer: Issuer,
    #[tabled(skip)]
    pub annual_fee: u32,
    #[tabled(display_with = "display_rate", rename = "Rate")]
    pub multiplier: Decimal,
    #[tabled(rename = "Kind")]
    pub kind: RewardKind,
    /// Points, or cents for cashback
    #[tabled(rename = "Reward")]
    pub reward_amount: i64,
    #[tabled(rename = "Why")]
    pub reason: String,
    #[tabled(rename = "Tied")]
    pub is_tied: bool,
}

impl CardRecommendation {
    pub fn cents_value(&self) -> i64 {
        self.kind.cents_value(self.reward_amount)
    }
}

fn display_rate(multiplier: &Decimal) -> String {
    multiplier.normalize().to_string()
}

/// Monthly dollars per category. Missing categories read as zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpendingProfile {
    amounts: BTreeMap<Category, Decimal>,
}

impl SpendingProfile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, category: Category) -> Decimal {
        self.amounts.get(&category).copied().unwrap_or(Decimal::ZERO)
    }

    pub fn set(&mut self, category: Category, amount: Decimal) {
        self.amounts.insert(category, amount);
    }

    pub fn with(mut self, category: Category, amount: Decimal) -> Self {
        self.set(category, amount);
        self
    }

    /// Categories with positive spend, in taxonomy order.
    pub fn positive(&self) -> impl Iterator<Item = (Category, Decimal)> + '_ {
        self.amounts
            .iter()
            .filter(|(_, amount)| **amount > Decimal::ZERO)
            .map(|(c, a)| (*c, *a))
    }

    pub fn total(&self) -> Decimal {
        self.amounts
            .values()
            .fold(Decimal::ZERO, |total, amount| total.saturating_add(*amount))
    }
}
