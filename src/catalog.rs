//! Reference data: the card catalog, issuer grace periods, merchant
//! acceptance exceptions and the merchants behind each category. Read-only
//! to both engines.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::TrackerError;
use crate::models::{CardDefinition, Category, Issuer, Merchant, RewardKind, RewardRule};

/// Used when neither the card nor its issuer defines a grace period.
pub const DEFAULT_GRACE_PERIOD_DAYS: i64 = 25;

/// A merchant that refuses cards from some issuers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MerchantException {
    pub merchant: Merchant,
    pub excluded_issuers: Vec<Issuer>,
    pub notes: String,
}

impl MerchantException {
    pub fn excludes(&self, issuer: &Issuer) -> bool {
        self.excluded_issuers.contains(issuer)
    }
}

#[derive(Debug, Clone)]
pub struct ReferenceData {
    cards: Vec<CardDefinition>,
    grace_periods: HashMap<Issuer, i64>,
    merchant_exceptions: Vec<MerchantException>,
    category_merchants: HashMap<Category, Vec<Merchant>>,
}

impl ReferenceData {
    /// Uses the built-in category to merchant mapping; see
    /// [`ReferenceData::with_category_merchants`] to replace it.
    pub fn new(
        cards: Vec<CardDefinition>,
        grace_periods: HashMap<Issuer, i64>,
        merchant_exceptions: Vec<MerchantException>,
    ) -> Self {
        Self {
            cards,
            grace_periods,
            merchant_exceptions,
            category_merchants: builtin_category_merchants(),
        }
    }

    pub fn with_category_merchants(mut self, mapping: HashMap<Category, Vec<Merchant>>) -> Self {
        self.category_merchants = mapping;
        self
    }

    /// Built-in catalog with the standard grace periods and exceptions.
    pub fn builtin() -> Self {
        Self::new(builtin_cards(), builtin_grace_periods(), builtin_exceptions())
    }

    /// Standard grace periods and exceptions over a custom card list.
    pub fn with_cards(cards: Vec<CardDefinition>) -> Self {
        Self::new(cards, builtin_grace_periods(), builtin_exceptions())
    }

    pub fn cards(&self) -> &[CardDefinition] {
        &self.cards
    }

    pub fn card(&self, id: &str) -> Option<&CardDefinition> {
        self.cards.iter().find(|c| c.id == id)
    }

    pub fn cards_by_issuer(&self, issuer: &Issuer) -> Vec<&CardDefinition> {
        self.cards.iter().filter(|c| &c.issuer == issuer).collect()
    }

    /// Days between a statement's closing and its due date.
    ///
    /// Card override first, then the issuer table, then the default of 25.
    /// Zero or negative configured values are rejected.
    pub fn grace_period_days(&self, card: &CardDefinition) -> Result<i64, TrackerError> {
        let (days, source) = match card.grace_period_override {
            Some(days) => (days, card.id.as_str()),
            None => match self.grace_periods.get(&card.issuer) {
                Some(days) => (*days, card.issuer.name()),
                None => return Ok(DEFAULT_GRACE_PERIOD_DAYS),
            },
        };
        if days <= 0 {
            return Err(TrackerError::InvalidGracePeriod {
                issuer: source.to_string(),
                days,
            });
        }
        Ok(days)
    }

    pub fn merchant_exception(&self, merchant: Merchant) -> Option<&MerchantException> {
        self.merchant_exceptions
            .iter()
            .find(|e| e.merchant == merchant)
    }

    /// Merchants whose acceptance rules apply to purchases in `category`.
    pub fn merchants_for(&self, category: Category) -> &[Merchant] {
        self.category_merchants
            .get(&category)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Exceptions at this category's merchants that refuse `issuer`.
    pub fn exclusions_for<'a>(
        &'a self,
        category: Category,
        issuer: &'a Issuer,
    ) -> impl Iterator<Item = &'a MerchantException> + 'a {
        self.merchants_for(category)
            .iter()
            .filter_map(|m| self.merchant_exception(*m))
            .filter(move |e| e.excludes(issuer))
    }
}

fn builtin_grace_periods() -> HashMap<Issuer, i64> {
    HashMap::from([
        (Issuer::Chase, 23),
        (Issuer::AmericanExpress, 25),
        (Issuer::BankOfAmerica, 25),
        (Issuer::CapitalOne, 25),
        (Issuer::Citi, 25),
        (Issuer::Discover, 25),
        (Issuer::WellsFargo, 24),
    ])
}

fn builtin_exceptions() -> Vec<MerchantException> {
    vec![MerchantException {
        merchant: Merchant::Costco,
        excluded_issuers: vec![Issuer::AmericanExpress],
        notes: "Costco only accepts Visa cards".to_string(),
    }]
}

fn builtin_category_merchants() -> HashMap<Category, Vec<Merchant>> {
    HashMap::from([(Category::Wholesale, vec![Merchant::Costco])])
}

fn points(category: Category, multiplier: Decimal, description: &str) -> RewardRule {
    RewardRule {
        category,
        multiplier,
        kind: RewardKind::Points,
        description: description.to_string(),
    }
}

fn cash(category: Category, multiplier: Decimal, description: &str) -> RewardRule {
    RewardRule {
        category,
        multiplier,
        kind: RewardKind::Cashback,
        description: description.to_string(),
    }
}

fn card(
    id: &str,
    name: &str,
    issuer: Issuer,
    annual_fee: u32,
    closing_day: u32,
    reward_rules: Vec<RewardRule>,
    description: &str,
) -> CardDefinition {
    CardDefinition {
        id: id.to_string(),
        name: name.to_string(),
        issuer,
        annual_fee,
        closing_day,
        reward_rules,
        grace_period_override: None,
        description: Some(description.to_string()),
    }
}

fn builtin_cards() -> Vec<CardDefinition> {
    use Category::*;

    let x = |n: i64| Decimal::from(n);
    let one_and_half = Decimal::new(15, 1);

    vec![
        card(
            "chase-sapphire-preferred",
            "Chase Sapphire Preferred",
            Issuer::Chase,
            95,
            15,
            vec![
                points(Dining, x(3), "3x points on dining worldwide"),
                points(Online, x(3), "3x points on online grocery purchases"),
                points(Streaming, x(3), "3x points on select streaming services"),
                points(General, x(1), "1x points on all other purchases"),
            ],
            "Popular travel rewards card with flexible point redemption",
        ),
        card(
            "chase-sapphire-reserve",
            "Chase Sapphire Reserve",
            Issuer::Chase,
            550,
            15,
            vec![
                points(Flights, x(4), "4x points on flights booked directly with airlines"),
                points(Hotels, x(4), "4x points on hotels booked directly"),
                points(Dining, x(3), "3x points on dining worldwide"),
                points(General, x(1), "1x points on all other purchases"),
            ],
            "Premium travel card with lounge access",
        ),
        card(
            "chase-freedom-unlimited",
            "Chase Freedom Unlimited",
            Issuer::Chase,
            0,
            15,
            vec![
                cash(Dining, x(3), "3% cash back on dining"),
                cash(General, one_and_half, "1.5% cash back on all other purchases"),
            ],
            "No annual fee cash back card",
        ),
        card(
            "chase-freedom-flex",
            "Chase Freedom Flex",
            Issuer::Chase,
            0,
            12,
            vec![
                cash(Dining, x(3), "3% cash back on dining at restaurants"),
                cash(General, x(1), "1% cash back on all other purchases"),
            ],
            "Rotating 5% categories with no annual fee",
        ),
        card(
            "amex-gold",
            "American Express Gold Card",
            Issuer::AmericanExpress,
            325,
            15,
            vec![
                points(Dining, x(4), "4x points on dining worldwide"),
                points(Groceries, x(4), "4x points at U.S. supermarkets (up to $25,000/year)"),
                points(Flights, x(3), "3x points on flights booked directly with airlines"),
                points(Hotels, x(2), "2x points on prepaid hotels booked through Amex Travel"),
                points(General, x(1), "1x points on all other purchases"),
            ],
            "Dining and grocery rewards powerhouse",
        ),
        card(
            "amex-platinum",
            "American Express Platinum Card",
            Issuer::AmericanExpress,
            895,
            20,
            vec![
                points(Flights, x(5), "5x points on flights booked directly with airlines"),
                points(Hotels, x(5), "5x points on prepaid hotels booked through Amex Travel"),
                points(General, x(1), "1x points on all other purchases"),
            ],
            "Premium travel card with extensive benefits",
        ),
        card(
            "amex-blue-cash-preferred",
            "Blue Cash Preferred",
            Issuer::AmericanExpress,
            95,
            10,
            vec![
                cash(Groceries, x(6), "6% cash back at U.S. supermarkets (up to $6,000/year)"),
                cash(Streaming, x(6), "6% cash back on select U.S. streaming subscriptions"),
                cash(Transit, x(3), "3% cash back on transit including rideshare, parking, tolls"),
                cash(Gas, x(3), "3% cash back at U.S. gas stations"),
                cash(General, x(1), "1% cash back on all other purchases"),
            ],
            "Top grocery and streaming cash back",
        ),
        card(
            "amex-blue-cash-everyday",
            "Blue Cash Everyday",
            Issuer::AmericanExpress,
            0,
            5,
            vec![
                cash(Groceries, x(3), "3% cash back at U.S. supermarkets (up to $6,000/year)"),
                cash(Gas, x(3), "3% cash back at U.S. gas stations"),
                cash(Online, x(3), "3% cash back on online retail purchases (up to $6,000/year)"),
                cash(General, x(1), "1% cash back on all other purchases"),
            ],
            "No annual fee everyday cash back",
        ),
        card(
            "citi-double-cash",
            "Citi Double Cash",
            Issuer::Citi,
            0,
            20,
            vec![cash(
                General,
                x(2),
                "2% cash back on all purchases (1% when you buy, 1% when you pay)",
            )],
            "Simple 2% cash back on everything with no annual fee",
        ),
        card(
            "costco-visa",
            "Costco Anywhere Visa",
            Issuer::Citi,
            0,
            20,
            vec![
                cash(Gas, x(4), "4% cash back on gas (up to $7,000/year)"),
                cash(Wholesale, x(2), "2% cash back at Costco and Costco.com"),
                cash(Dining, x(3), "3% cash back on dining"),
                cash(General, x(1), "1% cash back on all other purchases"),
            ],
            "Costco membership required. Great for Costco and gas purchases",
        ),
        card(
            "capital-one-venture-x",
            "Capital One Venture X",
            Issuer::CapitalOne,
            395,
            16,
            vec![points(General, x(2), "2x miles on all purchases")],
            "Premium travel card with flat 2x miles",
        ),
        card(
            "capital-one-savor-rewards",
            "Capital One Savor Cash Rewards",
            Issuer::CapitalOne,
            0,
            20,
            vec![
                cash(Groceries, x(3), "3% cash back at grocery stores"),
                cash(Dining, x(3), "3% cash back on dining"),
                cash(Entertainment, x(3), "3% cash back on entertainment"),
                cash(Streaming, x(3), "3% cash back on popular streaming services"),
                cash(General, x(1), "1% cash back on all other purchases"),
            ],
            "Dining and entertainment cash back",
        ),
        card(
            "capital-one-quicksilver",
            "Capital One Quicksilver Cash Rewards",
            Issuer::CapitalOne,
            0,
            7,
            vec![cash(General, one_and_half, "1.5% cash back on all purchases")],
            "Flat-rate cash back with no annual fee",
        ),
        card(
            "boa-customized-cash",
            "Bank of America Customized Cash Rewards",
            Issuer::BankOfAmerica,
            0,
            25,
            vec![
                cash(Groceries, x(2), "2% cash back at grocery stores and wholesale clubs"),
                cash(General, x(1), "1% cash back on all other purchases"),
            ],
            "Choose your 3% category",
        ),
        card(
            "boa-travel-rewards",
            "Bank of America Travel Rewards",
            Issuer::BankOfAmerica,
            0,
            18,
            vec![points(General, one_and_half, "1.5x points per $1 spent on all purchases")],
            "Flat-rate travel points with no annual fee",
        ),
        card(
            "discover-it-cash-back",
            "Discover it Cash Back",
            Issuer::Discover,
            0,
            15,
            vec![cash(General, x(1), "1% cash back on all other purchases")],
            "Rotating 5% quarterly categories",
        ),
        card(
            "wells-fargo-active-cash",
            "Wells Fargo Active Cash",
            Issuer::WellsFargo,
            0,
            5,
            vec![cash(General, x(2), "Unlimited 2% cash rewards on purchases")],
            "Flat 2% cash rewards",
        ),
    ]
}
