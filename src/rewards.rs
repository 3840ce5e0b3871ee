//! Reward optimization engine
//!
//! Ranks held cards for a single purchase category and builds the optimal
//! card-per-category plan for a monthly spending profile.
//!
//! Points and cashback are compared in cents: one point counts as one cent,
//! and a cashback reward amount is already in cents. Amounts are reported in
//! each card's own unit and never summed across kinds.

use std::cmp::Ordering;
use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::Serialize;
use tabled::Tabled;
use tracing::debug;

use crate::catalog::ReferenceData;
use crate::models::{
    CardDefinition, CardRecommendation, Category, HeldCard, Issuer, RewardKind, RewardRule,
    SpendingProfile,
};

/// Suggestions from the preferred issuer, before one from any other issuer.
const PREFERRED_ISSUER_SUGGESTIONS: usize = 2;
const OTHER_ISSUER_SUGGESTIONS: usize = 1;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationMode {
    /// At least one card rewards the category itself
    #[default]
    CategorySpecific,
    /// No card rewards the category; general rates are shown instead
    GeneralFallback,
}

/// A catalog card the user does not hold that rewards the category.
#[derive(Debug, Clone, PartialEq, Serialize, Tabled)]
pub struct CardSuggestion {
    #[tabled(rename = "Card")]
    pub card_name: String,
    #[tabled(skip)]
    pub card_id: String,
    #[tabled(rename = "Issuer")]
    pub issuer: Issuer,
    #[tabled(rename = "Rate")]
    pub rate: String,
    #[tabled(rename = "Annual Fee")]
    pub annual_fee: u32,
    #[tabled(skip)]
    pub multiplier: Decimal,
    #[tabled(skip)]
    pub kind: RewardKind,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Recommendations {
    pub mode: RecommendationMode,
    pub items: Vec<CardRecommendation>,
    /// Merchant acceptance notice for held cards, when one applies
    pub warning: Option<String>,
    pub suggestions: Vec<CardSuggestion>,
}

impl Recommendations {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn best(&self) -> Option<&CardRecommendation> {
        self.items.first()
    }
}

/// A card sharing the best reward for a category.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TiedCard {
    pub card_id: String,
    pub card_name: String,
    pub kind: RewardKind,
    pub multiplier: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryBreakdown {
    pub category: Category,
    pub amount: Decimal,
    pub card_id: String,
    pub card_name: String,
    /// Points earned when a points card is among the best
    pub points: i64,
    /// Dollars back when a cashback card is among the best
    pub cashback: Decimal,
    /// Every card matching the best reward, highest annual fee first.
    /// Holds a single entry when there is no tie.
    pub tied_cards: Vec<TiedCard>,
}

impl CategoryBreakdown {
    pub fn is_tied(&self) -> bool {
        self.tied_cards.len() > 1
    }

    fn magnitude(&self) -> Decimal {
        Decimal::from(self.points) + self.cashback * Decimal::ONE_HUNDRED
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MonthlyOptimum {
    pub total_points: i64,
    /// Dollars
    pub total_cashback: Decimal,
    pub breakdown: Vec<CategoryBreakdown>,
}

/// The rule a card earns on `category`, either its own rule or the
/// category's substitute (wholesale earns the groceries rate). The higher
/// multiplier wins when a card has both.
pub fn matching_rule(card: &CardDefinition, category: Category) -> Option<&RewardRule> {
    let direct = card.rule_for(category);
    let substitute = category.reward_substitute().and_then(|s| card.rule_for(s));
    match (direct, substitute) {
        (Some(d), Some(s)) if s.multiplier > d.multiplier => Some(s),
        (Some(d), _) => Some(d),
        (None, s) => s,
    }
}

/// Category rule if there is one, otherwise the card's general rule.
fn resolved_rule(card: &CardDefinition, category: Category) -> Option<&RewardRule> {
    matching_rule(card, category).or_else(|| card.general_rule())
}

fn reward_phrase(rule: &RewardRule) -> String {
    let noun = match rule.kind {
        RewardKind::Points => "points",
        RewardKind::Cashback => "cash back",
    };
    format!("{} {}", rule.kind.format_rate(rule.multiplier), noun)
}

pub struct RewardEngine<'a> {
    reference: &'a ReferenceData,
}

impl<'a> RewardEngine<'a> {
    pub fn new(reference: &'a ReferenceData) -> Self {
        Self { reference }
    }

    /// Whether a card may be ranked for a category.
    ///
    /// Cards whose issuer is refused by one of the category's merchants are
    /// ineligible, except for categories earning a substitute rate: those
    /// shop at several merchants, so the card stays and a warning is shown.
    pub fn is_card_eligible(&self, card: &CardDefinition, category: Category) -> bool {
        if category.reward_substitute().is_some() {
            return true;
        }
        self.reference
            .exclusions_for(category, &card.issuer)
            .next()
            .is_none()
    }

    /// Acceptance notice for held cards refused by one of the category's merchants.
    pub fn compatibility_warning(&self, cards: &[HeldCard], category: Category) -> Option<String> {
        let mut notices: Vec<String> = Vec::new();
        for held in cards.iter().filter(|c| c.is_active) {
            for exception in self.reference.exclusions_for(category, &held.card.issuer) {
                let notice = format!(
                    "{} cards are not accepted at {} ({})",
                    held.card.issuer, exception.merchant, exception.notes
                );
                if !notices.contains(&notice) {
                    notices.push(notice);
                }
            }
        }
        if notices.is_empty() {
            None
        } else {
            Some(notices.join("; "))
        }
    }

    /// Ranked recommendations for spending `amount` dollars in `category`.
    ///
    /// Cards with a rule for the category shut out cards that only have a
    /// general rate. If no card has one, every general rate is ranked and
    /// catalog suggestions are added.
    pub fn recommend_for_category(
        &self,
        cards: &[HeldCard],
        category: Category,
        amount: Decimal,
    ) -> Recommendations {
        let mut specific = Vec::new();
        let mut fallback = Vec::new();

        for held in cards.iter().filter(|c| c.is_active) {
            let card = &held.card;
            if !self.is_card_eligible(card, category) {
                debug!(card = %card.id, %category, "Card not accepted for category");
                continue;
            }
            if let Some(rule) = matching_rule(card, category) {
                let mut reason = format!("{} on {}", reward_phrase(rule), rule.category.name());
                if rule.category != category {
                    reason.push_str(&format!(" ({})", category.name()));
                }
                specific.push(recommendation(card, rule, amount, reason));
            } else if let Some(rule) = card.general_rule() {
                let reason = format!("{} on all purchases", reward_phrase(rule));
                fallback.push(recommendation(card, rule, amount, reason));
            }
        }

        let warning = self.compatibility_warning(cards, category);

        let (mode, mut items) = if specific.is_empty() {
            (RecommendationMode::GeneralFallback, fallback)
        } else {
            (RecommendationMode::CategorySpecific, specific)
        };

        match mode {
            RecommendationMode::CategorySpecific => {
                items.sort_by(|a, b| b.cents_value().cmp(&a.cents_value()));
            }
            RecommendationMode::GeneralFallback => items.sort_by(fallback_order),
        }
        mark_ties(&mut items);

        let suggestions = if mode == RecommendationMode::GeneralFallback {
            self.suggest_cards(cards, category)
        } else {
            Vec::new()
        };

        debug!(
            %category,
            ?mode,
            recommendations = items.len(),
            suggestions = suggestions.len(),
            "Ranked cards"
        );

        Recommendations {
            mode,
            items,
            warning,
            suggestions,
        }
    }

    /// String-id entry point. An id outside the taxonomy gives an empty result.
    pub fn recommend_for_category_id(
        &self,
        cards: &[HeldCard],
        category_id: &str,
        amount: Decimal,
    ) -> Recommendations {
        match category_id.parse::<Category>() {
            Ok(category) => self.recommend_for_category(cards, category, amount),
            Err(_) => {
                debug!(category_id, "Unknown category");
                Recommendations::default()
            }
        }
    }

    /// Up to three catalog cards, not already held, that reward the category.
    ///
    /// Ranked by multiplier. Two come from the issuer the user holds most
    /// cards from (the first such issuer in catalog order on a tie), one from
    /// any other issuer. With no active cards there is no preferred issuer
    /// and the top three are returned.
    pub fn suggest_cards(&self, cards: &[HeldCard], category: Category) -> Vec<CardSuggestion> {
        let mut candidates: Vec<(&CardDefinition, &RewardRule)> = self
            .reference
            .cards()
            .iter()
            .filter(|card| !cards.iter().any(|held| held.card_id() == card.id))
            .filter_map(|card| matching_rule(card, category).map(|rule| (card, rule)))
            .collect();
        candidates.sort_by(|a, b| b.1.multiplier.cmp(&a.1.multiplier));

        let picked: Vec<_> = match self.preferred_issuer(cards) {
            Some(preferred) => {
                let (ours, others): (Vec<_>, Vec<_>) = candidates
                    .into_iter()
                    .partition(|(card, _)| card.issuer == preferred);
                ours.into_iter()
                    .take(PREFERRED_ISSUER_SUGGESTIONS)
                    .chain(others.into_iter().take(OTHER_ISSUER_SUGGESTIONS))
                    .collect()
            }
            None => candidates
                .into_iter()
                .take(PREFERRED_ISSUER_SUGGESTIONS + OTHER_ISSUER_SUGGESTIONS)
                .collect(),
        };

        picked
            .into_iter()
            .map(|(card, rule)| CardSuggestion {
                card_name: card.name.clone(),
                card_id: card.id.clone(),
                issuer: card.issuer.clone(),
                rate: reward_phrase(rule),
                annual_fee: card.annual_fee,
                multiplier: rule.multiplier,
                kind: rule.kind,
            })
            .collect()
    }

    fn preferred_issuer(&self, cards: &[HeldCard]) -> Option<Issuer> {
        let mut counts: HashMap<&Issuer, usize> = HashMap::new();
        for held in cards.iter().filter(|c| c.is_active) {
            *counts.entry(&held.card.issuer).or_default() += 1;
        }
        let most = counts.values().copied().max()?;

        let catalog_order = self.reference.cards().iter().map(|c| &c.issuer);
        let held_order = cards.iter().map(|c| &c.card.issuer);
        catalog_order
            .chain(held_order)
            .find(|issuer| counts.get(issuer) == Some(&most))
            .cloned()
    }

    /// Best card per category of the profile, with totals by reward kind.
    pub fn compute_monthly_optimum(
        &self,
        cards: &[HeldCard],
        profile: &SpendingProfile,
    ) -> MonthlyOptimum {
        let mut optimum = MonthlyOptimum::default();
        let mut usage: HashMap<String, usize> = HashMap::new();

        for (category, amount) in profile.positive() {
            let candidates: Vec<(&CardDefinition, &RewardRule)> = cards
                .iter()
                .filter(|c| c.is_active && self.is_card_eligible(&c.card, category))
                .filter_map(|c| resolved_rule(&c.card, category).map(|rule| (&c.card, rule)))
                .collect();

            let mut best: Option<(&CardDefinition, &RewardRule)> = None;
            for (card, rule) in &candidates {
                if best.is_none_or(|(_, b)| rule.multiplier > b.multiplier) {
                    best = Some((*card, *rule));
                }
            }
            let Some((best_card, best_rule)) = best else {
                continue;
            };
            if best_rule.multiplier <= Decimal::ZERO {
                continue;
            }

            let reward = best_rule.reward_for(amount);
            let mut tied: Vec<_> = candidates
                .iter()
                .filter(|(_, rule)| rule.reward_for(amount) == reward)
                .collect();
            tied.sort_by(|a, b| b.0.annual_fee.cmp(&a.0.annual_fee));

            for (card, _) in &tied {
                *usage.entry(card.id.clone()).or_default() += 1;
            }

            let has_points = tied.iter().any(|(_, r)| r.kind == RewardKind::Points);
            let has_cashback = tied.iter().any(|(_, r)| r.kind == RewardKind::Cashback);
            let points = if has_points { reward } else { 0 };
            let cashback = if has_cashback {
                Decimal::new(reward, 2)
            } else {
                Decimal::ZERO
            };
            optimum.total_points = optimum.total_points.saturating_add(points);
            optimum.total_cashback = optimum.total_cashback.saturating_add(cashback);

            optimum.breakdown.push(CategoryBreakdown {
                category,
                amount,
                card_id: best_card.id.clone(),
                card_name: best_card.name.clone(),
                points,
                cashback,
                tied_cards: tied
                    .iter()
                    .map(|(card, rule)| TiedCard {
                        card_id: card.id.clone(),
                        card_name: card.name.clone(),
                        kind: rule.kind,
                        multiplier: rule.multiplier,
                    })
                    .collect(),
            });
        }

        let mut spend_per_card: HashMap<String, Decimal> = HashMap::new();
        for entry in &optimum.breakdown {
            let spend = spend_per_card.entry(entry.card_id.clone()).or_default();
            *spend = spend.saturating_add(entry.amount);
        }
        optimum.breakdown.sort_by(|a, b| {
            let uses = |e: &CategoryBreakdown| usage.get(&e.card_id).copied().unwrap_or(0);
            let spend = |e: &CategoryBreakdown| {
                spend_per_card
                    .get(&e.card_id)
                    .copied()
                    .unwrap_or(Decimal::ZERO)
            };
            uses(b)
                .cmp(&uses(a))
                .then_with(|| spend(b).cmp(&spend(a)))
                .then_with(|| {
                    if a.card_id == b.card_id {
                        Ordering::Equal
                    } else {
                        a.card_name.cmp(&b.card_name)
                    }
                })
                .then_with(|| b.magnitude().cmp(&a.magnitude()))
        });

        debug!(
            categories = optimum.breakdown.len(),
            total_points = optimum.total_points,
            total_cashback = %optimum.total_cashback,
            "Computed monthly optimum"
        );
        optimum
    }
}

fn recommendation(
    card: &CardDefinition,
    rule: &RewardRule,
    amount: Decimal,
    reason: String,
) -> CardRecommendation {
    CardRecommendation {
        card_name: card.name.clone(),
        card_id: card.id.clone(),
        issuer: card.issuer.clone(),
        annual_fee: card.annual_fee,
        multiplier: rule.multiplier,
        kind: rule.kind,
        reward_amount: rule.reward_for(amount),
        reason,
        is_tied: false,
    }
}

/// Value descending; on equal value points before cashback, then the higher
/// annual fee.
fn fallback_order(a: &CardRecommendation, b: &CardRecommendation) -> Ordering {
    let kind_rank = |r: &CardRecommendation| match r.kind {
        RewardKind::Points => 0,
        RewardKind::Cashback => 1,
    };
    b.cents_value()
        .cmp(&a.cents_value())
        .then_with(|| kind_rank(a).cmp(&kind_rank(b)))
        .then_with(|| b.annual_fee.cmp(&a.annual_fee))
}

/// Flags every recommendation whose value is shared with another one.
/// Expects `items` sorted by value.
fn mark_ties(items: &mut [CardRecommendation]) {
    let mut start = 0;
    while start < items.len() {
        let value = items[start].cents_value();
        let end = items[start..]
            .iter()
            .position(|r| r.cents_value() != value)
            .map_or(items.len(), |n| start + n);
        if end - start > 1 {
            for item in &mut items[start..end] {
                item.is_tied = true;
            }
        }
        start = end;
    }
}
