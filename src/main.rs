use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use cc_optimizer::billing::{BillingEngine, HISTORY_VISIBLE_PERIODS, ReminderSummary, urgent_alert};
use cc_optimizer::catalog::ReferenceData;
use cc_optimizer::db::{self, SqliteStatusStore};
use cc_optimizer::export::{due_date_events, events_to_ics};
use cc_optimizer::models::{Category, HeldCard, Issuer};
use cc_optimizer::rewards::{RecommendationMode, RewardEngine};
use cc_optimizer::settings::Settings;
use cc_optimizer::PeriodKey;
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use rusqlite::Connection;
use rust_decimal::Decimal;
use tabled::{Table, Tabled};
use tracing_subscriber::EnvFilter;

/// Credit Card Optimizer: track statement due dates and pick the best card
/// for every purchase
#[derive(Parser)]
#[command(name = "cc-optimizer", version, about)]
struct Cli {
    /// SQLite database file
    #[arg(long, global = true, default_value = "cc_tracker.db")]
    db: String,

    /// Reference date (YYYY-MM-DD); defaults to today
    #[arg(long, global = true)]
    today: Option<NaiveDate>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Browse the card catalog
    Catalog {
        /// Only show cards from this issuer (e.g. "Chase")
        #[arg(long)]
        issuer: Option<String>,
    },

    /// List the spending categories
    Categories,

    /// Add a catalog card to your collection
    AddCard {
        /// Catalog card id (e.g. "amex-gold")
        card_id: String,
        /// Date you started tracking the card; defaults to today
        #[arg(long)]
        added: Option<NaiveDate>,
    },

    /// List the cards in your collection
    ListCards,

    /// Remove a card and its payment history
    RemoveCard { card_id: String },

    /// Switch a card between active and inactive
    ToggleCard { card_id: String },

    /// Set or clear a card's credit limit
    SetLimit {
        card_id: String,
        /// Limit in dollars; omit to clear
        limit: Option<Decimal>,
    },

    /// Find the best card for a spending category
    BestCard {
        /// Spending category (e.g. "dining")
        #[arg(long)]
        category: String,
        /// Purchase amount in dollars
        #[arg(long, default_value = "100")]
        amount: Decimal,
    },

    /// Set the monthly spend for a category (0 removes it)
    SetSpend { category: Category, amount: Decimal },

    /// Best card per category for your monthly spending
    Optimize,

    /// Show the statement needing attention for each active card
    Reminders,

    /// Show recent statements for one card or all active cards
    History {
        card_id: Option<String>,
        /// Show every period instead of the compressed view
        #[arg(long)]
        all: bool,
    },

    /// Mark a statement paid (or unpaid with --unpaid)
    MarkPaid {
        card_id: String,
        /// Statement closing date (YYYY-MM-DD)
        period: PeriodKey,
        #[arg(long)]
        unpaid: bool,
    },

    /// Mark statements that closed before the card was added as paid
    MarkPriorPaid {
        card_id: String,
        /// Only statements closing before this period are marked
        before: PeriodKey,
    },

    /// Write payment due dates to an ICS calendar file
    ExportCalendar {
        #[arg(long, default_value = "credit-card-payments.ics")]
        output: PathBuf,
        /// Months to export; defaults to the saved setting
        #[arg(long)]
        months: Option<u32>,
    },

    /// Import payment statuses from a JSON export
    ImportStatuses { file: PathBuf },

    /// Show or change settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
}

#[derive(Subcommand)]
enum SettingsAction {
    Show,
    Set {
        #[arg(long)]
        urgent_days: Option<i64>,
        #[arg(long)]
        critical_days: Option<i64>,
        #[arg(long)]
        overdue_days: Option<i64>,
        #[arg(long)]
        export_months: Option<u32>,
        #[arg(long)]
        notifications: Option<bool>,
        #[arg(long)]
        notify_days_before: Option<i64>,
    },
    Reset,
}

#[derive(Tabled)]
struct CatalogRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Card")]
    name: String,
    #[tabled(rename = "Issuer")]
    issuer: String,
    #[tabled(rename = "Annual Fee")]
    annual_fee: u32,
    #[tabled(rename = "Closes")]
    closing_day: u32,
    #[tabled(rename = "Rewards")]
    rewards: String,
}

#[derive(Tabled)]
struct HeldCardRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Card")]
    name: String,
    #[tabled(rename = "Active")]
    active: bool,
    #[tabled(rename = "Limit")]
    limit: String,
    #[tabled(rename = "Added")]
    added: NaiveDate,
}

#[derive(Tabled)]
struct ReminderRow {
    #[tabled(rename = "Card")]
    card: String,
    #[tabled(rename = "Closed")]
    closed: NaiveDate,
    #[tabled(rename = "Due")]
    due: NaiveDate,
    #[tabled(rename = "Days")]
    days: i64,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "")]
    message: String,
}

#[derive(Tabled)]
struct BreakdownRow {
    #[tabled(rename = "Category")]
    category: String,
    #[tabled(rename = "Spend")]
    spend: String,
    #[tabled(rename = "Card")]
    card: String,
    #[tabled(rename = "Points")]
    points: i64,
    #[tabled(rename = "Cash Back")]
    cashback: String,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let today = cli.today.unwrap_or_else(|| Local::now().date_naive());
    let reference = ReferenceData::builtin();
    let conn = db::init_db(&cli.db)
        .with_context(|| format!("Failed to open database '{}'", cli.db))?;

    match cli.command {
        Commands::Catalog { issuer } => {
            let cards: Vec<_> = match issuer {
                Some(name) => {
                    let issuer = Issuer::from(name);
                    reference.cards_by_issuer(&issuer)
                }
                None => reference.cards().iter().collect(),
            };
            let rows: Vec<CatalogRow> = cards
                .into_iter()
                .map(|c| CatalogRow {
                    id: c.id.clone(),
                    name: c.name.clone(),
                    issuer: c.issuer.to_string(),
                    annual_fee: c.annual_fee,
                    closing_day: c.closing_day,
                    rewards: c
                        .reward_rules
                        .iter()
                        .map(|r| format!("{} {}", r.kind.format_rate(r.multiplier), r.category))
                        .collect::<Vec<_>>()
                        .join(", "),
                })
                .collect();
            if rows.is_empty() {
                println!("No catalog cards match.");
            } else {
                println!("{}", Table::new(rows));
            }
        }

        Commands::Categories => {
            for category in Category::ALL {
                println!("{:<14} {:<22} {}", category.id(), category.name(), category.description());
            }
        }

        Commands::AddCard { card_id, added } => {
            let added = added.unwrap_or(today);
            if db::add_held_card(&conn, &reference, &card_id, added)? {
                println!("Added '{}' (tracking from {})", card_id, added);
                println!("Tip: mark older statements paid with: cc-optimizer mark-prior-paid {} <period>", card_id);
            } else {
                println!("'{}' is already in your collection", card_id);
            }
        }

        Commands::ListCards => {
            let cards = db::list_held_cards(&conn, &reference)?;
            if cards.is_empty() {
                println!("No cards found. Add one with: cc-optimizer add-card amex-gold");
            } else {
                let rows: Vec<HeldCardRow> = cards
                    .iter()
                    .map(|h| HeldCardRow {
                        id: h.card.id.clone(),
                        name: h.card.name.clone(),
                        active: h.is_active,
                        limit: h.credit_limit.map(|l| format!("${l}")).unwrap_or_default(),
                        added: h.added_date,
                    })
                    .collect();
                println!("{}", Table::new(rows));
            }
        }

        Commands::RemoveCard { card_id } => {
            if db::remove_held_card(&conn, &card_id)? {
                println!("Removed '{}'", card_id);
            } else {
                println!("No card '{}' in your collection", card_id);
            }
        }

        Commands::ToggleCard { card_id } => {
            let held = require_held(&conn, &reference, &card_id)?;
            db::set_card_active(&conn, &card_id, !held.is_active)?;
            let state = if held.is_active { "inactive" } else { "active" };
            println!("'{}' is now {}", card_id, state);
        }

        Commands::SetLimit { card_id, limit } => {
            require_held(&conn, &reference, &card_id)?;
            db::set_credit_limit(&conn, &card_id, limit)?;
            match limit {
                Some(limit) => println!("Credit limit for '{}' set to ${}", card_id, limit),
                None => println!("Credit limit for '{}' cleared", card_id),
            }
        }

        Commands::BestCard { category, amount } => {
            let cards = db::list_held_cards(&conn, &reference)?;
            let engine = RewardEngine::new(&reference);
            let recs = engine.recommend_for_category_id(&cards, &category, amount);

            if let Some(warning) = &recs.warning {
                println!("Note: {}", warning);
            }
            if recs.is_empty() {
                println!("No cards have rewards for category '{}'", category);
            } else {
                if recs.mode == RecommendationMode::GeneralFallback {
                    println!("None of your cards has a bonus for '{}'; showing general rates.", category);
                }
                println!("Best cards for ${} of '{}':", amount, category);
                println!("{}", Table::new(&recs.items));
                if let Some(best) = recs.best() {
                    println!("Use {} to earn {}", best.card_name, best.kind.format_amount(best.reward_amount));
                }
            }
            if !recs.suggestions.is_empty() {
                println!("Cards worth considering:");
                println!("{}", Table::new(&recs.suggestions));
            }
        }

        Commands::SetSpend { category, amount } => {
            if amount.is_sign_negative() {
                bail!("Spend must not be negative");
            }
            db::set_spend(&conn, category, amount)?;
            println!("Monthly {} spend set to ${}", category.name(), amount);
        }

        Commands::Optimize => {
            let cards = db::list_held_cards(&conn, &reference)?;
            let profile = db::load_spending_profile(&conn)?;
            let optimum = RewardEngine::new(&reference).compute_monthly_optimum(&cards, &profile);

            if optimum.breakdown.is_empty() {
                println!("Nothing to optimize. Set spending with: cc-optimizer set-spend dining 400");
            } else {
                let rows: Vec<BreakdownRow> = optimum
                    .breakdown
                    .iter()
                    .map(|b| BreakdownRow {
                        category: b.category.name().to_string(),
                        spend: format!("${}", b.amount),
                        card: if b.is_tied() {
                            b.tied_cards
                                .iter()
                                .map(|t| t.card_name.as_str())
                                .collect::<Vec<_>>()
                                .join(" = ")
                        } else {
                            b.card_name.clone()
                        },
                        points: b.points,
                        cashback: format!("${:.2}", b.cashback),
                    })
                    .collect();
                println!("{}", Table::new(rows));
                println!(
                    "Monthly total: {} points and ${:.2} cash back on ${} of spending",
                    optimum.total_points,
                    optimum.total_cashback,
                    profile.total()
                );
            }
        }

        Commands::Reminders => {
            let settings = db::load_settings(&conn)?;
            let cards = db::list_held_cards(&conn, &reference)?;
            let store = SqliteStatusStore::new(&conn);
            let reminders = BillingEngine::new(&reference).reminders(&cards, today, &store)?;

            if settings.notifications.enabled {
                if let Some(alert) = urgent_alert(&reminders, today, settings.notifications.days_before) {
                    println!("!! {}", alert);
                }
            }
            if reminders.is_empty() {
                println!("All caught up: no unpaid statements.");
            } else {
                let rows: Vec<ReminderRow> = reminders
                    .iter()
                    .map(|r| {
                        let urgency = r.urgency(today, &settings.urgency);
                        ReminderRow {
                            card: r.period.card_name.clone(),
                            closed: r.period.statement_end,
                            due: r.period.due_date,
                            days: r.days_until_due,
                            status: urgency.status.to_string(),
                            message: urgency.message,
                        }
                    })
                    .collect();
                println!("{}", Table::new(rows));
                let summary = ReminderSummary::from_reminders(&reminders, today, &settings.urgency);
                println!(
                    "{} overdue, {} due soon, {} paid",
                    summary.overdue, summary.due_soon, summary.paid
                );
            }
        }

        Commands::History { card_id, all } => {
            let cards: Vec<HeldCard> = match card_id {
                Some(id) => vec![require_held(&conn, &reference, &id)?],
                None => db::list_held_cards(&conn, &reference)?
                    .into_iter()
                    .filter(|c| c.is_active)
                    .collect(),
            };
            let store = SqliteStatusStore::new(&conn);
            let engine = BillingEngine::new(&reference);

            for held in &cards {
                let history = engine.history(held, today, &store)?;
                println!("{}", held.card.name);
                if history.is_empty() {
                    println!("  No statements yet.");
                    continue;
                }
                if all {
                    println!("{}", Table::new(history.periods()));
                } else {
                    let compressed = history.compressed(HISTORY_VISIBLE_PERIODS);
                    println!("{}", Table::new(compressed.visible));
                    if compressed.hidden > 0 {
                        println!("  {} older paid statements hidden (use --all)", compressed.hidden);
                    }
                }
            }
        }

        Commands::MarkPaid { card_id, period, unpaid } => {
            let held = require_held(&conn, &reference, &card_id)?;
            let mut store = SqliteStatusStore::new(&conn);
            BillingEngine::new(&reference)
                .mark_statement_paid(&held.card, &period, !unpaid, today, &mut store)?;
            let state = if unpaid { "unpaid" } else { "paid" };
            println!("Statement {} for '{}' marked {}", period, card_id, state);
        }

        Commands::MarkPriorPaid { card_id, before } => {
            let held = require_held(&conn, &reference, &card_id)?;
            let mut store = SqliteStatusStore::new(&conn);
            let marked = BillingEngine::new(&reference)
                .mark_prior_statements_paid(&held, &before, today, &mut store)?;
            if marked.is_empty() {
                println!("No statements before {} needed marking", held.added_date);
            } else {
                let keys: Vec<_> = marked.iter().map(|k| k.to_string()).collect();
                println!("Marked {} statements paid: {}", marked.len(), keys.join(", "));
            }
        }

        Commands::ExportCalendar { output, months } => {
            let settings = db::load_settings(&conn)?;
            let months = months.unwrap_or(settings.export_months);
            let candidate = Settings {
                export_months: months,
                ..settings
            };
            candidate.validate()?;

            let cards = db::list_held_cards(&conn, &reference)?;
            let events = due_date_events(&cards, today, months, &reference)?;
            fs::write(&output, events_to_ics(&events))
                .with_context(|| format!("Failed to write {}", output.display()))?;
            println!("Wrote {} due dates to {}", events.len(), output.display());
        }

        Commands::ImportStatuses { file } => {
            let json = fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let imported = db::import_statuses_json(&conn, &reference, &json)?;
            println!("Imported {} payment statuses", imported);
        }

        Commands::Settings { action } => match action {
            SettingsAction::Show => {
                let settings = db::load_settings(&conn)?;
                println!("{}", serde_json::to_string_pretty(&settings)?);
            }
            SettingsAction::Set {
                urgent_days,
                critical_days,
                overdue_days,
                export_months,
                notifications,
                notify_days_before,
            } => {
                let mut settings = db::load_settings(&conn)?;
                if let Some(days) = urgent_days {
                    settings.urgency.urgent_days = days;
                }
                if let Some(days) = critical_days {
                    settings.urgency.critical_days = days;
                }
                if let Some(days) = overdue_days {
                    settings.urgency.overdue_days = days;
                }
                if let Some(months) = export_months {
                    settings.export_months = months;
                }
                if let Some(enabled) = notifications {
                    settings.notifications.enabled = enabled;
                }
                if let Some(days) = notify_days_before {
                    settings.notifications.days_before = days;
                }
                db::save_settings(&conn, &settings)?;
                println!("Settings saved");
            }
            SettingsAction::Reset => {
                db::reset_settings(&conn)?;
                println!("Settings reset to defaults");
            }
        },
    }

    Ok(())
}

fn require_held(conn: &Connection, reference: &ReferenceData, card_id: &str) -> Result<HeldCard> {
    match db::get_held_card(conn, reference, card_id)? {
        Some(held) => Ok(held),
        None => bail!("No card '{}' in your collection", card_id),
    }
}
