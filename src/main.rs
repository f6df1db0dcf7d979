use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use sqlx::SqlitePool;

use brokerdesk_lib::{
    commission_rates::{self, DEFAULT_RATES},
    config::AppConfig,
    dashboard::{filter_referrals, finance_summary, referral_stats},
    db,
    embed::{submit_referral, ReferralSubmission},
    migrate,
    model_finance::{
        ArrangementStatus, ClientDraft, ClientStatus, CommissionDraft, CommissionStatus,
        FinanceArrangementDraft, IncentiveDraft, IncentiveStatus,
    },
    model_referral::{ReferralDraft, ReferralPatch, ReferralStatus, ReferrerType},
    notify::Severity,
    session::{Actor, AuthHandle},
    store::{sqlite, SqliteStore},
    util::dispatch_async_app_result,
    AppError, AppState,
};

#[derive(Debug, Parser)]
#[command(name = "brokerdesk", about = "Referral and commission tracking for brokers", version)]
struct Cli {
    /// Path to the SQLite database. Overrides BROKERDESK_DB.
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    /// Broker id to act as. Overrides BROKERDESK_ACTOR.
    #[arg(long, global = true)]
    actor: Option<String>,
    /// Broker email, used to match referrals addressed to them.
    #[arg(long, global = true)]
    actor_email: Option<String>,
    /// Emit JSON instead of the line view.
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Schema maintenance.
    #[command(subcommand)]
    Db(DbCommand),
    #[command(subcommand)]
    Referrals(ReferralCommand),
    #[command(subcommand)]
    Clients(ClientCommand),
    #[command(subcommand)]
    Arrangements(ArrangementCommand),
    #[command(subcommand)]
    Commissions(CommissionCommand),
    #[command(subcommand)]
    Incentives(IncentiveCommand),
    /// Settled loans, commissions and delivered incentives.
    #[command(subcommand)]
    Finance(FinanceCommand),
    /// Lender commission rates.
    #[command(subcommand)]
    Rates(RateCommand),
    /// Revoke or restore a broker's access to a table.
    #[command(subcommand)]
    Access(AccessCommand),
}

#[derive(Debug, Subcommand)]
enum DbCommand {
    /// Apply pending migrations.
    Migrate,
    /// List migrations and whether each has been applied.
    Status,
}

#[derive(Debug, Subcommand)]
enum ReferralCommand {
    List {
        /// Match against client name or source.
        #[arg(long, default_value = "")]
        search: String,
        #[arg(long)]
        status: Option<ReferralStatus>,
    },
    Add(ReferralAddArgs),
    Update(ReferralUpdateArgs),
    Delete { id: String },
    /// Submit through the public form, without signing in.
    Submit(SubmitArgs),
    /// Totals, conversion and monthly counts.
    Stats,
}

#[derive(Debug, Args)]
struct ReferralAddArgs {
    #[arg(long)]
    client_name: String,
    #[arg(long)]
    source: String,
    #[arg(long, default_value = "new")]
    status: ReferralStatus,
    #[arg(long)]
    value: Option<f64>,
    #[arg(long)]
    notes: Option<String>,
    #[arg(long)]
    referrer_type: Option<ReferrerType>,
    #[arg(long)]
    referrer_email: Option<String>,
    #[arg(long)]
    referrer_phone: Option<String>,
}

#[derive(Debug, Args)]
struct ReferralUpdateArgs {
    id: String,
    #[arg(long)]
    client_name: Option<String>,
    #[arg(long)]
    source: Option<String>,
    #[arg(long)]
    status: Option<ReferralStatus>,
    #[arg(long)]
    value: Option<f64>,
    #[arg(long)]
    notes: Option<String>,
}

#[derive(Debug, Args)]
struct SubmitArgs {
    #[arg(long)]
    client_name: String,
    #[arg(long)]
    source: String,
    #[arg(long)]
    referrer_email: String,
    #[arg(long)]
    recipient_email: String,
    #[arg(long)]
    referrer_type: Option<ReferrerType>,
    #[arg(long)]
    referrer_phone: Option<String>,
    /// Free text; only the leading whole number is kept.
    #[arg(long)]
    value: Option<String>,
    #[arg(long)]
    notes: Option<String>,
}

#[derive(Debug, Subcommand)]
enum ClientCommand {
    List,
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long, default_value = "active")]
        status: ClientStatus,
        #[arg(long)]
        loan_type: Option<String>,
        #[arg(long)]
        loan_amount: Option<f64>,
        #[arg(long)]
        notes: Option<String>,
    },
    Delete { id: String },
}

#[derive(Debug, Subcommand)]
enum ArrangementCommand {
    List,
    Add {
        #[arg(long)]
        client_id: String,
        #[arg(long)]
        referral_id: Option<String>,
        #[arg(long)]
        loan_amount: Option<f64>,
        #[arg(long)]
        loan_type: Option<String>,
        #[arg(long)]
        lender: Option<String>,
        #[arg(long, default_value = "inquiry")]
        status: ArrangementStatus,
    },
    Delete { id: String },
}

#[derive(Debug, Subcommand)]
enum CommissionCommand {
    List,
    Add {
        #[arg(long)]
        arrangement_id: String,
        #[arg(long)]
        upfront_amount: Option<f64>,
        #[arg(long)]
        trail_percentage: Option<f64>,
        #[arg(long)]
        trail_amount: Option<f64>,
        #[arg(long, default_value = "pending")]
        status: CommissionStatus,
    },
    Delete { id: String },
}

#[derive(Debug, Subcommand)]
enum IncentiveCommand {
    List,
    Add {
        #[arg(long, conflicts_with = "referral_id")]
        client_id: Option<String>,
        #[arg(long)]
        referral_id: Option<String>,
        #[arg(long = "type")]
        kind: Option<String>,
        #[arg(long)]
        amount: Option<f64>,
        #[arg(long, default_value = "planned")]
        status: IncentiveStatus,
    },
    Delete { id: String },
}

#[derive(Debug, Subcommand)]
enum FinanceCommand {
    Summary,
}

#[derive(Debug, Subcommand)]
enum RateCommand {
    List,
    /// Estimate upfront and trail commission for a loan.
    Calc {
        #[arg(long)]
        lender: String,
        #[arg(long)]
        amount: f64,
    },
}

#[derive(Debug, Subcommand)]
enum AccessCommand {
    Revoke {
        #[arg(long)]
        table: String,
        /// `read`, `write` or `all`.
        #[arg(long, default_value = "all")]
        operation: String,
    },
    Restore {
        #[arg(long)]
        table: String,
    },
}

fn main() {
    let cli = Cli::parse();
    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Error: {err:#}");
            process::exit(1);
        }
    };
    let guard = match brokerdesk_lib::init_logging(&config) {
        Ok(guard) => guard,
        Err(err) => {
            eprintln!("Error: {err:#}");
            process::exit(1);
        }
    };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(err) => {
            eprintln!("Error: failed to start runtime: {err}");
            process::exit(1);
        }
    };

    let code = match runtime.block_on(run(cli, config)) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:#}");
            1
        }
    };
    tracing::debug!(target: "brokerdesk", event = "cli_exit", code);
    drop(runtime);
    drop(guard);
    process::exit(code);
}

fn load_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = AppConfig::from_env().context("load configuration")?;
    if let Some(db) = &cli.db {
        config.db_path = db.clone();
    }
    if let Some(id) = &cli.actor {
        let email = cli
            .actor_email
            .clone()
            .or_else(|| config.actor.as_ref().and_then(|a| a.email.clone()));
        config.actor = Some(Actor::new(id.clone(), email));
    } else if let (Some(actor), Some(email)) = (config.actor.as_mut(), &cli.actor_email) {
        actor.email = Some(email.clone());
    }
    Ok(config)
}

async fn run(cli: Cli, config: AppConfig) -> Result<i32> {
    let json = cli.json;
    let command = match cli.command {
        Commands::Rates(cmd) => {
            handle_rates(cmd, json)?;
            return Ok(0);
        }
        Commands::Db(cmd) => {
            let pool = db::open_pool(&config.db_path).await?;
            let result = handle_db(&pool, cmd, json).await;
            pool.close().await;
            return result.map(|_| 0);
        }
        other => other,
    };

    let pool = db::open_pool(&config.db_path).await?;
    let store = SqliteStore::new(pool.clone());
    let state = AppState::new(Arc::new(store), AuthHandle::new(config.actor.clone()));
    let (state_ref, pool_ref, actor) = (&state, &pool, config.actor.as_ref());

    let result = dispatch_async_app_result(move || async move {
        match command {
            Commands::Referrals(cmd) => handle_referrals(state_ref, cmd, json).await,
            Commands::Clients(cmd) => handle_clients(state_ref, cmd, json).await,
            Commands::Arrangements(cmd) => handle_arrangements(state_ref, cmd, json).await,
            Commands::Commissions(cmd) => handle_commissions(state_ref, cmd, json).await,
            Commands::Incentives(cmd) => handle_incentives(state_ref, cmd, json).await,
            Commands::Finance(FinanceCommand::Summary) => {
                tokio::join!(
                    state_ref.finance_arrangements.load(),
                    state_ref.commissions.load(),
                    state_ref.incentives.load(),
                );
                let summary = finance_summary(
                    &state_ref.finance_arrangements.items(),
                    &state_ref.commissions.items(),
                    &state_ref.incentives.items(),
                );
                print_value(&summary, json)
            }
            Commands::Access(cmd) => handle_access(pool_ref, actor, cmd)
                .await
                .map_err(AppError::from),
            Commands::Db(_) | Commands::Rates(_) => Ok(()),
        }
    })
    .await;

    print_notices(&state);
    pool.close().await;
    match result {
        Ok(()) => Ok(0),
        Err(err) => {
            eprintln!("Error: {} ({})", err.message(), err.code());
            Ok(1)
        }
    }
}

async fn handle_db(pool: &SqlitePool, cmd: DbCommand, json: bool) -> Result<()> {
    match cmd {
        DbCommand::Migrate => {
            migrate::apply_migrations(pool).await?;
            println!("migrations applied");
        }
        DbCommand::Status => {
            let statuses = migrate::migration_status(pool).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&statuses)?);
            } else {
                for status in statuses {
                    let mark = if status.applied { "applied" } else { "pending" };
                    println!("{:<40} {mark}", status.version);
                }
            }
        }
    }
    Ok(())
}

async fn handle_referrals(
    state: &AppState,
    cmd: ReferralCommand,
    json: bool,
) -> Result<(), AppError> {
    let referrals = &state.referrals;
    match cmd {
        ReferralCommand::List { search, status } => {
            referrals.load().await;
            let items = referrals.items();
            let shown = filter_referrals(&items, &search, status);
            if json {
                return print_value(&shown, true);
            }
            for r in shown {
                println!(
                    "{:<24} {:<20} {:<12} {:<20} {}",
                    r.id,
                    r.client_name,
                    r.status,
                    r.date,
                    r.value.map(|v| format!("${v:.0}")).unwrap_or_default()
                );
            }
            Ok(())
        }
        ReferralCommand::Add(args) => {
            let mut draft = ReferralDraft::new(args.client_name, args.source);
            draft.status = args.status;
            draft.value = args.value;
            draft.notes = args.notes;
            draft.referrer_type = args.referrer_type;
            draft.referrer_email = args.referrer_email;
            draft.referrer_phone = args.referrer_phone;
            let created = referrals.add(draft).await?;
            print_value(&created, json)
        }
        ReferralCommand::Update(args) => {
            let patch = ReferralPatch {
                client_name: args.client_name,
                source: args.source,
                status: args.status,
                value: args.value,
                notes: args.notes,
                ..ReferralPatch::default()
            };
            referrals.update(&args.id, patch).await
        }
        ReferralCommand::Delete { id } => referrals.remove(&id).await,
        ReferralCommand::Submit(args) => {
            let submission = ReferralSubmission {
                client_name: args.client_name,
                source: args.source,
                referrer_type: args.referrer_type,
                referrer_email: args.referrer_email,
                referrer_phone: args.referrer_phone,
                recipient_email: args.recipient_email,
                value: args.value,
                notes: args.notes,
            };
            let stored =
                submit_referral(state.store.as_ref(), state.notifier.as_ref(), &submission)
                    .await?;
            print_value(&stored, json)
        }
        ReferralCommand::Stats => {
            referrals.load().await;
            let stats = referral_stats(&referrals.items());
            print_value(&stats, json)
        }
    }
}

async fn handle_clients(state: &AppState, cmd: ClientCommand, json: bool) -> Result<(), AppError> {
    let clients = &state.clients;
    match cmd {
        ClientCommand::List => {
            clients.load().await;
            let items = clients.items();
            if json {
                return print_value(&items, true);
            }
            for c in items {
                println!(
                    "{:<24} {:<20} {:<10} {}",
                    c.id,
                    c.name,
                    c.status,
                    c.last_contact.unwrap_or_default()
                );
            }
            Ok(())
        }
        ClientCommand::Add {
            name,
            email,
            phone,
            status,
            loan_type,
            loan_amount,
            notes,
        } => {
            let mut draft = ClientDraft::new(name);
            draft.email = email;
            draft.phone = phone;
            draft.status = status;
            draft.loan_type = loan_type;
            draft.loan_amount = loan_amount;
            draft.notes = notes;
            let created = clients.add(draft).await?;
            print_value(&created, json)
        }
        ClientCommand::Delete { id } => clients.remove(&id).await,
    }
}

async fn handle_arrangements(
    state: &AppState,
    cmd: ArrangementCommand,
    json: bool,
) -> Result<(), AppError> {
    let arrangements = &state.finance_arrangements;
    match cmd {
        ArrangementCommand::List => {
            arrangements.load().await;
            let items = arrangements.items();
            if json {
                return print_value(&items, true);
            }
            for a in items {
                println!(
                    "{:<24} {:<20} {:<20} {:<10} {}",
                    a.id,
                    a.client_name.unwrap_or_default(),
                    a.lender.unwrap_or_default(),
                    a.status,
                    a.loan_amount.map(|v| format!("${v:.0}")).unwrap_or_default()
                );
            }
            Ok(())
        }
        ArrangementCommand::Add {
            client_id,
            referral_id,
            loan_amount,
            loan_type,
            lender,
            status,
        } => {
            let mut draft = FinanceArrangementDraft::new(client_id);
            draft.referral_id = referral_id;
            draft.loan_amount = loan_amount;
            draft.loan_type = loan_type;
            draft.lender = lender;
            draft.status = status;
            let created = arrangements.add(draft).await?;
            print_value(&created, json)
        }
        ArrangementCommand::Delete { id } => arrangements.remove(&id).await,
    }
}

async fn handle_commissions(
    state: &AppState,
    cmd: CommissionCommand,
    json: bool,
) -> Result<(), AppError> {
    let commissions = &state.commissions;
    match cmd {
        CommissionCommand::List => {
            commissions.load().await;
            let items = commissions.items();
            if json {
                return print_value(&items, true);
            }
            for c in items {
                let total = c.upfront_amount.unwrap_or(0.0) + c.trail_amount.unwrap_or(0.0);
                let lender = c
                    .finance_arrangement
                    .and_then(|fa| fa.lender)
                    .unwrap_or_default();
                println!("{:<24} {:<20} {:<10} ${total:.0}", c.id, lender, c.status);
            }
            Ok(())
        }
        CommissionCommand::Add {
            arrangement_id,
            upfront_amount,
            trail_percentage,
            trail_amount,
            status,
        } => {
            let mut draft = CommissionDraft::new(arrangement_id);
            draft.upfront_amount = upfront_amount;
            draft.trail_percentage = trail_percentage;
            draft.trail_amount = trail_amount;
            draft.status = status;
            let created = commissions.add(draft).await?;
            print_value(&created, json)
        }
        CommissionCommand::Delete { id } => commissions.remove(&id).await,
    }
}

async fn handle_incentives(
    state: &AppState,
    cmd: IncentiveCommand,
    json: bool,
) -> Result<(), AppError> {
    let incentives = &state.incentives;
    match cmd {
        IncentiveCommand::List => {
            incentives.load().await;
            let items = incentives.items();
            if json {
                return print_value(&items, true);
            }
            for i in items {
                let recipient = i
                    .client_name
                    .or_else(|| i.referral.map(|r| r.client_name))
                    .unwrap_or_default();
                println!(
                    "{:<24} {:<20} {:<12} {:<10} {}",
                    i.id,
                    recipient,
                    i.kind.unwrap_or_default(),
                    i.status,
                    i.amount.map(|v| format!("${v:.0}")).unwrap_or_default()
                );
            }
            Ok(())
        }
        IncentiveCommand::Add {
            client_id,
            referral_id,
            kind,
            amount,
            status,
        } => {
            let draft = IncentiveDraft {
                client_id,
                referral_id,
                kind,
                amount,
                status,
                ..IncentiveDraft::default()
            };
            let created = incentives.add(draft).await?;
            print_value(&created, json)
        }
        IncentiveCommand::Delete { id } => incentives.remove(&id).await,
    }
}

fn handle_rates(cmd: RateCommand, json: bool) -> Result<()> {
    match cmd {
        RateCommand::List => {
            if json {
                println!("{}", serde_json::to_string_pretty(DEFAULT_RATES)?);
            } else {
                for rate in DEFAULT_RATES {
                    println!(
                        "{:<24} upfront {:>5.2}%  trail {:>5.2}%",
                        rate.lender_name, rate.upfront_rate, rate.trail_rate
                    );
                }
            }
        }
        RateCommand::Calc { lender, amount } => {
            let estimate = commission_rates::calculate(&lender, amount);
            if json {
                println!("{}", serde_json::to_string_pretty(&estimate)?);
            } else {
                println!("upfront ${:.2}", estimate.upfront);
                println!("trail   ${:.2}", estimate.trail);
            }
        }
    }
    Ok(())
}

async fn handle_access(pool: &SqlitePool, actor: Option<&Actor>, cmd: AccessCommand) -> Result<()> {
    let actor = actor.context("--actor is required to change access")?;
    match cmd {
        AccessCommand::Revoke { table, operation } => {
            sqlite::revoke_access(pool, &actor.id, &table, &operation).await?;
            println!("revoked {operation} on {table} for {}", actor.id);
        }
        AccessCommand::Restore { table } => {
            let removed = sqlite::restore_access(pool, &actor.id, &table).await?;
            println!("restored {table} for {} ({removed} revocations removed)", actor.id);
        }
    }
    Ok(())
}

fn print_value<T: Serialize + ?Sized>(value: &T, pretty: bool) -> Result<(), AppError> {
    let out = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{out}");
    Ok(())
}

fn print_notices(state: &AppState) {
    for notice in state.notices.drain() {
        let tag = match notice.severity {
            Severity::Info => "info",
            Severity::Success => "ok",
            Severity::Destructive => "error",
        };
        eprintln!("[{tag}] {}: {}", notice.title, notice.description);
    }
}
