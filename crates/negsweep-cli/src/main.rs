//! negsweep - search term cleanup CLI
//!
//! The `negsweep` command reviews the search terms that triggered an
//! account's ads and syncs the approved exclusions into shared negative
//! keyword lists.
//!
//! ## Commands
//!
//! - `accounts`: List configured accounts and their aliases
//! - `run`: Sweep one account
//! - `batch`: Sweep several accounts (or all of them) in order

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Level};

use negsweep_ai::OpenAiClassifier;
use negsweep_core::{
    parse_selection, ApprovalPolicy, BatchReport, CategoryOutcome, DateRange, Selection,
    StdioChannel, SweepConfig, SweepPipeline,
};
use negsweep_platform::GoogleAdsClient;

/// Config file picked up from the working directory when `--config` is absent.
const DEFAULT_CONFIG_FILE: &str = "negsweep.toml";

#[derive(Parser)]
#[command(name = "negsweep")]
#[command(author = "Stevedores Org")]
#[command(version = negsweep_core::VERSION)]
#[command(about = "Review search terms and sync negative keyword lists", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Path to the TOML configuration file
    #[arg(short, long, global = true, env = "NEGSWEEP_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List configured accounts
    Accounts,

    /// Sweep a single account
    Run {
        /// Account name, alias or id
        account: String,

        #[command(flatten)]
        sweep: SweepArgs,
    },

    /// Sweep several accounts one after another
    Batch {
        /// Account names, aliases or ids
        accounts: Vec<String>,

        /// Sweep every configured account
        #[arg(long, conflicts_with = "accounts")]
        all: bool,

        #[command(flatten)]
        sweep: SweepArgs,
    },
}

#[derive(Args)]
struct SweepArgs {
    /// Lookback window in days, ending yesterday (default: from config)
    #[arg(long, conflicts_with_all = ["from", "to"])]
    days: Option<u32>,

    /// First day of the window (YYYY-MM-DD)
    #[arg(long, requires = "to")]
    from: Option<NaiveDate>,

    /// Last day of the window (YYYY-MM-DD)
    #[arg(long, requires = "from")]
    to: Option<NaiveDate>,

    /// Approval mode: interactive, all, auto, none, or a list like 1,3
    #[arg(short, long, default_value = "interactive")]
    approve: String,

    /// Report format
    #[arg(long, value_enum, default_value_t = ReportFormat::Text)]
    format: ReportFormat,
}

#[derive(Clone, Copy, ValueEnum)]
enum ReportFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    negsweep_core::telemetry::init_tracing(cli.json, level);

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Accounts => cmd_accounts(&config),
        Commands::Run { account, sweep } => cmd_sweep(config, vec![account], sweep).await,
        Commands::Batch {
            accounts,
            all,
            sweep,
        } => {
            let keys = if all {
                config
                    .directory()?
                    .accounts()
                    .into_iter()
                    .map(|a| a.account_id.to_string())
                    .collect()
            } else {
                accounts
            };
            if keys.is_empty() {
                bail!("no accounts given; pass account names or --all");
            }
            cmd_sweep(config, keys, sweep).await
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<SweepConfig> {
    match path {
        Some(path) => SweepConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
            SweepConfig::load(Path::new(DEFAULT_CONFIG_FILE))
                .context("Failed to load ./negsweep.toml")
        }
        None => Ok(SweepConfig::default()),
    }
}

fn cmd_accounts(config: &SweepConfig) -> Result<()> {
    let directory = config.directory()?;
    if directory.is_empty() {
        println!("No accounts configured. Add [[accounts]] entries to {DEFAULT_CONFIG_FILE}.");
        return Ok(());
    }
    for entry in &config.accounts {
        let aliases = if entry.aliases.is_empty() {
            String::new()
        } else {
            format!("  ({})", entry.aliases.join(", "))
        };
        println!("{:<12} {}{}", entry.id, entry.name, aliases);
    }
    Ok(())
}

async fn cmd_sweep(config: SweepConfig, keys: Vec<String>, args: SweepArgs) -> Result<()> {
    let mut policy = parse_approval(&args.approve)?;

    // Everything that can stop the run is checked before any account starts.
    let range = window(&args, config.lookback_days)?;
    let platform = GoogleAdsClient::from_env().context("Google Ads credentials are incomplete")?;
    let classifier = OpenAiClassifier::from_env().context("OpenAI credentials are incomplete")?;
    info!(model = classifier.model(), range = %range, "starting sweep");
    let pipeline = SweepPipeline::new(config, Arc::new(platform), Arc::new(classifier))?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling remaining accounts");
            on_signal.cancel();
        }
    });

    let report = pipeline
        .run_batch(&keys, &range, &mut policy, &cancel)
        .await;

    match args.format {
        ReportFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        ReportFormat::Text => print!("{}", render_text(&report)),
    }

    if !report.all_succeeded() {
        bail!(
            "{} of {} accounts failed",
            report.failed_count(),
            report.accounts.len()
        );
    }
    Ok(())
}

fn parse_approval(raw: &str) -> Result<ApprovalPolicy> {
    let policy = match raw.trim().to_lowercase().as_str() {
        "interactive" => ApprovalPolicy::interactive(StdioChannel::new()),
        "auto" => ApprovalPolicy::AutoRuleOnly,
        "none" => ApprovalPolicy::none(),
        other => match parse_selection(other) {
            Selection::All => ApprovalPolicy::All,
            Selection::Indices(indices) if !indices.is_empty() => {
                ApprovalPolicy::Automatic(indices)
            }
            Selection::Indices(_) => {
                bail!("invalid --approve value '{raw}': expected interactive, all, auto, none or 1,3")
            }
        },
    };
    Ok(policy)
}

fn window(args: &SweepArgs, lookback_days: u32) -> Result<DateRange> {
    match (args.from, args.to) {
        (Some(from), Some(to)) => Ok(DateRange::new(from, to)?),
        _ => {
            let days = args.days.unwrap_or(lookback_days);
            if days == 0 {
                bail!("--days must be at least 1");
            }
            Ok(DateRange::last_days(days, Local::now().date_naive()))
        }
    }
}

fn render_text(report: &BatchReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Run {}  window {}", report.run_id, report.date_range);

    for account in &report.accounts {
        let title = match (&account.account_name, &account.account_id) {
            (Some(name), Some(id)) => format!("{name} ({id})"),
            _ => account.account.clone(),
        };
        let _ = writeln!(out, "\n== {title} ==");
        let _ = writeln!(
            out,
            "  reviewed {} terms, flagged {}, approved {}, applied {}",
            account.terms_reviewed,
            account.flagged.len(),
            account.approved.len(),
            account.applied.len()
        );
        for (category, outcome) in &account.reconciliation.outcomes {
            let line = match outcome {
                CategoryOutcome::Synced {
                    list_id,
                    applied_count,
                    skipped_existing_count,
                    created_list,
                    ..
                } => format!(
                    "list {list_id}{}: {applied_count} added, {skipped_existing_count} already present",
                    if *created_list { " (created)" } else { "" }
                ),
                CategoryOutcome::MissingDestination { list_name } => {
                    format!("no list named '{list_name}', nothing applied")
                }
                CategoryOutcome::Failed { stage, error } => {
                    format!("failed at {}: {error}", stage.as_str())
                }
            };
            let _ = writeln!(out, "  {category}: {line}");
        }
        for warning in &account.warnings {
            let _ = writeln!(out, "  warning: {warning}");
        }
        if let Some(error) = &account.error {
            let _ = writeln!(out, "  error: {error}");
        }
    }

    let _ = writeln!(
        out,
        "\n{} accounts, {} failed, {} terms applied",
        report.accounts.len(),
        report.failed_count(),
        report.applied_count()
    );
    out
}
