//! CLI command definitions, routing, and tracing setup.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use lookout_core::{DeliveryOutcome, OpenAiClient, Pipeline, ReportOutcome, start_scheduler};
use lookout_shared::{
    CONFIG_FILE_NAME, ChannelKind, Credentials, Frequency, MonitorConfig, TARGETS_FILE_NAME,
    Target, init_config, load_config, load_targets, load_targets_strict, save_targets,
    validate_api_key,
};
use lookout_storage::Storage;
use tracing::info;

use crate::progress::CliProgress;
use crate::prompts;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Lookout: watch competitors and summarize what changed.
#[derive(Parser)]
#[command(
    name = "lookout",
    version,
    about = "Monitor competitor websites, changelogs and feeds with AI summaries.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Path to the system config file.
    #[arg(long, env = "LOOKOUT_CONFIG", default_value = CONFIG_FILE_NAME, global = true)]
    pub config: PathBuf,

    /// Path to the competitor targets file.
    #[arg(long, env = "LOOKOUT_TARGETS", default_value = TARGETS_FILE_NAME, global = true)]
    pub targets: PathBuf,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Also write logs (without colors) to this file.
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Report frequency override for `schedule`.
#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub(crate) enum FrequencyArg {
    Daily,
    Weekly,
    Monthly,
}

impl From<FrequencyArg> for Frequency {
    fn from(value: FrequencyArg) -> Self {
        match value {
            FrequencyArg::Daily => Frequency::Daily,
            FrequencyArg::Weekly => Frequency::Weekly,
            FrequencyArg::Monthly => Frequency::Monthly,
        }
    }
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Add a competitor target. Prompts interactively when --name and --website are omitted.
    AddTarget {
        /// Company name.
        #[arg(long)]
        name: Option<String>,

        /// Main website URL.
        #[arg(long)]
        website: Option<String>,

        /// Changelog or release-notes URL.
        #[arg(long)]
        changelog: Option<String>,

        /// Pricing page URL.
        #[arg(long)]
        pricing: Option<String>,

        /// Blog URL.
        #[arg(long)]
        blog: Option<String>,

        /// Social profile URL (repeatable).
        #[arg(long)]
        social: Vec<String>,

        /// App store listing as PLATFORM=URL (repeatable).
        #[arg(long, value_name = "PLATFORM=URL")]
        app_store: Vec<String>,

        /// RSS or Atom feed URL (repeatable).
        #[arg(long)]
        rss: Vec<String>,
    },

    /// List configured competitor targets.
    ListTargets,

    /// Remove a competitor target by name, or pick one interactively.
    RemoveTarget {
        /// Target name (case-insensitive).
        name: Option<String>,
    },

    /// Run one monitoring cycle and write a summary file.
    Run,

    /// Run a full report: monitor, summarize, notify, write a detailed report.
    Report,

    /// Run an initial report, then keep reporting on a schedule.
    Schedule {
        /// Override `monitoring_frequency` from the config.
        #[arg(long)]
        frequency: Option<FrequencyArg>,

        /// Skip the initial report run.
        #[arg(long)]
        no_initial: bool,
    },

    /// Check config files, credentials and targets.
    TestConfig,

    /// Show the latest run, history size and reports.
    Status,

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) -> Result<()> {
    use tracing_subscriber::{EnvFilter, Layer, fmt, prelude::*};

    let filter = match cli.verbose {
        0 => "lookout=info",
        1 => "lookout=debug",
        _ => "lookout=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    let console = match cli.log_format {
        LogFormat::Text => fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .boxed(),
        LogFormat::Json => fmt::layer().json().with_writer(std::io::stderr).boxed(),
    };

    let file = match &cli.log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| eyre!("cannot open log file {}: {e}", path.display()))?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_writer(std::sync::Mutex::new(file))
                    .boxed(),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console)
        .with(file)
        .init();
    Ok(())
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match &cli.command {
        Command::AddTarget {
            name,
            website,
            changelog,
            pricing,
            blog,
            social,
            app_store,
            rss,
        } => {
            let target = match (name, website) {
                (Some(name), Some(website)) => {
                    let mut target = Target::new(name.trim(), website.trim());
                    target.changelog_url = changelog.clone();
                    target.pricing_url = pricing.clone();
                    target.blog_url = blog.clone();
                    target.social_urls = non_empty(social.clone());
                    target.app_store_urls = parse_app_stores(app_store)?;
                    target.rss_feeds = non_empty(rss.clone());
                    target
                }
                (None, None) => prompts::prompt_target()?,
                _ => return Err(eyre!("--name and --website must be given together")),
            };
            cmd_add_target(&cli.targets, target)
        }
        Command::ListTargets => cmd_list_targets(&cli.targets),
        Command::RemoveTarget { name } => cmd_remove_target(&cli.targets, name.as_deref()),
        Command::Run => cmd_run(&cli).await,
        Command::Report => cmd_report(&cli).await,
        Command::Schedule {
            frequency,
            no_initial,
        } => cmd_schedule(&cli, frequency.map(Frequency::from), *no_initial).await,
        Command::TestConfig => cmd_test_config(&cli),
        Command::Status => cmd_status(&cli).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(&cli.config),
            ConfigAction::Show => cmd_config_show(&cli.config),
        },
    }
}

fn non_empty(values: Vec<String>) -> Option<Vec<String>> {
    (!values.is_empty()).then_some(values)
}

/// Parse repeated `PLATFORM=URL` pairs.
fn parse_app_stores(pairs: &[String]) -> Result<Option<BTreeMap<String, String>>> {
    let mut stores = BTreeMap::new();
    for pair in pairs {
        let (platform, url) = pair
            .split_once('=')
            .ok_or_else(|| eyre!("invalid --app-store '{pair}': expected PLATFORM=URL"))?;
        stores.insert(platform.trim().to_lowercase(), url.trim().to_string());
    }
    Ok((!stores.is_empty()).then_some(stores))
}

// ---------------------------------------------------------------------------
// Shared setup
// ---------------------------------------------------------------------------

/// The history database path: `DATABASE_URL` wins over the config.
fn database_path(config: &MonitorConfig, credentials: &Credentials) -> PathBuf {
    match &credentials.database_url {
        Some(url) => PathBuf::from(url.strip_prefix("file:").unwrap_or(url)),
        None => config.database_path.clone(),
    }
}

async fn build_pipeline(cli: &Cli) -> Result<Pipeline> {
    let config = load_config(&cli.config)?;
    let credentials = Credentials::from_env();
    validate_api_key(&credentials)?;

    let targets = load_targets(&cli.targets)?;
    if targets.is_empty() {
        return Err(eyre!(
            "no targets configured in {}; add one with `lookout add-target`",
            cli.targets.display()
        ));
    }

    let storage = Storage::open(&database_path(&config, &credentials)).await?;
    info!(targets = targets.len(), "pipeline ready");
    Ok(Pipeline::from_config(config, targets, &credentials, storage)?)
}

fn print_outcome(heading: &str, outcome: &ReportOutcome) {
    println!();
    if outcome.result_count == 0 {
        println!("  No results collected during monitoring.");
    } else {
        println!("  {heading}");
    }
    println!("  Run:      {}", outcome.run_id);
    println!("  Results:  {}", outcome.result_count);
    if !outcome.failed_targets.is_empty() {
        println!("  Failed:   {}", outcome.failed_targets.join(", "));
    }
    if let Some(path) = &outcome.report_path {
        println!("  Report:   {}", path.display());
    }
    for (channel, delivery) in &outcome.deliveries {
        println!("  {:<9} {delivery}", format!("{channel}:"));
    }
    println!("  Time:     {:.1}s", outcome.elapsed.as_secs_f64());
    println!();
}

// ---------------------------------------------------------------------------
// Target management
// ---------------------------------------------------------------------------

fn cmd_add_target(path: &Path, target: Target) -> Result<()> {
    target.validate()?;

    let mut targets = if path.exists() {
        load_targets_strict(path)?
    } else {
        Vec::new()
    };
    if targets
        .iter()
        .any(|t| t.name.eq_ignore_ascii_case(&target.name))
    {
        return Err(eyre!("a target named '{}' already exists", target.name));
    }

    info!(name = %target.name, "adding target");
    let name = target.name.clone();
    targets.push(target);
    save_targets(path, &targets)?;

    println!("Added {name} to monitoring targets ({} total)", targets.len());
    Ok(())
}

fn cmd_list_targets(path: &Path) -> Result<()> {
    if !path.exists() {
        println!(
            "No targets file at {}; the built-in demo targets are used.",
            path.display()
        );
    }
    let targets = load_targets(path)?;
    if targets.is_empty() {
        println!("No targets configured");
        return Ok(());
    }

    println!("{} competitor targets configured:", targets.len());
    println!("{}", "-".repeat(60));
    for (i, t) in targets.iter().enumerate() {
        println!("{}. {}", i + 1, t.name);
        println!("   Website:   {}", t.website_url);
        if let Some(url) = &t.changelog_url {
            println!("   Changelog: {url}");
        }
        if let Some(url) = &t.pricing_url {
            println!("   Pricing:   {url}");
        }
        if let Some(url) = &t.blog_url {
            println!("   Blog:      {url}");
        }
        if let Some(urls) = &t.social_urls {
            println!("   Social:    {}", urls.join(", "));
        }
        if let Some(stores) = &t.app_store_urls {
            for (platform, url) in stores {
                println!("   App store: {platform} {url}");
            }
        }
        if !t.feeds().is_empty() {
            println!("   Feeds:     {}", t.feeds().join(", "));
        }
        println!();
    }
    Ok(())
}

fn cmd_remove_target(path: &Path, name: Option<&str>) -> Result<()> {
    if !path.exists() {
        return Err(eyre!("no targets file at {}", path.display()));
    }
    let mut targets = load_targets_strict(path)?;
    if targets.is_empty() {
        println!("No targets configured");
        return Ok(());
    }

    let index = match name {
        Some(name) => targets
            .iter()
            .position(|t| t.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| eyre!("no target named '{name}'"))?,
        None => match prompts::select_target(&targets)? {
            Some(index) => index,
            None => {
                println!("Nothing removed");
                return Ok(());
            }
        },
    };

    let removed = targets.remove(index);
    save_targets(path, &targets)?;
    info!(name = %removed.name, "removed target");
    println!("Removed {} from monitoring targets", removed.name);
    Ok(())
}

// ---------------------------------------------------------------------------
// Runs
// ---------------------------------------------------------------------------

async fn cmd_run(cli: &Cli) -> Result<()> {
    let pipeline = build_pipeline(cli).await?;
    let outcome = pipeline.run_once(&CliProgress::new()).await?;
    print_outcome("Monitoring completed.", &outcome);
    Ok(())
}

async fn cmd_report(cli: &Cli) -> Result<()> {
    let pipeline = build_pipeline(cli).await?;
    let outcome = pipeline.run_report(&CliProgress::new()).await?;
    print_outcome("Competitive intelligence report generated.", &outcome);
    if outcome
        .deliveries
        .iter()
        .any(|(_, d)| matches!(d, DeliveryOutcome::Failed(_)))
    {
        println!("  Some notifications failed; see the log for details.");
    }
    Ok(())
}

async fn cmd_schedule(cli: &Cli, frequency: Option<Frequency>, no_initial: bool) -> Result<()> {
    let pipeline = Arc::new(build_pipeline(cli).await?);
    let frequency = frequency.unwrap_or(pipeline.monitor().config().monitoring_frequency);

    if !no_initial {
        info!("running initial report");
        let outcome = pipeline.run_report(&CliProgress::new()).await?;
        print_outcome("Initial report generated.", &outcome);
    }

    let mut scheduler = start_scheduler(pipeline, frequency).await?;
    println!(
        "Scheduler running ({frequency}, cron \"{}\" local time). Press Ctrl-C to stop.",
        lookout_core::cron_expression(frequency)
    );

    tokio::signal::ctrl_c().await?;
    info!("shutting down scheduler");
    scheduler
        .shutdown()
        .await
        .map_err(|e| eyre!("scheduler shutdown failed: {e}"))?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Diagnostics
// ---------------------------------------------------------------------------

fn mark(ok: bool) -> &'static str {
    if ok { "ok" } else { "--" }
}

fn cmd_test_config(cli: &Cli) -> Result<()> {
    println!("Testing configuration...");
    println!();

    for path in [&cli.config, &cli.targets] {
        let found = path.exists();
        println!(
            "  [{}] {} {}",
            mark(found),
            path.display(),
            if found { "found" } else { "missing (defaults used)" }
        );
    }

    let config = load_config(&cli.config)?;
    let credentials = Credentials::from_env();

    let ai_ready = validate_api_key(&credentials)
        .and_then(|_| OpenAiClient::from_credentials(&credentials))
        .is_ok();
    println!(
        "  [{}] OpenAI client {}",
        mark(ai_ready),
        if ai_ready {
            "initialized"
        } else {
            "not configured (OPENAI_API_KEY required)"
        }
    );

    for channel in [
        ChannelKind::Slack,
        ChannelKind::Notion,
        ChannelKind::Email,
        ChannelKind::Webhook,
    ] {
        let enabled = config.notification_channels.contains(&channel);
        let configured = credentials.is_configured(channel);
        let note = match (enabled, configured) {
            (true, true) => "configured",
            (true, false) => "enabled but missing credentials",
            (false, true) => "configured but not enabled in notification_channels",
            (false, false) => "not configured (optional)",
        };
        println!("  [{}] {channel}: {note}", mark(enabled && configured));
    }

    let targets = load_targets(&cli.targets)?;
    let invalid: Vec<String> = targets
        .iter()
        .filter_map(|t| t.validate().err().map(|e| format!("{}: {e}", t.name)))
        .collect();
    println!(
        "  [{}] {} targets loaded",
        mark(invalid.is_empty()),
        targets.len()
    );
    for problem in &invalid {
        println!("       {problem}");
    }

    println!();
    println!("Configuration test completed");
    Ok(())
}

async fn cmd_status(cli: &Cli) -> Result<()> {
    let config = load_config(&cli.config)?;
    let credentials = Credentials::from_env();

    println!("Lookout status");
    println!("{}", "-".repeat(40));
    println!(
        "  Frequency: {} (cron \"{}\" local time, run `lookout schedule` to start)",
        config.monitoring_frequency,
        lookout_core::cron_expression(config.monitoring_frequency)
    );

    let db_path = database_path(&config, &credentials);
    match Storage::open_readonly(&db_path).await {
        Ok(storage) => {
            match storage.latest_run().await? {
                Some(run) => {
                    println!("  Last run:  {} ({})", run.started_at.to_rfc3339(), run.status);
                    println!("  Results:   {}", run.result_count);
                    if !run.failed_targets.is_empty() {
                        println!("  Failed:    {}", run.failed_targets.join(", "));
                    }
                    if let Some(report) = run.report_path {
                        println!("  Report:    {report}");
                    }
                }
                None => println!("  Last run:  none"),
            }
            println!("  History:   {} entries", storage.count_history().await?);
        }
        Err(_) => println!("  History:   no database at {}", db_path.display()),
    }

    match latest_report(&config.reports_dir) {
        Some(path) => println!("  Latest report file: {}", path.display()),
        None => println!("  Latest report file: none in {}", config.reports_dir.display()),
    }

    let targets = load_targets(&cli.targets)?;
    println!("  Targets:   {} configured", targets.len());
    Ok(())
}

/// Newest `.md` file in `dir` by modification time.
fn latest_report(dir: &Path) -> Option<PathBuf> {
    std::fs::read_dir(dir)
        .ok()?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "md"))
        .filter_map(|entry| {
            let modified = entry.metadata().ok()?.modified().ok()?;
            Some((modified, entry.path()))
        })
        .max_by_key(|(modified, _)| *modified)
        .map(|(_, path)| path)
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

fn cmd_config_init(path: &Path) -> Result<()> {
    let path = init_config(path)?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(path: &Path) -> Result<()> {
    let config = load_config(path)?;
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_global_flags() {
        let cli = Cli::try_parse_from([
            "lookout",
            "--config",
            "cfg.json",
            "-vv",
            "schedule",
            "--frequency",
            "daily",
        ])
        .unwrap();
        assert_eq!(cli.config, PathBuf::from("cfg.json"));
        assert_eq!(cli.verbose, 2);
        assert!(matches!(
            cli.command,
            Command::Schedule {
                frequency: Some(FrequencyArg::Daily),
                no_initial: false
            }
        ));
    }

    #[test]
    fn add_target_collects_repeated_flags() {
        let cli = Cli::try_parse_from([
            "lookout",
            "add-target",
            "--name",
            "Acme",
            "--website",
            "https://acme.test",
            "--rss",
            "https://acme.test/a.xml",
            "--rss",
            "https://acme.test/b.xml",
            "--app-store",
            "ios=https://apps.apple.com/app/acme",
        ])
        .unwrap();
        let Command::AddTarget { rss, app_store, .. } = cli.command else {
            panic!("wrong command");
        };
        assert_eq!(rss.len(), 2);
        let stores = parse_app_stores(&app_store).unwrap().unwrap();
        assert_eq!(stores["ios"], "https://apps.apple.com/app/acme");
    }

    #[test]
    fn app_store_pairs_need_equals() {
        assert!(parse_app_stores(&["ios https://x".to_string()]).is_err());
        assert!(parse_app_stores(&[]).unwrap().is_none());
    }

    #[test]
    fn database_url_overrides_config() {
        let config = MonitorConfig::default();
        let mut creds = Credentials::default();
        assert_eq!(database_path(&config, &creds), config.database_path);
        creds.database_url = Some("file:/tmp/lookout.db".into());
        assert_eq!(database_path(&config, &creds), PathBuf::from("/tmp/lookout.db"));
    }

    #[test]
    fn add_and_remove_targets_on_disk() {
        let path = std::env::temp_dir().join(format!("lookout-cli-{}.json", std::process::id()));
        std::fs::remove_file(&path).ok();

        cmd_add_target(&path, Target::new("Acme", "https://acme.test")).unwrap();
        assert!(cmd_add_target(&path, Target::new("acme", "https://acme.test")).is_err());
        cmd_add_target(&path, Target::new("Globex", "https://globex.test")).unwrap();
        assert_eq!(load_targets_strict(&path).unwrap().len(), 2);

        cmd_remove_target(&path, Some("ACME")).unwrap();
        let left = load_targets_strict(&path).unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].name, "Globex");
        assert!(cmd_remove_target(&path, Some("Initech")).is_err());
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn invalid_target_is_not_saved() {
        let path = std::env::temp_dir().join(format!("lookout-cli-bad-{}.json", std::process::id()));
        assert!(cmd_add_target(&path, Target::new("Acme", "ftp://acme.test")).is_err());
        assert!(!path.exists());
    }
}
