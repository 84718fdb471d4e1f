use anyhow::{Context, Result, bail};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use relink_core::config::{AppConfig, STARTER_CONFIG, expand_path};
use relink_core::notify::ConfiguredNotifier;
use relink_core::pipeline::{RunOptions, RunReport, resolve_source, run};
use relink_core::report::{self, ReportFormat};
use relink_core::store::{MemoryStore, RecordStore, RunRecord, SqliteStore, StoredRecord};
use relink_scanner::build_client;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

fn print_divider() {
    println!("{}", "═".repeat(60).bright_blue().bold());
}

/// Load and validate the configuration file, expanding `~`.
pub fn load_config(path: &str) -> Result<AppConfig> {
    let path = expand_path(path);
    debug!("Loading configuration from {}", path.display());
    AppConfig::load(&path).with_context(|| {
        format!(
            "loading {} (run `relink init` to create a starter config)",
            path.display()
        )
    })
}

/// Open the configured record store, creating it if needed.
pub fn open_store(config: &AppConfig) -> Result<SqliteStore> {
    let path = config.store_path();
    SqliteStore::open(&path).with_context(|| format!("opening record store at {}", path.display()))
}

pub fn write_starter_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!(
            "{} already exists, use --force to overwrite it",
            path.display()
        );
    }

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    fs::write(path, STARTER_CONFIG).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

pub fn handle_init(config_path: &str, force: bool, quiet: bool) -> Result<()> {
    let config_path = expand_path(config_path);

    if !quiet {
        print_divider();
        println!("{}", "  RELINK INITIALIZATION".bright_white().bold());
        print_divider();
        println!();
    }

    write_starter_config(&config_path, force)?;
    println!(
        "{} Configuration: {}",
        "✓".green().bold(),
        config_path.display().to_string().bright_white()
    );

    let config = AppConfig::load(&config_path)?;
    let store_path = config.store_path();
    let existed = SqliteStore::exists(&store_path);
    open_store(&config)?;
    println!(
        "{} Database {}: {}",
        "✓".green().bold(),
        if existed { "kept" } else { "created" },
        store_path.display().to_string().bright_white()
    );

    if !quiet {
        println!();
        println!(
            "{} Edit [source] candidates and [mappings] before the first run",
            "ℹ".blue()
        );
    }
    Ok(())
}

/// One pipeline pass against the configured store and notifier.
///
/// A dry run against a store that does not exist yet runs in memory so nothing
/// is created on disk.
pub async fn execute_run(config: &AppConfig, options: RunOptions) -> Result<RunReport> {
    let client = build_client(config.source.timeout_secs, &config.source.user_agent)?;
    let notifier = ConfiguredNotifier::from_config(config, client)?;

    let report = if options.dry_run && !SqliteStore::exists(&config.store_path()) {
        info!("No record store yet, dry run starts from an empty one");
        let mut store = MemoryStore::new();
        run(config, &mut store, &notifier, options).await
    } else {
        let mut store = open_store(config)?;
        run(config, &mut store, &notifier, options).await
    };

    report.context("run aborted")
}

/// Returns whether every write succeeded.
pub async fn handle_run(config_path: &str, options: RunOptions, format: ReportFormat) -> Result<bool> {
    let config = load_config(config_path)?;
    let report = execute_run(&config, options).await?;
    print!("{}", report::render(&report, format)?);
    Ok(report.is_success())
}

pub async fn probe_with_spinner(config: &AppConfig, quiet: bool) -> Result<Url> {
    let spinner = if quiet {
        ProgressBar::hidden()
    } else {
        ProgressBar::new_spinner()
    };
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}")?);
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner.set_message(format!(
        "Probing {} candidate source(s)...",
        config.source.candidates.len()
    ));

    let client = build_client(config.source.timeout_secs, &config.source.user_agent)?;
    match resolve_source(config, &client).await {
        Ok(source) => {
            spinner.finish_and_clear();
            Ok(source)
        }
        Err(e) => {
            spinner.finish_and_clear();
            Err(e.into())
        }
    }
}

pub async fn handle_check(config_path: &str, quiet: bool) -> Result<()> {
    let config = load_config(config_path)?;
    let source = probe_with_spinner(&config, quiet).await?;
    println!("{} {} is reachable", "✓".green().bold(), source);
    Ok(())
}

pub fn render_records(records: &[StoredRecord], runs: &[RunRecord]) -> String {
    let mut out = String::new();

    out.push_str(&format!("{} ({})\n", "Links".bold(), records.len()));
    if records.is_empty() {
        out.push_str("  No links recorded yet\n");
    }
    let width = records.iter().map(|r| r.label.len()).max().unwrap_or(0);
    for record in records {
        out.push_str(&format!(
            "  {:<width$}  {}\n",
            record.label,
            record.url,
            width = width
        ));
    }
    out.push('\n');

    out.push_str(&format!("{}\n", "Recent runs".bold()));
    if runs.is_empty() {
        out.push_str("  No runs recorded yet\n");
    }
    for run in runs {
        let outcome = if run.outcome == "updated" {
            run.outcome.green()
        } else {
            run.outcome.bright_black()
        };
        out.push_str(&format!(
            "  {}  {:<10}  +{} ~{} patched {}  {}\n",
            run.started_at.format("%Y-%m-%d %H:%M:%S"),
            outcome,
            run.added,
            run.updated,
            run.touched,
            run.source
        ));
    }

    out
}

pub fn records_json(records: &[StoredRecord], runs: &[RunRecord]) -> Result<String> {
    let value = serde_json::json!({
        "links": records,
        "runs": runs,
    });
    Ok(serde_json::to_string_pretty(&value)?)
}

pub fn list_records(config: &AppConfig, limit: usize, format: ReportFormat) -> Result<String> {
    let path = config.store_path();
    if !SqliteStore::exists(&path) {
        bail!(
            "no record store at {}, run `relink init` or `relink run` first",
            path.display()
        );
    }

    let store = open_store(config)?;
    let records = store.records()?;
    let runs = store.runs(limit)?;

    match format {
        ReportFormat::Text => Ok(render_records(&records, &runs)),
        ReportFormat::Json => records_json(&records, &runs),
    }
}

pub fn handle_records(config_path: &str, limit: usize, format: ReportFormat) -> Result<()> {
    let config = load_config(config_path)?;
    print!("{}", list_records(&config, limit, format)?);
    Ok(())
}
