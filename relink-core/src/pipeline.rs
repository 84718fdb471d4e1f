//! One poll-diff-patch-notify pass.
//!
//! Probing and reading the rclone config are preconditions: failing either
//! aborts the run before anything is computed. Later write failures are
//! collected in the report so the computed changes are never lost.

use crate::config::AppConfig;
use crate::detect::{Change, Detection, detect};
use crate::error::{CoreError, Result};
use crate::notify::{LogNotifier, Notifier, NotifySummary, notify_all};
use crate::patch::{ConfigDocument, PatchOutcome, PatchResult, Patcher};
use crate::store::{RecordStore, RunRecord};
use chrono::{DateTime, Utc};
use relink_scanner::{Extractor, build_client, fetch_page, probe_sources};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use url::Url;

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Compute everything, write nothing, only log notifications.
    pub dry_run: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Updated,
    NoChanges,
}

impl RunOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunOutcome::Updated => "updated",
            RunOutcome::NoChanges => "no_changes",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteTarget {
    Store,
    Document,
    History,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistenceFailure {
    pub target: WriteTarget,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchSummary {
    pub rewritten: bool,
    pub touched: Vec<String>,
    pub missing_sections: Vec<String>,
    pub missing_fields: Vec<String>,
    pub unobserved: Vec<String>,
}

impl From<&PatchOutcome> for PatchSummary {
    fn from(outcome: &PatchOutcome) -> Self {
        Self {
            rewritten: !outcome.is_noop(),
            touched: outcome.touched.iter().cloned().collect(),
            missing_sections: outcome.missing_sections.clone(),
            missing_fields: outcome.missing_fields.clone(),
            unobserved: outcome.unobserved.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub source: String,
    pub dry_run: bool,
    pub outcome: RunOutcome,
    pub extracted: usize,
    pub detection: Detection,
    /// Changed labels with no `[mappings]` entry.
    pub unmapped: Vec<String>,
    pub patch: PatchSummary,
    pub notifications: NotifySummary,
    pub failures: Vec<PersistenceFailure>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn changes(&self) -> &[Change] {
        &self.detection.details
    }
}

/// Probe candidates, turning "nobody answered" into a fatal error.
pub async fn resolve_source(config: &AppConfig, client: &Client) -> Result<Url> {
    probe_sources(client, &config.source.candidates)
        .await
        .ok_or_else(|| CoreError::Unreachable {
            candidates: config
                .source
                .candidates
                .iter()
                .map(Url::to_string)
                .collect(),
        })
}

pub async fn run<S, N>(
    config: &AppConfig,
    store: &mut S,
    notifier: &N,
    options: RunOptions,
) -> Result<RunReport>
where
    S: RecordStore,
    N: Notifier,
{
    let run_id = uuid::Uuid::new_v4().to_string();
    let started_at = Utc::now();
    info!("Starting run {}", run_id);

    let client = build_client(config.source.timeout_secs, &config.source.user_agent)?;
    let source = resolve_source(config, &client).await?;

    let rclone_path = config.rclone_path();
    let document = ConfigDocument::read(&rclone_path).map_err(|e| CoreError::ConfigDocument {
        path: rclone_path.display().to_string(),
        source: e,
    })?;

    let extractor = Extractor::new(
        &config.extract.link_selector,
        &config.extract.link_attr,
        &config.extract.label_selector,
        config.extract.pairing,
    )?;
    let page = fetch_page(&client, &source).await?;
    let extracted = extractor.extract(&page.body, &page.url)?;
    info!("Found {} category links on {}", extracted.len(), page.url);

    let previous = store.get_all()?;
    let detection = detect(&previous, &extracted);
    info!(
        "{} added, {} updated",
        detection.changes.added.len(),
        detection.changes.updated.len()
    );

    let mut failures = Vec::new();

    if !options.dry_run {
        for change in &detection.details {
            if let Err(e) = store.upsert(&change.label, &change.new_url) {
                warn!("Failed to store link for {}: {}", change.label, e);
                failures.push(PersistenceFailure {
                    target: WriteTarget::Store,
                    label: Some(change.label.clone()),
                    message: e.to_string(),
                });
            }
        }
    }

    let unmapped: Vec<String> = detection
        .details
        .iter()
        .filter(|change| config.mappings.section_for(&change.label).is_none())
        .map(|change| change.label.clone())
        .collect();

    let patcher = Patcher::new(&config.rclone.field);
    let outcome = patcher.patch(&document, &config.mappings, &detection.mapping);

    match &outcome.result {
        PatchResult::Rewritten(patched) if !options.dry_run => {
            match patched.write(&rclone_path) {
                Ok(()) => info!("{} updated", rclone_path.display()),
                Err(e) => {
                    warn!("Error writing {}: {}", rclone_path.display(), e);
                    failures.push(PersistenceFailure {
                        target: WriteTarget::Document,
                        label: None,
                        message: e.to_string(),
                    });
                }
            }
        }
        PatchResult::Rewritten(_) => info!("Dry run, not writing {}", rclone_path.display()),
        PatchResult::NoOp => info!("{} already up to date", rclone_path.display()),
    }

    let notifications = if options.dry_run {
        notify_all(&LogNotifier::new(&config.site_name), &detection.details).await
    } else {
        notify_all(notifier, &detection.details).await
    };

    let run_outcome = if detection.changes.is_empty() && outcome.touched.is_empty() {
        RunOutcome::NoChanges
    } else {
        RunOutcome::Updated
    };

    if !options.dry_run {
        let record = RunRecord {
            id: run_id.clone(),
            started_at,
            source: source.to_string(),
            outcome: run_outcome.as_str().to_string(),
            added: detection.changes.added.len(),
            updated: detection.changes.updated.len(),
            touched: outcome.touched.len(),
        };
        if let Err(e) = store.record_run(&record) {
            warn!("Failed to record run {}: {}", run_id, e);
            failures.push(PersistenceFailure {
                target: WriteTarget::History,
                label: None,
                message: e.to_string(),
            });
        }
    }

    Ok(RunReport {
        run_id,
        started_at,
        source: source.to_string(),
        dry_run: options.dry_run,
        outcome: run_outcome,
        extracted: extracted.len(),
        patch: PatchSummary::from(&outcome),
        detection,
        unmapped,
        notifications,
        failures,
    })
}
