//! `harvest run` — drive a serial range against the remote registry and
//! archive every found record.

use std::collections::HashSet;
use std::path::PathBuf;

use anyhow::{Context, Result};
use harvest_core::ItemGenerator;
use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;

use crate::config::{resolve_config_path, HarvestConfig};
use crate::journal::Journal;
use crate::pipeline::Orchestrator;
use crate::progress::{self, HarvestEventKind, ProgressReceiver};
use crate::session::chromium::ChromiumSession;
use crate::session::InteractiveSession;
use crate::sink::DirSink;

/// Flag overrides layered over the resolved config file.
#[derive(Debug, Default)]
pub struct RunArgs {
    pub config: Option<PathBuf>,
    pub realm: Option<String>,
    pub start: Option<u64>,
    pub end: Option<u64>,
    pub output: Option<PathBuf>,
    pub headed: bool,
    pub resume: bool,
}

pub async fn run(args: RunArgs) -> Result<()> {
    let mut config = match resolve_config_path(args.config.as_deref()) {
        Some(path) => {
            tracing::info!(path = %path.display(), "loading config");
            HarvestConfig::load(&path)?
        }
        None => {
            tracing::info!("no config file found, using built-in defaults");
            HarvestConfig::default()
        }
    };

    if let Some(realm) = args.realm {
        config.realm_code = realm;
    }
    if let Some(start) = args.start {
        config.start_serial = start;
    }
    if let Some(end) = args.end {
        config.end_serial = end;
    }
    if let Some(output) = args.output {
        config.output_dir = output;
    }
    if args.headed {
        config.browser.headless = false;
    }
    if args.resume {
        config.resume = true;
    }
    config.validate()?;

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("interrupt received, unwinding the current session");
                cancel.cancel();
            }
        });
    }

    let skip = if config.resume {
        match &config.journal_path {
            Some(path) => {
                let completed = Journal::completed_serials(path)?;
                tracing::info!(count = completed.len(), "resume: skipping journaled serials");
                completed
            }
            None => {
                tracing::warn!("resume requested but journaling is disabled, nothing to skip");
                HashSet::new()
            }
        }
    } else {
        HashSet::new()
    };

    let generator = ItemGenerator::new(
        &config.realm_code,
        config.start_serial,
        config.end_serial,
    );
    let total = generator.remaining();

    // Without an interactive session nothing can run; this is the one
    // setup error that is fatal to the whole run.
    let session = ChromiumSession::launch(&config.browser)
        .await
        .context("cannot establish the interactive session")?;
    let sink = DirSink::new(&config.output_dir);

    let (tx, rx) = progress::channel();
    let bar_task = spawn_progress_bar(rx, total);

    let mut orchestrator =
        Orchestrator::new(session, sink, &config, cancel.clone()).with_progress(tx);
    if let Some(path) = &config.journal_path {
        orchestrator = orchestrator.with_journal(Journal::open(path)?);
    }
    if !skip.is_empty() {
        orchestrator = orchestrator.with_skip(skip);
    }
    if let Some(needle) = config.artifact_must_contain.clone() {
        orchestrator = orchestrator
            .with_artifact_check(Box::new(move |artifact| artifact.contains(&needle)));
    }

    let report = orchestrator.run(generator).await;
    let _ = orchestrator.session_mut().close().await;
    let _ = bar_task.await;

    println!(
        "Attempted {} of {} identifiers: {} found, {} not found, {} failed, {} skipped",
        report.attempted, total, report.found, report.not_found, report.failed, report.skipped
    );
    if report.cancelled {
        println!("Run cancelled before the range was exhausted.");
    }

    Ok(())
}

fn spawn_progress_bar(mut rx: ProgressReceiver, total: u64) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let bar = ProgressBar::new(total);
        let style = ProgressStyle::with_template(
            "{bar:40.cyan/blue} {pos}/{len} {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar());
        bar.set_style(style);

        loop {
            match rx.recv().await {
                Ok(event) => match event.event {
                    HarvestEventKind::ItemStarted { identifier } => {
                        bar.set_message(identifier);
                    }
                    HarvestEventKind::ItemSkipped { .. } => {
                        bar.inc(1);
                    }
                    HarvestEventKind::ItemCompleted {
                        identifier, outcome, ..
                    } => {
                        bar.inc(1);
                        bar.set_message(format!("{identifier} {outcome}"));
                    }
                    HarvestEventKind::HarvestComplete { .. } => {
                        bar.finish_and_clear();
                        break;
                    }
                    HarvestEventKind::Warning { message } => {
                        bar.println(message);
                    }
                },
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                Err(_) => break,
            }
        }
    })
}
