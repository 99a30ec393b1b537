//! JSONL outcome journal — append-only log of per-identifier results.
//!
//! One line per completed session, easy to grep and safe to append to
//! across restarts. The journal doubles as the resume source: serials
//! already recorded as `found` or `not_found` can be skipped on a rerun,
//! while failed serials stay eligible for another attempt.

use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use harvest_core::{RegistryItem, SessionOutcome};
use serde::{Deserialize, Serialize};

/// A single journal line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalEntry {
    /// RFC 3339 UTC timestamp.
    pub timestamp: String,
    pub realm_code: String,
    pub serial_number: String,
    pub check_digit: String,
    /// Outcome label: `found`, `not_found`, or `failed`.
    pub outcome: String,
    /// Failure detail; absent for terminal answers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Append-only JSONL journal.
pub struct Journal {
    file: File,
    path: PathBuf,
}

impl Journal {
    /// Open or create the journal file, creating parent directories.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open journal: {}", path.display()))?;

        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one outcome line.
    pub fn record(&mut self, item: &RegistryItem, outcome: &SessionOutcome) -> Result<()> {
        let detail = match outcome {
            SessionOutcome::Failed { kind, detail } => Some(format!("{kind}: {detail}")),
            _ => None,
        };

        let entry = JournalEntry {
            timestamp: Utc::now().to_rfc3339(),
            realm_code: item.realm_code.clone(),
            serial_number: item.serial_number.clone(),
            check_digit: item.check_digit.clone(),
            outcome: outcome.label().to_string(),
            detail,
        };

        let json = serde_json::to_string(&entry)?;
        writeln!(self.file, "{json}")
            .with_context(|| format!("failed to append to journal: {}", self.path.display()))?;
        Ok(())
    }

    /// Serials already journaled with a terminal answer, for `--resume`.
    /// Unparseable lines are skipped rather than fatal.
    pub fn completed_serials(path: &Path) -> Result<HashSet<String>> {
        let mut completed = HashSet::new();
        if !path.exists() {
            return Ok(completed);
        }

        let reader = BufReader::new(
            File::open(path)
                .with_context(|| format!("failed to read journal: {}", path.display()))?,
        );

        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<JournalEntry>(&line) {
                Ok(entry) if entry.outcome == "found" || entry.outcome == "not_found" => {
                    completed.insert(entry.serial_number);
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!("skipping malformed journal line: {e}");
                }
            }
        }

        Ok(completed)
    }
}
