//! Configuration surface for a harvest run.
//!
//! Everything the core pipeline treats as external data lives here: the
//! realm code and serial range, pacing bounds, the target site's selectors
//! and not-found marker, and browser disguise options. Loaded from a JSON
//! file with CLI overrides; resolution order is explicit flag, then the
//! `HARVEST_CONFIG` env var, then `./harvest.json`, then
//! `~/.harvest/config.json`.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use harvest_core::generator::MAX_SERIAL;
use serde::{Deserialize, Serialize};

/// Top-level run configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvestConfig {
    /// Registry partition code, constant per run.
    pub realm_code: String,
    /// First serial in the range (inclusive).
    pub start_serial: u64,
    /// Last serial in the range (inclusive).
    pub end_serial: u64,
    /// Directory artifacts are written to.
    pub output_dir: PathBuf,
    /// JSONL outcome journal; `None` disables journaling and resume.
    pub journal_path: Option<PathBuf>,
    /// Skip serials already journaled as found/not-found.
    pub resume: bool,
    /// Built-in post-extraction check: an extracted artifact missing this
    /// substring is recorded as not-found instead of persisted.
    pub artifact_must_contain: Option<String>,
    pub pacing: PacingConfig,
    pub target: TargetProfile,
    pub browser: BrowserOptions,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            realm_code: "OL1O".to_string(),
            start_serial: 1,
            end_serial: 100,
            output_dir: PathBuf::from("output"),
            journal_path: Some(PathBuf::from("output/journal.jsonl")),
            resume: false,
            artifact_must_contain: None,
            pacing: PacingConfig::default(),
            target: TargetProfile::default(),
            browser: BrowserOptions::default(),
        }
    }
}

impl HarvestConfig {
    /// Load a configuration file, layering it over the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: Self = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Write the configuration as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write config file {}", path.display()))?;
        Ok(())
    }

    /// Range and delay-bound sanity checks.
    pub fn validate(&self) -> Result<()> {
        if self.realm_code.is_empty() {
            bail!("realm_code must not be empty");
        }
        if self.start_serial > self.end_serial {
            bail!(
                "start_serial ({}) must not exceed end_serial ({})",
                self.start_serial,
                self.end_serial
            );
        }
        if self.end_serial > MAX_SERIAL {
            bail!("end_serial ({}) exceeds the 8-digit format", self.end_serial);
        }
        if self.pacing.step_delay_min_ms > self.pacing.step_delay_max_ms {
            bail!("step delay bounds are inverted");
        }
        if self.pacing.item_delay_min_ms > self.pacing.item_delay_max_ms {
            bail!("item delay bounds are inverted");
        }
        if self.pacing.max_attempts == 0 {
            bail!("max_attempts must be at least 1");
        }
        Ok(())
    }
}

/// Delay and budget parameters. All delays are zeroable so tests run
/// without wall-clock waits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PacingConfig {
    /// Humanization pause between workflow sub-steps, lower bound.
    pub step_delay_min_ms: u64,
    /// Humanization pause between workflow sub-steps, upper bound.
    pub step_delay_max_ms: u64,
    /// Pacing delay between items, lower bound.
    pub item_delay_min_ms: u64,
    /// Pacing delay between items, upper bound.
    pub item_delay_max_ms: u64,
    /// Fixed cooldown after a failed session.
    pub failure_cooldown_ms: u64,
    /// Wall-clock budget for one whole session.
    pub session_timeout_ms: u64,
    /// Whole-session attempts per identifier. 1 means no retry.
    pub max_attempts: u32,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            step_delay_min_ms: 200,
            step_delay_max_ms: 700,
            item_delay_min_ms: 1_000,
            item_delay_max_ms: 3_000,
            failure_cooldown_ms: 10_000,
            session_timeout_ms: 300_000,
            max_attempts: 1,
        }
    }
}

impl PacingConfig {
    /// All-zero pacing for tests.
    pub fn zero() -> Self {
        Self {
            step_delay_min_ms: 0,
            step_delay_max_ms: 0,
            item_delay_min_ms: 0,
            item_delay_max_ms: 0,
            failure_cooldown_ms: 0,
            session_timeout_ms: 300_000,
            max_attempts: 1,
        }
    }
}

/// Where and how the form is driven on the target site. Pure configuration
/// data — selectors and markers, never transition logic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetProfile {
    /// Search form entry page.
    pub entry_url: String,
    /// Realm-code input field.
    pub realm_selector: String,
    /// Serial-number input field.
    pub serial_selector: String,
    /// Check-digit input field.
    pub digit_selector: String,
    /// How the form is submitted.
    pub submit: SubmitMode,
    /// Control on the results page that opens the record's detail view.
    pub detail_link_selector: String,
    /// Region of the detail view read as the artifact payload.
    pub detail_region_selector: String,
    /// Marker string the results page shows when no record exists.
    pub not_found_marker: String,
    /// Wait budget for each expected element.
    pub wait_timeout_ms: u64,
}

impl Default for TargetProfile {
    fn default() -> Self {
        Self {
            entry_url: "https://przegladarka-ekw.ms.gov.pl/eukw_prz/KsiegiWieczyste/wyszukiwanieKW"
                .to_string(),
            realm_selector: "#kodWydzialuInput".to_string(),
            serial_selector: "#numerKsiegiWieczystej".to_string(),
            digit_selector: "#cyfraKontrolna".to_string(),
            submit: SubmitMode::EnterKey,
            detail_link_selector: "#przyciskWglad".to_string(),
            detail_region_selector: "#contentDzialy".to_string(),
            not_found_marker: "nie została odnaleziona".to_string(),
            wait_timeout_ms: 15_000,
        }
    }
}

/// How the search form is submitted — target-dependent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SubmitMode {
    /// Click a native submit control.
    Click { selector: String },
    /// Keyboard activation from the focused field.
    EnterKey,
}

/// Browser launch options. Disguise values are data, not behavior.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserOptions {
    pub headless: bool,
    /// Explicit Chromium binary; probed when absent.
    pub chrome_path: Option<PathBuf>,
    pub user_agent: Option<String>,
    pub accept_language: Option<String>,
}

impl Default for BrowserOptions {
    fn default() -> Self {
        Self {
            headless: true,
            chrome_path: None,
            user_agent: Some(
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
                    .to_string(),
            ),
            accept_language: Some("pl-PL,pl;q=0.9,en-US;q=0.8,en;q=0.7".to_string()),
        }
    }
}

/// Resolve the config file path: explicit flag > `HARVEST_CONFIG` env >
/// `./harvest.json` > `~/.harvest/config.json`. `None` means run on
/// built-in defaults.
pub fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }

    if let Ok(env_path) = std::env::var("HARVEST_CONFIG") {
        return Some(PathBuf::from(env_path));
    }

    let cwd_config = PathBuf::from("harvest.json");
    if cwd_config.exists() {
        return Some(cwd_config);
    }

    let home_config = dirs::home_dir()?.join(".harvest").join("config.json");
    if home_config.exists() {
        return Some(home_config);
    }

    None
}
