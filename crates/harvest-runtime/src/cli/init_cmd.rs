//! `harvest init` — write a starter configuration file.

use std::path::Path;

use anyhow::{bail, Result};

use crate::config::HarvestConfig;

pub fn run(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!(
            "{} already exists (pass --force to overwrite)",
            path.display()
        );
    }

    HarvestConfig::default().save(path)?;
    println!("Wrote starter config to {}", path.display());
    println!("Edit the realm code, serial range, and target selectors before running.");
    Ok(())
}
