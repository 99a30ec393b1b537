//! Harvest core — registry identifier enumeration and validation.
//!
//! Pure building blocks shared by the runtime: the weighted modulo-10
//! check digit, the lazy identifier generator, and the data model for
//! session outcomes.

pub mod checksum;
pub mod generator;
pub mod types;

pub use checksum::{check_digit, verify};
pub use generator::ItemGenerator;
pub use types::{CoreError, CoreResult, FailureKind, RegistryItem, SessionOutcome};
