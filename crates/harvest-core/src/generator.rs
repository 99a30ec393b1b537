//! Lazy generation of validated registry identifiers over a serial range.

use crate::types::RegistryItem;

/// Largest serial representable in the fixed 8-digit format.
pub const MAX_SERIAL: u64 = 99_999_999;

/// Ordered, lazy iterator of [`RegistryItem`]s for serials in
/// `[start, end]` inclusive.
///
/// Serials are zero-padded to eight digits and emitted in strictly
/// ascending order; the same range always yields the same sequence. At most
/// one item is materialized per `next()` call, so stopping early costs
/// nothing. A serial whose checksum input contains a character outside the
/// value table is skipped with a warning — a data-quality filter, not an
/// abort.
#[derive(Debug, Clone)]
pub struct ItemGenerator {
    realm_code: String,
    next: u64,
    end: u64,
}

impl ItemGenerator {
    pub fn new(realm_code: &str, start: u64, end: u64) -> Self {
        Self {
            realm_code: realm_code.to_string(),
            next: start,
            end,
        }
    }

    /// Serials left in the range — an upper bound on remaining items.
    pub fn remaining(&self) -> u64 {
        if self.next > self.end {
            0
        } else {
            self.end - self.next + 1
        }
    }
}

impl Iterator for ItemGenerator {
    type Item = RegistryItem;

    fn next(&mut self) -> Option<RegistryItem> {
        while self.next <= self.end {
            let serial = self.next;
            self.next += 1;

            if serial > MAX_SERIAL {
                // Everything past this point is too wide for the format.
                tracing::warn!(serial, "serial exceeds the 8-digit format, stopping");
                self.next = self.end + 1;
                return None;
            }

            let formatted = format!("{serial:08}");
            match RegistryItem::new(&self.realm_code, &formatted) {
                Ok(item) => return Some(item),
                Err(e) => {
                    tracing::warn!(
                        realm = %self.realm_code,
                        serial = %formatted,
                        "skipping identifier: {e}"
                    );
                }
            }
        }
        None
    }
}
