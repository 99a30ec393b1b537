//! `harvest check` — compute or verify one identifier's check digit.

use anyhow::{bail, Result};
use harvest_core::checksum;

/// Accepts `REALM/SERIAL` or `REALM/SERIAL/DIGIT`. Prints the full
/// identifier; with a claimed digit, exits non-zero on mismatch.
pub fn run(identifier: &str) -> Result<()> {
    let parts: Vec<&str> = identifier.split('/').collect();
    let (realm, serial, claimed) = match parts.as_slice() {
        [realm, serial] => (*realm, *serial, None),
        [realm, serial, digit] => (*realm, *serial, Some(*digit)),
        _ => bail!("expected REALM/SERIAL or REALM/SERIAL/DIGIT, got \"{identifier}\""),
    };

    let serial = pad_serial(serial);
    let digit = checksum::check_digit(realm, &serial)?;
    println!("{realm}/{serial}/{digit}");

    if let Some(claimed) = claimed {
        if checksum::verify(realm, &serial, claimed)? {
            println!("check digit ok");
        } else {
            eprintln!("check digit mismatch: claimed {claimed}, computed {digit}");
            std::process::exit(1);
        }
    }

    Ok(())
}

/// Zero-pad an all-digit serial to the fixed 8-digit width; anything else
/// passes through for the checksum to reject with a precise error.
fn pad_serial(serial: &str) -> String {
    if serial.len() < 8 && serial.chars().all(|c| c.is_ascii_digit()) {
        format!("{serial:0>8}")
    } else {
        serial.to_string()
    }
}
