use std::fs;

use once_cell::sync::Lazy;
use regex::Regex;
use teesub_core::{Finding, FindingKind};
use tracing::{debug, warn};

use crate::inventory::DatasetInventory;

// Demo-grade patterns; the detector set is fixed and applied in this order.
static DETECTORS: Lazy<[(FindingKind, Regex); 3]> = Lazy::new(|| {
    [
        (
            FindingKind::Email,
            Regex::new(r"[a-zA-Z0-9_.+-]+@[a-zA-Z0-9-]+\.[a-zA-Z0-9.-]+")
                .expect("email pattern compiles"),
        ),
        (
            FindingKind::Phone,
            Regex::new(r"\+?\d[\d\s\-().]{7,}\d").expect("phone pattern compiles"),
        ),
        (
            FindingKind::Iban,
            Regex::new(r"\b[A-Z]{2}\d{2}[A-Z0-9]{11,30}\b").expect("iban pattern compiles"),
        ),
    ]
});

/// Scan every file of the inventory, in inventory order.
///
/// Files that cannot be read are skipped; the scan itself never fails.
pub fn scan_dataset(inventory: &DatasetInventory) -> Vec<Finding> {
    let mut findings = Vec::new();
    for file in inventory.files() {
        let bytes = match fs::read(&file.abs_path) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(path = %file.rel_path, error = %err, "skipping unreadable file");
                continue;
            }
        };
        let text = decode_dropping_invalid(&bytes);
        if text.is_empty() {
            continue;
        }
        let before = findings.len();
        findings.extend(scan_text(&file.rel_path, &text));
        debug!(path = %file.rel_path, matches = findings.len() - before, "file scanned");
    }
    findings
}

/// Findings for one decoded file: detector order, then match order.
pub fn scan_text(path: &str, text: &str) -> Vec<Finding> {
    let mut out = Vec::new();
    for (kind, pattern) in DETECTORS.iter() {
        for m in pattern.find_iter(text) {
            out.push(Finding {
                kind: *kind,
                path: path.to_string(),
                detail: m.as_str().to_string(),
            });
        }
    }
    out
}

/// UTF-8 decode that drops invalid byte sequences instead of replacing them.
pub fn decode_dropping_invalid(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    let mut rest = bytes;
    loop {
        match std::str::from_utf8(rest) {
            Ok(valid) => {
                out.push_str(valid);
                break;
            }
            Err(err) => {
                let (valid, after) = rest.split_at(err.valid_up_to());
                out.push_str(std::str::from_utf8(valid).unwrap_or_default());
                match err.error_len() {
                    Some(len) => rest = &after[len..],
                    None => break,
                }
            }
        }
    }
    out
}
