//! Element identifiers.
//!
//! Every element gets an `mmid` attribute plus the same value in
//! `aria-keyshortcuts`. The accessibility tree reports `keyshortcuts`, which is
//! how a snapshot node is tied back to its DOM element. `mmid` outlives the
//! fetch so `[mmid='<id>']` selectors keep working until the next one.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

use crate::page::PageHandle;

/// Assigns fresh ids in document order. An existing `aria-keyshortcuts` is
/// backed up once; values this script wrote itself are never backed up.
pub(crate) const INJECT_SCRIPT: &str = r#"() => {
    let id = 0;
    document.querySelectorAll('*').forEach(element => {
        const mmid = `${++id}`;
        const previousMmid = element.getAttribute('mmid');
        const current = element.getAttribute('aria-keyshortcuts');
        const injected = current !== null && (current === previousMmid || current === mmid);
        if (current && !injected && !element.hasAttribute('orig-aria-keyshortcuts')) {
            element.setAttribute('orig-aria-keyshortcuts', current);
        }
        element.setAttribute('mmid', mmid);
        element.setAttribute('aria-keyshortcuts', mmid);
    });
    return id;
}"#;

pub(crate) const CLEANUP_SCRIPT: &str = r#"() => {
    let restored = 0;
    document.querySelectorAll('*[mmid]').forEach(element => {
        element.removeAttribute('aria-keyshortcuts');
        const original = element.getAttribute('orig-aria-keyshortcuts');
        if (original) {
            element.setAttribute('aria-keyshortcuts', original);
            element.removeAttribute('orig-aria-keyshortcuts');
            restored++;
        }
    });
    return restored;
}"#;

/// Tag every element with a fresh id. Returns the number of tagged elements,
/// or 0 when the page rejected the script.
pub async fn inject_identifiers(page: &dyn PageHandle) -> usize {
    match page.call_function(INJECT_SCRIPT, &[]).await {
        Ok(count) => {
            let count = count.as_u64().unwrap_or(0) as usize;
            debug!(count, "Injected element identifiers");
            count
        }
        Err(e) => {
            warn!(error = %e, "Failed to inject element identifiers");
            0
        }
    }
}

/// Remove injected `aria-keyshortcuts` and restore backed-up values.
pub async fn cleanup(page: &dyn PageHandle) {
    match page.call_function(CLEANUP_SCRIPT, &[]).await {
        Ok(restored) => debug!(restored = restored.as_u64().unwrap_or(0), "Cleaned up injected attributes"),
        Err(e) => warn!(error = %e, "Failed to clean up injected attributes"),
    }
}

pub fn mmid_selector(id: u64) -> String {
    format!("[mmid='{}']", id)
}

static MMID_SELECTOR: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r#"^\[mmid=(?:'(\d+)'|"(\d+)"|(\d+))\]$"#).ok());

/// Inverse of [`mmid_selector`]. Accepts single, double or no quotes.
pub fn parse_mmid_selector(selector: &str) -> Option<u64> {
    let captures = MMID_SELECTOR.as_ref()?.captures(selector.trim())?;
    captures.iter().skip(1).flatten().next()?.as_str().parse().ok()
}

/// The identifier carried in a `keyshortcuts` value. Nested labelled elements
/// can report several space separated ids; the last one is the node's own.
pub fn identifier_from_keyshortcuts(value: &str) -> Option<u64> {
    let value = value.trim();
    if value.is_empty() || !value.chars().all(|c| c.is_ascii_digit() || c == ' ') {
        return None;
    }
    value.split_whitespace().last()?.parse().ok()
}
