//! Label maps and the `key=value,key=value` selector syntax.

use crate::Error;
use std::collections::BTreeMap;

/// A set of Kubernetes labels or a label selector.
///
/// Labels are kept ordered so that a formatted selector is stable.
pub type Labels = BTreeMap<String, String>;

/// Parse a selector string like `app=api,environment=test` into a label map.
///
/// Whitespace around pairs is ignored and empty pairs are skipped, so an empty
/// string parses to an empty map. When a key is repeated the last value wins.
pub fn parse_selector(s: &str) -> Result<Labels, Error> {
    let mut labels = Labels::new();

    for pair in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let Some((key, value)) = pair.split_once('=') else {
            return Err(Error::new(format!(
                "invalid label pair '{pair}': expected key=value"
            )));
        };

        let (key, value) = (key.trim(), value.trim());
        if key.is_empty() {
            return Err(Error::new(format!("invalid label pair '{pair}': empty key")));
        }
        if value.contains('=') {
            return Err(Error::new(format!(
                "invalid label pair '{pair}': unexpected '='"
            )));
        }

        labels.insert(key.to_string(), value.to_string());
    }

    Ok(labels)
}

/// Format a label map as a selector string, e.g. `app=api,environment=test`.
///
/// Pairs are written in key order. Formatting an empty map is an error, an
/// empty selector would select everything.
pub fn format_selector(labels: &Labels) -> Result<String, Error> {
    if labels.is_empty() {
        return Err(Error::new_static("got an empty labelSelector"));
    }

    let pairs: Vec<_> = labels.iter().map(|(k, v)| format!("{k}={v}")).collect();
    Ok(pairs.join(","))
}

/// Returns `true` if every label in `selector` is present in `labels` with the
/// same value. An empty selector matches everything.
pub fn matches(selector: &Labels, labels: &Labels) -> bool {
    selector.iter().all(|(k, v)| labels.get(k) == Some(v))
}
