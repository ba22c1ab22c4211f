use serde::{Deserialize, Serialize};

/// Configuration for a [DestinationRuleManager](crate::DestinationRuleManager).
///
/// Every field has a default, so an empty document is a valid config.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Create a DestinationRule when an update finds nothing matching the
    /// shift's selector. When unset, updating a shift that was never created
    /// does nothing.
    #[serde(default)]
    pub create_if_missing: bool,
}
