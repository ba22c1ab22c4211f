use canary_api::Labels;
use serde::{Deserialize, Serialize};

/// A request to route traffic for a port and hostname to the pods of one
/// build of a service.
///
/// Shifts are plain data, and aren't checked until they're passed to a
/// [DestinationRuleManager](crate::DestinationRuleManager).
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Shift {
    /// The inbound port. Must be in `1024..=65535`.
    #[serde(default)]
    pub port: u32,

    #[serde(default)]
    pub hostname: String,

    /// Selects the DestinationRule managed for this service.
    #[serde(default)]
    pub selector: Labels,

    #[serde(default)]
    pub traffic: Traffic,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Traffic {
    /// Selects the pods running the build that traffic shifts to. These become
    /// the labels of the build's subset.
    #[serde(default)]
    pub pod_selector: Labels,
}

impl Shift {
    /// The valid range of inbound ports.
    pub const PORTS: std::ops::RangeInclusive<u32> = 1024..=65535;
}
