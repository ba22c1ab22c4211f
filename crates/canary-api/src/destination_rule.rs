//! Istio DestinationRules and the subsets they define.

use crate::labels::Labels;
use serde::{Deserialize, Serialize};

/// A DestinationRule defines named subsets of the pods backing a host.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DestinationRule {
    pub name: String,

    pub namespace: String,

    /// The labels on the DestinationRule object itself. Shifts find the rule
    /// they manage by matching these labels.
    #[serde(default, skip_serializing_if = "Labels::is_empty")]
    pub labels: Labels,

    /// The version of this object the last time it was read from a store.
    ///
    /// Stores use this for optimistic concurrency. Writing an object with a
    /// stale resource version fails with a conflict.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_version: Option<String>,

    #[serde(default)]
    pub spec: DestinationRuleSpec,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DestinationRuleSpec {
    /// The name of the service this rule applies to.
    #[serde(default)]
    pub host: String,

    /// Subsets in the order they were added.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subsets: Vec<Subset>,
}

/// A named group of pods, usually all running the same build of a service.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Subset {
    pub name: String,

    #[serde(default)]
    pub labels: Labels,
}

impl Subset {
    /// The canonical name of the subset for one build of a service in a
    /// namespace: `<name>-<build>-<namespace>`.
    pub fn name_for(name: &str, build: u32, namespace: &str) -> String {
        format!("{name}-{build}-{namespace}")
    }
}

impl DestinationRuleSpec {
    /// Find a subset by name.
    pub fn subset(&self, name: &str) -> Option<&Subset> {
        self.subsets.iter().find(|s| s.name == name)
    }

    /// Add a subset, replacing any existing subset with the same name in
    /// place. New subsets are appended after existing ones.
    ///
    /// Returns `false` if an identical subset was already present and nothing
    /// changed.
    pub fn upsert_subset(&mut self, subset: Subset) -> bool {
        match self.subsets.iter_mut().find(|s| s.name == subset.name) {
            Some(existing) if *existing == subset => false,
            Some(existing) => {
                *existing = subset;
                true
            }
            None => {
                self.subsets.push(subset);
                true
            }
        }
    }

    /// Remove the subset with the given name, keeping the order of the
    /// remaining subsets.
    pub fn remove_subset(&mut self, name: &str) -> Option<Subset> {
        let idx = self.subsets.iter().position(|s| s.name == name)?;
        Some(self.subsets.remove(idx))
    }
}
