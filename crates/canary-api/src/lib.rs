//! Canary API types.
//!
//! These types describe the Istio routing objects that canary traffic shifts
//! manage: [DestinationRule](destination_rule::DestinationRule)s and the
//! [Subset](destination_rule::Subset)s they define, and the
//! [VirtualService](virtual_service::VirtualService)s that route traffic to
//! those subsets. The [labels] module has the `key=value` selector syntax used
//! to pick them out.
//!
//! The `kube` feature of this crate lets you convert these types to and from
//! Kubernetes objects.

mod error;
pub use error::Error;

pub mod destination_rule;
pub mod labels;
pub mod virtual_service;

pub use destination_rule::{DestinationRule, DestinationRuleSpec, Subset};
pub use labels::Labels;
pub use virtual_service::VirtualService;

#[cfg(feature = "kube")]
pub mod kube;
