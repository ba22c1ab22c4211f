//! Canary traffic shifting for Istio.
//!
//! A canary rollout sends a slice of a service's traffic to a new build. This
//! crate manages the DestinationRule side of that: every build of a service
//! gets a subset selecting its pods, and a [DestinationRuleManager] creates,
//! updates and clears that subset in a [RoutingStore].
//!
//! ```
//! use canary_core::{DestinationRuleManager, MemoryStore, Shift, Traffic};
//! use canary_api::labels::parse_selector;
//! # use futures::FutureExt;
//!
//! let store = MemoryStore::new();
//! let manager = DestinationRuleManager::new("rollout-1234", "api", "prod", 42, store.clone());
//!
//! let shift = Shift {
//!     port: 8080,
//!     hostname: "api.example.com".to_string(),
//!     selector: parse_selector("app=api").unwrap(),
//!     traffic: Traffic {
//!         pod_selector: parse_selector("version=42").unwrap(),
//!     },
//! };
//!
//! # async {
//! let shifted = manager.apply(&shift).await.unwrap();
//! assert_eq!(shifted.subset.name, "api-42-prod");
//! # }.now_or_never().unwrap();
//! ```

mod config;
mod destination_rule;
mod error;
mod route_list;
mod shift;
mod store;

#[cfg(feature = "kube")]
mod kube;

pub use crate::config::Config;
pub use crate::destination_rule::{DestinationRuleManager, Shifted};
pub use crate::error::{Error, Result};
pub use crate::route_list::{validate_destination_rule_list, IstioRouteList};
pub use crate::shift::{Shift, Traffic};
pub use crate::store::{MemoryStore, RoutingStore, StoreError};

#[cfg(feature = "kube")]
pub use crate::kube::KubeStore;
