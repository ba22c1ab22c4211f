//! Types and re-exports for converting canary types to Kubernetes objects.
//!
//! When the `kube` feature of this crate is active,
//! [DestinationRule](crate::destination_rule::DestinationRule)s and
//! [VirtualService](crate::virtual_service::VirtualService)s can be converted
//! to and from [`DynamicObject`]s for the `networking.istio.io` API group. To
//! help avoid dependency conflicts with different versions of
//! [`k8s-openapi`](https://crates.io/crates/k8s-openapi), this crate re-exports
//! its version of `k8s-openapi`.
//!
//! The `kube` feature picks the minimum supported
//! [`k8s-openapi` version feature](https://docs.rs/k8s-openapi/latest/k8s_openapi/#crate-features),
//! enable one of the `kube_v1_*` features to pick a newer one.

mod destination_rule;
mod virtual_service;

pub use k8s_openapi;

use crate::error::{Error, ErrorContext};
use kube::core::{ApiResource, DynamicObject, GroupVersionKind};

/// The Istio networking API group.
pub const ISTIO_NETWORKING_GROUP: &str = "networking.istio.io";

/// The version of the Istio networking API that objects are read and written
/// as.
pub const ISTIO_NETWORKING_VERSION: &str = "v1alpha3";

/// The [ApiResource] for Istio DestinationRules.
pub fn destination_rule_resource() -> ApiResource {
    let gvk = GroupVersionKind::gvk(
        ISTIO_NETWORKING_GROUP,
        ISTIO_NETWORKING_VERSION,
        "DestinationRule",
    );
    ApiResource::from_gvk_with_plural(&gvk, "destinationrules")
}

/// The [ApiResource] for Istio VirtualServices.
pub fn virtual_service_resource() -> ApiResource {
    let gvk = GroupVersionKind::gvk(
        ISTIO_NETWORKING_GROUP,
        ISTIO_NETWORKING_VERSION,
        "VirtualService",
    );
    ApiResource::from_gvk_with_plural(&gvk, "virtualservices")
}

/// The name, namespace, labels and resource version of an object.
struct Meta {
    name: String,
    namespace: String,
    labels: crate::labels::Labels,
    resource_version: Option<String>,
}

fn read_meta(obj: &DynamicObject) -> Result<Meta, Error> {
    let name = as_ref_or_else(&obj.metadata.name, "missing name").with_fields("metadata", "name")?;
    let namespace = as_ref_or_else(&obj.metadata.namespace, "missing namespace")
        .with_fields("metadata", "namespace")?;

    Ok(Meta {
        name: name.clone(),
        namespace: namespace.clone(),
        labels: obj.metadata.labels.clone().unwrap_or_default(),
        resource_version: obj.metadata.resource_version.clone(),
    })
}

/// Deserialize an optional list field of an object's spec, tagging errors
/// with the index of the item that failed.
fn read_list<T: serde::de::DeserializeOwned>(
    spec: &serde_json::Value,
    field: &'static str,
) -> Result<Vec<T>, Error> {
    match spec.get(field) {
        None | Some(serde_json::Value::Null) => Ok(Vec::new()),
        Some(serde_json::Value::Array(items)) => {
            let mut values = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                let value = T::deserialize(item)
                    .map_err(|e| Error::new(e.to_string()))
                    .with_field_index(field, i)?;
                values.push(value);
            }
            Ok(values)
        }
        Some(_) => Err(Error::new_static("expected a list")).with_field(field),
    }
}

#[inline]
fn as_ref_or_else<'a, T>(f: &'a Option<T>, message: &'static str) -> Result<&'a T, Error> {
    f.as_ref().ok_or_else(|| Error::new_static(message))
}
