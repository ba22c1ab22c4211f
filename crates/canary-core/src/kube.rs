//! A [RoutingStore] backed by a Kubernetes API server.

use crate::store::{RoutingStore, StoreError, DESTINATION_RULE, VIRTUAL_SERVICE};
use canary_api::kube::{destination_rule_resource, virtual_service_resource};
use canary_api::{labels, DestinationRule, Labels, VirtualService};
use kube::api::{Api, DeleteParams, DynamicObject, ListParams, PostParams, Preconditions};
use kube::Client;

/// Reads and writes Istio routing objects with a [kube::Client].
///
/// Objects are read and written as `networking.istio.io/v1alpha3`. Updates
/// carry the resource version an object was read at, so the API server
/// rejects lost updates with a conflict.
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl KubeStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a store with a client inferred from the environment, either an
    /// in-cluster config or the local kubeconfig.
    pub async fn try_default() -> Result<Self, StoreError> {
        let client = Client::try_default()
            .await
            .map_err(|e| StoreError::Other(Box::new(e)))?;
        Ok(Self::new(client))
    }

    fn destination_rules(&self, namespace: &str) -> Api<DynamicObject> {
        Api::namespaced_with(self.client.clone(), namespace, &destination_rule_resource())
    }

    fn virtual_services(&self, namespace: &str) -> Api<DynamicObject> {
        Api::namespaced_with(self.client.clone(), namespace, &virtual_service_resource())
    }
}

fn list_params(selector: &Labels) -> ListParams {
    let params = ListParams::default();

    // an empty selector lists everything
    match labels::format_selector(selector) {
        Ok(selector) => params.labels(&selector),
        Err(_) => params,
    }
}

// a failed precondition comes back as a 409 Conflict
fn delete_params(rule: &DestinationRule) -> DeleteParams {
    let preconditions = rule.resource_version.as_ref().map(|version| Preconditions {
        resource_version: Some(version.clone()),
        uid: None,
    });

    DeleteParams {
        preconditions,
        ..Default::default()
    }
}

fn api_error(kind: &'static str, name: &str, err: kube::Error) -> StoreError {
    let name = name.to_string();
    match err {
        kube::Error::Api(ae) if ae.code == 404 => StoreError::NotFound { kind, name },
        kube::Error::Api(ae) if ae.code == 409 && ae.reason == "AlreadyExists" => {
            StoreError::AlreadyExists { kind, name }
        }
        kube::Error::Api(ae) if ae.code == 409 => StoreError::Conflict { kind, name },
        err => StoreError::Other(Box::new(err)),
    }
}

fn conversion_error(err: canary_api::Error) -> StoreError {
    StoreError::Other(Box::new(err))
}

impl RoutingStore for KubeStore {
    async fn list_destination_rules(
        &self,
        namespace: &str,
        selector: &Labels,
    ) -> Result<Vec<DestinationRule>, StoreError> {
        let objects = self
            .destination_rules(namespace)
            .list(&list_params(selector))
            .await
            .map_err(|e| api_error(DESTINATION_RULE, namespace, e))?;

        tracing::trace!(namespace, count = objects.items.len(), "listed destination rules");
        objects
            .items
            .iter()
            .map(DestinationRule::from_dynamic_object)
            .collect::<Result<_, _>>()
            .map_err(conversion_error)
    }

    async fn create_destination_rule(
        &self,
        rule: &DestinationRule,
    ) -> Result<DestinationRule, StoreError> {
        let obj = self
            .destination_rules(&rule.namespace)
            .create(&PostParams::default(), &rule.to_dynamic_object())
            .await
            .map_err(|e| api_error(DESTINATION_RULE, &rule.name, e))?;

        DestinationRule::from_dynamic_object(&obj).map_err(conversion_error)
    }

    async fn update_destination_rule(
        &self,
        rule: &DestinationRule,
    ) -> Result<DestinationRule, StoreError> {
        let obj = self
            .destination_rules(&rule.namespace)
            .replace(&rule.name, &PostParams::default(), &rule.to_dynamic_object())
            .await
            .map_err(|e| api_error(DESTINATION_RULE, &rule.name, e))?;

        DestinationRule::from_dynamic_object(&obj).map_err(conversion_error)
    }

    async fn delete_destination_rule(&self, rule: &DestinationRule) -> Result<(), StoreError> {
        self.destination_rules(&rule.namespace)
            .delete(&rule.name, &delete_params(rule))
            .await
            .map_err(|e| api_error(DESTINATION_RULE, &rule.name, e))?;

        Ok(())
    }

    async fn list_virtual_services(
        &self,
        namespace: &str,
        selector: &Labels,
    ) -> Result<Vec<VirtualService>, StoreError> {
        let objects = self
            .virtual_services(namespace)
            .list(&list_params(selector))
            .await
            .map_err(|e| api_error(VIRTUAL_SERVICE, namespace, e))?;

        objects
            .items
            .iter()
            .map(VirtualService::from_dynamic_object)
            .collect::<Result<_, _>>()
            .map_err(conversion_error)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use kube::error::ErrorResponse;

    fn api(code: u16, reason: &str) -> kube::Error {
        kube::Error::Api(ErrorResponse {
            status: "Failure".to_string(),
            message: "test".to_string(),
            reason: reason.to_string(),
            code,
        })
    }

    #[test]
    fn test_api_error() {
        assert!(matches!(
            api_error(DESTINATION_RULE, "api", api(404, "NotFound")),
            StoreError::NotFound { .. }
        ));
        assert!(matches!(
            api_error(DESTINATION_RULE, "api", api(409, "AlreadyExists")),
            StoreError::AlreadyExists { .. }
        ));
        assert!(matches!(
            api_error(DESTINATION_RULE, "api", api(409, "Conflict")),
            StoreError::Conflict { .. }
        ));
        assert!(matches!(
            api_error(DESTINATION_RULE, "api", api(500, "InternalError")),
            StoreError::Other(_)
        ));
    }

    #[test]
    fn test_list_params() {
        let selector: Labels = [
            ("environment".to_string(), "test".to_string()),
            ("app".to_string(), "api".to_string()),
        ]
        .into_iter()
        .collect();

        assert_eq!(
            list_params(&selector).label_selector.as_deref(),
            Some("app=api,environment=test")
        );
        assert_eq!(list_params(&Labels::new()).label_selector, None);
    }

    #[test]
    fn test_delete_params() {
        let mut rule = DestinationRule {
            name: "api".to_string(),
            namespace: "arrow".to_string(),
            ..Default::default()
        };
        assert!(delete_params(&rule).preconditions.is_none());

        rule.resource_version = Some("12".to_string());
        let preconditions = delete_params(&rule).preconditions.unwrap();
        assert_eq!(preconditions.resource_version.as_deref(), Some("12"));
        assert_eq!(preconditions.uid, None);
    }
}
