use crate::store::RoutingStore;
use crate::{Error, Result};
use canary_api::{DestinationRule, Labels, VirtualService};

/// A snapshot of the routing objects for a service, read from a store.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IstioRouteList {
    pub virtual_services: Vec<VirtualService>,
    pub destination_rules: Vec<DestinationRule>,
}

impl IstioRouteList {
    /// Read every VirtualService and DestinationRule in a namespace with labels
    /// matching `selector`.
    pub async fn fetch<S: RoutingStore>(
        store: &S,
        namespace: &str,
        selector: &Labels,
    ) -> Result<Self> {
        let virtual_services = store.list_virtual_services(namespace, selector).await?;
        let destination_rules = store.list_destination_rules(namespace, selector).await?;

        tracing::trace!(
            namespace,
            virtual_services = virtual_services.len(),
            destination_rules = destination_rules.len(),
            "fetched route list"
        );

        Ok(Self {
            virtual_services,
            destination_rules,
        })
    }
}

/// Check that a route list has DestinationRules.
///
/// Only the presence of rules is checked, not their contents.
pub fn validate_destination_rule_list(list: &IstioRouteList) -> Result<()> {
    if list.destination_rules.is_empty() {
        return Err(Error::InvalidState("empty destinationRules"));
    }

    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::store::MemoryStore;
    use futures::FutureExt;

    #[test]
    fn test_validate_destination_rule_list() {
        let list = IstioRouteList {
            virtual_services: vec![VirtualService::default()],
            destination_rules: vec![DestinationRule::default()],
        };
        assert!(validate_destination_rule_list(&list).is_ok());
    }

    #[test]
    fn test_validate_destination_rule_list_empty() {
        for virtual_services in [vec![], vec![VirtualService::default()]] {
            let list = IstioRouteList {
                virtual_services,
                destination_rules: vec![],
            };

            let err = validate_destination_rule_list(&list).unwrap_err();
            assert!(matches!(err, Error::InvalidState(_)), "{err:?}");
            assert_eq!(err.to_string(), "empty destinationRules");
        }
    }

    #[test]
    fn test_fetch() {
        let store = MemoryStore::new();
        let selector: Labels = [("app".to_string(), "api".to_string())]
            .into_iter()
            .collect();

        store.insert_virtual_service(VirtualService {
            name: "api".to_string(),
            namespace: "arrow".to_string(),
            labels: selector.clone(),
            ..Default::default()
        });
        store
            .create_destination_rule(&DestinationRule {
                name: "api".to_string(),
                namespace: "arrow".to_string(),
                labels: selector.clone(),
                ..Default::default()
            })
            .now_or_never()
            .unwrap()
            .unwrap();

        let list = IstioRouteList::fetch(&store, "arrow", &selector)
            .now_or_never()
            .unwrap()
            .unwrap();
        assert_eq!(list.virtual_services.len(), 1);
        assert_eq!(list.destination_rules.len(), 1);
        assert!(validate_destination_rule_list(&list).is_ok());

        let list = IstioRouteList::fetch(&store, "other", &selector)
            .now_or_never()
            .unwrap()
            .unwrap();
        assert_eq!(
            validate_destination_rule_list(&list)
                .unwrap_err()
                .to_string(),
            "empty destinationRules"
        );
    }
}
