use super::{read_list, read_meta};
use crate::error::{Error, ErrorContext};
use crate::virtual_service::{VirtualService, VirtualServiceSpec};

use kube::core::DynamicObject;

impl VirtualService {
    /// Read a VirtualService from a [DynamicObject].
    pub fn from_dynamic_object(obj: &DynamicObject) -> Result<Self, Error> {
        let meta = read_meta(obj)?;

        let spec = match obj.data.get("spec") {
            Some(spec) => VirtualServiceSpec {
                hosts: read_list(spec, "hosts").with_field("spec")?,
                http: read_list(spec, "http").with_field("spec")?,
            },
            None => VirtualServiceSpec::default(),
        };

        Ok(VirtualService {
            name: meta.name,
            namespace: meta.namespace,
            labels: meta.labels,
            resource_version: meta.resource_version,
            spec,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::kube::virtual_service_resource;
    use serde_json::json;

    #[test]
    fn test_from_dynamic_object() {
        let obj = DynamicObject::new("api-testing", &virtual_service_resource())
            .within("arrow")
            .data(json!({
                "spec": {
                    "hosts": ["api-domain"],
                    "http": [{
                        "route": [
                            {"destination": {"host": "api-testing", "subset": "api-testing-1-arrow"}, "weight": 100},
                        ],
                    }],
                },
            }));

        let vs = VirtualService::from_dynamic_object(&obj).unwrap();
        assert_eq!(vs.name, "api-testing");
        assert_eq!(vs.namespace, "arrow");
        assert_eq!(vs.spec.hosts, vec!["api-domain"]);
        assert_eq!(
            vs.spec.subsets().collect::<Vec<_>>(),
            vec!["api-testing-1-arrow"]
        );
    }

    #[test]
    fn test_from_dynamic_object_bad_route() {
        let obj = DynamicObject::new("api-testing", &virtual_service_resource())
            .within("arrow")
            .data(json!({
                "spec": {
                    "http": [{"route": "not-a-list"}],
                },
            }));

        let err = VirtualService::from_dynamic_object(&obj).unwrap_err();
        assert_eq!(err.path(), "spec.http[0]");
    }
}
