use super::{destination_rule_resource, read_list, read_meta};
use crate::destination_rule::{DestinationRule, DestinationRuleSpec};
use crate::error::{Error, ErrorContext};

use kube::core::DynamicObject;

impl DestinationRule {
    /// Convert this rule into a [DynamicObject] that can be written with the
    /// `kube` crate.
    ///
    /// The resource version is copied over, so replacing an object read with
    /// [DestinationRule::from_dynamic_object] fails if it was modified in the
    /// meantime.
    pub fn to_dynamic_object(&self) -> DynamicObject {
        let mut obj = DynamicObject::new(&self.name, &destination_rule_resource())
            .within(&self.namespace)
            .data(serde_json::json!({ "spec": self.spec }));

        if !self.labels.is_empty() {
            obj.metadata.labels = Some(self.labels.clone());
        }
        obj.metadata.resource_version = self.resource_version.clone();

        obj
    }

    /// Read a DestinationRule from a [DynamicObject].
    pub fn from_dynamic_object(obj: &DynamicObject) -> Result<Self, Error> {
        let meta = read_meta(obj)?;

        let spec = match obj.data.get("spec") {
            Some(spec) => DestinationRuleSpec {
                host: read_host(spec).with_field("spec")?,
                subsets: read_list(spec, "subsets").with_field("spec")?,
            },
            None => DestinationRuleSpec::default(),
        };

        Ok(DestinationRule {
            name: meta.name,
            namespace: meta.namespace,
            labels: meta.labels,
            resource_version: meta.resource_version,
            spec,
        })
    }
}

fn read_host(spec: &serde_json::Value) -> Result<String, Error> {
    match spec.get("host") {
        None | Some(serde_json::Value::Null) => Ok(String::new()),
        Some(serde_json::Value::String(host)) => Ok(host.clone()),
        Some(_) => Err(Error::new_static("expected a string")).with_field("host"),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::destination_rule::Subset;
    use crate::labels::Labels;
    use serde_json::json;

    fn labels(pairs: &[(&str, &str)]) -> Labels {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn rule() -> DestinationRule {
        DestinationRule {
            name: "api-testing".to_string(),
            namespace: "arrow".to_string(),
            labels: labels(&[("app", "api-testing"), ("environment", "test")]),
            resource_version: Some("12".to_string()),
            spec: DestinationRuleSpec {
                host: "api-domain".to_string(),
                subsets: vec![Subset {
                    name: "api-testing-10000-arrow".to_string(),
                    labels: labels(&[("version", "1.2.3")]),
                }],
            },
        }
    }

    #[test]
    fn test_to_dynamic_object() {
        let obj = rule().to_dynamic_object();

        let types = obj.types.as_ref().unwrap();
        assert_eq!(types.api_version, "networking.istio.io/v1alpha3");
        assert_eq!(types.kind, "DestinationRule");

        assert_eq!(obj.metadata.name.as_deref(), Some("api-testing"));
        assert_eq!(obj.metadata.namespace.as_deref(), Some("arrow"));
        assert_eq!(obj.metadata.resource_version.as_deref(), Some("12"));
        assert_eq!(
            obj.data,
            json!({
                "spec": {
                    "host": "api-domain",
                    "subsets": [
                        {"name": "api-testing-10000-arrow", "labels": {"version": "1.2.3"}},
                    ],
                },
            })
        );
    }

    #[test]
    fn test_dynamic_object_roundtrip() {
        let rule = rule();
        assert_eq!(
            DestinationRule::from_dynamic_object(&rule.to_dynamic_object()).unwrap(),
            rule,
        );
    }

    #[test]
    fn test_from_dynamic_object_errors() {
        let mut obj = rule().to_dynamic_object();
        obj.metadata.namespace = None;
        assert_eq!(
            DestinationRule::from_dynamic_object(&obj)
                .unwrap_err()
                .to_string(),
            "metadata.namespace: missing namespace",
        );

        let mut obj = rule().to_dynamic_object();
        obj.data = json!({
            "spec": {
                "host": "api-domain",
                "subsets": [
                    {"name": "a", "labels": {"version": "1"}},
                    {"labels": {"version": "2"}},
                ],
            },
        });
        let err = DestinationRule::from_dynamic_object(&obj).unwrap_err();
        assert_eq!(err.path(), "spec.subsets[1]");

        let mut obj = rule().to_dynamic_object();
        obj.data = json!({"spec": {"host": 123}});
        assert_eq!(
            DestinationRule::from_dynamic_object(&obj)
                .unwrap_err()
                .to_string(),
            "spec.host: expected a string",
        );
    }
}
