use crate::store::{RoutingStore, StoreError};
use crate::{Config, Error, Result, Shift};
use canary_api::{DestinationRule, DestinationRuleSpec, Labels, Subset};
use std::borrow::Cow;
use tracing::{debug, info, warn, Instrument};

/// Manages the DestinationRule subset for one build of a service.
///
/// A manager is bound to the identity of a service build (its name, namespace
/// and build number) and to the [RoutingStore] the service's routing objects
/// live in. Every build gets a subset with a deterministic name,
/// `<name>-<build>-<namespace>`, so shifting the same build twice always
/// touches the same subset.
///
/// Managers hold no state between calls. Concurrent calls for the same service
/// are not serialized, the store's resource versions catch lost updates and
/// they're reported as [Error::Conflict].
#[derive(Clone, Debug)]
pub struct DestinationRuleManager<S> {
    /// An opaque id attached to logs for everything this manager does.
    pub tracking_id: String,

    pub name: String,

    pub namespace: String,

    /// The build number. Must be greater than zero.
    pub build: u32,

    pub store: Option<S>,

    pub config: Config,
}

/// The outcome of a successful create or apply.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Shifted {
    /// The DestinationRule as it was written to the store.
    pub destination_rule: DestinationRule,

    /// The subset for this build.
    pub subset: Subset,
}

impl<S: RoutingStore> DestinationRuleManager<S> {
    pub fn new(
        tracking_id: impl Into<String>,
        name: impl Into<String>,
        namespace: impl Into<String>,
        build: u32,
        store: S,
    ) -> Self {
        Self {
            tracking_id: tracking_id.into(),
            name: name.into(),
            namespace: namespace.into(),
            build,
            store: Some(store),
            config: Config::default(),
        }
    }

    pub fn with_config(self, config: Config) -> Self {
        Self { config, ..self }
    }

    /// The name of the subset for this build.
    pub fn subset_name(&self) -> String {
        Subset::name_for(&self.name, self.build, &self.namespace)
    }

    /// Check a shift against this manager's service identity.
    ///
    /// Checks run in a fixed order and the first failure is returned. Every
    /// failure is an [Error::InvalidRequest] naming the missing or out of
    /// range field.
    pub fn validate(&self, shift: &Shift) -> Result<()> {
        if shift.selector.is_empty() {
            return Err(Error::invalid_request("empty label-selector"));
        }
        if shift.port == 0 {
            return Err(Error::invalid_request("empty port"));
        }
        if !Shift::PORTS.contains(&shift.port) {
            return Err(Error::invalid_request("port not in range 1024 - 65535"));
        }
        if shift.traffic.pod_selector.is_empty() {
            return Err(Error::invalid_request("empty pod selector"));
        }

        self.validate_identity()
    }

    fn validate_identity(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::invalid_request("empty 'name' attribute"));
        }
        if self.namespace.is_empty() {
            return Err(Error::invalid_request("empty 'namespace' attribute"));
        }
        if self.build == 0 {
            return Err(Error::invalid_request("empty 'build' attribute"));
        }
        self.store()?;

        Ok(())
    }

    fn store(&self) -> Result<&S> {
        self.store
            .as_ref()
            .ok_or_else(|| Error::invalid_request("nil istioClient object"))
    }

    fn subset(&self, shift: &Shift) -> Subset {
        Subset {
            name: self.subset_name(),
            labels: shift.traffic.pod_selector.clone(),
        }
    }

    fn span(&self, operation: &'static str) -> tracing::Span {
        tracing::debug_span!(
            "destination_rule",
            operation,
            tracking_id = %self.tracking_id,
            name = %self.name,
            namespace = %self.namespace,
            build = self.build
        )
    }

    /// Create a DestinationRule for this service with this build's subset as
    /// its only subset.
    ///
    /// The rule is named after the service and labeled with the shift's
    /// selector. If the service already has a rule, this fails with an error
    /// where [Error::is_already_exists] is `true`, and the subset should be
    /// added with [update](Self::update) instead. See [apply](Self::apply).
    pub async fn create(&self, shift: &Shift) -> Result<Shifted> {
        self.validate(shift)?;
        self.create_rule(shift)
            .instrument(self.span("create"))
            .await
    }

    /// Add or replace this build's subset in the DestinationRule matching the
    /// shift's selector.
    ///
    /// Other subsets keep their order and the rule's own name and labels are
    /// left alone. Updating when no rule matches does nothing, unless the
    /// manager is configured with [Config::create_if_missing]. If more than
    /// one rule matches, this fails with a conflict instead of picking one.
    pub async fn update(&self, shift: &Shift) -> Result<()> {
        self.validate(shift)?;
        self.update_rule(shift)
            .instrument(self.span("update"))
            .await
    }

    /// Remove this build's subset from the DestinationRule matching the
    /// shift's selector, deleting the rule if no subsets are left.
    ///
    /// Clearing is idempotent. It's not an error if there's no matching rule
    /// or the rule doesn't have this build's subset. A shift with an empty
    /// selector clears nothing. A port and pod selector aren't needed to
    /// clear, but a port that's set must be in range.
    ///
    /// If the rule changes between reading it and removing the subset,
    /// nothing is written and this fails with a conflict.
    pub async fn clear(&self, shift: &Shift) -> Result<()> {
        if shift.selector.is_empty() {
            debug!(tracking_id = %self.tracking_id, "empty selector, nothing to clear");
            return Ok(());
        }
        if shift.port != 0 && !Shift::PORTS.contains(&shift.port) {
            return Err(Error::invalid_request("port not in range 1024 - 65535"));
        }
        self.validate_identity()?;

        self.clear_subset(&shift.selector)
            .instrument(self.span("clear"))
            .await
    }

    /// Create this service's DestinationRule, or add this build's subset to it
    /// if it already exists.
    ///
    /// Returns the rule as it was last written.
    pub async fn apply(&self, shift: &Shift) -> Result<Shifted> {
        self.validate(shift)?;
        self.apply_rule(shift)
            .instrument(self.span("apply"))
            .await
    }

    async fn create_rule(&self, shift: &Shift) -> Result<Shifted> {
        let store = self.store()?;
        let subset = self.subset(shift);

        let rule = DestinationRule {
            name: self.name.clone(),
            namespace: self.namespace.clone(),
            labels: shift.selector.clone(),
            resource_version: None,
            spec: DestinationRuleSpec {
                host: shift.hostname.clone(),
                subsets: vec![subset.clone()],
            },
        };

        let destination_rule = match store.create_destination_rule(&rule).await {
            Ok(rule) => rule,
            Err(e @ StoreError::AlreadyExists { .. }) => {
                debug!(destination_rule = %rule.name, "destination rule already exists");
                return Err(e.into());
            }
            Err(e) => return Err(store_error(e)),
        };

        info!(
            destination_rule = %destination_rule.name,
            subset = %subset.name,
            "created destination rule"
        );
        Ok(Shifted {
            destination_rule,
            subset,
        })
    }

    async fn update_rule(&self, shift: &Shift) -> Result<()> {
        if self.merge_subset(shift).await?.is_some() {
            return Ok(());
        }

        if self.config.create_if_missing {
            debug!("no destination rule matches selector, creating one");
            self.create_rule(shift).await?;
        } else {
            debug!("no destination rule matches selector, nothing to update");
        }
        Ok(())
    }

    async fn apply_rule(&self, shift: &Shift) -> Result<Shifted> {
        match self.create_rule(shift).await {
            Err(e) if e.is_already_exists() => {
                debug!("destination rule already exists, updating");
            }
            res => return res,
        }

        // the rule is named after the service, so finding nothing here means
        // someone else owns a rule with the same name.
        self.merge_subset(shift).await?.ok_or_else(|| {
            Error::conflict("destination rule exists but does not match selector")
        })
    }

    /// Find the one rule matching `selector`.
    async fn find_rule(&self, selector: &Labels) -> Result<Option<DestinationRule>> {
        let store = self.store()?;

        let mut rules = store
            .list_destination_rules(&self.namespace, selector)
            .await
            .map_err(store_error)?;

        match rules.len() {
            0 | 1 => Ok(rules.pop()),
            n => {
                warn!(matches = n, "multiple destination rules match selector");
                Err(Error::conflict("multiple destination rules match selector"))
            }
        }
    }

    /// Upsert this build's subset into the rule matching the shift's selector.
    /// Returns `None` if there was no rule to update.
    async fn merge_subset(&self, shift: &Shift) -> Result<Option<Shifted>> {
        let Some(mut rule) = self.find_rule(&shift.selector).await? else {
            return Ok(None);
        };

        let subset = self.subset(shift);
        if !rule.spec.upsert_subset(subset.clone()) {
            debug!(
                destination_rule = %rule.name,
                subset = %subset.name,
                "subset is up to date"
            );
            return Ok(Some(Shifted {
                destination_rule: rule,
                subset,
            }));
        }

        let destination_rule = self.write_rule(&rule).await?;
        info!(
            destination_rule = %destination_rule.name,
            subset = %subset.name,
            subsets = destination_rule.spec.subsets.len(),
            "updated destination rule"
        );
        Ok(Some(Shifted {
            destination_rule,
            subset,
        }))
    }

    async fn clear_subset(&self, selector: &Labels) -> Result<()> {
        let Some(mut rule) = self.find_rule(selector).await? else {
            debug!("no destination rule matches selector, nothing to clear");
            return Ok(());
        };

        let subset_name = self.subset_name();
        if rule.spec.remove_subset(&subset_name).is_none() {
            debug!(
                destination_rule = %rule.name,
                subset = %subset_name,
                "subset already cleared"
            );
            return Ok(());
        }

        if !rule.spec.subsets.is_empty() {
            self.write_rule(&rule).await?;
            info!(
                destination_rule = %rule.name,
                subset = %subset_name,
                "removed subset from destination rule"
            );
            return Ok(());
        }

        // delete at the version the rule was read at
        let store = self.store()?;
        match store.delete_destination_rule(&rule).await {
            Ok(()) | Err(StoreError::NotFound { .. }) => (),
            Err(e) => return Err(store_error(e)),
        }
        info!(
            destination_rule = %rule.name,
            subset = %subset_name,
            "deleted destination rule with no subsets left"
        );
        Ok(())
    }

    /// Write back a rule that was read from the store. If the rule changed or
    /// disappeared since it was read, that's a conflict.
    async fn write_rule(&self, rule: &DestinationRule) -> Result<DestinationRule> {
        let store = self.store()?;

        store
            .update_destination_rule(rule)
            .await
            .map_err(|e| match e {
                StoreError::NotFound { .. } => Error::Conflict(Cow::Owned(e.to_string())),
                e => store_error(e),
            })
    }
}

fn store_error(err: StoreError) -> Error {
    match err {
        StoreError::Conflict { .. } => Error::Conflict(Cow::Owned(err.to_string())),
        err => Error::Store(err),
    }
}
