//! Registration of policy sets and the request-scoped hooks.
//!
//! An [`AuthzRegistry`] belongs to a single application instance. Each call to
//! [`AuthzRegistry::register`] validates a policy set, builds its policy map and
//! guards the schema resolvers. The introspection hook is installed by the first
//! policy set that asks for schema filtering and shared by every later one.

use std::sync::Arc;

use arc_swap::ArcSwap;
use graphql_parser::query::{Document, Text};
use serde_json::{Map, Value};
use tracing::{debug, info};

use graphql_authz_config::{
    policy_set::{PolicyMode, PolicySetConfig},
    AuthzConfig,
};

use crate::{
    context::RequestContext,
    error::{AuthzConfigError, GraphQLError},
    guard::{guard_schema, GuardStats, OnDeny, PolicyPredicate, SharedPredicate, ValueOverride},
    introspection::{FilteredPolicySet, IntrospectionFilter},
    policy::{extract, PolicyMap},
    schema::SchemaGraph,
};

/// Computes the authorization context of a request. The returned object is merged
/// into the reserved auth slot of the [`RequestContext`].
#[async_trait::async_trait]
pub trait AuthContextBuilder: Send + Sync + 'static {
    async fn build(&self, context: &RequestContext) -> Result<Map<String, Value>, GraphQLError>;
}

#[derive(Debug, Clone)]
pub struct OutputPolicyErrors {
    /// `false` resolves denied fields to `value_override` instead of failing them.
    pub enabled: bool,
    pub value_override: Option<ValueOverride>,
}

impl Default for OutputPolicyErrors {
    fn default() -> Self {
        Self {
            enabled: true,
            value_override: None,
        }
    }
}

/// Options of a single policy set.
#[derive(Clone, Default)]
pub struct AuthzOptions {
    pub auth_directive: Option<String>,
    pub mode: PolicyMode,
    /// The policy table, required in external mode.
    pub policy: Option<Value>,
    pub apply_policy: Option<SharedPredicate>,
    pub auth_context: Option<Arc<dyn AuthContextBuilder>>,
    pub filter_schema: bool,
    pub output_policy_errors: OutputPolicyErrors,
}

impl AuthzOptions {
    /// Policies are read from `@<directive>` annotations.
    pub fn directive(directive: impl Into<String>, predicate: impl PolicyPredicate) -> Self {
        Self {
            auth_directive: Some(directive.into()),
            apply_policy: Some(Arc::new(predicate)),
            ..Default::default()
        }
    }

    /// Policies come from `policy`, keyed by type and field name.
    pub fn external(policy: Value, predicate: impl PolicyPredicate) -> Self {
        Self {
            mode: PolicyMode::External,
            policy: Some(policy),
            apply_policy: Some(Arc::new(predicate)),
            ..Default::default()
        }
    }

    /// Binds a configuration document to the code it cannot carry.
    pub fn from_config(config: &PolicySetConfig, predicate: SharedPredicate) -> Self {
        Self {
            auth_directive: config.auth_directive.clone(),
            mode: config.mode,
            policy: config.policy.clone(),
            apply_policy: Some(predicate),
            auth_context: None,
            filter_schema: config.filter_schema,
            output_policy_errors: OutputPolicyErrors {
                enabled: config.output_policy_errors.enabled,
                value_override: config
                    .output_policy_errors
                    .value_override
                    .clone()
                    .map(ValueOverride::Literal),
            },
        }
    }

    pub fn with_auth_context(mut self, builder: impl AuthContextBuilder) -> Self {
        self.auth_context = Some(Arc::new(builder));
        self
    }

    pub fn with_filter_schema(mut self, filter_schema: bool) -> Self {
        self.filter_schema = filter_schema;
        self
    }

    /// Switches denied fields from errors to `value_override`.
    pub fn with_value_override(mut self, value_override: ValueOverride) -> Self {
        self.output_policy_errors = OutputPolicyErrors {
            enabled: false,
            value_override: Some(value_override),
        };
        self
    }

    pub fn validate(&self) -> Result<ValidatedOptions, AuthzConfigError> {
        let predicate = self
            .apply_policy
            .clone()
            .ok_or(AuthzConfigError::MissingApplyPolicy)?;

        let source = match self.mode {
            PolicyMode::External => {
                if self.auth_directive.is_some() {
                    return Err(AuthzConfigError::DirectiveWithExternalMode);
                }
                let table = self
                    .policy
                    .as_ref()
                    .ok_or(AuthzConfigError::MissingExternalPolicy)?;
                PolicySource::External(PolicyMap::from_external(table)?)
            }
            PolicyMode::Directive => PolicySource::Directive(
                self.auth_directive
                    .clone()
                    .ok_or(AuthzConfigError::MissingAuthDirective)?,
            ),
        };

        let on_deny = if self.output_policy_errors.enabled {
            OnDeny::Error
        } else {
            match &self.output_policy_errors.value_override {
                None => return Err(AuthzConfigError::MissingValueOverride),
                Some(ValueOverride::Literal(value)) if !value.is_string() => {
                    return Err(AuthzConfigError::InvalidValueOverride)
                }
                Some(value_override) => OnDeny::Replace(value_override.clone()),
            }
        };

        Ok(ValidatedOptions {
            source,
            predicate,
            auth_context: self.auth_context.clone(),
            filter_schema: self.filter_schema,
            on_deny,
        })
    }
}

#[derive(Debug, Clone)]
pub enum PolicySource {
    Directive(String),
    External(PolicyMap),
}

impl PolicySource {
    fn policy_map(&self, schema: &SchemaGraph) -> PolicyMap {
        match self {
            PolicySource::Directive(directive) => extract(schema, directive),
            PolicySource::External(policy_map) => policy_map.clone(),
        }
    }
}

/// Options that passed validation.
pub struct ValidatedOptions {
    pub source: PolicySource,
    pub predicate: SharedPredicate,
    pub auth_context: Option<Arc<dyn AuthContextBuilder>>,
    pub filter_schema: bool,
    pub on_deny: OnDeny,
}

struct RegisteredPolicySet {
    options: ValidatedOptions,
    policy_map: Arc<ArcSwap<PolicyMap>>,
}

/// Policy sets registered against one application instance, in registration order.
#[derive(Default)]
pub struct AuthzRegistry {
    policy_sets: Vec<RegisteredPolicySet>,
    introspection_hook: Option<IntrospectionFilter>,
}

impl AuthzRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers every policy set of `config`, all sharing `predicate`.
    pub fn from_config(
        schema: &mut SchemaGraph,
        config: &AuthzConfig,
        predicate: SharedPredicate,
        auth_context: Option<Arc<dyn AuthContextBuilder>>,
    ) -> Result<Self, AuthzConfigError> {
        let mut registry = AuthzRegistry::new();
        for policy_set in &config.policy_sets {
            let mut options = AuthzOptions::from_config(policy_set, predicate.clone());
            options.auth_context = auth_context.clone();
            registry.register(schema, options)?;
        }
        Ok(registry)
    }

    /// Validates `options`, builds the policy map and guards the resolvers of `schema`.
    ///
    /// Must run while the schema is being built, before it serves requests.
    pub fn register(
        &mut self,
        schema: &mut SchemaGraph,
        options: AuthzOptions,
    ) -> Result<GuardStats, AuthzConfigError> {
        let options = options.validate()?;
        let policy_map = options.source.policy_map(schema);

        info!(
            type_policies = policy_map.type_policy_count(),
            field_policies = policy_map.field_policy_count(),
            filter_schema = options.filter_schema,
            "registering policy set #{}",
            self.policy_sets.len() + 1
        );

        let stats = guard_schema(schema, &policy_map, &options.predicate, &options.on_deny);
        let policy_map = Arc::new(ArcSwap::from_pointee(policy_map));

        if options.filter_schema {
            self.introspection_hook
                .get_or_insert_with(|| {
                    debug!("installing introspection filter hook");
                    IntrospectionFilter::new()
                })
                .add(FilteredPolicySet {
                    policy_map: policy_map.clone(),
                    predicate: options.predicate.clone(),
                });
        }

        self.policy_sets.push(RegisteredPolicySet {
            options,
            policy_map,
        });

        Ok(stats)
    }

    pub fn len(&self) -> usize {
        self.policy_sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policy_sets.is_empty()
    }

    pub fn has_introspection_hook(&self) -> bool {
        self.introspection_hook.is_some()
    }

    /// The current policy map of the policy set registered at `index`.
    pub fn policy_map(&self, index: usize) -> Option<Arc<PolicyMap>> {
        self.policy_sets
            .get(index)
            .map(|policy_set| policy_set.policy_map.load_full())
    }

    /// Runs once per operation, before execution. Context builders run in
    /// registration order and merge into the same auth slot.
    pub async fn on_request(&self, context: &RequestContext) -> Result<(), GraphQLError> {
        for policy_set in &self.policy_sets {
            if let Some(builder) = &policy_set.options.auth_context {
                let values = builder.build(context).await?;
                context.merge_auth(values);
            }
        }
        Ok(())
    }

    /// Picks the schema the operation is executed against. Must run after
    /// [`AuthzRegistry::on_request`].
    pub async fn on_operation<'a, T: Text<'a>>(
        &self,
        schema: &Arc<SchemaGraph>,
        document: &Document<'a, T>,
        context: &RequestContext,
    ) -> Arc<SchemaGraph> {
        match &self.introspection_hook {
            Some(hook) => hook.apply(schema, document, context).await,
            None => schema.clone(),
        }
    }

    /// Rebuilds every policy map against a replaced schema and guards its resolvers.
    ///
    /// Operations already running keep the maps they started with.
    pub fn reload(&self, schema: &mut SchemaGraph) -> GuardStats {
        let mut total = GuardStats::default();

        for policy_set in &self.policy_sets {
            let options = &policy_set.options;
            let policy_map = options.source.policy_map(schema);
            let stats = guard_schema(schema, &policy_map, &options.predicate, &options.on_deny);
            total.guarded_fields += stats.guarded_fields;
            total.guarded_references += stats.guarded_references;
            policy_set.policy_map.store(Arc::new(policy_map));
        }

        info!(
            policy_sets = self.policy_sets.len(),
            guarded_fields = total.guarded_fields,
            "policy sets reloaded"
        );
        total
    }
}
