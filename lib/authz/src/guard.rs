//! Resolver guards.
//!
//! A guard runs the policy predicate before the real resolver. Guards stack: a field
//! protected by several policies (a repeatable directive, or several registered
//! policy sets) carries one [`GuardedResolver`] holding every check in registration
//! order, so an earlier denial skips later predicates and the real resolver.

use std::{fmt, sync::Arc};

use serde_json::Value;
use tracing::{debug, warn, Instrument};

use graphql_authz_internal::spans::guard_span;

use crate::{
    context::RequestContext,
    error::{policy_error_message, GraphQLError, PolicyErrorKind},
    policy::{Policy, PolicyMap},
    resolver::{
        default_resolver, Args, FieldResolver, ResolveInfo, ResolveParams, Resolver,
        ResolverResult,
    },
    schema::{SchemaGraph, TypeRef},
};

/// Outcome of a predicate: `Ok(true)` allows, `Ok(false)` denies, `Err` denies with
/// that exact error.
pub type PolicyResult = Result<bool, GraphQLError>;

/// The caller-supplied authorization predicate.
#[async_trait::async_trait]
pub trait PolicyPredicate: Send + Sync + 'static {
    async fn apply_policy(
        &self,
        policy: &Policy,
        parent: &Value,
        args: &Args,
        context: &RequestContext,
        info: &ResolveInfo,
    ) -> PolicyResult;
}

pub type SharedPredicate = Arc<dyn PolicyPredicate>;

/// Replacement for the value of a denied field.
#[derive(Clone)]
pub enum ValueOverride {
    Literal(Value),
    /// Computed from the value the real resolver produces.
    Function(Arc<dyn Fn(&Value) -> Value + Send + Sync>),
}

impl ValueOverride {
    pub fn function(f: impl Fn(&Value) -> Value + Send + Sync + 'static) -> Self {
        ValueOverride::Function(Arc::new(f))
    }
}

impl fmt::Debug for ValueOverride {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueOverride::Literal(value) => f.debug_tuple("Literal").field(value).finish(),
            ValueOverride::Function(_) => f.write_str("Function"),
        }
    }
}

/// What a guard does when the predicate returns `false`.
#[derive(Debug, Clone)]
pub enum OnDeny {
    /// Fail the field with "Failed auth policy check on <name>".
    Error,
    /// Resolve the field to a replacement value instead of failing. `String` fields only.
    Replace(ValueOverride),
}

/// A single policy check.
#[derive(Clone)]
pub struct PolicyGuard {
    policy: Policy,
    predicate: SharedPredicate,
    on_deny: OnDeny,
    /// Name reported on denial. Falls back to the resolved field name.
    subject: Option<String>,
}

impl PolicyGuard {
    pub fn policy(&self) -> &Policy {
        &self.policy
    }
}

enum Verdict {
    Allow,
    Fail(GraphQLError),
    Replace(ValueOverride),
}

impl PolicyGuard {
    async fn check(&self, params: &ResolveParams) -> Verdict {
        let outcome = self
            .predicate
            .apply_policy(
                &self.policy,
                &params.parent,
                &params.args,
                &params.context,
                &params.info,
            )
            .await;

        match outcome {
            Ok(true) => Verdict::Allow,
            Ok(false) => {
                let subject = self.subject.as_deref().unwrap_or(&params.info.field_name);
                debug!(
                    parent_type = %params.info.parent_type,
                    field = %params.info.field_name,
                    "policy check denied access to {}",
                    subject
                );
                match &self.on_deny {
                    OnDeny::Error => Verdict::Fail(GraphQLError::from(policy_error_message(
                        PolicyErrorKind::PolicyCheckFailed,
                        subject,
                    ))),
                    OnDeny::Replace(value_override) => Verdict::Replace(value_override.clone()),
                }
            }
            Err(error) => Verdict::Fail(error),
        }
    }
}

/// A resolver protected by one or more policy checks.
#[derive(Clone)]
pub struct GuardedResolver {
    guards: Vec<PolicyGuard>,
    inner: Resolver,
}

impl GuardedResolver {
    pub fn len(&self) -> usize {
        self.guards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.guards.is_empty()
    }

    pub fn guards(&self) -> &[PolicyGuard] {
        &self.guards
    }

    /// The resolver that runs once every check passed.
    pub fn inner(&self) -> &Resolver {
        &self.inner
    }

    async fn replace(&self, value_override: ValueOverride, params: ResolveParams) -> ResolverResult {
        let field_name = params.info.field_name.clone();

        if !is_string_type(&params.info.return_type) {
            return Err(GraphQLError::from(policy_error_message(
                PolicyErrorKind::ReplacementNotSupported,
                &field_name,
            )));
        }

        let replacement = match value_override {
            ValueOverride::Literal(value) => value,
            ValueOverride::Function(f) => {
                let original = self.inner.resolve(params).await?;
                f(&original)
            }
        };

        if !replacement.is_string() {
            return Err(GraphQLError::from(policy_error_message(
                PolicyErrorKind::InvalidReplacementValue,
                &field_name,
            )));
        }

        Ok(replacement)
    }
}

/// `String` or `String!`. Lists are not replaceable.
fn is_string_type(ty: &TypeRef) -> bool {
    match ty {
        TypeRef::NonNull(inner) => is_string_type(inner),
        TypeRef::Named(name) => name == "String",
        TypeRef::List(_) => false,
    }
}

#[async_trait::async_trait]
impl FieldResolver for GuardedResolver {
    async fn resolve(&self, params: ResolveParams) -> ResolverResult {
        let span = guard_span(&params.info.parent_type, &params.info.field_name);

        async move {
            for guard in &self.guards {
                match guard.check(&params).await {
                    Verdict::Allow => continue,
                    Verdict::Fail(error) => return Err(error),
                    Verdict::Replace(value_override) => {
                        return self.replace(value_override, params).await
                    }
                }
            }
            self.inner.resolve(params).await
        }
        .instrument(span)
        .await
    }

    fn as_guarded(&self) -> Option<&GuardedResolver> {
        Some(self)
    }
}

fn stack_guards(original: Option<Resolver>, new_guards: Vec<PolicyGuard>) -> Resolver {
    let original = original.unwrap_or_else(default_resolver);

    let guarded = match original.as_guarded() {
        Some(existing) => {
            let mut guards = existing.guards.clone();
            guards.extend(new_guards);
            GuardedResolver {
                guards,
                inner: existing.inner.clone(),
            }
        }
        None => GuardedResolver {
            guards: new_guards,
            inner: original,
        },
    };

    Resolver::new(guarded)
}

fn guards_for(
    policy: &Policy,
    predicate: &SharedPredicate,
    on_deny: &OnDeny,
    subject: Option<&str>,
) -> Vec<PolicyGuard> {
    policy
        .units()
        .into_iter()
        .map(|policy| PolicyGuard {
            policy,
            predicate: predicate.clone(),
            on_deny: on_deny.clone(),
            subject: subject.map(str::to_string),
        })
        .collect()
}

/// Wraps a field resolver. `None` stands for the default property resolver.
///
/// When `original` is already guarded, the new checks run after the existing ones.
pub fn guard(
    policy: &Policy,
    predicate: SharedPredicate,
    original: Option<Resolver>,
    on_deny: OnDeny,
) -> Resolver {
    stack_guards(original, guards_for(policy, &predicate, &on_deny, None))
}

/// Returns the entity representation unchanged.
struct RepresentationResolver;

#[async_trait::async_trait]
impl FieldResolver for RepresentationResolver {
    async fn resolve(&self, params: ResolveParams) -> ResolverResult {
        Ok(params.parent)
    }
}

/// Wraps the reference resolver of `type_name`. Denials report the type name.
pub fn guard_reference(
    type_name: &str,
    policy: &Policy,
    predicate: SharedPredicate,
    original: Option<Resolver>,
) -> Resolver {
    let original = original.unwrap_or_else(|| Resolver::new(RepresentationResolver));
    stack_guards(
        Some(original),
        guards_for(policy, &predicate, &OnDeny::Error, Some(type_name)),
    )
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct GuardStats {
    pub guarded_fields: usize,
    pub guarded_references: usize,
}

/// Wraps every resolver governed by `policy_map`.
///
/// A type policy guards each field of the type and its reference resolver, ahead of
/// the field's own policy. Policies on unions, enums, scalars and input types have
/// no resolver to guard and only take part in introspection filtering.
pub fn guard_schema(
    schema: &mut SchemaGraph,
    policy_map: &PolicyMap,
    predicate: &SharedPredicate,
    on_deny: &OnDeny,
) -> GuardStats {
    let mut stats = GuardStats::default();

    for (type_name, policies) in policy_map.iter() {
        let Some(definition) = schema.get_type_mut(type_name) else {
            warn!(type_name = %type_name, "policy defined for a type missing from the schema");
            continue;
        };
        let Some(object) = definition.as_composite_mut() else {
            continue;
        };

        if let Some(type_policy) = &policies.type_policy {
            for field in object.fields.values_mut() {
                field.resolver = Some(guard(
                    type_policy,
                    predicate.clone(),
                    field.resolver.take(),
                    on_deny.clone(),
                ));
                stats.guarded_fields += 1;
            }
            object.reference_resolver = Some(guard_reference(
                type_name,
                type_policy,
                predicate.clone(),
                object.reference_resolver.take(),
            ));
            stats.guarded_references += 1;
        }

        for (field_name, policy) in &policies.fields {
            let Some(field) = object.fields.get_mut(field_name) else {
                warn!(
                    type_name = %type_name,
                    field_name = %field_name,
                    "policy defined for a field missing from the schema"
                );
                continue;
            };
            field.resolver = Some(guard(
                policy,
                predicate.clone(),
                field.resolver.take(),
                on_deny.clone(),
            ));
            stats.guarded_fields += 1;
        }
    }

    stats
}
