//! Policy extraction.
//!
//! A [`PolicyMap`] indexes the policy governing each type and field. It is built
//! once per schema generation, either from directive annotations found on the
//! schema or from a table supplied by the caller.

use indexmap::IndexMap;
use serde_json::Value;
use tracing::debug;

use crate::{
    error::AuthzConfigError,
    schema::{DirectiveAnnotation, SchemaGraph, TypeDefinition},
};

/// Reserved key of the type-level slot in external policy tables.
pub const TYPE_POLICY_KEY: &str = "__typePolicy";

/// An authorization requirement. Opaque to this crate, interpreted by the predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum Policy {
    Directive(DirectiveAnnotation),
    /// Every application of a repeatable directive, in declaration order.
    Directives(Vec<DirectiveAnnotation>),
    External(Value),
}

impl Policy {
    /// Splits the policy into checks that are evaluated one after another.
    pub fn units(&self) -> Vec<Policy> {
        match self {
            Policy::Directives(directives) => directives
                .iter()
                .cloned()
                .map(Policy::Directive)
                .collect(),
            other => vec![other.clone()],
        }
    }

    pub fn as_directive(&self) -> Option<&DirectiveAnnotation> {
        match self {
            Policy::Directive(directive) => Some(directive),
            _ => None,
        }
    }

    pub fn as_external(&self) -> Option<&Value> {
        match self {
            Policy::External(value) => Some(value),
            _ => None,
        }
    }
}

/// Policies of a single type.
///
/// The type-level slot gates every field of the type and is always checked before
/// field-level policies.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TypePolicies {
    pub type_policy: Option<Policy>,
    pub fields: IndexMap<String, Policy>,
}

/// Type name to type/field policies. A missing entry means "unrestricted".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PolicyMap {
    types: IndexMap<String, TypePolicies>,
}

impl PolicyMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_type_policy(&mut self, type_name: impl Into<String>, policy: Policy) {
        self.types.entry(type_name.into()).or_default().type_policy = Some(policy);
    }

    pub fn set_field_policy(
        &mut self,
        type_name: impl Into<String>,
        field_name: impl Into<String>,
        policy: Policy,
    ) {
        self.types
            .entry(type_name.into())
            .or_default()
            .fields
            .insert(field_name.into(), policy);
    }

    pub fn type_policy(&self, type_name: &str) -> Option<&Policy> {
        self.types.get(type_name)?.type_policy.as_ref()
    }

    pub fn field_policy(&self, type_name: &str, field_name: &str) -> Option<&Policy> {
        self.types.get(type_name)?.fields.get(field_name)
    }

    pub fn get(&self, type_name: &str) -> Option<&TypePolicies> {
        self.types.get(type_name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &TypePolicies)> {
        self.types.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn type_policy_count(&self) -> usize {
        self.types
            .values()
            .filter(|policies| policies.type_policy.is_some())
            .count()
    }

    pub fn field_policy_count(&self) -> usize {
        self.types.values().map(|policies| policies.fields.len()).sum()
    }

    /// Validates and converts a caller-supplied table:
    ///
    /// ```json
    /// { "User": { "__typePolicy": { "requires": "user" }, "email": { "requires": "admin" } } }
    /// ```
    pub fn from_external(table: &Value) -> Result<Self, AuthzConfigError> {
        let Value::Object(types) = table else {
            return Err(AuthzConfigError::InvalidExternalPolicy(
                "expected an object keyed by type name".to_string(),
            ));
        };

        let mut policy_map = PolicyMap::new();

        for (type_name, entries) in types {
            let Value::Object(entries) = entries else {
                return Err(AuthzConfigError::InvalidExternalPolicy(format!(
                    "entry for type '{}' must be an object, put type-level policies under '{}'",
                    type_name, TYPE_POLICY_KEY
                )));
            };

            // The type slot goes in first so it precedes every field entry of the type.
            if let Some(type_policy) = entries.get(TYPE_POLICY_KEY) {
                if !type_policy.is_null() {
                    policy_map.set_type_policy(type_name, Policy::External(type_policy.clone()));
                }
            }

            for (field_name, policy) in entries {
                if field_name == TYPE_POLICY_KEY || policy.is_null() {
                    continue;
                }
                if field_name.starts_with("__") {
                    return Err(AuthzConfigError::InvalidExternalPolicy(format!(
                        "unknown reserved key '{}' on type '{}', type-level policies use '{}'",
                        field_name, type_name, TYPE_POLICY_KEY
                    )));
                }
                policy_map.set_field_policy(type_name, field_name, Policy::External(policy.clone()));
            }
        }

        Ok(policy_map)
    }
}

fn matching_policy(
    schema: &SchemaGraph,
    directives: &[DirectiveAnnotation],
    directive_name: &str,
) -> Option<Policy> {
    let mut matches = directives
        .iter()
        .filter(|directive| directive.name == directive_name);

    if !schema.is_repeatable_directive(directive_name) {
        return matches.next().cloned().map(Policy::Directive);
    }

    let mut all: Vec<DirectiveAnnotation> = matches.cloned().collect();
    match all.len() {
        0 => None,
        1 => all.pop().map(Policy::Directive),
        _ => Some(Policy::Directives(all)),
    }
}

/// Walks every type and field of the graph once and records the `@directive_name`
/// applications found on them.
pub fn extract(schema: &SchemaGraph, directive_name: &str) -> PolicyMap {
    let mut policy_map = PolicyMap::new();

    for (type_name, definition) in &schema.types {
        if let Some(policy) = matching_policy(schema, definition.directives(), directive_name) {
            policy_map.set_type_policy(type_name, policy);
        }

        match definition {
            TypeDefinition::Object(object) | TypeDefinition::Interface(object) => {
                for (field_name, field) in &object.fields {
                    if let Some(policy) = matching_policy(schema, &field.directives, directive_name)
                    {
                        policy_map.set_field_policy(type_name, field_name, policy);
                    }
                }
            }
            TypeDefinition::InputObject(input) => {
                for (field_name, field) in &input.fields {
                    if let Some(policy) = matching_policy(schema, &field.directives, directive_name)
                    {
                        policy_map.set_field_policy(type_name, field_name, policy);
                    }
                }
            }
            TypeDefinition::Scalar(_) | TypeDefinition::Union(_) | TypeDefinition::Enum(_) => {}
        }
    }

    debug!(
        directive = directive_name,
        type_policies = policy_map.type_policy_count(),
        field_policies = policy_map.field_policy_count(),
        "extracted policies from schema"
    );

    policy_map
}
