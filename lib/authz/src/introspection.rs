//! Introspection filtering.
//!
//! For operations that look at the schema (`__schema` / `__type`), every policy
//! set registered with schema filtering runs its predicate once per policy entry
//! with synthetic inputs. Whatever is denied is hidden from the schema served to
//! that operation.

use std::{panic::AssertUnwindSafe, sync::Arc};

use ahash::HashSet;
use arc_swap::ArcSwap;
use futures::FutureExt;
use graphql_parser::query::{
    Definition, Document, OperationDefinition, Selection, SelectionSet, Text,
};
use serde_json::Value;
use tracing::{debug, trace, warn, Instrument};

use graphql_authz_internal::spans::IntrospectionFilterSpan;

use crate::{
    context::RequestContext,
    filter_map::FilterMap,
    guard::SharedPredicate,
    policy::{Policy, PolicyMap},
    prune::prune,
    resolver::{Args, ResolveInfo},
    schema::{SchemaGraph, TypeDefinition, TypeRef},
};

const INTROSPECTION_FIELDS: [&str; 2] = ["__schema", "__type"];

/// Whether any query operation of `document` selects `__schema` or `__type` at its
/// top level. Mutations and subscriptions are never considered.
pub fn is_introspection_operation<'a, T: Text<'a>>(document: &Document<'a, T>) -> bool {
    document.definitions.iter().any(|definition| match definition {
        Definition::Operation(OperationDefinition::Query(query)) => {
            selects_introspection(document, &query.selection_set, &mut HashSet::default())
        }
        Definition::Operation(OperationDefinition::SelectionSet(selection_set)) => {
            selects_introspection(document, selection_set, &mut HashSet::default())
        }
        Definition::Operation(_) | Definition::Fragment(_) => false,
    })
}

fn selects_introspection<'a, 'd, T: Text<'a>>(
    document: &'d Document<'a, T>,
    selection_set: &'d SelectionSet<'a, T>,
    visited_fragments: &mut HashSet<&'d str>,
) -> bool {
    selection_set.items.iter().any(|selection| match selection {
        Selection::Field(field) => INTROSPECTION_FIELDS.contains(&field.name.as_ref()),
        Selection::InlineFragment(fragment) => {
            selects_introspection(document, &fragment.selection_set, visited_fragments)
        }
        Selection::FragmentSpread(spread) => {
            let name = spread.fragment_name.as_ref();
            if !visited_fragments.insert(name) {
                return false;
            }
            document
                .definitions
                .iter()
                .find_map(|definition| match definition {
                    Definition::Fragment(fragment) if fragment.name.as_ref() == name => {
                        Some(fragment)
                    }
                    _ => None,
                })
                .is_some_and(|fragment| {
                    selects_introspection(document, &fragment.selection_set, visited_fragments)
                })
        }
    })
}

/// A policy set taking part in introspection filtering.
pub struct FilteredPolicySet {
    /// Swapped whenever the schema is reloaded.
    pub policy_map: Arc<ArcSwap<PolicyMap>>,
    pub predicate: SharedPredicate,
}

/// The schema chosen for the current operation, cached on the request context.
#[derive(Clone)]
struct OperationSchema(Arc<SchemaGraph>);

/// Evaluates every filtering policy set and prunes the schema accordingly.
#[derive(Default)]
pub struct IntrospectionFilter {
    policy_sets: Vec<FilteredPolicySet>,
}

impl IntrospectionFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, policy_set: FilteredPolicySet) {
        self.policy_sets.push(policy_set);
    }

    pub fn len(&self) -> usize {
        self.policy_sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policy_sets.is_empty()
    }

    /// Returns the schema to serve for this operation.
    ///
    /// Non-introspection operations get `schema` back as is. The decision is made
    /// once per operation and reused when called again with the same context.
    pub async fn apply<'a, T: Text<'a>>(
        &self,
        schema: &Arc<SchemaGraph>,
        document: &Document<'a, T>,
        context: &RequestContext,
    ) -> Arc<SchemaGraph> {
        if let Some(cached) = context.get_ref_entry::<OperationSchema>().get_ref() {
            return cached.0.clone();
        }

        let chosen = if is_introspection_operation(document) {
            debug!("introspection operation detected, evaluating policies");
            self.filtered_schema(schema, context).await
        } else {
            schema.clone()
        };

        context.insert(OperationSchema(chosen.clone()));
        chosen
    }

    async fn filtered_schema(
        &self,
        schema: &Arc<SchemaGraph>,
        context: &RequestContext,
    ) -> Arc<SchemaGraph> {
        let span = IntrospectionFilterSpan::new();
        span.record_policy_sets(self.policy_sets.len());

        async {
            let filter = self.filter_map(schema, context).await;
            span.record_denied(filter.disallowed_count());

            if filter.is_all_allowed() {
                debug!("every policy allowed, serving the original schema");
                return schema.clone();
            }

            Arc::new(prune(schema, &filter))
        }
        .instrument(span.span.clone())
        .await
    }

    /// Runs every policy of every filtering policy set, in registration order.
    pub async fn filter_map(&self, schema: &SchemaGraph, context: &RequestContext) -> FilterMap {
        let mut filter = FilterMap::new();

        for policy_set in &self.policy_sets {
            let policy_map = policy_set.policy_map.load_full();

            for (type_name, policies) in policy_map.iter() {
                if filter.is_type_disallowed(type_name) {
                    continue;
                }
                let Some(definition) = schema.get_type(type_name) else {
                    continue;
                };

                if let Some(type_policy) = &policies.type_policy {
                    let info = ResolveInfo::synthetic(
                        type_name.as_str(),
                        TypeRef::named(type_name.as_str()),
                        type_name.as_str(),
                    );
                    if !evaluate(&policy_set.predicate, type_policy, context, &info).await {
                        filter.disallow_type(type_name);
                        continue;
                    }
                }

                for (field_name, policy) in &policies.fields {
                    if !filter.is_field_allowed(type_name, field_name) {
                        continue;
                    }
                    let return_type = match definition {
                        TypeDefinition::InputObject(input) => {
                            input.fields.get(field_name).map(|field| field.ty.clone())
                        }
                        _ => schema
                            .field(type_name, field_name)
                            .map(|field| field.ty.clone()),
                    };
                    let Some(return_type) = return_type else {
                        continue;
                    };

                    let info = ResolveInfo::synthetic(
                        field_name.as_str(),
                        return_type,
                        type_name.as_str(),
                    );
                    let allowed = evaluate(&policy_set.predicate, policy, context, &info).await;
                    filter.set_field(type_name, field_name, allowed);
                }
            }
        }

        filter
    }
}

/// Runs the predicate with synthetic inputs. Errors and panics deny.
async fn evaluate(
    predicate: &SharedPredicate,
    policy: &Policy,
    context: &RequestContext,
    info: &ResolveInfo,
) -> bool {
    let parent = Value::Null;
    let args = Args::new();

    for unit in policy.units() {
        let outcome =
            AssertUnwindSafe(predicate.apply_policy(&unit, &parent, &args, context, info))
                .catch_unwind()
                .await;

        let allowed = match outcome {
            Ok(Ok(allowed)) => allowed,
            Ok(Err(error)) => {
                warn!(
                    parent_type = %info.parent_type,
                    field = %info.field_name,
                    error = %error,
                    "policy predicate failed during introspection, hiding the element"
                );
                false
            }
            Err(_) => {
                warn!(
                    parent_type = %info.parent_type,
                    field = %info.field_name,
                    "policy predicate panicked during introspection, hiding the element"
                );
                false
            }
        };

        trace!(
            parent_type = %info.parent_type,
            field = %info.field_name,
            allowed,
            "introspection policy evaluated"
        );
        if !allowed {
            return false;
        }
    }

    true
}
