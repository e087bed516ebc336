//! Schema pruning.
//!
//! Produces a standalone copy of a schema without the types and fields a
//! [`FilterMap`] hides. Types are referenced by name, so cyclic references need no
//! special treatment: the allowed set is computed first, then every surviving
//! definition is rebuilt against it.
//!
//! Rebuilt objects only declare interfaces whose visible fields they still provide,
//! and directive applications are dropped together with their definitions.

use ahash::HashSet;
use indexmap::IndexMap;
use tracing::debug;

use graphql_authz_internal::spans::PruneSpan;

use crate::{
    filter_map::FilterMap,
    schema::{
        is_introspection_type, DirectiveAnnotation, DirectiveDefinition, EnumType, EnumValue, FieldDefinition,
        InputObjectType, InputValue, ObjectType, ScalarType, SchemaGraph, TypeDefinition,
        UnionType, BUILTIN_SCALARS,
    },
};

pub(crate) struct SchemaPruner<'a> {
    schema: &'a SchemaGraph,
    filter: FilterMap,
    allowed: HashSet<&'a str>,
    removed_directives: HashSet<&'a str>,
}

impl<'a> SchemaPruner<'a> {
    /// Returns the pruned copy of `schema`. The input is left untouched.
    pub fn prune(schema: &'a SchemaGraph, filter: &FilterMap) -> SchemaGraph {
        let span = PruneSpan::new(schema.types.len());
        let _guard = span.enter();

        let mut pruner = SchemaPruner {
            schema,
            filter: normalize(schema, filter),
            allowed: HashSet::default(),
            removed_directives: HashSet::default(),
        };
        pruner.collect_allowed();
        pruner.remove_structurally_invalid();
        pruner.collect_removed_directives();

        let pruned = pruner.build();
        span.record_kept(pruned.types.len());
        debug!(
            types = schema.types.len(),
            kept = pruned.types.len(),
            "schema pruned"
        );

        pruned
    }

    fn is_protected_root(&self, name: &str) -> bool {
        [&self.schema.query_type, &self.schema.mutation_type]
            .into_iter()
            .any(|root| root.as_deref() == Some(name))
    }

    fn is_subscription_root(&self, name: &str) -> bool {
        self.schema.subscription_type.as_deref() == Some(name)
    }

    fn is_kept_root(&self, name: &str) -> bool {
        self.is_protected_root(name) || self.is_subscription_root(name)
    }

    fn collect_allowed(&mut self) {
        let schema = self.schema;

        for (name, definition) in &schema.types {
            let name = name.as_str();
            if self.is_kept_root(name) || BUILTIN_SCALARS.contains(&name) {
                self.allowed.insert(name);
                continue;
            }
            if is_introspection_type(name) || self.filter.is_type_disallowed(name) {
                continue;
            }
            let implements_disallowed = definition
                .interfaces()
                .iter()
                .any(|interface| self.filter.is_type_disallowed(interface));
            if implements_disallowed {
                continue;
            }
            self.allowed.insert(name);
        }
    }

    /// Removes types that would be left empty or dangling, until nothing changes.
    fn remove_structurally_invalid(&mut self) {
        loop {
            let schema = self.schema;
            let invalid: Vec<&'a str> = schema
                .types
                .iter()
                .filter(|(name, _)| self.allowed.contains(name.as_str()))
                .filter(|(name, _)| !self.is_kept_root(name))
                .filter(|(_, definition)| match definition {
                    TypeDefinition::Object(object) | TypeDefinition::Interface(object) => {
                        self.visible_fields(object).next().is_none()
                    }
                    TypeDefinition::Union(union) => self.visible_members(union).next().is_none(),
                    TypeDefinition::InputObject(input) => input
                        .fields
                        .values()
                        .any(|field| !self.is_allowed(field.ty.named_type())),
                    TypeDefinition::Scalar(_) | TypeDefinition::Enum(_) => false,
                })
                .map(|(name, _)| name.as_str())
                .collect();

            if invalid.is_empty() {
                break;
            }
            for name in invalid {
                debug!(type_name = name, "removing type left without visible members");
                self.allowed.remove(name);
            }
        }
    }

    /// Directive definitions with an argument of a removed type.
    fn collect_removed_directives(&mut self) {
        let schema = self.schema;
        self.removed_directives = schema
            .directives
            .iter()
            .filter(|(_, directive)| {
                directive
                    .arguments
                    .values()
                    .any(|argument| !self.is_allowed(argument.ty.named_type()))
            })
            .map(|(name, _)| name.as_str())
            .collect();
    }

    fn is_allowed(&self, type_name: &str) -> bool {
        self.allowed.contains(type_name)
    }

    fn visible_fields<'b>(
        &'b self,
        object: &'b ObjectType,
    ) -> impl Iterator<Item = &'b FieldDefinition> + 'b {
        let filtered = !self.is_subscription_root(&object.name);
        let hidden_root = self.is_protected_root(&object.name)
            && self.filter.is_type_disallowed(&object.name);

        object.fields.values().filter(move |field| {
            !hidden_root
                && (!filtered || self.filter.is_field_allowed(&object.name, &field.name))
                && self.is_allowed(field.ty.named_type())
        })
    }

    fn visible_members<'b>(&'b self, union: &'b UnionType) -> impl Iterator<Item = &'b String> + 'b {
        union
            .members
            .iter()
            .filter(move |member| self.is_allowed(member))
    }

    fn visible_arguments(&self, arguments: &IndexMap<String, InputValue>) -> IndexMap<String, InputValue> {
        arguments
            .iter()
            .filter(|(_, argument)| self.is_allowed(argument.ty.named_type()))
            .map(|(name, argument)| (name.clone(), self.rebuild_input_value(argument)))
            .collect()
    }

    fn kept_directives(&self, directives: &[DirectiveAnnotation]) -> Vec<DirectiveAnnotation> {
        directives
            .iter()
            .filter(|directive| !self.removed_directives.contains(directive.name.as_str()))
            .cloned()
            .collect()
    }

    fn rebuild_input_value(&self, value: &InputValue) -> InputValue {
        InputValue {
            directives: self.kept_directives(&value.directives),
            ..value.clone()
        }
    }

    /// Interfaces `object` still implements once hidden fields are gone.
    fn kept_interfaces(&self, object: &ObjectType) -> Vec<String> {
        self.kept_interfaces_of(object, &mut vec![])
    }

    fn kept_interfaces_of<'b>(
        &'b self,
        object: &'b ObjectType,
        visiting: &mut Vec<&'b str>,
    ) -> Vec<String> {
        visiting.push(&object.name);

        let provided: HashSet<&str> = self
            .visible_fields(object)
            .map(|field| field.name.as_str())
            .collect();
        let mut kept: Vec<String> = object
            .interfaces
            .iter()
            .filter(|name| self.is_allowed(name) && !visiting.contains(&name.as_str()))
            .filter(|name| match self.schema.get_type(name) {
                Some(TypeDefinition::Interface(interface)) => self
                    .visible_fields(interface)
                    .all(|field| provided.contains(field.name.as_str())),
                _ => false,
            })
            .cloned()
            .collect();

        // an interface also requires everything it implements
        loop {
            let before = kept.clone();
            kept.retain(|name| match self.schema.get_type(name) {
                Some(TypeDefinition::Interface(interface)) => self
                    .kept_interfaces_of(interface, visiting)
                    .iter()
                    .all(|inherited| before.contains(inherited)),
                _ => false,
            });
            if kept.len() == before.len() {
                break;
            }
        }

        visiting.pop();
        kept
    }

    fn rebuild_object(&self, object: &ObjectType) -> ObjectType {
        let interfaces = self.kept_interfaces(object);
        if interfaces.len() != object.interfaces.len() {
            debug!(
                type_name = %object.name,
                dropped = object.interfaces.len() - interfaces.len(),
                "interfaces no longer satisfied after pruning"
            );
        }

        ObjectType {
            name: object.name.clone(),
            description: object.description.clone(),
            interfaces,
            fields: self
                .visible_fields(object)
                .map(|field| {
                    let rebuilt = FieldDefinition {
                        arguments: self.visible_arguments(&field.arguments),
                        directives: self.kept_directives(&field.directives),
                        ..field.clone()
                    };
                    (field.name.clone(), rebuilt)
                })
                .collect(),
            directives: self.kept_directives(&object.directives),
            reference_resolver: object.reference_resolver.clone(),
        }
    }

    fn rebuild(&self, definition: &TypeDefinition) -> TypeDefinition {
        match definition {
            TypeDefinition::Object(object) => TypeDefinition::Object(self.rebuild_object(object)),
            TypeDefinition::Interface(interface) => {
                TypeDefinition::Interface(self.rebuild_object(interface))
            }
            TypeDefinition::Union(union) => TypeDefinition::Union(UnionType {
                members: self.visible_members(union).cloned().collect(),
                directives: self.kept_directives(&union.directives),
                ..union.clone()
            }),
            TypeDefinition::InputObject(input) => TypeDefinition::InputObject(InputObjectType {
                fields: input
                    .fields
                    .iter()
                    .map(|(name, field)| (name.clone(), self.rebuild_input_value(field)))
                    .collect(),
                directives: self.kept_directives(&input.directives),
                ..input.clone()
            }),
            TypeDefinition::Enum(enum_type) => TypeDefinition::Enum(EnumType {
                values: enum_type
                    .values
                    .iter()
                    .map(|value| EnumValue {
                        directives: self.kept_directives(&value.directives),
                        ..value.clone()
                    })
                    .collect(),
                directives: self.kept_directives(&enum_type.directives),
                ..enum_type.clone()
            }),
            TypeDefinition::Scalar(scalar) => TypeDefinition::Scalar(ScalarType {
                directives: self.kept_directives(&scalar.directives),
                ..scalar.clone()
            }),
        }
    }

    fn build(&self) -> SchemaGraph {
        let types: IndexMap<String, TypeDefinition> = self
            .schema
            .types
            .iter()
            .filter(|(name, _)| self.is_allowed(name))
            .map(|(name, definition)| (name.clone(), self.rebuild(definition)))
            .collect();

        let directives = self
            .schema
            .directives
            .iter()
            .filter(|(name, _)| !self.removed_directives.contains(name.as_str()))
            .map(|(name, directive)| {
                let rebuilt = DirectiveDefinition {
                    arguments: self.visible_arguments(&directive.arguments),
                    ..directive.clone()
                };
                (name.clone(), rebuilt)
            })
            .collect();

        let root = |root: &Option<String>| root.clone().filter(|name| types.contains_key(name));

        SchemaGraph {
            query_type: root(&self.schema.query_type),
            mutation_type: root(&self.schema.mutation_type),
            subscription_type: root(&self.schema.subscription_type),
            directives,
            types,
        }
    }
}

/// Spreads union denials to members and input field denials to the whole input.
fn normalize(schema: &SchemaGraph, filter: &FilterMap) -> FilterMap {
    let mut normalized = filter.clone();

    for definition in schema.types.values() {
        match definition {
            TypeDefinition::Union(union) if filter.is_type_disallowed(&union.name) => {
                for member in &union.members {
                    normalized.disallow_type(member);
                }
            }
            TypeDefinition::InputObject(input) if filter.has_disallowed_field(&input.name) => {
                normalized.disallow_type(&input.name);
            }
            _ => {}
        }
    }

    normalized
}

/// Builds a copy of `schema` holding only what `filter` allows.
///
/// Query and Mutation roots are always kept, possibly without fields. The
/// Subscription root is not filtered, only stripped of references to removed types.
pub fn prune(schema: &SchemaGraph, filter: &FilterMap) -> SchemaGraph {
    SchemaPruner::prune(schema, filter)
}
