//! The schema graph authorization works on.
//!
//! Types are stored by name and reference each other by name, so cyclic type
//! references need no special handling anywhere in the crate.

mod printer;
mod sdl;
mod value;

use std::fmt;

use indexmap::IndexMap;

use crate::resolver::Resolver;

pub use sdl::SchemaParseError;
pub use value::ConstValue;

pub const BUILTIN_SCALARS: [&str; 5] = ["Int", "Float", "String", "Boolean", "ID"];

/// Entry point the execution engine uses for entity references.
pub const REFERENCE_RESOLVER_FIELD: &str = "__resolveReference";

pub fn is_introspection_type(name: &str) -> bool {
    name.starts_with("__")
}

/// A wrapped or named type reference, e.g. `[User!]!`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeRef {
    Named(String),
    List(Box<TypeRef>),
    NonNull(Box<TypeRef>),
}

impl TypeRef {
    pub fn named(name: impl Into<String>) -> Self {
        TypeRef::Named(name.into())
    }

    pub fn non_null(inner: TypeRef) -> Self {
        TypeRef::NonNull(Box::new(inner))
    }

    pub fn list(inner: TypeRef) -> Self {
        TypeRef::List(Box::new(inner))
    }

    /// The named type with all list and non-null wrappers stripped.
    pub fn named_type(&self) -> &str {
        match self {
            TypeRef::Named(name) => name,
            TypeRef::List(inner) | TypeRef::NonNull(inner) => inner.named_type(),
        }
    }

    pub fn is_non_null(&self) -> bool {
        matches!(self, TypeRef::NonNull(_))
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Named(name) => f.write_str(name),
            TypeRef::List(inner) => write!(f, "[{}]", inner),
            TypeRef::NonNull(inner) => write!(f, "{}!", inner),
        }
    }
}

/// A directive applied to a type or field, e.g. `@auth(requires: ADMIN)`.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectiveAnnotation {
    pub name: String,
    pub arguments: Vec<(String, ConstValue)>,
}

impl DirectiveAnnotation {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arguments: vec![],
        }
    }

    pub fn with_argument(mut self, name: impl Into<String>, value: ConstValue) -> Self {
        self.arguments.push((name.into(), value));
        self
    }

    pub fn argument(&self, name: &str) -> Option<&ConstValue> {
        self.arguments
            .iter()
            .find(|(arg_name, _)| arg_name == name)
            .map(|(_, value)| value)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DirectiveDefinition {
    pub name: String,
    pub description: Option<String>,
    pub arguments: IndexMap<String, InputValue>,
    pub repeatable: bool,
    pub locations: Vec<String>,
}

/// An argument or an input object field.
#[derive(Debug, Clone, PartialEq)]
pub struct InputValue {
    pub name: String,
    pub description: Option<String>,
    pub ty: TypeRef,
    pub default_value: Option<ConstValue>,
    pub directives: Vec<DirectiveAnnotation>,
}

impl InputValue {
    pub fn new(name: impl Into<String>, ty: TypeRef) -> Self {
        Self {
            name: name.into(),
            description: None,
            ty,
            default_value: None,
            directives: vec![],
        }
    }
}

#[derive(Debug, Clone)]
pub struct FieldDefinition {
    pub name: String,
    pub description: Option<String>,
    pub ty: TypeRef,
    pub arguments: IndexMap<String, InputValue>,
    pub directives: Vec<DirectiveAnnotation>,
    /// `None` means the execution engine reads the property named after the field.
    pub resolver: Option<Resolver>,
}

impl FieldDefinition {
    pub fn new(name: impl Into<String>, ty: TypeRef) -> Self {
        Self {
            name: name.into(),
            description: None,
            ty,
            arguments: IndexMap::new(),
            directives: vec![],
            resolver: None,
        }
    }

    pub fn with_resolver(mut self, resolver: Resolver) -> Self {
        self.resolver = Some(resolver);
        self
    }
}

#[derive(Debug, Clone)]
pub struct ScalarType {
    pub name: String,
    pub description: Option<String>,
    pub directives: Vec<DirectiveAnnotation>,
}

/// Shared shape of object and interface types.
#[derive(Debug, Clone)]
pub struct ObjectType {
    pub name: String,
    pub description: Option<String>,
    pub interfaces: Vec<String>,
    pub fields: IndexMap<String, FieldDefinition>,
    pub directives: Vec<DirectiveAnnotation>,
    /// Invoked when the type is reached through an entity reference.
    pub reference_resolver: Option<Resolver>,
}

impl ObjectType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            interfaces: vec![],
            fields: IndexMap::new(),
            directives: vec![],
            reference_resolver: None,
        }
    }

    pub fn with_field(mut self, field: FieldDefinition) -> Self {
        self.fields.insert(field.name.clone(), field);
        self
    }
}

pub type InterfaceType = ObjectType;

#[derive(Debug, Clone)]
pub struct UnionType {
    pub name: String,
    pub description: Option<String>,
    pub members: Vec<String>,
    pub directives: Vec<DirectiveAnnotation>,
}

#[derive(Debug, Clone)]
pub struct EnumValue {
    pub name: String,
    pub description: Option<String>,
    pub directives: Vec<DirectiveAnnotation>,
}

#[derive(Debug, Clone)]
pub struct EnumType {
    pub name: String,
    pub description: Option<String>,
    pub values: Vec<EnumValue>,
    pub directives: Vec<DirectiveAnnotation>,
}

#[derive(Debug, Clone)]
pub struct InputObjectType {
    pub name: String,
    pub description: Option<String>,
    pub fields: IndexMap<String, InputValue>,
    pub directives: Vec<DirectiveAnnotation>,
}

#[derive(Debug, Clone)]
pub enum TypeDefinition {
    Scalar(ScalarType),
    Object(ObjectType),
    Interface(InterfaceType),
    Union(UnionType),
    Enum(EnumType),
    InputObject(InputObjectType),
}

impl TypeDefinition {
    pub fn name(&self) -> &str {
        match self {
            TypeDefinition::Scalar(t) => &t.name,
            TypeDefinition::Object(t) | TypeDefinition::Interface(t) => &t.name,
            TypeDefinition::Union(t) => &t.name,
            TypeDefinition::Enum(t) => &t.name,
            TypeDefinition::InputObject(t) => &t.name,
        }
    }

    pub fn kind(&self) -> TypeKind {
        match self {
            TypeDefinition::Scalar(_) => TypeKind::Scalar,
            TypeDefinition::Object(_) => TypeKind::Object,
            TypeDefinition::Interface(_) => TypeKind::Interface,
            TypeDefinition::Union(_) => TypeKind::Union,
            TypeDefinition::Enum(_) => TypeKind::Enum,
            TypeDefinition::InputObject(_) => TypeKind::InputObject,
        }
    }

    pub fn directives(&self) -> &[DirectiveAnnotation] {
        match self {
            TypeDefinition::Scalar(t) => &t.directives,
            TypeDefinition::Object(t) | TypeDefinition::Interface(t) => &t.directives,
            TypeDefinition::Union(t) => &t.directives,
            TypeDefinition::Enum(t) => &t.directives,
            TypeDefinition::InputObject(t) => &t.directives,
        }
    }

    /// Fields of object and interface types.
    pub fn fields(&self) -> Option<&IndexMap<String, FieldDefinition>> {
        match self {
            TypeDefinition::Object(t) | TypeDefinition::Interface(t) => Some(&t.fields),
            _ => None,
        }
    }

    pub fn fields_mut(&mut self) -> Option<&mut IndexMap<String, FieldDefinition>> {
        match self {
            TypeDefinition::Object(t) | TypeDefinition::Interface(t) => Some(&mut t.fields),
            _ => None,
        }
    }

    /// Interfaces implemented by an object or interface type.
    pub fn interfaces(&self) -> &[String] {
        match self {
            TypeDefinition::Object(t) | TypeDefinition::Interface(t) => &t.interfaces,
            _ => &[],
        }
    }

    pub fn as_composite(&self) -> Option<&ObjectType> {
        match self {
            TypeDefinition::Object(t) | TypeDefinition::Interface(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_composite_mut(&mut self) -> Option<&mut ObjectType> {
        match self {
            TypeDefinition::Object(t) | TypeDefinition::Interface(t) => Some(t),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::AsRefStr)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum TypeKind {
    Scalar,
    Object,
    Interface,
    Union,
    Enum,
    InputObject,
}

#[derive(Debug, Clone, Default)]
pub struct SchemaGraph {
    pub query_type: Option<String>,
    pub mutation_type: Option<String>,
    pub subscription_type: Option<String>,
    pub types: IndexMap<String, TypeDefinition>,
    pub directives: IndexMap<String, DirectiveDefinition>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaValidationError {
    #[error("{owner} references unknown type '{type_name}'")]
    UnknownType { owner: String, type_name: String },
    #[error("Root type '{0}' is not an object type")]
    InvalidRootType(String),
    #[error("Union '{0}' has no member types")]
    EmptyUnion(String),
    #[error("Type '{owner}' implements '{interface}', which is not an interface")]
    NotAnInterface { owner: String, interface: String },
    #[error("Type '{owner}' implements '{interface}' but has no field '{field}'")]
    MissingInterfaceField {
        owner: String,
        interface: String,
        field: String,
    },
    #[error("Type '{owner}' implements '{interface}' and must also implement '{inherited}'")]
    MissingInheritedInterface {
        owner: String,
        interface: String,
        inherited: String,
    },
}

impl SchemaGraph {
    /// An empty graph holding only the built-in scalars.
    pub fn new() -> Self {
        let mut schema = SchemaGraph::default();
        for name in BUILTIN_SCALARS {
            schema.types.insert(
                name.to_string(),
                TypeDefinition::Scalar(ScalarType {
                    name: name.to_string(),
                    description: None,
                    directives: vec![],
                }),
            );
        }
        schema
    }

    pub fn get_type(&self, name: &str) -> Option<&TypeDefinition> {
        self.types.get(name)
    }

    pub fn get_type_mut(&mut self, name: &str) -> Option<&mut TypeDefinition> {
        self.types.get_mut(name)
    }

    pub fn insert_type(&mut self, definition: TypeDefinition) {
        self.types.insert(definition.name().to_string(), definition);
    }

    pub fn field(&self, type_name: &str, field_name: &str) -> Option<&FieldDefinition> {
        self.types.get(type_name)?.fields()?.get(field_name)
    }

    pub fn field_mut(&mut self, type_name: &str, field_name: &str) -> Option<&mut FieldDefinition> {
        self.types
            .get_mut(type_name)?
            .fields_mut()?
            .get_mut(field_name)
    }

    pub fn is_root_type(&self, name: &str) -> bool {
        [&self.query_type, &self.mutation_type, &self.subscription_type]
            .into_iter()
            .any(|root| root.as_deref() == Some(name))
    }

    pub fn is_repeatable_directive(&self, name: &str) -> bool {
        self.directives
            .get(name)
            .is_some_and(|definition| definition.repeatable)
    }

    /// Object types that are members of a union, or implement an interface.
    pub fn possible_types(&self, abstract_type: &str) -> Vec<&str> {
        match self.types.get(abstract_type) {
            Some(TypeDefinition::Union(union)) => {
                union.members.iter().map(String::as_str).collect()
            }
            Some(TypeDefinition::Interface(_)) => self
                .types
                .values()
                .filter(|definition| matches!(definition, TypeDefinition::Object(_)))
                .filter(|definition| {
                    definition
                        .interfaces()
                        .iter()
                        .any(|interface| interface == abstract_type)
                })
                .map(TypeDefinition::name)
                .collect(),
            _ => vec![],
        }
    }

    /// Checks that every reference resolves to a type of the graph and that
    /// implementations provide the fields of their interfaces.
    pub fn validate(&self) -> Result<(), Vec<SchemaValidationError>> {
        let mut errors = vec![];

        let mut check = |owner: String, type_name: &str| {
            if !self.types.contains_key(type_name) {
                errors.push(SchemaValidationError::UnknownType {
                    owner,
                    type_name: type_name.to_string(),
                });
            }
        };

        for definition in self.types.values() {
            match definition {
                TypeDefinition::Object(t) | TypeDefinition::Interface(t) => {
                    for field in t.fields.values() {
                        check(format!("{}.{}", t.name, field.name), field.ty.named_type());
                        for arg in field.arguments.values() {
                            check(
                                format!("{}.{}({}:)", t.name, field.name, arg.name),
                                arg.ty.named_type(),
                            );
                        }
                    }
                    for interface in &t.interfaces {
                        check(t.name.clone(), interface);
                    }
                }
                TypeDefinition::Union(u) => {
                    for member in &u.members {
                        check(u.name.clone(), member);
                    }
                }
                TypeDefinition::InputObject(i) => {
                    for field in i.fields.values() {
                        check(format!("{}.{}", i.name, field.name), field.ty.named_type());
                    }
                }
                TypeDefinition::Scalar(_) | TypeDefinition::Enum(_) => {}
            }
        }

        for directive in self.directives.values() {
            for arg in directive.arguments.values() {
                check(
                    format!("@{}({}:)", directive.name, arg.name),
                    arg.ty.named_type(),
                );
            }
        }

        for root in [&self.query_type, &self.mutation_type, &self.subscription_type]
            .into_iter()
            .flatten()
        {
            match self.types.get(root) {
                Some(TypeDefinition::Object(_)) => {}
                Some(_) => errors.push(SchemaValidationError::InvalidRootType(root.clone())),
                None => errors.push(SchemaValidationError::UnknownType {
                    owner: "schema".to_string(),
                    type_name: root.clone(),
                }),
            }
        }

        for definition in self.types.values() {
            if let TypeDefinition::Union(union) = definition {
                if union.members.is_empty() {
                    errors.push(SchemaValidationError::EmptyUnion(union.name.clone()));
                }
            }
            let Some(owner) = definition.as_composite() else {
                continue;
            };
            for interface_name in &owner.interfaces {
                let interface = match self.types.get(interface_name) {
                    Some(TypeDefinition::Interface(interface)) => interface,
                    Some(_) => {
                        errors.push(SchemaValidationError::NotAnInterface {
                            owner: owner.name.clone(),
                            interface: interface_name.clone(),
                        });
                        continue;
                    }
                    None => continue,
                };
                for field in interface.fields.keys() {
                    if !owner.fields.contains_key(field) {
                        errors.push(SchemaValidationError::MissingInterfaceField {
                            owner: owner.name.clone(),
                            interface: interface_name.clone(),
                            field: field.clone(),
                        });
                    }
                }
                for inherited in &interface.interfaces {
                    if !owner.interfaces.contains(inherited) {
                        errors.push(SchemaValidationError::MissingInheritedInterface {
                            owner: owner.name.clone(),
                            interface: interface_name.clone(),
                            inherited: inherited.clone(),
                        });
                    }
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
