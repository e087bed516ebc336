use graphql_parser::schema::{self as ast, Definition, Text};
use indexmap::IndexMap;

use super::{
    ConstValue, DirectiveAnnotation, DirectiveDefinition, EnumType, EnumValue, FieldDefinition,
    InputObjectType, InputValue, ObjectType, ScalarType, SchemaGraph, TypeDefinition, TypeRef,
    UnionType,
};

#[derive(Debug, thiserror::Error)]
pub enum SchemaParseError {
    #[error("Failed to parse schema: {0}")]
    Syntax(#[from] ast::ParseError),
    #[error("Type '{0}' is defined more than once")]
    DuplicateType(String),
    #[error("Cannot extend '{0}': only object types defined earlier can be extended")]
    UnsupportedExtension(String),
}

impl SchemaGraph {
    /// Builds a graph from SDL. Resolvers are left unset.
    pub fn parse(sdl: &str) -> Result<Self, SchemaParseError> {
        let document = graphql_parser::parse_schema::<String>(sdl)?;
        Self::from_document(&document)
    }

    pub fn from_document<'a, T: Text<'a>>(
        document: &ast::Document<'a, T>,
    ) -> Result<Self, SchemaParseError> {
        let mut schema = SchemaGraph::new();
        let mut declared_roots = false;

        for definition in &document.definitions {
            match definition {
                Definition::SchemaDefinition(schema_def) => {
                    declared_roots = true;
                    schema.query_type = schema_def.query.as_ref().map(|n| n.as_ref().to_string());
                    schema.mutation_type =
                        schema_def.mutation.as_ref().map(|n| n.as_ref().to_string());
                    schema.subscription_type = schema_def
                        .subscription
                        .as_ref()
                        .map(|n| n.as_ref().to_string());
                }
                Definition::TypeDefinition(type_def) => {
                    let definition = convert_type_definition(type_def);
                    let name = definition.name().to_string();
                    let is_builtin_scalar = matches!(definition, TypeDefinition::Scalar(_))
                        && super::BUILTIN_SCALARS.contains(&name.as_str());
                    if schema.types.contains_key(&name) && !is_builtin_scalar {
                        return Err(SchemaParseError::DuplicateType(name));
                    }
                    schema.types.insert(name, definition);
                }
                Definition::TypeExtension(ast::TypeExtension::Object(extension)) => {
                    let name = extension.name.as_ref();
                    let Some(TypeDefinition::Object(object)) = schema.types.get_mut(name) else {
                        return Err(SchemaParseError::UnsupportedExtension(name.to_string()));
                    };
                    object.interfaces.extend(
                        extension
                            .implements_interfaces
                            .iter()
                            .map(|i| i.as_ref().to_string()),
                    );
                    object
                        .directives
                        .extend(extension.directives.iter().map(convert_directive));
                    for field in &extension.fields {
                        let field = convert_field(field);
                        object.fields.insert(field.name.clone(), field);
                    }
                }
                Definition::TypeExtension(extension) => {
                    return Err(SchemaParseError::UnsupportedExtension(
                        extension_name(extension).to_string(),
                    ));
                }
                Definition::DirectiveDefinition(directive) => {
                    let definition = DirectiveDefinition {
                        name: directive.name.as_ref().to_string(),
                        description: directive.description.clone(),
                        arguments: convert_input_values(&directive.arguments),
                        repeatable: directive.repeatable,
                        locations: directive
                            .locations
                            .iter()
                            .map(|location| location.as_str().to_string())
                            .collect(),
                    };
                    schema.directives.insert(definition.name.clone(), definition);
                }
            }
        }

        if !declared_roots {
            let default_root = |name: &str| {
                matches!(schema.types.get(name), Some(TypeDefinition::Object(_)))
                    .then(|| name.to_string())
            };
            let (query, mutation, subscription) = (
                default_root("Query"),
                default_root("Mutation"),
                default_root("Subscription"),
            );
            schema.query_type = query;
            schema.mutation_type = mutation;
            schema.subscription_type = subscription;
        }

        Ok(schema)
    }
}

fn extension_name<'b, 'a, T: Text<'a>>(extension: &'b ast::TypeExtension<'a, T>) -> &'b str {
    match extension {
        ast::TypeExtension::Scalar(e) => e.name.as_ref(),
        ast::TypeExtension::Object(e) => e.name.as_ref(),
        ast::TypeExtension::Interface(e) => e.name.as_ref(),
        ast::TypeExtension::Union(e) => e.name.as_ref(),
        ast::TypeExtension::Enum(e) => e.name.as_ref(),
        ast::TypeExtension::InputObject(e) => e.name.as_ref(),
    }
}

fn convert_type_definition<'a, T: Text<'a>>(
    type_def: &ast::TypeDefinition<'a, T>,
) -> TypeDefinition {
    match type_def {
        ast::TypeDefinition::Scalar(scalar) => TypeDefinition::Scalar(ScalarType {
            name: scalar.name.as_ref().to_string(),
            description: scalar.description.clone(),
            directives: scalar.directives.iter().map(convert_directive).collect(),
        }),
        ast::TypeDefinition::Object(object) => TypeDefinition::Object(ObjectType {
            name: object.name.as_ref().to_string(),
            description: object.description.clone(),
            interfaces: object
                .implements_interfaces
                .iter()
                .map(|i| i.as_ref().to_string())
                .collect(),
            fields: convert_fields(&object.fields),
            directives: object.directives.iter().map(convert_directive).collect(),
            reference_resolver: None,
        }),
        ast::TypeDefinition::Interface(interface) => TypeDefinition::Interface(ObjectType {
            name: interface.name.as_ref().to_string(),
            description: interface.description.clone(),
            interfaces: interface
                .implements_interfaces
                .iter()
                .map(|i| i.as_ref().to_string())
                .collect(),
            fields: convert_fields(&interface.fields),
            directives: interface.directives.iter().map(convert_directive).collect(),
            reference_resolver: None,
        }),
        ast::TypeDefinition::Union(union) => TypeDefinition::Union(UnionType {
            name: union.name.as_ref().to_string(),
            description: union.description.clone(),
            members: union.types.iter().map(|t| t.as_ref().to_string()).collect(),
            directives: union.directives.iter().map(convert_directive).collect(),
        }),
        ast::TypeDefinition::Enum(enum_type) => TypeDefinition::Enum(EnumType {
            name: enum_type.name.as_ref().to_string(),
            description: enum_type.description.clone(),
            values: enum_type
                .values
                .iter()
                .map(|value| EnumValue {
                    name: value.name.as_ref().to_string(),
                    description: value.description.clone(),
                    directives: value.directives.iter().map(convert_directive).collect(),
                })
                .collect(),
            directives: enum_type.directives.iter().map(convert_directive).collect(),
        }),
        ast::TypeDefinition::InputObject(input) => TypeDefinition::InputObject(InputObjectType {
            name: input.name.as_ref().to_string(),
            description: input.description.clone(),
            fields: convert_input_values(&input.fields),
            directives: input.directives.iter().map(convert_directive).collect(),
        }),
    }
}

fn convert_fields<'a, T: Text<'a>>(fields: &[ast::Field<'a, T>]) -> IndexMap<String, FieldDefinition> {
    fields
        .iter()
        .map(|field| {
            let field = convert_field(field);
            (field.name.clone(), field)
        })
        .collect()
}

fn convert_field<'a, T: Text<'a>>(field: &ast::Field<'a, T>) -> FieldDefinition {
    FieldDefinition {
        name: field.name.as_ref().to_string(),
        description: field.description.clone(),
        ty: convert_type(&field.field_type),
        arguments: convert_input_values(&field.arguments),
        directives: field.directives.iter().map(convert_directive).collect(),
        resolver: None,
    }
}

fn convert_input_values<'a, T: Text<'a>>(
    values: &[ast::InputValue<'a, T>],
) -> IndexMap<String, InputValue> {
    values
        .iter()
        .map(|value| {
            let input = InputValue {
                name: value.name.as_ref().to_string(),
                description: value.description.clone(),
                ty: convert_type(&value.value_type),
                default_value: value.default_value.as_ref().map(ConstValue::from),
                directives: value.directives.iter().map(convert_directive).collect(),
            };
            (input.name.clone(), input)
        })
        .collect()
}

fn convert_type<'a, T: Text<'a>>(ty: &ast::Type<'a, T>) -> TypeRef {
    match ty {
        ast::Type::NamedType(name) => TypeRef::Named(name.as_ref().to_string()),
        ast::Type::ListType(inner) => TypeRef::List(Box::new(convert_type(inner))),
        ast::Type::NonNullType(inner) => TypeRef::NonNull(Box::new(convert_type(inner))),
    }
}

fn convert_directive<'a, T: Text<'a>>(directive: &ast::Directive<'a, T>) -> DirectiveAnnotation {
    DirectiveAnnotation {
        name: directive.name.as_ref().to_string(),
        arguments: directive
            .arguments
            .iter()
            .map(|(name, value)| (name.as_ref().to_string(), ConstValue::from(value)))
            .collect(),
    }
}
