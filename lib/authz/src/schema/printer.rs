use std::fmt::{self, Write};

use indexmap::IndexMap;

use super::{
    DirectiveAnnotation, DirectiveDefinition, InputValue, SchemaGraph, TypeDefinition,
    BUILTIN_SCALARS,
};

impl fmt::Display for SchemaGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut blocks: Vec<String> = vec![];

        let has_custom_roots = [
            (&self.query_type, "Query"),
            (&self.mutation_type, "Mutation"),
            (&self.subscription_type, "Subscription"),
        ]
        .iter()
        .any(|(root, default)| root.as_deref().is_some_and(|name| name != *default));

        if has_custom_roots {
            let mut block = String::from("schema {\n");
            for (operation, root) in [
                ("query", &self.query_type),
                ("mutation", &self.mutation_type),
                ("subscription", &self.subscription_type),
            ] {
                if let Some(root) = root {
                    writeln!(block, "  {}: {}", operation, root)?;
                }
            }
            block.push('}');
            blocks.push(block);
        }

        for directive in self.directives.values() {
            blocks.push(print_directive_definition(directive)?);
        }

        for definition in self.types.values() {
            if let TypeDefinition::Scalar(scalar) = definition {
                if BUILTIN_SCALARS.contains(&scalar.name.as_str()) {
                    continue;
                }
            }
            blocks.push(print_type(definition)?);
        }

        f.write_str(&blocks.join("\n\n"))
    }
}

fn print_description(out: &mut String, description: &Option<String>, indent: &str) -> fmt::Result {
    if let Some(description) = description {
        writeln!(out, "{}{:?}", indent, description)?;
    }
    Ok(())
}

fn print_directives(out: &mut String, directives: &[DirectiveAnnotation]) -> fmt::Result {
    for directive in directives {
        write!(out, " @{}", directive.name)?;
        if !directive.arguments.is_empty() {
            out.push('(');
            for (i, (name, value)) in directive.arguments.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write!(out, "{}: {}", name, value)?;
            }
            out.push(')');
        }
    }
    Ok(())
}

fn print_input_value(out: &mut String, value: &InputValue) -> fmt::Result {
    write!(out, "{}: {}", value.name, value.ty)?;
    if let Some(default_value) = &value.default_value {
        write!(out, " = {}", default_value)?;
    }
    print_directives(out, &value.directives)
}

fn print_arguments(out: &mut String, arguments: &IndexMap<String, InputValue>) -> fmt::Result {
    if arguments.is_empty() {
        return Ok(());
    }
    out.push('(');
    for (i, argument) in arguments.values().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        print_input_value(out, argument)?;
    }
    out.push(')');
    Ok(())
}

fn print_directive_definition(directive: &DirectiveDefinition) -> Result<String, fmt::Error> {
    let mut out = String::new();
    print_description(&mut out, &directive.description, "")?;
    write!(out, "directive @{}", directive.name)?;
    print_arguments(&mut out, &directive.arguments)?;
    if directive.repeatable {
        out.push_str(" repeatable");
    }
    write!(out, " on {}", directive.locations.join(" | "))?;
    Ok(out)
}

fn print_type(definition: &TypeDefinition) -> Result<String, fmt::Error> {
    let mut out = String::new();

    match definition {
        TypeDefinition::Scalar(scalar) => {
            print_description(&mut out, &scalar.description, "")?;
            write!(out, "scalar {}", scalar.name)?;
            print_directives(&mut out, &scalar.directives)?;
        }
        TypeDefinition::Object(object) | TypeDefinition::Interface(object) => {
            print_description(&mut out, &object.description, "")?;
            let keyword = if matches!(definition, TypeDefinition::Object(_)) {
                "type"
            } else {
                "interface"
            };
            write!(out, "{} {}", keyword, object.name)?;
            if !object.interfaces.is_empty() {
                write!(out, " implements {}", object.interfaces.join(" & "))?;
            }
            print_directives(&mut out, &object.directives)?;
            if !object.fields.is_empty() {
                out.push_str(" {\n");
                for field in object.fields.values() {
                    print_description(&mut out, &field.description, "  ")?;
                    write!(out, "  {}", field.name)?;
                    print_arguments(&mut out, &field.arguments)?;
                    write!(out, ": {}", field.ty)?;
                    print_directives(&mut out, &field.directives)?;
                    out.push('\n');
                }
                out.push('}');
            }
        }
        TypeDefinition::Union(union) => {
            print_description(&mut out, &union.description, "")?;
            write!(out, "union {}", union.name)?;
            print_directives(&mut out, &union.directives)?;
            if !union.members.is_empty() {
                write!(out, " = {}", union.members.join(" | "))?;
            }
        }
        TypeDefinition::Enum(enum_type) => {
            print_description(&mut out, &enum_type.description, "")?;
            write!(out, "enum {}", enum_type.name)?;
            print_directives(&mut out, &enum_type.directives)?;
            out.push_str(" {\n");
            for value in &enum_type.values {
                print_description(&mut out, &value.description, "  ")?;
                write!(out, "  {}", value.name)?;
                print_directives(&mut out, &value.directives)?;
                out.push('\n');
            }
            out.push('}');
        }
        TypeDefinition::InputObject(input) => {
            print_description(&mut out, &input.description, "")?;
            write!(out, "input {}", input.name)?;
            print_directives(&mut out, &input.directives)?;
            if !input.fields.is_empty() {
                out.push_str(" {\n");
                for field in input.fields.values() {
                    print_description(&mut out, &field.description, "  ")?;
                    out.push_str("  ");
                    print_input_value(&mut out, field)?;
                    out.push('\n');
                }
                out.push('}');
            }
        }
    }

    Ok(out)
}
