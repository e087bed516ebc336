#[cfg(test)]
mod policy_sets_e2e_tests {
    use std::sync::Arc;

    use graphql_authz::{
        config::parse_yaml_config, AuthzConfigError, AuthzOptions, AuthzRegistry, SchemaGraph,
    };
    use serde_json::json;

    use crate::testkit::{arithmetic, echo, RequiresUserHeader, TestHost};

    const CALCULATOR: &str = r#"
        type Query {
          add(x: Int, y: Int): Int
          subtract(x: Int, y: Int): Int
        }
    "#;

    #[tokio::test]
    async fn external_policies_guard_fields() {
        let host = TestHost::builder(CALCULATOR)
            .resolver("Query", "add", arithmetic(|x, y| x + y))
            .resolver("Query", "subtract", arithmetic(|x, y| x - y))
            .register(
                AuthzOptions::external(json!({ "Query": { "add": "admin" } }), RequiresUserHeader)
                    .with_filter_schema(true),
            )
            .build();

        let response = host
            .execute("{ add(x: 2, y: 2) subtract(x: 3, y: 3) }", &[("x-user", "user")])
            .await;
        assert_eq!(
            response,
            json!({
                "data": { "add": null, "subtract": 0 },
                "errors": [{ "message": "Failed auth policy check on add", "path": ["add"] }]
            })
        );

        let response = host
            .execute(
                r#"{ __type(name: "Query") { fields { name } } }"#,
                &[("x-user", "user")],
            )
            .await;
        assert_eq!(
            response,
            json!({ "data": { "__type": { "fields": [{ "name": "subtract" }] } } })
        );
    }

    #[tokio::test]
    async fn external_type_policies_use_the_reserved_key() {
        let sdl = r#"
            type Secret { value: String }
            type Query { secret: Secret }
        "#;
        let host = TestHost::builder(sdl)
            .resolver(
                "Query",
                "secret",
                crate::testkit::constant(json!({ "value": "42" })),
            )
            .register(AuthzOptions::external(
                json!({ "Secret": { "__typePolicy": "admin" } }),
                RequiresUserHeader,
            ))
            .build();

        let response = host
            .execute("{ secret { value } }", &[("x-user", "user")])
            .await;
        assert_eq!(
            response,
            json!({
                "data": { "secret": { "value": null } },
                "errors": [{ "message": "Failed auth policy check on value", "path": ["secret", "value"] }]
            })
        );

        let mut schema = SchemaGraph::parse(sdl).unwrap();
        let error = AuthzRegistry::new()
            .register(
                &mut schema,
                AuthzOptions::external(json!({ "Secret": "admin" }), RequiresUserHeader),
            )
            .unwrap_err();
        assert!(matches!(error, AuthzConfigError::InvalidExternalPolicy(_)));
    }

    #[tokio::test]
    async fn registers_policy_sets_from_a_config_document() {
        let config = parse_yaml_config(
            r#"
log:
  level: warn
policy_sets:
  - mode: external
    filter_schema: true
    policy:
      Query:
        add: admin
  - mode: external
    policy:
      Query:
        echo: admin
    output_policy_errors:
      enabled: false
      value_override: "hidden"
"#,
        )
        .unwrap();

        let host = TestHost::builder(
            r#"
            type Query {
              add(x: Int, y: Int): Int
              subtract(x: Int, y: Int): Int
              echo(text: String): String
            }
            "#,
        )
        .resolver("Query", "add", arithmetic(|x, y| x + y))
        .resolver("Query", "subtract", arithmetic(|x, y| x - y))
        .resolver("Query", "echo", echo())
        .register_config(&config)
        .build();
        assert_eq!(host.registry.len(), 2);
        assert!(host.registry.has_introspection_hook());

        let query = r#"{ add(x: 1, y: 1) subtract(x: 5, y: 2) echo(text: "hi") }"#;
        let response = host.execute(query, &[("x-user", "user")]).await;
        assert_eq!(
            response,
            json!({
                "data": { "add": null, "subtract": 3, "echo": "hidden" },
                "errors": [{ "message": "Failed auth policy check on add", "path": ["add"] }]
            })
        );

        let response = host.execute(query, &[("x-user", "admin")]).await;
        assert_eq!(
            response,
            json!({ "data": { "add": 2, "subtract": 3, "echo": "hi" } })
        );
    }

    #[test]
    fn rejects_invalid_configurations() {
        let config = parse_yaml_config(
            r#"
policy_sets:
  - mode: external
    auth_directive: auth
    policy: {}
"#,
        )
        .unwrap();

        let mut schema = SchemaGraph::parse(CALCULATOR).unwrap();
        let result =
            AuthzRegistry::from_config(&mut schema, &config, Arc::new(RequiresUserHeader), None);
        assert!(matches!(
            result.err(),
            Some(AuthzConfigError::DirectiveWithExternalMode)
        ));
    }

    const V1: &str = r#"
        directive @auth(requires: Role = ADMIN) on OBJECT | FIELD_DEFINITION
        enum Role { ADMIN USER }
        type Query {
          add(x: Int, y: Int): Int @auth(requires: ADMIN)
          subtract(x: Int, y: Int): Int
        }
    "#;

    const V2: &str = r#"
        directive @auth(requires: Role = ADMIN) on OBJECT | FIELD_DEFINITION
        enum Role { ADMIN USER }
        type Query {
          add(x: Int, y: Int): Int
          subtract(x: Int, y: Int): Int @auth(requires: ADMIN)
        }
    "#;

    #[tokio::test]
    async fn reload_rebuilds_policies_for_the_new_schema() {
        let mut host = TestHost::builder(V1)
            .resolver("Query", "add", arithmetic(|x, y| x + y))
            .resolver("Query", "subtract", arithmetic(|x, y| x - y))
            .register(AuthzOptions::directive("auth", RequiresUserHeader).with_filter_schema(true))
            .build();

        let introspection = r#"{ __type(name: "Query") { fields { name } } }"#;
        let response = host.execute(introspection, &[("x-user", "user")]).await;
        assert_eq!(
            response,
            json!({ "data": { "__type": { "fields": [{ "name": "subtract" }] } } })
        );

        host.reload(V2, |schema| {
            schema.field_mut("Query", "add").unwrap().resolver = Some(arithmetic(|x, y| x + y));
            schema.field_mut("Query", "subtract").unwrap().resolver =
                Some(arithmetic(|x, y| x - y));
        });

        let response = host.execute(introspection, &[("x-user", "user")]).await;
        assert_eq!(
            response,
            json!({ "data": { "__type": { "fields": [{ "name": "add" }] } } })
        );

        let response = host
            .execute("{ add(x: 2, y: 2) subtract(x: 3, y: 3) }", &[("x-user", "user")])
            .await;
        assert_eq!(
            response,
            json!({
                "data": { "add": 4, "subtract": null },
                "errors": [{ "message": "Failed auth policy check on subtract", "path": ["subtract"] }]
            })
        );
    }
}
