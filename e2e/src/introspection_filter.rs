#[cfg(test)]
mod introspection_filter_e2e_tests {
    use graphql_authz::{
        plugin::AuthContextBuilder,
        resolver::{Args, ResolveInfo},
        AuthzOptions, GraphQLError, Policy, PolicyPredicate, PolicyResult, RequestContext,
    };
    use serde_json::{json, Map, Value};

    use crate::testkit::{arithmetic, RequiresUserHeader, TestHost};

    const CALCULATOR: &str = r#"
        directive @auth(requires: Role = ADMIN) on OBJECT | FIELD_DEFINITION
        enum Role { ADMIN USER }
        type Query {
          add(x: Int, y: Int): Int @auth(requires: ADMIN)
          subtract(x: Int, y: Int): Int
        }
    "#;

    const QUERY_FIELDS: &str = r#"{ __type(name: "Query") { fields { name } } }"#;

    fn calculator(filter_schema: bool) -> TestHost {
        TestHost::builder(CALCULATOR)
            .resolver("Query", "add", arithmetic(|x, y| x + y))
            .resolver("Query", "subtract", arithmetic(|x, y| x - y))
            .register(
                AuthzOptions::directive("auth", RequiresUserHeader).with_filter_schema(filter_schema),
            )
            .build()
    }

    fn type_names(response: &Value) -> Vec<String> {
        response["data"]["__schema"]["types"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|t| t["name"].as_str().map(str::to_string))
            .collect()
    }

    #[tokio::test]
    async fn hides_denied_fields_from_type_lookup() {
        let host = calculator(true);

        let response = host.execute(QUERY_FIELDS, &[("x-user", "user")]).await;
        assert_eq!(
            response,
            json!({ "data": { "__type": { "fields": [{ "name": "subtract" }] } } })
        );

        let response = host.execute(QUERY_FIELDS, &[("x-user", "admin")]).await;
        assert_eq!(
            response,
            json!({ "data": { "__type": { "fields": [{ "name": "add" }, { "name": "subtract" }] } } })
        );
    }

    #[tokio::test]
    async fn leaves_introspection_alone_without_filtering() {
        let host = calculator(false);

        let response = host.execute(QUERY_FIELDS, &[("x-user", "user")]).await;
        assert_eq!(
            response,
            json!({ "data": { "__type": { "fields": [{ "name": "add" }, { "name": "subtract" }] } } })
        );
    }

    #[tokio::test]
    async fn regular_operations_still_go_through_guards() {
        let host = calculator(true);

        let response = host
            .execute("{ __typename add(x: 1, y: 1) }", &[("x-user", "user")])
            .await;
        assert_eq!(
            response,
            json!({
                "data": { "__typename": "Query", "add": null },
                "errors": [{ "message": "Failed auth policy check on add", "path": ["add"] }]
            })
        );
    }

    #[tokio::test]
    async fn introspection_through_fragments_is_filtered() {
        let host = calculator(true);

        let response = host
            .execute(
                r#"
                query { ...Introspect }
                fragment Introspect on Query { __type(name: "Query") { fields { name } } }
                "#,
                &[("x-user", "user")],
            )
            .await;
        assert_eq!(
            response,
            json!({ "data": { "__type": { "fields": [{ "name": "subtract" }] } } })
        );
    }

    const SHOP: &str = r#"
        directive @auth(requires: Role = ADMIN) on OBJECT | INTERFACE | UNION | FIELD_DEFINITION | INPUT_FIELD_DEFINITION
        enum Role { ADMIN USER }
        interface Node { id: ID! }
        interface Audited @auth(requires: ADMIN) { auditLog: [String] }
        type Product implements Node { id: ID! name: String price: Float }
        type Invoice implements Node & Audited { id: ID! total: Float auditLog: [String] }
        type Customer implements Node { id: ID! email: String @auth(requires: ADMIN) }
        union SearchResult @auth(requires: ADMIN) = Customer | Invoice
        input ProductFilter { name: String internalCode: String @auth(requires: ADMIN) }
        type Query {
          products(filter: ProductFilter, first: Int): [Product]
          node(id: ID!): Node
          search(term: String!): [SearchResult]
          invoices: [Invoice]
        }
    "#;

    fn shop() -> TestHost {
        TestHost::builder(SHOP)
            .register(AuthzOptions::directive("auth", RequiresUserHeader).with_filter_schema(true))
            .build()
    }

    #[tokio::test]
    async fn cascades_through_interfaces_unions_and_inputs() {
        let host = shop();

        let response = host
            .execute("{ __schema { types { name } } }", &[("x-user", "user")])
            .await;
        let names = type_names(&response);

        for hidden in ["Audited", "Invoice", "Customer", "SearchResult", "ProductFilter"] {
            assert!(!names.contains(&hidden.to_string()), "{} should be hidden", hidden);
        }
        for visible in ["Node", "Product", "Query", "Role"] {
            assert!(names.contains(&visible.to_string()), "{} should be visible", visible);
        }

        let response = host
            .execute(
                r#"{ __type(name: "Query") { fields { name args { name } } } }"#,
                &[("x-user", "user")],
            )
            .await;
        assert_eq!(
            response,
            json!({ "data": { "__type": { "fields": [
                { "name": "products", "args": [{ "name": "first" }] },
                { "name": "node", "args": [{ "name": "id" }] }
            ] } } })
        );
    }

    #[tokio::test]
    async fn hidden_types_cannot_be_looked_up() {
        let host = shop();

        let response = host
            .execute(
                r#"{ __type(name: "Invoice") { name } }"#,
                &[("x-user", "user")],
            )
            .await;
        assert_eq!(response, json!({ "data": { "__type": null } }));

        let response = host
            .execute(
                r#"{ __type(name: "Invoice") { name } }"#,
                &[("x-user", "admin")],
            )
            .await;
        assert_eq!(response, json!({ "data": { "__type": { "name": "Invoice" } } }));
    }

    /// Puts the `x-role` header into the auth context.
    struct RoleFromHeader;

    #[async_trait::async_trait]
    impl AuthContextBuilder for RoleFromHeader {
        async fn build(&self, context: &RequestContext) -> Result<Map<String, Value>, GraphQLError> {
            let mut values = Map::new();
            if let Some(role) = context.header("x-role") {
                values.insert("role".to_string(), json!(role));
            }
            Ok(values)
        }
    }

    /// Allows `@scope(name: ...)` when the auth context role matches.
    struct ScopeFromAuthContext;

    #[async_trait::async_trait]
    impl PolicyPredicate for ScopeFromAuthContext {
        async fn apply_policy(
            &self,
            policy: &Policy,
            _parent: &Value,
            _args: &Args,
            context: &RequestContext,
            _info: &ResolveInfo,
        ) -> PolicyResult {
            let scope = policy
                .as_directive()
                .and_then(|directive| directive.argument("name"))
                .and_then(|value| value.as_str())
                .map(str::to_string);
            let role = context.auth_value("role");
            Ok(scope.is_some() && role.as_ref().and_then(Value::as_str) == scope.as_deref())
        }
    }

    const TWO_DIRECTIVES: &str = r#"
        directive @auth(requires: Role = ADMIN) on OBJECT | FIELD_DEFINITION
        directive @scope(name: String!) on OBJECT | FIELD_DEFINITION
        enum Role { ADMIN USER }
        type Query {
          add(x: Int, y: Int): Int @auth(requires: ADMIN)
          subtract(x: Int, y: Int): Int @scope(name: "math")
          multiply(x: Int, y: Int): Int
        }
    "#;

    #[tokio::test]
    async fn merges_every_filtering_policy_set() {
        let host = TestHost::builder(TWO_DIRECTIVES)
            .register(AuthzOptions::directive("auth", RequiresUserHeader).with_filter_schema(true))
            .register(
                AuthzOptions::directive("scope", ScopeFromAuthContext)
                    .with_auth_context(RoleFromHeader)
                    .with_filter_schema(true),
            )
            .build();

        let response = host.execute(QUERY_FIELDS, &[("x-user", "user")]).await;
        assert_eq!(
            response,
            json!({ "data": { "__type": { "fields": [{ "name": "multiply" }] } } })
        );

        let response = host
            .execute(QUERY_FIELDS, &[("x-user", "admin"), ("x-role", "math")])
            .await;
        assert_eq!(
            response,
            json!({ "data": { "__type": { "fields": [
                { "name": "add" },
                { "name": "subtract" },
                { "name": "multiply" }
            ] } } })
        );
    }

    #[tokio::test]
    async fn only_filtering_policy_sets_hide_elements() {
        let host = TestHost::builder(TWO_DIRECTIVES)
            .register(AuthzOptions::directive("auth", RequiresUserHeader))
            .register(
                AuthzOptions::directive("scope", ScopeFromAuthContext)
                    .with_auth_context(RoleFromHeader)
                    .with_filter_schema(true),
            )
            .build();

        let response = host.execute(QUERY_FIELDS, &[("x-user", "user")]).await;
        assert_eq!(
            response,
            json!({ "data": { "__type": { "fields": [{ "name": "add" }, { "name": "multiply" }] } } })
        );
    }
}
