//! Named spans for the authorization hot paths.

use tracing::{debug_span, field::Empty, Span};

pub static TARGET_NAME: &str = "graphql-authz";

#[derive(Clone)]
pub struct IntrospectionFilterSpan {
    pub span: Span,
}

impl std::ops::Deref for IntrospectionFilterSpan {
    type Target = Span;
    fn deref(&self) -> &Self::Target {
        &self.span
    }
}

impl Default for IntrospectionFilterSpan {
    fn default() -> Self {
        Self::new()
    }
}

impl IntrospectionFilterSpan {
    pub fn new() -> Self {
        let span = debug_span!(
            target: TARGET_NAME,
            "authz.introspection_filter",
            "authz.policy_sets" = Empty,
            "authz.denied" = Empty,
        );
        IntrospectionFilterSpan { span }
    }

    pub fn record_policy_sets(&self, count: usize) {
        self.span.record("authz.policy_sets", count);
    }

    pub fn record_denied(&self, count: usize) {
        self.span.record("authz.denied", count);
    }
}

#[derive(Clone)]
pub struct PruneSpan {
    pub span: Span,
}

impl std::ops::Deref for PruneSpan {
    type Target = Span;
    fn deref(&self) -> &Self::Target {
        &self.span
    }
}

impl PruneSpan {
    pub fn new(type_count: usize) -> Self {
        let span = debug_span!(
            target: TARGET_NAME,
            "authz.prune",
            "schema.types" = type_count,
            "schema.types.kept" = Empty,
        );
        PruneSpan { span }
    }

    pub fn record_kept(&self, count: usize) {
        self.span.record("schema.types.kept", count);
    }
}

/// Created per guarded field resolution.
pub fn guard_span(parent_type: &str, field_name: &str) -> Span {
    tracing::trace_span!(
        target: TARGET_NAME,
        "authz.guard",
        "graphql.parent_type" = parent_type,
        "graphql.field" = field_name,
    )
}
