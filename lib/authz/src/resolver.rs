use std::{fmt, future::Future, sync::Arc};

use serde_json::{Map, Value};

use crate::{
    context::RequestContext,
    error::{GraphQLError, GraphQLErrorPathSegment},
    guard::GuardedResolver,
    schema::TypeRef,
};

pub type Args = Map<String, Value>;
pub type ResolverResult = Result<Value, GraphQLError>;

/// What a resolver knows about the field it is resolving.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolveInfo {
    pub field_name: String,
    pub return_type: TypeRef,
    pub parent_type: String,
    /// Response path of the field. Empty for synthetic infos.
    pub path: Vec<GraphQLErrorPathSegment>,
}

impl ResolveInfo {
    pub fn new(
        field_name: impl Into<String>,
        return_type: TypeRef,
        parent_type: impl Into<String>,
        path: Vec<GraphQLErrorPathSegment>,
    ) -> Self {
        Self {
            field_name: field_name.into(),
            return_type,
            parent_type: parent_type.into(),
            path,
        }
    }

    /// An info without selection or path, used when predicates run outside of execution.
    pub fn synthetic(
        field_name: impl Into<String>,
        return_type: TypeRef,
        parent_type: impl Into<String>,
    ) -> Self {
        Self::new(field_name, return_type, parent_type, vec![])
    }
}

pub struct ResolveParams {
    pub parent: Value,
    pub args: Args,
    pub context: Arc<RequestContext>,
    pub info: Arc<ResolveInfo>,
}

#[async_trait::async_trait]
pub trait FieldResolver: Send + Sync + 'static {
    async fn resolve(&self, params: ResolveParams) -> ResolverResult;

    /// Set only by the guard, so stacked guards can be composed instead of nested.
    fn as_guarded(&self) -> Option<&GuardedResolver> {
        None
    }
}

/// A shareable field or reference resolver.
#[derive(Clone)]
pub struct Resolver(Arc<dyn FieldResolver>);

impl Resolver {
    pub fn new(resolver: impl FieldResolver) -> Self {
        Self(Arc::new(resolver))
    }

    pub async fn resolve(&self, params: ResolveParams) -> ResolverResult {
        self.0.resolve(params).await
    }

    pub fn as_guarded(&self) -> Option<&GuardedResolver> {
        self.0.as_guarded()
    }
}

impl fmt::Debug for Resolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_guarded() {
            Some(guarded) => write!(f, "Resolver(guarded x{})", guarded.len()),
            None => f.write_str("Resolver"),
        }
    }
}

/// Reads the property named after the field from the parent value.
pub struct PropertyResolver;

#[async_trait::async_trait]
impl FieldResolver for PropertyResolver {
    async fn resolve(&self, params: ResolveParams) -> ResolverResult {
        Ok(params
            .parent
            .get(&params.info.field_name)
            .cloned()
            .unwrap_or(Value::Null))
    }
}

pub fn default_resolver() -> Resolver {
    Resolver::new(PropertyResolver)
}

struct FnResolver<F>(F);

#[async_trait::async_trait]
impl<F, Fut> FieldResolver for FnResolver<F>
where
    F: Fn(ResolveParams) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ResolverResult> + Send + 'static,
{
    async fn resolve(&self, params: ResolveParams) -> ResolverResult {
        (self.0)(params).await
    }
}

/// Adapts an async closure into a [`Resolver`].
pub fn resolver_fn<F, Fut>(f: F) -> Resolver
where
    F: Fn(ResolveParams) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ResolverResult> + Send + 'static,
{
    Resolver::new(FnResolver(f))
}
