pub mod context;
pub mod error;
pub mod filter_map;
pub mod guard;
pub mod introspection;
pub mod plugin;
pub mod policy;
pub mod prune;
pub mod resolver;
pub mod schema;

pub use context::RequestContext;
pub use error::{AuthzConfigError, GraphQLError};
pub use guard::{PolicyPredicate, PolicyResult, ValueOverride};
pub use plugin::{AuthContextBuilder, AuthzOptions, AuthzRegistry};
pub use policy::{Policy, PolicyMap};
pub use schema::SchemaGraph;

pub use graphql_authz_config as config;
