//! GraphQL schema assembly and field binding

pub mod endpoint;
pub mod schema;
pub mod wiring;

pub use schema::{RegisteredType, SchemaFragment, TypeRegistry, BUNDLED_FRAGMENTS};
pub use wiring::{BindingSummary, FieldBinding, FieldBindings, GraphQLSchema};

use crate::config::Config;
use crate::discovery::DiscoveredEndpoints;
use crate::error::DiscoveryError;

/// Merge the bundled and configured fragments and bind the discovered fields
pub fn assemble(
    config: &Config,
    discovered: &DiscoveredEndpoints,
) -> Result<GraphQLSchema, DiscoveryError> {
    let mut fragments = SchemaFragment::bundled();
    if let Some(dir) = &config.graphql.schema_dir {
        fragments.extend(SchemaFragment::load_dir(dir)?);
    }

    let mut registry = TypeRegistry::new();
    for fragment in &fragments {
        registry.merge(fragment)?;
    }

    let bindings = FieldBindings::from_discovered(discovered)?;
    GraphQLSchema::build(&registry, &bindings)
}
