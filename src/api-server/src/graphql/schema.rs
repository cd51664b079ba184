//! GraphQL schema fragments
//!
//! The schema is declared in SDL fragments that are parsed one by one and
//! merged into a single [`TypeRegistry`]. Object types may be spread over
//! several fragments (typically `Query` and `Mutation`); their field sets are
//! unioned. Redefining any other type, or redeclaring a field, is an error.

use std::collections::btree_map::{BTreeMap, Entry};
use std::fs;
use std::path::Path;

use async_graphql::parser::{
    parse_schema,
    types::{FieldDefinition, TypeDefinition, TypeKind, TypeSystemDefinition},
    Positioned,
};
use tracing::{debug, info, warn};

use crate::error::DiscoveryError;

/// Fragments compiled into the binary
pub const BUNDLED_FRAGMENTS: &[(&str, &str)] = &[
    ("hello.graphql", include_str!("../../graphql/hello.graphql")),
    ("animal.graphql", include_str!("../../graphql/animal.graphql")),
];

/// Named SDL source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaFragment {
    pub name: String,
    pub source: String,
}

impl SchemaFragment {
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
        }
    }

    pub fn bundled() -> Vec<Self> {
        BUNDLED_FRAGMENTS
            .iter()
            .map(|(name, source)| Self::new(*name, *source))
            .collect()
    }

    /// Every `*.graphql` file in `dir`, sorted by file name
    pub fn load_dir(dir: impl AsRef<Path>) -> Result<Vec<Self>, DiscoveryError> {
        let dir = dir.as_ref();
        let io_error = |source| DiscoveryError::FragmentIo {
            dir: dir.display().to_string(),
            source,
        };

        let mut paths = Vec::new();
        for entry in fs::read_dir(dir).map_err(io_error)? {
            let path = entry.map_err(io_error)?.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == "graphql") {
                paths.push(path);
            }
        }
        paths.sort();

        paths
            .into_iter()
            .map(|path| {
                let source = fs::read_to_string(&path).map_err(io_error)?;
                let name = path
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_default();
                debug!(fragment = %name, "Loaded schema fragment");
                Ok(Self::new(name, source))
            })
            .collect()
    }
}

/// A merged type and the fragments it came from
#[derive(Debug, Clone)]
pub struct RegisteredType {
    pub definition: TypeDefinition,
    pub fragments: Vec<String>,
}

impl RegisteredType {
    pub fn name(&self) -> &str {
        self.definition.name.node.as_str()
    }

    /// Field definitions of an object type; empty for every other kind
    pub fn fields(&self) -> impl Iterator<Item = &FieldDefinition> {
        let fields: &[Positioned<FieldDefinition>] = match &self.definition.kind {
            TypeKind::Object(object) => object.fields.as_slice(),
            _ => &[],
        };
        fields.iter().map(|field| &field.node)
    }

    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields().find(|field| field.name.node.as_str() == name)
    }
}

/// Union of every merged fragment, keyed by type name
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    types: BTreeMap<String, RegisteredType>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `fragment` and merge its types into the registry
    pub fn merge(&mut self, fragment: &SchemaFragment) -> Result<(), DiscoveryError> {
        let document =
            parse_schema(&fragment.source).map_err(|err| DiscoveryError::SchemaParse {
                fragment: fragment.name.clone(),
                message: err.to_string(),
            })?;

        for definition in document.definitions {
            match definition {
                TypeSystemDefinition::Type(definition) => {
                    self.merge_type(&fragment.name, definition.node)?
                }
                TypeSystemDefinition::Schema(schema) => {
                    let schema = schema.node;
                    let renamed = [
                        (schema.query, "Query"),
                        (schema.mutation, "Mutation"),
                    ]
                    .into_iter()
                    .any(|(root, expected)| {
                        root.is_some_and(|name| name.node.as_str() != expected)
                    });
                    if renamed || schema.subscription.is_some() {
                        return Err(DiscoveryError::UnsupportedDefinition {
                            fragment: fragment.name.clone(),
                            message: "root operation types must be named Query and Mutation, \
                                      subscriptions are not served"
                                .to_string(),
                        });
                    }
                }
                TypeSystemDefinition::Directive(directive) => {
                    warn!(
                        fragment = %fragment.name,
                        directive = %directive.node.name.node,
                        "Ignoring directive definition"
                    );
                }
            }
        }

        info!(fragment = %fragment.name, types = self.types.len(), "Merged schema fragment");
        Ok(())
    }

    fn merge_type(
        &mut self,
        fragment: &str,
        definition: TypeDefinition,
    ) -> Result<(), DiscoveryError> {
        let type_name = definition.name.node.to_string();

        if let TypeKind::Interface(_) | TypeKind::Union(_) = definition.kind {
            return Err(DiscoveryError::UnsupportedDefinition {
                fragment: fragment.to_string(),
                message: format!("interface and union types are not supported ({type_name})"),
            });
        }

        let existing = match self.types.entry(type_name.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(RegisteredType {
                    definition,
                    fragments: vec![fragment.to_string()],
                });
                return Ok(());
            }
            Entry::Occupied(slot) => slot.into_mut(),
        };

        let (TypeKind::Object(target), TypeKind::Object(incoming)) =
            (&mut existing.definition.kind, definition.kind)
        else {
            return Err(DiscoveryError::DuplicateType {
                fragment: fragment.to_string(),
                type_name,
            });
        };

        for field in incoming.fields {
            let field_name = field.node.name.node.as_str();
            if target
                .fields
                .iter()
                .any(|known| known.node.name.node.as_str() == field_name)
            {
                return Err(DiscoveryError::DuplicateField {
                    fragment: fragment.to_string(),
                    type_name,
                    field: field_name.to_string(),
                });
            }
            target.fields.push(field);
        }
        for interface in incoming.implements {
            if !target.implements.iter().any(|known| known.node == interface.node) {
                target.implements.push(interface);
            }
        }
        if existing.definition.description.is_none() {
            existing.definition.description = definition.description;
        }
        existing.fragments.push(fragment.to_string());
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&RegisteredType> {
        self.types.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    pub fn types(&self) -> impl Iterator<Item = &RegisteredType> {
        self.types.values()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Names of every enum type, used to coerce resolver output
    pub fn enum_names(&self) -> Vec<String> {
        self.types
            .values()
            .filter(|ty| matches!(ty.definition.kind, TypeKind::Enum(_)))
            .map(|ty| ty.name().to_string())
            .collect()
    }
}
