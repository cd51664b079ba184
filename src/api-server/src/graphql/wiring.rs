//! Field bindings and the executable schema
//!
//! Every GRAPHQL_FIELD and MULTI endpoint binds one `Query` or `Mutation`
//! field. The merged [`TypeRegistry`] is turned into an `async-graphql`
//! dynamic schema where bound fields call their resolver and every other
//! field reads the matching key of its parent JSON object.

use std::collections::HashSet;
use std::sync::Arc;

use async_graphql::{
    dynamic::{
        Enum, EnumItem, Field, FieldFuture, FieldValue, InputObject, InputValue, Object,
        ResolverContext, Scalar, Schema, TypeRef,
    },
    parser::types::{
        BaseType, EnumType, FieldDefinition, InputObjectType, InputValueDefinition, ObjectType,
        Type, TypeKind,
    },
    Name, Value,
};
use serde::Serialize;
use tracing::{debug, info};

use super::schema::{RegisteredType, TypeRegistry};
use crate::discovery::{
    DiscoveredEndpoints, GraphQLFieldKind, GraphQLFieldResolver, HandlerInstance,
};
use crate::dispatcher::{catch_panic, MultiFieldResolver};
use crate::error::DiscoveryError;
use crate::params::{Parameters, RequestMeta};

/// Root field bound to a handler
#[derive(Clone)]
pub struct FieldBinding {
    pub parent: GraphQLFieldKind,
    pub field: String,
    pub handler_type: &'static str,
    resolver: Arc<dyn GraphQLFieldResolver>,
}

impl FieldBinding {
    pub fn new(
        parent: GraphQLFieldKind,
        field: impl Into<String>,
        handler_type: &'static str,
        resolver: Arc<dyn GraphQLFieldResolver>,
    ) -> Self {
        Self {
            parent,
            field: field.into(),
            handler_type,
            resolver,
        }
    }
}

/// Serializable view of a binding
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BindingSummary {
    pub parent: &'static str,
    pub field: String,
    pub handler: &'static str,
}

/// Binding table keyed by `(parent type, field name)`
#[derive(Clone, Default)]
pub struct FieldBindings {
    bindings: Vec<FieldBinding>,
}

impl FieldBindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect the bindings of every GRAPHQL_FIELD and MULTI endpoint
    pub fn from_discovered(discovered: &DiscoveredEndpoints) -> Result<Self, DiscoveryError> {
        let mut bindings = Self::new();

        for endpoint in discovered.iter() {
            let descriptor = &endpoint.descriptor;
            if !descriptor.kind.is_graphql() {
                continue;
            }
            let field = descriptor.graphql_field.as_ref().ok_or_else(|| {
                DiscoveryError::MissingFieldBinding {
                    handler: endpoint.handler_type.to_string(),
                }
            })?;

            let resolver: Arc<dyn GraphQLFieldResolver> = match &endpoint.instance {
                HandlerInstance::GraphQLField(resolver) => resolver.clone(),
                HandlerInstance::Rest(handler) => {
                    Arc::new(MultiFieldResolver::new(handler.clone()))
                }
                _ => {
                    return Err(DiscoveryError::MissingCapability {
                        handler: endpoint.handler_type.to_string(),
                        expected: "GraphQLFieldResolver",
                    })
                }
            };

            bindings.bind(FieldBinding::new(
                field.kind,
                field.name.clone(),
                endpoint.handler_type,
                resolver,
            ))?;
        }

        Ok(bindings)
    }

    /// Add `binding`; a second binding for the same field is rejected
    pub fn bind(&mut self, binding: FieldBinding) -> Result<(), DiscoveryError> {
        if let Some(existing) = self.get(binding.parent, &binding.field) {
            return Err(DiscoveryError::DuplicateFieldBinding {
                parent: binding.parent.type_name(),
                field: binding.field,
                existing: existing.handler_type.to_string(),
                duplicate: binding.handler_type.to_string(),
            });
        }

        debug!(
            parent = binding.parent.type_name(),
            field = %binding.field,
            handler = binding.handler_type,
            "Bound GraphQL field"
        );
        self.bindings.push(binding);
        Ok(())
    }

    pub fn get(&self, parent: GraphQLFieldKind, field: &str) -> Option<&FieldBinding> {
        self.bindings
            .iter()
            .find(|binding| binding.parent == parent && binding.field == field)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn summaries(&self) -> Vec<BindingSummary> {
        self.bindings
            .iter()
            .map(|binding| BindingSummary {
                parent: binding.parent.type_name(),
                field: binding.field.clone(),
                handler: binding.handler_type,
            })
            .collect()
    }
}

/// Executable schema plus the bindings it was wired with
#[derive(Clone)]
pub struct GraphQLSchema {
    schema: Schema,
    bindings: Arc<Vec<BindingSummary>>,
}

impl GraphQLSchema {
    /// Wire `registry` with `bindings`.
    ///
    /// Fails when a binding targets an undeclared field or when the merged
    /// types do not form a valid schema.
    pub fn build(
        registry: &TypeRegistry,
        bindings: &FieldBindings,
    ) -> Result<Self, DiscoveryError> {
        for binding in &bindings.bindings {
            let declared = registry
                .get(binding.parent.type_name())
                .and_then(|root| root.field(&binding.field))
                .is_some();
            if !declared {
                return Err(DiscoveryError::UnknownField {
                    parent: binding.parent.type_name(),
                    field: binding.field.clone(),
                    handler: binding.handler_type.to_string(),
                });
            }
        }

        if !registry.contains(GraphQLFieldKind::Query.type_name()) {
            return Err(DiscoveryError::SchemaBuild(
                "no schema fragment declares a Query type".to_string(),
            ));
        }

        let mutation = registry
            .contains(GraphQLFieldKind::Mutation.type_name())
            .then_some(GraphQLFieldKind::Mutation.type_name());
        let enums: Arc<HashSet<String>> = Arc::new(registry.enum_names().into_iter().collect());

        let mut builder = Schema::build(GraphQLFieldKind::Query.type_name(), mutation, None);
        for ty in registry.types() {
            let name = ty.name().to_string();
            builder = match &ty.definition.kind {
                TypeKind::Object(object) => {
                    builder.register(object_type(ty, object, bindings, &enums))
                }
                TypeKind::Enum(values) => builder.register(enum_type(ty, values)),
                TypeKind::InputObject(input) => builder.register(input_object_type(ty, input)),
                TypeKind::Scalar => builder.register(Scalar::new(name)),
                TypeKind::Interface(_) | TypeKind::Union(_) => {
                    return Err(DiscoveryError::UnsupportedDefinition {
                        fragment: ty.fragments.join(", "),
                        message: format!("interface and union types are not supported ({name})"),
                    })
                }
            };
        }

        let schema = builder
            .finish()
            .map_err(|err| DiscoveryError::SchemaBuild(err.to_string()))?;

        info!(
            types = registry.len(),
            bindings = bindings.len(),
            "GraphQL schema assembled"
        );

        Ok(Self {
            schema,
            bindings: Arc::new(bindings.summaries()),
        })
    }

    pub async fn execute(&self, request: async_graphql::Request) -> async_graphql::Response {
        self.schema.execute(request).await
    }

    /// SDL of the executable schema
    pub fn sdl(&self) -> String {
        self.schema.sdl()
    }

    pub fn bindings(&self) -> &[BindingSummary] {
        &self.bindings
    }
}

fn object_type(
    ty: &RegisteredType,
    object: &ObjectType,
    bindings: &FieldBindings,
    enums: &Arc<HashSet<String>>,
) -> Object {
    let root = match ty.name() {
        "Query" => Some(GraphQLFieldKind::Query),
        "Mutation" => Some(GraphQLFieldKind::Mutation),
        _ => None,
    };

    let mut dynamic = Object::new(ty.name());
    if let Some(description) = &ty.definition.description {
        dynamic = dynamic.description(description.node.clone());
    }

    for field in &object.fields {
        let definition = &field.node;
        let binding = root.and_then(|kind| bindings.get(kind, definition.name.node.as_str()));
        let mut dynamic_field = match binding {
            Some(binding) => bound_field(definition, binding, enums.clone()),
            None => property_field(definition, enums.clone()),
        };
        if let Some(description) = &definition.description {
            dynamic_field = dynamic_field.description(description.node.clone());
        }
        for argument in &definition.arguments {
            dynamic_field = dynamic_field.argument(input_value(&argument.node));
        }
        dynamic = dynamic.field(dynamic_field);
    }

    dynamic
}

fn enum_type(ty: &RegisteredType, values: &EnumType) -> Enum {
    let mut dynamic = Enum::new(ty.name());
    if let Some(description) = &ty.definition.description {
        dynamic = dynamic.description(description.node.clone());
    }
    for value in &values.values {
        let mut item = EnumItem::new(value.node.value.node.to_string());
        if let Some(description) = &value.node.description {
            item = item.description(description.node.clone());
        }
        dynamic = dynamic.item(item);
    }
    dynamic
}

fn input_object_type(ty: &RegisteredType, input: &InputObjectType) -> InputObject {
    let mut dynamic = InputObject::new(ty.name());
    if let Some(description) = &ty.definition.description {
        dynamic = dynamic.description(description.node.clone());
    }
    for field in &input.fields {
        dynamic = dynamic.field(input_value(&field.node));
    }
    dynamic
}

fn input_value(definition: &InputValueDefinition) -> InputValue {
    let mut input = InputValue::new(
        definition.name.node.to_string(),
        type_ref(&definition.ty.node),
    );
    if let Some(description) = &definition.description {
        input = input.description(description.node.clone());
    }
    if let Some(default) = &definition.default_value {
        input = input.default_value(default.node.clone());
    }
    input
}

/// SDL type to dynamic type reference
fn type_ref(ty: &Type) -> TypeRef {
    let base = match &ty.base {
        BaseType::Named(name) => TypeRef::named(name.to_string()),
        BaseType::List(inner) => TypeRef::List(Box::new(type_ref(inner))),
    };
    if ty.nullable {
        base
    } else {
        TypeRef::NonNull(Box::new(base))
    }
}

fn bound_field(
    definition: &FieldDefinition,
    binding: &FieldBinding,
    enums: Arc<HashSet<String>>,
) -> Field {
    let output = definition.ty.node.clone();
    let resolver = binding.resolver.clone();
    let handler_type = binding.handler_type;
    Field::new(
        definition.name.node.to_string(),
        type_ref(&definition.ty.node),
        move |ctx| {
            FieldFuture::new(resolve_bound(
                ctx,
                resolver.clone(),
                handler_type,
                output.clone(),
                enums.clone(),
            ))
        },
    )
}

async fn resolve_bound<'a>(
    ctx: ResolverContext<'a>,
    resolver: Arc<dyn GraphQLFieldResolver>,
    handler_type: &'static str,
    output: Type,
    enums: Arc<HashSet<String>>,
) -> async_graphql::Result<Option<FieldValue<'a>>> {
    let mut args = serde_json::Map::new();
    for (name, value) in ctx.args.as_index_map() {
        args.insert(name.to_string(), value.clone().into_json()?);
    }
    let params = Parameters::graphql(ctx.ctx.data_opt::<RequestMeta>(), args);

    match catch_panic(handler_type, resolver.resolve(&params)).await? {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(json) => {
            let value = coerce_output(Value::from_json(json)?, &output, &enums);
            Ok(Some(to_field_value(value)))
        }
    }
}

/// Default resolver: read the field from the parent JSON object
fn property_field(definition: &FieldDefinition, enums: Arc<HashSet<String>>) -> Field {
    let key = definition.name.node.to_string();
    let output = definition.ty.node.clone();
    Field::new(key.clone(), type_ref(&definition.ty.node), move |ctx| {
        let value = match ctx.parent_value.as_value() {
            Some(Value::Object(map)) => map.get(key.as_str()).cloned(),
            _ => None,
        };
        let value = value
            .filter(|value| !matches!(value, Value::Null))
            .map(|value| to_field_value(coerce_output(value, &output, &enums)));
        FieldFuture::new(async move { Ok(value) })
    })
}

/// Resolvers produce JSON, where enum values arrive as plain strings
fn coerce_output(value: Value, ty: &Type, enums: &HashSet<String>) -> Value {
    match (&ty.base, value) {
        (BaseType::Named(name), Value::String(raw)) if enums.contains(name.as_str()) => {
            Value::Enum(Name::new(raw))
        }
        (BaseType::List(inner), Value::List(items)) => Value::List(
            items
                .into_iter()
                .map(|item| coerce_output(item, inner, enums))
                .collect(),
        ),
        (_, value) => value,
    }
}

fn to_field_value<'a>(value: Value) -> FieldValue<'a> {
    match value {
        Value::List(items) => FieldValue::list(items.into_iter().map(to_field_value)),
        other => FieldValue::value(other),
    }
}
