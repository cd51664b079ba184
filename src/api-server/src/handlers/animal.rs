use std::sync::Arc;

use async_trait::async_trait;

use crate::discovery::{
    respond, EndpointDescriptor, GraphQLFieldKind, Handler, HandlerResult, HttpMethod,
    RestHandler,
};
use crate::params::Parameters;

pub const PET_RESPONSE: &str = "purr purr ~ The animal likes this";

/// `petAnimal` mutation, also reachable as `GET|POST {prefix}/petAnimal`
#[derive(Debug, Default)]
pub struct PetAnimalMultiEndpoint;

impl PetAnimalMultiEndpoint {
    pub fn descriptor() -> EndpointDescriptor {
        EndpointDescriptor::multi("petAnimal", GraphQLFieldKind::Mutation, "/petAnimal")
            .methods([HttpMethod::Post, HttpMethod::Get])
            .debug_only()
    }
}

impl Handler for PetAnimalMultiEndpoint {
    fn as_rest(self: Arc<Self>) -> Option<Arc<dyn RestHandler>> {
        Some(self)
    }
}

#[async_trait]
impl RestHandler for PetAnimalMultiEndpoint {
    async fn handle(&self, _params: &Parameters) -> HandlerResult {
        respond(PET_RESPONSE)
    }
}
