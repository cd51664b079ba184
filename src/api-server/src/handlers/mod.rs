//! Request handlers
//!
//! `health` holds the service-level routes. Everything else is a discovered
//! endpoint and must be listed in [`register_all`].

pub mod animal;
pub mod banner;
pub mod health;
pub mod hello;
pub mod legacy;

use crate::config::Config;
use crate::discovery::EndpointRegistry;

pub use animal::PetAnimalMultiEndpoint;
pub use banner::StartupBanner;
pub use hello::{HelloMultiEndpoint, HelloWebSocketEndpoint};
pub use legacy::LegacyVertretungsplanEndpoint;

/// Module scope discovered at boot
pub const HANDLER_SCOPE: &str = module_path!();

/// Registration table of every endpoint shipped with the server
pub fn register_all(registry: &mut EndpointRegistry, config: &Config) {
    registry
        .register_default::<StartupBanner>(StartupBanner::descriptor())
        .register_default::<HelloMultiEndpoint>(HelloMultiEndpoint::descriptor())
        .register_default::<HelloWebSocketEndpoint>(HelloWebSocketEndpoint::descriptor())
        .register_default::<PetAnimalMultiEndpoint>(PetAnimalMultiEndpoint::descriptor());

    if config.legacy.enabled {
        let legacy = config.legacy.clone();
        registry.register(LegacyVertretungsplanEndpoint::descriptor(&legacy), move || {
            Ok(LegacyVertretungsplanEndpoint::new(&legacy))
        });
    }
}
