use tracing::info;

use crate::discovery::{AutoloadHandler, EndpointDescriptor, Handler};

/// Logs the service banner once discovery reaches it
#[derive(Debug, Default)]
pub struct StartupBanner;

impl StartupBanner {
    pub fn descriptor() -> EndpointDescriptor {
        EndpointDescriptor::autoload()
    }
}

impl Handler for StartupBanner {
    fn as_autoload(&self) -> Option<&dyn AutoloadHandler> {
        Some(self)
    }
}

impl AutoloadHandler for StartupBanner {
    fn on_load(&self) -> anyhow::Result<()> {
        info!(
            service = env!("CARGO_PKG_NAME"),
            version = env!("CARGO_PKG_VERSION"),
            "Vertretungsplan API starting"
        );
        Ok(())
    }
}
