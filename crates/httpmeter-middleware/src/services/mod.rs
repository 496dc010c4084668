//! Built-in services, resolvable by the `service` kind named in config.

pub mod echo;
pub mod ok;

use std::sync::Arc;

use dashmap::DashMap;

use crate::server::Handler;

pub use echo::EchoService;
pub use ok::OkService;

/// Registry of handlers keyed by service kind.
#[derive(Default)]
pub struct ServiceRegistry {
    map: DashMap<&'static str, Arc<dyn Handler>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self { map: DashMap::new() }
    }

    /// Registry preloaded with `echo` and `ok`.
    pub fn with_builtins() -> Self {
        let reg = Self::new();
        reg.register("echo", Arc::new(EchoService::new()));
        reg.register("ok", Arc::new(OkService::new()));
        reg
    }

    pub fn register(&self, kind: &'static str, handler: Arc<dyn Handler>) {
        self.map.insert(kind, handler);
    }

    pub fn get(&self, kind: &str) -> Option<Arc<dyn Handler>> {
        self.map.get(kind).map(|e| Arc::clone(e.value()))
    }

    pub fn kinds(&self) -> Vec<&'static str> {
        self.map.iter().map(|e| *e.key()).collect()
    }
}
