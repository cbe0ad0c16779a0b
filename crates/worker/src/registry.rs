//! Compile-time module registry.
//!
//! Modules are addressed by path string, the static-linking counterpart
//! of loading by import path. The `isolate` knob is accepted for CLI
//! compatibility; a static registry has no shared namespace to pollute,
//! so it has no effect.

use std::collections::HashMap;

use tracing::debug;

use crate::error::WorkerError;
use crate::module::{ModuleHost, WorkerModule};
use crate::modules;

pub type ModuleFactory = fn() -> Box<dyn WorkerModule>;

pub struct ModuleRegistry {
    factories: HashMap<String, ModuleFactory>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registry with every built-in module installed.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("default", || Box::new(modules::default::DefaultWorker::new()));
        registry.register("gpt", || Box::new(modules::gpt::GptWorker::new()));
        registry.register("tester", || Box::new(modules::tester::TesterWorker::new()));
        registry
    }

    pub fn register(&mut self, path: &str, factory: ModuleFactory) {
        self.factories.insert(path.to_string(), factory);
    }

    pub fn paths(&self) -> Vec<&str> {
        let mut paths: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        paths.sort_unstable();
        paths
    }

    pub fn load(&self, path: &str, isolate: bool) -> Result<ModuleHost, WorkerError> {
        if isolate {
            debug!("module isolation has no effect with a static registry");
        }
        let factory = self
            .factories
            .get(path)
            .ok_or_else(|| WorkerError::UnknownModule(path.to_string()))?;
        debug!(module = %path, "module loaded");
        Ok(ModuleHost::new(factory()))
    }
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}
