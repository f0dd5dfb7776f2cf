//! Name-keyed table of plugin loader factories.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde_json::{Map, Value};
use strsim::levenshtein;
use tracing::debug;

use super::{CacheLoader, LocalLoader, PluginError, PluginLoader};

/// Builds a loader from a descriptor's positional and keyword arguments.
pub type LoaderFactory =
    Box<dyn Fn(&[Value], &Map<String, Value>) -> Result<Box<dyn PluginLoader>, PluginError>>;

/// Plugin types available to descriptors, owned by the process-level context.
#[derive(Default)]
pub struct PluginTypeRegistry {
    factories: BTreeMap<String, LoaderFactory>,
}

impl PluginTypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the `local` and `git` types. Cached checkouts for `git`
    /// plugins live below `cache_root`.
    pub fn with_builtins(cache_root: PathBuf) -> Self {
        let mut factories: BTreeMap<String, LoaderFactory> = BTreeMap::new();
        factories.insert(
            "local".to_string(),
            Box::new(|args: &[Value], kwargs: &Map<String, Value>| {
                Ok(Box::new(LocalLoader::from_descriptor(args, kwargs)?) as Box<dyn PluginLoader>)
            }),
        );
        factories.insert(
            "git".to_string(),
            Box::new(move |args: &[Value], kwargs: &Map<String, Value>| {
                Ok(
                    Box::new(CacheLoader::from_descriptor(args, kwargs, &cache_root)?)
                        as Box<dyn PluginLoader>,
                )
            }),
        );
        Self { factories }
    }

    /// Add a plugin type. Registering an existing name fails.
    pub fn register<F>(&mut self, name: &str, factory: F) -> Result<(), PluginError>
    where
        F: Fn(&[Value], &Map<String, Value>) -> Result<Box<dyn PluginLoader>, PluginError>
            + 'static,
    {
        if self.factories.contains_key(name) {
            return Err(PluginError::DuplicateType(name.to_string()));
        }
        debug!(name, "plugin type registered");
        self.factories.insert(name.to_string(), Box::new(factory));
        Ok(())
    }

    /// Build a loader of type `name`.
    pub fn instantiate(
        &self,
        name: &str,
        args: &[Value],
        kwargs: &Map<String, Value>,
    ) -> Result<Box<dyn PluginLoader>, PluginError> {
        match self.factories.get(name) {
            Some(factory) => factory(args, kwargs),
            None => Err(PluginError::UnknownType {
                name: name.to_string(),
                suggestion: self.suggest(name),
            }),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered type names, sorted.
    pub fn names(&self) -> Vec<String> {
        self.factories.keys().cloned().collect()
    }

    /// Write-only view handed to loaders and plugins.
    pub fn writer(&mut self) -> RegistryWriter<'_> {
        RegistryWriter { registry: self }
    }

    /// Closest registered name within distance 2.
    fn suggest(&self, name: &str) -> Option<String> {
        let lower = name.to_lowercase();
        self.factories
            .keys()
            .map(|known| (known, levenshtein(&lower, known)))
            .filter(|(_, distance)| *distance <= 2)
            .min_by_key(|(_, distance)| *distance)
            .map(|(known, _)| known.clone())
    }
}

/// Registration-only access to a [`PluginTypeRegistry`].
///
/// Plugins can add types but cannot list, instantiate or replace existing
/// ones.
pub struct RegistryWriter<'a> {
    registry: &'a mut PluginTypeRegistry,
}

impl RegistryWriter<'_> {
    pub fn register<F>(&mut self, name: &str, factory: F) -> Result<(), PluginError>
    where
        F: Fn(&[Value], &Map<String, Value>) -> Result<Box<dyn PluginLoader>, PluginError>
            + 'static,
    {
        self.registry.register(name, factory)
    }
}
