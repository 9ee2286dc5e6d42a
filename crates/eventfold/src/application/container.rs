// File: src/application/container.rs
//
// Dependency injection container: singleton type -> instance map with
// lazy construction and topological resolution

use std::any::{type_name, Any, TypeId};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use crate::error::{FrameworkError, FrameworkResult};

/// A dependency another factory requires, by type. Collected with
/// [`DependencyKey::of`] so resolution failures can name types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DependencyKey {
    type_id: TypeId,
    type_name: &'static str,
}

impl DependencyKey {
    pub fn of<T: 'static>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
        }
    }
}

type Factory = Box<dyn Fn(&DependencyContainer) -> FrameworkResult<Box<dyn Any + Send + Sync>> + Send + Sync>;

struct FactoryEntry {
    type_name: &'static str,
    dependencies: Vec<DependencyKey>,
    build: Factory,
}

/// Singleton dependency container.
///
/// Registration accepts an instance or a factory with an explicitly
/// declared dependency list (Rust has no constructor reflection; the
/// declaration plays the role of parameter inspection). Resolution is
/// lazy: a factory runs on first resolve and its product is cached.
/// Registered values must be `Clone` — in practice `Arc`-wrapped services
/// and small config structs.
///
/// The only process-wide mutable state of the framework lives here, inside
/// an application instance; there is no global registry.
pub struct DependencyContainer {
    factories: HashMap<TypeId, FactoryEntry>,
    instances: Mutex<HashMap<TypeId, Box<dyn Any + Send + Sync>>>,
    resolving: Mutex<HashSet<TypeId>>,
}

impl DependencyContainer {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
            instances: Mutex::new(HashMap::new()),
            resolving: Mutex::new(HashSet::new()),
        }
    }

    /// Register an instance. Re-registering a type overrides the previous
    /// registration, so defaults can be replaced.
    pub fn register<T: Clone + Send + Sync + 'static>(&mut self, instance: T) {
        let key = TypeId::of::<T>();
        self.factories.remove(&key);
        self.instances
            .lock()
            .expect("container instances lock")
            .insert(key, Box::new(instance));
    }

    /// Register a factory with its declared dependencies. The factory runs
    /// at first resolve, receiving the container to pull its dependencies
    /// from.
    pub fn register_factory<T, F>(&mut self, dependencies: Vec<DependencyKey>, build: F)
    where
        T: Clone + Send + Sync + 'static,
        F: Fn(&DependencyContainer) -> FrameworkResult<T> + Send + Sync + 'static,
    {
        let key = TypeId::of::<T>();
        self.instances
            .lock()
            .expect("container instances lock")
            .remove(&key);
        self.factories.insert(
            key,
            FactoryEntry {
                type_name: type_name::<T>(),
                dependencies,
                build: Box::new(move |container| Ok(Box::new(build(container)?))),
            },
        );
    }

    /// Resolve a dependency, building it (and caching the result) when a
    /// factory is registered. Detects circular resolution.
    pub fn resolve<T: Clone + Send + Sync + 'static>(&self) -> FrameworkResult<T> {
        let key = TypeId::of::<T>();

        if let Some(instance) = self
            .instances
            .lock()
            .expect("container instances lock")
            .get(&key)
        {
            return instance
                .downcast_ref::<T>()
                .cloned()
                .ok_or_else(|| FrameworkError::DependencyResolution {
                    message: format!("registered instance for {} has wrong type", type_name::<T>()),
                });
        }

        let Some(entry) = self.factories.get(&key) else {
            return Err(FrameworkError::DependencyResolution {
                message: format!(
                    "dependency {} not registered; available: {}",
                    type_name::<T>(),
                    self.registered_names().join(", ")
                ),
            });
        };

        {
            let mut resolving = self.resolving.lock().expect("container resolving lock");
            if !resolving.insert(key) {
                return Err(FrameworkError::DependencyResolution {
                    message: format!("circular dependency while resolving {}", type_name::<T>()),
                });
            }
        }

        let built = (entry.build)(self);

        self.resolving
            .lock()
            .expect("container resolving lock")
            .remove(&key);

        let built = built?;
        let instance = built
            .downcast_ref::<T>()
            .cloned()
            .ok_or_else(|| FrameworkError::DependencyResolution {
                message: format!("factory for {} produced wrong type", type_name::<T>()),
            })?;

        self.instances
            .lock()
            .expect("container instances lock")
            .insert(key, built);
        Ok(instance)
    }

    /// Resolve every registered factory in dependency order.
    ///
    /// Repeatedly builds any factory whose declared dependencies are all
    /// instantiated; a pass without progress means missing or circular
    /// dependencies, reported by name.
    pub fn resolve_all(&self) -> FrameworkResult<()> {
        let mut remaining: HashSet<TypeId> = {
            let instances = self.instances.lock().expect("container instances lock");
            self.factories
                .keys()
                .filter(|key| !instances.contains_key(key))
                .copied()
                .collect()
        };

        while !remaining.is_empty() {
            let mut made_progress = false;

            for key in remaining.clone() {
                let entry = &self.factories[&key];
                let satisfied = {
                    let instances = self.instances.lock().expect("container instances lock");
                    entry
                        .dependencies
                        .iter()
                        .all(|dep| instances.contains_key(&dep.type_id))
                };
                if satisfied {
                    let built = (entry.build)(self)?;
                    self.instances
                        .lock()
                        .expect("container instances lock")
                        .insert(key, built);
                    remaining.remove(&key);
                    made_progress = true;
                }
            }

            if !made_progress {
                let mut unresolved = Vec::new();
                {
                    let instances = self.instances.lock().expect("container instances lock");
                    for key in &remaining {
                        let entry = &self.factories[key];
                        let missing: Vec<&str> = entry
                            .dependencies
                            .iter()
                            .filter(|dep| !instances.contains_key(&dep.type_id))
                            .map(|dep| dep.type_name)
                            .collect();
                        unresolved
                            .push(format!("{} (missing: {})", entry.type_name, missing.join(", ")));
                    }
                }
                unresolved.sort();
                return Err(FrameworkError::DependencyResolution {
                    message: format!(
                        "unresolvable dependencies (missing or circular): {}",
                        unresolved.join("; ")
                    ),
                });
            }
        }
        Ok(())
    }

    fn registered_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .factories
            .values()
            .map(|entry| entry.type_name.to_string())
            .collect();
        names.sort();
        names
    }
}

impl Default for DependencyContainer {
    fn default() -> Self {
        Self::new()
    }
}
