//! Capability handler factories and the per-entity handler manager.
//!
//! A [`RemoteHandlerFactory`] turns an invocation channel bound to one remote
//! id into a local implementation of one capability. The
//! [`HandlerManagerFactory`] builds, for a given id, a [`HandlerManager`]
//! holding only the capabilities that id supports and that have a factory.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::capability::{self, Capability, CapabilityDescriptor};
use super::errors::RemoteError;
use super::session::ClientToolkit;
use crate::oddjob::{ConfigurationOwnerHandler, RemoteOddjobBeanHandler};

/// Builds the local implementation of one capability.
pub trait RemoteHandlerFactory: Send + Sync + 'static {
    /// The capability produced, e.g. `dyn Runnable`.
    type Capability: Capability + ?Sized;

    /// Create a handler whose every call goes through `toolkit`.
    fn create_handler(&self, toolkit: ClientToolkit) -> Arc<Self::Capability>;
}

/// A handler with its capability type erased. Always holds an `Arc<C>`.
type HandlerBox = Box<dyn Any + Send + Sync>;

trait ErasedHandlerFactory: Send + Sync {
    fn create(&self, toolkit: ClientToolkit) -> HandlerBox;
}

impl<F: RemoteHandlerFactory> ErasedHandlerFactory for F {
    fn create(&self, toolkit: ClientToolkit) -> HandlerBox {
        Box::new(self.create_handler(toolkit))
    }
}

// ---------------------------------------------------------------------------
// HandlerFactories
// ---------------------------------------------------------------------------

/// Factories keyed by the capability they build.
#[derive(Clone, Default)]
pub struct HandlerFactories {
    factories: HashMap<CapabilityDescriptor, Arc<dyn ErasedHandlerFactory>>,
}

impl HandlerFactories {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a factory, replacing any earlier one for the same capability.
    ///
    /// Fails with `NotRegistered` if the capability type is not in the
    /// process-wide registry.
    pub fn insert<F: RemoteHandlerFactory>(&mut self, factory: F) -> Result<(), RemoteError> {
        let descriptor = capability::for_type::<F::Capability>()?;
        self.factories.insert(descriptor, Arc::new(factory));
        Ok(())
    }

    fn insert_if_absent<F: RemoteHandlerFactory>(&mut self, factory: F) {
        match capability::for_type::<F::Capability>() {
            Ok(descriptor) => {
                self.factories
                    .entry(descriptor)
                    .or_insert_with(|| Arc::new(factory));
            }
            Err(e) => log::error!("Built-in handler unavailable: {}", e),
        }
    }

    /// Whether a factory exists for `descriptor`.
    pub fn contains(&self, descriptor: &CapabilityDescriptor) -> bool {
        self.factories.contains_key(descriptor)
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl fmt::Debug for HandlerFactories {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.factories.keys()).finish()
    }
}

// ---------------------------------------------------------------------------
// HandlerManager
// ---------------------------------------------------------------------------

/// The capability implementations one remote entity actually exposes.
pub struct HandlerManager {
    handlers: HashMap<TypeId, (CapabilityDescriptor, HandlerBox)>,
}

impl HandlerManager {
    /// The handler for capability `C`, if this entity exposes it.
    pub fn handler_for<C: Capability + ?Sized>(&self) -> Option<Arc<C>> {
        self.handlers
            .get(&TypeId::of::<C>())
            .and_then(|(_, handler)| handler.downcast_ref::<Arc<C>>())
            .cloned()
    }

    /// Whether capability `C` is exposed.
    pub fn supports<C: Capability + ?Sized>(&self) -> bool {
        self.handlers.contains_key(&TypeId::of::<C>())
    }

    /// Descriptors of every exposed capability.
    pub fn capabilities(&self) -> impl Iterator<Item = CapabilityDescriptor> + '_ {
        self.handlers.values().map(|(descriptor, _)| *descriptor)
    }
}

impl fmt::Debug for HandlerManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.capabilities()).finish()
    }
}

// ---------------------------------------------------------------------------
// HandlerManagerFactory
// ---------------------------------------------------------------------------

/// Builds [`HandlerManager`]s from the registered factories plus the
/// built-in introspection and configuration-ownership handlers.
#[derive(Clone, Debug)]
pub struct HandlerManagerFactory {
    factories: HandlerFactories,
}

impl HandlerManagerFactory {
    pub fn new(mut factories: HandlerFactories) -> Self {
        factories.insert_if_absent(RemoteOddjobBeanHandler);
        factories.insert_if_absent(ConfigurationOwnerHandler);
        Self { factories }
    }

    /// Build handlers for each of `capabilities` that has a factory.
    /// Capabilities without one are left out.
    pub fn create(
        &self,
        capabilities: &[CapabilityDescriptor],
        toolkit: &ClientToolkit,
    ) -> HandlerManager {
        let mut handlers = HashMap::new();

        for descriptor in capabilities {
            match self.factories.factories.get(descriptor) {
                Some(factory) => {
                    handlers.insert(
                        descriptor.type_id(),
                        (*descriptor, factory.create(toolkit.clone())),
                    );
                }
                None => log::debug!(
                    "No handler factory for {} on remote {}",
                    descriptor,
                    toolkit.remote_id()
                ),
            }
        }

        HandlerManager { handlers }
    }
}
