//! Capability registry: the process-wide table mapping capability names
//! (the server-side interface identifiers) to local capability types.
//!
//! A capability is a handler trait such as `dyn Runnable`. The registry is
//! filled once, before any session exists, and read afterwards:
//!
//! 1. Capabilities shipped with this crate are registered on first access.
//! 2. The embedding application registers its own with [`register`] during
//!    startup.
//!
//! Lookups run both ways, by local type and by name, because the server only
//! ever tells the client names.

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;

use once_cell::sync::Lazy;
use parking_lot::RwLock;

use super::errors::RemoteError;

/// A capability a remote entity may support.
///
/// Implemented for the handler trait object type, e.g.
/// `impl Capability for dyn Runnable`, so that `proxy.as_a::<dyn Runnable>()`
/// hands back an `Arc<dyn Runnable>`.
pub trait Capability: Send + Sync + 'static {
    /// Server-side interface name, globally unique.
    const NAME: &'static str;
}

/// Identity of one registered capability.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct CapabilityDescriptor {
    name: &'static str,
    type_id: TypeId,
    type_name: &'static str,
}

impl CapabilityDescriptor {
    /// Server-side interface name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The local type this capability is bound to.
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Rust name of the local type, for diagnostics.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl fmt::Debug for CapabilityDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Capability({} => {})", self.name, self.type_name)
    }
}

impl fmt::Display for CapabilityDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Two-way index of capability descriptors.
#[derive(Debug, Default)]
pub struct CapabilityRegistry {
    by_type: HashMap<TypeId, CapabilityDescriptor>,
    by_name: HashMap<&'static str, CapabilityDescriptor>,
}

impl CapabilityRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register capability `C` and return its descriptor.
    ///
    /// # Panics
    ///
    /// Registering the same type twice, or a second type under an existing
    /// name, is a programming error and panics.
    pub fn register<C: Capability + ?Sized>(&mut self) -> CapabilityDescriptor {
        let descriptor = CapabilityDescriptor {
            name: C::NAME,
            type_id: TypeId::of::<C>(),
            type_name: std::any::type_name::<C>(),
        };

        if let Some(existing) = self.by_type.get(&descriptor.type_id) {
            panic!("{:?} registered twice", existing);
        }
        if let Some(existing) = self.by_name.get(descriptor.name) {
            panic!(
                "capability name {} already taken by {}, cannot register {}",
                descriptor.name, existing.type_name, descriptor.type_name
            );
        }

        log::debug!("Registered {:?}", descriptor);
        self.by_type.insert(descriptor.type_id, descriptor);
        self.by_name.insert(descriptor.name, descriptor);
        descriptor
    }

    /// Descriptor for the local type `C`.
    pub fn for_type<C: ?Sized + 'static>(&self) -> Result<CapabilityDescriptor, RemoteError> {
        self.by_type
            .get(&TypeId::of::<C>())
            .copied()
            .ok_or_else(|| RemoteError::NotRegistered {
                name: std::any::type_name::<C>().to_string(),
            })
    }

    /// Descriptor registered under a server-side name.
    pub fn for_name(&self, name: &str) -> Result<CapabilityDescriptor, RemoteError> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| RemoteError::NotRegistered {
                name: name.to_string(),
            })
    }

    /// Whether a server-side name has a local capability.
    pub fn is_known(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Number of registered capabilities.
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Process-wide registry
// ---------------------------------------------------------------------------

static CAPABILITIES: Lazy<RwLock<CapabilityRegistry>> = Lazy::new(|| {
    let mut registry = CapabilityRegistry::new();
    crate::oddjob::register_capabilities(&mut registry);
    RwLock::new(registry)
});

/// Register an application capability in the process-wide registry.
///
/// Call once per capability during startup, before creating sessions.
///
/// # Panics
///
/// See [`CapabilityRegistry::register`].
pub fn register<C: Capability + ?Sized>() -> CapabilityDescriptor {
    CAPABILITIES.write().register::<C>()
}

/// Look up the descriptor for local type `C`.
pub fn for_type<C: ?Sized + 'static>() -> Result<CapabilityDescriptor, RemoteError> {
    CAPABILITIES.read().for_type::<C>()
}

/// Look up the descriptor registered under `name`.
pub fn for_name(name: &str) -> Result<CapabilityDescriptor, RemoteError> {
    CAPABILITIES.read().for_name(name)
}

/// Whether `name` is known to the process-wide registry.
pub fn is_known(name: &str) -> bool {
    CAPABILITIES.read().is_known(name)
}
