//! Client side of a remote-proxy protocol for job servers.
//!
//! Remote entities are addressed by numeric id. A [`RemoteSession`] discovers
//! which capabilities an id implements and hands back a [`RemoteProxy`]
//! carrying one handler per capability. Calls travel over an [`Invoker`];
//! server-pushed events arrive through a [`Notifier`].

pub mod capability;
pub mod config;
pub mod errors;
pub mod handler;
pub mod invoke;
pub mod notify;
pub mod session;
pub mod type_names;

/// Server-assigned identifier of a remote entity.
pub type RemoteId = u64;

// Re-export main types.
pub use capability::{Capability, CapabilityDescriptor, CapabilityRegistry};
pub use config::RemoteConfig;
pub use errors::RemoteError;
pub use handler::{HandlerFactories, HandlerManager, HandlerManagerFactory, RemoteHandlerFactory};
pub use invoke::{HttpInvoker, InvokeRequest, InvokeResponse, Invoker, OperationType};
pub use notify::{Notification, NotificationListener, NotificationType, Notifier, RemoteNotifier};
pub use session::{
    ClientToolkit, ComponentTransportable, RemoteIdMappings, RemoteProxy, RemoteSession,
    RemoteSessionFactory, RemoteValue,
};
