//! Capabilities of an Oddjob job server.
//!
//! Two are built in and always available on every proxy that reports them:
//! introspection ([`RemoteOddjobBean`]) and configuration ownership
//! ([`ConfigurationOwner`]). The job-control capabilities are opt-in through
//! [`RemoteSessionFactory::register_job_control`](crate::remote::RemoteSessionFactory::register_job_control).

pub mod builtin;
pub mod jobs;

use once_cell::sync::Lazy;

use crate::remote::capability::CapabilityRegistry;
use crate::remote::notify::NotificationType;

pub use builtin::{
    ConfigurationOwner, ConfigurationOwnerHandler, Implementation, RemoteOddjobBean,
    RemoteOddjobBeanHandler, ServerInfo,
};
pub use jobs::{
    DragPoint, DragPointHandler, ObjectProxy, ObjectProxyHandler, Resettable, ResettableHandler,
    Runnable, RunnableHandler, Stoppable, StoppableHandler,
};

// ----- Server-side names -----

pub const REMOTE_ODDJOB_BEAN: &str = "org.oddjob.jmx.RemoteOddjobBean";
pub const SERVER_INFO: &str = "org.oddjob.jmx.server.ServerInfo";
pub const CONFIGURATION_OWNER: &str = "org.oddjob.arooa.parsing.ConfigurationOwner";
pub const RUNNABLE: &str = "java.lang.Runnable";
pub const STOPPABLE: &str = "org.oddjob.Stoppable";
pub const RESETTABLE: &str = "org.oddjob.Resettable";
pub const DRAG_POINT: &str = "org.oddjob.arooa.parsing.DragPoint";
pub const OBJECT_PROXY: &str = "java.lang.Object";

/// Pushed by the server whenever a job's icon changes, which is how a
/// client follows job state.
///
/// The server only identifies icon notifications by the `org.oddjob.Iconic`
/// interface; the name and payload type used here are assumed and must match
/// whatever the server is configured to emit.
pub static ICON_NOTIFICATION: Lazy<NotificationType> =
    Lazy::new(|| NotificationType::new("org.oddjob.iconic.icon", "org.oddjob.images.IconEvent"));

/// Add every capability in this module to `registry`.
pub fn register_capabilities(registry: &mut CapabilityRegistry) {
    registry.register::<dyn RemoteOddjobBean>();
    registry.register::<dyn ConfigurationOwner>();
    registry.register::<dyn Runnable>();
    registry.register::<dyn Stoppable>();
    registry.register::<dyn Resettable>();
    registry.register::<dyn DragPoint>();
    registry.register::<dyn ObjectProxy>();
}
