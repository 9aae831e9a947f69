//! # ojremote
//!
//! Client for driving the components of a remote Oddjob job server.
//!
//! Each server-side component is addressed by a numeric remote id. A
//! [`RemoteSession`] discovers what a component can do and hands back a
//! [`RemoteProxy`]; capability handlers obtained from the proxy turn local
//! method calls into invocation requests, passing other proxies by
//! reference. Server-pushed events arrive through a [`RemoteNotifier`].
//!
//! ```no_run
//! use std::sync::Arc;
//! use ojremote::oddjob::Runnable;
//! use ojremote::remote::{HttpInvoker, RemoteSessionFactory};
//!
//! # async fn demo() -> Result<(), ojremote::RemoteError> {
//! let invoker = HttpInvoker::new("http://localhost:8080/invoke")?;
//! let session = RemoteSessionFactory::new(Arc::new(invoker))
//!     .register_job_control()?
//!     .create_remote_session();
//!
//! let job = session.get_or_create(0).await?;
//! if job.is_a::<dyn Runnable>() {
//!     job.as_a::<dyn Runnable>()?.run().await?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod oddjob;
pub mod remote;

pub use remote::{
    Capability, HttpInvoker, Notifier, RemoteConfig, RemoteError, RemoteNotifier, RemoteProxy,
    RemoteSession, RemoteSessionFactory,
};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
