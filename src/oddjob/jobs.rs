//! Job-control capabilities.

use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::Lazy;

use super::{DRAG_POINT, OBJECT_PROXY, RESETTABLE, RUNNABLE, STOPPABLE};
use crate::remote::capability::Capability;
use crate::remote::errors::RemoteError;
use crate::remote::handler::RemoteHandlerFactory;
use crate::remote::invoke::OperationType;
use crate::remote::session::ClientToolkit;
use crate::remote::type_names;

// ----- Runnable -----

#[async_trait]
pub trait Runnable: Send + Sync {
    async fn run(&self) -> Result<(), RemoteError>;
}

impl Capability for dyn Runnable {
    const NAME: &'static str = RUNNABLE;
}

static RUN: Lazy<OperationType> = Lazy::new(|| OperationType::new("run", type_names::VOID, &[]));

#[derive(Debug, Clone, Copy, Default)]
pub struct RunnableHandler;

struct RunnableImpl {
    toolkit: ClientToolkit,
}

#[async_trait]
impl Runnable for RunnableImpl {
    async fn run(&self) -> Result<(), RemoteError> {
        self.toolkit.call_void(&RUN, vec![]).await
    }
}

impl RemoteHandlerFactory for RunnableHandler {
    type Capability = dyn Runnable;

    fn create_handler(&self, toolkit: ClientToolkit) -> Arc<dyn Runnable> {
        Arc::new(RunnableImpl { toolkit })
    }
}

// ----- Stoppable -----

#[async_trait]
pub trait Stoppable: Send + Sync {
    async fn stop(&self) -> Result<(), RemoteError>;
}

impl Capability for dyn Stoppable {
    const NAME: &'static str = STOPPABLE;
}

static STOP: Lazy<OperationType> = Lazy::new(|| OperationType::new("stop", type_names::VOID, &[]));

#[derive(Debug, Clone, Copy, Default)]
pub struct StoppableHandler;

struct StoppableImpl {
    toolkit: ClientToolkit,
}

#[async_trait]
impl Stoppable for StoppableImpl {
    async fn stop(&self) -> Result<(), RemoteError> {
        self.toolkit.call_void(&STOP, vec![]).await
    }
}

impl RemoteHandlerFactory for StoppableHandler {
    type Capability = dyn Stoppable;

    fn create_handler(&self, toolkit: ClientToolkit) -> Arc<dyn Stoppable> {
        Arc::new(StoppableImpl { toolkit })
    }
}

// ----- Resettable -----

/// A job that can be returned to its ready state.
#[async_trait]
pub trait Resettable: Send + Sync {
    /// Reset after an exception or incomplete run. Returns whether the job
    /// was reset.
    async fn soft_reset(&self) -> Result<bool, RemoteError>;

    /// Reset whatever the state. Returns whether the job was reset.
    async fn hard_reset(&self) -> Result<bool, RemoteError>;
}

impl Capability for dyn Resettable {
    const NAME: &'static str = RESETTABLE;
}

static SOFT_RESET: Lazy<OperationType> =
    Lazy::new(|| OperationType::new("softReset", type_names::BOOLEAN, &[]));

static HARD_RESET: Lazy<OperationType> =
    Lazy::new(|| OperationType::new("hardReset", type_names::BOOLEAN, &[]));

#[derive(Debug, Clone, Copy, Default)]
pub struct ResettableHandler;

struct ResettableImpl {
    toolkit: ClientToolkit,
}

#[async_trait]
impl Resettable for ResettableImpl {
    async fn soft_reset(&self) -> Result<bool, RemoteError> {
        self.toolkit.call(&SOFT_RESET, vec![]).await
    }

    async fn hard_reset(&self) -> Result<bool, RemoteError> {
        self.toolkit.call(&HARD_RESET, vec![]).await
    }
}

impl RemoteHandlerFactory for ResettableHandler {
    type Capability = dyn Resettable;

    fn create_handler(&self, toolkit: ClientToolkit) -> Arc<dyn Resettable> {
        Arc::new(ResettableImpl { toolkit })
    }
}

// ----- DragPoint -----

/// Clipboard-style editing of a component's place in its owner's
/// configuration.
#[async_trait]
pub trait DragPoint: Send + Sync {
    /// Remove the component, returning its configuration.
    async fn cut(&self) -> Result<String, RemoteError>;

    /// The component's configuration.
    async fn copy(&self) -> Result<String, RemoteError>;

    /// Insert `config` as a child at `index`; -1 appends.
    async fn paste(&self, index: i32, config: &str) -> Result<(), RemoteError>;

    async fn delete(&self) -> Result<(), RemoteError>;
}

impl Capability for dyn DragPoint {
    const NAME: &'static str = DRAG_POINT;
}

static CUT: Lazy<OperationType> =
    Lazy::new(|| OperationType::new("cut", type_names::STRING, &[]));

static COPY: Lazy<OperationType> =
    Lazy::new(|| OperationType::new("copy", type_names::STRING, &[]));

static PASTE: Lazy<OperationType> = Lazy::new(|| {
    OperationType::new(
        "paste",
        type_names::VOID,
        &[type_names::INT, type_names::STRING],
    )
});

static DELETE: Lazy<OperationType> =
    Lazy::new(|| OperationType::new("delete", type_names::VOID, &[]));

#[derive(Debug, Clone, Copy, Default)]
pub struct DragPointHandler;

struct DragPointImpl {
    toolkit: ClientToolkit,
}

#[async_trait]
impl DragPoint for DragPointImpl {
    async fn cut(&self) -> Result<String, RemoteError> {
        self.toolkit.call(&CUT, vec![]).await
    }

    async fn copy(&self) -> Result<String, RemoteError> {
        self.toolkit.call(&COPY, vec![]).await
    }

    async fn paste(&self, index: i32, config: &str) -> Result<(), RemoteError> {
        self.toolkit
            .call_void(&PASTE, vec![index.into(), config.into()])
            .await
    }

    async fn delete(&self) -> Result<(), RemoteError> {
        self.toolkit.call_void(&DELETE, vec![]).await
    }
}

impl RemoteHandlerFactory for DragPointHandler {
    type Capability = dyn DragPoint;

    fn create_handler(&self, toolkit: ClientToolkit) -> Arc<dyn DragPoint> {
        Arc::new(DragPointImpl { toolkit })
    }
}

// ----- ObjectProxy -----

/// Operations every remote object has.
#[async_trait]
pub trait ObjectProxy: Send + Sync {
    /// The server-side string form of the object.
    async fn to_string(&self) -> Result<String, RemoteError>;
}

impl Capability for dyn ObjectProxy {
    const NAME: &'static str = OBJECT_PROXY;
}

static TO_STRING: Lazy<OperationType> =
    Lazy::new(|| OperationType::new("toString", type_names::STRING, &[]));

#[derive(Debug, Clone, Copy, Default)]
pub struct ObjectProxyHandler;

struct ObjectProxyImpl {
    toolkit: ClientToolkit,
}

#[async_trait]
impl ObjectProxy for ObjectProxyImpl {
    async fn to_string(&self) -> Result<String, RemoteError> {
        self.toolkit.call(&TO_STRING, vec![]).await
    }
}

impl RemoteHandlerFactory for ObjectProxyHandler {
    type Capability = dyn ObjectProxy;

    fn create_handler(&self, toolkit: ClientToolkit) -> Arc<dyn ObjectProxy> {
        Arc::new(ObjectProxyImpl { toolkit })
    }
}
