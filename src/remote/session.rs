//! Remote sessions and the proxies they hand out.
//!
//! A [`RemoteSession`] turns remote ids into [`RemoteProxy`]s. The first
//! request for an id asks the entity which capabilities it implements, builds
//! handlers for those it can, and caches the proxy. The session owns the
//! id-to-proxy bijection that lets proxies cross the wire by reference: a
//! proxy argument goes out as a [`ComponentTransportable`] carrying its id,
//! and a returned reference comes back as the proxy already cached for that
//! id.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::capability::{self, Capability, CapabilityDescriptor};
use super::errors::RemoteError;
use super::handler::{HandlerFactories, HandlerManager, HandlerManagerFactory, RemoteHandlerFactory};
use super::invoke::{InvokeRequest, InvokeResponse, Invoker, OperationType};
use super::type_names;
use super::RemoteId;
use crate::oddjob::{RemoteOddjobBean, RemoteOddjobBeanHandler};

// ---------------------------------------------------------------------------
// ComponentTransportable
// ---------------------------------------------------------------------------

/// By-reference stand-in for a proxy on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentTransportable {
    pub remote_id: RemoteId,
}

impl ComponentTransportable {
    /// Server-side type name marking a value as a reference.
    pub const TYPE_NAME: &'static str = "org.oddjob.jmx.client.ComponentTransportable";
}

// ---------------------------------------------------------------------------
// RemoteValue
// ---------------------------------------------------------------------------

/// An argument to, or result of, a remote call: either a plain value or a
/// proxy travelling by reference.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteValue {
    Value(Value),
    Proxy(RemoteProxy),
}

impl RemoteValue {
    /// The proxy, if this is one.
    pub fn into_proxy(self) -> Option<RemoteProxy> {
        match self {
            Self::Proxy(proxy) => Some(proxy),
            Self::Value(_) => None,
        }
    }

    /// The plain value, if this is one.
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Value(value) => Some(value),
            Self::Proxy(_) => None,
        }
    }
}

impl From<Value> for RemoteValue {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<RemoteProxy> for RemoteValue {
    fn from(proxy: RemoteProxy) -> Self {
        Self::Proxy(proxy)
    }
}

impl From<&RemoteProxy> for RemoteValue {
    fn from(proxy: &RemoteProxy) -> Self {
        Self::Proxy(proxy.clone())
    }
}

impl From<bool> for RemoteValue {
    fn from(b: bool) -> Self {
        Self::Value(Value::Bool(b))
    }
}

impl From<i32> for RemoteValue {
    fn from(n: i32) -> Self {
        Self::Value(Value::from(n))
    }
}

impl From<i64> for RemoteValue {
    fn from(n: i64) -> Self {
        Self::Value(Value::from(n))
    }
}

impl From<&str> for RemoteValue {
    fn from(s: &str) -> Self {
        Self::Value(Value::String(s.to_string()))
    }
}

impl From<String> for RemoteValue {
    fn from(s: String) -> Self {
        Self::Value(Value::String(s))
    }
}

// ---------------------------------------------------------------------------
// RemoteProxy
// ---------------------------------------------------------------------------

static NEXT_PROXY_KEY: AtomicU64 = AtomicU64::new(1);

struct ProxyInner {
    /// Process-unique identity, used as the reverse-map key.
    key: u64,
    manager: HandlerManager,
}

/// Local stand-in for one remote entity.
///
/// Only answers which capabilities the entity has and hands out their
/// handlers. Clones are the same proxy; equality is identity.
#[derive(Clone)]
pub struct RemoteProxy {
    inner: Arc<ProxyInner>,
}

impl RemoteProxy {
    fn new(manager: HandlerManager) -> Self {
        Self {
            inner: Arc::new(ProxyInner {
                key: NEXT_PROXY_KEY.fetch_add(1, Ordering::Relaxed),
                manager,
            }),
        }
    }

    fn key(&self) -> u64 {
        self.inner.key
    }

    /// Whether the remote entity exposes capability `C`.
    pub fn is_a<C: Capability + ?Sized>(&self) -> bool {
        self.inner.manager.supports::<C>()
    }

    /// The handler for capability `C`.
    pub fn as_a<C: Capability + ?Sized>(&self) -> Result<Arc<C>, RemoteError> {
        self.inner
            .manager
            .handler_for::<C>()
            .ok_or_else(|| RemoteError::NotSupported {
                capability: C::NAME.to_string(),
            })
    }
}

impl PartialEq for RemoteProxy {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for RemoteProxy {}

impl fmt::Debug for RemoteProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteProxy")
            .field("key", &self.inner.key)
            .field("capabilities", &self.inner.manager)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// RemoteIdMappings
// ---------------------------------------------------------------------------

/// Two-way lookup between live proxies and their remote ids.
pub trait RemoteIdMappings {
    fn id_for(&self, proxy: &RemoteProxy) -> Option<RemoteId>;

    fn object_for(&self, remote_id: RemoteId) -> Option<RemoteProxy>;
}

#[derive(Default)]
struct Mappings {
    proxies: HashMap<RemoteId, RemoteProxy>,
    ids: HashMap<u64, RemoteId>,
}

struct SessionState {
    invoker: Arc<dyn Invoker>,
    manager_factory: HandlerManagerFactory,
    mappings: RwLock<Mappings>,
}

impl RemoteIdMappings for SessionState {
    fn id_for(&self, proxy: &RemoteProxy) -> Option<RemoteId> {
        self.mappings.read().ids.get(&proxy.key()).copied()
    }

    fn object_for(&self, remote_id: RemoteId) -> Option<RemoteProxy> {
        self.mappings.read().proxies.get(&remote_id).cloned()
    }
}

// ---------------------------------------------------------------------------
// ClientToolkit
// ---------------------------------------------------------------------------

/// Invocation channel bound to one remote id.
///
/// Handlers call through this. It rewrites proxy arguments into references
/// on the way out and resolves references back into proxies on the way in,
/// using the mappings of the session that created it.
#[derive(Clone)]
pub struct ClientToolkit {
    remote_id: RemoteId,
    session: Weak<SessionState>,
    invoker: Arc<dyn Invoker>,
}

impl fmt::Debug for ClientToolkit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientToolkit")
            .field("remote_id", &self.remote_id)
            .finish()
    }
}

impl ClientToolkit {
    /// The remote id every call is addressed to.
    pub fn remote_id(&self) -> RemoteId {
        self.remote_id
    }

    fn session(&self) -> Result<Arc<SessionState>, RemoteError> {
        self.session.upgrade().ok_or(RemoteError::SessionClosed)
    }

    /// Call `operation` and return its result as sent, with any returned
    /// reference resolved to its proxy.
    pub async fn invoke(
        &self,
        operation: &OperationType,
        args: Vec<RemoteValue>,
    ) -> Result<RemoteValue, RemoteError> {
        let (args, arg_types) = self.marshal(operation, args)?;

        let mut request = InvokeRequest::new(self.remote_id, operation.clone(), args);
        request.arg_types = arg_types;

        log::debug!("Invoking {} on remote {}", operation.name, self.remote_id);
        let response = self.invoker.invoke(request).await?;

        self.unmarshal(response)
    }

    /// Call `operation` and decode its plain-value result into `T`.
    pub async fn call<T: DeserializeOwned>(
        &self,
        operation: &OperationType,
        args: Vec<RemoteValue>,
    ) -> Result<T, RemoteError> {
        match self.invoke(operation, args).await? {
            RemoteValue::Value(value) => {
                serde_json::from_value(value).map_err(|e| RemoteError::Decode {
                    type_name: operation.result_type.clone(),
                    message: e.to_string(),
                })
            }
            RemoteValue::Proxy(_) => Err(RemoteError::Decode {
                type_name: operation.result_type.clone(),
                message: format!("{} returned a proxy where a value was expected", operation.name),
            }),
        }
    }

    /// Call an operation whose result is discarded.
    pub async fn call_void(
        &self,
        operation: &OperationType,
        args: Vec<RemoteValue>,
    ) -> Result<(), RemoteError> {
        self.invoke(operation, args).await.map(|_| ())
    }

    /// Call an operation returning a remote entity, or nothing.
    pub async fn call_for_proxy(
        &self,
        operation: &OperationType,
        args: Vec<RemoteValue>,
    ) -> Result<Option<RemoteProxy>, RemoteError> {
        match self.invoke(operation, args).await? {
            RemoteValue::Proxy(proxy) => Ok(Some(proxy)),
            RemoteValue::Value(Value::Null) => Ok(None),
            RemoteValue::Value(other) => Err(RemoteError::Decode {
                type_name: operation.result_type.clone(),
                message: format!("expected a reference, got {}", other),
            }),
        }
    }

    /// Replace proxies by references. When any argument was replaced, the
    /// returned type list covers every position.
    fn marshal(
        &self,
        operation: &OperationType,
        args: Vec<RemoteValue>,
    ) -> Result<(Vec<Value>, Option<Vec<String>>), RemoteError> {
        let mut substituted = false;
        let mut actual_args = Vec::with_capacity(args.len());
        let mut actual_types = Vec::with_capacity(args.len());

        for (index, arg) in args.into_iter().enumerate() {
            match arg {
                RemoteValue::Proxy(proxy) => {
                    let remote_id = self
                        .session()?
                        .id_for(&proxy)
                        .ok_or(RemoteError::DanglingProxy)?;
                    let reference = serde_json::to_value(ComponentTransportable { remote_id })
                        .map_err(|e| RemoteError::transport(format!("Cannot encode reference: {}", e)))?;
                    actual_args.push(reference);
                    actual_types.push(ComponentTransportable::TYPE_NAME.to_string());
                    substituted = true;
                }
                RemoteValue::Value(value) => {
                    actual_args.push(value);
                    actual_types.push(
                        operation
                            .arg_signature
                            .get(index)
                            .cloned()
                            .unwrap_or_else(|| type_names::OBJECT.to_string()),
                    );
                }
            }
        }

        Ok((actual_args, substituted.then_some(actual_types)))
    }

    fn unmarshal(&self, response: InvokeResponse) -> Result<RemoteValue, RemoteError> {
        match response.value {
            Some(value)
                if !value.is_null() && response.type_name == ComponentTransportable::TYPE_NAME =>
            {
                let reference: ComponentTransportable =
                    serde_json::from_value(value).map_err(|e| RemoteError::Decode {
                        type_name: response.type_name.clone(),
                        message: e.to_string(),
                    })?;
                self.session()?
                    .object_for(reference.remote_id)
                    .map(RemoteValue::Proxy)
                    .ok_or(RemoteError::UnknownRemoteId {
                        remote_id: reference.remote_id,
                    })
            }
            value => Ok(RemoteValue::Value(value.unwrap_or(Value::Null))),
        }
    }

    /// A toolkit belonging to no session, whose invoker always fails.
    #[cfg(test)]
    pub(crate) fn detached(remote_id: RemoteId) -> Self {
        struct Unreachable;

        #[async_trait::async_trait]
        impl Invoker for Unreachable {
            async fn invoke(&self, _request: InvokeRequest) -> Result<InvokeResponse, RemoteError> {
                Err(RemoteError::transport("detached toolkit"))
            }
        }

        Self {
            remote_id,
            session: Weak::new(),
            invoker: Arc::new(Unreachable),
        }
    }
}

// ---------------------------------------------------------------------------
// RemoteSession
// ---------------------------------------------------------------------------

/// Hands out one proxy per remote id and keeps the id-proxy bijection.
///
/// Cheap to clone; clones share state. Handlers keep only a weak reference,
/// so calls through proxies fail with `SessionClosed` once every clone of
/// the session is dropped.
#[derive(Clone)]
pub struct RemoteSession {
    state: Arc<SessionState>,
}

impl fmt::Debug for RemoteSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteSession")
            .field("proxies", &self.state.mappings.read().proxies.len())
            .finish()
    }
}

impl RemoteSession {
    fn toolkit_for(&self, remote_id: RemoteId) -> ClientToolkit {
        ClientToolkit {
            remote_id,
            session: Arc::downgrade(&self.state),
            invoker: Arc::clone(&self.state.invoker),
        }
    }

    /// The proxy for `remote_id`, discovering its capabilities first if it
    /// is not cached.
    ///
    /// Concurrent calls for the same uncached id may each run discovery; the
    /// first to finish is cached and every caller receives that proxy.
    pub async fn get_or_create(&self, remote_id: RemoteId) -> Result<RemoteProxy, RemoteError> {
        if let Some(proxy) = self.state.object_for(remote_id) {
            return Ok(proxy);
        }

        let toolkit = self.toolkit_for(remote_id);
        let bean: Arc<dyn RemoteOddjobBean> =
            RemoteOddjobBeanHandler.create_handler(toolkit.clone());
        let server_info = bean.server_info().await?;

        let capabilities: Vec<CapabilityDescriptor> = server_info
            .implementations
            .iter()
            .filter_map(|implementation| match capability::for_name(&implementation.type_name) {
                Ok(descriptor) => Some(descriptor),
                Err(_) => {
                    log::debug!(
                        "Remote {} implements {} which is not registered locally",
                        remote_id,
                        implementation.type_name
                    );
                    None
                }
            })
            .collect();

        let manager = self.state.manager_factory.create(&capabilities, &toolkit);
        let proxy = RemoteProxy::new(manager);

        let mut mappings = self.state.mappings.write();
        if let Some(existing) = mappings.proxies.get(&remote_id) {
            return Ok(existing.clone());
        }
        mappings.proxies.insert(remote_id, proxy.clone());
        mappings.ids.insert(proxy.key(), remote_id);

        log::debug!("Created proxy for remote {}: {:?}", remote_id, proxy);
        Ok(proxy)
    }

    /// Forget `proxy`. Its id is free for a later, independent
    /// [`get_or_create`](Self::get_or_create).
    ///
    /// Fails with `DanglingProxy` if the proxy is not live in this session.
    pub fn destroy(&self, proxy: &RemoteProxy) -> Result<(), RemoteError> {
        let mut mappings = self.state.mappings.write();
        let remote_id = mappings
            .ids
            .remove(&proxy.key())
            .ok_or(RemoteError::DanglingProxy)?;
        mappings.proxies.remove(&remote_id);

        log::debug!("Destroyed proxy for remote {}", remote_id);
        Ok(())
    }
}

impl RemoteIdMappings for RemoteSession {
    fn id_for(&self, proxy: &RemoteProxy) -> Option<RemoteId> {
        self.state.id_for(proxy)
    }

    fn object_for(&self, remote_id: RemoteId) -> Option<RemoteProxy> {
        self.state.object_for(remote_id)
    }
}

// ---------------------------------------------------------------------------
// RemoteSessionFactory
// ---------------------------------------------------------------------------

/// Collects handler factories, then creates sessions sharing them.
pub struct RemoteSessionFactory {
    invoker: Arc<dyn Invoker>,
    factories: HandlerFactories,
}

impl fmt::Debug for RemoteSessionFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteSessionFactory")
            .field("factories", &self.factories)
            .finish()
    }
}

impl RemoteSessionFactory {
    pub fn new(invoker: Arc<dyn Invoker>) -> Self {
        Self {
            invoker,
            factories: HandlerFactories::new(),
        }
    }

    /// Register a handler factory. Fails with `NotRegistered` if its
    /// capability is not in the process-wide registry.
    pub fn register<F: RemoteHandlerFactory>(mut self, factory: F) -> Result<Self, RemoteError> {
        self.factories.insert(factory)?;
        Ok(self)
    }

    /// Register the standard job-control handlers.
    pub fn register_job_control(self) -> Result<Self, RemoteError> {
        use crate::oddjob::{
            DragPointHandler, ObjectProxyHandler, ResettableHandler, RunnableHandler,
            StoppableHandler,
        };

        self.register(RunnableHandler)?
            .register(StoppableHandler)?
            .register(ResettableHandler)?
            .register(DragPointHandler)?
            .register(ObjectProxyHandler)
    }

    /// Create a new session with an empty proxy cache.
    pub fn create_remote_session(&self) -> RemoteSession {
        RemoteSession {
            state: Arc::new(SessionState {
                invoker: Arc::clone(&self.invoker),
                manager_factory: HandlerManagerFactory::new(self.factories.clone()),
                mappings: RwLock::new(Mappings::default()),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oddjob::{
        ConfigurationOwner, ConfigurationOwnerHandler, ObjectProxy, Resettable, Runnable,
        Stoppable, CONFIGURATION_OWNER, OBJECT_PROXY, RUNNABLE, SERVER_INFO,
    };
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::time::Duration;

    /// Answers from a script, recording every request.
    #[derive(Default)]
    struct ScriptedInvoker {
        requests: Mutex<Vec<InvokeRequest>>,
        responses: Mutex<VecDeque<InvokeResponse>>,
    }

    impl ScriptedInvoker {
        fn new(responses: Vec<InvokeResponse>) -> Arc<Self> {
            Arc::new(Self {
                requests: Mutex::new(Vec::new()),
                responses: Mutex::new(responses.into()),
            })
        }

        fn request(&self, index: usize) -> InvokeRequest {
            self.requests.lock()[index].clone()
        }

        fn count(&self) -> usize {
            self.requests.lock().len()
        }
    }

    #[async_trait]
    impl Invoker for ScriptedInvoker {
        async fn invoke(&self, request: InvokeRequest) -> Result<InvokeResponse, RemoteError> {
            self.requests.lock().push(request);
            self.responses
                .lock()
                .pop_front()
                .ok_or_else(|| RemoteError::transport("script exhausted"))
        }
    }

    /// Answers `serverInfo` with a fixed capability list, anything else with
    /// a string.
    struct Introspectable {
        implementations: Vec<&'static str>,
        requests: Mutex<Vec<InvokeRequest>>,
    }

    impl Introspectable {
        fn new(implementations: Vec<&'static str>) -> Arc<Self> {
            Arc::new(Self {
                implementations,
                requests: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Invoker for Introspectable {
        async fn invoke(&self, request: InvokeRequest) -> Result<InvokeResponse, RemoteError> {
            let is_server_info = request.operation_type.name == "serverInfo";
            self.requests.lock().push(request);
            if is_server_info {
                Ok(server_info(&self.implementations))
            } else {
                Ok(InvokeResponse::new(type_names::STRING, Some(json!("ok"))))
            }
        }
    }

    /// Never answers.
    struct Silent;

    #[async_trait]
    impl Invoker for Silent {
        async fn invoke(&self, _request: InvokeRequest) -> Result<InvokeResponse, RemoteError> {
            futures::future::pending().await
        }
    }

    fn server_info(types: &[&str]) -> InvokeResponse {
        let implementations: Vec<Value> = types
            .iter()
            .map(|t| json!({"type": t, "version": "2.0"}))
            .collect();
        InvokeResponse::new(SERVER_INFO, Some(json!({ "implementations": implementations })))
    }

    fn reference(remote_id: RemoteId) -> InvokeResponse {
        InvokeResponse::new(
            ComponentTransportable::TYPE_NAME,
            Some(json!({ "remoteId": remote_id })),
        )
    }

    #[tokio::test]
    async fn test_session_with_configuration_owner() {
        let invoker = ScriptedInvoker::new(vec![
            server_info(&[CONFIGURATION_OWNER]),
            InvokeResponse::new(type_names::STRING, Some(json!("Foo"))),
        ]);

        let session = RemoteSessionFactory::new(invoker.clone())
            .register(ConfigurationOwnerHandler)
            .unwrap()
            .create_remote_session();

        let proxy = session.get_or_create(1).await.unwrap();
        assert!(proxy.is_a::<dyn ConfigurationOwner>());

        let owner = proxy.as_a::<dyn ConfigurationOwner>().unwrap();
        let form = owner.blank_form(true, "some:foo", "foo.bar.foo").await.unwrap();
        assert_eq!(form, "Foo");

        let introspection = invoker.request(0);
        assert_eq!(introspection.remote_id, 1);
        assert_eq!(introspection.operation_type.name, "serverInfo");
        assert!(introspection.args.is_empty());

        let form_request = invoker.request(1);
        assert_eq!(form_request.args, vec![json!(true), json!("some:foo"), json!("foo.bar.foo")]);
        assert_eq!(form_request.remote_id, 1);
        assert!(form_request.arg_types.is_none());
    }

    #[tokio::test]
    async fn test_get_or_create_twice_returns_same_proxy() {
        let invoker = Introspectable::new(vec![RUNNABLE]);
        let session = RemoteSessionFactory::new(invoker.clone())
            .register_job_control()
            .unwrap()
            .create_remote_session();

        let first = session.get_or_create(7).await.unwrap();
        let second = session.get_or_create(7).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(invoker.requests.lock().len(), 1, "discovery runs once");
    }

    #[tokio::test]
    async fn test_create_destroy_create_again() {
        let invoker = Introspectable::new(vec![OBJECT_PROXY]);
        let session = RemoteSessionFactory::new(invoker.clone()).create_remote_session();

        let proxy1 = session.get_or_create(42).await.unwrap();
        session.destroy(&proxy1).unwrap();
        let proxy2 = session.get_or_create(42).await.unwrap();

        assert_ne!(proxy1, proxy2);
        assert_eq!(invoker.requests.lock().len(), 2, "discovery runs again");
        assert_eq!(session.id_for(&proxy2), Some(42));
        assert_eq!(session.id_for(&proxy1), None);
        assert_eq!(session.object_for(42), Some(proxy2));
    }

    #[tokio::test]
    async fn test_destroy_twice_is_dangling() {
        let session = RemoteSessionFactory::new(Introspectable::new(vec![])).create_remote_session();

        let proxy = session.get_or_create(3).await.unwrap();
        session.destroy(&proxy).unwrap();

        let err = session.destroy(&proxy).unwrap_err();
        assert!(matches!(err, RemoteError::DanglingProxy));
    }

    #[tokio::test]
    async fn test_is_a_requires_support_and_factory() {
        // The server reports Runnable and Stoppable plus a name unknown here;
        // only Runnable has a factory.
        let invoker = Introspectable::new(vec![RUNNABLE, crate::oddjob::STOPPABLE, "org.example.Mystery"]);
        let session = RemoteSessionFactory::new(invoker)
            .register(crate::oddjob::RunnableHandler)
            .unwrap()
            .create_remote_session();

        let proxy = session.get_or_create(1).await.unwrap();

        assert!(proxy.is_a::<dyn Runnable>());
        assert!(!proxy.is_a::<dyn Stoppable>());
        assert!(!proxy.is_a::<dyn Resettable>());
        assert!(!proxy.is_a::<dyn ConfigurationOwner>());

        match proxy.as_a::<dyn Stoppable>() {
            Err(RemoteError::NotSupported { capability }) => {
                assert_eq!(capability, crate::oddjob::STOPPABLE)
            }
            Err(other) => panic!("unexpected {:?}", other),
            Ok(_) => panic!("Stoppable has no factory"),
        }
    }

    #[tokio::test]
    async fn test_proxy_argument_becomes_reference_with_full_override() {
        let invoker = ScriptedInvoker::new(vec![
            server_info(&[CONFIGURATION_OWNER]),
            server_info(&[]),
            InvokeResponse::new(type_names::VOID, None),
        ]);
        let session = RemoteSessionFactory::new(invoker.clone()).create_remote_session();

        let owner_proxy = session.get_or_create(1).await.unwrap();
        let child = session.get_or_create(2).await.unwrap();

        let owner = owner_proxy.as_a::<dyn ConfigurationOwner>().unwrap();
        owner.replace_json(&child, "{}").await.unwrap();

        let request = invoker.request(2);
        assert_eq!(request.operation_type.name, "configReplaceJson");
        assert_eq!(request.args, vec![json!({"remoteId": 2}), json!("{}")]);
        assert_eq!(
            request.arg_types,
            Some(vec![
                ComponentTransportable::TYPE_NAME.to_string(),
                type_names::STRING.to_string()
            ])
        );
    }

    #[tokio::test]
    async fn test_override_length_matches_argument_count() {
        let invoker = ScriptedInvoker::new(vec![
            server_info(&[]),
            InvokeResponse::new(type_names::STRING, Some(json!("x"))),
        ]);
        let session = RemoteSessionFactory::new(invoker.clone()).create_remote_session();
        let proxy = session.get_or_create(4).await.unwrap();

        let toolkit = session.toolkit_for(4);
        let op = OperationType::new(
            "mixed",
            type_names::STRING,
            &[type_names::BOOLEAN, type_names::STRING, type_names::STRING],
        );
        toolkit
            .invoke(&op, vec![RemoteValue::from(&proxy), "a".into()])
            .await
            .unwrap();

        let request = invoker.request(1);
        assert_eq!(
            request.arg_types,
            Some(vec![
                ComponentTransportable::TYPE_NAME.to_string(),
                type_names::STRING.to_string()
            ])
        );
    }

    #[tokio::test]
    async fn test_destroyed_proxy_argument_is_dangling() {
        let invoker = ScriptedInvoker::new(vec![server_info(&[CONFIGURATION_OWNER]), server_info(&[])]);
        let session = RemoteSessionFactory::new(invoker.clone()).create_remote_session();

        let owner = session.get_or_create(1).await.unwrap().as_a::<dyn ConfigurationOwner>().unwrap();
        let child = session.get_or_create(2).await.unwrap();
        session.destroy(&child).unwrap();

        let err = owner.form_for(&child).await.unwrap_err();
        assert!(matches!(err, RemoteError::DanglingProxy));
        assert_eq!(invoker.count(), 2, "nothing sent for a dangling argument");
    }

    #[tokio::test]
    async fn test_proxy_from_another_session_is_dangling() {
        let invoker = Introspectable::new(vec![CONFIGURATION_OWNER]);
        let factory = RemoteSessionFactory::new(invoker);
        let here = factory.create_remote_session();
        let there = factory.create_remote_session();

        let owner = here.get_or_create(1).await.unwrap().as_a::<dyn ConfigurationOwner>().unwrap();
        let foreign = there.get_or_create(2).await.unwrap();

        let err = owner.form_for(&foreign).await.unwrap_err();
        assert_eq!(err.kind(), "DanglingProxy");
    }

    #[tokio::test]
    async fn test_returned_reference_resolves_to_cached_proxy() {
        let invoker = ScriptedInvoker::new(vec![server_info(&[]), server_info(&[]), reference(2)]);
        let session = RemoteSessionFactory::new(invoker.clone()).create_remote_session();
        session.get_or_create(1).await.unwrap();
        let two = session.get_or_create(2).await.unwrap();

        let op = OperationType::new("getChild", type_names::OBJECT, &[]);
        let child = session.toolkit_for(1).call_for_proxy(&op, vec![]).await.unwrap();

        assert_eq!(child, Some(two));
    }

    #[tokio::test]
    async fn test_returned_reference_unknown_id() {
        let invoker = ScriptedInvoker::new(vec![server_info(&[]), reference(99)]);
        let session = RemoteSessionFactory::new(invoker).create_remote_session();
        session.get_or_create(1).await.unwrap();

        let op = OperationType::new("getChild", type_names::OBJECT, &[]);
        let err = session.toolkit_for(1).invoke(&op, vec![]).await.unwrap_err();

        assert!(matches!(err, RemoteError::UnknownRemoteId { remote_id: 99 }));
    }

    #[tokio::test]
    async fn test_other_types_return_raw_value() {
        let invoker = ScriptedInvoker::new(vec![
            server_info(&[]),
            InvokeResponse::new("java.util.Map", Some(json!({"remoteId": 1}))),
            InvokeResponse::new(type_names::VOID, None),
        ]);
        let session = RemoteSessionFactory::new(invoker).create_remote_session();
        session.get_or_create(1).await.unwrap();
        let toolkit = session.toolkit_for(1);

        let op = OperationType::new("props", "java.util.Map", &[]);
        let value = toolkit.invoke(&op, vec![]).await.unwrap();
        assert_eq!(value, RemoteValue::Value(json!({"remoteId": 1})));

        let op = OperationType::new("run", type_names::VOID, &[]);
        let value = toolkit.invoke(&op, vec![]).await.unwrap();
        assert_eq!(value, RemoteValue::Value(Value::Null));
    }

    #[tokio::test]
    async fn test_transport_error_propagates_from_discovery() {
        let invoker = ScriptedInvoker::new(vec![]);
        let session = RemoteSessionFactory::new(invoker).create_remote_session();

        let err = session.get_or_create(5).await.unwrap_err();
        assert_eq!(err.kind(), "TransportError");
        assert!(session.object_for(5).is_none(), "failed discovery caches nothing");
    }

    #[tokio::test]
    async fn test_concurrent_get_or_create_caches_one_proxy() {
        /// Holds every discovery until two are in flight.
        struct Gated {
            gate: tokio::sync::Barrier,
            discoveries: Mutex<usize>,
        }

        #[async_trait]
        impl Invoker for Gated {
            async fn invoke(&self, _request: InvokeRequest) -> Result<InvokeResponse, RemoteError> {
                *self.discoveries.lock() += 1;
                self.gate.wait().await;
                Ok(server_info(&[RUNNABLE]))
            }
        }

        let invoker = Arc::new(Gated {
            gate: tokio::sync::Barrier::new(2),
            discoveries: Mutex::new(0),
        });
        let session = RemoteSessionFactory::new(invoker.clone())
            .register_job_control()
            .unwrap()
            .create_remote_session();

        let (a, b) = tokio::join!(session.get_or_create(8), session.get_or_create(8));
        let (a, b) = (a.unwrap(), b.unwrap());

        assert_eq!(*invoker.discoveries.lock(), 2, "both discoveries ran");
        assert_eq!(a, b, "the later finisher returns the cached proxy");
        assert!(a.is_a::<dyn Runnable>());
        assert_eq!(session.object_for(8), Some(a.clone()));
        assert_eq!(session.id_for(&a), Some(8));
    }

    #[tokio::test]
    async fn test_handlers_fail_after_session_dropped() {
        let invoker = ScriptedInvoker::new(vec![
            server_info(&[CONFIGURATION_OWNER]),
            server_info(&[]),
        ]);
        let session = RemoteSessionFactory::new(invoker).create_remote_session();
        let owner = session.get_or_create(1).await.unwrap().as_a::<dyn ConfigurationOwner>().unwrap();
        let child = session.get_or_create(2).await.unwrap();
        drop(session);

        let err = owner.form_for(&child).await.unwrap_err();
        assert!(matches!(err, RemoteError::SessionClosed));
    }

    #[tokio::test]
    async fn test_job_control_handlers_call_through() {
        let invoker = Introspectable::new(vec![RUNNABLE, OBJECT_PROXY]);
        let session = RemoteSessionFactory::new(invoker.clone())
            .register_job_control()
            .unwrap()
            .create_remote_session();
        let proxy = session.get_or_create(11).await.unwrap();

        proxy.as_a::<dyn Runnable>().unwrap().run().await.unwrap();
        let text = proxy.as_a::<dyn ObjectProxy>().unwrap().to_string().await.unwrap();
        assert_eq!(text, "ok");

        let requests = invoker.requests.lock();
        assert_eq!(requests[1].operation_type.name, "run");
        assert_eq!(requests[1].remote_id, 11);
        assert_eq!(requests[2].operation_type.name, "toString");
    }

    #[tokio::test]
    async fn test_pending_invocation_has_no_timeout() {
        let session = RemoteSessionFactory::new(Arc::new(Silent)).create_remote_session();

        let outcome = tokio::time::timeout(Duration::from_millis(100), session.get_or_create(1)).await;

        assert!(outcome.is_err(), "the core imposes no timeout of its own");
    }
}
