//! Introspection and configuration ownership, the two capabilities every
//! session handles without registration.

use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use super::{CONFIGURATION_OWNER, REMOTE_ODDJOB_BEAN, SERVER_INFO};
use crate::remote::capability::Capability;
use crate::remote::errors::RemoteError;
use crate::remote::handler::RemoteHandlerFactory;
use crate::remote::invoke::OperationType;
use crate::remote::session::{ClientToolkit, RemoteProxy, RemoteValue};
use crate::remote::type_names;

// ---------------------------------------------------------------------------
// RemoteOddjobBean
// ---------------------------------------------------------------------------

/// One interface a remote entity implements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Implementation {
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// What the server reports about one remote entity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerInfo {
    #[serde(default)]
    pub implementations: Vec<Implementation>,
}

impl ServerInfo {
    /// Names of every implemented interface, in the order reported.
    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.implementations.iter().map(|i| i.type_name.as_str())
    }
}

/// Introspection: which capabilities does this entity have?
#[async_trait]
pub trait RemoteOddjobBean: Send + Sync {
    async fn server_info(&self) -> Result<ServerInfo, RemoteError>;
}

impl Capability for dyn RemoteOddjobBean {
    const NAME: &'static str = REMOTE_ODDJOB_BEAN;
}

static SERVER_INFO_OP: Lazy<OperationType> =
    Lazy::new(|| OperationType::new("serverInfo", SERVER_INFO, &[]));

/// Builds the introspection handler.
#[derive(Debug, Clone, Copy, Default)]
pub struct RemoteOddjobBeanHandler;

struct RemoteOddjobBeanImpl {
    toolkit: ClientToolkit,
}

#[async_trait]
impl RemoteOddjobBean for RemoteOddjobBeanImpl {
    async fn server_info(&self) -> Result<ServerInfo, RemoteError> {
        self.toolkit.call(&SERVER_INFO_OP, vec![]).await
    }
}

impl RemoteHandlerFactory for RemoteOddjobBeanHandler {
    type Capability = dyn RemoteOddjobBean;

    fn create_handler(&self, toolkit: ClientToolkit) -> Arc<dyn RemoteOddjobBean> {
        Arc::new(RemoteOddjobBeanImpl { toolkit })
    }
}

// ---------------------------------------------------------------------------
// ConfigurationOwner
// ---------------------------------------------------------------------------

/// An entity owning the configuration of its descendants.
#[async_trait]
pub trait ConfigurationOwner: Send + Sync {
    /// The editing form for the configuration of `component`.
    async fn form_for(&self, component: &RemoteProxy) -> Result<String, RemoteError>;

    /// An empty form for a new element.
    async fn blank_form(
        &self,
        is_component: bool,
        element: &str,
        property_class: &str,
    ) -> Result<String, RemoteError>;

    /// Replace the configuration of `component` with `json`.
    async fn replace_json(&self, component: &RemoteProxy, json: &str) -> Result<(), RemoteError>;
}

impl Capability for dyn ConfigurationOwner {
    const NAME: &'static str = CONFIGURATION_OWNER;
}

static FORM_FOR: Lazy<OperationType> =
    Lazy::new(|| OperationType::new("formFor", type_names::STRING, &[type_names::OBJECT]));

static BLANK_FORM: Lazy<OperationType> = Lazy::new(|| {
    OperationType::new(
        "blankForm",
        type_names::STRING,
        &[type_names::BOOLEAN, type_names::STRING, type_names::STRING],
    )
});

static REPLACE_JSON: Lazy<OperationType> = Lazy::new(|| {
    OperationType::new(
        "configReplaceJson",
        type_names::VOID,
        &[type_names::OBJECT, type_names::STRING],
    )
});

/// Builds the configuration-ownership handler.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfigurationOwnerHandler;

struct ConfigurationOwnerImpl {
    toolkit: ClientToolkit,
}

#[async_trait]
impl ConfigurationOwner for ConfigurationOwnerImpl {
    async fn form_for(&self, component: &RemoteProxy) -> Result<String, RemoteError> {
        self.toolkit.call(&FORM_FOR, vec![component.into()]).await
    }

    async fn blank_form(
        &self,
        is_component: bool,
        element: &str,
        property_class: &str,
    ) -> Result<String, RemoteError> {
        let args: Vec<RemoteValue> = vec![is_component.into(), element.into(), property_class.into()];
        self.toolkit.call(&BLANK_FORM, args).await
    }

    async fn replace_json(&self, component: &RemoteProxy, json: &str) -> Result<(), RemoteError> {
        self.toolkit
            .call_void(&REPLACE_JSON, vec![component.into(), json.into()])
            .await
    }
}

impl RemoteHandlerFactory for ConfigurationOwnerHandler {
    type Capability = dyn ConfigurationOwner;

    fn create_handler(&self, toolkit: ClientToolkit) -> Arc<dyn ConfigurationOwner> {
        Arc::new(ConfigurationOwnerImpl { toolkit })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_server_info_decodes() {
        let info: ServerInfo = serde_json::from_value(json!({
            "implementations": [
                {"type": "java.lang.Runnable", "version": "1.0"},
                {"type": "org.oddjob.Stoppable"}
            ]
        }))
        .unwrap();

        assert_eq!(
            info.type_names().collect::<Vec<_>>(),
            vec!["java.lang.Runnable", "org.oddjob.Stoppable"]
        );
        assert_eq!(info.implementations[0].version.as_deref(), Some("1.0"));
        assert!(info.implementations[1].version.is_none());
    }

    #[test]
    fn test_server_info_without_implementations() {
        let info: ServerInfo = serde_json::from_value(json!({})).unwrap();
        assert_eq!(info, ServerInfo::default());
    }

    #[test]
    fn test_operation_signatures() {
        assert_eq!(SERVER_INFO_OP.result_type, SERVER_INFO);
        assert!(SERVER_INFO_OP.arg_signature.is_empty());
        assert_eq!(BLANK_FORM.arg_signature, vec!["boolean", "java.lang.String", "java.lang.String"]);
        assert_eq!(REPLACE_JSON.name, "configReplaceJson");
        assert_eq!(FORM_FOR.arg_signature, vec!["java.lang.Object"]);
    }

    #[tokio::test]
    async fn test_detached_handler_reports_transport_error() {
        let bean = RemoteOddjobBeanHandler.create_handler(ClientToolkit::detached(1));
        let err = bean.server_info().await.unwrap_err();
        assert_eq!(err.kind(), "TransportError");
    }
}
