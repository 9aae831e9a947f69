//! ojprobe: ask a job server what its components can do.
//!
//! Discovers each remote id given on the command line and prints the
//! capabilities the client can drive on it.
//!
//! # Environment Variables
//!
//! - `OJREMOTE_INVOKE_URL` — invocation endpoint (default: http://localhost:8080/invoke)
//! - `OJREMOTE_TIMEOUT_SECS` — optional HTTP request timeout
//! - `RUST_LOG` — Tracing filter (default: "info,ojremote=debug")
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin ojprobe -- 0 1 2
//! ```

use std::sync::Arc;

use anyhow::{bail, Context};
use ojremote::oddjob::{
    ConfigurationOwner, DragPoint, ObjectProxy, Resettable, Runnable, Stoppable,
};
use ojremote::remote::{HttpInvoker, RemoteConfig, RemoteId, RemoteProxy, RemoteSessionFactory};

fn capabilities_of(proxy: &RemoteProxy) -> Vec<&'static str> {
    [
        ("Runnable", proxy.is_a::<dyn Runnable>()),
        ("Stoppable", proxy.is_a::<dyn Stoppable>()),
        ("Resettable", proxy.is_a::<dyn Resettable>()),
        ("DragPoint", proxy.is_a::<dyn DragPoint>()),
        ("ConfigurationOwner", proxy.is_a::<dyn ConfigurationOwner>()),
        ("Object", proxy.is_a::<dyn ObjectProxy>()),
    ]
    .into_iter()
    .filter_map(|(name, supported)| supported.then_some(name))
    .collect()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,ojremote=debug".into()),
        )
        .init();

    let remote_ids = std::env::args()
        .skip(1)
        .map(|arg| {
            arg.parse::<RemoteId>()
                .with_context(|| format!("not a remote id: {}", arg))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;
    if remote_ids.is_empty() {
        bail!("usage: ojprobe <remote-id> [<remote-id>...]");
    }

    let config = RemoteConfig::from_env();
    tracing::info!("Probing {} via {}", remote_ids.len(), config.invoke_url);

    let invoker = HttpInvoker::from_config(&config)?;
    let session = RemoteSessionFactory::new(Arc::new(invoker))
        .register_job_control()?
        .create_remote_session();

    for remote_id in remote_ids {
        let proxy = session
            .get_or_create(remote_id)
            .await
            .with_context(|| format!("discovering remote {}", remote_id))?;

        let capabilities = capabilities_of(&proxy);
        println!("{}: {}", remote_id, capabilities.join(", "));

        if let Ok(object) = proxy.as_a::<dyn ObjectProxy>() {
            match object.to_string().await {
                Ok(text) => println!("    {}", text),
                Err(e) => tracing::warn!("{} on remote {}", e, remote_id),
            }
        }
    }

    Ok(())
}
