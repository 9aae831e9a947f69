//! Notification transport: one persistent connection carrying subscription
//! requests out and push notifications in.
//!
//! Listeners are keyed by (remote id, notification type). Several listeners
//! may share a key and several keys may be live at once; each listener only
//! sees notifications for the keys it subscribed to. The server is asked to
//! `ADD` a key when it gains its first listener and to `REMOVE` it when the
//! last one goes.
//!
//! All inbound frames are handled by a single reader task, so notifications
//! for a key reach its listeners in arrival order. A notification older than
//! the last one delivered for its key is dropped rather than delivered out of
//! sequence.
//!
//! When the connection drops, every active listener is told once through
//! [`NotificationListener::connection_lost`] and the subscription table is
//! cleared. There is no automatic reconnect or resubscription.

use std::fmt;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::{future, Sink, SinkExt, Stream, StreamExt};
use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;

use super::errors::RemoteError;
use super::RemoteId;

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// Kind of notification a remote entity can emit, with its payload type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationType {
    pub name: String,
    pub data_type: String,
}

impl NotificationType {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
        }
    }
}

/// A push message from the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub remote_id: RemoteId,
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    /// Increases per (remote id, type).
    pub sequence: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
enum SubscriptionAction {
    Add,
    Remove,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SubscriptionRequest<'a> {
    action: SubscriptionAction,
    remote_id: RemoteId,
    #[serde(rename = "type")]
    notification_type: &'a NotificationType,
}

// ---------------------------------------------------------------------------
// Listener / Notifier
// ---------------------------------------------------------------------------

/// Receives notifications for the keys it is subscribed to.
pub trait NotificationListener: Send + Sync {
    fn handle_notification(&self, notification: &Notification);

    /// Called once when the underlying connection drops.
    fn connection_lost(&self, error: &RemoteError) {
        log::warn!("Notification listener lost its connection: {}", error);
    }
}

/// Subscribe and unsubscribe listeners by (remote id, notification type).
pub trait Notifier: Send + Sync {
    fn add_notification_listener(
        &self,
        remote_id: RemoteId,
        notification_type: &NotificationType,
        listener: Arc<dyn NotificationListener>,
    ) -> Result<(), RemoteError>;

    /// Stop delivery to `listener` for this key. Listener identity is `Arc`
    /// pointer identity.
    fn remove_notification_listener(
        &self,
        remote_id: RemoteId,
        notification_type: &NotificationType,
        listener: &Arc<dyn NotificationListener>,
    ) -> Result<(), RemoteError>;
}

// ---------------------------------------------------------------------------
// Subscription table
// ---------------------------------------------------------------------------

type SubscriptionKey = (RemoteId, NotificationType);

#[derive(Default)]
struct Subscription {
    listeners: Vec<Arc<dyn NotificationListener>>,
    last_sequence: Option<u64>,
}

#[derive(Default)]
struct Shared {
    subscriptions: DashMap<SubscriptionKey, Subscription>,
    /// Set once, when the connection is lost.
    lost: Mutex<Option<String>>,
}

impl Shared {
    /// Lock the connection state, failing if the connection is gone.
    ///
    /// Table updates happen under this guard, so `lose` either sees a
    /// listener and reports to it, or the update fails with `ConnectionLost`.
    fn connected(&self) -> Result<MutexGuard<'_, Option<String>>, RemoteError> {
        let lost = self.lost.lock();
        if let Some(reason) = lost.as_ref() {
            return Err(RemoteError::ConnectionLost {
                reason: reason.clone(),
            });
        }
        Ok(lost)
    }

    fn dispatch_text(&self, text: &str) {
        match serde_json::from_str::<Notification>(text) {
            Ok(notification) => self.dispatch(&notification),
            Err(e) => log::warn!("Dropping undecodable notification frame ({}): {}", e, text),
        }
    }

    fn dispatch(&self, notification: &Notification) {
        let key = (notification.remote_id, notification.notification_type.clone());

        // Listeners are called outside the map lock so they may subscribe or
        // unsubscribe from inside the callback.
        let listeners = match self.subscriptions.get_mut(&key) {
            None => {
                log::debug!(
                    "No listener for {} on remote {}",
                    notification.notification_type.name,
                    notification.remote_id
                );
                return;
            }
            Some(mut subscription) => {
                if let Some(last) = subscription.last_sequence {
                    if notification.sequence < last {
                        log::warn!(
                            "Dropping out-of-order {} notification for remote {}: sequence {} after {}",
                            notification.notification_type.name,
                            notification.remote_id,
                            notification.sequence,
                            last
                        );
                        return;
                    }
                }
                subscription.last_sequence = Some(notification.sequence);
                subscription.listeners.clone()
            }
        };

        for listener in listeners {
            listener.handle_notification(notification);
        }
    }

    fn lose(&self, reason: String) {
        {
            let mut lost = self.lost.lock();
            if lost.is_some() {
                return;
            }
            *lost = Some(reason.clone());
        }

        log::warn!("Notification connection lost: {}", reason);

        let keys: Vec<SubscriptionKey> = self.subscriptions.iter().map(|e| e.key().clone()).collect();
        let mut listeners = Vec::new();
        for key in keys {
            if let Some((_, subscription)) = self.subscriptions.remove(&key) {
                listeners.extend(subscription.listeners);
            }
        }

        let error = RemoteError::ConnectionLost { reason };
        for listener in listeners {
            listener.connection_lost(&error);
        }
    }
}

// ---------------------------------------------------------------------------
// RemoteNotifier
// ---------------------------------------------------------------------------

/// [`Notifier`] over a single persistent connection.
///
/// Open for as long as the value lives; dropping it stops the reader and
/// writer tasks.
pub struct RemoteNotifier {
    shared: Arc<Shared>,
    outbound: mpsc::UnboundedSender<String>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl fmt::Debug for RemoteNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteNotifier")
            .field("subscriptions", &self.shared.subscriptions.len())
            .field("lost", &*self.shared.lost.lock())
            .finish()
    }
}

impl RemoteNotifier {
    /// Open a WebSocket connection to `url`.
    pub async fn connect(url: &str) -> Result<Self, RemoteError> {
        let (socket, _) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| RemoteError::transport(format!("Cannot connect to {}: {}", url, e)))?;

        log::info!("Notification connection open to {}", url);

        let (write, read) = socket.split();

        let sink = write.with(|text: String| {
            future::ready(Ok::<_, tokio_tungstenite::tungstenite::Error>(Message::Text(text)))
        });

        let stream = read.filter_map(|message| {
            future::ready(match message {
                Ok(Message::Text(text)) => Some(Ok(text)),
                Ok(Message::Close(frame)) => Some(Err(format!("closed by server ({:?})", frame))),
                Ok(_) => None,
                Err(e) => Some(Err(e.to_string())),
            })
        });

        Ok(Self::from_stream(Box::pin(sink), Box::pin(stream)))
    }

    /// Run the notifier over an already-open connection, given as a sink of
    /// outbound text frames and a stream of inbound ones.
    ///
    /// # Panics
    ///
    /// Must be called from within a Tokio runtime.
    pub fn from_stream<Si, St, E>(sink: Si, stream: St) -> Self
    where
        Si: Sink<String> + Send + Unpin + 'static,
        Si::Error: fmt::Display,
        St: Stream<Item = Result<String, E>> + Send + Unpin + 'static,
        E: fmt::Display,
    {
        let shared = Arc::new(Shared::default());
        let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<String>();

        let writer = {
            let shared = Arc::clone(&shared);
            let mut sink = sink;
            tokio::spawn(async move {
                while let Some(text) = outbound_rx.recv().await {
                    log::debug!("Notification channel send {}", text);
                    if let Err(e) = sink.send(text).await {
                        log::error!("Notification channel write failed: {}", e);
                        shared.lose(format!("write failed: {}", e));
                        return;
                    }
                }
            })
        };

        let reader = {
            let shared = Arc::clone(&shared);
            let mut stream = stream;
            tokio::spawn(async move {
                let reason = loop {
                    match stream.next().await {
                        Some(Ok(text)) => shared.dispatch_text(&text),
                        Some(Err(e)) => break e.to_string(),
                        None => break "connection closed".to_string(),
                    }
                };
                shared.lose(reason);
            })
        };

        Self {
            shared,
            outbound,
            reader,
            writer,
        }
    }

    /// Whether the connection is still up.
    pub fn is_connected(&self) -> bool {
        self.shared.lost.lock().is_none()
    }

    fn send(
        &self,
        action: SubscriptionAction,
        remote_id: RemoteId,
        notification_type: &NotificationType,
    ) -> Result<(), RemoteError> {
        let request = SubscriptionRequest {
            action,
            remote_id,
            notification_type,
        };
        let text = serde_json::to_string(&request)
            .map_err(|e| RemoteError::transport(format!("Cannot encode subscription: {}", e)))?;

        self.outbound
            .send(text)
            .map_err(|_| RemoteError::ConnectionLost {
                reason: "notification writer stopped".to_string(),
            })
    }
}

impl Notifier for RemoteNotifier {
    fn add_notification_listener(
        &self,
        remote_id: RemoteId,
        notification_type: &NotificationType,
        listener: Arc<dyn NotificationListener>,
    ) -> Result<(), RemoteError> {
        let _connected = self.shared.connected()?;

        match self
            .shared
            .subscriptions
            .entry((remote_id, notification_type.clone()))
        {
            Entry::Occupied(mut occupied) => occupied.get_mut().listeners.push(listener),
            Entry::Vacant(vacant) => {
                self.send(SubscriptionAction::Add, remote_id, notification_type)?;
                vacant.insert(Subscription {
                    listeners: vec![listener],
                    last_sequence: None,
                });
            }
        }

        log::debug!(
            "Listening for {} on remote {}",
            notification_type.name,
            remote_id
        );
        Ok(())
    }

    fn remove_notification_listener(
        &self,
        remote_id: RemoteId,
        notification_type: &NotificationType,
        listener: &Arc<dyn NotificationListener>,
    ) -> Result<(), RemoteError> {
        let _connected = self.shared.connected()?;

        let key = (remote_id, notification_type.clone());
        let Entry::Occupied(mut occupied) = self.shared.subscriptions.entry(key) else {
            return Ok(());
        };

        let subscription = occupied.get_mut();
        let before = subscription.listeners.len();
        subscription.listeners.retain(|l| !Arc::ptr_eq(l, listener));
        if subscription.listeners.len() == before || !subscription.listeners.is_empty() {
            return Ok(());
        }

        let sent = self.send(SubscriptionAction::Remove, remote_id, notification_type);
        occupied.remove();
        sent?;

        log::debug!(
            "Stopped listening for {} on remote {}",
            notification_type.name,
            remote_id
        );
        Ok(())
    }
}

impl Drop for RemoteNotifier {
    fn drop(&mut self) {
        self.reader.abort();
        self.writer.abort();
    }
}
