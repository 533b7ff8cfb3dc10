// Linkauth — Event Messenger
//
// Owns the broker connection and exposes the job and log channels.
// A lost connection is recovered transparently: publishes reconnect and
// retry, connects back off quadratically, and after `max_retries`
// consecutive failures the messenger gives up with `TooManyRetries`.

use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;

use super::events::AuditEvent;
use super::transport::{BrokerConnection, Channel, Connector, Topology};
use super::{MessengerError, TransportError};

/// Default bound on consecutive failed connects.
pub const DEFAULT_MAX_RETRIES: u32 = 10;

/// Default base of the quadratic backoff, in seconds.
pub const DEFAULT_RETRY_SLEEP_START: f64 = 0.1;

/// Reconnect bound and backoff base.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    /// Seconds; the n-th retry waits `retry_sleep_start * n²`.
    pub retry_sleep_start: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            retry_sleep_start: DEFAULT_RETRY_SLEEP_START,
        }
    }
}

impl RetryPolicy {
    /// Time to wait before retrying after a failed connect at `retries`.
    /// Saturates at `Duration::MAX`.
    pub fn wait(&self, retries: u32) -> Duration {
        let factor = f64::from(retries) * f64::from(retries);
        Duration::try_from_secs_f64((self.retry_sleep_start * factor).max(0.0))
            .unwrap_or(Duration::MAX)
    }
}

/// Link phase of the broker connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Connecting,
    Connected,
}

struct ConnectionState {
    retries: u32,
    phase: LinkState,
    connection: Option<Box<dyn BrokerConnection>>,
}

/// Publishes work items and audit events to the broker.
pub struct Messenger {
    connector: Box<dyn Connector>,
    topology: Topology,
    policy: RetryPolicy,
    state: Mutex<ConnectionState>,
}

impl Messenger {
    /// Create a disconnected messenger. The retry counter starts at 1, so the
    /// very first failed connect already waits `retry_sleep_start`.
    pub fn new(connector: Box<dyn Connector>, topology: Topology, policy: RetryPolicy) -> Self {
        Self {
            connector,
            topology,
            policy,
            state: Mutex::new(ConnectionState {
                retries: 1,
                phase: LinkState::Disconnected,
                connection: None,
            }),
        }
    }

    /// Create a messenger and connect it.
    pub async fn open(
        connector: Box<dyn Connector>,
        topology: Topology,
        policy: RetryPolicy,
    ) -> Result<Self, MessengerError> {
        let messenger = Self::new(connector, topology, policy);
        messenger.connect().await?;
        Ok(messenger)
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    pub async fn state(&self) -> LinkState {
        self.state.lock().await.phase
    }

    pub async fn retries(&self) -> u32 {
        self.state.lock().await.retries
    }

    /// Connect to the broker, backing off on transient failures.
    pub async fn connect(&self) -> Result<(), MessengerError> {
        let mut state = self.state.lock().await;
        self.connect_locked(&mut state).await
    }

    async fn connect_locked(&self, state: &mut ConnectionState) -> Result<(), MessengerError> {
        loop {
            if state.retries >= self.policy.max_retries {
                state.phase = LinkState::Disconnected;
                tracing::error!(retries = state.retries, "Giving up on broker connection");
                return Err(MessengerError::TooManyRetries {
                    retries: state.retries,
                });
            }

            state.phase = LinkState::Connecting;
            match self.connector.connect(&self.topology).await {
                Ok(connection) => {
                    state.connection = Some(connection);
                    state.retries = 0;
                    state.phase = LinkState::Connected;
                    tracing::info!("Connected to message broker");
                    return Ok(());
                }
                Err(TransportError::ConnectionClosed(reason)) => {
                    let wait = self.policy.wait(state.retries);
                    tracing::warn!(
                        retries = state.retries,
                        wait_secs = wait.as_secs_f64(),
                        %reason,
                        "Reconnecting to message broker"
                    );
                    tokio::time::sleep(wait).await;
                    state.retries += 1;
                }
                Err(err) => {
                    state.phase = LinkState::Disconnected;
                    return Err(err.into());
                }
            }
        }
    }

    /// Publish a raw body on the given channel, reconnecting on a lost link.
    ///
    /// At most `max_retries` consecutive publishes may fail within one call,
    /// even when every reconnect succeeds.
    pub async fn publish(&self, channel: Channel, body: &[u8]) -> Result<(), MessengerError> {
        let mut state = self.state.lock().await;
        let mut failed_publishes = 0;
        loop {
            let result = match state.connection.as_ref() {
                Some(connection) => connection.publish(self.topology.publication(channel, body)).await,
                None => Err(TransportError::ConnectionClosed("not connected".to_string())),
            };

            match result {
                Ok(()) => return Ok(()),
                Err(TransportError::ConnectionClosed(reason)) => {
                    failed_publishes += 1;
                    Self::drop_connection(&mut state).await;

                    if failed_publishes >= self.policy.max_retries {
                        tracing::error!(?channel, failed_publishes, %reason, "Giving up on publish");
                        return Err(MessengerError::TooManyRetries {
                            retries: failed_publishes,
                        });
                    }

                    tracing::warn!(?channel, failed_publishes, %reason, "Publish failed, reconnecting");
                    self.connect_locked(&mut state).await?;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Close and forget the current connection after a lost link.
    async fn drop_connection(state: &mut ConnectionState) {
        state.phase = LinkState::Disconnected;
        if let Some(stale) = state.connection.take() {
            if let Err(e) = stale.close().await {
                tracing::debug!(error = %e, "Stale broker connection did not close cleanly");
            }
        }
    }

    /// Publish a work item on the durable queue, marked persistent.
    pub async fn job<T: Serialize + ?Sized>(&self, message: &T) -> Result<(), MessengerError> {
        let body = serde_json::to_vec(message)?;
        self.publish(Channel::Job, &body).await
    }

    /// Stamp an audit event with the send time and broadcast it.
    pub async fn log(&self, event: AuditEvent) -> Result<(), MessengerError> {
        let mut message = serde_json::to_value(&event)?;
        if let Value::Object(fields) = &mut message {
            fields.insert(
                "time".to_string(),
                Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Secs, false)),
            );
        }
        tracing::debug!(action = event.action(), "Publishing audit event");
        let body = serde_json::to_vec(&message)?;
        self.publish(Channel::Log, &body).await
    }

    /// Close the broker connection, if one is open.
    pub async fn disconnect(&self) -> Result<(), MessengerError> {
        let mut state = self.state.lock().await;
        state.phase = LinkState::Disconnected;
        if let Some(connection) = state.connection.take() {
            connection.close().await?;
            tracing::info!("Disconnected from message broker");
        }
        Ok(())
    }

    // ─── Audit emitters ─────────────────────────────────────────────────────

    pub async fn exists(&self, username: &str, exists: bool) -> Result<(), MessengerError> {
        self.log(AuditEvent::Exists {
            username: username.to_string(),
            exists,
        })
        .await
    }

    pub async fn authorized(&self, username: &str, system: Option<bool>) -> Result<(), MessengerError> {
        self.log(AuditEvent::Authorized {
            username: username.to_string(),
            system,
        })
        .await
    }

    pub async fn failed(&self, username: &str, system: Option<bool>) -> Result<(), MessengerError> {
        self.log(AuditEvent::Failed {
            username: username.to_string(),
            system,
        })
        .await
    }

    pub async fn added(&self, username: &str) -> Result<(), MessengerError> {
        self.log(AuditEvent::Added {
            username: username.to_string(),
        })
        .await
    }

    pub async fn removed(&self, username: &str) -> Result<(), MessengerError> {
        self.log(AuditEvent::Removed {
            username: username.to_string(),
        })
        .await
    }

    pub async fn viewed_listing(&self) -> Result<(), MessengerError> {
        self.log(AuditEvent::ViewedListing).await
    }

    pub async fn viewed(&self, username: &str) -> Result<(), MessengerError> {
        self.log(AuditEvent::Viewed {
            username: username.to_string(),
        })
        .await
    }

    pub async fn viewed_field(&self, username: &str, field: &str) -> Result<(), MessengerError> {
        self.log(AuditEvent::ViewedField {
            username: username.to_string(),
            field: vec![field.to_string()],
        })
        .await
    }

    pub async fn changed(&self, username: &str, fields: &[String]) -> Result<(), MessengerError> {
        self.log(AuditEvent::Changed {
            username: username.to_string(),
            field: fields.to_vec(),
        })
        .await
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
