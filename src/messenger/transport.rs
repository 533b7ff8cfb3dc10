// Linkauth — Broker transport abstraction
//
// The messenger talks to the broker through two small traits so that the
// reconnect/backoff logic can be exercised without a live broker. A
// `Connector` opens a connection and declares the topology; the returned
// `BrokerConnection` publishes on either logical channel.

use async_trait::async_trait;

use super::TransportError;

/// Default name of the durable work queue.
pub const DEFAULT_JOB_QUEUE: &str = "auth_jobs";

/// Default name of the fanout audit-log exchange.
pub const DEFAULT_LOG_EXCHANGE: &str = "auth_logs";

/// The two logical channels exposed by the messenger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    /// Durable work queue: persisted, delivered to one consumer.
    Job,
    /// Fanout exchange: broadcast to every bound subscriber.
    Log,
}

/// Broker objects declared on every (re)connect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topology {
    pub job_queue: String,
    pub log_exchange: String,
}

impl Default for Topology {
    fn default() -> Self {
        Self {
            job_queue: DEFAULT_JOB_QUEUE.to_string(),
            log_exchange: DEFAULT_LOG_EXCHANGE.to_string(),
        }
    }
}

impl Topology {
    /// Build the publication for a message on the given channel.
    ///
    /// Jobs go through the default exchange, routed by queue name, and are
    /// marked persistent. Logs go to the fanout exchange with an empty
    /// routing key.
    pub fn publication<'a>(&'a self, channel: Channel, body: &'a [u8]) -> Publication<'a> {
        match channel {
            Channel::Job => Publication {
                channel,
                exchange: "",
                routing_key: &self.job_queue,
                body,
                persistent: true,
            },
            Channel::Log => Publication {
                channel,
                exchange: &self.log_exchange,
                routing_key: "",
                body,
                persistent: false,
            },
        }
    }
}

/// A single message ready to be handed to the broker.
#[derive(Debug, Clone, Copy)]
pub struct Publication<'a> {
    pub channel: Channel,
    pub exchange: &'a str,
    pub routing_key: &'a str,
    pub body: &'a [u8],
    pub persistent: bool,
}

/// Opens broker connections.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a connection and declare both channel topologies.
    async fn connect(&self, topology: &Topology) -> Result<Box<dyn BrokerConnection>, TransportError>;
}

/// An open broker connection with both channels ready.
#[async_trait]
pub trait BrokerConnection: Send + Sync {
    async fn publish(&self, publication: Publication<'_>) -> Result<(), TransportError>;

    async fn close(&self) -> Result<(), TransportError>;
}

// ─── In-Memory Mock for Testing ──────────────────────────────────────────────


// ─── Tests ───────────────────────────────────────────────────────────────────
