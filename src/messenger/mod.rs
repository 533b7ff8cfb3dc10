// Linkauth — Messenger Module
//
// Publishes durable work items and fanout audit events to an AMQP broker,
// reconnecting with bounded quadratic backoff when the link drops.

mod amqp;
mod client;
mod error;
mod events;
mod transport;

pub use amqp::AmqpConnector;
pub use client::{LinkState, Messenger, RetryPolicy, DEFAULT_MAX_RETRIES, DEFAULT_RETRY_SLEEP_START};
pub use error::{MessengerError, TransportError};
pub use events::AuditEvent;
pub use transport::{
    BrokerConnection, Channel, Connector, Publication, Topology, DEFAULT_JOB_QUEUE,
    DEFAULT_LOG_EXCHANGE,
};

#[cfg(test)]
pub use transport::mock;
