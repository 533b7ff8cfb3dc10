// Linkauth — AMQP transport
//
// lapin-backed implementation of the broker traits. One connection carries
// two channels: the job channel declares the durable work queue, the log
// channel declares the fanout exchange.

use async_trait::async_trait;
use lapin::options::{BasicPublishOptions, ExchangeDeclareOptions, QueueDeclareOptions};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Connection, ConnectionProperties, ExchangeKind};
use uuid::Uuid;

use super::transport::{BrokerConnection, Channel, Connector, Publication, Topology};
use super::TransportError;

/// AMQP delivery mode that makes a message survive a broker restart.
const PERSISTENT_DELIVERY_MODE: u8 = 2;

impl From<lapin::Error> for TransportError {
    fn from(err: lapin::Error) -> Self {
        match &err {
            lapin::Error::IOError(_)
            | lapin::Error::InvalidConnectionState(_)
            | lapin::Error::InvalidChannelState(_)
            | lapin::Error::MissingHeartbeatError => TransportError::ConnectionClosed(err.to_string()),
            _ => TransportError::Other(err.to_string()),
        }
    }
}

/// Opens AMQP connections to a single broker URL.
pub struct AmqpConnector {
    url: String,
}

impl AmqpConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl Connector for AmqpConnector {
    async fn connect(&self, topology: &Topology) -> Result<Box<dyn BrokerConnection>, TransportError> {
        let connection = Connection::connect(&self.url, ConnectionProperties::default()).await?;

        let job_channel = connection.create_channel().await?;
        job_channel
            .queue_declare(
                &topology.job_queue,
                QueueDeclareOptions {
                    durable: true,
                    ..QueueDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await?;

        let log_channel = connection.create_channel().await?;
        log_channel
            .exchange_declare(
                &topology.log_exchange,
                ExchangeKind::Fanout,
                ExchangeDeclareOptions::default(),
                FieldTable::default(),
            )
            .await?;

        tracing::debug!(
            job_queue = %topology.job_queue,
            log_exchange = %topology.log_exchange,
            "Broker topology declared"
        );

        Ok(Box::new(AmqpConnection {
            connection,
            job_channel,
            log_channel,
        }))
    }
}

struct AmqpConnection {
    connection: Connection,
    job_channel: lapin::Channel,
    log_channel: lapin::Channel,
}

#[async_trait]
impl BrokerConnection for AmqpConnection {
    async fn publish(&self, publication: Publication<'_>) -> Result<(), TransportError> {
        let channel = match publication.channel {
            Channel::Job => &self.job_channel,
            Channel::Log => &self.log_channel,
        };

        let mut properties = BasicProperties::default()
            .with_content_type("application/json".into())
            .with_message_id(Uuid::new_v4().to_string().into());
        if publication.persistent {
            properties = properties.with_delivery_mode(PERSISTENT_DELIVERY_MODE);
        }

        channel
            .basic_publish(
                publication.exchange,
                publication.routing_key,
                BasicPublishOptions::default(),
                publication.body,
                properties,
            )
            .await?
            .await?;

        Ok(())
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.connection.close(200, "Bye").await?;
        Ok(())
    }
}
