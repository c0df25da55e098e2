//! AMQP-backed broker gateway
//!
//! One connection and one channel per worker. The AMQP client is not
//! assumed to tolerate unsynchronized concurrent channel use, so every
//! operation takes the channel lock; consumer streams are pumped by
//! dedicated tasks outside the lock.

use async_trait::async_trait;
use futures_util::StreamExt;
use lapin::options::{
    BasicCancelOptions, BasicConsumeOptions, BasicPublishOptions, ExchangeDeclareOptions,
    ExchangeDeleteOptions, QueueBindOptions, QueueDeclareOptions, QueueDeleteOptions,
};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, ExchangeKind};
use log::{debug, error, info};
use tokio::sync::{mpsc, Mutex};
use uuid::Uuid;

use crate::broker::{queue_name, Broker, ConsumerHandle, Subscription};
use crate::constants::BROADCAST_KEY;
use crate::core::event::Event;
use crate::error::{Result, RustyRooksError};

fn broker_err(context: &str, err: lapin::Error) -> RustyRooksError {
    RustyRooksError::BrokerError(format!("{}: {}", context, err))
}

pub struct AmqpBroker {
    // Held so the connection outlives the channel
    _connection: Connection,
    channel: Mutex<Channel>,
}

impl AmqpBroker {
    /// Connect to the broker and open the worker's single channel
    pub async fn connect(uri: &str) -> Result<Self> {
        let connection = Connection::connect(uri, ConnectionProperties::default())
            .await
            .map_err(|e| broker_err("connect", e))?;
        let channel = connection
            .create_channel()
            .await
            .map_err(|e| broker_err("create channel", e))?;

        info!("Connected to message broker");

        Ok(Self {
            _connection: connection,
            channel: Mutex::new(channel),
        })
    }
}

#[async_trait]
impl Broker for AmqpBroker {
    async fn open_game(&self, game_id: &str) -> Result<()> {
        let channel = self.channel.lock().await;
        channel
            .exchange_declare(
                game_id,
                ExchangeKind::Topic,
                ExchangeDeclareOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| broker_err("exchange declare", e))?;
        Ok(())
    }

    async fn open_player_queue(&self, game_id: &str, connection_id: &str) -> Result<()> {
        let queue = queue_name(game_id, connection_id);
        let channel = self.channel.lock().await;

        channel
            .queue_declare(&queue, QueueDeclareOptions::default(), FieldTable::default())
            .await
            .map_err(|e| broker_err("queue declare", e))?;

        // Two bindings: direct delivery and session-wide broadcast
        for routing_key in [connection_id, BROADCAST_KEY] {
            channel
                .queue_bind(
                    &queue,
                    game_id,
                    routing_key,
                    QueueBindOptions::default(),
                    FieldTable::default(),
                )
                .await
                .map_err(|e| broker_err("queue bind", e))?;
        }
        Ok(())
    }

    async fn publish(&self, game_id: &str, routing_key: &str, event: &Event) -> Result<()> {
        let payload = serde_json::to_vec(event)
            .map_err(|e| RustyRooksError::BrokerError(format!("serialize event: {}", e)))?;

        let channel = self.channel.lock().await;
        let _confirm = channel
            .basic_publish(
                game_id,
                routing_key,
                BasicPublishOptions::default(),
                &payload,
                BasicProperties::default(),
            )
            .await
            .map_err(|e| broker_err("publish", e))?;
        Ok(())
    }

    async fn subscribe(&self, game_id: &str, connection_id: &str) -> Result<Subscription> {
        let queue = queue_name(game_id, connection_id);
        let tag = format!("ctag-{}", Uuid::new_v4());

        let mut consumer = {
            let channel = self.channel.lock().await;
            channel
                .basic_consume(
                    &queue,
                    &tag,
                    BasicConsumeOptions {
                        no_ack: true,
                        ..Default::default()
                    },
                    FieldTable::default(),
                )
                .await
                .map_err(|e| broker_err("consume", e))?
        };

        let (tx, rx) = mpsc::unbounded_channel();
        let pump_queue = queue.clone();
        tokio::spawn(async move {
            while let Some(attempt) = consumer.next().await {
                match attempt {
                    Ok(delivery) => {
                        if tx.send(delivery.data).is_err() {
                            // Delivery task is gone; stop pumping
                            break;
                        }
                    }
                    Err(e) => {
                        error!("Consumer stream error on queue {}: {}", pump_queue, e);
                        break;
                    }
                }
            }
            debug!("Consumer stream ended for queue {}", pump_queue);
        });

        Ok(Subscription {
            handle: ConsumerHandle {
                game_id: game_id.to_string(),
                connection_id: connection_id.to_string(),
                tag,
            },
            messages: rx,
        })
    }

    async fn cancel(&self, handle: &ConsumerHandle) -> Result<()> {
        let channel = self.channel.lock().await;
        if let Err(e) = channel
            .basic_cancel(&handle.tag, BasicCancelOptions::default())
            .await
        {
            // Teardown is idempotent: an already-gone consumer is success
            debug!("Cancel of consumer {} ignored: {}", handle.tag, e);
        }
        Ok(())
    }

    async fn unbind_player_queue(&self, game_id: &str, connection_id: &str) -> Result<()> {
        let queue = queue_name(game_id, connection_id);
        let channel = self.channel.lock().await;

        for routing_key in [connection_id, BROADCAST_KEY] {
            if let Err(e) = channel
                .queue_unbind(&queue, game_id, routing_key, FieldTable::default())
                .await
            {
                debug!("Unbind of queue {} ignored: {}", queue, e);
            }
        }
        if let Err(e) = channel.queue_delete(&queue, QueueDeleteOptions::default()).await {
            debug!("Delete of queue {} ignored: {}", queue, e);
        }
        Ok(())
    }

    async fn close_game(&self, game_id: &str) -> Result<()> {
        let channel = self.channel.lock().await;
        if let Err(e) = channel
            .exchange_delete(game_id, ExchangeDeleteOptions::default())
            .await
        {
            debug!("Delete of exchange {} ignored: {}", game_id, e);
        }
        Ok(())
    }
}
