//! MQTT-backed change notifier. Events travel as JSON on `changes/{table}`.

use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::model::{ChangeEvent, RowFilter, Table};
use crate::notifier::{ChangeNotifier, ChangeStream};
use crate::utils::change_topic;

#[derive(Clone, Debug)]
pub struct MqttConfig {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub keep_alive_secs: u64,
}

impl MqttConfig {
    pub fn new(host: impl Into<String>, port: u16, client_id: impl Into<String>) -> Self {
        Self { host: host.into(), port, client_id: client_id.into(), keep_alive_secs: 30 }
    }
}

#[derive(Clone)]
pub struct MqttNotifier {
    client: AsyncClient,
    tx: broadcast::Sender<ChangeEvent>,
    // topic subscribers per table; the broker subscription lives while this is non-zero
    topics: Arc<Mutex<HashMap<Table, usize>>>,
}

impl MqttNotifier {
    pub fn connect(config: MqttConfig) -> Self {
        let mut options = MqttOptions::new(config.client_id, config.host, config.port);
        options.set_keep_alive(Duration::from_secs(config.keep_alive_secs));
        options.set_clean_session(true);
        let (client, eventloop): (AsyncClient, EventLoop) = AsyncClient::new(options, 64);
        let (tx, _rx) = broadcast::channel(256);
        let topics = Arc::new(Mutex::new(HashMap::new()));
        tokio::spawn(run_event_loop(eventloop, client.clone(), tx.clone(), topics.clone()));
        Self { client, tx, topics }
    }

    fn acquire(&self, table: Table) -> bool {
        let mut topics = self.topics.lock().unwrap_or_else(|p| p.into_inner());
        let count = topics.entry(table).or_insert(0);
        *count += 1;
        *count == 1
    }

    fn release(topics: &Mutex<HashMap<Table, usize>>, table: Table) -> bool {
        let mut topics = topics.lock().unwrap_or_else(|p| p.into_inner());
        match topics.get_mut(&table) {
            Some(count) if *count > 1 => {
                *count -= 1;
                false
            }
            Some(_) => {
                topics.remove(&table);
                true
            }
            None => false,
        }
    }

    /// Topics with at least one live stream, in a stable order.
    fn held_topics(topics: &Mutex<HashMap<Table, usize>>) -> Vec<String> {
        let topics = topics.lock().unwrap_or_else(|p| p.into_inner());
        let mut held: Vec<String> = topics.keys().map(|t| change_topic(*t)).collect();
        held.sort();
        held
    }
}

async fn run_event_loop(
    mut eventloop: EventLoop,
    client: AsyncClient,
    tx: broadcast::Sender<ChangeEvent>,
    topics: Arc<Mutex<HashMap<Table, usize>>>,
) {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::Publish(p))) => match serde_json::from_slice::<ChangeEvent>(&p.payload) {
                Ok(event) => {
                    let receivers = tx.send(event).unwrap_or(0);
                    debug!(topic = %p.topic, receivers, "change event received");
                }
                Err(e) => warn!(topic = %p.topic, error = %e, "dropping malformed change event"),
            },
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                info!(session_present = ack.session_present, "MQTT connected");
                // A clean session starts with no subscriptions. try_subscribe keeps this task from
                // waiting on the request queue it drains itself.
                if !ack.session_present {
                    for topic in MqttNotifier::held_topics(&topics) {
                        match client.try_subscribe(topic.clone(), QoS::AtLeastOnce) {
                            Ok(()) => info!(topic = %topic, "MQTT topic resubscribed"),
                            Err(e) => warn!(topic = %topic, error = %e, "MQTT resubscribe failed"),
                        }
                    }
                }
            }
            Ok(Event::Incoming(Packet::SubAck(ack))) => {
                debug!(packet_id = ack.pkid, "MQTT subscription acknowledged");
            }
            Ok(_) => {}
            Err(e) => {
                error!(error = %e, "MQTT event loop error, reconnecting");
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    }
}

#[async_trait]
impl ChangeNotifier for MqttNotifier {
    async fn publish(&self, event: ChangeEvent) -> Result<()> {
        let topic = change_topic(event.table);
        let payload = serde_json::to_vec(&event)?;
        if let Err(e) = self.client.publish(&topic, QoS::AtLeastOnce, false, payload).await {
            error!(topic = %topic, error = %e, "publishing change event failed");
            return Err(e.into());
        }
        debug!(topic = %topic, kind = ?event.kind, "change event published");
        Ok(())
    }

    async fn subscribe(&self, table: Table, filter: Option<RowFilter>) -> Result<ChangeStream> {
        let rx = self.tx.subscribe();
        let topic = change_topic(table);
        if self.acquire(table) {
            if let Err(e) = self.client.subscribe(&topic, QoS::AtLeastOnce).await {
                Self::release(&self.topics, table);
                return Err(e.into());
            }
            info!(topic = %topic, "MQTT topic subscribed");
        }

        let client = self.client.clone();
        let topics = self.topics.clone();
        Ok(ChangeStream::new(table, filter, rx).with_release(move || {
            if Self::release(&topics, table) {
                match client.try_unsubscribe(topic.clone()) {
                    Ok(()) => info!(topic = %topic, "MQTT topic unsubscribed"),
                    Err(e) => warn!(topic = %topic, error = %e, "MQTT unsubscribe failed"),
                }
            }
        }))
    }
}
