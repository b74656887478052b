use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tracing::{info, warn};

use chanlink::config::load_config;
use chanlink::connection::websocket::WebSocketConnector;
use chanlink::utils::logging;
use chanlink::{ChannelKey, IncomingBroadcast, LocalDiscoveryTransport, OutgoingBroadcast, Stoppable};

#[derive(Debug, Serialize, Deserialize)]
struct Greeting {
    text: String,
}

/// Runs a provider and a producer in one process, talking over localhost
/// WebSockets, and relays a few greetings between them.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    logging::init(&config.logging.level);

    let group = config.broadcast.group.as_str();
    let transport = Arc::new(LocalDiscoveryTransport::new());

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let provider = IncomingBroadcast::new(group, transport.clone(), listener)?;
    let mut greetings = provider.add_incoming::<Greeting>();

    let producer = OutgoingBroadcast::new(
        group,
        &config.broadcast.node_name,
        transport,
        WebSocketConnector::from_settings(&config.connector),
    )?;
    let sender = producer.add_outgoing::<Greeting>();

    let channel = ChannelKey::of::<Greeting>();
    let discovered = tokio::time::timeout(Duration::from_secs(5), async {
        while producer.connection_count(&channel) == 0 {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await;
    if discovered.is_err() {
        warn!(%channel, "No provider connected, greetings will reach nobody");
    }

    for n in 1..=3 {
        sender.dispatch(&Greeting {
            text: format!("hello #{n} from {}", config.broadcast.node_name),
        });
        match tokio::time::timeout(Duration::from_secs(1), greetings.recv()).await {
            Ok(Some(greeting)) => info!(text = %greeting.text, "Received greeting"),
            Ok(None) => break,
            Err(_) => warn!("Greeting not delivered in time"),
        }
    }

    producer.stop().await?;
    provider.stop().await?;
    Ok(())
}
