//! Example: Print Pico remote button presses and connection events.

use lutron_lan_bridge::{BridgeConfig, BridgeEvent, LutronBridge, Remote};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = BridgeConfig::builder().host("192.168.1.10").build();
    let bridge = LutronBridge::connect(config).await?;
    let mut events = bridge.events();

    // A five-button Pico at integration ID 10
    let mut remote = Remote::new(10, "Living Room Pico", vec![2, 3, 4, 5, 6]);
    let (tx, mut presses) = tokio::sync::mpsc::unbounded_channel();
    let _handles: Vec<_> = remote
        .keys()
        .into_iter()
        .map(|key| {
            let (handle, mut rx) = bridge.subscribe_channel(key.integration_id, key.action);
            let tx = tx.clone();
            tokio::spawn(async move {
                while let Some(message) = rx.recv().await {
                    if tx.send(message).is_err() {
                        break;
                    }
                }
            });
            handle
        })
        .collect();

    println!("Listening for button events (Ctrl+C to stop)...\n");

    loop {
        tokio::select! {
            Some(message) = presses.recv() => {
                if remote.update(&message) {
                    let names = remote.state().names();
                    if names.is_empty() {
                        println!("{}: released", remote.name);
                    } else {
                        println!("{}: {} (button {})", remote.name, names.join("+"), message.action);
                    }
                }
            }
            event = events.recv() => {
                match event {
                    Ok(BridgeEvent::AuthFailed) => {
                        println!("Bridge login failed");
                        break;
                    }
                    Ok(event) => println!("Event: {:?}", event),
                    Err(e) => {
                        println!("Event channel error: {}", e);
                        break;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!("\nDisconnecting...");
                break;
            }
        }
    }

    bridge.close().await?;
    Ok(())
}
