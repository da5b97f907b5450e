//! Example: Connect to a Lutron bridge, load a device catalog and print
//! the current state of every device.

use lutron_lan_bridge::{BridgeConfig, Catalog, Device, LutronBridge};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let report = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "integration_report.json".to_string());
    let catalog = Catalog::load(&report)?;

    let config = BridgeConfig::builder()
        .host("192.168.1.10")
        .user("lutron")
        .password("integration")
        .build();

    println!("Connecting to bridge...");
    let bridge = LutronBridge::connect(config).await?;

    let mut devices: Vec<Device> = catalog.entries().iter().map(Device::from_entry).collect();
    for device in &mut devices {
        if let Some(query) = device.refresh() {
            match bridge.send_query(&query, None).await {
                Ok(reply) => {
                    device.update(&reply);
                }
                Err(e) => println!("  {} query failed: {}", device.name(), e),
            }
        }
    }

    println!("\n--- Devices ({}) ---", devices.len());
    for device in &devices {
        println!(
            "  {:6} {:3}: {:24} area={:12} state={}",
            device.kind(),
            device.id(),
            device.name(),
            device.area().unwrap_or("-"),
            serde_json::to_string(&device.state())?,
        );
    }

    println!("\nPress Ctrl+C to disconnect...");
    tokio::signal::ctrl_c().await?;
    bridge.close().await?;
    println!("Disconnected.");

    Ok(())
}
