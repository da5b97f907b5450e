//! Example: Dim a light, read its level back and run a scene.

use std::time::Duration;

use lutron_lan_bridge::{BridgeConfig, Command, FadeTime, Level, Light, LutronBridge, Scene};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = BridgeConfig::builder()
        .host("192.168.1.10")
        .command_spacing(Some(Duration::from_millis(50)))
        .build();
    let bridge = LutronBridge::connect(config).await?;

    let mut light = Light::new(2, "Kitchen Pendants");
    light.default_fade = Some(FadeTime::from_secs(2));

    let target = Level::from_percent(40).ok_or_else(|| anyhow::anyhow!("bad level"))?;
    println!("Dimming {} to {}%...", light.name, target);
    bridge.send_command(&light.set_level(target, None)).await?;

    tokio::time::sleep(Duration::from_secs(3)).await;
    let reply = bridge.send_query(&Command::query_output(light.id), None).await?;
    light.update(&reply);
    println!("{} reports {:?}", light.name, light.level());

    let scene = Scene::new(1, "Movie Night");
    println!("Activating scene {}...", scene.name);
    bridge.send_command(&scene.activate()).await?;

    println!("Turning {} off", light.name);
    bridge.send_command(&light.turn_off(Some(FadeTime::from_secs_f64(0.5)))).await?;

    bridge.close().await?;
    Ok(())
}
