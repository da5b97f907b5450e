// MIT License - Copyright (c) 2026 Peter Wright
// MQTT bridge

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use serde::{Deserialize, Serialize};
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::{Mutex, mpsc};
use tokio::time::{Duration, interval};
use tracing::{debug, error, info, warn};

use lutron_lan_bridge::{
    BridgeConfig, BridgeEvent, ButtonAction, Catalog, Command, Device, DeviceKind, DeviceRequest,
    DeviceState, FadeTime, FanSpeed, Level, ListenerResult, LutronBridge, Message,
    SubscriptionHandle,
};

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[command(name = "caseta2mqtt")]
#[command(about = "Bridge between a Lutron Caseta / RA2 Select bridge and MQTT")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, default_value = "config.toml")]
    config: String,
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct Config {
    bridge: BridgeToml,
    mqtt: MqttToml,
    #[serde(default)]
    devices: DevicesToml,
}

#[derive(Debug, Deserialize)]
struct BridgeToml {
    host: String,
    #[serde(default = "default_bridge_port")]
    port: u16,
    #[serde(default = "default_user")]
    user: String,
    #[serde(default = "default_password")]
    password: String,
    #[serde(default = "default_login_timeout")]
    login_timeout_secs: u64,
    #[serde(default = "default_query_timeout")]
    query_timeout_secs: u64,
    #[serde(default = "default_reconnect_delay")]
    reconnect_delay_ms: u64,
    #[serde(default = "default_max_reconnect_delay")]
    max_reconnect_delay_secs: u64,
    /// 0 disables the keepalive ping
    #[serde(default = "default_keepalive")]
    keepalive_secs: u64,
    /// Minimum gap between writes; 0 for none
    #[serde(default)]
    command_spacing_ms: u64,
}

fn default_bridge_port() -> u16 {
    23
}
fn default_user() -> String {
    "lutron".to_string()
}
fn default_password() -> String {
    "integration".to_string()
}
fn default_login_timeout() -> u64 {
    10
}
fn default_query_timeout() -> u64 {
    5
}
fn default_reconnect_delay() -> u64 {
    1000
}
fn default_max_reconnect_delay() -> u64 {
    60
}
fn default_keepalive() -> u64 {
    60
}

#[derive(Debug, Deserialize)]
struct MqttToml {
    url: String,
    #[serde(default = "default_client_id")]
    client_id: String,
    #[serde(default = "default_subscribe_topic")]
    subscribe_topic: String,
    #[serde(default = "default_publish_topic")]
    publish_topic: String,
    #[serde(default = "default_snapshot_interval")]
    snapshot_interval_secs: u64,
}

fn default_client_id() -> String {
    "caseta-bridge".to_string()
}
fn default_subscribe_topic() -> String {
    "caseta/cmd".to_string()
}
fn default_publish_topic() -> String {
    "caseta".to_string()
}
fn default_snapshot_interval() -> u64 {
    60
}

#[derive(Debug, Default, Deserialize)]
struct DevicesToml {
    /// Integration report exported from the Lutron app
    #[serde(default)]
    catalog: Option<String>,
    #[serde(default)]
    switch: Vec<u32>,
    #[serde(default)]
    cover: Vec<u32>,
    #[serde(default)]
    fan: Vec<u32>,
    /// Fade applied to lights when a command names none
    #[serde(default)]
    default_transition_secs: Option<f64>,
}

fn optional_duration(value: u64, unit: fn(u64) -> Duration) -> Option<Duration> {
    (value > 0).then(|| unit(value))
}

fn build_bridge_config(toml: &BridgeToml) -> BridgeConfig {
    BridgeConfig::builder()
        .host(&toml.host)
        .port(toml.port)
        .user(&toml.user)
        .password(&toml.password)
        .login_timeout(Duration::from_secs(toml.login_timeout_secs))
        .query_timeout(Duration::from_secs(toml.query_timeout_secs))
        .reconnect_delay(Duration::from_millis(toml.reconnect_delay_ms))
        .max_reconnect_delay(Duration::from_secs(toml.max_reconnect_delay_secs))
        .keepalive_interval(optional_duration(toml.keepalive_secs, Duration::from_secs))
        .command_spacing(optional_duration(toml.command_spacing_ms, Duration::from_millis))
        .build()
}

fn build_devices(toml: &DevicesToml) -> Result<Vec<Device>> {
    let mut catalog = match &toml.catalog {
        Some(path) => Catalog::load(path)
            .with_context(|| format!("Failed to load integration report {path}"))?,
        None => {
            warn!("No device catalog configured; no devices will be published");
            Catalog::default()
        }
    };
    catalog.retype(DeviceKind::Switch, &toml.switch);
    catalog.retype(DeviceKind::Cover, &toml.cover);
    catalog.retype(DeviceKind::Fan, &toml.fan);

    let default_fade = toml.default_transition_secs.map(FadeTime::from_secs_f64);
    let devices = catalog
        .entries()
        .iter()
        .map(|entry| {
            let mut device = Device::from_entry(entry);
            if let Device::Light(light) = &mut device {
                light.default_fade = default_fade;
            }
            device
        })
        .collect::<Vec<_>>();
    info!("Loaded {} devices", devices.len());
    Ok(devices)
}

// ---------------------------------------------------------------------------
// MQTT JSON types
// ---------------------------------------------------------------------------

// Published messages share a flat {now, op, ...} structure

#[derive(Serialize)]
struct MqttDevice {
    id: u32,
    kind: DeviceKind,
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    area: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    scene: Option<u32>,
    #[serde(flatten)]
    state: DeviceState,
}

impl MqttDevice {
    fn from_device(device: &Device) -> Self {
        Self {
            id: device.id(),
            kind: device.kind(),
            name: device.name().to_string(),
            area: device.area().map(str::to_string),
            scene: device.scene_id(),
            state: device.state(),
        }
    }
}

#[derive(Serialize)]
struct MqttSnapshot {
    now: u64,
    op: String,
    devices: Vec<MqttDevice>,
}

// Device state change: {now, op, device}
#[derive(Serialize)]
struct MqttDeviceEvent {
    now: u64,
    op: String,
    device: MqttDevice,
}

// Remote buttons: {now, op, id, button}
#[derive(Serialize)]
struct MqttButtonEvent {
    now: u64,
    op: String,
    id: u32,
    button: u32,
}

// Connection lifecycle: {now, op} plus retry details
#[derive(Serialize)]
struct MqttBridgeEvent {
    now: u64,
    op: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    attempt: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    delay_ms: Option<u64>,
}

// CMD_ACK response
#[derive(Serialize)]
struct MqttCmdAck {
    now: u64,
    op: String,
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    src: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<serde_json::Value>,
}

// Inbound command (subscribed)
#[derive(Deserialize)]
struct MqttCommand {
    op: String,
    #[serde(default)]
    #[allow(dead_code)]
    op_id: Option<String>,
    #[serde(default)]
    id: Option<u32>,
    #[serde(default)]
    scene: Option<u32>,
    #[serde(default)]
    level: Option<f64>,
    #[serde(default)]
    fade: Option<f64>,
    #[serde(default)]
    speed: Option<String>,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

type Devices = Arc<Mutex<Vec<Device>>>;

/// Held for the whole of a refresh pass. The bridge allows one query per
/// key, so overlapping passes would reject each other.
type RefreshGate = Arc<Mutex<()>>;

fn now_epoch_ms() -> u64 {
    Utc::now().timestamp_millis() as u64
}

async fn publish_json(client: &AsyncClient, topic: &str, payload: &impl Serialize, retain: bool) {
    match serde_json::to_string(payload) {
        Ok(json) => {
            if let Err(e) = client.publish(topic, QoS::AtLeastOnce, retain, json).await {
                error!("Failed to publish to {topic}: {e}");
            }
        }
        Err(e) => error!("Failed to serialize MQTT payload: {e}"),
    }
}

async fn publish_cmd_ack(
    client: &AsyncClient,
    topic: &str,
    success: bool,
    src: Option<serde_json::Value>,
    data: Option<serde_json::Value>,
) {
    let msg = MqttCmdAck {
        now: now_epoch_ms(),
        op: "CMD_ACK".to_string(),
        success,
        src,
        data,
    };
    publish_json(client, topic, &msg, false).await;
}

async fn publish_bridge_event(client: &AsyncClient, topic: &str, event: &BridgeEvent) {
    let (op, attempt, delay_ms) = match event {
        BridgeEvent::Disconnected => ("BRIDGE_DISCONNECTED", None, None),
        BridgeEvent::Reconnecting { attempt, delay } => (
            "BRIDGE_RECONNECTING",
            Some(*attempt),
            Some(delay.as_millis() as u64),
        ),
        BridgeEvent::Reconnected => ("BRIDGE_RECONNECTED", None, None),
        BridgeEvent::AuthFailed => ("BRIDGE_AUTH_FAILED", None, None),
        BridgeEvent::Closed => ("BRIDGE_CLOSED", None, None),
    };
    let msg = MqttBridgeEvent {
        now: now_epoch_ms(),
        op: op.to_string(),
        attempt,
        delay_ms,
    };
    publish_json(client, topic, &msg, false).await;
}

async fn build_snapshot(devices: &Devices) -> MqttSnapshot {
    let devices = devices.lock().await;
    MqttSnapshot {
        now: now_epoch_ms(),
        op: "SNAPSHOT".to_string(),
        devices: devices.iter().map(MqttDevice::from_device).collect(),
    }
}

async fn publish_snapshot(client: &AsyncClient, topic: &str, devices: &Devices) {
    let snapshot = build_snapshot(devices).await;
    publish_json(client, topic, &snapshot, true).await;
}

/// Apply a message to every device listening on its key. Returns the
/// devices whose state changed.
async fn apply_message(devices: &Devices, message: &Message) -> Vec<MqttDevice> {
    let mut devices = devices.lock().await;
    devices
        .iter_mut()
        .filter(|d| d.keys().contains(&message.key()))
        .filter_map(|d| d.update(message).then(|| MqttDevice::from_device(d)))
        .collect()
}

/// Query current state for all devices (or one) and apply the replies.
async fn refresh_devices(
    bridge: &LutronBridge,
    devices: &Devices,
    gate: &Mutex<()>,
    only: Option<u32>,
) -> bool {
    let _running = gate.lock().await;
    let queries: Vec<_> = {
        let devices = devices.lock().await;
        devices
            .iter()
            .filter(|d| only.is_none_or(|id| d.id() == id))
            .filter_map(Device::refresh)
            .collect()
    };

    let mut ok = true;
    for query in queries {
        match bridge.send_query(&query, None).await {
            Ok(reply) => {
                apply_message(devices, &reply).await;
            }
            Err(e) => {
                warn!("Refresh {query} failed: {e}");
                ok = false;
            }
        }
    }
    ok
}

/// Subscribe a forwarding listener on every device key.
async fn subscribe_devices(
    bridge: &LutronBridge,
    devices: &Devices,
    tx: mpsc::UnboundedSender<Message>,
) -> Vec<SubscriptionHandle> {
    let devices = devices.lock().await;
    let mut keys: Vec<_> = devices.iter().flat_map(Device::keys).collect();
    keys.sort_by_key(|k| (k.integration_id, k.action));
    keys.dedup();

    keys.into_iter()
        .map(|key| {
            let tx = tx.clone();
            let forward = move |message: &Message| -> ListenerResult {
                tx.send(message.clone())?;
                Ok(())
            };
            bridge.subscribe(key.integration_id, key.action, forward)
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Bridge notification → MQTT
// ---------------------------------------------------------------------------

async fn handle_notification(
    message: Message,
    client: &AsyncClient,
    topic: &str,
    devices: &Devices,
) {
    if let Some(action) = message.button_action() {
        let op = match action {
            ButtonAction::Press => "BUTTON_PRESS",
            ButtonAction::Release => "BUTTON_RELEASE",
        };
        debug!("Remote {} button {}: {op}", message.integration_id, message.action);
        let event = MqttButtonEvent {
            now: now_epoch_ms(),
            op: op.to_string(),
            id: message.integration_id,
            button: message.action,
        };
        publish_json(client, topic, &event, false).await;
    }

    for device in apply_message(devices, &message).await {
        info!("{} {} ({}) changed", device.kind, device.id, device.name);
        let event = MqttDeviceEvent {
            now: now_epoch_ms(),
            op: "DEVICE_STATE".to_string(),
            device,
        };
        publish_json(client, topic, &event, false).await;
    }
}

// ---------------------------------------------------------------------------
// MQTT command handler
// ---------------------------------------------------------------------------

fn parse_request(cmd: &MqttCommand) -> std::result::Result<DeviceRequest, String> {
    let fade = cmd.fade.map(FadeTime::from_secs_f64);
    let request = match cmd.op.as_str() {
        "TURN_ON" => DeviceRequest::TurnOn { fade },
        "TURN_OFF" => DeviceRequest::TurnOff { fade },
        "SET_LEVEL" => {
            let raw = cmd.level.ok_or("missing level")?;
            let level = Level::from_f64(raw).ok_or_else(|| format!("level {raw} out of range"))?;
            DeviceRequest::SetLevel { level, fade }
        }
        "OPEN" => DeviceRequest::Open,
        "CLOSE" => DeviceRequest::Close,
        "STOP" => DeviceRequest::Stop,
        "SET_SPEED" => {
            let name = cmd.speed.as_deref().ok_or("missing speed")?;
            let speed = FanSpeed::from_name(name).ok_or_else(|| format!("unknown speed {name}"))?;
            DeviceRequest::SetSpeed(speed)
        }
        "ACTIVATE" => DeviceRequest::Activate,
        other => return Err(format!("unknown command {other}")),
    };
    Ok(request)
}

/// Resolve the target device and build the command for a request.
async fn device_command(
    cmd: &MqttCommand,
    request: DeviceRequest,
    devices: &Devices,
) -> std::result::Result<Command, String> {
    let devices = devices.lock().await;
    let device = match request {
        DeviceRequest::Activate => {
            let scene = cmd.scene.ok_or("missing scene")?;
            devices
                .iter()
                .find(|d| d.scene_id() == Some(scene))
                .ok_or_else(|| format!("unknown scene {scene}"))?
        }
        _ => {
            let id = cmd.id.ok_or("missing id")?;
            devices
                .iter()
                .find(|d| d.id() == id && d.kind() != DeviceKind::Scene)
                .ok_or_else(|| format!("unknown device {id}"))?
        }
    };
    device.command(request).map_err(|e| e.to_string())
}

async fn handle_command(
    payload_str: &str,
    cmd: MqttCommand,
    client: &AsyncClient,
    topic: &str,
    bridge: &LutronBridge,
    devices: &Devices,
    gate: &Mutex<()>,
) {
    // Parse the raw payload as a JSON value for the CMD_ACK src field
    let src_json = serde_json::from_str::<serde_json::Value>(payload_str).ok();

    match cmd.op.as_str() {
        "SNAPSHOT" => {
            debug!("Command: SNAPSHOT");
            let snapshot = build_snapshot(devices).await;
            let snapshot_value = serde_json::to_value(&snapshot).ok();
            publish_json(client, topic, &snapshot, true).await;
            publish_cmd_ack(client, topic, true, src_json, snapshot_value).await;
        }

        "PING" => {
            info!("Command: PING");
            publish_cmd_ack(client, topic, true, src_json, None).await;
        }

        "REFRESH" => {
            info!("Command: REFRESH {:?}", cmd.id);
            let success = refresh_devices(bridge, devices, gate, cmd.id).await;
            publish_snapshot(client, topic, devices).await;
            publish_cmd_ack(client, topic, success, src_json, None).await;
        }

        op => {
            let command = match parse_request(&cmd) {
                Ok(request) => device_command(&cmd, request, devices).await,
                Err(e) => Err(e),
            };
            let command = match command {
                Ok(command) => command,
                Err(e) => {
                    warn!("{op}: {e}");
                    publish_cmd_ack(client, topic, false, src_json, None).await;
                    return;
                }
            };
            info!("Command: {op} -> {command}");
            let success = match bridge.send_command(&command).await {
                Ok(()) => true,
                Err(e) => {
                    error!("{op} failed: {e}");
                    false
                }
            };
            publish_cmd_ack(client, topic, success, src_json, None).await;
        }
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    // RUST_LOG controls verbosity (e.g. RUST_LOG=debug or RUST_LOG=lutron_lan_bridge=trace).
    // Default: info.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    // systemd journal already adds timestamps, so omit them when running under systemd
    if std::env::var_os("JOURNAL_STREAM").is_some() {
        tracing_subscriber::fmt().without_time().with_env_filter(env_filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let cli = Cli::parse();

    let mut config = load_config(&cli.config)?;
    let mut devices_list = build_devices(&config.devices)?;
    let (mut mqtt_host, mut mqtt_port) = parse_mqtt_url(&config.mqtt.url)?;

    let mut sighup = signal(SignalKind::hangup())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    loop {
        let bridge_config = build_bridge_config(&config.bridge);
        let publish_topic = config.mqtt.publish_topic.clone();
        let subscribe_topic = config.mqtt.subscribe_topic.clone();

        info!("Connecting to Lutron bridge at {}", bridge_config.addr());
        let bridge = Arc::new(
            LutronBridge::connect(bridge_config)
                .await
                .context("Failed to connect to Lutron bridge")?,
        );
        info!("Bridge connected");

        let devices: Devices = Arc::new(Mutex::new(std::mem::take(&mut devices_list)));
        let (notify_tx, mut notify_rx) = mpsc::unbounded_channel();
        let handles = subscribe_devices(&bridge, &devices, notify_tx).await;
        debug!("Subscribed {} device keys", handles.len());
        let refresh_gate: RefreshGate = Arc::new(Mutex::new(()));
        refresh_devices(&bridge, &devices, &refresh_gate, None).await;

        // Set up MQTT
        let mut mqtt_opts = MqttOptions::new(&config.mqtt.client_id, &mqtt_host, mqtt_port);
        mqtt_opts.set_keep_alive(Duration::from_secs(30));
        let (client, mut eventloop) = AsyncClient::new(mqtt_opts, 256);

        client
            .subscribe(&subscribe_topic, QoS::AtLeastOnce)
            .await
            .context("Failed to subscribe to MQTT topic")?;
        info!("MQTT: subscribed to {subscribe_topic}");

        publish_snapshot(&client, &publish_topic, &devices).await;

        // Task 1: device notifications
        let client_notify = client.clone();
        let topic_notify = publish_topic.clone();
        let devices_notify = Arc::clone(&devices);
        let notify_handle = tokio::spawn(async move {
            while let Some(message) = notify_rx.recv().await {
                handle_notification(message, &client_notify, &topic_notify, &devices_notify)
                    .await;
            }
        });

        // Task 2: connection lifecycle
        let bridge_events = Arc::clone(&bridge);
        let client_events = client.clone();
        let topic_events = publish_topic.clone();
        let devices_events = Arc::clone(&devices);
        let gate_events = Arc::clone(&refresh_gate);
        let mut event_rx = bridge.events();
        let event_handle = tokio::spawn(async move {
            loop {
                match event_rx.recv().await {
                    Ok(event) => {
                        match &event {
                            BridgeEvent::Disconnected => warn!("Bridge disconnected"),
                            BridgeEvent::Reconnecting { attempt, delay } => info!(
                                "Reconnection attempt {attempt} in {:.1}s",
                                delay.as_secs_f64()
                            ),
                            BridgeEvent::Reconnected => info!("Bridge reconnected"),
                            BridgeEvent::AuthFailed => {
                                error!("Bridge login failed; giving up")
                            }
                            BridgeEvent::Closed => info!("Bridge connection closed"),
                        }
                        publish_bridge_event(&client_events, &topic_events, &event).await;
                        match event {
                            BridgeEvent::Reconnected => {
                                // Anything may have changed while we were away
                                refresh_devices(&bridge_events, &devices_events, &gate_events, None)
                                    .await;
                                publish_snapshot(&client_events, &topic_events, &devices_events)
                                    .await;
                            }
                            BridgeEvent::Closed => break,
                            _ => {}
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        warn!("Event receiver lagged, missed {n} events");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                        info!("Event channel closed");
                        break;
                    }
                }
            }
        });

        // Task 3: MQTT event loop (receives messages, handles commands)
        let bridge_cmds = Arc::clone(&bridge);
        let client_cmds = client.clone();
        let topic_cmds = publish_topic.clone();
        let devices_cmds = Arc::clone(&devices);
        let gate_cmds = Arc::clone(&refresh_gate);
        let sub_topic = subscribe_topic.clone();
        let mqtt_handle = tokio::spawn(async move {
            loop {
                match eventloop.poll().await {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        // rumqttc does not re-subscribe after a broker reconnect
                        info!("MQTT: connected, subscribing to {sub_topic}");
                        if let Err(e) = client_cmds.subscribe(&sub_topic, QoS::AtLeastOnce).await
                        {
                            error!("Failed to subscribe to {sub_topic}: {e}");
                        }
                    }
                    Ok(Event::Incoming(Packet::Publish(msg))) => {
                        if msg.topic == sub_topic {
                            let payload = String::from_utf8_lossy(&msg.payload);
                            match serde_json::from_str::<MqttCommand>(&payload) {
                                Ok(cmd) => {
                                    if cmd.op == "SNAPSHOT" {
                                        debug!("MQTT command received: {payload}");
                                    } else {
                                        info!("MQTT command received: {payload}");
                                    }
                                    handle_command(
                                        &payload,
                                        cmd,
                                        &client_cmds,
                                        &topic_cmds,
                                        &bridge_cmds,
                                        &devices_cmds,
                                        &gate_cmds,
                                    )
                                    .await;
                                }
                                Err(e) => {
                                    warn!("Failed to parse MQTT command: {e}");
                                }
                            }
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        error!("MQTT event loop error: {e}");
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        });

        // Task 4: periodic snapshot
        let bridge_snap = Arc::clone(&bridge);
        let client_snap = client.clone();
        let topic_snap = publish_topic.clone();
        let devices_snap = Arc::clone(&devices);
        let gate_snap = Arc::clone(&refresh_gate);
        let snapshot_interval_secs = config.mqtt.snapshot_interval_secs.max(1);
        let snap_handle = tokio::spawn(async move {
            let mut ticker = interval(Duration::from_secs(snapshot_interval_secs));
            // The first tick is immediate and we already published
            ticker.tick().await;
            loop {
                ticker.tick().await;
                refresh_devices(&bridge_snap, &devices_snap, &gate_snap, None).await;
                publish_snapshot(&client_snap, &topic_snap, &devices_snap).await;
            }
        });

        info!("MQTT bridge running. Send SIGHUP to restart, SIGINT/SIGTERM to stop.");
        let restart = tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received SIGINT, shutting down...");
                false
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down...");
                false
            }
            _ = sighup.recv() => {
                info!("Received SIGHUP, reloading config and restarting connections...");
                true
            }
        };

        mqtt_handle.abort();
        snap_handle.abort();
        for handle in handles {
            bridge.unsubscribe(handle);
        }
        if let Err(e) = bridge.close().await {
            warn!("Error closing bridge connection: {e}");
        }
        // Closed is the last event, so the lifecycle task finishes on its own
        if let Err(e) = event_handle.await {
            warn!("Event task ended abnormally: {e}");
        }
        notify_handle.abort();

        // Keep cached device state unless the reload replaces the catalog
        devices_list = std::mem::take(&mut *devices.lock().await);

        if !restart {
            break;
        }

        // Reload config from disk; keep previous config on failure
        info!("Reloading config from {}", cli.config);
        match load_config(&cli.config).and_then(|new_config| {
            let new_devices = build_devices(&new_config.devices)?;
            let (host, port) = parse_mqtt_url(&new_config.mqtt.url)?;
            Ok((new_config, new_devices, host, port))
        }) {
            Ok((new_config, new_devices, host, port)) => {
                config = new_config;
                devices_list = new_devices;
                mqtt_host = host;
                mqtt_port = port;
                info!("Config reloaded successfully");
            }
            Err(e) => warn!("Failed to reload config, keeping previous: {e:#}"),
        }

        info!("Reconnecting...");
    }

    info!("Shutdown complete");
    Ok(())
}

fn load_config(path: &str) -> Result<Config> {
    let text = std::fs::read_to_string(path).context("Failed to read config file")?;
    toml::from_str(&text).context("Failed to parse config file")
}

/// Parse an MQTT URL like "mqtt://host:port" into (host, port).
fn parse_mqtt_url(url: &str) -> Result<(String, u16)> {
    let stripped = url
        .strip_prefix("mqtt://")
        .or_else(|| url.strip_prefix("tcp://"))
        .unwrap_or(url);

    let (host, port_str) = stripped
        .rsplit_once(':')
        .context("MQTT URL must be in format mqtt://host:port")?;

    let port: u16 = port_str.parse().context("Invalid MQTT port number")?;

    Ok((host.to_string(), port))
}
