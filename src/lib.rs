// MIT License - Copyright (c) 2026 Peter Wright
//
//! # lutron-lan-bridge
//!
//! Long-lived client for the Lutron Integration Protocol, spoken by Caséta
//! Smart Bridge PRO and RadioRA 2 main repeaters over Telnet.
//!
//! The library logs in, keeps one session open, reconnects with backoff
//! when it drops, pairs queries with their replies and fans unsolicited
//! notifications out to per-device listeners.
//!
//! ## Quick Start
//!
//! ```no_run
//! use lutron_lan_bridge::{BridgeConfig, BridgeEvent, Command, FadeTime, Level, LutronBridge};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = BridgeConfig::builder()
//!         .host("192.168.1.10")
//!         .user("lutron")
//!         .password("integration")
//!         .build();
//!
//!     let bridge = LutronBridge::connect(config).await?;
//!
//!     let mut events = bridge.events();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             if matches!(event, BridgeEvent::Closed) {
//!                 break;
//!             }
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let level = Level::from_percent(75).unwrap();
//!     bridge
//!         .send_command(&Command::set_level(2, level, Some(FadeTime::from_secs(3)), None))
//!         .await?;
//!
//!     tokio::signal::ctrl_c().await?;
//!     bridge.close().await?;
//!     Ok(())
//! }
//! ```

pub mod backoff;
pub mod bridge;
pub mod bus;
pub mod catalog;
pub mod config;
pub mod constants;
pub mod devices;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod protocol;
pub mod transport;

// Re-exports for convenience
pub use backoff::Backoff;
pub use bridge::LutronBridge;
pub use bus::{ChannelListener, Listener, ListenerResult, NotificationBus, SubscriptionHandle};
pub use catalog::{Catalog, CatalogEntry, CatalogError, DeviceKind};
pub use config::{BridgeConfig, BridgeConfigBuilder};
pub use constants::{ButtonAction, OutputAction};
pub use devices::{
    ButtonState, Device, DeviceRequest, DeviceState, Fan, Light, Remote, Scene, Shade, Switch,
};
pub use dispatch::{Dispatcher, PendingQuery};
pub use error::{AuthFailure, BridgeErrorCode, LutronError, Result};
pub use event::{BridgeEvent, EventReceiver};
pub use protocol::{
    Command, DeviceKey, FadeTime, FanSpeed, Level, Message, MessageKind, Operand, Operation,
    ParseError, Sigil, decode, encode,
};
pub use transport::SessionState;
