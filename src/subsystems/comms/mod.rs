//! Comms subsystem — gateway webhook intake and reply dispatch.
//!
//! # Architecture
//!
//! The webhook listener and the dedup sweeper each implement
//! [`runtime::Component`](crate::subsystems::runtime::Component) and are
//! spawned by [`start`] via [`spawn_components`]. Both capture the shared
//! [`Arc<CommsState>`] at construction time.
//!
//! An intra-subsystem [`mpsc`] channel lets the webhook channel report
//! lifecycle events. It is drained in a short-lived background task that
//! ends when every sender is dropped.
//!
//! # Starting
//!
//! [`start`] is synchronous once the state is built: it returns a
//! [`SubsystemHandle`] as soon as the tasks are spawned.

pub mod dedup;
mod state;
pub mod webhook;

pub use state::{CommsEvent, CommsState};

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::AppError;
use crate::gateway::GatewayClient;
use crate::knowledge::{KnowledgeBase, KnowledgeStore};
use crate::subsystems::runtime::{Component, SubsystemHandle, spawn_components};

/// Capacity of the channel → manager event queue.
const EVENT_QUEUE: usize = 32;

/// Build the comms state and spawn the webhook channel plus dedup sweeper.
///
/// Fails only when the state cannot be built (e.g. corrupt welcome file).
/// A bind failure surfaces later through the returned handle and cancels
/// `shutdown` for everything else.
pub fn start(
    config: &Config,
    knowledge: KnowledgeBase,
    store: KnowledgeStore,
    gateway: GatewayClient,
    shutdown: CancellationToken,
) -> Result<SubsystemHandle, AppError> {
    let (event_tx, event_rx) = mpsc::channel::<CommsEvent>(EVENT_QUEUE);
    let state = Arc::new(CommsState::new(config, knowledge, store, gateway, event_tx)?);

    info!(bind = %config.webhook.bind, "loading webhook channel");
    let components: Vec<Box<dyn Component>> = vec![
        Box::new(webhook::WebhookChannel::new("webhook0", config.webhook.bind.clone(), state.clone())),
        Box::new(dedup::DedupSweeper::new("dedup0", state.dedup())),
    ];

    // The state (and its sender) lives inside the components, so the drain
    // ends once they have all exited.
    drop(state);
    tokio::spawn(async move {
        let mut rx = event_rx;
        while let Some(event) = rx.recv().await {
            match event {
                CommsEvent::ChannelStarted { ref channel_id } => {
                    debug!(channel_id, "channel reported start");
                }
                CommsEvent::ChannelShutdown { ref channel_id } => {
                    debug!(channel_id, "channel reported shutdown");
                }
            }
        }
    });

    Ok(spawn_components(components, shutdown))
}
