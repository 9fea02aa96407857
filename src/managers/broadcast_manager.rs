// BroadcastChannelManager: Centralized tokio broadcast channel management
// Single Responsibility: Broadcast channel lifecycle and subscription

use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

use crate::scheduler::DisplayUpdate;

/// Manages the display broadcast channel
///
/// Display updates are the presentation seam of the trainer: the scheduler
/// publishes a snapshot whenever the active slot changes, and any number
/// of renderers (terminal grid, future GUI) subscribe independently.
///
/// # Notes
/// - Buffer size: 100 messages; boundary events arrive at bar rate, so
///   even a stalled subscriber has seconds of slack
/// - The channel is created once and survives session restarts, so
///   subscribers never need to resubscribe across stop/start
pub struct BroadcastChannelManager {
    display: Arc<Mutex<Option<broadcast::Sender<DisplayUpdate>>>>,
}

impl BroadcastChannelManager {
    pub fn new() -> Self {
        Self {
            display: Arc::new(Mutex::new(None)),
        }
    }

    /// Get or create the display broadcast channel
    ///
    /// Returns a sender for the scheduler to publish display updates.
    /// Idempotent: subsequent calls return the existing channel so
    /// subscribers survive session restarts.
    pub fn init_display(&self) -> broadcast::Sender<DisplayUpdate> {
        let mut guard = self.display.lock().unwrap();
        match guard.as_ref() {
            Some(tx) => tx.clone(),
            None => {
                let (tx, _) = broadcast::channel(100);
                *guard = Some(tx.clone());
                tx
            }
        }
    }

    /// Subscribe to display updates
    ///
    /// Returns `None` if `init_display()` has not been called yet. Each
    /// subscriber gets an independent receiver.
    pub fn subscribe_display(&self) -> Option<broadcast::Receiver<DisplayUpdate>> {
        self.display
            .lock()
            .unwrap()
            .as_ref()
            .map(|tx| tx.subscribe())
    }
}

impl Default for BroadcastChannelManager {
    fn default() -> Self {
        Self::new()
    }
}
