//! In-process unreliable datagram channel.
//!
//! Models three independent faults seen on a real link: loss, corruption,
//! and delay. Loss is checked first and applies to every packet kind;
//! corruption only ever touches DATA packets (control frames like ACK/NAK
//! are assumed short and cheap to retransmit, so corrupting them would just
//! trigger another round trip without exercising anything new); delay
//! applies to whatever survives and is implemented by deferring delivery on
//! a spawned task rather than blocking the sender.

use std::ops::Range;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::mpsc;
use tokio::time::sleep;

/// A packet kind discriminator so the channel knows whether corruption may
/// apply. DATA packets begin with a kind byte of 0 in every wire format
/// used by this crate; control frames use non-zero kind bytes.
pub fn is_data_packet(bytes: &[u8]) -> bool {
    bytes.first() == Some(&0)
}

#[derive(Debug, Clone)]
pub struct ChannelConfig {
    pub loss_rate: f64,
    pub corrupt_rate: f64,
    pub delay_range: Range<Duration>,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            loss_rate: 0.0,
            corrupt_rate: 0.0,
            delay_range: Duration::ZERO..Duration::ZERO,
        }
    }
}

/// Delivers bytes between two in-process endpoints, injecting loss,
/// corruption, and delay according to `ChannelConfig`.
pub struct UnreliableChannel {
    config: ChannelConfig,
}

impl UnreliableChannel {
    pub fn new(config: ChannelConfig) -> Self {
        Self { config }
    }

    pub fn perfect() -> Self {
        Self::new(ChannelConfig::default())
    }

    /// Corrupts a DATA packet by flipping bits at 1 to `min(5, ceil(len/4))`
    /// random byte positions.
    fn corrupt(bytes: &mut [u8]) {
        if bytes.is_empty() {
            return;
        }
        let max_positions = 5.min((bytes.len() + 3) / 4).max(1);
        let mut rng = rand::rng();
        let positions = rng.random_range(1..=max_positions);
        for _ in 0..positions {
            let idx = rng.random_range(0..bytes.len());
            bytes[idx] ^= 0xFF;
        }
    }

    /// Sends `bytes` toward `tx`, applying loss/corruption/delay. Returns
    /// immediately; delivery (if any) happens on a spawned task.
    pub fn send(&self, bytes: Vec<u8>, tx: Arc<mpsc::UnboundedSender<Vec<u8>>>) {
        let mut rng = rand::rng();
        if rng.random_bool(self.config.loss_rate) {
            return;
        }

        let mut bytes = bytes;
        if is_data_packet(&bytes) && rng.random_bool(self.config.corrupt_rate) {
            Self::corrupt(&mut bytes);
        }

        let delay = if self.config.delay_range.end > self.config.delay_range.start {
            let lo = self.config.delay_range.start.as_nanos() as u64;
            let hi = self.config.delay_range.end.as_nanos() as u64;
            Duration::from_nanos(rng.random_range(lo..hi))
        } else {
            self.config.delay_range.start
        };

        tokio::spawn(async move {
            if !delay.is_zero() {
                sleep(delay).await;
            }
            let _ = tx.send(bytes);
        });
    }
}
