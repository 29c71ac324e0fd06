//! A reliable-data-transfer protocol ladder — RDT2.0, RDT2.1, RDT3.0, and
//! Selective-Repeat — plus a TCP-like byte-stream transport, all running
//! over an in-process unreliable datagram channel that can drop, corrupt,
//! or delay packets.
//!
//! Each protocol module is self-contained and assumes progressively less
//! from the channel underneath it: RDT2.0 and RDT2.1 assume packets are
//! never lost or reordered, only corrupted; RDT3.0 drops the no-loss
//! assumption by adding a retransmission timer; Selective-Repeat pipelines
//! multiple segments at once instead of stopping and waiting for each one;
//! `stream` generalizes all of it into an ordered byte-stream abstraction
//! with a real connection lifecycle.

pub mod channel;
pub mod error;
pub mod frame;
pub mod rdt20;
pub mod rdt21;
pub mod rdt30;
pub mod rtt;
pub mod selective_repeat;
pub mod stream;

pub use channel::{ChannelConfig, UnreliableChannel};
pub use error::{RdtError, Result};
pub use rdt20::{Rdt20Receiver, Rdt20Sender};
pub use rdt21::{Rdt21Receiver, Rdt21Sender};
pub use rdt30::{Rdt30Receiver, Rdt30Sender};
pub use rtt::RttEstimator;
pub use selective_repeat::{SelectiveRepeatReceiver, SelectiveRepeatSender};
pub use stream::Stream;
