//! RDT3.0: RDT2.1 plus a sender-side retransmission timer.
//!
//! This is the first rung of the ladder built for a channel that can lose
//! packets outright, not just corrupt them. The wire format, seqnum
//! alternation, and receiver behavior are unchanged from RDT2.1 — only the
//! sender gains a timeout, and a lost DATA frame or a lost ACK are
//! indistinguishable to it: both just retransmit the same frame.
//!
//! The receiver is reused unmodified; see [`crate::rdt21::Rdt21Receiver`].

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, trace, warn};

use crate::channel::UnreliableChannel;
use crate::error::{RdtError, Result};
use crate::frame::simple::{Rdt21Frame, RDT21_KIND_ACK};

pub use crate::rdt21::Rdt21Receiver as Rdt30Receiver;

const RETRANSMIT_TIMEOUT: Duration = Duration::from_millis(800);

pub struct Rdt30Sender {
    channel: Arc<UnreliableChannel>,
    peer_tx: Arc<mpsc::UnboundedSender<Vec<u8>>>,
    reply_rx: mpsc::UnboundedReceiver<Vec<u8>>,
    seqnum: u8,
}

impl Rdt30Sender {
    pub fn new(
        channel: Arc<UnreliableChannel>,
        peer_tx: Arc<mpsc::UnboundedSender<Vec<u8>>>,
        reply_rx: mpsc::UnboundedReceiver<Vec<u8>>,
    ) -> Self {
        Self {
            channel,
            peer_tx,
            reply_rx,
            seqnum: 0,
        }
    }

    pub async fn send(&mut self, payload: Bytes) -> Result<u32> {
        let frame = Rdt21Frame::data(self.seqnum, payload);
        let encoded = frame.encode().to_vec();
        let mut retransmissions = 0;

        loop {
            self.channel.send(encoded.clone(), Arc::clone(&self.peer_tx));

            match timeout(RETRANSMIT_TIMEOUT, self.reply_rx.recv()).await {
                Ok(Some(reply)) => match Rdt21Frame::decode(&reply) {
                    Ok(reply) if reply.verify() && reply.kind == RDT21_KIND_ACK => {
                        if reply.seqnum == self.seqnum {
                            trace!(retransmissions, seqnum = self.seqnum, "rdt3.0: acked");
                            self.seqnum ^= 1;
                            return Ok(retransmissions);
                        }
                        debug!("rdt3.0: ack for stale seqnum, retransmitting");
                        retransmissions += 1;
                    }
                    _ => {
                        warn!("rdt3.0: bad or unverifiable reply, retransmitting");
                        retransmissions += 1;
                    }
                },
                Ok(None) => return Err(RdtError::Closed),
                Err(_) => {
                    debug!("rdt3.0: retransmission timer fired");
                    retransmissions += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ChannelConfig;

    #[tokio::test]
    async fn loss_and_delay_still_converge_to_delivery() {
        let channel = Arc::new(UnreliableChannel::new(ChannelConfig {
            loss_rate: 0.15,
            delay_range: Duration::from_millis(5)..Duration::from_millis(40),
            ..Default::default()
        }));
        let (to_receiver_tx, to_receiver_rx) = mpsc::unbounded_channel();
        let (to_sender_tx, to_sender_rx) = mpsc::unbounded_channel();
        let mut sender = Rdt30Sender::new(
            Arc::clone(&channel),
            Arc::new(to_receiver_tx),
            to_sender_rx,
        );
        let mut receiver =
            Rdt30Receiver::new(Arc::clone(&channel), Arc::new(to_sender_tx), to_receiver_rx);

        let (send_result, recv_result) = tokio::join!(
            sender.send(Bytes::from_static(b"over a lossy link")),
            receiver.recv(),
        );
        assert!(send_result.is_ok());
        assert_eq!(recv_result.unwrap(), Bytes::from_static(b"over a lossy link"));
    }
}
