//! RDT2.1: stop-and-wait with an alternating 1-bit sequence number, over a
//! channel that can corrupt but never lose or reorder packets.
//!
//! The sequence number lets the receiver tell a genuine new DATA frame
//! apart from the sender's retransmission of the previous one (caused by a
//! corrupted ACK on the return trip), without needing to remember payload
//! bytes the way RDT2.0's receiver does. Since this channel is assumed never
//! to lose packets, the sender waits for a reply with no timer at all —
//! RDT3.0 is the rung of the ladder that adds one.

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::channel::UnreliableChannel;
use crate::error::{RdtError, Result};
use crate::frame::simple::{Rdt21Frame, RDT21_KIND_ACK, RDT21_KIND_DATA};

pub struct Rdt21Sender {
    channel: Arc<UnreliableChannel>,
    peer_tx: Arc<mpsc::UnboundedSender<Vec<u8>>>,
    reply_rx: mpsc::UnboundedReceiver<Vec<u8>>,
    seqnum: u8,
}

impl Rdt21Sender {
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

            let reply = self.reply_rx.recv().await.ok_or(RdtError::Closed)?;
            match Rdt21Frame::decode(&reply) {
                Ok(reply) if reply.verify() && reply.kind == RDT21_KIND_ACK => {
                    if reply.seqnum == self.seqnum {
                        trace!(retransmissions, seqnum = self.seqnum, "rdt2.1: acked");
                        self.seqnum ^= 1;
                        return Ok(retransmissions);
                    }
                    debug!("rdt2.1: ack for stale seqnum, retransmitting");
                    retransmissions += 1;
                }
                _ => {
                    warn!("rdt2.1: bad or unverifiable reply, retransmitting");
                    retransmissions += 1;
                }
            }
        }
    }
}

pub struct Rdt21Receiver {
    channel: Arc<UnreliableChannel>,
    peer_tx: Arc<mpsc::UnboundedSender<Vec<u8>>>,
    data_rx: mpsc::UnboundedReceiver<Vec<u8>>,
    expected: u8,
}

impl Rdt21Receiver {
    pub fn new(
        channel: Arc<UnreliableChannel>,
        peer_tx: Arc<mpsc::UnboundedSender<Vec<u8>>>,
        data_rx: mpsc::UnboundedReceiver<Vec<u8>>,
    ) -> Self {
        Self {
            channel,
            peer_tx,
            data_rx,
            expected: 0,
        }
    }

    fn ack(&self, seqnum: u8) {
        let encoded = Rdt21Frame::ack(seqnum).encode().to_vec();
        self.channel.send(encoded, Arc::clone(&self.peer_tx));
    }

    pub async fn recv(&mut self) -> Result<Bytes> {
        loop {
            let raw = self.data_rx.recv().await.ok_or(RdtError::Closed)?;
            let frame = match Rdt21Frame::decode(&raw) {
                Ok(f) if f.verify() => f,
                _ => {
                    self.ack(self.expected ^ 1);
                    continue;
                }
            };

            if frame.kind != RDT21_KIND_DATA {
                continue;
            }

            if frame.seqnum == self.expected {
                self.ack(self.expected);
                self.expected ^= 1;
                return Ok(frame.payload);
            }

            // Duplicate of the previous DATA frame: the sender never saw
            // our ACK. Re-ack it, without delivering again.
            self.ack(frame.seqnum);
        }
    }
}
