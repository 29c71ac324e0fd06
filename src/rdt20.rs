//! RDT2.0: stop-and-wait over a channel that can corrupt but never lose or
//! reorder packets. No sequence numbers — the receiver instead remembers
//! the last delivered payload so a retransmitted DATA (caused by a lost
//! ACK on the return trip, in later protocols) isn't re-delivered twice.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, trace, warn};

use crate::channel::UnreliableChannel;
use crate::error::{RdtError, Result};
use crate::frame::simple::{
    decode_rdt20_control, encode_rdt20_control, Rdt20Data, RDT20_KIND_ACK, RDT20_KIND_NAK,
};

const RESPONSE_TIMEOUT: Duration = Duration::from_secs(2);

pub struct Rdt20Sender {
    channel: Arc<UnreliableChannel>,
    peer_tx: Arc<mpsc::UnboundedSender<Vec<u8>>>,
    reply_rx: mpsc::UnboundedReceiver<Vec<u8>>,
}

impl Rdt20Sender {
    pub fn new(
        channel: Arc<UnreliableChannel>,
        peer_tx: Arc<mpsc::UnboundedSender<Vec<u8>>>,
        reply_rx: mpsc::UnboundedReceiver<Vec<u8>>,
    ) -> Self {
        Self {
            channel,
            peer_tx,
            reply_rx,
        }
    }

    /// Sends one payload to completion, retransmitting on timeout, bad
    /// reply length, or NAK. Returns the number of retransmissions it took.
    pub async fn send(&mut self, payload: Bytes) -> Result<u32> {
        let frame = Rdt20Data::new(payload);
        let encoded = frame.encode().to_vec();
        let mut retransmissions = 0;

        loop {
            self.channel.send(encoded.clone(), Arc::clone(&self.peer_tx));

            match timeout(RESPONSE_TIMEOUT, self.reply_rx.recv()).await {
                Ok(Some(reply)) => match decode_rdt20_control(&reply) {
                    Some(RDT20_KIND_ACK) => {
                        trace!(retransmissions, "rdt2.0: delivery acked");
                        return Ok(retransmissions);
                    }
                    Some(RDT20_KIND_NAK) => {
                        debug!("rdt2.0: received NAK, retransmitting");
                        retransmissions += 1;
                    }
                    _ => {
                        warn!("rdt2.0: malformed reply, retransmitting");
                        retransmissions += 1;
                    }
                },
                Ok(None) => return Err(RdtError::Closed),
                Err(_) => {
                    debug!("rdt2.0: response timed out, retransmitting");
                    retransmissions += 1;
                }
            }
        }
    }
}

pub struct Rdt20Receiver {
    channel: Arc<UnreliableChannel>,
    peer_tx: Arc<mpsc::UnboundedSender<Vec<u8>>>,
    data_rx: mpsc::UnboundedReceiver<Vec<u8>>,
    last_delivered: Option<(u32, Bytes)>,
}

impl Rdt20Receiver {
    pub fn new(
        channel: Arc<UnreliableChannel>,
        peer_tx: Arc<mpsc::UnboundedSender<Vec<u8>>>,
        data_rx: mpsc::UnboundedReceiver<Vec<u8>>,
    ) -> Self {
        Self {
            channel,
            peer_tx,
            data_rx,
            last_delivered: None,
        }
    }

    fn reply(&self, kind: u8) {
        let encoded = encode_rdt20_control(kind).to_vec();
        self.channel.send(encoded, Arc::clone(&self.peer_tx));
    }

    /// Waits for the next application-layer payload, handling corruption
    /// and idempotent redelivery transparently. Never returns a corrupted
    /// or duplicate payload to the caller.
    pub async fn recv(&mut self) -> Result<Bytes> {
        loop {
            let raw = self.data_rx.recv().await.ok_or(RdtError::Closed)?;
            let frame = match Rdt20Data::decode(&raw) {
                Ok(f) => f,
                Err(_) => {
                    self.reply(RDT20_KIND_NAK);
                    continue;
                }
            };
            if !frame.verify() {
                self.reply(RDT20_KIND_NAK);
                continue;
            }

            if let Some((checksum, payload)) = &self.last_delivered {
                if *checksum == frame.checksum && *payload == frame.payload {
                    // Sender never saw our ACK; re-ack without re-delivering.
                    self.reply(RDT20_KIND_ACK);
                    continue;
                }
            }

            self.last_delivered = Some((frame.checksum, frame.payload.clone()));
            self.reply(RDT20_KIND_ACK);
            return Ok(frame.payload);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ChannelConfig;

    fn wire() -> (
        Arc<UnreliableChannel>,
        mpsc::UnboundedSender<Vec<u8>>,
        mpsc::UnboundedReceiver<Vec<u8>>,
        mpsc::UnboundedSender<Vec<u8>>,
        mpsc::UnboundedReceiver<Vec<u8>>,
    ) {
        let channel = Arc::new(UnreliableChannel::perfect());
        let (to_receiver_tx, to_receiver_rx) = mpsc::unbounded_channel();
        let (to_sender_tx, to_sender_rx) = mpsc::unbounded_channel();
        (
            channel,
            to_receiver_tx,
            to_receiver_rx,
            to_sender_tx,
            to_sender_rx,
        )
    }

    #[tokio::test]
    async fn perfect_channel_delivers_on_first_try() {
        let (channel, to_receiver_tx, to_receiver_rx, to_sender_tx, to_sender_rx) = wire();
        let mut sender = Rdt20Sender::new(
            Arc::clone(&channel),
            Arc::new(to_receiver_tx),
            to_sender_rx,
        );
        let mut receiver =
            Rdt20Receiver::new(Arc::clone(&channel), Arc::new(to_sender_tx), to_receiver_rx);

        let (send_result, recv_result) = tokio::join!(
            sender.send(Bytes::from_static(b"hello")),
            receiver.recv(),
        );
        assert_eq!(send_result.unwrap(), 0);
        assert_eq!(recv_result.unwrap(), Bytes::from_static(b"hello"));
    }

    #[tokio::test]
    async fn heavy_corruption_still_delivers_eventually() {
        let channel = Arc::new(UnreliableChannel::new(ChannelConfig {
            corrupt_rate: 0.3,
            ..Default::default()
        }));
        let (to_receiver_tx, to_receiver_rx) = mpsc::unbounded_channel();
        let (to_sender_tx, to_sender_rx) = mpsc::unbounded_channel();
        let mut sender = Rdt20Sender::new(
            Arc::clone(&channel),
            Arc::new(to_receiver_tx),
            to_sender_rx,
        );
        let mut receiver =
            Rdt20Receiver::new(Arc::clone(&channel), Arc::new(to_sender_tx), to_receiver_rx);

        let (send_result, recv_result) = tokio::join!(
            sender.send(Bytes::from_static(b"a message long enough to corrupt")),
            receiver.recv(),
        );
        assert!(send_result.is_ok());
        assert_eq!(
            recv_result.unwrap(),
            Bytes::from_static(b"a message long enough to corrupt")
        );
    }
}
