//! Selective-Repeat: a fixed sliding window of segments in flight at once,
//! each with its own retransmission timer, acked individually rather than
//! cumulatively.
//!
//! Payloads larger than one segment are split into `MSS`-sized chunks and
//! numbered sequentially; the receiver buffers out-of-order arrivals and
//! only hands contiguous, in-order bytes back to the caller. The receiver
//! is told the chunk count up front (agreed out of band, the way a caller
//! already knows how much data it asked to transfer) rather than discovering
//! it from a final-segment marker on the wire.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::channel::UnreliableChannel;
use crate::error::{RdtError, Result};
use crate::frame::window::WindowFrame;

pub const MSS: usize = 1000;

fn chunk(data: &Bytes) -> Vec<Bytes> {
    if data.is_empty() {
        return vec![Bytes::new()];
    }
    data.chunks(MSS).map(Bytes::copy_from_slice).collect()
}

pub struct SelectiveRepeatSender {
    channel: Arc<UnreliableChannel>,
    peer_tx: Arc<mpsc::UnboundedSender<Vec<u8>>>,
    reply_rx: mpsc::UnboundedReceiver<Vec<u8>>,
    window_size: u32,
    rto: Duration,
}

impl SelectiveRepeatSender {
    pub fn new(
        channel: Arc<UnreliableChannel>,
        peer_tx: Arc<mpsc::UnboundedSender<Vec<u8>>>,
        reply_rx: mpsc::UnboundedReceiver<Vec<u8>>,
        window_size: u32,
        rto: Duration,
    ) -> Self {
        Self {
            channel,
            peer_tx,
            reply_rx,
            window_size,
            rto,
        }
    }

    fn transmit(&self, seqnum: u32, payload: &Bytes) {
        let encoded = WindowFrame::data(seqnum, payload.clone()).encode().to_vec();
        self.channel.send(encoded, Arc::clone(&self.peer_tx));
    }

    /// Sends the whole payload, chunked to `MSS`, keeping up to
    /// `window_size` segments outstanding at once. Returns the total number
    /// of segments (so the peer's receiver can be told how many to expect).
    pub async fn send_all(&mut self, data: Bytes) -> Result<u32> {
        let chunks = chunk(&data);
        let total = chunks.len() as u32;

        let mut base = 0u32;
        let mut next_seq = 0u32;
        let mut acked = vec![false; chunks.len()];
        let mut deadlines: HashMap<u32, Instant> = HashMap::new();

        while base < total {
            while next_seq < total && next_seq < base + self.window_size {
                self.transmit(next_seq, &chunks[next_seq as usize]);
                deadlines.insert(next_seq, Instant::now() + self.rto);
                next_seq += 1;
            }

            let wake_at = deadlines
                .values()
                .copied()
                .min()
                .unwrap_or_else(|| Instant::now() + self.rto);

            tokio::select! {
                reply = self.reply_rx.recv() => {
                    let raw = reply.ok_or(RdtError::Closed)?;
                    if let Ok(frame) = WindowFrame::decode(&raw) {
                        if frame.verify() && frame.is_ack() {
                            let seq = frame.seqnum;
                            if seq >= base && seq < total && !acked[seq as usize] {
                                acked[seq as usize] = true;
                                deadlines.remove(&seq);
                                trace!(seq, "selective-repeat: segment acked");
                            }
                            while base < total && acked[base as usize] {
                                base += 1;
                            }
                        }
                    }
                }
                _ = tokio::time::sleep_until(wake_at) => {
                    let now = Instant::now();
                    let expired: Vec<u32> = deadlines
                        .iter()
                        .filter(|(_, deadline)| **deadline <= now)
                        .map(|(seq, _)| *seq)
                        .collect();
                    for seq in expired {
                        debug!(seq, "selective-repeat: segment timer expired, retransmitting");
                        self.transmit(seq, &chunks[seq as usize]);
                        deadlines.insert(seq, now + self.rto);
                    }
                }
            }
        }

        Ok(total)
    }
}

pub struct SelectiveRepeatReceiver {
    channel: Arc<UnreliableChannel>,
    peer_tx: Arc<mpsc::UnboundedSender<Vec<u8>>>,
    data_rx: mpsc::UnboundedReceiver<Vec<u8>>,
    window_size: u32,
}

impl SelectiveRepeatReceiver {
    pub fn new(
        channel: Arc<UnreliableChannel>,
        peer_tx: Arc<mpsc::UnboundedSender<Vec<u8>>>,
        data_rx: mpsc::UnboundedReceiver<Vec<u8>>,
        window_size: u32,
    ) -> Self {
        Self {
            channel,
            peer_tx,
            data_rx,
            window_size,
        }
    }

    fn ack(&self, seqnum: u32) {
        let encoded = WindowFrame::ack(seqnum).encode().to_vec();
        self.channel.send(encoded, Arc::clone(&self.peer_tx));
    }

    /// Receives exactly `total` segments and reassembles them in order.
    /// Corrupted segments are silently dropped (no NAK in this protocol —
    /// the sender's own timer will retransmit); out-of-window segments are
    /// dropped too, since admitting them would grow the buffer unbounded.
    pub async fn recv_all(&mut self, total: u32) -> Result<Bytes> {
        let mut base = 0u32;
        let mut buffer: BTreeMap<u32, Bytes> = BTreeMap::new();
        let mut out = BytesMut::new();

        while base < total {
            let raw = self.data_rx.recv().await.ok_or(RdtError::Closed)?;
            let frame = match WindowFrame::decode(&raw) {
                Ok(f) if f.verify() && !f.is_ack() => f,
                _ => continue,
            };

            let seq = frame.seqnum;
            if seq >= base + self.window_size || seq < base {
                // Still ack segments below the window so a sender whose ACK
                // for them was lost doesn't spin forever.
                if seq < base {
                    self.ack(seq);
                }
                continue;
            }

            self.ack(seq);
            buffer.entry(seq).or_insert(frame.payload);

            while let Some(payload) = buffer.remove(&base) {
                out.extend_from_slice(&payload);
                base += 1;
            }
        }

        Ok(out.freeze())
    }
}
