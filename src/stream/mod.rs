//! TCP-like reliable byte-stream transport: three-way handshake, cumulative
//! ACKs, RTT-adaptive retransmission, a static flow-control window, and
//! four-way teardown.
//!
//! Two background tasks drive a connection once it exists: a receive loop
//! that decodes incoming segments and is the sole mutator of connection
//! state, and a retransmission loop that periodically resends anything in
//! the send buffer whose timer has expired. Both share the same
//! `Arc<Mutex<Inner>>`; the mutex is never held across an `.await` other
//! than the one on the next incoming segment or the next timer tick.
//!
//! TIME_WAIT is not implemented: `FIN_WAIT_2` and `LAST_ACK` transition
//! straight to `CLOSED` on the matching ACK/FIN, since this transport has no
//! real network below it for a stray duplicate segment to arrive from after
//! close.

pub mod state;

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use parking_lot::Mutex;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tokio::time::{timeout, Instant};
use tracing::{debug, trace, warn};

use crate::channel::UnreliableChannel;
use crate::error::{RdtError, Result};
use crate::frame::segment::{Flags, Segment, FLAG_ACK, FLAG_FIN, FLAG_SYN};
use crate::rtt::RttEstimator;
use state::StreamState;

pub const MSS: usize = 1000;
pub const DEFAULT_WINDOW: u16 = 4096;

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);
const RETRANSMIT_SCAN_INTERVAL: Duration = Duration::from_millis(50);
const MAX_PENDING_SEGMENTS: usize = 500;

struct Outstanding {
    seq: u32,
    seq_len: u32,
    flags: Flags,
    payload: Bytes,
    sent_at: Instant,
    retransmitted: bool,
}

struct Inner {
    state: StreamState,
    send_una: u32,
    send_next: u32,
    send_buffer: VecDeque<Outstanding>,
    recv_next: u32,
    recv_buffer: BTreeMap<u32, Bytes>,
    recv_queue: BytesMut,
    peer_window: u16,
    rtt: RttEstimator,
}

impl Inner {
    fn seq_len(flags: Flags, payload_len: usize) -> u32 {
        let control = usize::from(flags.has(FLAG_SYN)) + usize::from(flags.has(FLAG_FIN));
        (payload_len + control) as u32
    }
}

/// A single connection endpoint. Not clonable: send/recv/close take `&self`
/// but all mutable state lives behind the shared lock so one `Stream`
/// handle is enough to drive the connection from multiple call sites.
pub struct Stream {
    inner: Arc<Mutex<Inner>>,
    notify: Arc<Notify>,
    channel: Arc<UnreliableChannel>,
    peer_tx: Arc<mpsc::UnboundedSender<Vec<u8>>>,
    receive_task: JoinHandle<()>,
    retransmit_task: JoinHandle<()>,
}

impl Drop for Stream {
    fn drop(&mut self) {
        self.receive_task.abort();
        self.retransmit_task.abort();
    }
}

impl Stream {
    fn spawn(
        initial_state: StreamState,
        isn: u32,
        channel: Arc<UnreliableChannel>,
        peer_tx: Arc<mpsc::UnboundedSender<Vec<u8>>>,
        mut data_rx: mpsc::UnboundedReceiver<Vec<u8>>,
    ) -> Self {
        let inner = Arc::new(Mutex::new(Inner {
            state: initial_state,
            send_una: isn,
            send_next: isn,
            send_buffer: VecDeque::new(),
            recv_next: 0,
            recv_buffer: BTreeMap::new(),
            recv_queue: BytesMut::new(),
            peer_window: DEFAULT_WINDOW,
            rtt: RttEstimator::new(),
        }));
        let notify = Arc::new(Notify::new());

        let receive_task = {
            let inner = Arc::clone(&inner);
            let notify = Arc::clone(&notify);
            let channel = Arc::clone(&channel);
            let peer_tx = Arc::clone(&peer_tx);
            tokio::spawn(async move {
                while let Some(raw) = data_rx.recv().await {
                    let segment = match Segment::decode(&raw) {
                        Ok(s) if s.verify() => s,
                        _ => continue,
                    };
                    on_segment(&inner, &notify, &channel, &peer_tx, segment);
                }
            })
        };

        let retransmit_task = {
            let inner = Arc::clone(&inner);
            let channel = Arc::clone(&channel);
            let peer_tx = Arc::clone(&peer_tx);
            tokio::spawn(async move {
                loop {
                    let fired = {
                        let mut guard = inner.lock();
                        let rto = guard.rtt.rto();
                        let now = Instant::now();
                        let mut fired = Vec::new();
                        for seg in guard.send_buffer.iter_mut() {
                            if now.duration_since(seg.sent_at) >= rto {
                                fired.push((seg.seq, seg.flags, seg.payload.clone()));
                                seg.sent_at = now;
                                seg.retransmitted = true;
                            }
                        }
                        let ack = guard.recv_next;
                        let window = DEFAULT_WINDOW;
                        fired
                            .into_iter()
                            .map(|(seq, flags, payload)| (seq, ack, flags, window, payload))
                            .collect::<Vec<_>>()
                    };
                    for (seq, ack, flags, window, payload) in fired {
                        debug!(seq, "stream: retransmission timer fired");
                        let encoded = Segment::new(seq, ack, flags, window, payload)
                            .encode()
                            .to_vec();
                        channel.send(encoded, Arc::clone(&peer_tx));
                    }
                    tokio::time::sleep(RETRANSMIT_SCAN_INTERVAL).await;
                }
            })
        };

        Self {
            inner,
            notify,
            channel,
            peer_tx,
            receive_task,
            retransmit_task,
        }
    }

    /// Blocks until there's room to admit `seq_len` more bytes — bounded by
    /// the peer's advertised `peer_window` and by a hard cap on the number
    /// of outstanding segments — then appends to the send buffer and
    /// transmits.
    async fn enqueue(&self, flags: Flags, payload: Bytes) {
        let seq_len = Inner::seq_len(flags, payload.len()).max(1);
        loop {
            let guard = self.inner.lock();
            let in_flight = guard.send_next.wrapping_sub(guard.send_una);
            let window_ok = (in_flight as u64 + seq_len as u64) <= guard.peer_window as u64;
            let count_ok = guard.send_buffer.len() < MAX_PENDING_SEGMENTS;
            drop(guard);
            if window_ok && count_ok {
                break;
            }
            self.notify.notified().await;
        }

        let mut guard = self.inner.lock();
        let seq = guard.send_next;
        guard.send_next = guard.send_next.wrapping_add(seq_len);
        let ack = guard.recv_next;
        guard.send_buffer.push_back(Outstanding {
            seq,
            seq_len,
            flags,
            payload: payload.clone(),
            sent_at: Instant::now(),
            retransmitted: false,
        });
        drop(guard);
        let encoded = Segment::new(seq, ack, flags, DEFAULT_WINDOW, payload)
            .encode()
            .to_vec();
        self.channel.send(encoded, Arc::clone(&self.peer_tx));
    }

    /// Initiates a connection: sends SYN, waits for SYN|ACK, sends the final
    /// ACK of the handshake.
    pub async fn connect(
        channel: Arc<UnreliableChannel>,
        peer_tx: Arc<mpsc::UnboundedSender<Vec<u8>>>,
        data_rx: mpsc::UnboundedReceiver<Vec<u8>>,
    ) -> Result<Self> {
        let isn = rand::random::<u16>() as u32;
        let stream = Self::spawn(StreamState::SynSent, isn, channel, peer_tx, data_rx);
        stream.enqueue(Flags::new().with(FLAG_SYN), Bytes::new()).await;

        timeout(HANDSHAKE_TIMEOUT, async {
            loop {
                if stream.inner.lock().state.is_established() {
                    return;
                }
                stream.notify.notified().await;
            }
        })
        .await
        .map_err(|_| RdtError::ConnectTimeout)?;

        Ok(stream)
    }

    /// Accepts a connection: waits for SYN, sends SYN|ACK, waits for the
    /// final ACK.
    pub async fn accept(
        channel: Arc<UnreliableChannel>,
        peer_tx: Arc<mpsc::UnboundedSender<Vec<u8>>>,
        data_rx: mpsc::UnboundedReceiver<Vec<u8>>,
    ) -> Result<Self> {
        let isn = rand::random::<u16>() as u32;
        let stream = Self::spawn(StreamState::Listen, isn, channel, peer_tx, data_rx);

        timeout(HANDSHAKE_TIMEOUT, async {
            loop {
                if stream.inner.lock().state.is_established() {
                    return;
                }
                stream.notify.notified().await;
            }
        })
        .await
        .map_err(|_| RdtError::AcceptTimeout)?;

        Ok(stream)
    }

    /// Writes `data` to the stream, chunked to `MSS`, and blocks until the
    /// send buffer drains (every outstanding segment acked), bounded by
    /// `max(5s, bytes/1024)`.
    pub async fn send(&self, data: Bytes) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        let len = data.len();
        for piece in data.chunks(MSS) {
            self.enqueue(Flags::new().with(FLAG_ACK), Bytes::copy_from_slice(piece))
                .await;
        }

        let drain_deadline = Duration::from_secs_f64((len as f64 / 1024.0).max(5.0));
        let _ = timeout(drain_deadline, async {
            loop {
                if self.inner.lock().send_buffer.is_empty() {
                    return;
                }
                self.notify.notified().await;
            }
        })
        .await;

        Ok(())
    }

    /// Returns the next chunk of in-order application data, waiting for
    /// more to arrive if none is buffered yet. Returns `Ok(Bytes::new())`
    /// once the peer has sent FIN and there is nothing left to deliver.
    pub async fn recv(&self) -> Result<Bytes> {
        loop {
            {
                let mut guard = self.inner.lock();
                if !guard.recv_queue.is_empty() {
                    return Ok(guard.recv_queue.split().freeze());
                }
                if matches!(guard.state, StreamState::CloseWait | StreamState::Closed) {
                    return Ok(Bytes::new());
                }
            }
            self.notify.notified().await;
        }
    }

    /// Initiates (or completes, for a passive close) graceful teardown.
    pub async fn close(&self) -> Result<()> {
        let (send_fin, next_state) = {
            let guard = self.inner.lock();
            match guard.state {
                StreamState::Established => (true, StreamState::FinWait1),
                StreamState::CloseWait => (true, StreamState::LastAck),
                _ => (false, guard.state),
            }
        };
        if send_fin {
            {
                let mut guard = self.inner.lock();
                guard.state = next_state;
            }
            self.enqueue(Flags::new().with(FLAG_FIN).with(FLAG_ACK), Bytes::new())
                .await;
        }

        timeout(HANDSHAKE_TIMEOUT, async {
            loop {
                if self.inner.lock().state.is_closed() {
                    return;
                }
                self.notify.notified().await;
            }
        })
        .await
        .ok();

        Ok(())
    }
}

fn on_segment(
    inner: &Arc<Mutex<Inner>>,
    notify: &Arc<Notify>,
    channel: &Arc<UnreliableChannel>,
    peer_tx: &Arc<mpsc::UnboundedSender<Vec<u8>>>,
    segment: Segment,
) {
    let mut guard = inner.lock();

    if segment.is_ack() {
        guard.peer_window = segment.window;
        let ack = segment.ack;
        let mut sampled: Option<Duration> = None;
        while let Some(front) = guard.send_buffer.front() {
            let covers = ack.wrapping_sub(front.seq) >= front.seq_len
                && ack.wrapping_sub(front.seq) < u32::MAX / 2;
            if !covers {
                break;
            }
            let front = guard.send_buffer.pop_front().unwrap();
            if !front.retransmitted {
                sampled = Some(Instant::now().duration_since(front.sent_at));
            }
        }
        if let Some(sample) = sampled {
            guard.rtt.update(sample);
        }
        guard.send_una = ack;
    }

    match (guard.state, segment.is_syn(), segment.is_fin()) {
        (StreamState::Listen, true, _) => {
            guard.recv_next = segment.seq.wrapping_add(1);
            guard.state = StreamState::SynRcvd;
            trace!("stream: LISTEN -> SYN_RCVD");
            let ack = guard.recv_next;
            let seq = guard.send_next;
            guard.send_next = guard.send_next.wrapping_add(1);
            guard.send_buffer.push_back(Outstanding {
                seq,
                seq_len: 1,
                flags: Flags::new().with(FLAG_SYN).with(FLAG_ACK),
                payload: Bytes::new(),
                sent_at: Instant::now(),
                retransmitted: false,
            });
            drop(guard);
            let encoded = Segment::new(
                seq,
                ack,
                Flags::new().with(FLAG_SYN).with(FLAG_ACK),
                DEFAULT_WINDOW,
                Bytes::new(),
            )
            .encode()
            .to_vec();
            channel.send(encoded, Arc::clone(peer_tx));
            notify.notify_waiters();
            return;
        }
        (StreamState::SynSent, true, _) if segment.is_ack() => {
            guard.recv_next = segment.seq.wrapping_add(1);
            guard.state = StreamState::Established;
            trace!("stream: SYN_SENT -> ESTABLISHED");
            drop(guard);
            let encoded = Segment::new(
                0,
                segment.seq.wrapping_add(1),
                Flags::new().with(FLAG_ACK),
                DEFAULT_WINDOW,
                Bytes::new(),
            )
            .encode()
            .to_vec();
            channel.send(encoded, Arc::clone(peer_tx));
            notify.notify_waiters();
            return;
        }
        (StreamState::SynRcvd, _, _) if segment.is_ack() && !segment.is_syn() => {
            guard.state = StreamState::Established;
            trace!("stream: SYN_RCVD -> ESTABLISHED");
            notify.notify_waiters();
            return;
        }
        _ => {}
    }

    if !segment.payload.is_empty() || segment.is_fin() {
        let seq = segment.seq;
        if seq == guard.recv_next && !segment.payload.is_empty() {
            guard.recv_queue.extend_from_slice(&segment.payload);
            guard.recv_next = guard.recv_next.wrapping_add(segment.payload.len() as u32);
            while let Some(buffered) = guard.recv_buffer.remove(&guard.recv_next) {
                guard.recv_next = guard.recv_next.wrapping_add(buffered.len() as u32);
                guard.recv_queue.extend_from_slice(&buffered);
            }
        } else if seq > guard.recv_next && !segment.payload.is_empty() {
            guard.recv_buffer.entry(seq).or_insert(segment.payload.clone());
        } else if !segment.payload.is_empty() {
            warn!(seq, "stream: dropping duplicate segment");
        }

        if segment.is_fin() && seq == guard.recv_next {
            guard.recv_next = guard.recv_next.wrapping_add(1);
            guard.state = match guard.state {
                StreamState::Established => StreamState::CloseWait,
                StreamState::FinWait1 => StreamState::Closing,
                StreamState::FinWait2 => StreamState::Closed,
                other => other,
            };
        }

        let ack = guard.recv_next;
        drop(guard);
        let encoded = Segment::new(0, ack, Flags::new().with(FLAG_ACK), DEFAULT_WINDOW, Bytes::new())
            .encode()
            .to_vec();
        channel.send(encoded, Arc::clone(peer_tx));
        notify.notify_waiters();
        return;
    }

    // Pure ACK: check for the rest of the teardown sequence.
    match guard.state {
        StreamState::FinWait1 if guard.send_buffer.is_empty() => {
            guard.state = StreamState::FinWait2;
        }
        StreamState::Closing if guard.send_buffer.is_empty() => {
            guard.state = StreamState::Closed;
        }
        StreamState::LastAck if guard.send_buffer.is_empty() => {
            guard.state = StreamState::Closed;
        }
        _ => {}
    }

    drop(guard);
    notify.notify_waiters();
}
