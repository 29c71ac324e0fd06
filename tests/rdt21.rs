use std::sync::Arc;

use bytes::Bytes;
use rdtlab::{ChannelConfig, Rdt21Receiver, Rdt21Sender, UnreliableChannel};
use tokio::sync::mpsc;

fn ten_messages() -> Vec<Bytes> {
    (0..10)
        .map(|i| Bytes::from(format!("msg {i}")))
        .collect()
}

#[tokio::test]
async fn corruption_on_shared_channel_still_delivers_without_duplication() {
    let channel = Arc::new(UnreliableChannel::new(ChannelConfig {
        corrupt_rate: 0.2,
        ..Default::default()
    }));
    let (to_receiver_tx, to_receiver_rx) = mpsc::unbounded_channel();
    let (to_sender_tx, to_sender_rx) = mpsc::unbounded_channel();
    let mut sender = Rdt21Sender::new(
        Arc::clone(&channel),
        Arc::new(to_receiver_tx),
        to_sender_rx,
    );
    let mut receiver =
        Rdt21Receiver::new(Arc::clone(&channel), Arc::new(to_sender_tx), to_receiver_rx);

    let messages = ten_messages();
    let mut delivered = Vec::new();

    for msg in &messages {
        let (_, recv_result) = tokio::join!(sender.send(msg.clone()), receiver.recv());
        delivered.push(recv_result.unwrap());
    }

    assert_eq!(delivered, messages);
    assert_eq!(delivered.len(), 10);
}
