use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use rdtlab::{ChannelConfig, Rdt30Receiver, Rdt30Sender, UnreliableChannel};
use tokio::sync::mpsc;

#[tokio::test]
async fn fifteen_percent_loss_both_directions_with_delay_delivers_ten_messages() {
    let channel = Arc::new(UnreliableChannel::new(ChannelConfig {
        loss_rate: 0.15,
        delay_range: Duration::from_millis(50)..Duration::from_millis(500),
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

    let messages: Vec<Bytes> = (0..10).map(|i| Bytes::from(format!("msg {i}"))).collect();
    let mut delivered = Vec::new();
    let mut total_retransmissions = 0;

    for msg in &messages {
        let (send_result, recv_result) =
            tokio::join!(sender.send(msg.clone()), receiver.recv());
        total_retransmissions += send_result.unwrap();
        delivered.push(recv_result.unwrap());
    }

    assert_eq!(delivered, messages);
    assert!(total_retransmissions > 0);
}
