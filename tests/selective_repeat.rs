use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use rdtlab::{ChannelConfig, SelectiveRepeatReceiver, SelectiveRepeatSender, UnreliableChannel};
use tokio::sync::mpsc;

#[tokio::test]
async fn perfect_channel_window_five_delivers_five_thousand_bytes() {
    let channel = Arc::new(UnreliableChannel::perfect());
    let (to_receiver_tx, to_receiver_rx) = mpsc::unbounded_channel();
    let (to_sender_tx, to_sender_rx) = mpsc::unbounded_channel();
    let mut sender = SelectiveRepeatSender::new(
        Arc::clone(&channel),
        Arc::new(to_receiver_tx),
        to_sender_rx,
        5,
        Duration::from_millis(300),
    );
    let mut receiver = SelectiveRepeatReceiver::new(
        Arc::clone(&channel),
        Arc::new(to_sender_tx),
        to_receiver_rx,
        5,
    );

    let payload = Bytes::from(vec![b'A'; 5000]);
    let total_segments = (payload.len() + 999) / 1000;

    let (send_result, recv_result) = tokio::join!(
        sender.send_all(payload.clone()),
        receiver.recv_all(total_segments as u32)
    );

    assert_eq!(send_result.unwrap(), total_segments as u32);
    assert_eq!(recv_result.unwrap(), payload);
}

#[tokio::test]
async fn ten_percent_loss_window_eight_delivers_fifty_thousand_bytes() {
    let channel = Arc::new(UnreliableChannel::new(ChannelConfig {
        loss_rate: 0.10,
        ..Default::default()
    }));
    let (to_receiver_tx, to_receiver_rx) = mpsc::unbounded_channel();
    let (to_sender_tx, to_sender_rx) = mpsc::unbounded_channel();
    let mut sender = SelectiveRepeatSender::new(
        Arc::clone(&channel),
        Arc::new(to_receiver_tx),
        to_sender_rx,
        8,
        Duration::from_millis(200),
    );
    let mut receiver = SelectiveRepeatReceiver::new(
        Arc::clone(&channel),
        Arc::new(to_sender_tx),
        to_receiver_rx,
        8,
    );

    let payload = Bytes::from(vec![b'B'; 50_000]);
    let total_segments = (payload.len() + 999) / 1000;

    let deadline = tokio::time::timeout(
        Duration::from_secs(10),
        async {
            tokio::join!(
                sender.send_all(payload.clone()),
                receiver.recv_all(total_segments as u32)
            )
        },
    )
    .await
    .expect("transfer should complete within a few seconds");

    let (send_result, recv_result) = deadline;
    assert_eq!(send_result.unwrap(), total_segments as u32);
    assert_eq!(recv_result.unwrap(), payload);
}
