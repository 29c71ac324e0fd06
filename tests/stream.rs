use std::sync::Arc;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use rdtlab::{ChannelConfig, Stream, UnreliableChannel};
use tokio::sync::mpsc;

async fn connected_pair(config: ChannelConfig) -> (Stream, Stream) {
    let channel = Arc::new(UnreliableChannel::new(config));
    let (a_tx, a_rx) = mpsc::unbounded_channel();
    let (b_tx, b_rx) = mpsc::unbounded_channel();
    let a_tx = Arc::new(a_tx);
    let b_tx = Arc::new(b_tx);

    let client = Stream::connect(Arc::clone(&channel), Arc::clone(&b_tx), a_rx);
    let server = Stream::accept(Arc::clone(&channel), Arc::clone(&a_tx), b_rx);
    let (client, server) = tokio::join!(client, server);
    (client.unwrap(), server.unwrap())
}

async fn drain(server: &Stream, expected_len: usize) -> Bytes {
    let mut got = BytesMut::new();
    while got.len() < expected_len {
        let chunk = server.recv().await.unwrap();
        if chunk.is_empty() {
            continue;
        }
        got.extend_from_slice(&chunk);
    }
    got.freeze()
}

#[tokio::test]
async fn no_channel_faults_transfers_ten_kilobytes_and_closes_cleanly() {
    let (client, server) = connected_pair(ChannelConfig::default()).await;
    let payload = Bytes::from(vec![b'A'; 10_240]);

    client.send(payload.clone()).await.unwrap();
    let got = drain(&server, payload.len()).await;
    assert_eq!(got, payload);

    tokio::join!(client.close(), server.close());
}

#[tokio::test]
async fn twenty_percent_loss_transfers_fifty_kilobytes_within_deadline() {
    let (client, server) = connected_pair(ChannelConfig {
        loss_rate: 0.2,
        ..Default::default()
    })
    .await;
    let payload = Bytes::from(vec![b'B'; 50_000]);

    let transfer = async {
        client.send(payload.clone()).await.unwrap();
        drain(&server, payload.len()).await
    };

    let got = tokio::time::timeout(Duration::from_secs(60), transfer)
        .await
        .expect("transfer should complete before the drain deadline");
    assert_eq!(got, payload);
}
