// Integration tests for Comm module
// This file should be run with cargo test --test test_comm

#[path = "../src/env.rs"]
mod env;

#[path = "../src/artifacts/mod.rs"]
mod artifacts;

#[path = "../src/relay/mod.rs"]
mod relay;

#[path = "../src/comm/mod.rs"]
mod comm;

use comm::protocol::{HEADER_LEN, decode_event, decode_header, encode_packet, encode_request};
use comm::types::MsgType;
use comm::{ChatTurn, ClientCommand, Comm, CommConfig, UserRequest};
use relay::ClientChannel;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::timeout;

fn init_tracing() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .init();
    });
}

async fn start_comm(config: CommConfig) -> (SocketAddr, mpsc::Receiver<UserRequest>) {
    let (comm, rx) = Comm::new(config).await.unwrap();
    let addr = comm.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = comm.run().await;
    });
    (addr, rx)
}

fn test_config() -> CommConfig {
    CommConfig {
        listen_addr: "127.0.0.1".to_string(),
        listen_port: 0,
        ..Default::default()
    }
}

// Test helper: send one length-prefixed packet
async fn send_packet(stream: &mut TcpStream, packet: &[u8]) {
    stream
        .write_all(&(packet.len() as u32).to_be_bytes())
        .await
        .unwrap();
    stream.write_all(packet).await.unwrap();
}

// Test helper: receive one packet, failing after two seconds
async fn recv_packet(stream: &mut TcpStream) -> Vec<u8> {
    timeout(Duration::from_secs(2), async {
        let len = stream.read_u32().await.unwrap() as usize;
        let mut packet = vec![0u8; len];
        stream.read_exact(&mut packet).await.unwrap();
        packet
    })
    .await
    .expect("no packet from comm")
}

fn chat(content: &str) -> ClientCommand {
    ClientCommand::Chat {
        model: Some("llama3".to_string()),
        messages: vec![ChatTurn {
            role: "user".to_string(),
            content: content.to_string(),
        }],
    }
}

#[cfg(test)]
mod integration_tests {
    use super::*;

    /// Request is acked, forwarded, and events flow back with its seq
    #[tokio::test]
    async fn test_ack_and_event_flow() {
        init_tracing();
        let (addr, mut user_rx) = start_comm(test_config()).await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        send_packet(&mut client, &encode_request(7, &chat("hello")).unwrap()).await;

        let ack = recv_packet(&mut client).await;
        assert_eq!(ack.len(), HEADER_LEN);
        assert_eq!(decode_header(&ack).unwrap(), (MsgType::RequestAck, 7));

        let request = timeout(Duration::from_secs(2), user_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(request.seq, 7);
        assert_eq!(request.command, chat("hello"));

        request
            .channel
            .emit("messageResponse", serde_json::json!({"message": {"content": "hi"}}))
            .await
            .unwrap();
        request
            .channel
            .emit("messageComplete", serde_json::json!({}))
            .await
            .unwrap();

        let first = recv_packet(&mut client).await;
        assert_eq!(decode_header(&first).unwrap(), (MsgType::Event, 7));
        let event = decode_event(&first[HEADER_LEN..]).unwrap();
        assert_eq!(event.event, "messageResponse");
        let data: serde_json::Value = serde_json::from_str(&event.data).unwrap();
        assert_eq!(data["message"]["content"], "hi");

        let second = recv_packet(&mut client).await;
        assert_eq!(
            decode_event(&second[HEADER_LEN..]).unwrap().event,
            "messageComplete"
        );
    }

    #[tokio::test]
    async fn test_pipelined_requests_keep_their_seq() {
        init_tracing();
        let (addr, mut user_rx) = start_comm(test_config()).await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        send_packet(&mut client, &encode_request(1, &ClientCommand::ListTools).unwrap()).await;
        send_packet(&mut client, &encode_request(2, &ClientCommand::ListModels).unwrap()).await;

        assert_eq!(
            decode_header(&recv_packet(&mut client).await).unwrap(),
            (MsgType::RequestAck, 1)
        );
        assert_eq!(
            decode_header(&recv_packet(&mut client).await).unwrap(),
            (MsgType::RequestAck, 2)
        );

        let first = user_rx.recv().await.unwrap();
        let second = user_rx.recv().await.unwrap();
        assert_eq!(first.command, ClientCommand::ListTools);
        assert_eq!(second.command, ClientCommand::ListModels);

        // Reply out of order
        second.channel.emit("models", serde_json::json!({"models": []})).await.unwrap();
        first.channel.emit("tools", serde_json::json!([])).await.unwrap();

        assert_eq!(decode_header(&recv_packet(&mut client).await).unwrap().1, 2);
        assert_eq!(decode_header(&recv_packet(&mut client).await).unwrap().1, 1);
    }

    /// Undecodable request gets a requestError event instead of an ack
    #[tokio::test]
    async fn test_undecodable_request() {
        init_tracing();
        let (addr, mut user_rx) = start_comm(test_config()).await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        let mut packet = vec![MsgType::Request as u8];
        packet.extend_from_slice(&5u32.to_be_bytes());
        packet.extend_from_slice(&[0xc1, 0xc1]);
        send_packet(&mut client, &packet).await;

        let reply = recv_packet(&mut client).await;
        assert_eq!(decode_header(&reply).unwrap(), (MsgType::Event, 5));
        assert_eq!(
            decode_event(&reply[HEADER_LEN..]).unwrap().event,
            "requestError"
        );
        assert!(user_rx.try_recv().is_err());
    }

    /// Oversized frames are skipped without losing the connection
    #[tokio::test]
    async fn test_oversized_frame_skipped() {
        init_tracing();
        let config = CommConfig {
            max_frame_bytes: 128,
            ..test_config()
        };
        let (addr, mut user_rx) = start_comm(config).await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        let big = encode_request(1, &chat(&"x".repeat(1000))).unwrap();
        send_packet(&mut client, &big).await;
        send_packet(&mut client, &encode_request(2, &ClientCommand::ListArtifacts).unwrap())
            .await;

        let ack = recv_packet(&mut client).await;
        assert_eq!(decode_header(&ack).unwrap(), (MsgType::RequestAck, 2));
        let request = user_rx.recv().await.unwrap();
        assert_eq!(request.command, ClientCommand::ListArtifacts);
    }

    /// Packets that are not requests are ignored
    #[tokio::test]
    async fn test_unexpected_message_type_ignored() {
        init_tracing();
        let (addr, mut user_rx) = start_comm(test_config()).await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        let stray = encode_packet(MsgType::RequestAck, 9, None::<&()>).unwrap();
        send_packet(&mut client, &stray).await;
        send_packet(&mut client, &[0x01, 0x00]).await;
        send_packet(&mut client, &encode_request(3, &ClientCommand::ListTools).unwrap()).await;

        let ack = recv_packet(&mut client).await;
        assert_eq!(decode_header(&ack).unwrap(), (MsgType::RequestAck, 3));
        assert_eq!(user_rx.recv().await.unwrap().seq, 3);
    }

    /// Closing the connection releases every request bound to it
    #[tokio::test]
    async fn test_disconnect_closes_channels() {
        init_tracing();
        let (addr, mut user_rx) = start_comm(test_config()).await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        send_packet(&mut client, &encode_request(1, &chat("hi")).unwrap()).await;
        let _ack = recv_packet(&mut client).await;
        let request = user_rx.recv().await.unwrap();

        drop(client);

        timeout(Duration::from_secs(2), request.channel.closed())
            .await
            .expect("channel did not close after disconnect");
        assert!(request.channel.emit("messageComplete", serde_json::json!({})).await.is_err());
    }

    /// Two clients are served independently
    #[tokio::test]
    async fn test_multiple_clients() {
        init_tracing();
        let (addr, mut user_rx) = start_comm(test_config()).await;
        let mut alice = TcpStream::connect(addr).await.unwrap();
        let mut bob = TcpStream::connect(addr).await.unwrap();

        send_packet(&mut alice, &encode_request(1, &chat("from alice")).unwrap()).await;
        let _ = recv_packet(&mut alice).await;
        let from_alice = user_rx.recv().await.unwrap();

        send_packet(&mut bob, &encode_request(1, &chat("from bob")).unwrap()).await;
        let _ = recv_packet(&mut bob).await;
        let from_bob = user_rx.recv().await.unwrap();

        assert_ne!(from_alice.source_addr, from_bob.source_addr);

        from_bob.channel.emit("messageComplete", serde_json::json!({})).await.unwrap();
        let packet = recv_packet(&mut bob).await;
        assert_eq!(decode_event(&packet[HEADER_LEN..]).unwrap().event, "messageComplete");

        // Alice got nothing beyond her ack
        let mut probe = [0u8; 1];
        assert!(
            timeout(Duration::from_millis(200), alice.read(&mut probe))
                .await
                .is_err()
        );
    }
}
