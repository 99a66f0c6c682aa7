use crate::comm::config::CommConfig;
use crate::comm::error::{CommError, CommInitError};
use crate::comm::handle::ClientHandle;
use crate::comm::protocol::{
    HEADER_LEN, decode_command, decode_header, encode_event, encode_request_ack, read_frame,
    write_frame,
};
use crate::comm::types::{MsgType, UserRequest};
use serde_json::json;
use std::net::SocketAddr;
use std::result::Result as StdResult;
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Event sent when a request cannot be decoded
pub const REQUEST_ERROR: &str = "requestError";

/// Comm server - accepts client connections and forwards their requests
pub struct Comm {
    listener: TcpListener,
    config: CommConfig,
    /// Channel sender to forward UserRequests to the hub
    loop_sender: mpsc::Sender<UserRequest>,
}

impl Comm {
    /// Get local socket address
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

impl Comm {
    /// Create a new Comm instance and bind the listener
    /// Returns the comm instance and receiver for communication with the hub
    pub async fn new(
        config: CommConfig,
    ) -> StdResult<(Comm, mpsc::Receiver<UserRequest>), CommInitError> {
        let listener = TcpListener::bind(config.bind_addr()?)
            .await
            .map_err(|e| CommInitError::BindFailed(e.to_string()))?;

        if let Ok(addr) = listener.local_addr() {
            info!("Comm listening on {}", addr);
        }

        let (tx, rx) = mpsc::channel(config.request_queue);

        Ok((
            Self {
                listener,
                config,
                loop_sender: tx,
            },
            rx,
        ))
    }

    /// Run the Comm server
    pub async fn run(self) -> StdResult<(), CommError> {
        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    info!("Client connected from {}", addr);
                    let config = self.config.clone();
                    let loop_sender = self.loop_sender.clone();
                    tokio::spawn(async move {
                        handle_connection(stream, addr, config, loop_sender).await;
                        info!("Client {} disconnected", addr);
                    });
                }
                Err(e) => {
                    error!("Accept error: {}", e);
                    return Err(CommError::AcceptError(e.to_string()));
                }
            }
        }
    }
}

/// Serve one connection until the client goes away.
///
/// A writer task owns the write half and drains the outbound queue. When
/// the reader stops, the writer is aborted; that drops the queue receiver,
/// which tells every in-flight request on this connection to stop.
async fn handle_connection(
    stream: TcpStream,
    client_addr: SocketAddr,
    config: CommConfig,
    loop_sender: mpsc::Sender<UserRequest>,
) {
    let (mut reader, mut writer) = stream.into_split();
    let (frames_tx, mut frames_rx) = mpsc::channel::<Vec<u8>>(config.outbound_queue);

    let writer_task = tokio::spawn(async move {
        while let Some(frame) = frames_rx.recv().await {
            if let Err(e) = write_frame(&mut writer, &frame).await {
                debug!("Write to {} failed: {}", client_addr, e);
                break;
            }
        }
    });

    if let Err(e) = read_loop(&mut reader, client_addr, &config, &frames_tx, &loop_sender).await {
        warn!("Connection {} closed: {}", client_addr, e);
    }

    writer_task.abort();
}

async fn read_loop(
    reader: &mut OwnedReadHalf,
    client_addr: SocketAddr,
    config: &CommConfig,
    frames_tx: &mpsc::Sender<Vec<u8>>,
    loop_sender: &mpsc::Sender<UserRequest>,
) -> StdResult<(), CommError> {
    loop {
        let packet = match read_frame(reader, config.max_frame_bytes).await {
            Ok(Some(packet)) => packet,
            Ok(None) => return Ok(()),
            Err(CommError::FrameTooLarge(len)) => {
                warn!(
                    "Frame too large from {}: {} bytes (max {})",
                    client_addr, len, config.max_frame_bytes
                );
                continue;
            }
            Err(e) => return Err(e),
        };

        match handle_packet(&packet, client_addr, frames_tx, loop_sender).await {
            Ok(()) => {}
            Err(CommError::ChannelClosed) => return Err(CommError::ChannelClosed),
            Err(e) => warn!("Failed to handle packet from {}: {}", client_addr, e),
        }
    }
}

/// Handle one incoming packet
async fn handle_packet(
    packet: &[u8],
    client_addr: SocketAddr,
    frames_tx: &mpsc::Sender<Vec<u8>>,
    loop_sender: &mpsc::Sender<UserRequest>,
) -> StdResult<(), CommError> {
    let (msg_type, seq) = decode_header(packet)?;
    let payload = &packet[HEADER_LEN..];

    debug!(
        "Received {} from {} seq={}",
        msg_type as u8, client_addr, seq
    );

    if msg_type != MsgType::Request {
        warn!(
            "Unexpected message type: {} from {}",
            msg_type as u8, client_addr
        );
        return Ok(());
    }

    let command = match decode_command(payload) {
        Ok(command) => command,
        Err(e) => {
            warn!("Undecodable request seq={} from {}: {}", seq, client_addr, e);
            let event = encode_event(seq, REQUEST_ERROR, &json!({ "error": e.to_string() }))?;
            return frames_tx
                .send(event)
                .await
                .map_err(|_| CommError::ChannelClosed);
        }
    };

    info!(
        "New request seq={} from {} command={}",
        seq,
        client_addr,
        command.name()
    );

    // Send ACK before the hub sees the request
    let ack = encode_request_ack(seq)?;
    frames_tx
        .send(ack)
        .await
        .map_err(|_| CommError::ChannelClosed)?;
    debug!("Queued REQUEST_ACK seq={} to {}", seq, client_addr);

    let user_request = UserRequest {
        seq,
        command,
        channel: ClientHandle::new(seq, frames_tx.clone()),
        source_addr: client_addr,
    };

    loop_sender.send(user_request).await.map_err(|e| {
        error!("Failed to send request to hub: {}", e);
        CommError::ChannelClosed
    })
}
