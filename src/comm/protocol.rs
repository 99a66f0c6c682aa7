use crate::comm::error::CommError;
use crate::comm::types::{ClientCommand, EventPayload, MsgType};
use rmp_serde::decode::Deserializer;
use rmp_serde::encode::Serializer;
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::result::Result as StdResult;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Packet header: type (1) + seq (4)
pub const HEADER_LEN: usize = 5;

/// Encode a packet with given type, sequence, and payload
pub fn encode_packet(
    msg_type: MsgType,
    seq: u32,
    payload: Option<&impl Serialize>,
) -> StdResult<Vec<u8>, CommError> {
    let mut buf = Vec::new();

    // Write msg type (1 byte)
    buf.push(msg_type as u8);

    // Write seq (4 bytes, big-endian)
    buf.extend_from_slice(&seq.to_be_bytes());

    // Write payload if present
    if let Some(p) = payload {
        let mut ser = Serializer::new(&mut buf);
        p.serialize(&mut ser)
            .map_err(|e| CommError::EncodeError(e.to_string()))?;
    }

    Ok(buf)
}

/// Decode packet type and seq from raw bytes
pub fn decode_header(data: &[u8]) -> StdResult<(MsgType, u32), CommError> {
    if data.len() < HEADER_LEN {
        return Err(CommError::DecodeError("Packet too short".to_string()));
    }

    let msg_type = MsgType::from_u8(data[0])
        .ok_or_else(|| CommError::DecodeError(format!("Unknown msg type: {}", data[0])))?;

    let seq = u32::from_be_bytes([data[1], data[2], data[3], data[4]]);

    Ok((msg_type, seq))
}

/// Decode a request payload
pub fn decode_command(data: &[u8]) -> StdResult<ClientCommand, CommError> {
    let mut de = Deserializer::new(Cursor::new(data));
    ClientCommand::deserialize(&mut de).map_err(|e| CommError::DecodeError(e.to_string()))
}

/// Decode an event payload
#[allow(dead_code)]
pub fn decode_event(data: &[u8]) -> StdResult<EventPayload, CommError> {
    let mut de = Deserializer::new(Cursor::new(data));
    EventPayload::deserialize(&mut de).map_err(|e| CommError::DecodeError(e.to_string()))
}

/// Encode a request
#[allow(dead_code)]
pub fn encode_request(seq: u32, command: &ClientCommand) -> StdResult<Vec<u8>, CommError> {
    encode_packet(MsgType::Request, seq, Some(command))
}

/// Encode request ack (no payload)
pub fn encode_request_ack(seq: u32) -> StdResult<Vec<u8>, CommError> {
    encode_packet(MsgType::RequestAck, seq, None::<&()>)
}

/// Encode a named event; `data` travels as JSON text
pub fn encode_event(
    seq: u32,
    event: &str,
    data: &serde_json::Value,
) -> StdResult<Vec<u8>, CommError> {
    let payload = EventPayload {
        event: event.to_string(),
        data: serde_json::to_string(data).map_err(|e| CommError::EncodeError(e.to_string()))?,
    };
    encode_packet(MsgType::Event, seq, Some(&payload))
}

/// Write one length-prefixed frame
pub async fn write_frame<W>(writer: &mut W, packet: &[u8]) -> StdResult<(), CommError>
where
    W: AsyncWrite + Unpin,
{
    let len = u32::try_from(packet.len()).map_err(|_| CommError::FrameTooLarge(packet.len()))?;

    let mut buf = Vec::with_capacity(4 + packet.len());
    buf.extend_from_slice(&len.to_be_bytes());
    buf.extend_from_slice(packet);

    writer
        .write_all(&buf)
        .await
        .map_err(|e| CommError::SendError(e.to_string()))?;
    writer
        .flush()
        .await
        .map_err(|e| CommError::SendError(e.to_string()))
}

/// Read one length-prefixed frame.
///
/// Returns `Ok(None)` on a clean end of stream between frames. An oversized
/// frame is skipped and reported as `FrameTooLarge`; the stream stays in sync.
pub async fn read_frame<R>(
    reader: &mut R,
    max_frame_bytes: usize,
) -> StdResult<Option<Vec<u8>>, CommError>
where
    R: AsyncRead + Unpin,
{
    let len = match reader.read_u32().await {
        Ok(len) => len as usize,
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(CommError::RecvError(e.to_string())),
    };

    if len > max_frame_bytes {
        let mut rest = (&mut *reader).take(len as u64);
        let skipped = tokio::io::copy(&mut rest, &mut tokio::io::sink())
            .await
            .map_err(|e| CommError::RecvError(e.to_string()))?;
        if skipped < len as u64 {
            return Err(CommError::RecvError("Connection closed mid-frame".to_string()));
        }
        return Err(CommError::FrameTooLarge(len));
    }

    let mut packet = vec![0u8; len];
    reader
        .read_exact(&mut packet)
        .await
        .map_err(|e| CommError::RecvError(e.to_string()))?;

    Ok(Some(packet))
}
