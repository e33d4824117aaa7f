//! Wire framing: `[u16 header_len][header][u32 msg_len][msg]`, all
//! big-endian.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use peersync_proto::{Header, ProtocolError};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{EngineError, Result};

/// Largest header a frame may carry.
pub const MAX_HEADER_LEN: usize = 0xFFFF;

/// Largest message body a frame may carry.
pub const MAX_MESSAGE_LEN: usize = 500_000_000;

/// Encode a frame's header and message body into `out`.
pub fn encode_frame(header: &Header, message: &[u8], out: &mut BytesMut) -> Result<()> {
    let mut header_bytes = Vec::new();
    ciborium::into_writer(header, &mut header_bytes)
        .map_err(|e| ProtocolError::Encode(e.to_string()))?;

    if header_bytes.len() > MAX_HEADER_LEN {
        return Err(ProtocolError::HeaderTooLarge(header_bytes.len()).into());
    }
    if message.len() > MAX_MESSAGE_LEN {
        return Err(ProtocolError::MessageTooLarge(message.len()).into());
    }

    #[allow(clippy::cast_possible_truncation)]
    out.put_u16(header_bytes.len() as u16);
    out.put_slice(&header_bytes);
    #[allow(clippy::cast_possible_truncation)]
    out.put_u32(message.len() as u32);
    out.put_slice(message);

    Ok(())
}

/// Write a frame into `buf` (cleared first) and flush it to `writer`.
///
/// Accepting an external scratch buffer lets the caller reuse one across
/// many frames — e.g. a buffer checked out of a [`crate::bufpool::BufferPool`]
/// — instead of allocating fresh on every write.
pub async fn write_frame_with_buf<W: AsyncWrite + Unpin>(
    writer: &mut W,
    header: &Header,
    message: &[u8],
    buf: &mut BytesMut,
) -> Result<()> {
    buf.clear();
    encode_frame(header, message, buf)?;
    writer.write_all(buf).await.map_err(EngineError::Transport)?;
    Ok(())
}

/// Write a frame directly to an `AsyncWrite`, using a fresh scratch buffer.
pub async fn write_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    header: &Header,
    message: &[u8],
) -> Result<()> {
    let mut buf = BytesMut::new();
    write_frame_with_buf(writer, header, message, &mut buf).await
}

/// Read and decode one frame from an `AsyncRead`, using `buf` as scratch
/// space for the message body.
///
/// Returns `Ok((header, body))` where `body` is the raw, still-compressed
/// message bytes, copied out of `buf` so the caller keeps ownership of `buf`
/// (and can return it to a [`crate::bufpool::BufferPool`]) instead of having
/// it consumed into the returned `Bytes`. Decompression and payload decoding
/// happen above this layer so the framer stays agnostic of message
/// semantics.
pub async fn read_frame_with_buf<R: AsyncRead + Unpin>(
    reader: &mut R,
    buf: &mut BytesMut,
) -> Result<(Header, Bytes)> {
    let header_len = reader.read_u16().await.map_err(EngineError::Transport)? as usize;

    let mut header_buf = vec![0u8; header_len];
    reader.read_exact(&mut header_buf).await.map_err(EngineError::Transport)?;
    let header: Header = ciborium::from_reader(header_buf.as_slice())
        .map_err(|e| ProtocolError::Decode(e.to_string()))?;

    let message_len = read_message_len(reader).await?;
    if message_len > MAX_MESSAGE_LEN {
        return Err(ProtocolError::MessageTooLarge(message_len).into());
    }

    buf.clear();
    buf.resize(message_len, 0);
    reader.read_exact(buf).await.map_err(EngineError::Transport)?;
    let body = Bytes::copy_from_slice(&buf[..]);

    Ok((header, body))
}

/// Read and decode one frame from an `AsyncRead`, allocating a fresh buffer
/// for the message body.
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<(Header, Bytes)> {
    let mut buf = BytesMut::new();
    read_frame_with_buf(reader, &mut buf).await
}

/// Read the message-length prefix, rejecting a value that would be negative
/// if interpreted as a signed 32-bit integer.
async fn read_message_len<R: AsyncRead + Unpin>(reader: &mut R) -> Result<usize> {
    let raw = reader.read_u32().await.map_err(EngineError::Transport)?;
    if raw > i32::MAX as u32 {
        return Err(ProtocolError::NegativeLength.into());
    }
    Ok(raw as usize)
}

/// Decode a frame's header and message bytes out of an in-memory buffer,
/// returning the number of bytes consumed. Used by tests that want to
/// assert on byte layout without standing up an `AsyncRead`.
pub fn decode_frame_from_slice(mut buf: &[u8]) -> Result<(Header, Bytes, usize)> {
    let total_len = buf.len();

    if buf.remaining() < 2 {
        return Err(EngineError::Transport(std::io::Error::from(std::io::ErrorKind::UnexpectedEof)));
    }
    let header_len = buf.get_u16() as usize;
    if buf.remaining() < header_len {
        return Err(EngineError::Transport(std::io::Error::from(std::io::ErrorKind::UnexpectedEof)));
    }
    let header: Header = ciborium::from_reader(&buf[..header_len])
        .map_err(|e| ProtocolError::Decode(e.to_string()))?;
    buf.advance(header_len);

    if buf.remaining() < 4 {
        return Err(EngineError::Transport(std::io::Error::from(std::io::ErrorKind::UnexpectedEof)));
    }
    let raw_len = buf.get_u32();
    if raw_len > i32::MAX as u32 {
        return Err(ProtocolError::NegativeLength.into());
    }
    let message_len = raw_len as usize;
    if message_len > MAX_MESSAGE_LEN {
        return Err(ProtocolError::MessageTooLarge(message_len).into());
    }
    if buf.remaining() < message_len {
        return Err(EngineError::Transport(std::io::Error::from(std::io::ErrorKind::UnexpectedEof)));
    }
    let message = Bytes::copy_from_slice(&buf[..message_len]);
    buf.advance(message_len);

    let consumed = total_len - buf.remaining();
    Ok((header, message, consumed))
}

#[cfg(test)]
mod tests {
    use peersync_proto::{Compression, MessageType};

    use super::*;

    #[tokio::test]
    async fn round_trips_through_async_read_write() {
        let header = Header::new(MessageType::Ping, Compression::None);
        let message = b"hello".to_vec();

        let mut buf = Vec::new();
        write_frame(&mut buf, &header, &message).await.unwrap();

        let mut cursor = std::io::Cursor::new(buf);
        let (decoded_header, decoded_message) = read_frame(&mut cursor).await.unwrap();

        assert_eq!(decoded_header.type_id, header.type_id);
        assert_eq!(decoded_message.as_ref(), message.as_slice());
    }

    #[test]
    fn oversized_message_is_rejected_at_encode_time() {
        let header = Header::new(MessageType::Ping, Compression::None);
        let oversized = vec![0u8; MAX_MESSAGE_LEN + 1];
        let mut buf = BytesMut::new();
        let err = encode_frame(&header, &oversized, &mut buf).unwrap_err();
        assert!(matches!(err, EngineError::Protocol(ProtocolError::MessageTooLarge(_))));
    }

    #[tokio::test]
    async fn with_buf_variants_reuse_the_same_scratch_buffer_across_frames() {
        let mut write_scratch = BytesMut::new();
        let mut wire = Vec::new();

        let header_a = Header::new(MessageType::Index, Compression::None);
        write_frame_with_buf(&mut wire, &header_a, b"first", &mut write_scratch).await.unwrap();
        let header_b = Header::new(MessageType::Request, Compression::None);
        write_frame_with_buf(&mut wire, &header_b, b"second-message", &mut write_scratch)
            .await
            .unwrap();

        let mut cursor = std::io::Cursor::new(wire);
        let mut read_scratch = BytesMut::new();

        let (decoded_a, body_a) = read_frame_with_buf(&mut cursor, &mut read_scratch).await.unwrap();
        assert_eq!(decoded_a.type_id, header_a.type_id);
        assert_eq!(body_a.as_ref(), b"first");

        let (decoded_b, body_b) = read_frame_with_buf(&mut cursor, &mut read_scratch).await.unwrap();
        assert_eq!(decoded_b.type_id, header_b.type_id);
        assert_eq!(body_b.as_ref(), b"second-message");
    }

    #[test]
    fn decode_from_slice_round_trips() {
        let header = Header::new(MessageType::Index, Compression::Lz4);
        let message = b"payload bytes".to_vec();
        let mut buf = BytesMut::new();
        encode_frame(&header, &message, &mut buf).unwrap();

        let (decoded_header, decoded_message, consumed) =
            decode_frame_from_slice(&buf).unwrap();
        assert_eq!(consumed, buf.len());
        assert_eq!(decoded_header.type_id, header.type_id);
        assert_eq!(decoded_message.as_ref(), message.as_slice());
    }
}
