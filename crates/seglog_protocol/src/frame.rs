//! Length-prefixed CBOR framing.
//!
//! ```text
//! | body_len (4, big-endian) | body (CBOR, body_len bytes) |
//! ```

use crate::error::{ProtocolError, ProtocolResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Largest accepted frame body.
pub const MAX_FRAME_BYTES: u32 = 16 * 1024 * 1024;

/// Encodes a message as a CBOR body.
///
/// # Errors
///
/// Returns [`ProtocolError::Encode`] if serialization fails.
pub fn encode<T: Serialize>(message: &T) -> ProtocolResult<Vec<u8>> {
    let mut body = Vec::new();
    ciborium::into_writer(message, &mut body).map_err(|e| ProtocolError::encode(e.to_string()))?;
    Ok(body)
}

/// Decodes a CBOR body.
///
/// # Errors
///
/// Returns [`ProtocolError::Decode`] if the bytes are not a valid message.
pub fn decode<T: DeserializeOwned>(body: &[u8]) -> ProtocolResult<T> {
    ciborium::from_reader(body).map_err(|e| ProtocolError::decode(e.to_string()))
}

/// Writes one frame and flushes.
///
/// # Errors
///
/// Returns an error if the message is too large or the write fails.
pub async fn write_frame<W, T>(writer: &mut W, message: &T) -> ProtocolResult<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let body = encode(message)?;
    let len = u32::try_from(body.len())
        .ok()
        .filter(|len| *len <= MAX_FRAME_BYTES)
        .ok_or(ProtocolError::FrameTooLarge {
            size: body.len() as u64,
            max: u64::from(MAX_FRAME_BYTES),
        })?;

    writer.write_u32(len).await?;
    writer.write_all(&body).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads one frame.
///
/// Returns `Ok(None)` if the stream ends cleanly before a new frame.
///
/// # Errors
///
/// Returns [`ProtocolError::ConnectionClosed`] if the stream ends inside a
/// frame, [`ProtocolError::FrameTooLarge`] for oversized frames, and
/// decoding or I/O errors otherwise.
pub async fn read_frame<R, T>(reader: &mut R) -> ProtocolResult<Option<T>>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let mut len = [0u8; 4];
    if reader.read(&mut len[..1]).await? == 0 {
        return Ok(None);
    }
    read_exact(reader, &mut len[1..]).await?;

    let len = u32::from_be_bytes(len);
    if len > MAX_FRAME_BYTES {
        return Err(ProtocolError::FrameTooLarge {
            size: u64::from(len),
            max: u64::from(MAX_FRAME_BYTES),
        });
    }

    let mut body = vec![0u8; len as usize];
    read_exact(reader, &mut body).await?;
    decode(&body).map(Some)
}

async fn read_exact<R: AsyncRead + Unpin>(reader: &mut R, buf: &mut [u8]) -> ProtocolResult<()> {
    match reader.read_exact(buf).await {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            Err(ProtocolError::ConnectionClosed)
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::{Record, Request, Response, Status};
    use bytes::Bytes;

    #[tokio::test]
    async fn frames_cross_a_pipe() {
        let (mut client, mut server) = tokio::io::duplex(1024);

        let requests = vec![
            Request::hello("alice"),
            Request::Produce {
                value: Bytes::from_static(b"hello"),
            },
            Request::ConsumeStream { offset: 3 },
        ];
        for request in &requests {
            write_frame(&mut client, request).await.unwrap();
        }
        drop(client);

        let mut received = Vec::new();
        while let Some(request) = read_frame::<_, Request>(&mut server).await.unwrap() {
            received.push(request);
        }
        assert_eq!(received, requests);
    }

    #[tokio::test]
    async fn truncated_frame_is_connection_closed() {
        let (mut client, mut server) = tokio::io::duplex(1024);
        let body = encode(&Response::Produce { offset: 1 }).unwrap();
        client.write_u32(body.len() as u32).await.unwrap();
        client.write_all(&body[..body.len() - 1]).await.unwrap();
        drop(client);

        let result = read_frame::<_, Response>(&mut server).await;
        assert!(matches!(result, Err(ProtocolError::ConnectionClosed)));
    }

    #[tokio::test]
    async fn oversized_frame_rejected() {
        let (mut client, mut server) = tokio::io::duplex(64);
        client.write_u32(MAX_FRAME_BYTES + 1).await.unwrap();

        let result = read_frame::<_, Response>(&mut server).await;
        assert!(matches!(result, Err(ProtocolError::FrameTooLarge { .. })));
    }

    #[test]
    fn garbage_body_fails_to_decode() {
        let result = decode::<Request>(&[0xff, 0x00, 0x13]);
        assert!(matches!(result, Err(ProtocolError::Decode { .. })));
    }

    #[test]
    fn error_response_encodes() {
        let response = Response::Consume {
            record: Record {
                offset: 9,
                value: Bytes::from_static(b"v"),
            },
        };
        let body = encode(&response).unwrap();
        assert_eq!(decode::<Response>(&body).unwrap(), response);

        let error = Response::error(Status::NotFound, "offset out of range: 9");
        let body = encode(&error).unwrap();
        assert_eq!(decode::<Response>(&body).unwrap(), error);
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn decode_never_panics(body in prop::collection::vec(any::<u8>(), 0..128)) {
                let _ = decode::<Request>(&body);
            }
        }
    }
}
