//! Length-prefixed frame codec.
//!
//! Every message on the wire is a 4-byte big-endian length followed by a
//! JSON body. Frames above [`MAX_FRAME_LEN`] are rejected before any
//! allocation happens.

use cabledb_error::{CableError, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Upper bound on a single frame body.
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Write one message as a frame and flush it.
pub async fn write_frame<W, T>(writer: &mut W, message: &T) -> Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let body = serde_json::to_vec(message)
        .map_err(|e| CableError::protocol(format!("encode failed: {e}")))?;
    if body.len() > MAX_FRAME_LEN {
        return Err(CableError::protocol(format!(
            "frame of {} bytes exceeds the {MAX_FRAME_LEN}-byte limit",
            body.len()
        )));
    }
    writer.write_all(&(body.len() as u32).to_be_bytes()).await?;
    writer.write_all(&body).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one frame, or `None` if the peer closed the stream between frames.
pub async fn read_frame<R, T>(reader: &mut R) -> Result<Option<T>>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }
    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_FRAME_LEN {
        return Err(CableError::protocol(format!(
            "frame of {len} bytes exceeds the {MAX_FRAME_LEN}-byte limit"
        )));
    }
    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;
    serde_json::from_slice(&body)
        .map(Some)
        .map_err(|e| CableError::protocol(format!("decode failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ConnectRequest, Request, RequestFrame};

    #[tokio::test]
    async fn frames_round_trip() {
        let frame = RequestFrame {
            id: 1,
            request: Request::Connect(ConnectRequest {
                identifier: "default".to_owned(),
            }),
        };

        let mut buf = Vec::new();
        write_frame(&mut buf, &frame).await.unwrap();
        // 4-byte big-endian length prefix covers exactly the JSON body.
        assert_eq!(
            u32::from_be_bytes(buf[..4].try_into().unwrap()) as usize,
            buf.len() - 4
        );

        let mut reader = buf.as_slice();
        let back: RequestFrame = read_frame(&mut reader).await.unwrap().unwrap();
        assert_eq!(back, frame);
    }

    #[tokio::test]
    async fn clean_eof_reads_none() {
        let mut reader: &[u8] = &[];
        let got: Option<RequestFrame> = read_frame(&mut reader).await.unwrap();
        assert!(got.is_none());
    }

    #[tokio::test]
    async fn oversized_frame_is_rejected() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&(u32::MAX).to_be_bytes());
        let mut reader = buf.as_slice();
        let err = read_frame::<_, RequestFrame>(&mut reader)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("exceeds"));
    }

    #[tokio::test]
    async fn garbage_body_is_a_protocol_error() {
        let body = b"not json";
        let mut buf = Vec::new();
        buf.extend_from_slice(&(body.len() as u32).to_be_bytes());
        buf.extend_from_slice(body);
        let mut reader = buf.as_slice();
        let err = read_frame::<_, RequestFrame>(&mut reader)
            .await
            .unwrap_err();
        assert!(matches!(err, CableError::Protocol { .. }));
    }

    #[tokio::test]
    async fn multiple_frames_in_sequence() {
        let mut buf = Vec::new();
        for id in 0..3u64 {
            let frame = RequestFrame {
                id,
                request: Request::Connect(ConnectRequest {
                    identifier: "default".to_owned(),
                }),
            };
            write_frame(&mut buf, &frame).await.unwrap();
        }
        let mut reader = buf.as_slice();
        for id in 0..3u64 {
            let frame: RequestFrame = read_frame(&mut reader).await.unwrap().unwrap();
            assert_eq!(frame.id, id);
        }
        let done: Option<RequestFrame> = read_frame(&mut reader).await.unwrap();
        assert!(done.is_none());
    }
}
