//! Native-messaging framing: a 4-byte length in native byte order followed by
//! that many bytes of UTF-8 JSON.

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::error::BridgeError;

/// Browsers refuse host messages larger than 1 MiB.
pub const MAX_OUTGOING_FRAME: usize = 1024 * 1024;
/// Browsers never send more than 64 MiB to a host.
pub const MAX_INCOMING_FRAME: usize = 64 * 1024 * 1024;

/// Read one frame. `Ok(None)` means the stream ended on a frame boundary.
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Vec<u8>>, BridgeError>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; 4];
    match reader.read_exact(&mut header).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let size = u32::from_ne_bytes(header) as usize;
    if size > MAX_INCOMING_FRAME {
        return Err(BridgeError::FrameTooLarge {
            size,
            limit: MAX_INCOMING_FRAME,
        });
    }

    let mut payload = vec![0u8; size];
    reader.read_exact(&mut payload).await?;
    Ok(Some(payload))
}

pub async fn write_frame<W>(writer: &mut W, payload: &[u8]) -> Result<(), BridgeError>
where
    W: AsyncWrite + Unpin,
{
    if payload.len() > MAX_OUTGOING_FRAME {
        return Err(BridgeError::FrameTooLarge {
            size: payload.len(),
            limit: MAX_OUTGOING_FRAME,
        });
    }

    let header = (payload.len() as u32).to_ne_bytes();
    writer.write_all(&header).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}

pub async fn write_message<W, T>(writer: &mut W, message: &T) -> Result<(), BridgeError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let payload = serde_json::to_vec(message)?;
    write_frame(writer, &payload).await
}

pub fn decode_message<T: DeserializeOwned>(payload: &[u8]) -> Result<T, BridgeError> {
    Ok(serde_json::from_slice(payload)?)
}
