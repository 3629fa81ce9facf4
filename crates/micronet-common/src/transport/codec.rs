use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::protocol::error::{MicronetError, Result};
use crate::protocol::{Request, Response};

/// Largest frame either side accepts (100 MB).
pub const MAX_MESSAGE_SIZE: usize = 100 * 1024 * 1024;

/// JSON codec for request and response frames.
///
/// ```
/// use micronet_common::transport::JsonCodec;
/// use micronet_common::Request;
/// use serde_json::json;
///
/// let request = Request::new("PingHandler.Ping", json!({"data": "PING"}));
/// let bytes = JsonCodec::encode_request(&request).unwrap();
/// assert_eq!(JsonCodec::decode_request(&bytes).unwrap(), request);
/// ```
pub struct JsonCodec;

impl JsonCodec {
    pub fn encode_request(request: &Request) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(request)?)
    }

    pub fn decode_request(data: &[u8]) -> Result<Request> {
        Ok(serde_json::from_slice(data)?)
    }

    pub fn encode_response(response: &Response) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(response)?)
    }

    pub fn decode_response(data: &[u8]) -> Result<Response> {
        Ok(serde_json::from_slice(data)?)
    }
}

/// Writes one frame: `[4-byte length as u32 big-endian] + [data]`.
pub async fn write_frame<W>(stream: &mut W, data: &[u8]) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let len = u32::try_from(data.len()).map_err(|_| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "frame longer than u32::MAX")
    })?;

    stream.write_all(&len.to_be_bytes()).await?;
    stream.write_all(data).await?;
    stream.flush().await
}

/// Reads one frame.
///
/// Returns `Ok(None)` when the peer closed the stream cleanly before a new
/// frame started.
///
/// # Errors
///
/// - [`MicronetError::InvalidResponse`] if the announced length exceeds [`MAX_MESSAGE_SIZE`]
/// - [`MicronetError::Transport`] for any I/O failure, including EOF mid-frame
pub async fn read_frame<R>(stream: &mut R) -> Result<Option<Vec<u8>>>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    match stream.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => {
            return Err(MicronetError::Transport(format!("reading length prefix: {}", e)));
        }
    }

    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_MESSAGE_SIZE {
        return Err(MicronetError::InvalidResponse(format!(
            "Message too large: {} bytes (max {} bytes)",
            len, MAX_MESSAGE_SIZE
        )));
    }

    let mut buf = vec![0u8; len];
    stream
        .read_exact(&mut buf)
        .await
        .map_err(|e| MicronetError::Transport(format!("reading data: {}", e)))?;

    Ok(Some(buf))
}
