//! Peer server: accepts connections and dispatches framed requests to the
//! local group registry. Mirrors the teacher's accept-loop-plus-dispatch
//! shape, retargeted at length-prefixed binary frames instead of RESP2.

use std::sync::Arc;

use ringkv_common::wire::{DelResponse, Frame, GetResponse, SetResponse};
use ringkv_group::GroupRegistry;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Runs the accept loop until the listener errors out (or the process is
/// killed). Each connection is handled on its own task and failures there
/// never bring down the listener.
pub async fn serve(listener: TcpListener, registry: Arc<GroupRegistry>) -> std::io::Result<()> {
    loop {
        let (stream, peer_addr) = listener.accept().await?;
        let registry = Arc::clone(&registry);
        tokio::spawn(async move {
            if let Err(err) = handle_connection(stream, registry).await {
                tracing::debug!(peer = %peer_addr, error = %err, "peer connection closed");
            }
        });
    }
}

async fn handle_connection(
    mut stream: TcpStream,
    registry: Arc<GroupRegistry>,
) -> std::io::Result<()> {
    loop {
        let frame = match read_frame(&mut stream).await? {
            Some(frame) => frame,
            None => return Ok(()),
        };
        let reply = dispatch(&registry, frame).await;
        write_frame(&mut stream, &reply).await?;
    }
}

async fn dispatch(registry: &GroupRegistry, frame: Frame) -> Frame {
    match frame {
        Frame::Get(req) => match registry.get(&req.group) {
            Some(group) => match group.get(&req.key).await {
                Ok(value) => Frame::GetReply(GetResponse::found(value)),
                Err(ringkv_group::GroupError::NotFound(_)) => {
                    Frame::GetReply(GetResponse::not_found())
                }
                Err(err) => Frame::Error(err.to_string()),
            },
            None => Frame::Error(format!("unknown group: {}", req.group)),
        },
        Frame::Set(req) => match registry.get(&req.group) {
            Some(group) => {
                let value = ringkv_common::ByteView::from_bytes(req.value);
                let ttl = req.ttl_secs.map(std::time::Duration::from_secs);
                group.set(&req.key, value, ttl);
                Frame::SetReply(SetResponse)
            }
            None => Frame::Error(format!("unknown group: {}", req.group)),
        },
        Frame::Del(req) => match registry.get(&req.group) {
            Some(group) => match group.remove(&req.key).await {
                Ok(existed) => Frame::DelReply(DelResponse { existed }),
                Err(err) => Frame::Error(err.to_string()),
            },
            None => Frame::Error(format!("unknown group: {}", req.group)),
        },
        other => Frame::Error(format!("unexpected request frame: {other:?}")),
    }
}

async fn read_frame(stream: &mut TcpStream) -> std::io::Result<Option<Frame>> {
    let mut len_buf = [0u8; 4];
    match stream.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(err) => return Err(err),
    }
    let len = u32::from_be_bytes(len_buf) as usize;
    let mut buf = vec![0u8; len];
    stream.read_exact(&mut buf).await?;
    match Frame::decode(&buf) {
        Ok(frame) => Ok(Some(frame)),
        Err(err) => Ok(Some(Frame::Error(err.to_string()))),
    }
}

async fn write_frame(stream: &mut TcpStream, frame: &Frame) -> std::io::Result<()> {
    let payload = frame.encode();
    stream.write_all(&(payload.len() as u32).to_be_bytes()).await?;
    stream.write_all(&payload).await?;
    stream.flush().await
}
