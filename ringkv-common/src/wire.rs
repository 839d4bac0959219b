//! Binary wire format shared by the peer transport and the operator client.
//!
//! One codec, one frame type, used both for peer-to-peer RPC and for the
//! external-facing client — there is exactly one wire on the wire. Each
//! frame is a tag byte followed by length-prefixed fields. Framing
//! (the outer `u32` length prefix around `encode`'s output) is the caller's
//! job so the same codec works over a pooled blocking `TcpStream` and over
//! `tokio`'s async `TcpStream` alike.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ByteView;

#[derive(Debug, Error)]
pub enum WireError {
    #[error("frame payload truncated")]
    Truncated,
    #[error("unknown frame tag: {0}")]
    UnknownTag(u8),
    #[error("field is not valid utf-8")]
    InvalidUtf8,
}

/// Identity of one cluster member, as exchanged during discovery and used
/// to label peer connections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceNode {
    pub name: String,
    pub addr: String,
    pub weight: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetRequest {
    pub group: String,
    pub key: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetResponse {
    /// `None` means the loader ran and produced nothing (`spec.md`'s
    /// NotFound) — distinct from a transport-level error frame.
    pub value: Option<Bytes>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetRequest {
    pub group: String,
    pub key: String,
    pub value: Bytes,
    pub ttl_secs: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetResponse;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelRequest {
    pub group: String,
    pub key: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelResponse {
    pub existed: bool,
}

/// One message on the wire. Tags are stable across versions; new variants
/// must get a new tag rather than reusing one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Get(GetRequest),
    GetReply(GetResponse),
    Set(SetRequest),
    SetReply(SetResponse),
    Del(DelRequest),
    DelReply(DelResponse),
    /// Carries a `RingKvError`'s rendered message back to the caller; the
    /// kind distinction (NotFound vs Transport vs ...) is recovered by the
    /// caller from context, since GetReply already encodes "not found".
    Error(String),
}

const TAG_GET: u8 = 1;
const TAG_GET_REPLY: u8 = 2;
const TAG_SET: u8 = 3;
const TAG_SET_REPLY: u8 = 4;
const TAG_DEL: u8 = 5;
const TAG_DEL_REPLY: u8 = 6;
const TAG_ERROR: u8 = 255;

impl Frame {
    /// Encodes this frame's tag and body. Does not include an outer length
    /// prefix — the transport adds that.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(64);
        match self {
            Frame::Get(req) => {
                buf.put_u8(TAG_GET);
                put_str(&mut buf, &req.group);
                put_str(&mut buf, &req.key);
            }
            Frame::GetReply(resp) => {
                buf.put_u8(TAG_GET_REPLY);
                match &resp.value {
                    Some(v) => {
                        buf.put_u8(1);
                        put_bytes(&mut buf, v);
                    }
                    None => buf.put_u8(0),
                }
            }
            Frame::Set(req) => {
                buf.put_u8(TAG_SET);
                put_str(&mut buf, &req.group);
                put_str(&mut buf, &req.key);
                put_bytes(&mut buf, &req.value);
                match req.ttl_secs {
                    Some(ttl) => {
                        buf.put_u8(1);
                        buf.put_u64(ttl);
                    }
                    None => buf.put_u8(0),
                }
            }
            Frame::SetReply(_) => {
                buf.put_u8(TAG_SET_REPLY);
            }
            Frame::Del(req) => {
                buf.put_u8(TAG_DEL);
                put_str(&mut buf, &req.group);
                put_str(&mut buf, &req.key);
            }
            Frame::DelReply(resp) => {
                buf.put_u8(TAG_DEL_REPLY);
                buf.put_u8(resp.existed as u8);
            }
            Frame::Error(message) => {
                buf.put_u8(TAG_ERROR);
                put_str(&mut buf, message);
            }
        }
        buf.freeze()
    }

    /// Decodes a full frame payload (tag + body, no length prefix).
    pub fn decode(payload: &[u8]) -> Result<Frame, WireError> {
        let mut buf = payload;
        let tag = get_u8(&mut buf)?;
        let frame = match tag {
            TAG_GET => Frame::Get(GetRequest {
                group: get_str(&mut buf)?,
                key: get_str(&mut buf)?,
            }),
            TAG_GET_REPLY => {
                let present = get_u8(&mut buf)?;
                let value = if present == 1 {
                    Some(get_bytes(&mut buf)?)
                } else {
                    None
                };
                Frame::GetReply(GetResponse { value })
            }
            TAG_SET => {
                let group = get_str(&mut buf)?;
                let key = get_str(&mut buf)?;
                let value = get_bytes(&mut buf)?;
                let has_ttl = get_u8(&mut buf)?;
                let ttl_secs = if has_ttl == 1 {
                    Some(get_u64(&mut buf)?)
                } else {
                    None
                };
                Frame::Set(SetRequest {
                    group,
                    key,
                    value,
                    ttl_secs,
                })
            }
            TAG_SET_REPLY => Frame::SetReply(SetResponse),
            TAG_DEL => Frame::Del(DelRequest {
                group: get_str(&mut buf)?,
                key: get_str(&mut buf)?,
            }),
            TAG_DEL_REPLY => {
                let existed = get_u8(&mut buf)? == 1;
                Frame::DelReply(DelResponse { existed })
            }
            TAG_ERROR => Frame::Error(get_str(&mut buf)?),
            other => return Err(WireError::UnknownTag(other)),
        };
        Ok(frame)
    }
}

impl GetResponse {
    pub fn found(value: ByteView) -> Self {
        GetResponse {
            value: Some(Bytes::copy_from_slice(value.as_bytes())),
        }
    }

    pub fn not_found() -> Self {
        GetResponse { value: None }
    }
}

fn put_str(buf: &mut BytesMut, s: &str) {
    put_bytes(buf, s.as_bytes());
}

fn put_bytes(buf: &mut BytesMut, b: &[u8]) {
    buf.put_u32(b.len() as u32);
    buf.put_slice(b);
}

fn get_u8(buf: &mut &[u8]) -> Result<u8, WireError> {
    if buf.is_empty() {
        return Err(WireError::Truncated);
    }
    Ok(buf.get_u8())
}

fn get_u64(buf: &mut &[u8]) -> Result<u64, WireError> {
    if buf.remaining() < 8 {
        return Err(WireError::Truncated);
    }
    Ok(buf.get_u64())
}

fn get_bytes(buf: &mut &[u8]) -> Result<Bytes, WireError> {
    if buf.remaining() < 4 {
        return Err(WireError::Truncated);
    }
    let len = buf.get_u32() as usize;
    if buf.remaining() < len {
        return Err(WireError::Truncated);
    }
    let out = Bytes::copy_from_slice(&buf[..len]);
    buf.advance(len);
    Ok(out)
}

fn get_str(buf: &mut &[u8]) -> Result<String, WireError> {
    let bytes = get_bytes(buf)?;
    String::from_utf8(bytes.to_vec()).map_err(|_| WireError::InvalidUtf8)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(frame: Frame) {
        let encoded = frame.encode();
        let decoded = Frame::decode(&encoded).expect("decode");
        assert_eq!(frame, decoded);
    }

    #[test]
    fn get_request_roundtrips() {
        roundtrip(Frame::Get(GetRequest {
            group: "photos".into(),
            key: "img-1".into(),
        }));
    }

    #[test]
    fn get_reply_found_and_not_found_roundtrip() {
        roundtrip(Frame::GetReply(GetResponse {
            value: Some(Bytes::from_static(b"hello")),
        }));
        roundtrip(Frame::GetReply(GetResponse { value: None }));
    }

    #[test]
    fn set_request_with_and_without_ttl_roundtrips() {
        roundtrip(Frame::Set(SetRequest {
            group: "g".into(),
            key: "k".into(),
            value: Bytes::from_static(b"v"),
            ttl_secs: Some(30),
        }));
        roundtrip(Frame::Set(SetRequest {
            group: "g".into(),
            key: "k".into(),
            value: Bytes::from_static(b"v"),
            ttl_secs: None,
        }));
    }

    #[test]
    fn del_reply_roundtrips() {
        roundtrip(Frame::DelReply(DelResponse { existed: true }));
        roundtrip(Frame::DelReply(DelResponse { existed: false }));
    }

    #[test]
    fn error_frame_roundtrips() {
        roundtrip(Frame::Error("boom".into()));
    }

    #[test]
    fn truncated_payload_is_rejected() {
        let encoded = Frame::Get(GetRequest {
            group: "g".into(),
            key: "k".into(),
        })
        .encode();
        let short = &encoded[..encoded.len() - 1];
        assert!(Frame::decode(short).is_err());
    }

    #[test]
    fn unknown_tag_is_rejected() {
        let buf = [200u8];
        assert!(matches!(
            Frame::decode(&buf),
            Err(WireError::UnknownTag(200))
        ));
    }
}
