//! Wire format for the mutable-pointer protocol.
//!
//! ```text
//! setPointer   POST mutable/setPointer
//!              body: field(owner) field(writer) field(signed payload)
//!              reply: one byte, 1 = swapped, 0 = rejected
//!
//! getPointer   POST mutable/getPointer?owner=<hex>
//!              body: writer
//!              reply: latest signed payload, empty = never set
//! ```
//!
//! A field is a big-endian `u32` length followed by that many bytes.
//! Identities travel as the canonical CBOR of their [`PublicKeyHash`].
//! Error replies are non-200 with a plain-text body.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use vellum_core::PublicKeyHash;

use crate::error::{PointerError, Result};

/// Path of the set-pointer method.
pub const SET_POINTER: &str = "mutable/setPointer";

/// Path of the get-pointer method.
pub const GET_POINTER: &str = "mutable/getPointer";

/// Status of a successful reply.
pub const STATUS_OK: u16 = 200;

/// Status of a rejected request.
pub const STATUS_BAD_REQUEST: u16 = 400;

/// Message size limits.
pub mod limits {
    /// Max length of one length-prefixed field.
    pub const MAX_FIELD_LEN: usize = 1 << 20;
}

/// Append a length-prefixed field.
pub fn put_field(buf: &mut BytesMut, field: &[u8]) {
    buf.put_u32(field.len() as u32);
    buf.put_slice(field);
}

/// Read a length-prefixed field.
pub fn get_field(buf: &mut Bytes) -> Result<Bytes> {
    if buf.remaining() < 4 {
        return Err(PointerError::InvalidMessage("truncated field length".into()));
    }
    let len = buf.get_u32() as usize;
    if len > limits::MAX_FIELD_LEN {
        return Err(PointerError::InvalidMessage(format!(
            "field of {} bytes exceeds limit",
            len
        )));
    }
    if buf.remaining() < len {
        return Err(PointerError::InvalidMessage(format!(
            "field claims {} bytes, {} remain",
            len,
            buf.remaining()
        )));
    }
    Ok(buf.split_to(len))
}

fn decode_identity(bytes: &[u8], what: &str) -> Result<PublicKeyHash> {
    PublicKeyHash::from_cbor_bytes(bytes)
        .map_err(|e| PointerError::InvalidMessage(format!("{}: {}", what, e)))
}

/// A setPointer request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetPointerRequest {
    pub owner: PublicKeyHash,
    pub writer: PublicKeyHash,
    /// `signature || HashCasPair`, signed by `writer`.
    pub payload: Bytes,
}

impl SetPointerRequest {
    pub fn encode(&self) -> Result<Bytes> {
        let owner = self.owner.to_cbor_bytes()?;
        let writer = self.writer.to_cbor_bytes()?;
        let mut buf = BytesMut::with_capacity(12 + owner.len() + writer.len() + self.payload.len());
        put_field(&mut buf, &owner);
        put_field(&mut buf, &writer);
        put_field(&mut buf, &self.payload);
        Ok(buf.freeze())
    }

    pub fn decode(mut body: Bytes) -> Result<Self> {
        let owner = decode_identity(&get_field(&mut body)?, "owner")?;
        let writer = decode_identity(&get_field(&mut body)?, "writer")?;
        let payload = get_field(&mut body)?;
        if body.has_remaining() {
            return Err(PointerError::InvalidMessage(format!(
                "{} trailing bytes",
                body.remaining()
            )));
        }
        Ok(Self {
            owner,
            writer,
            payload,
        })
    }
}

/// A getPointer request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GetPointerRequest {
    pub owner: PublicKeyHash,
    pub writer: PublicKeyHash,
}

impl GetPointerRequest {
    /// Path with the owner query parameter.
    pub fn path(&self) -> String {
        format!("{}?owner={}", GET_POINTER, self.owner.to_hex())
    }

    /// Body: the writer identity.
    pub fn body(&self) -> Result<Bytes> {
        Ok(Bytes::from(self.writer.to_cbor_bytes()?))
    }

    /// Rebuild from the query string (without `?`) and body.
    pub fn decode(query: &str, body: &[u8]) -> Result<Self> {
        let owner_hex = query_param(query, "owner")
            .ok_or_else(|| PointerError::InvalidMessage("missing owner parameter".into()))?;
        let owner = PublicKeyHash::from_hex(owner_hex)
            .map_err(|e| PointerError::InvalidMessage(format!("owner: {}", e)))?;
        let writer = decode_identity(body, "writer")?;
        Ok(Self { owner, writer })
    }
}

/// Value of `name` in an `a=b&c=d` query string.
pub fn query_param<'a>(query: &'a str, name: &str) -> Option<&'a str> {
    query.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        (key == name).then_some(value)
    })
}

/// Encode the setPointer reply.
pub fn encode_bool(value: bool) -> Bytes {
    Bytes::from_static(if value { b"\x01" } else { b"\x00" })
}

/// Decode the setPointer reply.
pub fn decode_bool(body: &[u8]) -> Result<bool> {
    match body {
        [0] => Ok(false),
        [1] => Ok(true),
        other => Err(PointerError::InvalidMessage(format!(
            "expected one boolean byte, got {} bytes",
            other.len()
        ))),
    }
}

/// Split `path?query` into its parts, dropping any leading `/`.
pub fn split_target(target: &str) -> (&str, &str) {
    let target = target.trim_start_matches('/');
    target.split_once('?').unwrap_or((target, ""))
}
