// Copyright 2026 Floodcast Contributors.
//
// Permission is hereby granted, free of charge, to any person obtaining a
// copy of this software and associated documentation files (the "Software"),
// to deal in the Software without restriction, including without limitation
// the rights to use, copy, modify, merge, publish, distribute, sublicense,
// and/or sell copies of the Software, and to permit persons to whom the
// Software is furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in
// all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS
// OR IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING
// FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER
// DEALINGS IN THE SOFTWARE.

//! The packet envelope and its wire representation.

use std::fmt;

use bytes::{Bytes, BytesMut};

use crate::error::CodecError;

/// Opaque byte identifier of a node.
///
/// Publishers default to 32 random bytes; transports may supply anything
/// with stable equality.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct NodeId(Bytes);

impl NodeId {
    /// A fresh random 32-byte identifier.
    pub fn random() -> Self {
        NodeId(random_bytes())
    }

    pub fn new(bytes: impl Into<Bytes>) -> Self {
        NodeId(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0.iter().take(8) {
            write!(f, "{byte:02x}")?;
        }
        if self.0.len() > 8 {
            write!(f, "…")?;
        }
        Ok(())
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({self})")
    }
}

/// The logical message envelope flooded through the network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Publisher-chosen instance identifier, unique within the dedup window.
    pub seqno: Bytes,

    /// Id of the node that authored the message. Never rewritten.
    pub origin: NodeId,

    /// Id of the node that most recently retransmitted the packet. `None`
    /// on a freshly built packet; stamped with the sender's own id at
    /// fan-out time, on every hop.
    pub from: Option<NodeId>,

    /// Application payload. Its meaning is out of scope of this library.
    pub data: Bytes,
}

impl Packet {
    /// A fresh random 32-byte sequence number.
    pub fn random_seqno() -> Bytes {
        random_bytes()
    }

    /// The network-wide identity of this message, stable across hops.
    pub fn msg_id(&self) -> MessageId {
        MessageId {
            seqno: self.seqno.clone(),
            origin: self.origin.clone(),
        }
    }
}

/// Identity of a logical message: `(seqno, origin)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MessageId {
    pub seqno: Bytes,
    pub origin: NodeId,
}

/// Composite dedup key recording that the node `id` has processed (or been
/// sent) the message carrying `seqno`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct Token {
    seqno: Bytes,
    id: Bytes,
}

impl Token {
    pub(crate) fn new(seqno: &Bytes, id: &NodeId) -> Self {
        Token {
            seqno: seqno.clone(),
            id: id.0.clone(),
        }
    }
}

fn random_bytes() -> Bytes {
    Bytes::copy_from_slice(&rand::random::<[u8; 32]>())
}

/// Encodes and decodes the four-field envelope to and from a
/// transport-opaque frame.
///
/// A decode failure is a reportable error, never a crash; the engine drops
/// the frame and emits [`FloodcastEvent::DecodeError`](crate::FloodcastEvent).
pub trait PacketCodec: Send + Sync + 'static {
    fn encode(&self, packet: &Packet) -> Result<Bytes, CodecError>;
    fn decode(&self, frame: &[u8]) -> Result<Packet, CodecError>;
}

/// Default codec: the fields `seqno`, `origin`, `from`, `data` in order,
/// each as an unsigned-varint length prefix followed by the raw bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct LengthPrefixCodec;

impl PacketCodec for LengthPrefixCodec {
    fn encode(&self, packet: &Packet) -> Result<Bytes, CodecError> {
        let from = packet
            .from
            .as_ref()
            .ok_or(CodecError::EmptyField("from"))?;

        let fields: [&[u8]; 4] = [
            &packet.seqno,
            packet.origin.as_bytes(),
            from.as_bytes(),
            &packet.data,
        ];

        let mut out = BytesMut::with_capacity(
            fields.iter().map(|f| f.len() + 5).sum(),
        );
        let mut prefix = unsigned_varint::encode::usize_buffer();
        for field in fields {
            out.extend_from_slice(unsigned_varint::encode::usize(field.len(), &mut prefix));
            out.extend_from_slice(field);
        }
        Ok(out.freeze())
    }

    fn decode(&self, frame: &[u8]) -> Result<Packet, CodecError> {
        let mut rest = frame;
        let seqno = take_field(&mut rest)?;
        let origin = take_field(&mut rest)?;
        let from = take_field(&mut rest)?;
        let data = take_field(&mut rest)?;
        if !rest.is_empty() {
            return Err(CodecError::TrailingBytes);
        }
        if seqno.is_empty() {
            return Err(CodecError::EmptyField("seqno"));
        }
        if origin.is_empty() {
            return Err(CodecError::EmptyField("origin"));
        }
        if from.is_empty() {
            return Err(CodecError::EmptyField("from"));
        }
        Ok(Packet {
            seqno: Bytes::copy_from_slice(seqno),
            origin: NodeId::new(Bytes::copy_from_slice(origin)),
            from: Some(NodeId::new(Bytes::copy_from_slice(from))),
            data: Bytes::copy_from_slice(data),
        })
    }
}

fn take_field<'a>(rest: &mut &'a [u8]) -> Result<&'a [u8], CodecError> {
    let (len, tail) = unsigned_varint::decode::usize(rest).map_err(|e| match e {
        unsigned_varint::decode::Error::Insufficient => CodecError::Truncated,
        _ => CodecError::BadLengthPrefix,
    })?;
    if len > tail.len() {
        return Err(CodecError::Truncated);
    }
    let (field, tail) = tail.split_at(len);
    *rest = tail;
    Ok(field)
}
