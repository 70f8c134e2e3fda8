//! Two-pass call-data encoder
//!
//! The first pass lays out every head slot and tail segment into an
//! immutable [`EncodingPlan`]; the second pass only copies bytes out of the
//! plan. Offsets are never recomputed while emitting.

use crate::error::{VoterError, VoterResult};

use ethers::types::{Bytes, U256};
use ethers::utils::keccak256;
use std::fmt;

/// Width of one ABI word in bytes
pub const WORD: usize = 32;

/// Width of a function selector in bytes
pub const SELECTOR_LEN: usize = 4;

/// A single call argument
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbiValue {
    Uint(U256),
    String(String),
    Bytes(Vec<u8>),
}

impl AbiValue {
    /// Canonical ABI type name as it appears in a signature
    pub fn type_name(&self) -> &'static str {
        match self {
            AbiValue::Uint(_) => "uint256",
            AbiValue::String(_) => "string",
            AbiValue::Bytes(_) => "bytes",
        }
    }

    /// Raw tail bytes of a dynamic value, before padding
    fn payload(&self) -> &[u8] {
        match self {
            AbiValue::Uint(_) => &[],
            AbiValue::String(s) => s.as_bytes(),
            AbiValue::Bytes(b) => b,
        }
    }
}

/// First four bytes of keccak256 over the exact signature text
pub fn selector(signature: &str) -> [u8; SELECTOR_LEN] {
    let hash = keccak256(signature.as_bytes());
    let mut out = [0u8; SELECTOR_LEN];
    out.copy_from_slice(&hash[..SELECTOR_LEN]);
    out
}

/// Round a byte length up to the next multiple of [`WORD`]
pub fn padded_len(len: usize) -> usize {
    (len + WORD - 1) / WORD * WORD
}

/// Big-endian, left-zero-padded 32-byte word
fn word(value: U256) -> [u8; WORD] {
    let mut buf = [0u8; WORD];
    value.to_big_endian(&mut buf);
    buf
}

/// Parameter type names listed in a signature such as `f(string,uint256)`
fn parameter_types(signature: &str) -> VoterResult<Vec<&str>> {
    let malformed = || VoterError::Encoding {
        field: "signature".to_string(),
        message: format!("malformed signature {:?}", signature),
    };

    let open = signature.find('(').ok_or_else(malformed)?;
    let close = signature.rfind(')').ok_or_else(malformed)?;
    if close < open || close != signature.len() - 1 || open == 0 {
        return Err(malformed());
    }

    let inner = &signature[open + 1..close];
    if inner.is_empty() {
        return Ok(Vec::new());
    }
    Ok(inner.split(',').map(str::trim).collect())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HeadSlot {
    Inline(U256),
    Offset(usize),
}

#[derive(Debug, Clone, Copy)]
struct TailSegment<'a> {
    /// Position of the length word, relative to the end of the selector
    offset: usize,
    payload: &'a [u8],
}

impl TailSegment<'_> {
    fn encoded_len(&self) -> usize {
        WORD + padded_len(self.payload.len())
    }
}

/// Complete byte layout of one call, computed before any byte is written
#[derive(Debug)]
pub struct EncodingPlan<'a> {
    selector: [u8; SELECTOR_LEN],
    head: Vec<HeadSlot>,
    tail: Vec<TailSegment<'a>>,
    body_len: usize,
}

impl<'a> EncodingPlan<'a> {
    /// Lay out `args` for `signature`, checking them against its parameter list
    pub fn new(signature: &str, args: &'a [AbiValue]) -> VoterResult<Self> {
        let types = parameter_types(signature)?;
        if types.len() != args.len() {
            return Err(VoterError::Encoding {
                field: "signature".to_string(),
                message: format!(
                    "{} declares {} parameters, got {}",
                    signature,
                    types.len(),
                    args.len()
                ),
            });
        }

        let base_offset = args.len() * WORD;
        let mut cursor = base_offset;
        let mut head = Vec::with_capacity(args.len());
        let mut tail = Vec::new();

        for (index, (declared, arg)) in types.iter().zip(args).enumerate() {
            if *declared != arg.type_name() {
                return Err(VoterError::Encoding {
                    field: format!("#{}", index),
                    message: format!("expected {}, got {}", declared, arg.type_name()),
                });
            }

            match arg {
                AbiValue::Uint(value) => head.push(HeadSlot::Inline(*value)),
                dynamic => {
                    let segment = TailSegment {
                        offset: cursor,
                        payload: dynamic.payload(),
                    };
                    head.push(HeadSlot::Offset(cursor));
                    cursor += segment.encoded_len();
                    tail.push(segment);
                }
            }
        }

        Ok(Self {
            selector: selector(signature),
            head,
            tail,
            body_len: cursor,
        })
    }

    /// Size of the head region, which is where the first tail segment starts
    pub fn base_offset(&self) -> usize {
        self.head.len() * WORD
    }

    /// Offsets of every dynamic argument, in declaration order
    pub fn offsets(&self) -> Vec<usize> {
        self.tail.iter().map(|segment| segment.offset).collect()
    }

    /// Total encoded length including the selector
    pub fn len(&self) -> usize {
        SELECTOR_LEN + self.body_len
    }

    /// Copy the planned layout into a byte buffer
    pub fn emit(&self) -> EncodedCall {
        let mut out = Vec::with_capacity(self.len());
        out.extend_from_slice(&self.selector);

        for slot in &self.head {
            let value = match slot {
                HeadSlot::Inline(value) => *value,
                HeadSlot::Offset(offset) => U256::from(*offset),
            };
            out.extend_from_slice(&word(value));
        }

        for segment in &self.tail {
            debug_assert_eq!(out.len() - SELECTOR_LEN, segment.offset);
            let len = segment.payload.len();
            out.extend_from_slice(&word(U256::from(len)));
            out.extend_from_slice(segment.payload);
            out.resize(out.len() + padded_len(len) - len, 0);
        }

        debug_assert_eq!(out.len(), self.len());
        EncodedCall(Bytes::from(out))
    }
}

/// Encode a call in one step
pub fn encode_call(signature: &str, args: &[AbiValue]) -> VoterResult<EncodedCall> {
    Ok(EncodingPlan::new(signature, args)?.emit())
}

/// Immutable call data: selector, head and tail
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedCall(Bytes);

impl EncodedCall {
    pub fn selector(&self) -> [u8; SELECTOR_LEN] {
        let mut out = [0u8; SELECTOR_LEN];
        out.copy_from_slice(&self.0[..SELECTOR_LEN]);
        out
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_bytes(self) -> Bytes {
        self.0
    }
}

impl fmt::Display for EncodedCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(&self.0))
    }
}
