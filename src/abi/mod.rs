//! Contract call-data encoding
//!
//! This module provides:
//! - A two-pass encoder for calls mixing static and dynamic arguments
//! - The `feed` vote call in its full and simple shapes
//! - Hex normalization for byte-string arguments

pub mod encoder;
pub mod feed;

pub use encoder::{encode_call, AbiValue, EncodedCall};
pub use feed::{CallParameters, CallVariant, FeedCall};
