//! Wire protocol for the regctl register-oriented device control system.
//!
//! This crate holds the parts of the protocol that are pure data: the
//! six-hex-digit frame codec ([`frame`]), the register map ([`regmap`]),
//! and the two out-of-band tokens ([`tokens`]). Nothing here performs I/O;
//! the device server (`regctl-device`) and driver session (`regctl-driver`)
//! both depend on this crate to stay in lock-step on frame shapes and
//! register semantics.
#![forbid(unsafe_code)]

pub mod frame;
pub mod regmap;
pub mod tokens;

pub use frame::{ErrorCode, Message, ProtocolError};
pub use regmap::{Base, Component};
