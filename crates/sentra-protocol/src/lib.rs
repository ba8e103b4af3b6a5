//! Sentra wire protocol
//!
//! Everything that crosses a socket lives here:
//! - primitive big-endian codec (`wire`)
//! - length-prefixed transport framing, sync and async (`framing`)
//! - typed request/response messages and API/error code enums (`messages`)

#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod framing;
pub mod messages;
pub mod wire;

pub use framing::{read_frame, read_frame_async, write_frame, write_frame_async, MAX_FRAME_SIZE};
pub use messages::{
    ApiKey, CreateTopicRequest, CreateTopicResponse, ErrorCode, FetchRequest, FetchResponse,
    JoinGroupRequest, JoinGroupResponse, ProduceRequest, ProduceResponse, RequestHeader,
};
pub use wire::{ByteReader, ByteWriter};
