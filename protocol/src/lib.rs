//! Peer RPC wire format.
//!
//! Peers exchange a single unary call: a `GetRequest` naming a group and
//! key, answered by a `GetReply` carrying either the value bytes or an
//! error description. Messages use the protobuf wire format (tagged,
//! length-delimited fields) encoded by hand — just enough of it for these
//! two messages, without code generation or heavy dependencies.
//!
//! On the wire each message is framed with a 5-byte header (a reserved
//! flag byte plus a big-endian `u32` length) so a stream can carry
//! back-to-back messages. See [`frame`].

mod frame;
pub mod proto;

pub use frame::{FrameDecoder, FrameError, HEADER_SIZE, MAX_MESSAGE_SIZE, encode_frame};
pub use proto::{GetReply, GetRequest};
