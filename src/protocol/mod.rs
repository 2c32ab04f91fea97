//! MySQL client/server protocol
//!
//! Packet framing, payload encoding for client commands, and payload decoding
//! for server replies (handshake, OK/ERR/EOF, auth exchanges, text result
//! sets).

pub mod constants;
pub mod decode;
pub mod encode;
pub mod message;
pub mod packet;

pub use decode::{
    decode_auth_reply, decode_column_definition, decode_eof, decode_err, decode_handshake,
    decode_ok, decode_text_row, is_eof_packet,
};
pub use encode::encode_message;
pub use message::{
    AuthReply, ClientMessage, ColumnDefinition, ErrPacket, Handshake, OkPacket, QueryResult, Row,
};
pub use packet::{decode_packet, frame_packet, Packet};
