//! Client payload encoding
//!
//! Produces unframed payloads; the connection frames them with the current
//! sequence id via [`super::packet::frame_packet`].

use super::constants::{capabilities, command, MAX_PACKET_SIZE};
use super::message::ClientMessage;
use bytes::{BufMut, BytesMut};
use std::io;

/// Encode a client message into a packet payload
pub fn encode_message(msg: &ClientMessage) -> io::Result<BytesMut> {
    let mut buf = BytesMut::new();

    match msg {
        ClientMessage::SslRequest {
            capabilities,
            charset,
        } => {
            encode_response_prefix(&mut buf, *capabilities, *charset);
        }
        ClientMessage::HandshakeResponse {
            capabilities: caps,
            charset,
            user,
            auth_response,
            database,
            auth_plugin,
        } => {
            encode_response_prefix(&mut buf, *caps, *charset);

            buf.put_slice(user.as_bytes());
            buf.put_u8(0);

            if auth_response.len() > u8::MAX as usize {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "auth response too long for 1-byte length prefix",
                ));
            }
            buf.put_u8(auth_response.len() as u8);
            buf.put_slice(auth_response);

            if caps & capabilities::CONNECT_WITH_DB != 0 {
                if let Some(db) = database {
                    buf.put_slice(db.as_bytes());
                    buf.put_u8(0);
                }
            }

            if caps & capabilities::PLUGIN_AUTH != 0 {
                buf.put_slice(auth_plugin.as_bytes());
                buf.put_u8(0);
            }
        }
        ClientMessage::AuthData(data) => {
            buf.put_slice(data);
        }
        ClientMessage::Query(query) => {
            buf.put_u8(command::QUERY);
            buf.put_slice(query.as_bytes());
        }
        ClientMessage::Ping => {
            buf.put_u8(command::PING);
        }
        ClientMessage::Quit => {
            buf.put_u8(command::QUIT);
        }
    }

    Ok(buf)
}

/// Shared 32-byte prefix of SSLRequest and HandshakeResponse41
fn encode_response_prefix(buf: &mut BytesMut, caps: u32, charset: u8) {
    buf.put_u32_le(caps);
    buf.put_u32_le(MAX_PACKET_SIZE);
    buf.put_u8(charset);
    buf.put_bytes(0, 23);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::constants::charset;

    #[test]
    fn test_encode_ssl_request_is_32_bytes() {
        let msg = ClientMessage::SslRequest {
            capabilities: capabilities::PROTOCOL_41 | capabilities::SSL,
            charset: charset::UTF8MB4_GENERAL_CI,
        };
        let buf = encode_message(&msg).unwrap();
        assert_eq!(buf.len(), 32);
        // Capabilities land in the first 4 bytes, little-endian
        let caps = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
        assert!(caps & capabilities::SSL != 0);
        assert_eq!(buf[8], charset::UTF8MB4_GENERAL_CI);
    }

    #[test]
    fn test_encode_handshake_response_layout() {
        let caps = capabilities::PROTOCOL_41
            | capabilities::SECURE_CONNECTION
            | capabilities::PLUGIN_AUTH
            | capabilities::CONNECT_WITH_DB;
        let msg = ClientMessage::HandshakeResponse {
            capabilities: caps,
            charset: charset::UTF8MB4_GENERAL_CI,
            user: "root".to_string(),
            auth_response: vec![0xAB; 20],
            database: Some("dbproject".to_string()),
            auth_plugin: "mysql_native_password".to_string(),
        };
        let buf = encode_message(&msg).unwrap();

        // 32-byte prefix, then "root\0"
        assert_eq!(&buf[32..37], b"root\0");
        // 1-byte auth response length
        assert_eq!(buf[37], 20);
        assert_eq!(&buf[38..58], &[0xAB; 20][..]);
        // database, then plugin name, both null-terminated
        assert_eq!(&buf[58..68], b"dbproject\0");
        assert_eq!(&buf[68..], b"mysql_native_password\0");
    }

    #[test]
    fn test_encode_handshake_response_empty_password() {
        let caps = capabilities::PROTOCOL_41 | capabilities::SECURE_CONNECTION;
        let msg = ClientMessage::HandshakeResponse {
            capabilities: caps,
            charset: charset::UTF8MB4_GENERAL_CI,
            user: "root".to_string(),
            auth_response: Vec::new(),
            database: None,
            auth_plugin: "mysql_native_password".to_string(),
        };
        let buf = encode_message(&msg).unwrap();

        // Empty auth response is a bare zero length byte, and without
        // PLUGIN_AUTH the plugin name is omitted
        assert_eq!(&buf[32..37], b"root\0");
        assert_eq!(buf[37], 0);
        assert_eq!(buf.len(), 38);
    }

    #[test]
    fn test_encode_query() {
        let msg = ClientMessage::Query("SET NAMES utf8mb4".to_string());
        let buf = encode_message(&msg).unwrap();
        assert_eq!(buf[0], command::QUERY);
        assert_eq!(&buf[1..], b"SET NAMES utf8mb4");
    }

    #[test]
    fn test_encode_ping_and_quit() {
        assert_eq!(&encode_message(&ClientMessage::Ping).unwrap()[..], &[command::PING]);
        assert_eq!(&encode_message(&ClientMessage::Quit).unwrap()[..], &[command::QUIT]);
    }
}
