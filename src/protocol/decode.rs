//! Server payload decoding
//!
//! MySQL payloads are context-dependent: the same leading byte means
//! different things during authentication and during a result set. The
//! connection drives which decoder to apply; everything here is pure parsing.

use super::constants::header;
use super::message::{
    AuthReply, ColumnDefinition, ErrPacket, Handshake, OkPacket, Row,
};
use bytes::Bytes;
use std::io;

fn eof(what: &str) -> io::Error {
    io::Error::new(io::ErrorKind::UnexpectedEof, what.to_string())
}

fn invalid(what: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, what.into())
}

/// Read a length-encoded integer, advancing `offset`
pub fn read_lenenc_int(data: &[u8], offset: &mut usize) -> io::Result<u64> {
    let first = *data.get(*offset).ok_or_else(|| eof("lenenc int"))?;
    *offset += 1;

    match first {
        0x00..=0xFA => Ok(u64::from(first)),
        0xFC => {
            let bytes = data
                .get(*offset..*offset + 2)
                .ok_or_else(|| eof("lenenc int (2 bytes)"))?;
            *offset += 2;
            Ok(u64::from(u16::from_le_bytes([bytes[0], bytes[1]])))
        }
        0xFD => {
            let bytes = data
                .get(*offset..*offset + 3)
                .ok_or_else(|| eof("lenenc int (3 bytes)"))?;
            *offset += 3;
            Ok(u64::from(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], 0])))
        }
        0xFE => {
            let bytes = data
                .get(*offset..*offset + 8)
                .ok_or_else(|| eof("lenenc int (8 bytes)"))?;
            *offset += 8;
            let mut raw = [0u8; 8];
            raw.copy_from_slice(bytes);
            Ok(u64::from_le_bytes(raw))
        }
        0xFB => Err(invalid("unexpected NULL marker in lenenc int")),
        _ => Err(invalid(format!("invalid lenenc int prefix: 0x{:02X}", first))),
    }
}

/// Read a length-encoded string, advancing `offset`
pub fn read_lenenc_str(data: &[u8], offset: &mut usize) -> io::Result<String> {
    let len = read_lenenc_int(data, offset)? as usize;
    let bytes = data
        .get(*offset..*offset + len)
        .ok_or_else(|| eof("lenenc string"))?;
    *offset += len;
    Ok(String::from_utf8_lossy(bytes).to_string())
}

fn read_nul_str(data: &[u8], offset: &mut usize) -> io::Result<String> {
    let rest = &data[*offset..];
    let end = rest
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| invalid("missing null terminator in string"))?;
    let s = String::from_utf8_lossy(&rest[..end]).to_string();
    *offset += end + 1;
    Ok(s)
}

fn read_u16(data: &[u8], offset: &mut usize) -> io::Result<u16> {
    let bytes = data
        .get(*offset..*offset + 2)
        .ok_or_else(|| eof("u16 field"))?;
    *offset += 2;
    Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
}

fn read_u32(data: &[u8], offset: &mut usize) -> io::Result<u32> {
    let bytes = data
        .get(*offset..*offset + 4)
        .ok_or_else(|| eof("u32 field"))?;
    *offset += 4;
    Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// Decode the initial HandshakeV10 payload
pub fn decode_handshake(data: &[u8]) -> io::Result<Handshake> {
    let mut offset = 0;

    let protocol_version = *data.first().ok_or_else(|| eof("protocol version"))?;
    offset += 1;
    if protocol_version == header::ERR {
        // Server may answer the TCP connect with an ERR packet directly
        // (e.g. too many connections); surface it as such
        return Err(invalid("server sent ERR instead of handshake"));
    }
    if protocol_version != super::constants::PROTOCOL_VERSION {
        return Err(invalid(format!(
            "unsupported protocol version: {}",
            protocol_version
        )));
    }

    let server_version = read_nul_str(data, &mut offset)?;
    let connection_id = read_u32(data, &mut offset)?;

    let part1 = data
        .get(offset..offset + 8)
        .ok_or_else(|| eof("auth data part 1"))?
        .to_vec();
    offset += 8;
    offset += 1; // filler

    let cap_low = read_u16(data, &mut offset)?;
    let charset = *data.get(offset).ok_or_else(|| eof("charset"))?;
    offset += 1;
    let status_flags = read_u16(data, &mut offset)?;
    let cap_high = read_u16(data, &mut offset)?;
    let capabilities = u32::from(cap_low) | (u32::from(cap_high) << 16);

    let auth_data_len = *data.get(offset).ok_or_else(|| eof("auth data length"))?;
    offset += 1;
    offset += 10; // reserved
    if offset > data.len() {
        return Err(eof("reserved bytes"));
    }

    let mut nonce = part1;
    if capabilities & super::constants::capabilities::SECURE_CONNECTION != 0 {
        let part2_len = std::cmp::max(13, usize::from(auth_data_len).saturating_sub(8));
        let part2 = data
            .get(offset..offset + part2_len)
            .ok_or_else(|| eof("auth data part 2"))?;
        offset += part2_len;
        // Trailing NUL is padding, not nonce material
        let part2 = part2.strip_suffix(&[0]).unwrap_or(part2);
        nonce.extend_from_slice(part2);
    }

    let auth_plugin = if capabilities & super::constants::capabilities::PLUGIN_AUTH != 0 {
        // Some server versions omit the trailing NUL on the plugin name
        let rest = &data[offset.min(data.len())..];
        let end = rest.iter().position(|&b| b == 0).unwrap_or(rest.len());
        Some(String::from_utf8_lossy(&rest[..end]).to_string())
    } else {
        None
    };

    Ok(Handshake {
        protocol_version,
        server_version,
        connection_id,
        nonce,
        capabilities,
        charset,
        status_flags,
        auth_plugin,
    })
}

/// Decode an OK payload (leading 0x00)
pub fn decode_ok(data: &[u8]) -> io::Result<OkPacket> {
    if data.first() != Some(&header::OK) {
        return Err(invalid("not an OK packet"));
    }
    let mut offset = 1;

    let affected_rows = read_lenenc_int(data, &mut offset)?;
    let last_insert_id = read_lenenc_int(data, &mut offset)?;
    let status_flags = read_u16(data, &mut offset)?;
    let warnings = read_u16(data, &mut offset)?;

    Ok(OkPacket {
        affected_rows,
        last_insert_id,
        status_flags,
        warnings,
    })
}

/// Decode an ERR payload (leading 0xFF)
pub fn decode_err(data: &[u8]) -> io::Result<ErrPacket> {
    if data.first() != Some(&header::ERR) {
        return Err(invalid("not an ERR packet"));
    }
    let mut offset = 1;

    let code = read_u16(data, &mut offset)?;

    // SQLSTATE marker '#' is present on 4.1+ servers
    let sql_state = if data.get(offset) == Some(&b'#') {
        offset += 1;
        let state = data
            .get(offset..offset + 5)
            .ok_or_else(|| eof("sql state"))?;
        offset += 5;
        String::from_utf8_lossy(state).to_string()
    } else {
        "HY000".to_string()
    };

    let message = String::from_utf8_lossy(&data[offset..]).to_string();
    Ok(ErrPacket {
        code,
        sql_state,
        message,
    })
}

/// Decode a server reply during the authentication phase
pub fn decode_auth_reply(data: &[u8]) -> io::Result<AuthReply> {
    match data.first() {
        Some(&header::OK) => Ok(AuthReply::Ok(decode_ok(data)?)),
        Some(&header::ERR) => Ok(AuthReply::Err(decode_err(data)?)),
        Some(&header::EOF) => {
            if data.len() == 1 {
                // Bare 0xFE: switch to the pre-4.1 password plugin
                return Ok(AuthReply::Switch {
                    plugin: "mysql_old_password".to_string(),
                    nonce: Vec::new(),
                });
            }
            let mut offset = 1;
            let plugin = read_nul_str(data, &mut offset)?;
            let nonce = data[offset..].strip_suffix(&[0]).unwrap_or(&data[offset..]);
            Ok(AuthReply::Switch {
                plugin,
                nonce: nonce.to_vec(),
            })
        }
        Some(&header::AUTH_MORE_DATA) => Ok(AuthReply::MoreData(data[1..].to_vec())),
        Some(other) => Err(invalid(format!("unexpected auth reply byte: 0x{:02X}", other))),
        None => Err(eof("auth reply")),
    }
}

/// True if the payload is an EOF packet (result set delimiter)
pub fn is_eof_packet(data: &[u8]) -> bool {
    data.first() == Some(&header::EOF) && data.len() < 9
}

/// Decode an EOF payload, returning (warnings, status_flags)
pub fn decode_eof(data: &[u8]) -> io::Result<(u16, u16)> {
    if !is_eof_packet(data) {
        return Err(invalid("not an EOF packet"));
    }
    let mut offset = 1;
    let warnings = read_u16(data, &mut offset)?;
    let status_flags = read_u16(data, &mut offset)?;
    Ok((warnings, status_flags))
}

/// Decode a ColumnDefinition41 payload
pub fn decode_column_definition(data: &[u8]) -> io::Result<ColumnDefinition> {
    let mut offset = 0;

    let _catalog = read_lenenc_str(data, &mut offset)?; // always "def"
    let schema = read_lenenc_str(data, &mut offset)?;
    let table = read_lenenc_str(data, &mut offset)?;
    let _org_table = read_lenenc_str(data, &mut offset)?;
    let name = read_lenenc_str(data, &mut offset)?;
    let _org_name = read_lenenc_str(data, &mut offset)?;

    let fixed_len = read_lenenc_int(data, &mut offset)?;
    if fixed_len != 0x0C {
        return Err(invalid(format!(
            "unexpected column definition fixed-length block: {}",
            fixed_len
        )));
    }

    let charset = read_u16(data, &mut offset)?;
    let _column_length = read_u32(data, &mut offset)?;
    let column_type = *data.get(offset).ok_or_else(|| eof("column type"))?;
    offset += 1;
    let flags = read_u16(data, &mut offset)?;

    Ok(ColumnDefinition {
        schema,
        table,
        name,
        charset,
        column_type,
        flags,
    })
}

/// Decode a text protocol result row; 0xFB marks SQL NULL
pub fn decode_text_row(data: &[u8], column_count: usize) -> io::Result<Row> {
    let mut row = Vec::with_capacity(column_count);
    let mut offset = 0;

    while offset < data.len() {
        if data[offset] == header::LOCAL_INFILE {
            row.push(None);
            offset += 1;
        } else {
            let len = read_lenenc_int(data, &mut offset)? as usize;
            let value = data
                .get(offset..offset + len)
                .ok_or_else(|| eof("row value"))?;
            offset += len;
            row.push(Some(Bytes::copy_from_slice(value)));
        }
    }

    if row.len() != column_count {
        return Err(invalid(format!(
            "row has {} values, result set has {} columns",
            row.len(),
            column_count
        )));
    }

    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::constants::{capabilities, status};

    /// Build a HandshakeV10 payload the way a MySQL 8 server would
    fn sample_handshake(caps: u32, plugin: &str) -> Vec<u8> {
        let mut payload = vec![10];
        payload.extend_from_slice(b"8.0.36\0");
        payload.extend_from_slice(&42u32.to_le_bytes());
        payload.extend_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]); // nonce part 1
        payload.push(0); // filler
        payload.extend_from_slice(&((caps & 0xFFFF) as u16).to_le_bytes());
        payload.push(255); // server charset
        payload.extend_from_slice(&status::AUTOCOMMIT.to_le_bytes());
        payload.extend_from_slice(&((caps >> 16) as u16).to_le_bytes());
        payload.push(21); // auth data length
        payload.extend_from_slice(&[0; 10]); // reserved
        payload.extend_from_slice(&[9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20, 0]);
        payload.extend_from_slice(plugin.as_bytes());
        payload.push(0);
        payload
    }

    const CAPS: u32 = capabilities::PROTOCOL_41
        | capabilities::SECURE_CONNECTION
        | capabilities::PLUGIN_AUTH
        | capabilities::CONNECT_WITH_DB;

    #[test]
    fn test_decode_handshake() {
        let payload = sample_handshake(CAPS, "mysql_native_password");
        let handshake = decode_handshake(&payload).unwrap();

        assert_eq!(handshake.protocol_version, 10);
        assert_eq!(handshake.server_version, "8.0.36");
        assert_eq!(handshake.connection_id, 42);
        assert_eq!(handshake.capabilities, CAPS);
        assert_eq!(handshake.nonce.len(), 20);
        assert_eq!(handshake.nonce[..8], [1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(handshake.nonce[8..], [9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20]);
        assert_eq!(
            handshake.auth_plugin.as_deref(),
            Some("mysql_native_password")
        );
    }

    #[test]
    fn test_decode_handshake_rejects_old_protocol() {
        let mut payload = sample_handshake(CAPS, "mysql_native_password");
        payload[0] = 9;
        assert!(decode_handshake(&payload).is_err());
    }

    #[test]
    fn test_decode_ok() {
        let payload = [0x00, 0x01, 0x00, 0x02, 0x00, 0x00, 0x00];
        let ok = decode_ok(&payload).unwrap();
        assert_eq!(ok.affected_rows, 1);
        assert_eq!(ok.last_insert_id, 0);
        assert_eq!(ok.status_flags, 2);
        assert_eq!(ok.warnings, 0);
    }

    #[test]
    fn test_decode_err_with_sqlstate() {
        let mut payload = vec![0xFF];
        payload.extend_from_slice(&1045u16.to_le_bytes());
        payload.push(b'#');
        payload.extend_from_slice(b"28000");
        payload.extend_from_slice(b"Access denied for user 'root'@'localhost'");

        let err = decode_err(&payload).unwrap();
        assert_eq!(err.code, 1045);
        assert_eq!(err.sql_state, "28000");
        assert!(err.message.starts_with("Access denied"));
    }

    #[test]
    fn test_decode_err_without_sqlstate_marker() {
        let mut payload = vec![0xFF];
        payload.extend_from_slice(&1040u16.to_le_bytes());
        payload.extend_from_slice(b"Too many connections");

        let err = decode_err(&payload).unwrap();
        assert_eq!(err.code, 1040);
        assert_eq!(err.sql_state, "HY000");
        assert_eq!(err.message, "Too many connections");
    }

    #[test]
    fn test_decode_auth_switch() {
        let mut payload = vec![0xFE];
        payload.extend_from_slice(b"mysql_native_password\0");
        payload.extend_from_slice(&[1; 20]);
        payload.push(0);

        match decode_auth_reply(&payload).unwrap() {
            AuthReply::Switch { plugin, nonce } => {
                assert_eq!(plugin, "mysql_native_password");
                assert_eq!(nonce, vec![1; 20]);
            }
            other => panic!("expected Switch, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_auth_more_data() {
        match decode_auth_reply(&[0x01, 0x03]).unwrap() {
            AuthReply::MoreData(data) => assert_eq!(data, vec![0x03]),
            other => panic!("expected MoreData, got {:?}", other),
        }
    }

    #[test]
    fn test_lenenc_int_widths() {
        let mut offset = 0;
        assert_eq!(read_lenenc_int(&[0xFA], &mut offset).unwrap(), 250);

        let mut offset = 0;
        assert_eq!(
            read_lenenc_int(&[0xFC, 0xFB, 0x00], &mut offset).unwrap(),
            251
        );

        let mut offset = 0;
        assert_eq!(
            read_lenenc_int(&[0xFD, 0x00, 0x00, 0x01], &mut offset).unwrap(),
            65536
        );

        let mut offset = 0;
        assert_eq!(
            read_lenenc_int(&[0xFE, 0, 0, 0, 0, 1, 0, 0, 0], &mut offset).unwrap(),
            1 << 32
        );
    }

    #[test]
    fn test_decode_text_row_with_null() {
        // "abc", NULL, "1"
        let payload = [0x03, b'a', b'b', b'c', 0xFB, 0x01, b'1'];
        let row = decode_text_row(&payload, 3).unwrap();
        assert_eq!(row[0].as_deref(), Some(&b"abc"[..]));
        assert_eq!(row[1], None);
        assert_eq!(row[2].as_deref(), Some(&b"1"[..]));
    }

    #[test]
    fn test_decode_text_row_column_count_mismatch() {
        let payload = [0x01, b'x'];
        assert!(decode_text_row(&payload, 2).is_err());
    }

    #[test]
    fn test_eof_detection() {
        assert!(is_eof_packet(&[0xFE, 0x00, 0x00, 0x02, 0x00]));
        // Long 0xFE-led payloads are not EOF packets
        assert!(!is_eof_packet(&[0xFE; 12]));
        let (warnings, status) = decode_eof(&[0xFE, 0x01, 0x00, 0x02, 0x00]).unwrap();
        assert_eq!(warnings, 1);
        assert_eq!(status, 2);
    }
}
