//! MySQL protocol constants

/// Protocol version carried in the server handshake
pub const PROTOCOL_VERSION: u8 = 10;

/// Maximum payload of a single packet (2^24 - 1)
pub const MAX_PAYLOAD_LENGTH: usize = 0x00FF_FFFF;

/// Maximum packet size advertised in HandshakeResponse41 (16 MB)
pub const MAX_PACKET_SIZE: u32 = 16 * 1024 * 1024;

/// Capability flags (CLIENT_*)
pub mod capabilities {
    /// Old password plugin uses the longer scramble
    pub const LONG_PASSWORD: u32 = 0x0000_0001;

    /// Database name can be sent in HandshakeResponse41
    pub const CONNECT_WITH_DB: u32 = 0x0000_0008;

    /// 4.1+ protocol (required)
    pub const PROTOCOL_41: u32 = 0x0000_0200;

    /// Client is willing to switch to TLS via SSLRequest
    pub const SSL: u32 = 0x0000_0800;

    /// Server reports transaction status in OK packets
    pub const TRANSACTIONS: u32 = 0x0000_2000;

    /// 4.1+ authentication (1-byte length-prefixed auth response)
    pub const SECURE_CONNECTION: u32 = 0x0000_8000;

    /// Multiple result sets per COM_QUERY
    pub const MULTI_RESULTS: u32 = 0x0002_0000;

    /// Pluggable authentication (plugin name in handshake)
    pub const PLUGIN_AUTH: u32 = 0x0008_0000;
}

/// Command bytes (COM_*)
pub mod command {
    /// COM_QUIT — close the session
    pub const QUIT: u8 = 0x01;

    /// COM_QUERY — text protocol statement
    pub const QUERY: u8 = 0x03;

    /// COM_PING — liveness check
    pub const PING: u8 = 0x0E;
}

/// First payload byte of server packets
pub mod header {
    /// OK packet
    pub const OK: u8 = 0x00;

    /// AuthMoreData packet (during caching_sha2_password)
    pub const AUTH_MORE_DATA: u8 = 0x01;

    /// LOCAL INFILE request (unsupported)
    pub const LOCAL_INFILE: u8 = 0xFB;

    /// EOF packet, or AuthSwitchRequest during authentication
    pub const EOF: u8 = 0xFE;

    /// ERR packet
    pub const ERR: u8 = 0xFF;
}

/// caching_sha2_password AuthMoreData status bytes
pub mod sha2_status {
    /// Fast-path scramble accepted; OK packet follows
    pub const FAST_AUTH_SUCCESS: u8 = 0x03;

    /// Server cache miss; cleartext password required (TLS only here)
    pub const PERFORM_FULL_AUTHENTICATION: u8 = 0x04;
}

/// Character set / collation ids
pub mod charset {
    /// utf8mb4_general_ci — the UTF-8 multi-byte collation advertised in
    /// HandshakeResponse41. Chosen over utf8mb4_0900_ai_ci (255) because it is
    /// understood by every 5.5+ server and by MariaDB.
    pub const UTF8MB4_GENERAL_CI: u8 = 45;
}

/// Server status flags carried in OK/EOF packets
pub mod status {
    /// Autocommit is enabled
    pub const AUTOCOMMIT: u16 = 0x0002;
}
