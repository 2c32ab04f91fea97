//! Protocol payload types

use bytes::Bytes;

/// Client payload (client → server)
#[derive(Debug, Clone)]
pub enum ClientMessage {
    /// Truncated handshake response requesting a TLS upgrade
    SslRequest {
        /// Negotiated client capability flags (must include CLIENT_SSL)
        capabilities: u32,
        /// Collation id for the session
        charset: u8,
    },

    /// HandshakeResponse41
    HandshakeResponse {
        /// Negotiated client capability flags
        capabilities: u32,
        /// Collation id for the session
        charset: u8,
        /// Username
        user: String,
        /// Auth plugin scramble (empty for empty passwords)
        auth_response: Vec<u8>,
        /// Database to select (requires CLIENT_CONNECT_WITH_DB)
        database: Option<String>,
        /// Auth plugin the response was built for
        auth_plugin: String,
    },

    /// Raw authentication data (AuthSwitch response, cleartext password)
    AuthData(Vec<u8>),

    /// COM_QUERY
    Query(String),

    /// COM_PING
    Ping,

    /// COM_QUIT
    Quit,
}

/// Initial handshake sent by the server (protocol version 10)
#[derive(Debug, Clone)]
pub struct Handshake {
    /// Protocol version (always 10 for supported servers)
    pub protocol_version: u8,
    /// Human-readable server version, e.g. "8.0.36"
    pub server_version: String,
    /// Connection (thread) id
    pub connection_id: u32,
    /// Auth plugin nonce (20 bytes on 4.1+ servers)
    pub nonce: Vec<u8>,
    /// Server capability flags
    pub capabilities: u32,
    /// Server default collation
    pub charset: u8,
    /// Server status flags
    pub status_flags: u16,
    /// Default auth plugin name, if the server announces one
    pub auth_plugin: Option<String>,
}

/// OK packet
#[derive(Debug, Clone, Default)]
pub struct OkPacket {
    /// Rows affected by the statement
    pub affected_rows: u64,
    /// Last AUTO_INCREMENT value
    pub last_insert_id: u64,
    /// Server status flags
    pub status_flags: u16,
    /// Warning count
    pub warnings: u16,
}

/// ERR packet
#[derive(Debug, Clone)]
pub struct ErrPacket {
    /// MySQL error code
    pub code: u16,
    /// Five-character SQLSTATE
    pub sql_state: String,
    /// Human-readable message
    pub message: String,
}

impl std::fmt::Display for ErrPacket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code)
    }
}

/// Server reply during the authentication phase
#[derive(Debug, Clone)]
pub enum AuthReply {
    /// Authentication accepted
    Ok(OkPacket),

    /// Authentication rejected
    Err(ErrPacket),

    /// Server requests a different auth plugin
    Switch {
        /// Plugin to switch to
        plugin: String,
        /// Fresh nonce for the new plugin
        nonce: Vec<u8>,
    },

    /// Extra auth data (caching_sha2_password status bytes)
    MoreData(Vec<u8>),
}

/// Column metadata from a text protocol result set (ColumnDefinition41)
#[derive(Debug, Clone)]
pub struct ColumnDefinition {
    /// Schema name
    pub schema: String,
    /// Table alias
    pub table: String,
    /// Column alias
    pub name: String,
    /// Collation id of the column
    pub charset: u16,
    /// Column type byte
    pub column_type: u8,
    /// Column flags
    pub flags: u16,
}

/// One row of a text protocol result set; `None` marks SQL NULL
pub type Row = Vec<Option<Bytes>>;

/// Outcome of a COM_QUERY round trip
#[derive(Debug, Clone, Default)]
pub struct QueryResult {
    /// Column metadata (empty for statements that return no result set)
    pub columns: Vec<ColumnDefinition>,
    /// Result rows in server byte order
    pub rows: Vec<Row>,
    /// Rows affected (OK-only statements)
    pub affected_rows: u64,
    /// Last AUTO_INCREMENT value (OK-only statements)
    pub last_insert_id: u64,
    /// Warning count reported by the terminating packet
    pub warnings: u16,
}
