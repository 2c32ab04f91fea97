//! Core connection type

use super::state::ConnectionState;
use super::tls::SslMode;
use super::transport::Transport;
use crate::protocol::constants::{capabilities, charset, header, sha2_status};
use crate::protocol::{
    decode_auth_reply, decode_column_definition, decode_eof, decode_err, decode_handshake,
    decode_ok, decode_packet, decode_text_row, encode_message, frame_packet, AuthReply,
    ClientMessage, OkPacket, Packet, QueryResult,
};
use crate::{auth, metrics, Error, Result};
use bytes::{Buf, BytesMut};
use std::time::Duration;
use tracing::Instrument;

/// Connection configuration
///
/// Stores connection parameters fixed at initialization: database, credentials,
/// session charset, and optional timeouts. Use `ConnectionConfig::builder()`
/// for advanced configuration.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Database name (empty string selects no default database)
    pub database: String,
    /// Username
    pub user: String,
    /// Password (optional)
    pub password: Option<String>,
    /// Session character set forced after authentication via `SET NAMES`
    /// (default: "utf8mb4"). `None` leaves the server default in place.
    pub charset: Option<String>,
    /// TCP connection timeout (default: none)
    pub connect_timeout: Option<Duration>,
    /// TLS mode
    pub sslmode: SslMode,
}

impl ConnectionConfig {
    /// Create new configuration with defaults
    ///
    /// # Arguments
    ///
    /// * `database` - Database name
    /// * `user` - Username
    ///
    /// The session charset defaults to `utf8mb4`; use `builder()` to change it
    /// or to configure a connect timeout.
    pub fn new(database: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            user: user.into(),
            password: None,
            charset: Some("utf8mb4".to_string()),
            connect_timeout: None,
            sslmode: SslMode::default(),
        }
    }

    /// Create a builder for advanced configuration
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let config = ConnectionConfig::builder("dbproject", "root")
    ///     .connect_timeout(Duration::from_secs(10))
    ///     .build();
    /// ```
    pub fn builder(
        database: impl Into<String>,
        user: impl Into<String>,
    ) -> ConnectionConfigBuilder {
        ConnectionConfigBuilder {
            config: Self::new(database, user),
        }
    }

    /// Set password
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }
}

/// Builder for creating `ConnectionConfig` with advanced options
#[derive(Debug, Clone)]
pub struct ConnectionConfigBuilder {
    config: ConnectionConfig,
}

impl ConnectionConfigBuilder {
    /// Set the password
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.config.password = Some(password.into());
        self
    }

    /// Set the session character set (default: "utf8mb4")
    pub fn charset(mut self, charset: impl Into<String>) -> Self {
        self.config.charset = Some(charset.into());
        self
    }

    /// Leave the server's default character set untouched
    pub fn server_default_charset(mut self) -> Self {
        self.config.charset = None;
        self
    }

    /// Set TCP connection timeout
    ///
    /// Default: None (no timeout)
    pub fn connect_timeout(mut self, duration: Duration) -> Self {
        self.config.connect_timeout = Some(duration);
        self
    }

    /// Set TLS mode
    pub fn sslmode(mut self, mode: SslMode) -> Self {
        self.config.sslmode = mode;
        self
    }

    /// Build the configuration
    pub fn build(self) -> ConnectionConfig {
        self.config
    }
}

/// MySQL connection
#[derive(Debug)]
pub struct Connection {
    transport: Option<Transport>,
    state: ConnectionState,
    read_buf: BytesMut,
    /// Sequence id of the next packet in the current exchange
    seq: u8,
    /// Capabilities negotiated with the server
    capabilities: u32,
    server_version: Option<String>,
    connection_id: Option<u32>,
    status_flags: u16,
}

impl Connection {
    /// Create connection from transport
    pub fn new(transport: Transport) -> Self {
        Self {
            transport: Some(transport),
            state: ConnectionState::Initial,
            read_buf: BytesMut::with_capacity(8192),
            seq: 0,
            capabilities: 0,
            server_version: None,
            connection_id: None,
            status_flags: 0,
        }
    }

    /// Get current connection state
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Server version string from the handshake, e.g. "8.0.36"
    pub fn server_version(&self) -> Option<&str> {
        self.server_version.as_deref()
    }

    /// Connection (thread) id assigned by the server
    pub fn connection_id(&self) -> Option<u32> {
        self.connection_id
    }

    /// Perform the initial handshake: read HandshakeV10, negotiate TLS if
    /// requested, authenticate, and force the session character set.
    ///
    /// On success the connection is `Idle` and usable; on failure the error
    /// describes the first thing that went wrong and the connection must be
    /// discarded. The charset step never runs unless authentication succeeded.
    pub async fn handshake(
        &mut self,
        config: &ConnectionConfig,
        tls_config: Option<&super::TlsConfig>,
        hostname: Option<&str>,
    ) -> Result<()> {
        async {
            let start = std::time::Instant::now();
            metrics::counters::connect_attempted();

            let result = self.handshake_inner(config, tls_config, hostname).await;
            match &result {
                Ok(plugin) => {
                    metrics::histograms::handshake_duration(
                        plugin,
                        start.elapsed().as_millis() as u64,
                    );
                    tracing::info!(
                        server_version = self.server_version.as_deref().unwrap_or("unknown"),
                        connection_id = self.connection_id,
                        "connection established"
                    );
                }
                Err(e) => {
                    metrics::counters::connect_failed(error_label(e));
                }
            }
            result.map(|_| ())
        }
        .instrument(tracing::info_span!(
            "handshake",
            user = %config.user,
            database = %config.database
        ))
        .await
    }

    /// Handshake body; returns the auth plugin that completed authentication
    async fn handshake_inner(
        &mut self,
        config: &ConnectionConfig,
        tls_config: Option<&super::TlsConfig>,
        hostname: Option<&str>,
    ) -> Result<String> {
        self.state.transition(ConnectionState::AwaitingHandshake)?;

        let packet = self.receive_packet().await?;
        if packet.payload.first() == Some(&header::ERR) {
            // Server can reject before the handshake (e.g. too many connections)
            let err = decode_err(&packet.payload).map_err(|e| Error::Protocol(e.to_string()))?;
            return Err(Error::Server {
                code: err.code,
                sql_state: err.sql_state,
                message: err.message,
            });
        }

        let handshake =
            decode_handshake(&packet.payload).map_err(|e| Error::Protocol(e.to_string()))?;

        let required = capabilities::PROTOCOL_41 | capabilities::SECURE_CONNECTION;
        if handshake.capabilities & required != required {
            return Err(Error::Protocol(format!(
                "server {} does not support the 4.1+ protocol",
                handshake.server_version
            )));
        }

        self.server_version = Some(handshake.server_version.clone());
        self.connection_id = Some(handshake.connection_id);
        self.status_flags = handshake.status_flags;

        // Negotiate client capabilities against what the server offers
        let mut caps = capabilities::LONG_PASSWORD
            | capabilities::PROTOCOL_41
            | capabilities::TRANSACTIONS
            | capabilities::SECURE_CONNECTION
            | capabilities::MULTI_RESULTS;
        if handshake.capabilities & capabilities::PLUGIN_AUTH != 0 {
            caps |= capabilities::PLUGIN_AUTH;
        }
        if !config.database.is_empty()
            && handshake.capabilities & capabilities::CONNECT_WITH_DB != 0
        {
            caps |= capabilities::CONNECT_WITH_DB;
        }

        // TLS negotiation (if requested)
        if config.sslmode != SslMode::Disabled {
            if handshake.capabilities & capabilities::SSL == 0 {
                return Err(Error::Config(format!(
                    "server does not support TLS (ssl-mode={})",
                    config.sslmode
                )));
            }
            caps |= capabilities::SSL;

            let tls = tls_config.ok_or_else(|| {
                Error::Config(format!(
                    "ssl-mode={} requires TlsConfig but none was provided",
                    config.sslmode
                ))
            })?;
            let host = hostname
                .ok_or_else(|| Error::Config("TLS negotiation requires a hostname".into()))?;
            self.negotiate_tls(tls, host, caps).await?;
        }

        self.capabilities = caps;
        self.state.transition(ConnectionState::Authenticating)?;

        let plugin = handshake
            .auth_plugin
            .clone()
            .unwrap_or_else(|| metrics::labels::PLUGIN_NATIVE.to_string());
        metrics::counters::auth_attempted(&plugin);

        let password = config.password.as_deref().unwrap_or("");
        let auth_response = auth::auth_response(&plugin, password, &handshake.nonce)?;

        let response = ClientMessage::HandshakeResponse {
            capabilities: caps,
            charset: charset::UTF8MB4_GENERAL_CI,
            user: config.user.clone(),
            auth_response,
            database: (caps & capabilities::CONNECT_WITH_DB != 0)
                .then(|| config.database.clone()),
            auth_plugin: plugin.clone(),
        };
        self.send_message(&response).await?;

        let plugin = self.authenticate(password, plugin).await?;

        self.state.transition(ConnectionState::Idle)?;

        // Charset is only forced on a successfully authenticated session
        if let Some(cs) = &config.charset {
            self.set_charset(cs).await?;
        }

        Ok(plugin)
    }

    /// Negotiate TLS by sending the truncated SSLRequest packet and upgrading
    /// the transport before the full handshake response goes out.
    async fn negotiate_tls(&mut self, tls: &super::TlsConfig, host: &str, caps: u32) -> Result<()> {
        self.state.transition(ConnectionState::NegotiatingTls)?;

        let ssl_request = ClientMessage::SslRequest {
            capabilities: caps,
            charset: charset::UTF8MB4_GENERAL_CI,
        };
        self.send_message(&ssl_request).await?;

        tracing::debug!("SSLRequest sent, upgrading connection");
        let transport = self
            .transport
            .take()
            .ok_or_else(|| Error::Protocol("transport taken during TLS upgrade".into()))?;
        self.transport = Some(transport.upgrade_to_tls(tls, host).await?);
        tracing::info!("TLS connection established");
        Ok(())
    }

    /// Drive the authentication exchange to OK or ERR.
    ///
    /// Returns the plugin that finally authenticated (it changes if the
    /// server sends an AuthSwitchRequest).
    async fn authenticate(&mut self, password: &str, mut plugin: String) -> Result<String> {
        loop {
            let packet = self.receive_packet().await?;
            let reply = decode_auth_reply(&packet.payload)
                .map_err(|e| Error::Protocol(e.to_string()))?;

            match reply {
                AuthReply::Ok(ok) => {
                    self.status_flags = ok.status_flags;
                    metrics::counters::auth_successful(&plugin);
                    tracing::debug!(plugin = %plugin, "authentication successful");
                    return Ok(plugin);
                }
                AuthReply::Err(err) => {
                    metrics::counters::auth_failed(&plugin, "server_error");
                    return Err(Error::Authentication(err.to_string()));
                }
                AuthReply::Switch {
                    plugin: next_plugin,
                    nonce,
                } => {
                    tracing::debug!(from = %plugin, to = %next_plugin, "auth plugin switch");
                    plugin = next_plugin;
                    metrics::counters::auth_attempted(&plugin);

                    let data = auth::auth_response(&plugin, password, &nonce)?;
                    self.send_message(&ClientMessage::AuthData(data)).await?;
                }
                AuthReply::MoreData(data) => {
                    if plugin != metrics::labels::PLUGIN_CACHING_SHA2 {
                        return Err(Error::Protocol(format!(
                            "unexpected extra auth data from plugin {}",
                            plugin
                        )));
                    }
                    match data.as_slice() {
                        [sha2_status::FAST_AUTH_SUCCESS] => {
                            // Scramble accepted from cache; OK packet follows
                            tracing::debug!("caching_sha2 fast authentication accepted");
                        }
                        [sha2_status::PERFORM_FULL_AUTHENTICATION] => {
                            self.send_cleartext_password(password).await?;
                        }
                        other => {
                            return Err(Error::Protocol(format!(
                                "unexpected caching_sha2 status: {:?}",
                                other
                            )));
                        }
                    }
                }
            }
        }
    }

    /// Full authentication path of caching_sha2_password: the server wants the
    /// cleartext password, which is only acceptable on an encrypted or local
    /// transport.
    async fn send_cleartext_password(&mut self, password: &str) -> Result<()> {
        let secure = match self.transport.as_ref() {
            Some(t) => t.is_tls() || matches!(t, Transport::Unix(_)),
            None => false,
        };
        if !secure {
            metrics::counters::auth_failed(metrics::labels::PLUGIN_CACHING_SHA2, "plaintext");
            return Err(Error::Authentication(
                "caching_sha2_password full authentication requires TLS or a Unix socket \
                 (the server would receive the password in cleartext)"
                    .into(),
            ));
        }

        tracing::debug!("caching_sha2 full authentication over secure transport");
        let data = auth::caching_sha2::cleartext_response(password);
        self.send_message(&ClientMessage::AuthData(data)).await
    }

    /// Execute a text protocol statement and collect the full result
    pub async fn query(&mut self, sql: &str) -> Result<QueryResult> {
        if self.state != ConnectionState::Idle {
            return Err(Error::ConnectionBusy(format!(
                "connection in state: {}",
                self.state
            )));
        }

        self.state.transition(ConnectionState::QueryInProgress)?;
        self.seq = 0;
        self.send_message(&ClientMessage::Query(sql.to_string()))
            .await?;
        self.state.transition(ConnectionState::ReadingResults)?;

        let packet = self.receive_packet().await?;
        let result = match packet.payload.first() {
            Some(&header::OK) => {
                let ok = decode_ok(&packet.payload).map_err(|e| Error::Protocol(e.to_string()))?;
                self.status_flags = ok.status_flags;
                QueryResult {
                    affected_rows: ok.affected_rows,
                    last_insert_id: ok.last_insert_id,
                    warnings: ok.warnings,
                    ..Default::default()
                }
            }
            Some(&header::ERR) => {
                let err =
                    decode_err(&packet.payload).map_err(|e| Error::Protocol(e.to_string()))?;
                // Server is ready for the next command after an ERR
                self.state.transition(ConnectionState::Idle)?;
                return Err(Error::Server {
                    code: err.code,
                    sql_state: err.sql_state,
                    message: err.message,
                });
            }
            Some(&header::LOCAL_INFILE) => {
                // The server now expects file content; nothing sensible to send
                self.state.transition(ConnectionState::Closed)?;
                return Err(Error::Unsupported(
                    "LOCAL INFILE requests are not supported".into(),
                ));
            }
            _ => self.read_result_set(&packet).await?,
        };

        self.state.transition(ConnectionState::Idle)?;
        Ok(result)
    }

    /// Read a text protocol result set, starting from the column-count packet
    async fn read_result_set(&mut self, first: &Packet) -> Result<QueryResult> {
        let mut offset = 0;
        let column_count =
            crate::protocol::decode::read_lenenc_int(&first.payload, &mut offset)
                .map_err(|e| Error::Protocol(e.to_string()))? as usize;
        if offset != first.payload.len() {
            return Err(Error::Protocol(
                "trailing bytes after result set column count".into(),
            ));
        }

        let mut columns = Vec::with_capacity(column_count);
        for _ in 0..column_count {
            let packet = self.receive_packet().await?;
            let column = decode_column_definition(&packet.payload)
                .map_err(|e| Error::Protocol(e.to_string()))?;
            columns.push(column);
        }

        // EOF delimiter between column definitions and rows
        let packet = self.receive_packet().await?;
        if !crate::protocol::is_eof_packet(&packet.payload) {
            return Err(Error::Protocol(
                "expected EOF packet after column definitions".into(),
            ));
        }

        let mut rows = Vec::new();
        let (warnings, status_flags) = loop {
            let packet = self.receive_packet().await?;
            if crate::protocol::is_eof_packet(&packet.payload) {
                break decode_eof(&packet.payload).map_err(|e| Error::Protocol(e.to_string()))?;
            }
            if packet.payload.first() == Some(&header::ERR) {
                let err =
                    decode_err(&packet.payload).map_err(|e| Error::Protocol(e.to_string()))?;
                self.state.transition(ConnectionState::Idle)?;
                return Err(Error::Server {
                    code: err.code,
                    sql_state: err.sql_state,
                    message: err.message,
                });
            }
            let row = decode_text_row(&packet.payload, column_count)
                .map_err(|e| Error::Protocol(e.to_string()))?;
            rows.push(row);
        };

        self.status_flags = status_flags;
        Ok(QueryResult {
            columns,
            rows,
            affected_rows: 0,
            last_insert_id: 0,
            warnings,
        })
    }

    /// Execute a statement that returns no result set; yields the OK packet
    pub async fn execute(&mut self, sql: &str) -> Result<OkPacket> {
        let result = self.query(sql).await?;
        if !result.columns.is_empty() {
            return Err(Error::Protocol(format!(
                "statement returned a result set with {} columns; use query()",
                result.columns.len()
            )));
        }
        Ok(OkPacket {
            affected_rows: result.affected_rows,
            last_insert_id: result.last_insert_id,
            status_flags: self.status_flags,
            warnings: result.warnings,
        })
    }

    /// Force the session character set with `SET NAMES`
    async fn set_charset(&mut self, charset: &str) -> Result<()> {
        // Charset names are identifiers; reject anything else before it
        // reaches the statement text
        if charset.is_empty()
            || !charset
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(Error::Config(format!("invalid charset name: '{}'", charset)));
        }

        self.execute(&format!("SET NAMES {}", charset)).await?;
        tracing::debug!(charset = %charset, "session charset set");
        Ok(())
    }

    /// Liveness check (COM_PING)
    pub async fn ping(&mut self) -> Result<()> {
        if self.state != ConnectionState::Idle {
            return Err(Error::ConnectionBusy(format!(
                "connection in state: {}",
                self.state
            )));
        }

        self.state.transition(ConnectionState::QueryInProgress)?;
        self.seq = 0;
        self.send_message(&ClientMessage::Ping).await?;
        self.state.transition(ConnectionState::ReadingResults)?;

        let packet = self.receive_packet().await?;
        match packet.payload.first() {
            Some(&header::OK) => {
                self.state.transition(ConnectionState::Idle)?;
                Ok(())
            }
            Some(&header::ERR) => {
                let err =
                    decode_err(&packet.payload).map_err(|e| Error::Protocol(e.to_string()))?;
                self.state.transition(ConnectionState::Idle)?;
                Err(Error::Server {
                    code: err.code,
                    sql_state: err.sql_state,
                    message: err.message,
                })
            }
            _ => Err(Error::Protocol("unexpected reply to COM_PING".into())),
        }
    }

    /// Close the connection (COM_QUIT, then transport shutdown)
    pub async fn close(mut self) -> Result<()> {
        self.state.transition(ConnectionState::Closed)?;
        self.seq = 0;
        let _ = self.send_message(&ClientMessage::Quit).await;
        if let Some(transport) = self.transport.as_mut() {
            transport.shutdown().await?;
        }
        Ok(())
    }

    /// Frame and send a client message with the next sequence id
    async fn send_message(&mut self, msg: &ClientMessage) -> Result<()> {
        let payload = encode_message(msg)?;
        let buf = frame_packet(&payload, self.seq)?;
        self.seq = self.seq.wrapping_add(1);

        let transport = self
            .transport
            .as_mut()
            .ok_or_else(|| Error::Protocol("transport not available".into()))?;
        transport.write_all(&buf).await?;
        transport.flush().await?;
        Ok(())
    }

    /// Receive one packet, verifying the sequence id
    async fn receive_packet(&mut self) -> Result<Packet> {
        loop {
            match decode_packet(&mut self.read_buf) {
                Ok((packet, consumed)) => {
                    self.read_buf.advance(consumed);
                    if packet.seq != self.seq {
                        return Err(Error::Protocol(format!(
                            "sequence id mismatch: expected {}, got {}",
                            self.seq, packet.seq
                        )));
                    }
                    self.seq = self.seq.wrapping_add(1);
                    return Ok(packet);
                }
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    // Need more data
                    let transport = self
                        .transport
                        .as_mut()
                        .ok_or_else(|| Error::Protocol("transport not available".into()))?;
                    let n = transport.read_buf(&mut self.read_buf).await?;
                    if n == 0 {
                        return Err(Error::ConnectionClosed);
                    }
                }
                Err(e) => return Err(Error::Protocol(e.to_string())),
            }
        }
    }
}

/// Stable label for connect-failure metrics
fn error_label(e: &Error) -> &'static str {
    match e {
        Error::Io(_) => "io",
        Error::Config(_) => "config",
        Error::Protocol(_) => "protocol",
        Error::Authentication(_) => "authentication",
        Error::Server { .. } => "server_error",
        Error::ConnectionClosed => "connection_closed",
        Error::ConnectionBusy(_) => "busy",
        Error::InvalidState { .. } => "invalid_state",
        Error::Unsupported(_) => "unsupported",
    }
}
