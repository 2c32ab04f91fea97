//! MysqlClient implementation

use super::connection_string::{ConnectionInfo, TransportType};
use crate::connection::{Connection, ConnectionConfig, SslMode, Transport};
use crate::protocol::{OkPacket, QueryResult};
use crate::{Error, Result};
use std::time::Duration;

/// MySQL wire protocol client
///
/// Owns one connection. Pass it (or hand out `&mut` access) to whatever needs
/// to issue statements; there is no global handle.
#[derive(Debug)]
pub struct MysqlClient {
    conn: Connection,
}

impl MysqlClient {
    /// Connect to MySQL using a connection string
    ///
    /// TLS is negotiated when the connection string carries
    /// `ssl-mode=required` (or stricter).
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # async fn example() -> mysql_wire::Result<()> {
    /// use mysql_wire::MysqlClient;
    ///
    /// // TCP connection
    /// let client = MysqlClient::connect("mysql://root@localhost/dbproject").await?;
    ///
    /// // Unix socket
    /// let client = MysqlClient::connect("mysql:///dbproject?socket=/tmp/mysql.sock").await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn connect(connection_string: &str) -> Result<Self> {
        let info = ConnectionInfo::parse(connection_string)?;
        let config = info.to_config();
        let tls_config = info.to_tls_config()?;
        Self::establish(&info, &config, tls_config).await
    }

    /// Connect with an explicit TLS configuration
    ///
    /// The connection starts as plain TCP, sends the SSLRequest packet after
    /// the server handshake, and upgrades to TLS before any credentials go
    /// over the wire.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # async fn example() -> mysql_wire::Result<()> {
    /// use mysql_wire::{MysqlClient, TlsConfig};
    ///
    /// let tls = TlsConfig::builder()
    ///     .verify_hostname(true)
    ///     .build()?;
    ///
    /// let client = MysqlClient::connect_tls("mysql://app@db.example.com/app", tls).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn connect_tls(
        connection_string: &str,
        tls_config: crate::connection::TlsConfig,
    ) -> Result<Self> {
        let info = ConnectionInfo::parse(connection_string)?;
        if info.transport == TransportType::Unix {
            return Err(Error::Config(
                "TLS is only supported for TCP connections".into(),
            ));
        }

        let mut config = info.to_config();
        if config.sslmode == SslMode::Disabled {
            config.sslmode = SslMode::Required;
        }
        Self::establish(&info, &config, Some(tls_config)).await
    }

    /// Connect with custom connection configuration
    ///
    /// The configuration overrides everything except host, port, and socket
    /// path, which still come from the connection string.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # async fn example() -> mysql_wire::Result<()> {
    /// use mysql_wire::{MysqlClient, ConnectionConfig};
    /// use std::time::Duration;
    ///
    /// let config = ConnectionConfig::builder("dbproject", "root")
    ///     .connect_timeout(Duration::from_secs(10))
    ///     .build();
    ///
    /// let client = MysqlClient::connect_with_config("mysql://localhost", config).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn connect_with_config(
        connection_string: &str,
        config: ConnectionConfig,
    ) -> Result<Self> {
        let info = ConnectionInfo::parse(connection_string)?;
        if config.sslmode != SslMode::Disabled {
            return Err(Error::Config(
                "use connect_with_config_and_tls when ssl-mode is not disabled".into(),
            ));
        }
        Self::establish(&info, &config, None).await
    }

    /// Connect with both custom configuration and TLS encryption
    pub async fn connect_with_config_and_tls(
        connection_string: &str,
        config: ConnectionConfig,
        tls_config: crate::connection::TlsConfig,
    ) -> Result<Self> {
        let info = ConnectionInfo::parse(connection_string)?;
        if info.transport == TransportType::Unix {
            return Err(Error::Config(
                "TLS is only supported for TCP connections".into(),
            ));
        }
        Self::establish(&info, &config, Some(tls_config)).await
    }

    /// Open the transport and run the handshake
    async fn establish(
        info: &ConnectionInfo,
        config: &ConnectionConfig,
        tls_config: Option<crate::connection::TlsConfig>,
    ) -> Result<Self> {
        let transport = match info.transport {
            TransportType::Tcp => {
                let host = info
                    .host
                    .as_deref()
                    .ok_or_else(|| Error::Config("TCP requires a host".into()))?;
                let port = info
                    .port
                    .ok_or_else(|| Error::Config("TCP requires a port".into()))?;
                with_timeout(config.connect_timeout, Transport::connect_tcp(host, port)).await?
            }
            TransportType::Unix => {
                let path = info
                    .unix_socket
                    .as_deref()
                    .ok_or_else(|| Error::Config("Unix transport requires a socket path".into()))?;
                with_timeout(config.connect_timeout, Transport::connect_unix(path)).await?
            }
        };

        let mut conn = Connection::new(transport);
        conn.handshake(config, tls_config.as_ref(), info.host.as_deref())
            .await?;

        Ok(Self { conn })
    }

    /// Execute a text protocol statement and collect the full result
    pub async fn query(&mut self, sql: &str) -> Result<QueryResult> {
        self.conn.query(sql).await
    }

    /// Execute a statement that returns no result set
    pub async fn execute(&mut self, sql: &str) -> Result<OkPacket> {
        self.conn.execute(sql).await
    }

    /// Liveness check
    pub async fn ping(&mut self) -> Result<()> {
        self.conn.ping().await
    }

    /// Server version reported in the handshake
    pub fn server_version(&self) -> Option<&str> {
        self.conn.server_version()
    }

    /// Connection (thread) id assigned by the server
    pub fn connection_id(&self) -> Option<u32> {
        self.conn.connection_id()
    }

    /// Close the connection gracefully
    pub async fn close(self) -> Result<()> {
        self.conn.close().await
    }
}

/// Apply an optional timeout to a connect future
async fn with_timeout<F>(timeout: Option<Duration>, fut: F) -> Result<Transport>
where
    F: std::future::Future<Output = Result<Transport>>,
{
    match timeout {
        Some(duration) => tokio::time::timeout(duration, fut).await.map_err(|_| {
            Error::Io(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                format!("connect timed out after {:?}", duration),
            ))
        })?,
        None => fut.await,
    }
}
