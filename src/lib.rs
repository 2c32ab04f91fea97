//! # mysql-wire
//!
//! Async MySQL connection bootstrap over the client/server wire protocol.
//!
//! This crate does one thing: it turns a host, a username, a password, and a
//! database name into a live, correctly-encoded connection handle. The
//! handshake, authentication (`mysql_native_password` and
//! `caching_sha2_password`), optional TLS negotiation, and forcing the session
//! character set (`SET NAMES utf8mb4` by default) all happen inside
//! [`MysqlClient::connect`]. Failures come back as [`Error`] values; whether to
//! retry, log, or abort the process is the caller's decision.
//!
//! ```no_run
//! # async fn example() -> mysql_wire::Result<()> {
//! use mysql_wire::MysqlClient;
//!
//! let mut client = MysqlClient::connect("mysql://root@localhost/dbproject").await?;
//! client.ping().await?;
//! client.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod client;
pub mod connection;
pub mod error;
pub mod metrics;
pub mod protocol;

pub use client::MysqlClient;
pub use connection::{Connection, ConnectionConfig, ConnectionState, SslMode, TlsConfig};
pub use error::{Error, Result};
