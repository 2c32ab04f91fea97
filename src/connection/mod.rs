//! Connection management
//!
//! This module handles:
//! * Transport abstraction (TCP with optional TLS vs Unix socket)
//! * Connection lifecycle (handshake, auth, charset, commands)
//! * State machine enforcement
//! * TLS configuration and support

mod conn;
mod state;
mod tls;
mod transport;

pub use conn::{Connection, ConnectionConfig, ConnectionConfigBuilder};
pub use state::ConnectionState;
pub use tls::{parse_server_name, SslMode, TlsConfig};
pub use transport::Transport;
