//! High-level client entry point

mod connection_string;
mod mysql_client;

pub use connection_string::{ConnectionInfo, TransportType};
pub use mysql_client::MysqlClient;
