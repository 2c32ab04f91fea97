//! Fail-fast connection bootstrap
//!
//! The classic bootstrap snippet: hardcoded local credentials, one connect,
//! die with a printed cause on failure, utf8mb4 on success. Run with:
//!
//! ```sh
//! cargo run --example bootstrap
//! ```

use mysql_wire::MysqlClient;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // host localhost, user root, empty password, database dbproject
    let url = "mysql://root:@localhost/dbproject";

    let client = match MysqlClient::connect(url).await {
        Ok(client) => client,
        Err(e) => {
            eprintln!("Database connection failed: {e}");
            std::process::exit(1);
        }
    };

    println!(
        "connected to MySQL {} as connection {}",
        client.server_version().unwrap_or("unknown"),
        client.connection_id().unwrap_or(0),
    );

    if let Err(e) = client.close().await {
        eprintln!("close failed: {e}");
    }
}
