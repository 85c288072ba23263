//! LAN Chat Relay Server - Entry Point
//!
//! Starts the TCP listener, the RelayServer actor, and the UDP discovery
//! responder, then accepts connections until ctrl-c.

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use chat_relay::discovery::advertised_host;
use chat_relay::{handle_connection, DiscoveryResponder, RelayServer, ServerArgs, ServerCommand};

/// Channel buffer size for server commands
const CHANNEL_BUFFER_SIZE: usize = 256;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging with environment filter
    // Use RUST_LOG env var to control log level
    // e.g., RUST_LOG=debug or RUST_LOG=chat_relay=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("chat_relay=info")),
        )
        .init();

    let args = ServerArgs::parse();
    let bind_addr = format!("{}:{}", args.host, args.port);

    // Start TCP listener
    let listener = TcpListener::bind(&bind_addr).await?;
    info!("Chat relay listening on {}", bind_addr);

    // Create RelayServer actor channel and start
    let (cmd_tx, cmd_rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);
    let server_task = tokio::spawn(RelayServer::new(cmd_rx).run());

    // Discovery is independent of the chat path: a bind failure is an
    // operator problem, not a reason to stop relaying.
    let chat_host = advertised_host(&args.host, args.advertise_host.as_deref());
    let discovery_addr = format!("0.0.0.0:{}", args.discovery_port).parse()?;
    let discovery_task =
        match DiscoveryResponder::bind(discovery_addr, &chat_host, args.port).await {
            Ok(responder) => Some(tokio::spawn(responder.run())),
            Err(e) => {
                warn!("Discovery responder unavailable: {}", e);
                None
            }
        };

    info!(
        "Clients can connect to ws://{}:{}/chat",
        chat_host, args.port
    );

    // Connection accept loop, until shutdown signal
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, addr)) => {
                        info!("New connection from {}", addr);
                        let cmd_tx = cmd_tx.clone();

                        // Spawn handler task for each connection
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(stream, cmd_tx).await {
                                error!("Connection handler error: {}", e);
                            }
                        });
                    }
                    Err(e) => {
                        error!("Failed to accept connection: {}", e);
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    // Close every live connection, clear the registry, stop discovery
    let _ = cmd_tx.send(ServerCommand::Shutdown).await;
    let _ = server_task.await;
    if let Some(task) = discovery_task {
        task.abort();
    }

    info!("Chat relay stopped");
    Ok(())
}
