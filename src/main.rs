use clap::Parser;
use std::sync::Arc;
use telgate::config::{Cli, Config, LoggingConfig};
use telgate::error::GatewayResult;
use telgate::session::telnet::{IAC, OPT_ECHO, OPT_SUPPRESS_GO_AHEAD, WILL};
use telgate::session::{Registry, Session, SessionOptions};

/// Sent before anything else on a new connection: announce that we echo
/// and suppress go-ahead, so the peer drops into character mode. The
/// options are never negotiated beyond this announcement.
const PREFACE: [u8; 6] = [IAC, WILL, OPT_ECHO, IAC, WILL, OPT_SUPPRESS_GO_AHEAD];

const PROMPT: &[u8] = b"> ";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = Config::load(&cli)?;
    init_logging(&config.logging);

    let registry = Arc::new(Registry::new());
    let options = SessionOptions::from(&config.session);
    let listener = tokio::net::TcpListener::bind(&config.gateway.listen).await?;
    tracing::info!(
        version = telgate::version::VERSION,
        listen = %config.gateway.listen,
        "Gateway listening"
    );

    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                tracing::debug!(%peer, "Connection accepted");
                let registry = Arc::clone(&registry);
                let options = options.clone();
                tokio::spawn(async move {
                    serve_connection(registry, stream, options).await;
                });
            }
            Err(err) => {
                tracing::warn!(error = %err, "Accept failed");
            }
        }
    }
}

fn init_logging(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::new(logging.level.clone());
    if logging.format == "json" {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

/// Session lifetime, end to end: register, run the console task, then mark
/// the task finished, wait for lookups to drain and drop out of the
/// registry. Dropping the last reference closes the connection.
async fn serve_connection(
    registry: Arc<Registry>,
    stream: tokio::net::TcpStream,
    options: SessionOptions,
) {
    let session = registry.create(Box::new(stream), &options);
    registry.insert(Arc::clone(&session)).await;
    tracing::info!(
        session = session.id(),
        service = session.service_name(),
        "Session opened"
    );

    if let Err(err) = run_console(&session).await {
        if err.is_disconnect() {
            tracing::info!(session = session.id(), "Peer disconnected");
        } else {
            tracing::warn!(session = session.id(), error = %err, "Console task failed");
        }
    }

    session.notify_task_finished();
    session.wait_drained().await;
    registry.remove(&session).await;
    tracing::info!(session = session.id(), "Session closed");
}

/// Minimal line console standing in for a spawned shell: echoes input,
/// erases on backspace, repeats completed lines, quits on `exit`.
async fn run_console(session: &Session) -> GatewayResult<()> {
    session.write_raw(&PREFACE).await?;
    session.write(b"telgate console; type 'exit' to quit\n").await?;
    session.write(PROMPT).await?;
    session.flush().await?;

    let mut line = Vec::new();
    let mut chunk = [0u8; 64];
    loop {
        let count = session.read(&mut chunk).await?;
        for &byte in &chunk[..count] {
            match byte {
                b'\n' => {
                    session.write(b"\n").await?;
                    let entered = String::from_utf8_lossy(&line).trim().to_string();
                    line.clear();
                    if entered == "exit" {
                        session.write(b"bye\n").await?;
                        session.flush().await?;
                        return Ok(());
                    }
                    if !entered.is_empty() {
                        session.write(entered.as_bytes()).await?;
                        session.write(b"\n").await?;
                    }
                    session.write(PROMPT).await?;
                }
                0x08 | 0x7f => {
                    if line.pop().is_some() {
                        erase_last_column(session).await?;
                    }
                }
                _ => {
                    line.push(byte);
                    session.write(&[byte]).await?;
                }
            }
        }
        session.flush().await?;
    }
}

/// Visually erase one character: step left, overwrite with a space, step
/// left again. Both steps are single-column moves, so each emits exactly
/// one backspace.
async fn erase_last_column(session: &Session) -> GatewayResult<()> {
    let (column, _) = session.cursor().await;
    session.set_cursor_column(column - 1).await?;
    session.write(b" ").await?;
    session.set_cursor_column(column - 1).await?;
    Ok(())
}
