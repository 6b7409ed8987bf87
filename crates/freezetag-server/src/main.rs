use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use freezetag_server::build_app;
use freezetag_server::config::ServerConfig;
use freezetag_server::game_loop::MatchCommand;

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if std::env::var("FREEZETAG_LOG_JSON").is_ok_and(|v| v == "1" || v == "true") {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let config = ServerConfig::load();
    config.validate();
    let addr = config.listen_addr.clone();

    let (app, state) = build_app(config);

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!(%addr, error = %e, "Failed to bind");
            std::process::exit(1);
        },
    };
    tracing::info!("Freeze tag server listening on {addr}");

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for shutdown signal");
            return;
        }
        tracing::info!("Shutdown requested");
        signal.cancel();
    });

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
    {
        tracing::error!(error = %e, "Server error");
    }

    state.send_command(MatchCommand::Stop);
    tracing::info!("Freeze tag server stopped");
}
