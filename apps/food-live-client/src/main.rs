//! Food Live Client Binary
//!
//! Watches one food on the feed: prints the merged comment view whenever it
//! changes and turns lines typed on stdin into ratings and comments.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin food-live-client -- [FOOD_ID]
//! ```
//!
//! Without `FOOD_ID` the first catalog item is watched.
//!
//! # Commands (stdin)
//!
//! - `/rate <1-5>`: Rate the watched food
//! - `/quit`: Exit
//! - anything else: Post it as a comment
//!
//! # Environment Variables
//!
//! ## Required
//! - `FOODFEED_API_URL`: REST base URL, e.g. `https://feed.example/api/v1`
//! - `FOODFEED_SOCKET_HOST`: WebSocket host, e.g. `feed.example`
//!
//! ## Optional
//! - `FOODFEED_RECONNECT_DELAY_INITIAL_MS` / `_MAX_MS`: Reconnect delay (default: 3000)
//! - `FOODFEED_RECONNECT_DELAY_MULTIPLIER`: Backoff multiplier (default: 1.0)
//! - `FOODFEED_RECONNECT_JITTER`: Jitter fraction (default: 0.0)
//! - `FOODFEED_MAX_RECONNECT_ATTEMPTS`: 0 = unlimited (default: 0)
//! - `FOODFEED_HEARTBEAT_INTERVAL_SECS`: 0 disables (default: 20)
//! - `FOODFEED_METRICS_PORT`: Prometheus port, 0 disables (default: 0)
//! - `OTEL_ENABLED`, `OTEL_EXPORTER_OTLP_ENDPOINT`, `OTEL_SERVICE_NAME`, `RUST_LOG`

use std::sync::Arc;

use anyhow::Context;
use food_live_client::infrastructure::http::DEFAULT_PAGE_SIZE;
use food_live_client::infrastructure::telemetry;
use food_live_client::{
    ApiClient, BroadcastNotifier, ClientConfig, ClientContext, FoodDetail, FoodId, LiveClient,
    LiveClientConfig, LiveClientError, TungsteniteConnector, init_metrics,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::{BroadcastStream, WatchStream};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    load_dotenv();

    let _telemetry_guard = telemetry::init()?;

    tracing::info!("Starting Food Live Client");

    let config = ClientConfig::from_env()?;
    log_config(&config);

    if config.metrics_port != 0 {
        match init_metrics(config.metrics_port) {
            Ok(addr) => tracing::info!(%addr, "Metrics listener started"),
            Err(e) => tracing::warn!(error = %e, "Failed to start metrics listener"),
        }
    }

    let api = ApiClient::new(&config.api)?;

    let current_user = match api.me().await {
        Ok(user) => {
            tracing::info!(user = %user.username, "Signed in");
            Some(user)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Not signed in, continuing anonymously");
            None
        }
    };

    let food_id = resolve_food_id(&api).await?;
    let mut detail = fetch_detail(&api, &food_id).await;

    // Snapshot refetches requested from router callbacks
    let (refetch_tx, mut refetch_rx) = mpsc::unbounded_channel::<()>();

    let notifier = Arc::new(BroadcastNotifier::new(config.socket.notification_capacity));
    let mut notifications = BroadcastStream::new(notifier.subscribe());

    let connector = Arc::new(TungsteniteConnector::with_cookies(
        api.jar(),
        api.base_url().clone(),
    ));
    let client = LiveClient::new(
        LiveClientConfig::from_client_config(&config),
        connector,
        notifier,
    );

    let mut context = ClientContext::default()
        .on_new_rating({
            let refetch_tx = refetch_tx.clone();
            move |update| {
                tracing::debug!(
                    food_id = %update.food_id,
                    average = update.average,
                    "Rating changed"
                );
                let _ = refetch_tx.send(());
            }
        })
        .on_rate_success(move || {
            let _ = refetch_tx.send(());
        });
    if let Some(user) = &current_user {
        context = context.with_user(user.id.clone());
    }
    client.set_context(context);

    client.start();
    client.set_topic(Some(food_id.clone()));

    let mut changes = WatchStream::new(client.changes());
    let mut states = WatchStream::new(client.watch_state());
    let mut input = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    let shutdown_token = CancellationToken::new();
    tokio::spawn(await_shutdown(shutdown_token.clone()));

    loop {
        tokio::select! {
            () = shutdown_token.cancelled() => break,
            Some(state) = states.next() => {
                tracing::info!(%state, "Connection state changed");
            }
            Some(_) = changes.next() => {
                print_view(&client, detail.as_ref());
            }
            Some(received) = notifications.next() => match received {
                Ok(notification) => {
                    println!("[{:?}] {}", notification.level, notification.message);
                }
                Err(e) => tracing::warn!(error = %e, "Notifications lagged"),
            },
            Some(()) = refetch_rx.recv() => {
                if let Some(fresh) = fetch_detail(&api, &food_id).await {
                    detail = Some(fresh);
                    print_view(&client, detail.as_ref());
                }
            }
            line = input.next_line(), if stdin_open => match line {
                Ok(Some(line)) => {
                    if !handle_command(&client, &line) {
                        break;
                    }
                }
                Ok(None) => stdin_open = false,
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to read stdin");
                    stdin_open = false;
                }
            },
        }
    }

    client.shutdown().await;
    tracing::info!("Food Live Client stopped");
    Ok(())
}

/// Pick the food from the first argument, or the first catalog item.
async fn resolve_food_id(api: &ApiClient) -> anyhow::Result<FoodId> {
    if let Some(id) = std::env::args().nth(1).filter(|id| !id.trim().is_empty()) {
        return Ok(FoodId::new(id.trim()));
    }

    let page = api
        .list_foods(None, DEFAULT_PAGE_SIZE)
        .await
        .context("Failed to fetch the catalog")?;
    let first = page
        .items
        .into_iter()
        .next()
        .context("The catalog is empty")?;

    tracing::info!(food_id = %first.id, name = %first.name, "Watching first catalog item");
    Ok(first.id)
}

async fn fetch_detail(api: &ApiClient, food_id: &FoodId) -> Option<FoodDetail> {
    match api.food_detail(food_id).await {
        Ok(detail) => Some(detail),
        Err(e) => {
            tracing::warn!(%food_id, error = %e, "Failed to fetch food detail");
            None
        }
    }
}

/// Handle one stdin line. Returns `false` to quit.
fn handle_command(client: &LiveClient, line: &str) -> bool {
    let line = line.trim();
    if line.is_empty() {
        return true;
    }
    if line == "/quit" {
        return false;
    }

    let result = match line.strip_prefix("/rate") {
        Some(arg) => match arg.trim().parse::<u8>() {
            Ok(score @ 1..=5) => client.rate(score),
            _ => {
                println!("usage: /rate <1-5>");
                return true;
            }
        },
        None => client.post_comment(line),
    };

    match result {
        // Already surfaced as a notification
        Ok(()) | Err(LiveClientError::NotConnected) => {}
        Err(e) => println!("{e}"),
    }
    true
}

fn print_view(client: &LiveClient, detail: Option<&FoodDetail>) {
    let rating = client.display_rating(detail);
    match detail {
        Some(detail) => {
            println!("== {} ({rating:.1}) ==", detail.item.name);
            for comment in client.merged_view(detail) {
                println!("  {}: {}", comment.user.username, comment.content);
            }
        }
        None => {
            println!("== ({rating:.1}) ==");
            for comment in client.live_comments() {
                println!("  {}: {}", comment.user.username, comment.content);
            }
        }
    }
}

/// Log the parsed configuration.
fn log_config(config: &ClientConfig) {
    tracing::info!(
        api_url = %config.api.base_url,
        socket_url = %config.socket_url(),
        metrics_port = config.metrics_port,
        "Configuration loaded"
    );
    tracing::debug!(
        reconnect_initial_ms = config.socket.reconnect_delay_initial.as_millis(),
        reconnect_max_ms = config.socket.reconnect_delay_max.as_millis(),
        max_reconnect_attempts = config.socket.max_reconnect_attempts,
        heartbeat_secs = config.socket.heartbeat_interval.as_secs(),
        "Socket settings"
    );
}

/// Load .env file from current directory or any ancestor directory.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
#[allow(clippy::expect_used)]
async fn await_shutdown(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, shutting down");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, shutting down");
        }
    }

    shutdown_token.cancel();
}
