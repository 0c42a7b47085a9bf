use std::{net::SocketAddr, time::Duration};

use axum::{routing::get, Router};
use bot_core::{notify::Notifier, AdminGate, BotProfile, Controller};
use shared::domain::{ChatId, UserId};
use storage::Storage;
use telegram::TelegramClient;
use tracing::{error, info};

mod config;
mod dispatch;

use config::{load_settings, normalize_database_url};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let settings = load_settings();
    if settings.bot_token.is_empty() {
        anyhow::bail!("BOT_TOKEN is not configured");
    }

    let database_url = normalize_database_url(&settings.database_url);
    let storage = Storage::new(&database_url).await.map_err(|error| {
        error!(
            %database_url,
            %error,
            "failed to open SQLite database; verify parent directory exists and permissions are correct"
        );
        error
    })?;

    let client = TelegramClient::new(&settings.bot_token)?;
    // Connectivity fault at startup is fatal; the process does not proceed
    // to serve with a token it cannot use.
    let me = client.get_me().await.map_err(|error| {
        error!(%error, "bot connection failed");
        error
    })?;
    info!(username = ?me.username, "bot connected");

    let app = build_router();
    let addr: SocketAddr = settings.health_bind.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "liveness endpoint listening");
    let health = tokio::spawn(async move { axum::serve(listener, app).await });

    let admin_chat = settings.admin_chat_id.map(ChatId);
    let mut controller = Controller::new(
        storage,
        BotProfile {
            brand_name: settings.brand_name,
            referral_code: settings.referral_code,
            referral_link: settings.referral_link,
        },
        AdminGate {
            admin_user: settings.admin_user_id.map(UserId),
            admin_chat,
        },
        Duration::from_secs(settings.rate_limit_seconds),
    );
    let notifier = Notifier::new(client.clone(), admin_chat);

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
        }
        _ = dispatch::run_polling(&client, &mut controller, &notifier) => {}
    }

    health.abort();
    info!("all services stopped");
    Ok(())
}

fn build_router() -> Router {
    Router::new()
        .route("/", get(liveness))
        .route("/health", get(liveness))
}

async fn liveness() -> &'static str {
    "referral bonus bot is running"
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    #[tokio::test]
    async fn liveness_routes_answer_200() {
        let app = build_router();
        for path in ["/", "/health"] {
            let request = Request::get(path).body(Body::empty()).expect("request");
            let response = app.clone().oneshot(request).await.expect("response");
            assert_eq!(response.status(), StatusCode::OK, "{path}");
        }
    }

    #[tokio::test]
    async fn unknown_path_is_not_served() {
        let app = build_router();
        let request = Request::get("/metrics").body(Body::empty()).expect("request");
        let response = app.oneshot(request).await.expect("response");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
