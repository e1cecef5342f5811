use std::io;
use std::time::Duration;

use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use realtime_sync_service::handlers::{
    chat::register_routes as register_chat,
    notifications::register_routes as register_notifications,
    websocket::register_routes as register_websocket,
};
use realtime_sync_service::{AppState, Config};

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,actix_web=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting realtime sync service");

    let config = Config::from_env().map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    let addr = format!("0.0.0.0:{}", config.app.port);
    let state = AppState::new(config);

    // Sweep typing deadlines the senders never explicitly stopped.
    let sweeper_state = state.clone();
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(Duration::from_secs(1));
        loop {
            tick.tick().await;
            for (conversation, typist) in sweeper_state.typing.expire_due().await {
                sweeper_state.fanout.typing_stopped(conversation, typist).await;
            }
        }
    });

    tracing::info!("Starting HTTP server on {}", addr);

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(state.clone()))
            .wrap(middleware::Logger::default())
            .wrap(Cors::permissive())
            .route("/health", web::get().to(|| async { "OK" }))
            .route("/", web::get().to(|| async { "Realtime Sync Service v1.0" }))
            .configure(|cfg| {
                register_chat(cfg);
                register_notifications(cfg);
                register_websocket(cfg);
            })
    })
    .bind(&addr)?
    .run()
    .await
}
