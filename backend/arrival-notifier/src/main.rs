use actix_web::{middleware, web, App, HttpServer};
use anyhow::Context;
use arrival_notifier::{
    handlers::register_routes as register_events, metrics, ArrivalNotifier, Config, Platform,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,actix_web=info".into());

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("failed to load configuration")?;
    init_tracing(config.app.json_logs());

    tracing::info!("Starting arrival notifier ({})", config.app.app_env);

    let platform = Platform::init(&config.firebase).context("failed to initialize Firebase")?;
    let notifier = Arc::new(ArrivalNotifier::new(
        platform.store,
        platform.transport,
        config.schema.clone(),
        config.notification.clone(),
    ));

    let addr = format!("0.0.0.0:{}", config.app.listen_port());
    tracing::info!("Starting HTTP server on {}", addr);

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(notifier.clone()))
            .wrap(middleware::Logger::default())
            .wrap(metrics::MetricsMiddleware)
            .route("/health", web::get().to(|| async { "OK" }))
            .route("/metrics", web::get().to(metrics::serve_metrics))
            .configure(register_events)
    })
    .bind(&addr)
    .with_context(|| format!("failed to bind {}", addr))?
    .run()
    .await?;

    Ok(())
}
