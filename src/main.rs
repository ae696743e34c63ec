use anyhow::{anyhow, Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use ultra_route::config::AppConfig;
use ultra_route::router::{create_api_router, RouteProcessor, Router, SelectorRegistry};
use ultra_route::state::{Genesis, World};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing().context("initialize tracing subscriber")?;

    if let Err(err) = run().await {
        tracing::error!(error = ?err, "fatal route processor error");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> Result<()> {
    let config = AppConfig::load().context("load configuration from environment")?;
    let router_address = config.router_address()?;
    let owner = config.owner_address()?;
    let api_addr = config.listen_addr()?;

    let mut world = match &config.genesis_path {
        Some(path) => {
            let genesis = Genesis::load(path)?;
            World::from_genesis(&genesis).context("build world from genesis")?
        }
        None => {
            warn!("no genesis file configured; starting with an empty world");
            World::new()
        }
    };
    if let Some(ts) = config.timestamp {
        world.set_timestamp(ts);
    }

    let registry = SelectorRegistry::with_defaults();
    info!(handlers = ?registry, "selector registry initialized");
    let processor = RouteProcessor::new(router_address, owner, registry);
    let router = Arc::new(Router::new(processor, world));

    let app = App { router, api_addr };
    app.run().await
}

struct App {
    router: Arc<Router>,
    api_addr: std::net::SocketAddr,
}

impl App {
    async fn run(self) -> Result<()> {
        let api_router = create_api_router(self.router.clone()).layer(
            tower::ServiceBuilder::new()
                .layer(tower_http::trace::TraceLayer::new_for_http())
                .layer(tower_http::cors::CorsLayer::permissive()),
        );

        let listener = tokio::net::TcpListener::bind(&self.api_addr)
            .await
            .with_context(|| format!("bind API server address {}", self.api_addr))?;
        info!(address = %self.api_addr, "route processor API online");
        let _api_handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, api_router).await {
                warn!(error = %e, "API server error");
            }
        });

        let mut ticker = tokio::time::interval(Duration::from_secs(30));
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let stats = self.router.stats().await;
                    info!(
                        total_routes = stats.total_routes,
                        successful = stats.successful_routes,
                        failed = stats.failed_routes,
                        success_rate = stats.success_rate,
                        "route statistics"
                    );
                }
                res = tokio::signal::ctrl_c() => {
                    if let Err(err) = res {
                        warn!(error = %err, "ctrl_c listener error");
                    }
                    info!("Shutdown signal received, exiting");
                    break;
                }
            }
        }
        Ok(())
    }
}

fn init_tracing() -> Result<()> {
    let env_filter =
        std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=warn".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(env_filter))
        .with_target(false)
        .try_init()
        .map_err(|err| anyhow!("tracing subscriber init: {err}"))
}
