mod api;
mod router;
mod runner;
mod state;

use labwatch_alert::Trigger;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    labwatch_core::config::load_dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = labwatch_core::Config::from_env();
    let trigger = Trigger::from_config(&config.evaluation)?;

    let (app_state, _stores) = AppState::in_memory(&config);

    runner::spawn_evaluation_loop(app_state.cycle.clone(), trigger);

    let app = router::build_router(app_state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("labwatch listening on http://{addr}");
    axum::serve(listener, app).await?;

    Ok(())
}
