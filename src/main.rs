use dotenvy::dotenv;
use tracing::{info, warn};

use std::net::SocketAddr;
use taskpro::infra::{
    app::create_app, realtime::run_change_listener, reconciler::run_expiry_sweep_loop,
    setup::init_app_state,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let bootstrap = init_app_state().await?;
    let app_state = bootstrap.app_state;

    let bind_addr = app_state.config.bind_addr;

    let app = create_app(app_state.clone());

    // Background tasks are spawned after tracing is initialized.
    if !app_state.paypal_webhook_use_cases.mode().verifies_signatures() {
        warn!(
            mode = %app_state.paypal_webhook_use_cases.mode(),
            "PayPal webhook signature verification is disabled"
        );
    }
    if app_state.paypal_webhook_use_cases.mode().allows_fallback_user()
        && app_state.config.sandbox_fallback_user_id.is_none()
    {
        warn!("SANDBOX_FALLBACK_USER_ID is not set, sandbox events without custom_id will be rejected");
    }

    tokio::spawn(run_change_listener(
        bootstrap.pool,
        app_state.changes.clone(),
    ));
    tokio::spawn(run_expiry_sweep_loop(
        app_state.subscription_use_cases.clone(),
        app_state.config.reconcile_interval(),
    ));

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    info!("Backend listening at {}", &listener.local_addr()?);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
