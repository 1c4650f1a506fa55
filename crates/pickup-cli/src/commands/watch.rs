use super::context::AppContext;
use anyhow::{Context, Result};
use pickup_core::session::{run_lifecycle, spawn_ticker, LifecycleEvent};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::info;

/// Runs the lifecycle loop: resume now, refresh on every tick, save on Ctrl-C.
pub async fn run(ctx: AppContext) -> Result<()> {
    let AppContext {
        config,
        mut manager,
        shutdown,
    } = ctx;

    let outcome = manager.restore_and_validate().await;
    if !outcome.has_valid_session {
        anyhow::bail!("No valid session. Run `pickup login`.");
    }
    if outcome.using_local_session {
        println!("⚠️  Server unreachable, continuing with local session");
    }

    let manager = Arc::new(Mutex::new(manager));
    let (events, receiver) = mpsc::channel(16);

    let lifecycle = tokio::spawn(run_lifecycle(
        manager.clone(),
        receiver,
        shutdown.child_token(),
    ));
    let ticker_stop = shutdown.child_token();
    let ticker = spawn_ticker(events.clone(), config.refresh_interval(), ticker_stop.clone());

    println!(
        "👀 Watching session (refresh check every {} min). Press Ctrl-C to stop.",
        config.refresh_interval().as_secs() / 60
    );

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    info!("[Cli] Interrupt received, saving session");

    ticker_stop.cancel();
    let _ = ticker.await;
    events
        .send(LifecycleEvent::Background)
        .await
        .context("Lifecycle loop stopped early")?;
    drop(events);
    lifecycle.await.context("Lifecycle task failed")?;
    shutdown.cancel();

    let manager = manager.lock().await;
    println!(
        "✅ Session saved (page {}, pickup {}/{})",
        manager.current_page(),
        manager.totals().current,
        manager.totals().total
    );
    Ok(())
}
