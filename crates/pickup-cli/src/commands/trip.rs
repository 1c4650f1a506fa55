use super::context::AppContext;
use super::print_json;
use anyhow::Result;
use pickup_core::session::TripOutcome;

fn report(outcome: &TripOutcome) -> Result<()> {
    println!("✅ {}", outcome.message);
    if let Some(data) = &outcome.data {
        print_json(data)?;
    }
    Ok(())
}

pub async fn start(ctx: &mut AppContext) -> Result<()> {
    ctx.require_session().await?;
    report(&ctx.manager.start_trip().await?)
}

pub async fn next(ctx: &mut AppContext) -> Result<()> {
    ctx.require_session().await?;
    report(&ctx.manager.start_next().await?)
}

pub async fn complete(ctx: &mut AppContext) -> Result<()> {
    ctx.require_session().await?;
    report(&ctx.manager.complete_trip().await?)
}

pub async fn status(ctx: &mut AppContext) -> Result<()> {
    ctx.require_session().await?;
    report(&ctx.manager.current_status().await?)
}
