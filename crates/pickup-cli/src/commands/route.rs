use super::context::AppContext;
use super::print_json;
use anyhow::{Context, Result};
use pickup_core::session::StopCompletion;
use serde_json::{Map, Value};

pub async fn current(ctx: &mut AppContext) -> Result<()> {
    ctx.require_session().await?;
    match ctx.manager.current_pickup() {
        Some(pickup) => print_json(&pickup),
        None => anyhow::bail!("No current pickup"),
    }
}

pub async fn advance(ctx: &mut AppContext) -> Result<()> {
    ctx.require_session().await?;
    let pickup = ctx.manager.advance().await?;
    println!(
        "➡️  Pickup {}/{}{}",
        pickup.pickup_index,
        pickup.total_pickups,
        if pickup.is_last { " (last)" } else { "" }
    );
    print_json(&pickup)
}

pub async fn complete(
    ctx: &mut AppContext,
    weight: Option<f64>,
    photo: Option<String>,
    extra: &[String],
    local: bool,
) -> Result<()> {
    ctx.require_session().await?;
    let completion = StopCompletion {
        weight,
        photo_path: photo,
        extra: parse_extra(extra)?,
    };

    let stop = if local {
        ctx.manager.complete_current(completion).await?
    } else {
        ctx.manager
            .complete_current_remote(completion)
            .await
            .context("Failed to complete pickup")?
    };
    println!("✅ Completed stop {} (sequence {})", stop.id, stop.sequence);
    print_json(&ctx.manager.progress_summary())
}

pub async fn progress(ctx: &mut AppContext) -> Result<()> {
    ctx.require_session().await?;
    print_json(&ctx.manager.progress_summary())
}

pub async fn page(ctx: &mut AppContext, page: Option<String>) -> Result<()> {
    ctx.require_session().await?;
    if let Some(page) = page {
        ctx.manager.set_current_page(page).await;
    }
    println!("{}", ctx.manager.current_page());
    Ok(())
}

/// Parses `key=value` pairs. Values that are valid JSON keep their type.
fn parse_extra(pairs: &[String]) -> Result<Map<String, Value>> {
    let mut extra = Map::new();
    for pair in pairs {
        let (key, raw) = pair
            .split_once('=')
            .with_context(|| format!("Expected KEY=VALUE, got {:?}", pair))?;
        let key = key.trim();
        if key.is_empty() {
            anyhow::bail!("Empty key in {:?}", pair);
        }
        let value =
            serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
        extra.insert(key.to_string(), value);
    }
    Ok(extra)
}
