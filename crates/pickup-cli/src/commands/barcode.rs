use super::context::AppContext;
use super::print_json;
use anyhow::{anyhow, Result};
use pickup_core::session::{BarcodeOutcome, CycleRequest, CycleStatus};
use std::str::FromStr;

fn report(outcome: &BarcodeOutcome) -> Result<()> {
    println!("✅ {}", outcome.message.as_deref().unwrap_or("Done"));
    if let Some(data) = &outcome.data {
        print_json(data)?;
    }
    Ok(())
}

fn parse_status(status: &str) -> Result<CycleStatus> {
    CycleStatus::from_str(&status.trim().to_lowercase())
        .map_err(|_| anyhow!("Unknown cycle status '{}' (inbound, sorting, completed)", status))
}

pub async fn scan(ctx: &mut AppContext, barcode_id: &str) -> Result<()> {
    ctx.require_session().await?;
    report(&ctx.manager.scan_barcode(barcode_id).await?)
}

/// Starts a cycle; `scan` also validates the barcode and tags the route.
pub async fn start(ctx: &mut AppContext, request: CycleRequest, scan: bool) -> Result<()> {
    ctx.require_session().await?;
    let outcome = if scan {
        ctx.manager.scan_and_start_cycle(&request).await?
    } else {
        ctx.manager.start_cycle(&request).await?
    };
    report(&outcome)
}

pub async fn update(
    ctx: &mut AppContext,
    cycle_id: &str,
    status: &str,
    inbound_weight: Option<f64>,
) -> Result<()> {
    let status = parse_status(status)?;
    ctx.require_session().await?;
    report(
        &ctx.manager
            .update_cycle_status(cycle_id, status, inbound_weight)
            .await?,
    )
}

pub async fn show(ctx: &mut AppContext, cycle_id: &str) -> Result<()> {
    ctx.require_session().await?;
    report(&ctx.manager.cycle_details(cycle_id).await?)
}

pub async fn list(ctx: &mut AppContext, barcode_id: &str) -> Result<()> {
    ctx.require_session().await?;
    let cycles = ctx.manager.cycles_for_barcode(barcode_id).await?;
    println!("{} cycle(s) for {}", cycles.len(), barcode_id.trim());
    print_json(&cycles)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_status() {
        assert_eq!(parse_status("Inbound").unwrap(), CycleStatus::Inbound);
        assert_eq!(parse_status(" sorting ").unwrap(), CycleStatus::Sorting);
        assert!(parse_status("lost").is_err());
    }
}
