use super::context::AppContext;
use super::print_json;
use anyhow::{Context, Result};
use pickup_core::session::{RefreshCheck, ResumeOutcome};
use serde_json::json;

pub async fn login(ctx: &mut AppContext, vehicle_no: &str, driver_dl: &str) -> Result<()> {
    let assignment = ctx
        .manager
        .login(vehicle_no, driver_dl)
        .await
        .context("Login failed")?;

    let totals = ctx.manager.totals();
    println!(
        "✅ Logged in: assignment {} ({} stops, current {}/{})",
        assignment.assignment_id,
        ctx.manager.stops().len(),
        totals.current,
        totals.total
    );
    if let Some(info) = ctx.manager.token_expiration_info() {
        println!("   Token expires at {}", info.expires_at);
    }
    Ok(())
}

pub async fn logout(ctx: &mut AppContext) -> Result<()> {
    ctx.manager.logout().await;
    println!("✅ Logged out");
    Ok(())
}

pub async fn restore(ctx: &mut AppContext) -> Result<()> {
    let outcome = ctx.manager.restore_and_validate().await;
    print_json(&outcome)?;
    if let Some(rejection) = &outcome.rejection {
        anyhow::bail!("{}. Run `pickup login`.", rejection);
    }
    if !outcome.has_valid_session {
        anyhow::bail!("No valid session. Run `pickup login`.");
    }
    Ok(())
}

pub async fn resume(ctx: &mut AppContext) -> Result<()> {
    match ctx.manager.on_app_resume().await {
        ResumeOutcome::Active {
            using_local_session,
        } => {
            if using_local_session {
                println!("⚠️  Session active (server unreachable, using local session)");
            } else {
                println!("✅ Session active");
            }
            Ok(())
        }
        ResumeOutcome::NeedsLogin => anyhow::bail!("Session ended. Run `pickup login`."),
        ResumeOutcome::Rejected(e) => anyhow::bail!("{}. Run `pickup login`.", e),
    }
}

pub async fn refresh(ctx: &mut AppContext, force: bool) -> Result<()> {
    ctx.require_session().await?;

    let check = if force {
        let refreshed = ctx.manager.refresh().await.context("Token refresh failed")?;
        RefreshCheck::Refreshed(refreshed)
    } else {
        ctx.manager.refresh_if_needed().await
    };
    println!("{}", refresh_report(check)?);
    Ok(())
}

/// One status line per refresh outcome; an invalid session is an error.
fn refresh_report(check: RefreshCheck) -> Result<String> {
    Ok(match check {
        RefreshCheck::Invalid => anyhow::bail!("Session expired. Run `pickup login`."),
        RefreshCheck::NotDue => "Token is not due for refresh".to_string(),
        RefreshCheck::Refreshed(refreshed) => format!(
            "✅ Token refreshed (expires in {})",
            refreshed
                .expires_in
                .map(|secs| format!("{}s", secs))
                .unwrap_or_else(|| "unchanged".to_string())
        ),
        RefreshCheck::Failed(e) => format!("⚠️  Refresh failed, keeping current token: {}", e),
    })
}

pub async fn status(ctx: &mut AppContext) -> Result<()> {
    let loaded = ctx.manager.load().await;
    let valid = loaded && ctx.manager.is_token_valid();
    let should_refresh = valid && ctx.manager.should_refresh();

    let assignment = ctx.manager.assignment().map(|a| {
        json!({
            "assignmentId": a.assignment_id,
            "status": a.status.to_string(),
            "routeDate": a.route_date,
            "tripStarted": ctx.manager.session().trip_started,
            "tripCompleted": ctx.manager.session().trip_completed,
        })
    });

    print_json(&json!({
        "loggedIn": ctx.manager.is_logged_in(),
        "tokenValid": valid,
        "shouldRefresh": should_refresh,
        "expiration": ctx.manager.token_expiration_info(),
        "currentPage": ctx.manager.current_page(),
        "assignment": assignment,
        "progress": ctx.manager.progress_summary(),
        "baseUrl": ctx.config.base_url,
    }))
}
