use anyhow::Result;
use clap::{Parser, Subcommand};
use pickup_core::session::CycleRequest;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::context::AppContext;

#[derive(Parser)]
#[command(name = "pickup")]
#[command(about = "Pickup driver client - session, token and route management", long_about = None)]
struct Cli {
    /// Path to config.toml (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging (overrides RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and fetch today's assignment
    Login {
        /// Vehicle registration number
        vehicle_no: String,
        /// Driving licence number
        driver_dl: String,
    },
    /// Clear the session and its stored record
    Logout,
    /// Restore the stored session and validate it with the server
    Restore,
    /// Re-validate the session as on app resume
    Resume,
    /// Refresh the session token
    Refresh {
        /// Refresh even when the token is not close to expiry
        #[arg(long)]
        force: bool,
    },
    /// Show session, token and progress state
    Status,
    /// Show the current pickup
    Current,
    /// Move to the next pending pickup
    Advance,
    /// Mark the current pickup completed on the server and locally
    Complete {
        /// Collected weight in kg
        #[arg(long)]
        weight: Option<f64>,
        /// Path of the pickup photo
        #[arg(long)]
        photo: Option<String>,
        /// Extra fields as key=value (value parsed as JSON when possible)
        #[arg(long = "extra", value_name = "KEY=VALUE")]
        extra: Vec<String>,
        /// Only update the local session, skip the server call
        #[arg(long)]
        local: bool,
    },
    /// Show route progress
    Progress,
    /// Show or set the current page
    Page {
        /// New page name
        page: Option<String>,
    },
    /// Trip state transitions on the server
    Trip {
        #[command(subcommand)]
        action: TripAction,
    },
    /// Barcode scans and pickup-bag cycles
    Barcode {
        #[command(subcommand)]
        action: BarcodeAction,
    },
    /// Keep the session alive: refresh on a timer until Ctrl-C
    Watch,
}

#[derive(Subcommand)]
enum TripAction {
    /// Start the trip
    Start,
    /// Start the next pickup
    Next,
    /// Complete the trip
    Complete,
    /// Fetch the current trip status
    Status,
}

#[derive(Subcommand)]
enum BarcodeAction {
    /// Check that a barcode is known and active
    Scan { barcode_id: String },
    /// Start a pickup-bag cycle
    Start {
        barcode_id: String,
        branch_code: String,
        /// Pickup weight in kg
        weight: f64,
        /// Scan the barcode in the same call and tag the current route
        #[arg(long)]
        scan: bool,
        /// Cycle id to use instead of a server-generated one
        #[arg(long)]
        cycle_id: Option<String>,
        #[arg(long)]
        branch_name: Option<String>,
        #[arg(long)]
        address: Option<String>,
        #[arg(long)]
        contact: Option<String>,
        #[arg(long)]
        latitude: Option<f64>,
        #[arg(long)]
        longitude: Option<f64>,
    },
    /// Move a cycle to inbound, sorting or completed
    Update {
        cycle_id: String,
        status: String,
        /// Weight measured at inbound, in kg
        #[arg(long)]
        inbound_weight: Option<f64>,
    },
    /// Show one cycle
    Show { cycle_id: String },
    /// List every cycle of a barcode
    List { barcode_id: String },
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut ctx = AppContext::bootstrap(cli.config.as_deref())?;

    match cli.command {
        Commands::Login {
            vehicle_no,
            driver_dl,
        } => commands::session::login(&mut ctx, &vehicle_no, &driver_dl).await?,
        Commands::Logout => commands::session::logout(&mut ctx).await?,
        Commands::Restore => commands::session::restore(&mut ctx).await?,
        Commands::Resume => commands::session::resume(&mut ctx).await?,
        Commands::Refresh { force } => commands::session::refresh(&mut ctx, force).await?,
        Commands::Status => commands::session::status(&mut ctx).await?,
        Commands::Current => commands::route::current(&mut ctx).await?,
        Commands::Advance => commands::route::advance(&mut ctx).await?,
        Commands::Complete {
            weight,
            photo,
            extra,
            local,
        } => commands::route::complete(&mut ctx, weight, photo, &extra, local).await?,
        Commands::Progress => commands::route::progress(&mut ctx).await?,
        Commands::Page { page } => commands::route::page(&mut ctx, page).await?,
        Commands::Trip { action } => match action {
            TripAction::Start => commands::trip::start(&mut ctx).await?,
            TripAction::Next => commands::trip::next(&mut ctx).await?,
            TripAction::Complete => commands::trip::complete(&mut ctx).await?,
            TripAction::Status => commands::trip::status(&mut ctx).await?,
        },
        Commands::Barcode { action } => match action {
            BarcodeAction::Scan { barcode_id } => {
                commands::barcode::scan(&mut ctx, &barcode_id).await?
            }
            BarcodeAction::Start {
                barcode_id,
                branch_code,
                weight,
                scan,
                cycle_id,
                branch_name,
                address,
                contact,
                latitude,
                longitude,
            } => {
                let request = CycleRequest {
                    cycle_id,
                    branch_name,
                    address,
                    contact,
                    latitude,
                    longitude,
                    ..CycleRequest::new(&barcode_id, &branch_code, weight)
                };
                commands::barcode::start(&mut ctx, request, scan).await?
            }
            BarcodeAction::Update {
                cycle_id,
                status,
                inbound_weight,
            } => commands::barcode::update(&mut ctx, &cycle_id, &status, inbound_weight).await?,
            BarcodeAction::Show { cycle_id } => commands::barcode::show(&mut ctx, &cycle_id).await?,
            BarcodeAction::List { barcode_id } => {
                commands::barcode::list(&mut ctx, &barcode_id).await?
            }
        },
        Commands::Watch => commands::watch::run(ctx).await?,
    }

    Ok(())
}
