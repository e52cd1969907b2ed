use anyhow::Result;
use clap::Parser;
use dotenv::dotenv;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::filter::LevelFilter;

/// Club member portal: balances and court bookings
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Serve plain HTTP on HTTP_PORT without TLS (local development)
    #[arg(long)]
    http_only: bool,

    /// Make an existing member an administrator and exit
    #[arg(long, value_name = "MEMBER_ID")]
    grant_admin: Option<String>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,
}

mod booking;
mod config;
mod error;
mod managers;
mod session;
mod state;
mod web;

use config::ClubConfig;
use managers::{create_shared_booking_manager, create_shared_member_manager};
use state::{
    create_shared_member_store, create_shared_reservation_store, FileMemberStore,
    FileReservationStore,
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let args = Args::parse();

    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let level = LevelFilter::from_str(&args.log_level).unwrap_or(LevelFilter::INFO);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_level(true),
        )
        .with(level)
        .init();

    let data_path = std::env::var("DATA_PATH").unwrap_or_else(|_| "data".to_string());
    let state_path = std::env::var("STATE_PATH").unwrap_or_else(|_| "state".to_string());

    tokio::fs::create_dir_all(&state_path).await?;

    let config_path = format!("{}/club.json", data_path);
    let club_config = if Path::new(&config_path).exists() {
        ClubConfig::load_from_file(&config_path)?
    } else {
        warn!("No club config at {}, using defaults", config_path);
        ClubConfig::default()
    };
    info!(
        "{}: {} courts, {} slots per day",
        club_config.name,
        club_config.courts.len(),
        club_config.slots.len()
    );
    let club_config = Arc::new(club_config);

    info!("Loading member store...");
    let member_store = FileMemberStore::open(&format!("{}/members.json", state_path)).await?;
    info!("Loading reservation store...");
    let reservation_store =
        FileReservationStore::open(&format!("{}/reservations.json", state_path)).await?;

    let members = create_shared_member_manager(
        create_shared_member_store(member_store),
        club_config.initial_balance,
    );
    let bookings = create_shared_booking_manager(
        create_shared_reservation_store(reservation_store),
        club_config.clone(),
    );

    if let Some(member_id) = args.grant_admin {
        let member = members.grant_admin(&member_id).await?;
        info!(
            "{} ({}) is now an administrator; the admin panel appears after their next sign-in",
            member.display_name, member.id
        );
        return Ok(());
    }

    let identity = web::IdentityProvider::from_env().ok_or_else(|| {
        anyhow::anyhow!("OAUTH_CLIENT_ID and OAUTH_CLIENT_SECRET must be set")
    })?;

    let mut web_config = web::WebServerConfig::from_env();
    web_config.http_only = args.http_only;

    let app_state = web::AppState {
        config: club_config,
        identity,
        sessions: session::create_session_store(),
        members,
        bookings,
    };

    info!("Starting web server...");
    web::start_web_server(web_config, app_state).await
}
