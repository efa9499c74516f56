//! ssf-sync - command-line front end for the study-spot engine
//!
//! Resolves configuration (CLI → ENV → TOML → defaults), connects to the
//! service and runs one engine operation per invocation.

use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use ssf_common::config::{CliOverrides, ServiceConfig, ServiceConfigResolver};
use ssf_common::FilterCriteria;
use ssf_sync::api::{HoursEntry, SpotDraft};
use ssf_sync::focus::{FixedLocator, Geolocator, NoLocator};
use ssf_sync::reviews::{ReviewsState, SubmitOutcome};
use ssf_sync::scope::ViewScope;
use ssf_sync::SyncEngine;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for ssf-sync
#[derive(Parser, Debug)]
#[command(name = "ssf-sync")]
#[command(about = "Browse, favorite and review study spots")]
#[command(version)]
struct Args {
    /// Service base URL
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Bearer token for authenticated calls
    #[arg(long, global = true)]
    token: Option<String>,

    /// Config file (default: ~/.config/ssf/ssf-sync.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List spots that pass the filter
    Spots {
        /// Case-insensitive match on name, type or note
        #[arg(long, default_value = "")]
        search: String,

        /// Minimum rating (0-5)
        #[arg(long, default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=5))]
        min_rating: u8,

        /// Only spots marked open
        #[arg(long)]
        open_only: bool,
    },

    /// Show a spot with its reviews
    Show { id: String },

    /// List favorite spots
    Favorites,

    /// Add or remove a favorite
    Favorite {
        id: String,

        #[arg(long)]
        remove: bool,
    },

    /// Post a review
    Review {
        id: String,

        #[arg(long, default_value_t = 5)]
        rating: u8,

        #[arg(long, default_value = "")]
        comment: String,
    },

    /// Fly to the device location and list nearby visible spots
    Locate,

    /// Create a new spot
    AddSpot {
        #[arg(long)]
        name: String,

        #[arg(long)]
        address: String,

        #[arg(long = "type")]
        spot_type: Option<String>,

        #[arg(long)]
        description: Option<String>,

        #[arg(long)]
        note: Option<String>,

        #[arg(long, allow_hyphen_values = true)]
        latitude: Option<f64>,

        #[arg(long, allow_hyphen_values = true)]
        longitude: Option<f64>,

        #[arg(long)]
        image_url: Option<String>,

        /// Wi-Fi available
        #[arg(long)]
        wifi: bool,

        /// Power outlets available
        #[arg(long)]
        outlets: bool,

        /// Opening hours as DAY=HH:MM-HH:MM (0 = Sunday), repeatable
        #[arg(long = "hours", value_parser = parse_hours)]
        hours: Vec<HoursEntry>,
    },
}

fn parse_hours(raw: &str) -> std::result::Result<HoursEntry, String> {
    let (day, range) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected DAY=HH:MM-HH:MM, got {:?}", raw))?;
    let day: u8 = day
        .trim()
        .parse()
        .map_err(|_| format!("invalid day {:?}", day))?;
    let (open, close) = range
        .split_once('-')
        .ok_or_else(|| format!("expected HH:MM-HH:MM, got {:?}", range))?;
    Ok(HoursEntry::new(day, open.trim(), close.trim()))
}

fn init_tracing(config: &ServiceConfig) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut resolver = ServiceConfigResolver::new("ssf-sync");
    if let Some(path) = &args.config {
        resolver = resolver.with_config_file(path);
    }
    let config = resolver.resolve(&CliOverrides {
        base_url: args.base_url.clone(),
        auth_token: args.token.clone(),
    });
    init_tracing(&config);
    debug!(base_url = %config.base_url, "Configuration resolved");

    let engine = SyncEngine::connect(&config).context("Failed to create service client")?;

    match args.command {
        Command::Spots {
            search,
            min_rating,
            open_only,
        } => {
            let criteria = FilterCriteria::new(search, min_rating, open_only);
            list_spots(&engine, criteria, args.json).await
        }
        Command::Show { id } => show_spot(&engine, &id, args.json).await,
        Command::Favorites => list_favorites(&engine, args.json).await,
        Command::Favorite { id, remove } => set_favorite(&engine, &id, !remove).await,
        Command::Review {
            id,
            rating,
            comment,
        } => post_review(&engine, &id, rating, comment).await,
        Command::Locate => locate(&engine, &config, args.json).await,
        Command::AddSpot {
            name,
            address,
            spot_type,
            description,
            note,
            latitude,
            longitude,
            image_url,
            wifi,
            outlets,
            hours,
        } => {
            let draft = SpotDraft {
                name,
                spot_type,
                address,
                description,
                note,
                latitude,
                longitude,
                image_url,
                has_wifi: wifi,
                has_outlets: outlets,
                hours,
            };
            let spot = engine.add_spot(&draft).await.context("Failed to create spot")?;
            println!("Created spot {} ({})", spot.id, spot.name);
            Ok(())
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn list_spots(engine: &SyncEngine, criteria: FilterCriteria, json: bool) -> Result<()> {
    let directory = engine.open_directory();
    directory
        .load(&engine.client)
        .await
        .context("Could not load study spots")?;
    directory.set_criteria(criteria);

    let rows = directory.rows();
    if json {
        return print_json(&rows);
    }
    if rows.is_empty() {
        println!("No study spots match your filters.");
    }
    for row in rows {
        println!(
            "{:>6}  {:<32} {:<12} {} {:>3}  {}",
            row.id, row.name, row.spot_type, row.rating_text, row.open_label, row.hours_summary
        );
    }
    Ok(())
}

async fn show_spot(engine: &SyncEngine, id: &str, json: bool) -> Result<()> {
    let view = engine.open_detail(id)?;
    view.load(&engine.client).await;

    if json {
        return print_json(&serde_json::json!({
            "spot": view.state(),
            "favorite": view.favorite_status(),
            "reviews": view.reviews(),
        }));
    }

    let spot = view
        .spot()
        .ok_or_else(|| anyhow!("spot {} did not load", view.spot_id()))?;
    if let ssf_sync::detail::DetailState::Ready {
        warning: Some(warning),
        ..
    } = view.state()
    {
        println!("! {}", warning);
    }
    let stars = spot.stars();
    println!("{} ({})", spot.name, spot.spot_type);
    println!(
        "  {}{}{} {:.1}",
        "★".repeat(usize::from(stars.full)),
        if stars.half { "½" } else { "" },
        "☆".repeat(usize::from(stars.empty)),
        spot.rating
    );
    if let Some(address) = &spot.address {
        println!("  {}", address);
    }
    println!("  Hours: {} ({})", spot.hours_text(), spot.is_open.label());
    println!(
        "  {} · {}",
        if spot.has_wifi { "Wi-Fi available" } else { "Wi-Fi not listed" },
        if spot.has_outlets { "Outlets available" } else { "Outlets not listed" }
    );
    if !spot.description.is_empty() {
        println!("  {}", spot.description);
    }
    if view.favorite_status().favorite {
        println!("  In your favorites");
    }

    match view.reviews() {
        ReviewsState::Loaded { reviews } if reviews.is_empty() => println!("No reviews yet."),
        ReviewsState::Loaded { reviews } => {
            for review in reviews {
                println!(
                    "- {}/5 {}: {}",
                    review.rating,
                    review.author.as_deref().unwrap_or("Anonymous"),
                    review.comment
                );
            }
        }
        ReviewsState::Failed { message } => println!("Reviews unavailable: {}", message),
        ReviewsState::Loading => {}
    }
    view.teardown();
    Ok(())
}

async fn list_favorites(engine: &SyncEngine, json: bool) -> Result<()> {
    let list = engine
        .favorites_page()
        .await
        .context("Could not load favorites")?;
    if json {
        return print_json(&list.items);
    }
    if list.items.is_empty() {
        println!("No favorites yet.");
    }
    for spot in list.items {
        println!("{:>6}  {}  {:.1}", spot.id, spot.name, spot.rating);
    }
    Ok(())
}

async fn set_favorite(engine: &SyncEngine, id: &str, favorite: bool) -> Result<()> {
    let view = engine.open_detail(id)?;
    let scope = ViewScope::mount("favorite");
    let current = engine
        .favorites
        .refresh_membership(&engine.client, view.spot_id(), &scope)
        .await;
    if current == favorite {
        info!(spot_id = %view.spot_id(), favorite, "Membership already as requested");
    } else {
        view.toggle_favorite(&engine.client)
            .await
            .context("Favorite update failed")?;
    }
    println!(
        "Spot {} {} your favorites",
        view.spot_id(),
        if favorite { "is in" } else { "is not in" }
    );
    Ok(())
}

async fn post_review(engine: &SyncEngine, id: &str, rating: u8, comment: String) -> Result<()> {
    let view = engine.open_detail(id)?;
    view.composer().set_rating(rating);
    view.composer().set_comment(comment);

    match view
        .submit_review(&engine.client)
        .await
        .context("Review submission failed")?
    {
        SubmitOutcome::Prepended { review } => println!("Review {} posted", review.id),
        SubmitOutcome::Refetched { count } => {
            println!("Review posted; spot now has {} reviews", count)
        }
        SubmitOutcome::AcceptedStale { message } => {
            println!("Review posted (could not refresh reviews: {})", message)
        }
        SubmitOutcome::Discarded => {}
    }
    Ok(())
}

async fn locate(engine: &SyncEngine, config: &ServiceConfig, json: bool) -> Result<()> {
    let locator: Box<dyn Geolocator> = match config.default_location {
        Some(position) => Box::new(FixedLocator(position)),
        None => Box::new(NoLocator),
    };

    let directory = engine.open_directory();
    directory
        .load(&engine.client)
        .await
        .context("Could not load study spots")?;
    let position = directory
        .locate(locator.as_ref())
        .await?
        .ok_or_else(|| anyhow!("view closed before the location arrived"))?;
    let focus = directory.focus().take_focus();

    if json {
        return print_json(&serde_json::json!({
            "position": position,
            "focus": focus,
            "markers": directory.markers(),
        }));
    }
    println!(
        "You are here: {:.5}, {:.5}",
        position.latitude, position.longitude
    );
    if let Some(focus) = focus {
        println!("Map centred at zoom {}", focus.zoom);
    }
    println!("{} spots on the map", directory.markers().len());
    Ok(())
}
