use anyhow::Result;
use chrono::{Duration, Local, NaiveDate};
use clap::{Parser, Subcommand};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use tracing::{info, warn};

use routeboard::config::{Config, Secrets};
use routeboard::domain::DeliveredType;
use routeboard::eta::{self, EtaParams};
use routeboard::gemini::GeminiClient;
use routeboard::letters::mailer::Mailer;
use routeboard::letters::store::JournalStore;
use routeboard::letters::LetterService;
use routeboard::logging;
use routeboard::news::{self, cards};
use routeboard::seed::seed_demo_data;
use routeboard::server::{self, AppState};
use routeboard::storage::{InMemoryStorage, Storage};

#[derive(Parser)]
#[command(name = "routeboard")]
#[command(about = "Route operations backend: driver/admin API, daily letters, news cards")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server
    Serve {
        /// Bind address, overrides config.toml
        #[arg(long)]
        bind: Option<String>,
        /// Load the demo fixture data on startup
        #[arg(long)]
        seed: bool,
    },
    /// Seed a route-day and walk it through completion, printing the result
    Demo,
    /// Run the daily letter job
    SendLetters {
        /// Diary date to process (defaults to yesterday)
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Keep running and fire once per day at the configured send time
        #[arg(long)]
        daemon: bool,
    },
    /// Fetch the news feeds and render social cards
    FetchNews {
        /// Comma-separated source keys (techcrunch, theverge, arstechnica)
        #[arg(long)]
        sources: Option<String>,
        /// Output directory, overrides config.toml
        #[arg(long)]
        out: Option<String>,
        /// Skip the generative card copy and use feed text directly
        #[arg(long)]
        no_ai: bool,
    },
}

fn build_letter_service(config: &Config, secrets: &Secrets) -> Result<Arc<LetterService>> {
    let store = Arc::new(JournalStore::open(&config.letters.db_path)?);

    let gemini = secrets
        .gemini_api_key
        .clone()
        .map(|key| GeminiClient::new(key, config.letters.model.clone()));
    if gemini.is_none() {
        warn!("GEMINI_API_KEY not set; letters will use the fallback template");
    }

    let mailer = match (&secrets.smtp_relay, &secrets.smtp_user, &secrets.smtp_password) {
        (Some(relay), Some(user), Some(password)) => Some(Mailer::new(
            relay,
            user,
            password,
            &config.letters.from_name,
            &config.letters.from_email,
        )?),
        _ => {
            warn!("SMTP_RELAY/SMTP_USER/SMTP_PASSWORD not set; letters run in dry-run mode");
            None
        }
    };

    Ok(Arc::new(LetterService::new(
        store,
        gemini,
        mailer,
        config.letters.clone(),
    )))
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    logging::init_logging();

    let cli = Cli::parse();
    let config = Config::load_or_default();
    let secrets = Secrets::from_env();

    match cli.command {
        Commands::Serve { bind, seed } => {
            let storage: Arc<dyn Storage> = Arc::new(InMemoryStorage::new());
            if seed {
                let summary = seed_demo_data(storage.as_ref(), Local::now().date_naive()).await?;
                println!(
                    "🌱 Seeded {} drivers, {} locations, {} route days, {} stops",
                    summary.drivers, summary.locations, summary.route_days, summary.stops
                );
            }

            let letters = build_letter_service(&config, &secrets)?;
            let metrics_handle = PrometheusBuilder::new().install_recorder()?;
            let bind = bind.unwrap_or_else(|| config.server.bind.clone());

            let state = AppState {
                storage,
                letters,
                config: Arc::new(config),
                metrics_handle: Some(metrics_handle),
            };
            println!("🚚 routeboard listening on {bind}");
            server::serve(state, &bind).await?;
        }

        Commands::Demo => {
            let storage = InMemoryStorage::new();
            let date = Local::now().date_naive();
            let summary = seed_demo_data(&storage, date).await?;
            println!(
                "🌱 Seeded {} drivers, {} locations, {} route days, {} stops",
                summary.drivers, summary.locations, summary.route_days, summary.stops
            );

            let route_day = storage
                .get_route_day_for_driver(date, "driver-1")
                .await?
                .expect("demo seed includes driver-1");
            let stops = storage.list_stops_for_route_day(&route_day.id).await?;

            println!("\n📋 Route day {} ({:?} region)", route_day.id, route_day.region);
            let params = EtaParams::default();
            let now = Local::now().naive_local();
            for (arrival, stop) in eta::estimated_arrivals(now, stops.len(), &params).zip(&stops) {
                let late = eta::has_late_risk(arrival, route_day.window_end);
                println!(
                    "   #{} {} → ETA {}{}",
                    stop.sequence,
                    stop.location_id,
                    arrival.format("%H:%M"),
                    if late { "  ⚠️ late risk" } else { "" }
                );
            }

            let first = &stops[0];
            storage
                .complete_stop(&first.id, DeliveredType::Delivered, chrono::Utc::now())
                .await?;
            println!("\n✅ Completed stop {}", first.id);

            let remaining = storage
                .list_stops_for_route_day(&route_day.id)
                .await?
                .into_iter()
                .filter(|s| s.status != routeboard::domain::StopStatus::Completed)
                .count();
            println!("   {} of {} stops remaining", remaining, stops.len());
        }

        Commands::SendLetters { date, daemon } => {
            let letters = build_letter_service(&config, &secrets)?;
            if daemon {
                match letters.verify_mailer().await {
                    Ok(true) => println!("📮 SMTP relay verified"),
                    Ok(false) => println!("📮 SMTP not configured, letters will dry-run"),
                    Err(e) => warn!("SMTP verification failed: {e}"),
                }
                println!("💌 Letter daemon starting...");
                letters.run_daemon().await?;
            } else {
                let target = date.unwrap_or_else(|| Local::now().date_naive() - Duration::days(1));
                println!("💌 Running letter job for {target}...");
                let summary = letters.run_for_date(target).await?;
                println!(
                    "   {} pending, {} sent, {} skipped, {} failed",
                    summary.pending, summary.sent, summary.skipped, summary.failed
                );
            }
        }

        Commands::FetchNews { sources, out, no_ai } => {
            let selected: Vec<_> = match &sources {
                Some(list) => {
                    let mut picked = Vec::new();
                    for key in list.split(',').map(str::trim) {
                        match news::source_by_key(key) {
                            Some(source) => picked.push(source),
                            None => {
                                warn!("Unknown source '{key}', skipping");
                                println!("⚠️  Unknown source: {key}");
                            }
                        }
                    }
                    picked
                }
                None => news::SOURCES.iter().collect(),
            };
            if selected.is_empty() {
                anyhow::bail!("no valid sources selected");
            }

            println!("📰 Fetching {} feeds...", selected.len());
            let items = news::collect_items(&selected, config.news.per_source_limit).await;
            info!("Collected {} items", items.len());

            let gemini = if no_ai {
                None
            } else {
                secrets
                    .gemini_api_key
                    .clone()
                    .map(|key| GeminiClient::new(key, config.letters.model.clone()))
            };
            if gemini.is_none() && !no_ai {
                warn!("GEMINI_API_KEY not set; cards use feed text directly");
            }

            let mut rendered = Vec::with_capacity(items.len());
            for item in &items {
                let copy = cards::card_copy(gemini.as_ref(), item).await;
                rendered.push(cards::NewsCard {
                    item: item.clone(),
                    copy,
                });
            }

            let out_dir = out.unwrap_or_else(|| config.news.output_dir.clone());
            let written = cards::render_cards(&rendered, &out_dir)?;
            println!("🖼️  Wrote {} cards to {out_dir}", written.len());
        }
    }

    Ok(())
}
