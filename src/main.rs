mod db;
mod error;
mod fetch;
mod interchange;
mod orchestrator;
mod paginate;
mod parser;
mod reconcile;
mod record;
mod settings;
mod surface;

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, warn};

use db::{DatasetStore, SqliteStore};
use error::ScholarError;
use fetch::HttpSurface;
use orchestrator::{is_profile_address, ScrapeOrchestrator};
use paginate::{CancelFlag, Paginator};
use settings::Settings;
use surface::SnapshotSurface;

const TITLE_WIDTH: usize = 48;
const VENUE_WIDTH: usize = 24;

#[derive(Parser)]
#[command(name = "scholar_scraper", about = "Scholar profile publication scraper")]
struct Cli {
    /// SQLite file holding the dataset (overrides SCHOLAR_DB_PATH)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Max "show more" activations per scan
    #[arg(long, global = true)]
    max_iterations: Option<usize>,

    /// Wait after each activation, in milliseconds
    #[arg(long, global = true)]
    settle_ms: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape a live profile (citations?user=...) and merge it into the dataset
    Scan {
        url: String,
    },
    /// Scrape a saved profile page and merge it into the dataset
    ScanFile {
        path: PathBuf,
        /// Address the page was saved from
        #[arg(long)]
        url: String,
    },
    /// Write the dataset as CSV
    Export {
        #[arg(short, long, default_value = "scholar_export.csv")]
        output: PathBuf,
    },
    /// Merge a CSV file into the dataset
    Import {
        path: PathBuf,
    },
    /// Show dataset statistics
    Stats,
    /// Most cited publications in the dataset
    List {
        /// Filter by profile user id
        #[arg(short, long)]
        profile: Option<String>,
        /// Filter by year
        #[arg(short, long)]
        year: Option<i32>,
        /// Max rows to display
        #[arg(short = 'n', long, default_value = "50")]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let mut settings = Settings::load().context("Failed to load settings")?;
    if let Some(db) = cli.db {
        settings.db_path = db;
    }
    if let Some(n) = cli.max_iterations {
        settings.max_iterations = n;
    }
    if let Some(ms) = cli.settle_ms {
        settings.settle_ms = ms;
    }

    let store = SqliteStore::open(&settings.db_path)
        .with_context(|| format!("Failed to open {:?}", settings.db_path))?;
    let app = ScrapeOrchestrator::new(store);

    let result: Result<(), ScholarError> = match cli.command {
        Commands::Scan { url } => run_scan(&app, &settings, &url).await,
        Commands::ScanFile { path, url } => {
            let html = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {:?}", path))?;
            let mut surface = SnapshotSurface::from_html(&html, &url);
            let paginator = Paginator::new(settings.pagination());
            app.scan(&mut surface, &paginator).await.map(|report| {
                println!("{}", report);
            })
        }
        Commands::Export { output } => app.export().and_then(|csv| {
            std::fs::write(&output, csv)?;
            println!("CSV written to {}.", output.display());
            Ok(())
        }),
        Commands::Import { path } => {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {:?}", path))?;
            app.import(&text).map(|report| println!("{}", report))
        }
        Commands::Stats => app.store().load().map(|snap| {
            let s = db::get_stats(&snap);
            println!("Records:   {}", s.records);
            println!("Profiles:  {}", s.profiles);
            println!("Citations: {}", s.citations);
            match s.years {
                Some((lo, hi)) => println!("Years:     {}-{} ({} undated)", lo, hi, s.undated),
                None => println!("Years:     - ({} undated)", s.undated),
            }
            println!("Version:   {}", s.version);
        }),
        Commands::List { profile, year, limit } => app.store().load().map(|snap| {
            let rows = db::fetch_overview(&snap.dataset, profile.as_deref(), year, limit);
            if rows.is_empty() {
                println!("No publications found.");
                return;
            }

            println!(
                "{:>3} | {:<tw$} | {:<vw$} | {:>4} | {:>6}",
                "#",
                "Title",
                "Venue",
                "Year",
                "Cites",
                tw = TITLE_WIDTH,
                vw = VENUE_WIDTH
            );
            println!("{}", "-".repeat(TITLE_WIDTH + VENUE_WIDTH + 25));
            for (i, r) in rows.iter().enumerate() {
                let title = fit_column(r.paper_title.as_deref().unwrap_or("-"), TITLE_WIDTH);
                let venue = fit_column(r.journal.as_deref().unwrap_or(""), VENUE_WIDTH);
                let year = r.year.map(|y| y.to_string()).unwrap_or_else(|| "-".into());
                println!(
                    "{:>3} | {:<tw$} | {:<vw$} | {:>4} | {:>6}",
                    i + 1,
                    title,
                    venue,
                    year,
                    r.citations,
                    tw = TITLE_WIDTH,
                    vw = VENUE_WIDTH
                );
            }
            println!("\n{} of {} publications", rows.len(), snap.dataset.len());
        }),
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result.map_err(|e| anyhow::anyhow!("{}", e))
}

async fn run_scan<S: DatasetStore>(
    app: &ScrapeOrchestrator<S>,
    settings: &Settings,
    url: &str,
) -> Result<(), ScholarError> {
    if !is_profile_address(url) {
        return Err(ScholarError::NotProfileAddress(url.to_string()));
    }

    let cancel = CancelFlag::default();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, finishing with the rows loaded so far");
            on_ctrl_c.cancel();
        }
    });

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message("Scraping… (auto-loading all pages)");
    pb.enable_steady_tick(Duration::from_millis(120));

    let paginator = Paginator::new(settings.pagination())
        .with_cancel(cancel)
        .with_progress(pb.clone());

    let result = async {
        let mut surface = HttpSurface::open(settings, url).await?;
        app.scan(&mut surface, &paginator).await
    }
    .await;
    pb.finish_and_clear();

    let report = result?;
    debug!("{} show-more activations", report.activations);
    println!("{}", report);
    Ok(())
}

/// Fit `s` into a table column `width` chars wide, marking cut text with `…`.
fn fit_column(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        return s.to_string();
    }
    let mut cut: String = s.chars().take(width.saturating_sub(1)).collect();
    cut.push('…');
    cut
}

fn format_duration(d: Duration) -> String {
    match d.as_secs() {
        s if s < 60 => format!("{:.1}s", d.as_secs_f64()),
        s => format!("{}m {}s", s / 60, s % 60),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_cells_fit_their_column() {
        let title = "A very long publication title that will not fit in the table column";
        let cell = fit_column(title, TITLE_WIDTH);
        assert_eq!(cell.chars().count(), TITLE_WIDTH);
        assert!(cell.ends_with('…'));
        assert_eq!(fit_column("Nature", VENUE_WIDTH), "Nature");
        assert_eq!(fit_column("Élan vital", 5), "Élan…");
    }

    #[test]
    fn durations() {
        assert_eq!(format_duration(Duration::from_millis(2500)), "2.5s");
        assert_eq!(format_duration(Duration::from_secs(3725)), "62m 5s");
    }
}
