pub mod cli;
pub mod consolidation;
pub mod db;
pub mod fares;
pub mod geocode;
pub mod ingest;
pub mod models;
pub mod normalizer;
pub mod pipeline;
pub mod reporting;
pub mod settings;
pub mod utils;

use anyhow::{Context, Result};
use log::{info, warn};
use tokio_util::sync::CancellationToken;

use cli::Args;
use db::{Database, OpenMode};
use fares::{lookup_from_settings, Recommendation};
use geocode::{CachedResolver, HttpGeocoder, RetryingResolver};
use ingest::{IngestSummary, Ingestor, NoopProgress, ProgressBarObserver, ProgressObserver};
use normalizer::Normalizer;
use reporting::{write_report, CostPoint, Report};
use settings::Settings;
use utils::logging::init_logging;

pub async fn run(args: Args) -> Result<()> {
    init_logging(args.verbosity());
    info!("jahreskarte {} starting up...", env!("CARGO_PKG_VERSION"));

    let mut settings = Settings::load(&args.settings)?;
    args.apply_overrides(&mut settings);
    settings.validate()?;
    if args.write_settings {
        settings.persist(&args.settings)?;
        info!("Settings written to {}", args.settings.display());
    }

    let mode = if args.init {
        OpenMode::CreateIfMissing
    } else {
        OpenMode::MustExist
    };
    let db = Database::open(args.store.clone(), mode)?;

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted; stopping after the current journey");
                cancel.cancel();
            }
        });
    }

    let mut ingest_summary = None;
    if !args.inputs.is_empty() {
        let ingest_config = settings.ingest_config();
        let normalizer = Normalizer::new(ingest_config.public_transit_modes.clone());
        let batch = pipeline::read_inputs(&args.inputs, &normalizer)?;

        let geocoder = HttpGeocoder::new(&settings.geocoder)?;
        let resolver =
            CachedResolver::new(RetryingResolver::new(geocoder, settings.retry_policy()));
        let ingestor = Ingestor::new(db.clone(), resolver, ingest_config);

        let observer: Box<dyn ProgressObserver> = if args.no_progress {
            Box::new(NoopProgress)
        } else {
            Box::new(ProgressBarObserver::new())
        };
        let summary = ingestor.ingest(&batch, observer.as_ref(), &cancel).await?;
        print_ingest_summary(&summary);
        if summary.cancelled {
            return Ok(());
        }
        ingest_summary = Some(summary);
    }

    if args.ingest_only {
        return Ok(());
    }

    let periods = if args.periods.is_empty() {
        match pipeline::default_period(&db).await? {
            Some(period) => vec![period],
            None => {
                println!("The journey store holds no complete journeys yet; nothing to compare.");
                return Ok(());
            }
        }
    } else {
        args.periods.clone()
    };

    let lookup = lookup_from_settings(&settings.fares)?;
    let quote = lookup
        .current_fares()
        .await
        .context("Fare lookup failed; the ingested journeys are kept")?;
    let schedule = if args.yes {
        quote
    } else {
        let stdin = std::io::stdin();
        let mut input = stdin.lock();
        let mut output = std::io::stdout();
        cli::confirm_fares(quote, &lookup.describe(), &mut input, &mut output)?
    };

    let mut report = pipeline::build_report(
        &db,
        &periods,
        schedule,
        &settings.consolidation_config(),
        &settings.ingest_config().public_transit_modes,
    )
    .await?;
    report.ingest = ingest_summary;

    print_report(&report, &settings.home_city);
    if let Some(path) = &args.report {
        write_report(path, &report)?;
        info!("Report data written to {}", path.display());
    }
    Ok(())
}

fn print_ingest_summary(summary: &IngestSummary) {
    println!(
        "{} records read ({} malformed, {} not movement records).",
        summary.records_seen, summary.malformed, summary.ignored
    );
    println!(
        "{} new journeys, {} completed, {} already complete{}.",
        summary.inserted,
        summary.completed,
        summary.skipped,
        if summary.conflicts > 0 {
            format!(" ({} conflicting with stored data, stored kept)", summary.conflicts)
        } else {
            String::new()
        }
    );
    if summary.geocode_failures > 0 {
        println!(
            "{} journeys could not be geocoded and will be retried on the next run.",
            summary.geocode_failures
        );
    }
    if summary.cancelled {
        println!("Run interrupted; run again to continue.");
    }
    println!(
        "The journey store now contains {} valid journeys.",
        summary.total_complete
    );
}

fn print_report(report: &Report, home_city: &str) {
    let currency = &report.fares.currency;
    println!(
        "\nFares: {} {currency} per single ride, {} {currency} per year.",
        report.fares.single_ride_price, report.fares.yearly_pass_price
    );
    for point in &report.cost_series {
        print_cost_point(point, currency, home_city);
    }
    if report.cost_series.len() > 1 {
        print_cost_point(&report.combined, currency, home_city);
    }
}

fn print_cost_point(point: &CostPoint, currency: &str, home_city: &str) {
    let span = match (point.start, point.end) {
        (Some(start), Some(end)) => format!("{start} to {end}"),
        _ => "all periods".to_string(),
    };
    println!(
        "\n{}: {} public transit trips within {home_city} ({span}, {} days).",
        point.label, point.qualifying_trips, point.days
    );
    println!(
        "  Single rides: {} {currency}   Yearly pass: {} {currency}",
        point.single_total, point.pass_total
    );
    match point.recommendation {
        Recommendation::YearlyPass => println!(
            "  A yearly pass would have saved {} {currency}.",
            point.saved
        ),
        Recommendation::SingleRides => println!(
            "  No advantage of a yearly pass; it would have cost {} {currency} more.",
            point.saved.abs()
        ),
    }
}
