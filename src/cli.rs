use std::io::{BufRead, Write};
use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{ArgAction, Parser};

use crate::fares::Period;
use crate::models::{FareSchedule, Money};
use crate::settings::{FareSource, Settings};

#[derive(Parser, Debug)]
#[command(
    name = "jahreskarte",
    version,
    about = "Would a Vienna yearly pass have paid off? Answers it from Google location history.",
    long_about = "Reads Google location-history exports into a resumable journey store, \
                  groups journeys into trips and compares single-ride fares with the \
                  prorated price of the yearly pass for each analysed period.\n\n\
                  Runs are idempotent: feeding the same export twice changes nothing, and \
                  an interrupted run continues where it stopped."
)]
pub struct Args {
    /// Export files (`*.json`) or folders of them; none means analyse the store as is
    pub inputs: Vec<PathBuf>,

    /// Journey store (SQLite)
    #[arg(short, long, default_value = "journeys.sqlite")]
    pub store: PathBuf,

    /// Create the journey store if it does not exist yet
    #[arg(long)]
    pub init: bool,

    /// Settings file (JSON); defaults are used when it is missing
    #[arg(long, default_value = "jahreskarte.json")]
    pub settings: PathBuf,

    /// Save the effective settings (after command-line overrides) to the settings file
    #[arg(long)]
    pub write_settings: bool,

    /// Period to analyse: `2023` or `2023-03-01..2023-08-31`; repeatable.
    /// Defaults to the first..last journey in the store
    #[arg(short, long = "period")]
    pub periods: Vec<Period>,

    /// Longest pause (minutes) between journeys of one trip
    #[arg(long)]
    pub gap_minutes: Option<i64>,

    /// Minimum guess confidence in percent
    #[arg(long)]
    pub threshold: Option<f64>,

    /// City the yearly pass is valid in
    #[arg(long)]
    pub home_city: Option<String>,

    /// Single-ride fare; giving a price switches to configured fares
    #[arg(long)]
    pub single_price: Option<f64>,

    /// Yearly pass price; giving a price switches to configured fares
    #[arg(long)]
    pub yearly_price: Option<f64>,

    /// Accept the quoted fares without asking
    #[arg(short = 'y', long)]
    pub yes: bool,

    /// Write the report data (JSON) to this file
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Stop after ingestion
    #[arg(long)]
    pub ingest_only: bool,

    /// Hide the progress bar
    #[arg(long)]
    pub no_progress: bool,

    /// More log output (repeat for trace)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Less log output (repeat for errors only)
    #[arg(short, long, action = ArgAction::Count, conflicts_with = "verbose")]
    pub quiet: u8,
}

impl Args {
    pub fn verbosity(&self) -> i8 {
        self.verbose.min(8) as i8 - self.quiet.min(8) as i8
    }

    /// Command-line values win over the settings file.
    pub fn apply_overrides(&self, settings: &mut Settings) {
        if let Some(minutes) = self.gap_minutes {
            settings.gap_threshold_minutes = minutes;
        }
        if let Some(threshold) = self.threshold {
            settings.confidence_threshold = threshold;
        }
        if let Some(city) = &self.home_city {
            settings.home_city = city.clone();
        }
        if let Some(price) = self.single_price {
            settings.fares.single_ride_price = price;
            settings.fares.source = FareSource::Configured;
        }
        if let Some(price) = self.yearly_price {
            settings.fares.yearly_pass_price = price;
            settings.fares.source = FareSource::Configured;
        }
    }
}

/// Shows each quoted price and lets the user keep or replace it.
///
/// An empty answer or `y` keeps the price, `n` asks for a new one, and a
/// number is taken as the new price directly.
pub fn confirm_fares<R: BufRead, W: Write>(
    quote: FareSchedule,
    source: &str,
    input: &mut R,
    output: &mut W,
) -> Result<FareSchedule> {
    let single_ride_price = confirm_price(
        "single-ride ticket",
        quote.single_ride_price,
        &quote.currency,
        source,
        input,
        output,
    )?;
    let yearly_pass_price = confirm_price(
        "yearly pass",
        quote.yearly_pass_price,
        &quote.currency,
        source,
        input,
        output,
    )?;
    Ok(FareSchedule {
        single_ride_price,
        yearly_pass_price,
        ..quote
    })
}

fn confirm_price<R: BufRead, W: Write>(
    name: &str,
    quoted: Money,
    currency: &str,
    source: &str,
    input: &mut R,
    output: &mut W,
) -> Result<Money> {
    write!(
        output,
        "Price for the {name} ({source}): {quoted} {currency}. Use it? [Y/n/price] "
    )?;
    output.flush()?;

    let mut asking_for_price = false;
    loop {
        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            bail!("no answer on stdin; pass --yes to accept the quoted fares");
        }
        let answer = line.trim();

        if !asking_for_price {
            match answer.to_ascii_lowercase().as_str() {
                "" | "y" | "yes" => return Ok(quoted),
                "n" | "no" => {
                    asking_for_price = true;
                    write!(output, "Price for the {name} in {currency}: ")?;
                    output.flush()?;
                    continue;
                }
                _ => {}
            }
        }

        match parse_price(answer) {
            Some(price) => {
                writeln!(output, "Using {price} {currency} for the {name}.")?;
                return Ok(price);
            }
            None => {
                write!(output, "Please enter a price like 2.40: ")?;
                output.flush()?;
                asking_for_price = true;
            }
        }
    }
}

/// Accepts `2.40` and the German-style `2,40`.
fn parse_price(value: &str) -> Option<Money> {
    let units: f64 = value.replace(',', ".").parse().ok()?;
    (units.is_finite() && units >= 0.0).then(|| Money::from_units(units))
}
