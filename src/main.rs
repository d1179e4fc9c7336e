use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use colored::*;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use stridemetrics::export::csv::{export_laps, export_pmc_series, export_weekly, write_weekly};
use stridemetrics::export::ExportFormat;
use stridemetrics::pmc::PmcSummary;
use stridemetrics::{
    init_logging, ActivityAnalyzer, ActivityInput, ActivityReport, AthleteProfile, EngineConfig, FormStatus,
    HrZoneFloors, LogLevel, NativeLap, PmcHistory, TelemetrySample, TrainingLoadEngine,
};

/// stridemetrics - Activity analytics and training load CLI
///
/// Analyzes recorded activities (laps, power, efficiency, heart rate zones)
/// and maintains an athlete's CTL/ATL/TSB history.
#[derive(Parser)]
#[command(name = "stridemetrics")]
#[command(version)]
#[command(about = "Activity analytics and training load CLI", long_about = None)]
struct Cli {
    /// Sets a custom config file
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity of output
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze one recorded activity
    Analyze {
        /// Activity JSON (an activity object or a bare array of samples)
        #[arg(short, long)]
        file: PathBuf,

        /// Device lap summaries JSON
        #[arg(short, long)]
        laps: Option<PathBuf>,

        /// Readiness score for the day (0-100)
        #[arg(short, long)]
        readiness: Option<u8>,

        /// Heart rate zone floors, five ascending values
        #[arg(long, value_delimiter = ',')]
        floors: Option<Vec<u16>>,

        /// Maximum heart rate, used to derive zone floors
        #[arg(long)]
        max_hr: Option<u16>,

        /// Functional Threshold Power in watts
        #[arg(long)]
        ftp: Option<f64>,

        /// Print the full report as JSON
        #[arg(long)]
        json: bool,

        /// Write laps to a CSV file
        #[arg(long, value_name = "FILE")]
        laps_csv: Option<PathBuf>,
    },

    /// Maintain an athlete's training load history
    Load {
        #[command(subcommand)]
        action: LoadCommand,
    },
}

#[derive(Subcommand)]
enum LoadCommand {
    /// Record a day's TSS (rest days in between are filled)
    Advance {
        /// PMC history JSON (created if missing)
        #[arg(long)]
        history: PathBuf,

        /// Day of the activity (YYYY-MM-DD)
        #[arg(short, long)]
        date: NaiveDate,

        /// Training Stress Score
        #[arg(short, long)]
        tss: Decimal,

        /// Athlete ID for a new history
        #[arg(short, long, default_value = "default")]
        athlete: String,

        /// Write the updated history here instead of in place
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Replace a past day's TSS and recompute the following days
    Correct {
        #[arg(long)]
        history: PathBuf,

        #[arg(short, long)]
        date: NaiveDate,

        #[arg(short, long)]
        tss: Decimal,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show current fitness, fatigue and form
    Summary {
        #[arg(long)]
        history: PathBuf,
    },

    /// Show weekly totals
    Weekly {
        #[arg(long)]
        history: PathBuf,

        /// Write weekly totals to a CSV file
        #[arg(long, value_name = "FILE")]
        csv: Option<PathBuf>,
    },

    /// Export the daily series (CSV or JSON, chosen from the output extension)
    Export {
        #[arg(long)]
        history: PathBuf,

        #[arg(short, long)]
        output: PathBuf,

        /// Override the format guessed from the extension
        #[arg(long)]
        format: Option<ExportFormat>,
    },
}

/// Accepted layouts of an activity file
#[derive(Deserialize)]
#[serde(untagged)]
enum ActivityFile {
    Activity(ActivityInput),
    Samples(Vec<TelemetrySample>),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => EngineConfig::load_from_file(path)?,
        None => EngineConfig::load_or_default(),
    };

    if let Some(level) = LogLevel::from_verbosity(cli.verbose) {
        config.logging.level = level;
    }
    init_logging(&config.logging)?;

    match cli.command {
        Commands::Analyze {
            file,
            laps,
            readiness,
            floors,
            max_hr,
            ftp,
            json,
            laps_csv,
        } => {
            let mut input = read_activity(&file)?;
            if let Some(laps_path) = laps {
                input.native_laps = Some(read_json::<Vec<NativeLap>>(&laps_path)?);
            }
            if readiness.is_some() {
                input.readiness = readiness;
            }

            let profile = AthleteProfile {
                max_hr,
                hr_zone_floors: floors.map(parse_floors).transpose()?,
                ftp,
                ..AthleteProfile::new("cli")
            };

            let report = ActivityAnalyzer::with_config(config)
                .analyze(&input, &profile)
                .map_err(|e| anyhow::anyhow!(e.user_message()))
                .with_context(|| format!("Failed to analyze {}", file.display()))?;

            if let Some(path) = laps_csv {
                export_laps(&report.laps, &path)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                eprintln!("{}", format!("Laps written to {}", path.display()).dimmed());
            }

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_report(&report);
            }
        }

        Commands::Load { action } => {
            let engine = TrainingLoadEngine::with_config(config.pmc.clone());
            run_load(action, &engine)?;
        }
    }

    Ok(())
}

fn run_load(action: LoadCommand, engine: &TrainingLoadEngine) -> Result<()> {
    match action {
        LoadCommand::Advance {
            history,
            date,
            tss,
            athlete,
            output,
        } => {
            let mut pmc = if history.exists() {
                read_json::<PmcHistory>(&history)?
            } else {
                PmcHistory::new(athlete)
            };

            pmc.advance(engine, date, tss)
                .map_err(|e| anyhow::anyhow!(e.user_message()))?;
            write_json(output.as_deref().unwrap_or(&history), &pmc)?;

            println!("{}", format!("✓ Recorded {} TSS on {}", tss, date).green());
            if let Some(summary) = pmc.summary(engine) {
                print_summary(&summary);
            }
        }

        LoadCommand::Correct {
            history,
            date,
            tss,
            output,
        } => {
            let mut pmc = read_json::<PmcHistory>(&history)?;
            pmc.correct_day(engine, date, tss)
                .map_err(|e| anyhow::anyhow!(e.user_message()))?;
            write_json(output.as_deref().unwrap_or(&history), &pmc)?;

            println!("{}", format!("✓ Corrected {} to {} TSS", date, tss).green());
            if let Some(summary) = pmc.summary(engine) {
                print_summary(&summary);
            }
        }

        LoadCommand::Summary { history } => {
            let pmc = read_json::<PmcHistory>(&history)?;
            match pmc.summary(engine) {
                Some(summary) => {
                    println!("{} {}", "Athlete:".bold(), pmc.athlete_id());
                    print_summary(&summary);
                }
                None => println!("{}", "No training load recorded yet".yellow()),
            }
        }

        LoadCommand::Weekly { history, csv } => {
            let pmc = read_json::<PmcHistory>(&history)?;
            let weeks = pmc.weekly()?;

            match csv {
                Some(path) => {
                    export_weekly(&weeks, &path)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    println!("{}", format!("✓ {} weeks written to {}", weeks.len(), path.display()).green());
                }
                None => write_weekly(&weeks, std::io::stdout().lock())?,
            }
        }

        LoadCommand::Export { history, output, format } => {
            let pmc = read_json::<PmcHistory>(&history)?;
            let format = match format {
                Some(format) => format,
                None => ExportFormat::from_path(&output)?,
            };
            match format {
                ExportFormat::Csv => export_pmc_series(pmc.points(), &output)
                    .with_context(|| format!("Failed to write {}", output.display()))?,
                ExportFormat::Json => write_json(&output, &pmc.points())?,
            }
            println!(
                "{}",
                format!("✓ {} days exported to {}", pmc.points().len(), output.display()).green()
            );
        }
    }

    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let content = serde_json::to_string_pretty(value)?;
    fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
}

fn read_activity(path: &Path) -> Result<ActivityInput> {
    let activity_id = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("activity")
        .to_string();

    Ok(match read_json::<ActivityFile>(path)? {
        ActivityFile::Activity(input) => input,
        ActivityFile::Samples(samples) => ActivityInput::new(activity_id, samples),
    })
}

fn parse_floors(values: Vec<u16>) -> Result<HrZoneFloors> {
    let Ok(floors) = <[u16; 5]>::try_from(values) else {
        bail!("--floors takes exactly five values");
    };
    HrZoneFloors::new(floors).map_err(|e| anyhow::anyhow!(e.user_message()))
}

fn print_report(report: &ActivityReport) {
    println!("{} {}", "Activity:".bold(), report.activity_id.cyan());
    println!(
        "  {} samples, {:.2} km in {}",
        report.sample_count,
        report.total_distance_m / 1000.0,
        format_duration(report.duration_seconds)
    );
    println!("  Workout type: {}", report.zones.label.to_string().bold());

    if !report.laps.is_empty() {
        println!("\n{}", "Laps".bold());
        for lap in &report.laps {
            let hr = lap.avg_heart_rate.map_or("-".to_string(), |hr| format!("{:.0} bpm", hr));
            println!(
                "  {:>3}  {:>7.0} m  {:>6}/km  {:>8}  +{:.0}/-{:.0} m",
                lap.index,
                lap.distance_meters,
                lap.pace_label(),
                hr,
                lap.elevation_gain,
                lap.elevation_loss
            );
        }
    }

    println!("\n{}", "Heart rate zones".bold());
    for bucket in &report.zones.buckets {
        println!(
            "  {}  {:>5.1}%  {:>6.1} min",
            bucket.label, bucket.percent_of_total, bucket.minutes_in_zone
        );
    }

    println!("\n{}", "Power".bold());
    println!("  Normalized power: {:.0} W", report.power.normalized_power);
    println!("  Work: {:.0} kJ", report.power.work_kj);
    if let Some(intensity) = report.power.intensity_factor {
        println!("  Intensity factor: {:.2}", intensity);
    }

    println!("\n{}", "Efficiency".bold());
    println!("  Efficiency factor: {:.2}", report.efficiency.efficiency_factor);
    let decoupling = format!("{:.1}%", report.efficiency.decoupling_pct);
    if report.efficiency.has_good_aerobic_control() {
        println!("  Decoupling: {}", decoupling.green());
    } else {
        println!("  Decoupling: {}", decoupling.yellow());
    }

    if let Some(tss) = report.tss {
        println!("\n  TSS: {}", tss.round_dp(1));
    }
}

fn print_summary(summary: &PmcSummary) {
    let latest = &summary.latest;
    println!("  {} {}", "As of".dimmed(), latest.date);
    println!("  Fitness (CTL): {:.1}", latest.ctl);
    println!("  Fatigue (ATL): {:.1}", latest.atl);

    let form = format!("{:.1} ({})", latest.tsb, summary.form);
    let form = match summary.form {
        FormStatus::Fresh => form.green(),
        FormStatus::Neutral => form.yellow(),
        FormStatus::Overreaching => form.red(),
    };
    println!("  Form (TSB): {}", form);

    match &summary.acwr {
        Some(acwr) => println!("  ACWR: {:.2} ({:?})", acwr.ratio, acwr.status),
        None => println!("  ACWR: {}", "n/a".dimmed()),
    }
    if let Some(ramp) = summary.ramp_rate_pct {
        let sign = if ramp >= Decimal::ZERO { "+" } else { "" };
        println!("  Week over week: {}{:.1}%", sign, ramp);
    }
    if let Some(trend) = &summary.trend {
        println!(
            "  Weekly trend: {:?} ({:.0} projected vs {:.0} avg over {} weeks)",
            trend.direction, trend.current_projection, trend.trailing_average, trend.weeks_considered
        );
    }
}

fn format_duration(seconds: f64) -> String {
    let total = seconds.max(0.0).round() as u64;
    format!("{}:{:02}:{:02}", total / 3600, (total % 3600) / 60, total % 60)
}
