use std::path::PathBuf;

use anyhow::Context;
use clap::{ArgGroup, Parser, Subcommand};
use tracing::{debug, warn};

mod attendance;
mod config;
mod db;
mod gateway;
mod models;
mod notify;
mod pacing;
mod report;

use crate::attendance::ReportOutcome;
use crate::config::{GatewayConfig, StoreConfig};
use crate::gateway::TwilioGateway;
use crate::models::DeliveryStatus;
use crate::pacing::FixedIntervalPacer;

#[derive(Parser)]
#[command(name = "termwork-attendance")]
#[command(about = "Term-work attendance reports and guardian absentee alerts", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load a demo course with students and lectures
    Seed,
    /// Compute attendance eligibility for a course and write the CSV report
    Report {
        #[arg(long, default_value = "MT101")]
        course: String,
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
        #[arg(long, default_value_t = 5)]
        preview: usize,
        /// Exit with an error when no report could be produced
        #[arg(long)]
        strict: bool,
    },
    /// Send absence alerts to guardians
    #[command(group(
        ArgGroup::new("source")
            .args(["csv", "absentee"])
            .required(true)
            .multiple(false)
    ))]
    Notify {
        #[arg(long)]
        csv: Option<PathBuf>,
        /// NAME=PHONE, repeatable
        #[arg(long, value_parser = notify::parse_absentee)]
        absentee: Vec<models::Absentee>,
        #[arg(long)]
        subject: String,
        /// Date label for the message, defaults to today
        #[arg(long)]
        date: Option<String>,
    },
}

fn init_logging(verbose: u8) {
    let log_level = match verbose {
        0 => "info,sqlx=warn",
        1 => "debug,sqlx=info",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_target(verbose >= 2)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_logging(cli.verbose);
    debug!("started with verbosity level: {}", cli.verbose);

    match cli.command {
        Commands::InitDb => {
            let pool = connect_store().await?;
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let pool = connect_store().await?;
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::Report {
            course,
            out_dir,
            preview,
            strict,
        } => {
            let pool = connect_store().await?;
            let store = db::PgRecordStore::new(pool);
            println!("Generating term-work report for course code: {course}...");

            match attendance::compute_report(&store, &course).await? {
                ReportOutcome::Skipped(reason) => {
                    warn!(code = reason.code(), "report skipped");
                    println!("{}", reason.message());
                    if strict {
                        anyhow::bail!("no report produced ({})", reason.code());
                    }
                }
                ReportOutcome::Generated(report) => {
                    let path = report::write_report(&out_dir, &report)
                        .with_context(|| format!("failed to write report into {}", out_dir.display()))?;
                    println!("Report written to {}.", path.display());
                    println!(
                        "{} ({}): {} lectures, {} eligible, {} defaulters",
                        report.course.course_code,
                        report.course.course_name,
                        report.lectures_total,
                        report.eligible_count(),
                        report.defaulters().count()
                    );
                    print!("{}", report::preview(&report.records, preview));
                }
            }
        }
        Commands::Notify {
            csv,
            absentee,
            subject,
            date,
        } => {
            let absentees = match csv {
                Some(path) => notify::load_absentees(&path)
                    .with_context(|| format!("failed to read absentees from {}", path.display()))?,
                None => absentee,
            };
            let date = date.unwrap_or_else(|| chrono::Local::now().format("%d-%b-%Y").to_string());

            let config = GatewayConfig::from_env()?;
            let gateway = TwilioGateway::new(&config)?;
            let mut pacer = FixedIntervalPacer::new(config.pacing);

            println!("Sending alerts for {} absent students...", absentees.len());
            let outcomes = notify::notify_absentees(
                &gateway,
                &mut pacer,
                &config.sender,
                &absentees,
                &subject,
                &date,
            )
            .await;

            for outcome in &outcomes {
                match &outcome.status {
                    DeliveryStatus::Sent { message_id } => {
                        println!("- sent to {}'s guardian ({message_id})", outcome.student_name)
                    }
                    DeliveryStatus::Failed { error } => {
                        println!(
                            "- FAILED for {} ({}): {error}",
                            outcome.student_name, outcome.guardian_contact
                        )
                    }
                }
            }
            let sent = outcomes.iter().filter(|o| o.is_sent()).count();
            println!("{sent} of {} alerts delivered.", outcomes.len());
        }
    }

    Ok(())
}

async fn connect_store() -> anyhow::Result<sqlx::PgPool> {
    let config = StoreConfig::from_env()?;
    db::connect(&config)
        .await
        .context("failed to connect to Postgres")
}
