use std::path::PathBuf;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;

mod db;
mod insights;
mod models;
mod report;

#[derive(Parser)]
#[command(name = "sumry-progress-insights")]
#[command(about = "IEP goal progress insights for SUMRY case-management teams", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Import progress logs from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Compute and print the insight summary
    Insights {
        #[arg(long)]
        student: Option<String>,
        #[arg(long, default_value_t = 10)]
        limit: usize,
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Generate a markdown report
    Report {
        #[arg(long)]
        student: Option<String>,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to a production Postgres instance")?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")?;

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::Import { csv } => {
            let inserted = db::import_csv(&pool, &csv).await?;
            println!("Inserted {inserted} progress logs from {}.", csv.display());
        }
        Commands::Insights {
            student,
            limit,
            json,
        } => {
            let students = db::fetch_students(&pool, student.as_deref()).await?;
            let goals = db::fetch_goals(&pool, student.as_deref()).await?;
            let logs = db::fetch_logs(&pool, student.as_deref()).await?;
            let report = insights::generate_insights(&students, &goals, &logs);

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
                return Ok(());
            }

            print!("{}", report::build_summary(&report, limit));
        }
        Commands::Report { student, out } => {
            let students = db::fetch_students(&pool, student.as_deref()).await?;
            let goals = db::fetch_goals(&pool, student.as_deref()).await?;
            let logs = db::fetch_logs(&pool, student.as_deref()).await?;
            let report = insights::generate_insights(&students, &goals, &logs);
            let markdown = report::build_report(
                student.as_deref(),
                Utc::now().date_naive(),
                &report,
            );
            std::fs::write(&out, markdown)?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}
