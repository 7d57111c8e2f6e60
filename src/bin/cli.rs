//! glycotrack CLI
//!
//! Command-line client for the glycotrack API:
//! - Manage patients
//! - Log and import glucose readings
//! - Daily metrics, patient analysis and forecasts
//! - Food search and carbohydrate totals

use chrono::{DateTime, Duration, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use glycotrack::analytics::GlucoseUnit;
use glycotrack::import::ReadingCsvImporter;
use serde_json::{json, Value};
use std::path::PathBuf;

/// Readings per bulk upload request
const IMPORT_BATCH: usize = 1000;

#[derive(Parser)]
#[command(name = "glycotrack")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Glucose analytics for type 1 diabetes")]
#[command(long_about = "glycotrack computes daily glycemic metrics, forecast alerts and patient clusters.\nThis client talks to a running glycotrack API server.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// API server URL
    #[arg(long, default_value = "http://localhost:8000", global = true)]
    pub api_url: String,

    /// Output format (table, json)
    #[arg(short, long, default_value = "table", global = true)]
    pub format: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage patients
    Patient {
        #[command(subcommand)]
        action: PatientCommand,
    },

    /// Log a glucose reading
    Log {
        /// Patient ID
        patient: String,
        /// Glucose value
        value: f64,
        /// Unit (mg/dL or mmol/L)
        #[arg(short, long, default_value = "mg/dL")]
        unit: String,
        /// Timestamp (default: now). Supports: "now", ISO 8601, Unix timestamp
        #[arg(short, long)]
        time: Option<String>,
    },

    /// Import readings from CSV
    Import {
        /// Patient ID
        patient: String,
        /// Path to CSV file
        path: PathBuf,
        /// Unit of the glucose column (mg/dL or mmol/L)
        #[arg(short, long, default_value = "mg/dL")]
        unit: String,
        /// Timestamp column (0-indexed)
        #[arg(long, default_value = "0")]
        timestamp_col: usize,
        /// Glucose column (0-indexed)
        #[arg(long, default_value = "1")]
        value_col: usize,
        /// Timestamp format (strftime format), tried before the built-in ones
        #[arg(long)]
        timestamp_format: Option<String>,
        /// Pick columns from the header names
        #[arg(long)]
        detect: bool,
        /// Dry run (don't actually import)
        #[arg(long)]
        dry_run: bool,
    },

    /// Show daily metrics
    Metrics {
        /// Patient ID
        patient: String,
        /// Day (YYYY-MM-DD, default: today)
        #[arg(short, long)]
        date: Option<NaiveDate>,
        /// Recompute from readings even if stored
        #[arg(long)]
        refresh: bool,
    },

    /// Analyze a patient: cluster, trend and recommendations
    Analyze {
        /// Patient ID
        patient: String,
        /// Days to analyze (7-30)
        #[arg(short, long, default_value = "30")]
        days: u32,
    },

    /// Run a forecast from a JSON request file
    Forecast {
        /// File with {"history": [...], "actions": [...], "steps": N}
        path: PathBuf,
    },

    /// Search the food catalog
    Foods {
        #[command(subcommand)]
        action: FoodsCommand,
    },

    /// Carbohydrate total for foods given as category:id[:servings]
    Carbs {
        items: Vec<String>,
    },

    /// Show system status
    Status,

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// List the config file search paths instead
        #[arg(long)]
        paths: bool,
    },
}

#[derive(Subcommand)]
pub enum PatientCommand {
    /// Register a patient
    Add {
        id: String,
        name: String,
        age: u8,
        /// Diagnosis date (YYYY-MM-DD)
        diagnosis_date: NaiveDate,
        /// "Type 1" or "Type 2"
        #[arg(long, default_value = "Type 1")]
        diabetes_type: String,
    },
    /// List patients
    List,
    /// Show one patient
    Show { id: String },
    /// Delete a patient and all their data
    Delete { id: String },
}

#[derive(Subcommand)]
pub enum FoodsCommand {
    /// Search foods by name
    Search {
        term: String,
        #[arg(short, long)]
        category: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let api = |path: &str| format!("{}/api/v1{}", cli.api_url.trim_end_matches('/'), path);

    match cli.command {
        Commands::Patient { action } => match action {
            PatientCommand::Add {
                id,
                name,
                age,
                diagnosis_date,
                diabetes_type,
            } => {
                let Some(diabetes_type) = glycotrack::store::DiabetesType::parse(&diabetes_type)
                else {
                    eprintln!("Unknown diabetes type: {}", diabetes_type);
                    std::process::exit(1);
                };

                let body = json!({
                    "id": id,
                    "name": name,
                    "age": age,
                    "diabetes_type": diabetes_type,
                    "diagnosis_date": diagnosis_date,
                });
                let response = client.post(api("/patients")).json(&body).send().await?;
                let patient = expect_ok(response, "Create patient").await?;
                println!("Registered patient {}", patient["id"].as_str().unwrap_or("-"));
            }
            PatientCommand::List => {
                let response = client.get(api("/patients")).send().await?;
                let data = expect_ok(response, "List patients").await?;

                if cli.format == "json" {
                    println!("{}", serde_json::to_string_pretty(&data)?);
                } else {
                    let patients = data["patients"].as_array().cloned().unwrap_or_default();
                    if patients.is_empty() {
                        println!("No patients registered yet.");
                        println!();
                        println!("Register one with:");
                        println!("  glycotrack patient add P001 \"Ana\" 29 2015-06-01");
                    } else {
                        println!("{:<12} {:<20} {:<5} {:<8} {}", "ID", "Name", "Age", "Type", "Cluster");
                        println!("{}", "-".repeat(60));
                        for p in patients {
                            println!(
                                "{:<12} {:<20} {:<5} {:<8} {}",
                                p["id"].as_str().unwrap_or("-"),
                                p["name"].as_str().unwrap_or("-"),
                                p["age"].as_u64().unwrap_or(0),
                                p["diabetes_type"].as_str().unwrap_or("-"),
                                p["current_cluster"]
                                    .as_u64()
                                    .map(|c| c.to_string())
                                    .unwrap_or_else(|| "-".to_string())
                            );
                        }
                    }
                }
            }
            PatientCommand::Show { id } => {
                let response = client
                    .get(api(&format!("/patients/{}", urlencoding::encode(&id))))
                    .send()
                    .await?;
                let patient = expect_ok(response, "Get patient").await?;
                println!("{}", serde_json::to_string_pretty(&patient)?);
            }
            PatientCommand::Delete { id } => {
                let response = client
                    .delete(api(&format!("/patients/{}", urlencoding::encode(&id))))
                    .send()
                    .await?;
                expect_ok(response, "Delete patient").await?;
                println!("Deleted patient {}", id);
            }
        },

        Commands::Log {
            patient,
            value,
            unit,
            time,
        } => {
            let timestamp = parse_time(time.as_deref());
            let unit = parse_unit(&unit);

            let body = json!({
                "value": value,
                "unit": unit.label(),
                "timestamp": timestamp,
            });

            let response = client
                .post(api(&format!("/patients/{}/readings", urlencoding::encode(&patient))))
                .json(&body)
                .send()
                .await?;
            let reading = expect_ok(response, "Log reading").await?;
            let stored = reading["value"].as_f64().unwrap_or(value);
            println!(
                "Logged {} for {} at {}",
                format_glucose(stored, unit),
                patient,
                timestamp.format("%Y-%m-%dT%H:%M:%SZ")
            );
        }

        Commands::Import {
            patient,
            path,
            unit,
            timestamp_col,
            value_col,
            timestamp_format,
            detect,
            dry_run,
        } => {
            if !path.exists() {
                eprintln!("File not found: {:?}", path);
                std::process::exit(1);
            }

            let mut importer = ReadingCsvImporter::new(patient.as_str())
                .with_unit(parse_unit(&unit))
                .with_timestamp_column(timestamp_col)
                .with_value_column(value_col);
            if let Some(format) = &timestamp_format {
                importer = importer.with_timestamp_format(format);
            }
            if detect {
                importer = importer.detect_columns();
            }

            let result = importer.import(&path)?;

            println!("Import results:");
            println!("  Rows processed: {}", result.rows_processed);
            println!("  Rows failed: {}", result.rows_failed);
            if let (Some(first), Some(last)) = (result.readings.first(), result.readings.last()) {
                println!(
                    "  Range: {} to {}",
                    first.timestamp.format("%Y-%m-%d %H:%M"),
                    last.timestamp.format("%Y-%m-%d %H:%M")
                );
            }

            if !result.errors.is_empty() {
                println!();
                println!("Errors (first 10):");
                for error in result.errors.iter().take(10) {
                    println!("  {}", error);
                }
            }

            if dry_run {
                println!();
                println!("(Dry run - no data was imported)");
            } else if !result.readings.is_empty() {
                println!();
                println!("Importing readings...");

                let url = api(&format!("/patients/{}/readings/bulk", urlencoding::encode(&patient)));
                let mut imported = 0;
                for chunk in result.readings.chunks(IMPORT_BATCH) {
                    // Values are already converted to mg/dL
                    let readings: Vec<Value> = chunk
                        .iter()
                        .map(|r| json!({ "timestamp": r.timestamp, "value": r.value }))
                        .collect();
                    let response = client
                        .post(&url)
                        .json(&json!({ "readings": readings }))
                        .send()
                        .await?;
                    let data = expect_ok(response, "Import").await?;
                    imported += data["inserted"].as_u64().unwrap_or(0);
                }

                println!("  Imported: {}", imported);
            }
        }

        Commands::Metrics {
            patient,
            date,
            refresh,
        } => {
            let date = date.unwrap_or_else(|| Utc::now().date_naive());
            let response = client
                .get(api(&format!(
                    "/patients/{}/metrics/daily?date={}&refresh={}",
                    urlencoding::encode(&patient),
                    date,
                    refresh
                )))
                .send()
                .await?;
            let data = expect_ok(response, "Daily metrics").await?;

            if cli.format == "json" {
                println!("{}", serde_json::to_string_pretty(&data)?);
            } else {
                let m = &data["metrics"];
                println!("Daily metrics for {} on {} ({})", patient, date, data["source"].as_str().unwrap_or("-"));
                println!();
                for (label, key, unit) in [
                    ("Mean", "mean", "mg/dL"),
                    ("Median", "median", "mg/dL"),
                    ("Std dev", "std", "mg/dL"),
                    ("CV", "cv", "%"),
                    ("Time in range", "time_in_range", "%"),
                    ("Time below range", "time_below_range", "%"),
                    ("Time above range", "time_above_range", "%"),
                    ("GMI", "gmi", "%"),
                ] {
                    println!("  {:<18} {:>8} {}", label, fmt_num(&m[key]), unit);
                }
                println!("  {:<18} {:>8}", "Readings", m["reading_count"].as_u64().unwrap_or(0));
            }
        }

        Commands::Analyze { patient, days } => {
            let response = client
                .get(api(&format!(
                    "/patients/{}/analysis?days={}",
                    urlencoding::encode(&patient),
                    days
                )))
                .send()
                .await?;
            let data = expect_ok(response, "Analysis").await?;

            if cli.format == "json" {
                println!("{}", serde_json::to_string_pretty(&data)?);
            } else {
                let cluster = &data["cluster"];
                println!("Patient {} ({} days analyzed)", patient, data["days_analyzed"]);
                println!();
                println!(
                    "Cluster:    {} - {} (confidence {})",
                    cluster["cluster_id"],
                    cluster["cluster_name"].as_str().unwrap_or("-"),
                    fmt_num(&cluster["confidence_score"])
                );
                println!("Trend:      {}", data["trend"].as_str().unwrap_or("-"));
                println!("Risk score: {}", fmt_num(&data["risk_score"]));

                if let Some(recs) = data["recommendations"].as_array() {
                    println!();
                    println!("Recommendations:");
                    for rec in recs {
                        println!(
                            "  [{}] {}: {}",
                            rec["level"].as_str().unwrap_or("-"),
                            rec["title"].as_str().unwrap_or("-"),
                            rec["description"].as_str().unwrap_or("-")
                        );
                    }
                }
            }
        }

        Commands::Forecast { path } => {
            let content = std::fs::read_to_string(&path)?;
            let request: Value = serde_json::from_str(&content)?;

            let response = client.post(api("/forecast")).json(&request).send().await?;
            let data = expect_ok(response, "Forecast").await?;

            if cli.format == "json" {
                println!("{}", serde_json::to_string_pretty(&data)?);
            } else {
                let summary = &data["summary"];
                println!(
                    "Current {} -> final {} mg/dL ({}), risk {}",
                    fmt_num(&summary["current"]),
                    fmt_num(&summary["final"]),
                    summary["trend"].as_str().unwrap_or("-"),
                    summary["risk_level"].as_str().unwrap_or("-")
                );
                println!("Time in range: {}%", fmt_num(&summary["time_in_range"]));

                let alerts = data["alerts"].as_array().cloned().unwrap_or_default();
                println!();
                if alerts.is_empty() {
                    println!("No alerts");
                } else {
                    println!("{:<10} {:<24} {:<9} {}", "When", "Category", "Severity", "Glucose");
                    println!("{}", "-".repeat(55));
                    for alert in alerts {
                        println!(
                            "{:<10} {:<24} {:<9} {}",
                            alert["offset_label"].as_str().unwrap_or("-"),
                            alert["category"].as_str().unwrap_or("-"),
                            alert["severity"].as_str().unwrap_or("-"),
                            fmt_num(&alert["glucose_value"])
                        );
                    }
                }
            }
        }

        Commands::Foods { action } => match action {
            FoodsCommand::Search { term, category } => {
                let mut url = api(&format!("/foods/search?q={}", urlencoding::encode(&term)));
                if let Some(category) = &category {
                    url.push_str(&format!("&category={}", urlencoding::encode(category)));
                }
                let response = client.get(&url).send().await?;
                let data = expect_ok(response, "Food search").await?;

                if cli.format == "json" {
                    println!("{}", serde_json::to_string_pretty(&data)?);
                } else {
                    let foods = data["foods"].as_array().cloned().unwrap_or_default();
                    if foods.is_empty() {
                        println!("No foods match '{}'", term);
                    }
                    for food in foods {
                        println!(
                            "{:<20} {:<4} {:<28} {} {} = {} g carbs",
                            food["category"].as_str().unwrap_or("-"),
                            food["id"],
                            food["name"].as_str().unwrap_or("-"),
                            fmt_num(&food["suggested_amount"]),
                            food["unit"].as_str().unwrap_or(""),
                            fmt_num(&food["carbohydrates_g"])
                        );
                    }
                }
            }
        },

        Commands::Carbs { items } => {
            let mut selections = Vec::with_capacity(items.len());
            for item in &items {
                match parse_selection(item) {
                    Some(selection) => selections.push(selection),
                    None => {
                        eprintln!("Invalid item '{}'. Use category:id or category:id:servings", item);
                        std::process::exit(1);
                    }
                }
            }

            let response = client
                .post(api("/foods/carbs"))
                .json(&json!({ "items": selections }))
                .send()
                .await?;
            let data = expect_ok(response, "Carbohydrate total").await?;

            if cli.format == "json" {
                println!("{}", serde_json::to_string_pretty(&data)?);
            } else {
                for line in data["items"].as_array().cloned().unwrap_or_default() {
                    println!(
                        "  {:<28} x{:<5} {:>7} g",
                        line["name"].as_str().unwrap_or("-"),
                        fmt_num(&line["servings"]),
                        fmt_num(&line["carbohydrates_g"])
                    );
                }
                println!("Total carbohydrates: {} g", fmt_num(&data["total_carbohydrates_g"]));
            }
        }

        Commands::Status => {
            let response = client
                .get(format!("{}/health", cli.api_url.trim_end_matches('/')))
                .send()
                .await;

            match response {
                Ok(resp) if resp.status().is_success() => {
                    let health: Value = resp.json().await?;

                    println!("glycotrack v{}", env!("CARGO_PKG_VERSION"));
                    println!();
                    println!("API Status: {}", health["status"].as_str().unwrap_or("unknown"));
                    println!("  Store:      {}", health["store"].as_str().unwrap_or("-"));
                    println!("  Forecaster: {}", health["forecaster"].as_str().unwrap_or("-"));
                    println!("  Classifier: {}", health["classifier"].as_str().unwrap_or("-"));
                    println!("  Chat:       {}", health["chat"].as_str().unwrap_or("-"));
                    println!("  Scheduler:  {}", health["scheduler"].as_str().unwrap_or("-"));

                    if let Some(uptime) = health["uptime_seconds"].as_u64() {
                        println!();
                        println!("Uptime: {}", format_duration(uptime));
                    }
                }
                Ok(resp) => {
                    eprintln!("API returned error: {}", resp.status());
                    std::process::exit(1);
                }
                Err(e) => {
                    eprintln!("Cannot connect to glycotrack API at {}", cli.api_url);
                    eprintln!("Error: {}", e);
                    eprintln!();
                    eprintln!("Make sure the glycotrack API server is running:");
                    eprintln!("  cargo run --bin glycotrack-api");
                    std::process::exit(1);
                }
            }
        }

        Commands::Config { output, paths } => {
            if paths {
                for path in glycotrack::config::Config::search_paths() {
                    let marker = if path.exists() { " (found)" } else { "" };
                    println!("{}{}", path.display(), marker);
                }
                return Ok(());
            }

            let config = glycotrack::config::generate_default_config();

            match output {
                Some(path) => {
                    // Create parent directory if needed
                    if let Some(parent) = path.parent() {
                        std::fs::create_dir_all(parent)?;
                    }
                    std::fs::write(&path, &config)?;
                    println!("Config written to {:?}", path);
                }
                None => {
                    print!("{}", config);
                }
            }
        }
    }

    Ok(())
}

/// Return the JSON body of a successful response, or exit with the API error
async fn expect_ok(response: reqwest::Response, action: &str) -> Result<Value, reqwest::Error> {
    if response.status().is_success() {
        return response.json().await;
    }

    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<Value>(&text)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or(text);
    eprintln!("{} failed ({}): {}", action, status, message);
    std::process::exit(1);
}

fn parse_unit(unit: &str) -> GlucoseUnit {
    GlucoseUnit::parse(unit).unwrap_or_else(|| {
        eprintln!("Unknown unit: {}. Use mg/dL or mmol/L", unit);
        std::process::exit(1);
    })
}

/// A stored mg/dL value, echoed in the unit the user entered
fn format_glucose(mg_dl: f64, unit: GlucoseUnit) -> String {
    match unit {
        GlucoseUnit::MgDl => format!("{:.0} mg/dL", mg_dl),
        GlucoseUnit::MmolL => format!("{:.0} mg/dL ({:.1} mmol/L)", mg_dl, unit.from_mg_dl(mg_dl)),
    }
}

fn parse_time(time: Option<&str>) -> DateTime<Utc> {
    match time {
        None | Some("now") => Utc::now(),
        Some(s) => {
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                dt.with_timezone(&Utc)
            } else if let Some(dt) = s.parse::<i64>().ok().and_then(DateTime::from_timestamp_millis) {
                dt
            } else if let Some(minutes) = s.strip_suffix("m ago").and_then(|m| m.trim().parse().ok()) {
                Utc::now() - Duration::minutes(minutes)
            } else {
                eprintln!("Invalid timestamp format: {}", s);
                std::process::exit(1);
            }
        }
    }
}

/// "frutas:2" or "frutas:2:0.5"
fn parse_selection(item: &str) -> Option<Value> {
    let mut parts = item.split(':');
    let category = parts.next()?.trim();
    let id: i64 = parts.next()?.trim().parse().ok()?;
    let servings: f64 = match parts.next() {
        Some(s) => s.trim().parse().ok()?,
        None => 1.0,
    };
    if category.is_empty() || parts.next().is_some() {
        return None;
    }
    Some(json!({ "category": category, "id": id, "servings": servings }))
}

fn fmt_num(value: &Value) -> String {
    value
        .as_f64()
        .map(|v| format!("{:.1}", v))
        .unwrap_or_else(|| "-".to_string())
}

fn format_duration(seconds: u64) -> String {
    if seconds < 60 {
        format!("{}s", seconds)
    } else if seconds < 3600 {
        format!("{}m {}s", seconds / 60, seconds % 60)
    } else if seconds < 86400 {
        format!("{}h {}m", seconds / 3600, (seconds % 3600) / 60)
    } else {
        format!("{}d {}h", seconds / 86400, (seconds % 86400) / 3600)
    }
}
