//! Statehub CLI
//!
//! Command-line client for a running Statehub inspector:
//! - List namespaces
//! - Dump snapshots and namespace state
//! - Show change history
//! - Generate a default config file

use clap::{Parser, Subcommand};
use serde_json::Value;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "statehub")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Inspect a running Statehub state store")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Inspector server URL
    #[arg(long, default_value = "http://127.0.0.1:8085", global = true)]
    pub inspector_url: String,

    /// Output format (table, json)
    #[arg(short, long, default_value = "table", global = true)]
    pub format: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show inspector status
    Status,

    /// List namespaces
    Namespaces,

    /// Dump the entire state tree
    Snapshot,

    /// Show a namespace, or a value inside it
    Get {
        /// Namespace name
        namespace: String,
        /// Dot path inside the namespace
        path: Option<String>,
    },

    /// Show recorded changes for a namespace (debug mode only)
    History {
        /// Namespace name
        namespace: String,
        /// Most recent N entries
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let json = cli.format == "json";

    match cli.command {
        Commands::Status => {
            let response = client
                .get(format!("{}/health", cli.inspector_url))
                .send()
                .await;

            match response {
                Ok(resp) if resp.status().is_success() => {
                    let health: Value = resp.json().await?;
                    if json {
                        println!("{}", serde_json::to_string_pretty(&health)?);
                    } else {
                        println!("Statehub v{}", health["version"].as_str().unwrap_or("?"));
                        println!();
                        println!("Status:     {}", health["status"].as_str().unwrap_or("unknown"));
                        println!("Namespaces: {}", health["namespaces"].as_u64().unwrap_or(0));
                        println!("Debug:      {}", health["debug"].as_bool().unwrap_or(false));
                        if let Some(uptime) = health["uptime_seconds"].as_u64() {
                            println!("Uptime:     {}", format_duration(uptime));
                        }
                    }
                }
                Ok(resp) => {
                    eprintln!("Inspector returned error: {}", resp.status());
                    std::process::exit(1);
                }
                Err(e) => {
                    eprintln!("Cannot connect to Statehub inspector at {}", cli.inspector_url);
                    eprintln!("Error: {}", e);
                    eprintln!();
                    eprintln!("Make sure the inspector is running:");
                    eprintln!("  cargo run --bin statehub");
                    std::process::exit(1);
                }
            }
        }

        Commands::Namespaces => {
            let body = fetch(&client, &format!("{}/api/v1/namespaces", cli.inspector_url)).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&body)?);
                return Ok(());
            }

            let namespaces = body["namespaces"].as_array().cloned().unwrap_or_default();
            if namespaces.is_empty() {
                println!("No namespaces yet.");
            } else {
                for ns in namespaces {
                    println!("{}", ns.as_str().unwrap_or("-"));
                }
            }
        }

        Commands::Snapshot => {
            let body = fetch(&client, &format!("{}/api/v1/snapshot", cli.inspector_url)).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&body)?);
            } else {
                for (namespace, state) in body.as_object().into_iter().flatten() {
                    println!("[{}]", namespace);
                    print_table(state);
                    println!();
                }
            }
        }

        Commands::Get { namespace, path } => {
            let url = match &path {
                Some(path) => format!(
                    "{}/api/v1/state/{}/{}",
                    cli.inspector_url,
                    urlencoding::encode(&namespace),
                    urlencoding::encode(path)
                ),
                None => format!(
                    "{}/api/v1/state/{}",
                    cli.inspector_url,
                    urlencoding::encode(&namespace)
                ),
            };
            let body = fetch(&client, &url).await?;
            let value = if path.is_some() { &body["value"] } else { &body };

            if json {
                println!("{}", serde_json::to_string_pretty(value)?);
            } else {
                print_table(value);
            }
        }

        Commands::History { namespace, limit } => {
            let mut url = format!(
                "{}/api/v1/history/{}",
                cli.inspector_url,
                urlencoding::encode(&namespace)
            );
            if let Some(limit) = limit {
                url.push_str(&format!("?limit={}", limit));
            }
            let body = fetch(&client, &url).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&body)?);
                return Ok(());
            }

            let entries = body["entries"].as_array().cloned().unwrap_or_default();
            if entries.is_empty() {
                println!("No history for '{}'.", namespace);
                if body["debug"].as_bool() == Some(false) {
                    println!("History is only recorded in debug mode (STATEHUB_DEBUG=true).");
                }
            } else {
                println!("{:<26} {:<8} {}", "Time", "Kind", "Changes");
                println!("{}", "-".repeat(70));
                for entry in entries {
                    println!(
                        "{:<26} {:<8} {}",
                        entry["timestamp"].as_str().unwrap_or("-"),
                        entry["kind"].as_str().unwrap_or("-"),
                        entry["changes"]
                    );
                }
            }
        }

        Commands::Config { output } => {
            let config = statehub::config::generate_default_config();

            match output {
                Some(path) => {
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

/// GET a JSON body, exiting with the server's error message on failure
async fn fetch(client: &reqwest::Client, url: &str) -> Result<Value, Box<dyn std::error::Error>> {
    let response = client.get(url).send().await?;
    let status = response.status();
    let body: Value = response.json().await.unwrap_or(Value::Null);

    if !status.is_success() {
        let message = body["error"]["message"]
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| status.to_string());
        eprintln!("Request failed ({}): {}", status, message);
        std::process::exit(1);
    }
    Ok(body)
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

/// Key/value table for objects, plain JSON for everything else
fn print_table(value: &Value) {
    match value {
        Value::Object(map) if !map.is_empty() => {
            let width = map.keys().map(String::len).max().unwrap_or(0).max(3);
            println!("{:<width$} | {}", "Key", "Value", width = width);
            println!("{}", "-".repeat(width + 30));
            for (key, val) in map {
                println!("{:<width$} | {}", key, val, width = width);
            }
        }
        Value::Object(_) => println!("(empty)"),
        other => println!("{}", other),
    }
}
