use clap::{Parser, Subcommand};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "supervisor-ctl")]
#[command(about = "Management CLI for the engine supervisor", long_about = None)]
struct Cli {
    #[arg(short, long, env = "VC_API_URL", default_value = "http://localhost:8080")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Refresh the subscription now
    Refresh,
    /// Re-check endpoint health now
    Check,
    /// Restart the engine process
    Restart,
    /// Show engine process and selector
    Status,
    /// Dump Prometheus metrics
    Metrics,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    match cli.command {
        Commands::Refresh => {
            let res = client.post(format!("{}/api/sub", base)).send().await?;
            print_accepted(res, "subscription refresh").await?;
        }
        Commands::Check => {
            let res = client.post(format!("{}/api/sub/check", base)).send().await?;
            print_accepted(res, "health check").await?;
        }
        Commands::Restart => {
            let res = client.post(format!("{}/api/core/restart", base)).send().await?;
            print_accepted(res, "engine restart").await?;
        }
        Commands::Status => {
            let res = client.get(format!("{}/api/status", base)).send().await?;
            print_json(res).await?;
        }
        Commands::Metrics => {
            let res = client.get(format!("{}/metrics", base)).send().await?;
            if !report_failure(&res) {
                print!("{}", res.text().await?);
            }
        }
    }

    Ok(())
}

fn report_failure(res: &reqwest::Response) -> bool {
    let status = res.status();
    if status.is_success() {
        return false;
    }
    eprintln!("Error: control surface returned status {}", status);
    true
}

async fn print_accepted(res: reqwest::Response, what: &str) -> Result<(), Box<dyn std::error::Error>> {
    if !report_failure(&res) {
        println!("{} queued", what);
    }
    Ok(())
}

async fn print_json(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    if report_failure(&res) {
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
