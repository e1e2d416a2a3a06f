use clap::{Parser, Subcommand};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "gateway-cli")]
#[command(about = "Management CLI for the API gateway", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8000")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check gateway liveness
    Health,
    /// Probe every upstream dependency
    Dependencies,
    /// Show all circuit breakers
    Circuits,
    /// Show one circuit breaker with recommendations
    Circuit { name: String },
    /// Reset one circuit breaker, or all of them
    Reset { name: Option<String> },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    let res = match cli.command {
        Commands::Health => client.get(format!("{}/health", base)).send().await?,
        Commands::Dependencies => client.get(format!("{}/health/dependencies", base)).send().await?,
        Commands::Circuits => client.get(format!("{}/api/circuit-breakers", base)).send().await?,
        Commands::Circuit { name } => {
            client
                .get(format!("{}/api/circuit-breakers/{}", base, name))
                .send()
                .await?
        }
        Commands::Reset { name: Some(name) } => {
            client
                .post(format!("{}/api/circuit-breakers/{}/reset", base, name))
                .send()
                .await?
        }
        Commands::Reset { name: None } => {
            client
                .post(format!("{}/api/circuit-breakers/reset", base))
                .send()
                .await?
        }
    };

    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;

    let pretty = serde_json::from_str::<Value>(&text)
        .ok()
        .and_then(|json| serde_json::to_string_pretty(&json).ok())
        .unwrap_or(text);

    if status.is_success() {
        println!("{}", pretty);
    } else {
        eprintln!("Error: gateway returned status {}", status);
        eprintln!("{}", pretty);
        std::process::exit(1);
    }
    Ok(())
}
