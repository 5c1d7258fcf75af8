use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "rpc-balancer-cli")]
#[command(about = "Management CLI for a running rpc-balancer", long_about = None)]
struct Cli {
    /// Base URL of the balancer's HTTP server.
    #[arg(short, long, default_value = "http://localhost:9090")]
    url: String,

    /// Admin API key, sent as a Bearer token. Required by `add` and `remove`.
    #[arg(short, long, env = "RPC_BALANCER_API_KEY")]
    key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List backends with their health state
    Backends,
    /// Register a backend
    Add {
        /// Backend address, e.g. 10.0.0.7:50051
        address: String,
    },
    /// Deregister a backend
    Remove { address: String },
    /// Print the metrics exposition
    Metrics,
    /// Check balancer liveness
    Health,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    let mut headers = HeaderMap::new();
    if let Some(key) = &cli.key {
        headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {key}"))?);
    }
    let needs_key = matches!(cli.command, Commands::Add { .. } | Commands::Remove { .. });
    if needs_key && cli.key.is_none() {
        return Err("--key (or RPC_BALANCER_API_KEY) is required for add and remove".into());
    }

    let res = match cli.command {
        Commands::Backends => client.get(format!("{base}/admin/backends")).send().await?,
        Commands::Add { address } => {
            client
                .post(format!("{base}/admin/backends"))
                .headers(headers)
                .json(&json!({ "address": address }))
                .send()
                .await?
        }
        Commands::Remove { address } => {
            client
                .delete(format!("{base}/admin/backends/{address}"))
                .headers(headers)
                .send()
                .await?
        }
        Commands::Metrics => {
            let res = client.get(format!("{base}/metrics")).send().await?;
            let status = res.status();
            let text = res.text().await?;
            if !status.is_success() {
                return Err(format!("metrics endpoint returned {status}: {text}").into());
            }
            print!("{text}");
            return Ok(());
        }
        Commands::Health => client.get(format!("{base}/health")).send().await?,
    };

    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;

    if !status.is_success() {
        return Err(format!("admin API returned {status}: {text}").into());
    }
    if text.is_empty() {
        println!("{status}");
        return Ok(());
    }

    let json: Value = serde_json::from_str(&text)?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
