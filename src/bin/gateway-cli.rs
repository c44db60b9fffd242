use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "gateway-cli")]
#[command(about = "Management CLI for the BFF gateway", long_about = None)]
struct Cli {
    /// Admin API base URL
    #[arg(short, long, env = "BFF_GATEWAY_ADMIN_URL", default_value = "http://localhost:8081")]
    url: String,

    /// Admin API key
    #[arg(short, long, env = "BFF_GATEWAY_ADMIN_KEY")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check gateway status
    Status,
    /// List the compiled route table
    Routes,
    /// Show cache statistics
    Cache,
    /// Purge every cached response carrying one of the tags
    Invalidate {
        /// Tag to invalidate (repeatable)
        #[arg(short, long = "tag", required = true)]
        tags: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let base = cli.url.trim_end_matches('/');

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
    );
    let client = reqwest::Client::builder().default_headers(headers).build()?;

    let request = match cli.command {
        Commands::Status => client.get(format!("{base}/admin/status")),
        Commands::Routes => client.get(format!("{base}/admin/routes")),
        Commands::Cache => client.get(format!("{base}/admin/cache")),
        Commands::Invalidate { tags } => client
            .post(format!("{base}/admin/cache/invalidate"))
            .json(&json!({ "tags": tags })),
    };

    print_response(request.send().await?).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        let text = res.text().await.unwrap_or_default();
        return Err(format!("admin API returned {status}: {text}").into());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
