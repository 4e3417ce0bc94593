use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "push-cli")]
#[command(about = "Management CLI for the push gateway", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8081")]
    url: String,

    #[arg(short, long, env = "PUSH_ADMIN_KEY")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show push context status
    Status,
    /// List topics
    Topics,
    /// List live sessions
    Sessions,
    /// Create a topic
    CreateTopic {
        name: String,
        /// Allow `subtopic@name` subscriptions
        #[arg(long)]
        allow_subtopics: bool,
    },
    /// Publish a JSON payload to a topic key (`topic` or `subtopic@topic`)
    Publish {
        topic: String,
        /// JSON payload; plain text is sent as a JSON string
        data: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
    );

    let request = match cli.command {
        Commands::Status => client.get(format!("{}/admin/status", cli.url)),
        Commands::Topics => client.get(format!("{}/admin/topics", cli.url)),
        Commands::Sessions => client.get(format!("{}/admin/sessions", cli.url)),
        Commands::CreateTopic {
            name,
            allow_subtopics,
        } => client
            .post(format!("{}/admin/topics", cli.url))
            .json(&json!({ "name": name, "allow_subtopics": allow_subtopics })),
        Commands::Publish { topic, data } => {
            let payload: Value = serde_json::from_str(&data).unwrap_or(Value::String(data));
            client
                .post(format!("{}/admin/topics/{}/publish", cli.url, topic))
                .json(&payload)
        }
    };

    let res = request.headers(headers).send().await?;
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
