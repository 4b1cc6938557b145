use anyhow::Result;
use clap::Parser;
use colored::*;
use std::sync::Arc;
use std::time::Duration;
use stream_client::EchoCache;

use testing_tools::api_client::ApiClient;
use testing_tools::output::print_test_summary;
use testing_tools::scenarios::{self, Streams};
use testing_tools::sse_client::Connection;

#[derive(Parser)]
#[command(name = "stream-test-client")]
#[command(about = "SSE Integration Testing Tool")]
struct Cli {
    /// Base URL of the realtime server (e.g., http://localhost:4000)
    #[arg(long)]
    base_url: String,

    /// User id of the author publishing changes
    #[arg(long, default_value = "stream-test-author")]
    author: String,

    /// User id of the reader watching the streams
    #[arg(long, default_value = "stream-test-reader")]
    reader: String,

    /// Header the server reads the caller's identity from
    #[arg(long, default_value = "x-user-id")]
    user_id_header: String,

    /// Shared key for the internal publish route, if the server requires one
    #[arg(long, env = "INTERNAL_API_KEY")]
    internal_key: Option<String>,

    /// Test scenario to run
    #[arg(long, value_enum)]
    scenario: ScenarioChoice,

    /// Enable verbose output
    #[arg(long, short)]
    verbose: bool,
}

#[derive(clap::ValueEnum, Clone)]
enum ScenarioChoice {
    /// Test basic SSE connection without publishing any events
    ConnectionTest,
    /// A published post reaches every feed subscriber
    FeedBroadcast,
    /// A notification reaches only its receiver
    NotificationTargeting,
    /// The author skips the echo of its own upvote
    EchoSuppression,
    /// Run all tests
    All,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Debug)
            .init();
    }

    println!("{}", "=== SETUP PHASE ===".bright_white().bold());

    let api_client = ApiClient::new(
        reqwest::Client::new(),
        cli.base_url.clone(),
        cli.internal_key.clone(),
    );
    let echo = Arc::new(EchoCache::default());

    println!("\n{} Establishing SSE connections...", "→".blue());
    let mut streams = Streams {
        author_feed: Connection::feed(
            &cli.base_url,
            "Author feed".to_string(),
            Some(echo.clone()),
        ),
        reader_feed: Connection::feed(&cli.base_url, "Reader feed".to_string(), None),
        author_notifications: Connection::notifications(
            &cli.base_url,
            &cli.user_id_header,
            &cli.author,
            "Author notifications".to_string(),
        ),
        reader_notifications: Connection::notifications(
            &cli.base_url,
            &cli.user_id_header,
            &cli.reader,
            "Reader notifications".to_string(),
        ),
    };

    // Streams connect in the background; give them a moment before publishing.
    tokio::time::sleep(Duration::from_secs(1)).await;
    println!("{} SSE connections established", "✓".green());

    println!("\n{}", "=== TEST PHASE ===".bright_white().bold());

    let mut results = Vec::new();

    match cli.scenario {
        ScenarioChoice::ConnectionTest => {
            results.push(scenarios::test_connection(&cli.author, &cli.reader).await?);
        }
        ScenarioChoice::FeedBroadcast => {
            results.push(scenarios::test_feed_broadcast(&api_client, &mut streams).await?);
        }
        ScenarioChoice::NotificationTargeting => {
            results.push(
                scenarios::test_notification_targeting(&api_client, &mut streams, &cli.reader)
                    .await?,
            );
        }
        ScenarioChoice::EchoSuppression => {
            results.push(
                scenarios::test_echo_suppression(&api_client, &mut streams, &echo, &cli.author)
                    .await?,
            );
        }
        ScenarioChoice::All => {
            results.push(scenarios::test_connection(&cli.author, &cli.reader).await?);
            results.push(scenarios::test_feed_broadcast(&api_client, &mut streams).await?);
            results.push(
                scenarios::test_notification_targeting(&api_client, &mut streams, &cli.reader)
                    .await?,
            );
            results.push(
                scenarios::test_echo_suppression(&api_client, &mut streams, &echo, &cli.author)
                    .await?,
            );
        }
    }

    println!("\n{}", "=== RESULTS ===".bright_white().bold());
    print_test_summary(&results);

    let all_passed = results.iter().all(|r| r.passed);

    if all_passed {
        println!("\n{}", "All tests passed! ✓".bright_green().bold());
    } else {
        println!("\n{}", "Some tests failed! ✗".bright_red().bold());
    }

    std::process::exit(if all_passed { 0 } else { 1 });
}
