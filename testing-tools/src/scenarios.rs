use anyhow::Result;
use colored::*;
use events::NotificationKind;
use std::time::{Duration, Instant};
use stream_client::{new_tx_id, EchoCache};

use crate::api_client::ApiClient;
use crate::output::{print_event, TestResult};
use crate::sse_client::Connection;

const EVENT_TIMEOUT: Duration = Duration::from_secs(5);
const SILENCE_WINDOW: Duration = Duration::from_secs(1);

/// The two feed and two notification streams the scenarios run against.
pub struct Streams {
    pub author_feed: Connection,
    pub reader_feed: Connection,
    pub author_notifications: Connection,
    pub reader_notifications: Connection,
}

pub async fn test_connection(author_id: &str, reader_id: &str) -> Result<TestResult> {
    let start = Instant::now();

    println!("\n{}", "=== TEST: Connection Test ===".bright_cyan().bold());
    println!(
        "{}",
        "Testing basic SSE connectivity without publishing any events".bright_white()
    );

    println!("{} Author ({}) streams: opened", "✓".green(), author_id);
    println!("{} Reader ({}) streams: opened", "✓".green(), reader_id);

    println!(
        "{} Waiting 2 seconds to verify connections stay alive...",
        "→".blue()
    );
    tokio::time::sleep(Duration::from_secs(2)).await;

    println!("{} Connections remain stable", "✓".green());

    Ok(TestResult {
        scenario: "connection_test".to_string(),
        passed: true,
        message: Some("SSE connections established and maintained successfully".to_string()),
        duration: start.elapsed(),
    })
}

pub async fn test_feed_broadcast(api_client: &ApiClient, streams: &mut Streams) -> Result<TestResult> {
    let start = Instant::now();
    let scenario = "feed_broadcast";

    println!("\n{}", "=== TEST: Feed Broadcast ===".bright_cyan().bold());

    let post_id = uuid::Uuid::new_v4().to_string();
    println!("{} Publishing post {}...", "→".blue(), post_id);
    api_client
        .create_post(&post_id, "Stream test post", None)
        .await?;

    for stream in [&mut streams.author_feed, &mut streams.reader_feed] {
        println!(
            "{} Waiting for {} to receive new-post event...",
            "→".blue(),
            stream.user_label
        );

        let event = match stream.wait_for_event("new-post", EVENT_TIMEOUT).await {
            Ok(event) => event,
            Err(e) => {
                println!("{} {}", "✗".red(), e);
                return Ok(TestResult::fail(scenario, start, format!("{}: {}", stream.user_label, e)));
            }
        };
        print_event(&stream.user_label, &event);

        let received = event.data["postId"].as_str().unwrap_or_default();
        if received != post_id {
            println!("{} Event data mismatch!", "✗".red());
            return Ok(TestResult::fail(
                scenario,
                start,
                format!("Expected postId={}, got postId={}", post_id, received),
            ));
        }
    }

    println!("{} Every feed subscriber received the post", "✓".green());
    Ok(TestResult::pass(scenario, start))
}

pub async fn test_notification_targeting(
    api_client: &ApiClient,
    streams: &mut Streams,
    reader_id: &str,
) -> Result<TestResult> {
    let start = Instant::now();
    let scenario = "notification_targeting";

    println!("\n{}", "=== TEST: Notification Targeting ===".bright_cyan().bold());

    let post_id = uuid::Uuid::new_v4().to_string();
    println!("{} Notifying {} of a comment...", "→".blue(), reader_id);
    api_client
        .notify(reader_id, NotificationKind::PostComment, &post_id)
        .await?;

    let reader = &mut streams.reader_notifications;
    match reader.wait_for_event("post_comment", EVENT_TIMEOUT).await {
        Ok(event) => {
            print_event(&reader.user_label, &event);
            if event.data["postId"].as_str() != Some(post_id.as_str()) {
                return Ok(TestResult::fail(scenario, start, "postId mismatch"));
            }
        }
        Err(e) => {
            println!("{} {}", "✗".red(), e);
            return Ok(TestResult::fail(scenario, start, format!("Timeout: {}", e)));
        }
    }

    println!(
        "{} Checking the author's notification stream stays silent...",
        "→".blue()
    );
    let leaked = streams
        .author_notifications
        .next_matching(SILENCE_WINDOW, |event| event.data["postId"] == post_id.as_str())
        .await;
    if let Some(event) = leaked {
        print_event(&streams.author_notifications.user_label, &event);
        return Ok(TestResult::fail(
            scenario,
            start,
            "Notification leaked to another user's stream",
        ));
    }

    println!("{} Notification reached only its receiver", "✓".green());
    Ok(TestResult::pass(scenario, start))
}

pub async fn test_echo_suppression(
    api_client: &ApiClient,
    streams: &mut Streams,
    echo: &EchoCache,
    author_id: &str,
) -> Result<TestResult> {
    let start = Instant::now();
    let scenario = "echo_suppression";

    println!("\n{}", "=== TEST: Echo Suppression ===".bright_cyan().bold());

    let post_id = uuid::Uuid::new_v4().to_string();
    let tx_id = new_tx_id();
    echo.remember(&tx_id);

    println!("{} Author upvoting with operation {}...", "→".blue(), tx_id);
    api_client.upvote(&post_id, author_id, Some(&tx_id)).await?;

    let reader = &mut streams.reader_feed;
    match reader.wait_for_event("upvote", EVENT_TIMEOUT).await {
        Ok(event) => print_event(&reader.user_label, &event),
        Err(e) => {
            println!("{} {}", "✗".red(), e);
            return Ok(TestResult::fail(scenario, start, format!("Reader: {}", e)));
        }
    }

    let echoed = streams
        .author_feed
        .next_matching(SILENCE_WINDOW, |event| event.data["txId"] == tx_id.as_str())
        .await;
    if echoed.is_some() {
        println!("{} Author saw the echo of its own upvote", "✗".red());
        return Ok(TestResult::fail(scenario, start, "Echo was not suppressed"));
    }

    println!("{} Author's own echo was suppressed", "✓".green());
    Ok(TestResult::pass(scenario, start))
}
