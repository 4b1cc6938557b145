use colored::*;
use std::time::{Duration, Instant};

use crate::sse_client::Event;

#[derive(Debug)]
pub struct TestResult {
    pub scenario: String,
    pub passed: bool,
    pub message: Option<String>,
    pub duration: Duration,
}

impl TestResult {
    pub fn pass(scenario: &str, started: Instant) -> Self {
        Self {
            scenario: scenario.to_string(),
            passed: true,
            message: None,
            duration: started.elapsed(),
        }
    }

    pub fn fail(scenario: &str, started: Instant, message: impl Into<String>) -> Self {
        Self {
            scenario: scenario.to_string(),
            passed: false,
            message: Some(message.into()),
            duration: started.elapsed(),
        }
    }
}

pub fn print_event(label: &str, event: &Event) {
    let label_colored = if label.starts_with("Author") {
        label.bright_blue()
    } else {
        label.bright_magenta()
    };

    println!(
        "\n[{}] {} event received",
        label_colored.bold(),
        event.event_type.yellow()
    );

    if let Ok(pretty) = serde_json::to_string_pretty(&event.data) {
        println!("   {}", pretty.dimmed());
    }
}

pub fn print_test_summary(results: &[TestResult]) {
    println!("\n{}", "=== TEST SUMMARY ===".bright_white().bold());

    let (passed, failed): (Vec<&TestResult>, Vec<&TestResult>) =
        results.iter().partition(|r| r.passed);
    let elapsed: Duration = results.iter().map(|r| r.duration).sum();

    for result in results {
        let status = if result.passed {
            "PASS".green().bold()
        } else {
            "FAIL".red().bold()
        };
        println!("[{}] {} ({:?})", status, result.scenario, result.duration);

        if let Some(msg) = &result.message {
            println!("      {}", msg.dimmed());
        }
    }

    println!(
        "\n{}: {} passed, {} failed in {:?}",
        "Results".bold(),
        passed.len().to_string().green(),
        failed.len().to_string().red(),
        elapsed
    );
}
