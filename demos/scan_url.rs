//! Scans one URL and prints every observed state.
//!
//! Uses VirusTotal when `VT_API_KEY` is set, otherwise a scripted mock
//! provider that settles after two polls.
//!
//! Run with: cargo run --example scan_url -- https://example.com

use imsafe::backends::{MockProvider, VirusTotalConfig, VirusTotalProvider};
use imsafe::core::{detecting_engines, ArcProvider};
use imsafe::prelude::*;
use std::sync::Arc;
use std::time::Duration;

fn provider() -> Result<(ArcProvider, PollConfig), ScanError> {
    match std::env::var("VT_API_KEY") {
        Ok(key) if !key.is_empty() => {
            let provider = VirusTotalProvider::new(VirusTotalConfig::new(key))?;
            Ok((Arc::new(provider), PollConfig::default()))
        }
        _ => {
            println!("VT_API_KEY not set, using the mock provider\n");
            let provider = MockProvider::new()
                .then(AnalysisSnapshot::new(ProviderStatus::Queued))
                .then(
                    AnalysisSnapshot::new(ProviderStatus::Completed)
                        .with_verdict(
                            "EngineA",
                            EngineVerdict::new("EngineA", VerdictCategory::Malicious)
                                .with_result("Phishing"),
                        )
                        .with_verdict(
                            "EngineB",
                            EngineVerdict::new("EngineB", VerdictCategory::Harmless),
                        ),
                );
            let poll = PollConfig::default().with_interval(Duration::from_millis(500));
            Ok((Arc::new(provider), poll))
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "https://example.com".to_string());

    let (provider, poll) = provider()?;
    let manager = Arc::new(
        ScanManager::builder()
            .with_arc_provider(provider)
            .with_poll_config(poll)
            .build()?,
    );

    println!("=== Scanning {} ===\n", url);
    let mut session = manager.scan(&ScanTarget::from_url(url)).await?;
    println!("Analysis: {}", session.handle());

    while let Some(update) = session.next_update().await {
        println!(
            "[poll {}] {} - {} engines, severity {}",
            update.attempt, update.state, update.summary.engine_count, update.summary.overall_severity
        );
        if update.is_final() {
            for (engine, verdict) in detecting_engines(&update.verdicts) {
                println!("  - {}: {}", engine, verdict.label());
            }
        }
    }

    match session.wait().await {
        Ok(update) if update.summary.is_clean() => println!("\nNo engine flagged the URL"),
        Ok(update) => println!("\n{} detections", update.summary.detections()),
        Err(e) => println!("\nScan failed: {} ({})", e.user_message(), e),
    }

    Ok(())
}
