//! Configuration display command.

use std::path::Path;

use anyhow::Result;
use racetrack_config::{RacetrackConfig, SamplingScheme};

use crate::ConfigFormat;

/// Show the effective configuration.
pub fn show(project: Option<&Path>, format: ConfigFormat) -> Result<()> {
    let config = super::load_config(project)?;

    match format {
        ConfigFormat::Json => println!("{}", serde_json::to_string_pretty(&config)?),
        ConfigFormat::Toml => println!("{}", toml::to_string_pretty(&config)?),
        ConfigFormat::Text => print_text(&config),
    }
    Ok(())
}

fn print_text(config: &RacetrackConfig) {
    println!("racetrack Configuration");
    println!("=======================\n");

    println!("Detector:");
    println!("  Max threads: {}", config.detector.max_threads);
    println!("  Count operations: {}", config.detector.count_operations);
    println!(
        "  Seed: {}",
        config
            .detector
            .seed
            .map_or("None".to_string(), |s| s.to_string())
    );
    println!();

    println!("Sampling:");
    println!("  Scheme: {:?}", config.sampling.scheme);
    match config.sampling.scheme {
        SamplingScheme::Count => {
            println!("  Mode: {:?}", config.sampling.count.mode);
            println!("  Rate: {}%", config.sampling.count.rate);
        }
        SamplingScheme::Adaptive => {
            let a = &config.sampling.adaptive;
            println!("  Burst length: {}", a.burst_length);
            println!("  Min sampling: {}", a.min_sampling);
            println!("  Decay: {:?} by {}", a.decay, a.decay_rate);
            println!("  Granularity: {:?}", a.granularity);
        }
    }
    println!();

    println!("Reporting:");
    println!(
        "  Max reports per site: {}",
        config.reporting.max_reports_per_site
    );
}
