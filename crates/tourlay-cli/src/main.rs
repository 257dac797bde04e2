use std::process::ExitCode;

use clap::Parser;
use tourlay_config::{CliArgs, Config, default_config_dir};
use tracing::{error, info, warn};

mod scenario;

use scenario::{Scenario, ScenarioReport};

fn log_report(report: &ScenarioReport) {
    for anchor in &report.anchors {
        info!(
            "anchor {} ({}) at {} occlusion {:.3} lod {}",
            anchor.id, anchor.anchor_type, anchor.position, anchor.occlusion_score, anchor.lod_level
        );
        if let Some(issue) = &anchor.metadata.optimization_issue {
            warn!("anchor {} was left in place by the batch solve: {issue:?}", anchor.id);
        }
    }

    if let Some(batch) = &report.batch {
        info!(
            "batch optimized {} of {} anchors ({})",
            batch.optimized_count,
            batch.anchors.len(),
            batch.outcome
        );
    }

    for overlay in &report.overlays {
        info!(
            "overlay {} ({}) over {} anchors: {} levels, {} vertices total, {:.2} MiB",
            overlay.id,
            overlay.overlay_type,
            overlay.anchor_ids.len(),
            overlay.statistics.lod_count,
            overlay.statistics.total_vertices,
            overlay.statistics.memory_usage_mb()
        );
    }

    for check in &report.occlusion {
        info!(
            "anchor {} visibility {:.1}%{}",
            check.anchor_id,
            check.visibility_percentage,
            if check.is_visible { "" } else { " (blocked)" }
        );
    }

    for event in &report.events {
        match event.to_json() {
            Ok(json) => info!("event {}: {json}", event.subject()),
            Err(e) => warn!("cannot encode {} event: {e}", event.subject()),
        }
    }

    match serde_json::to_string_pretty(&report.anchors) {
        Ok(json) => tracing::debug!("anchor records:\n{json}"),
        Err(e) => warn!("cannot encode anchor records: {e}"),
    }
}

fn main() -> ExitCode {
    let args = CliArgs::parse();

    let config_dir = args.config.clone().unwrap_or_else(default_config_dir);

    // Load or create config, then apply CLI overrides
    let mut config = Config::load_or_create(&config_dir).unwrap_or_else(|e| {
        eprintln!("Failed to load config: {e}, using defaults");
        Config::default()
    });
    config.apply_cli_overrides(&args);
    if let Err(e) = config.validate() {
        eprintln!("Invalid configuration: {e}");
        return ExitCode::FAILURE;
    }

    let log_dir = config.log_dir(&config_dir);
    tourlay_log::init_logging(Some(&log_dir), cfg!(debug_assertions), Some(&config));

    let Some(path) = args.scenario else {
        info!("no scenario given; pass --scenario <file.ron> to run one");
        return ExitCode::SUCCESS;
    };

    let report = Scenario::load(&path).and_then(|s| {
        info!(
            "running scenario for site {} with {} placements",
            s.site_id,
            s.placements.len()
        );
        scenario::run(s, &config)
    });

    match report {
        Ok(report) => {
            log_report(&report);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("scenario {} failed: {e}", path.display());
            ExitCode::FAILURE
        }
    }
}
