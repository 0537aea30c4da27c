//! `run` command implementation.

use anyhow::{Context, Result};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

use contracts::RigBlueprint;

use crate::cli::RunArgs;
use crate::error::CliError;
use crate::pipeline::{Pipeline, PipelineConfig};

/// Execute the `run` command
pub async fn run_pipeline(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    if !args.config.exists() {
        return Err(CliError::config_not_found(&args.config).into());
    }
    if let Some(replay) = &args.replay {
        if !replay.exists() {
            return Err(CliError::replay_not_found(replay).into());
        }
    }

    let mut blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("failed to load config from {}", args.config.display()))?;

    // --free-run overrides the blueprint's trigger section
    if args.free_run && blueprint.trigger.enabled {
        info!("free-run requested, ignoring the blueprint's trigger section");
        blueprint.trigger.enabled = false;
    }

    info!(
        camera = %blueprint.camera.id,
        trigger_source = %blueprint.trigger.source_id,
        trigger_enabled = blueprint.trigger.enabled,
        sinks = blueprint.sinks.len(),
        "Configuration loaded"
    );

    if args.dry_run {
        info!("dry run, configuration is valid");
        print_config_summary(&blueprint);
        return Ok(());
    }

    // Flag value 0 means "unlimited" / "disabled" throughout
    let pipeline_config = PipelineConfig {
        blueprint,
        max_frames: (args.max_frames > 0).then_some(args.max_frames),
        timeout: (args.timeout > 0).then(|| Duration::from_secs(args.timeout)),
        metrics_port: (args.metrics_port > 0).then_some(args.metrics_port),
        replay_path: args.replay.clone(),
        replay_speed: args.replay_speed,
        replay_loop: args.replay_loop,
    };
    let pipeline = Pipeline::new(pipeline_config);

    // Translate Ctrl+C / SIGTERM into the shutdown flag so the pipeline
    // unwinds cleanly: stream off, trigger disabled, sinks flushed.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        warn!("shutdown signal received, stopping pipeline");
        let _ = shutdown_tx.send(true);
    });

    info!("starting pipeline");
    let stats = pipeline
        .run(shutdown_rx)
        .await
        .context("pipeline execution failed")?;

    info!(
        frames_stamped = stats.frames_stamped,
        frames_dropped = stats.frames_dropped,
        duration_secs = stats.duration.as_secs_f64(),
        fps = format!("{:.2}", stats.fps()),
        "pipeline finished"
    );
    stats.print_summary();

    Ok(())
}

/// Resolves on Ctrl+C, or on SIGTERM where the platform has one.
async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation failed")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.expect("Ctrl+C handler installation failed");
        }
        _ = terminate => {}
    }
}

/// Print configuration summary for dry-run mode
fn print_config_summary(blueprint: &RigBlueprint) {
    println!("\n=== Configuration Summary ===\n");
    println!("Camera:");
    println!("  ID: {}", blueprint.camera.id);
    match &blueprint.camera.serial {
        Some(serial) => println!("  Serial: {}", serial),
        None => println!("  Serial: (first available)"),
    }
    println!(
        "  Resolution: {}x{} ({:?})",
        blueprint.camera.width, blueprint.camera.height, blueprint.camera.pixel_format
    );
    println!("  Frame rate: {} Hz", blueprint.camera.frame_rate_hz);

    println!("\nTrigger:");
    if blueprint.trigger.enabled {
        println!(
            "  {} on {:?} ({:?})",
            blueprint.trigger.source_id, blueprint.trigger.line, blueprint.trigger.activation
        );
    } else {
        println!("  disabled (free-run capture)");
    }

    println!("\nSync:");
    println!("  Queue slots: {}", blueprint.sync.queue_slots);
    println!(
        "  Max trigger latency: {} ms",
        blueprint.sync.max_trigger_latency_ms
    );
    println!(
        "  Trigger wait timeout: {} ms",
        blueprint.sync.trigger_wait_timeout_ms
    );

    if !blueprint.sinks.is_empty() {
        println!("\nSinks ({}):", blueprint.sinks.len());
        for sink in &blueprint.sinks {
            println!("  - {} ({:?})", sink.name, sink.sink_type);
        }
    }

    println!();
}
