//! `info` command implementation.

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use contracts::RigBlueprint;

use crate::cli::InfoArgs;
use crate::error::CliError;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    camera: CameraInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    settings: Option<SettingsInfo>,
    trigger: TriggerInfo,
    sync: SyncInfo,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    sinks: Vec<SinkInfo>,
}

#[derive(Serialize)]
struct CameraInfo {
    id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    serial: Option<String>,
    resolution: String,
    pixel_format: String,
    frame_rate_hz: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    calibration_url: Option<String>,
}

#[derive(Serialize)]
struct SettingsInfo {
    exposure: String,
    gain: String,
    black_level: String,
    white_balance: String,
    improve_mode: String,
}

#[derive(Serialize)]
struct TriggerInfo {
    enabled: bool,
    source_id: String,
    line: String,
    activation: String,
    rising_filter_us: f64,
}

#[derive(Serialize)]
struct SyncInfo {
    queue_slots: usize,
    max_trigger_latency_ms: f64,
    trigger_wait_timeout_ms: f64,
    resync_interval_ms: u64,
    trigger_stale_after_ms: u64,
    startup_enable_attempts: u32,
    frame_channel_capacity: usize,
}

#[derive(Serialize)]
struct SinkInfo {
    name: String,
    sink_type: String,
    queue_capacity: usize,
    #[serde(skip_serializing_if = "std::collections::HashMap::is_empty")]
    params: std::collections::HashMap<String, String>,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    if !args.config.exists() {
        return Err(CliError::config_not_found(&args.config).into());
    }

    let blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    if args.json {
        let info = build_config_info(&blueprint, args);
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&blueprint, args);
    }

    Ok(())
}

fn build_config_info(blueprint: &RigBlueprint, args: &InfoArgs) -> ConfigInfo {
    let camera = &blueprint.camera;
    let trigger = &blueprint.trigger;
    let sync = &blueprint.sync;

    let settings = if args.settings {
        Some(describe_settings(blueprint))
    } else {
        None
    };

    let sinks = if args.sinks {
        blueprint
            .sinks
            .iter()
            .map(|s| SinkInfo {
                name: s.name.clone(),
                sink_type: format!("{:?}", s.sink_type),
                queue_capacity: s.queue_capacity,
                params: s.params.clone(),
            })
            .collect()
    } else {
        Vec::new()
    };

    ConfigInfo {
        version: format!("{:?}", blueprint.version),
        camera: CameraInfo {
            id: camera.id.clone(),
            serial: camera.serial.clone(),
            resolution: format!(
                "{}x{} @ ({}, {})",
                camera.width, camera.height, camera.offset_x, camera.offset_y
            ),
            pixel_format: format!("{:?}", camera.pixel_format),
            frame_rate_hz: camera.frame_rate_hz,
            calibration_url: camera.calibration_url.clone(),
        },
        settings,
        trigger: TriggerInfo {
            enabled: trigger.enabled,
            source_id: trigger.source_id.clone(),
            line: format!("{:?}", trigger.line),
            activation: format!("{:?}", trigger.activation),
            rising_filter_us: trigger.rising_filter_us,
        },
        sync: SyncInfo {
            queue_slots: sync.queue_slots,
            max_trigger_latency_ms: sync.max_trigger_latency_ms,
            trigger_wait_timeout_ms: sync.trigger_wait_timeout_ms,
            resync_interval_ms: sync.resync_interval_ms,
            trigger_stale_after_ms: sync.trigger_stale_after_ms,
            startup_enable_attempts: sync.startup_enable_attempts,
            frame_channel_capacity: sync.frame_channel_capacity,
        },
        sinks,
    }
}

fn describe_settings(blueprint: &RigBlueprint) -> SettingsInfo {
    let s = &blueprint.camera.settings;

    SettingsInfo {
        exposure: if s.exposure_auto {
            "auto".to_string()
        } else {
            format!("{:.0} us (manual)", s.exposure_us)
        },
        gain: if s.gain_auto {
            "auto".to_string()
        } else {
            format!("{:.1} dB (manual)", s.gain_db)
        },
        black_level: if s.black_level_auto {
            "auto".to_string()
        } else {
            format!("{:.1} (manual)", s.black_level)
        },
        white_balance: if s.white_balance_auto {
            "auto".to_string()
        } else {
            format!(
                "{:?} x{:.2} (manual)",
                s.white_balance_channel, s.white_balance_ratio
            )
        },
        improve_mode: format!("{:?}", s.improve_mode),
    }
}

fn print_config_info(blueprint: &RigBlueprint, args: &InfoArgs) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                  Framelock Configuration                     ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    // Camera
    let camera = &blueprint.camera;
    println!("📷 Camera");
    println!("   ├─ Version: {:?}", blueprint.version);
    println!("   ├─ ID: {}", camera.id);
    match &camera.serial {
        Some(serial) => println!("   ├─ Serial: {}", serial),
        None => println!("   ├─ Serial: (first available)"),
    }
    println!(
        "   ├─ Resolution: {}x{} @ ({}, {})",
        camera.width, camera.height, camera.offset_x, camera.offset_y
    );
    println!("   ├─ Pixel format: {:?}", camera.pixel_format);
    println!("   ├─ Frame rate: {} Hz", camera.frame_rate_hz);
    match &camera.calibration_url {
        Some(url) => println!("   └─ Calibration: {}", url),
        None => println!("   └─ Calibration: (none)"),
    }

    // Camera settings
    if args.settings {
        let settings = describe_settings(blueprint);
        println!("\n🔧 Settings");
        println!("   ├─ Exposure: {}", settings.exposure);
        println!("   ├─ Gain: {}", settings.gain);
        println!("   ├─ Black level: {}", settings.black_level);
        println!("   ├─ White balance: {}", settings.white_balance);
        println!("   └─ Improve mode: {}", settings.improve_mode);
    }

    // Trigger
    let trigger = &blueprint.trigger;
    println!("\n⚡ Trigger");
    if trigger.enabled {
        println!("   ├─ Enabled: yes");
        println!("   ├─ Source: {}", trigger.source_id);
        println!("   ├─ Line: {:?}", trigger.line);
        println!("   ├─ Activation: {:?}", trigger.activation);
        println!("   └─ Rising filter: {} us", trigger.rising_filter_us);
    } else {
        println!("   └─ Enabled: no (free-run capture)");
    }

    // Sync tuning
    let sync = &blueprint.sync;
    println!("\n⚙️  Sync Tuning");
    println!("   ├─ Queue slots: {}", sync.queue_slots);
    println!("   ├─ Max trigger latency: {} ms", sync.max_trigger_latency_ms);
    println!("   ├─ Trigger wait timeout: {} ms", sync.trigger_wait_timeout_ms);
    println!("   ├─ Resync interval: {} ms", sync.resync_interval_ms);
    println!("   ├─ Stale after: {} ms", sync.trigger_stale_after_ms);
    println!(
        "   └─ Startup enable attempts: {}",
        sync.startup_enable_attempts
    );

    // Sinks
    if !blueprint.sinks.is_empty() {
        println!("\n📤 Sinks ({})", blueprint.sinks.len());
        for (i, sink) in blueprint.sinks.iter().enumerate() {
            let is_last = i == blueprint.sinks.len() - 1;
            let prefix = if is_last { "└─" } else { "├─" };
            let child_prefix = if is_last { "   " } else { "│  " };

            println!(
                "   {} {} ({:?}, queue {})",
                prefix, sink.name, sink.sink_type, sink.queue_capacity
            );

            if args.sinks && !sink.params.is_empty() {
                let mut params: Vec<_> = sink.params.iter().collect();
                params.sort_by_key(|(k, _)| k.as_str());
                for (j, (key, value)) in params.iter().enumerate() {
                    let param_is_last = j == params.len() - 1;
                    let param_prefix = if param_is_last { "└─" } else { "├─" };
                    println!("   {}  {} {}: {}", child_prefix, param_prefix, key, value);
                }
            }
        }
    }

    println!();
}
