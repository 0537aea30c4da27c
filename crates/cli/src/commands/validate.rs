//! `validate` command implementation.

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use contracts::{RigBlueprint, TriggerLine};

use crate::cli::ValidateArgs;
use crate::error::CliError;

/// Verdict on one blueprint file, shaped for both terminal and JSON output.
#[derive(Serialize)]
struct Verdict {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<Summary>,
}

impl Verdict {
    fn rejected(config_path: String, error: String) -> Self {
        Self {
            valid: false,
            config_path,
            error: Some(error),
            warnings: Vec::new(),
            summary: None,
        }
    }
}

#[derive(Serialize)]
struct Summary {
    version: String,
    camera_id: String,
    resolution: String,
    frame_rate_hz: f64,
    trigger_enabled: bool,
    trigger_source: String,
    sink_count: usize,
}

impl Summary {
    fn of(bp: &RigBlueprint) -> Self {
        Self {
            version: format!("{:?}", bp.version),
            camera_id: bp.camera.id.clone(),
            resolution: format!("{}x{}", bp.camera.width, bp.camera.height),
            frame_rate_hz: bp.camera.frame_rate_hz,
            trigger_enabled: bp.trigger.enabled,
            trigger_source: bp.trigger.source_id.clone(),
            sink_count: bp.sinks.len(),
        }
    }
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let verdict = check_blueprint(args);

    if args.json {
        let rendered =
            serde_json::to_string_pretty(&verdict).context("verdict serialization failed")?;
        println!("{rendered}");
    } else {
        report(&verdict);
    }

    if verdict.valid {
        Ok(())
    } else {
        Err(CliError::config_invalid(&args.config).into())
    }
}

fn check_blueprint(args: &ValidateArgs) -> Verdict {
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        return Verdict::rejected(config_path, "file not found".to_string());
    }

    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(blueprint) => Verdict {
            valid: true,
            config_path,
            error: None,
            warnings: collect_warnings(&blueprint),
            summary: Some(Summary::of(&blueprint)),
        },
        Err(e) => Verdict::rejected(config_path, e.to_string()),
    }
}

/// Non-fatal findings: the blueprint is usable, but probably not what the
/// operator intended.
fn collect_warnings(blueprint: &RigBlueprint) -> Vec<String> {
    let mut warnings = Vec::new();

    if blueprint.sinks.is_empty() {
        warnings.push("No sinks configured - stamped frames will be dropped".to_string());
    }

    if !blueprint.trigger.enabled {
        warnings.push(
            "Trigger disabled - frames will be stamped with the delivery clock".to_string(),
        );
    }

    // Software trigger line carries no hardware pulse counter
    if blueprint.trigger.enabled && blueprint.trigger.line == TriggerLine::Software {
        warnings.push(
            "Software trigger line selected - counter continuity cannot be verified".to_string(),
        );
    }

    // Manual exposure must fit inside the trigger period
    let settings = &blueprint.camera.settings;
    if !settings.exposure_auto && blueprint.camera.frame_rate_hz > 0.0 {
        let period_us = 1_000_000.0 / blueprint.camera.frame_rate_hz;
        if settings.exposure_us > period_us {
            warnings.push(format!(
                "Manual exposure {:.0} us exceeds the {:.0} us frame period at {} Hz",
                settings.exposure_us, period_us, blueprint.camera.frame_rate_hz
            ));
        }
    }

    warnings
}

fn report(verdict: &Verdict) {
    if !verdict.valid {
        println!("✗ {} is invalid", verdict.config_path);
        if let Some(error) = &verdict.error {
            println!("\n  {error}");
        }
        return;
    }

    println!("✓ {} is valid", verdict.config_path);
    if let Some(s) = &verdict.summary {
        println!("\n  Version: {}", s.version);
        println!("  Camera: {} @ {} ({} Hz)", s.camera_id, s.resolution, s.frame_rate_hz);
        let trigger = if s.trigger_enabled {
            format!("enabled ({})", s.trigger_source)
        } else {
            "disabled".to_string()
        };
        println!("  Trigger: {trigger}");
        println!("  Sinks: {}", s.sink_count);
    }
    if !verdict.warnings.is_empty() {
        println!("\n⚠ Warnings:");
        for w in &verdict.warnings {
            println!("  - {w}");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::path::PathBuf;

    use super::*;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_minimal_config_is_valid_with_warnings() {
        let file = write_config("[camera]\nid = \"cam_a\"\n");
        let args = ValidateArgs {
            config: file.path().to_path_buf(),
            json: false,
        };

        let verdict = check_blueprint(&args);
        assert!(verdict.valid);
        assert_eq!(verdict.summary.unwrap().camera_id, "cam_a");
        assert!(verdict.warnings.iter().any(|w| w.contains("No sinks")));
    }

    #[test]
    fn test_missing_file_is_rejected() {
        let args = ValidateArgs {
            config: PathBuf::from("/nonexistent/rig.toml"),
            json: false,
        };

        let verdict = check_blueprint(&args);
        assert!(!verdict.valid);
        assert!(verdict.error.unwrap().contains("not found"));
    }

    #[test]
    fn test_warns_on_exposure_longer_than_frame_period() {
        let file = write_config(
            "[camera]\n\
             id = \"cam_a\"\n\
             frame_rate_hz = 200.0\n\
             \n\
             [camera.settings]\n\
             exposure_auto = false\n\
             exposure_us = 20000.0\n",
        );
        let args = ValidateArgs {
            config: file.path().to_path_buf(),
            json: false,
        };

        let verdict = check_blueprint(&args);
        assert!(verdict.valid);
        assert!(verdict.warnings.iter().any(|w| w.contains("exceeds")));
    }
}
