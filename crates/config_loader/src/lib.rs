//! # Config Loader
//!
//! Turns a rig description file into a validated [`RigBlueprint`].
//!
//! Loading is a two-step pass: deserialize (serde fills defaults for
//! everything the file omits), then cross-field validation. A blueprint
//! that parses but fails validation never reaches the caller.
//!
//! # Example
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let blueprint = ConfigLoader::load_from_path(Path::new("rig.toml")).unwrap();
//! println!("Camera: {}", blueprint.camera.id);
//! ```

mod parser;
mod validator;

pub use contracts::RigBlueprint;
pub use parser::ConfigFormat;

use std::path::Path;

use contracts::ContractError;

/// Namespace for the loading entry points.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load a blueprint from a file, picking the format by extension
    /// (`.toml` or `.json`).
    pub fn load_from_path(path: &Path) -> Result<RigBlueprint, ContractError> {
        let ext = path.extension().and_then(|e| e.to_str()).ok_or_else(|| {
            ContractError::config_parse("cannot determine file format from extension")
        })?;
        let format = ConfigFormat::from_extension(ext).ok_or_else(|| {
            ContractError::config_parse(format!("unsupported config format: .{ext}"))
        })?;
        let content = std::fs::read_to_string(path)?;
        Self::load_from_str(&content, format)
    }

    /// Load a blueprint from already-read file contents.
    pub fn load_from_str(
        content: &str,
        format: ConfigFormat,
    ) -> Result<RigBlueprint, ContractError> {
        let blueprint = parser::parse(content, format)?;
        validator::validate(&blueprint)?;
        Ok(blueprint)
    }

    /// Render a blueprint back to TOML (used by `info --json`'s sibling
    /// text output and by tests).
    pub fn to_toml(blueprint: &RigBlueprint) -> Result<String, ContractError> {
        toml::to_string_pretty(blueprint)
            .map_err(|e| ContractError::config_parse(format!("TOML serialize error: {e}")))
    }

    /// Render a blueprint back to JSON.
    pub fn to_json(blueprint: &RigBlueprint) -> Result<String, ContractError> {
        serde_json::to_string_pretty(blueprint)
            .map_err(|e| ContractError::config_parse(format!("JSON serialize error: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL_TOML: &str = r#"
[camera]
id = "cam_main"
serial = "KE0200080100"
width = 1280
height = 1024
pixel_format = "bgr8"
frame_rate_hz = 210.0

[camera.settings]
exposure_auto = false
exposure_us = 1800.0

[trigger]
enabled = true
source_id = "gimbal_imu"
line = "line3"
activation = "rising_edge"

[sync]
queue_slots = 1023
max_trigger_latency_ms = 60.0
trigger_wait_timeout_ms = 25.0

[[sinks]]
name = "log_sink"
sink_type = "log"

[[sinks]]
name = "udp_out"
sink_type = "network"
queue_capacity = 64

[sinks.params]
addr = "127.0.0.1:9999"
"#;

    #[test]
    fn test_load_from_str_toml() {
        let result = ConfigLoader::load_from_str(MINIMAL_TOML, ConfigFormat::Toml);
        assert!(result.is_ok(), "Failed: {:?}", result.err());
        let bp = result.unwrap();
        assert_eq!(bp.camera.id, "cam_main");
        assert_eq!(bp.camera.serial.as_deref(), Some("KE0200080100"));
        assert!(bp.trigger.enabled);
        assert_eq!(bp.sinks.len(), 2);
    }

    #[test]
    fn test_round_trip_toml() {
        let bp = ConfigLoader::load_from_str(MINIMAL_TOML, ConfigFormat::Toml).unwrap();
        let serialized = ConfigLoader::to_toml(&bp).unwrap();
        let bp2 = ConfigLoader::load_from_str(&serialized, ConfigFormat::Toml).unwrap();
        assert_eq!(bp.camera.id, bp2.camera.id);
        assert_eq!(bp.camera.settings.exposure_us, bp2.camera.settings.exposure_us);
        assert_eq!(bp.sync.queue_slots, bp2.sync.queue_slots);
        assert_eq!(bp.sinks.len(), bp2.sinks.len());
        assert_eq!(bp.sinks[1].params.get("addr"), bp2.sinks[1].params.get("addr"));
    }

    #[test]
    fn test_round_trip_json() {
        let bp = ConfigLoader::load_from_str(MINIMAL_TOML, ConfigFormat::Toml).unwrap();
        let json = ConfigLoader::to_json(&bp).unwrap();
        let bp2 = ConfigLoader::load_from_str(&json, ConfigFormat::Json).unwrap();
        assert_eq!(bp.camera.id, bp2.camera.id);
        assert_eq!(bp.trigger.source_id, bp2.trigger.source_id);
    }

    #[test]
    fn test_validation_runs_after_parse() {
        // 重复的 sink 名称解析成功但校验失败
        let content = r#"
[camera]
id = "cam_main"

[[sinks]]
name = "log"
sink_type = "log"

[[sinks]]
name = "log"
sink_type = "file"
"#;
        let result = ConfigLoader::load_from_str(content, ConfigFormat::Toml);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("duplicate"));
    }
}
