//! 配置反序列化
//!
//! TOML 为主要格式, JSON 供工具链集成使用。

use contracts::{ContractError, RigBlueprint};

/// 配置文件格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Json,
}

impl ConfigFormat {
    /// 按扩展名识别, 大小写不敏感
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// 反序列化为蓝图, 未给出的字段走 serde 默认值
pub fn parse(content: &str, format: ConfigFormat) -> Result<RigBlueprint, ContractError> {
    match format {
        ConfigFormat::Toml => toml::from_str(content).map_err(|e| ContractError::ConfigParse {
            message: format!("TOML parse error: {e}"),
            source: Some(Box::new(e)),
        }),
        ConfigFormat::Json => {
            serde_json::from_str(content).map_err(|e| ContractError::ConfigParse {
                message: format!("JSON parse error: {e}"),
                source: Some(Box::new(e)),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use contracts::{PixelFormat, TriggerLine};

    use super::*;

    #[test]
    fn test_parse_toml_minimal() {
        let content = r#"
[camera]
id = "cam_main"
serial = "KE0200080100"
width = 1280
height = 1024
pixel_format = "bgr8"

[trigger]
enabled = true
source_id = "gimbal_imu"
line = "line3"

[sync]
queue_slots = 1023
max_trigger_latency_ms = 60.0

[[sinks]]
name = "log_sink"
sink_type = "log"
"#;
        let bp = parse(content, ConfigFormat::Toml).expect("parse failed");
        assert_eq!(bp.camera.id, "cam_main");
        assert_eq!(bp.camera.pixel_format, PixelFormat::Bgr8);
        assert_eq!(bp.trigger.line, TriggerLine::Line3);
        assert_eq!(bp.sinks.len(), 1);
    }

    #[test]
    fn test_parse_toml_applies_defaults() {
        let content = r#"
[camera]
id = "cam_main"
"#;
        let bp = parse(content, ConfigFormat::Toml).unwrap();
        assert_eq!(bp.camera.width, 1280);
        assert_eq!(bp.camera.height, 1024);
        assert_eq!(bp.camera.frame_rate_hz, 210.0);
        assert!(bp.trigger.enabled);
        assert_eq!(bp.trigger.source_id, "gimbal_imu");
        assert_eq!(bp.sync.queue_slots, 1023);
        assert!(bp.sinks.is_empty());
    }

    #[test]
    fn test_parse_json_minimal() {
        let content = r#"{
            "camera": {
                "id": "cam_main",
                "width": 640,
                "height": 480,
                "settings": { "exposure_auto": false, "exposure_us": 1800.0 }
            },
            "trigger": { "enabled": false },
            "sinks": [{ "name": "log", "sink_type": "log" }]
        }"#;
        let bp = parse(content, ConfigFormat::Json).expect("parse failed");
        assert_eq!(bp.camera.width, 640);
        assert!(!bp.camera.settings.exposure_auto);
        assert!(!bp.trigger.enabled);
    }

    #[test]
    fn test_parse_toml_syntax_error() {
        let err = parse("invalid toml [[[", ConfigFormat::Toml).unwrap_err();
        assert!(matches!(err, ContractError::ConfigParse { .. }));
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(ConfigFormat::from_extension("toml"), Some(ConfigFormat::Toml));
        assert_eq!(ConfigFormat::from_extension("TOML"), Some(ConfigFormat::Toml));
        assert_eq!(ConfigFormat::from_extension("json"), Some(ConfigFormat::Json));
        assert_eq!(ConfigFormat::from_extension("yaml"), None);
    }
}
