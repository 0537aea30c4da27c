//! 配置校验模块
//!
//! 校验规则：
//! - 字段级范围/长度约束 (contracts 中的 derive 校验)
//! - sink 名称唯一
//! - network sink 必须携带 `addr` 参数
//! - 重同步周期不得超过触发静默阈值

use std::collections::HashSet;

use contracts::{ContractError, RigBlueprint, SinkType};
use validator::Validate;

/// 校验 RigBlueprint 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(blueprint: &RigBlueprint) -> Result<(), ContractError> {
    validate_fields(blueprint)?;
    validate_sink_names(blueprint)?;
    validate_sink_params(blueprint)?;
    validate_resync_timing(blueprint)?;
    Ok(())
}

/// 字段级约束，由 derive 生成的校验器完成
fn validate_fields(blueprint: &RigBlueprint) -> Result<(), ContractError> {
    blueprint
        .validate()
        .map_err(|errors| ContractError::config_validation("blueprint", errors.to_string()))
}

/// 校验 sink 名称唯一性
fn validate_sink_names(blueprint: &RigBlueprint) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for sink in &blueprint.sinks {
        if !seen.insert(&sink.name) {
            return Err(ContractError::config_validation(
                format!("sinks[name={}]", sink.name),
                "duplicate sink name",
            ));
        }
    }
    Ok(())
}

/// 校验类型特定的 sink 参数
fn validate_sink_params(blueprint: &RigBlueprint) -> Result<(), ContractError> {
    for sink in &blueprint.sinks {
        if sink.sink_type == SinkType::Network && !sink.params.contains_key("addr") {
            return Err(ContractError::config_validation(
                format!("sinks[name={}].params", sink.name),
                "network sink requires an 'addr' parameter",
            ));
        }
    }
    Ok(())
}

/// 校验重同步时序
///
/// 监督器至少要在静默阈值内跑完一个周期，否则触发中断的
/// 检测会整体滞后。
fn validate_resync_timing(blueprint: &RigBlueprint) -> Result<(), ContractError> {
    let sync = &blueprint.sync;
    if sync.resync_interval_ms > sync.trigger_stale_after_ms {
        return Err(ContractError::config_validation(
            "sync.resync_interval_ms / sync.trigger_stale_after_ms",
            format!(
                "resync_interval_ms ({}) must be <= trigger_stale_after_ms ({})",
                sync.resync_interval_ms, sync.trigger_stale_after_ms
            ),
        ));
    }
    Ok(())
}
