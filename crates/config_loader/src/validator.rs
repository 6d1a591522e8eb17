//! 配置校验模块
//!
//! 校验规则：
//! - processor.max_batch_size >= 1
//! - destination type 非空
//! - 启用的 destination type 唯一
//! - 已知目的地的必填 settings 齐全

use std::collections::HashSet;

use contracts::{ContractError, DestinationConfig};
use validator::{Validate, ValidationErrors};

use crate::config::RelayConfig;

/// 内置目的地的必填 settings
const REQUIRED_SETTINGS: &[(&str, &str)] = &[("file", "path"), ("network", "addr")];

/// 校验 RelayConfig 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(config: &RelayConfig) -> Result<(), ContractError> {
    validate_fields(config)?;
    validate_unique_enabled_types(config)?;
    validate_builtin_settings(config)?;
    Ok(())
}

/// 基于 validator derive 的字段级校验
fn validate_fields(config: &RelayConfig) -> Result<(), ContractError> {
    config.validate().map_err(|errors| {
        let (field, message) = first_error(&errors);
        ContractError::config_validation(field, message)
    })
}

/// 取出第一条字段错误 (路径, 消息)
fn first_error(errors: &ValidationErrors) -> (String, String) {
    let mut flat: Vec<(String, String)> = Vec::new();
    collect_errors(errors, String::new(), &mut flat);
    flat.sort();
    flat.into_iter()
        .next()
        .unwrap_or_else(|| ("config".to_string(), "invalid configuration".to_string()))
}

fn collect_errors(errors: &ValidationErrors, prefix: String, out: &mut Vec<(String, String)>) {
    use validator::ValidationErrorsKind;

    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{prefix}.{field}")
        };
        match kind {
            ValidationErrorsKind::Field(field_errors) => {
                for error in field_errors {
                    let message = error
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| error.code.to_string());
                    out.push((path.clone(), message));
                }
            }
            ValidationErrorsKind::Struct(nested) => collect_errors(nested, path, out),
            ValidationErrorsKind::List(items) => {
                for (idx, nested) in items {
                    collect_errors(nested, format!("{path}[{idx}]"), out);
                }
            }
        }
    }
}

/// 校验启用的 destination type 唯一性
fn validate_unique_enabled_types(config: &RelayConfig) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for (idx, destination) in config.destinations.iter().enumerate() {
        if destination.enabled && !seen.insert(destination.destination_type.as_str()) {
            return Err(ContractError::config_validation(
                format!("destinations[{}].type", idx),
                format!("duplicate enabled destination type '{}'", destination.destination_type),
            ));
        }
    }
    Ok(())
}

/// 校验内置目的地必填 settings
///
/// 禁用的目的地不校验。
fn validate_builtin_settings(config: &RelayConfig) -> Result<(), ContractError> {
    for (idx, destination) in config.destinations.iter().enumerate() {
        if !destination.enabled {
            continue;
        }
        if let Some(key) = missing_required_setting(destination) {
            return Err(ContractError::config_validation(
                format!("destinations[{}].settings.{}", idx, key),
                format!(
                    "destination '{}' requires setting '{}'",
                    destination.destination_type, key
                ),
            ));
        }
    }
    Ok(())
}

fn missing_required_setting(destination: &DestinationConfig) -> Option<&'static str> {
    REQUIRED_SETTINGS
        .iter()
        .filter(|(ty, _)| *ty == destination.destination_type)
        .map(|(_, key)| *key)
        .find(|key| destination.setting_str(key).is_none_or(str::is_empty))
}
