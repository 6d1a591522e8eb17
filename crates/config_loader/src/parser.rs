//! 配置解析模块
//!
//! 支持 TOML (主要) 和 JSON (可选) 格式。

use std::fmt;

use contracts::ContractError;
use serde_json::error::Category;

use crate::config::RelayConfig;

/// 配置文件格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// TOML 格式 (推荐)
    Toml,
    /// JSON 格式
    Json,
}

impl ConfigFormat {
    /// 从文件扩展名推断格式
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// 出错位置所在的配置段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSection {
    /// 顶层 (任何段落之前)
    Root,
    /// `[processor]`
    Processor,
    /// 第 N 个 `[[destinations]]` (从 0 开始)
    Destination(usize),
}

impl fmt::Display for ConfigSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Root => f.write_str("top level"),
            Self::Processor => f.write_str("[processor]"),
            Self::Destination(index) => write!(f, "destinations[{index}]"),
        }
    }
}

/// 解析 TOML 格式配置
pub fn parse_toml(content: &str) -> Result<RelayConfig, ContractError> {
    toml::from_str(content).map_err(|e| {
        let message = match e.span() {
            Some(span) => {
                let (line, column) = line_column(content, span.start);
                format!(
                    "relay config (TOML) error in {} at line {line}, column {column}: {}",
                    toml_section(content, span.start),
                    e.message()
                )
            }
            None => format!("relay config (TOML) error: {}", e.message()),
        };
        ContractError::ConfigParse {
            message,
            source: Some(Box::new(e)),
        }
    })
}

/// 解析 JSON 格式配置
pub fn parse_json(content: &str) -> Result<RelayConfig, ContractError> {
    serde_json::from_str(content).map_err(|e| {
        let kind = match e.classify() {
            Category::Syntax | Category::Eof => "syntax",
            Category::Data => "invalid value",
            Category::Io => "read",
        };
        // serde_json 的 Display 自带 "at line X column Y"
        ContractError::ConfigParse {
            message: format!("relay config (JSON) {kind} error: {e}"),
            source: Some(Box::new(e)),
        }
    })
}

/// 根据格式解析配置
pub fn parse(content: &str, format: ConfigFormat) -> Result<RelayConfig, ContractError> {
    match format {
        ConfigFormat::Toml => parse_toml(content),
        ConfigFormat::Json => parse_json(content),
    }
}

/// 字节偏移 -> (行, 列)，均从 1 开始
fn line_column(content: &str, offset: usize) -> (usize, usize) {
    let before = &content[..floor_char_boundary(content, offset)];
    let line = before.matches('\n').count() + 1;
    let column = before
        .rsplit('\n')
        .next()
        .map_or(0, |tail| tail.chars().count())
        + 1;
    (line, column)
}

/// 向前扫描表头，找到偏移所在的段
fn toml_section(content: &str, offset: usize) -> ConfigSection {
    let before = &content[..floor_char_boundary(content, offset)];
    let mut section = ConfigSection::Root;
    let mut destinations = 0;
    for line in before.lines().map(str::trim) {
        if line.starts_with("[[destinations]]") {
            section = ConfigSection::Destination(destinations);
            destinations += 1;
        } else if line.starts_with("[processor]") {
            section = ConfigSection::Processor;
        }
        // `[destinations.settings]` 等子表沿用当前段
    }
    section
}

fn floor_char_boundary(content: &str, offset: usize) -> usize {
    let mut offset = offset.min(content.len());
    while !content.is_char_boundary(offset) {
        offset -= 1;
    }
    offset
}
