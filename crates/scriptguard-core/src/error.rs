//! 错误类型
use std::path::PathBuf;
use thiserror::Error;

/// 启动期加载脚本目录失败（致命）
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("script directory {path} is not a directory")]
    NotADirectory { path: PathBuf },
    #[error("cannot read script directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
    #[error("cannot read script {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// 单条规则不可用。只影响该规则本身：规则被跳过，其余规则照常扫描
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("rule {rule_id}: invalid pattern: {source}")]
    InvalidPattern {
        rule_id: String,
        #[source]
        source: regex::Error,
    },
    #[error("rule {rule_id}: duplicate rule id")]
    DuplicateRuleId { rule_id: String },
    #[error("rule with empty id (pattern {pattern:?})")]
    EmptyRuleId { pattern: String },
}

impl AnalysisError {
    pub fn rule_id(&self) -> &str {
        match self {
            AnalysisError::InvalidPattern { rule_id, .. } | AnalysisError::DuplicateRuleId { rule_id } => rule_id,
            AnalysisError::EmptyRuleId { .. } => "",
        }
    }
}

/// 规则文件（TOML）读取/解析失败
#[derive(Debug, Error)]
pub enum RuleFileError {
    #[error("cannot read rule file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed rule file: {0}")]
    Parse(#[from] toml::de::Error),
}
