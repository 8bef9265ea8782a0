//! 规则注册表（TOML 驱动，启动时加载一次，之后只读）
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, warn};

use crate::detectors::Detector;
use crate::error::{AnalysisError, RuleFileError};
use crate::prefilter::Prefilter;
use crate::types::{Category, Severity};

/// 内置规则目录
const DEFAULT_RULES: &str = include_str!("../rules/default.toml");

/// 单条检测规则
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub id: String,
    pub category: Category,
    pub severity: Severity,
    pub pattern: String,
    pub description: String,
    pub remediation: String,
    /// 预筛关键字：规则的每次命中都必须包含其中之一；为空表示每行都跑
    pub keywords: Vec<String>,
    /// 整条正则大小写不敏感（密钥名启发式用）
    pub ignore_case: bool,
    /// 是否扫描 heredoc 正文；None 时按类别默认
    pub heredoc: Option<bool>,
}

/// 规则文件中的条目（支持 pattern 或 regex 字段）
#[derive(Debug, Clone, Deserialize)]
struct RuleEntry {
    id: String,
    category: Category,
    severity: Severity,
    #[serde(default)]
    pattern: Option<String>,
    #[serde(default)]
    regex: Option<String>,
    #[serde(default)]
    description: String,
    #[serde(default)]
    remediation: String,
    #[serde(default)]
    keywords: Vec<String>,
    #[serde(default)]
    ignore_case: bool,
    #[serde(default)]
    heredoc: Option<bool>,
}

/// 顶层规则文件结构
#[derive(Debug, Clone, Deserialize)]
struct RuleFile {
    #[serde(default)]
    rules: Vec<RuleEntry>,
}

/// 解析 TOML 文本为规则列表（保持文件内顺序）
pub fn parse_rules(src: &str) -> Result<Vec<Rule>, RuleFileError> {
    let parsed: RuleFile = toml::from_str(src)?;
    let mut out = Vec::with_capacity(parsed.rules.len());
    for e in parsed.rules {
        // 兼容两种字段名：pattern 或 regex
        let pattern = match (e.pattern, e.regex) {
            (Some(p), _) => p,
            (None, Some(r)) => r,
            _ => {
                warn!(rule_id = %e.id, "rule has no pattern, ignored");
                continue;
            }
        };
        out.push(Rule {
            id: e.id,
            category: e.category,
            severity: e.severity,
            pattern,
            description: e.description,
            remediation: e.remediation,
            keywords: e.keywords,
            ignore_case: e.ignore_case,
            heredoc: e.heredoc,
        });
    }
    Ok(out)
}

/// 从 TOML 规则文件加载规则列表
pub fn load_rules(path: &Path) -> Result<Vec<Rule>, RuleFileError> {
    let txt = std::fs::read_to_string(path).map_err(|source| RuleFileError::Io { path: path.to_path_buf(), source })?;
    parse_rules(&txt)
}

/// 内置规则目录（可在其后追加自定义规则再构建注册表）
pub fn builtin_rules() -> Result<Vec<Rule>, RuleFileError> {
    parse_rules(DEFAULT_RULES)
}

/// 有序、不可变的规则集合
pub struct RuleRegistry {
    detectors: Vec<Detector>,
    prefilter: Prefilter,
    skipped: Vec<AnalysisError>,
}

impl RuleRegistry {
    /// 编译规则。非法正则、重复 id 的规则被跳过并记录日志，其余规则不受影响
    pub fn from_rules(rules: Vec<Rule>) -> Self {
        let mut detectors = Vec::with_capacity(rules.len());
        let mut skipped = Vec::new();
        let mut ids: HashSet<String> = HashSet::new();

        for rule in rules {
            if rule.id.trim().is_empty() {
                skipped.push(AnalysisError::EmptyRuleId { pattern: rule.pattern });
                continue;
            }
            if ids.contains(&rule.id) {
                skipped.push(AnalysisError::DuplicateRuleId { rule_id: rule.id });
                continue;
            }
            match Detector::compile(rule) {
                Ok(d) => {
                    ids.insert(d.rule.id.clone());
                    detectors.push(d);
                }
                Err(err) => skipped.push(err),
            }
        }
        for err in &skipped {
            warn!(rule_id = err.rule_id(), %err, "rule skipped");
        }
        debug!(active = detectors.len(), skipped = skipped.len(), "rule registry built");

        let prefilter = Prefilter::build(&detectors);
        Self { detectors, prefilter, skipped }
    }

    /// 仅内置规则
    pub fn builtin() -> Result<Self, RuleFileError> {
        Ok(Self::from_rules(builtin_rules()?))
    }

    /// 内置规则 + TOML 文本中的规则（追加在后）
    pub fn from_toml_str(src: &str) -> Result<Self, RuleFileError> {
        let mut rules = builtin_rules()?;
        rules.extend(parse_rules(src)?);
        Ok(Self::from_rules(rules))
    }

    /// 内置规则 + 规则文件（追加在后）
    pub fn load(path: &Path) -> Result<Self, RuleFileError> {
        let mut rules = builtin_rules()?;
        rules.extend(load_rules(path)?);
        Ok(Self::from_rules(rules))
    }

    /// `Some(path)` 时追加规则文件，否则只用内置规则
    pub fn with_optional_file(path: Option<&Path>) -> Result<Self, RuleFileError> {
        match path {
            Some(p) => Self::load(p),
            None => Self::builtin(),
        }
    }

    /// 生效的规则（注册顺序）
    pub fn rules(&self) -> impl Iterator<Item = &Rule> + '_ {
        self.detectors.iter().map(|d| &d.rule)
    }

    pub fn get(&self, id: &str) -> Option<&Rule> {
        self.rules().find(|r| r.id == id)
    }

    /// 被跳过的规则及原因
    pub fn skipped(&self) -> &[AnalysisError] {
        &self.skipped
    }

    pub fn len(&self) -> usize {
        self.detectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detectors.is_empty()
    }

    pub(crate) fn detectors(&self) -> &[Detector] {
        &self.detectors
    }

    pub(crate) fn prefilter(&self) -> &Prefilter {
        &self.prefilter
    }
}
