//! 检测器：编译后的规则
use regex::{Regex, RegexBuilder};

use crate::context::ContextKind;
use crate::error::AnalysisError;
use crate::rules::Rule;

/// 单个正则的编译上限，防止病态规则拖垮扫描
const REGEX_SIZE_LIMIT: usize = 1 << 20;

/// 规则 + 已编译正则 + 上下文准入
#[derive(Debug, Clone)]
pub(crate) struct Detector {
    pub(crate) rule: Rule,
    pub(crate) regex: Regex,
    pub(crate) scan_heredoc: bool,
}

impl Detector {
    /// 编译单条规则；失败只影响这一条
    pub(crate) fn compile(rule: Rule) -> Result<Self, AnalysisError> {
        let regex = RegexBuilder::new(&rule.pattern)
            .case_insensitive(rule.ignore_case)
            .size_limit(REGEX_SIZE_LIMIT)
            .build()
            .map_err(|source| AnalysisError::InvalidPattern { rule_id: rule.id.clone(), source })?;
        let scan_heredoc = rule.heredoc.unwrap_or_else(|| rule.category.scans_heredoc_by_default());
        Ok(Self { rule, regex, scan_heredoc })
    }

    /// 匹配起点所处上下文是否允许该规则命中
    pub(crate) fn accepts(&self, kind: ContextKind) -> bool {
        match kind {
            ContextKind::Normal => true,
            ContextKind::Heredoc => self.scan_heredoc,
            ContextKind::SingleQuote
            | ContextKind::DoubleQuote
            | ContextKind::LineComment
            | ContextKind::UnterminatedHeredoc => false,
        }
    }
}
