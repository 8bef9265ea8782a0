//! 公共类型（对外暴露）：严重级别、类别、单条发现与分析结果
use serde::{Deserialize, Serialize};
use std::fmt;

/// 严重级别（按风险升序声明，派生的 `Ord` 即风险大小）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// 评分权重。固定值，修改会改变所有历史报告的分数
    pub const fn weight(self) -> u32 {
        match self {
            Severity::Critical => 40,
            Severity::High => 20,
            Severity::Medium => 8,
            Severity::Low => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
            Severity::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 规则类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    /// 下载内容直接交给解释器 / eval
    RemoteCodeExec,
    /// 硬编码或回显凭据
    CredentialLeak,
    /// 全局可写、setuid 等权限放宽
    UnsafePermissions,
    /// 未加校验的提权
    PrivilegeEscalation,
    /// 明文协议 / 关闭证书校验
    InsecureTransport,
    /// 外部输入未加引号拼进命令
    CommandInjection,
    /// 破坏性磁盘/文件系统操作
    DestructiveOperation,
}

impl Category {
    /// 该类别的规则是否默认扫描 heredoc 正文。
    /// heredoc 常被管道交给解释器，所以代码类规则都扫；
    /// 注入类规则针对的是命令行参数拆分，正文里的 `$1` 只是文本展开。
    pub fn scans_heredoc_by_default(self) -> bool {
        !matches!(self, Category::CommandInjection)
    }
}

/// 单条发现（对应 JSON 响应中 findings 数组的元素）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    pub rule_id: String,
    pub category: Category,
    pub severity: Severity,
    /// 行号，从 1 开始
    pub line: usize,
    /// 列号（字符计），从 1 开始
    pub column: usize,
    pub snippet: String,
    pub description: String,
    pub remediation: String,
}

/// 各级别计数（四个键始终输出）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryCounts {
    #[serde(rename = "LOW")]
    pub low: usize,
    #[serde(rename = "MEDIUM")]
    pub medium: usize,
    #[serde(rename = "HIGH")]
    pub high: usize,
    #[serde(rename = "CRITICAL")]
    pub critical: usize,
}

impl SummaryCounts {
    pub fn tally(findings: &[Finding]) -> Self {
        let mut counts = Self::default();
        for f in findings {
            match f.severity {
                Severity::Low => counts.low += 1,
                Severity::Medium => counts.medium += 1,
                Severity::High => counts.high += 1,
                Severity::Critical => counts.critical += 1,
            }
        }
        counts
    }

    pub fn get(&self, severity: Severity) -> usize {
        match severity {
            Severity::Low => self.low,
            Severity::Medium => self.medium,
            Severity::High => self.high,
            Severity::Critical => self.critical,
        }
    }

    pub fn total(&self) -> usize {
        self.low + self.medium + self.high + self.critical
    }
}

/// 单个脚本的分析结果（值对象，不持久化）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub script_name: String,
    /// 0..=100
    pub overall_score: u32,
    pub summary_counts: SummaryCounts,
    pub findings: Vec<Finding>,
}
