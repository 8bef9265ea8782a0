//! 批量审计选项与统计信息（模块）
use std::path::PathBuf;

/// 批量审计选项
#[derive(Debug, Clone, Default)]
pub struct AuditOptions {
    /// 最小分数阈值；低于该分数的报告不输出
    pub min_score: u32,
    /// 追加的规则文件路径（TOML）；为空则只用内置规则
    pub rules_path: Option<PathBuf>,
    /// 线程数：None 表示自动（等于 CPU 核数）；Some(1) 走串行
    pub threads: Option<usize>,
}

/// 审计统计信息（便于 CLI 打印）
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AuditStats {
    pub scripts_scanned: usize,
    pub findings_total: usize,
    pub reports_written: usize,
}
