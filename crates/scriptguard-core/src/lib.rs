//! Shell 脚本安全分析引擎
//!
//! 设计要点：
//! - 词法上下文跟踪（引号 / 注释 / heredoc）决定一段文本是否为"活代码"，注释和字符串里的模式不报。
//! - heredoc 正文例外：它常被管道交给解释器，默认参与代码类规则扫描。
//! - 规则由 TOML 声明，按注册顺序执行；关键字预筛（Aho-Corasick）只减少工作量，不影响结果。
//! - 整条流水线是 `(content, rules)` 的纯函数：无共享可变状态，可任意并发调用，结果可复现。

mod audit;
mod context;
mod detectors;
mod error;
mod findings;
mod options;
mod prefilter;
mod registry;
mod rules;
mod scan;
mod types;

pub use audit::audit_and_write;
pub use context::{Context, ContextKind, ContextMap};
pub use error::{AnalysisError, LoadError, RuleFileError};
pub use findings::{aggregate, overall_score, sort_findings_stable, MAX_SCORE};
pub use options::{AuditOptions, AuditStats};
pub use registry::{Script, ScriptRegistry, SCRIPT_SUFFIX};
pub use rules::{builtin_rules, load_rules, parse_rules, Rule, RuleRegistry};
pub use scan::{scan, RawMatch};
pub use types::{AnalysisResult, Category, Finding, Severity, SummaryCounts};

/// 分析一段脚本内容
pub fn analyze(script_name: &str, content: &str, rules: &RuleRegistry) -> AnalysisResult {
    let result = aggregate(script_name, scan(content, rules));
    tracing::debug!(script = script_name, findings = result.findings.len(), score = result.overall_score, "script analyzed");
    result
}

/// 分析已加载的脚本（结果以文件名标识）
pub fn analyze_script(script: &Script, rules: &RuleRegistry) -> AnalysisResult {
    analyze(&script.filename, &script.content, rules)
}
