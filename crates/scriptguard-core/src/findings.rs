//! 命中聚合：去重、排序、打分
use std::cmp::Ordering;
use std::collections::HashSet;

use crate::scan::RawMatch;
use crate::types::{AnalysisResult, Finding, SummaryCounts};

/// 分数上限
pub const MAX_SCORE: u32 = 100;

/// 把原始命中聚合成分析结果
/// - `(rule_id, line, column)` 相同的命中合并为一条
/// - 稳定全序：严重级别降序 → 行升序 → 列升序 → 规则 id 升序
/// - 分数为各级别权重之和，封顶 100；计数是封顶前的逐级统计
pub fn aggregate(script_name: &str, matches: Vec<RawMatch<'_>>) -> AnalysisResult {
    let mut seen: HashSet<(&str, usize, usize)> = HashSet::new();
    let mut findings: Vec<Finding> = Vec::with_capacity(matches.len());
    for m in matches {
        if !seen.insert((m.rule.id.as_str(), m.line, m.column)) { continue; }
        findings.push(Finding {
            rule_id: m.rule.id.clone(),
            category: m.rule.category,
            severity: m.rule.severity,
            line: m.line,
            column: m.column,
            snippet: m.snippet,
            description: m.rule.description.clone(),
            remediation: m.rule.remediation.clone(),
        });
    }

    sort_findings_stable(&mut findings);
    let summary_counts = SummaryCounts::tally(&findings);
    let overall_score = overall_score(&findings);

    AnalysisResult { script_name: script_name.to_string(), overall_score, summary_counts, findings }
}

/// 对发现进行稳定排序：严重级别降序 → 行升序 → 列升序 → 规则 id 升序
pub fn sort_findings_stable(findings: &mut [Finding]) {
    findings.sort_by(|a, b| match b.severity.cmp(&a.severity) {
        Ordering::Equal => match a.line.cmp(&b.line) {
            Ordering::Equal => match a.column.cmp(&b.column) {
                Ordering::Equal => a.rule_id.cmp(&b.rule_id),
                o => o,
            },
            o => o,
        },
        o => o,
    });
}

/// min(100, Σ weight)
pub fn overall_score(findings: &[Finding]) -> u32 {
    let sum = findings.iter().fold(0u32, |acc, f| acc.saturating_add(f.severity.weight()));
    sum.min(MAX_SCORE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::Rule;
    use crate::types::{Category, Severity};

    fn rule(id: &str, severity: Severity) -> Rule {
        Rule {
            id: id.into(),
            category: Category::UnsafePermissions,
            severity,
            pattern: String::new(),
            description: "d".into(),
            remediation: "r".into(),
            keywords: Vec::new(),
            ignore_case: false,
            heredoc: None,
        }
    }

    fn hit(rule: &Rule, line: usize, column: usize) -> RawMatch<'_> {
        RawMatch { rule, line, column, snippet: "s".into() }
    }

    #[test]
    fn empty_input_scores_zero() {
        let r = aggregate("x.sh", Vec::new());
        assert_eq!(r.overall_score, 0);
        assert!(r.findings.is_empty());
        assert_eq!(r.summary_counts.total(), 0);
    }

    #[test]
    fn identical_triples_collapse() {
        let a = rule("a", Severity::High);
        let b = rule("b", Severity::High);
        let r = aggregate("x.sh", vec![hit(&a, 1, 1), hit(&a, 1, 1), hit(&b, 1, 1), hit(&a, 1, 2)]);
        assert_eq!(r.findings.len(), 3);
        assert_eq!(r.summary_counts.high, 3);
        assert_eq!(r.overall_score, 60);
    }

    #[test]
    fn ordering_is_severity_then_position_then_id() {
        let low = rule("low", Severity::Low);
        let crit = rule("crit", Severity::Critical);
        let hi_a = rule("a-high", Severity::High);
        let hi_b = rule("b-high", Severity::High);
        let r = aggregate(
            "x.sh",
            vec![hit(&low, 1, 1), hit(&hi_b, 3, 2), hit(&hi_a, 3, 2), hit(&hi_a, 2, 9), hit(&crit, 9, 1)],
        );
        let order: Vec<(&str, usize, usize)> = r.findings.iter().map(|f| (f.rule_id.as_str(), f.line, f.column)).collect();
        assert_eq!(
            order,
            vec![("crit", 9, 1), ("a-high", 2, 9), ("a-high", 3, 2), ("b-high", 3, 2), ("low", 1, 1)]
        );
    }

    #[test]
    fn score_is_clamped_but_counts_are_not() {
        let crit = rule("c", Severity::Critical);
        let hits: Vec<RawMatch<'_>> = (1..=5).map(|l| hit(&crit, l, 1)).collect();
        let r = aggregate("x.sh", hits);
        assert_eq!(r.overall_score, MAX_SCORE);
        assert_eq!(r.summary_counts.critical, 5);
    }

    #[test]
    fn mixed_weights() {
        let m = rule("m", Severity::Medium);
        let l = rule("l", Severity::Low);
        let r = aggregate("x.sh", vec![hit(&m, 1, 1), hit(&l, 2, 1)]);
        assert_eq!(r.overall_score, 10);
    }
}
