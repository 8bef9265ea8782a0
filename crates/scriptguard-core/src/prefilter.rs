//! 关键字预筛（Aho-Corasick）
//!
//! 每条规则可声明若干关键字：规则的任意一次命中都必然包含其中之一。
//! 扫描某行前先用全局 AC 自动机找出出现过的关键字，只对相关规则跑正则；
//! 没有声明关键字的规则总是参与。预筛只减少工作量，不改变结果。
//!
//! 自动机只做 ASCII 大小写折叠，而 `ignore_case` 规则的正则按 Unicode 折叠（`K` 可匹配 `k`），
//! 所以含非 ASCII 字符的行上，这类规则一律参与。
use aho_corasick::{AhoCorasick, AhoCorasickBuilder, MatchKind};
use tracing::warn;

use crate::detectors::Detector;

pub(crate) struct Prefilter {
    /// 全局关键字自动机；构建失败时为 None（退化为全量扫描）
    ac: Option<AhoCorasick>,
    /// 关键字索引 -> 规则索引列表
    keyword_to_rules: Vec<Vec<usize>>,
    /// 无关键字、每行都要跑的规则
    always: Vec<usize>,
    /// 带关键字的 `ignore_case` 规则；非 ASCII 行上总是参与
    unicode_folded: Vec<usize>,
    rule_count: usize,
}

impl Prefilter {
    pub(crate) fn build(detectors: &[Detector]) -> Self {
        let mut keywords: Vec<String> = Vec::new();
        let mut keyword_to_rules: Vec<Vec<usize>> = Vec::new();
        let mut always = Vec::new();
        let mut unicode_folded = Vec::new();

        for (idx, d) in detectors.iter().enumerate() {
            let kws: Vec<&str> = d.rule.keywords.iter().map(|k| k.as_str()).filter(|k| !k.is_empty()).collect();
            if kws.is_empty() { always.push(idx); continue; }
            if d.rule.ignore_case { unicode_folded.push(idx); }
            for kw in kws {
                let lowered = kw.to_ascii_lowercase();
                let id = match keywords.iter().position(|k| *k == lowered) {
                    Some(id) => id,
                    None => {
                        keywords.push(lowered);
                        keyword_to_rules.push(Vec::new());
                        keywords.len() - 1
                    }
                };
                if !keyword_to_rules[id].contains(&idx) { keyword_to_rules[id].push(idx); }
            }
        }

        let ac = if keywords.is_empty() {
            None
        } else {
            match AhoCorasickBuilder::new()
                .match_kind(MatchKind::Standard)
                .ascii_case_insensitive(true)
                .build(&keywords)
            {
                Ok(ac) => Some(ac),
                Err(err) => {
                    warn!(%err, "keyword prefilter unavailable, every rule runs on every line");
                    always = (0..detectors.len()).collect();
                    keyword_to_rules.iter_mut().for_each(Vec::clear);
                    None
                }
            }
        };

        Self { ac, keyword_to_rules, always, unicode_folded, rule_count: detectors.len() }
    }

    /// 本行需要运行的规则索引（升序，即注册顺序）
    pub(crate) fn candidates(&self, line: &str) -> Vec<usize> {
        let mut hit = vec![false; self.rule_count];
        for &ri in &self.always { hit[ri] = true; }
        if !line.is_ascii() {
            for &ri in &self.unicode_folded { hit[ri] = true; }
        }
        if let Some(ac) = &self.ac {
            // 关键字之间可能互为子串（pass / password），需要重叠匹配
            for m in ac.find_overlapping_iter(line) {
                for &ri in &self.keyword_to_rules[m.pattern().as_usize()] { hit[ri] = true; }
            }
        }
        hit.iter().enumerate().filter(|(_, h)| **h).map(|(i, _)| i).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::Rule;
    use crate::types::{Category, Severity};

    fn det(id: &str, keywords: &[&str]) -> Detector {
        Detector::compile(Rule {
            id: id.into(),
            category: Category::RemoteCodeExec,
            severity: Severity::High,
            pattern: "x".into(),
            description: String::new(),
            remediation: String::new(),
            keywords: keywords.iter().map(|s| s.to_string()).collect(),
            ignore_case: false,
            heredoc: None,
        })
        .unwrap()
    }

    #[test]
    fn selects_rules_by_keyword_case_insensitively() {
        let dets = vec![det("a", &["curl", "wget"]), det("b", &[]), det("c", &["chmod"])];
        let pf = Prefilter::build(&dets);
        assert_eq!(pf.candidates("CURL x"), vec![0, 1]);
        assert_eq!(pf.candidates("chmod 777 x"), vec![1, 2]);
        assert_eq!(pf.candidates("echo hi"), vec![1]);
    }

    #[test]
    fn ignore_case_rules_run_on_non_ascii_lines() {
        let mut folded = det("a", &["key"]);
        folded.rule.ignore_case = true;
        let dets = vec![folded, det("b", &["key"])];
        let pf = Prefilter::build(&dets);
        // U+212A KELVIN SIGN 按 Unicode 折叠等于 k
        assert_eq!(pf.candidates("api_\u{212A}ey=x"), vec![0]);
        assert!(pf.candidates("api_xey=x").is_empty());
        assert_eq!(pf.candidates("API_KEY=x"), vec![0, 1]);
    }

    #[test]
    fn overlapping_keywords_both_fire() {
        let dets = vec![det("a", &["pass"]), det("b", &["password"])];
        let pf = Prefilter::build(&dets);
        assert_eq!(pf.candidates("PASSWORD=x"), vec![0, 1]);
    }
}
