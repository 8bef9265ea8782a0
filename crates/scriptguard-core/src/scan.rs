//! 扫描器：逐行、带上下文地运行规则，产出原始命中
use crate::context::{ContextKind, ContextMap};
use crate::rules::{Rule, RuleRegistry};

/// 片段最大长度（字符）
pub(crate) const SNIPPET_MAX_CHARS: usize = 200;

/// 一次原始命中（未去重、未排序）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMatch<'r> {
    pub rule: &'r Rule,
    /// 从 1 开始
    pub line: usize,
    /// 从 1 开始，按字符计
    pub column: usize,
    pub snippet: String,
}

/// 扫描整段脚本
/// - 上下文跨行延续（引号、heredoc 可以跨行），由 `ContextMap` 一次算出
/// - 匹配起点处于允许的上下文才记为命中；命中本身可以延伸进引号，但不会延伸进行注释
/// - 同一位置可被多条规则命中，这一层不做抑制
pub fn scan<'r>(content: &str, rules: &'r RuleRegistry) -> Vec<RawMatch<'r>> {
    let ctx = ContextMap::build(content);
    let detectors = rules.detectors();
    let mut out = Vec::new();
    let mut offset = 0usize;

    for (idx, raw_line) in content.split_inclusive('\n').enumerate() {
        let base = offset;
        offset += raw_line.len();
        let line = raw_line.strip_suffix('\n').unwrap_or(raw_line);
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.trim().is_empty() { continue; }
        // 行注释之后的内容不参与匹配
        let code = match (0..line.len()).find(|&j| ctx.kind_at(base + j) == ContextKind::LineComment) {
            Some(cut) => &line[..cut],
            None => line,
        };
        if code.trim().is_empty() { continue; }

        let mut snippet: Option<String> = None;
        for ri in rules.prefilter().candidates(code) {
            let det = &detectors[ri];
            let mut at = 0usize;
            while at <= code.len() {
                let m = match det.regex.find_at(code, at) { Some(m) => m, None => break };
                let next = next_char_boundary(code, m.start());
                if det.accepts(ctx.kind_at(base + m.start())) {
                    let snippet = snippet.get_or_insert_with(|| make_snippet(line)).clone();
                    out.push(RawMatch {
                        rule: &det.rule,
                        line: idx + 1,
                        column: line[..m.start()].chars().count() + 1,
                        snippet,
                    });
                    at = if m.end() > m.start() { m.end() } else { next };
                } else {
                    // 起点不可用：从下一个字符重新找，避免遮住后面真正的命中
                    at = next;
                }
            }
        }
    }

    out
}

/// `pos` 之后下一个字符边界；位于末尾时返回 `len + 1` 以结束循环
fn next_char_boundary(s: &str, pos: usize) -> usize {
    match s[pos..].chars().next() {
        Some(c) => pos + c.len_utf8(),
        None => s.len() + 1,
    }
}

/// 去掉首尾空白，超长截断
fn make_snippet(line: &str) -> String {
    let t = line.trim();
    if t.chars().count() <= SNIPPET_MAX_CHARS { return t.to_string(); }
    let mut s: String = t.chars().take(SNIPPET_MAX_CHARS).collect();
    s.push('…');
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::Rule;
    use crate::types::{Category, Severity};

    fn registry(rules: &[(&str, Category, &str)]) -> RuleRegistry {
        RuleRegistry::from_rules(
            rules
                .iter()
                .map(|(id, cat, pat)| Rule {
                    id: id.to_string(),
                    category: *cat,
                    severity: Severity::High,
                    pattern: pat.to_string(),
                    description: String::new(),
                    remediation: String::new(),
                    keywords: Vec::new(),
                    ignore_case: false,
                    heredoc: None,
                })
                .collect(),
        )
    }

    #[test]
    fn positions_are_one_based_and_count_chars() {
        let reg = registry(&[("x", Category::RemoteCodeExec, "boom")]);
        let m = scan("ok\n  é boom\n", &reg);
        assert_eq!(m.len(), 1);
        assert_eq!((m[0].line, m[0].column), (2, 5));
        assert_eq!(m[0].snippet, "é boom");
    }

    #[test]
    fn quoted_and_commented_starts_are_skipped_but_later_live_match_is_found() {
        let reg = registry(&[("x", Category::RemoteCodeExec, r"boom.*")]);
        // 第一个 boom 在引号内，贪婪匹配会吞掉整行；重试后仍能找到第二个
        let m = scan("echo \"boom\" ; boom now # boom\n", &reg);
        assert_eq!(m.len(), 1);
        assert_eq!(m[0].column, 15);
    }

    #[test]
    fn matches_do_not_run_into_trailing_comments() {
        let reg = registry(&[("x", Category::RemoteCodeExec, r"curl.*\|\s*sh")]);
        assert!(scan("curl -o f https://x # | sh\n", &reg).is_empty());
        let m = scan("curl https://x | sh # fine\n", &reg);
        assert_eq!(m.len(), 1);
        assert_eq!(m[0].snippet, "curl https://x | sh # fine");
    }

    #[test]
    fn unterminated_heredoc_body_is_skipped() {
        let reg = registry(&[("x", Category::RemoteCodeExec, "boom")]);
        assert!(scan("cat <<EOF\nboom\nboom\n", &reg).is_empty());
        assert_eq!(scan("cat <<EOF\nboom\nEOF\n", &reg).len(), 1);
    }

    #[test]
    fn heredoc_admission_per_category() {
        let reg = registry(&[
            ("code", Category::RemoteCodeExec, "boom"),
            ("inj", Category::CommandInjection, "boom"),
        ]);
        let m = scan("cat <<EOF\nboom\nEOF\n", &reg);
        assert_eq!(m.len(), 1);
        assert_eq!(m[0].rule.id, "code");
        assert_eq!(m[0].line, 2);
    }

    #[test]
    fn multiple_hits_per_line_and_crlf() {
        let reg = registry(&[("x", Category::RemoteCodeExec, "ab")]);
        let m = scan("ab ab\r\nab", &reg);
        let pos: Vec<(usize, usize)> = m.iter().map(|r| (r.line, r.column)).collect();
        assert_eq!(pos, vec![(1, 1), (1, 4), (2, 1)]);
        assert_eq!(m[0].snippet, "ab ab");
    }

    #[test]
    fn long_lines_are_truncated_in_snippet() {
        let reg = registry(&[("x", Category::RemoteCodeExec, "boom")]);
        let line = format!("boom {}", "a".repeat(500));
        let m = scan(&line, &reg);
        assert_eq!(m[0].snippet.chars().count(), SNIPPET_MAX_CHARS + 1);
    }
}
