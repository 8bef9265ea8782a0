//! 词法上下文跟踪（单遍、从左到右）
//!
//! 为脚本的每个字节偏移记录所属上下文：普通代码、单引号、双引号、行注释、heredoc 正文。
//! 上下文之间不嵌套（双引号里的 `$( ... )` 仍算双引号），这是有意的简化：
//! 引擎只需要判断一处文本是不是"活代码"，不做完整的 shell 语法分析。
//!
//! 未闭合的引号 / heredoc 会一直延续到输入末尾；未闭合的 heredoc 正文单独标记，扫描时整体跳过。
use std::collections::VecDeque;

/// 单字节的上下文类别（紧凑表示，逐字节存储）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextKind {
    Normal,
    SingleQuote,
    DoubleQuote,
    LineComment,
    Heredoc,
    /// 没有结束行的 heredoc 正文
    UnterminatedHeredoc,
}

/// 完整上下文（heredoc 带分隔符）
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Context {
    Normal,
    SingleQuote,
    DoubleQuote,
    LineComment,
    Heredoc(String),
}

/// heredoc 正文区间 `[start, end)`，含结束行
#[derive(Debug, Clone, PartialEq, Eq)]
struct HeredocSpan {
    start: usize,
    end: usize,
    delimiter: String,
}

/// 等待开始的 heredoc（`<<EOF` 所在行结束后才进入正文）
#[derive(Debug, Clone)]
struct PendingHeredoc {
    delimiter: String,
    strip_tabs: bool,
}

/// 扫描状态
enum Mode {
    Normal,
    Single,
    Double,
    Comment,
    Heredoc { delimiter: String, strip_tabs: bool, start: usize },
}

/// 逐字节上下文表
#[derive(Debug, Clone)]
pub struct ContextMap {
    kinds: Vec<ContextKind>,
    heredocs: Vec<HeredocSpan>,
}

impl ContextMap {
    /// 对整段脚本做一遍扫描
    pub fn build(text: &str) -> Self {
        let b = text.as_bytes();
        let n = b.len();
        let mut kinds = vec![ContextKind::Normal; n];
        let mut heredocs = Vec::new();
        let mut pending: VecDeque<PendingHeredoc> = VecDeque::new();
        let mut mode = Mode::Normal;
        let mut i = 0usize;

        while i < n {
            match mode {
                Mode::Normal => {
                    let c = b[i];
                    match c {
                        b'\\' => {
                            // 转义下一个字节（含续行）
                            i += 2;
                        }
                        b'\n' => {
                            i += 1;
                            if let Some(p) = pending.pop_front() {
                                mode = Mode::Heredoc { delimiter: p.delimiter, strip_tabs: p.strip_tabs, start: i };
                            }
                        }
                        b'\'' => {
                            kinds[i] = ContextKind::SingleQuote;
                            mode = Mode::Single;
                            i += 1;
                        }
                        b'"' => {
                            kinds[i] = ContextKind::DoubleQuote;
                            mode = Mode::Double;
                            i += 1;
                        }
                        b'#' if is_word_start(b, i) => {
                            kinds[i] = ContextKind::LineComment;
                            mode = Mode::Comment;
                            i += 1;
                        }
                        b'<' if b.get(i + 1) == Some(&b'<') => {
                            if b.get(i + 2) == Some(&b'<') {
                                // here-string，不是 heredoc
                                i += 3;
                            } else if let Some((p, next)) = parse_heredoc_start(b, i) {
                                pending.push_back(p);
                                i = next;
                            } else {
                                i += 2;
                            }
                        }
                        _ => i += 1,
                    }
                }
                Mode::Single => {
                    kinds[i] = ContextKind::SingleQuote;
                    if b[i] == b'\'' { mode = Mode::Normal; }
                    i += 1;
                }
                Mode::Double => {
                    kinds[i] = ContextKind::DoubleQuote;
                    match b[i] {
                        b'\\' => {
                            if i + 1 < n { kinds[i + 1] = ContextKind::DoubleQuote; }
                            i += 2;
                        }
                        b'"' => {
                            mode = Mode::Normal;
                            i += 1;
                        }
                        _ => i += 1,
                    }
                }
                Mode::Comment => {
                    if b[i] == b'\n' {
                        i += 1;
                        mode = match pending.pop_front() {
                            Some(p) => Mode::Heredoc { delimiter: p.delimiter, strip_tabs: p.strip_tabs, start: i },
                            None => Mode::Normal,
                        };
                    } else {
                        kinds[i] = ContextKind::LineComment;
                        i += 1;
                    }
                }
                Mode::Heredoc { ref delimiter, strip_tabs, start } => {
                    // heredoc 按整行处理
                    let line_end = b[i..].iter().position(|&c| c == b'\n').map_or(n, |p| i + p);
                    for k in &mut kinds[i..line_end] { *k = ContextKind::Heredoc; }
                    let mut line = &b[i..line_end];
                    if let Some(stripped) = line.strip_suffix(b"\r") { line = stripped; }
                    if strip_tabs {
                        let tabs = line.iter().take_while(|&&c| c == b'\t').count();
                        line = &line[tabs..];
                    }
                    let terminated = line == delimiter.as_bytes();
                    if terminated {
                        heredocs.push(HeredocSpan { start, end: line_end, delimiter: delimiter.clone() });
                    } else if line_end < n {
                        kinds[line_end] = ContextKind::Heredoc;
                    }
                    i = line_end + 1;
                    if terminated {
                        mode = match pending.pop_front() {
                            Some(p) => Mode::Heredoc { delimiter: p.delimiter, strip_tabs: p.strip_tabs, start: i.min(n) },
                            None => Mode::Normal,
                        };
                    }
                }
            }
        }

        // 未闭合的 heredoc 延续到末尾
        if let Mode::Heredoc { delimiter, start, .. } = mode {
            for k in &mut kinds[start.min(n)..] {
                if *k == ContextKind::Heredoc { *k = ContextKind::UnterminatedHeredoc; }
            }
            heredocs.push(HeredocSpan { start, end: n, delimiter });
        }

        Self { kinds, heredocs }
    }

    /// 字节偏移处的上下文类别；越界返回 `Normal`
    pub fn kind_at(&self, offset: usize) -> ContextKind {
        self.kinds.get(offset).copied().unwrap_or(ContextKind::Normal)
    }

    /// 字节偏移处的完整上下文
    pub fn context_at(&self, offset: usize) -> Context {
        match self.kind_at(offset) {
            ContextKind::Normal => Context::Normal,
            ContextKind::SingleQuote => Context::SingleQuote,
            ContextKind::DoubleQuote => Context::DoubleQuote,
            ContextKind::LineComment => Context::LineComment,
            ContextKind::Heredoc | ContextKind::UnterminatedHeredoc => {
                let delimiter = self
                    .heredocs
                    .iter()
                    .find(|h| h.start <= offset && offset <= h.end)
                    .map(|h| h.delimiter.clone())
                    .unwrap_or_default();
                Context::Heredoc(delimiter)
            }
        }
    }

    pub fn len(&self) -> usize { self.kinds.len() }

    pub fn is_empty(&self) -> bool { self.kinds.is_empty() }
}

/// `#` 只在词首开启注释（`$#`、`${#a[@]}`、`a#b` 都不是注释）
fn is_word_start(b: &[u8], i: usize) -> bool {
    if i == 0 { return true; }
    matches!(b[i - 1], b' ' | b'\t' | b'\n' | b'\r' | b';' | b'&' | b'|' | b'(' | b')')
}

/// 识别 `<<` / `<<-` 后的分隔符。返回待定 heredoc 与分隔符之后的偏移
fn parse_heredoc_start(b: &[u8], at: usize) -> Option<(PendingHeredoc, usize)> {
    let n = b.len();
    let mut j = at + 2;
    let strip_tabs = b.get(j) == Some(&b'-');
    if strip_tabs { j += 1; }
    while j < n && matches!(b[j], b' ' | b'\t') { j += 1; }

    let mut delim: Vec<u8> = Vec::new();
    let mut quote: Option<u8> = None;
    while j < n {
        let c = b[j];
        match quote {
            Some(q) => {
                if c == q { quote = None; } else if c == b'\n' { return None; } else { delim.push(c); }
                j += 1;
            }
            None => {
                if c.is_ascii_whitespace() || matches!(c, b';' | b'&' | b'|' | b'<' | b'>' | b'(' | b')') {
                    break;
                }
                match c {
                    b'\'' | b'"' => quote = Some(c),
                    b'\\' => {
                        if let Some(&next) = b.get(j + 1) { delim.push(next); }
                        j += 1;
                    }
                    _ => delim.push(c),
                }
                j += 1;
            }
        }
    }
    if quote.is_some() { return None; }
    // 空分隔符或数字开头（算术移位 `1 << 2`）不视为 heredoc
    match delim.first() {
        None => None,
        Some(c) if c.is_ascii_digit() => None,
        Some(_) => {
            let delimiter = String::from_utf8_lossy(&delim).into_owned();
            Some((PendingHeredoc { delimiter, strip_tabs }, j))
        }
    }
}
