//! 批量审计主流程与并行调度
use anyhow::{Context, Result};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use crate::analyze_script;
use crate::options::{AuditOptions, AuditStats};
use crate::registry::{Script, ScriptRegistry};
use crate::rules::RuleRegistry;
use crate::types::AnalysisResult;

/// 审计目录下全部脚本，并将结果以 JSON 数组流式写入 `out`
/// 稳定性保证：
/// - 脚本级：按文件名升序输出，并行与串行结果逐字节一致
/// - 脚本内：发现按 (严重级别降序, 行, 列, 规则 id) 排序
pub fn audit_and_write(input_dir: &Path, out: &mut dyn Write, opts: &AuditOptions) -> Result<AuditStats> {
    let rules = RuleRegistry::with_optional_file(opts.rules_path.as_deref()).context("load rules")?;
    let registry = ScriptRegistry::load(input_dir).context("load scripts")?;
    let scripts = registry.scripts();

    let threads = opts.threads.unwrap_or_else(num_cpus::get);
    let mut stats = AuditStats::default();

    if threads > 1 && scripts.len() > 1 {
        audit_and_write_parallel(&scripts, out, opts, Arc::new(rules), &mut stats, threads)?;
        return Ok(stats);
    }

    // 串行路径
    write!(out, "[")?;
    let mut first = true;
    for script in &scripts {
        let result = analyze_script(script, &rules);
        emit(out, &mut first, &mut stats, opts, &result)?;
    }
    write!(out, "]")?;
    Ok(stats)
}

/// 并行调度：
/// - Rayon 线程池并行分析
/// - 单线程 Writer 按 idx 重排并流式写 JSON，保证稳定顺序
fn audit_and_write_parallel(
    scripts: &[Arc<Script>],
    out: &mut dyn Write,
    opts: &AuditOptions,
    rules: Arc<RuleRegistry>,
    stats: &mut AuditStats,
    threads: usize,
) -> Result<()> {
    use crossbeam_channel as channel;
    use rayon::prelude::*;
    use std::collections::BTreeMap;

    write!(out, "[")?;
    let mut first = true;

    // 通道用于 worker → writer 传递结果
    type Msg = (usize, AnalysisResult);
    let (tx, rx) = channel::bounded::<Msg>(256);

    let pool = rayon::ThreadPoolBuilder::new().num_threads(threads).build().context("build rayon pool")?;
    let jobs: Vec<(usize, Arc<Script>)> = scripts.iter().cloned().enumerate().collect();

    // Writer 持有 &mut out，留在当前线程；分析放到后台线程的线程池里
    let scan_thread = std::thread::spawn(move || {
        pool.install(|| {
            jobs.par_iter().for_each(|(idx, script)| {
                let result = analyze_script(script, &rules);
                let _ = tx.send((*idx, result));
            });
        });
        // 结束后 Sender 全部被丢弃，Receiver 将收到关闭信号
    });

    // Writer：维护 next_idx 与缓存，按序输出
    let mut next_idx: usize = 0;
    let mut buffer: BTreeMap<usize, AnalysisResult> = BTreeMap::new();
    while let Ok((idx, result)) = rx.recv() {
        buffer.insert(idx, result);
        while let Some(result) = buffer.remove(&next_idx) {
            emit(out, &mut first, stats, opts, &result)?;
            next_idx += 1;
        }
    }

    if scan_thread.join().is_err() {
        anyhow::bail!("audit worker panicked");
    }

    write!(out, "]")?;
    Ok(())
}

fn emit(out: &mut dyn Write, first: &mut bool, stats: &mut AuditStats, opts: &AuditOptions, result: &AnalysisResult) -> Result<()> {
    stats.scripts_scanned += 1;
    stats.findings_total += result.findings.len();
    if result.overall_score < opts.min_score {
        debug!(script = %result.script_name, score = result.overall_score, "below min score, omitted");
        return Ok(());
    }
    if !*first { write!(out, ",")?; } else { *first = false; }
    serde_json::to_writer(&mut *out, result)?;
    stats.reports_written += 1;
    Ok(())
}
