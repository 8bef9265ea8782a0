use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use scriptguard_core::{analyze, audit_and_write, AuditOptions, RuleRegistry};
use scriptguard_server::{issue_token, unix_now, ServerConfig, DEFAULT_CONFIG_PATH};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use tracing::info;

/// 命令行入口（基于 clap）
#[derive(Parser, Debug)]
#[command(name = "scriptguard", version, about = "Shell 脚本安全分析")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 启动 HTTP 服务
    Serve {
        /// 配置文件（JSON）
        #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,
    },

    /// 分析单个脚本并打印结果
    Analyze {
        file: PathBuf,

        /// 追加的规则文件（TOML）
        #[arg(long)]
        rules: Option<PathBuf>,

        #[arg(long)]
        pretty: bool,
    },

    /// 审计目录下全部 .sh 脚本并生成 JSON 数组
    Audit {
        #[arg(long)]
        input: PathBuf,

        #[arg(long, default_value = "./result.json")]
        output: PathBuf,

        /// 线程数（"auto"=CPU 核心数）
        #[arg(long, default_value = "auto")]
        threads: String,

        /// 低于该分数的脚本不写入结果
        #[arg(long, default_value_t = 0)]
        min_score: u32,

        #[arg(long)]
        rules: Option<PathBuf>,
    },

    /// 用配置中的密钥签发访问令牌
    Token {
        #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,

        #[arg(long, default_value = "operator")]
        subject: String,

        /// 有效期（秒）
        #[arg(long, default_value_t = 3600)]
        ttl: i64,
    },
}

fn main() -> Result<()> {
    // 初始化日志（支持通过 RUST_LOG 控制等级，例如 info、debug）
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config } => {
            let cfg = ServerConfig::load(&config).with_context(|| format!("load config {}", config.display()))?;
            info!(config = ?cfg, "starting server");
            let rt = tokio::runtime::Runtime::new().context("build tokio runtime")?;
            rt.block_on(scriptguard_server::run(cfg))?;
        }
        Commands::Analyze { file, rules, pretty } => {
            let registry = RuleRegistry::with_optional_file(rules.as_deref()).context("load rules")?;
            let bytes = std::fs::read(&file).with_context(|| format!("read {}", file.display()))?;
            let content = String::from_utf8_lossy(&bytes);
            let name = file.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
            let result = analyze(&name, &content, &registry);

            let stdout = std::io::stdout();
            let mut out = stdout.lock();
            if pretty {
                serde_json::to_writer_pretty(&mut out, &result)?;
            } else {
                serde_json::to_writer(&mut out, &result)?;
            }
            writeln!(out)?;
        }
        Commands::Audit { input, output, threads, min_score, rules } => {
            info!(?input, ?output, "starting audit");

            // 以缓冲方式打开输出文件，按 JSON 数组流式写入
            let mut out = BufWriter::new(File::create(&output).context("create output file")?);
            let opts = AuditOptions { min_score, rules_path: rules, threads: parse_threads(&threads) };
            let stats = audit_and_write(&input, &mut out, &opts).context("audit and write failed")?;
            out.flush().context("flush output")?;

            info!(
                scripts_scanned = stats.scripts_scanned,
                findings_total = stats.findings_total,
                reports_written = stats.reports_written,
                "audit finished"
            );
        }
        Commands::Token { config, subject, ttl } => {
            let cfg = ServerConfig::load(&config).with_context(|| format!("load config {}", config.display()))?;
            println!("{}", issue_token(cfg.signing_secret.as_bytes(), &subject, ttl, unix_now()));
        }
    }

    Ok(())
}

fn init_tracing() {
    use tracing_subscriber::{EnvFilter, FmtSubscriber};
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // 日志写 stderr，stdout 留给 JSON 输出
    let subscriber = FmtSubscriber::builder().with_env_filter(env_filter).with_writer(std::io::stderr).finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

/// 解析线程参数："auto" 或非法值表示自动
fn parse_threads(s: &str) -> Option<usize> {
    if s.eq_ignore_ascii_case("auto") { return None; }
    match s.parse::<usize>() {
        Ok(n) if n >= 1 => Some(n),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threads_argument() {
        assert_eq!(parse_threads("auto"), None);
        assert_eq!(parse_threads("AUTO"), None);
        assert_eq!(parse_threads("4"), Some(4));
        assert_eq!(parse_threads("0"), None);
        assert_eq!(parse_threads("many"), None);
    }

    #[test]
    fn cli_parses_subcommands() {
        let cli = Cli::try_parse_from(["scriptguard", "audit", "--input", "scripts", "--min-score", "20"]).unwrap();
        match cli.command {
            Commands::Audit { min_score, threads, output, .. } => {
                assert_eq!(min_score, 20);
                assert_eq!(threads, "auto");
                assert_eq!(output, PathBuf::from("./result.json"));
            }
            other => panic!("unexpected {other:?}"),
        }
        let cli = Cli::try_parse_from(["scriptguard", "serve"]).unwrap();
        assert!(matches!(cli.command, Commands::Serve { config } if config == PathBuf::from("config.json")));
    }
}
