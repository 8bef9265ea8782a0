//! 脚本分析 HTTP 服务
//!
//! - `GET /scripts`：列出已加载脚本（无需认证）
//! - `GET /analyze?script=<文件名>`：需 Bearer 令牌，返回分析结果
//! - `POST /scripts/reload`：需 Bearer 令牌，重新读取脚本目录

pub mod auth;
pub mod config;
pub mod error;
pub mod router;

use anyhow::{Context, Result};
use scriptguard_core::{RuleRegistry, ScriptRegistry};
use tokio::net::TcpListener;
use tracing::{info, warn};

pub use auth::{issue_token, unix_now, verify_token, AuthError, Claims};
pub use config::{ConfigError, ServerConfig, DEFAULT_CONFIG_PATH};
pub use error::ApiError;
pub use router::{build_router, AppState};

/// 按配置构建共享状态：规则与脚本任一加载失败都拒绝启动
pub fn build_state(config: &ServerConfig) -> Result<AppState> {
    let rules = RuleRegistry::with_optional_file(config.rules_path.as_deref()).context("load rules")?;
    let scripts = ScriptRegistry::load(&config.script_dir)
        .with_context(|| format!("load scripts from {}", config.script_dir.display()))?;
    Ok(AppState::new(scripts, rules, &config.signing_secret))
}

/// 启动服务直到收到 Ctrl-C
pub async fn run(config: ServerConfig) -> Result<()> {
    let state = build_state(&config)?;
    info!(scripts = state.scripts.len(), rules = state.rules.len(), "registries ready");

    let target = config.bind_target();
    let listener = TcpListener::bind(&target).await.with_context(|| format!("bind {target}"))?;
    info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serve")?;
    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "cannot listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
