//! HTTP 路由与处理函数
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap};
use axum::routing::{get, post};
use axum::{Json, Router};
use scriptguard_core::{analyze_script, AnalysisResult, RuleRegistry, ScriptRegistry};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::auth::{unix_now, verify_token, AuthError};
use crate::error::ApiError;

/// 处理函数共享的只读状态（脚本注册表内部自带锁，支持重载）
#[derive(Clone)]
pub struct AppState {
    pub scripts: Arc<ScriptRegistry>,
    pub rules: Arc<RuleRegistry>,
    pub secret: Arc<[u8]>,
}

impl AppState {
    pub fn new(scripts: ScriptRegistry, rules: RuleRegistry, secret: &str) -> Self {
        Self { scripts: Arc::new(scripts), rules: Arc::new(rules), secret: Arc::from(secret.as_bytes()) }
    }

    fn authorize(&self, headers: &HeaderMap) -> Result<(), ApiError> {
        let value = match headers.get(header::AUTHORIZATION) {
            Some(v) => Some(v.to_str().map_err(|_| AuthError::Malformed("non-ascii header"))?),
            None => None,
        };
        verify_token(value, &self.secret, unix_now())?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct AnalyzeParams {
    script: Option<String>,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/scripts", get(list_scripts))
        .route("/scripts/reload", post(reload_scripts))
        .route("/analyze", get(analyze))
        .with_state(state)
}

async fn list_scripts(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.scripts.list())
}

async fn analyze(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<AnalyzeParams>,
) -> Result<Json<AnalysisResult>, ApiError> {
    state.authorize(&headers)?;
    let name = match params.script.as_deref().map(str::trim) {
        Some(n) if !n.is_empty() => n.to_string(),
        _ => return Err(ApiError::BadRequest("missing script parameter")),
    };
    let script = state.scripts.lookup(&name).ok_or_else(|| ApiError::NotFound(name.clone()))?;
    let result = analyze_script(&script, &state.rules);
    info!(script = %name, score = result.overall_score, findings = result.findings.len(), "analyze");
    Ok(Json(result))
}

async fn reload_scripts(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<Vec<String>>, ApiError> {
    state.authorize(&headers)?;
    let scripts = state.scripts.clone();
    let reloaded = tokio::task::spawn_blocking(move || scripts.reload())
        .await
        .map_err(|e| ApiError::Internal(format!("reload task: {e}")))?;
    match reloaded {
        Ok(_) => Ok(Json(state.scripts.list())),
        Err(e) => {
            warn!(error = %e, "reload failed, keeping previous scripts");
            Err(ApiError::Internal(e.to_string()))
        }
    }
}
