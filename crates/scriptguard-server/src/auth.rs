//! Bearer 令牌校验：HMAC 签名的紧凑 JWT（HS256 / HS384 / HS512）
//!
//! 只接受 HMAC 族算法，`alg: none` 及非对称算法一律拒绝；签名比较为常数时间。
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::{Sha256, Sha384, Sha512};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("missing authorization header")]
    Missing,
    #[error("malformed token: {0}")]
    Malformed(&'static str),
    #[error("unsupported signing algorithm {0:?}")]
    UnsupportedAlgorithm(String),
    #[error("signature mismatch")]
    BadSignature,
    #[error("token expired")]
    Expired,
    #[error("token not yet valid")]
    NotYetValid,
}

/// 令牌中关心的声明；其余字段忽略
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct Header {
    alg: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Algorithm {
    Hs256,
    Hs384,
    Hs512,
}

impl Algorithm {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "HS256" => Some(Self::Hs256),
            "HS384" => Some(Self::Hs384),
            "HS512" => Some(Self::Hs512),
            _ => None,
        }
    }

    fn sign(self, secret: &[u8], input: &[u8]) -> Vec<u8> {
        macro_rules! mac {
            ($digest:ty) => {{
                // HMAC 接受任意长度的密钥
                let Ok(mut mac) = Hmac::<$digest>::new_from_slice(secret) else { return Vec::new() };
                mac.update(input);
                mac.finalize().into_bytes().to_vec()
            }};
        }
        match self {
            Self::Hs256 => mac!(Sha256),
            Self::Hs384 => mac!(Sha384),
            Self::Hs512 => mac!(Sha512),
        }
    }

    fn verify(self, secret: &[u8], input: &[u8], sig: &[u8]) -> bool {
        macro_rules! mac {
            ($digest:ty) => {{
                let Ok(mut mac) = Hmac::<$digest>::new_from_slice(secret) else { return false };
                mac.update(input);
                mac.verify_slice(sig).is_ok()
            }};
        }
        match self {
            Self::Hs256 => mac!(Sha256),
            Self::Hs384 => mac!(Sha384),
            Self::Hs512 => mac!(Sha512),
        }
    }
}

/// 校验 `Authorization` 头的值；`Bearer ` 前缀可有可无。`now` 为 Unix 秒
pub fn verify_token(header_value: Option<&str>, secret: &[u8], now: i64) -> Result<Claims, AuthError> {
    let raw = header_value.map(str::trim).unwrap_or_default();
    let token = strip_bearer(raw).trim();
    if token.is_empty() {
        return Err(AuthError::Missing);
    }

    let mut parts = token.split('.');
    let (Some(header_b64), Some(claims_b64), Some(sig_b64), None) = (parts.next(), parts.next(), parts.next(), parts.next()) else {
        return Err(AuthError::Malformed("expected three segments"));
    };

    let header: Header = decode_segment(header_b64)?;
    let alg = Algorithm::from_name(&header.alg).ok_or_else(|| AuthError::UnsupportedAlgorithm(header.alg.clone()))?;

    let sig = URL_SAFE_NO_PAD.decode(sig_b64).map_err(|_| AuthError::Malformed("signature is not base64url"))?;
    let signing_input = &token[..header_b64.len() + 1 + claims_b64.len()];
    if !alg.verify(secret, signing_input.as_bytes(), &sig) {
        return Err(AuthError::BadSignature);
    }

    let value: serde_json::Value = decode_segment(claims_b64)?;
    if !value.is_object() {
        return Err(AuthError::Malformed("claims must be an object"));
    }
    let claims: Claims = serde_json::from_value(value).map_err(|_| AuthError::Malformed("invalid registered claim"))?;

    if let Some(exp) = claims.exp {
        if now >= exp { return Err(AuthError::Expired); }
    }
    if let Some(nbf) = claims.nbf {
        if now < nbf { return Err(AuthError::NotYetValid); }
    }
    if let Some(iat) = claims.iat {
        if iat > now { return Err(AuthError::NotYetValid); }
    }
    Ok(claims)
}

/// 签发 HS256 令牌（`token` 子命令与测试使用）
pub fn issue_token(secret: &[u8], subject: &str, ttl_secs: i64, now: i64) -> String {
    let claims = Claims {
        sub: Some(subject.to_string()),
        exp: Some(now.saturating_add(ttl_secs)),
        nbf: None,
        iat: Some(now),
    };
    sign_claims(secret, "HS256", &claims)
}

fn sign_claims(secret: &[u8], alg_name: &str, claims: &Claims) -> String {
    let header = serde_json::json!({ "alg": alg_name, "typ": "JWT" });
    let header_b64 = URL_SAFE_NO_PAD.encode(header.to_string());
    let claims_b64 = URL_SAFE_NO_PAD.encode(serde_json::to_string(claims).unwrap_or_default());
    let signing_input = format!("{header_b64}.{claims_b64}");
    let sig = Algorithm::from_name(alg_name).map(|a| a.sign(secret, signing_input.as_bytes())).unwrap_or_default();
    format!("{signing_input}.{}", URL_SAFE_NO_PAD.encode(sig))
}

fn strip_bearer(raw: &str) -> &str {
    if raw.eq_ignore_ascii_case("bearer") {
        return "";
    }
    match raw.split_once(' ') {
        Some((scheme, rest)) if scheme.eq_ignore_ascii_case("bearer") => rest,
        _ => raw,
    }
}

fn decode_segment<T: serde::de::DeserializeOwned>(seg: &str) -> Result<T, AuthError> {
    let bytes = URL_SAFE_NO_PAD.decode(seg).map_err(|_| AuthError::Malformed("segment is not base64url"))?;
    serde_json::from_slice(&bytes).map_err(|_| AuthError::Malformed("segment is not JSON"))
}

/// 当前 Unix 秒
pub fn unix_now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
