//! 控件载荷编解码
//!
//! 格式为 ASCII `verb:arg`：
//!
//! | verb | arg | 含义 |
//! |------|-----|------|
//! | `o` | token | 打开订单详情 |
//! | `f` | all / active / unpaid | 切换过滤 |
//! | `r` | - | 刷新概览 |
//! | `b` | - | 返回概览 |
//! | `u` | token | 刷新单个订单 |

use crate::session::FilterMode;
use std::fmt;
use thiserror::Error;

/// 通道允许的最大载荷字节数
pub const MAX_PAYLOAD_LEN: usize = 64;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PayloadError {
    #[error("payload too long: {0} bytes")]
    TooLong(usize),

    #[error("payload is not ASCII")]
    NotAscii,

    #[error("malformed payload: {0}")]
    Malformed(String),

    #[error("unknown verb: {0}")]
    UnknownVerb(String),
}

/// Decoded interactive control
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlPayload {
    Select(String),
    Filter(FilterMode),
    Refresh,
    Back,
    RefreshOrder(String),
}

impl ControlPayload {
    /// 编码并校验长度
    pub fn encode(&self) -> Result<String, PayloadError> {
        let wire = self.to_string();
        validate(&wire)?;
        Ok(wire)
    }

    pub fn parse(raw: &str) -> Result<Self, PayloadError> {
        validate(raw)?;
        let (verb, arg) = raw
            .split_once(':')
            .ok_or_else(|| PayloadError::Malformed(raw.to_string()))?;

        let token = |arg: &str| {
            if arg.is_empty() {
                Err(PayloadError::Malformed(raw.to_string()))
            } else {
                Ok(arg.to_string())
            }
        };

        match verb {
            "o" => Ok(ControlPayload::Select(token(arg)?)),
            "u" => Ok(ControlPayload::RefreshOrder(token(arg)?)),
            "f" => FilterMode::parse(arg)
                .map(ControlPayload::Filter)
                .ok_or_else(|| PayloadError::Malformed(raw.to_string())),
            "r" => Ok(ControlPayload::Refresh),
            "b" => Ok(ControlPayload::Back),
            other => Err(PayloadError::UnknownVerb(other.to_string())),
        }
    }
}

impl fmt::Display for ControlPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlPayload::Select(token) => write!(f, "o:{token}"),
            ControlPayload::Filter(mode) => write!(f, "f:{}", mode.as_str()),
            ControlPayload::Refresh => write!(f, "r:"),
            ControlPayload::Back => write!(f, "b:"),
            ControlPayload::RefreshOrder(token) => write!(f, "u:{token}"),
        }
    }
}

fn validate(raw: &str) -> Result<(), PayloadError> {
    if raw.len() > MAX_PAYLOAD_LEN {
        return Err(PayloadError::TooLong(raw.len()));
    }
    if !raw.is_ascii() {
        return Err(PayloadError::NotAscii);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_verbs() {
        assert_eq!(
            ControlPayload::parse("o:1z").unwrap(),
            ControlPayload::Select("1z".into())
        );
        assert_eq!(
            ControlPayload::parse("f:unpaid").unwrap(),
            ControlPayload::Filter(FilterMode::Unpaid)
        );
        assert_eq!(ControlPayload::parse("r:").unwrap(), ControlPayload::Refresh);
        assert_eq!(ControlPayload::parse("b:").unwrap(), ControlPayload::Back);
        assert_eq!(
            ControlPayload::parse("u:a").unwrap(),
            ControlPayload::RefreshOrder("a".into())
        );
    }

    #[test]
    fn test_rejects_bad_payloads() {
        assert!(matches!(
            ControlPayload::parse("o:"),
            Err(PayloadError::Malformed(_))
        ));
        assert!(matches!(
            ControlPayload::parse("f:paid"),
            Err(PayloadError::Malformed(_))
        ));
        assert!(matches!(
            ControlPayload::parse("x:1"),
            Err(PayloadError::UnknownVerb(_))
        ));
        assert!(matches!(
            ControlPayload::parse("refresh"),
            Err(PayloadError::Malformed(_))
        ));
        assert_eq!(ControlPayload::parse("o:т"), Err(PayloadError::NotAscii));
    }

    #[test]
    fn test_length_bound() {
        let long_token = "9".repeat(MAX_PAYLOAD_LEN);
        let payload = ControlPayload::Select(long_token);
        assert_eq!(
            payload.encode(),
            Err(PayloadError::TooLong(MAX_PAYLOAD_LEN + 2))
        );

        let fits = ControlPayload::Select("9".repeat(MAX_PAYLOAD_LEN - 2));
        assert_eq!(fits.encode().unwrap().len(), MAX_PAYLOAD_LEN);
    }
}
