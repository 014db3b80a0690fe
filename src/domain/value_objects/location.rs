use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// 位置情報パーミッションの状態。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionState {
    Granted,
    Denied,
    Prompt,
}

impl PermissionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PermissionState::Granted => "granted",
            PermissionState::Denied => "denied",
            PermissionState::Prompt => "prompt",
        }
    }
}

impl fmt::Display for PermissionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 位置情報取得の失敗分類。プラットフォーム起因の想定内エラーであり、
/// 呼び出し側には結果オブジェクトの一部として返る。
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum LocationError {
    #[error("Location permission denied")]
    PermissionDenied,
    #[error("Position unavailable")]
    PositionUnavailable,
    #[error("Location request timed out")]
    Timeout,
    #[error("Location error: {0}")]
    Unknown(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_state_round_trips_as_str() {
        assert_eq!(PermissionState::Granted.as_str(), "granted");
        assert_eq!(PermissionState::Prompt.to_string(), "prompt");
    }

    #[test]
    fn test_location_error_messages() {
        assert_eq!(
            LocationError::Timeout.to_string(),
            "Location request timed out"
        );
        assert_eq!(
            LocationError::Unknown("boom".into()).to_string(),
            "Location error: boom"
        );
    }
}
