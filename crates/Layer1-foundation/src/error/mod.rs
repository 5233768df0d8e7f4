//! Error types for Trellis
//!
//! 모든 에러를 중앙에서 관리

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Trellis 에러 타입
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // 확장 라이프사이클 관련
    // ========================================================================
    #[error("Unknown extension: {0}")]
    UnknownExtension(String),

    #[error("Error enabling extension {id}: {source}")]
    EnablingFailed {
        id: String,
        #[source]
        source: Box<Error>,
    },

    #[error("Error installing extension: {0}")]
    InstallFailed(String),

    #[error("Cyclic extension requirements: {}", .0.join(" -> "))]
    CyclicDependency(Vec<String>),

    #[error("Error loading extension {entry}: {message}")]
    ExtensionLoad { entry: String, message: String },

    // ========================================================================
    // Hook 관련
    // ========================================================================
    #[error("Hook is not registered with the {0} hook point")]
    HookNotRegistered(String),

    // ========================================================================
    // URL / 템플릿 관련
    // ========================================================================
    #[error("No reverse match for '{0}'")]
    NoReverseMatch(String),

    #[error("Template error: {0}")]
    Template(String),

    // ========================================================================
    // 설정 / 저장소 관련
    // ========================================================================
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    // ========================================================================
    // 일반
    // ========================================================================
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // ========================================================================
    // 외부 에러 변환
    // ========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    // ========================================================================
    // 기타
    // ========================================================================
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// EnablingFailed 에러 생성 헬퍼
    pub fn enabling_failed(id: impl Into<String>, source: Error) -> Self {
        Error::EnablingFailed {
            id: id.into(),
            source: Box::new(source),
        }
    }

    /// ExtensionLoad 에러 생성 헬퍼
    pub fn extension_load(entry: impl Into<String>, message: impl Into<String>) -> Self {
        Error::ExtensionLoad {
            entry: entry.into(),
            message: message.into(),
        }
    }

    /// 관리자에게 그대로 보여줄 수 있는 에러인지 확인
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Error::UnknownExtension(_)
                | Error::EnablingFailed { .. }
                | Error::InstallFailed(_)
                | Error::CyclicDependency(_)
                | Error::InvalidInput(_)
        )
    }
}

// ============================================================================
// From 구현 (추가 변환)
// ============================================================================

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Internal(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Internal(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enabling_failed_wraps_cause() {
        let err = Error::enabling_failed("ext.A", Error::InstallFailed("evolve failed".into()));
        let text = err.to_string();

        assert!(text.contains("ext.A"));
        assert!(text.contains("evolve failed"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_cyclic_dependency_message() {
        let err = Error::CyclicDependency(vec!["a".into(), "b".into(), "a".into()]);
        assert_eq!(err.to_string(), "Cyclic extension requirements: a -> b -> a");
        assert!(err.is_user_facing());
    }
}
