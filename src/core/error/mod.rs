//! 统一错误处理
//!
//! 自连接消除只区分两类失败：
//!
//! 1. **放弃优化**：不是自连接、已折叠过或没有可折叠的连接路径。
//!    这不是错误，由 `CollapseOutcome::Rejected` 表达，连接照常规划。
//! 2. **结构异常**：关系图或路径树违反了本模块依赖的前提。
//!    继续执行会悄悄产生错误的计划，因此中止本次规划，由宿主按规划失败上报。

use thiserror::Error;

pub mod executor;
pub mod shape;

pub use executor::{ExecutorError, ExecutorResult};
pub use shape::ShapeViolation;

/// 规划器错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlannerError {
    #[error("计划结构异常: {0}")]
    Shape(#[from] ShapeViolation),

    #[error("递归深度 {depth} 超过上限 {limit}，规划中止")]
    StackDepthExceeded { depth: usize, limit: usize },

    #[error("不支持下推为执行计划的路径类型: {0}")]
    UnsupportedLowering(String),

    #[error("配置错误: {0}")]
    Config(String),

    #[error("IO错误: {0}")]
    Io(String),

    #[error("序列化错误: {0}")]
    Serialization(String),
}

/// 规划器结果类型
pub type PlannerResult<T> = Result<T, PlannerError>;

impl PlannerError {
    /// 是否中止整个规划过程（配置与 IO 错误发生在规划之外）
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            PlannerError::Shape(_)
                | PlannerError::StackDepthExceeded { .. }
                | PlannerError::UnsupportedLowering(_)
        )
    }
}

impl From<std::io::Error> for PlannerError {
    fn from(err: std::io::Error) -> Self {
        PlannerError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for PlannerError {
    fn from(err: serde_json::Error) -> Self {
        PlannerError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for PlannerError {
    fn from(err: toml::de::Error) -> Self {
        PlannerError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for PlannerError {
    fn from(err: toml::ser::Error) -> Self {
        PlannerError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::RelId;

    #[test]
    fn test_shape_violation_conversion() {
        let err: PlannerError = ShapeViolation::UnplannedSubquery.into();
        assert!(matches!(err, PlannerError::Shape(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_error_display() {
        let err = PlannerError::StackDepthExceeded {
            depth: 11,
            limit: 10,
        };
        assert!(err.to_string().contains("10"));

        let err: PlannerError = ShapeViolation::ReservedRelid(RelId::OUTER_VAR).into();
        assert!(err.to_string().contains("65001"));
    }

    #[test]
    fn test_config_error_not_fatal() {
        let err = PlannerError::Config("bad".to_string());
        assert!(!err.is_fatal());
    }
}
