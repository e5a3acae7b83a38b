//! 执行器错误类型

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExecutorError {
    #[error("执行器未打开: {0}")]
    NotOpen(String),

    #[error("执行器已打开: {0}")]
    AlreadyOpen(String),

    #[error("未注册的自定义节点: {0}")]
    UnknownCustomNode(String),

    #[error("子执行器数量错误: 期望 {expected}, 实际 {actual}")]
    ChildCount { expected: usize, actual: usize },

    #[error("投影列越界: 第 {index} 列, 输入只有 {width} 列")]
    ProjectionOutOfRange { index: usize, width: usize },
}

pub type ExecutorResult<T> = Result<T, ExecutorError>;
