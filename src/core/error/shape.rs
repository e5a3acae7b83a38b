//! 结构异常类型
//!
//! 关系图或路径树不满足规划前提时产生，属于不可恢复错误。

use crate::core::types::RelId;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ShapeViolation {
    /// 规划阶段遇到未规划的子查询
    #[error("遇到未规划的子查询")]
    UnplannedSubquery,

    /// 在关系级表达式中出现了执行层保留编号
    #[error("列引用使用了保留的关系编号 {0}")]
    ReservedRelid(RelId),

    /// 关系编号不对应任何范围表条目
    #[error("关系编号 {0} 不在范围表中")]
    UnknownRelid(RelId),

    /// 关系集合缺少按约定必须包含的编号
    #[error("{set} 中缺少关系编号 {relid}")]
    RelidMissing { set: &'static str, relid: RelId },

    /// 修改路径时遇到无法识别的路径节点
    #[error("无法识别的路径节点: {0}")]
    UnrecognizedPath(String),

    /// 需要基表的位置出现了其他类型的关系
    #[error("关系 {0} 不是基表")]
    NotBaseRelation(String),

    /// 关系句柄找不到对应的关系描述
    #[error("找不到关系: {0}")]
    RelationMissing(String),

    /// 输出列无法用子计划输出表示
    #[error("输出列无法由子计划输出表示: {0}")]
    UnprojectableTarget(String),
}
