//! 查询处理
//!
//! - `planner`: 规划状态、候选路径与计划下推
//! - `optimizer`: 自连接检测与折叠
//! - `executor`: 折叠后节点的执行

pub mod executor;
pub mod optimizer;
pub mod planner;
