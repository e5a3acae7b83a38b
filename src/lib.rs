//! selfjoin-planner - 查询优化器的自连接检测与折叠
//!
//! 当查询通过唯一键上的同列等值条件把一张表与自身连接时，
//! 连接在逻辑上是冗余的，可以折叠为对该表的一次扫描。
//!
//! - `query::optimizer`: 条件匹配、路径遍历、编号重写与折叠流程
//! - `query::planner`: 规划状态、候选路径、计划下推与测试场景
//! - `query::executor`: 折叠后节点的执行器与自定义节点注册表
//! - `config`: 运行时开关与日志配置
//! - `utils::logging`: 文件日志

pub mod config;
pub mod core;
pub mod query;
pub mod utils;
