//! 执行器模块
//!
//! - `traits`: 执行器特征与行类型
//! - `self_join_executor`: 折叠后自连接节点的执行器
//! - `values_executor`: 内存行集执行器
//! - `factory`: 自定义节点注册表与执行器树构造

pub mod factory;
pub mod self_join_executor;
pub mod traits;
pub mod values_executor;

pub use factory::{
    register_self_join_methods, CustomNodeRegistry, CustomScanMethods, ExecutorBuilder,
    ExecutorFactory, SELF_JOIN_PATH_METHODS,
};
pub use self_join_executor::SelfJoinExecutor;
pub use traits::{Executor, ExecutorStats, Row};
pub use values_executor::ValuesExecutor;
