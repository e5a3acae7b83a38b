//! 执行计划
//!
//! 选出的候选路径在规划结束时下推为计划树，再由执行器逐节点实例化。

pub mod create_plan;
pub mod explain;
pub mod plan_node_enum;

pub use create_plan::{create_plan, create_self_join_plan};
pub use explain::{describe_plan, Pair, PlanDescription, PlanNodeDescription};
pub use plan_node_enum::{
    IndexScanNode, JoinNode, PlanNodeEnum, ProjectionInfo, ProjectionItem, ProjectionNode,
    SeqScanNode, SelfJoinScanNode,
};
