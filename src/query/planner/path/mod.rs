//! 候选访问路径
//!
//! 优化器为每个关系保留若干条候选路径，每条路径是一棵带代价注解的树。

pub mod path_node_children;
pub mod path_node_cost;
pub mod path_node_enum;

pub use path_node_children::{PathChildAccessor, PathChildren};
pub use path_node_cost::PathCost;
pub use path_node_enum::{
    AggPath, BitmapHeapPath, CustomPath, GroupResultPath, IndexPath, JoinPath, LimitPath,
    LockRowsPath, MaterialPath, ModifyTablePath, OpaquePath, PathHeader, PathNode, PathNodeEnum,
    ProjectionPath, ScanPath, SelfJoinPath,
};
