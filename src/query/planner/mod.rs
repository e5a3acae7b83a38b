//! 规划器模块：规划状态、候选路径与执行计划

pub mod fixtures;
pub mod path;
pub mod plan;
pub mod planner_info;

pub use fixtures::{Scenario, ScenarioBuilder, TableDef};
pub use planner_info::{
    JoinPathExtraData, JoinRelId, JoinType, PathTarget, PlannerInfo, RangeTblEntry, RelHandle,
    RelInfo, RelKind, RestrictInfo, RteKind, TableOid, TargetEntry, UpperRelKind,
};
