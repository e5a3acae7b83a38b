//! 查询优化器模块
//!
//! 自连接消除：当查询通过唯一键上的同列等值条件把一张表与自身连接时，
//! 连接是冗余的，可以折叠为对该表的一次扫描。
//!
//! ## 模块结构
//!
//! - `path_walker` - 候选路径树的通用遍历
//! - `reference_rewriter` - 表达式与关系集合中的编号替换
//! - `self_join_matcher` - 判定连接条件是否构成自连接
//! - `self_join_collapse` - 折叠流程
//! - `hooks` - 连接路径枚举与上层路径生成两个扩展点
//! - `upper_paths` - 上层包装路径的修补
//!
//! ## 使用示例
//!
//! ```rust
//! use selfjoin_planner::config::{self, SelfJoinConfig};
//! use selfjoin_planner::query::optimizer::{install_self_join_hooks, PlannerHooks};
//! use selfjoin_planner::query::planner::fixtures;
//!
//! let mut hooks = PlannerHooks::new();
//! let installed = install_self_join_hooks(&mut hooks, config::shared(SelfJoinConfig::default()));
//!
//! let mut scenario = fixtures::scenario_a().unwrap();
//! scenario.enumerate_join(&hooks).unwrap();
//! assert!(installed.join_pathlist.last_outcome().unwrap().is_collapsed());
//! ```

pub mod hooks;
pub mod path_walker;
pub mod reference_rewriter;
pub mod self_join_collapse;
pub mod self_join_matcher;
pub mod stack_guard;
pub mod upper_paths;

pub use hooks::{
    install_self_join_hooks, HookFlow, JoinPathlistHook, PlannerHooks, SelfJoinHooks,
    SelfJoinPathlistHook, UpperPathsHook,
};
pub use path_walker::PathWalker;
pub use reference_rewriter::{adjust_relids, check_rewritable, ReferenceRewriter};
pub use self_join_collapse::{
    CollapseOutcome, CollapseStage, JoinCandidate, RejectReason, SelfJoinCollapser,
};
pub use self_join_matcher::{ClauseMatch, Mismatch, SelfJoinMatcher};
pub use stack_guard::StackGuard;
pub use upper_paths::{patch_upper_paths, SelfJoinUpperPathsHook};
