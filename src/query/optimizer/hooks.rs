//! 规划器扩展点
//!
//! 宿主优化器在两个时机调用已注册的回调：
//! - 连接路径枚举：每对可连接的关系调用一次
//! - 上层路径生成：每个上层阶段的输出关系生成候选路径之后
//!
//! 回调按注册顺序执行，返回 `HookFlow::Stop` 时跳过其后的回调。
//! 后注册的扩展总是在先前注册的回调之后执行。

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::SharedSelfJoinConfig;
use crate::core::error::PlannerResult;
use crate::query::optimizer::self_join_collapse::{CollapseOutcome, JoinCandidate, SelfJoinCollapser};
use crate::query::optimizer::upper_paths::SelfJoinUpperPathsHook;
use crate::query::planner::planner_info::{PlannerInfo, RelHandle, UpperRelKind};

/// 回调执行后是否继续调用链上的下一个回调
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookFlow {
    Continue,
    Stop,
}

/// 连接路径枚举回调
pub trait JoinPathlistHook: Send + Sync {
    fn name(&self) -> &str;

    fn on_join_pathlist(
        &self,
        root: &mut PlannerInfo,
        candidate: JoinCandidate<'_>,
    ) -> PlannerResult<HookFlow>;
}

/// 上层路径生成回调
pub trait UpperPathsHook: Send + Sync {
    fn name(&self) -> &str;

    fn on_upper_paths(
        &self,
        root: &mut PlannerInfo,
        stage: UpperRelKind,
        input: RelHandle,
        output: RelHandle,
    ) -> PlannerResult<HookFlow>;
}

/// 已注册回调的有序列表
#[derive(Default, Clone)]
pub struct PlannerHooks {
    join_pathlist: Vec<Arc<dyn JoinPathlistHook>>,
    upper_paths: Vec<Arc<dyn UpperPathsHook>>,
}

impl PlannerHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_join_pathlist(&mut self, hook: Arc<dyn JoinPathlistHook>) {
        log::debug!("注册连接路径回调: {}", hook.name());
        self.join_pathlist.push(hook);
    }

    pub fn register_upper_paths(&mut self, hook: Arc<dyn UpperPathsHook>) {
        log::debug!("注册上层路径回调: {}", hook.name());
        self.upper_paths.push(hook);
    }

    /// 连接路径枚举扩展点，由宿主对每对可连接的关系调用
    pub fn set_join_pathlist(
        &self,
        root: &mut PlannerInfo,
        candidate: JoinCandidate<'_>,
    ) -> PlannerResult<()> {
        for hook in &self.join_pathlist {
            if hook.on_join_pathlist(root, candidate)? == HookFlow::Stop {
                log::debug!("连接路径回调 {} 终止了调用链", hook.name());
                break;
            }
        }
        Ok(())
    }

    /// 上层路径生成扩展点
    pub fn create_upper_paths(
        &self,
        root: &mut PlannerInfo,
        stage: UpperRelKind,
        input: RelHandle,
        output: RelHandle,
    ) -> PlannerResult<()> {
        for hook in &self.upper_paths {
            if hook.on_upper_paths(root, stage, input, output)? == HookFlow::Stop {
                log::debug!("上层路径回调 {} 终止了调用链", hook.name());
                break;
            }
        }
        Ok(())
    }

    /// 按执行顺序列出连接路径回调
    pub fn join_pathlist_names(&self) -> Vec<&str> {
        self.join_pathlist.iter().map(|h| h.name()).collect()
    }

    pub fn upper_paths_names(&self) -> Vec<&str> {
        self.upper_paths.iter().map(|h| h.name()).collect()
    }
}

/// 自连接消除的连接路径回调
///
/// 每次调用读取一次配置快照，总是让调用链继续。
/// 只保留最近 `OUTCOME_HISTORY` 次尝试的结果。
pub struct SelfJoinPathlistHook {
    config: SharedSelfJoinConfig,
    outcomes: Mutex<VecDeque<CollapseOutcome>>,
}

impl SelfJoinPathlistHook {
    pub const NAME: &'static str = "PathSelfJoin";
    pub const OUTCOME_HISTORY: usize = 64;

    pub fn new(config: SharedSelfJoinConfig) -> Self {
        Self {
            config,
            outcomes: Mutex::new(VecDeque::with_capacity(Self::OUTCOME_HISTORY)),
        }
    }

    /// 最近的尝试结果，按时间先后
    pub fn outcomes(&self) -> Vec<CollapseOutcome> {
        self.outcomes.lock().iter().cloned().collect()
    }

    /// 取出并清空已记录的结果
    pub fn take_outcomes(&self) -> Vec<CollapseOutcome> {
        self.outcomes.lock().drain(..).collect()
    }

    pub fn last_outcome(&self) -> Option<CollapseOutcome> {
        self.outcomes.lock().back().cloned()
    }

    fn record(&self, outcome: CollapseOutcome) {
        let mut outcomes = self.outcomes.lock();
        if outcomes.len() == Self::OUTCOME_HISTORY {
            outcomes.pop_front();
        }
        outcomes.push_back(outcome);
    }
}

impl JoinPathlistHook for SelfJoinPathlistHook {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn on_join_pathlist(
        &self,
        root: &mut PlannerInfo,
        candidate: JoinCandidate<'_>,
    ) -> PlannerResult<HookFlow> {
        let snapshot = self.config.read().clone();
        let outcome = SelfJoinCollapser::new(snapshot).try_collapse(root, candidate)?;
        self.record(outcome);
        Ok(HookFlow::Continue)
    }
}

/// 安装后的自连接回调句柄
#[derive(Clone)]
pub struct SelfJoinHooks {
    pub join_pathlist: Arc<SelfJoinPathlistHook>,
    pub upper_paths: Arc<SelfJoinUpperPathsHook>,
}

/// 在已有回调之后追加自连接消除的两个回调
pub fn install_self_join_hooks(hooks: &mut PlannerHooks, config: SharedSelfJoinConfig) -> SelfJoinHooks {
    let join_pathlist = Arc::new(SelfJoinPathlistHook::new(config.clone()));
    let upper_paths = Arc::new(SelfJoinUpperPathsHook::new(config));
    hooks.register_join_pathlist(join_pathlist.clone());
    hooks.register_upper_paths(upper_paths.clone());
    SelfJoinHooks {
        join_pathlist,
        upper_paths,
    }
}
