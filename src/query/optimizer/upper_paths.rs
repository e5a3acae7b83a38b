//! 上层路径修补
//!
//! 上层阶段（投影、聚合、排序等）的包装路径可能在折叠前就确定了输出列，
//! 其中仍引用被消除的关系。对输出关系中子树含有折叠路径的每条候选路径，
//! 把这些残留引用替换为保留关系。

use crate::config::{SelfJoinConfig, SharedSelfJoinConfig};
use crate::core::error::PlannerResult;
use crate::query::optimizer::hooks::{HookFlow, UpperPathsHook};
use crate::query::optimizer::path_walker::PathWalker;
use crate::query::optimizer::reference_rewriter::ReferenceRewriter;
use crate::query::planner::planner_info::{PlannerInfo, RelHandle, UpperRelKind};

/// 修补输出关系的候选路径，返回替换的引用数量
pub fn patch_upper_paths(
    root: &mut PlannerInfo,
    output: RelHandle,
    config: &SelfJoinConfig,
) -> PlannerResult<usize> {
    let verbose = config.trace_level.verbose();
    let rel = root.rel_mut(output)?;
    let mut walker = PathWalker::from_config(config);
    let mut total = 0;
    let mut pairs_seen = Vec::new();

    for path in rel.pathlist.iter_mut() {
        if path.is_self_join() {
            continue;
        }
        for (survivor, eliminated) in walker.collect_self_joins(path)? {
            let rewriter = ReferenceRewriter::new(eliminated, survivor)
                .with_max_depth(config.max_stack_depth)
                .with_verbose(verbose);
            total += rewriter.rewrite_path_targets(path)?;
            if !pairs_seen.contains(&(survivor, eliminated)) {
                pairs_seen.push((survivor, eliminated));
            }
        }
    }

    for &(survivor, eliminated) in &pairs_seen {
        let rewriter = ReferenceRewriter::new(eliminated, survivor).with_verbose(verbose);
        total += rewriter.rewrite_exprs(rel.reltarget.exprs.iter_mut())?;
    }

    if total > 0 && config.trace_level.decisions() {
        log::info!("上层关系 {} 中替换了 {} 处被消除关系的引用", output, total);
    }
    Ok(total)
}

/// 自连接消除的上层路径回调
pub struct SelfJoinUpperPathsHook {
    config: SharedSelfJoinConfig,
}

impl SelfJoinUpperPathsHook {
    pub const NAME: &'static str = "SelfJoinUpperPaths";

    pub fn new(config: SharedSelfJoinConfig) -> Self {
        Self { config }
    }
}

impl UpperPathsHook for SelfJoinUpperPathsHook {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn on_upper_paths(
        &self,
        root: &mut PlannerInfo,
        stage: UpperRelKind,
        _input: RelHandle,
        output: RelHandle,
    ) -> PlannerResult<HookFlow> {
        let snapshot = self.config.read().clone();
        if snapshot.enabled {
            let patched = patch_upper_paths(root, output, &snapshot)?;
            log::debug!("上层阶段 {:?} 修补完成: {} 处", stage, patched);
        }
        Ok(HookFlow::Continue)
    }
}
