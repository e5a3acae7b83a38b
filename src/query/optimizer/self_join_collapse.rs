//! 自连接折叠
//!
//! 对优化器枚举的每一对可连接的关系调用一次，依次经过以下阶段：
//!
//! 1. `Chained`: 先前注册的连接枚举回调已经执行（由回调链保证）
//! 2. `Preconditions`: 开关、两侧均为基表、内连接、内侧唯一、尚未折叠
//! 3. `Matched`: 所有连接条件都是同表同列的等值比较，且至少一条
//! 4. `Selected`: 选出代价最低的连接路径，取其外侧与内侧子路径
//! 5. `Rewritten`: 确定保留与消除的关系，先准备全部改动再一次性提交
//! 6. `Registered`: 为连接关系追加折叠后的候选路径
//!
//! 前四个阶段只读，任一阶段不满足即放弃，不修改任何结构。
//! 第五阶段在修改前完成所有校验，准备过程中发现结构异常同样不留下部分改动。

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::config::{SelfJoinConfig, TraceLevel};
use crate::core::error::{PlannerResult, ShapeViolation};
use crate::core::types::{AttrNumber, Expression, RelId};
use crate::query::optimizer::reference_rewriter::{check_rewritable, ReferenceRewriter};
use crate::query::optimizer::self_join_matcher::{Mismatch, SelfJoinMatcher};
use crate::query::planner::path::{JoinPath, PathCost, PathNode, PathNodeEnum, SelfJoinPath};
use crate::query::planner::planner_info::{
    JoinPathExtraData, JoinType, PlannerInfo, RelHandle, RelInfo, RestrictInfo,
};

/// 折叠流程所处阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum CollapseStage {
    Chained,
    Preconditions,
    Matched,
    Selected,
    Rewritten,
    Registered,
}

/// 放弃折叠的原因
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum RejectReason {
    /// 运行时开关关闭
    Disabled,
    /// 参与连接的关系不是基表
    NotBaseRelation(RelHandle),
    /// 不是内连接
    NotInnerJoin(JoinType),
    /// 内侧未被证明唯一
    InnerNotUnique,
    /// 连接关系已有折叠后的候选路径
    AlreadyCollapsed,
    /// 某个连接条件不是同表同列的等值比较
    ClauseMismatch(Mismatch),
    /// 没有任何自连接证据
    NoEvidence,
    /// 连接关系没有嵌套循环、归并或哈希连接路径
    NoJoinPath,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::Disabled => f.write_str("自连接消除已关闭"),
            RejectReason::NotBaseRelation(handle) => write!(f, "{} 不是基表", handle),
            RejectReason::NotInnerJoin(jointype) => write!(f, "连接类型 {:?} 不是内连接", jointype),
            RejectReason::InnerNotUnique => f.write_str("内侧未被证明唯一"),
            RejectReason::AlreadyCollapsed => f.write_str("已存在折叠路径"),
            RejectReason::ClauseMismatch(m) => write!(f, "连接条件不匹配: {}", m),
            RejectReason::NoEvidence => f.write_str("没有同表同列的等值条件"),
            RejectReason::NoJoinPath => f.write_str("没有可折叠的连接路径"),
        }
    }
}

/// 一次折叠尝试的结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum CollapseOutcome {
    /// 已登记折叠路径
    Collapsed {
        survivor: RelId,
        eliminated: RelId,
        cost: PathCost,
    },
    /// 放弃折叠，连接照常规划
    Rejected {
        stage: CollapseStage,
        reason: RejectReason,
    },
}

impl CollapseOutcome {
    fn rejected(stage: CollapseStage, reason: RejectReason) -> Self {
        CollapseOutcome::Rejected { stage, reason }
    }

    pub fn is_collapsed(&self) -> bool {
        matches!(self, CollapseOutcome::Collapsed { .. })
    }

    /// 流程到达的最后阶段
    pub fn stage(&self) -> CollapseStage {
        match self {
            CollapseOutcome::Collapsed { .. } => CollapseStage::Registered,
            CollapseOutcome::Rejected { stage, .. } => *stage,
        }
    }
}

/// 一次连接枚举回调传入的参数
#[derive(Debug, Clone, Copy)]
pub struct JoinCandidate<'a> {
    pub joinrel: RelHandle,
    pub outerrel: RelHandle,
    pub innerrel: RelHandle,
    pub jointype: JoinType,
    pub extra: &'a JoinPathExtraData,
}

/// 选中的连接路径的一侧
struct Side {
    relid: RelId,
    path: PathNodeEnum,
}

/// 提交前准备好的全部改动
struct PreparedRewrite {
    survivor: RelId,
    eliminated: RelId,
    child: PathNodeEnum,
    merged_restrictions: Vec<Arc<RestrictInfo>>,
    added_targets: Vec<Expression>,
}

/// 自连接折叠器，持有本次调用的配置快照
#[derive(Debug, Clone)]
pub struct SelfJoinCollapser {
    config: SelfJoinConfig,
}

impl SelfJoinCollapser {
    pub fn new(config: SelfJoinConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SelfJoinConfig {
        &self.config
    }

    fn trace(&self) -> TraceLevel {
        self.config.trace_level
    }

    /// 尝试折叠一次连接
    pub fn try_collapse(
        &self,
        root: &mut PlannerInfo,
        candidate: JoinCandidate<'_>,
    ) -> PlannerResult<CollapseOutcome> {
        let outcome = self.run(root, candidate)?;
        if self.trace().decisions() {
            match &outcome {
                CollapseOutcome::Collapsed {
                    survivor,
                    eliminated,
                    cost,
                } => log::info!(
                    "自连接折叠: {} 保留 {}，消除 {} (rows={:.0}, total_cost={:.2})",
                    candidate.joinrel,
                    survivor,
                    eliminated,
                    cost.estimated_rows,
                    cost.total_cost
                ),
                CollapseOutcome::Rejected { stage, reason } => log::debug!(
                    "放弃自连接折叠: {} 在 {:?} 阶段: {}",
                    candidate.joinrel,
                    stage,
                    reason
                ),
            }
        }
        Ok(outcome)
    }

    fn run(&self, root: &mut PlannerInfo, candidate: JoinCandidate<'_>) -> PlannerResult<CollapseOutcome> {
        if let Some(reason) = self.check_preconditions(root, &candidate)? {
            return Ok(CollapseOutcome::rejected(CollapseStage::Preconditions, reason));
        }

        let matcher = SelfJoinMatcher::new(root).with_verbose(self.trace().verbose());
        let evidence =
            matcher.match_clauses(candidate.extra.restrictlist.iter().map(|r| &r.clause))?;
        if let Some(mismatch) = evidence.mismatch {
            return Ok(CollapseOutcome::rejected(
                CollapseStage::Matched,
                RejectReason::ClauseMismatch(mismatch),
            ));
        }
        if evidence.equalities == 0 {
            return Ok(CollapseOutcome::rejected(
                CollapseStage::Matched,
                RejectReason::NoEvidence,
            ));
        }

        let (outer, inner) = match self.select_join_children(root, &candidate)? {
            Some(sides) => sides,
            None => {
                return Ok(CollapseOutcome::rejected(
                    CollapseStage::Selected,
                    RejectReason::NoJoinPath,
                ))
            }
        };

        let prepared = self.prepare(root, &candidate, outer, inner, &evidence.columns)?;
        self.commit(root, &candidate, prepared)
    }

    /// 返回 Some 表示不满足前提
    fn check_preconditions(
        &self,
        root: &PlannerInfo,
        candidate: &JoinCandidate<'_>,
    ) -> PlannerResult<Option<RejectReason>> {
        if !self.config.enabled {
            return Ok(Some(RejectReason::Disabled));
        }
        for handle in [candidate.outerrel, candidate.innerrel] {
            if !root.rel(handle)?.is_base() {
                return Ok(Some(RejectReason::NotBaseRelation(handle)));
            }
        }
        if candidate.jointype != JoinType::Inner {
            return Ok(Some(RejectReason::NotInnerJoin(candidate.jointype)));
        }
        if !candidate.extra.inner_unique {
            return Ok(Some(RejectReason::InnerNotUnique));
        }
        if root.rel(candidate.joinrel)?.has_self_join_path() {
            return Ok(Some(RejectReason::AlreadyCollapsed));
        }
        Ok(None)
    }

    /// 取代价最低的连接路径（代价相同时取靠前的）的外侧与内侧子路径
    fn select_join_children(
        &self,
        root: &PlannerInfo,
        candidate: &JoinCandidate<'_>,
    ) -> PlannerResult<Option<(Side, Side)>> {
        let joinrel = root.rel(candidate.joinrel)?;
        let best = joinrel
            .pathlist
            .iter()
            .filter_map(|p| p.as_join())
            .fold(None, |best: Option<&JoinPath>, j| match best {
                Some(b) if b.header.cost.total_cost <= j.header.cost.total_cost => Some(b),
                _ => Some(j),
            });
        let Some(join) = best else {
            return Ok(None);
        };

        let base_relids = [
            base_relid(root.rel(candidate.outerrel)?)?,
            base_relid(root.rel(candidate.innerrel)?)?,
        ];
        let side = |path: &PathNodeEnum| -> PlannerResult<Side> {
            let relid = path
                .parent()
                .singleton_member()
                .filter(|r| base_relids.contains(r))
                .ok_or_else(|| ShapeViolation::NotBaseRelation(path.parent().to_string()))?;
            Ok(Side {
                relid,
                path: path.clone(),
            })
        };
        let outer = side(&join.outerjoinpath)?;
        let inner = side(&join.innerjoinpath)?;
        if outer.relid == inner.relid {
            return Err(ShapeViolation::NotBaseRelation(joinrel.relids.to_string()).into());
        }
        Ok(Some((outer, inner)))
    }

    /// 保留子路径更紧（行数更少，其次总代价更低）的一侧，完全相同时保留内侧关系
    fn choose_survivor(
        &self,
        root: &PlannerInfo,
        candidate: &JoinCandidate<'_>,
        a: Side,
        b: Side,
    ) -> PlannerResult<(Side, Side)> {
        let ca = *a.path.cost();
        let cb = *b.path.cost();
        let a_tighter = ca.estimated_rows < cb.estimated_rows
            || (ca.estimated_rows == cb.estimated_rows && ca.total_cost < cb.total_cost);
        let b_tighter = cb.estimated_rows < ca.estimated_rows
            || (cb.estimated_rows == ca.estimated_rows && cb.total_cost < ca.total_cost);
        let inner_relid = base_relid(root.rel(candidate.innerrel)?)?;
        let keep_a = a_tighter || (!b_tighter && a.relid == inner_relid);
        Ok(if keep_a { (a, b) } else { (b, a) })
    }

    fn prepare(
        &self,
        root: &PlannerInfo,
        candidate: &JoinCandidate<'_>,
        outer: Side,
        inner: Side,
        columns: &[AttrNumber],
    ) -> PlannerResult<PreparedRewrite> {
        let (kept, dropped) = self.choose_survivor(root, candidate, outer, inner)?;
        let survivor = kept.relid;
        let eliminated = dropped.relid;
        let rewriter = ReferenceRewriter::new(eliminated, survivor)
            .with_max_depth(self.config.max_stack_depth)
            .with_verbose(self.trace().verbose());

        let survivor_rel = root.rel(RelHandle::Base(survivor))?;
        let eliminated_rel = root.rel(RelHandle::Base(eliminated))?;

        let mut merged_restrictions: Vec<Arc<RestrictInfo>> = Vec::new();
        for rinfo in &eliminated_rel.base_restrict_info {
            let rewritten = rewriter.rewrite_restrict_info(rinfo)?;
            let duplicate = survivor_rel
                .base_restrict_info
                .iter()
                .chain(merged_restrictions.iter())
                .any(|r| r.clause == rewritten.clause);
            if !duplicate {
                merged_restrictions.push(Arc::new(rewritten));
            }
        }
        // 列等值条件会过滤掉该列为 NULL 的行，单表扫描需要显式保留这一过滤
        for &attno in columns {
            let test = Expression::is_not_null(Expression::var(survivor, attno));
            let exists = survivor_rel
                .base_restrict_info
                .iter()
                .chain(merged_restrictions.iter())
                .any(|r| r.clause == test);
            if !exists {
                merged_restrictions.push(Arc::new(RestrictInfo::new(test)));
            }
        }

        let mut added_targets: Vec<Expression> = Vec::new();
        for expr in &eliminated_rel.reltarget.exprs {
            let rewritten = rewriter.rewritten_expr(expr)?;
            if !survivor_rel.reltarget.exprs.contains(&rewritten) && !added_targets.contains(&rewritten) {
                added_targets.push(rewritten);
            }
        }

        for expr in &root.rel(candidate.joinrel)?.reltarget.exprs {
            check_rewritable(expr)?;
        }
        for entry in &root.processed_tlist {
            check_rewritable(&entry.expr)?;
        }

        Ok(PreparedRewrite {
            survivor,
            eliminated,
            child: kept.path,
            merged_restrictions,
            added_targets,
        })
    }

    fn commit(
        &self,
        root: &mut PlannerInfo,
        candidate: &JoinCandidate<'_>,
        prepared: PreparedRewrite,
    ) -> PlannerResult<CollapseOutcome> {
        let PreparedRewrite {
            survivor,
            eliminated,
            child,
            merged_restrictions,
            added_targets,
        } = prepared;
        let rewriter = ReferenceRewriter::new(eliminated, survivor)
            .with_max_depth(self.config.max_stack_depth)
            .with_verbose(self.trace().verbose());

        let survivor_rel = root.rel_mut(RelHandle::Base(survivor))?;
        survivor_rel.base_restrict_info.extend(merged_restrictions);
        survivor_rel.reltarget.exprs.extend(added_targets);

        rewriter.rewrite_exprs(root.processed_tlist.iter_mut().map(|t| &mut t.expr))?;

        let joinrel = root.rel_mut(candidate.joinrel)?;
        rewriter.rewrite_exprs(joinrel.reltarget.exprs.iter_mut())?;

        let path = SelfJoinPath::new(joinrel.relids.clone(), child, survivor, eliminated);
        let cost = *path.cost();
        joinrel.add_path(PathNodeEnum::SelfJoin(path));

        Ok(CollapseOutcome::Collapsed {
            survivor,
            eliminated,
            cost,
        })
    }
}

fn base_relid(rel: &RelInfo) -> PlannerResult<RelId> {
    rel.relid
        .filter(|_| rel.is_base())
        .ok_or_else(|| ShapeViolation::NotBaseRelation(rel.relids.to_string()).into())
}
