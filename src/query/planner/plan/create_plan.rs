//! 候选路径下推为执行计划
//!
//! 扫描节点的过滤条件在下推时从所属基表的限制条件中读取，
//! 因此折叠时合并到保留关系上的条件会出现在保留下来的扫描上。

use std::sync::Arc;

use crate::core::error::{PlannerError, PlannerResult, ShapeViolation};
use crate::core::types::{Expression, RelId, Relids};
use crate::query::planner::path::{JoinPath, PathNode, PathNodeEnum, SelfJoinPath};
use crate::query::planner::plan::plan_node_enum::{
    IndexScanNode, JoinNode, PlanNodeEnum, ProjectionInfo, ProjectionNode, SeqScanNode,
    SelfJoinScanNode,
};
use crate::query::planner::planner_info::{PlannerInfo, RelInfo, RestrictInfo};

/// 把选中的路径树下推为计划树
pub fn create_plan(root: &PlannerInfo, path: &PathNodeEnum) -> PlannerResult<PlanNodeEnum> {
    match path {
        PathNodeEnum::Scan(p) => {
            let (relid, rel) = scan_rel(root, &p.header.parent)?;
            Ok(PlanNodeEnum::SeqScan(SeqScanNode {
                relid,
                table: rel.table,
                quals: clauses(&rel.base_restrict_info),
                tlist: rel.reltarget.exprs.clone(),
                cost: *path.cost(),
            }))
        }
        PathNodeEnum::IndexScan(p) => {
            let (relid, rel) = scan_rel(root, &p.header.parent)?;
            let index_quals = clauses(&p.index_clauses);
            let quals = clauses(&rel.base_restrict_info)
                .into_iter()
                .filter(|q| !index_quals.contains(q))
                .collect();
            Ok(PlanNodeEnum::IndexScan(IndexScanNode {
                relid,
                index_name: p.index_name.clone(),
                index_quals,
                quals,
                tlist: rel.reltarget.exprs.clone(),
                cost: *path.cost(),
            }))
        }
        PathNodeEnum::Projection(p) => Ok(PlanNodeEnum::Projection(ProjectionNode {
            child: Box::new(create_plan(root, &p.subpath)?),
            tlist: p.target.exprs.clone(),
            cost: *path.cost(),
        })),
        PathNodeEnum::NestLoop(j) => Ok(PlanNodeEnum::NestLoop(create_join_plan(root, j)?)),
        PathNodeEnum::MergeJoin(j) => Ok(PlanNodeEnum::MergeJoin(create_join_plan(root, j)?)),
        PathNodeEnum::HashJoin(j) => Ok(PlanNodeEnum::HashJoin(create_join_plan(root, j)?)),
        PathNodeEnum::SelfJoin(sj) => Ok(PlanNodeEnum::SelfJoinScan(create_self_join_plan(root, sj)?)),
        other => Err(PlannerError::UnsupportedLowering(other.name().to_string())),
    }
}

/// 折叠路径下推为自连接计划节点
///
/// 子计划由保留下来的子路径生成，代价与行数原样复制。
/// 连接关系的输出列按子计划输出列的位置重新表示。
pub fn create_self_join_plan(root: &PlannerInfo, path: &SelfJoinPath) -> PlannerResult<SelfJoinScanNode> {
    let child = create_plan(root, path.subpath())?;
    let scan_tlist = child.tlist().to_vec();
    let joinrel = root.find_rel(path.parent())?;
    let tlist = joinrel.reltarget.exprs.clone();
    let projection = ProjectionInfo::build(&tlist, &scan_tlist)?;

    log::debug!(
        "下推折叠路径: 保留 {}，输出 {} 列，子计划 {} 列",
        path.survivor(),
        tlist.len(),
        scan_tlist.len()
    );

    Ok(SelfJoinScanNode {
        child: Box::new(child),
        scan_tlist,
        tlist,
        projection,
        survivor: path.survivor(),
        eliminated: path.eliminated(),
        cost: *path.cost(),
    })
}

fn create_join_plan(root: &PlannerInfo, join: &JoinPath) -> PlannerResult<JoinNode> {
    let outer = create_plan(root, &join.outerjoinpath)?;
    let inner = create_plan(root, &join.innerjoinpath)?;
    let rel = root.find_rel(&join.header.parent)?;
    Ok(JoinNode {
        jointype: join.jointype,
        join_quals: clauses(&join.joinrestrictinfo),
        outer: Box::new(outer),
        inner: Box::new(inner),
        tlist: rel.reltarget.exprs.clone(),
        cost: join.header.cost,
    })
}

fn scan_rel<'a>(root: &'a PlannerInfo, parent: &Relids) -> PlannerResult<(RelId, &'a RelInfo)> {
    let relid = parent
        .singleton_member()
        .ok_or_else(|| ShapeViolation::NotBaseRelation(parent.to_string()))?;
    let rel = root
        .base_rel(relid)
        .ok_or_else(|| ShapeViolation::RelationMissing(parent.to_string()))?;
    Ok((relid, rel))
}

fn clauses(rinfos: &[Arc<RestrictInfo>]) -> Vec<Expression> {
    rinfos.iter().map(|r| r.clause.clone()).collect()
}
