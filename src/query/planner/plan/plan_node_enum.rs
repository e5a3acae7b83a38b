//! 执行计划节点定义
//!
//! 计划节点由选中的候选路径下推而来，节点的代价字段原样沿用路径的估算。

use serde::{Deserialize, Serialize};

use crate::core::error::{PlannerResult, ShapeViolation};
use crate::core::types::{Expression, RelId, Value};
use crate::query::planner::path::PathCost;
use crate::query::planner::planner_info::{JoinType, TableOid};

/// 输出列的一项：取输入行的某一列，或者常量
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ProjectionItem {
    Column(usize),
    Const(Value),
}

/// 输出列相对于输入列的表示
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectionInfo {
    pub items: Vec<ProjectionItem>,
}

impl ProjectionInfo {
    /// 把每个输出表达式表示为输入列位置或常量
    pub fn build(output: &[Expression], input: &[Expression]) -> PlannerResult<Self> {
        let items = output
            .iter()
            .map(|expr| {
                if let Some(pos) = input.iter().position(|e| e == expr) {
                    return Ok(ProjectionItem::Column(pos));
                }
                match expr {
                    Expression::Const(value) => Ok(ProjectionItem::Const(value.clone())),
                    _ => Err(ShapeViolation::UnprojectableTarget(expr.to_string()).into()),
                }
            })
            .collect::<PlannerResult<Vec<_>>>()?;
        Ok(Self { items })
    }

    /// 输出与宽度为 `input_width` 的输入逐列相同
    pub fn is_identity(&self, input_width: usize) -> bool {
        self.items.len() == input_width
            && self
                .items
                .iter()
                .enumerate()
                .all(|(i, item)| matches!(item, ProjectionItem::Column(c) if *c == i))
    }
}

/// 顺序扫描
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeqScanNode {
    pub relid: RelId,
    pub table: Option<TableOid>,
    pub quals: Vec<Expression>,
    pub tlist: Vec<Expression>,
    pub cost: PathCost,
}

/// 索引扫描
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexScanNode {
    pub relid: RelId,
    pub index_name: String,
    /// 由索引求值的条件
    pub index_quals: Vec<Expression>,
    /// 取出行后再过滤的条件
    pub quals: Vec<Expression>,
    pub tlist: Vec<Expression>,
    pub cost: PathCost,
}

/// 投影
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionNode {
    pub child: Box<PlanNodeEnum>,
    pub tlist: Vec<Expression>,
    pub cost: PathCost,
}

/// 连接（嵌套循环、归并、哈希共用）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinNode {
    pub jointype: JoinType,
    pub join_quals: Vec<Expression>,
    pub outer: Box<PlanNodeEnum>,
    pub inner: Box<PlanNodeEnum>,
    pub tlist: Vec<Expression>,
    pub cost: PathCost,
}

/// 折叠后的自连接节点
///
/// 恰好一个子计划。扫描列等于子计划的输出列，输出列由扫描列重新表示。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelfJoinScanNode {
    pub child: Box<PlanNodeEnum>,
    pub scan_tlist: Vec<Expression>,
    pub tlist: Vec<Expression>,
    pub projection: ProjectionInfo,
    pub survivor: RelId,
    pub eliminated: RelId,
    pub cost: PathCost,
}

impl SelfJoinScanNode {
    /// 注册表中的计划方法名
    pub const PLAN_METHODS: &'static str = "PlanSelfJoin";
    /// 注册表中的执行方法名
    pub const EXEC_METHODS: &'static str = "ExecSelfJoin";

    /// 输出是否与子计划逐列相同
    pub fn is_passthrough(&self) -> bool {
        self.projection.is_identity(self.scan_tlist.len())
    }
}

/// 执行计划节点枚举
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PlanNodeEnum {
    SeqScan(SeqScanNode),
    IndexScan(IndexScanNode),
    Projection(ProjectionNode),
    NestLoop(JoinNode),
    MergeJoin(JoinNode),
    HashJoin(JoinNode),
    SelfJoinScan(SelfJoinScanNode),
}

impl PlanNodeEnum {
    pub fn name(&self) -> &'static str {
        match self {
            PlanNodeEnum::SeqScan(_) => "SeqScan",
            PlanNodeEnum::IndexScan(_) => "IndexScan",
            PlanNodeEnum::Projection(_) => "Projection",
            PlanNodeEnum::NestLoop(_) => "NestLoop",
            PlanNodeEnum::MergeJoin(_) => "MergeJoin",
            PlanNodeEnum::HashJoin(_) => "HashJoin",
            PlanNodeEnum::SelfJoinScan(_) => "SelfJoin",
        }
    }

    pub fn cost(&self) -> &PathCost {
        match self {
            PlanNodeEnum::SeqScan(n) => &n.cost,
            PlanNodeEnum::IndexScan(n) => &n.cost,
            PlanNodeEnum::Projection(n) => &n.cost,
            PlanNodeEnum::NestLoop(n) | PlanNodeEnum::MergeJoin(n) | PlanNodeEnum::HashJoin(n) => {
                &n.cost
            }
            PlanNodeEnum::SelfJoinScan(n) => &n.cost,
        }
    }

    /// 输出列
    pub fn tlist(&self) -> &[Expression] {
        match self {
            PlanNodeEnum::SeqScan(n) => &n.tlist,
            PlanNodeEnum::IndexScan(n) => &n.tlist,
            PlanNodeEnum::Projection(n) => &n.tlist,
            PlanNodeEnum::NestLoop(n) | PlanNodeEnum::MergeJoin(n) | PlanNodeEnum::HashJoin(n) => {
                &n.tlist
            }
            PlanNodeEnum::SelfJoinScan(n) => &n.tlist,
        }
    }

    /// 子计划，连接按外侧、内侧的顺序
    pub fn children(&self) -> Vec<&PlanNodeEnum> {
        match self {
            PlanNodeEnum::SeqScan(_) | PlanNodeEnum::IndexScan(_) => vec![],
            PlanNodeEnum::Projection(n) => vec![n.child.as_ref()],
            PlanNodeEnum::NestLoop(n) | PlanNodeEnum::MergeJoin(n) | PlanNodeEnum::HashJoin(n) => {
                vec![n.outer.as_ref(), n.inner.as_ref()]
            }
            PlanNodeEnum::SelfJoinScan(n) => vec![n.child.as_ref()],
        }
    }

    pub fn as_self_join(&self) -> Option<&SelfJoinScanNode> {
        match self {
            PlanNodeEnum::SelfJoinScan(n) => Some(n),
            _ => None,
        }
    }

    /// 先序查找第一个满足条件的节点
    pub fn find<F>(&self, pred: &F) -> Option<&PlanNodeEnum>
    where
        F: Fn(&PlanNodeEnum) -> bool,
    {
        if pred(self) {
            return Some(self);
        }
        self.children().into_iter().find_map(|c| c.find(pred))
    }

    /// 计划树中是否还有连接节点
    pub fn contains_join(&self) -> bool {
        self.find(&|n| {
            matches!(
                n,
                PlanNodeEnum::NestLoop(_) | PlanNodeEnum::MergeJoin(_) | PlanNodeEnum::HashJoin(_)
            )
        })
        .is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(relid: u32, attno: i16) -> Expression {
        Expression::var(RelId(relid), attno)
    }

    #[test]
    fn test_projection_info_positions_and_constants() {
        let input = vec![v(1, 1), v(1, 2), v(1, 3)];
        let output = vec![v(1, 3), Expression::constant(7), v(1, 1)];
        let info = ProjectionInfo::build(&output, &input).unwrap();
        assert_eq!(
            info.items,
            vec![
                ProjectionItem::Column(2),
                ProjectionItem::Const(Value::Int(7)),
                ProjectionItem::Column(0),
            ]
        );
        assert!(!info.is_identity(3));

        let same = ProjectionInfo::build(&input, &input).unwrap();
        assert!(same.is_identity(3));
        assert!(!same.is_identity(4));
    }

    #[test]
    fn test_projection_info_rejects_unknown_column() {
        let input = vec![v(1, 1)];
        let err = ProjectionInfo::build(&[v(2, 1)], &input).unwrap_err();
        assert!(matches!(
            err,
            crate::core::PlannerError::Shape(ShapeViolation::UnprojectableTarget(_))
        ));
    }
}
