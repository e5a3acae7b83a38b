//! 关系编号重写
//!
//! 把表达式、关系集合和限制条件中的旧编号替换为新编号，其余部分保持不变。
//!
//! 两种模式：
//! - 原地修改：只用于本次规划独占的结构（连接关系的输出列、查询最终输出列、
//!   包装路径自身的投影）
//! - 复制后修改：用于从即将被消除的关系并入保留关系的限制条件，
//!   原 `Arc<RestrictInfo>` 可能仍被其他候选路径引用，保持不动
//!
//! 原地修改前先完整校验，校验失败时不修改任何内容。

use std::sync::Arc;

use crate::core::error::{PlannerError, PlannerResult, ShapeViolation};
use crate::core::expression_visitor::{ensure_planned, expression_tree_mutator};
use crate::core::types::{Expression, RelId, Relids};
use crate::query::optimizer::stack_guard::StackGuard;
use crate::query::planner::path::{PathChildAccessor, PathNode, PathNodeEnum};
use crate::query::planner::planner_info::RestrictInfo;

const DEFAULT_MAX_DEPTH: usize = 1000;

/// 校验表达式可以安全地原地重写
pub fn check_rewritable(expr: &Expression) -> PlannerResult<()> {
    ensure_planned(expr)
}

/// 替换关系集合中的编号，不含旧编号时原样返回
pub fn adjust_relids(relids: &Relids, old: RelId, new: RelId) -> Relids {
    let mut adjusted = relids.clone();
    if adjusted.remove(old) {
        adjusted.add(new);
    }
    adjusted
}

/// 编号重写器
#[derive(Debug, Clone)]
pub struct ReferenceRewriter {
    old: RelId,
    new: RelId,
    max_depth: usize,
    verbose: bool,
}

impl ReferenceRewriter {
    pub fn new(old: RelId, new: RelId) -> Self {
        Self {
            old,
            new,
            max_depth: DEFAULT_MAX_DEPTH,
            verbose: false,
        }
    }

    /// 路径级重写的最大递归深度
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// 记录每次替换
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn old(&self) -> RelId {
        self.old
    }

    pub fn new_relid(&self) -> RelId {
        self.new
    }

    pub fn adjust_relids(&self, relids: &Relids) -> Relids {
        adjust_relids(relids, self.old, self.new)
    }

    fn replace(&self, expr: &mut Expression, count: &mut usize) -> PlannerResult<()> {
        match expr {
            Expression::Query { .. } => return Err(ShapeViolation::UnplannedSubquery.into()),
            Expression::Var(var) if var.varno == self.old => {
                var.varno = self.new;
                *count += 1;
            }
            _ => {}
        }
        expression_tree_mutator(expr, &mut |child| self.replace(child, count))
    }

    /// 原地重写表达式，返回替换次数
    pub fn rewrite_expr(&self, expr: &mut Expression) -> PlannerResult<usize> {
        check_rewritable(expr)?;
        let mut count = 0;
        self.replace(expr, &mut count)?;
        if self.verbose && count > 0 {
            log::debug!("表达式 {} 中替换 {} -> {} 共 {} 处", expr, self.old, self.new, count);
        }
        Ok(count)
    }

    /// 原地重写表达式列表，全部校验通过后才开始修改
    pub fn rewrite_exprs<'a, I>(&self, exprs: I) -> PlannerResult<usize>
    where
        I: IntoIterator<Item = &'a mut Expression>,
    {
        let exprs: Vec<&mut Expression> = exprs.into_iter().collect();
        for expr in &exprs {
            check_rewritable(expr)?;
        }
        let mut total = 0;
        for expr in exprs {
            total += self.rewrite_expr(expr)?;
        }
        Ok(total)
    }

    /// 复制后重写表达式
    pub fn rewritten_expr(&self, expr: &Expression) -> PlannerResult<Expression> {
        let mut copy = expr.clone();
        self.rewrite_expr(&mut copy)?;
        Ok(copy)
    }

    /// 检查限制条件的关系集合确实引用了旧编号
    pub fn validate_restrict_info(&self, rinfo: &RestrictInfo) -> PlannerResult<()> {
        if !rinfo.clause_relids.contains(self.old) {
            return Err(self.missing("clause_relids"));
        }
        if !rinfo.required_relids.contains(self.old) {
            return Err(self.missing("required_relids"));
        }
        if let (Some(left), Some(right)) = (&rinfo.left_relids, &rinfo.right_relids) {
            if !left.contains(self.old) && !right.contains(self.old) {
                return Err(self.missing("left_relids/right_relids"));
            }
        }
        check_rewritable(&rinfo.clause)
    }

    fn missing(&self, set: &'static str) -> PlannerError {
        ShapeViolation::RelidMissing {
            set,
            relid: self.old,
        }
        .into()
    }

    /// 复制限制条件并替换编号，四个关系集合一起更新
    pub fn rewrite_restrict_info(&self, rinfo: &RestrictInfo) -> PlannerResult<RestrictInfo> {
        self.validate_restrict_info(rinfo)?;
        Ok(RestrictInfo {
            clause: self.rewritten_expr(&rinfo.clause)?,
            clause_relids: self.adjust_relids(&rinfo.clause_relids),
            left_relids: rinfo.left_relids.as_ref().map(|s| self.adjust_relids(s)),
            right_relids: rinfo.right_relids.as_ref().map(|s| self.adjust_relids(s)),
            required_relids: self.adjust_relids(&rinfo.required_relids),
        })
    }

    /// 原地重写从 `path` 向下直到第一个折叠路径（不含）之间每个节点自身的表达式
    ///
    /// 节点引用的限制条件按复制模式替换。遇到无法识别的路径类型时报错，
    /// 此时不修改任何节点。
    pub fn rewrite_path_targets(&self, path: &mut PathNodeEnum) -> PlannerResult<usize> {
        self.check_path(path, &mut StackGuard::new(self.max_depth))?;
        self.rewrite_path(path, &mut StackGuard::new(self.max_depth))
    }

    fn check_path(&self, path: &PathNodeEnum, guard: &mut StackGuard) -> PlannerResult<()> {
        if path.is_self_join() {
            return Ok(());
        }
        guard.guarded(|guard| {
            let exprs = path
                .own_exprs()
                .ok_or_else(|| unrecognized(path))?;
            for expr in exprs {
                check_rewritable(expr)?;
            }
            for rinfo in path.restrictions() {
                if rinfo.clause_relids.contains(self.old) {
                    self.validate_restrict_info(rinfo)?;
                }
            }
            for child in path.children().to_vec() {
                self.check_path(child, guard)?;
            }
            Ok(())
        })
    }

    fn rewrite_path(&self, path: &mut PathNodeEnum, guard: &mut StackGuard) -> PlannerResult<usize> {
        if path.is_self_join() {
            return Ok(0);
        }
        if let PathNodeEnum::Opaque(_) = path {
            return Err(unrecognized(path));
        }
        guard.guarded(|guard| {
            let exprs = path.own_exprs_mut().unwrap_or_default();
            let mut count = self.rewrite_exprs(exprs)?;
            if let Some(restrictions) = path.restrictions_mut() {
                for rinfo in restrictions.iter_mut() {
                    if rinfo.clause_relids.contains(self.old) {
                        *rinfo = Arc::new(self.rewrite_restrict_info(rinfo)?);
                        count += 1;
                    }
                }
            }
            for child in path.children_mut().unwrap_or_default() {
                count += self.rewrite_path(child, guard)?;
            }
            Ok(count)
        })
    }
}

fn unrecognized(path: &PathNodeEnum) -> PlannerError {
    let tag = match path {
        PathNodeEnum::Opaque(p) => p.tag.clone(),
        _ => path.name().to_string(),
    };
    ShapeViolation::UnrecognizedPath(tag).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Var;
    use crate::query::planner::path::{JoinPath, OpaquePath, PathCost, PathHeader, SelfJoinPath};
    use crate::query::planner::planner_info::{JoinType, PathTarget};

    fn v(relid: u32, attno: i16) -> Expression {
        Expression::var(RelId(relid), attno)
    }

    fn scan(relid: u32) -> PathNodeEnum {
        PathNodeEnum::scan(Relids::singleton(RelId(relid)), PathCost::zero())
    }

    #[test]
    fn test_rewrite_expr_in_place() {
        let rewriter = ReferenceRewriter::new(RelId(1), RelId(2));
        let mut expr = Expression::and(vec![
            Expression::equal(v(1, 1), v(2, 1)),
            Expression::is_not_null(v(1, 3)),
            Expression::Function {
                name: "lower".to_string(),
                args: vec![v(3, 2)],
            },
        ]);
        assert_eq!(rewriter.rewrite_expr(&mut expr).unwrap(), 2);
        assert!(!expr.references(RelId(1)));
        assert!(expr.references(RelId(3)));
    }

    #[test]
    fn test_unplanned_subquery_leaves_expression_untouched() {
        let rewriter = ReferenceRewriter::new(RelId(1), RelId(2));
        let mut expr = Expression::and(vec![v(1, 1), Expression::Query { query_id: 3 }]);
        let before = expr.clone();
        assert!(matches!(
            rewriter.rewrite_expr(&mut expr),
            Err(PlannerError::Shape(ShapeViolation::UnplannedSubquery))
        ));
        assert_eq!(expr, before);

        let mut list = vec![v(1, 1), Expression::Query { query_id: 4 }];
        assert!(rewriter.rewrite_exprs(list.iter_mut()).is_err());
        assert_eq!(list[0], v(1, 1));
    }

    #[test]
    fn test_adjust_relids() {
        let set = Relids::from_ids(&[RelId(1), RelId(3)]);
        assert_eq!(
            adjust_relids(&set, RelId(1), RelId(2)),
            Relids::from_ids(&[RelId(2), RelId(3)])
        );
        assert_eq!(adjust_relids(&set, RelId(5), RelId(2)), set);
    }

    #[test]
    fn test_rewrite_restrict_info_copies() {
        let original = Arc::new(RestrictInfo::new(Expression::equal(v(1, 2), Expression::constant(10))));
        let rewriter = ReferenceRewriter::new(RelId(1), RelId(2));
        let copy = rewriter.rewrite_restrict_info(&original).unwrap();

        assert_eq!(copy.clause, Expression::equal(v(2, 2), Expression::constant(10)));
        assert_eq!(copy.clause_relids, Relids::singleton(RelId(2)));
        assert_eq!(copy.left_relids, Some(Relids::singleton(RelId(2))));
        assert_eq!(copy.right_relids, Some(Relids::new()));
        assert_eq!(copy.required_relids, Relids::singleton(RelId(2)));
        assert!(copy.relids_consistent());
        // 原记录保持不变
        assert!(original.clause.references(RelId(1)));
    }

    #[test]
    fn test_rewrite_restrict_info_missing_relid() {
        let rinfo = RestrictInfo::new(Expression::equal(v(3, 2), Expression::constant(10)));
        let err = ReferenceRewriter::new(RelId(1), RelId(2))
            .rewrite_restrict_info(&rinfo)
            .unwrap_err();
        assert_eq!(
            err,
            PlannerError::Shape(ShapeViolation::RelidMissing {
                set: "clause_relids",
                relid: RelId(1),
            })
        );

        let mut broken = RestrictInfo::new(Expression::equal(v(1, 2), v(3, 2)));
        broken.left_relids = Some(Relids::singleton(RelId(3)));
        let err = ReferenceRewriter::new(RelId(1), RelId(2))
            .rewrite_restrict_info(&broken)
            .unwrap_err();
        assert!(matches!(
            err,
            PlannerError::Shape(ShapeViolation::RelidMissing {
                set: "left_relids/right_relids",
                ..
            })
        ));
    }

    #[test]
    fn test_rewrite_path_targets_stops_at_collapsed_node() {
        let inner_target = PathTarget::new(vec![v(1, 1)], 4);
        let collapsed = PathNodeEnum::SelfJoin(SelfJoinPath::new(
            Relids::from_ids(&[RelId(1), RelId(2)]),
            PathNodeEnum::projection(scan(2), inner_target.clone(), 0.0),
            RelId(2),
            RelId(1),
        ));
        let mut path = PathNodeEnum::projection(
            collapsed,
            PathTarget::new(vec![v(1, 1), v(1, 2)], 8),
            0.0,
        );

        let rewriter = ReferenceRewriter::new(RelId(1), RelId(2));
        assert_eq!(rewriter.rewrite_path_targets(&mut path).unwrap(), 2);

        let PathNodeEnum::Projection(proj) = &path else {
            panic!("expected projection");
        };
        assert_eq!(proj.target.exprs, vec![v(2, 1), v(2, 2)]);
        // 折叠节点内部不受影响
        let PathNodeEnum::SelfJoin(sj) = proj.subpath.as_ref() else {
            panic!("expected self join");
        };
        let PathNodeEnum::Projection(child) = sj.subpath() else {
            panic!("expected projection child");
        };
        assert_eq!(child.target, inner_target);
    }

    #[test]
    fn test_rewrite_path_targets_replaces_join_restrictions() {
        let clause = Arc::new(RestrictInfo::new(Expression::equal(v(1, 1), v(3, 1))));
        let mut path = PathNodeEnum::HashJoin(JoinPath {
            header: PathHeader::new(Relids::from_ids(&[RelId(1), RelId(3)]), PathCost::zero()),
            jointype: JoinType::Inner,
            outerjoinpath: Box::new(scan(2)),
            innerjoinpath: Box::new(scan(3)),
            joinrestrictinfo: vec![clause.clone()],
        });
        let rewriter = ReferenceRewriter::new(RelId(1), RelId(2));
        assert_eq!(rewriter.rewrite_path_targets(&mut path).unwrap(), 1);
        let rewritten = &path.restrictions()[0];
        assert_eq!(rewritten.clause, Expression::equal(v(2, 1), v(3, 1)));
        assert!(!Arc::ptr_eq(rewritten, &clause));
        assert!(clause.clause.references(RelId(1)));
    }

    #[test]
    fn test_rewrite_path_targets_rejects_opaque() {
        let opaque = PathNodeEnum::Opaque(OpaquePath {
            header: PathHeader::new(Relids::singleton(RelId(1)), PathCost::zero()),
            tag: "TidScan".to_string(),
        });
        let mut path = PathNodeEnum::projection(opaque, PathTarget::new(vec![v(1, 1)], 4), 0.0);
        let before = path.clone();
        let err = ReferenceRewriter::new(RelId(1), RelId(2))
            .rewrite_path_targets(&mut path)
            .unwrap_err();
        assert_eq!(
            err,
            PlannerError::Shape(ShapeViolation::UnrecognizedPath("TidScan".to_string()))
        );
        assert_eq!(path, before);
    }

    #[test]
    fn test_var_helper() {
        let mut expr = Expression::Var(Var::new(RelId(1), 7));
        let rewriter = ReferenceRewriter::new(RelId(1), RelId(9)).with_verbose(true);
        rewriter.rewrite_expr(&mut expr).unwrap();
        assert_eq!(expr, v(9, 7));
        assert_eq!(rewriter.old(), RelId(1));
        assert_eq!(rewriter.new_relid(), RelId(9));
    }
}
