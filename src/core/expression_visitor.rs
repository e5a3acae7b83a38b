//! 通用表达式遍历
//!
//! 遍历函数只负责“进入直接子节点”这一步，具体访问逻辑由调用方的
//! 回调实现，回调内部再调用遍历函数即可完成递归：
//!
//! ```rust,ignore
//! fn walker(&mut self, node: &Expression) -> PlannerResult<bool> {
//!     if let Expression::Var(v) = node { /* ... */ }
//!     expression_tree_walker(node, &mut |child| self.walker(child))
//! }
//! ```

use crate::core::error::{PlannerResult, ShapeViolation};
use crate::core::types::Expression;

/// 对每个直接子表达式调用 `walker`
///
/// 任一回调返回 `Ok(true)` 时立即停止并返回 `Ok(true)`
pub fn expression_tree_walker<F>(expr: &Expression, walker: &mut F) -> PlannerResult<bool>
where
    F: FnMut(&Expression) -> PlannerResult<bool>,
{
    for child in expr.children() {
        if walker(child)? {
            return Ok(true);
        }
    }
    Ok(false)
}

/// 对每个直接子表达式调用 `mutator`，原地修改
pub fn expression_tree_mutator<F>(expr: &mut Expression, mutator: &mut F) -> PlannerResult<()>
where
    F: FnMut(&mut Expression) -> PlannerResult<()>,
{
    for child in expr.children_mut() {
        mutator(child)?;
    }
    Ok(())
}

/// 检查表达式树中是否存在未规划的子查询
pub fn contains_unplanned_subquery(expr: &Expression) -> bool {
    fn walker(node: &Expression) -> PlannerResult<bool> {
        if let Expression::Query { .. } = node {
            return Ok(true);
        }
        expression_tree_walker(node, &mut walker)
    }
    walker(expr).unwrap_or(true)
}

/// 要求表达式树中不存在未规划的子查询
pub fn ensure_planned(expr: &Expression) -> PlannerResult<()> {
    if contains_unplanned_subquery(expr) {
        return Err(ShapeViolation::UnplannedSubquery.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{RelId, Var};

    fn count_vars(expr: &Expression, count: &mut usize) -> PlannerResult<bool> {
        if let Expression::Var(_) = expr {
            *count += 1;
        }
        expression_tree_walker(expr, &mut |child| count_vars(child, count))
    }

    #[test]
    fn test_walker_visits_all_vars() {
        let expr = Expression::and(vec![
            Expression::equal(Expression::var(RelId(1), 1), Expression::var(RelId(2), 1)),
            Expression::is_not_null(Expression::var(RelId(1), 3)),
        ]);
        let mut count = 0;
        assert!(!count_vars(&expr, &mut count).unwrap());
        assert_eq!(count, 3);
    }

    #[test]
    fn test_walker_short_circuits() {
        let expr = Expression::and(vec![
            Expression::var(RelId(1), 1),
            Expression::var(RelId(2), 1),
        ]);
        let mut seen = Vec::new();
        let stopped = expression_tree_walker(&expr, &mut |child| {
            seen.push(child.clone());
            Ok(true)
        })
        .unwrap();
        assert!(stopped);
        assert_eq!(seen.len(), 1);
    }

    #[test]
    fn test_mutator_rewrites_children() {
        fn bump(expr: &mut Expression) -> PlannerResult<()> {
            if let Expression::Var(Var { varattno, .. }) = expr {
                *varattno += 1;
            }
            expression_tree_mutator(expr, &mut bump)
        }
        let mut expr = Expression::equal(Expression::var(RelId(1), 1), Expression::var(RelId(2), 4));
        bump(&mut expr).unwrap();
        assert_eq!(
            expr,
            Expression::equal(Expression::var(RelId(1), 2), Expression::var(RelId(2), 5))
        );
    }

    #[test]
    fn test_unplanned_subquery_detection() {
        let expr = Expression::or(vec![
            Expression::var(RelId(1), 1),
            Expression::Query { query_id: 7 },
        ]);
        assert!(contains_unplanned_subquery(&expr));
        assert!(matches!(
            ensure_planned(&expr),
            Err(crate::core::PlannerError::Shape(ShapeViolation::UnplannedSubquery))
        ));
        assert!(ensure_planned(&Expression::var(RelId(1), 1)).is_ok());
    }
}
