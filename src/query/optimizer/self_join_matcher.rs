//! 自连接条件匹配
//!
//! 判断一次连接的所有限制条件是否都是“同一物理表、同一列”的等值比较。
//!
//! 逐个递归遍历条件表达式：
//! - 布尔连接等非比较节点透明，继续进入其操作数
//! - 两个操作数都是列引用的二元节点参与判定：两侧物理表不同、属性号不同
//!   或操作符不是等号时判定失败并立即停止，否则记为一条自连接证据
//! - 操作数不全是列引用的二元节点本身不导致失败，继续进入其操作数
//!
//! 遍历未失败时，再要求每个条件按 AND 展开后的每一项都是列与列的比较。
//! 其他形状的条件既不是证据，折叠后也无处安放，因此同样判定失败。
//!
//! 列引用使用保留编号、编号不在范围表中或遇到未规划的子查询属于结构异常。

use std::fmt;

use serde::Serialize;

use crate::core::error::{PlannerResult, ShapeViolation};
use crate::core::expression_visitor::expression_tree_walker;
use crate::core::types::{AttrNumber, BinaryOperator, BoolOperator, Expression, RelId, Var};
use crate::query::planner::planner_info::PlannerInfo;

/// 导致判定失败的比较
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Mismatch {
    /// 两侧不是同一张物理表（非物理表条目永远不匹配）
    DifferentTables { left: RelId, right: RelId },
    /// 两侧属性号不同
    DifferentAttributes { left: AttrNumber, right: AttrNumber },
    /// 列与列之间的比较不是等值比较
    NotEquality(BinaryOperator),
    /// 连接条件的某一项不是列与列的比较
    NotColumnComparison(String),
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mismatch::DifferentTables { left, right } => {
                write!(f, "关系 {} 与 {} 不是同一张表", left, right)
            }
            Mismatch::DifferentAttributes { left, right } => {
                write!(f, "属性号不同 ({} vs {})", left, right)
            }
            Mismatch::NotEquality(op) => write!(f, "操作符 {} 不是等值比较", op),
            Mismatch::NotColumnComparison(clause) => write!(f, "{} 不是列与列的比较", clause),
        }
    }
}

/// 匹配结果
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ClauseMatch {
    /// 自连接证据（符合条件的列等值比较）数量
    pub equalities: usize,
    /// 证据涉及的属性号，去重并按出现顺序
    pub columns: Vec<AttrNumber>,
    pub mismatch: Option<Mismatch>,
}

impl ClauseMatch {
    /// 没有任何条件判定失败
    pub fn matched(&self) -> bool {
        self.mismatch.is_none()
    }

    /// 判定成功且至少有一条证据
    pub fn proves_self_join(&self) -> bool {
        self.matched() && self.equalities > 0
    }
}

/// 自连接条件匹配器
pub struct SelfJoinMatcher<'a> {
    root: &'a PlannerInfo,
    verbose: bool,
}

impl<'a> SelfJoinMatcher<'a> {
    pub fn new(root: &'a PlannerInfo) -> Self {
        Self {
            root,
            verbose: false,
        }
    }

    /// 记录每个参与判定的比较
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// 匹配一组条件，遇到第一个失败的比较即停止
    pub fn match_clauses<'e, I>(&self, clauses: I) -> PlannerResult<ClauseMatch>
    where
        I: IntoIterator<Item = &'e Expression>,
    {
        let mut state = ClauseMatch::default();
        for clause in clauses {
            if self.walk(clause, &mut state)? {
                break;
            }
            if let Some(term) = non_column_term(clause) {
                state.mismatch = Some(Mismatch::NotColumnComparison(term.to_string()));
                break;
            }
        }
        Ok(state)
    }

    pub fn match_clause(&self, clause: &Expression) -> PlannerResult<ClauseMatch> {
        self.match_clauses(std::iter::once(clause))
    }

    /// 返回 true 表示判定失败，停止遍历
    fn walk(&self, node: &Expression, state: &mut ClauseMatch) -> PlannerResult<bool> {
        match node {
            Expression::Query { .. } => return Err(ShapeViolation::UnplannedSubquery.into()),
            Expression::Binary { op, left, right } => {
                if let (Some(lvar), Some(rvar)) = (left.as_var(), right.as_var()) {
                    if let Some(mismatch) = self.compare(*op, lvar, rvar)? {
                        state.mismatch = Some(mismatch);
                        return Ok(true);
                    }
                    state.equalities += 1;
                    if !state.columns.contains(&lvar.varattno) {
                        state.columns.push(lvar.varattno);
                    }
                    return Ok(false);
                }
            }
            _ => {}
        }
        expression_tree_walker(node, &mut |child| self.walk(child, state))
    }

    fn compare(&self, op: BinaryOperator, lvar: &Var, rvar: &Var) -> PlannerResult<Option<Mismatch>> {
        for var in [lvar, rvar] {
            if var.varno.is_special() {
                return Err(ShapeViolation::ReservedRelid(var.varno).into());
            }
        }
        let ltable = self.root.rte(lvar.varno)?.table();
        let rtable = self.root.rte(rvar.varno)?.table();

        if self.verbose {
            log::debug!(
                "比较 ${}.{} {} ${}.{} (表 {:?} / {:?})",
                lvar.varno,
                lvar.varattno,
                op,
                rvar.varno,
                rvar.varattno,
                ltable,
                rtable
            );
        }

        let same_table = matches!((ltable, rtable), (Some(l), Some(r)) if l == r);
        if !same_table {
            return Ok(Some(Mismatch::DifferentTables {
                left: lvar.varno,
                right: rvar.varno,
            }));
        }
        if lvar.varattno != rvar.varattno {
            return Ok(Some(Mismatch::DifferentAttributes {
                left: lvar.varattno,
                right: rvar.varattno,
            }));
        }
        if !op.is_equality() {
            return Ok(Some(Mismatch::NotEquality(op)));
        }
        Ok(None)
    }
}

/// AND 展开后第一个不是列与列比较的项
fn non_column_term(clause: &Expression) -> Option<&Expression> {
    match clause {
        Expression::Bool {
            op: BoolOperator::And,
            args,
        } => args.iter().find_map(non_column_term),
        Expression::Binary { left, right, .. } if left.as_var().is_some() && right.as_var().is_some() => {
            None
        }
        other => Some(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::PlannerError;
    use crate::query::planner::planner_info::{RangeTblEntry, TableOid};

    /// 1、2 号是同一张表 t，3 号是表 t2，4 号是子查询
    fn root() -> PlannerInfo {
        let mut root = PlannerInfo::new();
        root.add_range_table_entry(RangeTblEntry::relation("a", TableOid(100), "t"));
        root.add_range_table_entry(RangeTblEntry::relation("b", TableOid(100), "t"));
        root.add_range_table_entry(RangeTblEntry::relation("c", TableOid(200), "t2"));
        root.add_range_table_entry(RangeTblEntry::subquery("s"));
        root
    }

    fn v(relid: u32, attno: i16) -> Expression {
        Expression::var(RelId(relid), attno)
    }

    #[test]
    fn test_same_table_same_column() {
        let root = root();
        let result = SelfJoinMatcher::new(&root)
            .match_clause(&Expression::equal(v(1, 1), v(2, 1)))
            .unwrap();
        assert!(result.proves_self_join());
        assert_eq!(result.equalities, 1);
    }

    #[test]
    fn test_different_attributes_disqualify() {
        let root = root();
        let clauses = [
            Expression::equal(v(1, 1), v(2, 1)),
            Expression::equal(v(1, 3), v(2, 4)),
        ];
        let result = SelfJoinMatcher::new(&root).match_clauses(clauses.iter()).unwrap();
        assert!(!result.matched());
        assert_eq!(
            result.mismatch,
            Some(Mismatch::DifferentAttributes { left: 3, right: 4 })
        );
    }

    #[test]
    fn test_different_tables_disqualify() {
        let root = root();
        let matcher = SelfJoinMatcher::new(&root);
        let result = matcher.match_clause(&Expression::equal(v(1, 1), v(3, 1))).unwrap();
        assert!(matches!(result.mismatch, Some(Mismatch::DifferentTables { .. })));

        // 子查询条目没有物理表，永远不匹配
        let result = matcher.match_clause(&Expression::equal(v(4, 1), v(4, 1))).unwrap();
        assert!(!result.matched());
    }

    #[test]
    fn test_non_equality_disqualifies() {
        let root = root();
        let clause = Expression::binary(BinaryOperator::LessThan, v(1, 1), v(2, 1));
        let result = SelfJoinMatcher::new(&root).match_clause(&clause).unwrap();
        assert_eq!(result.mismatch, Some(Mismatch::NotEquality(BinaryOperator::LessThan)));
    }

    #[test]
    fn test_conjunction_of_equalities_matches() {
        let root = root();
        let clause = Expression::and(vec![
            Expression::equal(v(1, 1), v(2, 1)),
            Expression::and(vec![Expression::equal(v(1, 5), v(2, 5))]),
        ]);
        let result = SelfJoinMatcher::new(&root).match_clause(&clause).unwrap();
        assert!(result.proves_self_join());
        assert_eq!(result.equalities, 2);
        assert_eq!(result.columns, vec![1, 5]);

        // 嵌套在析取里的失败比较仍会被找到
        let nested = Expression::or(vec![Expression::equal(v(1, 1), v(3, 2))]);
        assert!(matches!(
            SelfJoinMatcher::new(&root).match_clause(&nested).unwrap().mismatch,
            Some(Mismatch::DifferentTables { .. })
        ));
    }

    #[test]
    fn test_non_column_terms_disqualify() {
        let root = root();
        let matcher = SelfJoinMatcher::new(&root);
        let shifted = Expression::equal(
            v(1, 2),
            Expression::binary(BinaryOperator::Add, v(2, 3), Expression::constant(1)),
        );
        let with_constant = Expression::and(vec![
            Expression::equal(v(1, 1), v(2, 1)),
            Expression::equal(v(1, 2), Expression::constant(5)),
        ]);
        let disjunction = Expression::or(vec![
            Expression::equal(v(1, 1), v(2, 1)),
            Expression::equal(v(1, 2), v(2, 2)),
        ]);

        for clause in [shifted, with_constant, disjunction] {
            let result = matcher
                .match_clauses([Expression::equal(v(1, 1), v(2, 1)), clause.clone()].iter())
                .unwrap();
            assert!(!result.proves_self_join(), "{}", clause);
            assert!(matches!(result.mismatch, Some(Mismatch::NotColumnComparison(_))));
        }
    }

    #[test]
    fn test_empty_clause_list_is_no_evidence() {
        let root = root();
        let result = SelfJoinMatcher::new(&root)
            .match_clauses(std::iter::empty())
            .unwrap();
        assert!(result.matched());
        assert!(!result.proves_self_join());
    }

    #[test]
    fn test_shape_violations() {
        let root = root();
        let matcher = SelfJoinMatcher::new(&root).with_verbose(true);
        let reserved = Expression::equal(v(1, 1), Expression::var(RelId::INNER_VAR, 1));
        assert!(matches!(
            matcher.match_clause(&reserved),
            Err(PlannerError::Shape(ShapeViolation::ReservedRelid(RelId::INNER_VAR)))
        ));

        let unknown = Expression::equal(v(1, 1), v(9, 1));
        assert!(matches!(
            matcher.match_clause(&unknown),
            Err(PlannerError::Shape(ShapeViolation::UnknownRelid(_)))
        ));

        let subquery = Expression::and(vec![Expression::Query { query_id: 1 }]);
        assert!(matches!(
            matcher.match_clause(&subquery),
            Err(PlannerError::Shape(ShapeViolation::UnplannedSubquery))
        ));
    }
}
