//! 集成测试共享工具模块

#![allow(dead_code)]

use selfjoin_planner::config::{self, SelfJoinConfig};
use selfjoin_planner::core::{Expression, PlannerResult, RelId};
use selfjoin_planner::query::optimizer::{install_self_join_hooks, PlannerHooks, SelfJoinHooks};
use selfjoin_planner::query::planner::fixtures::{table_t, Scenario, ScenarioBuilder};

/// 安装了自连接回调的回调链
pub fn self_join_hooks(config: SelfJoinConfig) -> (PlannerHooks, SelfJoinHooks) {
    let mut hooks = PlannerHooks::new();
    let installed = install_self_join_hooks(&mut hooks, config::shared(config));
    (hooks, installed)
}

/// 表达式中出现的全部列引用的关系编号
pub fn var_relids(expr: &Expression) -> Vec<RelId> {
    let mut out = Vec::new();
    collect(expr, &mut out);
    out
}

fn collect(expr: &Expression, out: &mut Vec<RelId>) {
    if let Some(v) = expr.as_var() {
        out.push(v.varno);
    }
    for child in expr.children() {
        collect(child, out);
    }
}

/// 断言一组表达式都不引用指定关系
pub fn assert_no_reference<'a, I>(exprs: I, relid: RelId, what: &str)
where
    I: IntoIterator<Item = &'a Expression>,
{
    for expr in exprs {
        assert!(
            !var_relids(expr).contains(&relid),
            "{} 中的 {} 仍然引用关系 {}",
            what,
            expr,
            relid
        );
    }
}

/// `SELECT a.x, b.y FROM t a JOIN t b ON a.id = b.id WHERE a.id = 5`
pub fn scenario_selecting_eliminated() -> PlannerResult<Scenario> {
    let t = table_t();
    ScenarioBuilder::new()
        .relation("a", &t)
        .relation("b", &t)
        .join_on("a", "id", "b", "id")
        .filter("a", "id", 5)
        .select("a", "x")
        .select("b", "y")
        .build()
}

/// 两侧没有过滤条件，代价完全相同
pub fn scenario_tie() -> PlannerResult<Scenario> {
    let t = table_t();
    ScenarioBuilder::new()
        .relation("a", &t)
        .relation("b", &t)
        .join_on("a", "id", "b", "id")
        .select("a", "x")
        .build()
}
