//! 上层路径修补集成测试

mod common;

use std::sync::Arc;

use common::{assert_no_reference, scenario_selecting_eliminated, self_join_hooks};
use selfjoin_planner::config::{self, SelfJoinConfig};
use selfjoin_planner::core::{Expression, PlannerError};
use selfjoin_planner::query::optimizer::{PlannerHooks, SelfJoinPathlistHook};
use selfjoin_planner::query::planner::path::{PathNodeEnum, ProjectionPath};
use selfjoin_planner::query::planner::plan::PlanNodeEnum;
use selfjoin_planner::query::planner::{RelHandle, UpperRelKind};

fn final_projections(scenario: &selfjoin_planner::query::planner::fixtures::Scenario) -> Vec<ProjectionPath> {
    scenario
        .root
        .rel(RelHandle::Upper(UpperRelKind::Final))
        .unwrap()
        .pathlist
        .iter()
        .filter_map(|p| match p {
            PathNodeEnum::Projection(proj) => Some(proj.clone()),
            _ => None,
        })
        .collect()
}

#[test]
fn test_projection_over_collapsed_node_is_patched() {
    let (hooks, _installed) = self_join_hooks(SelfJoinConfig::default());
    let mut scenario = scenario_selecting_eliminated().unwrap();
    let b = scenario.relid_of("b").unwrap();
    scenario.enumerate_join(&hooks).unwrap();
    scenario.plan_upper(&hooks).unwrap();

    let projections = final_projections(&scenario);
    assert_eq!(projections.len(), 3);
    for proj in &projections {
        if proj.subpath.is_self_join() {
            assert_no_reference(proj.target.exprs.iter(), b, "折叠路径上的投影");
        } else {
            // 未被选中的连接路径保持原样
            assert!(proj.target.exprs.iter().any(|e| e.references(b)));
        }
    }
}

#[test]
fn test_selected_eliminated_column_read_from_survivor() {
    let (hooks, _installed) = self_join_hooks(SelfJoinConfig::default());
    let mut scenario = scenario_selecting_eliminated().unwrap();
    let a = scenario.relid_of("a").unwrap();
    let b = scenario.relid_of("b").unwrap();

    let plan = scenario.plan(&hooks).unwrap();
    let PlanNodeEnum::Projection(top) = &plan else {
        panic!("最上层应是投影: {:?}", plan);
    };
    assert_eq!(
        top.tlist,
        vec![Expression::var(a, 2), Expression::var(a, 3)]
    );

    let sj = plan
        .find(&|n| n.as_self_join().is_some())
        .and_then(|n| n.as_self_join())
        .unwrap();
    assert_no_reference(sj.tlist.iter(), b, "自连接节点输出列");
    assert!(sj.child.tlist().contains(&Expression::var(a, 3)));
    assert_no_reference(sj.child.tlist().iter(), b, "保留关系的扫描输出列");
}

#[test]
fn test_without_upper_hook_reference_remains() {
    let mut hooks = PlannerHooks::new();
    let shared = config::shared(SelfJoinConfig::default());
    hooks.register_join_pathlist(Arc::new(SelfJoinPathlistHook::new(shared)));

    let mut scenario = scenario_selecting_eliminated().unwrap();
    let b = scenario.relid_of("b").unwrap();
    scenario.enumerate_join(&hooks).unwrap();
    scenario.plan_upper(&hooks).unwrap();

    let stale = final_projections(&scenario)
        .into_iter()
        .find(|p| p.subpath.is_self_join())
        .expect("应有折叠路径上的投影");
    assert!(stale.target.exprs.iter().any(|e| e.references(b)));
}

#[test]
fn test_depth_limit_aborts_planning() {
    let config = SelfJoinConfig {
        max_stack_depth: 1,
        ..SelfJoinConfig::default()
    };
    let (hooks, _installed) = self_join_hooks(config);
    let mut scenario = scenario_selecting_eliminated().unwrap();

    let err = scenario.plan(&hooks).unwrap_err();
    assert!(err.is_fatal());
    assert!(matches!(err, PlannerError::StackDepthExceeded { limit: 1, .. }));
}

#[test]
fn test_disabled_config_leaves_join_plan() {
    let config = SelfJoinConfig {
        enabled: false,
        ..SelfJoinConfig::default()
    };
    let (hooks, installed) = self_join_hooks(config);
    let mut scenario = scenario_selecting_eliminated().unwrap();
    let b = scenario.relid_of("b").unwrap();

    let plan = scenario.plan(&hooks).unwrap();
    assert!(plan.contains_join());
    assert!(!installed.join_pathlist.last_outcome().unwrap().is_collapsed());
    assert!(plan.tlist().iter().any(|e| e.references(b)));
}
