use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::core::types::Expression;
use crate::query::planner::plan::plan_node_enum::PlanNodeEnum;

/// 节点描述键值对
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pair {
    pub key: String,
    pub value: String,
}

impl Pair {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// 计划节点描述
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanNodeDescription {
    pub name: String,
    pub id: i64,
    pub description: Option<Vec<Pair>>,
    pub dependencies: Option<Vec<i64>>,
}

impl PlanNodeDescription {
    pub fn new(name: impl Into<String>, id: i64) -> Self {
        Self {
            name: name.into(),
            id,
            description: None,
            dependencies: None,
        }
    }

    pub fn add_description(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.description
            .get_or_insert_with(Vec::new)
            .push(Pair::new(key, value));
    }

    pub fn with_description(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.add_description(key, value);
        self
    }

    pub fn set_dependencies(&mut self, deps: Vec<i64>) {
        self.dependencies = Some(deps);
    }

    /// 查找描述项
    pub fn get(&self, key: &str) -> Option<&str> {
        self.description
            .as_ref()?
            .iter()
            .find(|p| p.key == key)
            .map(|p| p.value.as_str())
    }
}

/// 计划描述
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanDescription {
    pub plan_node_descs: Vec<PlanNodeDescription>,
    pub node_index_map: HashMap<i64, usize>,
    pub format: String,
}

impl PlanDescription {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node_desc(&mut self, desc: PlanNodeDescription) -> usize {
        let index = self.plan_node_descs.len();
        self.node_index_map.insert(desc.id, index);
        self.plan_node_descs.push(desc);
        index
    }

    pub fn get_node_desc(&self, node_id: i64) -> Option<&PlanNodeDescription> {
        self.node_index_map
            .get(&node_id)
            .and_then(|&index| self.plan_node_descs.get(index))
    }

    /// 按名称查找第一个节点
    pub fn find_by_name(&self, name: &str) -> Option<&PlanNodeDescription> {
        self.plan_node_descs.iter().find(|d| d.name == name)
    }
}

/// 先序编号生成计划描述，根节点编号为 0
pub fn describe_plan(plan: &PlanNodeEnum) -> PlanDescription {
    let mut out = PlanDescription::new();
    out.format = "row".to_string();
    let mut next_id = 0;
    describe_node(plan, &mut next_id, &mut out);
    out
}

fn describe_node(plan: &PlanNodeEnum, next_id: &mut i64, out: &mut PlanDescription) -> i64 {
    let id = *next_id;
    *next_id += 1;

    let cost = plan.cost();
    let mut desc = PlanNodeDescription::new(plan.name(), id)
        .with_description(
            "cost",
            format!("{:.2}..{:.2}", cost.startup_cost, cost.total_cost),
        )
        .with_description("rows", format!("{:.0}", cost.estimated_rows))
        .with_description("width", cost.estimated_width.to_string())
        .with_description("output", join_exprs(plan.tlist()));

    match plan {
        PlanNodeEnum::SeqScan(n) => {
            desc.add_description("relid", n.relid.to_string());
            if !n.quals.is_empty() {
                desc.add_description("filter", join_exprs(&n.quals));
            }
        }
        PlanNodeEnum::IndexScan(n) => {
            desc.add_description("relid", n.relid.to_string());
            desc.add_description("index", n.index_name.clone());
            desc.add_description("indexCond", join_exprs(&n.index_quals));
            if !n.quals.is_empty() {
                desc.add_description("filter", join_exprs(&n.quals));
            }
        }
        PlanNodeEnum::Projection(_) => {}
        PlanNodeEnum::NestLoop(n) | PlanNodeEnum::MergeJoin(n) | PlanNodeEnum::HashJoin(n) => {
            desc.add_description("joinType", format!("{:?}", n.jointype));
            desc.add_description("joinFilter", join_exprs(&n.join_quals));
        }
        PlanNodeEnum::SelfJoinScan(n) => {
            desc.add_description("survivor", n.survivor.to_string());
            desc.add_description("eliminated", n.eliminated.to_string());
            desc.add_description("passthrough", n.is_passthrough().to_string());
        }
    }

    // 先登记本节点，子节点随后按先序追加
    let index = out.add_node_desc(desc);
    let deps: Vec<i64> = plan
        .children()
        .into_iter()
        .map(|child| describe_node(child, next_id, out))
        .collect();
    if !deps.is_empty() {
        out.plan_node_descs[index].set_dependencies(deps);
    }
    id
}

fn join_exprs(exprs: &[Expression]) -> String {
    exprs
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::RelId;
    use crate::query::planner::path::PathCost;
    use crate::query::planner::plan::plan_node_enum::{ProjectionInfo, SeqScanNode, SelfJoinScanNode};

    #[test]
    fn test_self_join_node_described_as_self_join() {
        let tlist = vec![Expression::var(RelId(1), 1)];
        let scan = PlanNodeEnum::SeqScan(SeqScanNode {
            relid: RelId(1),
            table: None,
            quals: vec![],
            tlist: tlist.clone(),
            cost: PathCost::new(0.0, 5.0, 1.0, 4),
        });
        let plan = PlanNodeEnum::SelfJoinScan(SelfJoinScanNode {
            child: Box::new(scan),
            scan_tlist: tlist.clone(),
            tlist: tlist.clone(),
            projection: ProjectionInfo::build(&tlist, &tlist).unwrap(),
            survivor: RelId(1),
            eliminated: RelId(2),
            cost: PathCost::new(0.0, 5.0, 1.0, 4),
        });

        let desc = describe_plan(&plan);
        assert_eq!(desc.plan_node_descs.len(), 2);
        let root = desc.get_node_desc(0).unwrap();
        assert_eq!(root.name, "SelfJoin");
        assert_eq!(root.dependencies, Some(vec![1]));
        assert_eq!(root.get("passthrough"), Some("true"));
        assert_eq!(desc.get_node_desc(1).unwrap().name, "SeqScan");
        assert!(desc.find_by_name("NestLoop").is_none());
    }
}
