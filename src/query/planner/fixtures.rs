//! 两表连接的规划状态构造器
//!
//! 按宿主优化器的方式为一次两表连接准备规划状态：
//! 登记范围表与基表，按过滤条件估算行数，为基表生成顺序扫描与索引扫描路径，
//! 为连接关系生成嵌套循环与哈希连接路径，然后在扩展点上调用已注册的回调。
//!
//! 最终输出列在构造时就已确定，折叠之后不会自动更新，
//! 由上层路径回调负责修补其中对被消除关系的引用。

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::SelfJoinConfig;
use crate::core::error::{PlannerError, PlannerResult, ShapeViolation};
use crate::core::types::{AttrNumber, Expression, RelId, Relids, Value};
use crate::query::optimizer::hooks::PlannerHooks;
use crate::query::optimizer::self_join_collapse::{CollapseOutcome, JoinCandidate, SelfJoinCollapser};
use crate::query::planner::path::{JoinPath, PathCost, PathHeader, PathNode, PathNodeEnum};
use crate::query::planner::plan::{create_plan, PlanNodeEnum};
use crate::query::planner::planner_info::{
    JoinPathExtraData, JoinType, PathTarget, PlannerInfo, RangeTblEntry, RelHandle, RelInfo,
    RestrictInfo, TableOid, TargetEntry, UpperRelKind,
};

const CPU_TUPLE_COST: f64 = 0.01;
const CPU_OPERATOR_COST: f64 = 0.0025;
const INDEX_STARTUP_COST: f64 = 0.29;
const INDEX_FETCH_COST: f64 = 4.0;
const FILTER_SELECTIVITY: f64 = 0.1;
const COLUMN_WIDTH: u32 = 4;

/// 物理表定义
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDef {
    pub oid: TableOid,
    pub name: String,
    pub columns: Vec<String>,
    /// 有唯一约束的列
    pub unique_columns: Vec<String>,
    pub rows: f64,
}

impl TableDef {
    pub fn new(oid: u32, name: impl Into<String>, columns: &[&str], rows: f64) -> Self {
        Self {
            oid: TableOid(oid),
            name: name.into(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            unique_columns: Vec::new(),
            rows,
        }
    }

    pub fn with_unique(mut self, column: impl Into<String>) -> Self {
        self.unique_columns.push(column.into());
        self
    }

    /// 列名对应的属性号，从 1 开始
    pub fn attno(&self, column: &str) -> Option<AttrNumber> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|i| (i + 1) as AttrNumber)
    }

    pub fn is_unique(&self, column: &str) -> bool {
        self.unique_columns.iter().any(|c| c == column)
    }
}

#[derive(Debug, Clone)]
struct ColumnRef {
    alias: String,
    column: String,
}

impl ColumnRef {
    fn new(alias: &str, column: &str) -> Self {
        Self {
            alias: alias.to_string(),
            column: column.to_string(),
        }
    }
}

/// 两表连接场景构造器
#[derive(Debug, Clone)]
pub struct ScenarioBuilder {
    relations: Vec<(String, TableDef)>,
    filters: Vec<(ColumnRef, Value)>,
    join_clauses: Vec<(ColumnRef, ColumnRef)>,
    selects: Vec<ColumnRef>,
    inner_unique: Option<bool>,
    jointype: JoinType,
}

impl Default for ScenarioBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ScenarioBuilder {
    pub fn new() -> Self {
        Self {
            relations: Vec::new(),
            filters: Vec::new(),
            join_clauses: Vec::new(),
            selects: Vec::new(),
            inner_unique: None,
            jointype: JoinType::Inner,
        }
    }

    /// 添加一个范围表条目，第一个为外侧，第二个为内侧
    pub fn relation(mut self, alias: &str, table: &TableDef) -> Self {
        self.relations.push((alias.to_string(), table.clone()));
        self
    }

    /// `alias.column = value`
    pub fn filter(mut self, alias: &str, column: &str, value: impl Into<Value>) -> Self {
        self.filters.push((ColumnRef::new(alias, column), value.into()));
        self
    }

    /// 连接条件 `left.lcol = right.rcol`
    pub fn join_on(mut self, left: &str, lcol: &str, right: &str, rcol: &str) -> Self {
        self.join_clauses
            .push((ColumnRef::new(left, lcol), ColumnRef::new(right, rcol)));
        self
    }

    /// 追加一个输出列
    pub fn select(mut self, alias: &str, column: &str) -> Self {
        self.selects.push(ColumnRef::new(alias, column));
        self
    }

    /// 覆盖内侧唯一性的推导结果
    pub fn inner_unique(mut self, unique: bool) -> Self {
        self.inner_unique = Some(unique);
        self
    }

    pub fn join_type(mut self, jointype: JoinType) -> Self {
        self.jointype = jointype;
        self
    }

    pub fn build(self) -> PlannerResult<Scenario> {
        if self.relations.len() != 2 {
            return Err(PlannerError::Config(format!(
                "场景需要恰好两个关系，实际 {} 个",
                self.relations.len()
            )));
        }

        let mut root = PlannerInfo::new();
        let mut aliases = BTreeMap::new();
        let mut rte_relids = Vec::new();
        for (alias, table) in &self.relations {
            let relid = root.add_range_table_entry(RangeTblEntry::relation(
                alias.clone(),
                table.oid,
                table.name.clone(),
            ));
            aliases.insert(alias.clone(), relid);
            rte_relids.push(relid);
        }
        if aliases.len() != self.relations.len() {
            return Err(PlannerError::Config("场景中的别名重复".to_string()));
        }

        let select_exprs = self
            .selects
            .iter()
            .map(|c| self.column_expr(&aliases, c))
            .collect::<PlannerResult<Vec<_>>>()?;

        let mut join_exprs = Vec::new();
        for (l, r) in &self.join_clauses {
            join_exprs.push((self.column_expr(&aliases, l)?, self.column_expr(&aliases, r)?));
        }

        let mut base_relids = Vec::new();
        for ((alias, table), &relid) in self.relations.iter().zip(&rte_relids) {
            let rel = self.build_base_rel(&aliases, relid, alias, table, &select_exprs, &join_exprs)?;
            base_relids.push(root.add_base_rel(rel)?);
        }
        let (outer, inner) = (base_relids[0], base_relids[1]);

        let inner_unique = match self.inner_unique {
            Some(unique) => unique,
            None => self.derive_inner_unique(&aliases, inner),
        };
        let restrictlist: Vec<Arc<RestrictInfo>> = join_exprs
            .iter()
            .map(|(l, r)| Arc::new(RestrictInfo::new(Expression::equal(l.clone(), r.clone()))))
            .collect();
        let extra = JoinPathExtraData {
            restrictlist,
            inner_unique,
        };

        let width = select_exprs.len() as u32 * COLUMN_WIDTH;
        let outer_rel = root.rel(RelHandle::Base(outer))?;
        let inner_rel = root.rel(RelHandle::Base(inner))?;
        let rows = if inner_unique {
            outer_rel.rows.min(inner_rel.rows)
        } else {
            (outer_rel.rows * inner_rel.rows * FILTER_SELECTIVITY).max(1.0)
        };
        let mut joinrel = RelInfo::join(
            outer_rel.relids.union(&inner_rel.relids),
            PathTarget::new(select_exprs.clone(), width),
            rows,
        );
        for path in join_paths(outer_rel, inner_rel, &joinrel, self.jointype, &extra)? {
            joinrel.add_path(path);
        }
        let joinrel = RelHandle::Join(root.add_join_rel(joinrel));

        root.processed_tlist = select_exprs
            .iter()
            .zip(&self.selects)
            .enumerate()
            .map(|(i, (expr, c))| TargetEntry::new(expr.clone(), (i + 1) as i16, Some(c.column.clone())))
            .collect();

        Ok(Scenario {
            root,
            joinrel,
            outerrel: RelHandle::Base(outer),
            innerrel: RelHandle::Base(inner),
            jointype: self.jointype,
            extra,
            upper_target: PathTarget::new(select_exprs, width),
            aliases,
        })
    }

    fn table_of(&self, alias: &str) -> PlannerResult<&TableDef> {
        self.relations
            .iter()
            .find(|(a, _)| a == alias)
            .map(|(_, t)| t)
            .ok_or_else(|| PlannerError::Config(format!("未知的别名: {}", alias)))
    }

    fn column_expr(&self, aliases: &BTreeMap<String, RelId>, c: &ColumnRef) -> PlannerResult<Expression> {
        let table = self.table_of(&c.alias)?;
        let attno = table.attno(&c.column).ok_or_else(|| {
            PlannerError::Config(format!("表 {} 没有列 {}", table.name, c.column))
        })?;
        let relid = aliases
            .get(&c.alias)
            .copied()
            .ok_or_else(|| PlannerError::Config(format!("未知的别名: {}", c.alias)))?;
        Ok(Expression::var(relid, attno))
    }

    /// 内侧在某个连接列上有唯一约束
    fn derive_inner_unique(&self, aliases: &BTreeMap<String, RelId>, inner: RelId) -> bool {
        self.join_clauses.iter().any(|(l, r)| {
            [l, r].into_iter().any(|c| {
                aliases.get(&c.alias) == Some(&inner)
                    && self
                        .table_of(&c.alias)
                        .map_or(false, |t| t.is_unique(&c.column))
            })
        })
    }

    fn build_base_rel(
        &self,
        aliases: &BTreeMap<String, RelId>,
        relid: RelId,
        alias: &str,
        table: &TableDef,
        select_exprs: &[Expression],
        join_exprs: &[(Expression, Expression)],
    ) -> PlannerResult<RelInfo> {
        // 只保留连接之上还需要的列
        let mut needed: Vec<Expression> = Vec::new();
        let candidates = select_exprs
            .iter()
            .chain(join_exprs.iter().flat_map(|(l, r)| [l, r]));
        for expr in candidates {
            if expr.references(relid) && !needed.contains(expr) {
                needed.push(expr.clone());
            }
        }
        let width = needed.len() as u32 * COLUMN_WIDTH;

        let mut rows = table.rows;
        let mut unique_filter: Option<(Arc<RestrictInfo>, &str)> = None;
        let mut restrictions = Vec::new();
        for (c, value) in self.filters.iter().filter(|(c, _)| c.alias == alias) {
            let var = self.column_expr(aliases, c)?;
            let rinfo = Arc::new(RestrictInfo::new(Expression::equal(
                var,
                Expression::Const(value.clone()),
            )));
            if table.is_unique(&c.column) {
                rows = 1.0;
                unique_filter.get_or_insert_with(|| (rinfo.clone(), c.column.as_str()));
            } else {
                rows *= FILTER_SELECTIVITY;
            }
            restrictions.push(rinfo);
        }
        let rows = rows.max(1.0);

        let mut rel = RelInfo::base(relid, Some(table.oid), PathTarget::new(needed, width), rows);
        let seq_cost = table.rows * CPU_TUPLE_COST
            + table.rows * CPU_OPERATOR_COST * restrictions.len() as f64;
        rel.base_restrict_info = restrictions;
        rel.add_path(PathNodeEnum::scan(
            rel.relids.clone(),
            PathCost::new(0.0, seq_cost, rows, width),
        ));
        if let Some((rinfo, column)) = unique_filter {
            rel.add_path(PathNodeEnum::index_scan(
                rel.relids.clone(),
                PathCost::new(
                    INDEX_STARTUP_COST,
                    INDEX_STARTUP_COST + INDEX_FETCH_COST + rows * CPU_TUPLE_COST,
                    rows,
                    width,
                ),
                format!("{}_{}_key", table.name, column),
                vec![rinfo],
            ));
        }
        Ok(rel)
    }
}

/// 以两侧代价最低的路径生成嵌套循环与哈希连接路径
fn join_paths(
    outer: &RelInfo,
    inner: &RelInfo,
    joinrel: &RelInfo,
    jointype: JoinType,
    extra: &JoinPathExtraData,
) -> PlannerResult<Vec<PathNodeEnum>> {
    let outer_path = outer
        .cheapest_total_path()
        .ok_or_else(|| ShapeViolation::RelationMissing(format!("{} 没有候选路径", outer.relids)))?;
    let inner_path = inner
        .cheapest_total_path()
        .ok_or_else(|| ShapeViolation::RelationMissing(format!("{} 没有候选路径", inner.relids)))?;
    let o = *outer_path.cost();
    let i = *inner_path.cost();
    let width = joinrel.reltarget.width;

    let nestloop = PathCost::new(
        o.startup_cost + i.startup_cost,
        o.total_cost + o.estimated_rows * i.total_cost,
        joinrel.rows,
        width,
    );
    let hash = PathCost::new(
        i.total_cost,
        o.total_cost + i.total_cost + (o.estimated_rows + i.estimated_rows) * CPU_TUPLE_COST,
        joinrel.rows,
        width,
    );

    let make = |cost: PathCost| JoinPath {
        header: PathHeader::new(joinrel.relids.clone(), cost),
        jointype,
        outerjoinpath: Box::new(outer_path.clone()),
        innerjoinpath: Box::new(inner_path.clone()),
        joinrestrictinfo: extra.restrictlist.clone(),
    };
    Ok(vec![
        PathNodeEnum::NestLoop(make(nestloop)),
        PathNodeEnum::HashJoin(make(hash)),
    ])
}

/// 一次两表连接的规划状态
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub root: PlannerInfo,
    pub joinrel: RelHandle,
    pub outerrel: RelHandle,
    pub innerrel: RelHandle,
    pub jointype: JoinType,
    pub extra: JoinPathExtraData,
    /// 构造时确定的最终输出列
    pub upper_target: PathTarget,
    pub aliases: BTreeMap<String, RelId>,
}

impl Scenario {
    /// 读入 JSON 规划状态并检查其中的关系编号
    pub fn from_json(content: &str) -> PlannerResult<Self> {
        let scenario: Scenario = serde_json::from_str(content)?;
        scenario.root.validate()?;
        for rinfo in &scenario.extra.restrictlist {
            scenario.root.check_relids(&rinfo.required_relids)?;
            scenario.root.check_relids(&rinfo.clause.referenced_relids())?;
        }
        for expr in &scenario.upper_target.exprs {
            scenario.root.check_relids(&expr.referenced_relids())?;
        }
        for relid in scenario.aliases.values() {
            scenario.root.rte(*relid)?;
        }
        for handle in [scenario.joinrel, scenario.outerrel, scenario.innerrel] {
            scenario.root.rel(handle)?;
        }
        Ok(scenario)
    }

    pub fn join_rel(&self) -> PlannerResult<&RelInfo> {
        self.root.rel(self.joinrel)
    }

    pub fn relid_of(&self, alias: &str) -> Option<RelId> {
        self.aliases.get(alias).copied()
    }

    /// 直接调用折叠器，不经过回调链
    pub fn collapse(&mut self, config: SelfJoinConfig) -> PlannerResult<CollapseOutcome> {
        let candidate = JoinCandidate {
            joinrel: self.joinrel,
            outerrel: self.outerrel,
            innerrel: self.innerrel,
            jointype: self.jointype,
            extra: &self.extra,
        };
        SelfJoinCollapser::new(config).try_collapse(&mut self.root, candidate)
    }

    /// 在连接路径枚举扩展点上调用回调链
    pub fn enumerate_join(&mut self, hooks: &PlannerHooks) -> PlannerResult<()> {
        let candidate = JoinCandidate {
            joinrel: self.joinrel,
            outerrel: self.outerrel,
            innerrel: self.innerrel,
            jointype: self.jointype,
            extra: &self.extra,
        };
        hooks.set_join_pathlist(&mut self.root, candidate)
    }

    /// 生成最终输出关系：为连接关系的每条候选路径加一层投影，然后调用上层路径回调
    pub fn plan_upper(&mut self, hooks: &PlannerHooks) -> PlannerResult<RelHandle> {
        let joinrel = self.root.rel(self.joinrel)?;
        let relids: Relids = joinrel.relids.clone();
        let projections: Vec<PathNodeEnum> = joinrel
            .pathlist
            .iter()
            .map(|p| PathNodeEnum::projection(p.clone(), self.upper_target.clone(), CPU_OPERATOR_COST))
            .collect();

        let final_rel = self.root.fetch_upper_rel(UpperRelKind::Final, relids);
        final_rel.reltarget = self.upper_target.clone();
        for path in projections {
            final_rel.add_path(path);
        }

        let output = RelHandle::Upper(UpperRelKind::Final);
        hooks.create_upper_paths(&mut self.root, UpperRelKind::Final, self.joinrel, output)?;
        Ok(output)
    }

    /// 最终输出关系中代价最低的路径
    pub fn best_final_path(&self) -> PlannerResult<&PathNodeEnum> {
        let rel = self.root.rel(RelHandle::Upper(UpperRelKind::Final))?;
        rel.cheapest_total_path()
            .ok_or_else(|| ShapeViolation::RelationMissing("最终输出关系没有候选路径".to_string()).into())
    }

    /// 完整走一遍：连接枚举、上层路径、选路、下推
    pub fn plan(&mut self, hooks: &PlannerHooks) -> PlannerResult<PlanNodeEnum> {
        self.enumerate_join(hooks)?;
        self.plan_upper(hooks)?;
        let best = self.best_final_path()?;
        log::debug!("选中最终路径 {} (total_cost={:.2})", best.name(), best.cost().total_cost);
        create_plan(&self.root, best)
    }
}

/// 表 t(id 唯一, x, y, z, w)
pub fn table_t() -> TableDef {
    TableDef::new(100, "t", &["id", "x", "y", "z", "w"], 1000.0).with_unique("id")
}

/// `SELECT a.x FROM t a JOIN t b ON a.id = b.id WHERE a.id = 5 AND b.y = 10`
pub fn scenario_a() -> PlannerResult<Scenario> {
    let t = table_t();
    ScenarioBuilder::new()
        .relation("a", &t)
        .relation("b", &t)
        .join_on("a", "id", "b", "id")
        .filter("a", "id", 5)
        .filter("b", "y", 10)
        .select("a", "x")
        .build()
}

/// 场景 A 再加一个不同列的连接条件 `a.z = b.w`
pub fn scenario_b() -> PlannerResult<Scenario> {
    let t = table_t();
    ScenarioBuilder::new()
        .relation("a", &t)
        .relation("b", &t)
        .join_on("a", "id", "b", "id")
        .join_on("a", "z", "b", "w")
        .filter("a", "id", 5)
        .filter("b", "y", 10)
        .select("a", "x")
        .build()
}

/// `SELECT a.x FROM t1 a JOIN t2 b ON a.id = b.id`
pub fn scenario_c() -> PlannerResult<Scenario> {
    let t1 = TableDef::new(101, "t1", &["id", "x"], 1000.0).with_unique("id");
    let t2 = TableDef::new(102, "t2", &["id", "x"], 1000.0).with_unique("id");
    ScenarioBuilder::new()
        .relation("a", &t1)
        .relation("b", &t2)
        .join_on("a", "id", "b", "id")
        .select("a", "x")
        .build()
}

/// 场景 A，但 id 没有唯一约束
pub fn scenario_d() -> PlannerResult<Scenario> {
    let t = TableDef::new(100, "t", &["id", "x", "y", "z", "w"], 1000.0);
    ScenarioBuilder::new()
        .relation("a", &t)
        .relation("b", &t)
        .join_on("a", "id", "b", "id")
        .filter("a", "id", 5)
        .filter("b", "y", 10)
        .select("a", "x")
        .build()
}

/// 按名称取内置场景
pub fn scenario_by_name(name: &str) -> PlannerResult<Scenario> {
    match name.to_ascii_lowercase().as_str() {
        "a" => scenario_a(),
        "b" => scenario_b(),
        "c" => scenario_c(),
        "d" => scenario_d(),
        other => Err(PlannerError::Config(format!("未知的场景: {}", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scenario_a_shape() {
        let s = scenario_a().unwrap();
        let a = s.relid_of("a").unwrap();
        let b = s.relid_of("b").unwrap();
        assert_eq!(s.outerrel, RelHandle::Base(a));
        assert_eq!(s.innerrel, RelHandle::Base(b));
        assert!(s.extra.inner_unique);
        assert_eq!(s.extra.restrictlist.len(), 1);

        let a_rel = s.root.base_rel(a).unwrap();
        assert_eq!(a_rel.rows, 1.0);
        assert_eq!(a_rel.pathlist.len(), 2);
        assert!(matches!(a_rel.pathlist[1], PathNodeEnum::IndexScan(_)));
        // 索引条件与基表限制条件是同一份记录
        let PathNodeEnum::IndexScan(idx) = &a_rel.pathlist[1] else {
            unreachable!()
        };
        assert!(Arc::ptr_eq(&idx.index_clauses[0], &a_rel.base_restrict_info[0]));

        let b_rel = s.root.base_rel(b).unwrap();
        assert_eq!(b_rel.rows, 100.0);

        let joinrel = s.join_rel().unwrap();
        assert_eq!(joinrel.pathlist.len(), 2);
        assert!(joinrel.pathlist.iter().all(|p| p.is_join()));
        assert_eq!(s.root.processed_tlist.len(), 1);
    }

    #[test]
    fn test_uniqueness_derived_from_inner_side() {
        assert!(!scenario_d().unwrap().extra.inner_unique);

        let t = table_t();
        let s = ScenarioBuilder::new()
            .relation("a", &t)
            .relation("b", &t)
            .join_on("a", "x", "b", "x")
            .build()
            .unwrap();
        assert!(!s.extra.inner_unique);
    }

    #[test]
    fn test_builder_errors() {
        let t = table_t();
        assert!(matches!(
            ScenarioBuilder::new().relation("a", &t).build(),
            Err(PlannerError::Config(_))
        ));
        assert!(ScenarioBuilder::new()
            .relation("a", &t)
            .relation("b", &t)
            .select("c", "x")
            .build()
            .is_err());
        assert!(ScenarioBuilder::new()
            .relation("a", &t)
            .relation("b", &t)
            .select("a", "nope")
            .build()
            .is_err());
        assert!(scenario_by_name("z").is_err());
        assert!(scenario_by_name("A").is_ok());
    }

    #[test]
    fn test_from_json_rejects_unknown_relid() {
        let mut s = scenario_a().unwrap();
        let a = s.relid_of("a").unwrap();
        assert_eq!(Scenario::from_json(&serde_json::to_string(&s).unwrap()).unwrap(), s);

        let far = Expression::var(RelId(u32::MAX), 1);
        s.extra
            .restrictlist
            .push(Arc::new(RestrictInfo::new(Expression::equal(Expression::var(a, 1), far))));
        let json = serde_json::to_string(&s).unwrap();
        assert!(matches!(
            Scenario::from_json(&json),
            Err(PlannerError::Shape(ShapeViolation::UnknownRelid(RelId(u32::MAX))))
        ));
        assert!(matches!(
            Scenario::from_json("{"),
            Err(PlannerError::Serialization(_))
        ));
    }

    #[test]
    fn test_scenario_serde_round_trip() {
        let s = scenario_a().unwrap();
        let json = serde_json::to_string(&s).unwrap();
        let back: Scenario = serde_json::from_str(&json).unwrap();
        assert_eq!(back, s);
    }
}
