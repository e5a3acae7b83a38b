//! 规划器状态
//!
//! 本模块定义宿主优化器在一次规划过程中维护的关系图：
//! - `RangeTblEntry`: 范围表条目，基表条目携带物理表标识
//! - `RelInfo`: 关系描述（基表、连接关系或上层关系）
//! - `RestrictInfo`: 带关系集合注解的限制条件
//! - `PlannerInfo`: 整个规划过程的状态
//!
//! 关系描述之间不互相持有引用，统一通过 `RelHandle` 在 `PlannerInfo` 中查找。

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::error::{PlannerResult, ShapeViolation};
use crate::core::types::{Expression, RelId, Relids};
use crate::query::planner::path::{PathNodeEnum, PathNode};

/// 物理表标识
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableOid(pub u32);

impl fmt::Display for TableOid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 范围表条目类型
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RteKind {
    /// 物理表
    Relation { table: TableOid, table_name: String },
    /// 子查询
    Subquery,
    /// 连接结果
    Join,
    /// VALUES 列表
    Values,
}

/// 范围表条目
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeTblEntry {
    pub alias: String,
    pub kind: RteKind,
}

impl RangeTblEntry {
    pub fn relation(alias: impl Into<String>, table: TableOid, table_name: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
            kind: RteKind::Relation {
                table,
                table_name: table_name.into(),
            },
        }
    }

    pub fn subquery(alias: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
            kind: RteKind::Subquery,
        }
    }

    /// 物理表标识，非物理表条目返回 None
    pub fn table(&self) -> Option<TableOid> {
        match &self.kind {
            RteKind::Relation { table, .. } => Some(*table),
            _ => None,
        }
    }
}

/// 关系类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelKind {
    BaseRel,
    JoinRel,
    OtherMemberRel,
    UpperRel,
}

/// 上层关系所处的规划阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum UpperRelKind {
    SetOp,
    GroupAgg,
    Window,
    Distinct,
    Ordered,
    Final,
}

/// 连接类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Full,
    Semi,
    Anti,
}

/// 连接关系在 `PlannerInfo` 中的编号
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JoinRelId(pub usize);

/// 关系句柄
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelHandle {
    Base(RelId),
    Join(JoinRelId),
    Upper(UpperRelKind),
}

impl fmt::Display for RelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelHandle::Base(relid) => write!(f, "base rel {}", relid),
            RelHandle::Join(id) => write!(f, "join rel #{}", id.0),
            RelHandle::Upper(kind) => write!(f, "upper rel {:?}", kind),
        }
    }
}

/// 投影表达式列表
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PathTarget {
    pub exprs: Vec<Expression>,
    /// 估计的输出行宽（字节）
    pub width: u32,
}

impl PathTarget {
    pub fn new(exprs: Vec<Expression>, width: u32) -> Self {
        Self { exprs, width }
    }
}

/// 查询级最终输出列
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetEntry {
    pub expr: Expression,
    pub resno: i16,
    pub resname: Option<String>,
}

impl TargetEntry {
    pub fn new(expr: Expression, resno: i16, resname: Option<String>) -> Self {
        Self { expr, resno, resname }
    }
}

/// 限制条件
///
/// 约束：`left_relids ⊆ clause_relids`，`right_relids ⊆ clause_relids`，
/// `clause_relids ⊆ required_relids`。替换关系编号时四个集合必须一起更新。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestrictInfo {
    pub clause: Expression,
    /// 条件引用的全部关系
    pub clause_relids: Relids,
    /// 二元比较左操作数引用的关系（非简单二元比较时为 None）
    pub left_relids: Option<Relids>,
    /// 二元比较右操作数引用的关系
    pub right_relids: Option<Relids>,
    /// 求值条件所必需的关系
    pub required_relids: Relids,
}

impl RestrictInfo {
    /// 根据条件表达式推导关系集合
    pub fn new(clause: Expression) -> Self {
        let clause_relids = clause.referenced_relids();
        Self::with_required(clause, clause_relids)
    }

    /// 指定额外的必需关系（例如外连接下推限制）
    pub fn with_required(clause: Expression, required: Relids) -> Self {
        let clause_relids = clause.referenced_relids();
        let (left_relids, right_relids) = match &clause {
            Expression::Binary { op, left, right } if op.is_comparison() => (
                Some(left.referenced_relids()),
                Some(right.referenced_relids()),
            ),
            _ => (None, None),
        };
        let required_relids = required.union(&clause_relids);
        Self {
            clause,
            clause_relids,
            left_relids,
            right_relids,
            required_relids,
        }
    }

    /// 是否为简单二元比较
    pub fn is_binary_comparison(&self) -> bool {
        self.left_relids.is_some() && self.right_relids.is_some()
    }

    /// 检查四个关系集合之间的包含关系
    pub fn relids_consistent(&self) -> bool {
        let sides_ok = [&self.left_relids, &self.right_relids]
            .iter()
            .all(|side| side.as_ref().map_or(true, |s| s.is_subset(&self.clause_relids)));
        sides_ok && self.clause_relids.is_subset(&self.required_relids)
    }
}

/// 连接路径枚举时宿主提供的附加信息
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JoinPathExtraData {
    /// 适用于本次连接的限制条件
    pub restrictlist: Vec<Arc<RestrictInfo>>,
    /// 优化器是否已证明内侧在连接键上唯一
    pub inner_unique: bool,
}

/// 关系描述
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelInfo {
    pub kind: RelKind,
    pub relids: Relids,
    /// 基表的范围表编号
    pub relid: Option<RelId>,
    /// 基表的物理表标识
    pub table: Option<TableOid>,
    pub base_restrict_info: Vec<Arc<RestrictInfo>>,
    pub reltarget: PathTarget,
    /// 估计行数
    pub rows: f64,
    pub pathlist: Vec<PathNodeEnum>,
}

impl RelInfo {
    /// 创建基表关系
    pub fn base(relid: RelId, table: Option<TableOid>, reltarget: PathTarget, rows: f64) -> Self {
        Self {
            kind: RelKind::BaseRel,
            relids: Relids::singleton(relid),
            relid: Some(relid),
            table,
            base_restrict_info: Vec::new(),
            reltarget,
            rows,
            pathlist: Vec::new(),
        }
    }

    /// 创建连接关系
    pub fn join(relids: Relids, reltarget: PathTarget, rows: f64) -> Self {
        Self {
            kind: RelKind::JoinRel,
            relids,
            relid: None,
            table: None,
            base_restrict_info: Vec::new(),
            reltarget,
            rows,
            pathlist: Vec::new(),
        }
    }

    /// 创建上层关系
    pub fn upper(relids: Relids, reltarget: PathTarget) -> Self {
        Self {
            kind: RelKind::UpperRel,
            relids,
            relid: None,
            table: None,
            base_restrict_info: Vec::new(),
            reltarget,
            rows: 0.0,
            pathlist: Vec::new(),
        }
    }

    pub fn is_base(&self) -> bool {
        self.kind == RelKind::BaseRel
    }

    /// 添加候选路径
    pub fn add_path(&mut self, path: PathNodeEnum) {
        log::debug!(
            "关系 {} 新增候选路径 {} (total_cost={:.2})",
            self.relids,
            path.name(),
            path.cost().total_cost
        );
        self.pathlist.push(path);
    }

    /// 总代价最低的候选路径
    pub fn cheapest_total_path(&self) -> Option<&PathNodeEnum> {
        self.pathlist.iter().fold(None, |best: Option<&PathNodeEnum>, path| match best {
            Some(b) if b.cost().total_cost <= path.cost().total_cost => Some(b),
            _ => Some(path),
        })
    }

    /// 候选路径中是否已有折叠后的自连接路径
    pub fn has_self_join_path(&self) -> bool {
        self.pathlist.iter().any(|p| p.is_self_join())
    }
}

/// 一次规划过程的状态
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlannerInfo {
    /// 范围表，第 i 个元素对应编号 i+1
    pub range_table: Vec<RangeTblEntry>,
    /// 基表关系，按编号索引，0 号位置始终为空
    simple_rel_array: Vec<Option<RelInfo>>,
    join_rel_list: Vec<RelInfo>,
    upper_rels: BTreeMap<UpperRelKind, RelInfo>,
    /// 查询级最终输出列
    pub processed_tlist: Vec<TargetEntry>,
}

impl PlannerInfo {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加范围表条目，返回其编号
    pub fn add_range_table_entry(&mut self, rte: RangeTblEntry) -> RelId {
        self.range_table.push(rte);
        RelId(self.range_table.len() as u32)
    }

    /// 查找范围表条目
    pub fn rte(&self, relid: RelId) -> PlannerResult<&RangeTblEntry> {
        if relid.is_special() {
            return Err(ShapeViolation::ReservedRelid(relid).into());
        }
        relid
            .index()
            .checked_sub(1)
            .and_then(|i| self.range_table.get(i))
            .ok_or_else(|| ShapeViolation::UnknownRelid(relid).into())
    }

    /// 登记基表关系
    pub fn add_base_rel(&mut self, rel: RelInfo) -> PlannerResult<RelId> {
        let relid = rel
            .relid
            .filter(|_| rel.is_base())
            .ok_or_else(|| ShapeViolation::NotBaseRelation(rel.relids.to_string()))?;
        self.rte(relid)?;
        let idx = relid.index();
        if self.simple_rel_array.len() <= idx {
            self.simple_rel_array.resize(idx + 1, None);
        }
        self.simple_rel_array[idx] = Some(rel);
        Ok(relid)
    }

    pub fn base_rel(&self, relid: RelId) -> Option<&RelInfo> {
        self.simple_rel_array.get(relid.index()).and_then(|r| r.as_ref())
    }

    pub fn base_rel_mut(&mut self, relid: RelId) -> Option<&mut RelInfo> {
        self.simple_rel_array
            .get_mut(relid.index())
            .and_then(|r| r.as_mut())
    }

    /// 登记连接关系
    pub fn add_join_rel(&mut self, rel: RelInfo) -> JoinRelId {
        self.join_rel_list.push(rel);
        JoinRelId(self.join_rel_list.len() - 1)
    }

    pub fn join_rel(&self, id: JoinRelId) -> Option<&RelInfo> {
        self.join_rel_list.get(id.0)
    }

    pub fn join_rel_mut(&mut self, id: JoinRelId) -> Option<&mut RelInfo> {
        self.join_rel_list.get_mut(id.0)
    }

    /// 获取上层关系，不存在时创建
    pub fn fetch_upper_rel(&mut self, kind: UpperRelKind, relids: Relids) -> &mut RelInfo {
        self.upper_rels
            .entry(kind)
            .or_insert_with(|| RelInfo::upper(relids, PathTarget::default()))
    }

    pub fn upper_rel(&self, kind: UpperRelKind) -> Option<&RelInfo> {
        self.upper_rels.get(&kind)
    }

    /// 通过句柄查找关系
    pub fn rel(&self, handle: RelHandle) -> PlannerResult<&RelInfo> {
        let rel = match handle {
            RelHandle::Base(relid) => self.base_rel(relid),
            RelHandle::Join(id) => self.join_rel(id),
            RelHandle::Upper(kind) => self.upper_rels.get(&kind),
        };
        rel.ok_or_else(|| ShapeViolation::RelationMissing(handle.to_string()).into())
    }

    /// 通过句柄查找关系（可变）
    pub fn rel_mut(&mut self, handle: RelHandle) -> PlannerResult<&mut RelInfo> {
        let rel = match handle {
            RelHandle::Base(relid) => self.base_rel_mut(relid),
            RelHandle::Join(id) => self.join_rel_mut(id),
            RelHandle::Upper(kind) => self.upper_rels.get_mut(&kind),
        };
        rel.ok_or_else(|| ShapeViolation::RelationMissing(handle.to_string()).into())
    }

    /// 集合中的每个编号都必须对应范围表条目
    pub fn check_relids(&self, relids: &Relids) -> PlannerResult<()> {
        for relid in relids.iter() {
            self.rte(relid)?;
        }
        Ok(())
    }

    /// 检查全部关系及其条件、输出列引用的编号都在范围表内
    ///
    /// 用于从外部读入的规划状态。
    pub fn validate(&self) -> PlannerResult<()> {
        let rels = self
            .simple_rel_array
            .iter()
            .flatten()
            .chain(self.join_rel_list.iter())
            .chain(self.upper_rels.values());
        for rel in rels {
            self.check_relids(&rel.relids)?;
            for rinfo in &rel.base_restrict_info {
                self.check_relids(&rinfo.required_relids)?;
                self.check_relids(&rinfo.clause.referenced_relids())?;
            }
            for expr in &rel.reltarget.exprs {
                self.check_relids(&expr.referenced_relids())?;
            }
        }
        for entry in &self.processed_tlist {
            self.check_relids(&entry.expr.referenced_relids())?;
        }
        Ok(())
    }

    /// 按关系集合查找基表或连接关系
    pub fn find_rel(&self, relids: &Relids) -> PlannerResult<&RelInfo> {
        let rel = match relids.singleton_member() {
            Some(relid) => self.base_rel(relid),
            None => self.join_rel_list.iter().find(|r| &r.relids == relids),
        };
        rel.ok_or_else(|| ShapeViolation::RelationMissing(relids.to_string()).into())
    }
}
