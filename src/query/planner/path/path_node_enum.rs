//! 候选路径枚举定义
//!
//! 每种路径类型的子节点形状固定：
//! - 叶子：`Scan`、`IndexScan`、`GroupResult`
//! - 单子节点：`Aggregate`、`Projection`、`LockRows`、`Material`、`Limit`、`BitmapHeapScan`、`SelfJoin`
//! - 双子节点（外侧、内侧）：`NestLoop`、`MergeJoin`、`HashJoin`
//! - 子节点列表：`ModifyTable`、`Custom`
//! - `Opaque`：本模块不理解其结构的路径

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::path_node_cost::PathCost;
use crate::core::types::{Expression, RelId, Relids};
use crate::query::planner::planner_info::{JoinType, PathTarget, RestrictInfo};

/// 所有路径共有的字段
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathHeader {
    /// 路径所属关系
    pub parent: Relids,
    pub cost: PathCost,
}

impl PathHeader {
    pub fn new(parent: Relids, cost: PathCost) -> Self {
        Self { parent, cost }
    }
}

/// 候选路径基础特征
pub trait PathNode {
    /// 路径类型名称
    fn name(&self) -> &'static str;

    fn header(&self) -> &PathHeader;

    /// 路径所属关系
    fn parent(&self) -> &Relids {
        &self.header().parent
    }

    fn cost(&self) -> &PathCost {
        &self.header().cost
    }
}

macro_rules! define_path_node {
    ($name:literal, $ty:ident) => {
        impl PathNode for $ty {
            fn name(&self) -> &'static str {
                $name
            }

            fn header(&self) -> &PathHeader {
                &self.header
            }
        }
    };
}

/// 顺序扫描
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanPath {
    pub header: PathHeader,
}

/// 索引扫描
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexPath {
    pub header: PathHeader,
    pub index_name: String,
    pub index_clauses: Vec<Arc<RestrictInfo>>,
}

/// 位图堆扫描，子节点是位图条件路径
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BitmapHeapPath {
    pub header: PathHeader,
    pub bitmapqual: Box<PathNodeEnum>,
}

/// 无输入的分组结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupResultPath {
    pub header: PathHeader,
    pub quals: Vec<Expression>,
}

/// 聚合
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggPath {
    pub header: PathHeader,
    pub subpath: Box<PathNodeEnum>,
    pub group_exprs: Vec<Expression>,
    pub target: PathTarget,
}

/// 投影
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionPath {
    pub header: PathHeader,
    pub subpath: Box<PathNodeEnum>,
    pub target: PathTarget,
}

/// 行锁
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockRowsPath {
    pub header: PathHeader,
    pub subpath: Box<PathNodeEnum>,
}

/// 物化
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialPath {
    pub header: PathHeader,
    pub subpath: Box<PathNodeEnum>,
}

/// LIMIT / OFFSET
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimitPath {
    pub header: PathHeader,
    pub subpath: Box<PathNodeEnum>,
    pub offset: Option<Expression>,
    pub count: Option<Expression>,
}

/// 连接路径（嵌套循环、归并、哈希共用）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinPath {
    pub header: PathHeader,
    pub jointype: JoinType,
    pub outerjoinpath: Box<PathNodeEnum>,
    pub innerjoinpath: Box<PathNodeEnum>,
    pub joinrestrictinfo: Vec<Arc<RestrictInfo>>,
}

/// 数据修改，每个目标表一个子路径
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModifyTablePath {
    pub header: PathHeader,
    pub subpaths: Vec<PathNodeEnum>,
}

/// 其他扩展提供的自定义路径
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomPath {
    pub header: PathHeader,
    pub provider: String,
    pub custom_paths: Vec<PathNodeEnum>,
}

/// 折叠后的自连接路径
///
/// 恰好一个子路径，代价与行数等于子路径。创建后不再修改。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelfJoinPath {
    header: PathHeader,
    subpath: Box<PathNodeEnum>,
    survivor: RelId,
    eliminated: RelId,
}

impl SelfJoinPath {
    /// 以保留下来的子路径创建折叠路径，代价原样取自子路径
    pub fn new(parent: Relids, subpath: PathNodeEnum, survivor: RelId, eliminated: RelId) -> Self {
        let cost = *subpath.cost();
        Self {
            header: PathHeader::new(parent, cost),
            subpath: Box::new(subpath),
            survivor,
            eliminated,
        }
    }

    pub fn subpath(&self) -> &PathNodeEnum {
        &self.subpath
    }

    /// 保留下来的关系编号
    pub fn survivor(&self) -> RelId {
        self.survivor
    }

    /// 被消除的关系编号
    pub fn eliminated(&self) -> RelId {
        self.eliminated
    }
}

/// 本模块无法识别结构的路径
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpaquePath {
    pub header: PathHeader,
    pub tag: String,
}

define_path_node!("Scan", ScanPath);
define_path_node!("IndexScan", IndexPath);
define_path_node!("BitmapHeapScan", BitmapHeapPath);
define_path_node!("GroupResult", GroupResultPath);
define_path_node!("Aggregate", AggPath);
define_path_node!("Projection", ProjectionPath);
define_path_node!("LockRows", LockRowsPath);
define_path_node!("Material", MaterialPath);
define_path_node!("Limit", LimitPath);
define_path_node!("ModifyTable", ModifyTablePath);
define_path_node!("Custom", CustomPath);
define_path_node!("SelfJoin", SelfJoinPath);
define_path_node!("Opaque", OpaquePath);

/// 候选路径枚举
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PathNodeEnum {
    /// 顺序扫描
    Scan(ScanPath),
    /// 索引扫描
    IndexScan(IndexPath),
    /// 位图堆扫描
    BitmapHeapScan(BitmapHeapPath),
    /// 分组结果
    GroupResult(GroupResultPath),
    /// 聚合
    Aggregate(AggPath),
    /// 投影
    Projection(ProjectionPath),
    /// 行锁
    LockRows(LockRowsPath),
    /// 物化
    Material(MaterialPath),
    /// 限制
    Limit(LimitPath),
    /// 嵌套循环连接
    NestLoop(JoinPath),
    /// 归并连接
    MergeJoin(JoinPath),
    /// 哈希连接
    HashJoin(JoinPath),
    /// 数据修改
    ModifyTable(ModifyTablePath),
    /// 自定义路径
    Custom(CustomPath),
    /// 折叠后的自连接
    SelfJoin(SelfJoinPath),
    /// 未识别路径
    Opaque(OpaquePath),
}

impl PathNode for PathNodeEnum {
    fn name(&self) -> &'static str {
        match self {
            PathNodeEnum::NestLoop(_) => "NestLoop",
            PathNodeEnum::MergeJoin(_) => "MergeJoin",
            PathNodeEnum::HashJoin(_) => "HashJoin",
            PathNodeEnum::Scan(p) => p.name(),
            PathNodeEnum::IndexScan(p) => p.name(),
            PathNodeEnum::BitmapHeapScan(p) => p.name(),
            PathNodeEnum::GroupResult(p) => p.name(),
            PathNodeEnum::Aggregate(p) => p.name(),
            PathNodeEnum::Projection(p) => p.name(),
            PathNodeEnum::LockRows(p) => p.name(),
            PathNodeEnum::Material(p) => p.name(),
            PathNodeEnum::Limit(p) => p.name(),
            PathNodeEnum::ModifyTable(p) => p.name(),
            PathNodeEnum::Custom(p) => p.name(),
            PathNodeEnum::SelfJoin(p) => p.name(),
            PathNodeEnum::Opaque(p) => p.name(),
        }
    }

    fn header(&self) -> &PathHeader {
        match self {
            PathNodeEnum::Scan(p) => &p.header,
            PathNodeEnum::IndexScan(p) => &p.header,
            PathNodeEnum::BitmapHeapScan(p) => &p.header,
            PathNodeEnum::GroupResult(p) => &p.header,
            PathNodeEnum::Aggregate(p) => &p.header,
            PathNodeEnum::Projection(p) => &p.header,
            PathNodeEnum::LockRows(p) => &p.header,
            PathNodeEnum::Material(p) => &p.header,
            PathNodeEnum::Limit(p) => &p.header,
            PathNodeEnum::NestLoop(p) | PathNodeEnum::MergeJoin(p) | PathNodeEnum::HashJoin(p) => {
                &p.header
            }
            PathNodeEnum::ModifyTable(p) => &p.header,
            PathNodeEnum::Custom(p) => &p.header,
            PathNodeEnum::SelfJoin(p) => p.header(),
            PathNodeEnum::Opaque(p) => &p.header,
        }
    }
}

impl PathNodeEnum {
    /// 创建顺序扫描路径
    pub fn scan(parent: Relids, cost: PathCost) -> Self {
        PathNodeEnum::Scan(ScanPath {
            header: PathHeader::new(parent, cost),
        })
    }

    /// 创建索引扫描路径
    pub fn index_scan(
        parent: Relids,
        cost: PathCost,
        index_name: impl Into<String>,
        index_clauses: Vec<Arc<RestrictInfo>>,
    ) -> Self {
        PathNodeEnum::IndexScan(IndexPath {
            header: PathHeader::new(parent, cost),
            index_name: index_name.into(),
            index_clauses,
        })
    }

    /// 创建投影路径，代价在子路径基础上叠加
    pub fn projection(subpath: PathNodeEnum, target: PathTarget, per_row_cost: f64) -> Self {
        let child = *subpath.cost();
        let mut cost = PathCost::on_top_of(&child, 0.0, per_row_cost * child.estimated_rows);
        cost.estimated_width = target.width;
        PathNodeEnum::Projection(ProjectionPath {
            header: PathHeader::new(subpath.parent().clone(), cost),
            subpath: Box::new(subpath),
            target,
        })
    }

    /// 连接路径的公共部分
    pub fn as_join(&self) -> Option<&JoinPath> {
        match self {
            PathNodeEnum::NestLoop(j) | PathNodeEnum::MergeJoin(j) | PathNodeEnum::HashJoin(j) => {
                Some(j)
            }
            _ => None,
        }
    }

    pub fn as_self_join(&self) -> Option<&SelfJoinPath> {
        match self {
            PathNodeEnum::SelfJoin(p) => Some(p),
            _ => None,
        }
    }

    pub fn is_self_join(&self) -> bool {
        matches!(self, PathNodeEnum::SelfJoin(_))
    }

    /// 是否为嵌套循环、归并或哈希连接
    pub fn is_join(&self) -> bool {
        self.as_join().is_some()
    }

    /// 节点自身持有的表达式（不含子路径与限制条件），无法识别的类型返回 None
    pub fn own_exprs(&self) -> Option<Vec<&Expression>> {
        let exprs = match self {
            PathNodeEnum::Projection(p) => p.target.exprs.iter().collect(),
            PathNodeEnum::Aggregate(p) => p.group_exprs.iter().chain(p.target.exprs.iter()).collect(),
            PathNodeEnum::GroupResult(p) => p.quals.iter().collect(),
            PathNodeEnum::Limit(p) => p.offset.iter().chain(p.count.iter()).collect(),
            PathNodeEnum::Opaque(_) => return None,
            _ => Vec::new(),
        };
        Some(exprs)
    }

    pub fn own_exprs_mut(&mut self) -> Option<Vec<&mut Expression>> {
        let exprs = match self {
            PathNodeEnum::Projection(p) => p.target.exprs.iter_mut().collect(),
            PathNodeEnum::Aggregate(p) => p
                .group_exprs
                .iter_mut()
                .chain(p.target.exprs.iter_mut())
                .collect(),
            PathNodeEnum::GroupResult(p) => p.quals.iter_mut().collect(),
            PathNodeEnum::Limit(p) => p.offset.iter_mut().chain(p.count.iter_mut()).collect(),
            PathNodeEnum::Opaque(_) => return None,
            _ => Vec::new(),
        };
        Some(exprs)
    }

    /// 节点自身引用的限制条件
    pub fn restrictions(&self) -> &[Arc<RestrictInfo>] {
        match self {
            PathNodeEnum::NestLoop(j) | PathNodeEnum::MergeJoin(j) | PathNodeEnum::HashJoin(j) => {
                &j.joinrestrictinfo
            }
            PathNodeEnum::IndexScan(p) => &p.index_clauses,
            _ => &[],
        }
    }

    pub fn restrictions_mut(&mut self) -> Option<&mut Vec<Arc<RestrictInfo>>> {
        match self {
            PathNodeEnum::NestLoop(j) | PathNodeEnum::MergeJoin(j) | PathNodeEnum::HashJoin(j) => {
                Some(&mut j.joinrestrictinfo)
            }
            PathNodeEnum::IndexScan(p) => Some(&mut p.index_clauses),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(relid: u32, total: f64, rows: f64) -> PathNodeEnum {
        PathNodeEnum::scan(
            Relids::singleton(RelId(relid)),
            PathCost::new(0.0, total, rows, 8),
        )
    }

    #[test]
    fn test_self_join_path_copies_child_cost() {
        let child = scan(2, 35.5, 12.0);
        let parent = Relids::from_ids(&[RelId(1), RelId(2)]);
        let path = SelfJoinPath::new(parent.clone(), child.clone(), RelId(2), RelId(1));
        assert_eq!(path.cost(), child.cost());
        assert_eq!(path.parent(), &parent);
        assert_eq!(path.survivor(), RelId(2));
        assert_eq!(path.eliminated(), RelId(1));
        assert_eq!(path.subpath(), &child);
    }

    #[test]
    fn test_join_accessors() {
        let join = PathNodeEnum::HashJoin(JoinPath {
            header: PathHeader::new(
                Relids::from_ids(&[RelId(1), RelId(2)]),
                PathCost::new(1.0, 50.0, 10.0, 16),
            ),
            jointype: JoinType::Inner,
            outerjoinpath: Box::new(scan(1, 10.0, 10.0)),
            innerjoinpath: Box::new(scan(2, 10.0, 10.0)),
            joinrestrictinfo: vec![],
        });
        assert!(join.is_join());
        assert_eq!(join.name(), "HashJoin");
        assert!(!join.is_self_join());
        assert!(scan(1, 1.0, 1.0).as_join().is_none());
    }

    #[test]
    fn test_projection_cost() {
        let child = scan(1, 10.0, 20.0);
        let proj = PathNodeEnum::projection(child, PathTarget::new(vec![], 4), 0.5);
        assert_eq!(proj.cost().total_cost, 20.0);
        assert_eq!(proj.cost().estimated_width, 4);
        assert_eq!(proj.parent(), &Relids::singleton(RelId(1)));
    }
}
