//! 子路径访问器
//!
//! 统一描述各类路径的子节点形状，遍历与重写都通过这里找子节点，
//! 新增路径类型时只需要改这一处。

use super::path_node_enum::PathNodeEnum;

/// 路径的子节点
#[derive(Debug)]
pub enum PathChildren<'a> {
    /// 无子节点
    Leaf,
    /// 单个子节点
    Single(&'a PathNodeEnum),
    /// 连接的外侧与内侧
    Pair {
        outer: &'a PathNodeEnum,
        inner: &'a PathNodeEnum,
    },
    /// 子节点列表
    List(&'a [PathNodeEnum]),
    /// 无法识别的路径类型
    Unrecognized,
}

impl<'a> PathChildren<'a> {
    /// 按遍历顺序展开：外侧在前，列表按原顺序
    pub fn to_vec(&self) -> Vec<&'a PathNodeEnum> {
        match *self {
            PathChildren::Leaf | PathChildren::Unrecognized => Vec::new(),
            PathChildren::Single(child) => vec![child],
            PathChildren::Pair { outer, inner } => vec![outer, inner],
            PathChildren::List(list) => list.iter().collect(),
        }
    }
}

/// 子路径访问 trait
pub trait PathChildAccessor {
    fn children(&self) -> PathChildren<'_>;

    /// 可变子节点，无法识别的类型返回 None
    fn children_mut(&mut self) -> Option<Vec<&mut PathNodeEnum>>;
}

impl PathChildAccessor for PathNodeEnum {
    fn children(&self) -> PathChildren<'_> {
        match self {
            PathNodeEnum::Scan(_) | PathNodeEnum::IndexScan(_) | PathNodeEnum::GroupResult(_) => {
                PathChildren::Leaf
            }

            PathNodeEnum::BitmapHeapScan(p) => PathChildren::Single(&p.bitmapqual),
            PathNodeEnum::Aggregate(p) => PathChildren::Single(&p.subpath),
            PathNodeEnum::Projection(p) => PathChildren::Single(&p.subpath),
            PathNodeEnum::LockRows(p) => PathChildren::Single(&p.subpath),
            PathNodeEnum::Material(p) => PathChildren::Single(&p.subpath),
            PathNodeEnum::Limit(p) => PathChildren::Single(&p.subpath),
            PathNodeEnum::SelfJoin(p) => PathChildren::Single(p.subpath()),

            PathNodeEnum::NestLoop(j) | PathNodeEnum::MergeJoin(j) | PathNodeEnum::HashJoin(j) => {
                PathChildren::Pair {
                    outer: &j.outerjoinpath,
                    inner: &j.innerjoinpath,
                }
            }

            PathNodeEnum::ModifyTable(p) => PathChildren::List(&p.subpaths),
            PathNodeEnum::Custom(p) => PathChildren::List(&p.custom_paths),

            PathNodeEnum::Opaque(_) => PathChildren::Unrecognized,
        }
    }

    fn children_mut(&mut self) -> Option<Vec<&mut PathNodeEnum>> {
        let children = match self {
            PathNodeEnum::Scan(_) | PathNodeEnum::IndexScan(_) | PathNodeEnum::GroupResult(_) => {
                Vec::new()
            }

            PathNodeEnum::BitmapHeapScan(p) => vec![p.bitmapqual.as_mut()],
            PathNodeEnum::Aggregate(p) => vec![p.subpath.as_mut()],
            PathNodeEnum::Projection(p) => vec![p.subpath.as_mut()],
            PathNodeEnum::LockRows(p) => vec![p.subpath.as_mut()],
            PathNodeEnum::Material(p) => vec![p.subpath.as_mut()],
            PathNodeEnum::Limit(p) => vec![p.subpath.as_mut()],
            // 折叠路径创建后不再修改
            PathNodeEnum::SelfJoin(_) => Vec::new(),

            PathNodeEnum::NestLoop(j) | PathNodeEnum::MergeJoin(j) | PathNodeEnum::HashJoin(j) => {
                vec![j.outerjoinpath.as_mut(), j.innerjoinpath.as_mut()]
            }

            PathNodeEnum::ModifyTable(p) => p.subpaths.iter_mut().collect(),
            PathNodeEnum::Custom(p) => p.custom_paths.iter_mut().collect(),

            PathNodeEnum::Opaque(_) => return None,
        };
        Some(children)
    }
}
