//! 候选路径树遍历
//!
//! `path_tree_walker` 只负责进入直接子路径，递归由访问函数自己完成，
//! 这与表达式遍历的约定一致。`walk_path_tree` 在此基础上做完整的前序遍历。
//!
//! 子路径顺序：连接先外侧后内侧，列表按原顺序。
//! 遇到无法识别的路径类型时记录警告并按叶子处理，只读遍历尽力而为。
//! 需要修改路径的调用方必须自行拒绝无法识别的类型。

use crate::config::SelfJoinConfig;
use crate::core::error::PlannerResult;
use crate::core::types::RelId;
use crate::query::optimizer::stack_guard::StackGuard;
use crate::query::planner::path::{PathChildAccessor, PathChildren, PathNode, PathNodeEnum};

/// 路径树遍历器，携带递归深度守卫
#[derive(Debug, Clone)]
pub struct PathWalker {
    guard: StackGuard,
}

impl PathWalker {
    pub fn new(max_stack_depth: usize) -> Self {
        Self {
            guard: StackGuard::new(max_stack_depth),
        }
    }

    pub fn from_config(config: &SelfJoinConfig) -> Self {
        Self::new(config.max_stack_depth)
    }

    /// 对 `path` 的每个直接子路径调用 `visitor`
    ///
    /// 任一回调返回 `Ok(true)` 时立即停止并返回 `Ok(true)`
    pub fn path_tree_walker<F>(&mut self, path: &PathNodeEnum, visitor: &mut F) -> PlannerResult<bool>
    where
        F: FnMut(&mut PathWalker, &PathNodeEnum) -> PlannerResult<bool>,
    {
        self.guard.enter()?;
        let result = self.visit_children(path, visitor);
        self.guard.leave();
        result
    }

    fn visit_children<F>(&mut self, path: &PathNodeEnum, visitor: &mut F) -> PlannerResult<bool>
    where
        F: FnMut(&mut PathWalker, &PathNodeEnum) -> PlannerResult<bool>,
    {
        let children = path.children();
        if let PathChildren::Unrecognized = children {
            warn_unrecognized(path);
            return Ok(false);
        }
        for child in children.to_vec() {
            if visitor(self, child)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// 前序遍历整棵路径树，先访问 `path` 本身
    pub fn walk_path_tree<F>(&mut self, path: &PathNodeEnum, visitor: &mut F) -> PlannerResult<bool>
    where
        F: FnMut(&PathNodeEnum) -> PlannerResult<bool>,
    {
        if visitor(path)? {
            return Ok(true);
        }
        self.path_tree_walker(path, &mut |walker, child| walker.walk_path_tree(child, visitor))
    }

    /// 路径树中是否含有折叠后的自连接路径
    pub fn contains_self_join(&mut self, path: &PathNodeEnum) -> PlannerResult<bool> {
        self.walk_path_tree(path, &mut |node| Ok(node.is_self_join()))
    }

    /// 收集路径树中所有折叠路径的（保留编号, 消除编号），按遍历顺序
    pub fn collect_self_joins(&mut self, path: &PathNodeEnum) -> PlannerResult<Vec<(RelId, RelId)>> {
        let mut found = Vec::new();
        self.walk_path_tree(path, &mut |node| {
            if let Some(sj) = node.as_self_join() {
                found.push((sj.survivor(), sj.eliminated()));
            }
            Ok(false)
        })?;
        Ok(found)
    }

    pub fn current_depth(&self) -> usize {
        self.guard.current_depth()
    }
}

fn warn_unrecognized(path: &PathNodeEnum) {
    let tag = match path {
        PathNodeEnum::Opaque(p) => p.tag.as_str(),
        _ => path.name(),
    };
    log::warn!(
        "无法识别的路径节点: {} (relids={})，按叶子处理",
        tag,
        path.parent()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::PlannerError;
    use crate::core::types::Relids;
    use crate::query::planner::path::{
        CustomPath, JoinPath, MaterialPath, OpaquePath, PathCost, PathHeader, SelfJoinPath,
    };
    use crate::query::planner::planner_info::{JoinType, PathTarget};

    fn scan(relid: u32) -> PathNodeEnum {
        PathNodeEnum::scan(Relids::singleton(RelId(relid)), PathCost::zero())
    }

    fn join(outer: PathNodeEnum, inner: PathNodeEnum) -> PathNodeEnum {
        let parent = outer.parent().union(inner.parent());
        PathNodeEnum::NestLoop(JoinPath {
            header: PathHeader::new(parent, PathCost::zero()),
            jointype: JoinType::Inner,
            outerjoinpath: Box::new(outer),
            innerjoinpath: Box::new(inner),
            joinrestrictinfo: vec![],
        })
    }

    fn material(sub: PathNodeEnum) -> PathNodeEnum {
        PathNodeEnum::Material(MaterialPath {
            header: PathHeader::new(sub.parent().clone(), PathCost::zero()),
            subpath: Box::new(sub),
        })
    }

    fn visit_order(path: &PathNodeEnum) -> Vec<String> {
        let mut order = Vec::new();
        PathWalker::new(100)
            .walk_path_tree(path, &mut |node| {
                order.push(format!("{}{}", node.name(), node.parent()));
                Ok(false)
            })
            .unwrap();
        order
    }

    #[test]
    fn test_outer_before_inner() {
        let tree = join(scan(1), material(scan(2)));
        assert_eq!(
            visit_order(&tree),
            vec!["NestLoop(1 2)", "Scan(1)", "Material(2)", "Scan(2)"]
        );
    }

    #[test]
    fn test_list_children_in_order() {
        let tree = PathNodeEnum::Custom(CustomPath {
            header: PathHeader::new(Relids::from_ids(&[RelId(1), RelId(2), RelId(3)]), PathCost::zero()),
            provider: "ext".to_string(),
            custom_paths: vec![scan(3), scan(1), scan(2)],
        });
        assert_eq!(
            visit_order(&tree),
            vec!["Custom(1 2 3)", "Scan(3)", "Scan(1)", "Scan(2)"]
        );
    }

    #[test]
    fn test_short_circuit() {
        let tree = join(scan(1), scan(2));
        let mut visited = 0;
        let found = PathWalker::new(100)
            .walk_path_tree(&tree, &mut |node| {
                visited += 1;
                Ok(node.parent() == &Relids::singleton(RelId(1)))
            })
            .unwrap();
        assert!(found);
        assert_eq!(visited, 2);
    }

    #[test]
    fn test_opaque_treated_as_leaf() {
        let opaque = PathNodeEnum::Opaque(OpaquePath {
            header: PathHeader::new(Relids::singleton(RelId(1)), PathCost::zero()),
            tag: "TidScan".to_string(),
        });
        let tree = join(opaque, scan(2));
        assert_eq!(visit_order(&tree).len(), 3);
    }

    #[test]
    fn test_depth_guard_fires() {
        let mut tree = scan(1);
        for _ in 0..20 {
            tree = material(tree);
        }
        let err = PathWalker::new(10)
            .walk_path_tree(&tree, &mut |_| Ok(false))
            .unwrap_err();
        assert!(matches!(err, PlannerError::StackDepthExceeded { limit: 10, .. }));
        assert!(PathWalker::new(100).walk_path_tree(&tree, &mut |_| Ok(false)).is_ok());
    }

    #[test]
    fn test_collect_self_joins_under_wrappers() {
        let sj = PathNodeEnum::SelfJoin(SelfJoinPath::new(
            Relids::from_ids(&[RelId(1), RelId(2)]),
            scan(2),
            RelId(2),
            RelId(1),
        ));
        let tree = PathNodeEnum::projection(material(sj), PathTarget::default(), 0.0);
        let mut walker = PathWalker::new(100);
        assert!(walker.contains_self_join(&tree).unwrap());
        assert_eq!(walker.collect_self_joins(&tree).unwrap(), vec![(RelId(2), RelId(1))]);
        assert_eq!(walker.current_depth(), 0);
        assert!(!walker.contains_self_join(&scan(1)).unwrap());
    }
}
