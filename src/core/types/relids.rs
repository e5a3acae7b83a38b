//! 关系标识与关系标识集合
//!
//! `RelId` 是单次规划过程中范围表条目的编号（从 1 开始），
//! `Relids` 是有序的关系标识集合。

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// 范围表条目编号
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RelId(pub u32);

impl RelId {
    /// 已下推到执行计划后，引用内侧子计划输出的保留编号
    pub const INNER_VAR: RelId = RelId(65000);
    /// 引用外侧子计划输出的保留编号
    pub const OUTER_VAR: RelId = RelId(65001);
    /// 引用索引列或自定义扫描目标列的保留编号
    pub const INDEX_VAR: RelId = RelId(65002);
    /// 引用行标识列的保留编号
    pub const ROWID_VAR: RelId = RelId(65003);

    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn index(&self) -> usize {
        self.0 as usize
    }

    /// 是否为保留编号（不对应任何范围表条目）
    pub fn is_special(&self) -> bool {
        matches!(
            *self,
            RelId::INNER_VAR | RelId::OUTER_VAR | RelId::INDEX_VAR | RelId::ROWID_VAR
        )
    }
}

impl fmt::Display for RelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 关系标识集合，按编号升序
///
/// 占用空间只与元素个数有关，与编号大小无关。
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Relids {
    ids: BTreeSet<RelId>,
}

impl Relids {
    /// 创建空集合
    pub fn new() -> Self {
        Self::default()
    }

    /// 创建单元素集合
    pub fn singleton(relid: RelId) -> Self {
        let mut set = Self::new();
        set.add(relid);
        set
    }

    pub fn from_ids(ids: &[RelId]) -> Self {
        Self {
            ids: ids.iter().copied().collect(),
        }
    }

    pub fn add(&mut self, relid: RelId) {
        self.ids.insert(relid);
    }

    /// 删除元素，返回元素删除前是否存在
    pub fn remove(&mut self, relid: RelId) -> bool {
        self.ids.remove(&relid)
    }

    pub fn contains(&self, relid: RelId) -> bool {
        self.ids.contains(&relid)
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_subset(&self, other: &Relids) -> bool {
        self.ids.is_subset(&other.ids)
    }

    pub fn overlaps(&self, other: &Relids) -> bool {
        !self.ids.is_disjoint(&other.ids)
    }

    pub fn union(&self, other: &Relids) -> Relids {
        Relids {
            ids: self.ids.union(&other.ids).copied().collect(),
        }
    }

    /// 如果集合恰好包含一个元素，返回该元素
    pub fn singleton_member(&self) -> Option<RelId> {
        if self.ids.len() == 1 {
            self.ids.first().copied()
        } else {
            None
        }
    }

    /// 最大的元素
    pub fn max_member(&self) -> Option<RelId> {
        self.ids.last().copied()
    }

    /// 按升序迭代集合元素
    pub fn iter(&self) -> impl Iterator<Item = RelId> + '_ {
        self.ids.iter().copied()
    }
}

impl fmt::Display for Relids {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ids: Vec<String> = self.iter().map(|r| r.to_string()).collect();
        write!(f, "({})", ids.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relids_membership() {
        let mut set = Relids::singleton(RelId(1));
        set.add(RelId(70));
        assert!(set.contains(RelId(1)));
        assert!(set.contains(RelId(70)));
        assert!(!set.contains(RelId(2)));
        assert_eq!(set.len(), 2);

        assert!(set.remove(RelId(70)));
        assert!(!set.remove(RelId(70)));
        assert_eq!(set, Relids::singleton(RelId(1)));
    }

    #[test]
    fn test_relids_subset_and_union() {
        let a = Relids::from_ids(&[RelId(1)]);
        let ab = Relids::from_ids(&[RelId(1), RelId(2)]);
        assert!(a.is_subset(&ab));
        assert!(!ab.is_subset(&a));
        assert!(Relids::new().is_subset(&a));
        assert_eq!(a.union(&Relids::singleton(RelId(2))), ab);
        assert!(a.overlaps(&ab));
        assert_eq!(ab.singleton_member(), None);
        assert_eq!(a.singleton_member(), Some(RelId(1)));
    }

    #[test]
    fn test_large_relid_is_one_element() {
        let mut set = Relids::singleton(RelId(u32::MAX));
        set.add(RelId(3));
        assert_eq!(set.len(), 2);
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![RelId(3), RelId(u32::MAX)]);
        assert_eq!(set.max_member(), Some(RelId(u32::MAX)));
    }

    #[test]
    fn test_special_relids() {
        assert!(RelId::INNER_VAR.is_special());
        assert!(RelId::INDEX_VAR.is_special());
        assert!(!RelId(3).is_special());
    }
}
