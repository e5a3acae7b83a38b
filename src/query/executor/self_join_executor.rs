//! 折叠后自连接节点的执行器
//!
//! 恰好一个子执行器。每次从子执行器取一行，原样返回或按输出列重新投影，
//! 不做任何过滤。子执行器结束时本执行器也结束。

use crate::core::error::{ExecutorError, ExecutorResult};
use crate::query::executor::traits::{Executor, ExecutorStats, Row};
use crate::query::planner::plan::{Pair, ProjectionInfo, ProjectionItem, SelfJoinScanNode};

pub struct SelfJoinExecutor {
    id: i64,
    child: Box<dyn Executor>,
    /// 输出与子执行器逐列相同时为 None
    projection: Option<ProjectionInfo>,
    is_open: bool,
    stats: ExecutorStats,
}

impl std::fmt::Debug for SelfJoinExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelfJoinExecutor")
            .field("id", &self.id)
            .field("child", &self.child.name())
            .field("projection", &self.projection)
            .field("is_open", &self.is_open)
            .finish()
    }
}

impl SelfJoinExecutor {
    pub fn new(
        id: i64,
        node: &SelfJoinScanNode,
        mut children: Vec<Box<dyn Executor>>,
    ) -> ExecutorResult<Self> {
        if children.len() != 1 {
            return Err(ExecutorError::ChildCount {
                expected: 1,
                actual: children.len(),
            });
        }
        let child = children.remove(0);
        let projection = if node.is_passthrough() {
            None
        } else {
            Some(node.projection.clone())
        };
        Ok(Self {
            id,
            child,
            projection,
            is_open: false,
            stats: ExecutorStats::new(),
        })
    }

    /// 是否原样返回子执行器的行
    pub fn is_passthrough(&self) -> bool {
        self.projection.is_none()
    }

    fn project(&self, row: Row) -> ExecutorResult<Row> {
        let Some(projection) = &self.projection else {
            return Ok(row);
        };
        projection
            .items
            .iter()
            .map(|item| match item {
                ProjectionItem::Column(index) => {
                    row.get(*index)
                        .cloned()
                        .ok_or(ExecutorError::ProjectionOutOfRange {
                            index: *index,
                            width: row.len(),
                        })
                }
                ProjectionItem::Const(value) => Ok(value.clone()),
            })
            .collect()
    }
}

impl Executor for SelfJoinExecutor {
    fn open(&mut self) -> ExecutorResult<()> {
        if self.is_open {
            return Err(ExecutorError::AlreadyOpen(self.name().to_string()));
        }
        self.child.open()?;
        self.is_open = true;
        Ok(())
    }

    fn next(&mut self) -> ExecutorResult<Option<Row>> {
        if !self.is_open {
            return Err(ExecutorError::NotOpen(self.name().to_string()));
        }
        match self.child.next()? {
            Some(row) => {
                let row = self.project(row)?;
                self.stats.add_row(1);
                Ok(Some(row))
            }
            None => Ok(None),
        }
    }

    fn close(&mut self) -> ExecutorResult<()> {
        if !self.is_open {
            return Err(ExecutorError::NotOpen(self.name().to_string()));
        }
        self.is_open = false;
        self.child.close()
    }

    fn rescan(&mut self) -> ExecutorResult<()> {
        if !self.is_open {
            return Err(ExecutorError::NotOpen(self.name().to_string()));
        }
        self.stats.rescans += 1;
        self.child.rescan()
    }

    fn is_open(&self) -> bool {
        self.is_open
    }

    fn id(&self) -> i64 {
        self.id
    }

    fn name(&self) -> &str {
        SelfJoinScanNode::EXEC_METHODS
    }

    fn stats(&self) -> &ExecutorStats {
        &self.stats
    }

    fn explain(&self) -> Vec<Pair> {
        vec![Pair::new("SelfJoin", "")]
    }
}
