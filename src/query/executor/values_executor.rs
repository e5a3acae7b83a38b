//! 内存行集执行器

use crate::core::error::{ExecutorError, ExecutorResult};
use crate::query::executor::traits::{Executor, ExecutorStats, Row};

/// 依次返回预先给定的行
#[derive(Debug, Clone)]
pub struct ValuesExecutor {
    id: i64,
    rows: Vec<Row>,
    position: usize,
    is_open: bool,
    stats: ExecutorStats,
}

impl ValuesExecutor {
    pub fn new(id: i64, rows: Vec<Row>) -> Self {
        Self {
            id,
            rows,
            position: 0,
            is_open: false,
            stats: ExecutorStats::new(),
        }
    }
}

impl Executor for ValuesExecutor {
    fn open(&mut self) -> ExecutorResult<()> {
        if self.is_open {
            return Err(ExecutorError::AlreadyOpen(self.name().to_string()));
        }
        self.position = 0;
        self.is_open = true;
        Ok(())
    }

    fn next(&mut self) -> ExecutorResult<Option<Row>> {
        if !self.is_open {
            return Err(ExecutorError::NotOpen(self.name().to_string()));
        }
        let row = self.rows.get(self.position).cloned();
        if row.is_some() {
            self.position += 1;
            self.stats.add_row(1);
        }
        Ok(row)
    }

    fn close(&mut self) -> ExecutorResult<()> {
        self.is_open = false;
        Ok(())
    }

    fn rescan(&mut self) -> ExecutorResult<()> {
        if !self.is_open {
            return Err(ExecutorError::NotOpen(self.name().to_string()));
        }
        self.position = 0;
        self.stats.rescans += 1;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.is_open
    }

    fn id(&self) -> i64 {
        self.id
    }

    fn name(&self) -> &str {
        "ValuesExecutor"
    }

    fn stats(&self) -> &ExecutorStats {
        &self.stats
    }
}
