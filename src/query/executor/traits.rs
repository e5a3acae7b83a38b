//! 执行器基础特征
//!
//! 执行器按拉取模型工作：`open` 初始化，`next` 每次返回一行，
//! 返回 `None` 表示数据结束，`close` 释放子执行器。

use serde::{Deserialize, Serialize};

use crate::core::error::ExecutorResult;
use crate::core::types::Value;
use crate::query::planner::plan::Pair;

/// 一行数据
pub type Row = Vec<Value>;

/// 执行器统计信息
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutorStats {
    /// 返回的行数
    pub num_rows: usize,
    /// 重新扫描次数
    pub rescans: usize,
}

impl ExecutorStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_row(&mut self, count: usize) {
        self.num_rows += count;
    }
}

/// 统一的执行器 trait
pub trait Executor: Send {
    /// 打开执行器
    fn open(&mut self) -> ExecutorResult<()>;

    /// 取下一行，数据结束时返回 None
    fn next(&mut self) -> ExecutorResult<Option<Row>>;

    /// 关闭执行器
    fn close(&mut self) -> ExecutorResult<()>;

    /// 从头重新扫描
    fn rescan(&mut self) -> ExecutorResult<()>;

    fn is_open(&self) -> bool;

    fn id(&self) -> i64;

    fn name(&self) -> &str;

    fn stats(&self) -> &ExecutorStats;

    /// EXPLAIN 时输出的属性
    fn explain(&self) -> Vec<Pair> {
        Vec::new()
    }

    /// 取出全部剩余行
    fn collect_rows(&mut self) -> ExecutorResult<Vec<Row>> {
        let mut rows = Vec::new();
        while let Some(row) = self.next()? {
            rows.push(row);
        }
        Ok(rows)
    }
}
