//! 候选路径代价估算

use serde::{Deserialize, Serialize};

/// 候选路径代价估算
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PathCost {
    /// 启动成本（获取第一行前的成本）
    pub startup_cost: f64,
    /// 总成本
    pub total_cost: f64,
    /// 估计输出行数
    pub estimated_rows: f64,
    /// 估计输出宽度（字节）
    pub estimated_width: u32,
}

impl PathCost {
    /// 创建新的代价估算
    pub fn new(startup_cost: f64, total_cost: f64, estimated_rows: f64, estimated_width: u32) -> Self {
        Self {
            startup_cost,
            total_cost,
            estimated_rows,
            estimated_width,
        }
    }

    /// 创建零成本
    pub fn zero() -> Self {
        Self::default()
    }

    /// 计算每行的平均成本
    pub fn cost_per_row(&self) -> f64 {
        if self.estimated_rows <= 0.0 {
            0.0
        } else {
            self.total_cost / self.estimated_rows
        }
    }

    /// 在子路径代价上叠加本节点的开销
    pub fn on_top_of(child: &PathCost, startup_cost: f64, run_cost: f64) -> Self {
        Self {
            startup_cost: child.startup_cost + startup_cost,
            total_cost: child.total_cost + startup_cost + run_cost,
            estimated_rows: child.estimated_rows,
            estimated_width: child.estimated_width,
        }
    }

    /// 合并两个子路径的代价（用于连接）
    pub fn merge(&self, other: &Self, rows: f64) -> Self {
        Self {
            startup_cost: self.startup_cost + other.startup_cost,
            total_cost: self.total_cost + other.total_cost,
            estimated_rows: rows,
            estimated_width: self.estimated_width + other.estimated_width,
        }
    }

    /// 添加成本
    pub fn add_cost(&mut self, cost: f64) {
        self.total_cost += cost;
    }

    /// 按总成本比较，总成本相同时比较启动成本
    pub fn cheaper_than(&self, other: &Self) -> bool {
        self.total_cost < other.total_cost
            || (self.total_cost == other.total_cost && self.startup_cost < other.startup_cost)
    }
}
