//! 递归深度守卫 - 防止超深路径树耗尽调用栈

use crate::core::error::{PlannerError, PlannerResult};

/// 递归深度守卫
///
/// 进入一层递归前调用 `enter`，离开时调用 `leave`。
#[derive(Debug, Clone)]
pub struct StackGuard {
    max_depth: usize,
    depth: usize,
}

impl StackGuard {
    pub fn new(max_depth: usize) -> Self {
        Self {
            max_depth,
            depth: 0,
        }
    }

    /// 进入下一层，超过上限时返回资源耗尽错误
    pub fn enter(&mut self) -> PlannerResult<()> {
        if self.depth >= self.max_depth {
            return Err(PlannerError::StackDepthExceeded {
                depth: self.depth + 1,
                limit: self.max_depth,
            });
        }
        self.depth += 1;
        Ok(())
    }

    pub fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    /// 在守卫保护下执行一层递归
    pub fn guarded<T, F>(&mut self, f: F) -> PlannerResult<T>
    where
        F: FnOnce(&mut Self) -> PlannerResult<T>,
    {
        self.enter()?;
        let result = f(self);
        self.leave();
        result
    }

    pub fn current_depth(&self) -> usize {
        self.depth
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }
}
