//! 核心模块：类型、错误与表达式遍历

pub mod error;
pub mod expression_visitor;
pub mod types;

pub use error::{PlannerError, PlannerResult, ShapeViolation};
pub use types::{AttrNumber, BinaryOperator, BoolOperator, Expression, RelId, Relids, Value, Var};
