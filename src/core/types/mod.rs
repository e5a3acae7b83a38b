//! 核心类型模块

pub mod expression;
pub mod operators;
pub mod relids;
pub mod value;

pub use expression::{AttrNumber, Expression, Var};
pub use operators::{BinaryOperator, BoolOperator, UnaryOperator};
pub use relids::{RelId, Relids};
pub use value::Value;
