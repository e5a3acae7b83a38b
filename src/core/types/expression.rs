//! 表达式类型定义
//!
//! 规划器中使用的表达式树。与自连接消除相关的变体只有两种：
//!
//! | 变体 | 用途 |
//! |------|------|
//! | `Var` | 列引用（关系编号 + 属性号） |
//! | `Binary` | 二元操作（操作符 + 两个操作数） |
//!
//! 其余变体在匹配和重写时按不透明节点处理，只递归进入其子表达式。
//! `Query` 表示尚未规划的子查询，规划阶段出现即属于结构异常。

use super::operators::{BinaryOperator, BoolOperator, UnaryOperator};
use super::relids::{RelId, Relids};
use super::value::Value;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 属性号（列在表中的序号，从 1 开始）
pub type AttrNumber = i16;

/// 列引用
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Var {
    /// 所属范围表条目
    pub varno: RelId,
    /// 列属性号
    pub varattno: AttrNumber,
}

impl Var {
    pub fn new(varno: RelId, varattno: AttrNumber) -> Self {
        Self { varno, varattno }
    }
}

/// 表达式树
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expression {
    /// 列引用
    Var(Var),

    /// 常量
    Const(Value),

    /// 二元运算
    Binary {
        op: BinaryOperator,
        left: Box<Expression>,
        right: Box<Expression>,
    },

    /// 一元运算
    Unary {
        op: UnaryOperator,
        operand: Box<Expression>,
    },

    /// 布尔连接（AND / OR / NOT）
    Bool {
        op: BoolOperator,
        args: Vec<Expression>,
    },

    /// 函数调用
    Function { name: String, args: Vec<Expression> },

    /// 空值测试
    NullTest {
        arg: Box<Expression>,
        is_not_null: bool,
    },

    /// 已规划的子查询，参数中可能引用外层列
    SubPlan { plan_id: u32, args: Vec<Expression> },

    /// 尚未规划的子查询
    Query { query_id: u32 },
}

impl Expression {
    pub fn var(varno: RelId, varattno: AttrNumber) -> Self {
        Expression::Var(Var::new(varno, varattno))
    }

    pub fn constant(value: impl Into<Value>) -> Self {
        Expression::Const(value.into())
    }

    pub fn binary(op: BinaryOperator, left: Expression, right: Expression) -> Self {
        Expression::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn equal(left: Expression, right: Expression) -> Self {
        Self::binary(BinaryOperator::Equal, left, right)
    }

    pub fn and(args: Vec<Expression>) -> Self {
        Expression::Bool {
            op: BoolOperator::And,
            args,
        }
    }

    pub fn or(args: Vec<Expression>) -> Self {
        Expression::Bool {
            op: BoolOperator::Or,
            args,
        }
    }

    pub fn is_not_null(arg: Expression) -> Self {
        Expression::NullTest {
            arg: Box::new(arg),
            is_not_null: true,
        }
    }

    pub fn as_var(&self) -> Option<&Var> {
        match self {
            Expression::Var(v) => Some(v),
            _ => None,
        }
    }

    /// 直接子表达式
    pub fn children(&self) -> Vec<&Expression> {
        match self {
            Expression::Var(_) | Expression::Const(_) | Expression::Query { .. } => vec![],
            Expression::Binary { left, right, .. } => vec![left.as_ref(), right.as_ref()],
            Expression::Unary { operand, .. } => vec![operand.as_ref()],
            Expression::NullTest { arg, .. } => vec![arg.as_ref()],
            Expression::Bool { args, .. }
            | Expression::Function { args, .. }
            | Expression::SubPlan { args, .. } => args.iter().collect(),
        }
    }

    /// 直接子表达式（可变）
    pub fn children_mut(&mut self) -> Vec<&mut Expression> {
        match self {
            Expression::Var(_) | Expression::Const(_) | Expression::Query { .. } => vec![],
            Expression::Binary { left, right, .. } => vec![left.as_mut(), right.as_mut()],
            Expression::Unary { operand, .. } => vec![operand.as_mut()],
            Expression::NullTest { arg, .. } => vec![arg.as_mut()],
            Expression::Bool { args, .. }
            | Expression::Function { args, .. }
            | Expression::SubPlan { args, .. } => args.iter_mut().collect(),
        }
    }

    /// 收集表达式引用的全部关系编号（不含保留编号）
    pub fn referenced_relids(&self) -> Relids {
        let mut relids = Relids::new();
        self.collect_relids(&mut relids);
        relids
    }

    fn collect_relids(&self, relids: &mut Relids) {
        if let Expression::Var(v) = self {
            if !v.varno.is_special() {
                relids.add(v.varno);
            }
        }
        for child in self.children() {
            child.collect_relids(relids);
        }
    }

    /// 是否含有引用指定关系的列
    pub fn references(&self, relid: RelId) -> bool {
        match self {
            Expression::Var(v) => v.varno == relid,
            _ => self.children().into_iter().any(|c| c.references(relid)),
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Var(v) => write!(f, "${}.{}", v.varno, v.varattno),
            Expression::Const(value) => write!(f, "{}", value),
            Expression::Binary { op, left, right } => write!(f, "({} {} {})", left, op, right),
            Expression::Unary { op, operand } => write!(f, "{}{}", op.name(), operand),
            Expression::Bool { op, args } => {
                if *op == BoolOperator::Not {
                    if let Some(arg) = args.first() {
                        return write!(f, "NOT {}", arg);
                    }
                }
                let parts: Vec<String> = args.iter().map(|a| a.to_string()).collect();
                write!(f, "({})", parts.join(&format!(" {} ", op.name())))
            }
            Expression::Function { name, args } => {
                let parts: Vec<String> = args.iter().map(|a| a.to_string()).collect();
                write!(f, "{}({})", name, parts.join(", "))
            }
            Expression::NullTest { arg, is_not_null } => {
                if *is_not_null {
                    write!(f, "{} IS NOT NULL", arg)
                } else {
                    write!(f, "{} IS NULL", arg)
                }
            }
            Expression::SubPlan { plan_id, .. } => write!(f, "SubPlan {}", plan_id),
            Expression::Query { query_id } => write!(f, "Query {}", query_id),
        }
    }
}
