//! 自定义节点注册与执行器工厂
//!
//! 自定义节点按名称登记三组方法：路径方法、计划方法与执行方法。
//! 由计划树创建执行器时，自定义节点通过执行方法名找到工厂函数，
//! 其余节点交给调用方提供的构造函数。

use std::collections::HashMap;

use crate::core::error::{ExecutorError, ExecutorResult};
use crate::query::executor::self_join_executor::SelfJoinExecutor;
use crate::query::executor::traits::Executor;
use crate::query::planner::plan::{PlanNodeEnum, SelfJoinScanNode};

/// 自连接路径方法名
pub const SELF_JOIN_PATH_METHODS: &str = "PathSelfJoin";

/// 执行器工厂函数
pub type ExecutorFactory =
    fn(i64, &SelfJoinScanNode, Vec<Box<dyn Executor>>) -> ExecutorResult<Box<dyn Executor>>;

/// 一个自定义节点的三组方法名
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomScanMethods {
    pub path_name: String,
    pub plan_name: String,
    pub exec_name: String,
}

/// 自定义节点注册表
#[derive(Default, Clone)]
pub struct CustomNodeRegistry {
    methods: Vec<CustomScanMethods>,
    factories: HashMap<String, ExecutorFactory>,
}

impl std::fmt::Debug for CustomNodeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CustomNodeRegistry")
            .field("methods", &self.methods)
            .finish()
    }
}

impl CustomNodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记自定义节点，同名的执行方法会被覆盖
    pub fn register(&mut self, methods: CustomScanMethods, factory: ExecutorFactory) {
        log::debug!(
            "注册自定义节点: {} / {} / {}",
            methods.path_name,
            methods.plan_name,
            methods.exec_name
        );
        self.factories.insert(methods.exec_name.clone(), factory);
        self.methods.retain(|m| m.exec_name != methods.exec_name);
        self.methods.push(methods);
    }

    pub fn path_methods(&self, name: &str) -> Option<&CustomScanMethods> {
        self.methods.iter().find(|m| m.path_name == name)
    }

    pub fn plan_methods(&self, name: &str) -> Option<&CustomScanMethods> {
        self.methods.iter().find(|m| m.plan_name == name)
    }

    /// 按执行方法名查找工厂函数
    pub fn exec_factory(&self, name: &str) -> ExecutorResult<ExecutorFactory> {
        self.factories
            .get(name)
            .copied()
            .ok_or_else(|| ExecutorError::UnknownCustomNode(name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

fn create_self_join_executor(
    id: i64,
    node: &SelfJoinScanNode,
    children: Vec<Box<dyn Executor>>,
) -> ExecutorResult<Box<dyn Executor>> {
    Ok(Box::new(SelfJoinExecutor::new(id, node, children)?))
}

/// 登记自连接节点的路径、计划与执行方法
pub fn register_self_join_methods(registry: &mut CustomNodeRegistry) {
    registry.register(
        CustomScanMethods {
            path_name: SELF_JOIN_PATH_METHODS.to_string(),
            plan_name: SelfJoinScanNode::PLAN_METHODS.to_string(),
            exec_name: SelfJoinScanNode::EXEC_METHODS.to_string(),
        },
        create_self_join_executor,
    );
}

/// 由计划树创建执行器树
///
/// 节点编号按先序分配。`other` 负责创建自定义节点以外的执行器，
/// 子执行器已经创建好并按计划中的顺序传入。
pub struct ExecutorBuilder<'a, F>
where
    F: FnMut(i64, &PlanNodeEnum, Vec<Box<dyn Executor>>) -> ExecutorResult<Box<dyn Executor>>,
{
    registry: &'a CustomNodeRegistry,
    other: F,
    next_id: i64,
}

impl<'a, F> ExecutorBuilder<'a, F>
where
    F: FnMut(i64, &PlanNodeEnum, Vec<Box<dyn Executor>>) -> ExecutorResult<Box<dyn Executor>>,
{
    pub fn new(registry: &'a CustomNodeRegistry, other: F) -> Self {
        Self {
            registry,
            other,
            next_id: 0,
        }
    }

    pub fn build(&mut self, plan: &PlanNodeEnum) -> ExecutorResult<Box<dyn Executor>> {
        let id = self.next_id;
        self.next_id += 1;
        let children = plan
            .children()
            .into_iter()
            .map(|child| self.build(child))
            .collect::<ExecutorResult<Vec<_>>>()?;
        match plan {
            PlanNodeEnum::SelfJoinScan(node) => {
                let plan_methods = self
                    .registry
                    .plan_methods(SelfJoinScanNode::PLAN_METHODS)
                    .ok_or_else(|| {
                        ExecutorError::UnknownCustomNode(SelfJoinScanNode::PLAN_METHODS.to_string())
                    })?;
                let factory = self.registry.exec_factory(&plan_methods.exec_name)?;
                factory(id, node, children)
            }
            other => (self.other)(id, other, children),
        }
    }
}
