//! 文件日志
//!
//! 自连接决策日志写在 `query::optimizer` 下。`trace_level = "verbose"`
//! 时该模块的级别至少为 debug，其余模块沿用配置的级别。

use crate::config::Config;
use crate::core::error::{PlannerError, PlannerResult};
use flexi_logger::{Cleanup, Criterion, FileSpec, Logger, LoggerHandle, Naming, WriteMode};
use parking_lot::Mutex;

static LOGGER_HANDLE: Mutex<Option<LoggerHandle>> = Mutex::new(None);

const OPTIMIZER_MODULE: &str = "selfjoin_planner::query::optimizer";

/// 由配置生成 flexi_logger 的级别描述
pub fn log_spec(config: &Config) -> String {
    if config.selfjoin.trace_level.verbose() {
        format!("{}, {}=debug", config.log.level, OPTIMIZER_MODULE)
    } else {
        config.log.level.clone()
    }
}

/// 按配置启动异步文件日志，句柄保存到 `shutdown` 为止
pub fn init(config: &Config) -> PlannerResult<()> {
    let handle = Logger::try_with_str(log_spec(config))
        .map_err(|e| PlannerError::Config(e.to_string()))?
        .log_to_file(
            FileSpec::default()
                .basename(&config.log.file)
                .directory(&config.log.dir),
        )
        .rotate(
            Criterion::Size(config.log.max_file_size),
            Naming::Numbers,
            Cleanup::KeepLogFiles(config.log.max_files),
        )
        .write_mode(WriteMode::Async)
        .append()
        .start()
        .map_err(|e| PlannerError::Config(e.to_string()))?;

    *LOGGER_HANDLE.lock() = Some(handle);

    log::info!(
        "文件日志 {}/{}，自连接跟踪 {:?}",
        config.log.dir,
        config.log.file,
        config.selfjoin.trace_level
    );
    Ok(())
}

/// 等待异步日志写完
pub fn shutdown() {
    if let Some(handle) = LOGGER_HANDLE.lock().take() {
        handle.flush();
    }
}

pub fn is_initialized() -> bool {
    LOGGER_HANDLE.lock().is_some()
}
