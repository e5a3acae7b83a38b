use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::core::error::PlannerResult;

/// 自连接决策日志的详细程度
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceLevel {
    /// 不输出
    Off,
    /// 输出每次折叠或放弃的结论
    #[default]
    Decisions,
    /// 额外输出每个比较条件与每次编号替换
    Verbose,
}

impl TraceLevel {
    pub fn decisions(&self) -> bool {
        *self >= TraceLevel::Decisions
    }

    pub fn verbose(&self) -> bool {
        *self >= TraceLevel::Verbose
    }
}

/// 自连接消除配置
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SelfJoinConfig {
    /// 运行时开关
    pub enabled: bool,
    pub trace_level: TraceLevel,
    /// 遍历路径树时允许的最大递归深度
    pub max_stack_depth: usize,
}

impl Default for SelfJoinConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            trace_level: TraceLevel::Decisions,
            max_stack_depth: 1000,
        }
    }
}

/// 宿主与扩展点共享的配置，每次调用只读取一次快照
pub type SharedSelfJoinConfig = Arc<RwLock<SelfJoinConfig>>;

pub fn shared(config: SelfJoinConfig) -> SharedSelfJoinConfig {
    Arc::new(RwLock::new(config))
}

/// 日志配置
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    pub dir: String,
    pub file: String,
    pub max_file_size: u64,
    pub max_files: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            dir: "logs".to_string(),
            file: "selfjoin".to_string(),
            max_file_size: 100 * 1024 * 1024, // 100MB
            max_files: 5,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub selfjoin: SelfJoinConfig,
    pub log: LogConfig,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> PlannerResult<Self> {
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> PlannerResult<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert!(config.selfjoin.enabled);
        assert_eq!(config.selfjoin.trace_level, TraceLevel::Decisions);
        assert_eq!(config.selfjoin.max_stack_depth, 1000);
        assert_eq!(config.log.level, "info");
    }

    #[test]
    fn test_config_load_save() {
        let temp_file = NamedTempFile::new().expect("Failed to create temporary file");

        let mut config = Config::default();
        config.selfjoin.enabled = false;
        config.selfjoin.trace_level = TraceLevel::Verbose;
        config.save(temp_file.path()).expect("Failed to save config");

        let loaded = Config::load(temp_file.path()).expect("Failed to load config");
        assert_eq!(config, loaded);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let mut temp_file = NamedTempFile::new().expect("Failed to create temporary file");
        temp_file
            .write_all(b"[selfjoin]\nmax_stack_depth = 64\n")
            .expect("Failed to write config");

        let loaded = Config::load(temp_file.path()).expect("Failed to load config");
        assert_eq!(loaded.selfjoin.max_stack_depth, 64);
        assert!(loaded.selfjoin.enabled);
        assert_eq!(loaded.log, LogConfig::default());
    }

    #[test]
    fn test_invalid_config_is_config_error() {
        let mut temp_file = NamedTempFile::new().expect("Failed to create temporary file");
        temp_file
            .write_all(b"[selfjoin]\nenabled = \"maybe\"\n")
            .expect("Failed to write config");

        let err = Config::load(temp_file.path()).unwrap_err();
        assert!(matches!(err, crate::core::PlannerError::Config(_)));
    }

    #[test]
    fn test_trace_level_ordering() {
        assert!(!TraceLevel::Off.decisions());
        assert!(TraceLevel::Decisions.decisions());
        assert!(!TraceLevel::Decisions.verbose());
        assert!(TraceLevel::Verbose.verbose());
    }
}
