//! 日志系统模块
//!
//! 提供结构化日志配置和管理功能

use crate::config::LoggingConfig;
use anyhow::Context;
use log::LevelFilter;
use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};
use tracing_subscriber::filter::Directive;
use tracing_subscriber::{fmt, prelude::*, registry, EnvFilter, Layer};

/// 全局日志初始化状态
#[derive(Debug, Default)]
struct GlobalLoggingState {
    /// 是否已初始化
    initialized: bool,
    /// 当前配置
    current_config: Option<LogConfig>,
}

/// 全局日志状态管理器
static GLOBAL_LOGGING_STATE: OnceLock<Mutex<GlobalLoggingState>> = OnceLock::new();

fn logging_state() -> MutexGuard<'static, GlobalLoggingState> {
    GLOBAL_LOGGING_STATE
        .get_or_init(|| Mutex::new(GlobalLoggingState::default()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// 日志配置结构
#[derive(Debug, Clone, PartialEq)]
pub struct LogConfig {
    /// 日志级别
    pub level: LevelFilter,
    /// 日志文件路径（可选），设置后不再输出到控制台
    pub file_path: Option<PathBuf>,
    /// 是否使用JSON格式
    pub json_format: bool,
    /// 模块级别日志控制
    pub module_levels: HashMap<String, LevelFilter>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LevelFilter::Info,
            file_path: None,
            json_format: false,
            module_levels: default_module_levels(),
        }
    }
}

/// 默认压低依赖库的日志级别，避免每条 SQL 都输出
fn default_module_levels() -> HashMap<String, LevelFilter> {
    HashMap::from([
        ("sqlx".to_string(), LevelFilter::Warn),
        ("hyper".to_string(), LevelFilter::Warn),
    ])
}

impl LogConfig {
    /// 由配置文件中的日志段构造
    ///
    /// # 参数
    /// * `config` - 配置文件中的日志配置
    /// * `level_override` - 命令行指定的日志级别，优先于配置文件
    ///
    /// # 返回
    /// * `LogConfig` - 日志配置
    pub fn from_config(config: &LoggingConfig, level_override: Option<LevelFilter>) -> Self {
        let level = level_override
            .or_else(|| LevelFilter::from_str(&config.level).ok())
            .unwrap_or(LevelFilter::Info);

        Self {
            level,
            file_path: config.file.clone(),
            json_format: config.json,
            module_levels: default_module_levels(),
        }
    }
}

/// 日志系统管理器
#[derive(Debug)]
pub struct LoggingSystem {
    config: LogConfig,
}

impl LoggingSystem {
    /// 初始化日志系统
    ///
    /// 全局只初始化一次，重复调用直接返回成功
    ///
    /// # 参数
    /// * `config` - 日志配置
    ///
    /// # 返回
    /// * `anyhow::Result<LoggingSystem>` - 初始化结果
    pub fn setup_logging(config: LogConfig) -> anyhow::Result<Self> {
        let mut state = logging_state();
        if !state.initialized {
            Self::init_log_tracer()?;
            Self::init_tracing_subscriber(&config)?;
            state.initialized = true;
            state.current_config = Some(config.clone());
        }

        Ok(Self { config })
    }

    /// 本实例使用的配置
    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    /// 初始化 LogTracer（log crate 到 tracing 的桥接）
    fn init_log_tracer() -> anyhow::Result<()> {
        use tracing_log::LogTracer;

        static LOG_TRACER_INIT: OnceLock<Result<(), String>> = OnceLock::new();

        let result = LOG_TRACER_INIT.get_or_init(|| LogTracer::init().map_err(|e| e.to_string()));

        result
            .as_ref()
            .map_err(|e| anyhow::anyhow!("LogTracer初始化失败: {}", e))?;
        Ok(())
    }

    /// 初始化 tracing subscriber
    fn init_tracing_subscriber(config: &LogConfig) -> anyhow::Result<()> {
        let mut env_filter = EnvFilter::from_default_env()
            .add_directive(Self::level_directive(None, config.level)?);

        for (module, level) in &config.module_levels {
            env_filter =
                env_filter.add_directive(Self::level_directive(Some(module.as_str()), *level)?);
        }

        let fmt_layer = match &config.file_path {
            Some(file_path) => {
                let file = std::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(file_path)
                    .with_context(|| format!("创建日志文件失败: {}", file_path.display()))?;
                let layer = fmt::layer()
                    .with_writer(Arc::new(file))
                    .with_ansi(false)
                    .with_timer(fmt::time::ChronoUtc::rfc_3339());
                if config.json_format {
                    layer.json().boxed()
                } else {
                    layer.boxed()
                }
            }
            None => {
                let layer = fmt::layer()
                    .with_timer(fmt::time::ChronoUtc::rfc_3339())
                    .with_target(true);
                if config.json_format {
                    layer.json().boxed()
                } else {
                    layer.with_thread_ids(true).boxed()
                }
            }
        };

        match registry().with(env_filter).with(fmt_layer).try_init() {
            Ok(()) => {
                tracing::debug!("日志配置: {:?}", config);
                Ok(())
            }
            // 其他组件（例如测试框架）已设置全局订阅者
            Err(e) if e.to_string().contains("already been set") => {
                tracing::debug!("日志系统已经初始化过了");
                Ok(())
            }
            Err(e) => Err(anyhow::anyhow!("tracing subscriber初始化失败: {}", e)),
        }
    }

    /// 构造级别过滤指令
    fn level_directive(module: Option<&str>, level: LevelFilter) -> anyhow::Result<Directive> {
        let level = level.as_str().to_lowercase();
        let directive = match module {
            Some(module) => format!("{module}={level}"),
            None => level,
        };
        directive
            .parse()
            .with_context(|| format!("无效的日志过滤指令: {directive}"))
    }

    /// 检查日志系统是否已初始化
    pub fn is_initialized() -> bool {
        logging_state().initialized
    }

    /// 获取当前日志配置（如果已初始化）
    pub fn current_config() -> Option<LogConfig> {
        logging_state().current_config.clone()
    }
}
