use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::http::{BaseUrl, Client};
use crate::variable::EnvResolver;
use crate::{Result, RucontractError};

pub const DEFAULT_BASE_URL: &str = "http://localhost:4000/api";
pub const DEFAULT_TIMEOUT_SECS: u64 = Client::DEFAULT_TIMEOUT.as_secs();
pub const DEFAULT_CONCURRENCY: usize = 4;

/// 一组可覆盖的运行设置，`[defaults]` 与每个 `[environments.<name>]` 共用
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    pub base_url: Option<String>,
    pub timeout_secs: Option<u64>,
    pub concurrency: Option<usize>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub scenario_files: Vec<PathBuf>,
}

/// 完整的配置文件
#[derive(Debug, Clone, Deserialize, Default)]
pub struct HarnessConfig {
    #[serde(default)]
    pub defaults: Settings,

    #[serde(default)]
    pub environments: HashMap<String, Settings>,

    /// 配置文件所在目录，用于解析相对的场景文件路径
    #[serde(skip)]
    pub source_dir: Option<PathBuf>,
}

impl HarnessConfig {
    pub fn get_environment(&self, name: &str) -> Option<&Settings> {
        self.environments.get(name)
    }
}

/// 命令行覆盖项（优先级最高）
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub base_url: Option<String>,
    pub timeout_secs: Option<u64>,
    pub concurrency: Option<usize>,
}

/// 合并后的最终运行设置
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub base_url: BaseUrl,
    pub timeout: Duration,
    pub concurrency: usize,
    pub headers: BTreeMap<String, String>,
    pub scenario_files: Vec<PathBuf>,
}

/// 配置文件加载器
pub struct ConfigLoader;

impl ConfigLoader {
    /// 配置文件名
    pub const CONFIG_FILE: &'static str = "rucontract.toml";

    /// 从指定路径加载配置文件
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<HarnessConfig> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            RucontractError::ConfigError(format!(
                "failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        let mut config: HarnessConfig = toml::from_str(&content).map_err(|e| {
            RucontractError::ConfigError(format!(
                "failed to parse config file {}: {}",
                path.display(),
                e
            ))
        })?;
        config.source_dir = path.parent().map(Path::to_path_buf);

        debug!(path = %path.display(), "loaded config file");
        Ok(config)
    }

    /// 查找并加载配置文件
    /// 查找顺序：
    /// 1. 当前目录及其父目录
    /// 2. 用户配置目录 ~/.config/rucontract/
    pub fn find_and_load() -> Result<Option<HarnessConfig>> {
        match Self::find() {
            Some(path) => Self::load_from_path(path).map(Some),
            None => Ok(None),
        }
    }

    fn find() -> Option<PathBuf> {
        if let Ok(mut current) = std::env::current_dir() {
            loop {
                let candidate = current.join(Self::CONFIG_FILE);
                if candidate.is_file() {
                    return Some(candidate);
                }
                if !current.pop() {
                    break;
                }
            }
        }

        let home = dirs::home_dir()?;
        let candidate = home
            .join(".config")
            .join("rucontract")
            .join(Self::CONFIG_FILE);
        candidate.is_file().then_some(candidate)
    }

    /// 合并默认值、环境配置与命令行覆盖
    pub fn resolve(
        config: &HarnessConfig,
        env_name: Option<&str>,
        overrides: &Overrides,
    ) -> Result<ResolvedConfig> {
        let env = match env_name {
            Some(name) => Some(config.get_environment(name).ok_or_else(|| {
                let mut known: Vec<&str> = config.environments.keys().map(String::as_str).collect();
                known.sort_unstable();
                RucontractError::ConfigError(format!(
                    "unknown environment '{}' (available: {})",
                    name,
                    if known.is_empty() {
                        "none".to_string()
                    } else {
                        known.join(", ")
                    }
                ))
            })?),
            None => None,
        };
        let defaults = &config.defaults;

        let base_url = overrides
            .base_url
            .clone()
            .or_else(|| env.and_then(|e| e.base_url.clone()))
            .or_else(|| defaults.base_url.clone())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let base_url = BaseUrl::parse(&EnvResolver::resolve(&base_url))?;

        let timeout_secs = overrides
            .timeout_secs
            .or_else(|| env.and_then(|e| e.timeout_secs))
            .or(defaults.timeout_secs)
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        if timeout_secs == 0 {
            return Err(RucontractError::ConfigError(
                "timeout must be at least 1 second".to_string(),
            ));
        }

        let concurrency = overrides
            .concurrency
            .or_else(|| env.and_then(|e| e.concurrency))
            .or(defaults.concurrency)
            .unwrap_or(DEFAULT_CONCURRENCY)
            .max(1);

        let mut headers = BTreeMap::new();
        for (key, value) in defaults
            .headers
            .iter()
            .chain(env.into_iter().flat_map(|e| e.headers.iter()))
        {
            headers.insert(key.clone(), EnvResolver::resolve(value));
        }

        let scenario_files = defaults
            .scenario_files
            .iter()
            .chain(env.into_iter().flat_map(|e| e.scenario_files.iter()))
            .map(|p| match &config.source_dir {
                Some(dir) if p.is_relative() => dir.join(p),
                _ => p.clone(),
            })
            .collect();

        Ok(ResolvedConfig {
            base_url,
            timeout: Duration::from_secs(timeout_secs),
            concurrency,
            headers,
            scenario_files,
        })
    }
}
