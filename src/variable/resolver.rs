use regex::{Captures, Regex};
use std::sync::OnceLock;

/// 系统环境变量替换器，用于配置文件中的 `${VAR}` 引用
pub struct EnvResolver;

impl EnvResolver {
    /// 解析并替换系统环境变量 ${VAR}，未定义的变量保持原样
    pub fn resolve(text: &str) -> String {
        Self::resolve_with(text, |name| std::env::var(name).ok())
    }

    /// 使用自定义查找函数替换，便于测试
    pub fn resolve_with<F>(text: &str, lookup: F) -> String
    where
        F: Fn(&str) -> Option<String>,
    {
        static ENV_REGEX: OnceLock<Regex> = OnceLock::new();
        let re = ENV_REGEX.get_or_init(|| Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").unwrap());

        re.replace_all(text, |caps: &Captures| {
            lookup(&caps[1]).unwrap_or_else(|| caps[0].to_string())
        })
        .to_string()
    }
}
