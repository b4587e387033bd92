use thiserror::Error;

#[derive(Error, Debug)]
pub enum RucontractError {
    #[error("解析错误: {0}")]
    ParseError(String),

    #[error("无效的 URL: {0}")]
    InvalidUrl(String),

    #[error("HTTP 请求失败: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("配置错误: {0}")]
    ConfigError(String),

    #[error("场景定义错误: {0}")]
    ScenarioError(#[from] crate::scenario::ScenarioError),

    #[error("IO 错误: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON 解析错误: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("TOML 解析错误: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("URL 解析错误: {0}")]
    UrlParseError(#[from] url::ParseError),

    #[error("{0}")]
    Other(String),
}

impl From<anyhow::Error> for RucontractError {
    fn from(err: anyhow::Error) -> Self {
        RucontractError::Other(err.to_string())
    }
}

/// Result type for rucontract crate
pub type Result<T> = std::result::Result<T, RucontractError>;
