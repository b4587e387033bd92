use std::time::Duration;

use reqwest::header::{HeaderMap as Headers, HeaderName, HeaderValue};

use crate::http::types::Method;
use crate::{Result, RucontractError};

/// 一次已完成变量渲染的 HTTP 请求
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub url: url::Url,
    pub headers: Headers,
    pub body: Option<serde_json::Value>,
    /// 覆盖客户端默认超时
    pub timeout: Option<Duration>,
}

impl Request {
    pub fn new(method: Method, url: url::Url) -> Self {
        Self {
            method,
            url,
            headers: Headers::new(),
            body: None,
            timeout: None,
        }
    }

    fn insert_header(&mut self, key: &str, value: &str) -> Result<()> {
        let name: HeaderName = key
            .parse()
            .map_err(|_| RucontractError::ParseError(format!("invalid header name: {}", key)))?;
        let value: HeaderValue = value.parse().map_err(|_| {
            RucontractError::ParseError(format!("invalid value for header {}", key))
        })?;
        self.headers.insert(name, value);
        Ok(())
    }

    pub fn with_header(mut self, key: &str, value: &str) -> Result<Self> {
        self.insert_header(key, value)?;
        Ok(self)
    }

    pub fn with_headers<'a, I>(mut self, headers: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a String, &'a String)>,
    {
        for (key, value) in headers {
            self.insert_header(key, value)?;
        }
        Ok(self)
    }

    /// 设置 JSON 请求体，并在未显式指定时补上 Content-Type
    pub fn with_json(mut self, body: serde_json::Value) -> Result<Self> {
        if !self.headers.contains_key(reqwest::header::CONTENT_TYPE) {
            self.insert_header("Content-Type", "application/json")?;
        }
        self.body = Some(body);
        Ok(self)
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}
