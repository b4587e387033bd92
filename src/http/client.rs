use std::fmt;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::debug;

use crate::Result;
use crate::http::request::Request;
use crate::http::response::Response;

/// 网络层失败的分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum NetworkErrorKind {
    /// 超过请求超时
    Timeout,
    /// 连接被拒绝、DNS 失败等
    Connect,
    /// 发送或读取响应时的其他错误
    Request,
}

impl fmt::Display for NetworkErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkErrorKind::Timeout => write!(f, "timeout"),
            NetworkErrorKind::Connect => write!(f, "connect"),
            NetworkErrorKind::Request => write!(f, "request"),
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("{kind} error: {message}")]
pub struct NetworkError {
    pub kind: NetworkErrorKind,
    pub message: String,
}

impl From<reqwest::Error> for NetworkError {
    fn from(err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            NetworkErrorKind::Timeout
        } else if err.is_connect() {
            NetworkErrorKind::Connect
        } else {
            NetworkErrorKind::Request
        };
        Self {
            kind,
            message: error_chain(&err),
        }
    }
}

/// reqwest 的顶层消息通常只有 "error sending request"，把 source 链拼起来
fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

#[derive(Clone)]
pub struct Client {
    inner: reqwest::Client,
    timeout: Duration,
}

impl Client {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    pub fn new(timeout: Duration) -> Result<Self> {
        let inner = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { inner, timeout })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// 发送请求并完整读取响应体
    ///
    /// 任何状态码都视为成功的往返，只有网络层问题才返回错误。
    pub async fn execute(&self, request: Request) -> std::result::Result<Response, NetworkError> {
        debug!(method = %request.method, url = %request.url, "sending request");

        let mut req = self
            .inner
            .request(request.method.to_reqwest(), request.url)
            .headers(request.headers);

        if let Some(timeout) = request.timeout {
            req = req.timeout(timeout);
        }
        if let Some(body) = request.body {
            req = req.body(body.to_string());
        }

        let start = Instant::now();
        let response = req.send().await?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.text().await?;
        let duration = start.elapsed();

        debug!(status, elapsed_ms = duration.as_millis() as u64, "received response");

        Response::new(status, headers, body, duration).map_err(|e| NetworkError {
            kind: NetworkErrorKind::Request,
            message: e.to_string(),
        })
    }
}
