use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::assertion::{AssertError, JsonPath, ResponseContext, type_name};
use crate::variable::types::CaptureError;

/// 变量捕获来源
///
/// 场景文件中写作 `{ name = "user_id", body = "id" }`、
/// `{ name = "trace", header = "X-Trace-Id" }` 或 `{ name = "count", length = "$" }`。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureSource {
    /// 从 JSON Body 提取标量（字符串、数字、布尔）
    Body(JsonPath),

    /// 从响应 Header 提取
    Header(String),

    /// JSON Body 中数组或对象的元素个数
    Length(JsonPath),
}

impl fmt::Display for CaptureSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureSource::Body(path) => write!(f, "body.{}", path),
            CaptureSource::Header(name) => write!(f, "header.{}", name),
            CaptureSource::Length(path) => write!(f, "length({})", path),
        }
    }
}

/// 变量捕获指令
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capture {
    /// 变量名称
    pub name: String,

    /// 捕获来源
    #[serde(flatten)]
    pub source: CaptureSource,
}

impl Capture {
    pub fn from_body(name: impl Into<String>, path: JsonPath) -> Self {
        Self {
            name: name.into(),
            source: CaptureSource::Body(path),
        }
    }

    pub fn from_header(name: impl Into<String>, header: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: CaptureSource::Header(header.into()),
        }
    }

    pub fn length_of(name: impl Into<String>, path: JsonPath) -> Self {
        Self {
            name: name.into(),
            source: CaptureSource::Length(path),
        }
    }

    /// 按来源从响应中提取值
    pub fn extract(&self, ctx: &ResponseContext<'_>) -> Result<Value, CaptureError> {
        match &self.source {
            CaptureSource::Body(path) => {
                let value = self.resolve(ctx, path)?;
                match value {
                    Value::String(_) | Value::Number(_) | Value::Bool(_) => Ok(value.clone()),
                    other => Err(self.unsupported("a scalar value", other)),
                }
            }

            CaptureSource::Header(header) => ctx
                .response()
                .headers
                .get(header.as_str())
                .and_then(|v| v.to_str().ok())
                .map(|v| Value::String(v.to_string()))
                .ok_or_else(|| CaptureError::HeaderNotFound {
                    name: self.name.clone(),
                    header: header.clone(),
                }),

            CaptureSource::Length(path) => match self.resolve(ctx, path)? {
                Value::Array(items) => Ok(Value::from(items.len())),
                Value::Object(fields) => Ok(Value::from(fields.len())),
                other => Err(self.unsupported("an array or object", other)),
            },
        }
    }

    fn resolve<'a>(
        &self,
        ctx: &'a ResponseContext<'_>,
        path: &JsonPath,
    ) -> Result<&'a Value, CaptureError> {
        ctx.resolve(path).map_err(|e| match e {
            AssertError::InvalidJson(message) => CaptureError::InvalidBody {
                name: self.name.clone(),
                message,
            },
            _ => CaptureError::PathNotFound {
                name: self.name.clone(),
                path: path.clone(),
            },
        })
    }

    fn unsupported(&self, expected: &'static str, actual: &Value) -> CaptureError {
        CaptureError::UnsupportedType {
            name: self.name.clone(),
            source_desc: self.source.to_string(),
            expected,
            actual: type_name(actual),
        }
    }
}
