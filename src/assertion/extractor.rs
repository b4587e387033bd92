use serde_json::Value;
use std::cell::OnceCell;

use crate::assertion::types::{AssertError, JsonPath};
use crate::http::Response;

/// 断言与变量捕获共用的响应视图，JSON Body 只在首次需要时解析一次
pub struct ResponseContext<'a> {
    response: &'a Response,
    json: OnceCell<Result<Value, String>>,
}

impl<'a> ResponseContext<'a> {
    pub fn new(response: &'a Response) -> Self {
        Self {
            response,
            json: OnceCell::new(),
        }
    }

    pub fn response(&self) -> &'a Response {
        self.response
    }

    pub fn json(&self) -> Result<&Value, AssertError> {
        self.json
            .get_or_init(|| self.response.json().map_err(|e| e.to_string()))
            .as_ref()
            .map_err(|message| AssertError::InvalidJson(message.clone()))
    }

    pub fn resolve(&self, path: &JsonPath) -> Result<&Value, AssertError> {
        path.resolve(self.json()?)
            .ok_or_else(|| AssertError::PathNotFound(path.to_string()))
    }
}

/// 数组或对象的元素个数
pub fn size_of(value: &Value) -> Result<usize, AssertError> {
    match value {
        Value::Array(items) => Ok(items.len()),
        Value::Object(map) => Ok(map.len()),
        other => Err(AssertError::TypeMismatch {
            expected: "array or object",
            actual: super::types::type_name(other),
        }),
    }
}

/// 诊断输出用的紧凑表示，过长时截断
pub fn describe(value: &Value) -> String {
    preview(&value.to_string())
}

pub fn preview(text: &str) -> String {
    const MAX_LEN: usize = 120;

    if text.chars().count() <= MAX_LEN {
        text.to_string()
    } else {
        let truncated: String = text.chars().take(MAX_LEN).collect();
        format!("{}…", truncated)
    }
}
