use serde_json::Value;
use std::collections::BTreeMap;

use crate::assertion::JsonPath;

/// 捕获或渲染变量时的错误
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CaptureError {
    #[error("variable '{0}' is not defined")]
    Undefined(String),

    #[error("variable '{0}' was already captured")]
    AlreadyCaptured(String),

    #[error("cannot capture '{name}': path '{path}' not found in response body")]
    PathNotFound { name: String, path: JsonPath },

    #[error("cannot capture '{name}': header '{header}' not found")]
    HeaderNotFound { name: String, header: String },

    #[error("cannot capture '{name}' from '{source_desc}': expected {expected}, got {actual}")]
    UnsupportedType {
        name: String,
        source_desc: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("cannot capture '{name}': response body is not valid JSON ({message})")]
    InvalidBody { name: String, message: String },
}

/// 单次场景运行内的已捕获变量
///
/// 每个场景运行持有自己的实例，运行结束即丢弃，变量一旦写入不可覆盖。
#[derive(Debug, Clone, Default)]
pub struct CapturedVariables {
    values: BTreeMap<String, Value>,
}

impl CapturedVariables {
    pub fn new() -> Self {
        Self::default()
    }

    /// 写入变量，同名变量已存在时返回错误
    pub fn insert(&mut self, name: impl Into<String>, value: Value) -> Result<(), CaptureError> {
        let name = name.into();
        if self.values.contains_key(&name) {
            return Err(CaptureError::AlreadyCaptured(name));
        }
        self.values.insert(name, value);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn require(&self, name: &str) -> Result<&Value, CaptureError> {
        self.get(name)
            .ok_or_else(|| CaptureError::Undefined(name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_insert_and_get() {
        let mut vars = CapturedVariables::new();
        assert!(vars.is_empty());

        vars.insert("user_id", json!(42)).unwrap();
        assert_eq!(vars.len(), 1);
        assert_eq!(vars.get("user_id"), Some(&json!(42)));
        assert_eq!(vars.get("missing"), None);
    }

    #[test]
    fn test_captured_values_are_immutable() {
        let mut vars = CapturedVariables::new();
        vars.insert("user_id", json!(1)).unwrap();

        let err = vars.insert("user_id", json!(2)).unwrap_err();
        assert_eq!(err, CaptureError::AlreadyCaptured("user_id".to_string()));
        assert_eq!(vars.get("user_id"), Some(&json!(1)));
    }

    #[test]
    fn test_require_missing() {
        let vars = CapturedVariables::new();
        assert_eq!(
            vars.require("token").unwrap_err(),
            CaptureError::Undefined("token".to_string())
        );
    }
}
