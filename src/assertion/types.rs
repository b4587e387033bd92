use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::variable::{CaptureError, Template};

/// 断言错误类型
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AssertError {
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Path not found: {0}")]
    PathNotFound(String),

    #[error("Response body is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Cannot render expected value: {0}")]
    Render(#[from] CaptureError),
}

/// JSON 字段路径
///
/// 支持 `$`（根）、`name`、`$.user.id`、`items.0.id`（数字段用于数组下标）。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct JsonPath {
    segments: Vec<String>,
}

impl JsonPath {
    pub fn root() -> Self {
        Self {
            segments: Vec::new(),
        }
    }

    pub fn parse(s: &str) -> Result<Self, AssertError> {
        let trimmed = s.trim();
        let rest = if trimmed == "$" || trimmed.is_empty() {
            return Ok(Self::root());
        } else if let Some(rest) = trimmed.strip_prefix("$.") {
            rest
        } else {
            trimmed
        };

        let segments: Vec<String> = rest.split('.').map(str::to_string).collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(AssertError::InvalidPath(s.to_string()));
        }
        Ok(Self { segments })
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// 在 JSON 树中定位字段；数组上的数字段作为下标
    pub fn resolve<'a>(&self, value: &'a Value) -> Option<&'a Value> {
        self.segments
            .iter()
            .try_fold(value, |current, segment| match current {
                Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
                Value::Object(map) => map.get(segment),
                _ => None,
            })
    }
}

impl fmt::Display for JsonPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            write!(f, "$")
        } else {
            write!(f, "{}", self.segments.join("."))
        }
    }
}

impl TryFrom<String> for JsonPath {
    type Error = AssertError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<JsonPath> for String {
    fn from(path: JsonPath) -> Self {
        path.to_string()
    }
}

/// 断言表达式
///
/// 场景文件中写作 `{ type = "equals", path = "name", value = "John" }`。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Assertion {
    /// 字段值与期望值相等（期望值可以引用已捕获变量）
    Equals { path: JsonPath, value: Template },
    /// 字段存在且不为 null
    NotNull { path: JsonPath },
    /// 字段是整数
    IsInteger { path: JsonPath },
    /// 数组（或对象）元素个数不少于 `min`
    SizeAtLeast { path: JsonPath, min: usize },
    /// 数组（或对象）元素个数等于期望值
    SizeEquals { path: JsonPath, value: Template },
    /// 响应媒体类型，忽略 charset 等参数
    ContentTypeIs { content_type: String },
    /// 原始响应体包含文本
    BodyContains { text: String },
}

impl Assertion {
    pub fn equals(path: &str, value: impl Into<Template>) -> Result<Self, AssertError> {
        Ok(Assertion::Equals {
            path: JsonPath::parse(path)?,
            value: value.into(),
        })
    }

    pub fn not_null(path: &str) -> Result<Self, AssertError> {
        Ok(Assertion::NotNull {
            path: JsonPath::parse(path)?,
        })
    }

    pub fn is_integer(path: &str) -> Result<Self, AssertError> {
        Ok(Assertion::IsInteger {
            path: JsonPath::parse(path)?,
        })
    }

    pub fn size_at_least(path: &str, min: usize) -> Result<Self, AssertError> {
        Ok(Assertion::SizeAtLeast {
            path: JsonPath::parse(path)?,
            min,
        })
    }

    pub fn size_equals(path: &str, value: impl Into<Template>) -> Result<Self, AssertError> {
        Ok(Assertion::SizeEquals {
            path: JsonPath::parse(path)?,
            value: value.into(),
        })
    }

    pub fn content_type_is(content_type: &str) -> Self {
        Assertion::ContentTypeIs {
            content_type: content_type.to_string(),
        }
    }

    pub fn body_contains(text: &str) -> Self {
        Assertion::BodyContains {
            text: text.to_string(),
        }
    }

    /// 期望值中引用的变量
    pub fn variables(&self) -> Vec<&str> {
        match self {
            Assertion::Equals { value, .. } | Assertion::SizeEquals { value, .. } => {
                value.variables()
            }
            _ => Vec::new(),
        }
    }

    /// 是否需要把响应体解析为 JSON
    pub fn needs_json(&self) -> bool {
        !matches!(
            self,
            Assertion::ContentTypeIs { .. } | Assertion::BodyContains { .. }
        )
    }
}

impl fmt::Display for Assertion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Assertion::Equals { path, value } => write!(f, "{} == {}", path, value),
            Assertion::NotNull { path } => write!(f, "{} is not null", path),
            Assertion::IsInteger { path } => write!(f, "{} is an integer", path),
            Assertion::SizeAtLeast { path, min } => write!(f, "size({}) >= {}", path, min),
            Assertion::SizeEquals { path, value } => write!(f, "size({}) == {}", path, value),
            Assertion::ContentTypeIs { content_type } => {
                write!(f, "content-type is {}", content_type)
            }
            Assertion::BodyContains { text } => write!(f, "body contains {:?}", text),
        }
    }
}

/// 断言结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssertionResult {
    /// 断言的文字描述
    pub description: String,

    /// 是否通过
    pub passed: bool,

    /// 期望描述
    pub expected: String,

    /// 实际值（字符串表示）
    pub actual: Option<String>,

    /// 失败消息
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl AssertionResult {
    pub fn success(description: String, expected: String, actual: String) -> Self {
        Self {
            description,
            passed: true,
            expected,
            actual: Some(actual),
            message: None,
        }
    }

    pub fn failure(description: String, expected: String, actual: String, message: String) -> Self {
        Self {
            description,
            passed: false,
            expected,
            actual: Some(actual),
            message: Some(message),
        }
    }

    /// 无法求值（路径不存在、Body 非 JSON 等）
    pub fn error(description: String, expected: String, error: AssertError) -> Self {
        Self {
            description,
            passed: false,
            expected,
            actual: None,
            message: Some(error.to_string()),
        }
    }
}

/// JSON 值的类型名称，用于诊断信息
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_path_parse() {
        assert!(JsonPath::parse("$").unwrap().is_root());
        assert!(JsonPath::parse("").unwrap().is_root());
        assert_eq!(JsonPath::parse("$.user.id").unwrap().to_string(), "user.id");
        assert_eq!(JsonPath::parse("name").unwrap().to_string(), "name");
        assert!(JsonPath::parse("user..id").is_err());
        assert!(JsonPath::parse("$.").is_err());
    }

    #[test]
    fn test_json_path_resolve() {
        let body = json!({"users": [{"id": 1}, {"id": 2}], "meta": {"total": 2}});

        let path = JsonPath::parse("users.1.id").unwrap();
        assert_eq!(path.resolve(&body), Some(&json!(2)));

        let path = JsonPath::parse("$.meta.total").unwrap();
        assert_eq!(path.resolve(&body), Some(&json!(2)));

        assert_eq!(JsonPath::parse("users.x").unwrap().resolve(&body), None);
        assert_eq!(JsonPath::parse("users.5").unwrap().resolve(&body), None);
        assert_eq!(JsonPath::root().resolve(&body), Some(&body));
    }

    #[test]
    fn test_assertion_display() {
        assert_eq!(Assertion::equals("name", json!("John")).unwrap().to_string(), r#"name == "John""#);
        assert_eq!(
            Assertion::equals("id", crate::variable::Template::var("user_id")).unwrap().to_string(),
            "id == {user_id}"
        );
        assert_eq!(Assertion::not_null("id").unwrap().to_string(), "id is not null");
        assert_eq!(Assertion::size_at_least("$", 0).unwrap().to_string(), "size($) >= 0");
        assert_eq!(
            Assertion::body_contains("healthy").to_string(),
            r#"body contains "healthy""#
        );
    }

    #[test]
    fn test_assertion_variables() {
        let assertion = Assertion::equals("id", crate::variable::Template::var("user_id")).unwrap();
        assert_eq!(assertion.variables(), vec!["user_id"]);
        assert!(Assertion::not_null("id").unwrap().variables().is_empty());
    }

    #[test]
    fn test_constructors_reject_invalid_paths() {
        assert_eq!(
            Assertion::equals("user..id", json!(1)),
            Err(AssertError::InvalidPath("user..id".to_string()))
        );
        assert!(Assertion::not_null("$.").is_err());
        assert!(Assertion::is_integer("a..b").is_err());
        assert!(Assertion::size_at_least("items.", 1).is_err());
        assert!(Assertion::size_equals("..", json!(0)).is_err());
    }

    #[test]
    fn test_assertion_deserialize() {
        #[derive(Deserialize)]
        struct Holder {
            assertions: Vec<Assertion>,
        }

        let holder: Holder = toml::from_str(
            r#"
assertions = [
    { type = "equals", path = "name", value = "John" },
    { type = "equals", path = "id", value = { "$var" = "user_id" } },
    { type = "not_null", path = "id" },
    { type = "is_integer", path = "id" },
    { type = "size_at_least", path = "$", min = 0 },
    { type = "content_type_is", content_type = "application/json" },
    { type = "body_contains", text = "healthy" },
]
"#,
        )
        .unwrap();

        assert_eq!(holder.assertions.len(), 7);
        assert_eq!(holder.assertions[0], Assertion::equals("name", json!("John")).unwrap());
        assert_eq!(holder.assertions[1].variables(), vec!["user_id"]);
        assert_eq!(holder.assertions[3], Assertion::is_integer("id").unwrap());
        assert_eq!(holder.assertions[4], Assertion::size_at_least("$", 0).unwrap());
    }
}
