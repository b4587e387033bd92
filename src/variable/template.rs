use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::variable::types::{CaptureError, CapturedVariables};

/// 模板中引用变量的对象键：`{"$var": "user_id"}`
pub const VAR_KEY: &str = "$var";

/// 结构化 JSON 模板
///
/// 模板本身就是一棵 JSON 树，只有形如 `{"$var": "name"}` 的对象会在渲染时
/// 被替换为捕获到的值（保持原始 JSON 类型），不做任何字符串拼接。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Template(Value);

impl Template {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// 整个模板就是一个变量引用
    pub fn var(name: &str) -> Self {
        let mut object = Map::new();
        object.insert(VAR_KEY.to_string(), Value::String(name.to_string()));
        Self(Value::Object(object))
    }

    pub fn render(&self, vars: &CapturedVariables) -> Result<Value, CaptureError> {
        render_value(&self.0, vars)
    }

    /// 模板引用的全部变量名（按出现顺序，可能重复）
    pub fn variables(&self) -> Vec<&str> {
        let mut names = Vec::new();
        collect_variables(&self.0, &mut names);
        names
    }
}

impl From<Value> for Template {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match var_reference(&self.0) {
            Some(name) => write!(f, "{{{}}}", name),
            None => write!(f, "{}", self.0),
        }
    }
}

fn var_reference(value: &Value) -> Option<&str> {
    match value {
        Value::Object(map) if map.len() == 1 => map.get(VAR_KEY).and_then(Value::as_str),
        _ => None,
    }
}

fn render_value(value: &Value, vars: &CapturedVariables) -> Result<Value, CaptureError> {
    if let Some(name) = var_reference(value) {
        return vars.require(name).cloned();
    }

    match value {
        Value::Array(items) => items
            .iter()
            .map(|item| render_value(item, vars))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Value::Object(map) => {
            let mut rendered = Map::with_capacity(map.len());
            for (key, item) in map {
                rendered.insert(key.clone(), render_value(item, vars)?);
            }
            Ok(Value::Object(rendered))
        }
        other => Ok(other.clone()),
    }
}

fn collect_variables<'a>(value: &'a Value, names: &mut Vec<&'a str>) {
    if let Some(name) = var_reference(value) {
        names.push(name);
        return;
    }

    match value {
        Value::Array(items) => items.iter().for_each(|item| collect_variables(item, names)),
        Value::Object(map) => map.values().for_each(|item| collect_variables(item, names)),
        _ => {}
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid path template '{template}': {reason}")]
pub struct TemplateError {
    pub template: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum PathPart {
    Literal(String),
    Var(String),
}

/// 路径模板，例如 `/users/{user_id}`
///
/// 变量只能出现在路径段中，query 部分按字面量原样发送。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PathTemplate {
    raw: String,
    segments: Vec<Vec<PathPart>>,
    query: Option<String>,
}

/// 渲染后的路径：未编码的路径段 + 可选 query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPath {
    pub segments: Vec<String>,
    pub query: Option<String>,
}

impl fmt::Display for RenderedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.segments.join("/"))?;
        if let Some(query) = &self.query {
            write!(f, "?{}", query)?;
        }
        Ok(())
    }
}

impl PathTemplate {
    pub fn parse(template: &str) -> Result<Self, TemplateError> {
        let error = |reason: &str| TemplateError {
            template: template.to_string(),
            reason: reason.to_string(),
        };

        let (path, query) = match template.split_once('?') {
            Some((p, q)) => (p, Some(q.to_string())),
            None => (template, None),
        };
        if query.as_deref().is_some_and(|q| q.contains(['{', '}'])) {
            return Err(error("variables are not supported in the query string"));
        }

        let mut segments = Vec::new();
        for raw_segment in path.split('/').filter(|s| !s.is_empty()) {
            let mut parts = Vec::new();
            let mut rest = raw_segment;

            while let Some(open) = rest.find('{') {
                if open > 0 {
                    let literal = &rest[..open];
                    if literal.contains('}') {
                        return Err(error("unmatched '}'"));
                    }
                    parts.push(PathPart::Literal(literal.to_string()));
                }
                let after = &rest[open + 1..];
                let close = after.find('}').ok_or_else(|| error("unclosed '{'"))?;
                let name = &after[..close];
                if name.is_empty() || !is_identifier(name) {
                    return Err(error("variable names must be identifiers"));
                }
                parts.push(PathPart::Var(name.to_string()));
                rest = &after[close + 1..];
            }

            if !rest.is_empty() {
                if rest.contains('}') {
                    return Err(error("unmatched '}'"));
                }
                parts.push(PathPart::Literal(rest.to_string()));
            }
            segments.push(parts);
        }

        Ok(Self {
            raw: template.to_string(),
            segments,
            query,
        })
    }

    pub fn variables(&self) -> Vec<&str> {
        self.segments
            .iter()
            .flatten()
            .filter_map(|part| match part {
                PathPart::Var(name) => Some(name.as_str()),
                PathPart::Literal(_) => None,
            })
            .collect()
    }

    pub fn render(&self, vars: &CapturedVariables) -> Result<RenderedPath, CaptureError> {
        let mut segments = Vec::with_capacity(self.segments.len());
        for parts in &self.segments {
            let mut segment = String::new();
            for part in parts {
                match part {
                    PathPart::Literal(text) => segment.push_str(text),
                    PathPart::Var(name) => segment.push_str(&segment_text(vars.require(name)?)),
                }
            }
            segments.push(segment);
        }

        Ok(RenderedPath {
            segments,
            query: self.query.clone(),
        })
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn segment_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl TryFrom<String> for PathTemplate {
    type Error = TemplateError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PathTemplate> for String {
    fn from(template: PathTemplate) -> Self {
        template.raw
    }
}

impl fmt::Display for PathTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
