use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::time::Duration;

use crate::assertion::{AssertError, Assertion, JsonPath};
use crate::http::Method;
use crate::variable::{Capture, PathTemplate, Template, TemplateError};

/// 场景定义错误，在发送任何请求之前检查
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScenarioError {
    #[error("scenario name must not be empty")]
    EmptyName,

    #[error("scenario '{0}' has no steps")]
    NoSteps(String),

    #[error("scenario '{0}' is defined more than once")]
    DuplicateScenario(String),

    #[error("scenario '{scenario}', step {step}: variable '{variable}' is used before it is captured")]
    UndefinedVariable {
        scenario: String,
        step: StepId,
        variable: String,
    },

    #[error("scenario '{scenario}', step {step}: variable '{variable}' is captured more than once")]
    DuplicateCapture {
        scenario: String,
        step: StepId,
        variable: String,
    },

    #[error("scenario '{scenario}', step {step}: invalid expected status {status}")]
    InvalidStatus {
        scenario: String,
        step: StepId,
        status: u16,
    },

    #[error("no scenario matches filter(s): {0}")]
    NoMatch(String),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Path(#[from] AssertError),
}

/// 步骤标识：序号（从 1 开始）+ 名称
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepId {
    pub index: usize,
    pub name: String,
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {}", self.index, self.name)
    }
}

fn default_status() -> u16 {
    200
}

fn default_fatal() -> bool {
    true
}

fn is_true(value: &bool) -> bool {
    *value
}

/// 一次 HTTP 调用及其期望
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub name: String,

    pub method: Method,

    /// 相对于 base URL 的路径模板
    pub path: PathTemplate,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,

    /// JSON 请求体模板
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Template>,

    #[serde(default = "default_status")]
    pub expect_status: u16,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub assertions: Vec<Assertion>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub captures: Vec<Capture>,

    /// 断言失败时是否终止场景
    #[serde(default = "default_fatal", skip_serializing_if = "is_true")]
    pub fatal: bool,

    /// 覆盖全局请求超时
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl Step {
    pub fn new(name: &str, method: Method, path: &str) -> Result<Self, ScenarioError> {
        Ok(Self {
            name: name.to_string(),
            method,
            path: PathTemplate::parse(path)?,
            headers: BTreeMap::new(),
            body: None,
            expect_status: default_status(),
            assertions: Vec::new(),
            captures: Vec::new(),
            fatal: true,
            timeout_ms: None,
        })
    }

    pub fn get(name: &str, path: &str) -> Result<Self, ScenarioError> {
        Self::new(name, Method::Get, path)
    }

    pub fn post(name: &str, path: &str) -> Result<Self, ScenarioError> {
        Self::new(name, Method::Post, path)
    }

    pub fn put(name: &str, path: &str) -> Result<Self, ScenarioError> {
        Self::new(name, Method::Put, path)
    }

    pub fn delete(name: &str, path: &str) -> Result<Self, ScenarioError> {
        Self::new(name, Method::Delete, path)
    }

    pub fn header(mut self, key: &str, value: &str) -> Self {
        self.headers.insert(key.to_string(), value.to_string());
        self
    }

    pub fn json_body(mut self, body: impl Into<Template>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn expect_status(mut self, status: u16) -> Self {
        self.expect_status = status;
        self
    }

    /// 期望 JSON 响应：发送 Accept 头并校验 Content-Type
    pub fn expect_json(self) -> Self {
        self.header("Accept", "application/json")
            .assert(Assertion::content_type_is("application/json"))
    }

    pub fn assert(mut self, assertion: Assertion) -> Self {
        self.assertions.push(assertion);
        self
    }

    pub fn capture(mut self, capture: Capture) -> Self {
        self.captures.push(capture);
        self
    }

    /// 从 JSON Body 字段捕获变量
    pub fn capture_field(self, name: &str, path: &str) -> Result<Self, ScenarioError> {
        let path = JsonPath::parse(path)?;
        Ok(self.capture(Capture::from_body(name, path)))
    }

    pub fn non_fatal(mut self) -> Self {
        self.fatal = false;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    pub fn timeout_duration(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    /// 步骤引用的全部变量：路径、请求体、断言期望值
    pub fn variables(&self) -> Vec<&str> {
        let mut names = self.path.variables();
        if let Some(body) = &self.body {
            names.extend(body.variables());
        }
        for assertion in &self.assertions {
            names.extend(assertion.variables());
        }
        names
    }
}

/// 命名的、有序的步骤序列
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,

    /// 期望的最终结果（展示用）
    #[serde(default)]
    pub description: String,

    /// 依赖全局服务端状态（如列表数量），并行模式下单独串行执行
    #[serde(default)]
    pub exclusive: bool,

    pub steps: Vec<Step>,
}

impl Scenario {
    pub fn new(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            exclusive: false,
            steps: Vec::new(),
        }
    }

    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    pub fn exclusive(mut self) -> Self {
        self.exclusive = true;
        self
    }

    pub fn step_id(&self, index: usize) -> StepId {
        StepId {
            index: index + 1,
            name: self
                .steps
                .get(index)
                .map(|s| s.name.clone())
                .unwrap_or_default(),
        }
    }

    /// 校验定义：每个变量只能在捕获它的步骤之后使用，且只能捕获一次
    pub fn validate(&self) -> Result<(), ScenarioError> {
        if self.name.trim().is_empty() {
            return Err(ScenarioError::EmptyName);
        }
        if self.steps.is_empty() {
            return Err(ScenarioError::NoSteps(self.name.clone()));
        }

        let mut defined: HashSet<&str> = HashSet::new();
        for (index, step) in self.steps.iter().enumerate() {
            if !(100..600).contains(&step.expect_status) {
                return Err(ScenarioError::InvalidStatus {
                    scenario: self.name.clone(),
                    step: self.step_id(index),
                    status: step.expect_status,
                });
            }

            if let Some(variable) = step.variables().into_iter().find(|v| !defined.contains(v)) {
                return Err(ScenarioError::UndefinedVariable {
                    scenario: self.name.clone(),
                    step: self.step_id(index),
                    variable: variable.to_string(),
                });
            }

            for capture in &step.captures {
                if !defined.insert(capture.name.as_str()) {
                    return Err(ScenarioError::DuplicateCapture {
                        scenario: self.name.clone(),
                        step: self.step_id(index),
                        variable: capture.name.clone(),
                    });
                }
            }
        }

        Ok(())
    }
}

/// 校验一组场景：逐个校验定义，并要求名称唯一
pub fn validate_all(scenarios: &[Scenario]) -> Result<(), ScenarioError> {
    let mut names = HashSet::new();
    for scenario in scenarios {
        scenario.validate()?;
        if !names.insert(scenario.name.as_str()) {
            return Err(ScenarioError::DuplicateScenario(scenario.name.clone()));
        }
    }
    Ok(())
}

/// 按名称过滤场景（不区分大小写的子串匹配，任一过滤器命中即保留）
///
/// 过滤器为空时保留全部；有过滤器但没有任何匹配时返回错误。
pub fn select(scenarios: Vec<Scenario>, filters: &[String]) -> Result<Vec<Scenario>, ScenarioError> {
    if filters.is_empty() {
        return Ok(scenarios);
    }

    let needles: Vec<String> = filters.iter().map(|f| f.to_lowercase()).collect();
    let selected: Vec<Scenario> = scenarios
        .into_iter()
        .filter(|s| {
            let name = s.name.to_lowercase();
            needles.iter().any(|needle| name.contains(needle.as_str()))
        })
        .collect();

    if selected.is_empty() {
        return Err(ScenarioError::NoMatch(filters.join(", ")));
    }
    Ok(selected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn create_step() -> Step {
        Step::post("create", "/users")
            .unwrap()
            .json_body(json!({"name": "Jane", "email": "jane@example.com"}))
            .expect_status(201)
            .capture_field("user_id", "id")
            .unwrap()
    }

    #[test]
    fn test_valid_capture_chain() {
        let scenario = Scenario::new("fetch", "user is readable")
            .step(create_step())
            .step(
                Step::get("fetch", "/users/{user_id}")
                    .unwrap()
                    .assert(Assertion::equals("id", Template::var("user_id")).unwrap()),
            );
        assert!(scenario.validate().is_ok());
    }

    #[test]
    fn test_variable_used_before_capture() {
        let scenario = Scenario::new("broken", "")
            .step(Step::get("fetch", "/users/{user_id}").unwrap())
            .step(create_step());

        let err = scenario.validate().unwrap_err();
        assert_eq!(
            err,
            ScenarioError::UndefinedVariable {
                scenario: "broken".to_string(),
                step: StepId {
                    index: 1,
                    name: "fetch".to_string()
                },
                variable: "user_id".to_string(),
            }
        );
    }

    #[test]
    fn test_step_cannot_use_its_own_capture() {
        let scenario = Scenario::new("self", "").step(
            create_step().assert(Assertion::equals("id", Template::var("user_id")).unwrap()),
        );
        assert!(matches!(
            scenario.validate(),
            Err(ScenarioError::UndefinedVariable { .. })
        ));
    }

    #[test]
    fn test_body_variable_is_checked() {
        let scenario = Scenario::new("body", "").step(
            Step::post("create", "/users")
                .unwrap()
                .json_body(json!({"owner": {"$var": "owner_id"}})),
        );
        assert!(matches!(
            scenario.validate(),
            Err(ScenarioError::UndefinedVariable { variable, .. }) if variable == "owner_id"
        ));
    }

    #[test]
    fn test_invalid_capture_path_is_an_error() {
        let err = Step::get("fetch", "/users")
            .unwrap()
            .capture_field("user_id", "$.")
            .unwrap_err();
        assert_eq!(
            err,
            ScenarioError::Path(AssertError::InvalidPath("$.".to_string()))
        );
    }

    #[test]
    fn test_duplicate_capture() {
        let scenario = Scenario::new("dup", "")
            .step(create_step())
            .step(create_step());
        assert!(matches!(
            scenario.validate(),
            Err(ScenarioError::DuplicateCapture { .. })
        ));
    }

    #[test]
    fn test_empty_and_invalid_scenarios() {
        assert_eq!(
            Scenario::new("", "").validate(),
            Err(ScenarioError::EmptyName)
        );
        assert_eq!(
            Scenario::new("empty", "").validate(),
            Err(ScenarioError::NoSteps("empty".to_string()))
        );

        let scenario = Scenario::new("status", "")
            .step(Step::get("health", "/health").unwrap().expect_status(42));
        assert!(matches!(
            scenario.validate(),
            Err(ScenarioError::InvalidStatus { status: 42, .. })
        ));
    }

    #[test]
    fn test_validate_all_rejects_duplicate_names() {
        let scenario = Scenario::new("health", "").step(Step::get("health", "/health").unwrap());
        let err = validate_all(&[scenario.clone(), scenario]).unwrap_err();
        assert_eq!(err, ScenarioError::DuplicateScenario("health".to_string()));
    }

    #[test]
    fn test_select_by_filter() {
        let scenarios = vec![
            Scenario::new("health-check", "").step(Step::get("h", "/health").unwrap()),
            Scenario::new("list-users", "").step(Step::get("l", "/users").unwrap()),
            Scenario::new("create-user", "").step(Step::post("c", "/users").unwrap()),
        ];

        let selected = select(scenarios.clone(), &["USER".to_string()]).unwrap();
        assert_eq!(selected.len(), 2);

        let selected = select(scenarios.clone(), &[]).unwrap();
        assert_eq!(selected.len(), 3);

        let err = select(scenarios, &["nothing".to_string()]).unwrap_err();
        assert_eq!(err, ScenarioError::NoMatch("nothing".to_string()));
    }

    #[test]
    fn test_expect_json_adds_header_and_assertion() {
        let step = Step::get("list", "/users").unwrap().expect_json();
        assert_eq!(step.headers.get("Accept").map(String::as_str), Some("application/json"));
        assert_eq!(
            step.assertions,
            vec![Assertion::content_type_is("application/json")]
        );
    }
}
