use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use crate::assertion::AssertionResult;
use crate::http::{NetworkErrorKind, Response};
use crate::scenario::{Scenario, Step, StepId};

fn serialize_millis<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(duration.as_millis() as u64)
}

/// 步骤失败的分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureKind {
    /// 连接失败、超时等，场景立即终止
    Network(NetworkErrorKind),
    StatusMismatch,
    ContentTypeMismatch,
    FieldMismatch,
    /// 捕获失败或引用了未定义变量，场景立即终止
    CaptureFailure,
}

impl FailureKind {
    /// 无论步骤是否标记为 non-fatal 都会终止场景
    pub fn always_fatal(&self) -> bool {
        matches!(self, FailureKind::Network(_) | FailureKind::CaptureFailure)
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Network(kind) => write!(f, "network/{}", kind),
            FailureKind::StatusMismatch => write!(f, "status-mismatch"),
            FailureKind::ContentTypeMismatch => write!(f, "content-type-mismatch"),
            FailureKind::FieldMismatch => write!(f, "field-mismatch"),
            FailureKind::CaptureFailure => write!(f, "capture-failure"),
        }
    }
}

/// 单条失败诊断
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Failure {
    pub step: StepId,
    pub kind: FailureKind,
    pub expected: String,
    pub actual: String,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepOutcome {
    Passed,
    Failed,
    Skipped,
}

/// 单个步骤的执行结果
#[derive(Debug, Clone, Serialize)]
pub struct StepResult {
    pub id: StepId,

    pub method: String,

    /// 渲染后的完整 URL；渲染失败或跳过时为路径模板
    pub url: String,

    /// 响应状态码（收到响应时）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,

    #[serde(rename = "duration_ms", serialize_with = "serialize_millis")]
    pub duration: Duration,

    pub outcome: StepOutcome,

    /// 断言结果列表
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub assertions: Vec<AssertionResult>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<Failure>,

    /// 本步骤捕获的变量
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub captured: BTreeMap<String, Value>,

    /// 完整的 HTTP 响应（用于详细输出）
    #[serde(skip)]
    pub response: Option<Response>,
}

impl StepResult {
    pub fn new(id: StepId, step: &Step, url: String) -> Self {
        Self {
            id,
            method: step.method.to_string(),
            url,
            status: None,
            duration: Duration::ZERO,
            outcome: StepOutcome::Passed,
            assertions: Vec::new(),
            failures: Vec::new(),
            captured: BTreeMap::new(),
            response: None,
        }
    }

    pub fn skipped(id: StepId, step: &Step) -> Self {
        Self {
            outcome: StepOutcome::Skipped,
            ..Self::new(id, step, step.path.to_string())
        }
    }

    pub fn fail(&mut self, kind: FailureKind, expected: String, actual: String, message: String) {
        self.failures.push(Failure {
            step: self.id.clone(),
            kind,
            expected,
            actual,
            message,
        });
        self.outcome = StepOutcome::Failed;
    }

    pub fn passed(&self) -> bool {
        self.outcome == StepOutcome::Passed
    }

    /// 是否终止后续步骤
    pub fn halts_scenario(&self, fatal: bool) -> bool {
        self.failures
            .iter()
            .any(|f| fatal || f.kind.always_fatal())
    }
}

/// 单个场景的执行结果
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioResult {
    pub name: String,

    pub description: String,

    pub passed: bool,

    pub steps: Vec<StepResult>,

    /// 执行器层面的错误（例如任务崩溃），与步骤失败分开记录
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(rename = "duration_ms", serialize_with = "serialize_millis")]
    pub duration: Duration,
}

impl ScenarioResult {
    pub fn new(scenario: &Scenario, steps: Vec<StepResult>, duration: Duration) -> Self {
        let passed = steps.iter().all(|s| s.outcome != StepOutcome::Failed);
        Self {
            name: scenario.name.clone(),
            description: scenario.description.clone(),
            passed,
            steps,
            error: None,
            duration,
        }
    }

    pub fn aborted(scenario: &Scenario, error: String) -> Self {
        Self {
            name: scenario.name.clone(),
            description: scenario.description.clone(),
            passed: false,
            steps: Vec::new(),
            error: Some(error),
            duration: Duration::ZERO,
        }
    }

    pub fn failures(&self) -> impl Iterator<Item = &Failure> {
        self.steps.iter().flat_map(|s| &s.failures)
    }
}

/// 测试摘要
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SuiteSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub steps_total: usize,
    pub steps_failed: usize,
    pub steps_skipped: usize,
    pub total_assertions: usize,
    pub passed_assertions: usize,
    pub failed_assertions: usize,
    #[serde(rename = "duration_ms", serialize_with = "serialize_millis")]
    pub total_duration: Duration,
}

impl SuiteSummary {
    pub fn from_results(results: &[ScenarioResult], total_duration: Duration) -> Self {
        let passed = results.iter().filter(|r| r.passed).count();
        let steps = || results.iter().flat_map(|r| &r.steps);
        let assertions = || steps().flat_map(|s| &s.assertions);

        Self {
            total: results.len(),
            passed,
            failed: results.len() - passed,
            steps_total: steps().count(),
            steps_failed: steps()
                .filter(|s| s.outcome == StepOutcome::Failed)
                .count(),
            steps_skipped: steps()
                .filter(|s| s.outcome == StepOutcome::Skipped)
                .count(),
            total_assertions: assertions().count(),
            passed_assertions: assertions().filter(|a| a.passed).count(),
            failed_assertions: assertions().filter(|a| !a.passed).count(),
            total_duration,
        }
    }
}

/// 整个套件的执行结果
#[derive(Debug, Clone, Serialize)]
pub struct SuiteResult {
    pub base_url: String,
    pub started_at: DateTime<Utc>,
    pub summary: SuiteSummary,
    pub scenarios: Vec<ScenarioResult>,
}

impl SuiteResult {
    pub fn new(
        base_url: String,
        started_at: DateTime<Utc>,
        scenarios: Vec<ScenarioResult>,
        total_duration: Duration,
    ) -> Self {
        Self {
            base_url,
            started_at,
            summary: SuiteSummary::from_results(&scenarios, total_duration),
            scenarios,
        }
    }

    pub fn success(&self) -> bool {
        self.summary.failed == 0
    }

    pub fn scenario(&self, name: &str) -> Option<&ScenarioResult> {
        self.scenarios.iter().find(|s| s.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step() -> Step {
        Step::get("health", "/health").unwrap()
    }

    fn step_id(index: usize) -> StepId {
        StepId {
            index,
            name: "health".to_string(),
        }
    }

    #[test]
    fn test_fail_marks_step_failed() {
        let mut result = StepResult::new(step_id(1), &step(), "http://x/health".to_string());
        assert!(result.passed());

        result.fail(
            FailureKind::StatusMismatch,
            "200".to_string(),
            "500".to_string(),
            "unexpected status".to_string(),
        );
        assert!(!result.passed());
        assert_eq!(result.failures[0].step, step_id(1));
        assert!(result.halts_scenario(true));
        assert!(!result.halts_scenario(false));
    }

    #[test]
    fn test_network_failure_always_halts() {
        let mut result = StepResult::new(step_id(1), &step(), "http://x/health".to_string());
        result.fail(
            FailureKind::Network(NetworkErrorKind::Timeout),
            "response".to_string(),
            "timeout".to_string(),
            "timed out".to_string(),
        );
        assert!(result.halts_scenario(false));
    }

    #[test]
    fn test_failure_kind_display() {
        assert_eq!(
            FailureKind::Network(NetworkErrorKind::Connect).to_string(),
            "network/connect"
        );
        assert_eq!(FailureKind::FieldMismatch.to_string(), "field-mismatch");
    }

    #[test]
    fn test_summary_counts() {
        let scenario = Scenario::new("health", "").step(step());

        let passed = ScenarioResult::new(
            &scenario,
            vec![StepResult::new(step_id(1), &step(), String::new())],
            Duration::from_millis(100),
        );

        let mut failing = StepResult::new(step_id(1), &step(), String::new());
        failing.fail(
            FailureKind::StatusMismatch,
            "200".to_string(),
            "503".to_string(),
            String::new(),
        );
        let failed = ScenarioResult::new(
            &scenario,
            vec![failing, StepResult::skipped(step_id(2), &step())],
            Duration::from_millis(200),
        );

        let summary = SuiteSummary::from_results(&[passed, failed], Duration::from_millis(300));
        assert_eq!(summary.total, 2);
        assert_eq!(summary.passed, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.steps_total, 3);
        assert_eq!(summary.steps_failed, 1);
        assert_eq!(summary.steps_skipped, 1);
        assert_eq!(summary.total_duration, Duration::from_millis(300));
    }
}
