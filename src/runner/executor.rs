use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::assertion::{Assertion, ResponseContext, evaluate_assertion, preview};
use crate::http::{BaseUrl, Client, Request};
use crate::runner::types::{FailureKind, ScenarioResult, StepResult, SuiteResult};
use crate::scenario::{Scenario, Step, StepId};
use crate::variable::{CaptureError, CapturedVariables};

/// 契约场景执行器
#[derive(Clone)]
pub struct ContractRunner {
    client: Client,
    default_headers: BTreeMap<String, String>,
}

impl ContractRunner {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            default_headers: BTreeMap::new(),
        }
    }

    /// 每个请求都会附带的 Header，步骤自身的同名 Header 优先
    pub fn with_default_headers(mut self, headers: BTreeMap<String, String>) -> Self {
        self.default_headers = headers;
        self
    }

    /// 按顺序执行场景中的每个步骤
    ///
    /// 失败的 fatal 步骤之后的步骤全部标记为跳过；网络错误和捕获失败总是终止场景。
    pub async fn run_scenario(&self, scenario: &Scenario, base_url: &BaseUrl) -> ScenarioResult {
        info!(scenario = %scenario.name, steps = scenario.steps.len(), "running scenario");
        let start = Instant::now();

        // 变量只在本次运行内有效
        let mut vars = CapturedVariables::new();
        let mut results = Vec::with_capacity(scenario.steps.len());
        let mut halted = false;

        for (index, step) in scenario.steps.iter().enumerate() {
            let id = scenario.step_id(index);

            if halted {
                debug!(scenario = %scenario.name, step = %id, "skipping step");
                results.push(StepResult::skipped(id, step));
                continue;
            }

            let result = self.run_step(id, step, base_url, &mut vars).await;
            for failure in &result.failures {
                warn!(
                    scenario = %scenario.name,
                    step = %failure.step,
                    kind = %failure.kind,
                    "{}",
                    failure.message
                );
            }
            halted = result.halts_scenario(step.fatal);
            results.push(result);
        }

        let result = ScenarioResult::new(scenario, results, start.elapsed());
        info!(scenario = %scenario.name, passed = result.passed, "scenario finished");
        result
    }

    async fn run_step(
        &self,
        id: StepId,
        step: &Step,
        base_url: &BaseUrl,
        vars: &mut CapturedVariables,
    ) -> StepResult {
        let path = match step.path.render(vars) {
            Ok(path) => path,
            Err(e) => {
                let mut result = StepResult::new(id, step, step.path.to_string());
                capture_failure(&mut result, e);
                return result;
            }
        };
        let url = base_url.join_segments(&path.segments, path.query.as_deref());
        let mut result = StepResult::new(id, step, url.to_string());

        let body = match step.body.as_ref().map(|b| b.render(vars)).transpose() {
            Ok(body) => body,
            Err(e) => {
                capture_failure(&mut result, e);
                return result;
            }
        };

        let request = match self.build_request(step, url, body) {
            Ok(request) => request,
            Err(e) => {
                result.fail(
                    FailureKind::Network(crate::http::NetworkErrorKind::Request),
                    "a valid request".to_string(),
                    e.to_string(),
                    format!("Failed to build request: {}", e),
                );
                return result;
            }
        };

        let start = Instant::now();
        let response = match self.client.execute(request).await {
            Ok(response) => response,
            Err(e) => {
                result.duration = start.elapsed();
                result.fail(
                    FailureKind::Network(e.kind),
                    format!("HTTP {}", step.expect_status),
                    e.kind.to_string(),
                    format!("Request failed: {}", e),
                );
                return result;
            }
        };
        result.duration = response.duration;
        result.status = Some(response.status.code());

        if response.status.code() != step.expect_status {
            // 状态码不符时不再评估字段断言和捕获，避免错误响应体带来的连锁噪音
            result.fail(
                FailureKind::StatusMismatch,
                step.expect_status.to_string(),
                response.status.to_string(),
                format!(
                    "Expected status {}, but got {} (body: {})",
                    step.expect_status,
                    response.status,
                    preview(&response.body)
                ),
            );
            result.response = Some(response);
            return result;
        }

        let ctx = ResponseContext::new(&response);
        for assertion in &step.assertions {
            let outcome = evaluate_assertion(assertion, &ctx, vars);
            if !outcome.passed {
                let kind = match assertion {
                    Assertion::ContentTypeIs { .. } => FailureKind::ContentTypeMismatch,
                    _ => FailureKind::FieldMismatch,
                };
                result.fail(
                    kind,
                    outcome.expected.clone(),
                    outcome.actual.clone().unwrap_or_else(|| "-".to_string()),
                    outcome
                        .message
                        .clone()
                        .unwrap_or_else(|| outcome.description.clone()),
                );
            }
            result.assertions.push(outcome);
        }

        for capture in &step.captures {
            let captured = capture
                .extract(&ctx)
                .and_then(|value| vars.insert(capture.name.clone(), value.clone()).map(|_| value));
            match captured {
                Ok(value) => {
                    debug!(variable = %capture.name, value = %value, "captured variable");
                    result.captured.insert(capture.name.clone(), value);
                }
                Err(e) => {
                    capture_failure(&mut result, e);
                    break;
                }
            }
        }

        drop(ctx);
        result.response = Some(response);
        result
    }

    fn build_request(
        &self,
        step: &Step,
        url: url::Url,
        body: Option<serde_json::Value>,
    ) -> crate::Result<Request> {
        let mut request = Request::new(step.method, url)
            .with_headers(&self.default_headers)?
            .with_headers(&step.headers)?
            .with_timeout(step.timeout_duration());
        if let Some(body) = body {
            request = request.with_json(body)?;
        }
        Ok(request)
    }

    /// 依次执行全部场景，单个场景失败不影响其余场景
    pub async fn run_suite(&self, scenarios: &[Scenario], base_url: &BaseUrl) -> SuiteResult {
        let started_at = Utc::now();
        let start = Instant::now();

        let mut results = Vec::with_capacity(scenarios.len());
        for scenario in scenarios {
            results.push(self.run_scenario(scenario, base_url).await);
        }

        SuiteResult::new(base_url.to_string(), started_at, results, start.elapsed())
    }

    /// 并行执行互不依赖的场景，`exclusive` 场景在其后逐个执行
    ///
    /// 结果顺序与定义顺序一致。
    pub async fn run_suite_parallel(
        &self,
        scenarios: &[Scenario],
        base_url: &BaseUrl,
        concurrency: usize,
    ) -> SuiteResult {
        let started_at = Utc::now();
        let start = Instant::now();

        let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
        let mut tasks = JoinSet::new();
        let mut task_index = HashMap::new();

        for (index, scenario) in scenarios.iter().enumerate().filter(|(_, s)| !s.exclusive) {
            let runner = self.clone();
            let scenario = scenario.clone();
            let base_url = base_url.clone();
            let semaphore = Arc::clone(&semaphore);

            let handle = tasks.spawn(async move {
                // semaphore 不会被关闭
                let _permit = semaphore.acquire_owned().await.ok();
                runner.run_scenario(&scenario, &base_url).await
            });
            task_index.insert(handle.id(), index);
        }

        let mut results: Vec<Option<ScenarioResult>> = vec![None; scenarios.len()];
        while let Some(joined) = tasks.join_next_with_id().await {
            match joined {
                Ok((id, result)) => {
                    if let Some(&index) = task_index.get(&id) {
                        results[index] = Some(result);
                    }
                }
                Err(e) => {
                    if let Some(&index) = task_index.get(&e.id()) {
                        warn!(scenario = %scenarios[index].name, "scenario task failed: {}", e);
                        results[index] =
                            Some(ScenarioResult::aborted(&scenarios[index], e.to_string()));
                    }
                }
            }
        }

        for (index, scenario) in scenarios.iter().enumerate().filter(|(_, s)| s.exclusive) {
            results[index] = Some(self.run_scenario(scenario, base_url).await);
        }

        let results = results
            .into_iter()
            .zip(scenarios)
            .map(|(result, scenario)| {
                result.unwrap_or_else(|| {
                    ScenarioResult::aborted(scenario, "scenario was not executed".to_string())
                })
            })
            .collect();

        SuiteResult::new(base_url.to_string(), started_at, results, start.elapsed())
    }
}

fn capture_failure(result: &mut StepResult, error: CaptureError) {
    let expected = match &error {
        CaptureError::Undefined(name) => format!("variable '{}' to be captured", name),
        CaptureError::AlreadyCaptured(name) => format!("variable '{}' to be unset", name),
        CaptureError::PathNotFound { path, .. } => format!("field {}", path),
        CaptureError::HeaderNotFound { header, .. } => format!("header {}", header),
        CaptureError::UnsupportedType { expected, .. } => expected.to_string(),
        CaptureError::InvalidBody { .. } => "a JSON body".to_string(),
    };
    let actual = match &error {
        CaptureError::UnsupportedType { actual, .. } => actual.to_string(),
        CaptureError::AlreadyCaptured(_) => "already captured".to_string(),
        CaptureError::InvalidBody { .. } => "invalid JSON".to_string(),
        _ => "missing".to_string(),
    };
    result.fail(FailureKind::CaptureFailure, expected, actual, error.to_string());
}
