use serde_json::Value;

use crate::assertion::extractor::{ResponseContext, describe, preview, size_of};
use crate::assertion::types::{AssertError, Assertion, AssertionResult};
use crate::http::response::media_type_of;
use crate::variable::CapturedVariables;

/// 执行断言求值
pub fn evaluate_assertion(
    assertion: &Assertion,
    ctx: &ResponseContext<'_>,
    vars: &CapturedVariables,
) -> AssertionResult {
    let raw = assertion.to_string();

    match assertion {
        Assertion::Equals { path, value } => {
            let expected = match value.render(vars) {
                Ok(v) => v,
                Err(e) => return AssertionResult::error(raw, value.to_string(), e.into()),
            };
            let expected_str = describe(&expected);

            match ctx.resolve(path) {
                Ok(actual) if json_equals(actual, &expected) => {
                    AssertionResult::success(raw, expected_str, describe(actual))
                }
                Ok(actual) => {
                    let actual_str = describe(actual);
                    let message = format!(
                        "Expected {} to be {}, but got {}",
                        path, expected_str, actual_str
                    );
                    AssertionResult::failure(raw, expected_str, actual_str, message)
                }
                Err(e) => AssertionResult::error(raw, expected_str, e),
            }
        }

        Assertion::NotNull { path } => {
            let expected = "not null".to_string();
            match ctx.resolve(path) {
                Ok(Value::Null) => AssertionResult::failure(
                    raw,
                    expected,
                    "null".to_string(),
                    format!("Expected {} to be non-null, but it was null", path),
                ),
                Ok(actual) => AssertionResult::success(raw, expected, describe(actual)),
                Err(AssertError::PathNotFound(_)) => AssertionResult::failure(
                    raw,
                    expected,
                    "missing".to_string(),
                    format!("Expected {} to exist, but it was not found", path),
                ),
                Err(e) => AssertionResult::error(raw, expected, e),
            }
        }

        Assertion::IsInteger { path } => {
            let expected = "integer".to_string();
            match ctx.resolve(path) {
                Ok(actual) if actual.is_i64() || actual.is_u64() => {
                    AssertionResult::success(raw, expected, describe(actual))
                }
                Ok(actual) => {
                    let message = format!(
                        "Expected {} to be an integer, but got {} {}",
                        path,
                        super::types::type_name(actual),
                        describe(actual)
                    );
                    AssertionResult::failure(raw, expected, describe(actual), message)
                }
                Err(e) => AssertionResult::error(raw, expected, e),
            }
        }

        Assertion::SizeAtLeast { path, min } => {
            let expected = format!("size >= {}", min);
            match ctx.resolve(path).and_then(size_of) {
                Ok(size) if size >= *min => {
                    AssertionResult::success(raw, expected, format!("size {}", size))
                }
                Ok(size) => AssertionResult::failure(
                    raw,
                    expected,
                    format!("size {}", size),
                    format!("Expected {} to have at least {} elements, got {}", path, min, size),
                ),
                Err(e) => AssertionResult::error(raw, expected, e),
            }
        }

        Assertion::SizeEquals { path, value } => {
            let expected_size = match value.render(vars) {
                Ok(rendered) => match rendered.as_u64() {
                    Some(n) => n as usize,
                    None => {
                        let error = AssertError::TypeMismatch {
                            expected: "non-negative integer",
                            actual: super::types::type_name(&rendered),
                        };
                        return AssertionResult::error(raw, describe(&rendered), error);
                    }
                },
                Err(e) => return AssertionResult::error(raw, value.to_string(), e.into()),
            };
            let expected = format!("size {}", expected_size);

            match ctx.resolve(path).and_then(size_of) {
                Ok(size) if size == expected_size => {
                    AssertionResult::success(raw, expected, format!("size {}", size))
                }
                Ok(size) => AssertionResult::failure(
                    raw,
                    expected,
                    format!("size {}", size),
                    format!(
                        "Expected {} to have {} elements, got {}",
                        path, expected_size, size
                    ),
                ),
                Err(e) => AssertionResult::error(raw, expected, e),
            }
        }

        Assertion::ContentTypeIs { content_type } => {
            let expected = media_type_of(content_type);
            match ctx.response().media_type() {
                Some(actual) if actual == expected => AssertionResult::success(
                    raw,
                    expected,
                    ctx.response().content_type().unwrap_or_default().to_string(),
                ),
                Some(_) => {
                    let actual = ctx.response().content_type().unwrap_or_default().to_string();
                    let message = format!(
                        "Expected content type {}, but got {}",
                        expected, actual
                    );
                    AssertionResult::failure(raw, expected, actual, message)
                }
                None => {
                    let message = format!(
                        "Expected content type {}, but the response has no Content-Type header",
                        expected
                    );
                    AssertionResult::failure(raw, expected, "<none>".to_string(), message)
                }
            }
        }

        Assertion::BodyContains { text } => {
            let body = &ctx.response().body;
            let expected = format!("contains {:?}", text);
            if body.contains(text.as_str()) {
                AssertionResult::success(raw, expected, preview(body))
            } else {
                let message = format!("Expected body to contain {:?}", text);
                AssertionResult::failure(raw, expected, preview(body), message)
            }
        }
    }
}

/// JSON 相等，整数与浮点数按数值比较（`30` 等于 `30.0`）
pub fn json_equals(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            if x.is_f64() || y.is_f64() {
                x.as_f64() == y.as_f64()
            } else {
                x == y
            }
        }
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| json_equals(x, y))
        }
        (Value::Object(xs), Value::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(key, x)| ys.get(key).is_some_and(|y| json_equals(x, y)))
        }
        _ => a == b,
    }
}
