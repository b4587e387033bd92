/// 断言模块 - 对 JSON 响应树和响应头求值
mod evaluator;
mod extractor;
mod types;

pub use evaluator::{evaluate_assertion, json_equals};
pub use extractor::{ResponseContext, describe, preview, size_of};
pub use types::{AssertError, Assertion, AssertionResult, JsonPath, type_name};
