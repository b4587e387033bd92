use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::debug;

use crate::scenario::types::{Scenario, validate_all};
use crate::{Result, RucontractError};

/// 场景文件的顶层结构
#[derive(Debug, Deserialize)]
struct ScenarioFile {
    #[serde(default)]
    scenarios: Vec<Scenario>,
}

/// TOML 场景文件加载器
pub struct ScenarioLoader;

impl ScenarioLoader {
    /// 从 TOML 字符串解析并校验场景
    pub fn parse_str(content: &str) -> Result<Vec<Scenario>> {
        let file: ScenarioFile = toml::from_str(content)?;
        validate_all(&file.scenarios)?;
        Ok(file.scenarios)
    }

    /// 从文件加载场景
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Vec<Scenario>> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            RucontractError::ConfigError(format!(
                "failed to read scenario file {}: {}",
                path.display(),
                e
            ))
        })?;

        let scenarios = Self::parse_str(&content).map_err(|e| {
            RucontractError::ConfigError(format!("{}: {}", path.display(), e))
        })?;
        debug!(path = %path.display(), count = scenarios.len(), "loaded scenario file");
        Ok(scenarios)
    }

    /// 依次加载多个文件，保持文件内与文件间的顺序
    pub fn load_all<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<Scenario>> {
        let mut scenarios = Vec::new();
        for path in paths {
            scenarios.extend(Self::load_from_path(path)?);
        }
        Ok(scenarios)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assertion::Assertion;
    use crate::http::Method;
    use crate::scenario::ScenarioError;
    use crate::variable::Template;
    use serde_json::json;

    const SAMPLE: &str = r#"
[[scenarios]]
name = "create-and-fetch"
description = "fetched user matches"

[[scenarios.steps]]
name = "create"
method = "POST"
path = "/users"
expect_status = 201
body = { name = "Jane", email = "jane@example.com", age = 25 }
captures = [{ name = "user_id", body = "id" }]

[[scenarios.steps]]
name = "fetch"
method = "GET"
path = "/users/{user_id}"
headers = { Accept = "application/json" }
assertions = [
    { type = "equals", path = "id", value = { "$var" = "user_id" } },
    { type = "equals", path = "name", value = "Jane" },
]
"#;

    #[test]
    fn test_parse_scenario_file() {
        let scenarios = ScenarioLoader::parse_str(SAMPLE).unwrap();
        assert_eq!(scenarios.len(), 1);

        let scenario = &scenarios[0];
        assert_eq!(scenario.name, "create-and-fetch");
        assert!(!scenario.exclusive);
        assert_eq!(scenario.steps.len(), 2);

        let create = &scenario.steps[0];
        assert_eq!(create.method, Method::Post);
        assert_eq!(create.expect_status, 201);
        assert!(create.fatal);
        assert_eq!(
            create.body,
            Some(Template::new(
                json!({"name": "Jane", "email": "jane@example.com", "age": 25})
            ))
        );

        let fetch = &scenario.steps[1];
        assert_eq!(fetch.expect_status, 200);
        assert_eq!(fetch.path.to_string(), "/users/{user_id}");
        assert_eq!(
            fetch.assertions[1],
            Assertion::equals("name", json!("Jane")).unwrap()
        );
    }

    #[test]
    fn test_parse_rejects_out_of_order_variable() {
        let content = r#"
[[scenarios]]
name = "broken"

[[scenarios.steps]]
name = "fetch"
method = "GET"
path = "/users/{user_id}"
"#;
        let err = ScenarioLoader::parse_str(content).unwrap_err();
        assert!(matches!(
            err,
            RucontractError::ScenarioError(ScenarioError::UndefinedVariable { .. })
        ));
    }

    #[test]
    fn test_parse_rejects_bad_path_template() {
        let content = r#"
[[scenarios]]
name = "broken"

[[scenarios.steps]]
name = "fetch"
method = "GET"
path = "/users/{user_id"
"#;
        assert!(matches!(
            ScenarioLoader::parse_str(content),
            Err(RucontractError::TomlError(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        let err = ScenarioLoader::load_from_path("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, RucontractError::ConfigError(_)));
    }
}
