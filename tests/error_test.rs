use rucontract::scenario::ScenarioError;
use rucontract::{Result, RucontractError};

#[test]
fn test_parse_error() {
    let err = RucontractError::ParseError("test error".to_string());
    assert_eq!(err.to_string(), "解析错误: test error");
}

#[test]
fn test_invalid_url() {
    let err = RucontractError::InvalidUrl("not a url".to_string());
    assert_eq!(err.to_string(), "无效的 URL: not a url");
}

#[test]
fn test_config_error() {
    let err = RucontractError::ConfigError("unknown environment 'prod'".to_string());
    assert_eq!(err.to_string(), "配置错误: unknown environment 'prod'");
}

#[test]
fn test_scenario_error_conversion() {
    let err: RucontractError = ScenarioError::NoSteps("empty".to_string()).into();
    assert!(matches!(err, RucontractError::ScenarioError(_)));
    assert!(err.to_string().starts_with("场景定义错误: "));
}

#[test]
fn test_error_conversion_from_anyhow() {
    let anyhow_err = anyhow::anyhow!("test anyhow error");
    let err: RucontractError = anyhow_err.into();
    assert!(err.to_string().contains("test anyhow error"));
}

#[test]
fn test_result_type() {
    fn returns_error() -> Result<()> {
        Err(RucontractError::ParseError("test".to_string()))
    }

    match returns_error() {
        Err(RucontractError::ParseError(msg)) => assert_eq!(msg, "test"),
        _ => panic!("Expected ParseError"),
    }
}
