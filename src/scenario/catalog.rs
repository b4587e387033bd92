//! 内置的 User API 契约场景

use serde_json::json;

use crate::assertion::{Assertion, JsonPath};
use crate::scenario::types::{Scenario, ScenarioError, Step};
use crate::variable::{Capture, Template};

const USER_ID: &str = "user_id";
const USER_COUNT: &str = "user_count";

/// 不会被分配的用户 ID
pub const MISSING_USER_ID: u64 = 999;

/// User API 生命周期的全部场景，按推荐执行顺序排列
pub fn user_api() -> Result<Vec<Scenario>, ScenarioError> {
    Ok(vec![
        health_check()?,
        list_users()?,
        create_user()?,
        create_then_fetch()?,
        create_then_update()?,
        create_delete_verify()?,
        user_not_found()?,
        reject_missing_name()?,
        reject_missing_email()?,
        reject_invalid_email()?,
    ])
}

fn health_check() -> Result<Scenario, ScenarioError> {
    Ok(
        Scenario::new("health-check", "service reports itself healthy").step(
            Step::get("health", "/health")?
                .expect_status(200)
                .assert(Assertion::body_contains("healthy")),
        ),
    )
}

fn list_users() -> Result<Scenario, ScenarioError> {
    Ok(
        Scenario::new("list-users", "user collection is a JSON array").step(
            Step::get("list users", "/users")?
                .expect_json()
                .expect_status(200)
                .assert(Assertion::size_at_least("$", 0)?),
        ),
    )
}

fn create_user() -> Result<Scenario, ScenarioError> {
    let user = json!({"name": "John Doe", "email": "john@example.com", "age": 30});
    Ok(
        Scenario::new("create-user", "created user is echoed back with an integer id").step(
            create_step("create user", user)?
                .assert(Assertion::equals("name", json!("John Doe"))?)
                .assert(Assertion::equals("email", json!("john@example.com"))?)
                .assert(Assertion::equals("age", json!(30))?)
                .assert(Assertion::not_null("id")?)
                .assert(Assertion::is_integer("id")?),
        ),
    )
}

fn create_then_fetch() -> Result<Scenario, ScenarioError> {
    let user = json!({"name": "Jane Doe", "email": "jane@example.com", "age": 25});
    Ok(
        Scenario::new("create-then-fetch", "fetched user matches what was created")
            .step(create_step("create user", user)?.capture_field(USER_ID, "id")?)
            .step(
                Step::get("fetch user", "/users/{user_id}")?
                    .expect_json()
                    .expect_status(200)
                    .assert(Assertion::equals("id", Template::var(USER_ID))?)
                    .assert(Assertion::equals("name", json!("Jane Doe"))?)
                    .assert(Assertion::equals("email", json!("jane@example.com"))?)
                    .assert(Assertion::equals("age", json!(25))?),
            ),
    )
}

fn create_then_update() -> Result<Scenario, ScenarioError> {
    let user = json!({"name": "Bob Smith", "email": "bob@example.com", "age": 35});
    let updated = json!({"name": "Robert Smith", "email": "robert@example.com", "age": 36});

    let expect_updated = |step: Step| -> Result<Step, ScenarioError> {
        Ok(step
            .assert(Assertion::equals("id", Template::var(USER_ID))?)
            .assert(Assertion::equals("name", json!("Robert Smith"))?)
            .assert(Assertion::equals("email", json!("robert@example.com"))?)
            .assert(Assertion::equals("age", json!(36))?))
    };

    Ok(
        Scenario::new("create-then-update", "update is returned and persisted")
            .step(create_step("create user", user)?.capture_field(USER_ID, "id")?)
            .step(expect_updated(
                Step::put("update user", "/users/{user_id}")?
                    .json_body(updated)
                    .expect_json()
                    .expect_status(200),
            )?)
            .step(expect_updated(
                Step::get("fetch updated user", "/users/{user_id}")?
                    .expect_json()
                    .expect_status(200),
            )?),
    )
}

fn create_delete_verify() -> Result<Scenario, ScenarioError> {
    let user = json!({"name": "Alice Johnson", "email": "alice@example.com", "age": 28});
    let fetch_deleted = |name: &str| -> Result<Step, ScenarioError> {
        Ok(Step::get(name, "/users/{user_id}")?
            .header("Accept", "application/json")
            .expect_status(404))
    };

    // 删除后的每一次读取都必须是 404
    Ok(
        Scenario::new("create-delete-verify", "deleted user is no longer visible")
            .step(create_step("create user", user)?.capture_field(USER_ID, "id")?)
            .step(Step::delete("delete user", "/users/{user_id}")?.expect_status(204))
            .step(fetch_deleted("fetch deleted user")?)
            .step(fetch_deleted("fetch deleted user again")?),
    )
}

fn user_not_found() -> Result<Scenario, ScenarioError> {
    let path = format!("/users/{}", MISSING_USER_ID);
    Ok(
        Scenario::new("user-not-found", "unknown id yields 404").step(
            Step::get("fetch unknown user", &path)?
                .header("Accept", "application/json")
                .expect_status(404),
        ),
    )
}

fn reject_missing_name() -> Result<Scenario, ScenarioError> {
    rejected_create(
        "reject-missing-name",
        "payload without name is rejected and nothing is created",
        json!({"email": "john@example.com", "age": 30}),
    )
}

fn reject_missing_email() -> Result<Scenario, ScenarioError> {
    rejected_create(
        "reject-missing-email",
        "payload without email is rejected and nothing is created",
        json!({"name": "John"}),
    )
}

fn reject_invalid_email() -> Result<Scenario, ScenarioError> {
    rejected_create(
        "reject-invalid-email",
        "malformed email is rejected and nothing is created",
        json!({"name": "John Doe", "email": "invalid-email", "age": 30}),
    )
}

/// 创建请求被拒绝（400），且用户数量不变
fn rejected_create(
    name: &str,
    description: &str,
    payload: serde_json::Value,
) -> Result<Scenario, ScenarioError> {
    Ok(Scenario::new(name, description)
        .exclusive()
        .step(
            Step::get("count users before", "/users")?
                .expect_json()
                .capture(Capture::length_of(USER_COUNT, JsonPath::root())),
        )
        .step(
            Step::post("create invalid user", "/users")?
                .json_body(payload)
                .expect_status(400),
        )
        .step(
            Step::get("count users after", "/users")?
                .expect_json()
                .assert(Assertion::size_equals("$", Template::var(USER_COUNT))?),
        ))
}

fn create_step(name: &str, user: serde_json::Value) -> Result<Step, ScenarioError> {
    Ok(Step::post(name, "/users")?
        .json_body(user)
        .expect_json()
        .expect_status(201))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::types::validate_all;

    #[test]
    fn test_catalog_is_valid() {
        let scenarios = user_api().unwrap();
        assert_eq!(scenarios.len(), 10);
        validate_all(&scenarios).unwrap();
    }

    #[test]
    fn test_only_count_checks_are_exclusive() {
        let scenarios = user_api().unwrap();
        let exclusive: Vec<&str> = scenarios
            .iter()
            .filter(|s| s.exclusive)
            .map(|s| s.name.as_str())
            .collect();
        assert_eq!(
            exclusive,
            vec!["reject-missing-name", "reject-missing-email", "reject-invalid-email"]
        );
    }

    #[test]
    fn test_rejections_cover_each_required_field() {
        let scenarios = user_api().unwrap();
        let rejected_bodies: Vec<serde_json::Value> = scenarios
            .iter()
            .flat_map(|s| &s.steps)
            .filter(|s| s.expect_status == 400)
            .filter_map(|s| s.body.as_ref())
            .map(|b| serde_json::to_value(b).unwrap())
            .collect();

        assert!(rejected_bodies.iter().any(|b| b.get("name").is_none()));
        assert!(rejected_bodies.iter().any(|b| b.get("email").is_none()));
    }

    #[test]
    fn test_created_id_must_be_integer() {
        let scenarios = user_api().unwrap();
        let create = scenarios.iter().find(|s| s.name == "create-user").unwrap();
        assert!(
            create.steps[0]
                .assertions
                .contains(&Assertion::is_integer("id").unwrap())
        );
    }

    #[test]
    fn test_dependent_steps_follow_create() {
        let scenarios = user_api().unwrap();
        let delete = scenarios
            .iter()
            .find(|s| s.name == "create-delete-verify")
            .unwrap();

        let statuses: Vec<u16> = delete.steps.iter().map(|s| s.expect_status).collect();
        assert_eq!(statuses, vec![201, 204, 404, 404]);
        assert!(delete.steps[0].variables().is_empty());
        for step in &delete.steps[1..] {
            assert_eq!(step.variables(), vec![USER_ID]);
        }
    }
}
