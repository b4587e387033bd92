//! 有状态的内存版 User API，挂载在 wiremock 上供集成测试使用
#![allow(dead_code)]

use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use serde_json::{Value, json};
use wiremock::matchers::any;
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

use rucontract::http::{BaseUrl, Client};
use rucontract::runner::ContractRunner;

pub const API_PREFIX: &str = "/api";

/// 故意引入的实现缺陷，用于验证契约能发现它们
#[derive(Debug, Clone, Copy, Default)]
pub struct Quirks {
    /// DELETE 返回 204 但不真正删除
    pub delete_keeps_user: bool,
    /// 不校验 email 格式
    pub accept_invalid_email: bool,
    /// PUT 返回更新后的用户但不保存
    pub update_not_persisted: bool,
    /// 用户列表以 text/plain 返回
    pub plain_text_list: bool,
    /// 不要求 name 字段
    pub accept_missing_name: bool,
    /// id 以字符串形式返回（`"u1"`）
    pub string_ids: bool,
    /// 删除后只有第一次读取返回 404，之后用户重新出现
    pub delete_hidden_once: bool,
}

#[derive(Default)]
struct Users {
    next_id: u64,
    records: BTreeMap<u64, Value>,
    hidden_once: HashSet<u64>,
}

pub struct FakeUserApi {
    quirks: Quirks,
    users: Mutex<Users>,
}

impl FakeUserApi {
    pub fn new() -> Self {
        Self::with_quirks(Quirks::default())
    }

    pub fn with_quirks(quirks: Quirks) -> Self {
        Self {
            quirks,
            users: Mutex::new(Users::default()),
        }
    }

    fn handle(&self, method: &str, path: &str, body: &[u8]) -> ResponseTemplate {
        let Some(path) = path.strip_prefix(API_PREFIX) else {
            return not_found("unknown route");
        };
        let segments: Vec<&str> = path.trim_matches('/').split('/').collect();

        match (method, segments.as_slice()) {
            ("GET", ["health"]) => ResponseTemplate::new(200).set_body_string("healthy"),
            ("GET", ["users", "health"]) => {
                ResponseTemplate::new(200).set_body_string("User service is healthy")
            }
            ("GET", ["users"]) => self.list(),
            ("POST", ["users"]) => self.create(body),
            (method, ["users", id]) => match id.trim_start_matches('u').parse::<u64>() {
                Ok(id) => self.member(method, id, body),
                Err(_) => bad_request("invalid id"),
            },
            _ => not_found("unknown route"),
        }
    }

    fn list(&self) -> ResponseTemplate {
        let users = self.users.lock().unwrap();
        let list: Vec<&Value> = users.records.values().collect();
        if self.quirks.plain_text_list {
            ResponseTemplate::new(200)
                .set_body_string(serde_json::to_string(&list).unwrap())
        } else {
            ResponseTemplate::new(200).set_body_json(list)
        }
    }

    fn create(&self, body: &[u8]) -> ResponseTemplate {
        let fields = match self.validate(body) {
            Ok(fields) => fields,
            Err(message) => return bad_request(&message),
        };

        let mut users = self.users.lock().unwrap();
        users.next_id += 1;
        let id = users.next_id;
        let user = self.with_id(fields, id);
        users.records.insert(id, user.clone());
        ResponseTemplate::new(201).set_body_json(user)
    }

    fn member(&self, method: &str, id: u64, body: &[u8]) -> ResponseTemplate {
        match method {
            "GET" => {
                let mut users = self.users.lock().unwrap();
                if users.hidden_once.remove(&id) {
                    return not_found("User not found");
                }
                match users.records.get(&id) {
                    Some(user) => ResponseTemplate::new(200).set_body_json(user),
                    None => not_found("User not found"),
                }
            }
            "PUT" => {
                let fields = match self.validate(body) {
                    Ok(fields) => fields,
                    Err(message) => return bad_request(&message),
                };
                let mut users = self.users.lock().unwrap();
                if !users.records.contains_key(&id) {
                    return not_found("User not found");
                }
                let user = self.with_id(fields, id);
                if !self.quirks.update_not_persisted {
                    users.records.insert(id, user.clone());
                }
                ResponseTemplate::new(200).set_body_json(user)
            }
            "DELETE" => {
                let mut users = self.users.lock().unwrap();
                if !users.records.contains_key(&id) {
                    return not_found("User not found");
                }
                if self.quirks.delete_hidden_once {
                    users.hidden_once.insert(id);
                } else if !self.quirks.delete_keeps_user {
                    users.records.remove(&id);
                }
                ResponseTemplate::new(204)
            }
            _ => ResponseTemplate::new(405),
        }
    }

    fn with_id(&self, mut fields: Value, id: u64) -> Value {
        fields["id"] = if self.quirks.string_ids {
            json!(format!("u{}", id))
        } else {
            json!(id)
        };
        fields
    }

    fn validate(&self, body: &[u8]) -> Result<Value, String> {
        let value: Value =
            serde_json::from_slice(body).map_err(|e| format!("invalid JSON: {}", e))?;

        let name = value
            .get("name")
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty());
        if name.is_none() && !self.quirks.accept_missing_name {
            return Err("name is required".to_string());
        }
        let email = value
            .get("email")
            .and_then(Value::as_str)
            .ok_or("email is required")?;
        if !self.quirks.accept_invalid_email && !is_email(email) {
            return Err("email must be a valid address".to_string());
        }

        let mut user = json!({"email": email});
        if let Some(name) = name {
            user["name"] = json!(name);
        }
        if let Some(age) = value.get("age") {
            user["age"] = age.clone();
        }
        Ok(user)
    }
}

impl Respond for FakeUserApi {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        self.handle(request.method.as_str(), request.url.path(), &request.body)
    }
}


fn is_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain
                    .split_once('.')
                    .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty())
        }
        None => false,
    }
}

fn not_found(message: &str) -> ResponseTemplate {
    ResponseTemplate::new(404).set_body_json(json!({"error": message}))
}

fn bad_request(message: &str) -> ResponseTemplate {
    ResponseTemplate::new(400).set_body_json(json!({"error": message}))
}

/// 启动挂载了 fake 的 MockServer，返回服务器和 `/api` 基础 URL
pub async fn start(api: FakeUserApi) -> (MockServer, BaseUrl) {
    let server = MockServer::start().await;
    Mock::given(any()).respond_with(api).mount(&server).await;

    let base_url = BaseUrl::parse(&format!("{}{}", server.uri(), API_PREFIX)).unwrap();
    (server, base_url)
}

pub fn runner() -> ContractRunner {
    runner_with_timeout(Duration::from_secs(5))
}

pub fn runner_with_timeout(timeout: Duration) -> ContractRunner {
    ContractRunner::new(Client::new(timeout).unwrap())
}
