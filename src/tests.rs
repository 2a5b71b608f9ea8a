//! Integration tests for the team members backend.

use std::sync::Arc;

use reqwest::Client;
use serde_json::{json, Value};
use tempfile::TempDir;

use crate::config::Config;
use crate::db::{init_database, Repository};
use crate::errors::AppError;
use crate::models::{NewTeamMember, Role};
use crate::validation::{fields, FieldError};
use crate::{create_router, AppState};

/// Test fixture for integration tests.
struct TestFixture {
    client: Client,
    base_url: String,
    repo: Arc<Repository>,
    _temp_dir: TempDir,
}

impl TestFixture {
    async fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.sqlite");

        let pool = init_database(&db_path).await.expect("Failed to init DB");
        let repo = Arc::new(Repository::new(pool));

        let config = Config {
            db_path,
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            log_level: "warn".to_string(),
            cors_origins: Vec::new(),
        };

        let state = AppState {
            repo: repo.clone(),
            config: Arc::new(config),
        };

        let app = create_router(state);

        // Bind to random port
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind");
        let addr = listener.local_addr().expect("Failed to get addr");
        let base_url = format!("http://{}", addr);

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Wait for server to start
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

        TestFixture {
            client: Client::new(),
            base_url,
            repo,
            _temp_dir: temp_dir,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn member_url(&self, id: impl std::fmt::Display) -> String {
        self.url(&format!("/api/team-members/{}/", id))
    }

    async fn create(&self, body: Value) -> (u16, Value) {
        let resp = self
            .client
            .post(self.url("/api/team-members/"))
            .json(&body)
            .send()
            .await
            .unwrap();
        (resp.status().as_u16(), resp.json().await.unwrap())
    }

    async fn create_ok(&self, body: Value) -> i64 {
        let (status, body) = self.create(body).await;
        assert_eq!(status, 201, "unexpected create response: {}", body);
        body["data"]["id"].as_i64().unwrap()
    }

    async fn get(&self, id: impl std::fmt::Display) -> (u16, Value) {
        let resp = self.client.get(self.member_url(id)).send().await.unwrap();
        (resp.status().as_u16(), resp.json().await.unwrap())
    }
}

fn john() -> Value {
    json!({
        "first_name": "John",
        "last_name": "Doe",
        "email": "j@example.com",
        "phone_number": "1234567890",
        "role": "regular"
    })
}

fn jane() -> Value {
    json!({
        "first_name": "Jane",
        "last_name": "Roe",
        "email": "jane@example.com",
        "phone_number": "9876543210",
        "role": "admin"
    })
}

#[tokio::test]
async fn test_health_check() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .get(fixture.url("/health"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "OK");
}

#[tokio::test]
async fn test_member_lifecycle() {
    let fixture = TestFixture::new().await;

    // Create
    let (status, create_body) = fixture.create(john()).await;
    assert_eq!(status, 201);
    assert_eq!(create_body["status"], "success");
    assert_eq!(create_body["message"], "Team member created successfully");
    let id = create_body["data"]["id"].as_i64().unwrap();
    let mut expected = john();
    expected["id"] = json!(id);
    assert_eq!(create_body["data"], expected);

    // Retrieve
    let (status, get_body) = fixture.get(id).await;
    assert_eq!(status, 200);
    assert_eq!(get_body["status"], "success");
    assert_eq!(get_body["data"], expected);

    // Update
    let mut update = john();
    update["role"] = json!("admin");
    let update_resp = fixture
        .client
        .put(fixture.member_url(id))
        .json(&update)
        .send()
        .await
        .unwrap();
    assert_eq!(update_resp.status(), 200);
    let update_body: Value = update_resp.json().await.unwrap();
    assert_eq!(update_body["message"], "Team member updated successfully");
    assert_eq!(update_body["data"]["role"], "admin");
    assert_eq!(update_body["data"]["id"], id);

    // Delete
    let delete_resp = fixture
        .client
        .delete(fixture.member_url(id))
        .send()
        .await
        .unwrap();
    assert_eq!(delete_resp.status(), 200);
    let delete_body: Value = delete_resp.json().await.unwrap();
    assert_eq!(delete_body["status"], "success");
    assert_eq!(delete_body["message"], "Team member deleted successfully");
    assert!(delete_body["data"].is_null());
    assert!(delete_body.as_object().unwrap().contains_key("data"));

    // Verify deleted
    let (status, body) = fixture.get(id).await;
    assert_eq!(status, 404);
    assert_eq!(body["status"], "FAIL");
    assert!(body["errors"]["message"].is_string());
}

#[tokio::test]
async fn test_create_collects_every_field_error() {
    let fixture = TestFixture::new().await;

    let (status, body) = fixture
        .create(json!({
            "first_name": "",
            "last_name": "Doe",
            "email": "invalid-email",
            "phone_number": "1234567890",
            "role": "invalid_role"
        }))
        .await;

    assert_eq!(status, 400);
    assert_eq!(body["status"], "FAIL");
    let errors = body["errors"]["message"].as_object().unwrap();
    let mut keys: Vec<&str> = errors.keys().map(String::as_str).collect();
    keys.sort_unstable();
    assert_eq!(keys, vec!["email", "first_name", "role"]);
    assert_eq!(errors["first_name"][0], "First name cannot be empty.");

    assert_eq!(fixture.repo.count_members().await.unwrap(), 0);
}

#[tokio::test]
async fn test_list_members() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .get(fixture.url("/api/team-members/"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({ "status": "success", "count": 0, "data": [] }));

    let first = fixture.create_ok(john()).await;
    let second = fixture.create_ok(jane()).await;

    let body: Value = fixture
        .client
        .get(fixture.url("/api/team-members/"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["count"], 2);
    let data = body["data"].as_array().unwrap();
    assert_eq!(data.len(), 2);
    // Newest first
    assert_eq!(data[0]["id"], second);
    assert_eq!(data[1]["id"], first);
    assert!(data[0].get("created_at").is_none());
}

#[tokio::test]
async fn test_duplicate_email_rejected() {
    let fixture = TestFixture::new().await;
    fixture.create_ok(john()).await;

    let mut dup = jane();
    dup["email"] = json!("j@example.com");
    let (status, body) = fixture.create(dup).await;
    assert_eq!(status, 400);
    assert_eq!(
        body["errors"]["message"]["email"][0],
        "This email is already in use."
    );
    assert_eq!(fixture.repo.count_members().await.unwrap(), 1);
}

#[tokio::test]
async fn test_update_email_uniqueness() {
    let fixture = TestFixture::new().await;
    let john_id = fixture.create_ok(john()).await;
    let jane_id = fixture.create_ok(jane()).await;

    // Keeping its own email is fine
    let mut same = john();
    same["last_name"] = json!("Smith");
    let resp = fixture
        .client
        .put(fixture.member_url(john_id))
        .json(&same)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    // Taking another member's email is not
    let resp = fixture
        .client
        .patch(fixture.member_url(jane_id))
        .json(&json!({ "email": "j@example.com" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert!(body["errors"]["message"]["email"].is_array());

    let (_, jane_body) = fixture.get(jane_id).await;
    assert_eq!(jane_body["data"]["email"], "jane@example.com");
}

#[tokio::test]
async fn test_partial_update_keeps_unsupplied_fields() {
    let fixture = TestFixture::new().await;
    let id = fixture.create_ok(john()).await;
    let before = fixture.repo.get_member(id).await.unwrap().unwrap();

    let resp = fixture
        .client
        .patch(fixture.member_url(id))
        .json(&json!({ "role": "admin" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();

    let mut expected = john();
    expected["id"] = json!(id);
    expected["role"] = json!("admin");
    assert_eq!(body["data"], expected);

    let after = fixture.repo.get_member(id).await.unwrap().unwrap();
    assert_eq!(after.created_at, before.created_at);
    assert!(after.updated_at >= before.updated_at);
}

#[tokio::test]
async fn test_full_update_requires_every_field() {
    let fixture = TestFixture::new().await;
    let id = fixture.create_ok(jane()).await;

    let resp = fixture
        .client
        .put(fixture.member_url(id))
        .json(&json!({ "first_name": "Janet" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    let errors = &body["errors"]["message"];
    for field in ["last_name", "email", "phone_number"] {
        assert_eq!(errors[field][0], "This field is required.");
    }
    let (_, current) = fixture.get(id).await;
    assert_eq!(current["data"]["first_name"], "Jane");

    // Role is cleared back to its default when omitted
    let mut replace = jane();
    replace.as_object_mut().unwrap().remove("role");
    let resp = fixture
        .client
        .put(fixture.member_url(id))
        .json(&replace)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["role"], "regular");
}

#[tokio::test]
async fn test_invalid_phone_and_role() {
    let fixture = TestFixture::new().await;

    for phone in ["123456789", "1234567890123456", "123-456-7890", "abcdefghij"] {
        let mut payload = john();
        payload["phone_number"] = json!(phone);
        let (status, body) = fixture.create(payload).await;
        assert_eq!(status, 400, "phone {} should be rejected", phone);
        assert!(body["errors"]["message"]["phone_number"].is_array());
    }

    let id = fixture.create_ok(john()).await;
    let resp = fixture
        .client
        .patch(fixture.member_url(id))
        .json(&json!({ "role": "superuser", "phone_number": "12" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(
        body["errors"]["message"]["role"][0],
        "Invalid role. Must be one of: regular, admin"
    );
    assert_eq!(
        body["errors"]["message"]["phone_number"][0],
        "Phone number must be between 10 and 15 digits."
    );

    let member = fixture.repo.get_member(id).await.unwrap().unwrap();
    assert_eq!(member.role, Role::Regular);
    assert_eq!(member.phone_number, "1234567890");
}

#[tokio::test]
async fn test_delete_twice() {
    let fixture = TestFixture::new().await;
    let id = fixture.create_ok(john()).await;

    let first = fixture
        .client
        .delete(fixture.member_url(id))
        .send()
        .await
        .unwrap();
    assert_eq!(first.status(), 200);

    let second = fixture
        .client
        .delete(fixture.member_url(id))
        .send()
        .await
        .unwrap();
    assert_eq!(second.status(), 404);
    let body: Value = second.json().await.unwrap();
    assert_eq!(body["status"], "FAIL");

    assert_eq!(fixture.repo.count_members().await.unwrap(), 0);
}

#[tokio::test]
async fn test_not_found_errors() {
    let fixture = TestFixture::new().await;

    let (status, body) = fixture.get(999).await;
    assert_eq!(status, 404);
    assert_eq!(body["errors"]["message"], "Team member 999 not found");

    let (status, _) = fixture.get("not-a-number").await;
    assert_eq!(status, 404);

    let resp = fixture
        .client
        .put(fixture.member_url(999))
        .json(&john())
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    let resp = fixture
        .client
        .patch(fixture.member_url(999))
        .json(&json!({ "role": "admin" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    let resp = fixture
        .client
        .get(fixture.url("/api/unknown/"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "FAIL");
}

#[tokio::test]
async fn test_malformed_body_gets_failure_envelope() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .post(fixture.url("/api/team-members/"))
        .header("content-type", "application/json")
        .body("{ not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "FAIL");
    assert!(body["errors"]["message"].is_string());

    // Valid JSON that is not an object
    let (status, body) = fixture.create(json!(["John", "Doe"])).await;
    assert_eq!(status, 400);
    assert_eq!(body["status"], "FAIL");
    assert!(body["errors"]["message"].is_string());
}

#[tokio::test]
async fn test_wrong_field_types_reported_with_other_errors() {
    let fixture = TestFixture::new().await;

    let (status, body) = fixture
        .create(json!({
            "first_name": "",
            "last_name": { "text": "Doe" },
            "email": "bad",
            "phone_number": 1234567890,
            "role": "x"
        }))
        .await;

    assert_eq!(status, 400);
    assert_eq!(body["status"], "FAIL");
    let errors = body["errors"]["message"].as_object().unwrap();
    let mut keys: Vec<&str> = errors.keys().map(String::as_str).collect();
    keys.sort_unstable();
    assert_eq!(keys, vec!["email", "first_name", "last_name", "role"]);
    assert_eq!(errors["last_name"][0], "Not a valid string.");
    assert_eq!(fixture.repo.count_members().await.unwrap(), 0);

    // A numeric phone is read as its digits
    let mut payload = john();
    payload["phone_number"] = json!(1234567890);
    let (status, body) = fixture.create(payload).await;
    assert_eq!(status, 201);
    assert_eq!(body["data"]["phone_number"], "1234567890");
}

#[tokio::test]
async fn test_role_must_match_exactly() {
    let fixture = TestFixture::new().await;

    let mut payload = john();
    payload["role"] = json!(" admin ");
    let (status, body) = fixture.create(payload).await;
    assert_eq!(status, 400);
    assert!(body["errors"]["message"]["role"].is_array());
    assert_eq!(fixture.repo.count_members().await.unwrap(), 0);
}

#[tokio::test]
async fn test_unsupported_method_gets_failure_envelope() {
    let fixture = TestFixture::new().await;
    let id = fixture.create_ok(john()).await;

    let resp = fixture
        .client
        .delete(fixture.url("/api/team-members/"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 405);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "FAIL");
    assert_eq!(body["errors"]["message"], "Method \"DELETE\" not allowed.");

    let resp = fixture
        .client
        .post(fixture.member_url(id))
        .json(&jane())
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 405);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["errors"]["message"], "Method \"POST\" not allowed.");

    assert_eq!(fixture.repo.count_members().await.unwrap(), 1);
}

#[tokio::test]
async fn test_store_enforces_email_uniqueness() {
    let fixture = TestFixture::new().await;

    let new = NewTeamMember {
        first_name: "John".to_string(),
        last_name: "Doe".to_string(),
        email: "j@example.com".to_string(),
        phone_number: "1234567890".to_string(),
        role: Role::Regular,
    };
    fixture.repo.create_member(&new).await.unwrap();

    // Bypassing the validator still cannot produce a duplicate
    match fixture.repo.create_member(&new).await {
        Err(AppError::Validation(errors)) => {
            assert!(errors.has(fields::EMAIL, FieldError::DuplicateEmail));
        }
        other => panic!("expected duplicate email error, got {:?}", other),
    }
    assert_eq!(fixture.repo.count_members().await.unwrap(), 1);
}

#[tokio::test]
async fn test_concurrent_creates_with_same_email() {
    let fixture = Arc::new(TestFixture::new().await);

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let fixture = fixture.clone();
            tokio::spawn(async move {
                let mut payload = john();
                payload["first_name"] = json!(format!("John{}", i));
                fixture.create(payload).await.0
            })
        })
        .collect();

    let mut statuses = Vec::new();
    for handle in handles {
        statuses.push(handle.await.unwrap());
    }

    assert_eq!(statuses.iter().filter(|s| **s == 201).count(), 1);
    assert_eq!(statuses.iter().filter(|s| **s == 400).count(), 3);
    assert_eq!(fixture.repo.count_members().await.unwrap(), 1);
}
