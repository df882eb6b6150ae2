//! Common test utilities for integration tests
//!
//! - Database setup (migrations on the database named by `DATABASE_URL`)
//! - A [`Browser`] that drives the router and keeps the session cookie
//! - Per-test name suffixes and cleanup, so tests can share one database

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::Value;
use sqlx::PgPool;
use taskmanager_api::{
    app::{build_router, AppState},
    config::Config,
};
use taskmanager_shared::{
    db::migrations::{ensure_database_exists, run_migrations},
    models::user::User,
};
use tokio::sync::OnceCell;
use tower::ServiceExt;
use uuid::Uuid;

pub const PASSWORD: &str = "pw1";

/// Database creation and migrations, once per test binary
static SCHEMA: OnceCell<()> = OnceCell::const_new();

async fn prepare_schema(url: &str) -> anyhow::Result<()> {
    ensure_database_exists(url).await?;
    let db = PgPool::connect(url).await?;
    run_migrations(&db).await?;
    db.close().await;
    Ok(())
}

/// Test context containing all necessary resources
pub struct TestContext {
    pub db: PgPool,
    pub app: Router,

    /// Appended to every name this test creates
    pub suffix: String,
}

impl TestContext {
    pub async fn new() -> anyhow::Result<Self> {
        let config = Config::from_env()?;

        SCHEMA
            .get_or_try_init(|| prepare_schema(&config.database.url))
            .await?;
        let db = PgPool::connect(&config.database.url).await?;

        let app = build_router(AppState::new(db.clone(), config));
        let suffix = Uuid::new_v4().simple().to_string()[..8].to_string();

        Ok(Self { db, app, suffix })
    }

    /// Entity name unique to this test
    pub fn name(&self, base: &str) -> String {
        format!("{}-{}", base, self.suffix)
    }

    /// Username unique to this test
    pub fn username(&self, base: &str) -> String {
        format!("{}_{}", base, self.suffix)
    }

    pub fn browser(&self) -> Browser {
        Browser {
            app: self.app.clone(),
            cookie: None,
        }
    }

    /// Registers `base` through the public form and returns the stored user
    pub async fn register(&self, base: &str) -> anyhow::Result<User> {
        let username = self.username(base);
        let response = self
            .browser()
            .post(
                "/users/create/",
                &[
                    ("first_name", base),
                    ("last_name", "Tester"),
                    ("username", username.as_str()),
                    ("password1", PASSWORD),
                    ("password2", PASSWORD),
                ],
            )
            .await?;
        anyhow::ensure!(
            response.status == StatusCode::SEE_OTHER,
            "registration failed: {:?}",
            response.body
        );

        User::find_by_username(&self.db, &username)
            .await?
            .ok_or_else(|| anyhow::anyhow!("user {} was not stored", username))
    }

    /// Registers `base` and returns a browser logged in as them
    pub async fn logged_in(&self, base: &str) -> anyhow::Result<(User, Browser)> {
        let user = self.register(base).await?;
        let mut browser = self.browser();
        let response = browser.login(&user.username, PASSWORD).await?;
        anyhow::ensure!(response.status == StatusCode::SEE_OTHER, "login failed");
        browser.messages().await?;
        Ok((user, browser))
    }

    pub async fn count(&self, table: &str) -> anyhow::Result<i64> {
        let column = if table == "users" { "username" } else { "name" };
        let count = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM {} WHERE right({}, length($1)) = $1",
            table, column
        ))
        .bind(&self.suffix)
        .fetch_one(&self.db)
        .await?;
        Ok(count)
    }

    pub async fn id_of(&self, table: &str, name: &str) -> anyhow::Result<Option<i64>> {
        let id = sqlx::query_scalar(&format!("SELECT id FROM {} WHERE name = $1", table))
            .bind(name)
            .fetch_optional(&self.db)
            .await?;
        Ok(id)
    }

    /// Deletes every row this test created, dependents first
    pub async fn cleanup(&self) -> anyhow::Result<()> {
        for (table, column) in [
            ("tasks", "name"),
            ("labels", "name"),
            ("statuses", "name"),
            ("users", "username"),
        ] {
            sqlx::query(&format!(
                "DELETE FROM {} WHERE right({}, length($1)) = $1",
                table, column
            ))
            .bind(&self.suffix)
            .execute(&self.db)
            .await?;
        }
        Ok(())
    }
}

/// What a test looks at in a response
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub location: Option<String>,
    pub body: Value,
}

impl TestResponse {
    /// Fields named in a 422 body
    pub fn error_fields(&self) -> Vec<String> {
        self.body["details"]
            .as_array()
            .map(|details| {
                details
                    .iter()
                    .filter_map(|detail| detail["field"].as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn error_messages(&self) -> Vec<String> {
        self.body["details"]
            .as_array()
            .map(|details| {
                details
                    .iter()
                    .filter_map(|detail| detail["message"].as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// A client holding one session cookie
pub struct Browser {
    app: Router,
    cookie: Option<String>,
}

impl Browser {
    pub async fn get(&mut self, uri: &str) -> anyhow::Result<TestResponse> {
        let request = Request::builder().method("GET").uri(uri);
        self.send(request, Body::empty()).await
    }

    pub async fn post(&mut self, uri: &str, form: &[(&str, &str)]) -> anyhow::Result<TestResponse> {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        self.send(request, Body::from(encode_form(form))).await
    }

    pub async fn login(&mut self, username: &str, password: &str) -> anyhow::Result<TestResponse> {
        self.post("/login/", &[("username", username), ("password", password)])
            .await
    }

    /// Messages shown by the next rendered page (the home page)
    pub async fn messages(&mut self) -> anyhow::Result<Vec<(String, String)>> {
        let page = self.get("/").await?;
        let messages = page.body["messages"]
            .as_array()
            .map(|messages| {
                messages
                    .iter()
                    .map(|m| {
                        (
                            m["level"].as_str().unwrap_or_default().to_string(),
                            m["message"].as_str().unwrap_or_default().to_string(),
                        )
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(messages)
    }

    async fn send(
        &mut self,
        mut request: axum::http::request::Builder,
        body: Body,
    ) -> anyhow::Result<TestResponse> {
        if let Some(cookie) = &self.cookie {
            request = request.header(header::COOKIE, cookie);
        }

        let response = self.app.clone().oneshot(request.body(body)?).await?;

        for value in response.headers().get_all(header::SET_COOKIE) {
            let pair = value.to_str()?.split(';').next().unwrap_or_default();
            self.cookie = match pair.split_once('=') {
                Some((_, token)) if !token.is_empty() => Some(pair.to_string()),
                _ => None,
            };
        }

        let status = response.status();
        let location = response
            .headers()
            .get(header::LOCATION)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)?
        };

        Ok(TestResponse {
            status,
            location,
            body,
        })
    }
}

fn encode_form(form: &[(&str, &str)]) -> String {
    form.iter()
        .map(|(key, value)| format!("{}={}", encode(key), encode(value)))
        .collect::<Vec<_>>()
        .join("&")
}

fn encode(value: &str) -> String {
    let mut encoded = String::new();
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                encoded.push(byte as char)
            }
            b' ' => encoded.push('+'),
            _ => encoded.push_str(&format!("%{:02X}", byte)),
        }
    }
    encoded
}
