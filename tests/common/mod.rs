#![allow(dead_code)]

use reqwest::Client;
use serde_json::Value as JsonValue;
use server::hub::GameHub;

/// In-process server bound to an ephemeral local port.
pub struct TestServer {
    pub base_url: String,
    pub hub: GameHub,
}

impl TestServer {
    pub async fn spawn() -> Self {
        let hub = GameHub::in_memory();
        let app = server::router(hub.clone(), None);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test listener");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("test server");
        });
        Self {
            base_url: format!("http://{addr}"),
            hub,
        }
    }

    /// Build a URL for an API endpoint.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// Build a reqwest client for tests.
pub fn client() -> Client {
    Client::new()
}

/// POST a JSON body and return (status, parsed body).
pub async fn post_json(server: &TestServer, path: &str, body: JsonValue) -> (u16, JsonValue) {
    let resp = client()
        .post(server.url(path))
        .json(&body)
        .send()
        .await
        .expect("request failed");
    let status = resp.status().as_u16();
    let body = resp.json().await.unwrap_or(JsonValue::Null);
    (status, body)
}

pub async fn get_json(server: &TestServer, path: &str) -> (u16, JsonValue) {
    let resp = client()
        .get(server.url(path))
        .send()
        .await
        .expect("request failed");
    let status = resp.status().as_u16();
    let body = resp.json().await.unwrap_or(JsonValue::Null);
    (status, body)
}
