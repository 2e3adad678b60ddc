//! Webhook registration for a partner.

use explorium_engine::RemoteError;
use serde_json::{json, Value};

use crate::client::ApiClient;

#[derive(Debug, Clone)]
pub struct WebhookApi {
    client: ApiClient,
}

impl WebhookApi {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub fn create(&self, partner_id: &str, webhook_url: &str) -> Result<Value, RemoteError> {
        self.client.post(
            "/webhooks",
            &json!({ "partner_id": partner_id, "webhook_url": webhook_url }),
        )
    }

    pub fn get(&self, partner_id: &str) -> Result<Value, RemoteError> {
        self.client.get(&path(partner_id))
    }

    pub fn update(&self, partner_id: &str, webhook_url: &str) -> Result<Value, RemoteError> {
        self.client.put(&path(partner_id), &json!({ "webhook_url": webhook_url }))
    }

    pub fn delete(&self, partner_id: &str) -> Result<Value, RemoteError> {
        self.client.delete(&path(partner_id))
    }
}

fn path(partner_id: &str) -> String {
    format!("/webhooks/{}", partner_id.trim())
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use std::time::Duration;

    fn api(server: &MockServer) -> WebhookApi {
        WebhookApi::new(ApiClient::new("k", &server.base_url(), Duration::from_secs(5)).unwrap())
    }

    #[test]
    fn test_create_and_update() {
        let server = MockServer::start();
        let create = server.mock(|when, then| {
            when.method(POST)
                .path("/webhooks")
                .json_body(json!({"partner_id": "p1", "webhook_url": "https://hooks.example.com/a"}));
            then.status(201).json_body(json!({"partner_id": "p1"}));
        });
        let update = server.mock(|when, then| {
            when.method(PUT)
                .path("/webhooks/p1")
                .json_body(json!({"webhook_url": "https://hooks.example.com/b"}));
            then.status(200).json_body(json!({"updated": true}));
        });

        let api = api(&server);
        assert_eq!(api.create("p1", "https://hooks.example.com/a").unwrap()["partner_id"], "p1");
        assert_eq!(api.update("p1", "https://hooks.example.com/b").unwrap()["updated"], true);
        create.assert();
        update.assert();
    }

    #[test]
    fn test_get_not_found() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/webhooks/missing");
            then.status(404).json_body(json!({"detail": "no webhook"}));
        });

        let err = api(&server).get("missing").unwrap_err();
        assert_eq!(err.status(), Some(404));
        assert!(!err.is_auth());
    }

    #[test]
    fn test_delete() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(DELETE).path("/webhooks/p1");
            then.status(204);
        });
        assert_eq!(api(&server).delete(" p1 ").unwrap(), Value::Null);
        mock.assert();
    }
}
