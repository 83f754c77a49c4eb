//! Google Cloud Pub/Sub backend over the v1 REST API.
//!
//! Topic and subscription names may be given short (`gasless-deposits`) or
//! fully qualified (`projects/<id>/topics/gasless-deposits`). Setting
//! `endpoint` to an emulator address and omitting `access_token` works
//! against the local Pub/Sub emulator.
//!
//! ```toml
//! [queue.implementations.pubsub]
//! project_id = "my-project"
//! endpoint = "https://pubsub.googleapis.com"
//! access_token = "${PUBSUB_ACCESS_TOKEN}"
//! timeout_ms = 10000
//! ```

use crate::{QueueError, QueueInterface, ReceivedMessage};
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, Utc};
use gasless_types::{ConfigSchema, Field, FieldType, Schema, ValidationError};
use reqwest::{Client, RequestBuilder};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

const DEFAULT_ENDPOINT: &str = "https://pubsub.googleapis.com";
const DEFAULT_TIMEOUT_MS: u64 = 10_000;

#[derive(Serialize)]
struct OutgoingMessage {
	data: String,
}

#[derive(Serialize)]
struct PublishRequest {
	messages: Vec<OutgoingMessage>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PublishResponse {
	#[serde(default)]
	message_ids: Vec<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PullRequest {
	max_messages: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PullResponse {
	#[serde(default)]
	received_messages: Vec<WireReceivedMessage>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireReceivedMessage {
	ack_id: String,
	message: WireMessage,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireMessage {
	#[serde(default)]
	data: String,
	message_id: String,
	publish_time: DateTime<Utc>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AcknowledgeRequest<'a> {
	ack_ids: &'a [String],
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ModifyAckDeadlineRequest<'a> {
	ack_ids: &'a [String],
	ack_deadline_seconds: u32,
}

pub struct PubSubQueue {
	client: Client,
	endpoint: String,
	project_id: String,
	access_token: Option<String>,
}

impl PubSubQueue {
	pub fn new(
		endpoint: String,
		project_id: String,
		access_token: Option<String>,
		timeout: Duration,
	) -> Result<Self, QueueError> {
		let client = Client::builder()
			.timeout(timeout)
			.build()
			.map_err(|e| QueueError::Configuration(format!("Failed to build HTTP client: {}", e)))?;

		Ok(Self {
			client,
			endpoint: endpoint.trim_end_matches('/').to_string(),
			project_id,
			access_token,
		})
	}

	fn resource(&self, kind: &str, name: &str) -> String {
		if name.starts_with("projects/") {
			name.to_string()
		} else {
			format!("projects/{}/{}/{}", self.project_id, kind, name)
		}
	}

	fn url(&self, resource: &str, action: &str) -> String {
		format!("{}/v1/{}:{}", self.endpoint, resource, action)
	}

	fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
		match &self.access_token {
			Some(token) => request.bearer_auth(token),
			None => request,
		}
	}

	async fn post<B: Serialize + ?Sized, R: DeserializeOwned>(
		&self,
		url: &str,
		body: &B,
		operation: &str,
	) -> Result<R, QueueError> {
		let response = self
			.authorized(self.client.post(url).json(body))
			.send()
			.await
			.map_err(|e| QueueError::Network(format!("{} request failed: {}", operation, e)))?;

		let status = response.status();
		if !status.is_success() {
			let body = response.text().await.unwrap_or_default();
			warn!(operation = %operation, status = %status, "pubsub request rejected");
			return Err(QueueError::Broker(format!(
				"{} returned {}: {}",
				operation, status, body
			)));
		}

		response
			.json::<R>()
			.await
			.map_err(|e| QueueError::Serialization(format!("{} response: {}", operation, e)))
	}
}

#[async_trait]
impl QueueInterface for PubSubQueue {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(PubSubSchema)
	}

	async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<String, QueueError> {
		let url = self.url(&self.resource("topics", topic), "publish");
		let request = PublishRequest {
			messages: vec![OutgoingMessage {
				data: general_purpose::STANDARD.encode(payload),
			}],
		};

		let response: PublishResponse = self.post(&url, &request, "publish").await?;
		response
			.message_ids
			.into_iter()
			.next()
			.ok_or_else(|| QueueError::Broker("publish returned no message id".to_string()))
	}

	async fn pull(
		&self,
		subscription: &str,
		max_messages: u32,
	) -> Result<Vec<ReceivedMessage>, QueueError> {
		let url = self.url(&self.resource("subscriptions", subscription), "pull");
		let response: PullResponse = self
			.post(&url, &PullRequest { max_messages }, "pull")
			.await?;

		debug!(
			subscription = %subscription,
			received = response.received_messages.len(),
			"pulled messages"
		);

		Ok(response
			.received_messages
			.into_iter()
			.map(|received| {
				let data = general_purpose::STANDARD
					.decode(&received.message.data)
					.unwrap_or_else(|_| received.message.data.clone().into_bytes());
				ReceivedMessage {
					ack_id: received.ack_id,
					message_id: received.message.message_id,
					data,
					publish_time: received.message.publish_time,
				}
			})
			.collect())
	}

	async fn acknowledge(&self, subscription: &str, ack_ids: &[String]) -> Result<(), QueueError> {
		let url = self.url(&self.resource("subscriptions", subscription), "acknowledge");
		let _: serde_json::Value = self
			.post(&url, &AcknowledgeRequest { ack_ids }, "acknowledge")
			.await?;
		Ok(())
	}

	async fn nack(&self, subscription: &str, ack_id: &str) -> Result<(), QueueError> {
		let url = self.url(
			&self.resource("subscriptions", subscription),
			"modifyAckDeadline",
		);
		let ack_ids = [ack_id.to_string()];
		let request = ModifyAckDeadlineRequest {
			ack_ids: &ack_ids,
			ack_deadline_seconds: 0,
		};
		let _: serde_json::Value = self.post(&url, &request, "modifyAckDeadline").await?;
		Ok(())
	}
}

pub struct PubSubSchema;

impl ConfigSchema for PubSubSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![Field::new("project_id", FieldType::String).with_validator(|value| {
				match value.as_str() {
					Some(id) if !id.trim().is_empty() => Ok(()),
					_ => Err("project_id must not be empty".to_string()),
				}
			})],
			vec![
				Field::new("endpoint", FieldType::Url),
				Field::new("access_token", FieldType::String),
				Field::new(
					"timeout_ms",
					FieldType::Integer {
						min: Some(100),
						max: Some(120_000),
					},
				),
			],
		);
		schema.validate(config)
	}
}

/// Factory function to create a Pub/Sub queue from configuration.
pub fn create_queue(config: &toml::Value) -> Result<Box<dyn QueueInterface>, QueueError> {
	PubSubSchema
		.validate(config)
		.map_err(|e| QueueError::Configuration(format!("Invalid configuration: {}", e)))?;

	let project_id = config
		.get("project_id")
		.and_then(|v| v.as_str())
		.ok_or_else(|| QueueError::Configuration("project_id is required".to_string()))?
		.to_string();

	let endpoint = config
		.get("endpoint")
		.and_then(|v| v.as_str())
		.unwrap_or(DEFAULT_ENDPOINT)
		.to_string();

	let access_token = config
		.get("access_token")
		.and_then(|v| v.as_str())
		.filter(|token| !token.is_empty())
		.map(str::to_string);

	let timeout_ms = config
		.get("timeout_ms")
		.and_then(|v| v.as_integer())
		.map(|v| v as u64)
		.unwrap_or(DEFAULT_TIMEOUT_MS);

	Ok(Box::new(PubSubQueue::new(
		endpoint,
		project_id,
		access_token,
		Duration::from_millis(timeout_ms),
	)?))
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;
	use wiremock::matchers::{body_json, header, method, path};
	use wiremock::{Mock, MockServer, ResponseTemplate};

	fn queue(server: &MockServer, token: Option<&str>) -> PubSubQueue {
		PubSubQueue::new(
			server.uri(),
			"test-project".to_string(),
			token.map(str::to_string),
			Duration::from_secs(5),
		)
		.unwrap()
	}

	#[tokio::test]
	async fn test_publish_encodes_payload() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.and(path("/v1/projects/test-project/topics/deposits:publish"))
			.and(header("authorization", "Bearer secret-token"))
			.and(body_json(json!({
				"messages": [{ "data": general_purpose::STANDARD.encode(b"hello") }]
			})))
			.respond_with(ResponseTemplate::new(200).set_body_json(json!({ "messageIds": ["101"] })))
			.expect(1)
			.mount(&server)
			.await;

		let id = queue(&server, Some("secret-token"))
			.publish("deposits", b"hello".to_vec())
			.await
			.unwrap();
		assert_eq!(id, "101");
	}

	#[tokio::test]
	async fn test_publish_accepts_qualified_topic() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.and(path("/v1/projects/other/topics/dlt:publish"))
			.respond_with(ResponseTemplate::new(200).set_body_json(json!({ "messageIds": ["7"] })))
			.mount(&server)
			.await;

		let id = queue(&server, None)
			.publish("projects/other/topics/dlt", b"x".to_vec())
			.await
			.unwrap();
		assert_eq!(id, "7");
	}

	#[tokio::test]
	async fn test_publish_error_status() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.respond_with(ResponseTemplate::new(403).set_body_string("denied"))
			.mount(&server)
			.await;

		let result = queue(&server, None).publish("deposits", b"x".to_vec()).await;
		assert!(matches!(result, Err(QueueError::Broker(msg)) if msg.contains("403")));
	}

	#[tokio::test]
	async fn test_pull_decodes_messages() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.and(path("/v1/projects/test-project/subscriptions/sub:pull"))
			.and(body_json(json!({ "maxMessages": 5 })))
			.respond_with(ResponseTemplate::new(200).set_body_json(json!({
				"receivedMessages": [
					{
						"ackId": "ack-1",
						"message": {
							"data": general_purpose::STANDARD.encode(b"payload"),
							"messageId": "m-1",
							"publishTime": "2024-05-01T12:00:00.5Z"
						}
					}
				]
			})))
			.mount(&server)
			.await;

		let messages = queue(&server, None).pull("sub", 5).await.unwrap();
		assert_eq!(messages.len(), 1);
		assert_eq!(messages[0].ack_id, "ack-1");
		assert_eq!(messages[0].message_id, "m-1");
		assert_eq!(messages[0].data, b"payload");
	}

	#[tokio::test]
	async fn test_pull_empty_response() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.and(path("/v1/projects/test-project/subscriptions/sub:pull"))
			.respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
			.mount(&server)
			.await;

		assert!(queue(&server, None).pull("sub", 5).await.unwrap().is_empty());
	}

	#[tokio::test]
	async fn test_ack_and_nack_requests() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.and(path("/v1/projects/test-project/subscriptions/sub:acknowledge"))
			.and(body_json(json!({ "ackIds": ["a", "b"] })))
			.respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
			.expect(1)
			.mount(&server)
			.await;
		Mock::given(method("POST"))
			.and(path("/v1/projects/test-project/subscriptions/sub:modifyAckDeadline"))
			.and(body_json(json!({ "ackIds": ["c"], "ackDeadlineSeconds": 0 })))
			.respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
			.expect(1)
			.mount(&server)
			.await;

		let queue = queue(&server, None);
		queue
			.acknowledge("sub", &["a".to_string(), "b".to_string()])
			.await
			.unwrap();
		queue.nack("sub", "c").await.unwrap();
	}

	#[test]
	fn test_factory_validation() {
		let missing = toml::Value::Table(toml::toml! { endpoint = "http://localhost:8085" });
		assert!(create_queue(&missing).is_err());

		let ok = toml::Value::Table(toml::toml! {
			project_id = "p"
			endpoint = "http://localhost:8085"
		});
		assert!(create_queue(&ok).is_ok());
	}
}
