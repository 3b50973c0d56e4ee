//! AWS SQS adapter using the query API over plain HTTP.
//!
//! Requests are form-encoded `POST`s signed with AWS Signature Version 4 and
//! responses are XML. Talking HTTP directly keeps the adapter testable
//! against a mock server and lets the endpoint point at LocalStack or
//! ElasticMQ.
//!
//! ## Credentials
//!
//! Taken from [`SqsConfig`] when set, otherwise from the standard
//! `AWS_ACCESS_KEY_ID` / `AWS_SECRET_ACCESS_KEY` environment variables.
//! Without either, construction succeeds and every call fails with
//! [`QueueError::AuthenticationFailed`].
//!
//! ## Error mapping
//!
//! | Service code | Error |
//! |---|---|
//! | `AWS.SimpleQueueService.NonExistentQueue`, `QueueDoesNotExist` | `QueueNotFound` |
//! | `AWS.SimpleQueueService.BatchRequestTooLong`, `BatchRequestTooLong` | `PayloadTooLarge` |
//! | `InvalidClientTokenId`, `UnrecognizedClientException`, `SignatureDoesNotMatch`, HTTP 401/403 | `AuthenticationFailed` |
//! | `ReceiptHandleIsInvalid`, `InvalidReceiptHandle` | `InvalidAckToken` |
//! | parameter and batch-shape codes | `ValidationError` |
//! | anything else | `ProviderError` |

use crate::client::QueueService;
use crate::config::{ConsumptionConfig, SqsConfig};
use crate::error::{ConfigurationError, QueueError, SerializationError, ValidationError};
use crate::message::{
    AckToken, BatchEntry, BatchResultEntry, BatchResultError, BatchSendResult, MessageAttribute,
    MessageAttributes, MessageId, QueueRef, ReceivedMessage, SendReceipt, SendRequest,
    MAX_PAYLOAD_BYTES,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use quick_xml::events::Event;
use quick_xml::Reader;
use reqwest::Client as HttpClient;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use tokio::sync::RwLock;
use tracing::debug;
use url::Url;

#[cfg(test)]
#[path = "sqs_tests.rs"]
mod tests;

const API_VERSION: &str = "2012-11-05";
const PROVIDER: &str = "SQS";
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
const MAX_BATCH_ENTRIES: usize = 10;
const MAX_WAIT_TIME_SECONDS: u32 = 20;

// ============================================================================
// AWS Signature V4 Signing
// ============================================================================

type HmacSha256 = Hmac<Sha256>;

/// AWS Signature Version 4 signer.
///
/// Signs `host` and `x-amz-date` plus the SHA-256 of the form body:
/// 1. Canonical request (method, URI, empty query, headers, payload hash)
/// 2. String to sign (algorithm, timestamp, scope, request hash)
/// 3. Signing key from the date / region / service HMAC chain
/// 4. Authorization header
#[derive(Clone)]
struct SigV4Signer {
    access_key: String,
    secret_key: String,
    region: String,
    service: &'static str,
}

impl SigV4Signer {
    fn new(access_key: String, secret_key: String, region: String) -> Self {
        Self {
            access_key,
            secret_key,
            region,
            service: "sqs",
        }
    }

    /// Headers to add to the request: `Authorization` and `x-amz-date`
    fn sign(
        &self,
        method: &str,
        host: &str,
        path: &str,
        body: &str,
        timestamp: &DateTime<Utc>,
    ) -> Result<Vec<(&'static str, String)>, QueueError> {
        let date_stamp = timestamp.format("%Y%m%d").to_string();
        let amz_date = timestamp.format("%Y%m%dT%H%M%SZ").to_string();

        let canonical_headers = format!("host:{}\nx-amz-date:{}\n", host, amz_date);
        let signed_headers = "host;x-amz-date";
        let payload_hash = hex::encode(Sha256::digest(body.as_bytes()));

        // Parameters travel in the body, so the canonical query string is empty
        let canonical_request = format!(
            "{}\n{}\n\n{}\n{}\n{}",
            method, path, canonical_headers, signed_headers, payload_hash
        );

        let algorithm = "AWS4-HMAC-SHA256";
        let credential_scope = format!(
            "{}/{}/{}/aws4_request",
            date_stamp, self.region, self.service
        );
        let string_to_sign = format!(
            "{}\n{}\n{}\n{}",
            algorithm,
            amz_date,
            credential_scope,
            hex::encode(Sha256::digest(canonical_request.as_bytes()))
        );

        let signature = self.signature(&string_to_sign, &date_stamp)?;
        let authorization = format!(
            "{} Credential={}/{}, SignedHeaders={}, Signature={}",
            algorithm, self.access_key, credential_scope, signed_headers, signature
        );

        Ok(vec![("Authorization", authorization), ("x-amz-date", amz_date)])
    }

    fn signature(&self, string_to_sign: &str, date_stamp: &str) -> Result<String, QueueError> {
        let k_secret = format!("AWS4{}", self.secret_key);
        let k_date = hmac_sha256(k_secret.as_bytes(), date_stamp.as_bytes())?;
        let k_region = hmac_sha256(&k_date, self.region.as_bytes())?;
        let k_service = hmac_sha256(&k_region, self.service.as_bytes())?;
        let k_signing = hmac_sha256(&k_service, b"aws4_request")?;
        let signature = hmac_sha256(&k_signing, string_to_sign.as_bytes())?;

        Ok(hex::encode(signature))
    }
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<Vec<u8>, QueueError> {
    let mut mac =
        HmacSha256::new_from_slice(key).map_err(|e| QueueError::AuthenticationFailed {
            message: format!("cannot derive signing key: {}", e),
        })?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

// ============================================================================
// Request Parameters
// ============================================================================

/// Ordered form parameters of one query API call
struct Params(Vec<(String, String)>);

impl Params {
    fn new(action: &str) -> Self {
        Self(vec![
            ("Action".to_string(), action.to_string()),
            ("Version".to_string(), API_VERSION.to_string()),
        ])
    }

    fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.push((name.into(), value.into()));
    }

    fn push_attributes(&mut self, prefix: &str, attributes: &MessageAttributes) {
        let mut names: Vec<&String> = attributes.keys().collect();
        names.sort();

        for (index, name) in names.into_iter().enumerate() {
            let attribute = &attributes[name];
            let key = format!("{}MessageAttribute.{}", prefix, index + 1);
            self.push(format!("{}.Name", key), name.as_str());
            self.push(format!("{}.Value.DataType", key), attribute.data_type.as_str());
            self.push(
                format!("{}.Value.StringValue", key),
                attribute.string_value.as_str(),
            );
        }
    }

    fn push_list(&mut self, prefix: &str, values: &[String]) {
        for (index, value) in values.iter().enumerate() {
            self.push(format!("{}.{}", prefix, index + 1), value.as_str());
        }
    }

    fn encode(&self) -> String {
        self.0
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&")
    }
}

// ============================================================================
// SQS Queue Service
// ============================================================================

/// [`QueueService`] backed by AWS SQS.
///
/// Thread-safe; share one instance across loops and publishers via `Arc`.
/// Resolved queue URLs are cached for the lifetime of the instance.
pub struct SqsQueueService {
    http_client: HttpClient,
    signer: Option<SigV4Signer>,
    endpoint: Url,
    host: String,
    queue_url_cache: RwLock<HashMap<String, QueueRef>>,
}

impl SqsQueueService {
    /// Build the HTTP client and signer from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::ConfigurationError`] for an unusable endpoint
    /// or HTTP client settings.
    pub fn new(config: &SqsConfig) -> Result<Self, QueueError> {
        let endpoint = match &config.endpoint_url {
            Some(url) => url.clone(),
            None => format!("https://sqs.{}.amazonaws.com", config.region),
        };
        let endpoint = Url::parse(&endpoint).map_err(|e| {
            ConfigurationError::Invalid {
                message: format!("invalid SQS endpoint '{}': {}", endpoint, e),
            }
        })?;

        let host = match (endpoint.host_str(), endpoint.port()) {
            (Some(host), Some(port)) => format!("{}:{}", host, port),
            (Some(host), None) => host.to_string(),
            (None, _) => {
                return Err(ConfigurationError::Invalid {
                    message: format!("SQS endpoint '{}' has no host", endpoint),
                }
                .into())
            }
        };

        let signer = resolve_credentials(config).map(|(access_key, secret_key)| {
            SigV4Signer::new(access_key, secret_key, config.region.clone())
        });

        let http_client = HttpClient::builder()
            .connect_timeout(config.connect_timeout())
            .timeout(config.read_timeout())
            .pool_max_idle_per_host(config.max_connections)
            .build()
            .map_err(|e| ConfigurationError::Invalid {
                message: format!("failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            http_client,
            signer,
            endpoint,
            host,
            queue_url_cache: RwLock::new(HashMap::new()),
        })
    }

    /// URL for a queue reference, resolving names through the cache
    async fn queue_url(&self, queue: &QueueRef) -> Result<String, QueueError> {
        if queue.is_url() {
            return Ok(queue.as_str().to_string());
        }

        Ok(self.resolve_url(queue.as_str()).await?.as_str().to_string())
    }

    /// Sign and send one query API call; `context` names the queue in errors
    async fn call(&self, params: Params, context: &str) -> Result<String, QueueError> {
        let signer = self
            .signer
            .as_ref()
            .ok_or_else(|| QueueError::AuthenticationFailed {
                message: "no AWS credentials configured".to_string(),
            })?;

        let body = params.encode();
        let headers = signer.sign("POST", &self.host, self.endpoint.path(), &body, &Utc::now())?;

        let mut request = self
            .http_client
            .post(self.endpoint.clone())
            .header(reqwest::header::CONTENT_TYPE, FORM_CONTENT_TYPE)
            .body(body);
        for (name, value) in headers {
            request = request.header(name, value);
        }

        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();
        let text = response.text().await.map_err(transport_error)?;

        if !status.is_success() {
            return Err(parse_error_response(&text, status.as_u16(), context));
        }

        Ok(text)
    }
}

impl fmt::Debug for SqsQueueService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqsQueueService")
            .field("endpoint", &self.endpoint.as_str())
            .field("signed", &self.signer.is_some())
            .finish()
    }
}

#[async_trait]
impl QueueService for SqsQueueService {
    async fn receive(
        &self,
        queue: &QueueRef,
        config: &ConsumptionConfig,
    ) -> Result<Vec<ReceivedMessage>, QueueError> {
        let mut params = Params::new("ReceiveMessage");
        params.push("QueueUrl", self.queue_url(queue).await?);
        params.push(
            "MaxNumberOfMessages",
            config.max_messages.clamp(1, MAX_BATCH_ENTRIES as u32).to_string(),
        );
        params.push(
            "WaitTimeSeconds",
            config.wait_time_seconds.min(MAX_WAIT_TIME_SECONDS).to_string(),
        );
        if let Some(visibility) = config.visibility_timeout_seconds {
            params.push("VisibilityTimeout", visibility.to_string());
        }
        params.push_list("AttributeName", &config.attribute_names);
        params.push_list("MessageAttributeName", &config.message_attribute_names);

        let xml = self.call(params, queue.as_str()).await?;
        let messages = parse_receive_response(&xml)?;

        debug!(queue = %queue, count = messages.len(), "Received messages");
        Ok(messages)
    }

    async fn delete(&self, queue: &QueueRef, ack_token: &AckToken) -> Result<(), QueueError> {
        let mut params = Params::new("DeleteMessage");
        params.push("QueueUrl", self.queue_url(queue).await?);
        params.push("ReceiptHandle", ack_token.as_str());

        self.call(params, queue.as_str()).await?;
        Ok(())
    }

    async fn send(
        &self,
        queue: &QueueRef,
        request: &SendRequest,
    ) -> Result<SendReceipt, QueueError> {
        if request.body.len() > MAX_PAYLOAD_BYTES {
            return Err(QueueError::PayloadTooLarge {
                size: Some(request.body.len()),
                max_size: MAX_PAYLOAD_BYTES,
            });
        }

        let mut params = Params::new("SendMessage");
        params.push("QueueUrl", self.queue_url(queue).await?);
        params.push("MessageBody", request.body.as_str());
        if let Some(delay) = request.delay_seconds {
            params.push("DelaySeconds", delay.to_string());
        }
        if let Some(group_id) = &request.group_id {
            params.push("MessageGroupId", group_id.as_str());
        }
        if let Some(deduplication_id) = &request.deduplication_id {
            params.push("MessageDeduplicationId", deduplication_id.as_str());
        }
        params.push_attributes("", &request.attributes);

        let xml = self.call(params, queue.as_str()).await?;
        Ok(parse_send_response(&xml)?)
    }

    async fn send_batch(
        &self,
        queue: &QueueRef,
        entries: &[BatchEntry],
    ) -> Result<BatchSendResult, QueueError> {
        if entries.is_empty() || entries.len() > MAX_BATCH_ENTRIES {
            return Err(ValidationError::OutOfRange {
                field: "entries".to_string(),
                message: format!(
                    "batch must hold 1 to {} entries, got {}",
                    MAX_BATCH_ENTRIES,
                    entries.len()
                ),
            }
            .into());
        }

        let total: usize = entries.iter().map(|e| e.body.len()).sum();
        if total > MAX_PAYLOAD_BYTES {
            return Err(QueueError::PayloadTooLarge {
                size: Some(total),
                max_size: MAX_PAYLOAD_BYTES,
            });
        }

        let mut params = Params::new("SendMessageBatch");
        params.push("QueueUrl", self.queue_url(queue).await?);
        for (index, entry) in entries.iter().enumerate() {
            let prefix = format!("SendMessageBatchRequestEntry.{}.", index + 1);
            params.push(format!("{}Id", prefix), entry.id.as_str());
            params.push(format!("{}MessageBody", prefix), entry.body.as_str());
            if let Some(delay) = entry.delay_seconds {
                params.push(format!("{}DelaySeconds", prefix), delay.to_string());
            }
            if let Some(group_id) = &entry.group_id {
                params.push(format!("{}MessageGroupId", prefix), group_id.as_str());
            }
            if let Some(deduplication_id) = &entry.deduplication_id {
                params.push(
                    format!("{}MessageDeduplicationId", prefix),
                    deduplication_id.as_str(),
                );
            }
            params.push_attributes(&prefix, &entry.attributes);
        }

        let xml = self.call(params, queue.as_str()).await?;
        Ok(parse_batch_response(&xml)?)
    }

    async fn resolve_url(&self, name: &str) -> Result<QueueRef, QueueError> {
        if name.starts_with("https://") || name.starts_with("http://") {
            return Ok(QueueRef::new(name)?);
        }

        {
            let cache = self.queue_url_cache.read().await;
            if let Some(url) = cache.get(name) {
                return Ok(url.clone());
            }
        }

        let mut params = Params::new("GetQueueUrl");
        params.push("QueueName", name);

        let xml = self.call(params, name).await?;
        let url = QueueRef::new(parse_queue_url_response(&xml)?)?;

        debug!(queue = %name, url = %url, "Resolved queue URL");
        self.queue_url_cache
            .write()
            .await
            .insert(name.to_string(), url.clone());

        Ok(url)
    }

    async fn get_attributes(
        &self,
        queue: &QueueRef,
        names: &[String],
    ) -> Result<HashMap<String, String>, QueueError> {
        let mut params = Params::new("GetQueueAttributes");
        params.push("QueueUrl", self.queue_url(queue).await?);
        params.push_list("AttributeName", names);

        let xml = self.call(params, queue.as_str()).await?;
        Ok(parse_attributes_response(&xml)?)
    }
}

fn resolve_credentials(config: &SqsConfig) -> Option<(String, String)> {
    let access_key = config
        .access_key_id
        .clone()
        .or_else(|| std::env::var("AWS_ACCESS_KEY_ID").ok())
        .filter(|k| !k.is_empty())?;
    let secret_key = config
        .secret_access_key
        .clone()
        .or_else(|| std::env::var("AWS_SECRET_ACCESS_KEY").ok())
        .filter(|k| !k.is_empty())?;

    Some((access_key, secret_key))
}

fn transport_error(e: reqwest::Error) -> QueueError {
    if e.is_timeout() {
        QueueError::Timeout {
            message: e.to_string(),
        }
    } else {
        QueueError::ConnectionFailed {
            message: e.to_string(),
        }
    }
}

// ============================================================================
// Response Parsing
// ============================================================================

/// Node handed to an [`walk_xml`] visitor, with the names of the enclosing
/// elements (innermost last)
enum XmlNode<'a> {
    Text { path: &'a [String], text: String },
    End { path: &'a [String] },
}

/// Stream an XML document through `visit`.
///
/// Text is not trimmed: message bodies keep surrounding whitespace, and
/// whitespace between elements never lands on a path a visitor looks at.
fn walk_xml<F>(xml: &str, mut visit: F) -> Result<(), SerializationError>
where
    F: FnMut(XmlNode<'_>) -> Result<(), SerializationError>,
{
    let mut reader = Reader::from_str(xml);
    let mut path: Vec<String> = Vec::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                path.push(String::from_utf8_lossy(e.local_name().as_ref()).into_owned());
            }
            Ok(Event::Text(e)) => {
                let text = e
                    .unescape()
                    .map_err(|e| SerializationError::Xml {
                        message: e.to_string(),
                    })?
                    .into_owned();
                visit(XmlNode::Text { path: &path, text })?;
            }
            Ok(Event::End(_)) => {
                visit(XmlNode::End { path: &path })?;
                path.pop();
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(SerializationError::Xml {
                    message: e.to_string(),
                })
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(())
}

/// Whether `path` ends with the element names in `suffix`
fn at(path: &[String], suffix: &[&str]) -> bool {
    path.len() >= suffix.len()
        && path[path.len() - suffix.len()..]
            .iter()
            .zip(suffix)
            .all(|(name, expected)| name.as_str() == *expected)
}

fn missing(element: &str) -> SerializationError {
    SerializationError::MissingElement {
        element: element.to_string(),
    }
}

fn parse_message_id(raw: Option<String>) -> Result<MessageId, SerializationError> {
    raw.and_then(|id| id.parse().ok())
        .ok_or_else(|| missing("MessageId"))
}

#[derive(Default)]
struct PartialMessage {
    message_id: Option<String>,
    receipt_handle: Option<String>,
    body: String,
    attributes: HashMap<String, String>,
    attribute_name: Option<String>,
    message_attributes: MessageAttributes,
    user_attribute_name: Option<String>,
    user_data_type: String,
    user_value: String,
}

impl PartialMessage {
    fn finish(self) -> Result<ReceivedMessage, SerializationError> {
        let receipt_handle = self
            .receipt_handle
            .ok_or_else(|| missing("ReceiptHandle"))?;

        Ok(ReceivedMessage {
            message_id: parse_message_id(self.message_id)?,
            body: self.body,
            attributes: self.attributes,
            message_attributes: self.message_attributes,
            ack_token: AckToken::new(receipt_handle),
        })
    }
}

fn parse_receive_response(xml: &str) -> Result<Vec<ReceivedMessage>, SerializationError> {
    let mut messages = Vec::new();
    let mut current = PartialMessage::default();

    walk_xml(xml, |node| {
        match node {
            XmlNode::Text { path, text } => {
                if at(path, &["Message", "MessageId"]) {
                    current.message_id = Some(text);
                } else if at(path, &["Message", "ReceiptHandle"]) {
                    current.receipt_handle = Some(text);
                } else if at(path, &["Message", "Body"]) {
                    current.body = text;
                } else if at(path, &["Message", "Attribute", "Name"]) {
                    current.attribute_name = Some(text);
                } else if at(path, &["Message", "Attribute", "Value"]) {
                    if let Some(name) = current.attribute_name.take() {
                        current.attributes.insert(name, text);
                    }
                } else if at(path, &["Message", "MessageAttribute", "Name"]) {
                    current.user_attribute_name = Some(text);
                } else if at(path, &["MessageAttribute", "Value", "DataType"]) {
                    current.user_data_type = text;
                } else if at(path, &["MessageAttribute", "Value", "StringValue"]) {
                    current.user_value = text;
                }
            }
            XmlNode::End { path } => {
                if at(path, &["Message", "MessageAttribute"]) {
                    if let Some(name) = current.user_attribute_name.take() {
                        current.message_attributes.insert(
                            name,
                            MessageAttribute {
                                data_type: std::mem::take(&mut current.user_data_type),
                                string_value: std::mem::take(&mut current.user_value),
                            },
                        );
                    }
                } else if at(path, &["ReceiveMessageResult", "Message"]) {
                    messages.push(std::mem::take(&mut current).finish()?);
                }
            }
        }
        Ok(())
    })?;

    Ok(messages)
}

fn parse_send_response(xml: &str) -> Result<SendReceipt, SerializationError> {
    let mut message_id = None;
    let mut sequence_number = None;

    walk_xml(xml, |node| {
        if let XmlNode::Text { path, text } = node {
            if at(path, &["SendMessageResult", "MessageId"]) {
                message_id = Some(text);
            } else if at(path, &["SendMessageResult", "SequenceNumber"]) {
                sequence_number = Some(text);
            }
        }
        Ok(())
    })?;

    Ok(SendReceipt {
        message_id: parse_message_id(message_id)?,
        sequence_number,
    })
}

fn parse_batch_response(xml: &str) -> Result<BatchSendResult, SerializationError> {
    let mut result = BatchSendResult::default();
    let mut id = None;
    let mut message_id = None;
    let mut code = String::new();
    let mut message = String::new();
    let mut sender_fault = false;

    walk_xml(xml, |node| {
        match node {
            XmlNode::Text { path, text } => {
                if at(path, &["SendMessageBatchResultEntry", "Id"])
                    || at(path, &["BatchResultErrorEntry", "Id"])
                {
                    id = Some(text);
                } else if at(path, &["SendMessageBatchResultEntry", "MessageId"]) {
                    message_id = Some(text);
                } else if at(path, &["BatchResultErrorEntry", "Code"]) {
                    code = text;
                } else if at(path, &["BatchResultErrorEntry", "Message"]) {
                    message = text;
                } else if at(path, &["BatchResultErrorEntry", "SenderFault"]) {
                    sender_fault = text.trim().eq_ignore_ascii_case("true");
                }
            }
            XmlNode::End { path } => {
                if at(path, &["SendMessageBatchResultEntry"]) {
                    result.successful.push(BatchResultEntry {
                        id: id.take().ok_or_else(|| missing("Id"))?,
                        message_id: parse_message_id(message_id.take())?,
                    });
                } else if at(path, &["BatchResultErrorEntry"]) {
                    result.failed.push(BatchResultError {
                        id: id.take().ok_or_else(|| missing("Id"))?,
                        code: std::mem::take(&mut code),
                        message: std::mem::take(&mut message),
                        sender_fault: std::mem::take(&mut sender_fault),
                    });
                }
            }
        }
        Ok(())
    })?;

    Ok(result)
}

fn parse_queue_url_response(xml: &str) -> Result<String, SerializationError> {
    let mut url = None;

    walk_xml(xml, |node| {
        if let XmlNode::Text { path, text } = node {
            if at(path, &["GetQueueUrlResult", "QueueUrl"]) {
                url = Some(text);
            }
        }
        Ok(())
    })?;

    url.ok_or_else(|| missing("QueueUrl"))
}

fn parse_attributes_response(xml: &str) -> Result<HashMap<String, String>, SerializationError> {
    let mut attributes = HashMap::new();
    let mut name = None;

    walk_xml(xml, |node| {
        if let XmlNode::Text { path, text } = node {
            if at(path, &["GetQueueAttributesResult", "Attribute", "Name"]) {
                name = Some(text);
            } else if at(path, &["GetQueueAttributesResult", "Attribute", "Value"]) {
                if let Some(name) = name.take() {
                    attributes.insert(name, text);
                }
            }
        }
        Ok(())
    })?;

    Ok(attributes)
}

/// Map an error response to a [`QueueError`]
fn parse_error_response(xml: &str, status: u16, context: &str) -> QueueError {
    let mut code = None;
    let mut message = None;

    // A malformed error body still yields an error, just a less specific one
    let _ = walk_xml(xml, |node| {
        if let XmlNode::Text { path, text } = node {
            if at(path, &["Error", "Code"]) {
                code = Some(text);
            } else if at(path, &["Error", "Message"]) {
                message = Some(text);
            }
        }
        Ok(())
    });

    let code = code.unwrap_or_else(|| format!("HTTP{}", status));
    let message = message.unwrap_or_else(|| "no error message returned".to_string());

    let kind = code.clone();
    match kind.as_str() {
        "AWS.SimpleQueueService.NonExistentQueue" | "QueueDoesNotExist" => {
            QueueError::QueueNotFound {
                queue_name: context.to_string(),
            }
        }
        "AWS.SimpleQueueService.BatchRequestTooLong" | "BatchRequestTooLong" => {
            QueueError::PayloadTooLarge {
                size: None,
                max_size: MAX_PAYLOAD_BYTES,
            }
        }
        "InvalidClientTokenId" | "UnrecognizedClientException" | "SignatureDoesNotMatch" => {
            QueueError::AuthenticationFailed {
                message: format!("{}: {}", code, message),
            }
        }
        "ReceiptHandleIsInvalid" | "InvalidReceiptHandle" => QueueError::InvalidAckToken {
            receipt: message,
        },
        "InvalidParameterValue"
        | "MissingParameter"
        | "InvalidMessageContents"
        | "AWS.SimpleQueueService.TooManyEntriesInBatchRequest"
        | "AWS.SimpleQueueService.EmptyBatchRequest"
        | "AWS.SimpleQueueService.BatchEntryIdsNotDistinct"
        | "AWS.SimpleQueueService.InvalidBatchEntryId" => ValidationError::InvalidFormat {
            field: code,
            message,
        }
        .into(),
        _ if status == 401 || status == 403 => QueueError::AuthenticationFailed {
            message: format!("{}: {}", code, message),
        },
        _ => QueueError::ProviderError {
            provider: PROVIDER.to_string(),
            code,
            message,
        },
    }
}
