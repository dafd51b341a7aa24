use std::{collections::BTreeMap, time::Duration};

use async_trait::async_trait;
use courier_core::{BatchEnvelope, RawResponse, RequestContext, RequestDescriptor};
use reqwest::{Client, StatusCode, header::CONTENT_TYPE};
use serde_json::Value;

use crate::{
    TransportError,
    codec::{self, BATCH_REQUEST},
    config::ClientConfig,
    transport::Transport,
};

/// Transport posting SOAP-over-JSON bodies to the server with reqwest.
///
/// No retries; timeouts come from per-descriptor transport options.
pub struct HttpTransport {
    client: Client,
    /// Scheme and host, e.g. `https://mail.example.com`.
    origin: String,
    /// SOAP service path appended to the origin.
    soap_path: String,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Result<Self, TransportError> {
        let client = Client::builder()
            .user_agent(concat!("courier/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| TransportError::Request(err.to_string()))?;
        Ok(Self::with_client(client, config))
    }

    pub fn with_client(client: Client, config: &ClientConfig) -> Self {
        Self {
            client,
            origin: config.origin.trim_end_matches('/').to_string(),
            soap_path: config.soap_path.clone(),
        }
    }

    fn url(&self, element: &str) -> String {
        format!("{}{}/{}", self.origin, self.soap_path, element)
    }

    async fn post(
        &self,
        element: &str,
        body: &Value,
        headers: &BTreeMap<String, String>,
        timeout: Option<Duration>,
    ) -> Result<Value, TransportError> {
        let url = self.url(element);
        let mut request = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "application/json")
            .body(codec::encode(body)?);
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        tracing::debug!(url = %url, "posting soap request");
        let response = request.send().await.map_err(map_reqwest_error)?;
        let status = response.status();
        let bytes = response.bytes().await.map_err(map_reqwest_error)?;
        classify(status, &bytes)
    }
}

/// Decides whether a reply is a SOAP document or a failed wire call.
///
/// Error statuses still carry faults in a SOAP body, so those decode normally.
fn classify(status: StatusCode, bytes: &[u8]) -> Result<Value, TransportError> {
    match codec::decode::<Value>(bytes) {
        Ok(document) if status.is_success() || document.get("Body").is_some() => Ok(document),
        Err(err) if status.is_success() => Err(err),
        _ => Err(TransportError::Http {
            status: status.as_u16(),
            body: String::from_utf8_lossy(bytes).into_owned(),
        }),
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn dispatch(
        &self,
        envelope: &BatchEnvelope,
        context: &RequestContext,
    ) -> Result<RawResponse, TransportError> {
        let mut headers = BTreeMap::new();
        let mut timeout: Option<Duration> = None;
        for descriptor in envelope.iter() {
            headers.extend(descriptor.headers.clone());
            let requested = descriptor.transport_options.as_ref().and_then(|o| o.timeout);
            timeout = timeout.max(requested);
        }

        let body = codec::batch_body(envelope, context);
        let document = self.post(BATCH_REQUEST, &body, &headers, timeout).await?;
        codec::decode_batch(&document, envelope.len())
    }

    async fn dispatch_single(
        &self,
        descriptor: &RequestDescriptor,
        context: &RequestContext,
    ) -> Result<RawResponse, TransportError> {
        let timeout = descriptor.transport_options.as_ref().and_then(|o| o.timeout);
        let body = codec::single_body(descriptor, context);
        let document = self
            .post(
                &codec::request_name(&descriptor.name),
                &body,
                &descriptor.headers,
                timeout,
            )
            .await?;
        codec::decode_single(&document)
    }
}

fn map_reqwest_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::Request(err.to_string())
    }
}
