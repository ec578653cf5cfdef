use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use reqwest::Client as HttpClient;
use reqwest_middleware::{ClientBuilder as HttpClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use serde::{de::DeserializeOwned, Serialize};

use crate::{
    error::{MiddlewareError, ReqwestError},
    jsonrpc::{self, Id, Request, Response, Version},
};

// Retry parameters for the underlying HTTP transport. The batch work
// executor (`etl_executor`) applies its own, coarser-grained retry on top of
// this for whole-batch failures; this layer only smooths over single-request
// blips so a batch doesn't fail on a single dropped TCP connection.
const EXPONENT_BASE: u32 = 2;
const MIN_RETRY_INTERVAL: Duration = Duration::from_millis(250);
const MAX_RETRY_INTERVAL: Duration = Duration::from_secs(8);
const MAX_HTTP_RETRIES: u32 = 3;

/// Errors returned by [`RpcClient`].
#[derive(Debug, thiserror::Error)]
pub enum RpcClientError {
    /// The request could not be sent to the remote node.
    #[error(transparent)]
    FailedToSend(MiddlewareError),

    /// The remote node failed to reply with a readable response body.
    #[error("the response body was corrupted: {0}")]
    CorruptedResponse(ReqwestError),

    /// The HTTP server returned a non-2xx status code.
    #[error("the node returned HTTP error status: {0}")]
    HttpStatus(ReqwestError),

    /// The request could not be serialized as JSON.
    #[error(transparent)]
    InvalidJsonRequest(serde_json::Error),

    /// The server returned a body that did not parse as a JSON-RPC response.
    #[error("response '{response}' failed to parse as '{expected_type}': {error}")]
    InvalidResponse {
        response: String,
        expected_type: &'static str,
        error: serde_json::Error,
    },

    /// The server's batch response had a different length than the request.
    #[error("batch of {requested} requests got {received} responses")]
    BatchLengthMismatch { requested: usize, received: usize },

    /// A response in a batch carried an id that did not match any request.
    #[error("response carried an id that was not part of the request: {0:?}")]
    UnknownResponseId(Id),

    /// Invalid URL format.
    #[error(transparent)]
    InvalidUrl(#[from] url::ParseError),

    /// The JSON-RPC call returned an application-level error.
    #[error("{error}")]
    JsonRpcError { error: jsonrpc::Error },
}

impl RpcClientError {
    /// Whether this failure is transient and worth retrying at the batch
    /// level (on top of the HTTP-level retries this client already does).
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            RpcClientError::FailedToSend(_)
                | RpcClientError::CorruptedResponse(_)
                | RpcClientError::HttpStatus(_)
        )
    }
}

/// A client for executing batched JSON-RPC calls against an Ethereum-family
/// node.
#[derive(Debug, Clone)]
pub struct RpcClient {
    url: url::Url,
    client: ClientWithMiddleware,
    next_id: std::sync::Arc<AtomicU64>,
}

impl RpcClient {
    /// Creates a new client pointed at `url`.
    pub fn new(url: &str) -> Result<Self, RpcClientError> {
        let retry_policy = ExponentialBackoff::builder()
            .retry_bounds(MIN_RETRY_INTERVAL, MAX_RETRY_INTERVAL)
            .base(EXPONENT_BASE)
            .build_with_max_retries(MAX_HTTP_RETRIES);

        let http_client = HttpClient::builder()
            .build()
            .expect("default construction cannot fail");

        let client = HttpClientBuilder::new(http_client)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Ok(RpcClient {
            url: url.parse()?,
            client,
            next_id: std::sync::Arc::new(AtomicU64::new(0)),
        })
    }

    fn next_id(&self) -> Id {
        Id::Num(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    #[tracing::instrument(level = "trace", skip(self))]
    async fn post(&self, body: String) -> Result<String, RpcClientError> {
        self.client
            .post(self.url.clone())
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|error| RpcClientError::FailedToSend(error.into()))?
            .error_for_status()
            .map_err(|error| RpcClientError::HttpStatus(error.into()))?
            .text()
            .await
            .map_err(|error| RpcClientError::CorruptedResponse(error.into()))
    }

    /// Calls a single JSON-RPC method and returns its decoded result.
    #[tracing::instrument(level = "trace", skip(self, method))]
    pub async fn call<MethodT, SuccessT>(&self, method: MethodT) -> Result<SuccessT, RpcClientError>
    where
        MethodT: Serialize,
        SuccessT: DeserializeOwned,
    {
        let request = Request {
            jsonrpc: Version,
            id: self.next_id(),
            method,
        };
        let body =
            serde_json::to_string(&request).map_err(RpcClientError::InvalidJsonRequest)?;

        let response_text = self.post(body).await?;
        let response: Response<SuccessT> = serde_json::from_str(&response_text).map_err(|error| {
            RpcClientError::InvalidResponse {
                response: response_text,
                expected_type: std::any::type_name::<Response<SuccessT>>(),
                error,
            }
        })?;

        response
            .data
            .into_result()
            .map_err(|error| RpcClientError::JsonRpcError { error })
    }

    /// Calls a batch of JSON-RPC methods as a single HTTP request and
    /// returns one result per input method, in the same order as `methods`.
    ///
    /// A single method-level JSON-RPC error does not fail the whole batch:
    /// each slot carries its own `Result`.
    #[tracing::instrument(level = "trace", skip(self, methods))]
    pub async fn call_batch<MethodT, SuccessT>(
        &self,
        methods: Vec<MethodT>,
    ) -> Result<Vec<Result<SuccessT, jsonrpc::Error>>, RpcClientError>
    where
        MethodT: Serialize,
        SuccessT: DeserializeOwned,
    {
        if methods.is_empty() {
            return Ok(Vec::new());
        }

        let requests: Vec<Request<MethodT>> = methods
            .into_iter()
            .map(|method| Request {
                jsonrpc: Version,
                id: self.next_id(),
                method,
            })
            .collect();
        let requested_ids: Vec<Id> = requests.iter().map(|request| request.id.clone()).collect();

        let body =
            serde_json::to_string(&requests).map_err(RpcClientError::InvalidJsonRequest)?;
        let response_text = self.post(body).await?;

        let mut responses: Vec<Response<SuccessT>> =
            serde_json::from_str(&response_text).map_err(|error| {
                RpcClientError::InvalidResponse {
                    response: response_text,
                    expected_type: std::any::type_name::<Vec<Response<SuccessT>>>(),
                    error,
                }
            })?;

        if responses.len() != requested_ids.len() {
            return Err(RpcClientError::BatchLengthMismatch {
                requested: requested_ids.len(),
                received: responses.len(),
            });
        }

        // The JSON-RPC spec does not guarantee the server preserves request
        // order within a batch response; reorder defensively by id so the
        // caller can zip results 1:1 with its own input order.
        let mut ordered = Vec::with_capacity(requested_ids.len());
        for id in &requested_ids {
            let position = responses
                .iter()
                .position(|response| &response.id == id)
                .ok_or_else(|| RpcClientError::UnknownResponseId(id.clone()))?;
            ordered.push(responses.swap_remove(position));
        }

        Ok(ordered.into_iter().map(|response| response.data.into_result()).collect())
    }
}

#[cfg(test)]
mod tests {
    use serde::Serialize;
    use serde_json::json;
    use wiremock::{
        matchers::{method, path},
        Mock, MockServer, ResponseTemplate,
    };

    use super::*;

    #[derive(Serialize)]
    #[serde(tag = "method", content = "params")]
    enum TestMethod {
        #[serde(rename = "eth_blockNumber")]
        BlockNumber([(); 0]),
    }

    #[tokio::test]
    async fn single_call_decodes_result() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": 0,
                "result": "0xb443"
            })))
            .mount(&server)
            .await;

        let client = RpcClient::new(&server.uri()).unwrap();
        let result: String = client
            .call(TestMethod::BlockNumber([]))
            .await
            .expect("call should succeed");
        assert_eq!(result, "0xb443");
    }

    #[tokio::test]
    async fn batch_call_reorders_by_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "jsonrpc": "2.0", "id": 1, "result": "second" },
                { "jsonrpc": "2.0", "id": 0, "result": "first" },
            ])))
            .mount(&server)
            .await;

        let client = RpcClient::new(&server.uri()).unwrap();
        let results: Vec<Result<String, jsonrpc::Error>> = client
            .call_batch(vec![
                TestMethod::BlockNumber([]),
                TestMethod::BlockNumber([]),
            ])
            .await
            .expect("batch call should succeed");

        assert_eq!(results[0].as_ref().unwrap(), "first");
        assert_eq!(results[1].as_ref().unwrap(), "second");
    }

    #[tokio::test]
    async fn batch_call_with_mismatched_length_fails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "jsonrpc": "2.0", "id": 0, "result": "only one" },
            ])))
            .mount(&server)
            .await;

        let client = RpcClient::new(&server.uri()).unwrap();
        let error = client
            .call_batch::<_, String>(vec![
                TestMethod::BlockNumber([]),
                TestMethod::BlockNumber([]),
            ])
            .await
            .expect_err("batch call should fail on length mismatch");

        assert!(matches!(error, RpcClientError::BatchLengthMismatch { .. }));
    }

    #[tokio::test]
    async fn http_error_status_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = RpcClient::new(&server.uri()).unwrap();
        let error = client
            .call::<_, String>(TestMethod::BlockNumber([]))
            .await
            .expect_err("call should fail");

        assert!(error.is_transient());
    }
}
