//! Wire types for JSON-RPC 2.0 requests and responses.

use serde::{Deserialize, Serialize};

/// The JSON-RPC protocol version. Only `2.0` is supported.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Version;

impl Serialize for Version {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str("2.0")
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let version = String::deserialize(deserializer)?;
        if version == "2.0" {
            Ok(Version)
        } else {
            Err(serde::de::Error::custom(format!(
                "unsupported JSON-RPC version: {version}"
            )))
        }
    }
}

/// A JSON-RPC request id. The client only ever emits `Id::Num`, but the
/// server may echo back a string or null, so all three are accepted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Id {
    /// A numeric id, as emitted by this client.
    Num(u64),
    /// A string id.
    Str(String),
    /// A null id, returned by some servers on malformed requests.
    Null(()),
}

impl Id {
    /// Returns the numeric id, if this is one.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Id::Num(id) => Some(*id),
            _ => None,
        }
    }
}

/// A single JSON-RPC request.
#[derive(Clone, Debug, Serialize)]
pub struct Request<MethodT: Serialize> {
    pub jsonrpc: Version,
    pub id: Id,
    #[serde(flatten)]
    pub method: MethodT,
}

/// A JSON-RPC error object.
#[derive(Clone, Debug, Deserialize, Serialize, thiserror::Error)]
#[error("{message} (code {code})")]
pub struct Error {
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

/// The `result`/`error` half of a JSON-RPC response.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ResponseData<SuccessT> {
    Success { result: SuccessT },
    Error { error: Error },
}

impl<SuccessT> ResponseData<SuccessT> {
    /// Converts into a plain [`Result`].
    pub fn into_result(self) -> Result<SuccessT, Error> {
        match self {
            ResponseData::Success { result } => Ok(result),
            ResponseData::Error { error } => Err(error),
        }
    }
}

/// A single JSON-RPC response.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Response<SuccessT> {
    pub jsonrpc: Version,
    pub id: Id,
    #[serde(flatten)]
    pub data: ResponseData<SuccessT>,
}

/// Formats a block number as the `0x`-prefixed hex quantity the JSON-RPC
/// methods expect.
pub fn block_number_to_quantity(block_number: u64) -> String {
    format!("0x{block_number:x}")
}
