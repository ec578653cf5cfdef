//! The mapping-layer error type.

/// Failures while turning a JSON-RPC response into a domain entity. These
/// are always treated as malformed-response failures by callers (§7):
/// a well-behaved node never produces them.
#[derive(Debug, thiserror::Error)]
pub enum MapperError {
    #[error("field '{0}' was required but missing or null")]
    MissingField(&'static str),

    #[error("field '{field}' had an invalid hex value: {source}")]
    InvalidHex {
        field: &'static str,
        #[source]
        source: etl_types::hex::HexError,
    },
}

pub(crate) trait OptionExt<T> {
    fn required(self, field: &'static str) -> Result<T, MapperError>;
}

impl<T> OptionExt<T> for Option<T> {
    fn required(self, field: &'static str) -> Result<T, MapperError> {
        self.ok_or(MapperError::MissingField(field))
    }
}

pub(crate) fn decode_u64(
    value: Option<&str>,
    field: &'static str,
) -> Result<Option<u64>, MapperError> {
    etl_types::hex::decode_u64(value).map_err(|source| MapperError::InvalidHex { field, source })
}

pub(crate) fn decode_u256(
    value: Option<&str>,
    field: &'static str,
) -> Result<Option<etl_types::U256>, MapperError> {
    etl_types::hex::decode_u256(value).map_err(|source| MapperError::InvalidHex { field, source })
}

pub(crate) fn decode_bytes(
    value: Option<&str>,
    field: &'static str,
) -> Result<Option<Vec<u8>>, MapperError> {
    etl_types::hex::decode_bytes(value).map_err(|source| MapperError::InvalidHex { field, source })
}
