//! `RawCallFrame` → `CallFrame` (§4.5).

use etl_types::{entities::CallFrame, hex::normalize_address, raw::RawCallFrame};

use crate::error::{decode_bytes, MapperError};

/// Maps a `callTracer` call frame, recursing into its children. `input`
/// missing entirely maps to an empty byte string (some tracers omit it for
/// frames with no calldata); `output` stays `None` for frames that never
/// returned (e.g. a reverted nested call), matching [`CallFrame`]'s use of
/// `output` only to carry deployed bytecode for `create`/`create2` frames.
pub fn map_call_frame(raw: &RawCallFrame) -> Result<CallFrame, MapperError> {
    let calls = raw
        .calls
        .iter()
        .map(map_call_frame)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(CallFrame {
        call_type: raw.call_type.clone(),
        from: normalize_address(raw.from.as_deref()),
        to: normalize_address(raw.to.as_deref()),
        input: decode_bytes(raw.input.as_deref(), "input")?.unwrap_or_default(),
        output: decode_bytes(raw.output.as_deref(), "output")?,
        error: raw.error.clone(),
        calls,
    })
}
