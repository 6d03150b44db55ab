use crate::errors::UtfError;
use std::sync::Arc;

/// Decodes resource content as text.
///
/// UTF-16 content is only recognized with a byte order mark (BOM),
/// and is converted to UTF-8. Anything else must be valid UTF-8.
pub(crate) fn into_utf8_str(data: &[u8]) -> Result<String, UtfError> {
    if is_utf16(data) {
        from_utf16(data)
    } else {
        String::from_utf8(strip_utf8_bom(data).to_vec()).map_err(UtfError::InvalidUtf8)
    }
}

fn strip_utf8_bom(data: &[u8]) -> &[u8] {
    data.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(data)
}

/// Checks if a UTF-16 byte order mark (BOM) exists
fn is_utf16(data: &[u8]) -> bool {
    data.starts_with(b"\xFF\xFE") || data.starts_with(b"\xFE\xFF")
}

fn from_utf16(data: &[u8]) -> Result<String, UtfError> {
    // Determine byte order for little endian (le) and big endian (be)
    let endian = if data.starts_with(b"\xFF") {
        u16::from_le_bytes
    } else {
        u16::from_be_bytes
    };

    let utf16 = data[2..]
        .chunks(2)
        .map(|chunk| chunk.try_into().map(endian))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| UtfError::UnevenByteCount)?;

    String::from_utf16(&utf16).map_err(|error| UtfError::InvalidUtf16(Arc::new(error)))
}
