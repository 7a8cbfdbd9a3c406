#[cfg(test)]
#[path = "codec_test.rs"]
mod tests;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("invalid utf-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// encode turns text into the padded standard base64 of its UTF-8 bytes.
pub fn encode(text: &str) -> String {
    BASE64.encode(text.as_bytes())
}

/// decode reverses [`encode`]. The input is padding corrected first, so units
/// sent without their trailing `=` decode as well.
pub fn decode(b64: &str) -> Result<String, DecodeError> {
    let bytes = BASE64.decode(fix_padding(b64))?;
    Ok(String::from_utf8(bytes)?)
}

/// fix_padding drops every `=` and pads the rest up to a multiple of four.
pub fn fix_padding(b64: &str) -> String {
    let mut ret = b64.replace('=', "");
    let missing = ret.len() % 4;
    if missing != 0 {
        ret.push_str(&"=".repeat(4 - missing));
    }
    ret
}
