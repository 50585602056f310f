//! `maxlength` guard for text filled into form controls.

use crate::control::{FormControl, ValueControl};
use crate::error::FillError;

/// Input types on which `maxlength` constrains user input.
const MAXLENGTH_INPUT_TYPES: &[&str] = &["text", "search", "url", "tel", "email", "password"];

/// Fails with [`FillError::MaxLengthExceeded`] when `text` is longer than the
/// control's declared `maxlength`.
///
/// Length is counted in UTF-16 code units, as the DOM counts it. Controls
/// without a valid `maxlength`, and input types the attribute does not apply
/// to, always pass.
pub fn guard_for_maxlength(control: &FormControl, text: &str, description: &str) -> Result<(), FillError> {
    let applies = match control {
        FormControl::TextArea(_) => true,
        FormControl::Input(input) => MAXLENGTH_INPUT_TYPES.contains(&input.input_type().as_str()),
        FormControl::Select(_) => false,
    };
    if !applies {
        return Ok(());
    }

    match control.as_value_control().max_length() {
        Some(max_length) if text.encode_utf16().count() > max_length => Err(FillError::MaxLengthExceeded {
            description: description.to_string(),
            text: text.to_string(),
            max_length,
        }),
        _ => Ok(()),
    }
}
