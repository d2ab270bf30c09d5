//! Header artifact output.

use std::fs;
use std::path::Path;

use compliance_model::CaseKind;

use crate::errors::WriteError;

/// Renders the complete header text: guard macro, then one line per body line.
#[must_use]
pub fn render_header(kind: CaseKind, lines: &[String]) -> String {
    let mut text = format!("#define AUTOGEN_{}\n", kind.tag());
    for line in lines {
        text.push_str(line);
        text.push('\n');
    }
    text
}

/// Writes the rendered header to `path` in one write.
///
/// # Errors
///
/// Returns [`WriteError`] when the file cannot be created or written.
pub fn emit(path: &Path, kind: CaseKind, lines: &[String]) -> Result<(), WriteError> {
    let text = render_header(kind, lines);
    fs::write(path, text).map_err(|e| WriteError::new(path.to_path_buf(), &e))?;
    log::info!("wrote {} ({} lines)", path.display(), lines.len() + 1);
    Ok(())
}
