//! Small output helpers: ordered string fragments written to a target stream.

use crate::env::Environment;
use std::io::{self, Write};

/// Write `fragments` back to back and flush.
pub fn write_fragments(out: &mut dyn Write, fragments: &[&str]) -> io::Result<()> {
    for fragment in fragments {
        out.write_all(fragment.as_bytes())?;
    }
    out.flush()
}

/// Write a diagnostic line: `<name>: <line>: <fragments...>\n`.
///
/// Failures to write are logged and otherwise ignored; a broken stderr must
/// not stop the interpreter.
pub fn report(out: &mut dyn Write, env: &Environment, fragments: &[&str]) {
    let line = env.line_number.to_string();
    let mut all = Vec::with_capacity(fragments.len() + 5);
    all.extend([env.name.as_str(), ": ", line.as_str(), ": "]);
    all.extend_from_slice(fragments);
    all.push("\n");
    if let Err(e) = write_fragments(out, &all) {
        tracing::warn!(error = %e, "failed to write diagnostic");
    }
}
