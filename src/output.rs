//! Output mode shared by every command
//!
//! Human output goes through [`crate::ui`]; JSON output is a single document
//! on stdout so it can be piped.

use serde::Serialize;
use std::sync::OnceLock;

static QUIET: OnceLock<bool> = OnceLock::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Human,
    Json,
}

impl OutputMode {
    pub fn from_flag(json: bool) -> Self {
        if json { OutputMode::Json } else { OutputMode::Human }
    }

    pub fn is_json(&self) -> bool {
        matches!(self, OutputMode::Json)
    }
}

/// `GRAPHWIRE_QUIET=1` suppresses progress bars and banners
pub fn is_quiet() -> bool {
    *QUIET.get_or_init(|| {
        std::env::var("GRAPHWIRE_QUIET")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false)
    })
}

/// Pretty JSON document for `value`, with a trailing newline
pub fn to_json<T: Serialize>(value: &T) -> crate::Result<String> {
    let mut text = serde_json::to_string_pretty(value)?;
    text.push('\n');
    Ok(text)
}

pub fn print_json<T: Serialize>(value: &T) -> crate::Result<()> {
    print!("{}", to_json(value)?);
    Ok(())
}
