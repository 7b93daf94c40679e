//! Tera-backed file renderer.

use std::path::Path;

use dotwork_core::{
    application::ports::{FileRenderer, RenderOutcome, RenderedFile},
    domain::Variables,
};
use tera::{Context, Tera};
use tracing::{debug, instrument, warn};

use super::placeholders::find_placeholders;

/// Extensions (lowercase, without the dot) of files that may be rendered.
/// Everything else is copied byte-for-byte.
pub const TEXT_EXTENSIONS: &[&str] = &[
    "txt", "yml", "yaml", "json", "properties", "conf", "cfg", "sh", "bat", "cmd", "ps1", "xml",
    "html", "css", "js", "py", "java", "cpp", "c", "h", "md", "ini", "toml",
];

/// Whether `path` has a renderable text extension (case-insensitive).
pub fn is_text_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            TEXT_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
}

/// Renders text files containing `{{ name }}` placeholders through Tera.
///
/// Rendering never fails. Binary and non-UTF-8 content passes through
/// untouched, and an engine error falls back to the original bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct TeraRenderer;

impl TeraRenderer {
    pub fn new() -> Self {
        Self
    }

    fn render_text(text: &str, variables: &Variables) -> Result<String, tera::Error> {
        let context = Context::from_serialize(variables)?;
        Tera::one_off(text, &context, false)
    }
}

impl FileRenderer for TeraRenderer {
    #[instrument(skip_all, fields(source = %source.display()))]
    fn render(&self, source: &Path, content: &[u8], variables: &Variables) -> RenderedFile {
        let passthrough = |outcome| RenderedFile {
            content: content.to_vec(),
            outcome,
        };

        if !is_text_file(source) {
            return passthrough(RenderOutcome::Binary);
        }
        let Ok(text) = std::str::from_utf8(content) else {
            debug!("not valid UTF-8, copying as binary");
            return passthrough(RenderOutcome::Binary);
        };

        let placeholders = find_placeholders(text);
        if placeholders.is_empty() {
            return passthrough(RenderOutcome::Verbatim);
        }

        match Self::render_text(text, variables) {
            Ok(rendered) => RenderedFile {
                content: rendered.into_bytes(),
                outcome: RenderOutcome::Rendered { placeholders },
            },
            Err(e) => {
                let reason = error_chain(&e);
                warn!(error = %reason, "could not render file, copying it unchanged");
                passthrough(RenderOutcome::Fallback { reason })
            }
        }
    }
}

/// Tera reports the useful detail in the error's sources.
fn error_chain(error: &tera::Error) -> String {
    let mut message = error.to_string();
    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
