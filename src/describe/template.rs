//! Minimal prompt templating: literal text plus `{{.ImageName}}` actions,
//! with trim markers and comments.

use std::path::Path;

use super::error::TemplateError;

/// Built-in prompt, compiled into the binary.
pub const BUILTIN_TEMPLATE: &str = include_str!("../../prompts/describe_media.tpl");

const OPEN: &str = "{{";
const CLOSE: &str = "}}";
const IMAGE_NAME: &str = ".ImageName";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Text(String),
    ImageName,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    segments: Vec<Segment>,
}

impl PromptTemplate {
    /// Parse template text. Besides `{{.ImageName}}` this accepts the
    /// `{{- ... -}}` whitespace trim markers and `{{/* ... */}}` comments.
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        let mut rest = source;
        let mut consumed = 0;
        let mut trim_next_text = false;

        while let Some(start) = rest.find(OPEN) {
            let after_open = &rest[start + OPEN.len()..];
            let (trim_left, body) = match after_open.strip_prefix('-') {
                Some(r) if r.starts_with(char::is_whitespace) => (true, r),
                _ => (false, after_open),
            };
            let offset = consumed + start;

            // Comments end at the first `*/`, so a `}}` inside one is text.
            let search_from = if body.trim_start().starts_with("/*") {
                body.find("*/")
                    .ok_or(TemplateError::Unterminated { offset })?
                    + 2
            } else {
                0
            };
            let end = body[search_from..]
                .find(CLOSE)
                .map(|i| search_from + i)
                .ok_or(TemplateError::Unterminated { offset })?;

            let inner = &body[..end];
            let (trim_right, inner) = match inner.strip_suffix('-') {
                Some(r) if r.ends_with(char::is_whitespace) => (true, r),
                _ => (false, inner),
            };

            push_text(&mut segments, &rest[..start], trim_next_text, trim_left);

            match inner.trim() {
                IMAGE_NAME => segments.push(Segment::ImageName),
                comment if comment.starts_with("/*") && comment.ends_with("*/") => {}
                other => return Err(TemplateError::UnknownField(other.to_string())),
            }

            let advance = (after_open.len() - body.len()) + start + OPEN.len() + end + CLOSE.len();
            consumed += advance;
            rest = &rest[advance..];
            trim_next_text = trim_right;
        }
        push_text(&mut segments, rest, trim_next_text, false);

        Ok(Self { segments })
    }

    pub fn builtin() -> Result<Self, TemplateError> {
        Self::parse(BUILTIN_TEMPLATE)
    }

    /// Read and parse a template file. Called once per asset so edits to the
    /// file take effect mid-run.
    pub async fn load(path: &Path) -> Result<Self, TemplateError> {
        let source =
            tokio::fs::read_to_string(path)
                .await
                .map_err(|source| TemplateError::Read {
                    path: path.to_path_buf(),
                    source,
                })?;
        Self::parse(&source)
    }

    pub fn render(&self, image_name: &str) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::ImageName => out.push_str(image_name),
            }
        }
        out
    }
}

fn push_text(segments: &mut Vec<Segment>, text: &str, trim_start: bool, trim_end: bool) {
    let text = if trim_start { text.trim_start() } else { text };
    let text = if trim_end { text.trim_end() } else { text };
    if !text.is_empty() {
        segments.push(Segment::Text(text.to_string()));
    }
}
