//! `<script>` body extraction for embedded-script sources.
//!
//! HTML, Vue, and Svelte files carry their JavaScript inside `<script>`
//! blocks. The scanner only needs the concatenated script text, so this
//! module pulls out every body between an opening `<script …>` and its
//! matching `</script>`, skipping markup entirely.

use memchr::memmem;

/// Maximum file size accepted for extraction (10 MiB).
pub const MAX_FILE_SIZE: usize = 10 * 1024 * 1024;

/// Maximum number of script tags processed per file.
pub const MAX_SCRIPT_TAGS: usize = 100;

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("file too large: {size} bytes (max {max})")]
    FileTooLarge { size: usize, max: usize },

    #[error("too many script tags: {count} (max {max})")]
    TooManyScriptTags { count: usize, max: usize },

    #[error("unclosed script tag starting at byte {position}")]
    UnclosedScriptTag { position: usize },
}

/// Extract every `<script>` body and join them with newlines.
///
/// Empty bodies contribute nothing. Returns an empty string for markup with
/// no script blocks at all.
pub fn extract_scripts(source: &str) -> Result<String, ExtractError> {
    if source.len() > MAX_FILE_SIZE {
        return Err(ExtractError::FileTooLarge {
            size: source.len(),
            max: MAX_FILE_SIZE,
        });
    }

    let mut bodies: Vec<&str> = Vec::new();
    let mut pointer = 0;

    while let Some(body) = next_script_body(source, &mut pointer)? {
        if !body.trim().is_empty() {
            bodies.push(body);
        }
        if bodies.len() > MAX_SCRIPT_TAGS {
            return Err(ExtractError::TooManyScriptTags {
                count: bodies.len(),
                max: MAX_SCRIPT_TAGS,
            });
        }
    }

    Ok(bodies.join("\n"))
}

/// Scan forward from `*pointer` for one script body.
fn next_script_body<'a>(
    source: &'a str,
    pointer: &mut usize,
) -> Result<Option<&'a str>, ExtractError> {
    let bytes = source.as_bytes();

    loop {
        let tag_start = match memmem::find(&bytes[*pointer..], b"<script") {
            Some(pos) => *pointer + pos,
            None => return Ok(None),
        };
        *pointer = tag_start + "<script".len();

        // Reject tag-name false prefixes like `<scripts>`.
        match bytes.get(*pointer) {
            Some(b' ' | b'\t' | b'\n' | b'\r' | b'>' | b'/') | None => {}
            Some(_) => continue,
        }

        let tag_end = match find_closing_angle(bytes, *pointer) {
            Some(pos) => pos,
            None => {
                return Err(ExtractError::UnclosedScriptTag {
                    position: tag_start,
                })
            }
        };

        // Self-closing tag has no body.
        if tag_end > 0 && bytes[tag_end - 1] == b'/' {
            *pointer = tag_end + 1;
            return Ok(Some(""));
        }

        let body_start = tag_end + 1;
        let body_end = match memmem::find(&bytes[body_start..], b"</script>") {
            Some(pos) => body_start + pos,
            None => {
                return Err(ExtractError::UnclosedScriptTag {
                    position: tag_start,
                })
            }
        };

        *pointer = body_end + "</script>".len();
        return Ok(Some(&source[body_start..body_end]));
    }
}

/// Find the `>` terminating an opening tag, honoring quoted attributes.
fn find_closing_angle(bytes: &[u8], start: usize) -> Option<usize> {
    let mut quote: Option<u8> = None;

    for (i, &byte) in bytes[start..].iter().enumerate() {
        match (quote, byte) {
            (None, b'"' | b'\'') => quote = Some(byte),
            (Some(q), b) if b == q => quote = None,
            (None, b'>') => return Some(start + i),
            _ => {}
        }
    }

    None
}
