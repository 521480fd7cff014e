//! Minimal `multipart/form-data` reader.
//!
//! Works on raw bytes so binary uploads survive intact. Only what the
//! upload route needs is supported: locating one named part and reading
//! its `filename`.

use crate::core::ScanError;

/// One decoded form part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormPart {
    /// The `name` parameter of the part.
    pub name: String,

    /// The `filename` parameter, if present.
    pub filename: Option<String>,

    /// Raw part body.
    pub data: Vec<u8>,
}

/// Extracts the boundary from a `multipart/form-data` content type.
pub fn boundary_from_content_type(content_type: &str) -> Option<String> {
    let mut params = content_type.split(';');
    let mime = params.next()?.trim();
    if !mime.eq_ignore_ascii_case("multipart/form-data") {
        return None;
    }

    params
        .filter_map(|p| {
            let (key, value) = p.split_once('=')?;
            key.trim()
                .eq_ignore_ascii_case("boundary")
                .then(|| value.trim().trim_matches('"').to_string())
        })
        .find(|b| !b.is_empty())
}

/// Returns the first part named `field`.
pub fn find_part(body: &[u8], boundary: &str, field: &str) -> Result<FormPart, ScanError> {
    parse_parts(body, boundary)?
        .into_iter()
        .find(|p| p.name == field)
        .ok_or_else(|| ScanError::validation(format!("No '{}' part in multipart body", field)))
}

/// Splits a multipart body into its parts.
pub fn parse_parts(body: &[u8], boundary: &str) -> Result<Vec<FormPart>, ScanError> {
    let delimiter = format!("--{}", boundary).into_bytes();
    let next_delimiter = format!("\r\n--{}", boundary).into_bytes();

    let mut pos = find(body, &delimiter, 0)
        .ok_or_else(|| ScanError::validation("Multipart boundary not found"))?
        + delimiter.len();
    let mut parts = Vec::new();

    loop {
        if body[pos..].starts_with(b"--") {
            break;
        }
        if body[pos..].starts_with(b"\r\n") {
            pos += 2;
        }

        let header_end = find(body, b"\r\n\r\n", pos)
            .ok_or_else(|| ScanError::validation("Malformed multipart part headers"))?;
        let headers = String::from_utf8_lossy(&body[pos..header_end]);
        let data_start = header_end + 4;

        let data_end = find(body, &next_delimiter, data_start)
            .ok_or_else(|| ScanError::validation("Unterminated multipart part"))?;

        if let Some((name, filename)) = content_disposition(&headers) {
            parts.push(FormPart {
                name,
                filename,
                data: body[data_start..data_end].to_vec(),
            });
        }

        pos = data_end + next_delimiter.len();
        if pos >= body.len() {
            break;
        }
    }

    Ok(parts)
}

fn content_disposition(headers: &str) -> Option<(String, Option<String>)> {
    let line = headers.lines().find(|l| {
        l.split_once(':')
            .is_some_and(|(k, _)| k.trim().eq_ignore_ascii_case("content-disposition"))
    })?;
    let (_, value) = line.split_once(':')?;

    let mut name = None;
    let mut filename = None;
    for param in value.split(';').skip(1) {
        let Some((key, raw)) = param.split_once('=') else {
            continue;
        };
        let raw = raw.trim().trim_matches('"').to_string();
        match key.trim().to_ascii_lowercase().as_str() {
            "name" => name = Some(raw),
            "filename" => filename = Some(raw).filter(|f| !f.is_empty()),
            _ => {}
        }
    }

    Some((name?, filename))
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if from > haystack.len() || needle.is_empty() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|i| i + from)
}
