//! `multipart/form-data` body parsing
//!
//! Parts carrying a `filename` are reported as files (name, type and size
//! only, the contents are not echoed); every other part is a text field.

use super::flatten::FlattenedMap;
use super::media_type::MediaType;
use serde::Serialize;

const MAX_PART_HEADERS: usize = 16;

/// Decoded `multipart/form-data` payload
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MultipartBody {
    pub fields: FlattenedMap,
    /// `None` when the form carried no file parts
    pub files: Option<FlattenedMap<FileInfo>>,
}

/// Description of one uploaded file part
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileInfo {
    pub filename: String,
    pub content_type: Option<String>,
    pub size: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum MultipartError {
    #[error("missing boundary parameter")]
    MissingBoundary,
    #[error("opening boundary not found")]
    MissingDelimiter,
    #[error("body ended before the closing boundary")]
    Truncated,
    #[error("malformed part headers: {0}")]
    MalformedHeaders(String),
    #[error("part is missing a form-data content disposition with a name")]
    MissingName,
    #[error("field {0:?} is not valid UTF-8")]
    InvalidField(String),
}

/// Parses a multipart body using the boundary declared in `content_type`
pub fn parse(content_type: &MediaType, body: &[u8]) -> Result<MultipartBody, MultipartError> {
    let boundary = content_type
        .param("boundary")
        .filter(|b| !b.is_empty())
        .ok_or(MultipartError::MissingBoundary)?;

    let delimiter = format!("--{boundary}");
    let next_delimiter = format!("\r\n--{boundary}");

    let start = find(body, delimiter.as_bytes()).ok_or(MultipartError::MissingDelimiter)?;
    let mut pos = start + delimiter.len();

    let mut fields = Vec::new();
    let mut files = Vec::new();

    loop {
        let rest = &body[pos..];
        if rest.starts_with(b"--") {
            break;
        }
        let rest = rest.strip_prefix(b"\r\n").ok_or(MultipartError::Truncated)?;
        pos += 2;

        let mut headers = [httparse::EMPTY_HEADER; MAX_PART_HEADERS];
        let (head_len, part_headers) = match httparse::parse_headers(rest, &mut headers) {
            Ok(httparse::Status::Complete(parsed)) => parsed,
            Ok(httparse::Status::Partial) => return Err(MultipartError::Truncated),
            Err(e) => return Err(MultipartError::MalformedHeaders(e.to_string())),
        };

        let mut disposition = None;
        let mut part_type = None;
        for header in part_headers {
            let value = String::from_utf8_lossy(header.value);
            if header.name.eq_ignore_ascii_case("content-disposition") {
                disposition = Some(MediaType::parse(&value));
            } else if header.name.eq_ignore_ascii_case("content-type") {
                part_type = Some(value.trim().to_string());
            }
        }

        let content_start = pos + head_len;
        let content_len = find(&body[content_start..], next_delimiter.as_bytes())
            .ok_or(MultipartError::Truncated)?;
        let content = &body[content_start..content_start + content_len];
        pos = content_start + content_len + next_delimiter.len();

        let disposition = disposition
            .filter(|d| d.essence() == "form-data")
            .ok_or(MultipartError::MissingName)?;
        let name = disposition
            .param("name")
            .ok_or(MultipartError::MissingName)?
            .to_string();

        match disposition.param("filename") {
            Some(filename) => files.push((
                name,
                FileInfo {
                    filename: filename.to_string(),
                    content_type: part_type,
                    size: content.len(),
                },
            )),
            None => {
                let value = std::str::from_utf8(content)
                    .map_err(|_| MultipartError::InvalidField(name.clone()))?;
                fields.push((name, value.to_string()));
            }
        }
    }

    Ok(MultipartBody {
        fields: FlattenedMap::from_pairs(fields),
        files: (!files.is_empty()).then(|| FlattenedMap::from_pairs(files)),
    })
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
