use super::flatten::FlattenedMap;
use super::media_type::MediaType;
use super::multipart::{self, MultipartBody, MultipartError};
use serde::ser::{Serialize, SerializeStruct, Serializer};
use tracing::debug;

/// Request body decoded according to its declared content type
///
/// Serializes as `{"type": <tag>, "value": <value>}`. The `none` and
/// `error` tags always carry a `null` value.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedBody {
    Json(serde_json::Value),
    Form(FlattenedMap),
    Multipart(MultipartBody),
    Text(String),
    /// Raw bytes rendered as their decimal values joined by commas
    Bytes(String),
    None,
    Error,
}

/// How a body will be decoded, chosen from the request's `Content-Type`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    Json,
    Form,
    Multipart,
    Text,
    Bytes,
    Unknown,
}

#[derive(Debug, thiserror::Error)]
pub enum BodyError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid UTF-8 text: {0}")]
    Utf8(#[from] std::str::Utf8Error),
    #[error("invalid multipart body: {0}")]
    Multipart(#[from] MultipartError),
}

impl BodyKind {
    pub fn classify(content_type: Option<&MediaType>) -> Self {
        let Some(media) = content_type else {
            return BodyKind::Bytes;
        };

        match (media.top_level(), media.subtype()) {
            ("application", "json") => BodyKind::Json,
            (_, sub) if sub.ends_with("+json") => BodyKind::Json,
            ("application", "x-www-form-urlencoded") => BodyKind::Form,
            ("multipart", "form-data") => BodyKind::Multipart,
            ("text", _) => BodyKind::Text,
            ("application", "xml" | "javascript") => BodyKind::Text,
            ("application", "octet-stream" | "pdf" | "zip") => BodyKind::Bytes,
            ("image" | "audio" | "video", _) => BodyKind::Bytes,
            _ => BodyKind::Unknown,
        }
    }
}

impl DecodedBody {
    /// Decodes `body` as declared by the raw `Content-Type` header value.
    ///
    /// Never fails: anything that cannot be decoded becomes [`DecodedBody::Error`].
    pub fn decode(content_type: Option<&str>, body: &[u8]) -> Self {
        if body.is_empty() {
            return DecodedBody::None;
        }

        let media = content_type.map(MediaType::parse);
        let kind = BodyKind::classify(media.as_ref());

        match Self::try_decode(kind, media.as_ref(), body) {
            Ok(decoded) => decoded,
            Err(e) => {
                debug!(error = %e, ?kind, size = body.len(), "Failed to decode request body");
                DecodedBody::Error
            }
        }
    }

    fn try_decode(
        kind: BodyKind,
        media: Option<&MediaType>,
        body: &[u8],
    ) -> Result<Self, BodyError> {
        let decoded = match (kind, media) {
            (BodyKind::Json, _) => DecodedBody::Json(serde_json::from_slice(body)?),
            (BodyKind::Form, _) => DecodedBody::Form(FlattenedMap::from_pairs(
                url::form_urlencoded::parse(body)
                    .map(|(key, value)| (key.into_owned(), value.into_owned())),
            )),
            (BodyKind::Multipart, Some(media)) => {
                DecodedBody::Multipart(multipart::parse(media, body)?)
            }
            (BodyKind::Multipart, None) => {
                return Err(MultipartError::MissingBoundary.into());
            }
            (BodyKind::Text, _) => DecodedBody::Text(std::str::from_utf8(body)?.to_string()),
            (BodyKind::Bytes, _) => DecodedBody::Bytes(render_bytes(body)),
            (BodyKind::Unknown, _) => DecodedBody::None,
        };
        Ok(decoded)
    }

    /// The `type` tag this body serializes with
    pub fn tag(&self) -> &'static str {
        match self {
            DecodedBody::Json(_) => "json",
            DecodedBody::Form(_) => "form",
            DecodedBody::Multipart(_) => "multipart",
            DecodedBody::Text(_) => "text",
            DecodedBody::Bytes(_) => "bytes",
            DecodedBody::None => "none",
            DecodedBody::Error => "error",
        }
    }
}

impl Serialize for DecodedBody {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("DecodedBody", 2)?;
        state.serialize_field("type", self.tag())?;
        match self {
            DecodedBody::Json(value) => state.serialize_field("value", value)?,
            DecodedBody::Form(fields) => state.serialize_field("value", fields)?,
            DecodedBody::Multipart(form) => state.serialize_field("value", form)?,
            DecodedBody::Text(text) | DecodedBody::Bytes(text) => {
                state.serialize_field("value", text)?
            }
            DecodedBody::None | DecodedBody::Error => {
                state.serialize_field("value", &Option::<()>::None)?
            }
        }
        state.end()
    }
}

/// `[104, 105]` renders as `"104,105"`
pub fn render_bytes(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| b.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn decode_json(content_type: Option<&str>, body: &[u8]) -> serde_json::Value {
        serde_json::to_value(DecodedBody::decode(content_type, body)).unwrap()
    }

    #[test]
    fn test_json_body() {
        assert_eq!(
            decode_json(Some("application/json"), br#"{"a":2,"b":"x","c":null}"#),
            json!({"type": "json", "value": {"a": 2, "b": "x", "c": null}})
        );
        assert_eq!(
            decode_json(Some("application/vnd.api+json; charset=utf-8"), b"[1,2]"),
            json!({"type": "json", "value": [1, 2]})
        );
    }

    #[test]
    fn test_malformed_json_is_error() {
        assert_eq!(
            decode_json(Some("application/json"), b"{\"a\":"),
            json!({"type": "error", "value": null})
        );
    }

    #[test]
    fn test_form_body() {
        assert_eq!(
            decode_json(Some("application/x-www-form-urlencoded"), b"a=1&b=two+words&a=3"),
            json!({"type": "form", "value": {"a": ["1", "3"], "b": "two words"}})
        );
    }

    #[test]
    fn test_text_body() {
        assert_eq!(
            decode_json(Some("text/plain; charset=utf-8"), "héllo".as_bytes()),
            json!({"type": "text", "value": "héllo"})
        );
        assert_eq!(
            decode_json(Some("text/plain"), &[0xff, 0xfe]),
            json!({"type": "error", "value": null})
        );
    }

    #[test]
    fn test_bytes_rendering() {
        assert_eq!(render_bytes(b"hi"), "104,105");
        assert_eq!(render_bytes(&[]), "");
        assert_eq!(
            decode_json(Some("application/octet-stream"), &[0, 7, 255]),
            json!({"type": "bytes", "value": "0,7,255"})
        );
        assert_eq!(
            decode_json(None, b"hi"),
            json!({"type": "bytes", "value": "104,105"})
        );
    }

    #[test]
    fn test_empty_and_unknown() {
        assert_eq!(
            decode_json(Some("application/json"), b""),
            json!({"type": "none", "value": null})
        );
        assert_eq!(
            decode_json(Some("application/x-custom"), b"anything"),
            json!({"type": "none", "value": null})
        );
    }

    #[test]
    fn test_multipart_body() {
        let body = b"--b1\r\nContent-Disposition: form-data; name=\"k\"\r\n\r\nv\r\n--b1--\r\n";
        assert_eq!(
            decode_json(Some("multipart/form-data; boundary=b1"), body),
            json!({"type": "multipart", "value": {"fields": {"k": "v"}, "files": null}})
        );
        assert_eq!(
            decode_json(Some("multipart/form-data; boundary=b1"), b"--b1\r\nContent-Disposition: form-data; name=\"k\"\r\n\r\nv"),
            json!({"type": "error", "value": null})
        );
    }

    #[test]
    fn test_classify() {
        let kind = |ct: &str| BodyKind::classify(Some(&MediaType::parse(ct)));
        assert_eq!(kind("Application/JSON"), BodyKind::Json);
        assert_eq!(kind("text/csv"), BodyKind::Text);
        assert_eq!(kind("image/png"), BodyKind::Bytes);
        assert_eq!(kind("application/x-custom"), BodyKind::Unknown);
        assert_eq!(BodyKind::classify(None), BodyKind::Bytes);
    }
}
