/// A header value of the form `essence; name=value; name="quoted value"`
///
/// Used for `Content-Type` on requests and `Content-Disposition` on
/// multipart parts. The essence is lowercased, parameter names are
/// lowercased, and surrounding quotes are removed from parameter values.
///
/// ```
/// use echobin::echo::MediaType;
///
/// let media = MediaType::parse("Multipart/Form-Data; boundary=\"abc def\"");
/// assert_eq!(media.essence(), "multipart/form-data");
/// assert_eq!(media.param("boundary"), Some("abc def"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaType {
    essence: String,
    params: Vec<(String, String)>,
}

impl MediaType {
    pub fn parse(value: &str) -> Self {
        let mut parts = split_unquoted(value, ';').into_iter();
        let essence = parts.next().unwrap_or_default().trim().to_ascii_lowercase();

        let params = parts
            .filter_map(|part| {
                let part = part.trim();
                if part.is_empty() {
                    return None;
                }
                let (name, value) = part.split_once('=').unwrap_or((part, ""));
                Some((name.trim().to_ascii_lowercase(), unquote(value.trim())))
            })
            .collect();

        Self { essence, params }
    }

    pub fn essence(&self) -> &str {
        &self.essence
    }

    /// The top-level type, e.g. `text` for `text/plain`
    pub fn top_level(&self) -> &str {
        self.essence.split('/').next().unwrap_or_default()
    }

    /// The subtype, e.g. `plain` for `text/plain`
    pub fn subtype(&self) -> &str {
        self.essence.split_once('/').map(|(_, sub)| sub).unwrap_or_default()
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(candidate, _)| candidate.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

fn split_unquoted(value: &str, separator: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut in_quotes = false;
    let mut start = 0;

    for (idx, ch) in value.char_indices() {
        match ch {
            '"' => in_quotes = !in_quotes,
            c if c == separator && !in_quotes => {
                parts.push(&value[start..idx]);
                start = idx + ch.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&value[start..]);
    parts
}

fn unquote(value: &str) -> String {
    match value.strip_prefix('"').and_then(|v| v.strip_suffix('"')) {
        Some(inner) => inner.replace("\\\"", "\""),
        None => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_essence() {
        let media = MediaType::parse("application/json");
        assert_eq!(media.essence(), "application/json");
        assert_eq!(media.top_level(), "application");
        assert_eq!(media.subtype(), "json");
        assert_eq!(media.param("charset"), None);
    }

    #[test]
    fn test_params_and_quotes() {
        let media = MediaType::parse("form-data; name=\"field\"; filename=\"a;b.txt\"");
        assert_eq!(media.essence(), "form-data");
        assert_eq!(media.param("name"), Some("field"));
        assert_eq!(media.param("FILENAME"), Some("a;b.txt"));
    }

    #[test]
    fn test_case_and_whitespace() {
        let media = MediaType::parse("  Text/HTML ;  Charset=UTF-8 ");
        assert_eq!(media.essence(), "text/html");
        assert_eq!(media.param("charset"), Some("UTF-8"));
    }
}
