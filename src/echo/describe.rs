use super::body::DecodedBody;
use super::flatten::FlattenedMap;
use crate::http::Request;
use serde::Serialize;

/// Everything the echo endpoints report about a request
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestDescriptor {
    pub origin: String,
    pub url: String,
    pub search_params: FlattenedMap,
    pub headers: FlattenedMap,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<DecodedBody>,
}

/// Builds [`RequestDescriptor`]s
#[derive(Debug, Clone, Default)]
pub struct Describer {
    trust_forwarded_for: bool,
}

impl Describer {
    /// With `trust_forwarded_for`, the first `X-Forwarded-For` entry is
    /// reported as the origin instead of the socket peer.
    pub fn new(trust_forwarded_for: bool) -> Self {
        Self {
            trust_forwarded_for,
        }
    }

    /// The client address, without port
    pub fn origin(&self, request: &Request) -> String {
        if self.trust_forwarded_for {
            let forwarded = request
                .header("x-forwarded-for")
                .and_then(|v| v.split(',').next())
                .map(str::trim)
                .filter(|v| !v.is_empty());
            if let Some(client) = forwarded {
                return client.to_string();
            }
        }
        request.peer_addr().ip().to_string()
    }

    /// Origin, URL, query parameters and headers
    pub fn basic_info(&self, request: &Request) -> RequestDescriptor {
        RequestDescriptor {
            origin: self.origin(request),
            url: format!("http://{}{}", request.host(), request.target()),
            search_params: FlattenedMap::from_query(request.query()),
            headers: FlattenedMap::from_headers(request.headers()),
            body: None,
        }
    }

    /// [`basic_info`](Self::basic_info) plus the decoded body
    pub fn full_info(&self, request: &Request) -> RequestDescriptor {
        let mut descriptor = self.basic_info(request);
        descriptor.body = Some(DecodedBody::decode(
            request.content_type(),
            request.body(),
        ));
        descriptor
    }
}
