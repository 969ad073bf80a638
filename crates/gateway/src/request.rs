//! Per-call request description.

use partnergate_types::{ErrorKind, GatewayError};
use serde_json::Value;
use std::{collections::BTreeMap, fmt};

/// Query parameters appended to the URL.
pub type Query = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Method {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "DELETE" => Ok(Self::Delete),
            other => Err(format!("unsupported method: {other}")),
        }
    }
}

impl From<Method> for reqwest::Method {
    fn from(m: Method) -> Self {
        match m {
            Method::Get => Self::GET,
            Method::Post => Self::POST,
            Method::Put => Self::PUT,
            Method::Delete => Self::DELETE,
        }
    }
}

/// A binary file sent as one multipart part.
#[derive(Debug, Clone)]
pub struct Attachment {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl Attachment {
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: None,
            bytes: bytes.into(),
        }
    }

    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// A `multipart/form-data` body of text fields and attachments.
#[derive(Debug, Clone, Default)]
pub struct MultipartBody {
    texts: Vec<(String, String)>,
    files: Vec<(String, Attachment)>,
}

impl MultipartBody {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.texts.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn file(mut self, name: impl Into<String>, attachment: Attachment) -> Self {
        self.files.push((name.into(), attachment));
        self
    }

    #[must_use]
    pub fn has_attachment(&self) -> bool {
        !self.files.is_empty()
    }

    /// Convert into a reqwest form; the boundary and content type are assigned by reqwest.
    pub(crate) fn into_form(self) -> Result<reqwest::multipart::Form, GatewayError> {
        let mut form = reqwest::multipart::Form::new();
        for (name, value) in self.texts {
            form = form.text(name, value);
        }
        for (name, file) in self.files {
            let mut part =
                reqwest::multipart::Part::bytes(file.bytes).file_name(file.file_name.clone());
            if let Some(ct) = &file.content_type {
                part = part.mime_str(ct).map_err(|e| {
                    GatewayError::new(
                        ErrorKind::ValidationFailed,
                        None,
                        format!("Validation Error: invalid content type for {}: {e}", file.file_name),
                    )
                })?;
            }
            form = form.part(name, part);
        }
        Ok(form)
    }
}

/// Request payload. The variant is the multipart flag: callers choose the
/// encoding explicitly instead of the gateway inspecting values.
#[derive(Debug, Clone)]
pub enum Body {
    Json(Value),
    Multipart(MultipartBody),
}

impl From<Value> for Body {
    fn from(v: Value) -> Self {
        Self::Json(v)
    }
}

impl From<MultipartBody> for Body {
    fn from(m: MultipartBody) -> Self {
        Self::Multipart(m)
    }
}

/// Everything needed for one outbound call. Built fresh per call.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub method: Method,
    /// Endpoint relative to the configured base URL.
    pub path: String,
    pub query: Query,
    pub body: Option<Body>,
    /// End-user session token; the service token is used when absent.
    pub user_token: Option<String>,
}

impl RequestContext {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Query::new(),
            body: None,
            user_token: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::Post, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::Put, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::Delete, path)
    }

    #[must_use]
    pub fn with_query(mut self, query: Query) -> Self {
        self.query = query;
        self
    }

    #[must_use]
    pub fn query_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<Body>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Attach the caller's session token. Empty tokens count as absent.
    #[must_use]
    pub fn with_user_token(mut self, token: Option<impl Into<String>>) -> Self {
        self.user_token = token.map(Into::into).filter(|t: &String| !t.is_empty());
        self
    }

    #[must_use]
    pub fn is_multipart(&self) -> bool {
        matches!(self.body, Some(Body::Multipart(_)))
    }
}
