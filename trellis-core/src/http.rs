// Request and response values

use crate::reflection::{ClassDescriptor, FieldDescriptor, MethodDescriptor};
use serde::Serialize;
use std::collections::HashMap;

/// Class identifier under which the current request is held in the container.
pub const REQUEST_CLASS: &str = "trellis::http::Request";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Http,
    Cli,
}

/// An inbound request, either HTTP or a command line invocation.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: String,
    /// Raw request URI, query string included
    pub uri: String,
    pub kind: RequestKind,
    pub headers: HashMap<String, String>,
}

impl Request {
    pub fn new(method: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            uri: uri.into(),
            kind: RequestKind::Http,
            headers: HashMap::new(),
        }
    }

    pub fn get(uri: impl Into<String>) -> Self {
        Self::new("GET", uri)
    }

    /// Command line arguments become path segments: `users 42` is `/users/42`.
    pub fn cli<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let segments: Vec<String> = args
            .into_iter()
            .map(|arg| arg.as_ref().trim_matches('/').to_string())
            .filter(|arg| !arg.is_empty())
            .collect();

        Self {
            method: "CLI".to_string(),
            uri: format!("/{}", segments.join("/")),
            kind: RequestKind::Cli,
            headers: HashMap::new(),
        }
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn is_cli(&self) -> bool {
        self.kind == RequestKind::Cli
    }

    /// The URI without its query string.
    pub fn path(&self) -> &str {
        self.uri
            .split_once('?')
            .map(|(path, _)| path)
            .unwrap_or(&self.uri)
    }

    pub fn query_string(&self) -> Option<&str> {
        self.uri.split_once('?').map(|(_, query)| query)
    }

    pub fn descriptor() -> ClassDescriptor {
        ClassDescriptor::of::<Request>(REQUEST_CLASS)
            .final_class()
            .readonly_class()
            .field(FieldDescriptor::public("method").typed("string").readonly())
            .field(FieldDescriptor::public("uri").typed("string").readonly())
            .field(FieldDescriptor::public("kind").typed("RequestKind").readonly())
            .field(FieldDescriptor::public("headers").typed("array").readonly())
            .method(MethodDescriptor::public("path").returns("string"))
            .method(MethodDescriptor::public("query_string").returns("?string"))
            .method(MethodDescriptor::public("is_cli").returns("bool"))
    }
}

/// Response wrapper
#[derive(Debug)]
pub struct Response {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl Response {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: Vec::new(),
        }
    }

    pub fn ok() -> Self {
        Self::new(200)
    }

    pub fn no_content() -> Self {
        Self::new(204)
    }

    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    pub fn with_json<T: Serialize>(mut self, value: &T) -> Result<Self, crate::Error> {
        self.body =
            serde_json::to_vec(value).map_err(|e| crate::Error::Serialization(e.to_string()))?;
        self.headers
            .insert("Content-Type".to_string(), "application/json".to_string());
        Ok(self)
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }
}
