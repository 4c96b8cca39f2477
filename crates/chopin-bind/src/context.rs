//! Per-request lookups the binder reads from.

use std::collections::HashMap;

use axum::http::{self, header, HeaderName, HeaderValue, Method};
use bytes::Bytes;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::coerce::{coerce_scalar, coerce_slice, ScalarValue};
use crate::error::BindError;
use crate::multipart::{FileHeader, MultipartForm};
use crate::reflect::{FieldShape, ScalarKind, TypeShape};
use crate::request::{Request, RequestContext};
use crate::writer::ResponseWriter;

/// Key based lookups over one request.
///
/// Query and post-form values count as present even when empty. Callers
/// treat an empty path, header or cookie value as absent.
pub trait RequestSource {
    fn query(&self, key: &str) -> Option<&str>;

    fn query_array(&self, key: &str) -> Option<&[String]>;

    fn post_form(&self, key: &str) -> Option<&str>;

    fn post_form_array(&self, key: &str) -> Option<&[String]>;

    fn param(&self, key: &str) -> Option<&str>;

    fn header(&self, key: &str) -> Option<&str>;

    fn cookie(&self, key: &str) -> Option<&str>;

    /// Decode the body (or the form values) into a JSON object keyed by
    /// field name. Fields the request does not mention are left out.
    fn bind_body(&self, fields: &[FieldShape]) -> Result<Map<String, Value>, BindError>;

    fn form_file(&self, name: &str) -> Result<FileHeader, BindError>;

    fn multipart_form(&self) -> Result<MultipartForm, BindError>;
}

type Values = HashMap<String, Vec<String>>;

/// The concrete [`RequestSource`]: a fully read request plus the handles
/// passed to handlers.
#[derive(Debug)]
pub struct Context {
    request: Request,
    context: RequestContext,
    writer: ResponseWriter,
    query: Values,
    post_form: Values,
    params: HashMap<String, String>,
    cookies: HashMap<String, String>,
    multipart: Option<Result<MultipartForm, String>>,
}

impl Context {
    pub fn builder() -> ContextBuilder {
        ContextBuilder::default()
    }

    /// Assemble a context from a buffered request.
    ///
    /// `multipart` is the already parsed multipart body, `None` when the
    /// request is not `multipart/form-data`.
    pub fn from_parts<I>(
        parts: http::request::Parts,
        body: Bytes,
        params: I,
        multipart: Option<Result<MultipartForm, String>>,
    ) -> Result<Self, BindError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let http::request::Parts {
            method,
            uri,
            version,
            headers,
            extensions,
            ..
        } = parts;

        let query = parse_urlencoded(uri.query().unwrap_or_default().as_bytes())?;
        let cookies = parse_cookies(&headers);
        let context = RequestContext::new(method.clone(), uri.path(), extensions);
        let request = Request::new(method, uri, version, headers, body);

        let mut post_form = Values::new();
        let reads_form = matches!(*request.method(), Method::POST | Method::PUT | Method::PATCH);
        if reads_form && request.media_type().as_deref() == Some("application/x-www-form-urlencoded") {
            post_form = parse_urlencoded(request.body())?;
        }
        if let Some(Ok(form)) = &multipart {
            for (key, values) in form.values() {
                post_form
                    .entry(key.clone())
                    .or_default()
                    .extend(values.iter().cloned());
            }
        }

        Ok(Context {
            request,
            context,
            writer: ResponseWriter::new(),
            query,
            post_form,
            params: params.into_iter().collect(),
            cookies,
            multipart,
        })
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn request_context(&self) -> &RequestContext {
        &self.context
    }

    pub fn writer(&self) -> &ResponseWriter {
        &self.writer
    }

    pub fn method(&self) -> &Method {
        self.request.method()
    }

    fn is_json(&self) -> bool {
        !matches!(*self.request.method(), Method::GET | Method::HEAD)
            && self
                .request
                .media_type()
                .is_some_and(|media| media == "application/json" || media.ends_with("+json"))
    }

    /// Form values for `key`: post-form first, then query.
    fn form_values(&self, key: &str) -> Option<&[String]> {
        self.post_form_array(key).or_else(|| self.query_array(key))
    }

    fn bind_form(&self, fields: &[FieldShape]) -> Result<Map<String, Value>, BindError> {
        let mut map = Map::new();
        for field in fields.iter().filter(|field| field.is_public()) {
            let Some(values) = self.form_values(field.name()) else {
                continue;
            };
            let value = match field.shape() {
                TypeShape::Slice(elem) => match elem.scalar_kind() {
                    Some(kind) => Value::Array(
                        coerce_slice(kind, values)?
                            .into_iter()
                            .zip(values)
                            .map(|(scalar, raw)| form_json(scalar, raw))
                            .collect::<Result<_, _>>()?,
                    ),
                    None => continue,
                },
                _ => match (field.scalar_kind(), values.first()) {
                    (Some(kind), Some(raw)) => form_json(coerce_scalar(kind, raw)?, raw)?,
                    _ => continue,
                },
            };
            map.insert(field.name().to_string(), value);
        }
        Ok(map)
    }

    fn bind_json(&self) -> Result<Map<String, Value>, BindError> {
        let body = self.request.body();
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Map::new());
        }
        match serde_json::from_slice(body).map_err(BindError::Body)? {
            Value::Object(map) => Ok(map),
            Value::Null => Ok(Map::new()),
            Value::Array(_) => Err(BindError::BodyShape("array")),
            Value::String(_) => Err(BindError::BodyShape("string")),
            Value::Number(_) => Err(BindError::BodyShape("number")),
            Value::Bool(_) => Err(BindError::BodyShape("boolean")),
        }
    }

    fn parsed_multipart(&self) -> Result<&MultipartForm, BindError> {
        match &self.multipart {
            None => Err(BindError::NotMultipart),
            Some(Err(reason)) => Err(BindError::Multipart(reason.clone())),
            Some(Ok(form)) => Ok(form),
        }
    }
}

impl RequestSource for Context {
    fn query(&self, key: &str) -> Option<&str> {
        self.query.get(key)?.first().map(String::as_str)
    }

    fn query_array(&self, key: &str) -> Option<&[String]> {
        self.query.get(key).map(Vec::as_slice)
    }

    fn post_form(&self, key: &str) -> Option<&str> {
        self.post_form.get(key)?.first().map(String::as_str)
    }

    fn post_form_array(&self, key: &str) -> Option<&[String]> {
        self.post_form.get(key).map(Vec::as_slice)
    }

    fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    fn header(&self, key: &str) -> Option<&str> {
        self.request.header(key)
    }

    fn cookie(&self, key: &str) -> Option<&str> {
        self.cookies.get(key).map(String::as_str)
    }

    fn bind_body(&self, fields: &[FieldShape]) -> Result<Map<String, Value>, BindError> {
        if self.is_json() {
            self.bind_json()
        } else {
            self.bind_form(fields)
        }
    }

    fn form_file(&self, name: &str) -> Result<FileHeader, BindError> {
        self.parsed_multipart()?
            .file(name)
            .cloned()
            .ok_or_else(|| BindError::MissingFile(name.to_string()))
    }

    fn multipart_form(&self) -> Result<MultipartForm, BindError> {
        self.parsed_multipart().cloned()
    }
}

/// Form bodies are merged as a JSON object, which has no NaN or infinity.
fn form_json(scalar: ScalarValue, raw: &str) -> Result<Value, BindError> {
    match scalar {
        ScalarValue::F32(v) if !v.is_finite() => Err(non_finite(ScalarKind::F32, raw)),
        ScalarValue::F64(v) if !v.is_finite() => Err(non_finite(ScalarKind::F64, raw)),
        scalar => Ok(scalar.into_json()),
    }
}

fn non_finite(kind: ScalarKind, raw: &str) -> BindError {
    BindError::Coerce {
        kind,
        value: raw.to_string(),
        reason: "non-finite floats can't be bound from a form body".to_string(),
    }
}

fn parse_urlencoded(input: &[u8]) -> Result<Values, BindError> {
    let pairs: Vec<(String, String)> =
        serde_urlencoded::from_bytes(input).map_err(|err| BindError::InvalidRequest(err.to_string()))?;
    let mut values = Values::new();
    for (key, value) in pairs {
        values.entry(key).or_default().push(value);
    }
    Ok(values)
}

/// Cookies from every `Cookie` header, percent-decoded. The first
/// occurrence of a name wins.
fn parse_cookies(headers: &http::HeaderMap) -> HashMap<String, String> {
    let mut cookies = HashMap::new();
    for value in headers.get_all(header::COOKIE) {
        let Ok(value) = value.to_str() else {
            continue;
        };
        for pair in value.split(';') {
            let Some((name, raw)) = pair.trim().split_once('=') else {
                continue;
            };
            let raw = raw.trim_matches('"');
            let decoded = urlencoding::decode(raw)
                .map(|text| text.into_owned())
                .unwrap_or_else(|_| raw.to_string());
            cookies.entry(name.to_string()).or_insert(decoded);
        }
    }
    cookies
}

/// Builds a [`Context`] without a server, for tests and non-axum hosts.
///
/// ```rust,ignore
/// let ctx = Context::builder()
///     .uri("/users/42?verbose=1")
///     .param("id", "42")
///     .build()?;
/// ```
#[derive(Debug, Default)]
pub struct ContextBuilder {
    request: http::request::Builder,
    params: Vec<(String, String)>,
    cookies: Vec<String>,
    body: Bytes,
    multipart: Option<Result<MultipartForm, String>>,
    error: Option<String>,
}

impl ContextBuilder {
    pub fn method(mut self, method: Method) -> Self {
        self.request = self.request.method(method);
        self
    }

    pub fn uri(mut self, uri: &str) -> Self {
        self.request = self.request.uri(uri);
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        match (HeaderName::try_from(name), HeaderValue::try_from(value)) {
            (Ok(name), Ok(value)) => self.request = self.request.header(name, value),
            _ => self.error = Some(format!("invalid header {name}: {value}")),
        }
        self
    }

    /// Add a cookie; `value` is percent-encoded.
    pub fn cookie(mut self, name: &str, value: &str) -> Self {
        self.cookies.push(format!("{name}={}", urlencoding::encode(value)));
        self
    }

    /// Add a matched path parameter.
    pub fn param(mut self, name: &str, value: &str) -> Self {
        self.params.push((name.to_string(), value.to_string()));
        self
    }

    pub fn extension<T: Clone + Send + Sync + 'static>(mut self, value: T) -> Self {
        self.request = self.request.extension(value);
        self
    }

    /// JSON body; also sets `Content-Type`.
    pub fn json<T: Serialize + ?Sized>(mut self, value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(body) => self.body = Bytes::from(body),
            Err(err) => self.error = Some(err.to_string()),
        }
        self.header("content-type", "application/json")
    }

    /// URL-encoded form body; also sets `Content-Type`.
    pub fn form<T: Serialize + ?Sized>(mut self, value: &T) -> Self {
        match serde_urlencoded::to_string(value) {
            Ok(body) => self.body = Bytes::from(body),
            Err(err) => self.error = Some(err.to_string()),
        }
        self.header("content-type", "application/x-www-form-urlencoded")
    }

    /// Raw body bytes.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// An already parsed multipart body; also sets `Content-Type`.
    pub fn multipart_form(mut self, form: MultipartForm) -> Self {
        self.multipart = Some(Ok(form));
        self.header("content-type", "multipart/form-data; boundary=chopin-bind")
    }

    pub fn build(self) -> Result<Context, BindError> {
        if let Some(err) = self.error {
            return Err(BindError::InvalidRequest(err));
        }
        let mut request = self.request;
        if !self.cookies.is_empty() {
            request = request.header(header::COOKIE, self.cookies.join("; "));
        }
        let request = request
            .body(())
            .map_err(|err| BindError::InvalidRequest(err.to_string()))?;
        let (parts, ()) = request.into_parts();
        Context::from_parts(parts, self.body, self.params, self.multipart)
    }
}
