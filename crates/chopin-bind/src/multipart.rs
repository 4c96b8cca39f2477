//! Uploaded files and parsed multipart forms.

use std::collections::HashMap;

use axum::body::Body;
use axum::extract::{FromRequest, Multipart};
use axum::http::{header, Extensions};
use bytes::Bytes;

use crate::reflect::{Reflect, StructKind, StructShape, TypeShape};

/// One uploaded file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHeader {
    filename: String,
    content_type: Option<String>,
    data: Bytes,
}

impl FileHeader {
    pub fn new(filename: impl Into<String>, content_type: Option<String>, data: impl Into<Bytes>) -> Self {
        FileHeader {
            filename: filename.into(),
            content_type,
            data: data.into(),
        }
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }
}

impl Reflect for FileHeader {
    fn shape() -> TypeShape {
        TypeShape::Struct(StructShape::well_known("FileHeader", StructKind::FileHeader))
    }
}

/// A parsed `multipart/form-data` body: text values and files by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultipartForm {
    values: HashMap<String, Vec<String>>,
    files: HashMap<String, Vec<FileHeader>>,
}

impl MultipartForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.entry(name.into()).or_default().push(value.into());
        self
    }

    pub fn with_file(mut self, name: impl Into<String>, file: FileHeader) -> Self {
        self.files.entry(name.into()).or_default().push(file);
        self
    }

    /// First text value of `name`.
    pub fn value(&self, name: &str) -> Option<&str> {
        self.values.get(name)?.first().map(String::as_str)
    }

    pub fn values(&self) -> &HashMap<String, Vec<String>> {
        &self.values
    }

    /// First file uploaded under `name`.
    pub fn file(&self, name: &str) -> Option<&FileHeader> {
        self.files.get(name)?.first()
    }

    pub fn files(&self) -> &HashMap<String, Vec<FileHeader>> {
        &self.files
    }
}

impl Reflect for MultipartForm {
    fn shape() -> TypeShape {
        TypeShape::Struct(StructShape::well_known("MultipartForm", StructKind::MultipartForm))
    }
}

/// Parse a buffered multipart body. Parts with a filename are files, the
/// rest are text values.
///
/// `extensions` are those of the original request, so a `DefaultBodyLimit`
/// configured on the route still applies.
pub(crate) async fn parse(
    content_type: &str,
    extensions: &Extensions,
    body: Bytes,
) -> Result<MultipartForm, String> {
    let mut request = axum::http::Request::builder()
        .header(header::CONTENT_TYPE, content_type)
        .body(Body::from(body))
        .map_err(|err| err.to_string())?;
    *request.extensions_mut() = extensions.clone();

    let mut multipart = Multipart::from_request(request, &())
        .await
        .map_err(|rejection| rejection.body_text())?;

    let mut form = MultipartForm::new();
    while let Some(field) = multipart.next_field().await.map_err(|err| err.body_text())? {
        let name = field.name().unwrap_or_default().to_string();
        let filename = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let data = field.bytes().await.map_err(|err| err.body_text())?;
        form = match filename {
            Some(filename) => form.with_file(name, FileHeader::new(filename, content_type, data)),
            None => {
                let text = String::from_utf8(data.to_vec()).map_err(|err| err.to_string())?;
                form.with_value(name, text)
            }
        };
    }
    Ok(form)
}
