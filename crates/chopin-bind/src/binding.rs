//! Per-handler binding configuration and its registration-time validation.

use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwapOption;

use crate::classify::{classify, ArgumentDescriptor, ArgumentKind};
use crate::config::Settings;
use crate::error::ConfigError;
use crate::reflect::{FieldShape, TypeShape};
use crate::response::ResponseFn;

/// Decides whether a declared struct field name matches an external
/// (path, header or cookie) name.
pub type FieldMatcher = Arc<dyn Fn(&str, &str) -> bool + Send + Sync>;

static FIELD_MATCHER: ArcSwapOption<FieldMatcher> = ArcSwapOption::const_empty();

/// Case-insensitive equality after removing underscores, so `user_id`
/// matches `UserId` and `userid`.
pub fn default_field_matcher(declared: &str, external: &str) -> bool {
    let mut left = declared.chars().filter(|c| *c != '_');
    let mut right = external.chars().filter(|c| *c != '_');
    loop {
        match (left.next(), right.next()) {
            (None, None) => return true,
            (Some(a), Some(b)) if a.to_lowercase().eq(b.to_lowercase()) => {}
            _ => return false,
        }
    }
}

/// Replace the process-wide field matcher.
///
/// Must be called during startup, before handlers are registered. Handlers
/// capture the matcher at registration time.
pub fn set_global_field_matcher<F>(matcher: F)
where
    F: Fn(&str, &str) -> bool + Send + Sync + 'static,
{
    let matcher: FieldMatcher = Arc::new(matcher);
    FIELD_MATCHER.store(Some(Arc::new(matcher)));
}

/// The matcher new registrations will use.
pub fn global_field_matcher() -> FieldMatcher {
    match FIELD_MATCHER.load_full() {
        Some(matcher) => FieldMatcher::clone(&matcher),
        None => Arc::new(default_field_matcher),
    }
}

/// Options accepted by [`crate::register`].
///
/// ```rust,ignore
/// let handler = register(
///     get_user,
///     BindOptions::new().path_names(["id"]),
/// );
/// ```
#[derive(Clone, Default)]
pub struct BindOptions {
    query_name: Option<String>,
    file_name: Option<String>,
    path_names: Vec<String>,
    header_names: Vec<String>,
    cookie_names: Vec<String>,
    field_matcher: Option<FieldMatcher>,
    pub(crate) response: Option<ResponseFn>,
    pub(crate) settings: Settings,
}

impl BindOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Query or post-form key for a scalar or `Vec<scalar>` argument.
    pub fn query_name(mut self, name: impl Into<String>) -> Self {
        self.query_name = Some(name.into());
        self
    }

    /// Multipart field name for a [`crate::FileHeader`] argument.
    pub fn file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = Some(name.into());
        self
    }

    pub fn path_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.path_names = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn header_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.header_names = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn cookie_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cookie_names = names.into_iter().map(Into::into).collect();
        self
    }

    /// Use `matcher` for this handler instead of the global one.
    pub fn field_matcher<F>(mut self, matcher: F) -> Self
    where
        F: Fn(&str, &str) -> bool + Send + Sync + 'static,
    {
        self.field_matcher = Some(Arc::new(matcher));
        self
    }

    /// Use `response` for this handler instead of the global collaborator.
    pub fn response<F>(mut self, response: F) -> Self
    where
        F: Fn(&crate::Context, Option<serde_json::Value>, Option<crate::BindError>) + Send + Sync + 'static,
    {
        self.response = Some(Arc::new(response));
        self
    }

    /// Request reading limits used when the handler is mounted on a router.
    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    pub(crate) fn into_config(self) -> BindingConfig {
        BindingConfig {
            query_name: self.query_name.filter(|name| !name.is_empty()),
            file_name: self.file_name,
            path_names: self.path_names,
            header_names: self.header_names,
            cookie_names: self.cookie_names,
            field_matcher: self.field_matcher.unwrap_or_else(global_field_matcher),
            arguments: Vec::new(),
        }
    }
}

impl fmt::Debug for BindOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindOptions")
            .field("query_name", &self.query_name)
            .field("file_name", &self.file_name)
            .field("path_names", &self.path_names)
            .field("header_names", &self.header_names)
            .field("cookie_names", &self.cookie_names)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

/// Source names and classified parameters of one registered handler.
///
/// Read-only once registration succeeds; shared by all concurrent requests.
#[derive(Clone)]
pub struct BindingConfig {
    query_name: Option<String>,
    file_name: Option<String>,
    path_names: Vec<String>,
    header_names: Vec<String>,
    cookie_names: Vec<String>,
    field_matcher: FieldMatcher,
    arguments: Vec<ArgumentDescriptor>,
}

impl BindingConfig {
    pub fn query_name(&self) -> Option<&str> {
        self.query_name.as_deref()
    }

    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    pub fn path_names(&self) -> &[String] {
        &self.path_names
    }

    pub fn header_names(&self) -> &[String] {
        &self.header_names
    }

    pub fn cookie_names(&self) -> &[String] {
        &self.cookie_names
    }

    pub fn arguments(&self) -> &[ArgumentDescriptor] {
        &self.arguments
    }

    /// First field whose declared name matches `external`.
    pub fn find_field<'a>(&self, fields: &'a [FieldShape], external: &str) -> Option<&'a FieldShape> {
        fields
            .iter()
            .find(|field| (self.field_matcher)(field.name(), external))
    }

    /// Classify each parameter and check it against its position, stopping
    /// at the first violation.
    pub(crate) fn validate_signature(&mut self, params: &[TypeShape]) -> Result<(), ConfigError> {
        check_count(params.len(), || join_names(params.iter()))?;
        let mut arguments = Vec::with_capacity(params.len());
        for (position, shape) in params.iter().enumerate() {
            let descriptor = classify(shape)?;
            self.check_position(position, params.len(), &descriptor)?;
            arguments.push(descriptor);
        }
        self.arguments = arguments;
        Ok(())
    }

    /// Check already classified parameters against the position rules.
    pub fn validate_positions(&self, descriptors: &[ArgumentDescriptor]) -> Result<(), ConfigError> {
        check_count(descriptors.len(), || {
            join_names(descriptors.iter().map(ArgumentDescriptor::shape))
        })?;
        for (position, descriptor) in descriptors.iter().enumerate() {
            self.check_position(position, descriptors.len(), descriptor)?;
        }
        Ok(())
    }

    fn check_position(
        &self,
        position: usize,
        count: usize,
        descriptor: &ArgumentDescriptor,
    ) -> Result<(), ConfigError> {
        let kind = descriptor.kind();
        match (position, count) {
            (0, _) if !kind.is_first_kind() => {
                Err(ConfigError::FirstArgument(descriptor.shape().to_string()))
            }
            (0, _) => Ok(()),
            (1, 2) if kind == ArgumentKind::ResponseWriter => Ok(()),
            (1, 2) if kind.is_bindable() => self.check_bind_value(descriptor),
            (1, 2) => Err(ConfigError::SecondArgument(descriptor.shape().to_string())),
            (1, _) if kind != ArgumentKind::ResponseWriter => {
                Err(ConfigError::WriterRequired(descriptor.shape().to_string()))
            }
            (1, _) => Ok(()),
            _ if kind.is_bindable() => self.check_bind_value(descriptor),
            _ => Err(ConfigError::ThirdArgument(descriptor.shape().to_string())),
        }
    }

    /// Check that the configured source names can actually feed `descriptor`.
    pub fn check_bind_value(&self, descriptor: &ArgumentDescriptor) -> Result<(), ConfigError> {
        match descriptor.kind() {
            ArgumentKind::BindableStruct | ArgumentKind::BindableStructPointer => {
                let Some(shape) = descriptor.struct_shape() else {
                    return Err(ConfigError::PointerToNonStruct(descriptor.shape().to_string()));
                };
                let fields = shape.fields();
                let names = self
                    .path_names
                    .iter()
                    .chain(&self.header_names)
                    .chain(&self.cookie_names);
                for name in names {
                    let Some(field) = self.find_field(&fields, name) else {
                        return Err(ConfigError::FieldNotFound {
                            ty: shape.name().to_string(),
                            field: name.clone(),
                        });
                    };
                    if !field.is_settable() {
                        return Err(ConfigError::FieldNotSettable {
                            ty: shape.name().to_string(),
                            field: name.clone(),
                        });
                    }
                }
                Ok(())
            }
            ArgumentKind::ScalarSlice if self.query_name.is_none() => {
                Err(ConfigError::SliceRequiresQueryName)
            }
            ArgumentKind::Scalar
                if self.query_name.is_none()
                    && self.path_names.is_empty()
                    && self.header_names.is_empty()
                    && self.cookie_names.is_empty() =>
            {
                Err(ConfigError::ScalarRequiresName)
            }
            _ => Ok(()),
        }
    }
}

impl fmt::Debug for BindingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingConfig")
            .field("query_name", &self.query_name)
            .field("file_name", &self.file_name)
            .field("path_names", &self.path_names)
            .field("header_names", &self.header_names)
            .field("cookie_names", &self.cookie_names)
            .field("arguments", &self.arguments)
            .finish_non_exhaustive()
    }
}

fn check_count(count: usize, names: impl FnOnce() -> String) -> Result<(), ConfigError> {
    if count == 0 || count > 3 {
        return Err(ConfigError::ArgumentCount(names()));
    }
    Ok(())
}

fn join_names<'a>(shapes: impl Iterator<Item = &'a TypeShape>) -> String {
    shapes.map(ToString::to_string).collect::<Vec<_>>().join(", ")
}
