//! Handler registration and per-request dispatch.

use std::any::type_name;
use std::sync::Arc;

use tracing::{debug, error, trace, warn};

use crate::binder::bind;
use crate::binding::{BindOptions, BindingConfig};
use crate::classify::ArgumentKind;
use crate::config::Settings;
use crate::context::Context;
use crate::error::{BindError, ConfigError};
use crate::invoke::{ArgValue, BindingFn, HandlerReturn, Invoke, OutputRole, Target};
use crate::response::{global_response, ResponseFn};

/// How a request finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// The result went to the result collaborator.
    Responded,
    /// The handler took the writer and returned no data; it owns the
    /// response.
    Delegated,
}

struct Invocation {
    name: &'static str,
    config: BindingConfig,
    target: Box<dyn Invoke>,
    has_data: bool,
    owns_writer: bool,
    response: Option<ResponseFn>,
    settings: Settings,
}

/// A registered handler. Cheap to clone and safe to share across requests.
#[derive(Clone)]
pub struct RequestHandler {
    inner: Arc<Invocation>,
}

/// Check a declared return shape. Returns whether it carries data.
pub fn validate_return(outputs: &[OutputRole]) -> Result<bool, ConfigError> {
    match outputs {
        [OutputRole::Error] => Ok(false),
        [_] => Err(ConfigError::SingleReturnNotError),
        [OutputRole::Data, OutputRole::Error] => Ok(true),
        [_, _] => Err(ConfigError::PairReturn),
        other => Err(ConfigError::ReturnArity(other.len())),
    }
}

/// Validate `function` and its options and build its handler.
///
/// Every check runs here, once; a handler that registers successfully
/// never fails for configuration reasons at request time.
pub fn try_register<F, Args>(function: F, options: BindOptions) -> Result<RequestHandler, ConfigError>
where
    F: BindingFn<Args>,
    Args: 'static,
{
    let name = type_name::<F>();
    let response = options.response.clone();
    let settings = options.settings.clone();
    let mut config = options.into_config();
    config.validate_signature(&F::parameters())?;
    let has_data = validate_return(&F::Output::outputs())?;
    let owns_writer = config
        .arguments()
        .iter()
        .any(|argument| argument.kind() == ArgumentKind::ResponseWriter);

    debug!(
        handler = name,
        arguments = ?config.arguments().iter().map(|a| a.kind()).collect::<Vec<_>>(),
        has_data,
        "registered handler"
    );

    Ok(RequestHandler {
        inner: Arc::new(Invocation {
            name,
            config,
            target: Box::new(Target::<F, Args>::new(function)),
            has_data,
            owns_writer,
            response,
            settings,
        }),
    })
}

/// Like [`try_register`], but an invalid signature or configuration aborts.
///
/// # Panics
///
/// Panics with the configuration error. Call it during startup so a bad
/// handler never serves traffic.
pub fn register<F, Args>(function: F, options: BindOptions) -> RequestHandler
where
    F: BindingFn<Args>,
    Args: 'static,
{
    match try_register(function, options) {
        Ok(handler) => handler,
        Err(err) => {
            error!(handler = type_name::<F>(), error = %err, "handler registration failed");
            panic!("{err}");
        }
    }
}

impl RequestHandler {
    pub fn config(&self) -> &BindingConfig {
        &self.inner.config
    }

    pub fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    /// Bind the arguments, call the handler and route its result.
    pub fn handle(&self, ctx: &Context) -> Dispatch {
        let invocation = &self.inner;
        let args = match self.collect(ctx) {
            Ok(args) => args,
            Err(err) => {
                warn!(handler = invocation.name, error = %err, "argument binding failed");
                self.respond(ctx, None, Some(err));
                return Dispatch::Responded;
            }
        };

        let outcome = invocation.target.invoke(args);
        if let Some(err) = outcome.error {
            if err.is_binding() {
                trace!(handler = invocation.name, error = %err, "handler rejected the request");
            } else {
                warn!(handler = invocation.name, error = %err, "handler failed");
            }
            self.respond(ctx, None, Some(err));
            return Dispatch::Responded;
        }
        if invocation.owns_writer && !invocation.has_data {
            trace!(handler = invocation.name, "handler owns the response");
            return Dispatch::Delegated;
        }
        trace!(handler = invocation.name, "handler succeeded");
        self.respond(ctx, outcome.data, None);
        Dispatch::Responded
    }

    fn collect(&self, ctx: &Context) -> Result<Vec<ArgValue>, BindError> {
        let config = &self.inner.config;
        let mut args = Vec::with_capacity(config.arguments().len());
        for descriptor in config.arguments() {
            let value = match descriptor.kind() {
                ArgumentKind::Request => ArgValue::Request(ctx.request().clone()),
                ArgumentKind::Context => ArgValue::Context(ctx.request_context().clone()),
                ArgumentKind::ResponseWriter => ArgValue::Writer(ctx.writer().clone()),
                _ => ArgValue::Bound(bind(ctx, descriptor, config)?),
            };
            args.push(value);
        }
        Ok(args)
    }

    fn respond(&self, ctx: &Context, data: Option<serde_json::Value>, error: Option<BindError>) {
        let response = self.inner.response.clone().or_else(global_response);
        if let Some(response) = response {
            response(ctx, data, error);
        }
    }
}

impl std::fmt::Debug for RequestHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestHandler")
            .field("name", &self.inner.name)
            .field("config", &self.inner.config)
            .field("has_data", &self.inner.has_data)
            .finish_non_exhaustive()
    }
}
