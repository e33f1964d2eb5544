use crate::exception::{Exception, RequestContext};

/// Sink for exceptions that pass the "do not report" check
pub trait Reporter: Send + Sync + 'static {
    fn report(&self, ctx: &RequestContext, exception: &Exception);
}

/// Logs reported exceptions through `tracing`
#[derive(Clone, Default)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn report(&self, ctx: &RequestContext, exception: &Exception) {
        tracing::error!(
            kind = %exception.kind(),
            method = %ctx.method,
            uri = %ctx.uri,
            error = ?exception,
            "Unhandled exception: {}",
            exception
        );
    }
}
