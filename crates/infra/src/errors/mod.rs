//! Infrastructure error conversions

mod conversions;

pub use conversions::InfraError;

/// Convert any infrastructure error into the domain error, adding context.
pub fn infra_err(
    err: impl Into<InfraError>,
    context: impl std::fmt::Display,
) -> tidewater_domain::AgentError {
    let InfraError(inner) = err.into();
    inner.with_context(context)
}
