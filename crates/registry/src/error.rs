use plexus_primitives::FilterError;

use crate::module::Module;
use crate::registration::ServiceId;

/// Errors raised by registry operations.
///
/// Absence of a matching service is not an error: lookups return an invalid
/// reference or `None` instead.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
	/// A caller-supplied argument was rejected (e.g. an empty interface set).
	#[error("invalid argument: {0}")]
	InvalidArgument(String),

	/// The operation is not allowed in the current lifecycle state.
	#[error("illegal state: {0}")]
	IllegalState(String),

	/// A filter string could not be parsed.
	#[error("invalid filter: {0}")]
	Filter(#[from] FilterError),

	/// A provider's service factory failed.
	#[error("service factory for service {service_id} failed: {source}")]
	Factory {
		service_id: ServiceId,
		#[source]
		source: anyhow::Error,
	},
}

impl RegistryError {
	/// Returns true for argument errors, including malformed filters.
	pub fn is_invalid_argument(&self) -> bool {
		matches!(self, Self::InvalidArgument(_) | Self::Filter(_))
	}

	pub(crate) fn module_stopped(module: &Module) -> Self {
		let state = if module.is_active() { "stopping" } else { "stopped" };
		Self::IllegalState(format!("module {module} is {state}"))
	}

	/// Returns true for lifecycle errors.
	pub fn is_illegal_state(&self) -> bool {
		matches!(self, Self::IllegalState(_))
	}
}

pub type Result<T, E = RegistryError> = std::result::Result<T, E>;
