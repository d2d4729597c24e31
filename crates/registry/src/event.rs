use std::fmt;

use crate::reference::ServiceReferenceBase;

/// What happened to a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceEventKind {
	/// The service was registered. Fired before `register` returns.
	Registered,
	/// The service properties changed and the listener filter still matches
	/// (or the listener has no filter).
	Modified,
	/// The service properties changed and the listener filter matched the old
	/// properties but no longer matches the new ones.
	ModifiedEndMatch,
	/// The service is being unregistered. The reference is still valid while
	/// this event is delivered.
	Unregistering,
}

impl fmt::Display for ServiceEventKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			Self::Registered => "REGISTERED",
			Self::Modified => "MODIFIED",
			Self::ModifiedEndMatch => "MODIFIED_ENDMATCH",
			Self::Unregistering => "UNREGISTERING",
		})
	}
}

/// A registry notification delivered to service listeners.
#[derive(Debug, Clone)]
pub struct ServiceEvent {
	kind: ServiceEventKind,
	reference: ServiceReferenceBase,
}

impl ServiceEvent {
	pub(crate) fn new(kind: ServiceEventKind, reference: ServiceReferenceBase) -> Self {
		Self { kind, reference }
	}

	pub fn kind(&self) -> ServiceEventKind {
		self.kind
	}

	pub fn reference(&self) -> &ServiceReferenceBase {
		&self.reference
	}
}

impl fmt::Display for ServiceEvent {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{} {}", self.kind, self.reference)
	}
}
