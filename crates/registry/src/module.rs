//! Module identity and metadata.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Registry-assigned module identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ModuleId(pub(crate) u64);

impl ModuleId {
	pub const fn get(self) -> u64 {
		self.0
	}
}

impl fmt::Display for ModuleId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

/// A `major.minor.patch` module version.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
	pub major: u32,
	pub minor: u32,
	pub patch: u32,
}

impl Version {
	pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
		Self { major, minor, patch }
	}
}

impl fmt::Display for Version {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
	}
}

/// Error returned when parsing a [`Version`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid version {0:?}: expected major[.minor[.patch]]")]
pub struct ParseVersionError(String);

/// Parses `major[.minor[.patch]]`; omitted components default to 0.
impl FromStr for Version {
	type Err = ParseVersionError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let err = || ParseVersionError(s.to_string());
		let mut parts = s.trim().split('.');
		let mut next = |required: bool| -> Result<u32, ParseVersionError> {
			match parts.next() {
				Some(p) => p.parse().map_err(|_| err()),
				None if required => Err(err()),
				None => Ok(0),
			}
		};
		let version = Version::new(next(true)?, next(false)?, next(false)?);
		if parts.next().is_some() {
			return Err(err());
		}
		Ok(version)
	}
}

struct ModuleCore {
	id: ModuleId,
	name: String,
	version: Version,
	active: AtomicBool,
	stopping: AtomicBool,
}

/// Handle to an installed module.
///
/// Cheap to clone. Equality and hashing use the module id.
#[derive(Clone)]
pub struct Module {
	inner: Arc<ModuleCore>,
}

impl Module {
	pub(crate) fn new(id: ModuleId, name: String, version: Version) -> Self {
		Self {
			inner: Arc::new(ModuleCore {
				id,
				name,
				version,
				active: AtomicBool::new(true),
				stopping: AtomicBool::new(false),
			}),
		}
	}

	pub fn id(&self) -> ModuleId {
		self.inner.id
	}

	pub fn name(&self) -> &str {
		&self.inner.name
	}

	pub fn version(&self) -> Version {
		self.inner.version
	}

	/// Returns false once the module has been stopped.
	pub fn is_active(&self) -> bool {
		self.inner.active.load(Ordering::Acquire)
	}

	/// True from the start of a stop until the module is gone.
	///
	/// A stopping module is still active: its references stay valid while
	/// its services are unregistered, but it can no longer acquire anything
	/// the stop would have to release.
	pub fn is_stopping(&self) -> bool {
		self.inner.stopping.load(Ordering::Acquire)
	}

	/// Active and not stopping.
	pub(crate) fn is_running(&self) -> bool {
		self.is_active() && !self.is_stopping()
	}

	/// Enters the stopping state. Returns false if a stop already began.
	pub(crate) fn begin_stop(&self) -> bool {
		!self.inner.stopping.swap(true, Ordering::AcqRel)
	}

	/// Marks the module stopped. Returns false if it already was.
	pub(crate) fn deactivate(&self) -> bool {
		self.inner.active.swap(false, Ordering::AcqRel)
	}
}

impl PartialEq for Module {
	fn eq(&self, other: &Self) -> bool {
		self.inner.id == other.inner.id
	}
}

impl Eq for Module {}

impl Hash for Module {
	fn hash<H: Hasher>(&self, state: &mut H) {
		self.inner.id.hash(state);
	}
}

impl fmt::Debug for Module {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Module")
			.field("id", &self.inner.id)
			.field("name", &self.inner.name)
			.field("version", &self.inner.version)
			.field("active", &self.is_active())
			.field("stopping", &self.is_stopping())
			.finish()
	}
}

impl fmt::Display for Module {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{} {}", self.inner.name, self.inner.version)
	}
}
