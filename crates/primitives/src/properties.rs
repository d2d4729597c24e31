use std::fmt;

use indexmap::IndexMap;

use crate::value::Value;

/// Registry-assigned service id (`Long`).
pub const SERVICE_ID: &str = "service.id";
/// Selection priority of a service (`Int`, default 0).
pub const SERVICE_RANKING: &str = "service.ranking";
/// Interface ids a service is published under (`List` of `String`).
pub const OBJECTCLASS: &str = "objectclass";

/// Insertion-ordered map of service properties.
///
/// Keys are exact-match strings. Inserting an existing key replaces its value
/// in place without moving it to the end.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyMap {
	entries: IndexMap<String, Value>,
}

impl PropertyMap {
	/// Creates an empty map.
	pub fn new() -> Self {
		Self::default()
	}

	/// Builder-style insert.
	pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
		self.insert(key, value);
		self
	}

	/// Inserts or replaces a value, returning the previous one.
	pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
		self.entries.insert(key.into(), value.into())
	}

	/// Removes a key, preserving the order of the remaining entries.
	pub fn remove(&mut self, key: &str) -> Option<Value> {
		self.entries.shift_remove(key)
	}

	/// Returns the value for `key`, if present.
	pub fn get(&self, key: &str) -> Option<&Value> {
		self.entries.get(key)
	}

	/// Returns true if `key` is present.
	pub fn contains_key(&self, key: &str) -> bool {
		self.entries.contains_key(key)
	}

	/// Returns the keys in insertion order.
	pub fn keys(&self) -> impl Iterator<Item = &str> {
		self.entries.keys().map(String::as_str)
	}

	/// Returns the entries in insertion order.
	pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
		self.entries.iter().map(|(k, v)| (k.as_str(), v))
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	pub fn clear(&mut self) {
		self.entries.clear();
	}

	/// Ranking derived from [`SERVICE_RANKING`]; absent or non-integer values rank 0.
	pub fn ranking(&self) -> i32 {
		self.get(SERVICE_RANKING).and_then(Value::as_int).unwrap_or(0)
	}
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for PropertyMap {
	fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
		let mut map = Self::new();
		for (k, v) in iter {
			map.insert(k, v);
		}
		map
	}
}

/// Renders `k1=v1,k2=v2` in key order.
impl fmt::Display for PropertyMap {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		for (i, (k, v)) in self.entries.iter().enumerate() {
			if i > 0 {
				f.write_str(",")?;
			}
			write!(f, "{k}={v}")?;
		}
		Ok(())
	}
}
