use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// The value of a service property.
#[derive(Clone)]
pub enum Value {
	/// Boolean value.
	Bool(bool),
	/// 32-bit integer value.
	Int(i32),
	/// 64-bit integer value.
	Long(i64),
	/// Floating point value.
	Double(f64),
	/// String value.
	String(String),
	/// Ordered list of values.
	List(Vec<Value>),
	/// Opaque shared object. Compared by identity.
	Object(Arc<dyn Any + Send + Sync>),
}

impl Value {
	/// Wraps an arbitrary shared object.
	pub fn object<T: Any + Send + Sync>(value: T) -> Self {
		Value::Object(Arc::new(value))
	}

	/// Returns the boolean value if this is a `Bool` variant.
	pub fn as_bool(&self) -> Option<bool> {
		match self {
			Value::Bool(v) => Some(*v),
			_ => None,
		}
	}

	/// Returns the value as `i64` if this is an `Int` or `Long` variant.
	pub fn as_long(&self) -> Option<i64> {
		match self {
			Value::Int(v) => Some(i64::from(*v)),
			Value::Long(v) => Some(*v),
			_ => None,
		}
	}

	/// Returns the value as `i32` if it is an integer that fits.
	pub fn as_int(&self) -> Option<i32> {
		self.as_long().and_then(|v| i32::try_from(v).ok())
	}

	/// Returns the floating point value if this is a `Double` variant.
	pub fn as_double(&self) -> Option<f64> {
		match self {
			Value::Double(v) => Some(*v),
			_ => None,
		}
	}

	/// Returns the string value if this is a `String` variant.
	pub fn as_str(&self) -> Option<&str> {
		match self {
			Value::String(v) => Some(v),
			_ => None,
		}
	}

	/// Returns the elements if this is a `List` variant.
	pub fn as_list(&self) -> Option<&[Value]> {
		match self {
			Value::List(v) => Some(v),
			_ => None,
		}
	}

	/// Downcasts an `Object` variant to a concrete type.
	pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
		match self {
			Value::Object(v) => v.downcast_ref::<T>(),
			_ => None,
		}
	}

	/// Returns the type name of this value.
	pub fn type_name(&self) -> &'static str {
		match self {
			Value::Bool(_) => "bool",
			Value::Int(_) => "int",
			Value::Long(_) => "long",
			Value::Double(_) => "double",
			Value::String(_) => "string",
			Value::List(_) => "list",
			Value::Object(_) => "object",
		}
	}
}

impl PartialEq for Value {
	fn eq(&self, other: &Self) -> bool {
		match (self, other) {
			(Value::Bool(a), Value::Bool(b)) => a == b,
			(Value::Int(a), Value::Int(b)) => a == b,
			(Value::Long(a), Value::Long(b)) => a == b,
			(Value::Double(a), Value::Double(b)) => a == b,
			(Value::String(a), Value::String(b)) => a == b,
			(Value::List(a), Value::List(b)) => a == b,
			(Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
			_ => false,
		}
	}
}

impl fmt::Debug for Value {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Value::Bool(v) => f.debug_tuple("Bool").field(v).finish(),
			Value::Int(v) => f.debug_tuple("Int").field(v).finish(),
			Value::Long(v) => f.debug_tuple("Long").field(v).finish(),
			Value::Double(v) => f.debug_tuple("Double").field(v).finish(),
			Value::String(v) => f.debug_tuple("String").field(v).finish(),
			Value::List(v) => f.debug_tuple("List").field(v).finish(),
			Value::Object(_) => f.write_str("Object(..)"),
		}
	}
}

impl fmt::Display for Value {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Value::Bool(v) => write!(f, "{v}"),
			Value::Int(v) => write!(f, "{v}"),
			Value::Long(v) => write!(f, "{v}"),
			Value::Double(v) => write!(f, "{v}"),
			Value::String(v) => f.write_str(v),
			Value::List(items) => {
				f.write_str("[")?;
				for (i, item) in items.iter().enumerate() {
					if i > 0 {
						f.write_str(", ")?;
					}
					write!(f, "{item}")?;
				}
				f.write_str("]")
			}
			Value::Object(_) => f.write_str("<object>"),
		}
	}
}

impl From<bool> for Value {
	fn from(v: bool) -> Self {
		Value::Bool(v)
	}
}

impl From<i32> for Value {
	fn from(v: i32) -> Self {
		Value::Int(v)
	}
}

impl From<i64> for Value {
	fn from(v: i64) -> Self {
		Value::Long(v)
	}
}

impl From<f64> for Value {
	fn from(v: f64) -> Self {
		Value::Double(v)
	}
}

impl From<String> for Value {
	fn from(v: String) -> Self {
		Value::String(v)
	}
}

impl From<&str> for Value {
	fn from(v: &str) -> Self {
		Value::String(v.to_string())
	}
}

impl<T: Into<Value>> From<Vec<T>> for Value {
	fn from(v: Vec<T>) -> Self {
		Value::List(v.into_iter().map(Into::into).collect())
	}
}
