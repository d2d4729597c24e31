//! LDAP-style filters over [`PropertyMap`]s.
//!
//! # Grammar
//!
//! ```text
//! filter     = "(" filtercomp ")"
//! filtercomp = "&" filter+ | "|" filter+ | "!" filter | item
//! item       = attr ( "=" | "~=" | ">=" | "<=" ) value
//!            | attr "=*"
//!            | attr "=" substring
//! ```
//!
//! Whitespace between tokens is ignored and `\` escapes the following
//! character inside values.
//!
//! # Evaluation
//!
//! - A missing attribute never matches (a `!` around it simply negates that).
//! - The literal is interpreted with the type of the property value: numeric
//!   properties parse it as a number, booleans as `true`/`false`. Literals that
//!   fail to parse do not match.
//! - `~=` compares case-insensitively with whitespace removed.
//! - Substring patterns only apply to strings.
//! - List values match if any element matches.
//!
//! [`PropertyMap`]: crate::PropertyMap

use std::fmt;

mod eval;
mod parse;
#[cfg(test)]
mod tests;

use crate::properties::PropertyMap;

/// Comparison operator of a simple item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
	/// `=`
	Equal,
	/// `~=`
	Approx,
	/// `>=`
	GreaterEq,
	/// `<=`
	LessEq,
}

impl CompareOp {
	fn as_str(self) -> &'static str {
		match self {
			CompareOp::Equal => "=",
			CompareOp::Approx => "~=",
			CompareOp::GreaterEq => ">=",
			CompareOp::LessEq => "<=",
		}
	}
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Node {
	And(Vec<Node>),
	Or(Vec<Node>),
	Not(Box<Node>),
	Compare { attr: String, op: CompareOp, value: String },
	Present { attr: String },
	/// Segments between `*` wildcards; always at least two entries, the first
	/// and last of which may be empty.
	Substring { attr: String, segments: Vec<String> },
}

/// Error produced while parsing a filter string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message} at position {position} in filter {filter:?}")]
pub struct FilterError {
	/// The rejected filter string.
	pub filter: String,
	/// Character offset where parsing failed.
	pub position: usize,
	/// Description of the problem.
	pub message: String,
}

/// A parsed filter predicate.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
	root: Node,
}

impl Filter {
	/// Parses a filter string.
	pub fn parse(filter: &str) -> Result<Self, FilterError> {
		parse::Parser::new(filter).parse().map(|root| Self { root })
	}

	/// Evaluates the filter against a property map.
	pub fn matches(&self, properties: &PropertyMap) -> bool {
		eval::matches(&self.root, properties)
	}
}

impl std::str::FromStr for Filter {
	type Err = FilterError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::parse(s)
	}
}

/// Renders the normalized form: no whitespace, special characters escaped.
impl fmt::Display for Filter {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write_node(f, &self.root)
	}
}

fn write_node(f: &mut fmt::Formatter<'_>, node: &Node) -> fmt::Result {
	match node {
		Node::And(children) | Node::Or(children) => {
			f.write_str(if matches!(node, Node::And(_)) { "(&" } else { "(|" })?;
			for child in children {
				write_node(f, child)?;
			}
			f.write_str(")")
		}
		Node::Not(child) => {
			f.write_str("(!")?;
			write_node(f, child)?;
			f.write_str(")")
		}
		Node::Compare { attr, op, value } => {
			write!(f, "({attr}{}", op.as_str())?;
			write_escaped(f, value)?;
			f.write_str(")")
		}
		Node::Present { attr } => write!(f, "({attr}=*)"),
		Node::Substring { attr, segments } => {
			write!(f, "({attr}=")?;
			for (i, segment) in segments.iter().enumerate() {
				if i > 0 {
					f.write_str("*")?;
				}
				write_escaped(f, segment)?;
			}
			f.write_str(")")
		}
	}
}

fn write_escaped(f: &mut fmt::Formatter<'_>, value: &str) -> fmt::Result {
	for c in value.chars() {
		if matches!(c, '(' | ')' | '*' | '\\') {
			f.write_str("\\")?;
		}
		write!(f, "{c}")?;
	}
	Ok(())
}
