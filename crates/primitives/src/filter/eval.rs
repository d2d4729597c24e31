use std::cmp::Ordering;

use super::{CompareOp, Node};
use crate::properties::PropertyMap;
use crate::value::Value;

pub(super) fn matches(node: &Node, properties: &PropertyMap) -> bool {
	match node {
		Node::And(children) => children.iter().all(|c| matches(c, properties)),
		Node::Or(children) => children.iter().any(|c| matches(c, properties)),
		Node::Not(child) => !matches(child, properties),
		Node::Present { attr } => properties.contains_key(attr),
		Node::Compare { attr, op, value } => properties
			.get(attr)
			.is_some_and(|prop| compare(prop, *op, value)),
		Node::Substring { attr, segments } => properties
			.get(attr)
			.is_some_and(|prop| substring(prop, segments)),
	}
}

fn compare(prop: &Value, op: CompareOp, literal: &str) -> bool {
	match prop {
		Value::String(s) => match op {
			CompareOp::Equal => s == literal,
			CompareOp::Approx => approx(s).eq_ignore_ascii_case(&approx(literal)),
			CompareOp::GreaterEq => s.as_str() >= literal,
			CompareOp::LessEq => s.as_str() <= literal,
		},
		Value::Int(v) => compare_ord(i64::from(*v), literal.trim().parse::<i64>().ok(), op),
		Value::Long(v) => compare_ord(*v, literal.trim().parse::<i64>().ok(), op),
		Value::Double(v) => {
			let Ok(rhs) = literal.trim().parse::<f64>() else {
				return false;
			};
			match (op, v.partial_cmp(&rhs)) {
				(_, None) => false,
				(CompareOp::Equal | CompareOp::Approx, Some(ord)) => ord == Ordering::Equal,
				(CompareOp::GreaterEq, Some(ord)) => ord != Ordering::Less,
				(CompareOp::LessEq, Some(ord)) => ord != Ordering::Greater,
			}
		}
		Value::Bool(v) => parse_bool(literal).is_some_and(|rhs| *v == rhs),
		Value::List(items) => items.iter().any(|item| compare(item, op, literal)),
		Value::Object(_) => false,
	}
}

fn compare_ord(lhs: i64, rhs: Option<i64>, op: CompareOp) -> bool {
	let Some(rhs) = rhs else {
		return false;
	};
	match op {
		CompareOp::Equal | CompareOp::Approx => lhs == rhs,
		CompareOp::GreaterEq => lhs >= rhs,
		CompareOp::LessEq => lhs <= rhs,
	}
}

fn parse_bool(literal: &str) -> Option<bool> {
	let literal = literal.trim();
	if literal.eq_ignore_ascii_case("true") {
		Some(true)
	} else if literal.eq_ignore_ascii_case("false") {
		Some(false)
	} else {
		None
	}
}

fn approx(s: &str) -> String {
	s.chars().filter(|c| !c.is_whitespace()).collect()
}

fn substring(prop: &Value, segments: &[String]) -> bool {
	match prop {
		Value::String(s) => substring_str(s, segments),
		Value::List(items) => items.iter().any(|item| substring(item, segments)),
		_ => false,
	}
}

fn substring_str(s: &str, segments: &[String]) -> bool {
	let Some((first, rest)) = segments.split_first() else {
		return false;
	};
	let Some((last, middle)) = rest.split_last() else {
		return s == first;
	};
	if !s.starts_with(first.as_str()) {
		return false;
	}
	let mut pos = first.len();
	for segment in middle.iter().filter(|m| !m.is_empty()) {
		match s[pos..].find(segment.as_str()) {
			Some(idx) => pos += idx + segment.len(),
			None => return false,
		}
	}
	s.len() - pos >= last.len() && s.ends_with(last.as_str())
}
