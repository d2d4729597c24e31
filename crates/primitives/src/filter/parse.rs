//! Recursive-descent filter parser.

use super::{CompareOp, FilterError, Node};

pub(super) struct Parser<'a> {
	source: &'a str,
	chars: Vec<char>,
	pos: usize,
}

impl<'a> Parser<'a> {
	pub(super) fn new(source: &'a str) -> Self {
		Self {
			source,
			chars: source.chars().collect(),
			pos: 0,
		}
	}

	pub(super) fn parse(mut self) -> Result<Node, FilterError> {
		self.skip_whitespace();
		if self.at_end() {
			return Err(self.error("empty filter"));
		}
		let node = self.parse_filter()?;
		self.skip_whitespace();
		if !self.at_end() {
			return Err(self.error("extraneous trailing characters"));
		}
		Ok(node)
	}

	fn parse_filter(&mut self) -> Result<Node, FilterError> {
		self.skip_whitespace();
		self.expect('(')?;
		let node = self.parse_filter_comp()?;
		self.skip_whitespace();
		self.expect(')')?;
		Ok(node)
	}

	fn parse_filter_comp(&mut self) -> Result<Node, FilterError> {
		self.skip_whitespace();
		match self.peek() {
			Some('&') => {
				self.pos += 1;
				self.parse_list().map(Node::And)
			}
			Some('|') => {
				self.pos += 1;
				self.parse_list().map(Node::Or)
			}
			Some('!') => {
				self.pos += 1;
				self.parse_filter().map(|child| Node::Not(Box::new(child)))
			}
			_ => self.parse_item(),
		}
	}

	fn parse_list(&mut self) -> Result<Vec<Node>, FilterError> {
		self.skip_whitespace();
		if self.peek() != Some('(') {
			return Err(self.error("missing '('"));
		}
		let mut children = Vec::new();
		while self.peek() == Some('(') {
			children.push(self.parse_filter()?);
			self.skip_whitespace();
		}
		Ok(children)
	}

	fn parse_item(&mut self) -> Result<Node, FilterError> {
		let attr = self.parse_attr()?;
		let op = match (self.peek(), self.peek_at(1)) {
			(Some('~'), Some('=')) => {
				self.pos += 2;
				CompareOp::Approx
			}
			(Some('>'), Some('=')) => {
				self.pos += 2;
				CompareOp::GreaterEq
			}
			(Some('<'), Some('=')) => {
				self.pos += 2;
				CompareOp::LessEq
			}
			(Some('='), _) => {
				self.pos += 1;
				return self.parse_equality(attr);
			}
			_ => return Err(self.error("invalid operator")),
		};
		let value = self.parse_value()?;
		Ok(Node::Compare { attr, op, value })
	}

	fn parse_attr(&mut self) -> Result<String, FilterError> {
		self.skip_whitespace();
		let start = self.pos;
		while let Some(c) = self.peek() {
			if matches!(c, '~' | '<' | '>' | '=' | '(' | ')') {
				break;
			}
			self.pos += 1;
		}
		let attr: String = self.chars[start..self.pos].iter().collect();
		let attr = attr.trim_end();
		if attr.is_empty() {
			return Err(self.error("missing attribute"));
		}
		Ok(attr.to_string())
	}

	/// Parses the right-hand side of `=`: presence, substring or plain equality.
	fn parse_equality(&mut self, attr: String) -> Result<Node, FilterError> {
		let mut segments = vec![String::new()];
		let mut empty = true;
		loop {
			match self.peek() {
				None => return Err(self.error("missing ')'")),
				Some(')') => break,
				Some('(') => return Err(self.error("invalid value")),
				Some('*') => {
					self.pos += 1;
					segments.push(String::new());
					empty = false;
				}
				Some('\\') => {
					let escaped = self.peek_at(1).ok_or_else(|| self.error("dangling escape"))?;
					self.pos += 2;
					push_char(&mut segments, escaped);
					empty = false;
				}
				Some(c) => {
					self.pos += 1;
					push_char(&mut segments, c);
					empty = false;
				}
			}
		}

		if empty {
			return Err(self.error("missing value"));
		}
		if segments.len() == 1 {
			let value = segments.pop().unwrap_or_default();
			return Ok(Node::Compare {
				attr,
				op: CompareOp::Equal,
				value,
			});
		}
		if segments.iter().all(String::is_empty) && segments.len() == 2 {
			return Ok(Node::Present { attr });
		}
		Ok(Node::Substring { attr, segments })
	}

	fn parse_value(&mut self) -> Result<String, FilterError> {
		let mut value = String::new();
		loop {
			match self.peek() {
				None => return Err(self.error("missing ')'")),
				Some(')') => break,
				Some('(') => return Err(self.error("invalid value")),
				Some('\\') => {
					let escaped = self.peek_at(1).ok_or_else(|| self.error("dangling escape"))?;
					self.pos += 2;
					value.push(escaped);
				}
				Some(c) => {
					self.pos += 1;
					value.push(c);
				}
			}
		}
		if value.is_empty() {
			return Err(self.error("missing value"));
		}
		Ok(value)
	}

	fn expect(&mut self, c: char) -> Result<(), FilterError> {
		if self.peek() == Some(c) {
			self.pos += 1;
			Ok(())
		} else {
			Err(self.error(format!("missing '{c}'")))
		}
	}

	fn skip_whitespace(&mut self) {
		while self.peek().is_some_and(char::is_whitespace) {
			self.pos += 1;
		}
	}

	fn peek(&self) -> Option<char> {
		self.peek_at(0)
	}

	fn peek_at(&self, offset: usize) -> Option<char> {
		self.chars.get(self.pos + offset).copied()
	}

	fn at_end(&self) -> bool {
		self.pos >= self.chars.len()
	}

	fn error(&self, message: impl Into<String>) -> FilterError {
		FilterError {
			filter: self.source.to_string(),
			position: self.pos,
			message: message.into(),
		}
	}
}

fn push_char(segments: &mut [String], c: char) {
	if let Some(last) = segments.last_mut() {
		last.push(c);
	}
}
