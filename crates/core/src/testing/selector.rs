//! Just enough CSS to evaluate compound selectors against fake elements.
//!
//! Supported: `tag`, `.class`, `#id`, `[attr]`, `[attr=v]`, `[attr*=v]`,
//! `[attr^=v]`, `[attr$=v]` with an optional ` i` flag, `:not(...)`, and
//! comma-separated lists. No combinators.

use super::FakeElement;

pub(crate) fn matches_list(selectors: &str, element: &FakeElement) -> bool {
	split_top_level(selectors)
		.into_iter()
		.any(|s| matches_compound(s.trim(), element))
}

fn split_top_level(input: &str) -> Vec<&str> {
	let mut parts = Vec::new();
	let (mut depth, mut quote, mut start) = (0i32, None, 0);
	for (i, c) in input.char_indices() {
		match (quote, c) {
			(Some(q), c) if c == q => quote = None,
			(Some(_), _) => {}
			(None, '"' | '\'') => quote = Some(c),
			(None, '[' | '(') => depth += 1,
			(None, ']' | ')') => depth -= 1,
			(None, ',') if depth == 0 => {
				parts.push(&input[start..i]);
				start = i + 1;
			}
			_ => {}
		}
	}
	parts.push(&input[start..]);
	parts
}

/// Index of the bracket closing the one at `open`, skipping quoted text.
fn closing(input: &str, open: usize, close: char) -> Option<usize> {
	let opener = input[open..].chars().next()?;
	let (mut depth, mut quote) = (0i32, None);
	for (i, c) in input[open..].char_indices() {
		match (quote, c) {
			(Some(q), c) if c == q => quote = None,
			(Some(_), _) => {}
			(None, '"' | '\'') => quote = Some(c),
			(None, c) if c == opener => depth += 1,
			(None, c) if c == close => {
				depth -= 1;
				if depth == 0 {
					return Some(open + i);
				}
			}
			_ => {}
		}
	}
	None
}

fn ident_len(input: &str) -> usize {
	input
		.find(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == '_'))
		.unwrap_or(input.len())
}

fn matches_compound(selector: &str, element: &FakeElement) -> bool {
	if selector.is_empty() {
		return false;
	}
	let tag_len = ident_len(selector);
	let tag = &selector[..tag_len];
	if !tag.is_empty() && !tag.eq_ignore_ascii_case(&element.tag) {
		return false;
	}
	let mut rest = selector[tag_len..].trim_start_matches('*');

	while let Some(first) = rest.chars().next() {
		match first {
			'.' => {
				let len = ident_len(&rest[1..]);
				if !element.has_class(&rest[1..1 + len]) {
					return false;
				}
				rest = &rest[1 + len..];
			}
			'#' => {
				let len = ident_len(&rest[1..]);
				if element.attributes.get("id").map(String::as_str) != Some(&rest[1..1 + len]) {
					return false;
				}
				rest = &rest[1 + len..];
			}
			'[' => {
				let Some(end) = closing(rest, 0, ']') else {
					return false;
				};
				if !attribute_matches(&rest[1..end], element) {
					return false;
				}
				rest = &rest[end + 1..];
			}
			':' if rest.starts_with(":not(") => {
				let Some(end) = closing(rest, 4, ')') else {
					return false;
				};
				if matches_compound(rest[5..end].trim(), element) {
					return false;
				}
				rest = &rest[end + 1..];
			}
			_ => return false,
		}
	}
	true
}

fn attribute_matches(condition: &str, element: &FakeElement) -> bool {
	let condition = condition.trim();
	let name_len = condition.find(['=', '*', '^', '$', ' ']).unwrap_or(condition.len());
	let name = &condition[..name_len];
	let actual = element.attributes.get(name);
	let rest = condition[name_len..].trim_start();
	if rest.is_empty() {
		return actual.is_some();
	}

	let (op, rest) = match rest.as_bytes() {
		[b'=', ..] => ('=', &rest[1..]),
		[op @ (b'*' | b'^' | b'$'), b'=', ..] => (*op as char, &rest[2..]),
		_ => return false,
	};
	let rest = rest.trim_start();
	let (expected, flags) = match rest.chars().next() {
		Some(q @ ('"' | '\'')) => match rest[1..].find(q) {
			Some(end) => (&rest[1..1 + end], rest[end + 2..].trim()),
			None => return false,
		},
		_ => {
			let end = rest.find(' ').unwrap_or(rest.len());
			(&rest[..end], rest[end..].trim())
		}
	};
	let Some(actual) = actual else {
		return false;
	};
	let (actual, expected) = if flags.eq_ignore_ascii_case("i") {
		(actual.to_lowercase(), expected.to_lowercase())
	} else {
		(actual.clone(), expected.to_string())
	};
	match op {
		'=' => actual == expected,
		'*' => actual.contains(&expected),
		'^' => actual.starts_with(&expected),
		'$' => actual.ends_with(&expected),
		_ => false,
	}
}
