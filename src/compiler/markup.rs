//! String passes over a template's literal fragments.
//!
//! [`build_html`] assembles the markup that is actually parsed. [`representation`] reads the same fragments as a tree of
//! static nodes, attribute slots and insertions, which is walked in lockstep with the parsed markup afterwards.
//!
//! Both passes only look at the literal text. Dynamic attributes must therefore fill a whole value (`class=` directly
//! before the slot), and void elements must be written self-closing (`<br />`) so the two views agree on nesting.

use super::CompileError;
use regex::Regex;
use std::sync::OnceLock;

macro_rules! regex {
	($re:literal) => {{
		static REGEX: OnceLock<Regex> = OnceLock::new();
		REGEX.get_or_init(|| Regex::new($re).expect("tagged-dom bug: Invalid markup regex."))
	}};
}

fn flips_tag_state(fragment: &str) -> bool {
	fragment.matches('<').count() != fragment.matches('>').count()
}

/// Joins `strings` into the markup of the template.
///
/// Dynamic attribute names are dropped, since their value is set at mount. Text that follows a slot is prefixed with
/// an empty comment so it stays a separate text node, and structural whitespace is collapsed.
pub(crate) fn build_html(strings: &[&str]) -> String {
	let mut inside_tag = false;
	let mut html = String::new();
	for fragment in strings {
		let result = regex!(r"[\w-]+=$").replace(fragment, "");
		let trimmed = result.trim();
		if !trimmed.is_empty() && !inside_tag && !regex!(r"^(</?|/?>)").is_match(trimmed) {
			html.push_str("<!-- -->");
		}
		html.push_str(&result);
		if flips_tag_state(trimmed) {
			inside_tag = !inside_tag;
		}
	}

	let html = regex!(r"\n\s+(\w+=)").replace_all(&html, " ${1}").into_owned();
	let html = regex!(r"\n\s+").replace_all(&html, "").into_owned();
	let html = html.replace('\n', "");
	let html = regex!(r">\s+<").replace_all(&html, "><").into_owned();
	let html = regex!(r#"(\w+"?)\s+(\w+=)"#).replace_all(&html, "${1} ${2}").into_owned();
	let html = regex!(r#"(\w+"?)\s+(/?>)"#).replace_all(&html, "${1}${2}").into_owned();
	html.trim().to_owned()
}

/// Like script's `String.prototype.split` with a capturing regex: the text between matches, interleaved with the
/// first capture group of each match.
fn split_keeping<'a>(regex: &Regex, text: &'a str) -> Vec<&'a str> {
	let mut terms = Vec::new();
	let mut last = 0;
	for captures in regex.captures_iter(text) {
		let (Some(whole), Some(group)) = (captures.get(0), captures.get(1)) else {
			continue;
		};
		terms.push(&text[last..whole.start()]);
		terms.push(group.as_str());
		last = whole.end();
	}
	terms.push(&text[last..]);
	terms
}

/// Marks every run of text in `fragment` with a trailing `<p />`, so the representation sees it as a node.
pub(crate) fn wrap_text(fragment: &str) -> String {
	let fragment = fragment.trim();
	let mut terms = split_keeping(regex!(r"(</?[^>]+/?>)"), fragment);

	let first = terms.remove(0);
	let mut head = split_keeping(regex!(r"^([^>]*/?>)"), first);
	head.append(&mut terms);
	let mut terms = head;

	if let Some(last) = terms.pop() {
		terms.extend(split_keeping(regex!(r"(<\w[\s\S]*)$"), last));
	}

	terms
		.into_iter()
		.map(|term| {
			if term.contains(['<', '>']) || regex!(r"\w+=$").is_match(term) || term.trim().is_empty() {
				term.to_owned()
			} else {
				format!("{}<p />", term)
			}
		})
		.collect()
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum RepNode {
	Static(StaticNode),
	/// Dynamic content filled by the argument at this index.
	Insertion(usize),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub(crate) struct StaticNode {
	/// Empty for the synthetic container of a template's roots. `p` for text runs.
	pub tag: String,
	pub props: Vec<RepProp>,
	pub children: Vec<RepNode>,
	/// Whether the parsed markup has a spacer comment right before this node.
	pub remove: bool,
	pub custom: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RepProp {
	pub name: String,
	pub arg: usize,
}

impl StaticNode {
	fn new(tag: &str) -> Self {
		Self {
			tag: tag.to_owned(),
			custom: tag != "!--" && crate::dom::is_custom_tag(tag),
			..Self::default()
		}
	}
}

/// Reads `strings` as a tree. The returned node is a synthetic container whose children are the template's roots.
///
/// Argument indices count from zero, so the slot between `strings[i]` and `strings[i + 1]` is argument `i`.
pub(crate) fn representation(strings: &[&str]) -> Result<StaticNode, CompileError> {
	let last = strings.len().saturating_sub(1);
	let mut stack = vec![StaticNode::new("")];
	let mut inside_tag = false;

	for (i, fragment) in strings.iter().enumerate() {
		let fragment = wrap_text(fragment);
		let mut remove_scheduled = !fragment.is_empty() && !inside_tag && !regex!(r"^(</?|/?>)").is_match(&fragment);

		for command in regex!(r"(<[\w-]+|</|<!--|->|/>)").find_iter(&fragment) {
			let command = command.as_str();
			if command[1..].starts_with(['>', '/']) {
				let node = stack.pop().ok_or_else(|| CompileError::Structure("unbalanced closing tag".to_owned()))?;
				stack
					.last_mut()
					.ok_or_else(|| CompileError::Structure("unbalanced closing tag".to_owned()))?
					.children
					.push(RepNode::Static(node));
			} else {
				let mut node = StaticNode::new(&command[1..]);
				if remove_scheduled {
					node.remove = true;
					remove_scheduled = false;
				}
				stack.push(node);
			}
		}

		if i != last {
			let parent = stack.last_mut().ok_or_else(|| CompileError::Structure("unbalanced closing tag".to_owned()))?;
			match regex!(r"(\S+)=$").captures(&fragment).and_then(|captures| captures.get(1)) {
				Some(name) => parent.props.push(RepProp {
					name: name.as_str().to_owned(),
					arg: i,
				}),
				None => parent.children.push(RepNode::Insertion(i)),
			}
		}

		if flips_tag_state(&fragment) {
			inside_tag = !inside_tag;
		}
	}

	// Unclosed elements end with the template.
	while stack.len() > 1 {
		let node = stack.pop().expect("tagged-dom bug: Representation stack underflow.");
		stack
			.last_mut()
			.expect("tagged-dom bug: Representation stack underflow.")
			.children
			.push(RepNode::Static(node));
	}
	stack.pop().ok_or_else(|| CompileError::Structure("unbalanced closing tag".to_owned()))
}
