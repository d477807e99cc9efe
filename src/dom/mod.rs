//! The DOM boundary.
//!
//! In the browser (`wasm32`) this wraps [`web_sys`] nodes. Everywhere else it is [`mem`], a small in-memory DOM with
//! the same surface, which is what the native test suite renders into.
//!
//! Only the operations the engine needs are exposed crate-wide: navigation by
//! [***firstChild***](https://developer.mozilla.org/en-US/docs/Web/API/Node/firstChild) and
//! [***nextSibling***](https://developer.mozilla.org/en-US/docs/Web/API/Node/nextSibling),
//! [***insertBefore***](https://developer.mozilla.org/en-US/docs/Web/API/Node/insertBefore) and friends,
//! attribute/property/style writes, a rendering-root marker and event listener registration.

use std::rc::Rc;
use thiserror::Error;

#[cfg(not(target_arch = "wasm32"))]
pub mod mem;
#[cfg(not(target_arch = "wasm32"))]
pub use mem::{Event, Listener, Node};
#[cfg(not(target_arch = "wasm32"))]
pub(crate) use mem::queue_microtask;

#[cfg(target_arch = "wasm32")]
mod web;
#[cfg(target_arch = "wasm32")]
pub(crate) use web::queue_microtask;
#[cfg(target_arch = "wasm32")]
pub use web::{Event, Listener, Node};

/// A value assigned to a DOM property.
#[derive(Debug, Clone, PartialEq)]
pub enum Prop {
	Null,
	Bool(bool),
	Number(f64),
	Text(Rc<str>),
}

impl Prop {
	/// The string a property of this value reflects into an attribute as.
	#[must_use]
	pub fn to_attribute_value(&self) -> Option<String> {
		match self {
			Prop::Null => None,
			Prop::Bool(value) => Some(value.to_string()),
			Prop::Number(value) => Some(crate::value::format_number(*value)),
			Prop::Text(value) => Some(value.to_string()),
		}
	}
}

#[derive(Debug, Error)]
pub enum DomError {
	#[error("no document is available to parse template markup")]
	NoDocument,
	#[error("template markup did not parse into template content")]
	Markup,
	#[error("DOM call failed: {0}")]
	Js(String),
}

/// Whether a tag name denotes a custom element, which by definition contains a hyphen.
pub(crate) fn is_custom_tag(tag: &str) -> bool {
	tag.contains('-')
}
