#![doc(html_root_url = "https://docs.rs/tagged-dom/0.0.1")]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
//! A tagged-template DOM renderer.
//!
//! Templates are written with [`html!`], which compiles each call site once and then patches only the slots whose
//! values changed on every later render. See the README for an overview.

#[cfg(doctest)]
pub mod readme {
	doc_comment::doctest!("../README.md");
}

mod attributes;
mod compiler;
mod component;
pub mod dom;
mod events;
mod list;
mod scheduler;
mod value;
mod vnode;

pub use attributes::property_to_attribute;
pub use compiler::{instantiate, try_instantiate, CompileError, TemplateSite};
pub use component::{
	create_context, define_component, invalidate, provide_context, read_context, register_unmount_hook, Component, ComponentHandle, Context, Invocation,
};
pub use value::{handler, with_key, Handler, Instance, Key, Keyed, Style, Value};

use dom::Node;
use events::RootState;
use tracing::{error, instrument, trace};
use vnode::{Owner, Slot, VNode};

/// Instantiates a template.
///
/// Literal markup fragments alternate with dynamic expressions, starting and ending with a literal. Adjacent
/// expressions are separated by `""`. Every expression is converted with [`Value::from`].
///
/// ```
/// use tagged_dom::{html, Value};
///
/// let class = "greeting";
/// let name = "world";
/// let greeting: Value = html!("<p class=", class, ">Hello, ", name, "!</p>");
/// ```
///
/// A dynamic attribute fills the whole value, so it is written as `name=` directly before the expression. Void
/// elements are written self-closing, as in `<br />`.
///
/// Each expansion declares one `static` [`TemplateSite`], so it is compiled once no matter how often it runs.
///
/// # Panics
///
/// Iff the template can't be compiled. See [`try_instantiate`].
#[macro_export]
macro_rules! html {
	($first:literal $(, $arg:expr, $rest:literal)*) => {{
		static SITE: $crate::TemplateSite = $crate::TemplateSite::new(&[$first $(, $rest)*]);
		$crate::instantiate(&SITE, ::std::vec![$($crate::Value::from($arg)),*])
	}};
}

/// Renders `value` into `container`.
///
/// The first call for a container clears it and mounts `value`. Later calls update the mounted tree in place.
#[instrument(skip_all)]
pub fn render(value: impl Into<Value>, container: &Node) {
	let value = value.into();

	if let Some(marker) = container.root_marker() {
		if let Some(root) = events::container(marker) {
			let Some(tree) = root.take_tree() else {
				error!("Container is already being rendered. Ignoring the nested render.");
				return;
			};
			trace!(root = marker, "Updating container");
			let tree = tree.update(&value, &|| None);
			root.put_tree(tree);
			return;
		}
		if events::is_live(marker) {
			error!("Refusing to render into a node that is managed by another template.");
			return;
		}
	}

	container.set_text_content("");
	let root = RootState::container(container);
	trace!(root = root.id, "Mounting container");
	let slot = Slot {
		parent: container.clone(),
		exclusive: true,
		owner: Owner::Root,
		root: std::rc::Rc::downgrade(&root),
		delegation_root: container.is_custom_element(),
		depth: 0,
	};
	let tree = VNode::render(&value, slot, None);
	root.put_tree(tree);
}

/// Unmounts whatever was [`render`]ed into `container`: runs unmount hooks, removes the rendered DOM and the
/// container's event listeners.
///
/// Returns whether anything was mounted.
#[instrument(skip_all)]
pub fn unmount(container: &Node) -> bool {
	let Some(root) = container.root_marker().and_then(events::remove_container) else {
		return false;
	};
	match root.take_tree() {
		Some(tree) => {
			tree.unmount();
			tree.remove();
		}
		None => error!("Unmounting a container that is being rendered. Its content is left in place."),
	}
	trace!(root = root.id, "Unmounted container");
	true
}
