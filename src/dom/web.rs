use super::{is_custom_tag, DomError, Prop};
use core::fmt::{self, Debug, Formatter};
use js_sys::{Object, Reflect};
use tracing::error;
use wasm_bindgen::{closure::Closure, JsCast, JsValue, UnwrapThrowExt};
use web_sys::{AddEventListenerOptions, CharacterData, CssStyleDeclaration, Element, EventTarget, HtmlTemplateElement};

/// Where a rendering root stores its id on its DOM node.
const ROOT_MARKER: &str = "$taggedDomRoot";

/// A [`web_sys::Node`]. Equality is identity.
#[derive(Clone, PartialEq, Eq)]
pub struct Node(web_sys::Node);

impl Debug for Node {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		match self.tag_name() {
			Some(tag) => write!(f, "<{}>", tag),
			None => f.write_str(&self.0.node_name()),
		}
	}
}

impl From<web_sys::Node> for Node {
	fn from(node: web_sys::Node) -> Self {
		Self(node)
	}
}

impl From<Element> for Node {
	fn from(element: Element) -> Self {
		Self(element.into())
	}
}

impl From<web_sys::HtmlElement> for Node {
	fn from(element: web_sys::HtmlElement) -> Self {
		Self(element.into())
	}
}

impl AsRef<web_sys::Node> for Node {
	fn as_ref(&self) -> &web_sys::Node {
		&self.0
	}
}

fn document() -> Result<web_sys::Document, DomError> {
	web_sys::window().and_then(|window| window.document()).ok_or(DomError::NoDocument)
}

fn js_error(error: JsValue) -> DomError {
	DomError::Js(format!("{:?}", error))
}

impl Node {
	#[must_use]
	pub fn as_web_sys(&self) -> &web_sys::Node {
		&self.0
	}

	pub(crate) fn create_text(data: &str) -> Self {
		Self(web_sys::Text::new_with_data(data).expect_throw("tagged-dom: Failed to create a text node.").into())
	}

	/// Parses through a detached [***template***](https://developer.mozilla.org/en-US/docs/Web/HTML/Element/template)
	/// element, so scripts don't run and nothing is fetched.
	pub(crate) fn parse_fragment(html: &str) -> Result<Self, DomError> {
		let template = document()?
			.create_element("template")
			.map_err(js_error)?
			.dyn_into::<HtmlTemplateElement>()
			.map_err(|element| DomError::Js(format!("Expected `HtmlTemplateElement` but found {:?}", element)))?;
		template.set_inner_html(html);
		Ok(Self(template.content().into()))
	}

	#[must_use]
	pub fn tag_name(&self) -> Option<String> {
		self.0.dyn_ref::<Element>().map(Element::local_name)
	}

	#[must_use]
	pub fn is_custom_element(&self) -> bool {
		self.tag_name().map_or(false, |tag| is_custom_tag(&tag))
	}

	#[must_use]
	pub fn parent_node(&self) -> Option<Node> {
		self.0.parent_node().map(Self)
	}

	#[must_use]
	pub fn first_child(&self) -> Option<Node> {
		self.0.first_child().map(Self)
	}

	#[must_use]
	pub fn last_child(&self) -> Option<Node> {
		self.0.last_child().map(Self)
	}

	#[must_use]
	pub fn next_sibling(&self) -> Option<Node> {
		self.0.next_sibling().map(Self)
	}

	pub(crate) fn child_index(&self, child: &Node) -> Option<usize> {
		let child_nodes = self.0.child_nodes();
		(0..child_nodes.length()).find(|&i| child_nodes.get(i).as_ref() == Some(&child.0)).map(|i| i as usize)
	}

	pub(crate) fn insert_before(&self, node: &Node, before: Option<&Node>) {
		if let Err(error) = self.0.insert_before(&node.0, before.map(|before| &before.0)) {
			error!("Failed to insert node: {:?}", error);
		}
	}

	pub fn append_child(&self, child: &Node) {
		self.insert_before(child, None);
	}

	pub fn remove(&self) {
		if let Some(parent) = self.0.parent_node() {
			if let Err(error) = parent.remove_child(&self.0) {
				error!("Failed to remove node: {:?}", error);
			}
		}
	}

	pub(crate) fn clone_deep(&self) -> Node {
		Self(self.0.clone_node_with_deep(true).expect_throw("tagged-dom: Failed to clone a template node."))
	}

	pub fn set_text_content(&self, text: &str) {
		self.0.set_text_content(Some(text));
	}

	pub(crate) fn set_data(&self, data: &str) {
		if let Some(character_data) = self.0.dyn_ref::<CharacterData>() {
			character_data.set_data(data);
		}
	}

	fn element(&self) -> Option<&Element> {
		self.0.dyn_ref::<Element>()
	}

	pub fn set_attribute(&self, name: &str, value: &str) {
		if let Some(element) = self.element() {
			if let Err(error) = element.set_attribute(name, value) {
				error!("Failed to set attribute {:?}: {:?}", name, error);
			}
		}
	}

	pub(crate) fn remove_attribute(&self, name: &str) {
		if let Some(element) = self.element() {
			if let Err(error) = element.remove_attribute(name) {
				error!("Failed to remove attribute {:?}: {:?}", name, error);
			}
		}
	}

	pub(crate) fn set_class_name(&self, class_name: &str) {
		if let Some(element) = self.element() {
			element.set_class_name(class_name);
		}
	}

	/// [***HTMLElement.style***](https://developer.mozilla.org/en-US/docs/Web/API/HTMLElement/style), which SVG elements also carry.
	fn style(&self) -> Option<CssStyleDeclaration> {
		let style = Reflect::get(&self.0, &JsValue::from_str("style")).ok()?;
		style.is_object().then(|| style.unchecked_into())
	}

	pub(crate) fn set_style_property(&self, name: &str, value: &str) {
		if let Some(style) = self.style() {
			if let Err(error) = style.set_property(name, value) {
				error!("Failed to set style property {:?}: {:?}", name, error);
			}
		}
	}

	pub(crate) fn remove_style_property(&self, name: &str) {
		if let Some(style) = self.style() {
			if let Err(error) = style.remove_property(name) {
				error!("Failed to remove style property {:?}: {:?}", name, error);
			}
		}
	}

	pub(crate) fn has_property(&self, name: &str) -> bool {
		Reflect::has(&self.0, &JsValue::from_str(name)).unwrap_or(false)
	}

	pub(crate) fn set_property(&self, name: &str, value: &Prop) {
		let value = match value {
			Prop::Null => JsValue::NULL,
			Prop::Bool(value) => JsValue::from_bool(*value),
			Prop::Number(value) => JsValue::from_f64(*value),
			Prop::Text(value) => JsValue::from_str(value),
		};
		if let Err(error) = Reflect::set(&self.0, &JsValue::from_str(name), &value) {
			error!("Failed to set property {:?}: {:?}", name, error);
		}
	}

	pub(crate) fn set_inner_html(&self, html: &str) {
		if let Some(element) = self.element() {
			element.set_inner_html(html);
		}
	}

	pub(crate) fn root_marker(&self) -> Option<u32> {
		#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
		Reflect::get(&self.0, &JsValue::from_str(ROOT_MARKER)).ok().and_then(|marker| marker.as_f64()).map(|marker| marker as u32)
	}

	pub(crate) fn set_root_marker(&self, marker: Option<u32>) {
		let key = JsValue::from_str(ROOT_MARKER);
		let result = match marker {
			Some(id) => Reflect::set(&self.0, &key, &JsValue::from(id)),
			None => Reflect::delete_property(self.0.unchecked_ref::<Object>(), &key),
		};
		if let Err(error) = result {
			error!("Failed to update rendering root marker: {:?}", error);
		}
	}

	pub(crate) fn add_listener(&self, event_type: &str, capture: bool, callback: impl Fn(&Event) + 'static) -> Listener {
		let closure = Closure::wrap(Box::new(move |event: web_sys::Event| callback(&Event(event))) as Box<dyn Fn(web_sys::Event)>);
		let target: &EventTarget = self.0.as_ref();
		let mut options = AddEventListenerOptions::new();
		options.capture(capture).passive(false);
		if let Err(error) = target.add_event_listener_with_callback_and_add_event_listener_options(event_type, closure.as_ref().unchecked_ref(), &options) {
			error!("Failed to add {:?} listener: {:?}", event_type, error);
		}
		Listener {
			target: target.clone(),
			event_type: event_type.to_owned(),
			capture,
			closure,
		}
	}
}

/// Removes its event listener when dropped.
pub struct Listener {
	target: EventTarget,
	event_type: String,
	capture: bool,
	closure: Closure<dyn Fn(web_sys::Event)>,
}

impl Debug for Listener {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("Listener").field("event_type", &self.event_type).field("capture", &self.capture).finish()
	}
}

impl Drop for Listener {
	fn drop(&mut self) {
		if let Err(error) = self.target.remove_event_listener_with_callback_and_bool(&self.event_type, self.closure.as_ref().unchecked_ref(), self.capture) {
			error!("Failed to remove {:?} listener: {:?}", self.event_type, error);
		}
	}
}

/// A [`web_sys::Event`].
#[derive(Debug, Clone)]
pub struct Event(web_sys::Event);

impl Event {
	#[must_use]
	pub fn as_web_sys(&self) -> &web_sys::Event {
		&self.0
	}

	#[must_use]
	pub fn event_type(&self) -> String {
		self.0.type_()
	}

	#[must_use]
	pub fn bubbles(&self) -> bool {
		self.0.bubbles()
	}

	#[must_use]
	pub fn cancel_bubble(&self) -> bool {
		self.0.cancel_bubble()
	}

	pub fn stop_propagation(&self) {
		self.0.stop_propagation();
	}

	pub fn prevent_default(&self) {
		self.0.prevent_default();
	}

	#[must_use]
	pub fn target(&self) -> Option<Node> {
		self.0.target().and_then(|target| target.dyn_into::<web_sys::Node>().ok()).map(Node)
	}

	/// [***composedPath()***](https://developer.mozilla.org/en-US/docs/Web/API/Event/composedPath), nodes only.
	pub(crate) fn path(&self) -> Vec<Node> {
		self.0.composed_path().iter().filter_map(|target| target.dyn_into::<web_sys::Node>().ok()).map(Node).collect()
	}
}

/// Runs `task` after the current task, as a promise reaction.
pub(crate) fn queue_microtask(task: Box<dyn FnOnce()>) {
	wasm_bindgen_futures::spawn_local(async move { task() });
}
