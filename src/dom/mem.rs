//! An in-memory DOM with the same surface as the browser backend.
//!
//! It implements just enough of the platform for the engine to run natively: a node tree with
//! [***insertBefore***](https://developer.mozilla.org/en-US/docs/Web/API/Node/insertBefore) semantics (including
//! fragments), attributes, reflected and live properties, inline style declarations, HTML5 fragment parsing through
//! [`scraper`], event dispatch with capture, target and bubble phases, and a microtask queue that is drained explicitly with
//! [`run_microtasks`].
//!
//! [`record_mutations`] captures every write so tests can assert on how much DOM work an update performed.

use super::{is_custom_tag, DomError, Prop};
use scraper::{ElementRef, Html};
use std::{
	cell::{Cell, RefCell},
	collections::VecDeque,
	fmt::{self, Debug, Formatter, Write as _},
	rc::{Rc, Weak},
};
use tracing::{trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
	Element,
	Text,
	Comment,
	Fragment,
}

pub(super) struct NodeData {
	kind: NodeKind,
	tag: String,
	data: RefCell<String>,
	attributes: RefCell<Vec<(String, String)>>,
	properties: RefCell<Vec<(String, Prop)>>,
	parent: RefCell<Weak<NodeData>>,
	children: RefCell<Vec<Node>>,
	listeners: RefCell<Vec<Registration>>,
	root_marker: Cell<Option<u32>>,
}

struct Registration {
	id: u64,
	event_type: String,
	capture: bool,
	callback: Rc<dyn Fn(&Event)>,
}

/// A node of the in-memory DOM. Clones are handles to the same node; equality is identity.
#[derive(Clone)]
pub struct Node(Rc<NodeData>);

impl PartialEq for Node {
	fn eq(&self, other: &Self) -> bool {
		Rc::ptr_eq(&self.0, &other.0)
	}
}
impl Eq for Node {}

impl Debug for Node {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		match self.0.kind {
			NodeKind::Element => write!(f, "<{}>", self.0.tag),
			NodeKind::Text => f.write_str("#text"),
			NodeKind::Comment => f.write_str("#comment"),
			NodeKind::Fragment => f.write_str("#document-fragment"),
		}
	}
}

const VOID_ELEMENTS: &[&str] = &[
	"area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source", "track", "wbr",
];

/// Elements whose text children serialize unescaped.
const RAW_TEXT_ELEMENTS: &[&str] = &["iframe", "noembed", "noframes", "plaintext", "script", "style", "xmp"];

thread_local! {
	static NEXT_LISTENER_ID: Cell<u64> = Cell::new(0);
	static MICROTASKS: RefCell<VecDeque<Box<dyn FnOnce()>>> = RefCell::new(VecDeque::new());
	static MUTATIONS: RefCell<Option<Vec<Mutation>>> = RefCell::new(None);
}

impl Node {
	fn new(kind: NodeKind, tag: String, data: String) -> Self {
		Self(Rc::new(NodeData {
			kind,
			tag,
			data: RefCell::new(data),
			attributes: RefCell::default(),
			properties: RefCell::default(),
			parent: RefCell::default(),
			children: RefCell::default(),
			listeners: RefCell::default(),
			root_marker: Cell::new(None),
		}))
	}

	#[must_use]
	pub fn element(tag: &str) -> Self {
		Self::new(NodeKind::Element, tag.to_ascii_lowercase(), String::new())
	}

	#[must_use]
	pub fn text(data: &str) -> Self {
		Self::new(NodeKind::Text, String::new(), data.to_owned())
	}

	#[must_use]
	pub fn comment(data: &str) -> Self {
		Self::new(NodeKind::Comment, String::new(), data.to_owned())
	}

	#[must_use]
	pub fn fragment() -> Self {
		Self::new(NodeKind::Fragment, String::new(), String::new())
	}

	pub(crate) fn create_text(data: &str) -> Self {
		Self::text(data)
	}

	/// Parses `html` into a detached fragment, the way a
	/// [***template***](https://developer.mozilla.org/en-US/docs/Web/HTML/Element/template) element's content would hold it.
	///
	/// The markup is parsed in template context, so table parts and other context-sensitive elements may be roots.
	pub(crate) fn parse_fragment(html: &str) -> Result<Self, DomError> {
		let parsed = Html::parse_fragment(&format!("<template>{}</template>", html));
		let template = parsed
			.root_element()
			.children()
			.find_map(ElementRef::wrap)
			.filter(|element| element.value().name() == "template")
			.ok_or(DomError::Markup)?;

		let fragment = Self::fragment();
		fragment.adopt_parsed(template);
		Ok(fragment)
	}

	/// Appends without recording a mutation. Used while building parsed trees.
	fn adopt(&self, child: Node) {
		*child.0.parent.borrow_mut() = Rc::downgrade(&self.0);
		self.0.children.borrow_mut().push(child);
	}

	/// Copies the children of a parsed element below `self`. Doctypes and processing instructions are dropped.
	fn adopt_parsed(&self, parsed: ElementRef<'_>) {
		for child in parsed.children() {
			let node = match child.value() {
				scraper::Node::Text(text) => Node::text(&text.text),
				scraper::Node::Comment(comment) => Node::comment(&comment.comment),
				scraper::Node::Element(_) => match ElementRef::wrap(child) {
					Some(element) => Node::from_parsed(element),
					None => continue,
				},
				_ => continue,
			};
			self.adopt(node);
		}
	}

	fn from_parsed(parsed: ElementRef<'_>) -> Self {
		let element = Node::element(parsed.value().name());
		element
			.0
			.attributes
			.borrow_mut()
			.extend(parsed.value().attrs().map(|(name, value)| (name.to_owned(), value.to_owned())));
		element.adopt_parsed(parsed);
		element
	}

	#[must_use]
	pub fn kind(&self) -> NodeKind {
		self.0.kind
	}

	/// The lowercase local name of an element.
	#[must_use]
	pub fn tag_name(&self) -> Option<String> {
		(self.0.kind == NodeKind::Element).then(|| self.0.tag.clone())
	}

	#[must_use]
	pub fn is_custom_element(&self) -> bool {
		self.0.kind == NodeKind::Element && is_custom_tag(&self.0.tag)
	}

	#[must_use]
	pub fn parent_node(&self) -> Option<Node> {
		self.0.parent.borrow().upgrade().map(Node)
	}

	#[must_use]
	pub fn first_child(&self) -> Option<Node> {
		self.0.children.borrow().first().cloned()
	}

	#[must_use]
	pub fn last_child(&self) -> Option<Node> {
		self.0.children.borrow().last().cloned()
	}

	#[must_use]
	pub fn next_sibling(&self) -> Option<Node> {
		let parent = self.parent_node()?;
		let children = parent.0.children.borrow();
		let index = children.iter().position(|c| c == self)?;
		children.get(index + 1).cloned()
	}

	#[must_use]
	pub fn previous_sibling(&self) -> Option<Node> {
		let parent = self.parent_node()?;
		let children = parent.0.children.borrow();
		let index = children.iter().position(|c| c == self)?;
		index.checked_sub(1).and_then(|i| children.get(i).cloned())
	}

	#[must_use]
	pub fn child_nodes(&self) -> Vec<Node> {
		self.0.children.borrow().clone()
	}

	pub(crate) fn child_index(&self, child: &Node) -> Option<usize> {
		self.0.children.borrow().iter().position(|c| c == child)
	}

	pub fn append_child(&self, child: &Node) {
		self.insert_before(child, None);
	}

	/// Inserts `node` before `before`, or appends it. A fragment moves its children instead of itself.
	pub(crate) fn insert_before(&self, node: &Node, before: Option<&Node>) {
		if before == Some(node) {
			return;
		}
		if node.0.kind == NodeKind::Fragment {
			for child in node.child_nodes() {
				self.insert_before(&child, before);
			}
			return;
		}

		node.detach();
		{
			let mut children = self.0.children.borrow_mut();
			let index = match before {
				None => children.len(),
				Some(before) => match children.iter().position(|c| c == before) {
					Some(index) => index,
					None => {
						warn!("Reference node of `insert_before` is not a child of {:?}. Appending instead.", self);
						children.len()
					}
				},
			};
			children.insert(index, node.clone());
		}
		*node.0.parent.borrow_mut() = Rc::downgrade(&self.0);
		record(|| Mutation::Insert {
			parent: self.clone(),
			node: node.clone(),
		});
	}

	fn detach(&self) {
		let parent = self.0.parent.replace(Weak::new());
		if let Some(parent) = parent.upgrade() {
			parent.children.borrow_mut().retain(|c| c != self);
		}
	}

	/// Detaches this node from its parent, if it has one.
	pub fn remove(&self) {
		if self.parent_node().is_some() {
			self.detach();
			record(|| Mutation::Remove { node: self.clone() });
		}
	}

	/// A deep copy without listeners, properties or rendering-root marker.
	pub(crate) fn clone_deep(&self) -> Node {
		let copy = Self::new(self.0.kind, self.0.tag.clone(), self.0.data.borrow().clone());
		*copy.0.attributes.borrow_mut() = self.0.attributes.borrow().clone();
		for child in self.0.children.borrow().iter() {
			copy.adopt(child.clone_deep());
		}
		copy
	}

	fn clear_children(&self) {
		for child in self.0.children.take() {
			*child.0.parent.borrow_mut() = Weak::new();
		}
	}

	pub fn set_text_content(&self, text: &str) {
		match self.0.kind {
			NodeKind::Text | NodeKind::Comment => self.set_data(text),
			NodeKind::Element | NodeKind::Fragment => {
				self.clear_children();
				if !text.is_empty() {
					self.adopt(Node::text(text));
				}
				record(|| Mutation::Children { node: self.clone() });
			}
		}
	}

	#[must_use]
	pub fn text_content(&self) -> String {
		match self.0.kind {
			NodeKind::Text | NodeKind::Comment => self.0.data.borrow().clone(),
			NodeKind::Element | NodeKind::Fragment => {
				let mut text = String::new();
				self.collect_text(&mut text);
				text
			}
		}
	}

	fn collect_text(&self, text: &mut String) {
		for child in self.0.children.borrow().iter() {
			match child.0.kind {
				NodeKind::Text => text.push_str(&child.0.data.borrow()),
				NodeKind::Element => child.collect_text(text),
				NodeKind::Comment | NodeKind::Fragment => (),
			}
		}
	}

	pub(crate) fn set_data(&self, data: &str) {
		*self.0.data.borrow_mut() = data.to_owned();
		record(|| Mutation::Data { node: self.clone() });
	}

	#[must_use]
	pub fn data(&self) -> String {
		self.0.data.borrow().clone()
	}

	#[must_use]
	pub fn attribute(&self, name: &str) -> Option<String> {
		let name = name.to_ascii_lowercase();
		self.0.attributes.borrow().iter().find(|(n, _)| *n == name).map(|(_, v)| v.clone())
	}

	#[must_use]
	pub fn attributes(&self) -> Vec<(String, String)> {
		self.0.attributes.borrow().clone()
	}

	pub fn set_attribute(&self, name: &str, value: &str) {
		let name = name.to_ascii_lowercase();
		{
			let mut attributes = self.0.attributes.borrow_mut();
			match attributes.iter_mut().find(|(n, _)| *n == name) {
				Some((_, v)) => *v = value.to_owned(),
				None => attributes.push((name.clone(), value.to_owned())),
			}
		}
		record(|| Mutation::Attribute { node: self.clone(), name });
	}

	pub(crate) fn remove_attribute(&self, name: &str) {
		let name = name.to_ascii_lowercase();
		let removed = {
			let mut attributes = self.0.attributes.borrow_mut();
			let before = attributes.len();
			attributes.retain(|(n, _)| *n != name);
			attributes.len() != before
		};
		if removed {
			record(|| Mutation::Attribute { node: self.clone(), name });
		}
	}

	pub(crate) fn set_class_name(&self, class_name: &str) {
		self.set_attribute("class", class_name);
	}

	#[must_use]
	pub fn style_property(&self, name: &str) -> Option<String> {
		parse_style(&self.attribute("style").unwrap_or_default())
			.into_iter()
			.find(|(n, _)| n == name)
			.map(|(_, v)| v)
	}

	pub(crate) fn set_style_property(&self, name: &str, value: &str) {
		if value.is_empty() {
			return self.remove_style_property(name);
		}
		let mut declarations = parse_style(&self.attribute("style").unwrap_or_default());
		match declarations.iter_mut().find(|(n, _)| n == name) {
			Some((_, v)) => *v = value.to_owned(),
			None => declarations.push((name.to_owned(), value.to_owned())),
		}
		self.write_style(&declarations, name);
	}

	pub(crate) fn remove_style_property(&self, name: &str) {
		let style = match self.attribute("style") {
			Some(style) => style,
			None => return,
		};
		let mut declarations = parse_style(&style);
		let before = declarations.len();
		declarations.retain(|(n, _)| n != name);
		if declarations.len() != before {
			self.write_style(&declarations, name);
		}
	}

	fn write_style(&self, declarations: &[(String, String)], changed: &str) {
		let serialized = declarations.iter().map(|(n, v)| format!("{}: {};", n, v)).collect::<Vec<_>>().join(" ");
		let name = "style".to_owned();
		{
			let mut attributes = self.0.attributes.borrow_mut();
			match attributes.iter_mut().find(|(n, _)| *n == name) {
				Some((_, v)) => *v = serialized,
				None => attributes.push((name, serialized)),
			}
		}
		record(|| Mutation::Style {
			node: self.clone(),
			name: changed.to_owned(),
		});
	}

	/// Whether this element carries a JavaScript-visible property called `name`.
	pub(crate) fn has_property(&self, name: &str) -> bool {
		self.0.kind == NodeKind::Element && (GLOBAL_PROPERTIES.contains(&name) || tag_properties(&self.0.tag).contains(&name))
	}

	pub(crate) fn set_property(&self, name: &str, value: &Prop) {
		match name {
			"textContent" => return self.set_text_content(value.to_attribute_value().as_deref().unwrap_or("")),
			"innerHTML" => return self.set_inner_html(value.to_attribute_value().as_deref().unwrap_or("")),
			_ => (),
		}

		match reflected_attribute(name) {
			Some((attribute, true)) => {
				if truthy(value) {
					self.set_attribute(attribute, "");
				} else {
					self.remove_attribute(attribute);
				}
			}
			Some((attribute, false)) => match value.to_attribute_value() {
				Some(text) => self.set_attribute(attribute, &text),
				None => self.remove_attribute(attribute),
			},
			None => {
				{
					let mut properties = self.0.properties.borrow_mut();
					match properties.iter_mut().find(|(n, _)| n == name) {
						Some((_, v)) => *v = value.clone(),
						None => properties.push((name.to_owned(), value.clone())),
					}
				}
				record(|| Mutation::Property {
					node: self.clone(),
					name: name.to_owned(),
				});
			}
		}
	}

	/// Reads a property the way script would see it after the engine wrote it.
	#[must_use]
	pub fn property(&self, name: &str) -> Option<Prop> {
		match reflected_attribute(name) {
			Some((attribute, true)) => Some(Prop::Bool(self.attribute(attribute).is_some())),
			Some((attribute, false)) => self.attribute(attribute).map(|v| Prop::Text(v.into())),
			None => self.0.properties.borrow().iter().find(|(n, _)| n == name).map(|(_, v)| v.clone()),
		}
	}

	pub(crate) fn set_inner_html(&self, html: &str) {
		self.clear_children();
		let parsed = Html::parse_fragment(html);
		self.adopt_parsed(parsed.root_element());
		record(|| Mutation::Children { node: self.clone() });
	}

	#[must_use]
	pub fn inner_html(&self) -> String {
		let mut html = String::new();
		for child in self.0.children.borrow().iter() {
			child.serialize(&mut html);
		}
		html
	}

	#[must_use]
	pub fn outer_html(&self) -> String {
		let mut html = String::new();
		self.serialize(&mut html);
		html
	}

	fn serialize(&self, html: &mut String) {
		match self.0.kind {
			NodeKind::Text => match self.parent_node().and_then(|parent| parent.tag_name()) {
				Some(tag) if RAW_TEXT_ELEMENTS.contains(&tag.as_str()) => html.push_str(&self.0.data.borrow()),
				_ => escape_into(html, &self.0.data.borrow(), false),
			},
			NodeKind::Comment => {
				let _ = write!(html, "<!--{}-->", self.0.data.borrow());
			}
			NodeKind::Fragment => html.push_str(&self.inner_html()),
			NodeKind::Element => {
				html.push('<');
				html.push_str(&self.0.tag);
				for (name, value) in self.0.attributes.borrow().iter() {
					html.push(' ');
					html.push_str(name);
					html.push_str("=\"");
					escape_into(html, value, true);
					html.push('"');
				}
				html.push('>');
				if VOID_ELEMENTS.contains(&self.0.tag.as_str()) {
					return;
				}
				html.push_str(&self.inner_html());
				let _ = write!(html, "</{}>", self.0.tag);
			}
		}
	}

	/// Depth-first search for an element with the given `id` attribute, including `self`.
	#[must_use]
	pub fn find_by_id(&self, id: &str) -> Option<Node> {
		if self.attribute("id").as_deref() == Some(id) {
			return Some(self.clone());
		}
		self.0.children.borrow().iter().find_map(|child| child.find_by_id(id))
	}

	pub(crate) fn root_marker(&self) -> Option<u32> {
		self.0.root_marker.get()
	}

	pub(crate) fn set_root_marker(&self, marker: Option<u32>) {
		self.0.root_marker.set(marker);
	}

	pub(crate) fn add_listener(&self, event_type: &str, capture: bool, callback: impl Fn(&Event) + 'static) -> Listener {
		let id = NEXT_LISTENER_ID.with(|next| {
			let id = next.get();
			next.set(id + 1);
			id
		});
		self.0.listeners.borrow_mut().push(Registration {
			id,
			event_type: event_type.to_owned(),
			capture,
			callback: Rc::new(callback),
		});
		Listener {
			node: Rc::downgrade(&self.0),
			id,
		}
	}

	/// How many listeners for `event_type` are currently installed on this node.
	#[must_use]
	pub fn listener_count(&self, event_type: &str) -> usize {
		self.0.listeners.borrow().iter().filter(|r| r.event_type == event_type).count()
	}

	/// Dispatches `event` with this node as its target, in capture, target and bubble order.
	///
	/// Returns `false` iff a listener called [`Event::prevent_default`].
	pub fn dispatch_event(&self, event: &Event) -> bool {
		let mut path = vec![self.clone()];
		let mut next = self.parent_node();
		while let Some(node) = next {
			next = node.parent_node();
			path.push(node);
		}
		*event.0.target.borrow_mut() = Some(self.clone());
		*event.0.path.borrow_mut() = path.clone();
		trace!(event_type = %event.0.event_type, depth = path.len(), "Dispatching event");

		'dispatch: {
			for node in path.iter().skip(1).rev() {
				node.invoke(event, Some(true));
				if event.cancel_bubble() {
					break 'dispatch;
				}
			}

			self.invoke(event, None);
			if event.cancel_bubble() || !event.bubbles() {
				break 'dispatch;
			}

			for node in path.iter().skip(1) {
				node.invoke(event, Some(false));
				if event.cancel_bubble() {
					break;
				}
			}
		}

		*event.0.current_target.borrow_mut() = None;
		event.0.path.borrow_mut().clear();
		!event.default_prevented()
	}

	/// Dispatches a bubbling `click`.
	pub fn click(&self) {
		self.dispatch_event(&Event::new("click", true));
	}

	fn invoke(&self, event: &Event, capture: Option<bool>) {
		let callbacks = |capture: bool| {
			self.0
				.listeners
				.borrow()
				.iter()
				.filter(|r| r.capture == capture && r.event_type == event.0.event_type)
				.map(|r| Rc::clone(&r.callback))
				.collect::<Vec<_>>()
		};
		let callbacks = match capture {
			Some(capture) => callbacks(capture),
			None => {
				let mut at_target = callbacks(true);
				at_target.extend(callbacks(false));
				at_target
			}
		};

		*event.0.current_target.borrow_mut() = Some(self.clone());
		for callback in callbacks {
			callback(event);
		}
	}
}

/// Removes its event listener when dropped.
pub struct Listener {
	node: Weak<NodeData>,
	id: u64,
}

impl Debug for Listener {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("Listener").field("id", &self.id).finish()
	}
}

impl Drop for Listener {
	fn drop(&mut self) {
		if let Some(node) = self.node.upgrade() {
			node.listeners.borrow_mut().retain(|r| r.id != self.id);
		}
	}
}

/// A DOM event. Clones share state, so [`Event::stop_propagation`] is visible to every holder.
#[derive(Clone)]
pub struct Event(Rc<EventState>);

struct EventState {
	event_type: String,
	bubbles: bool,
	cancel_bubble: Cell<bool>,
	default_prevented: Cell<bool>,
	target: RefCell<Option<Node>>,
	current_target: RefCell<Option<Node>>,
	path: RefCell<Vec<Node>>,
}

impl Debug for Event {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("Event")
			.field("type", &self.0.event_type)
			.field("bubbles", &self.0.bubbles)
			.field("cancel_bubble", &self.0.cancel_bubble.get())
			.finish()
	}
}

impl Event {
	#[must_use]
	pub fn new(event_type: &str, bubbles: bool) -> Self {
		Self(Rc::new(EventState {
			event_type: event_type.to_owned(),
			bubbles,
			cancel_bubble: Cell::new(false),
			default_prevented: Cell::new(false),
			target: RefCell::new(None),
			current_target: RefCell::new(None),
			path: RefCell::default(),
		}))
	}

	#[must_use]
	pub fn event_type(&self) -> String {
		self.0.event_type.clone()
	}

	#[must_use]
	pub fn bubbles(&self) -> bool {
		self.0.bubbles
	}

	#[must_use]
	pub fn cancel_bubble(&self) -> bool {
		self.0.cancel_bubble.get()
	}

	pub fn stop_propagation(&self) {
		self.0.cancel_bubble.set(true);
	}

	pub fn prevent_default(&self) {
		self.0.default_prevented.set(true);
	}

	#[must_use]
	pub fn default_prevented(&self) -> bool {
		self.0.default_prevented.get()
	}

	#[must_use]
	pub fn target(&self) -> Option<Node> {
		self.0.target.borrow().clone()
	}

	#[must_use]
	pub fn current_target(&self) -> Option<Node> {
		self.0.current_target.borrow().clone()
	}

	/// The propagation path, target first. Empty outside of dispatch.
	pub(crate) fn path(&self) -> Vec<Node> {
		self.0.path.borrow().clone()
	}
}

pub(crate) fn queue_microtask(task: Box<dyn FnOnce()>) {
	MICROTASKS.with(|queue| queue.borrow_mut().push_back(task));
}

/// Runs queued microtasks, including ones queued while draining, until the queue is empty.
///
/// Returns how many ran.
pub fn run_microtasks() -> usize {
	let mut count = 0;
	while let Some(task) = MICROTASKS.with(|queue| queue.borrow_mut().pop_front()) {
		task();
		count += 1;
	}
	count
}

/// One recorded DOM write.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
	Insert { parent: Node, node: Node },
	Remove { node: Node },
	Data { node: Node },
	Children { node: Node },
	Attribute { node: Node, name: String },
	Property { node: Node, name: String },
	Style { node: Node, name: String },
}

/// Records DOM writes on this thread until dropped.
#[derive(Debug)]
pub struct MutationLog(());

/// Starts recording DOM writes. Earlier records are discarded.
#[must_use]
pub fn record_mutations() -> MutationLog {
	MUTATIONS.with(|log| *log.borrow_mut() = Some(Vec::new()));
	MutationLog(())
}

impl MutationLog {
	/// Returns and clears the writes recorded so far.
	#[must_use]
	pub fn take(&self) -> Vec<Mutation> {
		MUTATIONS.with(|log| log.borrow_mut().as_mut().map(std::mem::take).unwrap_or_default())
	}
}

impl Drop for MutationLog {
	fn drop(&mut self) {
		MUTATIONS.with(|log| *log.borrow_mut() = None);
	}
}

fn record(mutation: impl FnOnce() -> Mutation) {
	MUTATIONS.with(|log| {
		if let Some(log) = log.borrow_mut().as_mut() {
			log.push(mutation());
		}
	});
}

fn truthy(value: &Prop) -> bool {
	match value {
		Prop::Null => false,
		Prop::Bool(value) => *value,
		Prop::Number(value) => *value != 0.0 && !value.is_nan(),
		Prop::Text(value) => !value.is_empty(),
	}
}

fn escape_into(out: &mut String, text: &str, attribute: bool) {
	for c in text.chars() {
		match c {
			'&' => out.push_str("&amp;"),
			'<' if !attribute => out.push_str("&lt;"),
			'>' if !attribute => out.push_str("&gt;"),
			'"' if attribute => out.push_str("&quot;"),
			'\u{a0}' => out.push_str("&nbsp;"),
			c => out.push(c),
		}
	}
}

fn parse_style(style: &str) -> Vec<(String, String)> {
	style
		.split(';')
		.filter_map(|declaration| {
			let (name, value) = declaration.split_once(':')?;
			let (name, value) = (name.trim(), value.trim());
			(!name.is_empty() && !value.is_empty()).then(|| (name.to_owned(), value.to_owned()))
		})
		.collect()
}

/// Properties that reflect an attribute, and whether that attribute is boolean.
fn reflected_attribute(property: &str) -> Option<(&'static str, bool)> {
	Some(match property {
		"id" => ("id", false),
		"className" => ("class", false),
		"htmlFor" => ("for", false),
		"tabIndex" => ("tabindex", false),
		"accessKey" => ("accesskey", false),
		"title" => ("title", false),
		"lang" => ("lang", false),
		"dir" => ("dir", false),
		"slot" => ("slot", false),
		"href" => ("href", false),
		"src" => ("src", false),
		"alt" => ("alt", false),
		"name" => ("name", false),
		"type" => ("type", false),
		"placeholder" => ("placeholder", false),
		"rel" => ("rel", false),
		"target" => ("target", false),
		"action" => ("action", false),
		"method" => ("method", false),
		"min" => ("min", false),
		"max" => ("max", false),
		"step" => ("step", false),
		"pattern" => ("pattern", false),
		"colSpan" => ("colspan", false),
		"rowSpan" => ("rowspan", false),
		"httpEquiv" => ("http-equiv", false),
		"content" => ("content", false),
		"label" => ("label", false),
		"hidden" => ("hidden", true),
		"disabled" => ("disabled", true),
		"readOnly" => ("readonly", true),
		"required" => ("required", true),
		"multiple" => ("multiple", true),
		"autofocus" => ("autofocus", true),
		"open" => ("open", true),
		"controls" => ("controls", true),
		_ => return None,
	})
}

const GLOBAL_PROPERTIES: &[&str] = &[
	"id",
	"className",
	"title",
	"lang",
	"dir",
	"hidden",
	"tabIndex",
	"accessKey",
	"slot",
	"textContent",
	"innerHTML",
	"draggable",
	"spellcheck",
	"contentEditable",
	"inert",
];

fn tag_properties(tag: &str) -> &'static [&'static str] {
	match tag {
		"input" => &[
			"value",
			"checked",
			"defaultValue",
			"defaultChecked",
			"indeterminate",
			"type",
			"name",
			"placeholder",
			"disabled",
			"readOnly",
			"required",
			"multiple",
			"autofocus",
			"min",
			"max",
			"step",
			"pattern",
			"size",
			"maxLength",
			"minLength",
			"accept",
			"alt",
			"src",
		],
		"textarea" => &[
			"value",
			"defaultValue",
			"name",
			"placeholder",
			"disabled",
			"readOnly",
			"required",
			"autofocus",
			"rows",
			"cols",
			"wrap",
			"maxLength",
			"minLength",
		],
		"select" => &["value", "selectedIndex", "name", "disabled", "required", "multiple", "autofocus", "size"],
		"option" => &["value", "selected", "defaultSelected", "disabled", "label", "text"],
		"button" => &["type", "name", "value", "disabled", "autofocus"],
		"a" => &["href", "target", "rel", "download", "hreflang", "type", "text"],
		"img" => &["src", "alt", "width", "height", "srcset", "sizes", "loading", "decoding"],
		"label" => &["htmlFor"],
		"form" => &["action", "method", "target", "name", "noValidate", "acceptCharset"],
		"td" | "th" => &["colSpan", "rowSpan", "headers"],
		"meta" => &["httpEquiv", "content", "name"],
		"details" | "dialog" => &["open"],
		"video" | "audio" => &["src", "controls", "autoplay", "loop", "muted", "volume"],
		"iframe" => &["src", "name", "allow", "width", "height", "loading"],
		"li" => &["value"],
		"ol" => &["start", "reversed", "type"],
		"progress" | "meter" => &["value", "max", "min"],
		_ => &[],
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn fragment_insertion_moves_children() {
		let parent = Node::element("div");
		let anchor = Node::element("b");
		parent.append_child(&anchor);

		let fragment = Node::fragment();
		fragment.adopt(Node::text("a"));
		fragment.adopt(Node::element("i"));
		parent.insert_before(&fragment, Some(&anchor));

		assert_eq!(parent.inner_html(), "a<i></i><b></b>");
		assert!(fragment.first_child().is_none());
	}

	#[test]
	fn fragments_parse_in_template_context() {
		let row = Node::parse_fragment("<tr><td>cell</td></tr>").unwrap();
		assert_eq!(row.inner_html(), "<tr><td>cell</td></tr>");

		let fragment = Node::parse_fragment("<!-- -->a &amp; b<input type=text>").unwrap();
		assert_eq!(fragment.inner_html(), r#"<!-- -->a &amp; b<input type="text">"#);
		assert_eq!(fragment.child_nodes()[1].text_content(), "a & b");
	}

	#[test]
	fn inner_html_follows_html5_rules() {
		let node = Node::element("div");
		node.set_inner_html("<p>one<p>two");
		assert_eq!(node.inner_html(), "<p>one</p><p>two</p>");

		node.set_inner_html("<span/>text");
		assert_eq!(node.inner_html(), "<span>text</span>");

		node.set_inner_html("<textarea><b></textarea><style>a > b {}</style>");
		let textarea = node.first_child().unwrap();
		assert_eq!(textarea.text_content(), "<b>");
		assert_eq!(node.inner_html(), "<textarea>&lt;b&gt;</textarea><style>a > b {}</style>");
	}

	#[test]
	fn style_attribute_round_trips_declarations() {
		let node = Node::element("div");
		node.set_style_property("display", "none");
		node.set_style_property("color", "red");
		assert_eq!(node.attribute("style").as_deref(), Some("display: none; color: red;"));
		node.remove_style_property("display");
		assert_eq!(node.style_property("color").as_deref(), Some("red"));
		assert_eq!(node.style_property("display"), None);
	}

	#[test]
	fn dispatch_runs_capture_target_bubble() {
		let outer = Node::element("div");
		let inner = Node::element("span");
		outer.append_child(&inner);

		let log = Rc::new(RefCell::new(Vec::new()));
		let _listeners = [
			outer.add_listener("click", true, {
				let log = Rc::clone(&log);
				move |_| log.borrow_mut().push("outer capture")
			}),
			outer.add_listener("click", false, {
				let log = Rc::clone(&log);
				move |_| log.borrow_mut().push("outer bubble")
			}),
			inner.add_listener("click", false, {
				let log = Rc::clone(&log);
				move |_| log.borrow_mut().push("target")
			}),
		];

		inner.click();
		assert_eq!(*log.borrow(), ["outer capture", "target", "outer bubble"]);

		log.borrow_mut().clear();
		inner.dispatch_event(&Event::new("click", false));
		assert_eq!(*log.borrow(), ["outer capture", "target"]);
	}

	#[test]
	fn dropped_listener_is_removed() {
		let node = Node::element("div");
		let listener = node.add_listener("input", false, |_| ());
		assert_eq!(node.listener_count("input"), 1);
		drop(listener);
		assert_eq!(node.listener_count("input"), 0);
	}

	#[test]
	fn reflected_properties_write_attributes() {
		let node = Node::element("label");
		assert!(node.has_property("htmlFor"));
		assert!(!node.has_property("for"));
		node.set_property("htmlFor", &Prop::Text("name".into()));
		assert_eq!(node.attribute("for").as_deref(), Some("name"));

		let input = Node::element("input");
		input.set_property("value", &Prop::Text("typed".into()));
		assert_eq!(input.attribute("value"), None);
		assert_eq!(input.property("value"), Some(Prop::Text("typed".into())));
	}
}
