//! The persistent tree that mirrors rendered output.
//!
//! A [`VNode`] is one rendered occurrence of a [`Value`]. Updating it with a compatible value patches the DOM in place.
//! Anything else unmounts it, removes its DOM nodes and renders the new value at the same position.
//!
//! Every variant spans a contiguous run of top-level DOM nodes inside its [`Slot`]'s parent, described by
//! [`VNode::size`] and [`VNode::head`].

use crate::{
	attributes::property_to_attribute,
	component::ComponentNode,
	compiler::{AfterNode, ArgOp, CompiledTemplate, ContentSlot, InsertionPoints},
	dom::{Listener, Node},
	events::{Phases, Plan, RootState},
	list::ListNode,
	value::{Handler, Instance, Value},
};
use core::fmt::{self, Debug, Formatter};
use std::{
	cell::RefCell,
	rc::{Rc, Weak},
};
use tracing::{error, instrument, trace, warn};

/// Where a [`VNode`] lives.
#[derive(Clone)]
pub(crate) struct Slot {
	pub parent: Node,
	/// The node's DOM is the only content of `parent`.
	pub exclusive: bool,
	pub owner: Owner,
	/// The rendering root whose listeners route events to this node.
	pub root: Weak<RootState>,
	/// Templates rendered here become rendering roots themselves.
	pub delegation_root: bool,
	/// Component nesting depth, for scheduling.
	pub depth: u32,
}

/// The [`VNode`] holding a slot's node, which is never an owning reference.
#[derive(Clone)]
pub(crate) enum Owner {
	Root,
	Template { node: Weak<TemplateNode>, content: usize },
	List(Weak<ListNode>),
	Component(Weak<ComponentNode>),
}

impl Owner {
	/// The nearest component above this owner.
	pub(crate) fn component(&self) -> Option<Rc<ComponentNode>> {
		match self {
			Owner::Root => None,
			Owner::Template { node, .. } => node.upgrade()?.slot.owner.component(),
			Owner::List(list) => list.upgrade()?.slot.owner.component(),
			Owner::Component(component) => component.upgrade(),
		}
	}
}

pub(crate) enum VNode {
	Void(Slot),
	Text(TextNode),
	List(Rc<ListNode>),
	Component(Rc<ComponentNode>),
	Template(Rc<TemplateNode>),
}

impl Debug for VNode {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		match self {
			VNode::Void(_) => f.write_str("Void"),
			VNode::Text(_) => f.write_str("Text"),
			VNode::List(list) => f.debug_tuple("List").field(&list.len()).finish(),
			VNode::Component(_) => f.write_str("Component"),
			VNode::Template(node) => f.debug_tuple("Template").field(&node.template.type_tag).finish(),
		}
	}
}

pub(crate) struct TextNode {
	slot: Slot,
	node: Node,
	text: Rc<str>,
}

impl TextNode {
	fn render(text: Rc<str>, slot: Slot, before: Option<&Node>) -> Self {
		let node = if slot.exclusive && !text.is_empty() {
			slot.parent.set_text_content(&text);
			slot.parent.first_child()
		} else {
			None
		};
		let node = node.unwrap_or_else(|| {
			let node = Node::create_text(&text);
			slot.parent.insert_before(&node, before);
			node
		});
		Self { slot, node, text }
	}

	fn update(mut self, text: Rc<str>) -> Self {
		if self.text != text {
			self.node.set_data(&text);
			self.text = text;
		}
		self
	}
}

impl VNode {
	/// Renders `value` into `slot`, before `before` or at the end of the slot's parent.
	pub(crate) fn render(value: &Value, slot: Slot, before: Option<&Node>) -> VNode {
		match value {
			Value::Text(_) | Value::Number(_) => {
				let text = value.as_text().expect("tagged-dom bug: Text value without text.");
				VNode::Text(TextNode::render(text, slot, before))
			}
			Value::List(items) => VNode::List(ListNode::render(items, slot, before)),
			Value::Keyed(keyed) => VNode::render(&keyed.value, slot, before),
			Value::Template(instance) => VNode::Template(TemplateNode::mount(instance, slot, before)),
			Value::Component(invocation) => VNode::Component(ComponentNode::mount(invocation, slot, before)),
			Value::Null | Value::Bool(_) | Value::Handler(_) | Value::Style(_) => VNode::Void(slot),
		}
	}

	/// Patches this node to show `value`.
	///
	/// `after` finds the DOM node that follows this one's position, which is only asked for if the node is replaced.
	#[must_use]
	pub(crate) fn update(self, value: &Value, after: &dyn Fn() -> Option<Node>) -> VNode {
		let this = match (self, value) {
			(this, Value::Keyed(keyed)) => return this.update(&keyed.value, after),
			(VNode::Void(slot), value) if value.is_void() => return VNode::Void(slot),
			(VNode::Text(text), Value::Text(_) | Value::Number(_)) => {
				let new = value.as_text().expect("tagged-dom bug: Text value without text.");
				return VNode::Text(text.update(new));
			}
			(VNode::List(list), Value::List(items)) => {
				list.update(items, after);
				return VNode::List(list);
			}
			(VNode::Template(node), Value::Template(instance)) if Rc::ptr_eq(&node.template, &instance.template) => {
				node.update(instance);
				return VNode::Template(node);
			}
			(VNode::Component(node), Value::Component(invocation)) if node.is_instance_of(invocation) => {
				node.update(invocation, after);
				return VNode::Component(node);
			}
			(this, _) => this,
		};

		trace!(from = ?this, "Replacing node");
		let slot = this.slot().clone();
		this.unmount();
		if slot.exclusive {
			slot.parent.set_text_content("");
		} else {
			this.remove();
		}
		VNode::render(value, slot, after().as_ref())
	}

	pub(crate) fn slot(&self) -> &Slot {
		match self {
			VNode::Void(slot) => slot,
			VNode::Text(text) => &text.slot,
			VNode::List(list) => &list.slot,
			VNode::Component(component) => &component.slot,
			VNode::Template(template) => &template.slot,
		}
	}

	/// Runs cleanup below this node without touching the DOM. Idempotent.
	pub(crate) fn unmount(&self) {
		match self {
			VNode::Void(_) | VNode::Text(_) => (),
			VNode::List(list) => list.unmount(),
			VNode::Component(component) => component.unmount(),
			VNode::Template(template) => template.unmount(),
		}
	}

	/// Detaches this node's DOM. Runs after [`VNode::unmount`].
	pub(crate) fn remove(&self) {
		match self {
			VNode::Void(_) => (),
			VNode::Text(text) => text.node.remove(),
			VNode::List(list) => list.remove(),
			VNode::Component(component) => {
				component.with_child(VNode::remove);
			}
			VNode::Template(template) => template.nodes[0].remove(),
		}
	}

	/// How many top-level DOM nodes this spans.
	pub(crate) fn size(&self) -> usize {
		match self {
			VNode::Void(_) => 0,
			VNode::Text(_) | VNode::Template(_) => 1,
			VNode::List(list) => list.size(),
			VNode::Component(component) => component.with_child(VNode::size).unwrap_or(0),
		}
	}

	pub(crate) fn head(&self) -> Option<Node> {
		match self {
			VNode::Void(_) => None,
			VNode::Text(text) => Some(text.node.clone()),
			VNode::List(list) => list.head(),
			VNode::Component(component) => component.with_child(VNode::head).flatten(),
			VNode::Template(template) => Some(template.nodes[0].clone()),
		}
	}

	/// Moves this node's DOM before `before`, or to the end of its parent.
	pub(crate) fn insert(&self, before: Option<&Node>) {
		match self {
			VNode::Void(_) => (),
			VNode::Text(text) => text.slot.parent.insert_before(&text.node, before),
			VNode::List(list) => list.insert(before),
			VNode::Component(component) => {
				component.with_child(|child| child.insert(before));
			}
			VNode::Template(template) => template.slot.parent.insert_before(&template.nodes[0], before),
		}
	}

	/// Identity of this node across moves, for locating it in its owner. Stable only for the reference-counted variants.
	pub(crate) fn id(&self) -> usize {
		match self {
			VNode::Void(slot) => slot as *const Slot as usize,
			VNode::Text(text) => &text.slot as *const Slot as usize,
			VNode::List(list) => Rc::as_ptr(list) as usize,
			VNode::Component(component) => Rc::as_ptr(component) as usize,
			VNode::Template(template) => Rc::as_ptr(template) as usize,
		}
	}

	/// Plans the handlers for an event whose target chain (root-ward first) starts at one of this node's top-level DOM
	/// nodes.
	pub(crate) fn route(&self, chain: &[Node], name: &str, phases: Phases, plan: &mut Plan) {
		match self {
			VNode::Void(_) | VNode::Text(_) => (),
			VNode::List(list) => list.route(chain, name, phases, plan),
			VNode::Component(component) => {
				component.with_child(|child| child.route(chain, name, phases, plan));
			}
			VNode::Template(template) => template.route(chain, name, phases, plan),
		}
	}
}

/// Where dynamic content that ends its owner's run goes: the next DOM node outside the owner's slot, if any.
pub(crate) fn after_in_owner(slot: &Slot, id: usize) -> Option<Node> {
	match &slot.owner {
		Owner::Root => None,
		Owner::Template { node, content } => node.upgrade()?.content_after(*content),
		Owner::List(list) => {
			let list = list.upgrade()?;
			list.after_child(id).or_else(|| after_in_owner(&list.slot, Rc::as_ptr(&list) as usize))
		}
		Owner::Component(component) => {
			let component = component.upgrade()?;
			after_in_owner(&component.slot, Rc::as_ptr(&component) as usize)
		}
	}
}

pub(crate) struct TemplateNode {
	pub(crate) slot: Slot,
	pub(crate) template: Rc<CompiledTemplate>,
	pub(crate) nodes: Vec<Node>,
	state: RefCell<TemplateState>,
	/// Resolved on first use.
	event_nodes: RefCell<Option<Vec<Option<Node>>>>,
}

struct TemplateState {
	instance: Rc<Instance>,
	children: Vec<Option<VNode>>,
	roots: Vec<Rc<RootState>>,
	own_root: Option<Rc<RootState>>,
	listeners: Vec<Listener>,
}

impl TemplateNode {
	#[instrument(skip_all, fields(type_tag = instance.template.type_tag))]
	fn mount(instance: &Rc<Instance>, slot: Slot, before: Option<&Node>) -> Rc<TemplateNode> {
		let template = Rc::clone(&instance.template);
		let nodes = template.clone_nodes();
		let node = Rc::new(TemplateNode {
			slot,
			nodes,
			state: RefCell::new(TemplateState {
				instance: Rc::clone(instance),
				children: (0..template.contents).map(|_| None).collect(),
				roots: Vec::with_capacity(template.nested_roots.len()),
				own_root: None,
				listeners: Vec::new(),
			}),
			event_nodes: RefCell::new(None),
			template,
		});

		let scope = if node.slot.delegation_root {
			let root = RootState::nested(&node.nodes[0], Rc::downgrade(&node));
			node.state.borrow_mut().own_root = Some(Rc::clone(&root));
			Some(root)
		} else {
			node.slot.root.upgrade()
		};
		match scope {
			Some(root) => root.register_template(&node.template),
			None => warn!("Mounting a template outside of any rendering root. Its events won't be handled."),
		}

		for nested in &node.template.nested_roots {
			let root = RootState::nested(&node.nodes[nested.node], Rc::downgrade(&node));
			root.register_events(&nested.events);
			node.state.borrow_mut().roots.push(root);
		}

		for instruction in &node.template.args {
			node.apply(&instruction.op, instruction.arg, &node.nodes[instruction.node], &instance.args[instruction.arg]);
		}

		node.slot.parent.insert_before(&node.nodes[0], before);
		node
	}

	fn content_root(&self, content: &ContentSlot) -> Weak<RootState> {
		let state = self.state.borrow();
		match (content.scope, &state.own_root) {
			(Some(scope), _) => Rc::downgrade(&state.roots[scope]),
			(None, Some(own_root)) => Rc::downgrade(own_root),
			(None, None) => self.slot.root.clone(),
		}
	}

	fn apply(self: &Rc<Self>, op: &ArgOp, arg: usize, node: &Node, value: &Value) {
		match op {
			ArgOp::Content(content) => {
				let slot = Slot {
					parent: node.clone(),
					exclusive: content.exclusive,
					owner: Owner::Template {
						node: Rc::downgrade(self),
						content: content.content,
					},
					root: self.content_root(content),
					delegation_root: content.delegation_root,
					depth: self.slot.depth,
				};
				let after = self.resolve_after(&content.after);
				let child = VNode::render(value, slot, after.as_ref());
				self.state.borrow_mut().children[content.content] = Some(child);
			}
			ArgOp::Class => {
				if let Some(class_name) = value.as_text() {
					node.set_class_name(&class_name);
				}
			}
			ArgOp::Style => {
				if let Value::Style(style) = value {
					for (name, value) in style.iter() {
						if let Some(value) = value {
							node.set_style_property(name, value);
						}
					}
				}
			}
			ArgOp::InnerHtml => {
				if let Some(html) = value.as_text() {
					node.set_inner_html(&html);
				}
			}
			ArgOp::Property { name, .. } => {
				if !matches!(value, Value::Null) {
					node.set_property(name, &value.to_prop());
				}
			}
			ArgOp::Attribute(name) => {
				if let Some(value) = value.to_prop().to_attribute_value() {
					node.set_attribute(name, &value);
				}
			}
			ArgOp::DefaultProperty(name) => {
				if !matches!(value, Value::Null) {
					node.set_property(name, &value.to_prop());
				}
			}
			ArgOp::TargetEvent(name) => {
				let this = Rc::downgrade(self);
				let listener = node.add_listener(name, false, move |event| {
					let handler = this.upgrade().and_then(|this| this.handler_arg(arg));
					if let Some(handler) = handler {
						handler(event);
					}
				});
				self.state.borrow_mut().listeners.push(listener);
			}
		}
	}

	fn handler_arg(&self, arg: usize) -> Option<Handler> {
		let state = self.state.try_borrow().ok()?;
		let handler = match &state.instance.args[arg] {
			Value::Handler(handler) => Some(Rc::clone(handler)),
			_ => None,
		};
		handler
	}

	/// Applies the arguments of `instance` that differ from the current ones.
	fn update(self: &Rc<Self>, instance: &Rc<Instance>) {
		let previous = {
			let mut state = self.state.borrow_mut();
			if Rc::ptr_eq(&state.instance, instance) {
				return;
			}
			std::mem::replace(&mut state.instance, Rc::clone(instance))
		};

		for instruction in &self.template.args {
			let old = &previous.args[instruction.arg];
			let new = &instance.args[instruction.arg];
			if old.same(new) {
				continue;
			}
			self.update_arg(&instruction.op, &self.nodes[instruction.node], old, new);
		}
	}

	fn update_arg(self: &Rc<Self>, op: &ArgOp, node: &Node, old: &Value, new: &Value) {
		match op {
			ArgOp::Content(content) => {
				let child = self.state.borrow_mut().children[content.content].take();
				let child = match child {
					Some(child) => child.update(new, &|| self.resolve_after(&content.after)),
					None => {
						error!("Content slot is already being updated. Was a template re-entered from its own render?");
						return;
					}
				};
				self.state.borrow_mut().children[content.content] = Some(child);
			}
			ArgOp::Class => match new.as_text() {
				Some(class_name) => node.set_class_name(&class_name),
				None => node.remove_attribute("class"),
			},
			ArgOp::Style => match new {
				Value::Style(new) => {
					let old = match old {
						Value::Style(old) => Some(old),
						_ => None,
					};
					if let Some(old) = old {
						for (name, _) in old.iter() {
							if new.get(name).is_none() {
								node.remove_style_property(name);
							}
						}
					}
					for (name, value) in new.iter() {
						match value {
							Some(value) if old.and_then(|old| old.get(name)).flatten() == Some(value) => (),
							Some(value) => node.set_style_property(name, value),
							None => node.remove_style_property(name),
						}
					}
				}
				_ => node.remove_attribute("style"),
			},
			ArgOp::InnerHtml => node.set_inner_html(new.as_text().as_deref().unwrap_or("")),
			ArgOp::Property { name, custom } => match new {
				Value::Null if !custom => node.remove_attribute(&property_to_attribute(name)),
				new => node.set_property(name, &new.to_prop()),
			},
			ArgOp::Attribute(name) => match new.to_prop().to_attribute_value() {
				Some(value) => node.set_attribute(name, &value),
				None => node.remove_attribute(name),
			},
			ArgOp::DefaultProperty(_) | ArgOp::TargetEvent(_) => (),
		}
	}

	fn resolve_after(&self, after: &AfterNode) -> Option<Node> {
		match after {
			AfterNode::End => None,
			AfterNode::Static(slot) => Some(self.nodes[*slot].clone()),
			AfterNode::Instances { chain, then } => {
				let state = self.state.borrow();
				chain
					.iter()
					.find_map(|content| state.children[*content].as_ref().and_then(VNode::head))
					.or_else(|| then.map(|slot| self.nodes[slot].clone()))
			}
		}
	}

	/// The DOM node after content slot `content`.
	pub(crate) fn content_after(&self, content: usize) -> Option<Node> {
		self.template.args.iter().find_map(|instruction| match &instruction.op {
			ArgOp::Content(slot) if slot.content == content => Some(self.resolve_after(&slot.after)),
			_ => None,
		})?
	}

	fn unmount(&self) {
		let (children, roots, own_root, listeners) = {
			let mut state = self.state.borrow_mut();
			(
				std::mem::take(&mut state.children),
				std::mem::take(&mut state.roots),
				state.own_root.take(),
				std::mem::take(&mut state.listeners),
			)
		};
		for child in children.iter().flatten() {
			child.unmount();
		}
		drop((roots, own_root, listeners));
	}

	fn resolve_events(&self) {
		if self.event_nodes.borrow().is_some() {
			return;
		}
		let resolved = self.template.events.iter().map(|event| CompiledTemplate::resolve_event_node(event, &self.nodes)).collect();
		*self.event_nodes.borrow_mut() = Some(resolved);
	}

	/// Plans the handlers along `chain`, which starts at a node of this template.
	pub(crate) fn route(&self, chain: &[Node], name: &str, phases: Phases, plan: &mut Plan) {
		let Some((target, ancestors)) = chain.split_last() else {
			return;
		};
		let Ok(state) = self.state.try_borrow() else {
			warn!("Template is busy, dropping event");
			return;
		};
		self.resolve_events();
		let event_nodes = self.event_nodes.borrow();
		let event_nodes = event_nodes.as_deref().unwrap_or_default();

		let handler_at = |node: &Node, capture: bool| -> Option<Handler> {
			let (event, _) = self
				.template
				.events
				.iter()
				.zip(event_nodes)
				.find(|(event, event_node)| event.capture == capture && &*event.name == name && event_node.as_ref() == Some(node))?;
			match &state.instance.args[event.arg] {
				Value::Handler(handler) => Some(Rc::clone(handler)),
				_ => None,
			}
		};
		let bubble = |plan: &mut Plan, nodes: &[Node]| {
			for node in nodes.iter().rev() {
				if let Some(handler) = handler_at(node, false) {
					plan.fire(handler);
					plan.stop_if_cancelled();
				}
			}
		};

		for (index, node) in ancestors.iter().enumerate() {
			if phases.capture {
				if let Some(handler) = handler_at(node, true) {
					plan.fire(handler);
					plan.stop_if_cancelled();
				}
			}

			let points = self.template.insertion_points.iter().find(|points| self.nodes[points.parent] == *node);
			if let Some(child) = points.and_then(|points| self.content_at(&state, points, &chain[index + 1])) {
				child.route(&chain[index + 1..], name, phases, plan);
				plan.stop_unless_bubbling();
				if phases.bubble {
					bubble(plan, &chain[..=index]);
				}
				return;
			}
		}

		if phases.capture {
			if let Some(handler) = handler_at(target, true) {
				plan.fire(handler);
			}
		}
		if phases.bubble {
			if let Some(handler) = handler_at(target, false) {
				plan.fire(handler);
			}
		}
		plan.stop_unless_bubbling();
		if phases.bubble {
			bubble(plan, ancestors);
		}
	}

	/// The content of `points` that `node`, a child of their parent, belongs to.
	fn content_at<'a>(&self, state: &'a TemplateState, points: &InsertionPoints, node: &Node) -> Option<&'a VNode> {
		if let [point] = points.points.as_slice() {
			if point.single {
				return state.children[point.content].as_ref();
			}
		}

		let index = self.nodes[points.parent].child_index(node)?;
		let mut position = 0;
		for point in &points.points {
			position += point.statics_before;
			if index < position {
				return None;
			}
			let Some(child) = state.children[point.content].as_ref() else {
				continue;
			};
			let size = child.size();
			if index < position + size {
				return Some(child);
			}
			position += size;
		}
		None
	}
}
