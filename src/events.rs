//! Event delegation.
//!
//! Each rendering root installs one capture and one bubble listener per event name it has seen in a template. When a
//! listener fires, the root cuts its own segment out of the event's propagation path, asks its tree which handlers lie
//! along that segment and then runs them in native phase order. Handlers run only after every borrow taken for
//! routing is released, so they may render, invalidate or dispatch further events.

use crate::{
	compiler::CompiledTemplate,
	dom::{Event, Listener, Node},
	value::Handler,
	vnode::{TemplateNode, VNode},
};
use core::fmt::{self, Debug, Formatter};
use hashbrown::{HashMap, HashSet};
use std::{
	cell::{Cell, RefCell},
	rc::{Rc, Weak},
};
use tracing::{level_filters::STATIC_MAX_LEVEL, trace, trace_span, warn, Level};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RootKind {
	/// A container passed to [`render`](`crate::render`). Its own node belongs to the enclosing tree.
	Container,
	/// A node inside a template, below a custom element. Its own node belongs to its own tree.
	Nested,
}

pub(crate) enum Tree {
	Owned(RefCell<Option<VNode>>),
	Template(Weak<TemplateNode>),
}

pub(crate) struct RootState {
	pub(crate) id: u32,
	pub(crate) node: Node,
	pub(crate) kind: RootKind,
	known_events: RefCell<HashSet<Rc<str>>>,
	known_templates: RefCell<HashSet<u32>>,
	listeners: RefCell<Vec<Listener>>,
	pub(crate) tree: Tree,
}

impl Debug for RootState {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("RootState")
			.field("id", &self.id)
			.field("kind", &self.kind)
			.field("known_events", &self.known_events.borrow().len())
			.finish_non_exhaustive()
	}
}

thread_local! {
	static NEXT_ROOT_ID: Cell<u32> = Cell::new(1);
	static ROOTS: RefCell<HashMap<u32, Weak<RootState>>> = RefCell::new(HashMap::new());
	/// Container roots are owned here. Nested roots are owned by their template.
	static CONTAINERS: RefCell<HashMap<u32, Rc<RootState>>> = RefCell::new(HashMap::new());
}

/// Which phases of an event a listener call plans handlers for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Phases {
	pub capture: bool,
	pub bubble: bool,
}

enum PlanStep {
	Fire(Handler),
	StopIfCancelled,
	StopUnlessBubbling,
}

/// Handlers to run for one listener call, with the propagation checks between them.
#[derive(Default)]
pub(crate) struct Plan(Vec<PlanStep>);

impl Plan {
	pub(crate) fn fire(&mut self, handler: Handler) {
		self.0.push(PlanStep::Fire(handler));
	}

	pub(crate) fn stop_if_cancelled(&mut self) {
		self.0.push(PlanStep::StopIfCancelled);
	}

	pub(crate) fn stop_unless_bubbling(&mut self) {
		self.0.push(PlanStep::StopUnlessBubbling);
	}

	fn handlers(&self) -> usize {
		self.0.iter().filter(|step| matches!(step, PlanStep::Fire(_))).count()
	}

	fn execute(self, event: &Event) {
		for step in self.0 {
			match step {
				PlanStep::Fire(handler) => handler(event),
				PlanStep::StopIfCancelled => {
					if event.cancel_bubble() {
						break;
					}
				}
				PlanStep::StopUnlessBubbling => {
					if event.cancel_bubble() || !event.bubbles() {
						break;
					}
				}
			}
		}
	}
}

fn root_kind(id: u32) -> Option<RootKind> {
	ROOTS.with(|roots| roots.borrow().get(&id).and_then(Weak::upgrade).map(|root| root.kind))
}

/// The container root registered under `marker`, if any.
pub(crate) fn container(marker: u32) -> Option<Rc<RootState>> {
	CONTAINERS.with(|containers| containers.borrow().get(&marker).cloned())
}

pub(crate) fn remove_container(marker: u32) -> Option<Rc<RootState>> {
	CONTAINERS.with(|containers| containers.borrow_mut().remove(&marker))
}

/// Whether `marker` belongs to a live rendering root of any kind.
pub(crate) fn is_live(marker: u32) -> bool {
	root_kind(marker).is_some()
}

impl RootState {
	fn new(node: &Node, kind: RootKind, tree: Tree) -> Rc<RootState> {
		let id = NEXT_ROOT_ID.with(|next| {
			let id = next.get();
			next.set(id + 1);
			id
		});
		let root = Rc::new(RootState {
			id,
			node: node.clone(),
			kind,
			known_events: RefCell::default(),
			known_templates: RefCell::default(),
			listeners: RefCell::default(),
			tree,
		});
		node.set_root_marker(Some(id));
		ROOTS.with(|roots| roots.borrow_mut().insert(id, Rc::downgrade(&root)));
		trace!(id, ?kind, "Created rendering root");
		root
	}

	/// Registers `node` as a container root, owned by this module until [`remove_container`].
	pub(crate) fn container(node: &Node) -> Rc<RootState> {
		let root = Self::new(node, RootKind::Container, Tree::Owned(RefCell::new(None)));
		CONTAINERS.with(|containers| containers.borrow_mut().insert(root.id, Rc::clone(&root)));
		root
	}

	pub(crate) fn nested(node: &Node, template: Weak<TemplateNode>) -> Rc<RootState> {
		Self::new(node, RootKind::Nested, Tree::Template(template))
	}

	pub(crate) fn take_tree(&self) -> Option<VNode> {
		match &self.tree {
			Tree::Owned(tree) => tree.try_borrow_mut().ok()?.take(),
			Tree::Template(_) => None,
		}
	}

	pub(crate) fn put_tree(&self, vnode: VNode) {
		if let Tree::Owned(tree) = &self.tree {
			*tree.borrow_mut() = Some(vnode);
		}
	}

	/// Makes sure the events of `template` reach this root.
	pub(crate) fn register_template(self: &Rc<Self>, template: &CompiledTemplate) {
		if self.known_templates.borrow_mut().insert(template.type_tag) {
			self.register_events(&template.known_events);
		}
	}

	pub(crate) fn register_events(self: &Rc<Self>, names: &[Rc<str>]) {
		for name in names {
			if !self.known_events.borrow_mut().insert(Rc::clone(name)) {
				continue;
			}
			trace!(root = self.id, event = %name, "Delegating event");
			for capture in [true, false] {
				let root = Rc::downgrade(self);
				let listener = self.node.add_listener(name, capture, move |event| {
					if let Some(root) = root.upgrade() {
						root.handle(event, capture);
					}
				});
				self.listeners.borrow_mut().push(listener);
			}
		}
	}

	/// This root's part of `path` (target first), root-ward first, and whether it reaches the target.
	fn segment(&self, path: &[Node]) -> Option<(Vec<Node>, bool)> {
		let position = path.iter().position(|node| *node == self.node)?;
		let start = path[..position]
			.iter()
			.enumerate()
			.rev()
			.find_map(|(index, node)| match node.root_marker().and_then(root_kind)? {
				RootKind::Nested => Some(index + 1),
				RootKind::Container => Some(index),
			})
			.unwrap_or(0);
		let end = match self.kind {
			RootKind::Nested => position + 1,
			RootKind::Container => position,
		};
		if start >= end {
			return None;
		}
		let mut chain = path[start..end].to_vec();
		chain.reverse();
		Some((chain, start == 0))
	}

	fn handle(&self, event: &Event, capture: bool) {
		let name = event.event_type();
		let span = trace_span!("Routing event", root = self.id, event = %name, capture);
		let _enter = span.enter();

		let bubbles = event.bubbles();
		let phases = match (bubbles, capture) {
			(true, capture) => Phases { capture, bubble: !capture },
			(false, true) => Phases { capture: true, bubble: true },
			(false, false) => return,
		};
		if !bubbles && event.target().map_or(false, |target| target.is_custom_element()) {
			return;
		}

		let Some((chain, at_target)) = self.segment(&event.path()) else {
			return;
		};
		if !bubbles && !at_target {
			return;
		}
		if cfg!(feature = "log-paths") && STATIC_MAX_LEVEL >= Level::TRACE {
			trace!(?chain, "Target chain");
		}

		let mut plan = Plan::default();
		match &self.tree {
			Tree::Owned(tree) => match tree.try_borrow() {
				Ok(tree) => {
					if let Some(vnode) = tree.as_ref() {
						vnode.route(&chain, &name, phases, &mut plan);
					}
				}
				Err(_) => {
					warn!("Rendering root is busy, dropping event");
					return;
				}
			},
			Tree::Template(template) => {
				if let Some(template) = template.upgrade() {
					template.route(&chain, &name, phases, &mut plan);
				}
			}
		}

		trace!(handlers = plan.handlers(), "Running planned handlers");
		plan.execute(event);
	}
}

impl Drop for RootState {
	fn drop(&mut self) {
		if self.node.root_marker() == Some(self.id) {
			self.node.set_root_marker(None);
		}
		ROOTS
			.try_with(|roots| {
				if let Ok(mut roots) = roots.try_borrow_mut() {
					roots.remove(&self.id);
				}
			})
			.ok();
		trace!(id = self.id, "Dropped rendering root");
	}
}
