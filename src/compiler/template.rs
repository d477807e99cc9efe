//! Slot allocation for compiled templates.
//!
//! Every static node of a template root gets a provisional slot in document order. Only nodes that carry a dynamic
//! slot, host dynamic content, start a nested rendering root or follow dynamic content are *active*; they and the
//! [***firstChild***](https://developer.mozilla.org/en-US/docs/Web/API/Node/firstChild)/[***nextSibling***](https://developer.mozilla.org/en-US/docs/Web/API/Node/nextSibling)
//! chains leading to them are kept, everything else is folded away, and the kept slots are renumbered densely.
//!
//! Event targets aren't resolved at mount. Each event instruction stores the nearest kept node and the steps from there,
//! and is resolved the first time an event is routed through the instance.

use super::{
	markup::{self, RepNode, RepProp, StaticNode},
	CompileError,
};
use crate::{
	dom::Node,
	value::{Instance, Value},
};
use core::fmt::{self, Debug, Formatter};
use hashbrown::HashMap;
use std::{
	cell::{Cell, RefCell},
	rc::Rc,
};
use tracing::{instrument, trace};

/// The literal fragments of one template call site.
///
/// A site's address is its identity: two sites with identical text are compiled separately, and every evaluation of
/// one site reuses its compiled template. [`html!`](`crate::html`) declares one `static` site per expansion.
#[derive(Debug)]
pub struct TemplateSite {
	strings: &'static [&'static str],
}

impl TemplateSite {
	#[must_use]
	pub const fn new(strings: &'static [&'static str]) -> Self {
		Self { strings }
	}

	#[must_use]
	pub fn strings(&self) -> &'static [&'static str] {
		self.strings
	}

	fn id(&'static self) -> usize {
		self as *const Self as usize
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Step {
	FirstChild,
	NextSibling,
}

impl Step {
	pub(crate) fn apply(self, node: &Node) -> Option<Node> {
		match self {
			Step::FirstChild => node.first_child(),
			Step::NextSibling => node.next_sibling(),
		}
	}
}

/// Resolves slot `index + 1` from an earlier slot.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Walk {
	pub from: usize,
	pub step: Step,
}

#[derive(Debug)]
pub(crate) struct ArgInstruction {
	pub arg: usize,
	pub node: usize,
	pub op: ArgOp,
}

#[derive(Debug, PartialEq)]
pub(crate) enum ArgOp {
	Content(ContentSlot),
	Class,
	Style,
	InnerHtml,
	Property { name: Rc<str>, custom: bool },
	Attribute(Rc<str>),
	/// Set once at mount, never updated.
	DefaultProperty(&'static str),
	/// `on…` on a custom element: a native listener on the element itself.
	TargetEvent(Rc<str>),
}

#[derive(Debug, PartialEq)]
pub(crate) struct ContentSlot {
	/// Index into the instance's content children.
	pub content: usize,
	/// The content is the only child of its parent.
	pub exclusive: bool,
	pub after: AfterNode,
	/// The parent is a custom element, so instantiated templates become rendering roots.
	pub delegation_root: bool,
	/// The nested rendering root this content is registered with, if any.
	pub scope: Option<usize>,
}

/// Where dynamic content is inserted before.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum AfterNode {
	/// Appended to its parent.
	End,
	/// Before a static node.
	Static(usize),
	/// Before the first node of the first of these contents that has one, else before `then` or at the end.
	Instances { chain: Vec<usize>, then: Option<usize> },
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct EventInstruction {
	pub name: Rc<str>,
	pub capture: bool,
	pub arg: usize,
	pub base: usize,
	pub path: Vec<Step>,
}

/// The dynamic contents of one parent node, in order.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct InsertionPoints {
	pub parent: usize,
	pub points: Vec<InsertionPoint>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct InsertionPoint {
	/// Static siblings between the previous insertion (or the first child) and this one.
	pub statics_before: usize,
	pub content: usize,
	pub single: bool,
}

/// A static child of a custom element, which becomes a rendering root of its own.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct NestedRoot {
	pub node: usize,
	pub events: Vec<Rc<str>>,
}

/// The instructions for one template root, shared by all of its instances.
pub struct CompiledTemplate {
	pub(crate) type_tag: u32,
	pub(crate) node: Node,
	pub(crate) walks: Vec<Walk>,
	pub(crate) args: Vec<ArgInstruction>,
	pub(crate) events: Vec<EventInstruction>,
	pub(crate) insertion_points: Vec<InsertionPoints>,
	pub(crate) nested_roots: Vec<NestedRoot>,
	pub(crate) known_events: Vec<Rc<str>>,
	pub(crate) contents: usize,
}

impl Debug for CompiledTemplate {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("CompiledTemplate")
			.field("type_tag", &self.type_tag)
			.field("nodes", &self.node_count())
			.field("args", &self.args.len())
			.field("events", &self.events.len())
			.finish_non_exhaustive()
	}
}

impl CompiledTemplate {
	pub(crate) fn node_count(&self) -> usize {
		self.walks.len() + 1
	}

	/// Clones the template node and resolves every kept slot on the pristine clone.
	pub(crate) fn clone_nodes(&self) -> Vec<Node> {
		let mut nodes = Vec::with_capacity(self.node_count());
		nodes.push(self.node.clone_deep());
		for walk in &self.walks {
			let node = walk.step.apply(&nodes[walk.from]).expect("tagged-dom bug: Template walk left the cloned tree.");
			nodes.push(node);
		}
		nodes
	}

	pub(crate) fn resolve_event_node(event: &EventInstruction, nodes: &[Node]) -> Option<Node> {
		event.path.iter().try_fold(nodes[event.base].clone(), |node, step| step.apply(&node))
	}
}

enum Compiled {
	Single(Rc<CompiledTemplate>),
	Insertion(usize),
	Fragment(Vec<Root>),
}

enum Root {
	Template(Rc<CompiledTemplate>),
	Insertion(usize),
}

thread_local! {
	static CACHE: RefCell<HashMap<usize, Rc<Compiled>>> = RefCell::new(HashMap::new());
	static PROBES: RefCell<HashMap<String, HashMap<String, bool>>> = RefCell::new(HashMap::new());
	static NEXT_TYPE_TAG: Cell<u32> = Cell::new(0);
}

/// Instantiates the template at `site` with `args`, compiling it on first use.
///
/// # Errors
///
/// Iff `args` doesn't fill exactly the slots of `site`, or the markup can't be matched against its parsed structure.
pub fn try_instantiate(site: &'static TemplateSite, args: Vec<Value>) -> Result<Value, CompileError> {
	let expected = site.strings.len().saturating_sub(1);
	if args.len() != expected {
		return Err(CompileError::ArgumentCount { expected, found: args.len() });
	}

	Ok(match &*compiled(site)? {
		Compiled::Single(template) => Value::Template(Rc::new(Instance {
			template: Rc::clone(template),
			args: args.into(),
		})),
		Compiled::Insertion(arg) => args.into_iter().nth(*arg).unwrap_or_default(),
		Compiled::Fragment(roots) => {
			let args: Rc<[Value]> = args.into();
			Value::List(
				roots
					.iter()
					.map(|root| match root {
						Root::Template(template) => Value::Template(Rc::new(Instance {
							template: Rc::clone(template),
							args: Rc::clone(&args),
						})),
						Root::Insertion(arg) => args[*arg].clone(),
					})
					.collect(),
			)
		}
	})
}

/// Like [`try_instantiate`], but a template that can't be compiled is a programming error.
///
/// # Panics
///
/// Iff [`try_instantiate`] fails.
#[track_caller]
pub fn instantiate(site: &'static TemplateSite, args: Vec<Value>) -> Value {
	match try_instantiate(site, args) {
		Ok(value) => value,
		Err(error) => panic!("Failed to instantiate template: {}", error),
	}
}

fn compiled(site: &'static TemplateSite) -> Result<Rc<Compiled>, CompileError> {
	if let Some(compiled) = CACHE.with(|cache| cache.borrow().get(&site.id()).cloned()) {
		return Ok(compiled);
	}
	let compiled = Rc::new(compile(site.strings)?);
	CACHE.with(|cache| cache.borrow_mut().insert(site.id(), Rc::clone(&compiled)));
	Ok(compiled)
}

fn missing(rep: &StaticNode) -> CompileError {
	#[cfg(feature = "dangerous-logging")]
	return CompileError::Structure(format!("expected a node for <{}>", rep.tag));
	#[cfg(not(feature = "dangerous-logging"))]
	return CompileError::Structure(format!("expected a node for a {}-byte tag", rep.tag.len()));
}

#[instrument(skip_all, fields(fragments = strings.len()))]
fn compile(strings: &[&str]) -> Result<Compiled, CompileError> {
	let html = markup::build_html(strings);
	#[cfg(feature = "dangerous-logging")]
	trace!(%html, "Parsing template markup");
	let fragment = Node::parse_fragment(&html)?;
	let representation = markup::representation(strings)?;

	let mut cursor = fragment.first_child();
	let mut roots = Vec::with_capacity(representation.children.len());
	for child in &representation.children {
		match child {
			RepNode::Insertion(arg) => roots.push(Root::Insertion(*arg)),
			RepNode::Static(rep) => {
				if rep.remove {
					let comment = cursor.take().ok_or_else(|| missing(rep))?;
					cursor = comment.next_sibling();
					comment.remove();
				}
				let node = cursor.take().ok_or_else(|| missing(rep))?;
				cursor = node.next_sibling();
				node.remove();

				let mut compiler = RootCompiler::default();
				compiler.compile_node(rep, &node, None, false, None)?;
				roots.push(Root::Template(Rc::new(compiler.finish(node))));
			}
		}
	}

	Ok(if roots.len() == 1 {
		match roots.pop().expect("tagged-dom bug: Root count changed.") {
			Root::Template(template) => Compiled::Single(template),
			Root::Insertion(arg) => Compiled::Insertion(arg),
		}
	} else {
		Compiled::Fragment(roots)
	})
}

#[derive(Clone, Copy)]
enum AfterDraft {
	End,
	Static(usize),
	Instance(usize),
}

struct EventDraft {
	node: usize,
	name: Rc<str>,
	capture: bool,
	arg: usize,
}

#[derive(Default)]
struct RootCompiler {
	/// Indexed by provisional slot. Only the root has no predecessor.
	from: Vec<Option<(usize, Step)>>,
	active: Vec<bool>,
	args: Vec<ArgInstruction>,
	content_after: Vec<AfterDraft>,
	events: Vec<EventDraft>,
	points: Vec<InsertionPoints>,
	nested_roots: Vec<NestedRoot>,
	known_events: Vec<Rc<str>>,
}

/// Splits an `on…` attribute into its event name and whether it listens during capture.
pub(crate) fn event_name(attribute: &str) -> (&str, bool) {
	match attribute.strip_suffix("capture") {
		Some(base) if !base.is_empty() && attribute != "gotpointercapture" && attribute != "lostpointercapture" => (base, true),
		_ => (attribute, false),
	}
}

/// Whether elements named `tag` carry a property `name`, asked once per pair.
fn is_property(tag: &str, name: &str, node: &Node) -> bool {
	PROBES.with(|probes| {
		if let Some(&known) = probes.borrow().get(tag).and_then(|names| names.get(name)) {
			return known;
		}
		let known = node.has_property(name);
		trace!(tag, name, property = known, "Probed template node");
		probes.borrow_mut().entry(tag.to_owned()).or_default().insert(name.to_owned(), known);
		known
	})
}

impl RootCompiler {
	fn compile_node(&mut self, rep: &StaticNode, dom: &Node, from: Option<(usize, Step)>, parent_custom: bool, mut scope: Option<usize>) -> Result<usize, CompileError> {
		let slot = self.from.len();
		self.from.push(from);
		self.active.push(false);

		if parent_custom {
			scope = Some(self.nested_roots.len());
			self.nested_roots.push(NestedRoot { node: slot, events: Vec::new() });
			self.active[slot] = true;
		}

		for prop in &rep.props {
			self.compile_prop(rep, prop, dom, slot, scope);
		}

		let mut previous = None;
		let mut after_insertion = false;
		let mut statics_before = 0;
		let mut cursor = dom.first_child();
		for (i, child) in rep.children.iter().enumerate() {
			match child {
				RepNode::Insertion(arg) => {
					let content = self.content_after.len();
					self.content_after.push(match rep.children.get(i + 1) {
						None => AfterDraft::End,
						// The next static sibling is compiled next, so it gets the next slot.
						Some(RepNode::Static(_)) => AfterDraft::Static(self.from.len()),
						Some(RepNode::Insertion(_)) => AfterDraft::Instance(content + 1),
					});

					let exclusive = rep.children.len() == 1;
					let point = InsertionPoint {
						statics_before,
						content,
						single: exclusive,
					};
					match self.points.iter_mut().find(|points| points.parent == slot) {
						Some(points) => points.points.push(point),
						None => self.points.push(InsertionPoints { parent: slot, points: vec![point] }),
					}
					statics_before = 0;
					after_insertion = true;
					self.active[slot] = true;

					self.args.push(ArgInstruction {
						arg: *arg,
						node: slot,
						op: ArgOp::Content(ContentSlot {
							content,
							exclusive,
							after: AfterNode::End,
							delegation_root: rep.custom,
							scope,
						}),
					});
				}
				RepNode::Static(child_rep) => {
					if child_rep.remove {
						let comment = cursor.take().ok_or_else(|| missing(child_rep))?;
						cursor = comment.next_sibling();
						comment.remove();
					}
					let child_dom = cursor.take().ok_or_else(|| missing(child_rep))?;
					cursor = child_dom.next_sibling();

					let from = match previous {
						Some(previous) => (previous, Step::NextSibling),
						None => (slot, Step::FirstChild),
					};
					let child_slot = self.compile_node(child_rep, &child_dom, Some(from), rep.custom, scope)?;
					if after_insertion {
						self.active[child_slot] = true;
					}
					previous = Some(child_slot);
					statics_before += 1;
					after_insertion = false;
				}
			}
		}

		Ok(slot)
	}

	fn compile_prop(&mut self, rep: &StaticNode, prop: &RepProp, dom: &Node, slot: usize, scope: Option<usize>) {
		if let Some(event) = prop.name.strip_prefix("on") {
			if rep.custom {
				self.active[slot] = true;
				self.args.push(ArgInstruction {
					arg: prop.arg,
					node: slot,
					op: ArgOp::TargetEvent(event.into()),
				});
			} else {
				let (name, capture) = event_name(event);
				let name: Rc<str> = name.into();
				let known = match scope {
					Some(root) => &mut self.nested_roots[root].events,
					None => &mut self.known_events,
				};
				if !known.contains(&name) {
					known.push(Rc::clone(&name));
				}
				self.events.push(EventDraft {
					node: slot,
					name,
					capture,
					arg: prop.arg,
				});
			}
			return;
		}

		self.active[slot] = true;
		let op = match prop.name.as_str() {
			"class" | "className" => ArgOp::Class,
			"style" => ArgOp::Style,
			"innerHTML" => ArgOp::InnerHtml,
			"defaultChecked" => ArgOp::DefaultProperty("checked"),
			"defaultValue" => ArgOp::DefaultProperty("value"),
			name if is_property(&rep.tag, name, dom) => ArgOp::Property {
				name: name.into(),
				custom: rep.custom,
			},
			name => ArgOp::Attribute(name.into()),
		};
		self.args.push(ArgInstruction { arg: prop.arg, node: slot, op });
	}

	fn finish(self, node: Node) -> CompiledTemplate {
		let RootCompiler {
			from,
			active,
			mut args,
			content_after,
			events,
			mut points,
			mut nested_roots,
			known_events,
		} = self;

		let mut kept = vec![false; from.len()];
		kept[0] = true;
		for (slot, _) in active.iter().enumerate().filter(|(_, active)| **active) {
			let mut slot = slot;
			while !kept[slot] {
				kept[slot] = true;
				slot = from[slot].expect("tagged-dom bug: Only the root has no predecessor.").0;
			}
		}

		let mut remap = vec![usize::MAX; from.len()];
		let mut walks = Vec::new();
		for (dense, slot) in (0..from.len()).filter(|&slot| kept[slot]).enumerate() {
			remap[slot] = dense;
			if let Some((previous, step)) = from[slot] {
				walks.push(Walk { from: remap[previous], step });
			}
		}

		let events = events
			.into_iter()
			.map(|event| {
				let mut path = Vec::new();
				let mut slot = event.node;
				while !kept[slot] {
					let (previous, step) = from[slot].expect("tagged-dom bug: Only the root has no predecessor.");
					path.push(step);
					slot = previous;
				}
				path.reverse();
				EventInstruction {
					name: event.name,
					capture: event.capture,
					arg: event.arg,
					base: remap[slot],
					path,
				}
			})
			.collect::<Vec<_>>();

		for arg in &mut args {
			arg.node = remap[arg.node];
			if let ArgOp::Content(content) = &mut arg.op {
				content.after = resolve_after(content.content, &content_after, &remap);
			}
		}
		for points in &mut points {
			points.parent = remap[points.parent];
		}
		for root in &mut nested_roots {
			root.node = remap[root.node];
		}

		let type_tag = NEXT_TYPE_TAG.with(|next| {
			let type_tag = next.get();
			next.set(type_tag + 1);
			type_tag
		});
		trace!(type_tag, nodes = walks.len() + 1, args = args.len(), events = events.len(), "Compiled template root");

		CompiledTemplate {
			type_tag,
			node,
			walks,
			args,
			events,
			insertion_points: points,
			nested_roots,
			known_events,
			contents: content_after.len(),
		}
	}
}

fn resolve_after(content: usize, content_after: &[AfterDraft], remap: &[usize]) -> AfterNode {
	match content_after[content] {
		AfterDraft::End => AfterNode::End,
		AfterDraft::Static(slot) => AfterNode::Static(remap[slot]),
		AfterDraft::Instance(next) => {
			let mut chain = vec![next];
			loop {
				match content_after[*chain.last().expect("tagged-dom bug: Empty after-node chain.")] {
					AfterDraft::Instance(next) => chain.push(next),
					AfterDraft::Static(slot) => break AfterNode::Instances { chain, then: Some(remap[slot]) },
					AfterDraft::End => break AfterNode::Instances { chain, then: None },
				}
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn single(site: &'static TemplateSite) -> Rc<CompiledTemplate> {
		match &*compiled(site).unwrap() {
			Compiled::Single(template) => Rc::clone(template),
			_ => panic!("expected a single root"),
		}
	}

	#[test]
	fn static_subtrees_are_folded() {
		static SITE: TemplateSite = TemplateSite::new(&["<div><p><b>deep</b></p><span class=", "></span></div>"]);
		let template = single(&SITE);
		assert_eq!(
			template.walks,
			[
				Walk { from: 0, step: Step::FirstChild },
				Walk { from: 1, step: Step::NextSibling },
			]
		);
		assert_eq!(template.args.len(), 1);
		assert_eq!(template.args[0].node, 2);
		assert_eq!(template.args[0].op, ArgOp::Class);
	}

	#[test]
	fn adjacent_insertions_chain_their_anchors() {
		static SITE: TemplateSite = TemplateSite::new(&["<div>", "", "<i /></div>"]);
		let template = single(&SITE);
		assert_eq!(template.node_count(), 2);

		let afters = template
			.args
			.iter()
			.map(|arg| match &arg.op {
				ArgOp::Content(content) => content.after.clone(),
				_ => panic!("expected content"),
			})
			.collect::<Vec<_>>();
		assert_eq!(
			afters,
			[
				AfterNode::Instances {
					chain: vec![1],
					then: Some(1)
				},
				AfterNode::Static(1),
			]
		);
		assert_eq!(template.insertion_points.len(), 1);
		assert!(template.insertion_points[0].points.iter().all(|point| !point.single));
	}

	#[test]
	fn events_resolve_from_the_nearest_kept_node() {
		static SITE: TemplateSite = TemplateSite::new(&["<div><button onclick=", ">x</button></div>"]);
		let template = single(&SITE);
		assert!(template.walks.is_empty());
		assert_eq!(template.known_events, vec![Rc::<str>::from("click")]);
		assert_eq!(template.events[0].base, 0);
		assert_eq!(template.events[0].path, [Step::FirstChild]);

		let nodes = template.clone_nodes();
		let button = CompiledTemplate::resolve_event_node(&template.events[0], &nodes).unwrap();
		assert_eq!(button.tag_name().as_deref(), Some("button"));
	}

	#[test]
	fn capture_suffix() {
		assert_eq!(event_name("clickcapture"), ("click", true));
		assert_eq!(event_name("click"), ("click", false));
		assert_eq!(event_name("gotpointercapture"), ("gotpointercapture", false));
		assert_eq!(event_name("capture"), ("capture", false));
	}

	#[test]
	fn call_sites_are_distinct_cache_entries() {
		static A: TemplateSite = TemplateSite::new(&["<p>same</p>"]);
		static B: TemplateSite = TemplateSite::new(&["<p>same</p>"]);
		assert!(Rc::ptr_eq(&single(&A), &single(&A)));
		assert!(!Rc::ptr_eq(&single(&A), &single(&B)));
		assert_ne!(single(&A).type_tag, single(&B).type_tag);
	}

	#[test]
	fn properties_are_probed_on_the_template_node() {
		static SITE: TemplateSite = TemplateSite::new(&["<div><input value=", " /><a data-x=", "></a></div>"]);
		let template = single(&SITE);
		assert_eq!(
			template.args[0].op,
			ArgOp::Property {
				name: "value".into(),
				custom: false
			}
		);
		assert_eq!(template.args[1].op, ArgOp::Attribute("data-x".into()));
	}

	#[test]
	fn static_children_of_custom_elements_become_nested_roots() {
		static SITE: TemplateSite = TemplateSite::new(&["<my-el><div onclick=", "></div></my-el>"]);
		let template = single(&SITE);
		assert!(template.known_events.is_empty());
		assert_eq!(
			template.nested_roots,
			[NestedRoot {
				node: 1,
				events: vec!["click".into()]
			}]
		);
	}

	#[test]
	fn fragments_and_bare_insertions() {
		static FRAGMENT: TemplateSite = TemplateSite::new(&["<b></b><i></i>"]);
		match instantiate(&FRAGMENT, vec![]) {
			Value::List(roots) => assert_eq!(roots.len(), 2),
			other => panic!("expected a list, found {:?}", other),
		}

		static BARE: TemplateSite = TemplateSite::new(&["", ""]);
		assert!(instantiate(&BARE, vec![Value::from("x")]).same(&Value::from("x")));
	}

	#[test]
	fn argument_count_is_checked() {
		static SITE: TemplateSite = TemplateSite::new(&["<p>", "</p>"]);
		assert!(matches!(try_instantiate(&SITE, vec![]), Err(CompileError::ArgumentCount { expected: 1, found: 0 })));
	}
}
