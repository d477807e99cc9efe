//! Components: stateful render functions with unmount hooks and context.

use crate::{
	dom::Node,
	scheduler,
	value::Value,
	vnode::{after_in_owner, Owner, Slot, VNode},
};
use core::{
	any::Any,
	fmt::{self, Debug, Formatter},
	marker::PhantomData,
};
use std::{
	cell::{Cell, RefCell},
	rc::{Rc, Weak},
};
use tracing::{error, instrument, trace};

type Render = Box<dyn FnMut(&dyn Any) -> Value>;

pub(crate) struct Definition {
	init: Box<dyn Fn(&ComponentHandle) -> Render>,
	zero_sized: bool,
}

/// A component definition, created by [`define_component`].
///
/// Calling it yields a [`Value`] that mounts one component instance wherever it is rendered. Instances of the same
/// definition in the same position are updated rather than replaced.
pub struct Component<P> {
	definition: Rc<Definition>,
	_props: PhantomData<fn(P)>,
}

impl<P> Clone for Component<P> {
	fn clone(&self) -> Self {
		Self {
			definition: Rc::clone(&self.definition),
			_props: PhantomData,
		}
	}
}

impl<P> Debug for Component<P> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_tuple("Component").field(&Rc::as_ptr(&self.definition)).finish()
	}
}

impl<P: 'static> Component<P> {
	/// Invokes the component with fresh `props`, which always count as changed.
	#[must_use]
	pub fn call(&self, props: P) -> Value {
		self.call_shared(Rc::new(props))
	}

	/// Invokes the component with shared `props`. Passing the same [`Rc`] again skips the re-render.
	#[must_use]
	pub fn call_shared(&self, props: Rc<P>) -> Value {
		Value::Component(Rc::new(Invocation {
			definition: Rc::clone(&self.definition),
			props,
		}))
	}
}

/// One call of a [`Component`].
pub struct Invocation {
	definition: Rc<Definition>,
	props: Rc<dyn Any>,
}

impl Debug for Invocation {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("Invocation").field("definition", &self.definition_id()).finish_non_exhaustive()
	}
}

impl Invocation {
	pub(crate) fn definition_id(&self) -> usize {
		Rc::as_ptr(&self.definition) as usize
	}
}

/// Defines a component.
///
/// `init` runs once per mounted instance and returns that instance's render function, which is called with the current
/// props on mount, whenever the props change and whenever the instance is [invalidated](`invalidate`). State that
/// should survive re-renders lives in the render function's captures.
///
/// Props compare by pointer: [`Component::call`] always re-renders, [`Component::call_shared`] with an unchanged
/// [`Rc`] doesn't. Zero-sized props never change.
pub fn define_component<P: 'static, R: FnMut(&P) -> Value + 'static>(init: impl Fn(&ComponentHandle) -> R + 'static) -> Component<P> {
	Component {
		definition: Rc::new(Definition {
			init: Box::new(move |handle: &ComponentHandle| -> Render {
				let mut render = init(handle);
				Box::new(move |props: &dyn Any| {
					let props = props.downcast_ref::<P>().expect("tagged-dom bug: Props don't match their definition.");
					render(props)
				})
			}),
			zero_sized: std::mem::size_of::<P>() == 0,
		}),
		_props: PhantomData,
	}
}

pub(crate) struct ComponentNode {
	pub(crate) slot: Slot,
	definition: Rc<Definition>,
	props: RefCell<Rc<dyn Any>>,
	/// Taken out while it runs.
	render: RefCell<Option<Render>>,
	child: RefCell<Option<VNode>>,
	hooks: RefCell<Vec<Box<dyn FnOnce()>>>,
	contexts: RefCell<Vec<(usize, Rc<dyn Any>)>>,
	pub(crate) dirty: Cell<bool>,
	pub(crate) unmounted: Cell<bool>,
}

impl ComponentNode {
	#[instrument(skip_all, fields(definition = invocation.definition_id(), depth = slot.depth))]
	pub(crate) fn mount(invocation: &Invocation, slot: Slot, before: Option<&Node>) -> Rc<ComponentNode> {
		let node = Rc::new(ComponentNode {
			slot,
			definition: Rc::clone(&invocation.definition),
			props: RefCell::new(Rc::clone(&invocation.props)),
			render: RefCell::new(None),
			child: RefCell::new(None),
			hooks: RefCell::default(),
			contexts: RefCell::default(),
			dirty: Cell::new(false),
			unmounted: Cell::new(false),
		});

		let render = (node.definition.init)(&ComponentHandle(Rc::downgrade(&node)));
		*node.render.borrow_mut() = Some(render);

		let value = node.call_render().unwrap_or_default();
		let child = VNode::render(&value, node.child_slot(), before);
		*node.child.borrow_mut() = Some(child);
		node
	}

	fn child_slot(self: &Rc<Self>) -> Slot {
		Slot {
			parent: self.slot.parent.clone(),
			exclusive: self.slot.exclusive,
			owner: Owner::Component(Rc::downgrade(self)),
			root: self.slot.root.clone(),
			delegation_root: self.slot.delegation_root,
			depth: self.slot.depth + 1,
		}
	}

	pub(crate) fn is_instance_of(&self, invocation: &Invocation) -> bool {
		Rc::ptr_eq(&self.definition, &invocation.definition)
	}

	fn call_render(&self) -> Option<Value> {
		let Some(mut render) = self.render.borrow_mut().take() else {
			error!("Component rendered itself re-entrantly. Skipping the nested render.");
			return None;
		};
		let props = Rc::clone(&self.props.borrow());
		let value = render(&*props);
		*self.render.borrow_mut() = Some(render);
		Some(value)
	}

	pub(crate) fn with_child<R>(&self, f: impl FnOnce(&VNode) -> R) -> Option<R> {
		self.child.try_borrow().ok()?.as_ref().map(f)
	}

	/// Takes new props from a parent render.
	pub(crate) fn update(self: &Rc<Self>, invocation: &Invocation, after: &dyn Fn() -> Option<Node>) {
		let changed = !self.definition.zero_sized && !Rc::ptr_eq(&self.props.borrow(), &invocation.props);
		if !changed {
			return;
		}
		*self.props.borrow_mut() = Rc::clone(&invocation.props);
		self.refresh(after);
	}

	/// Re-renders with the current props.
	pub(crate) fn refresh(self: &Rc<Self>, after: &dyn Fn() -> Option<Node>) {
		self.dirty.set(false);
		let Some(value) = self.call_render() else {
			return;
		};
		let Some(child) = self.child.borrow_mut().take() else {
			error!("Component child is already being updated. Skipping the nested update.");
			return;
		};
		let child = child.update(&value, after);
		*self.child.borrow_mut() = Some(child);
	}

	/// The DOM node after this component, found through its owners.
	pub(crate) fn after(self: &Rc<Self>) -> Option<Node> {
		after_in_owner(&self.slot, Rc::as_ptr(self) as usize)
	}

	pub(crate) fn unmount(&self) {
		if self.unmounted.replace(true) {
			return;
		}
		let hooks = std::mem::take(&mut *self.hooks.borrow_mut());
		trace!(hooks = hooks.len(), "Unmounting component");
		for hook in hooks {
			hook();
		}
		self.with_child(VNode::unmount);
	}
}

/// A weak handle to a mounted component instance, passed to its `init` function.
#[derive(Clone)]
pub struct ComponentHandle(Weak<ComponentNode>);

impl Debug for ComponentHandle {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_tuple("ComponentHandle").field(&self.is_mounted()).finish()
	}
}

impl ComponentHandle {
	/// Schedules a re-render. See [`invalidate`].
	pub fn invalidate(&self) {
		if let Some(node) = self.0.upgrade() {
			scheduler::invalidate(&node);
		}
	}

	/// Registers `hook` to run when the instance unmounts. See [`register_unmount_hook`].
	pub fn on_unmount(&self, hook: impl FnOnce() + 'static) {
		match self.0.upgrade() {
			Some(node) if !node.unmounted.get() => node.hooks.borrow_mut().push(Box::new(hook)),
			_ => trace!("Dropping unmount hook of an unmounted component"),
		}
	}

	#[must_use]
	pub fn is_mounted(&self) -> bool {
		self.0.upgrade().map_or(false, |node| !node.unmounted.get())
	}

	/// See [`provide_context`].
	pub fn provide<T: 'static>(&self, context: &Context<T>, value: T) {
		let Some(node) = self.0.upgrade() else {
			return;
		};
		let value: Rc<dyn Any> = Rc::new(value);
		let mut contexts = node.contexts.borrow_mut();
		match contexts.iter_mut().find(|(id, _)| *id == context.id) {
			Some((_, provided)) => *provided = value,
			None => contexts.push((context.id, value)),
		}
	}

	/// See [`read_context`].
	#[must_use]
	pub fn read<T: 'static>(&self, context: &Context<T>) -> Rc<T> {
		let mut current = self.0.upgrade();
		while let Some(node) = current {
			let provided = node.contexts.borrow().iter().find(|(id, _)| *id == context.id).map(|(_, value)| Rc::clone(value));
			if let Some(value) = provided.and_then(|value| value.downcast::<T>().ok()) {
				return value;
			}
			current = node.slot.owner.component();
		}
		Rc::clone(&context.default)
	}
}

/// Schedules a re-render of the component behind `handle`.
///
/// Re-renders run in a microtask, shallow components first. Any number of invalidations before that collapse into one
/// re-render, and components unmounted in the meantime are skipped.
pub fn invalidate(handle: &ComponentHandle) {
	handle.invalidate();
}

/// Registers `hook` to run when the component behind `handle` unmounts. Hooks run in registration order, before the
/// component's content is unmounted.
pub fn register_unmount_hook(handle: &ComponentHandle, hook: impl FnOnce() + 'static) {
	handle.on_unmount(hook);
}

/// A value that components can provide to everything rendered below them.
pub struct Context<T> {
	id: usize,
	default: Rc<T>,
}

impl<T> Clone for Context<T> {
	fn clone(&self) -> Self {
		Self {
			id: self.id,
			default: Rc::clone(&self.default),
		}
	}
}

impl<T> Debug for Context<T> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_tuple("Context").field(&self.id).finish()
	}
}

thread_local! {
	static NEXT_CONTEXT_ID: Cell<usize> = Cell::new(0);
}

/// Creates a context that reads as `default` where no component provides it.
pub fn create_context<T: 'static>(default: T) -> Context<T> {
	let id = NEXT_CONTEXT_ID.with(|next| {
		let id = next.get();
		next.set(id + 1);
		id
	});
	Context { id, default: Rc::new(default) }
}

/// Provides `value` for `context` to the component behind `handle` and everything below it, replacing an earlier
/// provision by the same component.
pub fn provide_context<T: 'static>(handle: &ComponentHandle, context: &Context<T>, value: T) {
	handle.provide(context, value);
}

/// Reads the nearest provision of `context`, starting at the component behind `handle` itself.
///
/// This is resolved on each call and doesn't subscribe to changes.
#[must_use]
pub fn read_context<T: 'static>(handle: &ComponentHandle, context: &Context<T>) -> Rc<T> {
	handle.read(context)
}
