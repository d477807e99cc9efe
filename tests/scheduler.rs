#![cfg(not(target_arch = "wasm32"))]

use std::{
	cell::{Cell, RefCell},
	rc::Rc,
};
use tagged_dom::{
	define_component,
	dom::{mem::run_microtasks, Node},
	html, invalidate, render, unmount, with_key, Component, ComponentHandle, Value,
};

/// A component that shows `state` and records its handle and renders.
struct Probe {
	component: Component<u32>,
	handles: Rc<RefCell<Vec<ComponentHandle>>>,
	state: Rc<Cell<u32>>,
	renders: Rc<RefCell<Vec<String>>>,
}

fn probe(name: &'static str, child: Option<Component<u32>>) -> Probe {
	let handles = Rc::new(RefCell::new(Vec::new()));
	let state = Rc::new(Cell::new(0));
	let renders = Rc::new(RefCell::new(Vec::new()));
	let component = define_component({
		let (handles, state, renders) = (Rc::clone(&handles), Rc::clone(&state), Rc::clone(&renders));
		move |handle: &ComponentHandle| {
			handles.borrow_mut().push(handle.clone());
			let (state, renders, child) = (Rc::clone(&state), Rc::clone(&renders), child.clone());
			move |props: &u32| {
				renders.borrow_mut().push(format!("{} {}", name, state.get()));
				let child = child.as_ref().map_or(Value::Null, |child| child.call(state.get()));
				html!("<span>", *props, ":", state.get(), "</span>", child, "")
			}
		}
	});
	Probe {
		component,
		handles,
		state,
		renders,
	}
}

impl Probe {
	fn handle(&self, index: usize) -> ComponentHandle {
		self.handles.borrow()[index].clone()
	}

	fn renders(&self) -> Vec<String> {
		std::mem::take(&mut *self.renders.borrow_mut())
	}
}

#[test]
fn invalidations_batch_into_one_render() {
	let container = Node::element("div");
	let counter = probe("counter", None);
	render(html!("<p>", counter.component.call(0), "</p>"), &container);
	assert_eq!(counter.renders(), ["counter 0"]);

	counter.state.set(1);
	counter.handle(0).invalidate();
	invalidate(&counter.handle(0));
	assert!(counter.renders().is_empty());
	assert_eq!(container.inner_html(), "<p><span>0:0</span></p>");

	assert_eq!(run_microtasks(), 1);
	assert_eq!(counter.renders(), ["counter 1"]);
	assert_eq!(container.inner_html(), "<p><span>0:1</span></p>");
	assert_eq!(run_microtasks(), 0);
}

#[test]
fn shallow_components_render_first() {
	let container = Node::element("div");
	let child = probe("child", None);
	let parent = probe("parent", Some(child.component.clone()));
	render(html!("<div>", parent.component.call(7), "</div>"), &container);
	assert_eq!(parent.renders(), ["parent 0"]);
	assert_eq!(child.renders(), ["child 0"]);

	child.handle(0).invalidate();
	parent.handle(0).invalidate();
	run_microtasks();

	// The parent passes new props, which renders the child and settles its invalidation.
	let mut order = parent.renders();
	order.extend(child.renders());
	assert_eq!(order, ["parent 0", "child 0"]);
	assert_eq!(container.inner_html(), "<div><span>7:0</span><span>0:0</span></div>");
}

#[test]
fn unmounted_components_are_skipped() {
	let container = Node::element("div");
	let doomed = probe("doomed", None);
	render(html!("<p>", doomed.component.call(0), "</p>"), &container);
	doomed.renders();

	doomed.handle(0).invalidate();
	render(html!("<p>", "gone", "</p>"), &container);
	run_microtasks();
	assert!(doomed.renders().is_empty());
	assert_eq!(container.inner_html(), "<p>gone</p>");

	let handle = doomed.handle(0);
	assert!(!handle.is_mounted());
	handle.invalidate();
	assert_eq!(run_microtasks(), 0);
}

#[test]
fn invalidation_after_unmount_is_ignored() {
	let container = Node::element("div");
	let counter = probe("counter", None);
	render(counter.component.call(0), &container);
	counter.renders();

	assert!(unmount(&container));
	counter.handle(0).invalidate();
	assert_eq!(run_microtasks(), 0);
	assert!(counter.renders().is_empty());
}

#[test]
fn rerenders_stay_in_place() {
	let container = Node::element("div");
	let visible = Rc::new(Cell::new(false));
	let handle = Rc::new(RefCell::new(None));

	let toggle = define_component({
		let (visible, handle) = (Rc::clone(&visible), Rc::clone(&handle));
		move |this: &ComponentHandle| {
			*handle.borrow_mut() = Some(this.clone());
			let visible = Rc::clone(&visible);
			move |_: &()| if visible.get() { html!("<b>shown</b>") } else { Value::Null }
		}
	});
	let items = vec![with_key(1, "a"), with_key(2, toggle.call(())), with_key(3, "c")];
	render(html!("<p>", "start", "", items, "", "end", "</p>"), &container);
	assert_eq!(container.inner_html(), "<p>startacend</p>");

	let handle = handle.borrow().clone().unwrap();
	visible.set(true);
	handle.invalidate();
	run_microtasks();
	assert_eq!(container.inner_html(), "<p>starta<b>shown</b>cend</p>");

	visible.set(false);
	handle.invalidate();
	run_microtasks();
	assert_eq!(container.inner_html(), "<p>startacend</p>");
}

#[test]
fn trailing_components_render_before_later_siblings() {
	let container = Node::element("div");
	let visible = Rc::new(Cell::new(false));
	let handle = Rc::new(RefCell::new(None));

	let toggle = define_component({
		let (visible, handle) = (Rc::clone(&visible), Rc::clone(&handle));
		move |this: &ComponentHandle| {
			*handle.borrow_mut() = Some(this.clone());
			let visible = Rc::clone(&visible);
			move |_: &()| if visible.get() { vec!["x", "y"].into() } else { Value::Null }
		}
	});
	render(html!("<p>", vec![toggle.call(())], "<i>after</i></p>"), &container);

	let handle = handle.borrow().clone().unwrap();
	visible.set(true);
	handle.invalidate();
	run_microtasks();
	assert_eq!(container.inner_html(), "<p>xy<i>after</i></p>");
}
