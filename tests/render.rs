#![cfg(not(target_arch = "wasm32"))]

use std::{cell::RefCell, rc::Rc};
use tagged_dom::{
	create_context, define_component,
	dom::{
		mem::{record_mutations, Mutation},
		Node, Prop,
	},
	html, provide_context, read_context, register_unmount_hook, render, unmount, with_key, Component, ComponentHandle, Style, Value,
};

fn container() -> Node {
	Node::element("div")
}

#[test]
fn first_render_replaces_existing_content() {
	let container = container();
	container.append_child(&Node::text("stale"));

	render(html!("<p>fresh</p>"), &container);
	assert_eq!(container.inner_html(), "<p>fresh</p>");
}

#[test]
fn text_content_updates_in_place() {
	let container = container();
	let view = |name: &str| html!("<p>Hello, ", name, "!</p>");

	render(view("world"), &container);
	let text = container.first_child().and_then(|p| p.child_nodes().get(1).cloned()).unwrap();

	let log = record_mutations();
	render(view("there"), &container);
	assert_eq!(container.inner_html(), "<p>Hello, there!</p>");
	assert_eq!(log.take(), [Mutation::Data { node: text }]);
}

#[test]
fn unchanged_arguments_cause_no_writes() {
	let container = container();
	let view = |class: &str, count: i32| html!("<p class=", class, ">", count, "</p>");

	render(view("a", 1), &container);
	let log = record_mutations();
	render(view("a", 1), &container);
	assert!(log.take().is_empty());
}

#[test]
fn content_transitions_between_kinds() {
	let container = container();
	let view = |content: Value| html!("<section>", content, "</section>");

	render(view("text".into()), &container);
	assert_eq!(container.inner_html(), "<section>text</section>");

	render(view(html!("<b>bold</b>")), &container);
	assert_eq!(container.inner_html(), "<section><b>bold</b></section>");

	render(view(vec!["a", "b", "c"].into()), &container);
	assert_eq!(container.inner_html(), "<section>abc</section>");

	render(view(Value::Null), &container);
	assert_eq!(container.inner_html(), "<section></section>");

	render(view(42.into()), &container);
	assert_eq!(container.inner_html(), "<section>42</section>");

	render(view(false.into()), &container);
	assert_eq!(container.inner_html(), "<section></section>");
}

#[test]
fn neighbouring_slots_keep_their_order() {
	let container = container();
	let view = |a: Value, b: Value| html!("<p>", a, "", b, "<i>end</i></p>");

	render(view(Value::Null, "b".into()), &container);
	assert_eq!(container.inner_html(), "<p>b<i>end</i></p>");

	render(view(vec!["a1", "a2"].into(), "b".into()), &container);
	assert_eq!(container.inner_html(), "<p>a1a2b<i>end</i></p>");

	render(view("a".into(), Value::Null), &container);
	assert_eq!(container.inner_html(), "<p>a<i>end</i></p>");

	render(view(html!("<u>x</u>"), html!("<s>y</s>")), &container);
	assert_eq!(container.inner_html(), "<p><u>x</u><s>y</s><i>end</i></p>");
}

#[test]
fn template_switch_replaces_subtree() {
	let container = container();
	render(html!("<p>one</p>"), &container);
	let first = container.first_child().unwrap();

	render(html!("<p>two</p>"), &container);
	let second = container.first_child().unwrap();
	assert_ne!(first, second);
	assert_eq!(container.inner_html(), "<p>two</p>");
}

#[test]
fn fragment_templates_render_all_roots() {
	let container = container();
	let view = |middle: &str| html!("<dt>term</dt>", middle, "<dd>definition</dd>");

	render(view("-"), &container);
	assert_eq!(container.inner_html(), "<dt>term</dt>-<dd>definition</dd>");
	render(view("+"), &container);
	assert_eq!(container.inner_html(), "<dt>term</dt>+<dd>definition</dd>");
}

#[test]
fn class_and_attributes() {
	let container = container();
	let view = |class: Value, label: Value| html!("<p class=", class, " data-label=", label, "></p>");

	render(view("note".into(), "first".into()), &container);
	let p = container.first_child().unwrap();
	assert_eq!(p.attribute("class").as_deref(), Some("note"));
	assert_eq!(p.attribute("data-label").as_deref(), Some("first"));

	render(view(Value::Null, 2.into()), &container);
	assert_eq!(p.attribute("class"), None);
	assert_eq!(p.attribute("data-label").as_deref(), Some("2"));

	render(view("again".into(), Value::Null), &container);
	assert_eq!(p.attribute("class").as_deref(), Some("again"));
	assert_eq!(p.attribute("data-label"), None);
}

#[test]
fn properties_are_set_as_properties() {
	let container = container();
	let view = |value: &str, disabled: bool| html!("<input value=", value, " disabled=", disabled, " />");

	render(view("typed", true), &container);
	let input = container.first_child().unwrap();
	assert_eq!(input.property("value"), Some(Prop::Text("typed".into())));
	assert_eq!(input.attribute("value"), None);
	assert_eq!(input.attribute("disabled").as_deref(), Some(""));

	render(view("typed", false), &container);
	assert_eq!(input.attribute("disabled"), None);
}

#[test]
fn style_objects_are_diffed() {
	let container = container();
	let view = |style: Style| html!("<p style=", style, "></p>");

	render(view(Style::new().with("color", "red").with("margin", "0")), &container);
	let p = container.first_child().unwrap();
	assert_eq!(p.style_property("color").as_deref(), Some("red"));
	assert_eq!(p.style_property("margin").as_deref(), Some("0"));

	let log = record_mutations();
	render(view(Style::new().with("color", "blue").with("margin", "0")), &container);
	assert_eq!(
		log.take(),
		[Mutation::Style {
			node: p.clone(),
			name: "color".to_owned(),
		}]
	);

	render(view(Style::new().with("margin", "0")), &container);
	assert_eq!(p.style_property("color"), None);
	assert_eq!(p.style_property("margin").as_deref(), Some("0"));
}

#[test]
fn inner_html_slot() {
	let container = container();
	let view = |markup: &str| html!("<div innerHTML=", markup, "></div>");
	render(view("<b>raw</b>"), &container);
	assert_eq!(container.inner_html(), "<div><b>raw</b></div>");

	render(view("<p>one<p>two"), &container);
	assert_eq!(container.inner_html(), "<div><p>one</p><p>two</p></div>");
	render(view("<span/>text"), &container);
	assert_eq!(container.inner_html(), "<div><span>text</span></div>");
	render(view("<textarea><b></textarea>"), &container);
	assert_eq!(container.inner_html(), "<div><textarea>&lt;b&gt;</textarea></div>");
}

#[test]
fn keyed_values_unwrap_outside_lists() {
	let container = container();
	render(html!("<p>", with_key(1, "one"), "</p>"), &container);
	assert_eq!(container.inner_html(), "<p>one</p>");
}

#[test]
fn unmount_hooks_fire_once_each() {
	let container = container();
	let fired = Rc::new(RefCell::new(Vec::new()));

	let item = define_component({
		let fired = Rc::clone(&fired);
		move |handle: &ComponentHandle| {
			let fired = Rc::clone(&fired);
			let mut name = None;
			let handle = handle.clone();
			move |id: &usize| {
				if name.is_none() {
					let fired = Rc::clone(&fired);
					let id = *id;
					register_unmount_hook(&handle, move || fired.borrow_mut().push(id));
					name = Some(id);
				}
				html!("<li>", *id, "</li>")
			}
		}
	});

	let view = || {
		let items: Vec<Value> = (0..5_usize).map(|id| item.call(id)).collect();
		html!("<ul>", items, "</ul>")
	};
	render(view(), &container);
	assert_eq!(container.inner_html(), "<ul><li>0</li><li>1</li><li>2</li><li>3</li><li>4</li></ul>");

	render(view(), &container);
	assert!(fired.borrow().is_empty());

	assert!(unmount(&container));
	assert_eq!(*fired.borrow(), [0, 1, 2, 3, 4]);
	assert_eq!(container.inner_html(), "");
	assert!(!unmount(&container));
	assert_eq!(fired.borrow().len(), 5);
}

#[test]
fn nested_components_unmount_outside_in() {
	let container = container();
	let fired = Rc::new(RefCell::new(Vec::new()));

	let mut inner: Option<Component<()>> = None;
	for depth in (0..5_usize).rev() {
		let child = inner.take();
		let fired = Rc::clone(&fired);
		inner = Some(define_component(move |handle: &ComponentHandle| {
			let fired = Rc::clone(&fired);
			handle.on_unmount(move || fired.borrow_mut().push(depth));
			let child = child.clone();
			move |_: &()| {
				let content = child.as_ref().map_or(Value::Null, |child| child.call(()));
				html!("<div>", content, "</div>")
			}
		}));
	}
	let outer = inner.expect("five components");

	render(outer.call(()), &container);
	assert_eq!(container.inner_html(), "<div><div><div><div><div></div></div></div></div></div>");
	assert!(fired.borrow().is_empty());

	assert!(unmount(&container));
	assert_eq!(*fired.borrow(), [0, 1, 2, 3, 4]);
	assert_eq!(container.inner_html(), "");
}

#[test]
fn replaced_components_unmount() {
	let container = container();
	let unmounted = Rc::new(RefCell::new(0));

	let counted = define_component({
		let unmounted = Rc::clone(&unmounted);
		move |handle: &ComponentHandle| {
			let unmounted = Rc::clone(&unmounted);
			handle.on_unmount(move || *unmounted.borrow_mut() += 1);
			|_: &()| html!("<span>counted</span>")
		}
	});

	let view = |content: Value| html!("<p>", content, "</p>");
	render(view(counted.call(())), &container);
	render(view(counted.call(())), &container);
	assert_eq!(*unmounted.borrow(), 0);

	render(view("text".into()), &container);
	assert_eq!(*unmounted.borrow(), 1);
	assert_eq!(container.inner_html(), "<p>text</p>");
}

#[test]
fn context_is_read_from_the_nearest_provider() {
	let container = container();
	let theme = create_context("light");

	let leaf = define_component({
		let theme = theme.clone();
		move |handle: &ComponentHandle| {
			let (handle, theme) = (handle.clone(), theme.clone());
			move |_: &()| html!("<i>", *read_context(&handle, &theme), "</i>")
		}
	});
	let provider = define_component({
		let (theme, leaf) = (theme.clone(), leaf.clone());
		move |handle: &ComponentHandle| {
			provide_context(handle, &theme, "dark");
			let leaf = leaf.clone();
			move |_: &()| html!("<b>", leaf.call(()), "</b>")
		}
	});

	render(html!("<p>", leaf.call(()), "", provider.call(()), "</p>"), &container);
	assert_eq!(container.inner_html(), "<p><i>light</i><b><i>dark</i></b></p>");
}

#[test]
fn zero_sized_props_never_rerender() {
	let container = container();
	let renders = Rc::new(RefCell::new(0));

	let component = define_component({
		let renders = Rc::clone(&renders);
		move |_: &ComponentHandle| {
			let renders = Rc::clone(&renders);
			move |_: &()| {
				*renders.borrow_mut() += 1;
				html!("<hr />")
			}
		}
	});

	let view = || html!("<p>", component.call(()), "</p>");
	render(view(), &container);
	let hr = container.first_child().and_then(|p| p.first_child()).unwrap();
	render(view(), &container);
	assert_eq!(*renders.borrow(), 1);
	assert_eq!(container.first_child().and_then(|p| p.first_child()).unwrap(), hr);
}

#[test]
fn shared_props_skip_rerender() {
	let container = container();
	let renders = Rc::new(RefCell::new(0));

	let component = define_component({
		let renders = Rc::clone(&renders);
		move |_: &ComponentHandle| {
			let renders = Rc::clone(&renders);
			move |text: &String| {
				*renders.borrow_mut() += 1;
				html!("<em>", text, "</em>")
			}
		}
	});

	let view = |content: Value| html!("<p>", content, "</p>");
	let props = Rc::new("same".to_owned());
	render(view(component.call_shared(Rc::clone(&props))), &container);
	render(view(component.call_shared(Rc::clone(&props))), &container);
	assert_eq!(*renders.borrow(), 1);

	render(view(component.call("other".to_owned())), &container);
	assert_eq!(*renders.borrow(), 2);
	assert_eq!(container.inner_html(), "<p><em>other</em></p>");
}

#[test]
fn containers_are_independent() {
	let (a, b) = (container(), container());
	render(html!("<p>", "a", "</p>"), &a);
	render(html!("<p>", "b", "</p>"), &b);
	render(html!("<p>", "a2", "</p>"), &a);
	assert_eq!(a.inner_html(), "<p>a2</p>");
	assert_eq!(b.inner_html(), "<p>b</p>");
}
