#![cfg(target_arch = "wasm32")]

use js_sys::Promise;
use std::{cell::Cell, rc::Rc};
use tagged_dom::{define_component, dom::Node, handler, html, render, unmount, with_key, ComponentHandle, Value};
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use wasm_bindgen_test::{wasm_bindgen_test, wasm_bindgen_test_configure};
use web_sys::{window, Element, HtmlElement};

wasm_bindgen_test_configure!(run_in_browser);

thread_local! {
	static LOG_INITIALIZED: Cell<bool> = Cell::new(false);
}

fn init_logging() {
	if !LOG_INITIALIZED.with(|initialized| initialized.replace(true)) {
		tracing_wasm::set_as_global_default();
	}
}

/// A fresh `<div>` attached to the document body, so that events propagate as they would in a page.
fn container() -> Element {
	let document = window().unwrap().document().unwrap();
	let element = document.create_element("div").unwrap();
	document.body().unwrap().append_child(&element).unwrap();
	element
}

async fn settle() {
	JsFuture::from(Promise::resolve(&JsValue::NULL)).await.unwrap();
}

#[wasm_bindgen_test]
fn renders_and_updates() {
	init_logging();
	let element = container();
	let node = Node::from(element.clone());
	let view = |class: &str, items: &[u32]| {
		let items: Vec<Value> = items.iter().map(|item| with_key(*item, html!("<li>", *item, "</li>"))).collect();
		html!("<ul class=", class, ">", items, "</ul>")
	};

	render(view("a", &[1, 2, 3]), &node);
	assert_eq!(element.inner_html(), r#"<ul class="a"><li>1</li><li>2</li><li>3</li></ul>"#);
	let first = element.query_selector("li").unwrap().unwrap();

	render(view("b", &[3, 1, 2]), &node);
	assert_eq!(element.inner_html(), r#"<ul class="b"><li>3</li><li>1</li><li>2</li></ul>"#);
	assert!(element.query_selector_all("li").unwrap().get(1).unwrap().is_same_node(Some(&first)));

	assert!(unmount(&node));
	assert_eq!(element.inner_html(), "");
	element.remove();
}

#[wasm_bindgen_test]
fn click_is_delegated() {
	init_logging();
	let element = container();
	let clicks = Rc::new(Cell::new(0));
	let on_click = {
		let clicks = Rc::clone(&clicks);
		handler(move |_| clicks.set(clicks.get() + 1))
	};
	render(html!("<p><button id=\"web-click\" onclick=", on_click, ">x</button></p>"), &Node::from(element.clone()));

	let button: HtmlElement = window().unwrap().document().unwrap().get_element_by_id("web-click").unwrap().dyn_into().unwrap();
	button.click();
	assert_eq!(clicks.get(), 1);

	unmount(&Node::from(element.clone()));
	button.click();
	assert_eq!(clicks.get(), 1);
	element.remove();
}

#[wasm_bindgen_test]
async fn invalidation_rerenders_in_a_microtask() {
	init_logging();
	let element = container();
	let count = Rc::new(Cell::new(0));
	let handle = Rc::new(Cell::new(None::<ComponentHandle>));

	let counter = define_component({
		let (count, handle) = (Rc::clone(&count), Rc::clone(&handle));
		move |this: &ComponentHandle| {
			handle.set(Some(this.clone()));
			let count = Rc::clone(&count);
			move |_: &()| html!("<output>", count.get(), "</output>")
		}
	});
	render(counter.call(()), &Node::from(element.clone()));
	assert_eq!(element.inner_html(), "<output>0</output>");

	count.set(2);
	let this = handle.take().unwrap();
	this.invalidate();
	this.invalidate();
	assert_eq!(element.inner_html(), "<output>0</output>");

	settle().await;
	assert_eq!(element.inner_html(), "<output>2</output>");
	element.remove();
}
