#![cfg(not(target_arch = "wasm32"))]

use rstest::rstest;
use tagged_dom::{html, try_instantiate, CompileError, TemplateSite, Value};

fn instance(value: &Value) -> &tagged_dom::Instance {
	match value {
		Value::Template(instance) => &**instance,
		other => panic!("expected a template instance, got {:?}", other),
	}
}

#[test]
fn one_site_compiles_once() {
	let make = |text: &str| html!("<p>", text, "</p>");
	let (a, b) = (make("a"), make("b"));
	assert!(instance(&a).shares_template(instance(&b)));
	assert_eq!(instance(&b).args().len(), 1);
}

#[test]
fn identical_text_at_distinct_sites_is_distinct() {
	let a = html!("<p>", "x", "</p>");
	let b = html!("<p>", "x", "</p>");
	assert!(!instance(&a).shares_template(instance(&b)));
}

#[test]
fn bare_insertions_pass_their_value_through() {
	let value = html!("", 5, "");
	assert!(value.same(&Value::from(5)));
}

#[test]
fn fragments_become_lists() {
	match html!("<dt>", "a", "</dt><dd>", "b", "</dd>") {
		Value::List(items) => {
			assert_eq!(items.len(), 2);
			assert!(items.iter().all(|item| matches!(item, Value::Template(_))));
		}
		other => panic!("expected a list, got {:?}", other),
	}
}

static TWO_SLOTS: TemplateSite = TemplateSite::new(&["<a href=", ">", "</a>"]);

#[rstest]
#[case(0)]
#[case(1)]
#[case(3)]
fn argument_count_is_checked(#[case] found: usize) {
	let args = (0..found).map(|_| Value::Null).collect();
	match try_instantiate(&TWO_SLOTS, args) {
		Err(CompileError::ArgumentCount { expected: 2, found: actual }) => assert_eq!(actual, found),
		other => panic!("expected an argument count error, got {:?}", other),
	}
}

#[test]
fn matching_argument_count_instantiates() {
	let value = try_instantiate(&TWO_SLOTS, vec!["/".into(), "home".into()]).unwrap();
	assert_eq!(instance(&value).args().len(), 2);
}

#[test]
#[should_panic(expected = "Failed to instantiate template")]
fn instantiate_panics_on_errors() {
	static ONE_SLOT: TemplateSite = TemplateSite::new(&["<i>", "</i>"]);
	let _ = tagged_dom::instantiate(&ONE_SLOT, Vec::new());
}
