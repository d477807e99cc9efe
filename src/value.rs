//! Dynamic values passed into templates and [`render`](`crate::render`).

use crate::{
	compiler::CompiledTemplate,
	component::Invocation,
	dom::{Event, Prop},
};
use core::fmt::{self, Debug, Formatter};
use std::rc::Rc;
use tracing::warn;

/// An event handler, as placed into an `on…` slot.
pub type Handler = Rc<dyn Fn(&Event)>;

/// Anything that can fill a template slot or be rendered into a container.
///
/// Change detection between renders is [`Value::same`]: primitives compare by value, everything reference-counted by
/// pointer. Reusing an [`Rc`] is therefore how a caller tells the engine that nothing changed.
#[derive(Clone)]
pub enum Value {
	/// Renders nothing. Also the "unset" value of attribute and property slots.
	Null,
	/// Renders nothing in content position.
	Bool(bool),
	Number(f64),
	Text(Rc<str>),
	List(Rc<[Value]>),
	Keyed(Rc<Keyed>),
	Template(Rc<Instance>),
	Component(Rc<Invocation>),
	Handler(Handler),
	Style(Rc<Style>),
}

impl Default for Value {
	fn default() -> Self {
		Value::Null
	}
}

impl Debug for Value {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		match self {
			Value::Null => f.write_str("Null"),
			Value::Bool(value) => f.debug_tuple("Bool").field(value).finish(),
			Value::Number(value) => f.debug_tuple("Number").field(value).finish(),
			#[cfg(feature = "dangerous-logging")]
			Value::Text(text) => f.debug_tuple("Text").field(text).finish(),
			#[cfg(not(feature = "dangerous-logging"))]
			Value::Text(text) => write!(f, "Text(<{} bytes>)", text.len()),
			Value::List(items) => f.debug_list().entries(items.iter()).finish(),
			Value::Keyed(keyed) => f.debug_struct("Keyed").field("key", &keyed.key).field("value", &keyed.value).finish(),
			Value::Template(instance) => f.debug_struct("Template").field("type_tag", &instance.template.type_tag).finish_non_exhaustive(),
			Value::Component(invocation) => f.debug_struct("Component").field("definition", &invocation.definition_id()).finish_non_exhaustive(),
			Value::Handler(_) => f.write_str("Handler"),
			Value::Style(style) => style.fmt(f),
		}
	}
}

impl Value {
	/// Whether a slot holding `self` can skip its update when handed `other`.
	#[must_use]
	pub fn same(&self, other: &Value) -> bool {
		match (self, other) {
			(Value::Null, Value::Null) => true,
			(Value::Bool(a), Value::Bool(b)) => a == b,
			#[allow(clippy::float_cmp)]
			(Value::Number(a), Value::Number(b)) => a == b,
			(Value::Text(a), Value::Text(b)) => a == b,
			(Value::List(a), Value::List(b)) => Rc::ptr_eq(a, b),
			(Value::Keyed(a), Value::Keyed(b)) => Rc::ptr_eq(a, b),
			(Value::Template(a), Value::Template(b)) => Rc::ptr_eq(a, b),
			(Value::Component(a), Value::Component(b)) => Rc::ptr_eq(a, b),
			(Value::Handler(a), Value::Handler(b)) => Rc::ptr_eq(a, b),
			(Value::Style(a), Value::Style(b)) => Rc::ptr_eq(a, b),
			_ => false,
		}
	}

	/// Whether this renders as nothing in content position.
	#[must_use]
	pub fn is_void(&self) -> bool {
		matches!(self, Value::Null | Value::Bool(_) | Value::Handler(_) | Value::Style(_))
	}

	/// The text this renders as, if it is a primitive that renders as a text node.
	#[must_use]
	pub fn as_text(&self) -> Option<Rc<str>> {
		match self {
			Value::Text(text) => Some(Rc::clone(text)),
			Value::Number(value) => Some(format_number(*value).into()),
			_ => None,
		}
	}

	/// Converts this into a DOM property value.
	///
	/// Only primitives are meaningful here. Anything else is logged and treated as [`Prop::Null`].
	pub(crate) fn to_prop(&self) -> Prop {
		match self {
			Value::Null => Prop::Null,
			Value::Bool(value) => Prop::Bool(*value),
			Value::Number(value) => Prop::Number(*value),
			Value::Text(text) => Prop::Text(Rc::clone(text)),
			other => {
				warn!("Unsupported value for a property or attribute slot, treating it as `Null`: {:?}", other);
				Prop::Null
			}
		}
	}
}

/// Formats a number the way script stringifies it.
pub(crate) fn format_number(value: f64) -> String {
	if value.is_infinite() {
		if value > 0.0 { "Infinity" } else { "-Infinity" }.to_owned()
	} else if value == 0.0 {
		"0".to_owned()
	} else if value.is_nan() {
		"NaN".to_owned()
	} else {
		// Shortest round-trip digits, laid out by the exponent like `Number.prototype.toString`.
		let scientific = format!("{:e}", value.abs());
		let (mantissa, exponent) = scientific.split_once('e').expect("tagged-dom bug: `{:e}` without exponent.");
		let digits = mantissa.replace('.', "");
		let exponent: i32 = exponent.parse().expect("tagged-dom bug: Malformed `{:e}` exponent.");
		#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
		let (k, n) = (digits.len() as i32, exponent + 1);

		let sign = if value < 0.0 { "-" } else { "" };
		let n_usize = n.unsigned_abs() as usize;
		if k <= n && n <= 21 {
			format!("{}{}{}", sign, digits, "0".repeat(n_usize - digits.len()))
		} else if 0 < n && n <= 21 {
			format!("{}{}.{}", sign, &digits[..n_usize], &digits[n_usize..])
		} else if -6 < n && n <= 0 {
			format!("{}0.{}{}", sign, "0".repeat(n_usize), digits)
		} else {
			let (head, tail) = digits.split_at(1);
			let point = if tail.is_empty() { "" } else { "." };
			format!("{}{}{}{}e{}{}", sign, head, point, tail, if n > 0 { "+" } else { "-" }, (n - 1).unsigned_abs())
		}
	}
}

/// An explicit reconciliation key.
///
/// [`Key::Index`] is assigned to list items that carry no explicit key, and never equals an explicit key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
	Int(i64),
	Str(Rc<str>),
	Index(usize),
}

impl From<i64> for Key {
	fn from(key: i64) -> Self {
		Key::Int(key)
	}
}

impl From<i32> for Key {
	fn from(key: i32) -> Self {
		Key::Int(key.into())
	}
}

impl From<u32> for Key {
	fn from(key: u32) -> Self {
		Key::Int(key.into())
	}
}

impl From<&str> for Key {
	fn from(key: &str) -> Self {
		Key::Str(key.into())
	}
}

impl From<String> for Key {
	fn from(key: String) -> Self {
		Key::Str(key.into())
	}
}

impl From<Rc<str>> for Key {
	fn from(key: Rc<str>) -> Self {
		Key::Str(key)
	}
}

#[derive(Debug)]
pub struct Keyed {
	pub key: Key,
	pub value: Value,
}

/// Attaches a reconciliation key to `value`.
///
/// Inside a list, items with equal keys are matched across renders. Elsewhere the key is ignored.
pub fn with_key(key: impl Into<Key>, value: impl Into<Value>) -> Value {
	Value::Keyed(Rc::new(Keyed {
		key: key.into(),
		value: value.into(),
	}))
}

/// One instantiation of a compiled template: its shape and the dynamic values for this call.
pub struct Instance {
	pub(crate) template: Rc<CompiledTemplate>,
	pub(crate) args: Rc<[Value]>,
}

impl Debug for Instance {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("Instance").field("type_tag", &self.template.type_tag).field("args", &self.args).finish()
	}
}

impl Instance {
	/// The dynamic values of this instantiation, in call order.
	#[must_use]
	pub fn args(&self) -> &[Value] {
		&self.args
	}

	/// Whether both were instantiated from the same compiled template, which is what allows updating one into the
	/// other in place.
	#[must_use]
	pub fn shares_template(&self, other: &Instance) -> bool {
		Rc::ptr_eq(&self.template, &other.template)
	}
}

/// Inline style declarations, in order.
///
/// A declaration with a [`None`] value is removed when the slot is updated.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Style {
	declarations: Vec<(Rc<str>, Option<Rc<str>>)>,
}

impl Style {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// Sets `name` to `value`, replacing an earlier declaration of the same name.
	#[must_use]
	pub fn with(mut self, name: &str, value: impl Into<Rc<str>>) -> Self {
		self.declare(name, Some(value.into()));
		self
	}

	/// Declares `name` as unset.
	#[must_use]
	pub fn unset(mut self, name: &str) -> Self {
		self.declare(name, None);
		self
	}

	fn declare(&mut self, name: &str, value: Option<Rc<str>>) {
		match self.declarations.iter_mut().find(|(n, _)| &**n == name) {
			Some((_, v)) => *v = value,
			None => self.declarations.push((name.into(), value)),
		}
	}

	/// `None` if `name` isn't declared, `Some(None)` if it is declared as unset.
	#[must_use]
	pub fn get(&self, name: &str) -> Option<Option<&str>> {
		self.declarations.iter().find(|(n, _)| &**n == name).map(|(_, v)| v.as_deref())
	}

	pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
		self.declarations.iter().map(|(n, v)| (&**n, v.as_deref()))
	}
}

impl From<()> for Value {
	fn from((): ()) -> Self {
		Value::Null
	}
}

impl From<bool> for Value {
	fn from(value: bool) -> Self {
		Value::Bool(value)
	}
}

impl From<f64> for Value {
	fn from(value: f64) -> Self {
		Value::Number(value)
	}
}

impl From<f32> for Value {
	fn from(value: f32) -> Self {
		Value::Number(value.into())
	}
}

impl From<i32> for Value {
	fn from(value: i32) -> Self {
		Value::Number(value.into())
	}
}

impl From<u32> for Value {
	fn from(value: u32) -> Self {
		Value::Number(value.into())
	}
}

impl From<i64> for Value {
	#[allow(clippy::cast_precision_loss)]
	fn from(value: i64) -> Self {
		Value::Number(value as f64)
	}
}

impl From<usize> for Value {
	#[allow(clippy::cast_precision_loss)]
	fn from(value: usize) -> Self {
		Value::Number(value as f64)
	}
}

impl From<&str> for Value {
	fn from(value: &str) -> Self {
		Value::Text(value.into())
	}
}

impl From<String> for Value {
	fn from(value: String) -> Self {
		Value::Text(value.into())
	}
}

impl From<&String> for Value {
	fn from(value: &String) -> Self {
		Value::Text(value.as_str().into())
	}
}

impl From<Rc<str>> for Value {
	fn from(value: Rc<str>) -> Self {
		Value::Text(value)
	}
}

impl From<Rc<[Value]>> for Value {
	fn from(items: Rc<[Value]>) -> Self {
		Value::List(items)
	}
}

impl<T: Into<Value>> From<Vec<T>> for Value {
	fn from(items: Vec<T>) -> Self {
		Value::List(items.into_iter().map(Into::into).collect())
	}
}

impl<T: Into<Value>> From<Option<T>> for Value {
	fn from(value: Option<T>) -> Self {
		value.map_or(Value::Null, Into::into)
	}
}

impl From<Style> for Value {
	fn from(style: Style) -> Self {
		Value::Style(Rc::new(style))
	}
}

impl From<Rc<Style>> for Value {
	fn from(style: Rc<Style>) -> Self {
		Value::Style(style)
	}
}

impl From<Handler> for Value {
	fn from(handler: Handler) -> Self {
		Value::Handler(handler)
	}
}

impl From<Rc<Instance>> for Value {
	fn from(instance: Rc<Instance>) -> Self {
		Value::Template(instance)
	}
}

impl From<Rc<Invocation>> for Value {
	fn from(invocation: Rc<Invocation>) -> Self {
		Value::Component(invocation)
	}
}

/// Wraps `handler` for an `on…` slot.
pub fn handler(handler: impl Fn(&Event) + 'static) -> Value {
	Value::Handler(Rc::new(handler))
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[test]
	fn primitives_compare_by_value() {
		assert!(Value::from("a").same(&Value::from(String::from("a"))));
		assert!(Value::from(1).same(&Value::from(1.0)));
		assert!(!Value::from(true).same(&Value::from(1)));
		assert!(Value::Null.same(&Value::from(())));
	}

	#[test]
	fn shared_values_compare_by_pointer() {
		let style = Rc::new(Style::new().with("color", "red"));
		assert!(Value::from(Rc::clone(&style)).same(&Value::from(Rc::clone(&style))));
		assert!(!Value::from(Style::new()).same(&Value::from(Style::new())));

		let handler: Handler = Rc::new(|_| ());
		assert!(Value::from(Rc::clone(&handler)).same(&Value::from(handler)));
	}

	#[test]
	fn numbers_format_like_script() {
		assert_eq!(format_number(1.0), "1");
		assert_eq!(format_number(-0.0), "0");
		assert_eq!(format_number(2.5), "2.5");
		assert_eq!(format_number(f64::INFINITY), "Infinity");
		assert_eq!(format_number(f64::NAN), "NaN");
	}

	#[rstest]
	#[case(123.0, "123")]
	#[case(1e20, "100000000000000000000")]
	#[case(1e21, "1e+21")]
	#[case(-1.5e22, "-1.5e+22")]
	#[case(0.000_001, "0.000001")]
	#[case(1e-7, "1e-7")]
	#[case(-2.5e-8, "-2.5e-8")]
	#[case(0.1, "0.1")]
	fn exponents_switch_like_script(#[case] value: f64, #[case] expected: &str) {
		assert_eq!(format_number(value), expected);
	}

	#[test]
	fn style_declarations_keep_order_and_replace() {
		let style = Style::new().with("a", "1").with("b", "2").unset("a");
		assert_eq!(style.iter().collect::<Vec<_>>(), [("a", None), ("b", Some("2"))]);
		assert_eq!(style.get("c"), None);
	}
}
