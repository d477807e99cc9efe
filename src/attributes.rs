use std::borrow::Cow;

/// Property names whose attribute isn't simply the lowercase name.
const EXCEPTIONS: &[(&str, &str)] = &[("acceptCharset", "accept-charset"), ("htmlFor", "for"), ("httpEquiv", "http-equiv")];

/// Maps a DOM property name to the name of the attribute it reflects.
///
/// `aria…` properties map to `aria-…`, a few properties have irregular attribute names, and everything else is
/// lowercased.
///
/// ```
/// use tagged_dom::property_to_attribute;
///
/// assert_eq!(property_to_attribute("htmlFor"), "for");
/// assert_eq!(property_to_attribute("ariaLabel"), "aria-label");
/// assert_eq!(property_to_attribute("tabIndex"), "tabindex");
/// ```
#[must_use]
pub fn property_to_attribute(name: &str) -> Cow<'_, str> {
	if let Some(rest) = name.strip_prefix("aria") {
		return Cow::Owned(format!("aria-{}", rest.to_ascii_lowercase()));
	}
	if let Some(&(_, attribute)) = EXCEPTIONS.iter().find(|(property, _)| *property == name) {
		return Cow::Borrowed(attribute);
	}
	if name.bytes().any(|b| b.is_ascii_uppercase()) {
		Cow::Owned(name.to_ascii_lowercase())
	} else {
		Cow::Borrowed(name)
	}
}

#[cfg(test)]
mod tests {
	use super::property_to_attribute;
	use rstest::rstest;

	#[rstest]
	#[case("htmlFor", "for")]
	#[case("acceptCharset", "accept-charset")]
	#[case("httpEquiv", "http-equiv")]
	#[case("ariaLabel", "aria-label")]
	#[case("ariaDescribedBy", "aria-describedby")]
	#[case("tabIndex", "tabindex")]
	#[case("value", "value")]
	fn maps_properties_to_attributes(#[case] property: &str, #[case] attribute: &str) {
		assert_eq!(property_to_attribute(property), attribute);
	}
}
