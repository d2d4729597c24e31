use proptest::prelude::*;
use rstest::rstest;

use super::Filter;
use crate::properties::PropertyMap;
use crate::value::Value;

fn reader_props() -> PropertyMap {
	PropertyMap::new()
		.with("mimetype", "image/png")
		.with("description", "Portable Network Graphics")
		.with("service.ranking", 10)
		.with("service.id", 42i64)
		.with("scale", 1.5)
		.with("lossless", true)
		.with("objectclass", vec!["org.plexus.IReader", "org.plexus.IFileReader"])
}

#[rstest]
#[case("(mimetype=image/png)", true)]
#[case("(mimetype=image/jpeg)", false)]
#[case("(missing=x)", false)]
#[case("(!(missing=x))", true)]
#[case("(mimetype=*)", true)]
#[case("(missing=*)", false)]
#[case("(service.ranking>=5)", true)]
#[case("(service.ranking>=11)", false)]
#[case("(service.ranking<=10)", true)]
#[case("(service.id=42)", true)]
#[case("(service.id=forty-two)", false)]
#[case("(scale>=1.25)", true)]
#[case("(scale<=1.25)", false)]
#[case("(lossless=TRUE)", true)]
#[case("(lossless=false)", false)]
#[case("(mimetype=image/*)", true)]
#[case("(mimetype=*/png)", true)]
#[case("(mimetype=i*a*/p*g)", true)]
#[case("(mimetype=*jpeg*)", false)]
#[case("(description~=portable network graphics)", true)]
#[case("(description~=portablenetworkgraphic)", false)]
#[case("(objectclass=org.plexus.IReader)", true)]
#[case("(objectclass=org.plexus.*Writer)", false)]
#[case("(&(service.ranking>=5)(mimetype=image/png))", true)]
#[case("(&(service.ranking>=5)(mimetype=image/gif))", false)]
#[case("(|(mimetype=image/gif)(lossless=true))", true)]
#[case("  ( & (mimetype=image/png) (lossless=true) )  ", true)]
fn evaluates_against_properties(#[case] filter: &str, #[case] expected: bool) {
	let filter = Filter::parse(filter).expect("filter should parse");
	assert_eq!(filter.matches(&reader_props()), expected, "filter {filter}");
}

#[rstest]
#[case("")]
#[case("mimetype=image/png")]
#[case("(mimetype=image/png")]
#[case("(=x)")]
#[case("(a=)")]
#[case("(a>x)")]
#[case("(&)")]
#[case("(!)")]
#[case("(a=b))")]
#[case("(a=b(c)")]
#[case("(a=b\\")]
fn rejects_malformed_filters(#[case] filter: &str) {
	let err = Filter::parse(filter).expect_err("filter should be rejected");
	assert_eq!(err.filter, filter);
}

#[test]
fn escaped_characters_are_literal() {
	let props = PropertyMap::new().with("name", "a*(b)");
	let filter = Filter::parse(r"(name=a\*\(b\))").unwrap();
	assert!(filter.matches(&props));
	assert!(!filter.matches(&PropertyMap::new().with("name", "axx(b)")));
}

#[test]
fn substring_does_not_overlap_prefix_and_suffix() {
	let props = PropertyMap::new().with("name", "ab");
	assert!(!Filter::parse("(name=ab*b)").unwrap().matches(&props));
	assert!(Filter::parse("(name=a*b)").unwrap().matches(&props));
}

#[test]
fn objects_never_match_comparisons() {
	let props = PropertyMap::new().with("handle", Value::object(1u32));
	assert!(Filter::parse("(handle=*)").unwrap().matches(&props));
	assert!(!Filter::parse("(handle=1)").unwrap().matches(&props));
}

#[test]
fn display_normalizes() {
	let filter = Filter::parse(" ( & ( a = b ) (!(c=*)) (d=x\\*y*) ) ").unwrap();
	assert_eq!(filter.to_string(), "(&(a= b )(!(c=*))(d=x\\*y*))");
}

proptest! {
	#[test]
	fn display_round_trips(key in "[a-z][a-z.]{0,8}", value in "[ -~]{1,12}") {
		let props = PropertyMap::new().with(key.clone(), value.clone());
		let mut escaped = String::new();
		for c in value.chars() {
			if matches!(c, '(' | ')' | '*' | '\\') {
				escaped.push('\\');
			}
			escaped.push(c);
		}
		let filter = Filter::parse(&format!("({key}={escaped})")).unwrap();
		prop_assert!(filter.matches(&props));
		let reparsed = Filter::parse(&filter.to_string()).unwrap();
		prop_assert_eq!(reparsed, filter);
	}

	#[test]
	fn integer_comparisons_agree_with_ord(prop in -1000i32..1000, lit in -1000i64..1000) {
		let props = PropertyMap::new().with("n", prop);
		let ge = Filter::parse(&format!("(n>={lit})")).unwrap();
		let le = Filter::parse(&format!("(n<={lit})")).unwrap();
		prop_assert_eq!(ge.matches(&props), i64::from(prop) >= lit);
		prop_assert_eq!(le.matches(&props), i64::from(prop) <= lit);
	}
}
