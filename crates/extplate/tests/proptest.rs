//! Property-based tests for interpolation order and identity.

use extplate::{ext_json, ext_json_list, parse_document, Arg, Bson, Template};
use proptest::prelude::*;

fn keys_strategy() -> impl Strategy<Value = Vec<String>> {
    prop::collection::hash_set("[a-z][a-z0-9_]{0,8}", 1..8)
        .prop_map(|keys| keys.into_iter().collect())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Values land in the slots they were written next to, in order.
    #[test]
    fn values_land_in_source_order(values in prop::collection::vec(any::<i64>(), 1..16)) {
        let mut builder = Template::builder().text("{ items: [");
        for (i, value) in values.iter().enumerate() {
            if i > 0 {
                builder = builder.text(", ");
            }
            builder = builder.value(*value);
        }
        let result = ext_json(&builder.text("] }").build()).unwrap();

        let expected: Vec<Bson> = values.iter().copied().map(Bson::Int64).collect();
        prop_assert_eq!(result.get_array("items").unwrap(), &expected);
    }

    /// Key placeholders keep their positions among literal keys.
    #[test]
    fn keys_land_in_source_order(keys in keys_strategy()) {
        let mut builder = Template::builder().text("{ ");
        for (i, key) in keys.iter().enumerate() {
            if i > 0 {
                builder = builder.text(", ");
            }
            builder = builder.value(key.clone()).text(": ").value(i as i32);
        }
        let result = ext_json(&builder.text(" }").build()).unwrap();

        let got: Vec<&str> = result.keys().map(String::as_str).collect();
        let want: Vec<&str> = keys.iter().map(String::as_str).collect();
        prop_assert_eq!(got, want);
        for (i, key) in keys.iter().enumerate() {
            prop_assert_eq!(result.get_i32(key).unwrap(), i as i32);
        }
    }

    /// A template with no placeholders is just a parse.
    #[test]
    fn literal_template_matches_parse(
        entries in prop::collection::vec(("k[a-z]{0,5}", any::<i32>(), "[a-zA-Z0-9 ,:{}]{0,12}"), 0..6)
    ) {
        let body: Vec<String> = entries
            .iter()
            .map(|(k, n, s)| format!("{k}: {{ n: {n}, s: '{s}' }}"))
            .collect();
        let text = format!("{{ {} }}", body.join(", "));

        prop_assert_eq!(
            ext_json(&Template::literal(text.clone())).unwrap(),
            parse_document(&text).unwrap()
        );
    }

    /// List mode returns one document per element, in order.
    #[test]
    fn list_mode_preserves_element_order(names in prop::collection::vec("[a-zA-Z ]{0,10}", 0..10)) {
        let mut fragments = vec!["[".to_string()];
        let mut args = Vec::new();
        for (i, name) in names.iter().enumerate() {
            let last = fragments.last_mut().unwrap();
            if i > 0 {
                last.push_str(", ");
            }
            last.push_str("{ name: ");
            args.push(Arg::new(name.clone()));
            fragments.push(" }".to_string());
        }
        if let Some(last) = fragments.last_mut() {
            last.push(']');
        }

        let docs = ext_json_list(&Template::new(fragments, args).unwrap()).unwrap();
        prop_assert_eq!(docs.len(), names.len());
        for (doc, name) in docs.iter().zip(&names) {
            prop_assert_eq!(doc.get_str("name").unwrap(), name.as_str());
        }
    }

    /// Optional values become null or the encoded value.
    #[test]
    fn optional_values(value in prop::option::of(any::<bool>())) {
        let template = Template::builder().text("{ flag: ").arg(Arg::from_option(value)).text(" }").build();
        let result = ext_json(&template).unwrap();
        let expected = value.map_or(Bson::Null, Bson::Boolean);
        prop_assert_eq!(result.get("flag"), Some(&expected));
    }

    /// An `Option` passed directly renders the same as `Arg::from_option`.
    #[test]
    fn options_pass_straight_through(value in prop::option::of(any::<i64>())) {
        let result = ext_json(&Template::builder().text("{ n: ").value(value).text(" }").build()).unwrap();
        let expected = value.map_or(Bson::Null, Bson::Int64);
        prop_assert_eq!(result.get("n"), Some(&expected));
    }
}
