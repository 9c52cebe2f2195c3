//! Accessor-name parsing: `getFooBar` -> (`Get`, `foo_bar`).
//!
//! The verb is the longest known prefix; what follows must be non-empty and must
//! not start with a lowercase letter (`getter` is not `get` + `ter`).

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessorKind {
    Get,
    Set,
    Has,
    Is,
    Unset,
}

const PREFIXES: &[(&str, AccessorKind)] = &[
    ("unset", AccessorKind::Unset),
    ("get", AccessorKind::Get),
    ("set", AccessorKind::Set),
    ("has", AccessorKind::Has),
    ("is", AccessorKind::Is),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Accessor {
    Recognized {
        kind: AccessorKind,
        /// snake_case field name
        field: String,
        /// remainder exactly as written after the verb
        written: String,
    },
    NotRecognized,
}

impl Accessor {
    /// Field names to try, in order: snake_case, then camelCase.
    pub fn field_candidates(&self) -> Vec<String> {
        match self {
            Accessor::Recognized { field, written, .. } => {
                let camel = to_camel_case(written);
                if &camel == field { vec![camel] } else { vec![field.clone(), camel] }
            }
            Accessor::NotRecognized => Vec::new(),
        }
    }
}

pub fn parse_accessor(method: &str) -> Accessor {
    let best = PREFIXES
        .iter()
        .filter(|(prefix, _)| method.starts_with(prefix))
        .max_by_key(|(prefix, _)| prefix.len());
    let Some((prefix, kind)) = best else {
        return Accessor::NotRecognized;
    };
    let rest = &method[prefix.len()..];
    match rest.chars().next() {
        Some(first) if !first.is_lowercase() => Accessor::Recognized {
            kind: *kind,
            field: to_snake_case(rest),
            written: rest.to_string(),
        },
        _ => Accessor::NotRecognized,
    }
}

/// `FooBar` -> `foo_bar`, `HTTPCode` -> `http_code`, `Field2Name` -> `field2_name`.
/// Existing underscores are kept.
pub fn to_snake_case(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);
    for (ix, &ch) in chars.iter().enumerate() {
        if ch.is_uppercase() {
            let prev = ix.checked_sub(1).map(|p| chars[p]);
            let next = chars.get(ix + 1).copied();
            let boundary = match prev {
                None | Some('_') => false,
                Some(p) if p.is_lowercase() || p.is_ascii_digit() => true,
                Some(p) => p.is_uppercase() && next.is_some_and(char::is_lowercase),
            };
            if boundary {
                out.push('_');
            }
            out.extend(ch.to_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

/// `FooBar` -> `fooBar`; only the first character changes.
pub fn to_camel_case(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recognized(method: &str) -> (AccessorKind, String) {
        match parse_accessor(method) {
            Accessor::Recognized { kind, field, .. } => (kind, field),
            Accessor::NotRecognized => panic!("`{method}` should be recognized"),
        }
    }

    #[test]
    fn verbs_and_field_names() {
        assert_eq!(recognized("getFooBar"), (AccessorKind::Get, "foo_bar".into()));
        assert_eq!(recognized("setName"), (AccessorKind::Set, "name".into()));
        assert_eq!(recognized("hasTags"), (AccessorKind::Has, "tags".into()));
        assert_eq!(recognized("isActive"), (AccessorKind::Is, "active".into()));
        assert_eq!(recognized("unsetEmail"), (AccessorKind::Unset, "email".into()));
        assert_eq!(recognized("get_raw"), (AccessorKind::Get, "_raw".into()));
    }

    #[test]
    fn lowercase_or_empty_remainders_are_not_accessors() {
        for method in ["getter", "get", "settle", "is", "island", "unsetting", "fetchName", ""] {
            assert_eq!(parse_accessor(method), Accessor::NotRecognized, "{method}");
        }
    }

    #[test]
    fn longest_prefix_wins() {
        // `unset` must not be read as some shorter verb
        assert_eq!(recognized("unsetIsFoo"), (AccessorKind::Unset, "is_foo".into()));
        assert_eq!(recognized("isUnset"), (AccessorKind::Is, "unset".into()));
    }

    #[test]
    fn case_conversion() {
        assert_eq!(to_snake_case("HTTPCode"), "http_code");
        assert_eq!(to_snake_case("Field2Name"), "field2_name");
        assert_eq!(to_snake_case("Already_Snake"), "already_snake");
        assert_eq!(to_camel_case("FooBar"), "fooBar");
        assert_eq!(parse_accessor("getFooBar").field_candidates(), ["foo_bar", "fooBar"]);
        assert_eq!(parse_accessor("getName").field_candidates(), ["name"]);
    }
}
