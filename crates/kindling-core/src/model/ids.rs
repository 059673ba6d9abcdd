/// Normalize a user or item id.
///
/// Dots are stripped because the document-style backend uses them as
/// field-path separators; an id containing `.` would silently address
/// the wrong key. Applied at every public entry point, so ids never
/// carry a `.` once inside the engine.
pub fn normalize_id(raw: &str) -> String {
    raw.chars().filter(|c| *c != '.').collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_dots() {
        assert_eq!(normalize_id("session.1234.a"), "session1234a");
    }

    #[test]
    fn leaves_clean_ids_alone() {
        assert_eq!(normalize_id("user-42_x"), "user-42_x");
    }

    #[test]
    fn empty_stays_empty() {
        assert_eq!(normalize_id(""), "");
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn normalized_ids_never_contain_dots(raw in ".*") {
                let id = normalize_id(&raw);
                prop_assert!(!id.contains('.'));
                // Idempotent: a clean id passes through unchanged.
                prop_assert_eq!(normalize_id(&id), id);
            }
        }
    }
}
