//! Property-based tests for path translation and subtree replacement

use proptest::prelude::*;
use restree::service::ResourceEntry;
use restree::tree::path::relative_components;
use restree::{ResourceTree, VirtualPath};
use std::collections::BTreeSet;
use std::path::PathBuf;

fn component() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,7}"
}

fn native(components: &[String]) -> PathBuf {
    let mut path = PathBuf::from("/");
    for c in components {
        path.push(c);
    }
    path
}

proptest! {
    #[test]
    fn relative_components_of_self_is_empty(parts in prop::collection::vec(component(), 0..6)) {
        let path = native(&parts);
        prop_assert!(relative_components(&path, &path).is_empty());
    }

    #[test]
    fn relative_components_strips_base(
        base in prop::collection::vec(component(), 0..4),
        rest in prop::collection::vec(component(), 0..4),
    ) {
        let full: Vec<String> = base.iter().chain(rest.iter()).cloned().collect();
        prop_assert_eq!(relative_components(&native(&full), &native(&base)), rest);
    }

    #[test]
    fn insert_or_replace_is_idempotent(names in prop::collection::vec(component(), 0..12)) {
        let entries: Vec<ResourceEntry> = names
            .iter()
            .map(|n| ResourceEntry::directory(VirtualPath::root().join(n)))
            .collect();
        let expected: Vec<String> = names.iter().cloned().collect::<BTreeSet<_>>().into_iter().collect();

        let mut tree = ResourceTree::default();
        tree.insert_or_replace_subtree(&VirtualPath::root(), &entries);
        let first = tree.child_names(&VirtualPath::root());
        let first_len = tree.len();
        tree.insert_or_replace_subtree(&VirtualPath::root(), &entries);

        prop_assert_eq!(&first, &expected);
        prop_assert_eq!(tree.child_names(&VirtualPath::root()), first);
        prop_assert_eq!(tree.len(), first_len);
    }

    #[test]
    fn parse_round_trips_through_display(parts in prop::collection::vec(component(), 0..6)) {
        let path = VirtualPath::from_components(parts.iter());
        prop_assert_eq!(VirtualPath::parse(&path.to_string()), path);
    }
}
