use super::*;
use crate::test_utils::enable_logger;
use crate::test_utils::item;
use crate::test_utils::item_key;

fn identity() -> CacheIdentity {
    CacheIdentity::new("health.service", "web")
}

#[test]
fn test_duplicate_keys_keep_first_occurrence() {
    enable_logger();
    let values = vec![item("a", 1), item("a", 2), item("a", 3)];

    let conversion = convert(&identity(), values, item_key);

    assert_eq!(conversion.snapshot.len(), 1);
    assert_eq!(conversion.snapshot["a"].value, 1);
    assert_eq!(conversion.duplicates, 2);
}

#[test]
fn test_missing_keys_are_dropped() {
    enable_logger();
    let values = vec![item("a", 1), item("", 2), item("b", 3)];

    let conversion = convert(&identity(), values, |i: &crate::test_utils::Item| {
        (!i.name.is_empty()).then(|| i.name.clone())
    });

    assert_eq!(conversion.snapshot.len(), 2);
    assert_eq!(conversion.dropped, 1);
    assert!(conversion.snapshot.contains_key("a"));
    assert!(conversion.snapshot.contains_key("b"));
}

#[test]
fn test_snapshots_compare_by_value() {
    let first = convert_to_snapshot(&identity(), vec![item("a", 1), item("b", 2)], item_key);
    let second = convert_to_snapshot(&identity(), vec![item("b", 2), item("a", 1)], item_key);
    let changed = convert_to_snapshot(&identity(), vec![item("a", 1), item("b", 5)], item_key);

    assert_eq!(first, second);
    assert_ne!(first, changed);
}

#[test]
fn test_empty_input_gives_empty_snapshot() {
    let snapshot: Snapshot<String, crate::test_utils::Item> =
        convert_to_snapshot(&identity(), Vec::new(), item_key);

    assert!(snapshot.is_empty());
    assert_eq!(snapshot, Snapshot::default());
}

#[test]
fn test_collect_into_snapshot() {
    let snapshot: Snapshot<&str, u32> = [("a", 1), ("b", 2)].into_iter().collect();

    assert_eq!(snapshot.len(), 2);
    assert_eq!(snapshot.into_map().get("b"), Some(&2));
}
