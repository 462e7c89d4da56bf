use kivi::Sds;

/// Строка ровно `INLINE_CAP` байт.
fn inline_max() -> String {
    "x".repeat(Sds::INLINE_CAP)
}

/// Строка `INLINE_CAP + 1` байт — минимальная heap-строка.
fn heap_min() -> String {
    "x".repeat(Sds::INLINE_CAP + 1)
}

#[test]
fn empty_string_is_inline() {
    let s = Sds::from_str("");
    assert!(s.is_inline());
    assert_eq!(s.len(), 0);
}

#[test]
fn exactly_inline_cap_is_inline() {
    let s = Sds::from_str(&inline_max());
    assert!(s.is_inline());
    assert_eq!(s.len(), Sds::INLINE_CAP);
}

#[test]
fn one_over_inline_cap_is_heap() {
    let s = Sds::from_str(&heap_min());
    assert!(!s.is_inline());
    assert_eq!(s.len(), Sds::INLINE_CAP + 1);
}

#[test]
fn append_across_the_boundary() {
    let mut s = Sds::from_str(&inline_max());
    assert!(s.is_inline());
    s.append(b"y");
    assert!(!s.is_inline());
    assert_eq!(s.len(), Sds::INLINE_CAP + 1);
    assert!(s.as_slice().ends_with(b"y"));
}

#[test]
fn truncate_and_range_return_to_inline() {
    let mut s = Sds::from_str(&"abc".repeat(50));
    assert!(!s.is_inline());
    s.truncate(6);
    assert!(s.is_inline());
    assert_eq!(s.as_str().unwrap(), "abcabc");

    let mut s = Sds::from_vec(vec![b'z'; 100]);
    s.range(10, 14);
    assert!(s.is_inline());
    assert_eq!(s.len(), 5);
}

#[test]
fn range_supports_negative_indices() {
    let mut s = Sds::from_str("0123456789");
    s.range(-4, -2);
    assert_eq!(s.as_str().unwrap(), "678");
}

#[test]
fn trim_strips_character_set() {
    let mut s = Sds::from_str("--==hello==--");
    s.trim(b"-=");
    assert_eq!(s.as_str().unwrap(), "hello");
}

#[test]
fn split_and_join_roundtrip() {
    let s = Sds::from_str("one two three");
    let words = s.split_on(b" ");
    assert_eq!(words.len(), 3);
    assert_eq!(words[0].as_str().unwrap(), "one");
    assert_eq!(words[2].as_str().unwrap(), "three");
}

#[test]
fn deref_gives_byte_slice_api() {
    let s = Sds::from_str("hello");
    assert_eq!(s.first(), Some(&b'h'));
    assert!(s.starts_with(b"he"));
    assert_eq!(&s[1..3], b"el");
}

#[test]
fn display_and_conversions() {
    let s = Sds::from_str("value");
    assert_eq!(format!("{s}"), "value");
    let back: String = s.clone().try_into().unwrap();
    assert_eq!(back, "value");
    assert_eq!(Sds::from(-42i64).as_str().unwrap(), "-42");
}

#[test]
fn ordering_matches_byte_order() {
    let mut items = vec![
        Sds::from_str("b"),
        Sds::from_str("ab"),
        Sds::from_str("a"),
        Sds::from_str(&heap_min()),
    ];
    items.sort();
    let rendered: Vec<&str> = items.iter().map(|s| s.as_str().unwrap()).collect();
    assert_eq!(rendered[0], "a");
    assert_eq!(rendered[1], "ab");
    assert_eq!(rendered[2], "b");
}

#[test]
fn serde_bytes_roundtrip() {
    let original = Sds::from_str(&heap_min());
    let encoded = serde_json::to_vec(&original).unwrap();
    let decoded: Sds = serde_json::from_slice(&encoded).unwrap();
    assert_eq!(original, decoded);
    assert!(!decoded.is_inline());
}
