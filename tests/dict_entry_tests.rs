use kivi::{Dict, Entry};

#[test]
fn or_insert_on_vacant_and_occupied() {
    let mut d: Dict<&str, u32> = Dict::new();

    *d.entry("a").or_insert(1) += 10;
    assert_eq!(d.get(&"a"), Some(&11));

    *d.entry("a").or_insert(100) += 1;
    assert_eq!(d.get(&"a"), Some(&12));
    assert_eq!(d.len(), 1);
}

#[test]
fn word_counting_with_entries() {
    let mut counts: Dict<&str, u32> = Dict::new();
    for word in "the quick the lazy the dog".split_whitespace() {
        *counts.entry(word).or_default() += 1;
    }

    assert_eq!(counts.get(&"the"), Some(&3));
    assert_eq!(counts.get(&"quick"), Some(&1));
    assert_eq!(counts.len(), 4);
}

#[test]
fn and_modify_only_touches_existing() {
    let mut d: Dict<&str, u32> = Dict::new();

    d.entry("x").and_modify(|v| *v += 1).or_insert(10);
    assert_eq!(d.get(&"x"), Some(&10));

    d.entry("x").and_modify(|v| *v += 1).or_insert(10);
    assert_eq!(d.get(&"x"), Some(&11));
}

#[test]
fn or_insert_with_key_derives_value() {
    let mut d: Dict<String, usize> = Dict::new();
    let len = *d
        .entry("hello".to_string())
        .or_insert_with_key(|k| k.len());
    assert_eq!(len, 5);
    assert_eq!(d.get(&"hello".to_string()), Some(&5));
}

#[test]
fn occupied_entry_remove_unlinks_anywhere_in_chain() {
    let mut d: Dict<u32, u32> = Dict::new();
    // Достаточно ключей, чтобы в бакетах возникли цепочки.
    d.disable_resize();
    for i in 0..64 {
        d.insert(i, i * 2);
    }

    for i in 0..64 {
        match d.entry(i) {
            Entry::Occupied(e) => {
                assert_eq!(*e.key(), i);
                assert_eq!(e.remove(), i * 2);
            }
            Entry::Vacant(_) => panic!("key {i} must be present"),
        }
        assert_eq!(d.get(&i), None);
        assert_eq!(d.len(), (63 - i) as usize);
    }
}

#[test]
fn occupied_entry_insert_returns_old_value() {
    let mut d: Dict<&str, u32> = Dict::new();
    d.insert("k", 1);

    match d.entry("k") {
        Entry::Occupied(mut e) => {
            assert_eq!(e.insert(2), 1);
            assert_eq!(*e.get(), 2);
        }
        Entry::Vacant(_) => panic!("key must be present"),
    }
    assert_eq!(d.get(&"k"), Some(&2));
}

#[test]
fn entry_works_mid_rehash() {
    let mut d: Dict<u32, u32> = Dict::new();
    let mut i = 0u32;
    while !d.is_rehashing() {
        d.insert(i, i);
        i += 1;
    }

    // Вставка через entry попадает в целевое поколение, старые ключи
    // находятся через occupied.
    *d.entry(1_000).or_insert(7) += 1;
    assert_eq!(d.get(&1_000), Some(&8));

    match d.entry(0) {
        Entry::Occupied(e) => assert_eq!(*e.get(), 0),
        Entry::Vacant(_) => panic!("old key must be found during rehash"),
    }

    let vacant_key = match d.entry(9_999) {
        Entry::Vacant(e) => e.into_key(),
        Entry::Occupied(_) => panic!("key 9999 was never inserted"),
    };
    assert_eq!(vacant_key, 9_999);
}
