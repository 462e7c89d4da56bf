use kivi::intset::Encoding;
use kivi::IntSet;

#[test]
fn upgrade_ladder_preserves_members() {
    let mut set = IntSet::new();

    assert!(set.insert(1));
    assert!(set.insert(-1));
    assert!(!set.insert(1));
    assert_eq!(set.len(), 2);

    assert!(set.insert(i32::MIN as i64));
    assert!(set.insert(i32::MAX as i64));
    assert_eq!(set.len(), 4);

    assert!(set.insert(i64::MIN));
    assert!(set.insert(i64::MAX));
    assert_eq!(set.len(), 6);
    assert_eq!(set.encoding(), Encoding::Int64);

    for v in [1, -1, i32::MIN as i64, i32::MAX as i64, i64::MIN, i64::MAX] {
        assert!(set.contains(v));
        assert!(!set.insert(v));
    }
}

#[test]
fn values_stay_sorted_through_churn() {
    let mut set = IntSet::new();
    // Детерминированная «случайная» последовательность.
    let mut x = 12_345i64;
    for _ in 0..1_000 {
        x = x.wrapping_mul(1_103_515_245).wrapping_add(12_345);
        set.insert(x % 10_000);
    }

    let values: Vec<i64> = set.iter().collect();
    for w in values.windows(2) {
        assert!(w[0] < w[1]);
    }
    for (i, v) in values.iter().enumerate() {
        assert_eq!(set.get(i), Some(*v));
    }
    assert_eq!(set.get(values.len()), None);
}

#[test]
fn remove_all_members() {
    let values = [-2i64, -1, 1, 2, 40_000, -40_000];
    let mut set: IntSet = values.into_iter().collect();

    for v in values {
        assert!(set.remove(v));
    }
    for v in values {
        assert!(!set.remove(v));
        assert!(!set.contains(v));
    }
    assert!(set.is_empty());
}

#[test]
fn random_member_is_contained() {
    let set: IntSet = (0..1_000i64).map(|v| v * 3).collect();
    for _ in 0..100 {
        let v = set.random().unwrap();
        assert!(set.contains(v));
        assert_eq!(v % 3, 0);
    }
}

#[test]
fn into_vec_is_sorted_view() {
    let set: IntSet = [5i64, 3, 9, 1].into_iter().collect();
    assert_eq!(set.into_vec(), vec![1, 3, 5, 9]);
}
