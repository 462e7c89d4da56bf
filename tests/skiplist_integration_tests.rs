use kivi::{RangeSpec, SkipList};

/// Детерминированный генератор псевдослучайных значений (LCG).
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> u64 {
        self.0 = self.0.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
        self.0 >> 33
    }
}

#[test]
fn ranks_match_sorted_positions() {
    let mut list: SkipList<u64> = SkipList::new();
    let mut rng = Lcg(42);

    let mut pairs: Vec<(u64, f64)> = Vec::new();
    while pairs.len() < 500 {
        let member = rng.next() % 10_000;
        let score = (rng.next() % 100) as f64;
        if list.insert(member, score) {
            pairs.push((member, score));
        }
    }

    pairs.sort_by(|a, b| {
        a.1.partial_cmp(&b.1)
            .unwrap()
            .then_with(|| a.0.cmp(&b.0))
    });

    assert_eq!(list.validate(), Ok(()));
    for (pos, (member, score)) in pairs.iter().enumerate() {
        assert_eq!(list.rank(member, *score), Some(pos + 1));

        let (m, s) = list.element_by_rank(pos + 1).unwrap();
        assert_eq!((*m, s), (*member, *score));
    }
}

#[test]
fn iteration_is_sorted_and_reversible() {
    let mut list: SkipList<u64> = SkipList::new();
    let mut rng = Lcg(7);
    for _ in 0..300 {
        let v = rng.next() % 1_000;
        list.insert(v, (v % 17) as f64);
    }

    let forward: Vec<(u64, f64)> = list.iter().map(|(m, s)| (*m, s)).collect();
    assert_eq!(forward.len(), list.len());
    for w in forward.windows(2) {
        assert!(w[0].1 < w[1].1 || (w[0].1 == w[1].1 && w[0].0 < w[1].0));
    }

    let mut backward: Vec<(u64, f64)> = list.rev_iter().map(|(m, s)| (*m, s)).collect();
    backward.reverse();
    assert_eq!(forward, backward);
}

#[test]
fn deletions_keep_ranks_and_invariants() {
    let mut list: SkipList<u64> = SkipList::new();
    for v in 1..=200u64 {
        list.insert(v, v as f64);
    }

    // Удаляем каждый третий элемент и сверяем ранги заново.
    for v in (3..=200u64).step_by(3) {
        assert!(list.delete(&v, v as f64));
    }
    assert_eq!(list.validate(), Ok(()));

    let mut expected_rank = 0usize;
    for v in 1..=200u64 {
        if v % 3 == 0 {
            assert_eq!(list.rank(&v, v as f64), None);
        } else {
            expected_rank += 1;
            assert_eq!(list.rank(&v, v as f64), Some(expected_rank));
        }
    }
}

#[test]
fn score_ranges_with_duplicated_scores() {
    let mut list: SkipList<String> = SkipList::new();
    for (m, s) in [
        ("a", 1.0),
        ("b", 2.0),
        ("c", 2.0),
        ("d", 2.0),
        ("e", 3.0),
    ] {
        assert!(list.insert(m.into(), s));
    }

    let twos = RangeSpec::inclusive(2.0, 2.0);
    assert!(list.is_in_range(&twos));
    assert_eq!(list.first_in_range(&twos).unwrap().0, "b");
    assert_eq!(list.last_in_range(&twos).unwrap().0, "d");

    let above = RangeSpec {
        min: 2.0,
        max: f64::INFINITY,
        minex: true,
        maxex: false,
    };
    assert_eq!(list.first_in_range(&above).unwrap().0, "e");

    let degenerate = RangeSpec {
        min: 2.0,
        max: 2.0,
        minex: true,
        maxex: false,
    };
    assert!(!list.is_in_range(&degenerate));
}

#[test]
fn statistics_after_heavy_churn() {
    let mut list: SkipList<u64> = SkipList::new();
    let mut rng = Lcg(99);
    for _ in 0..2_000 {
        let v = rng.next() % 500;
        let s = (rng.next() % 50) as f64;
        if !list.insert(v, s) {
            list.delete(&v, s);
        }
    }
    assert_eq!(list.validate(), Ok(()));

    let stats = list.statistics();
    assert_eq!(stats.node_count, list.len());
    assert_eq!(
        stats.level_distribution.iter().sum::<usize>(),
        list.len()
    );
}
