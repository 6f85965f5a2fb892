use crate::*;
use proptest::prelude::*;
use rand::{seq::SliceRandom, Rng, SeedableRng};
use std::{cmp::Ordering, collections::BTreeMap};

fn init_logging() {
    use simplelog::*;
    // Several tests race to install the logger; only the first one wins.
    let _ = TestLogger::init(LevelFilter::Trace, Config::default());
}

#[test]
fn map_insert_remove_scenario() {
    let mut m = OrderedMap::new();
    for k in [10, 20, 30, 15, 25, 5, 1] {
        let (_, fresh) = m.insert(k, k * 100);
        assert!(fresh);
        m.check();
    }
    assert!(m.keys().eq(&[1, 5, 10, 15, 20, 25, 30]));
    assert_eq!(m.remove(&20), Some(2000));
    m.check();
    assert!(m.keys().eq(&[1, 5, 10, 15, 25, 30]));
    assert_eq!(m.len(), 6);
    assert!(!m.contains(&20));
    assert_eq!(m.remove(&20), None);
    assert_eq!(m.len(), 6);
}

#[test]
fn multiset_scenario() {
    let mut s = OrderedMultiSet::new();
    for k in [3, 1, 3, 3, 2] {
        s.insert(k);
        s.check();
    }
    assert!(s.iter().eq(&[1, 2, 3, 3, 3]));
    assert_eq!(s.count(&3), 3);
    assert_eq!(s.remove(&3), Some(3));
    s.check();
    assert_eq!(s.count(&3), 2);
    assert_eq!(s.len(), 4);
    assert_eq!(s.count(&7), 0);
}

#[test]
fn insert_existing_key_is_ignored() {
    let mut m = OrderedMap::new();
    let (a, fresh) = m.insert(1, "a");
    assert!(fresh);
    let (b, fresh) = m.insert(1, "b");
    assert!(!fresh);
    assert_eq!(a, b);
    assert_eq!(m[&1], "a");
    assert_eq!(m.len(), 1);

    let (c, fresh) = m.insert_or_assign(1, "c");
    assert!(!fresh);
    assert_eq!(c, a);
    assert_eq!(m.get_node(a), (&1, &"c"));
    let (_, fresh) = m.insert_or_assign(2, "d");
    assert!(fresh);
    assert_eq!(m.len(), 2);
}

#[test]
fn strict_access() {
    let mut m = OrderedMap::from([(1, 10), (2, 20)]);
    assert_eq!(m.at(&2), Ok(&20));
    assert_eq!(m.at(&3), Err(Error::KeyNotFound));
    *m.at_mut(&1).unwrap() += 5;
    assert_eq!(m[&1], 15);
    assert!(matches!(m.at_mut(&9), Err(Error::KeyNotFound)));
    assert_eq!(Error::KeyNotFound.to_string(), "key not found");
}

#[test]
#[should_panic(expected = "no entry found for key")]
fn index_missing_key_panics() {
    let m = OrderedMap::from([(1, 10)]);
    let _v = m[&2];
}

#[test]
fn get_or_insert_default_counts() {
    let mut m = OrderedMap::<&str, u32>::new();
    for w in "the cat sat on the mat the end".split(' ') {
        *m.get_or_insert_default(w) += 1;
    }
    assert_eq!(m["the"], 3);
    assert_eq!(m["cat"], 1);
    assert_eq!(m.len(), 6);
    m.check();
}

#[test]
#[should_panic(expected = "invalid NodeId")]
fn stale_node_id_panics() {
    let mut m = OrderedMap::new();
    let (id, _) = m.insert(1, 1);
    m.erase(id);
    // Reuses the freed slot under a new generation.
    m.insert(2, 2);
    assert!(!m.is_valid(id));
    let _ = m.get_node(id);
}

#[test]
fn node_ids_survive_erase() {
    let mut m = OrderedMap::<usize, usize>::new();
    let ids: Vec<NodeId> = (0..500).map(|k| m.insert(k, k).0).collect();
    for k in (0..500).filter(|k| k % 2 == 0) {
        assert_eq!(m.erase(ids[k]), (k, k));
        m.check();
    }
    for k in (0..500).filter(|k| k % 2 == 1) {
        assert_eq!(m.get_node(ids[k]), (&k, &k));
        assert_eq!(m.cursor_at(ids[k]).key(), &k);
    }
    assert_eq!(m.len(), 250);
}

#[test]
fn multiset_erase_one_copy() {
    let mut s = OrderedMultiSet::new();
    let ids = s.insert_many([5, 5, 5, 1]);
    assert_eq!(s.erase(ids[1]), 5);
    s.check();
    assert!(!s.is_valid(ids[1]));
    assert!(s.is_valid(ids[0]) && s.is_valid(ids[2]));
    assert_eq!(s.count(&5), 2);
    // The first remaining copy is the one inserted first.
    assert_eq!(s.find(&5).node(), Some(ids[0]));
    assert_eq!(s.remove_all(&5), 2);
    assert_eq!(s.remove_all(&5), 0);
    assert!(s.iter().eq(&[1]));
}

#[derive(Debug, Clone, Copy)]
struct Tagged(u32, char);

impl PartialEq for Tagged {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}
impl Eq for Tagged {}
impl PartialOrd for Tagged {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Tagged {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

#[test]
fn equal_keys_keep_insertion_order() {
    let mut s = OrderedMultiSet::new();
    for (i, c) in "abcdefgh".chars().enumerate() {
        s.insert(Tagged(i as u32 % 3, c));
    }
    s.check();
    let tags: String = s.iter().map(|t| t.1).collect();
    assert_eq!(tags, "adgbehcf");
    let ones: String = s.equal_range(&Tagged(1, ' ')).map(|t| t.1).collect();
    assert_eq!(ones, "beh");
}

#[test]
fn bounds() {
    let m = OrderedMap::from([(1, 'a'), (5, 'b'), (10, 'c'), (15, 'd')]);
    assert_eq!(m.lower_bound(&6).key(), &10);
    assert_eq!(m.lower_bound(&5).key(), &5);
    assert_eq!(m.lower_bound(&0).key(), &1);
    assert!(m.lower_bound(&16).is_end());
    assert_eq!(m.upper_bound(&10).get(), Some((&15, &'d')));
    assert!(m.upper_bound(&15).is_end());
    assert!(m.find(&6).is_end());

    let s = OrderedMultiSet::from([1, 2, 3, 3, 3, 4]);
    assert_eq!(s.lower_bound(&3).node(), s.find(&3).node());
    assert_eq!(s.upper_bound(&3).key(), &4);
    assert_eq!(s.upper_bound(&2).key(), &3);
    assert_eq!(s.equal_range(&3).count(), 3);
    assert_eq!(s.equal_range(&9).count(), 0);
    assert_eq!(s.equal_range(&0).count(), 0);
}

#[test]
fn cursor_walk() {
    let m = OrderedMap::from([(1, 'a'), (2, 'b'), (3, 'c')]);
    let mut c = m.cursor_front();
    let mut seen = Vec::new();
    while let Some((k, _)) = c.get() {
        seen.push(*k);
        c.move_next();
    }
    assert_eq!(seen, [1, 2, 3]);

    let mut c = m.cursor_back();
    assert_eq!(c.peek_prev(), Some((&2, &'b')));
    assert_eq!(c.peek_next(), None);
    c.move_prev();
    c.move_prev();
    assert_eq!(c.value(), &'a');
    c.move_prev();
    assert!(c.is_end());
    assert_eq!(c.node(), None);

    let empty = OrderedMap::<i32, i32>::new();
    assert!(empty.cursor_front().is_end());
    assert_eq!(empty.cursor_front(), empty.find(&1));
}

#[test]
#[should_panic(expected = "past-the-end")]
fn cursor_step_from_end_panics() {
    let s = OrderedMultiSet::from([1]);
    let mut c = s.upper_bound(&1);
    assert!(c.is_end());
    c.move_next();
}

#[test]
#[should_panic(expected = "past-the-end")]
fn cursor_key_at_end_panics() {
    let m = OrderedMap::<u8, u8>::new();
    let _ = m.cursor_front().key();
}

#[test]
fn empty_containers() {
    let mut m = OrderedMap::<i32, i32>::new();
    assert!(m.is_empty());
    assert_eq!(m.first_key_value(), None);
    assert_eq!(m.remove(&1), None);
    assert_eq!(m.pop_last(), None);
    assert_eq!(m.iter().next(), None);
    m.check();

    let mut s = OrderedMultiSet::<i32>::new();
    assert_eq!(s.first(), None);
    assert_eq!(s.pop_first(), None);
    assert_eq!(s.remove(&1), None);
    assert!(s.max_size() > 0);
}

#[test]
fn clone_is_independent() {
    init_logging();
    let mut a: OrderedMap<u32, String> = (0..100).map(|k| (k, k.to_string())).collect();
    let mut b = a.clone();
    b.check();
    assert_eq!(a, b);
    b.remove(&50);
    b.get_mut(&3).unwrap().push('!');
    a.insert(1000, "x".to_string());
    assert_eq!(a.len(), 101);
    assert_eq!(b.len(), 99);
    assert_eq!(a[&3], "3");
    assert_eq!(b[&3], "3!");
    assert!(a.contains_key(&50));

    let mut c = OrderedMap::new();
    c.insert(7, "seven".to_string());
    c.clone_from(&b);
    assert_eq!(c, b);

    let taken = std::mem::take(&mut b);
    assert!(b.is_empty());
    b.check();
    assert_eq!(taken.len(), 99);
}

#[test]
fn merge_and_swap() {
    init_logging();
    let mut a = OrderedMap::from([(1, "a1"), (2, "a2")]);
    let mut b = OrderedMap::from([(2, "b2"), (3, "b3")]);
    a.merge(&b);
    a.check();
    assert_eq!(b.len(), 2);
    assert!(b.iter().eq([(&2, &"b2"), (&3, &"b3")]));
    assert!(a.iter().eq([(&1, &"a1"), (&2, &"b2"), (&3, &"b3")]));

    let mut d = OrderedMap::from([(3, "d3"), (4, "d4")]);
    b.append(&mut d);
    b.check();
    assert!(d.is_empty());
    assert!(b.iter().eq([(&2, &"b2"), (&3, &"d3"), (&4, &"d4")]));

    let mut c = OrderedMap::from([(9, "c9")]);
    a.swap(&mut c);
    assert_eq!(a.len(), 1);
    assert_eq!(c.len(), 3);

    let mut s = OrderedMultiSet::from([1, 2, 2]);
    let mut t = OrderedMultiSet::from([2, 3]);
    s.merge(&mut t);
    s.check();
    assert!(t.is_empty());
    assert!(s.iter().eq(&[1, 2, 2, 2, 3]));
    s.swap(&mut t);
    assert!(s.is_empty());
    assert_eq!(t.len(), 5);
}

#[test]
fn insert_many_reports_each() {
    let mut m = OrderedMap::new();
    let res = m.insert_many([(1, 'a'), (2, 'b'), (1, 'c')]);
    assert_eq!(res.len(), 3);
    assert!(res[0].1 && res[1].1 && !res[2].1);
    assert_eq!(res[0].0, res[2].0);
    assert_eq!(m[&1], 'a');
}

#[test]
fn retain_and_pop() {
    let mut m: OrderedMap<i32, i32> = (0..50).map(|k| (k, k * k)).collect();
    m.retain(|k, v| {
        *v += 1;
        k % 5 == 0
    });
    m.check();
    assert!(m.keys().eq(&[0, 5, 10, 15, 20, 25, 30, 35, 40, 45]));
    assert_eq!(m[&5], 26);
    assert_eq!(m.pop_first(), Some((0, 1)));
    assert_eq!(m.pop_last(), Some((45, 2026)));
    assert_eq!(m.first_key_value(), Some((&5, &26)));
    assert_eq!(m.last_key_value(), Some((&40, &1601)));

    let mut s: OrderedMultiSet<i32> = [4, 1, 4, 2, 4].into_iter().collect();
    assert_eq!(s.retain(|k| *k != 4), 3);
    assert!(s.iter().eq(&[1, 2]));
    assert_eq!(s.pop_last(), Some(2));
    assert_eq!(s.last(), Some(&1));
}

#[test]
fn iterators() {
    let mut m = OrderedMap::from([(3, 30), (1, 10), (2, 20)]);
    for (k, v) in m.iter_mut() {
        *v += *k;
    }
    for v in m.values_mut() {
        *v *= 2;
    }
    assert!(m.values().eq(&[22, 44, 66]));
    assert!(m.iter().rev().map(|(k, _)| *k).eq([3, 2, 1]));
    let mut it = m.iter_mut();
    assert_eq!(it.len(), 3);
    assert_eq!(it.next_back(), Some((&3, &mut 66)));
    assert_eq!(it.next(), Some((&1, &mut 22)));
    assert_eq!(it.next(), Some((&2, &mut 44)));
    assert_eq!(it.next(), None);
    assert_eq!(it.next_back(), None);

    let mut it = m.clone().into_iter();
    assert_eq!(it.next_back(), Some((3, 66)));
    assert_eq!(it.len(), 2);
    drop(it);
    assert_eq!(m.clone().into_keys().collect::<Vec<_>>(), [1, 2, 3]);
    assert_eq!(m.into_values().rev().collect::<Vec<_>>(), [66, 44, 22]);

    let s = OrderedMultiSet::from([2, 1, 2]);
    assert_eq!(s.clone().into_iter().collect::<Vec<_>>(), [1, 2, 2]);
    assert_eq!(format!("{s:?}"), "{1, 2, 2}");
}

#[test]
fn comparison_traits() {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};
    let hash = |m: &OrderedMap<i32, i32>| {
        let mut h = DefaultHasher::new();
        m.hash(&mut h);
        h.finish()
    };
    let a = OrderedMap::from([(1, 1), (2, 2)]);
    let b: OrderedMap<i32, i32> = [(2, 2), (1, 1)].into_iter().collect();
    assert_eq!(a, b);
    assert_eq!(hash(&a), hash(&b));
    let mut c = a.clone();
    c.extend([(0, 0)]);
    assert!(c < a);
    assert_eq!(format!("{a:?}"), "{1: 1, 2: 2}");

    let mut d = OrderedMultiSet::from([1, 2]);
    d.extend(&[2]);
    assert!(d > OrderedMultiSet::from([1, 2]));
}

#[test]
fn fallible_inserts() {
    let mut m = OrderedMap::new();
    assert_eq!(m.try_insert(1, 'a').map(|(_, fresh)| fresh), Ok(true));
    assert_eq!(m.try_insert(1, 'b').map(|(_, fresh)| fresh), Ok(false));
    assert!(m.try_reserve(10).is_ok());
    assert!(matches!(
        m.try_reserve(usize::MAX),
        Err(Error::AllocFailed(_))
    ));
    let mut s = OrderedMultiSet::new();
    let id = s.try_insert(4).unwrap();
    assert_eq!(s.get_node(id), &4);
}

#[test]
fn insert_then_remove_all_leaves_empty_tree() {
    let n = 3000;
    let mut m = OrderedMap::new();
    for k in 0..n {
        m.insert(k, k);
    }
    let mut keys: Vec<u32> = (0..n).collect();
    keys.shuffle(&mut rand_chacha::ChaCha8Rng::seed_from_u64(7));
    for (i, k) in keys.iter().enumerate() {
        assert_eq!(m.remove(k), Some(*k));
        m.check();
        assert_eq!(m.len(), n as usize - i - 1);
    }
    assert!(m.is_empty());
    assert_eq!(m.len(), 0);
    assert!(m.first_key_value().is_none());
    assert!(m.cursor_front().is_end());
}

#[test]
fn random_churn() {
    init_logging();
    let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(42);
    let mut m = OrderedMap::new();
    let mut model = BTreeMap::new();
    for _ in 0..20000 {
        let k: u32 = rng.gen_range(0..2000);
        if rng.gen_bool(0.6) {
            m.insert_or_assign(k, k);
            model.insert(k, k);
        } else {
            assert_eq!(m.remove(&k), model.remove(&k));
        }
    }
    m.check();
    assert!(m.iter().eq(model.iter()));
    m.clear();
    assert!(m.is_empty());
    m.check();
}

#[derive(Debug, Clone)]
enum MapOp {
    Insert(u8, u32),
    Assign(u8, u32),
    Remove(u8),
    PopFirst,
    PopLast,
}

fn map_op() -> impl Strategy<Value = MapOp> {
    prop_oneof![
        3 => (any::<u8>(), any::<u32>()).prop_map(|(k, v)| MapOp::Insert(k, v)),
        1 => (any::<u8>(), any::<u32>()).prop_map(|(k, v)| MapOp::Assign(k, v)),
        2 => any::<u8>().prop_map(MapOp::Remove),
        1 => Just(MapOp::PopFirst),
        1 => Just(MapOp::PopLast),
    ]
}

#[derive(Debug, Clone)]
enum SetOp {
    Insert(u8),
    Remove(u8),
    RemoveAll(u8),
    PopFirst,
}

fn set_op() -> impl Strategy<Value = SetOp> {
    prop_oneof![
        4 => (0..32u8).prop_map(SetOp::Insert),
        2 => (0..32u8).prop_map(SetOp::Remove),
        1 => (0..32u8).prop_map(SetOp::RemoveAll),
        1 => Just(SetOp::PopFirst),
    ]
}

proptest! {
    #[test]
    fn map_matches_btreemap(ops in proptest::collection::vec(map_op(), 0..400)) {
        let mut m = OrderedMap::new();
        let mut model = BTreeMap::new();
        for op in ops {
            match op {
                MapOp::Insert(k, v) => {
                    let fresh = !model.contains_key(&k);
                    model.entry(k).or_insert(v);
                    prop_assert_eq!(m.insert(k, v).1, fresh);
                }
                MapOp::Assign(k, v) => {
                    let fresh = model.insert(k, v).is_none();
                    prop_assert_eq!(m.insert_or_assign(k, v).1, fresh);
                }
                MapOp::Remove(k) => {
                    prop_assert_eq!(m.remove(&k), model.remove(&k));
                }
                MapOp::PopFirst => {
                    prop_assert_eq!(m.pop_first(), model.pop_first());
                }
                MapOp::PopLast => {
                    prop_assert_eq!(m.pop_last(), model.pop_last());
                }
            }
            m.check();
            prop_assert_eq!(m.len(), model.len());
        }
        prop_assert!(m.iter().eq(model.iter()));
        for k in 0..=u8::MAX {
            prop_assert_eq!(m.lower_bound(&k).get(), model.range(k..).next());
            prop_assert_eq!(m.get(&k), model.get(&k));
        }
    }

    #[test]
    fn multiset_matches_counts(ops in proptest::collection::vec(set_op(), 0..400)) {
        let mut s = OrderedMultiSet::new();
        let mut model: BTreeMap<u8, usize> = BTreeMap::new();
        for op in ops {
            match op {
                SetOp::Insert(k) => {
                    s.insert(k);
                    *model.entry(k).or_default() += 1;
                }
                SetOp::Remove(k) => {
                    let expect = match model.get_mut(&k) {
                        Some(n) => {
                            *n -= 1;
                            if *n == 0 {
                                model.remove(&k);
                            }
                            Some(k)
                        }
                        None => None,
                    };
                    prop_assert_eq!(s.remove(&k), expect);
                }
                SetOp::RemoveAll(k) => {
                    prop_assert_eq!(s.remove_all(&k), model.remove(&k).unwrap_or(0));
                }
                SetOp::PopFirst => {
                    let expect = model.first_key_value().map(|(k, _)| *k);
                    if let Some(k) = expect {
                        let n = model.get_mut(&k).unwrap();
                        *n -= 1;
                        if *n == 0 {
                            model.remove(&k);
                        }
                    }
                    prop_assert_eq!(s.pop_first(), expect);
                }
            }
            s.check();
        }
        let flat: Vec<u8> = model.iter().flat_map(|(k, n)| std::iter::repeat(*k).take(*n)).collect();
        prop_assert!(s.iter().eq(flat.iter()));
        for k in 0..32u8 {
            prop_assert_eq!(s.count(&k), model.get(&k).copied().unwrap_or(0));
        }
    }

    #[test]
    fn erase_by_handle(keys in proptest::collection::vec(any::<u16>(), 0..300)) {
        let mut s = OrderedMultiSet::new();
        let ids = s.insert_many(keys.iter().copied());
        for (k, id) in keys.iter().zip(&ids) {
            if k % 3 == 0 {
                prop_assert_eq!(s.erase(*id), *k);
                s.check();
            }
        }
        for (k, id) in keys.iter().zip(&ids) {
            prop_assert_eq!(s.is_valid(*id), k % 3 != 0);
            if k % 3 != 0 {
                prop_assert_eq!(s.get_node(*id), k);
            }
        }
    }
}
