//! Ordered, key-addressed linked storage.
//!
//! Nodes live in a map keyed by their id and point at their neighbours by key,
//! so there are no reference cycles to manage. Prepend, append, membership,
//! removal and neighbour lookup are all O(1); positional access walks the chain.

use std::collections::HashMap;

#[derive(Debug, Clone)]
struct Node<V> {
    value: V,
    prev: Option<String>,
    next: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LinkedIndex<V> {
    nodes: HashMap<String, Node<V>>,
    head: Option<String>,
    tail: Option<String>,
}

impl<V> Default for LinkedIndex<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> LinkedIndex<V> {
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            head: None,
            tail: None,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.nodes.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.nodes.get(key).map(|node| &node.value)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut V> {
        self.nodes.get_mut(key).map(|node| &mut node.value)
    }

    /// Inserts at the head. Returns `false` and leaves the chain untouched when
    /// the key is already present.
    pub fn push_front(&mut self, key: String, value: V) -> bool {
        if self.nodes.contains_key(&key) {
            return false;
        }

        let next = self.head.take();
        match next.as_deref().and_then(|old| self.nodes.get_mut(old)) {
            Some(old_head) => old_head.prev = Some(key.clone()),
            None => self.tail = Some(key.clone()),
        }
        self.nodes.insert(
            key.clone(),
            Node {
                value,
                prev: None,
                next,
            },
        );
        self.head = Some(key);
        true
    }

    /// Inserts at the tail. Returns `false` when the key is already present.
    pub fn push_back(&mut self, key: String, value: V) -> bool {
        if self.nodes.contains_key(&key) {
            return false;
        }

        let prev = self.tail.take();
        match prev.as_deref().and_then(|old| self.nodes.get_mut(old)) {
            Some(old_tail) => old_tail.next = Some(key.clone()),
            None => self.head = Some(key.clone()),
        }
        self.nodes.insert(
            key.clone(),
            Node {
                value,
                prev,
                next: None,
            },
        );
        self.tail = Some(key);
        true
    }

    pub fn remove(&mut self, key: &str) -> Option<V> {
        let node = self.nodes.remove(key)?;
        self.relink(node.prev.as_deref(), node.next.as_deref());
        Some(node.value)
    }

    /// Moves the value stored under `old` to `new` without changing its
    /// position. Fails when `old` is missing or `new` is taken.
    pub fn rekey(&mut self, old: &str, new: &str) -> bool {
        if old == new {
            return self.nodes.contains_key(old);
        }
        if self.nodes.contains_key(new) {
            return false;
        }
        let Some(node) = self.nodes.remove(old) else {
            return false;
        };

        match node.prev.as_deref().and_then(|prev| self.nodes.get_mut(prev)) {
            Some(prev) => prev.next = Some(new.to_string()),
            None => self.head = Some(new.to_string()),
        }
        match node.next.as_deref().and_then(|next| self.nodes.get_mut(next)) {
            Some(next) => next.prev = Some(new.to_string()),
            None => self.tail = Some(new.to_string()),
        }
        self.nodes.insert(new.to_string(), node);
        true
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.head = None;
        self.tail = None;
    }

    pub fn first_key(&self) -> Option<&str> {
        self.head.as_deref()
    }

    pub fn last_key(&self) -> Option<&str> {
        self.tail.as_deref()
    }

    pub fn next_key(&self, key: &str) -> Option<&str> {
        self.nodes.get(key)?.next.as_deref()
    }

    pub fn prev_key(&self, key: &str) -> Option<&str> {
        self.nodes.get(key)?.prev.as_deref()
    }

    pub fn nth(&self, index: usize) -> Option<&V> {
        self.iter().nth(index).map(|(_, value)| value)
    }

    pub fn iter(&self) -> Iter<'_, V> {
        Iter {
            index: self,
            cursor: self.head.as_deref(),
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.iter().map(|(key, _)| key)
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.iter().map(|(_, value)| value)
    }

    fn relink(&mut self, prev: Option<&str>, next: Option<&str>) {
        match prev.and_then(|key| self.nodes.get_mut(key)) {
            Some(node) => node.next = next.map(str::to_string),
            None => self.head = next.map(str::to_string),
        }
        match next.and_then(|key| self.nodes.get_mut(key)) {
            Some(node) => node.prev = prev.map(str::to_string),
            None => self.tail = prev.map(str::to_string),
        }
    }
}

pub struct Iter<'a, V> {
    index: &'a LinkedIndex<V>,
    cursor: Option<&'a str>,
}

impl<'a, V> Iterator for Iter<'a, V> {
    type Item = (&'a str, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let key = self.cursor?;
        let (stored_key, node) = self.index.nodes.get_key_value(key)?;
        self.cursor = node.next.as_deref();
        Some((stored_key.as_str(), &node.value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prop_assert_eq;

    fn forward<V>(index: &LinkedIndex<V>) -> Vec<String> {
        index.keys().map(str::to_string).collect()
    }

    fn backward<V>(index: &LinkedIndex<V>) -> Vec<String> {
        let mut out = Vec::new();
        let mut cursor = index.last_key();
        while let Some(key) = cursor {
            out.push(key.to_string());
            cursor = index.prev_key(key);
        }
        out.reverse();
        out
    }

    #[test]
    fn push_front_keeps_newest_first() {
        let mut index = LinkedIndex::new();
        index.push_front("a".into(), 1);
        index.push_front("b".into(), 2);
        index.push_front("c".into(), 3);

        assert_eq!(forward(&index), vec!["c", "b", "a"]);
        assert_eq!(index.nth(1), Some(&2));
        assert_eq!(index.nth(3), None);
    }

    #[test]
    fn duplicate_keys_are_rejected() {
        let mut index = LinkedIndex::new();
        assert!(index.push_back("a".into(), 1));
        assert!(!index.push_back("a".into(), 2));
        assert!(!index.push_front("a".into(), 3));
        assert_eq!(index.get("a"), Some(&1));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn removing_middle_relinks_neighbours() {
        let mut index = LinkedIndex::new();
        for key in ["a", "b", "c"] {
            index.push_back(key.into(), ());
        }

        assert!(index.remove("b").is_some());
        assert_eq!(index.next_key("a"), Some("c"));
        assert_eq!(index.prev_key("c"), Some("a"));
        assert!(index.remove("b").is_none());
    }

    #[test]
    fn rekey_preserves_position() {
        let mut index = LinkedIndex::new();
        for key in ["a", "b", "c"] {
            index.push_back(key.into(), key.to_uppercase());
        }

        assert!(index.rekey("b", "z"));
        assert_eq!(forward(&index), vec!["a", "z", "c"]);
        assert_eq!(backward(&index), vec!["a", "z", "c"]);
        assert_eq!(index.get("z").map(String::as_str), Some("B"));
        assert!(!index.rekey("a", "c"));
        assert!(!index.rekey("missing", "q"));
    }

    proptest::proptest! {
        #[test]
        fn links_stay_consistent(ops in proptest::collection::vec((0u8..4, 0u8..6), 1..120)) {
            let mut index = LinkedIndex::new();
            for (op, key) in ops {
                let key = format!("k{key}");
                match op {
                    0 => { index.push_front(key, ()); }
                    1 => { index.push_back(key, ()); }
                    2 => { index.remove(&key); }
                    _ => { index.rekey(&key, &format!("{key}x")); }
                }

                let walked = forward(&index);
                prop_assert_eq!(walked.len(), index.len());
                prop_assert_eq!(&walked, &backward(&index));
                prop_assert_eq!(index.first_key().map(str::to_string), walked.first().cloned());
                prop_assert_eq!(index.last_key().map(str::to_string), walked.last().cloned());
            }
        }
    }
}
