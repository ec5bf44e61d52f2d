//! Frequency List Module
//!
//! Doubly-linked list threaded through the [`EntryArena`], ordered ascending
//! by hit count. The head is always the cheapest eviction candidate.

use crate::cache::entry::{EntryArena, EntryId};

// == Frequency List ==
/// Eviction order over every charged entry.
#[derive(Debug, Default)]
pub struct FrequencyList {
    head: Option<EntryId>,
    len: usize,
}

impl FrequencyList {
    // == Constructor ==
    /// Creates an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the least valuable entry.
    pub fn head(&self) -> Option<EntryId> {
        self.head
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    // == Insert ==
    /// Inserts `id` after every member with an equal or lower hit count,
    /// scanning forward from the head.
    pub fn insert_sorted(&mut self, arena: &mut EntryArena, id: EntryId) {
        let hits = arena[id].hit_count;
        let mut prev = None;
        let mut cursor = self.head;

        while let Some(current) = cursor {
            if arena[current].hit_count > hits {
                break;
            }
            prev = Some(current);
            cursor = arena[current].next;
        }

        self.link_between(arena, id, prev, cursor);
    }

    // == Resort ==
    /// Moves `id` to its sorted position after its hit count changed.
    ///
    /// Walks outward from the current position, so the cost is proportional
    /// to how far the count drifted since the last call.
    pub fn resort(&mut self, arena: &mut EntryArena, id: EntryId) {
        let hits = arena[id].hit_count;
        let mut prev = arena[id].prev;
        let mut next = arena[id].next;
        let mut moved = false;

        while let Some(n) = next {
            if arena[n].hit_count >= hits {
                break;
            }
            prev = Some(n);
            next = arena[n].next;
            moved = true;
        }

        if !moved {
            while let Some(p) = prev {
                if arena[p].hit_count <= hits {
                    break;
                }
                next = Some(p);
                prev = arena[p].prev;
                moved = true;
            }
        }

        if moved {
            self.unlink(arena, id);
            self.link_between(arena, id, prev, next);
        }
    }

    // == Unlink ==
    /// Removes `id` from the list, leaving it in the arena.
    pub fn unlink(&mut self, arena: &mut EntryArena, id: EntryId) {
        let (prev, next) = {
            let entry = &mut arena[id];
            (entry.prev.take(), entry.next.take())
        };

        match prev {
            Some(p) => arena[p].next = next,
            None => self.head = next,
        }
        if let Some(n) = next {
            arena[n].prev = prev;
        }
        self.len -= 1;
    }

    // == Iterate ==
    /// Walks the list from head to tail.
    pub fn iter<'a>(&self, arena: &'a EntryArena) -> ListIter<'a> {
        ListIter {
            arena,
            cursor: self.head,
        }
    }

    fn link_between(
        &mut self,
        arena: &mut EntryArena,
        id: EntryId,
        prev: Option<EntryId>,
        next: Option<EntryId>,
    ) {
        {
            let entry = &mut arena[id];
            entry.prev = prev;
            entry.next = next;
        }
        match prev {
            Some(p) => arena[p].next = Some(id),
            None => self.head = Some(id),
        }
        if let Some(n) = next {
            arena[n].prev = Some(id);
        }
        self.len += 1;
    }
}

/// Iterator over list members in eviction order.
pub struct ListIter<'a> {
    arena: &'a EntryArena,
    cursor: Option<EntryId>,
}

impl<'a> Iterator for ListIter<'a> {
    type Item = EntryId;

    fn next(&mut self) -> Option<EntryId> {
        let id = self.cursor?;
        self.cursor = self.arena[id].next;
        Some(id)
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::entry::CacheEntry;

    fn add(arena: &mut EntryArena, list: &mut FrequencyList, name: &str, hits: f64) -> EntryId {
        let mut entry = CacheEntry::new(name.to_string(), None);
        entry.hit_count = hits;
        let id = arena.insert(entry);
        list.insert_sorted(arena, id);
        id
    }

    fn order(arena: &EntryArena, list: &FrequencyList) -> Vec<String> {
        list.iter(arena).map(|id| arena[id].path.clone()).collect()
    }

    #[test]
    fn test_list_new() {
        let list = FrequencyList::new();
        assert!(list.is_empty());
        assert_eq!(list.len(), 0);
        assert!(list.head().is_none());
    }

    #[test]
    fn test_insert_keeps_ascending_order() {
        let mut arena = EntryArena::new();
        let mut list = FrequencyList::new();

        add(&mut arena, &mut list, "c", 3.0);
        add(&mut arena, &mut list, "a", 1.0);
        add(&mut arena, &mut list, "b", 2.0);

        assert_eq!(order(&arena, &list), vec!["a", "b", "c"]);
        assert_eq!(list.len(), 3);
    }

    #[test]
    fn test_insert_after_equal_counts() {
        let mut arena = EntryArena::new();
        let mut list = FrequencyList::new();

        add(&mut arena, &mut list, "old", 1.0);
        add(&mut arena, &mut list, "new", 1.0);

        // Older entries with the same count are evicted first
        assert_eq!(order(&arena, &list), vec!["old", "new"]);
    }

    #[test]
    fn test_resort_moves_forward() {
        let mut arena = EntryArena::new();
        let mut list = FrequencyList::new();

        let a = add(&mut arena, &mut list, "a", 1.0);
        add(&mut arena, &mut list, "b", 2.0);
        add(&mut arena, &mut list, "c", 3.0);

        arena[a].hit_count = 2.5;
        list.resort(&mut arena, a);
        assert_eq!(order(&arena, &list), vec!["b", "a", "c"]);

        arena[a].hit_count = 10.0;
        list.resort(&mut arena, a);
        assert_eq!(order(&arena, &list), vec!["b", "c", "a"]);
        assert_eq!(list.len(), 3);
    }

    #[test]
    fn test_resort_moves_backward() {
        let mut arena = EntryArena::new();
        let mut list = FrequencyList::new();

        add(&mut arena, &mut list, "a", 1.0);
        add(&mut arena, &mut list, "b", 2.0);
        let c = add(&mut arena, &mut list, "c", 3.0);

        arena[c].hit_count = 0.5;
        list.resort(&mut arena, c);
        assert_eq!(order(&arena, &list), vec!["c", "a", "b"]);
        assert_eq!(list.head(), Some(c));
    }

    #[test]
    fn test_resort_in_place_is_noop() {
        let mut arena = EntryArena::new();
        let mut list = FrequencyList::new();

        add(&mut arena, &mut list, "a", 1.0);
        let b = add(&mut arena, &mut list, "b", 2.0);
        add(&mut arena, &mut list, "c", 3.0);

        arena[b].hit_count = 2.5;
        list.resort(&mut arena, b);
        assert_eq!(order(&arena, &list), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_unlink_head_middle_tail() {
        let mut arena = EntryArena::new();
        let mut list = FrequencyList::new();

        let a = add(&mut arena, &mut list, "a", 1.0);
        let b = add(&mut arena, &mut list, "b", 2.0);
        let c = add(&mut arena, &mut list, "c", 3.0);
        add(&mut arena, &mut list, "d", 4.0);

        list.unlink(&mut arena, b);
        assert_eq!(order(&arena, &list), vec!["a", "c", "d"]);

        list.unlink(&mut arena, a);
        assert_eq!(order(&arena, &list), vec!["c", "d"]);
        assert_eq!(list.head(), Some(c));

        let d = list.iter(&arena).last().unwrap();
        list.unlink(&mut arena, d);
        assert_eq!(order(&arena, &list), vec!["c"]);
        assert!(arena[b].prev.is_none() && arena[b].next.is_none());
        assert_eq!(list.len(), 1);
    }
}
