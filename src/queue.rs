// 2.0: bounded-prefix ordered queue. exact ordering only for the top N accounts by
// balance; everyone past the cap lands in an unordered overflow segment. this keeps the
// hot-path cost independent of how many accounts exist in the market.
//
// layout: fixed-capacity binary max-heap (with an account -> slot map for O(log N)
// updates) plus a doubly linked overflow list threaded through an arena of nodes with a
// free list, so overflow insert/remove stay O(1).
//
// peek_max only ever sees the sorted prefix; an overflow account is reachable by
// traversal and gets promoted into the prefix when a slot frees up. matching against
// the absolute largest account across the whole population is explicitly not a goal.

use crate::types::AccountId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// sentinel for "no node", same trick as a null pointer
const NULL_INDEX: u32 = u32::MAX;

/// One entry of the queue as seen by callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueNode {
    pub account: AccountId,
    pub value: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Heap(usize),
    Overflow(u32),
}

#[derive(Debug, Clone, Copy)]
struct OverflowNode {
    account: AccountId,
    value: Decimal,
    prev: u32,
    next: u32,
}

impl OverflowNode {
    fn vacant() -> Self {
        Self {
            account: AccountId(0),
            value: Decimal::ZERO,
            prev: NULL_INDEX,
            next: NULL_INDEX,
        }
    }
}

/// Approximately-sorted account queue with a bounded sorted prefix.
#[derive(Debug, Clone)]
pub struct OrderedQueue {
    // sorted prefix: binary max-heap by value, ties broken by account id for determinism
    heap: Vec<QueueNode>,
    capacity: usize,
    slots: HashMap<AccountId, Slot>,
    // overflow segment: arena nodes + doubly linked list + free list through `next`
    arena: Vec<OverflowNode>,
    free_head: u32,
    overflow_head: u32,
    overflow_tail: u32,
    overflow_len: usize,
}

impl OrderedQueue {
    /// `capacity` is the size of the sorted prefix, not a limit on total accounts.
    pub fn new(capacity: usize) -> Self {
        Self {
            heap: Vec::with_capacity(capacity),
            capacity: capacity.max(1),
            slots: HashMap::new(),
            arena: Vec::new(),
            free_head: NULL_INDEX,
            overflow_head: NULL_INDEX,
            overflow_tail: NULL_INDEX,
            overflow_len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.heap.len() + self.overflow_len
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty() && self.overflow_len == 0
    }

    pub fn contains(&self, account: AccountId) -> bool {
        self.slots.contains_key(&account)
    }

    pub fn value_of(&self, account: AccountId) -> Option<Decimal> {
        match self.slots.get(&account)? {
            Slot::Heap(i) => Some(self.heap[*i].value),
            Slot::Overflow(i) => Some(self.arena[*i as usize].value),
        }
    }

    /// Largest-balance account in the sorted prefix, or None if the queue is empty.
    pub fn peek_max(&self) -> Option<QueueNode> {
        self.heap.first().copied()
    }

    /// Insert an account or move it to its new value. A non-positive value removes it
    /// (a zero balance must not rest in any queue).
    pub fn insert_or_update(&mut self, account: AccountId, value: Decimal) {
        if value <= Decimal::ZERO {
            self.remove(account);
            return;
        }

        match self.slots.get(&account).copied() {
            Some(Slot::Heap(i)) => {
                self.heap[i].value = value;
                self.resift(i);
            }
            Some(Slot::Overflow(i)) => {
                self.arena[i as usize].value = value;
            }
            None => {
                if self.heap.len() < self.capacity {
                    self.heap_push(QueueNode { account, value });
                } else {
                    self.overflow_push(account, value);
                }
            }
        }
    }

    /// Remove an account from wherever it sits. Unknown accounts are a no-op.
    pub fn remove(&mut self, account: AccountId) {
        match self.slots.remove(&account) {
            Some(Slot::Heap(i)) => {
                self.heap_remove(i);
                // a prefix slot opened up; pull someone in from overflow
                if let Some((acct, value)) = self.overflow_pop_head() {
                    self.heap_push(QueueNode {
                        account: acct,
                        value,
                    });
                }
            }
            Some(Slot::Overflow(i)) => {
                self.overflow_unlink(i);
            }
            None => {}
        }
    }

    /// Structural traversal: the sorted prefix in slot order, then the overflow list.
    /// Only the head is guaranteed to be the maximum; this is for introspection, not
    /// for ordering-sensitive logic.
    pub fn next(&self, account: AccountId) -> Option<QueueNode> {
        match self.slots.get(&account)? {
            Slot::Heap(i) => {
                if i + 1 < self.heap.len() {
                    Some(self.heap[i + 1])
                } else {
                    self.overflow_first()
                }
            }
            Slot::Overflow(i) => {
                let next = self.arena[*i as usize].next;
                if next == NULL_INDEX {
                    None
                } else {
                    let node = &self.arena[next as usize];
                    Some(QueueNode {
                        account: node.account,
                        value: node.value,
                    })
                }
            }
        }
    }

    fn overflow_first(&self) -> Option<QueueNode> {
        if self.overflow_head == NULL_INDEX {
            None
        } else {
            let node = &self.arena[self.overflow_head as usize];
            Some(QueueNode {
                account: node.account,
                value: node.value,
            })
        }
    }

    // --- heap internals -------------------------------------------------------------

    fn ahead_of(a: &QueueNode, b: &QueueNode) -> bool {
        a.value > b.value || (a.value == b.value && a.account < b.account)
    }

    fn heap_push(&mut self, node: QueueNode) {
        let i = self.heap.len();
        self.slots.insert(node.account, Slot::Heap(i));
        self.heap.push(node);
        self.sift_up(i);
    }

    fn heap_remove(&mut self, i: usize) {
        let last = self.heap.len() - 1;
        self.heap.swap(i, last);
        self.heap.pop();
        if i < self.heap.len() {
            let moved = self.heap[i].account;
            self.slots.insert(moved, Slot::Heap(i));
            self.resift(i);
        }
    }

    fn resift(&mut self, i: usize) {
        let up = self.sift_up(i);
        if up == i {
            self.sift_down(i);
        }
    }

    fn sift_up(&mut self, mut i: usize) -> usize {
        while i > 0 {
            let parent = (i - 1) / 2;
            if Self::ahead_of(&self.heap[i], &self.heap[parent]) {
                self.heap.swap(i, parent);
                self.slots.insert(self.heap[i].account, Slot::Heap(i));
                self.slots.insert(self.heap[parent].account, Slot::Heap(parent));
                i = parent;
            } else {
                break;
            }
        }
        i
    }

    fn sift_down(&mut self, mut i: usize) {
        loop {
            let left = 2 * i + 1;
            let right = 2 * i + 2;
            let mut largest = i;
            if left < self.heap.len() && Self::ahead_of(&self.heap[left], &self.heap[largest]) {
                largest = left;
            }
            if right < self.heap.len() && Self::ahead_of(&self.heap[right], &self.heap[largest]) {
                largest = right;
            }
            if largest == i {
                break;
            }
            self.heap.swap(i, largest);
            self.slots.insert(self.heap[i].account, Slot::Heap(i));
            self.slots.insert(self.heap[largest].account, Slot::Heap(largest));
            i = largest;
        }
    }

    // --- overflow internals ---------------------------------------------------------

    fn arena_alloc(&mut self) -> u32 {
        if self.free_head != NULL_INDEX {
            let i = self.free_head;
            self.free_head = self.arena[i as usize].next;
            self.arena[i as usize] = OverflowNode::vacant();
            i
        } else {
            self.arena.push(OverflowNode::vacant());
            (self.arena.len() - 1) as u32
        }
    }

    fn arena_free(&mut self, i: u32) {
        self.arena[i as usize] = OverflowNode::vacant();
        self.arena[i as usize].next = self.free_head;
        self.free_head = i;
    }

    fn overflow_push(&mut self, account: AccountId, value: Decimal) {
        let i = self.arena_alloc();
        {
            let node = &mut self.arena[i as usize];
            node.account = account;
            node.value = value;
            node.prev = self.overflow_tail;
            node.next = NULL_INDEX;
        }
        if self.overflow_tail != NULL_INDEX {
            self.arena[self.overflow_tail as usize].next = i;
        } else {
            self.overflow_head = i;
        }
        self.overflow_tail = i;
        self.overflow_len += 1;
        self.slots.insert(account, Slot::Overflow(i));
    }

    fn overflow_unlink(&mut self, i: u32) {
        let (prev, next) = {
            let node = &self.arena[i as usize];
            (node.prev, node.next)
        };
        if prev != NULL_INDEX {
            self.arena[prev as usize].next = next;
        } else {
            self.overflow_head = next;
        }
        if next != NULL_INDEX {
            self.arena[next as usize].prev = prev;
        } else {
            self.overflow_tail = prev;
        }
        self.overflow_len -= 1;
        self.arena_free(i);
    }

    fn overflow_pop_head(&mut self) -> Option<(AccountId, Decimal)> {
        if self.overflow_head == NULL_INDEX {
            return None;
        }
        let i = self.overflow_head;
        let (account, value) = {
            let node = &self.arena[i as usize];
            (node.account, node.value)
        };
        self.slots.remove(&account);
        self.overflow_unlink(i);
        Some((account, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn acct(n: u64) -> AccountId {
        AccountId(n)
    }

    #[test]
    fn peek_max_returns_largest() {
        let mut q = OrderedQueue::new(8);
        q.insert_or_update(acct(1), dec!(100));
        q.insert_or_update(acct(2), dec!(300));
        q.insert_or_update(acct(3), dec!(200));

        let head = q.peek_max().unwrap();
        assert_eq!(head.account, acct(2));
        assert_eq!(head.value, dec!(300));
    }

    #[test]
    fn empty_queue_has_no_head() {
        let q = OrderedQueue::new(8);
        assert!(q.peek_max().is_none());
        assert!(q.is_empty());
    }

    #[test]
    fn beyond_capacity_goes_to_overflow() {
        let mut q = OrderedQueue::new(2);
        q.insert_or_update(acct(1), dec!(10));
        q.insert_or_update(acct(2), dec!(20));
        // third account exceeds the prefix cap, lands in overflow even with a
        // larger balance. peek_max never sees it.
        q.insert_or_update(acct(3), dec!(999));

        assert_eq!(q.len(), 3);
        assert_eq!(q.peek_max().unwrap().account, acct(2));
    }

    #[test]
    fn removal_promotes_from_overflow() {
        let mut q = OrderedQueue::new(2);
        q.insert_or_update(acct(1), dec!(10));
        q.insert_or_update(acct(2), dec!(20));
        q.insert_or_update(acct(3), dec!(30));

        q.remove(acct(2));

        // account 3 must now be reachable via peek_max
        assert_eq!(q.len(), 2);
        assert_eq!(q.peek_max().unwrap().account, acct(3));
    }

    #[test]
    fn update_reorders_prefix() {
        let mut q = OrderedQueue::new(8);
        q.insert_or_update(acct(1), dec!(100));
        q.insert_or_update(acct(2), dec!(50));
        assert_eq!(q.peek_max().unwrap().account, acct(1));

        q.insert_or_update(acct(2), dec!(500));
        assert_eq!(q.peek_max().unwrap().account, acct(2));
        assert_eq!(q.value_of(acct(2)), Some(dec!(500)));
    }

    #[test]
    fn zero_value_removes() {
        let mut q = OrderedQueue::new(4);
        q.insert_or_update(acct(1), dec!(100));
        q.insert_or_update(acct(1), dec!(0));
        assert!(!q.contains(acct(1)));
        assert!(q.is_empty());
    }

    #[test]
    fn remove_unknown_is_noop() {
        let mut q = OrderedQueue::new(4);
        q.insert_or_update(acct(1), dec!(100));
        q.remove(acct(9));
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn traversal_reaches_overflow() {
        let mut q = OrderedQueue::new(2);
        for n in 1..=5u64 {
            q.insert_or_update(acct(n), Decimal::from(n * 10));
        }

        let mut seen = vec![q.peek_max().unwrap().account];
        let mut cursor = q.peek_max().unwrap().account;
        while let Some(node) = q.next(cursor) {
            seen.push(node.account);
            cursor = node.account;
        }

        // walking from the head covers the whole prefix and then the overflow list
        assert_eq!(seen.len(), q.len());
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), 5);
    }

    #[test]
    fn overflow_arena_reuses_slots() {
        let mut q = OrderedQueue::new(1);
        q.insert_or_update(acct(1), dec!(1));
        q.insert_or_update(acct(2), dec!(2));
        q.insert_or_update(acct(3), dec!(3));
        let arena_len = q.arena.len();

        q.remove(acct(2));
        q.insert_or_update(acct(4), dec!(4));

        // freed node is recycled, the arena does not grow
        assert_eq!(q.arena.len(), arena_len);
        assert_eq!(q.len(), 3);
    }

    #[test]
    fn ties_break_deterministically() {
        let mut q = OrderedQueue::new(4);
        q.insert_or_update(acct(7), dec!(100));
        q.insert_or_update(acct(3), dec!(100));
        assert_eq!(q.peek_max().unwrap().account, acct(3));
    }
}
