//! Per-sidebar mutual exclusion for placement mutations.
//!
//! A mutation locks every sidebar it touches. Ids are sorted and de-duplicated
//! before acquisition, so two cross-sidebar moves in opposite directions always
//! take their locks in the same order.

use std::collections::HashSet;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

/// Lock table keyed by sidebar id.
#[derive(Debug, Default)]
pub struct SidebarLocks {
    held: Mutex<HashSet<String>>,
    released: Condvar,
}

/// Holds a set of sidebar locks until dropped.
#[derive(Debug)]
pub struct SidebarGuard<'a> {
    locks: &'a SidebarLocks,
    sidebar_ids: Vec<String>,
}

impl SidebarLocks {
    /// Creates an empty lock table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Blocks until every listed sidebar is locked by the caller.
    ///
    /// Locks are taken one at a time in lexical id order.
    pub fn lock_many<I, S>(&self, sidebar_ids: I) -> SidebarGuard<'_>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut ids: Vec<String> = sidebar_ids.into_iter().map(Into::into).collect();
        ids.sort();
        ids.dedup();

        let mut guard = SidebarGuard {
            locks: self,
            sidebar_ids: Vec::with_capacity(ids.len()),
        };
        for id in ids {
            let mut held = self.table();
            while held.contains(&id) {
                held = self
                    .released
                    .wait(held)
                    .unwrap_or_else(PoisonError::into_inner);
            }
            held.insert(id.clone());
            guard.sidebar_ids.push(id);
        }
        guard
    }

    /// Whether any caller currently holds the lock for `sidebar_id`.
    #[must_use]
    pub fn is_locked(&self, sidebar_id: &str) -> bool {
        self.table().contains(sidebar_id)
    }

    fn table(&self) -> MutexGuard<'_, HashSet<String>> {
        self.held.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SidebarGuard<'_> {
    /// Sidebars held by this guard, in acquisition order.
    #[must_use]
    pub fn sidebar_ids(&self) -> &[String] {
        &self.sidebar_ids
    }
}

impl Drop for SidebarGuard<'_> {
    fn drop(&mut self) {
        let mut held = self.locks.table();
        for id in &self.sidebar_ids {
            held.remove(id);
        }
        drop(held);
        self.locks.released.notify_all();
    }
}
