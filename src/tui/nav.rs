//! Directory navigation and multi-select state
//!
//! The listing is owned here and replaced wholesale when a listing task
//! completes. Descend/ascend update the ancestor stack immediately and remember
//! what to undo if the listing fails.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};

use crate::putio::{Entry, FileId, ROOT_ID};

/// Directories first, then case-insensitive name order.
pub fn compare_entries(a: &Entry, b: &Entry) -> Ordering {
    b.is_dir
        .cmp(&a.is_dir)
        .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
}

pub fn sort_entries(entries: &mut [Entry]) {
    entries.sort_by(compare_entries);
}

/// Identifiers marked for bulk operations. Entries may refer to files that
/// are not in the current listing.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Selection {
    ids: BTreeSet<FileId>,
}

impl Selection {
    pub fn insert(&mut self, id: FileId) -> bool {
        self.ids.insert(id)
    }

    pub fn remove(&mut self, id: FileId) -> bool {
        self.ids.remove(&id)
    }

    /// Flip membership; returns true if `id` is now selected.
    pub fn toggle(&mut self, id: FileId) -> bool {
        if !self.ids.remove(&id) {
            self.ids.insert(id);
            true
        } else {
            false
        }
    }

    pub fn contains(&self, id: FileId) -> bool {
        self.ids.contains(&id)
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> Vec<FileId> {
        self.ids.iter().copied().collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Descend,
    Ascend,
    Reload,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Pending {
    target: FileId,
    step: Step,
}

#[derive(Debug)]
pub struct Navigation {
    parent: FileId,
    ancestors: Vec<FileId>,
    /// Names of the directories entered, parallel to `ancestors`
    trail: Vec<String>,
    cursor_memory: HashMap<FileId, usize>,
    entries: Vec<Entry>,
    cursor: usize,
    pending: Option<Pending>,
}

impl Default for Navigation {
    fn default() -> Self {
        Self::new()
    }
}

impl Navigation {
    pub fn new() -> Self {
        Self {
            parent: ROOT_ID,
            ancestors: Vec::new(),
            trail: Vec::new(),
            cursor_memory: HashMap::new(),
            entries: Vec::new(),
            cursor: 0,
            pending: None,
        }
    }

    pub fn current_parent(&self) -> FileId {
        self.parent
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn current(&self) -> Option<&Entry> {
        self.entries.get(self.cursor)
    }

    pub fn depth(&self) -> usize {
        self.ancestors.len()
    }

    pub fn trail(&self) -> &[String] {
        &self.trail
    }

    pub fn is_loading(&self) -> bool {
        self.pending.is_some()
    }

    pub fn find(&self, id: FileId) -> Option<&Entry> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn move_up(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn move_down(&mut self) {
        if self.cursor + 1 < self.entries.len() {
            self.cursor += 1;
        }
    }

    pub fn top(&mut self) {
        self.cursor = 0;
    }

    pub fn bottom(&mut self) {
        self.cursor = self.entries.len().saturating_sub(1);
    }

    /// Start the initial listing of `parent`.
    pub fn begin_load(&mut self, parent: FileId) -> FileId {
        self.pending = Some(Pending { target: parent, step: Step::Reload });
        parent
    }

    /// Re-list the current directory.
    pub fn reload(&mut self) -> FileId {
        self.begin_load(self.parent)
    }

    /// Enter the directory under the cursor. Returns the id to list.
    pub fn descend(&mut self) -> Option<FileId> {
        let entry = self.current().filter(|e| e.is_dir)?.clone();
        self.cursor_memory.insert(self.parent, self.cursor);
        self.ancestors.push(self.parent);
        self.trail.push(entry.name);
        self.pending = Some(Pending { target: entry.id, step: Step::Descend });
        Some(entry.id)
    }

    /// Go back to the previous directory. Returns the id to list.
    pub fn ascend(&mut self) -> Option<FileId> {
        let parent = self.ancestors.pop()?;
        self.pending = Some(Pending { target: parent, step: Step::Ascend });
        Some(parent)
    }

    /// Whether a listing for `parent` is what we are waiting for.
    pub fn expects(&self, parent: FileId) -> bool {
        self.pending.as_ref().map_or(false, |p| p.target == parent)
    }

    /// Install a completed listing. Returns false for results nobody is
    /// waiting for.
    pub fn install(&mut self, parent: FileId, mut entries: Vec<Entry>) -> bool {
        let Some(pending) = self.take_pending(parent) else {
            return false;
        };
        if pending.step == Step::Ascend {
            self.trail.pop();
        }
        sort_entries(&mut entries);
        self.entries = entries;
        self.parent = parent;
        self.cursor = match self.cursor_memory.remove(&parent) {
            Some(saved) => saved.min(self.entries.len().saturating_sub(1)),
            None => 0,
        };
        true
    }

    /// Undo the pending step after its listing failed. Returns false for
    /// failures nobody is waiting for.
    pub fn abort(&mut self, parent: FileId) -> bool {
        let Some(pending) = self.take_pending(parent) else {
            return false;
        };
        match pending.step {
            Step::Descend => {
                self.ancestors.pop();
                self.trail.pop();
                self.cursor_memory.remove(&self.parent);
            }
            Step::Ascend => self.ancestors.push(parent),
            Step::Reload => {}
        }
        true
    }

    fn take_pending(&mut self, parent: FileId) -> Option<Pending> {
        if self.expects(parent) {
            self.pending.take()
        } else {
            None
        }
    }

    /// Explicit selection if any, else the entry under the cursor.
    pub fn effective_selection(&self, selection: &Selection) -> Vec<FileId> {
        if !selection.is_empty() {
            return selection.ids();
        }
        self.current().map(|e| vec![e.id]).unwrap_or_default()
    }

    /// Toggle the entry under the cursor and step forward.
    pub fn toggle_at_cursor(&mut self, selection: &mut Selection) {
        if let Some(id) = self.current().map(|e| e.id) {
            selection.toggle(id);
            self.move_down();
        }
    }

    /// Clear a non-empty selection, otherwise select everything listed.
    pub fn toggle_all(&self, selection: &mut Selection) {
        if !selection.is_empty() {
            selection.clear();
        } else {
            for e in &self.entries {
                selection.insert(e.id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: FileId, name: &str, is_dir: bool) -> Entry {
        Entry { id, name: name.into(), is_dir, size: 0, content_type: String::new() }
    }

    fn folders(n: usize, base: FileId) -> Vec<Entry> {
        (0..n).map(|i| entry(base + i as FileId, &format!("d{:02}", i), true)).collect()
    }

    fn loaded(entries: Vec<Entry>) -> Navigation {
        let mut nav = Navigation::new();
        nav.begin_load(ROOT_ID);
        assert!(nav.install(ROOT_ID, entries));
        nav
    }

    #[test]
    fn dirs_first_then_case_insensitive() {
        let mut v = vec![
            entry(1, "b", true),
            entry(2, "A", true),
            entry(3, "z", false),
            entry(4, "y", false),
            entry(5, "X", false),
        ];
        sort_entries(&mut v);
        let names: Vec<_> = v.iter().map(|e| (e.name.as_str(), e.is_dir)).collect();
        assert_eq!(
            names,
            vec![("A", true), ("b", true), ("X", false), ("y", false), ("z", false)]
        );
    }

    #[test]
    fn sorted_listing_keeps_groups_apart() {
        let mut v: Vec<Entry> = ["q", "Beta", "alpha", "Zed", "m", "B"]
            .iter()
            .enumerate()
            .map(|(i, n)| entry(i as FileId, n, i % 2 == 0))
            .collect();
        sort_entries(&mut v);
        let first_file = v.iter().position(|e| !e.is_dir).unwrap();
        assert!(v[..first_file].iter().all(|e| e.is_dir));
        assert!(v[first_file..].iter().all(|e| !e.is_dir));
        for w in v.windows(2).filter(|w| w[0].is_dir == w[1].is_dir) {
            assert!(w[0].name.to_lowercase() <= w[1].name.to_lowercase());
        }
    }

    #[test]
    fn descend_then_ascend_restores_cursor() {
        let mut nav = loaded(folders(6, 100));
        nav.move_down();
        nav.move_down();
        nav.move_down();
        let target = nav.descend().unwrap();
        assert_eq!(target, 103);
        assert!(nav.is_loading());
        assert!(nav.install(103, folders(4, 200)));
        assert_eq!(nav.cursor(), 0);
        assert_eq!(nav.trail(), &["d03".to_string()]);

        nav.bottom();
        let inner = nav.descend().unwrap();
        assert!(nav.install(inner, folders(2, 300)));

        let back = nav.ascend().unwrap();
        assert_eq!(back, 103);
        assert!(nav.install(103, folders(4, 200)));
        assert_eq!(nav.cursor(), 3);

        let root = nav.ascend().unwrap();
        assert_eq!(root, ROOT_ID);
        assert!(nav.install(ROOT_ID, folders(6, 100)));
        assert_eq!(nav.cursor(), 3);
        assert!(nav.trail().is_empty());
        assert!(nav.ascend().is_none());
    }

    #[test]
    fn restored_cursor_clamps_to_shorter_listing() {
        let mut nav = loaded(folders(6, 100));
        nav.bottom();
        let t = nav.descend().unwrap();
        assert!(nav.install(t, vec![]));
        assert_eq!(nav.cursor(), 0);
        nav.ascend().unwrap();
        assert!(nav.install(ROOT_ID, folders(2, 100)));
        assert_eq!(nav.cursor(), 1);
    }

    #[test]
    fn cursor_memory_is_consumed_on_return() {
        let mut nav = loaded(folders(3, 100));
        nav.move_down();
        let t = nav.descend().unwrap();
        assert!(nav.install(t, folders(1, 500)));
        nav.ascend().unwrap();
        assert!(nav.install(ROOT_ID, folders(3, 100)));
        assert_eq!(nav.cursor(), 1);
        // A later reload of the same directory starts from the top
        nav.reload();
        assert!(nav.install(ROOT_ID, folders(3, 100)));
        assert_eq!(nav.cursor(), 0);
    }

    #[test]
    fn descend_ignores_files_and_empty_listing() {
        let mut nav = loaded(vec![]);
        assert!(nav.descend().is_none());
        let mut nav = loaded(vec![entry(1, "f", false)]);
        assert!(nav.descend().is_none());
        assert!(!nav.is_loading());
    }

    #[test]
    fn stale_listing_is_rejected() {
        let mut nav = loaded(folders(2, 100));
        let t = nav.descend().unwrap();
        assert!(!nav.install(999, folders(5, 900)));
        assert!(nav.is_loading());
        assert!(nav.install(t, folders(1, 700)));
        assert!(!nav.install(t, folders(1, 700)));
    }

    #[test]
    fn failed_descend_rolls_back() {
        let mut nav = loaded(folders(3, 100));
        nav.move_down();
        let t = nav.descend().unwrap();
        assert!(nav.abort(t));
        assert!(!nav.is_loading());
        assert_eq!(nav.depth(), 0);
        assert!(nav.trail().is_empty());
        assert_eq!(nav.current_parent(), ROOT_ID);
        assert_eq!(nav.cursor(), 1);
        assert!(nav.ascend().is_none());
    }

    #[test]
    fn failed_ascend_keeps_stack() {
        let mut nav = loaded(folders(3, 100));
        let t = nav.descend().unwrap();
        assert!(nav.install(t, folders(1, 400)));
        nav.ascend().unwrap();
        assert!(nav.abort(ROOT_ID));
        assert_eq!(nav.depth(), 1);
        assert_eq!(nav.current_parent(), t);
        assert_eq!(nav.ascend(), Some(ROOT_ID));
    }

    #[test]
    fn toggle_twice_is_identity_and_advances() {
        let mut nav = loaded(folders(3, 100));
        let mut sel = Selection::default();
        nav.toggle_at_cursor(&mut sel);
        assert!(sel.contains(100));
        assert_eq!(nav.cursor(), 1);
        nav.move_up();
        nav.toggle_at_cursor(&mut sel);
        assert!(sel.is_empty());
        nav.bottom();
        nav.toggle_at_cursor(&mut sel);
        assert_eq!(nav.cursor(), 2);
        assert!(sel.contains(102));
    }

    #[test]
    fn select_all_toggles() {
        let nav = loaded(folders(4, 100));
        let mut sel = Selection::default();
        nav.toggle_all(&mut sel);
        assert_eq!(sel.len(), 4);
        nav.toggle_all(&mut sel);
        assert!(sel.is_empty());
        // Any existing selection, even a stale one, is cleared rather than extended
        sel.insert(12345);
        nav.toggle_all(&mut sel);
        assert!(sel.is_empty());
    }

    #[test]
    fn effective_selection_falls_back_to_cursor() {
        let mut nav = loaded(folders(3, 100));
        let mut sel = Selection::default();
        nav.move_down();
        assert_eq!(nav.effective_selection(&sel), vec![101]);
        sel.insert(102);
        sel.insert(100);
        assert_eq!(nav.effective_selection(&sel), vec![100, 102]);
        let empty = loaded(vec![]);
        assert!(empty.effective_selection(&Selection::default()).is_empty());
    }

    #[test]
    fn selection_survives_descend() {
        let mut nav = loaded(folders(3, 100));
        let mut sel = Selection::default();
        sel.insert(101);
        let t = nav.descend().unwrap();
        assert!(nav.install(t, folders(2, 800)));
        assert!(sel.contains(101));
        assert_eq!(nav.effective_selection(&sel), vec![101]);
    }
}
