use std::collections::{BTreeSet, HashMap, VecDeque};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::diff::{OpTag, opcodes};
use crate::error::{CapsyncError, Result};
use crate::store::CaptionStore;

/// Stable handle for a tag object. Identity survives renames: the same id keeps
/// its file associations while its text changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TagId(u32);

impl TagId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// Stable handle for a file participating in the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FileId(u32);

impl FileId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// How widely a tag is present across the session's files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagPresence {
    NotPresent,
    Partial,
    Full,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Empty,
    Active,
}

#[derive(Debug)]
struct TagEntry {
    /// Verbatim text between separators, never trimmed
    text: String,
    files: BTreeSet<FileId>,
    alive: bool,
}

#[derive(Debug)]
struct FileEntry {
    path: PathBuf,
    /// Ordered tag list; duplicates within one caption are distinct ids
    tags: Vec<TagId>,
}

/// Joint caption editing across multiple files.
///
/// The session holds one tag arena shared by all files: each tag knows its
/// member files, each file keeps its ordered tag list. The aggregate view
/// (unique tags ordered by weighted position) is what the user edits; `edit`
/// diffs the edited text against the previous aggregate and derives per-tag
/// operations that keep every file's caption consistent.
pub struct MultiEditSession {
    separator: String,
    tags: Vec<TagEntry>,
    files: Vec<FileEntry>,
    /// Aggregate tag order; every entry is alive and has at least one file
    order: Vec<TagId>,
    merged: String,
    state: SessionState,
}

impl MultiEditSession {
    pub fn new(separator: impl Into<String>) -> Self {
        Self {
            separator: separator.into(),
            tags: Vec::new(),
            files: Vec::new(),
            order: Vec::new(),
            merged: String::new(),
            state: SessionState::Empty,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    pub fn tag_count(&self) -> usize {
        self.order.len()
    }

    /// The merged aggregate caption as last rendered.
    pub fn merged_text(&self) -> &str {
        &self.merged
    }

    /// Change the separator live. The merged view is re-rendered with the new
    /// separator; later edits and saves split/join with it as well.
    pub fn set_separator(&mut self, separator: impl Into<String>) {
        self.separator = separator.into();
        if self.state == SessionState::Active {
            self.merged = self.join_order();
        }
    }

    /// Drop all session state and return to `Empty`. Pending text is not
    /// written anywhere; call `save` first to flush.
    pub fn clear(&mut self) {
        self.tags.clear();
        self.files.clear();
        self.order.clear();
        self.merged.clear();
        self.state = SessionState::Empty;
    }

    /// Load captions for `inputs` through the given store and build the merged
    /// view. All-or-nothing: any unreadable caption fails the whole load and
    /// leaves the session `Empty`.
    pub async fn load(&mut self, inputs: &[PathBuf], store: &dyn CaptionStore) -> Result<String> {
        let mut captions = Vec::with_capacity(inputs.len());
        for path in inputs {
            match store.load(path).await {
                Ok(text) => captions.push((path.clone(), text)),
                Err(e) => {
                    self.clear();
                    return Err(CapsyncError::Caption(format!(
                        "{}: {}",
                        path.display(),
                        e
                    )));
                }
            }
        }
        self.load_texts(captions)
    }

    /// Build the session from already-loaded `(path, caption)` pairs.
    /// `load` is a convenience wrapper that reads through a caption store.
    pub fn load_texts(&mut self, captions: Vec<(PathBuf, String)>) -> Result<String> {
        self.clear();
        if captions.is_empty() {
            return Err(CapsyncError::Session(
                "Cannot start a multi-edit session without files".to_string(),
            ));
        }

        // Tags with equal text are matched across files by occurrence index:
        // the k-th duplicate in a file maps to the k-th aggregate tag object
        // of that text, so the aggregate carries the maximum duplicate count.
        let mut by_text: HashMap<String, Vec<TagId>> = HashMap::new();
        // (position sum, member count) per tag, for weighted ordering
        let mut positions: Vec<(usize, usize)> = Vec::new();

        for (path, text) in captions {
            let fid = FileId(self.files.len() as u32);
            let parts = split_caption(&text, &self.separator);

            let mut occurrence: HashMap<String, usize> = HashMap::new();
            let mut tag_list = Vec::with_capacity(parts.len());
            for (pos, part) in parts.into_iter().enumerate() {
                let counter = occurrence.entry(part.clone()).or_insert(0);
                let occ = *counter;
                *counter += 1;

                let ids = by_text.entry(part.clone()).or_default();
                let tid = if occ < ids.len() {
                    ids[occ]
                } else {
                    let tid = TagId(self.tags.len() as u32);
                    self.tags.push(TagEntry {
                        text: part,
                        files: BTreeSet::new(),
                        alive: true,
                    });
                    positions.push((0, 0));
                    ids.push(tid);
                    self.order.push(tid);
                    tid
                };

                self.tags[tid.index()].files.insert(fid);
                positions[tid.index()].0 += pos;
                positions[tid.index()].1 += 1;
                tag_list.push(tid);
            }

            self.files.push(FileEntry {
                path,
                tags: tag_list,
            });
        }

        // Weighted average position, rounded; stable sort keeps insertion
        // order for ties
        self.order.sort_by_key(|tid| {
            let (sum, count) = positions[tid.index()];
            (sum as f64 / count as f64).round() as i64
        });

        self.merged = self.join_order();
        self.state = SessionState::Active;
        info!(
            "Loaded {} captions into multi-edit session ({} aggregate tags)",
            self.files.len(),
            self.order.len()
        );
        Ok(self.merged.clone())
    }

    /// Apply an edited version of the merged view.
    ///
    /// The new text is split on the separator and aligned against the previous
    /// aggregate tag list. Alignment opcodes become tag operations: renames for
    /// replaced regions, split/merge detection for 1-to-2 and 2-to-1 replaces
    /// whose concatenations agree modulo whitespace, move detection for
    /// deleted-then-reinserted identical text, and plain create/delete
    /// otherwise. Created tags are added to every file.
    pub fn edit(&mut self, new_text: &str) -> Result<()> {
        if self.state != SessionState::Active {
            return Err(CapsyncError::Session(
                "No active multi-edit session".to_string(),
            ));
        }

        let old_texts: Vec<String> = self
            .order
            .iter()
            .map(|tid| self.tags[tid.index()].text.clone())
            .collect();
        let new_parts = split_caption(new_text, &self.separator);
        let ops = opcodes(&old_texts, &new_parts);
        debug!(
            "Edit: {} -> {} tags, {} opcodes",
            old_texts.len(),
            new_parts.len(),
            ops.len()
        );

        // How many inserted slots each text still needs; deleted tags with a
        // matching pending insert become moves instead of delete+create.
        let mut insert_needs: HashMap<&str, usize> = HashMap::new();
        for op in &ops {
            if op.tag == OpTag::Insert {
                for j in op.j1..op.j2 {
                    *insert_needs.entry(new_parts[j].as_str()).or_insert(0) += 1;
                }
            }
        }

        // First sweep: route deletions into the move pool or delete for real
        let mut move_pool: HashMap<String, VecDeque<TagId>> = HashMap::new();
        for op in &ops {
            if op.tag != OpTag::Delete {
                continue;
            }
            for i in op.i1..op.i2 {
                let tid = self.order[i];
                let text = self.tags[tid.index()].text.clone();
                match insert_needs.get_mut(text.as_str()) {
                    Some(n) if *n > 0 => {
                        *n -= 1;
                        move_pool.entry(text).or_default().push_back(tid);
                    }
                    _ => self.delete_tag(tid),
                }
            }
        }

        // Second sweep: build the new aggregate order, mutating tags as we go
        let mut new_order: Vec<TagId> = Vec::with_capacity(new_parts.len());
        let mut created: Vec<TagId> = Vec::new();
        let mut relocated: Vec<TagId> = Vec::new();

        for op in &ops {
            match op.tag {
                OpTag::Equal => {
                    new_order.extend_from_slice(&self.order[op.i1..op.i2]);
                }
                OpTag::Delete => {}
                OpTag::Insert => {
                    for j in op.j1..op.j2 {
                        let text = &new_parts[j];
                        let moved = move_pool
                            .get_mut(text.as_str())
                            .and_then(|queue| queue.pop_front());
                        match moved {
                            Some(tid) => {
                                relocated.push(tid);
                                new_order.push(tid);
                            }
                            None => {
                                let tid = self.create_tag(text.clone());
                                created.push(tid);
                                new_order.push(tid);
                            }
                        }
                    }
                }
                OpTag::Replace => {
                    let old_len = op.i2 - op.i1;
                    let new_len = op.j2 - op.j1;

                    if old_len == 1
                        && new_len == 2
                        && concat_eq_ignore_ws(
                            &new_parts[op.j1],
                            &new_parts[op.j1 + 1],
                            &old_texts[op.i1],
                        )
                    {
                        // Separator typed inside a tag: split. The left half
                        // becomes a new tag with the same membership, placed
                        // before the original in each file; the original is
                        // renamed to the right half.
                        let orig = self.order[op.i1];
                        let members: Vec<FileId> =
                            self.tags[orig.index()].files.iter().copied().collect();
                        let left = self.create_tag(new_parts[op.j1].clone());
                        self.tags[left.index()].files = members.iter().copied().collect();
                        for &fid in &members {
                            let list = &mut self.files[fid.index()].tags;
                            match list.iter().position(|&t| t == orig) {
                                Some(p) => list.insert(p, left),
                                None => list.push(left),
                            }
                        }
                        self.tags[orig.index()].text = new_parts[op.j1 + 1].clone();
                        new_order.push(left);
                        new_order.push(orig);
                    } else if old_len == 2
                        && new_len == 1
                        && concat_eq_ignore_ws(
                            &old_texts[op.i1],
                            &old_texts[op.i1 + 1],
                            &new_parts[op.j1],
                        )
                    {
                        // Separator removed between two tags: merge. The second
                        // tag's membership transfers into the first, which is
                        // renamed to the combined text.
                        let first = self.order[op.i1];
                        let second = self.order[op.i1 + 1];
                        let second_members: Vec<FileId> =
                            self.tags[second.index()].files.iter().copied().collect();
                        for fid in second_members {
                            let has_first = self.tags[first.index()].files.contains(&fid);
                            let list = &mut self.files[fid.index()].tags;
                            if has_first {
                                list.retain(|&t| t != second);
                            } else if let Some(p) = list.iter().position(|&t| t == second) {
                                list[p] = first;
                                self.tags[first.index()].files.insert(fid);
                            }
                        }
                        let entry = &mut self.tags[second.index()];
                        entry.files.clear();
                        entry.alive = false;
                        self.tags[first.index()].text = new_parts[op.j1].clone();
                        new_order.push(first);
                    } else {
                        // Pairwise rename; surplus on either side extends or
                        // removes tag objects at the tail of the region
                        let common = old_len.min(new_len);
                        for k in 0..common {
                            let tid = self.order[op.i1 + k];
                            self.tags[tid.index()].text = new_parts[op.j1 + k].clone();
                            new_order.push(tid);
                        }
                        for k in common..new_len {
                            let tid = self.create_tag(new_parts[op.j1 + k].clone());
                            created.push(tid);
                            new_order.push(tid);
                        }
                        for k in common..old_len {
                            let tid = self.order[op.i1 + k];
                            self.delete_tag(tid);
                        }
                    }
                }
            }
        }

        self.order = new_order;

        let aggregate_pos: HashMap<TagId, usize> = self
            .order
            .iter()
            .enumerate()
            .map(|(pos, &tid)| (tid, pos))
            .collect();

        // Reposition moved tags within their member files
        for tid in relocated {
            let target = aggregate_pos[&tid];
            let members: Vec<FileId> = self.tags[tid.index()].files.iter().copied().collect();
            for fid in members {
                let list = &mut self.files[fid.index()].tags;
                list.retain(|&t| t != tid);
                let at = insertion_point(list, target, &aggregate_pos);
                list.insert(at, tid);
            }
        }

        // Newly created tags join every file, positioned by the new aggregate
        // order relative to the tags the file already has
        for tid in created {
            let target = aggregate_pos[&tid];
            for fi in 0..self.files.len() {
                let fid = FileId(fi as u32);
                let at = insertion_point(&self.files[fi].tags, target, &aggregate_pos);
                self.files[fi].tags.insert(at, tid);
                self.tags[tid.index()].files.insert(fid);
            }
        }

        debug_assert!(
            self.order.iter().all(|&tid| {
                let entry = &self.tags[tid.index()];
                entry.alive && !entry.files.is_empty()
            }),
            "aggregate tag without file association"
        );

        self.merged = self.join_order();
        debug_assert_eq!(self.merged, new_text, "edit round-trip mismatch");
        Ok(())
    }

    /// Presence of a tag text across the session, unioned over duplicates.
    pub fn presence_of(&self, text: &str) -> TagPresence {
        let mut union: BTreeSet<FileId> = BTreeSet::new();
        for &tid in &self.order {
            let entry = &self.tags[tid.index()];
            if entry.text == text {
                union.extend(entry.files.iter().copied());
            }
        }
        if union.is_empty() {
            TagPresence::NotPresent
        } else if union.len() == self.files.len() {
            TagPresence::Full
        } else {
            TagPresence::Partial
        }
    }

    /// Make sure every file carries the given tag. Files missing it get the
    /// tag appended to the end of their own tag list, not re-sorted into its
    /// aggregate position. Idempotent.
    pub fn ensure_full_presence(&mut self, text: &str) -> Result<()> {
        if self.state != SessionState::Active {
            return Err(CapsyncError::Session(
                "No active multi-edit session".to_string(),
            ));
        }

        let existing = self
            .order
            .iter()
            .copied()
            .find(|tid| self.tags[tid.index()].text == text);

        let tid = match existing {
            Some(tid) => tid,
            None => {
                let tid = self.create_tag(text.to_string());
                self.order.push(tid);
                tid
            }
        };

        for fi in 0..self.files.len() {
            let fid = FileId(fi as u32);
            if self.tags[tid.index()].files.insert(fid) {
                self.files[fi].tags.push(tid);
            }
        }

        self.merged = self.join_order();
        Ok(())
    }

    /// Write every file's reconstructed caption through the store. Per-file
    /// failures are collected and reported as an overall error; remaining
    /// files are still written. No rollback.
    pub async fn save(&self, store: &dyn CaptionStore) -> Result<()> {
        let mut failures = Vec::new();
        for file in &self.files {
            let caption = self.join_file(file);
            if let Err(e) = store.save(&file.path, &caption).await {
                warn!("Failed to save caption for {}: {}", file.path.display(), e);
                failures.push(file.path.display().to_string());
            }
        }

        if failures.is_empty() {
            info!("Saved {} captions", self.files.len());
            Ok(())
        } else {
            Err(CapsyncError::Store(format!(
                "Failed to save {} of {} captions: {}",
                failures.len(),
                self.files.len(),
                failures.join(", ")
            )))
        }
    }

    /// Reconstructed caption per file, in load order.
    pub fn file_captions(&self) -> Vec<(&Path, String)> {
        self.files
            .iter()
            .map(|file| (file.path.as_path(), self.join_file(file)))
            .collect()
    }

    fn join_order(&self) -> String {
        self.order
            .iter()
            .map(|tid| self.tags[tid.index()].text.as_str())
            .collect::<Vec<_>>()
            .join(&self.separator)
    }

    fn join_file(&self, file: &FileEntry) -> String {
        file.tags
            .iter()
            .map(|tid| self.tags[tid.index()].text.as_str())
            .collect::<Vec<_>>()
            .join(&self.separator)
    }

    fn create_tag(&mut self, text: String) -> TagId {
        let tid = TagId(self.tags.len() as u32);
        self.tags.push(TagEntry {
            text,
            files: BTreeSet::new(),
            alive: true,
        });
        tid
    }

    /// Remove a tag from every file and tombstone it. The aggregate order is
    /// left to the caller, which rebuilds it during an edit.
    fn delete_tag(&mut self, tid: TagId) {
        let members: Vec<FileId> = self.tags[tid.index()].files.iter().copied().collect();
        for fid in members {
            self.files[fid.index()].tags.retain(|&t| t != tid);
        }
        let entry = &mut self.tags[tid.index()];
        entry.files.clear();
        entry.alive = false;
    }
}

/// Split a caption into verbatim tag texts. Nothing is trimmed, so rejoining
/// with the same separator reproduces the input exactly.
fn split_caption(text: &str, separator: &str) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    text.split(separator).map(String::from).collect()
}

/// Whether `left + right` equals `whole` when all whitespace is ignored.
/// Differing non-whitespace characters never compare equal.
fn concat_eq_ignore_ws(left: &str, right: &str, whole: &str) -> bool {
    let combined = left
        .chars()
        .chain(right.chars())
        .filter(|c| !c.is_whitespace());
    let target = whole.chars().filter(|c| !c.is_whitespace());
    combined.eq(target)
}

/// Index in `list` where a tag with aggregate position `target` belongs:
/// before the first tag that sorts after it, else at the end.
fn insertion_point(
    list: &[TagId],
    target: usize,
    aggregate_pos: &HashMap<TagId, usize>,
) -> usize {
    list.iter()
        .position(|tid| {
            aggregate_pos
                .get(tid)
                .copied()
                .is_some_and(|pos| pos > target)
        })
        .unwrap_or(list.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session_with(captions: &[(&str, &str)]) -> MultiEditSession {
        let mut session = MultiEditSession::new(", ");
        let pairs = captions
            .iter()
            .map(|&(name, text)| (PathBuf::from(name), text.to_string()))
            .collect();
        session.load_texts(pairs).unwrap();
        session
    }

    fn caption_of(session: &MultiEditSession, name: &str) -> String {
        session
            .file_captions()
            .into_iter()
            .find(|(path, _)| *path == Path::new(name))
            .map(|(_, caption)| caption)
            .unwrap()
    }

    #[test]
    fn test_load_merges_by_weighted_position() {
        let session = session_with(&[
            ("f1", "tag1, tag2, tag3"),
            ("f2", "tag1, tag2"),
            ("f3", "tag2, tag3"),
        ]);
        assert_eq!(session.merged_text(), "tag1, tag2, tag3");
        assert_eq!(session.tag_count(), 3);
    }

    #[test]
    fn test_round_trip_edit_leaves_captions_unchanged() {
        let mut session = session_with(&[
            ("f1", "tag1, tag2, tag3"),
            ("f2", "tag1, tag2"),
            ("f3", "tag2, tag3"),
        ]);
        let merged = session.merged_text().to_string();
        session.edit(&merged).unwrap();
        assert_eq!(caption_of(&session, "f1"), "tag1, tag2, tag3");
        assert_eq!(caption_of(&session, "f2"), "tag1, tag2");
        assert_eq!(caption_of(&session, "f3"), "tag2, tag3");
    }

    #[test]
    fn test_append_adds_tag_to_every_file() {
        let mut session = session_with(&[
            ("f1", "tag1, tag2, tag3"),
            ("f2", "tag1, tag2"),
            ("f3", "tag2, tag3"),
        ]);
        session.edit("tag1, tag2, tag3, tag4").unwrap();
        assert_eq!(caption_of(&session, "f1"), "tag1, tag2, tag3, tag4");
        assert_eq!(caption_of(&session, "f2"), "tag1, tag2, tag4");
        assert_eq!(caption_of(&session, "f3"), "tag2, tag3, tag4");
    }

    #[test]
    fn test_insert_in_middle_respects_file_order() {
        let mut session = session_with(&[("f1", "tag1, tag2, tag3"), ("f2", "tag1, tag2")]);
        session.edit("tag1, fresh, tag2, tag3").unwrap();
        assert_eq!(caption_of(&session, "f1"), "tag1, fresh, tag2, tag3");
        assert_eq!(caption_of(&session, "f2"), "tag1, fresh, tag2");
    }

    #[test]
    fn test_delete_removes_tag_from_all_files() {
        let mut session = session_with(&[("f1", "a, b, c"), ("f2", "b, c")]);
        session.edit("a, c").unwrap();
        assert_eq!(caption_of(&session, "f1"), "a, c");
        assert_eq!(caption_of(&session, "f2"), "c");
    }

    #[test]
    fn test_move_preserves_tag_identity() {
        let mut session = session_with(&[("f1", "tag1, tag2, tag3"), ("f2", "tag2, tag3")]);
        let before: Vec<TagId> = session.order.clone();
        session.edit("tag3, tag1, tag2").unwrap();

        // Same tag objects, only reordered
        let mut after = session.order.clone();
        after.sort();
        let mut expected = before.clone();
        expected.sort();
        assert_eq!(after, expected);

        // tag3 is the identical object that was last before the edit
        assert_eq!(session.order[0], before[2]);
        assert_eq!(caption_of(&session, "f1"), "tag3, tag1, tag2");
        assert_eq!(caption_of(&session, "f2"), "tag3, tag2");
    }

    #[test]
    fn test_rename_keeps_membership() {
        let mut session = session_with(&[("f1", "cat, dog"), ("f2", "dog")]);
        session.edit("cat, wolf").unwrap();
        assert_eq!(caption_of(&session, "f1"), "cat, wolf");
        assert_eq!(caption_of(&session, "f2"), "wolf");
    }

    #[test]
    fn test_split_keeps_membership_on_both_halves() {
        let mut session = session_with(&[("f1", "red hair, smile"), ("f2", "red hair")]);
        session.edit("red, hair, smile").unwrap();
        assert_eq!(caption_of(&session, "f1"), "red, hair, smile");
        assert_eq!(caption_of(&session, "f2"), "red, hair");
        assert_eq!(session.presence_of("red"), TagPresence::Full);
        assert_eq!(session.presence_of("hair"), TagPresence::Full);
        assert_eq!(session.presence_of("smile"), TagPresence::Partial);
    }

    #[test]
    fn test_merge_transfers_membership() {
        let mut session = session_with(&[("f1", "red, hair"), ("f2", "hair")]);
        session.edit("red hair").unwrap();
        assert_eq!(caption_of(&session, "f1"), "red hair");
        assert_eq!(caption_of(&session, "f2"), "red hair");
        assert_eq!(session.presence_of("red hair"), TagPresence::Full);
    }

    #[test]
    fn test_split_merge_inverse_restores_membership() {
        let mut session = session_with(&[("f1", "a, b"), ("f2", "a, b")]);
        session.edit("ab").unwrap();
        assert_eq!(caption_of(&session, "f1"), "ab");
        session.edit("a, b").unwrap();
        assert_eq!(caption_of(&session, "f1"), "a, b");
        assert_eq!(caption_of(&session, "f2"), "a, b");
        assert_eq!(session.presence_of("a"), TagPresence::Full);
        assert_eq!(session.presence_of("b"), TagPresence::Full);
    }

    #[test]
    fn test_no_false_split_when_characters_differ() {
        let mut session = session_with(&[("f1", "ab, rest"), ("f2", "ab")]);
        session.edit("a, c, rest").unwrap();
        // "a" + "c" != "ab", so this is a rename plus a created tag
        assert_eq!(caption_of(&session, "f1"), "a, c, rest");
        assert_eq!(caption_of(&session, "f2"), "a, c");
        assert_eq!(session.presence_of("c"), TagPresence::Full);
    }

    #[test]
    fn test_duplicates_aggregate_by_max_count() {
        let session = session_with(&[
            ("f1", "tag, tag, tag"),
            ("f2", "tag, tag, tag, tag"),
            ("f3", "tag, tag, tag, tag, tag"),
        ]);
        assert_eq!(session.merged_text(), "tag, tag, tag, tag, tag");
    }

    #[test]
    fn test_duplicate_edit_redistributes_by_count() {
        let mut session = session_with(&[
            ("f1", "tag, tag, tag"),
            ("f2", "tag, tag, tag, tag"),
            ("f3", "tag, tag, tag, tag, tag"),
        ]);
        session.edit("tag1, tag2, tag3, tag4, tag5").unwrap();
        assert_eq!(caption_of(&session, "f1"), "tag1, tag2, tag3");
        assert_eq!(caption_of(&session, "f2"), "tag1, tag2, tag3, tag4");
        assert_eq!(caption_of(&session, "f3"), "tag1, tag2, tag3, tag4, tag5");
    }

    #[test]
    fn test_duplicates_are_distinct_objects() {
        let mut session = session_with(&[("f1", "tag, tag"), ("f2", "tag")]);
        session.edit("tag, other").unwrap();
        // Editing the second duplicate leaves the first untouched
        assert_eq!(caption_of(&session, "f1"), "tag, other");
        assert_eq!(caption_of(&session, "f2"), "tag");
    }

    #[test]
    fn test_presence_levels() {
        let session = session_with(&[("f1", "a, b"), ("f2", "a")]);
        assert_eq!(session.presence_of("a"), TagPresence::Full);
        assert_eq!(session.presence_of("b"), TagPresence::Partial);
        assert_eq!(session.presence_of("z"), TagPresence::NotPresent);
    }

    #[test]
    fn test_ensure_full_presence_appends_to_missing_files() {
        let mut session = session_with(&[("f1", "a, b"), ("f2", "a")]);
        session.ensure_full_presence("b").unwrap();
        assert_eq!(caption_of(&session, "f1"), "a, b");
        assert_eq!(caption_of(&session, "f2"), "a, b");
        assert_eq!(session.presence_of("b"), TagPresence::Full);
    }

    #[test]
    fn test_ensure_full_presence_is_idempotent() {
        let mut session = session_with(&[("f1", "a"), ("f2", "a, b")]);
        session.ensure_full_presence("b").unwrap();
        let once = session.file_captions();
        let once: Vec<(PathBuf, String)> = once
            .into_iter()
            .map(|(p, c)| (p.to_path_buf(), c))
            .collect();
        session.ensure_full_presence("b").unwrap();
        let twice: Vec<(PathBuf, String)> = session
            .file_captions()
            .into_iter()
            .map(|(p, c)| (p.to_path_buf(), c))
            .collect();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_ensure_full_presence_creates_missing_tag() {
        let mut session = session_with(&[("f1", "a"), ("f2", "b")]);
        session.ensure_full_presence("new").unwrap();
        assert_eq!(caption_of(&session, "f1"), "a, new");
        assert_eq!(caption_of(&session, "f2"), "b, new");
        assert_eq!(session.presence_of("new"), TagPresence::Full);
    }

    #[test]
    fn test_empty_edit_clears_all_captions() {
        let mut session = session_with(&[("f1", "a, b"), ("f2", "b")]);
        session.edit("").unwrap();
        assert_eq!(session.merged_text(), "");
        assert_eq!(session.tag_count(), 0);
        assert_eq!(caption_of(&session, "f1"), "");
        assert_eq!(caption_of(&session, "f2"), "");
    }

    #[test]
    fn test_separator_change_rerenders_merged_view() {
        let mut session = session_with(&[("f1", "a, b")]);
        session.set_separator(". ");
        assert_eq!(session.merged_text(), "a. b");
        session.edit("a. b. c").unwrap();
        assert_eq!(caption_of(&session, "f1"), "a. b. c");
    }

    #[test]
    fn test_edit_without_session_fails() {
        let mut session = MultiEditSession::new(", ");
        assert!(session.edit("a, b").is_err());
        assert!(session.ensure_full_presence("a").is_err());
    }

    #[test]
    fn test_load_without_files_fails() {
        let mut session = MultiEditSession::new(", ");
        assert!(session.load_texts(Vec::new()).is_err());
        assert_eq!(session.state(), SessionState::Empty);
    }

    #[tokio::test]
    async fn test_load_is_all_or_nothing() {
        use crate::store::TxtCaptionStore;

        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.jpg");
        let missing = dir.path().join("missing.jpg");
        std::fs::write(dir.path().join("good.txt"), "tag1, tag2").unwrap();

        let store = TxtCaptionStore::new();
        let mut session = MultiEditSession::new(", ");
        let result = session.load(&[good, missing], &store).await;
        assert!(matches!(result, Err(CapsyncError::Caption(_))));
        assert_eq!(session.state(), SessionState::Empty);
        assert_eq!(session.file_count(), 0);
    }

    #[tokio::test]
    async fn test_save_reports_partial_failure_without_rollback() {
        use crate::store::TxtCaptionStore;

        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.jpg");
        let bad = dir.path().join("no-such-dir").join("bad.jpg");

        let mut session = MultiEditSession::new(", ");
        session
            .load_texts(vec![
                (good.clone(), "a, b".to_string()),
                (bad, "a".to_string()),
            ])
            .unwrap();
        session.edit("a, b, c").unwrap();

        let store = TxtCaptionStore::new();
        let result = session.save(&store).await;
        assert!(matches!(result, Err(CapsyncError::Store(_))));
        // The writable file was still flushed
        let written = std::fs::read_to_string(dir.path().join("good.txt")).unwrap();
        assert_eq!(written, "a, b, c");
    }

    #[test]
    fn test_clear_flushes_session_state() {
        let mut session = session_with(&[("f1", "a")]);
        assert_eq!(session.state(), SessionState::Active);
        session.clear();
        assert_eq!(session.state(), SessionState::Empty);
        assert_eq!(session.merged_text(), "");
        assert_eq!(session.file_count(), 0);
    }
}
