use std::collections::HashMap;
use std::hash::Hash;

/// Kind of edit needed to turn one aligned region into the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpTag {
    Equal,
    Replace,
    Delete,
    Insert,
}

/// One aligned region: old[i1..i2] corresponds to new[j1..j2].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Opcode {
    pub tag: OpTag,
    pub i1: usize,
    pub i2: usize,
    pub j1: usize,
    pub j2: usize,
}

/// Compute alignment opcodes between two sequences.
///
/// Longest-common-subsequence alignment built from recursively located longest
/// matching blocks. Opcodes cover both sequences completely and in order:
/// concatenating the new-side spans reproduces `new`, the old-side spans `old`.
pub fn opcodes<T: Eq + Hash>(old: &[T], new: &[T]) -> Vec<Opcode> {
    let blocks = matching_blocks(old, new);

    let mut result = Vec::new();
    let (mut i, mut j) = (0usize, 0usize);
    for &(ai, bj, size) in &blocks {
        let tag = match (i < ai, j < bj) {
            (true, true) => Some(OpTag::Replace),
            (true, false) => Some(OpTag::Delete),
            (false, true) => Some(OpTag::Insert),
            (false, false) => None,
        };
        if let Some(tag) = tag {
            result.push(Opcode {
                tag,
                i1: i,
                i2: ai,
                j1: j,
                j2: bj,
            });
        }
        if size > 0 {
            result.push(Opcode {
                tag: OpTag::Equal,
                i1: ai,
                i2: ai + size,
                j1: bj,
                j2: bj + size,
            });
        }
        i = ai + size;
        j = bj + size;
    }

    result
}

/// Maximal matching blocks (old_start, new_start, len), sorted, with a
/// zero-length sentinel at the end of both sequences.
fn matching_blocks<T: Eq + Hash>(old: &[T], new: &[T]) -> Vec<(usize, usize, usize)> {
    // Index of each element's positions in `new`
    let mut new_positions: HashMap<&T, Vec<usize>> = HashMap::new();
    for (j, item) in new.iter().enumerate() {
        new_positions.entry(item).or_default().push(j);
    }

    let mut blocks = Vec::new();
    let mut pending = vec![(0usize, old.len(), 0usize, new.len())];

    while let Some((alo, ahi, blo, bhi)) = pending.pop() {
        let (besti, bestj, size) = longest_match(old, &new_positions, alo, ahi, blo, bhi);
        if size > 0 {
            blocks.push((besti, bestj, size));
            if alo < besti && blo < bestj {
                pending.push((alo, besti, blo, bestj));
            }
            if besti + size < ahi && bestj + size < bhi {
                pending.push((besti + size, ahi, bestj + size, bhi));
            }
        }
    }

    blocks.sort_unstable();

    // Merge adjacent blocks so opcode regions are maximal
    let mut merged: Vec<(usize, usize, usize)> = Vec::with_capacity(blocks.len() + 1);
    for (ai, bj, size) in blocks {
        match merged.last_mut() {
            Some((pi, pj, psize)) if *pi + *psize == ai && *pj + *psize == bj => {
                *psize += size;
            }
            _ => merged.push((ai, bj, size)),
        }
    }

    merged.push((old.len(), new.len(), 0));
    merged
}

/// Find the longest block where old[alo..ahi] and new[blo..bhi] agree.
/// Earliest block wins among equals, which keeps the alignment stable.
fn longest_match<T: Eq + Hash>(
    old: &[T],
    new_positions: &HashMap<&T, Vec<usize>>,
    alo: usize,
    ahi: usize,
    blo: usize,
    bhi: usize,
) -> (usize, usize, usize) {
    let mut besti = alo;
    let mut bestj = blo;
    let mut bestsize = 0usize;

    // run_lengths[j] = length of the matching run ending at old[i], new[j]
    let mut run_lengths: HashMap<usize, usize> = HashMap::new();
    for i in alo..ahi {
        let mut new_runs: HashMap<usize, usize> = HashMap::new();
        if let Some(positions) = new_positions.get(&old[i]) {
            for &j in positions {
                if j < blo {
                    continue;
                }
                if j >= bhi {
                    break;
                }
                let run = j
                    .checked_sub(1)
                    .and_then(|prev| run_lengths.get(&prev))
                    .copied()
                    .unwrap_or(0)
                    + 1;
                new_runs.insert(j, run);
                if run > bestsize {
                    besti = i + 1 - run;
                    bestj = j + 1 - run;
                    bestsize = run;
                }
            }
        }
        run_lengths = new_runs;
    }

    (besti, bestj, bestsize)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(ops: &[Opcode]) -> Vec<OpTag> {
        ops.iter().map(|op| op.tag).collect()
    }

    #[test]
    fn test_equal_sequences() {
        let a = vec!["x", "y", "z"];
        let ops = opcodes(&a, &a);
        assert_eq!(
            ops,
            vec![Opcode {
                tag: OpTag::Equal,
                i1: 0,
                i2: 3,
                j1: 0,
                j2: 3
            }]
        );
    }

    #[test]
    fn test_empty_new_is_delete() {
        let old = vec!["x", "y"];
        let new: Vec<&str> = vec![];
        let ops = opcodes(&old, &new);
        assert_eq!(tags(&ops), vec![OpTag::Delete]);
        assert_eq!((ops[0].i1, ops[0].i2), (0, 2));
    }

    #[test]
    fn test_append_is_insert() {
        let old = vec!["a", "b"];
        let new = vec!["a", "b", "c"];
        let ops = opcodes(&old, &new);
        assert_eq!(tags(&ops), vec![OpTag::Equal, OpTag::Insert]);
        assert_eq!((ops[1].j1, ops[1].j2), (2, 3));
    }

    #[test]
    fn test_replace_block() {
        let old = vec!["a", "b", "c"];
        let new = vec!["a", "x", "c"];
        let ops = opcodes(&old, &new);
        assert_eq!(tags(&ops), vec![OpTag::Equal, OpTag::Replace, OpTag::Equal]);
        let rep = ops[1];
        assert_eq!((rep.i1, rep.i2, rep.j1, rep.j2), (1, 2, 1, 2));
    }

    #[test]
    fn test_rotation_yields_insert_and_delete() {
        let old = vec!["t1", "t2", "t3"];
        let new = vec!["t3", "t1", "t2"];
        let ops = opcodes(&old, &new);
        assert_eq!(tags(&ops), vec![OpTag::Insert, OpTag::Equal, OpTag::Delete]);
        assert_eq!((ops[0].j1, ops[0].j2), (0, 1));
        assert_eq!((ops[2].i1, ops[2].i2), (2, 3));
    }

    #[test]
    fn test_full_replacement_of_duplicates() {
        let old = vec!["tag"; 5];
        let new = vec!["tag1", "tag2", "tag3", "tag4", "tag5"];
        let ops = opcodes(&old, &new);
        assert_eq!(tags(&ops), vec![OpTag::Replace]);
        let rep = ops[0];
        assert_eq!((rep.i1, rep.i2, rep.j1, rep.j2), (0, 5, 0, 5));
    }

    #[test]
    fn test_opcodes_cover_both_sequences() {
        let old = vec!["a", "b", "c", "d", "e"];
        let new = vec!["b", "c", "x", "e", "f"];
        let ops = opcodes(&old, &new);
        let (mut i, mut j) = (0, 0);
        for op in &ops {
            assert_eq!(op.i1, i);
            assert_eq!(op.j1, j);
            i = op.i2;
            j = op.j2;
        }
        assert_eq!(i, old.len());
        assert_eq!(j, new.len());
    }
}
