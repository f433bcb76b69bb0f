//! Line diff over rendered trees.

use crate::tree::Tree;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffLine {
    Same(String),
    Removed(String),
    Added(String),
}

impl std::fmt::Display for DiffLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Same(line) => write!(f, " {line}"),
            Self::Removed(line) => write!(f, "-{line}"),
            Self::Added(line) => write!(f, "+{line}"),
        }
    }
}

/// Largest changed region, in table cells, that gets a minimal LCS diff.
/// Bigger regions are reported as one removed block followed by one added
/// block.
pub const MAX_LCS_CELLS: usize = 4_000_000;

/// Longest-common-subsequence diff of two line sequences.
///
/// The common prefix and suffix are matched directly, so memory scales with
/// the changed region only, and that region is capped at [`MAX_LCS_CELLS`].
pub fn diff_lines(old: &[String], new: &[String]) -> Vec<DiffLine> {
    let prefix = old
        .iter()
        .zip(new)
        .take_while(|(a, b)| a == b)
        .count();
    let suffix = old[prefix..]
        .iter()
        .rev()
        .zip(new[prefix..].iter().rev())
        .take_while(|(a, b)| a == b)
        .count();

    let mut out = Vec::with_capacity(old.len().max(new.len()));
    out.extend(old[..prefix].iter().cloned().map(DiffLine::Same));
    let old_mid = &old[prefix..old.len() - suffix];
    let new_mid = &new[prefix..new.len() - suffix];
    if (old_mid.len() + 1).saturating_mul(new_mid.len() + 1) <= MAX_LCS_CELLS {
        lcs_diff(old_mid, new_mid, &mut out);
    } else {
        out.extend(old_mid.iter().cloned().map(DiffLine::Removed));
        out.extend(new_mid.iter().cloned().map(DiffLine::Added));
    }
    out.extend(old[old.len() - suffix..].iter().cloned().map(DiffLine::Same));
    out
}

fn lcs_diff(old: &[String], new: &[String], out: &mut Vec<DiffLine>) {
    let (n, m) = (old.len(), new.len());
    let width = m + 1;
    // lcs[i * width + j] = LCS length of old[i..] and new[j..]
    let mut lcs = vec![0u32; (n + 1) * width];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            lcs[i * width + j] = if old[i] == new[j] {
                lcs[(i + 1) * width + j + 1] + 1
            } else {
                lcs[(i + 1) * width + j].max(lcs[i * width + j + 1])
            };
        }
    }

    let (mut i, mut j) = (0, 0);
    while i < n && j < m {
        if old[i] == new[j] {
            out.push(DiffLine::Same(old[i].clone()));
            i += 1;
            j += 1;
        } else if lcs[(i + 1) * width + j] >= lcs[i * width + j + 1] {
            out.push(DiffLine::Removed(old[i].clone()));
            i += 1;
        } else {
            out.push(DiffLine::Added(new[j].clone()));
            j += 1;
        }
    }
    out.extend(old[i..].iter().cloned().map(DiffLine::Removed));
    out.extend(new[j..].iter().cloned().map(DiffLine::Added));
}

/// Structural diff of two trees, rendered without source positions.
pub fn tree_diff(original: &Tree, generated: &Tree) -> String {
    diff_lines(&original.render_lines(), &generated.render_lines())
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn identical_inputs_have_no_changes() {
        let a = lines(&["(a", "  (b))"]);
        assert!(
            diff_lines(&a, &a)
                .iter()
                .all(|line| matches!(line, DiffLine::Same(_)))
        );
    }

    #[test]
    fn replaced_line_shows_removal_then_addition() {
        let old = lines(&["x", "y", "z"]);
        let new = lines(&["x", "q", "z"]);
        assert_eq!(
            diff_lines(&old, &new),
            vec![
                DiffLine::Same("x".into()),
                DiffLine::Removed("y".into()),
                DiffLine::Added("q".into()),
                DiffLine::Same("z".into()),
            ]
        );
    }

    #[test]
    fn tails_are_flushed() {
        let old = lines(&["a"]);
        let new = lines(&["a", "b", "c"]);
        let rendered: Vec<String> = diff_lines(&old, &new)
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(rendered, vec![" a", "+b", "+c"]);
    }

    #[test]
    fn long_inputs_with_a_small_change_stay_linear() {
        let old: Vec<String> = (0..20_000).map(|i| format!("  (int {i})")).collect();
        let mut new = old.clone();
        new.insert(10_000, "  (str \"extra\")".to_string());
        let diff = diff_lines(&old, &new);
        assert_eq!(diff.len(), 20_001);
        let changed: Vec<&DiffLine> = diff
            .iter()
            .filter(|line| !matches!(line, DiffLine::Same(_)))
            .collect();
        assert_eq!(changed, vec![&DiffLine::Added("  (str \"extra\")".to_string())]);
        assert_eq!(diff[10_000], DiffLine::Added("  (str \"extra\")".to_string()));
    }

    #[test]
    fn oversized_change_falls_back_to_block_replacement() {
        let old: Vec<String> = (0..3_000).map(|i| format!("a{i}")).collect();
        let new: Vec<String> = (0..3_000).map(|i| format!("b{i}")).collect();
        let mut wrapped_old = vec!["head".to_string()];
        wrapped_old.extend(old.iter().cloned());
        wrapped_old.push("tail".to_string());
        let mut wrapped_new = vec!["head".to_string()];
        wrapped_new.extend(new.iter().cloned());
        wrapped_new.push("tail".to_string());

        let diff = diff_lines(&wrapped_old, &wrapped_new);
        assert_eq!(diff.len(), 6_002);
        assert_eq!(diff[0], DiffLine::Same("head".into()));
        assert_eq!(diff[1], DiffLine::Removed("a0".into()));
        assert_eq!(diff[3_000], DiffLine::Removed("a2999".into()));
        assert_eq!(diff[3_001], DiffLine::Added("b0".into()));
        assert_eq!(diff[6_001], DiffLine::Same("tail".into()));
    }

    #[test]
    fn prefix_and_suffix_do_not_overlap() {
        let old = lines(&["a", "a"]);
        let new = lines(&["a"]);
        let rendered: Vec<String> = diff_lines(&old, &new)
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(rendered, vec![" a", "-a"]);
    }
}
