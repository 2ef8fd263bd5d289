//! Deduplication and ordering finalizer.
//!
//! Whatever strategy produced the list, the output handed to packaging is
//! canonical: unique references, first-seen order, dense 1-based indices,
//! truncated to the cap.

use std::collections::HashSet;

use super::Chapter;

pub fn finalize_chapters(found: Vec<Chapter>, cap: Option<usize>) -> Vec<Chapter> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut out: Vec<Chapter> = Vec::with_capacity(found.len());

    for chapter in found {
        if !seen.insert(chapter.reference.clone()) {
            continue;
        }
        out.push(chapter);
        if cap.is_some_and(|cap| out.len() >= cap) {
            break;
        }
    }

    for (i, chapter) in out.iter_mut().enumerate() {
        chapter.index = i as u32 + 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ch(index: u32, reference: &str) -> Chapter {
        Chapter {
            index,
            title: format!("Chapter {index}"),
            reference: reference.to_string(),
        }
    }

    #[test]
    fn keeps_first_occurrence_in_discovery_order() {
        let input = vec![ch(1, "A"), ch(2, "B"), ch(3, "A"), ch(4, "C"), ch(5, "B")];
        let out = finalize_chapters(input, None);

        let refs: Vec<&str> = out.iter().map(|c| c.reference.as_str()).collect();
        assert_eq!(refs, vec!["A", "B", "C"]);
        let indices: Vec<u32> = out.iter().map(|c| c.index).collect();
        assert_eq!(indices, vec![1, 2, 3]);
    }

    #[test]
    fn renumbers_densely_after_dedup() {
        let input = vec![ch(7, "A"), ch(7, "A"), ch(42, "B")];
        let out = finalize_chapters(input, None);
        assert_eq!(out[0].index, 1);
        assert_eq!(out[1].index, 2);
    }

    #[test]
    fn cap_truncates_after_dedup() {
        let input = vec![ch(1, "A"), ch(2, "A"), ch(3, "B"), ch(4, "C"), ch(5, "D")];
        let out = finalize_chapters(input, Some(2));
        let refs: Vec<&str> = out.iter().map(|c| c.reference.as_str()).collect();
        assert_eq!(refs, vec!["A", "B"]);
    }

    #[test]
    fn empty_input_stays_empty() {
        assert!(finalize_chapters(Vec::new(), Some(3)).is_empty());
    }
}
