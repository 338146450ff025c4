use crate::filename::classify::{file_extension, split_key};
use serde::Serialize;
use std::collections::HashSet;

pub const PRIMARY_RANK: u8 = 1;
pub const UNRANKED: u8 = 99;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageCandidate {
    pub key: String,
    pub file_name: String,
    pub extension: String,
    pub rank: u8,
}

impl ImageCandidate {
    pub fn from_key(key: impl Into<String>) -> Self {
        let key = key.into();
        let file_name = split_key(&key).1.to_string();
        let extension = file_extension(&file_name);
        let rank = rank_of(&file_name);
        Self {
            key,
            file_name,
            extension,
            rank,
        }
    }

    pub fn is_primary(&self) -> bool {
        self.rank == PRIMARY_RANK
    }

    fn suffix_digit(&self) -> Option<usize> {
        (2..=9).contains(&self.rank).then_some(usize::from(self.rank))
    }
}

/// View numbers for SEO names, one per candidate of a ranked batch.
///
/// The first primary gets none and `-N` files keep their digit. Everything
/// else (unranked files, a second primary, a repeated digit) is numbered
/// upwards from the highest digit in the batch, so no two candidates share
/// a number.
pub fn view_indices(candidates: &[ImageCandidate]) -> Vec<Option<usize>> {
    let mut next = candidates
        .iter()
        .filter_map(ImageCandidate::suffix_digit)
        .max()
        .unwrap_or(usize::from(PRIMARY_RANK));
    let mut used = HashSet::new();
    let mut primary_named = false;

    candidates
        .iter()
        .map(|candidate| {
            if candidate.is_primary() && !primary_named {
                primary_named = true;
                return None;
            }
            if let Some(digit) = candidate.suffix_digit()
                && used.insert(digit)
            {
                return Some(digit);
            }
            next += 1;
            Some(next)
        })
        .collect()
}

/// `sku.ext` ranks 1, `sku-N.ext` ranks N for N in 2..=9, anything else 99.
pub fn rank_of(file_name: &str) -> u8 {
    let name = file_name.to_lowercase();
    if !(name.ends_with(".png") || name.ends_with(".jpg") || name.ends_with(".jpeg")) {
        return UNRANKED;
    }
    if let Some(digit) = (2..=9u8).find(|d| name.contains(&format!("-{d}"))) {
        return digit;
    }
    if !name.contains(['-', '_']) {
        return PRIMARY_RANK;
    }
    UNRANKED
}

/// Stable ascending sort, so equal ranks keep listing order.
pub fn rank_candidates<I, S>(keys: I) -> Vec<ImageCandidate>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut candidates: Vec<ImageCandidate> =
        keys.into_iter().map(ImageCandidate::from_key).collect();
    candidates.sort_by_key(|candidate| candidate.rank);
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranks_follow_suffix_digits() {
        assert_eq!(rank_of("sku.jpg"), 1);
        for digit in 2..=9u8 {
            assert_eq!(rank_of(&format!("sku-{digit}.jpg")), digit);
        }
        assert_eq!(rank_of("sku_back.jpg"), UNRANKED);
        assert_eq!(rank_of("sku-1.jpg"), UNRANKED);
        assert_eq!(rank_of("sku.gif"), UNRANKED);
    }

    #[test]
    fn rank_is_case_insensitive() {
        assert_eq!(rank_of("SKU.PNG"), 1);
        assert_eq!(rank_of("SKU-3.JPEG"), 3);
    }

    #[test]
    fn lowest_digit_wins_when_several_match() {
        assert_eq!(rank_of("sku-7-3.jpg"), 3);
    }

    #[test]
    fn ordering_puts_primary_first_and_unknown_last() {
        let ordered = rank_candidates([
            "images/36-9.png",
            "images/36_detail.jpg",
            "images/36-2.jpg",
            "images/36.jpg",
        ]);
        let keys: Vec<&str> = ordered.iter().map(|c| c.key.as_str()).collect();
        assert_eq!(
            keys,
            vec![
                "images/36.jpg",
                "images/36-2.jpg",
                "images/36-9.png",
                "images/36_detail.jpg"
            ]
        );
    }

    #[test]
    fn equal_ranks_keep_listing_order() {
        let ordered = rank_candidates(["images/36_b.jpg", "images/36_a.jpg"]);
        assert_eq!(ordered[0].file_name, "36_b.jpg");
        assert_eq!(ordered[1].file_name, "36_a.jpg");
    }

    #[test]
    fn directory_hyphens_do_not_affect_rank() {
        let candidate = ImageCandidate::from_key("product-images/36.jpg");
        assert!(candidate.is_primary());
    }

    #[test]
    fn view_indices_prefer_suffix_digit() {
        let ordered = rank_candidates(["p/36.jpg", "p/36-4.jpg", "p/36_zoom.jpg"]);
        assert_eq!(view_indices(&ordered), vec![None, Some(4), Some(5)]);
    }

    #[test]
    fn unranked_views_never_reuse_a_digit() {
        let ordered = rank_candidates(["p/36.jpg", "p/36-3.jpg", "p/36_zoom.jpg"]);
        assert_eq!(view_indices(&ordered), vec![None, Some(3), Some(4)]);
    }

    #[test]
    fn unranked_views_count_from_two_without_digits() {
        let ordered = rank_candidates(["p/36.jpg", "p/36_a.jpg", "p/36_b.jpg"]);
        assert_eq!(view_indices(&ordered), vec![None, Some(2), Some(3)]);
    }

    #[test]
    fn repeated_primary_and_digit_get_fresh_views() {
        let ordered = rank_candidates(["p/36.jpg", "p/36.png", "p/36-2.jpg", "p/36-2-b.jpg"]);
        assert_eq!(
            view_indices(&ordered),
            vec![None, Some(3), Some(2), Some(4)]
        );
    }
}
