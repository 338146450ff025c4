pub mod classify;
pub mod priority;
pub mod seo;

pub use classify::{Classification, PrimaryImage, ProcessedMarkers, classify, is_sibling_of};
pub use priority::{ImageCandidate, rank_candidates, view_indices};
pub use seo::seo_file_name;
