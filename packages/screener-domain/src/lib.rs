pub mod normalize;
pub mod projection;
pub mod similarity;
pub mod variant;

mod error;

pub use error::{Error, Result};
pub use normalize::{NormalizedKey, normalize};
pub use projection::{AdverseMediaSummary, project_adverse_media};
pub use similarity::{SIMILARITY_THRESHOLD, Similarity};
pub use variant::{NameScope, TargetNames, extract_candidate_names};
