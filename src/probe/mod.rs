//! Probe (iperf3) report parsing.

pub mod extract;
pub mod split;

pub use extract::{ProbeSide, extract_file, extract_samples, extract_samples_with_fallback};
pub use split::split_documents;
