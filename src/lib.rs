//! Genecast is a library for turning the output of an ab initio gene predictor
//! into structured, queryable records in [Rust](https://www.rust-lang.org/).
//! It reads the predictor's GFF-like tabular output, reconstructs the
//! gene/transcript/feature hierarchy from file order, recovers the protein
//! sequences embedded in the comment lines, and separately flattens the JSON
//! report of a local protein alignment tool into a uniform hit list. The
//! resulting aggregates are ready for a persistence or serialization layer;
//! Genecast itself stays out of the storage and process-scheduling business.

pub mod alignment;
pub mod genecast_utils;
pub mod options;
pub mod prediction;
pub mod reader;
pub use alignment::{AlignmentHit, AlignmentOutcome, AlignmentReport, AlignmentTool, ToolOutput};
pub use prediction::{
    Feature, FeatureKind, Gene, GenePrediction, HierarchyBuilder, ParseWarning, Transcript,
};
