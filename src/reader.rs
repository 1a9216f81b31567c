pub mod gff;
pub use gff::FeatureType;
pub use gff::GffParse;
pub use gff::GffRecord;
pub use gff::ProteinScanner;
