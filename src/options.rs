use anyhow::bail;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
/// Represents the strand of a predicted feature.
///
/// Prediction output marks each record as lying on the forward (`+`) or
/// reverse (`-`) strand; a `.` in the strand column means the predictor did
/// not assign one, which is modeled as the absence of a [Strand] rather than
/// as a third variant.
pub enum Strand {
    Positive,
    Negative,
}

impl Strand {
    /// Maps the strand column of a prediction record to an optional [Strand].
    ///
    /// `+` and `-` map to [Strand::Positive] and [Strand::Negative]; `.` and
    /// any other token map to [None].
    pub fn from_column(s: &str) -> Option<Strand> {
        match s {
            "+" => Some(Strand::Positive),
            "-" => Some(Strand::Negative),
            _ => None,
        }
    }
}

impl std::fmt::Display for Strand {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Strand::Positive => write!(f, "+"),
            Strand::Negative => write!(f, "-"),
        }
    }
}

#[derive(Debug, Copy, Clone)]
/// Configuration options for normalizing alignment reports.
///
/// # Fields
///
/// * `query_label_len`: The number of leading characters of the query
///   sequence carried into each emitted hit record as its query label.
///   Defaults to 50, which is what the upstream reporting layer displays.
pub struct AlignOptions {
    pub query_label_len: usize,
}

impl Default for AlignOptions {
    fn default() -> AlignOptions {
        AlignOptions {
            query_label_len: 50,
        }
    }
}

impl AlignOptions {
    /// Constructs a new [AlignOptions] instance with a custom query label length.
    ///
    /// ### Arguments
    ///
    /// * `query_label_len`: The number of leading characters of the query sequence
    ///   used as the label of each emitted hit record. Must be non-zero.
    ///
    /// ### Returns
    ///
    /// Returns an [`anyhow::Result<AlignOptions>`] that is an error variant if
    /// `query_label_len` is zero.
    pub fn new(query_label_len: usize) -> anyhow::Result<AlignOptions> {
        if query_label_len == 0 {
            bail!("The query label length must be non-zero; Could not create AlignOptions")
        }
        Ok(AlignOptions { query_label_len })
    }
}

#[derive(Debug, Copy, Clone)]
/// Configuration options for writing protein sequences as FASTA.
///
/// # Fields
///
/// * `line_width`: The number of residues written per sequence line.
///   Defaults to 60, the width the downstream alignment tooling expects.
pub struct FastaWriteOptions {
    pub line_width: usize,
}

impl Default for FastaWriteOptions {
    fn default() -> FastaWriteOptions {
        FastaWriteOptions { line_width: 60 }
    }
}

impl FastaWriteOptions {
    /// Constructs a new [FastaWriteOptions] instance with a custom line width.
    ///
    /// ### Arguments
    ///
    /// * `line_width`: The number of residues per sequence line. Must be non-zero.
    ///
    /// ### Returns
    ///
    /// Returns an [`anyhow::Result<FastaWriteOptions>`] that is an error variant
    /// if `line_width` is zero.
    pub fn new(line_width: usize) -> anyhow::Result<FastaWriteOptions> {
        if line_width == 0 {
            bail!("The FASTA line width must be non-zero; Could not create FastaWriteOptions")
        }
        Ok(FastaWriteOptions { line_width })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strand_from_column() {
        assert_eq!(Strand::from_column("+"), Some(Strand::Positive));
        assert_eq!(Strand::from_column("-"), Some(Strand::Negative));
        assert_eq!(Strand::from_column("."), None);
        assert_eq!(Strand::from_column("?"), None);
    }

    #[test]
    fn test_invalid_options() {
        assert!(AlignOptions::new(0).is_err());
        assert!(FastaWriteOptions::new(0).is_err());
        assert_eq!(AlignOptions::default().query_label_len, 50);
        assert_eq!(FastaWriteOptions::default().line_width, 60);
    }
}
