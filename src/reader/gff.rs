use crate::genecast_utils::reader_from_path;
use crate::options::Strand;
use anyhow::{self, Context};
use std::collections::HashMap;
use std::io::BufRead;
use std::path::Path;
use tracing::info;

/// The literal marker that introduces an embedded protein sequence in the
/// comment lines of a prediction file.
const PROTEIN_MARKER: &str = "# protein sequence";

#[derive(Debug, Clone, PartialEq, Eq)]
/// Represents the type of a predicted feature record.
///
/// This enumeration categorizes the record types a gene predictor emits in its
/// tabular output. The hierarchy-bearing types (gene, transcript and the four
/// sub-transcript features) get their own variants; everything else is carried
/// through as [FeatureType::Other] so that unknown record types never fail the
/// parse.
///
/// # Variants
///
/// * `Gene` - A predicted gene, the root of the containment hierarchy.
/// * `Transcript` - A predicted transcript, owned by the enclosing gene.
/// * `Exon` - An exon of the enclosing transcript.
/// * `Cds` - A coding region of the enclosing transcript.
/// * `StartCodon` - The start codon of the enclosing transcript.
/// * `StopCodon` - The stop codon of the enclosing transcript.
/// * `Other` - Any other record type, carried through verbatim.
///
pub enum FeatureType {
    Gene,
    Transcript,
    Exon,
    Cds,
    StartCodon,
    StopCodon,
    Other(String),
}

impl std::str::FromStr for FeatureType {
    type Err = anyhow::Error;

    /// Parses a string slice into a [FeatureType].
    ///
    /// Unrecognized record types map to [FeatureType::Other] rather than an
    /// error, so this conversion is infallible in practice; the [Result]
    /// return type exists to satisfy the [std::str::FromStr] contract.
    fn from_str(s: &str) -> anyhow::Result<FeatureType> {
        let ft = match s {
            "gene" => FeatureType::Gene,
            "transcript" => FeatureType::Transcript,
            "exon" => FeatureType::Exon,
            "CDS" => FeatureType::Cds,
            "start_codon" => FeatureType::StartCodon,
            "stop_codon" => FeatureType::StopCodon,
            _ => FeatureType::Other(s.to_string()),
        };
        Ok(ft)
    }
}

#[derive(Debug, Clone)]
/// Represents one parsed record line of a gene-prediction file.
///
/// Prediction output is GFF-like: nine (or more) tab-separated columns, where
/// the ninth column carries a `;`-separated, `=`-delimited attribute string.
/// One [GffRecord] corresponds to one non-comment line; the containment
/// hierarchy between records is reconstructed separately, from file order,
/// by [crate::prediction::HierarchyBuilder].
///
/// # Fields
///
/// * `seqid`: The identifier of the sequence the record lies on.
/// * `source`: The tool that produced the record.
/// * `feature_type`: The record type, see [FeatureType].
/// * `start`: The 1-based, inclusive start coordinate.
/// * `end`: The 1-based, inclusive end coordinate.
/// * `score`: The score column, passed through unvalidated; `.` means absent.
/// * `strand`: The strand of the record; `.` means absent.
/// * `phase`: The coding phase; populated only when the column holds a
///   non-negative integer literal, absent otherwise (including `.`).
/// * `attributes`: The attribute mapping parsed from the ninth column.
///   Tokens without a `=` are dropped; for duplicate keys the last
///   occurrence wins.
///
pub struct GffRecord {
    pub seqid: String,
    pub source: String,
    pub feature_type: FeatureType,
    pub start: i64,
    pub end: i64,
    pub score: Option<String>,
    pub strand: Option<Strand>,
    pub phase: Option<u8>,
    pub attributes: HashMap<String, String>,
}

impl GffRecord {
    /// Parses one line of prediction output into an optional [GffRecord].
    ///
    /// ### Arguments
    ///
    /// * `line`: One line of the input stream, without its trailing newline.
    ///
    /// ### Returns
    ///
    /// Returns an [`anyhow::Result<Option<GffRecord>>`]:
    /// * `Ok(Some(GffRecord))`: The line is a well-formed record line.
    /// * `Ok(None)`: The line is inert - blank, a comment, or has fewer than
    ///   nine tab-separated columns. Inert lines are not an error; prediction
    ///   output freely interleaves them with record lines.
    /// * `Err(anyhow::Error)`: The start or end column does not parse as an
    ///   integer. A malformed gene model must fail the whole file rather than
    ///   be skipped silently, so this error is meant to be propagated.
    pub fn parse_line(line: &str) -> anyhow::Result<Option<GffRecord>> {
        if line.is_empty() || line.starts_with('#') {
            return Ok(None);
        }

        let columns: Vec<&str> = line.split('\t').collect();
        if columns.len() < 9 {
            return Ok(None);
        }

        let start: i64 = columns[3]
            .parse()
            .with_context(|| format!("Could not parse the start coordinate {:?}", columns[3]))?;
        let end: i64 = columns[4]
            .parse()
            .with_context(|| format!("Could not parse the end coordinate {:?}", columns[4]))?;

        // the phase column is taken only when it is a bare digit string;
        // `.` and negative values mean absent
        let phase = if !columns[7].is_empty() && columns[7].bytes().all(|b| b.is_ascii_digit()) {
            columns[7].parse::<u8>().ok()
        } else {
            None
        };

        let mut attributes = HashMap::new();
        for item in columns[8].split(';') {
            if let Some((key, value)) = item.split_once('=') {
                attributes.insert(key.to_string(), value.to_string());
            }
        }

        Ok(Some(GffRecord {
            seqid: columns[0].to_string(),
            source: columns[1].to_string(),
            feature_type: columns[2].parse()?,
            start,
            end,
            score: match columns[5] {
                "." => None,
                s => Some(s.to_string()),
            },
            strand: Strand::from_column(columns[6]),
            phase,
            attributes,
        }))
    }
}

/// The result of scanning a prediction stream for embedded protein sequences.
///
/// # Fields
///
/// * `sequences`: The completed protein sequences, in order of appearance.
/// * `unterminated`: Whether the stream ended while a directive was still
///   accumulating. The partial sequence is dropped, matching the permissive
///   upstream behavior, but the condition is surfaced so callers can report it.
pub struct ProteinScan {
    pub sequences: Vec<String>,
    pub unterminated: bool,
}

#[derive(Default)]
/// Reassembles the protein sequences a gene predictor embeds in its comment
/// lines.
///
/// A directive looks like `# protein sequence = [MKVLAG...` and may span
/// several comment lines; the closing `]` ends it. The scanner is fed every
/// raw line of the stream and accumulates between the opening marker and the
/// closing bracket, stripping `#`, `[`, `]` and space characters from the
/// accumulated text. Multiple directives in one stream produce multiple
/// sequences in order of appearance.
///
/// # Examples
///
/// ```rust
/// use genecast::reader::ProteinScanner;
///
/// let mut scanner = ProteinScanner::default();
/// scanner.feed("# protein sequence = [MKV");
/// scanner.feed("# LAG]");
/// let scan = scanner.finish();
/// assert_eq!(scan.sequences, vec![String::from("MKVLAG")]);
/// ```
pub struct ProteinScanner {
    sequences: Vec<String>,
    buffer: String,
    reading: bool,
}

impl ProteinScanner {
    /// Feeds one raw line of the input stream to the scanner.
    ///
    /// The line the directive marker appears on only opens the accumulation;
    /// the closing `]` is honored on subsequent lines.
    pub fn feed(&mut self, line: &str) {
        let line = line.trim();

        if line.starts_with(PROTEIN_MARKER) {
            if let Some((_, rest)) = line.split_once('=') {
                self.reading = true;
                self.buffer.clear();
                push_residues(&mut self.buffer, rest);
                return;
            }
        }

        if self.reading {
            push_residues(&mut self.buffer, line.trim_start_matches('#'));
            if line.contains(']') {
                self.sequences.push(std::mem::take(&mut self.buffer));
                self.reading = false;
            }
        }
    }

    /// Completes the scan, yielding the collected sequences.
    ///
    /// A directive still open at end of input contributes no sequence; the
    /// returned [ProteinScan] flags the condition instead.
    pub fn finish(self) -> ProteinScan {
        ProteinScan {
            sequences: self.sequences,
            unterminated: self.reading,
        }
    }
}

/// Appends `chunk` to `buffer` with the `[`, `]` and space decorations removed.
fn push_residues(buffer: &mut String, chunk: &str) {
    buffer.extend(chunk.chars().filter(|c| !matches!(c, '[' | ']' | ' ')));
}

/// The result of one pass over a prediction stream.
///
/// # Fields
///
/// * `records`: The parsed record lines, in file order.
/// * `proteins`: The protein sequences recovered from comment lines, in
///   order of appearance.
/// * `unterminated_directive`: Whether the stream ended inside a protein
///   sequence directive.
#[derive(Debug)]
pub struct GffParse {
    pub records: Vec<GffRecord>,
    pub proteins: Vec<String>,
    pub unterminated_directive: bool,
}

impl GffParse {
    /// Reads a gene-prediction file from the given path.
    ///
    /// This function reads record lines and embedded protein sequence
    /// directives from a GFF-like prediction file and collects them into a
    /// [GffParse]. It supports both plain text and gzipped files,
    /// automatically detecting the file format.
    ///
    /// # Type Parameters
    ///
    /// * `T`: A type that can be referenced as a file path, implementing the `AsRef<Path>` trait.
    ///
    /// # Arguments
    ///
    /// * `file_path`: The file path to the prediction file to be read. Can be either plain text or gzipped.
    ///
    /// # Returns
    ///
    /// Returns [`anyhow::Result<GffParse>`]:
    /// * `Ok(GffParse)`: The parsed stream if successful.
    /// * `Err(anyhow::Error)`: An error if there is a problem opening the file, reading from it,
    ///   or if a record line carries a non-integer coordinate.
    pub fn from_path<T: AsRef<Path>>(file_path: T) -> anyhow::Result<GffParse> {
        let rdr = reader_from_path(file_path)?;
        GffParse::from_reader(rdr)
    }

    /// Reads a gene-prediction stream from the given reader.
    ///
    /// Record parsing and protein sequence recovery happen in the same single
    /// pass: every line is offered to the [ProteinScanner] and to the record
    /// parser. A coordinate parse failure aborts the whole read with the
    /// 1-based line number attached, so callers never observe a partially
    /// parsed stream.
    pub fn from_reader<T: BufRead>(rdr: T) -> anyhow::Result<GffParse> {
        let mut records = Vec::new();
        let mut scanner = ProteinScanner::default();
        let mut n_comments = 0usize;

        for (idx, l) in rdr.lines().enumerate() {
            let line = l?;
            scanner.feed(&line);
            match GffRecord::parse_line(&line)
                .with_context(|| format!("Failed parsing the record at line {}", idx + 1))?
            {
                Some(record) => records.push(record),
                None => {
                    if line.starts_with('#') {
                        n_comments += 1;
                    }
                }
            }
        }

        let scan = scanner.finish();
        info!(
            "Finished parsing the input stream. Found {} comments and {} records, and recovered {} protein sequences.",
            n_comments,
            records.len(),
            scan.sequences.len()
        );

        Ok(GffParse {
            records,
            proteins: scan.sequences,
            unterminated_directive: scan.unterminated,
        })
    }
}
