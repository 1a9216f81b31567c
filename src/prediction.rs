use crate::options::FastaWriteOptions;
use crate::reader::gff::{FeatureType, GffParse, GffRecord};
use anyhow::Context;
use noodles::fasta::record::{Definition, Sequence};
use serde::Serialize;
use std::io::Write;
use std::path::Path;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
/// The kind of a sub-transcript feature.
///
/// Only these four record types are attached to transcripts; every other
/// record type is either hierarchy-bearing (gene, transcript) or ignored.
/// Serialized with the upstream predictor's spelling.
pub enum FeatureKind {
    #[serde(rename = "exon")]
    Exon,
    #[serde(rename = "CDS")]
    Cds,
    #[serde(rename = "start_codon")]
    StartCodon,
    #[serde(rename = "stop_codon")]
    StopCodon,
}

impl std::fmt::Display for FeatureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            FeatureKind::Exon => write!(f, "exon"),
            FeatureKind::Cds => write!(f, "CDS"),
            FeatureKind::StartCodon => write!(f, "start_codon"),
            FeatureKind::StopCodon => write!(f, "stop_codon"),
        }
    }
}

impl FeatureType {
    /// Returns the [FeatureKind] this record type maps to, or [None] for the
    /// hierarchy-bearing and unrecognized types.
    pub fn feature_kind(&self) -> Option<FeatureKind> {
        match self {
            FeatureType::Exon => Some(FeatureKind::Exon),
            FeatureType::Cds => Some(FeatureKind::Cds),
            FeatureType::StartCodon => Some(FeatureKind::StartCodon),
            FeatureType::StopCodon => Some(FeatureKind::StopCodon),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
/// A sub-transcript feature: an exon, coding region, or start/stop codon.
pub struct Feature {
    #[serde(rename = "feature_type")]
    pub kind: FeatureKind,
    pub start: i64,
    pub end: i64,
}

#[derive(Debug, Clone, Serialize)]
/// A predicted transcript and the ordered features it owns.
pub struct Transcript {
    #[serde(rename = "transcript_id")]
    pub id: String,
    pub features: Vec<Feature>,
}

#[derive(Debug, Clone, Serialize)]
/// A predicted gene: its span, its ordered transcripts, and the protein
/// sequence the predictor emitted for it, when one was recovered.
///
/// # Fields
///
/// * `id`: The gene identifier, taken from the record's `ID` attribute or
///   generated deterministically when the attribute is absent.
/// * `start`, `end`: The 1-based inclusive span of the gene record.
/// * `protein_sequence`: The protein sequence paired with this gene by
///   positional order of appearance in the input, see [HierarchyBuilder].
/// * `transcripts`: The transcripts owned by this gene, in file order.
///
pub struct Gene {
    #[serde(rename = "gene_id")]
    pub id: String,
    pub start: i64,
    pub end: i64,
    pub protein_sequence: Option<String>,
    pub transcripts: Vec<Transcript>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// A non-fatal anomaly observed while reconstructing the hierarchy.
///
/// The permissive upstream behavior is to drop these records silently; the
/// warnings channel preserves that behavior on the primary path while making
/// the drops observable to callers and tests.
pub enum ParseWarning {
    /// A transcript record appeared with no open gene and was dropped.
    OrphanTranscript { id: String },
    /// A feature record appeared with no open transcript and was dropped.
    OrphanFeature { kind: FeatureKind, start: i64 },
    /// The input ended inside a protein sequence directive; the partial
    /// sequence was dropped.
    UnterminatedProteinDirective,
    /// More protein sequences than gene records; the extras were discarded.
    UnassignedProteins(usize),
    /// A gene record carried no `ID` attribute and received a generated one.
    GeneratedGeneId { id: String },
    /// A transcript record carried no `ID` attribute and received a generated one.
    GeneratedTranscriptId { id: String },
}

impl std::fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            ParseWarning::OrphanTranscript { id } => {
                write!(f, "dropped transcript record {} with no open gene", id)
            }
            ParseWarning::OrphanFeature { kind, start } => write!(
                f,
                "dropped {} record at position {} with no open transcript",
                kind, start
            ),
            ParseWarning::UnterminatedProteinDirective => {
                write!(f, "the input ended inside a protein sequence directive")
            }
            ParseWarning::UnassignedProteins(n) => {
                write!(f, "discarded {} protein sequences with no gene record", n)
            }
            ParseWarning::GeneratedGeneId { id } => {
                write!(f, "gene record without an ID attribute was assigned {}", id)
            }
            ParseWarning::GeneratedTranscriptId { id } => write!(
                f,
                "transcript record without an ID attribute was assigned {}",
                id
            ),
        }
    }
}

/// The single open gene/transcript cursor of the hierarchy builder.
///
/// Prediction output carries no parent identifiers that could be trusted, so
/// file order is the only structural signal: at any point of the stream, at
/// most one gene is open for mutation and at most one transcript is open
/// within it. The cursor makes those states explicit.
enum Cursor {
    Idle,
    Gene(Gene),
    Transcript(Gene, Transcript),
}

/// Reconstructs the gene/transcript/feature hierarchy from the ordered record
/// stream of a prediction file.
///
/// The builder is driven by [HierarchyBuilder::push], one record at a time and
/// in file order, and completed by [HierarchyBuilder::finish]. It owns the
/// iterator of recovered protein sequences, and the pairing rule is positional:
/// the Nth sequence the iterator yields is assigned to the Nth gene record
/// pushed, regardless of whether the counts match. Genes beyond the last
/// sequence get none; sequences beyond the last gene are discarded and
/// counted.
///
/// Structural anomalies (a transcript with no open gene, a feature with no
/// open transcript) never fail the build; the offending record is dropped and
/// a [ParseWarning] is collected.
///
/// # Examples
///
/// ```rust
/// use genecast::prediction::HierarchyBuilder;
/// use genecast::reader::GffRecord;
///
/// let mut builder = HierarchyBuilder::new(vec![String::from("MKVLAG")].into_iter());
/// for line in [
///     "chr1\taug\tgene\t100\t500\t.\t+\t.\tID=g1",
///     "chr1\taug\ttranscript\t100\t500\t.\t+\t.\tID=t1",
///     "chr1\taug\tCDS\t100\t200\t.\t+\t0\tID=c1",
/// ] {
///     if let Some(record) = GffRecord::parse_line(line).unwrap() {
///         builder.push(record);
///     }
/// }
/// let (genes, warnings) = builder.finish();
/// assert_eq!(genes.len(), 1);
/// assert_eq!(genes[0].protein_sequence.as_deref(), Some("MKVLAG"));
/// assert!(warnings.is_empty());
/// ```
pub struct HierarchyBuilder<P> {
    proteins: P,
    cursor: Cursor,
    genes: Vec<Gene>,
    warnings: Vec<ParseWarning>,
    gene_tally: u32,
    transcript_tally: u32,
}

impl<P: Iterator<Item = String>> HierarchyBuilder<P> {
    /// Creates a builder over the given protein sequence iterator.
    ///
    /// The iterator order is the pairing order; callers hand in the sequences
    /// exactly as they were recovered from the input stream.
    pub fn new(proteins: P) -> HierarchyBuilder<P> {
        HierarchyBuilder {
            proteins,
            cursor: Cursor::Idle,
            genes: Vec::new(),
            warnings: Vec::new(),
            gene_tally: 0,
            transcript_tally: 0,
        }
    }

    /// Consumes one record, in file order.
    pub fn push(&mut self, record: GffRecord) {
        match record.feature_type {
            FeatureType::Gene => {
                self.close_open_gene();
                let id = match record.attributes.get("ID") {
                    Some(id) => id.clone(),
                    None => {
                        self.gene_tally += 1;
                        let id = format!("gene_{}", self.gene_tally);
                        self.warnings
                            .push(ParseWarning::GeneratedGeneId { id: id.clone() });
                        id
                    }
                };
                self.cursor = Cursor::Gene(Gene {
                    id,
                    start: record.start,
                    end: record.end,
                    protein_sequence: self.proteins.next(),
                    transcripts: Vec::new(),
                });
            }
            FeatureType::Transcript => {
                match std::mem::replace(&mut self.cursor, Cursor::Idle) {
                    Cursor::Idle => {
                        self.warnings.push(ParseWarning::OrphanTranscript {
                            id: record
                                .attributes
                                .get("ID")
                                .cloned()
                                .unwrap_or_else(|| String::from("?")),
                        });
                    }
                    Cursor::Gene(gene) => {
                        let transcript = self.open_transcript(&record);
                        self.cursor = Cursor::Transcript(gene, transcript);
                    }
                    Cursor::Transcript(mut gene, transcript) => {
                        gene.transcripts.push(transcript);
                        let transcript = self.open_transcript(&record);
                        self.cursor = Cursor::Transcript(gene, transcript);
                    }
                }
            }
            ref other => {
                if let Some(kind) = other.feature_kind() {
                    match &mut self.cursor {
                        Cursor::Transcript(_, transcript) => transcript.features.push(Feature {
                            kind,
                            start: record.start,
                            end: record.end,
                        }),
                        _ => self.warnings.push(ParseWarning::OrphanFeature {
                            kind,
                            start: record.start,
                        }),
                    }
                } else {
                    debug!("ignoring a record of type {:?}", other);
                }
            }
        }
    }

    /// Completes the build, yielding the ordered gene list and the collected
    /// warnings. The gene still open at end of input is finalized, not
    /// discarded.
    pub fn finish(mut self) -> (Vec<Gene>, Vec<ParseWarning>) {
        self.close_open_gene();
        let unassigned = self.proteins.count();
        if unassigned > 0 {
            self.warnings
                .push(ParseWarning::UnassignedProteins(unassigned));
        }
        (self.genes, self.warnings)
    }

    fn open_transcript(&mut self, record: &GffRecord) -> Transcript {
        let id = match record.attributes.get("ID") {
            Some(id) => id.clone(),
            None => {
                self.transcript_tally += 1;
                let id = format!("tx_{}", self.transcript_tally);
                self.warnings
                    .push(ParseWarning::GeneratedTranscriptId { id: id.clone() });
                id
            }
        };
        Transcript {
            id,
            features: Vec::new(),
        }
    }

    fn close_open_gene(&mut self) {
        match std::mem::replace(&mut self.cursor, Cursor::Idle) {
            Cursor::Idle => {}
            Cursor::Gene(gene) => self.genes.push(gene),
            Cursor::Transcript(mut gene, transcript) => {
                gene.transcripts.push(transcript);
                self.genes.push(gene);
            }
        }
    }
}

#[derive(Debug, Serialize)]
/// A fully ingested gene prediction: the ordered gene aggregates plus the
/// anomalies observed while reconstructing them.
///
/// This is the shape handed to the persistence and serialization
/// collaborators. The warnings never appear in the serialized output; they
/// exist so callers can report or assert on dropped records without changing
/// the success path.
pub struct GenePrediction {
    pub name: String,
    pub genes: Vec<Gene>,
    #[serde(skip)]
    pub warnings: Vec<ParseWarning>,
}

impl GenePrediction {
    /// Ingests a gene-prediction file from the given path.
    ///
    /// The prediction is named after the file stem. Supports plain text and
    /// gzipped input. See [GenePrediction::from_gff_reader] for the parse
    /// semantics.
    pub fn from_gff_path<T: AsRef<Path>>(file_path: T) -> anyhow::Result<GenePrediction> {
        let name = file_path
            .as_ref()
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| String::from("prediction"));
        let parse = GffParse::from_path(file_path)?;
        GenePrediction::from_parse(name, parse)
    }

    /// Ingests a gene-prediction stream from the given reader.
    ///
    /// ### Arguments
    ///
    /// * `name`: The name of the resulting prediction aggregate.
    /// * `rdr`: The prediction stream.
    ///
    /// ### Returns
    ///
    /// Returns an [`anyhow::Result<GenePrediction>`]:
    /// * `Ok(GenePrediction)`: The complete, ordered hierarchy. An input with
    ///   zero gene records yields an empty gene list, which is a valid result.
    /// * `Err(anyhow::Error)`: A record line carried a non-integer coordinate.
    ///   Nothing is returned in that case; callers never observe a partially
    ///   populated hierarchy.
    pub fn from_gff_reader<T: std::io::BufRead>(
        name: &str,
        rdr: T,
    ) -> anyhow::Result<GenePrediction> {
        let parse = GffParse::from_reader(rdr)?;
        GenePrediction::from_parse(name.to_string(), parse)
    }

    fn from_parse(name: String, parse: GffParse) -> anyhow::Result<GenePrediction> {
        let mut builder = HierarchyBuilder::new(parse.proteins.into_iter());
        for record in parse.records {
            builder.push(record);
        }
        let (genes, mut warnings) = builder.finish();
        if parse.unterminated_directive {
            warnings.push(ParseWarning::UnterminatedProteinDirective);
        }
        for warning in &warnings {
            warn!("{}", warning);
        }
        Ok(GenePrediction {
            name,
            genes,
            warnings,
        })
    }

    /// Writes the protein sequences of this prediction as FASTA.
    ///
    /// One record is written per gene that carries a protein sequence, with
    /// the gene identifier as the `>`-delimited header and the residues
    /// wrapped at `opts.line_width` characters per line. Genes without a
    /// sequence are skipped.
    ///
    /// ### Arguments
    ///
    /// * `writer`: The destination of the FASTA text.
    /// * `opts`: See [FastaWriteOptions].
    ///
    /// ### Returns
    ///
    /// Returns the number of records written on success, and an
    /// [anyhow::Error] if a record could not be written.
    pub fn write_protein_fasta<W: Write>(
        &self,
        writer: W,
        opts: &FastaWriteOptions,
    ) -> anyhow::Result<usize> {
        let mut fasta_writer = noodles::fasta::writer::Builder::default()
            .set_line_base_count(opts.line_width)
            .build_with_writer(writer);

        let mut n_written = 0usize;
        for gene in &self.genes {
            if let Some(sequence) = &gene.protein_sequence {
                let definition = Definition::new(gene.id.clone(), None);
                let sequence = Sequence::from(sequence.as_bytes().to_vec());
                let record = noodles::fasta::Record::new(definition, sequence);
                fasta_writer.write_record(&record).with_context(|| {
                    format!(
                        "Could not write the protein sequence of gene {} to the output",
                        gene.id
                    )
                })?;
                n_written += 1;
            }
        }
        Ok(n_written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::GffParse;

    const AUG_RECORD: &str = "# Predicted genes for sequence number 1 on both strands\n\
chr1\taug\tgene\t100\t500\t.\t+\t.\tID=g1\n\
chr1\taug\ttranscript\t100\t500\t.\t+\t.\tID=t1\n\
chr1\taug\tCDS\t100\t200\t.\t+\t0\tID=c1\n\
chr1\taug\texon\t100\t250\t.\t+\t.\tID=e1\n\
chr2\taug\tgene\t900\t1400\t.\t-\t.\tID=g2\n\
chr2\taug\ttranscript\t900\t1400\t.\t-\t.\tID=t2\n\
chr2\taug\texon\t900\t1000\t.\t-\t.\tID=e2\n\
chr2\taug\ttranscript\t900\t1300\t.\t-\t.\tID=t3\n\
chr2\taug\tstop_codon\t1298\t1300\t.\t-\t0\tID=s1\n";

    fn build(input: &str, proteins: Vec<&str>) -> (Vec<Gene>, Vec<ParseWarning>) {
        let parse = GffParse::from_reader(input.as_bytes()).unwrap();
        let mut builder =
            HierarchyBuilder::new(proteins.into_iter().map(String::from).collect::<Vec<_>>().into_iter());
        for record in parse.records {
            builder.push(record);
        }
        builder.finish()
    }

    #[test]
    fn test_hierarchy_reconstruction() {
        let (genes, warnings) = build(AUG_RECORD, vec!["MKVH", "TTRS"]);
        assert!(warnings.is_empty());
        assert_eq!(genes.len(), 2);

        let g1 = &genes[0];
        assert_eq!(g1.id, "g1");
        assert_eq!((g1.start, g1.end), (100, 500));
        assert_eq!(g1.protein_sequence.as_deref(), Some("MKVH"));
        assert_eq!(g1.transcripts.len(), 1);
        assert_eq!(g1.transcripts[0].id, "t1");
        assert_eq!(g1.transcripts[0].features.len(), 2);
        assert_eq!(g1.transcripts[0].features[0].kind, FeatureKind::Cds);
        assert_eq!(g1.transcripts[0].features[0].start, 100);
        assert_eq!(g1.transcripts[0].features[0].end, 200);
        assert_eq!(g1.transcripts[0].features[1].kind, FeatureKind::Exon);

        // transcripts keep their source order, and features follow their transcript
        let g2 = &genes[1];
        assert_eq!(g2.protein_sequence.as_deref(), Some("TTRS"));
        assert_eq!(g2.transcripts.len(), 2);
        assert_eq!(g2.transcripts[0].id, "t2");
        assert_eq!(g2.transcripts[0].features[0].kind, FeatureKind::Exon);
        assert_eq!(g2.transcripts[1].id, "t3");
        assert_eq!(g2.transcripts[1].features[0].kind, FeatureKind::StopCodon);
    }

    #[test]
    fn test_orphan_transcript_dropped() {
        let input = "chr1\taug\ttranscript\t100\t500\t.\t+\t.\tID=t1\n\
chr1\taug\tgene\t100\t500\t.\t+\t.\tID=g1\n";
        let (genes, warnings) = build(input, vec![]);
        assert_eq!(genes.len(), 1);
        assert!(genes[0].transcripts.is_empty());
        assert_eq!(
            warnings,
            vec![ParseWarning::OrphanTranscript {
                id: String::from("t1")
            }]
        );
    }

    #[test]
    fn test_orphan_feature_dropped() {
        let input = "chr1\taug\tgene\t100\t500\t.\t+\t.\tID=g1\n\
chr1\taug\texon\t100\t200\t.\t+\t.\tID=e1\n";
        let (genes, warnings) = build(input, vec![]);
        assert_eq!(genes.len(), 1);
        assert!(genes[0].transcripts.is_empty());
        assert_eq!(
            warnings,
            vec![ParseWarning::OrphanFeature {
                kind: FeatureKind::Exon,
                start: 100
            }]
        );
    }

    #[test]
    fn test_protein_pairing_is_positional() {
        // one sequence, two genes: the first gene takes it, the second gets none
        let input = "chr1\taug\tgene\t1\t9\t.\t+\t.\tID=g1\n\
chr1\taug\tgene\t10\t19\t.\t+\t.\tID=g2\n";
        let (genes, warnings) = build(input, vec!["MKVLAG"]);
        assert_eq!(genes[0].protein_sequence.as_deref(), Some("MKVLAG"));
        assert_eq!(genes[1].protein_sequence, None);
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_excess_proteins_discarded() {
        let input = "chr1\taug\tgene\t1\t9\t.\t+\t.\tID=g1\n";
        let (genes, warnings) = build(input, vec!["MK", "VH", "TT"]);
        assert_eq!(genes[0].protein_sequence.as_deref(), Some("MK"));
        assert_eq!(warnings, vec![ParseWarning::UnassignedProteins(2)]);
    }

    #[test]
    fn test_generated_ids_are_deterministic() {
        let input = "chr1\taug\tgene\t1\t9\t.\t+\t.\tnote=x\n\
chr1\taug\ttranscript\t1\t9\t.\t+\t.\tnote=x\n\
chr1\taug\tgene\t10\t19\t.\t+\t.\tnote=x\n";
        let (genes, warnings) = build(input, vec![]);
        assert_eq!(genes[0].id, "gene_1");
        assert_eq!(genes[0].transcripts[0].id, "tx_1");
        assert_eq!(genes[1].id, "gene_2");
        assert_eq!(warnings.len(), 3);
    }

    #[test]
    fn test_empty_input() {
        let (genes, warnings) = build("", vec![]);
        assert!(genes.is_empty());
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_unknown_types_ignored() {
        let input = "chr1\taug\tgene\t1\t99\t.\t+\t.\tID=g1\n\
chr1\taug\ttranscript\t1\t99\t.\t+\t.\tID=t1\n\
chr1\taug\tintron\t10\t20\t.\t+\t.\tID=i1\n\
chr1\taug\texon\t1\t9\t.\t+\t.\tID=e1\n";
        let (genes, warnings) = build(input, vec![]);
        assert!(warnings.is_empty());
        assert_eq!(genes[0].transcripts[0].features.len(), 1);
    }

    #[test]
    fn test_from_gff_reader_end_to_end() {
        let input = "chr1\taug\tgene\t100\t500\t.\t+\t.\tID=g1\n\
chr1\taug\ttranscript\t100\t500\t.\t+\t.\tID=t1\n\
chr1\taug\tCDS\t100\t200\t.\t+\t0\tID=c1\n\
# protein sequence = [MKV\n\
# LAG]\n";
        let prediction = GenePrediction::from_gff_reader("sample", input.as_bytes()).unwrap();
        assert_eq!(prediction.name, "sample");
        assert_eq!(prediction.genes.len(), 1);
        assert_eq!(
            prediction.genes[0].protein_sequence.as_deref(),
            Some("MKVLAG")
        );
        assert!(prediction.warnings.is_empty());
    }

    #[test]
    fn test_unterminated_directive_is_surfaced() {
        let input = "chr1\taug\tgene\t100\t500\t.\t+\t.\tID=g1\n\
# protein sequence = [MKV\n";
        let prediction = GenePrediction::from_gff_reader("sample", input.as_bytes()).unwrap();
        assert_eq!(prediction.genes[0].protein_sequence, None);
        assert!(prediction
            .warnings
            .contains(&ParseWarning::UnterminatedProteinDirective));
    }

    #[test]
    fn test_write_protein_fasta_wraps_at_line_width() {
        let residues = "MSHQNGIKLVAGREQWPLTDMSHQNGIKLVAGREQWPLTDMSHQNGIKLVAGREQWPLTDMSHQNGIKLV";
        let prediction = GenePrediction {
            name: String::from("sample"),
            genes: vec![
                Gene {
                    id: String::from("g1"),
                    start: 1,
                    end: 9,
                    protein_sequence: Some(residues.to_string()),
                    transcripts: Vec::new(),
                },
                Gene {
                    id: String::from("g2"),
                    start: 10,
                    end: 19,
                    protein_sequence: None,
                    transcripts: Vec::new(),
                },
            ],
            warnings: Vec::new(),
        };

        let mut out = Vec::new();
        let n = prediction
            .write_protein_fasta(&mut out, &FastaWriteOptions::default())
            .unwrap();
        assert_eq!(n, 1);

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], ">g1");
        assert_eq!(lines[1], &residues[..60]);
        assert_eq!(lines[2], &residues[60..]);
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn test_serialized_shape() {
        let input = "chr1\taug\tgene\t100\t500\t.\t+\t.\tID=g1\n\
chr1\taug\ttranscript\t100\t500\t.\t+\t.\tID=t1\n\
chr1\taug\tCDS\t100\t200\t.\t+\t0\tID=c1\n";
        let prediction = GenePrediction::from_gff_reader("sample", input.as_bytes()).unwrap();
        let json = serde_json::to_value(&prediction).unwrap();
        assert_eq!(json["genes"][0]["gene_id"], "g1");
        assert_eq!(json["genes"][0]["transcripts"][0]["transcript_id"], "t1");
        assert_eq!(
            json["genes"][0]["transcripts"][0]["features"][0]["feature_type"],
            "CDS"
        );
        assert!(json.get("warnings").is_none());
    }
}
