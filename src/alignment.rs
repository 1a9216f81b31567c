use crate::genecast_utils::truncate_label;
use crate::options::AlignOptions;
use crate::prediction::GenePrediction;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;
use tracing::{debug, warn};

/// The top level of a local alignment tool's JSON report.
///
/// The report nests its payload deeply: every entry of the outer array wraps
/// one search, whose hits each carry a list of description entries and a list
/// of scored segment pairs. Every level of the nesting is optional on the
/// wire; a report missing any of the intermediate keys simply contributes no
/// hits, which is why each struct below defaults its fields rather than
/// requiring them.
#[derive(Debug, Default, Deserialize)]
pub struct AlignmentReport {
    #[serde(rename = "BlastOutput2", default)]
    pub results: Vec<ReportEntry>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReportEntry {
    #[serde(default)]
    pub report: Report,
}

#[derive(Debug, Default, Deserialize)]
pub struct Report {
    #[serde(default)]
    pub results: ReportResults,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReportResults {
    #[serde(default)]
    pub search: Search,
}

#[derive(Debug, Default, Deserialize)]
pub struct Search {
    #[serde(default)]
    pub hits: Vec<Hit>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Hit {
    #[serde(default)]
    pub description: Vec<HitDescription>,
    #[serde(default)]
    pub hsps: Vec<Hsp>,
}

#[derive(Debug, Default, Deserialize)]
pub struct HitDescription {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub accession: String,
}

#[derive(Debug, Default, Deserialize)]
/// One high-scoring segment pair of a hit. All fields are optional; a field
/// the report omits stays absent rather than being coerced to a default.
pub struct Hsp {
    pub score: Option<f64>,
    pub evalue: Option<f64>,
    pub identity: Option<u64>,
    pub align_len: Option<u64>,
    pub query_from: Option<u64>,
    pub query_to: Option<u64>,
    pub hit_from: Option<u64>,
    pub hit_to: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
/// One flattened alignment hit, the shape handed to the response layer.
///
/// A hit record pairs the first description entry of a report hit with one of
/// its scored segment pairs, so a hit with several segment pairs expands into
/// several [AlignmentHit] values sharing the same identity fields.
///
/// # Fields
///
/// * `query`: The leading characters of the query sequence, see
///   [AlignOptions::query_label_len].
/// * `hit_id`, `hit_def`, `accession`: The identity of the matched subject,
///   from the hit's first description entry.
/// * `score`, `evalue`, `identity`, `align_length`: The segment pair's
///   statistics, absent when the report omits them.
/// * `query_start`, `query_end`, `hit_start`, `hit_end`: The aligned spans on
///   the query and the subject, absent when the report omits them.
///
pub struct AlignmentHit {
    pub query: String,
    pub hit_id: String,
    pub hit_def: String,
    pub accession: String,
    pub score: Option<f64>,
    pub evalue: Option<f64>,
    pub identity: Option<u64>,
    pub align_length: Option<u64>,
    pub query_start: Option<u64>,
    pub query_end: Option<u64>,
    pub hit_start: Option<u64>,
    pub hit_end: Option<u64>,
}

impl AlignmentReport {
    /// Flattens this report into a list of [AlignmentHit] records.
    ///
    /// For every hit, the first description entry is paired with every scored
    /// segment pair of that hit, a one-to-many expansion. Traversal order is
    /// preserved: outer report order, then hit order, then segment pair
    /// order. A hit without any description entry contributes nothing.
    ///
    /// ### Arguments
    ///
    /// * `query`: The query sequence the report was produced for; its leading
    ///   characters become the `query` label of every emitted record.
    /// * `opts`: See [AlignOptions].
    pub fn flatten(&self, query: &str, opts: &AlignOptions) -> Vec<AlignmentHit> {
        let label = truncate_label(query, opts.query_label_len);
        let mut hits = Vec::new();
        for entry in &self.results {
            for hit in &entry.report.results.search.hits {
                let desc = match hit.description.first() {
                    Some(desc) => desc,
                    None => {
                        debug!("skipping a hit without a description entry");
                        continue;
                    }
                };
                for hsp in &hit.hsps {
                    hits.push(AlignmentHit {
                        query: label.clone(),
                        hit_id: desc.id.clone(),
                        hit_def: desc.title.clone(),
                        accession: desc.accession.clone(),
                        score: hsp.score,
                        evalue: hsp.evalue,
                        identity: hsp.identity,
                        align_length: hsp.align_len,
                        query_start: hsp.query_from,
                        query_end: hsp.query_to,
                        hit_start: hsp.hit_from,
                        hit_end: hsp.hit_to,
                    });
                }
            }
        }
        hits
    }
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
/// The outcome of one alignment tool invocation.
///
/// A failed invocation is a first-class outcome, not an error and not an
/// empty hit list: the diagnostic text of the tool is carried to the caller
/// so the two cases stay distinguishable. Serialized untagged, the response
/// layer sees either a hit array or an `{"error": ...}` object.
pub enum AlignmentOutcome {
    Hits(Vec<AlignmentHit>),
    ToolFailure { error: String },
}

impl AlignmentOutcome {
    /// Returns `true` for the [AlignmentOutcome::ToolFailure] variant.
    pub fn is_failure(&self) -> bool {
        matches!(self, AlignmentOutcome::ToolFailure { .. })
    }
}

/// What an alignment tool invocation handed back: whether it succeeded, the
/// report text it wrote, and its diagnostic text.
pub struct ToolOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

/// The seam between this crate and the external alignment tool.
///
/// The crate never spawns the tool itself; a collaborator implements this
/// trait (or just passes a closure) and receives the path of the scratch
/// query file prepared by [align_sequence]. The implementation is only read
/// during the call, so the scratch file can be reclaimed as soon as the call
/// returns.
pub trait AlignmentTool {
    fn run(&self, query_fasta: &Path) -> anyhow::Result<ToolOutput>;
}

impl<F> AlignmentTool for F
where
    F: Fn(&Path) -> anyhow::Result<ToolOutput>,
{
    fn run(&self, query_fasta: &Path) -> anyhow::Result<ToolOutput> {
        (self)(query_fasta)
    }
}

/// Aligns one query sequence through the given tool and normalizes the result.
///
/// The sequence is written to a scratch FASTA file which exists only for the
/// duration of the invocation; it is removed on every exit path, including a
/// failing invocation and a malformed report. A tool reporting failure
/// yields [AlignmentOutcome::ToolFailure] carrying the tool's diagnostic
/// text; a tool reporting success has its report parsed and flattened.
///
/// ### Arguments
///
/// * `tool`: The external tool seam, see [AlignmentTool].
/// * `sequence`: The query sequence, raw residues without a FASTA header.
/// * `opts`: See [AlignOptions].
///
/// ### Returns
///
/// Returns an [`anyhow::Result<AlignmentOutcome>`]:
/// * `Ok(AlignmentOutcome::Hits)`: The flattened hit list; empty when the
///   tool found nothing, which is a valid outcome.
/// * `Ok(AlignmentOutcome::ToolFailure)`: The tool signaled failure.
/// * `Err(anyhow::Error)`: The scratch file could not be prepared, the tool
///   seam itself failed, or a successful tool produced unparseable JSON.
pub fn align_sequence<A: AlignmentTool>(
    tool: &A,
    sequence: &str,
    opts: &AlignOptions,
) -> anyhow::Result<AlignmentOutcome> {
    let mut scratch = tempfile::Builder::new()
        .prefix("genecast-query-")
        .suffix(".fa")
        .tempfile()
        .context("Could not create the scratch query file")?;
    scratch
        .write_all(format!(">query\n{}\n", sequence).as_bytes())
        .context("Could not write the query sequence to the scratch file")?;
    scratch.flush()?;

    let output = tool.run(scratch.path())?;
    if !output.success {
        warn!("the alignment tool signaled failure: {}", output.stderr);
        return Ok(AlignmentOutcome::ToolFailure {
            error: output.stderr,
        });
    }

    let report: AlignmentReport = serde_json::from_str(&output.stdout)
        .context("Could not parse the alignment report JSON")?;
    Ok(AlignmentOutcome::Hits(report.flatten(sequence, opts)))
}

/// Aligns every gene of a prediction that carries a protein sequence.
///
/// Genes are processed in prediction order; genes without a protein sequence
/// are skipped. Each gene gets its own scratch file and its own outcome, so
/// one failing invocation does not hide the hits of the others.
///
/// Returns the `(gene identifier, outcome)` pairs in gene order.
pub fn align_genes<A: AlignmentTool>(
    prediction: &GenePrediction,
    tool: &A,
    opts: &AlignOptions,
) -> anyhow::Result<Vec<(String, AlignmentOutcome)>> {
    let mut outcomes = Vec::new();
    for gene in &prediction.genes {
        if let Some(sequence) = &gene.protein_sequence {
            let outcome = align_sequence(tool, sequence, opts)?;
            outcomes.push((gene.id.clone(), outcome));
        }
    }
    Ok(outcomes)
}
