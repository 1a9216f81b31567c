use genecast::alignment::{self, AlignmentOutcome, AlignmentReport, ToolOutput};
use genecast::options::{AlignOptions, FastaWriteOptions};
use genecast::prediction::{FeatureKind, GenePrediction};
use std::path::Path;

// A trimmed-down AUGUSTUS run over two sequences: two predicted genes, each
// with its protein sequence spread over several comment lines.
const PREDICTION: &str = "\
# This output was generated with AUGUSTUS.\n\
# ----- prediction on sequence number 1 -----\n\
chr1\tAUGUSTUS\tgene\t12656\t14013\t0.04\t+\t.\tID=g1\n\
chr1\tAUGUSTUS\ttranscript\t12656\t14013\t0.04\t+\t.\tID=g1.t1;Parent=g1\n\
chr1\tAUGUSTUS\tstart_codon\t12656\t12658\t.\t+\t0\tParent=g1.t1\n\
chr1\tAUGUSTUS\tCDS\t12656\t13368\t0.8\t+\t0\tID=g1.t1.cds;Parent=g1.t1\n\
chr1\tAUGUSTUS\texon\t12656\t13368\t.\t+\t.\tParent=g1.t1\n\
chr1\tAUGUSTUS\tstop_codon\t13366\t13368\t.\t+\t0\tParent=g1.t1\n\
# protein sequence = [MSHQNGIKLVAGREQWPLTDMSHQNGIKLVAGREQWPLTD\n\
# MSHQNGIKLVAGREQWPLTDMSHQNGIKLV]\n\
# end gene g1\n\
# ----- prediction on sequence number 2 -----\n\
chr2\tAUGUSTUS\tgene\t1050\t2215\t0.12\t-\t.\tID=g2\n\
chr2\tAUGUSTUS\ttranscript\t1050\t2215\t0.12\t-\t.\tID=g2.t1;Parent=g2\n\
chr2\tAUGUSTUS\texon\t1050\t1360\t.\t-\t.\tParent=g2.t1\n\
chr2\tAUGUSTUS\tCDS\t1102\t1360\t0.9\t-\t2\tID=g2.t1.cds;Parent=g2.t1\n\
# protein sequence = [MTTRSDLVA]\n\
# end gene g2\n";

const REPORT: &str = r#"{
  "BlastOutput2": [
    {
      "report": {
        "program": "blastp",
        "results": {
          "search": {
            "hits": [
              {
                "description": [
                  {"id": "sp|P05067|", "accession": "P05067", "title": "Amyloid-beta precursor protein"}
                ],
                "hsps": [
                  {"score": 150, "evalue": 2.1e-45, "identity": 70, "align_len": 70, "query_from": 1, "query_to": 70, "hit_from": 5, "hit_to": 74},
                  {"score": 52, "evalue": 0.001, "identity": 20, "align_len": 31, "query_from": 30, "query_to": 60, "hit_from": 200, "hit_to": 230}
                ]
              }
            ]
          }
        }
      }
    }
  ]
}"#;

#[test]
fn test_prediction_pipeline() -> anyhow::Result<()> {
    let prediction = GenePrediction::from_gff_reader("augustus_run", PREDICTION.as_bytes())?;

    assert!(prediction.warnings.is_empty());
    assert_eq!(prediction.genes.len(), 2);

    let g1 = &prediction.genes[0];
    assert_eq!(g1.id, "g1");
    assert_eq!((g1.start, g1.end), (12656, 14013));
    assert_eq!(g1.transcripts.len(), 1);
    assert_eq!(g1.transcripts[0].id, "g1.t1");
    let kinds: Vec<FeatureKind> = g1.transcripts[0].features.iter().map(|f| f.kind).collect();
    assert_eq!(
        kinds,
        vec![
            FeatureKind::StartCodon,
            FeatureKind::Cds,
            FeatureKind::Exon,
            FeatureKind::StopCodon
        ]
    );

    // the multi-line directive reassembles into one contiguous sequence,
    // paired with the first gene by order of appearance
    assert_eq!(
        g1.protein_sequence.as_deref(),
        Some("MSHQNGIKLVAGREQWPLTDMSHQNGIKLVAGREQWPLTDMSHQNGIKLVAGREQWPLTDMSHQNGIKLV")
    );
    assert_eq!(
        prediction.genes[1].protein_sequence.as_deref(),
        Some("MTTRSDLVA")
    );

    // FASTA export: one record per gene with a sequence, 60 residues per line
    let mut fasta = Vec::new();
    let n = prediction.write_protein_fasta(&mut fasta, &FastaWriteOptions::default())?;
    assert_eq!(n, 2);
    let text = String::from_utf8(fasta)?;
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], ">g1");
    assert_eq!(lines[1].len(), 60);
    assert_eq!(lines[2].len(), 10);
    assert_eq!(lines[3], ">g2");
    assert_eq!(lines[4], "MTTRSDLVA");

    Ok(())
}

#[test]
fn test_alignment_pipeline() -> anyhow::Result<()> {
    let prediction = GenePrediction::from_gff_reader("augustus_run", PREDICTION.as_bytes())?;

    let tool = |path: &Path| -> anyhow::Result<ToolOutput> {
        // the scratch query file exists for the duration of the invocation
        assert!(path.exists());
        Ok(ToolOutput {
            success: true,
            stdout: REPORT.to_string(),
            stderr: String::new(),
        })
    };

    let outcomes = alignment::align_genes(&prediction, &tool, &AlignOptions::default())?;
    assert_eq!(outcomes.len(), 2);
    assert_eq!(outcomes[0].0, "g1");
    assert_eq!(outcomes[1].0, "g2");

    match &outcomes[0].1 {
        AlignmentOutcome::Hits(hits) => {
            // one hit carrying two segment pairs expands into two records
            assert_eq!(hits.len(), 2);
            assert_eq!(hits[0].hit_def, "Amyloid-beta precursor protein");
            assert_eq!(hits[0].accession, hits[1].accession);
            assert_eq!(hits[0].query.len(), 50);
            assert_eq!(hits[1].evalue, Some(0.001));
        }
        AlignmentOutcome::ToolFailure { .. } => panic!("expected hits"),
    }

    Ok(())
}

#[test]
fn test_alignment_tool_failure_pipeline() -> anyhow::Result<()> {
    let tool = |_: &Path| -> anyhow::Result<ToolOutput> {
        Ok(ToolOutput {
            success: false,
            stdout: String::new(),
            stderr: String::from("Segmentation fault"),
        })
    };

    let outcome = alignment::align_sequence(&tool, "MTTRSDLVA", &AlignOptions::default())?;
    match outcome {
        AlignmentOutcome::ToolFailure { error } => assert_eq!(error, "Segmentation fault"),
        AlignmentOutcome::Hits(_) => panic!("expected a tool failure"),
    }

    // a report read back from disk goes through the same normalizer
    let report: AlignmentReport = serde_json::from_str(REPORT)?;
    let hits = report.flatten("MTTRSDLVA", &AlignOptions::default());
    assert_eq!(hits.len(), 2);

    Ok(())
}
