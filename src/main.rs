use anyhow::Context;
use clap::{Parser, Subcommand};
use genecast::alignment::AlignmentReport;
use genecast::options::{AlignOptions, FastaWriteOptions};
use genecast::prediction::GenePrediction;
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "genecast", version, about = "Ingest gene-prediction output and alignment reports into structured records")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a prediction file and print the gene hierarchy as JSON
    Parse {
        /// The GFF-like prediction file, plain text or gzipped
        gff: PathBuf,
        /// Print a one-line summary instead of the JSON aggregate
        #[arg(long)]
        summary: bool,
    },
    /// Write the predicted protein sequences of a prediction file as FASTA
    Proteins {
        /// The GFF-like prediction file, plain text or gzipped
        gff: PathBuf,
        /// The output FASTA path
        #[arg(short, long)]
        output: PathBuf,
        /// Residues per sequence line
        #[arg(long, default_value_t = 60)]
        line_width: usize,
    },
    /// Flatten an alignment report JSON file into hit records
    Hits {
        /// The report JSON written by the alignment tool
        report: PathBuf,
        /// The query sequence the report was produced for
        #[arg(long, default_value = "")]
        query: String,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Parse { gff, summary } => {
            let prediction = GenePrediction::from_gff_path(&gff)?;
            if summary {
                let n_transcripts: usize =
                    prediction.genes.iter().map(|g| g.transcripts.len()).sum();
                let n_proteins = prediction
                    .genes
                    .iter()
                    .filter(|g| g.protein_sequence.is_some())
                    .count();
                info!(
                    "{}: {} genes, {} transcripts, {} protein sequences, {} warnings",
                    prediction.name,
                    prediction.genes.len(),
                    n_transcripts,
                    n_proteins,
                    prediction.warnings.len()
                );
            } else {
                println!("{}", serde_json::to_string_pretty(&prediction)?);
            }
        }
        Commands::Proteins {
            gff,
            output,
            line_width,
        } => {
            let prediction = GenePrediction::from_gff_path(&gff)?;
            let opts = FastaWriteOptions::new(line_width)?;
            let out_file = File::create(&output)
                .with_context(|| format!("Could not create the output file {}", output.display()))?;
            let n = prediction.write_protein_fasta(BufWriter::new(out_file), &opts)?;
            info!("wrote {} protein sequences to {}", n, output.display());
        }
        Commands::Hits { report, query } => {
            let raw = std::fs::read_to_string(&report)
                .with_context(|| format!("Could not read the report file {}", report.display()))?;
            let report: AlignmentReport = serde_json::from_str(&raw)
                .context("Could not parse the alignment report JSON")?;
            let hits = report.flatten(&query, &AlignOptions::default());
            info!("flattened the report into {} hit records", hits.len());
            println!("{}", serde_json::to_string_pretty(&hits)?);
        }
    }
    Ok(())
}
