use crate::csv_writer::{CsvWriter, WriteSummary};
use crate::dataset::Model;
use crate::error::{Error, Result};
use crate::generator::Generator;
use rayon::prelude::*;
use std::fs;
use std::path::Path;
use tracing::{error, info, warn};

/// Generates every fixture file for batches `0..batches` into
/// `output_dir`. Rows of later batches are appended to the same files.
/// Stops after the first batch with a failing generator.
pub fn generate_fixtures<P, Q>(source_dir: P, batches: u32, output_dir: Q) -> Result<()>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let output_dir = output_dir.as_ref();
    fs::create_dir_all(output_dir).map_err(|e| Error::io(output_dir, e))?;
    let writer = CsvWriter::new(output_dir);

    let names: Vec<&str> = Generator::ALL.iter().map(|g| g.file_name()).collect();
    info!(generators = ?names, "using generators");
    for batch in 0..batches {
        run_batch(source_dir.as_ref(), batch, &writer)?;
    }
    Ok(())
}

/// Runs all generators over one batch concurrently. Each one runs to
/// completion; the first failure is returned afterwards.
pub fn run_batch(source_dir: &Path, batch: u32, writer: &CsvWriter) -> Result<()> {
    info!(batch, "processing batch");
    let model = Model::load(source_dir, batch)?;
    for dangling in model.dangling_references() {
        warn!(batch, error = %dangling, "skipping dangling reference");
    }

    let results: Vec<(Generator, Result<WriteSummary>)> = Generator::ALL[..]
        .par_iter()
        .map(|generator| (*generator, generator.generate(&model, writer)))
        .collect();

    let mut first_error = None;
    for (generator, result) in results {
        match result {
            Ok(summary) => info!(
                batch,
                file = generator.file_name(),
                written = summary.written,
                rejected = summary.rejected,
                "generator finished"
            ),
            Err(e) => {
                error!(batch, file = generator.file_name(), error = %e, "generator failed");
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }
    }
    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
