use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use chrono::DateTime;

use crate::errors::HprofHistoError;
use crate::errors::HprofHistoError::InputFileNotFound;
use crate::instance_aggregator::{AggregatorConfig, aggregate_instances};
use crate::parser::file_header_parser::FileHeader;
use crate::parser::record_reader::RecordReader;
use crate::progress::{Phase, ProgressReporter};
use crate::rendered_result::RenderedResult;
use crate::symbol_table::build_symbol_table;
use crate::utils::pretty_bytes_size;

const PHASES: usize = 2;

const CLASS_DATA_PHASE: Phase = Phase {
    label: "Loading class data",
    index: 1,
    total: PHASES,
};

const INSTANCE_DATA_PHASE: Phase = Phase {
    label: "Loading instance data",
    index: 2,
    total: PHASES,
};

fn open_reader(
    file_path: &Path,
    debug_mode: bool,
) -> Result<RecordReader<BufReader<File>>, HprofHistoError> {
    let file = File::open(file_path)?;
    RecordReader::new(BufReader::new(file), debug_mode)
}

fn creation_time(header: &FileHeader) -> String {
    i64::try_from(header.timestamp)
        .ok()
        .and_then(DateTime::from_timestamp_millis)
        .map_or_else(
            || format!("{} ms since epoch", header.timestamp),
            |created| created.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        )
}

/// Runs both passes over the file and gathers the histogram.
///
/// The file is opened once per pass, the second pass only starts once the first
/// reader and its progress reporter are gone.
pub fn slurp_file(
    file_path: &str,
    config: AggregatorConfig,
    debug_mode: bool,
) -> Result<RenderedResult, HprofHistoError> {
    let path = Path::new(file_path);
    if !path.is_file() {
        return Err(InputFileNotFound {
            name: file_path.to_string(),
        });
    }
    let file_len = path.metadata()?.len();

    // Pass 1: strings, class names and layouts
    let (symbols, mut diagnostics) = {
        let mut reader = open_reader(path, debug_mode)?;
        let header = reader.file_header();
        println!(
            "Processing {} binary hprof file in '{}' format (created {}).",
            pretty_bytes_size(file_len),
            header.format,
            creation_time(header)
        );
        let reporter = ProgressReporter::start(CLASS_DATA_PHASE, reader.consumed(), file_len)?;
        let symbols = build_symbol_table(&mut reader, debug_mode)?;
        reporter.finish()?;
        symbols
    };

    // Pass 2: instances and arrays
    let (histogram, counters, instance_diagnostics) = {
        let mut reader = open_reader(path, debug_mode)?;
        let reporter = ProgressReporter::start(INSTANCE_DATA_PHASE, reader.consumed(), file_len)?;
        let aggregated = aggregate_instances(&mut reader, &symbols, config, debug_mode)?;
        reporter.finish()?;
        aggregated
    };
    diagnostics.merge(instance_diagnostics);
    debug_assert_eq!(histogram.total_instances(), counters.total());

    Ok(RenderedResult::new(
        &symbols,
        counters,
        &histogram,
        diagnostics,
    ))
}
