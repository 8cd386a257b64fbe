use std::fs::File;
use std::io::BufWriter;

use chrono::Utc;
use indoc::formatdoc;
use serde::Serialize;

use crate::errors::{Diagnostics, HprofHistoError};
use crate::histogram::{ClassHistogram, HistogramRow};
use crate::instance_aggregator::RecordCounters;
use crate::symbol_table::SymbolTable;
use crate::table::{Alignment, ColumnHeader, Table};
use crate::utils::pretty_bytes_size;

#[derive(Serialize)]
pub struct JsonResult<'a> {
    total_instances: u64,
    total_bytes: u64,
    classes: &'a [HistogramRow],
}

impl<'a> JsonResult<'a> {
    pub fn new(rows: &'a [HistogramRow], top: Option<usize>) -> Self {
        let classes = match top {
            Some(top) => &rows[..top.min(rows.len())],
            None => rows,
        };
        JsonResult {
            total_instances: rows
                .iter()
                .fold(0, |total, r| total.saturating_add(r.instance_count)),
            total_bytes: rows
                .iter()
                .fold(0, |total, r| total.saturating_add(r.total_bytes)),
            classes,
        }
    }

    pub fn save_as_file(&self) -> Result<String, HprofHistoError> {
        let file_path = format!("hprof-histo-{}.json", Utc::now().timestamp_millis());
        let file = File::create(&file_path)?;
        let writer = BufWriter::new(file);
        serde_json::to_writer(writer, &self)?;
        Ok(file_path)
    }
}

/// Outcome of both passes, ready for display.
pub struct RenderedResult {
    pub summary: String,
    pub rows: Vec<HistogramRow>,
    pub diagnostics: Diagnostics,
}

impl RenderedResult {
    pub fn new(
        symbols: &SymbolTable,
        counters: RecordCounters,
        histogram: &ClassHistogram,
        diagnostics: Diagnostics,
    ) -> Self {
        let total_bytes = histogram.total_bytes();
        let found = if histogram.is_empty() {
            "No instances found.".to_string()
        } else {
            format!(
                "Found a total of {} ({total_bytes} bytes) of shallow size in {} instances of {} classes.",
                pretty_bytes_size(total_bytes),
                histogram.total_instances(),
                histogram.len(),
            )
        };
        let summary = formatdoc!(
            "
            File content summary:

            UTF-8 Strings: {}
            Classes loaded: {}
            Class layouts: {}
            Instances: {}
            Object arrays: {}
            Primitive arrays: {}
            {}
            ",
            symbols.strings_len(),
            symbols.classes_len(),
            symbols.layouts_len(),
            counters.instances,
            counters.object_arrays,
            counters.primitive_arrays,
            found,
        );
        RenderedResult {
            summary,
            rows: histogram.snapshot(),
            diagnostics,
        }
    }

    /// Histogram table, limited to the `top` largest classes if set.
    pub fn render_table(&self, top: Option<usize>) -> Result<String, HprofHistoError> {
        let header = vec![
            ColumnHeader::new("num", Alignment::Right),
            ColumnHeader::new("#instances", Alignment::Right),
            ColumnHeader::new("#bytes", Alignment::Right),
            ColumnHeader::new("class name", Alignment::Left),
        ];
        let rows = self
            .rows
            .iter()
            .take(top.unwrap_or(usize::MAX))
            .enumerate()
            .map(|(index, row)| {
                vec![
                    format!("{}:", index + 1),
                    row.instance_count.to_string(),
                    row.total_bytes.to_string(),
                    row.class_name.clone(),
                ]
            })
            .collect();
        Ok(Table::new(header, rows)?.render())
    }

    pub fn render_warnings(&self) -> Option<String> {
        if self.diagnostics.is_empty() {
            return None;
        }
        let Diagnostics {
            unresolved_references,
            malformed_strings,
            missing_class_layouts,
            samples,
        } = &self.diagnostics;
        let mut warnings = format!(
            "warning: {unresolved_references} unresolved references, {malformed_strings} malformed strings, {missing_class_layouts} instances without class layout\n"
        );
        for sample in samples {
            warnings.push_str(&format!("  e.g. {sample}\n"));
        }
        Some(warnings)
    }

    pub fn serialize(&self, top: Option<usize>) -> Result<String, HprofHistoError> {
        let table = self.render_table(top)?;
        Ok(format!("{}\n{table}", self.summary))
    }
}
