use std::any::Any;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HprofHistoError {
    #[error("input file `{name}` not found")]
    InputFileNotFound { name: String },
    #[error("`top` must be a positive integer")]
    InvalidTopPositiveInt,
    #[error("unsupported hprof format `{format}`")]
    UnsupportedFormat { format: String },
    #[error("invalid identifier size {id_size} (expected 4 or 8)")]
    InvalidIdSize { id_size: u32 },
    #[error("invalid file header: {message}")]
    InvalidHeader { message: String },
    #[error(
        "truncated record at offset {offset}: expected {expected} bytes but only {available} available"
    )]
    TruncatedRecord {
        offset: u64,
        expected: u64,
        available: u64,
    },
    #[error("invalid record at offset {offset}: {message}")]
    InvalidRecord { offset: u64, message: String },
    #[error("table row has {actual} cells but header has {expected}")]
    TableShape { expected: usize, actual: usize },
    #[error("invalid progress bar template: {0}")]
    ProgressTemplate(#[from] indicatif::style::TemplateError),
    #[error(transparent)]
    ClapError(#[from] clap::Error),
    #[error(transparent)]
    StdIoError(#[from] std::io::Error),
    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),
    #[error("background thread panicked: {e:?}")]
    StdThreadError { e: Box<dyn Any + Send + 'static> },
}

/// Data quality issues recovered locally. They never abort a pass.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HprofHistoWarning {
    #[error("unresolved reference to id {id}")]
    UnresolvedReference { id: u64 },
    #[error("malformed UTF-8 in string {id}")]
    MalformedString { id: u64 },
    #[error("no usable field layout for class {class_object_id}")]
    MissingClassLayout { class_object_id: u64 },
}

// enough to hint at the culprit without flooding the console
const WARNING_SAMPLES: usize = 5;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Diagnostics {
    pub unresolved_references: u64,
    pub malformed_strings: u64,
    pub missing_class_layouts: u64,
    pub samples: Vec<HprofHistoWarning>,
}

impl Diagnostics {
    pub fn record(&mut self, warning: HprofHistoWarning, debug_mode: bool) {
        if debug_mode {
            println!("warning: {warning}");
        }
        match warning {
            HprofHistoWarning::UnresolvedReference { .. } => self.unresolved_references += 1,
            HprofHistoWarning::MalformedString { .. } => self.malformed_strings += 1,
            HprofHistoWarning::MissingClassLayout { .. } => self.missing_class_layouts += 1,
        }
        if self.samples.len() < WARNING_SAMPLES {
            self.samples.push(warning);
        }
    }

    pub fn merge(&mut self, other: Diagnostics) {
        self.unresolved_references += other.unresolved_references;
        self.malformed_strings += other.malformed_strings;
        self.missing_class_layouts += other.missing_class_layouts;
        for warning in other.samples {
            if self.samples.len() < WARNING_SAMPLES {
                self.samples.push(warning);
            }
        }
    }

    pub fn total(&self) -> u64 {
        self.unresolved_references + self.malformed_strings + self.missing_class_layouts
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}
