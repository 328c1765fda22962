//! Log to CSV conversion
//!
//! Converts one log or a batch of logs into sparse CSV tables. Files are
//! processed one after another; a failing file never aborts the batch.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::decode::{DecodeStats, PacketDecoder};
use crate::error::{Error, IoError};
use crate::euler::{self, EulerOutcome};
use crate::header::read_header;
use crate::table::CsvLayout;

/// Summary of one successful conversion.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Conversion {
    pub input: PathBuf,
    pub output: PathBuf,
    pub sensors: usize,
    pub rows: usize,
    pub stats: DecodeStats,
    /// `None` when the Euler pass is disabled.
    pub euler: Option<EulerOutcome>,
}

/// Output path for `input`: `<output_dir>/<name up to the first '.'>.csv`.
pub fn output_path(input: &Path, output_dir: &Path) -> PathBuf {
    let name = input
        .file_name()
        .map(|name| name.to_string_lossy())
        .unwrap_or_default();
    let base = name.split('.').next().unwrap_or_default();
    output_dir.join(format!("{base}.csv"))
}

/// Converts a single log file into `<output_dir>/<base>.csv`.
///
/// The whole table is built in memory first so that the Euler pass can narrow
/// it before anything is written. Nothing is written if the header is
/// rejected.
pub fn convert_file(
    input: &Path,
    output_dir: &Path,
    config: &Config,
) -> Result<Conversion, Error> {
    let separator = config.separator_byte()?;
    info!(?input, "converting");

    let file = File::open(input).map_err(|err| IoError::open(input, err))?;
    let mut reader = BufReader::new(file);
    let sensors = read_header(&mut reader).map_err(|err| err.reading(input))?;
    debug!(sensors = sensors.len(), "parsed header");

    let layout = CsvLayout::new(&sensors);
    let mut table = layout.table();
    let mut decoder = PacketDecoder::new(reader, &sensors);
    for row in decoder.by_ref() {
        let row = row.map_err(|source| IoError::ReadFailed {
            path: input.to_path_buf(),
            source,
        })?;
        table.rows.push(layout.row(&row));
    }
    let stats = decoder.stats();

    let euler = if config.convert_to_euler {
        Some(euler::apply(&mut table)?)
    } else {
        None
    };

    let output = output_path(input, output_dir);
    table.save(&output, separator)?;

    info!(
        ?output,
        rows = table.rows.len(),
        dropped = stats.dropped(),
        "conversion finished"
    );
    Ok(Conversion {
        input: input.to_path_buf(),
        output,
        sensors: sensors.len(),
        rows: table.rows.len(),
        stats,
        euler,
    })
}

#[derive(Debug)]
pub struct FileOutcome {
    pub input: PathBuf,
    pub result: Result<Conversion, Error>,
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub outcomes: Vec<FileOutcome>,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    pub fn successes(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    pub fn is_success(&self) -> bool {
        self.successes() == self.total()
    }

    /// Human-readable reason for every failed file, in input order.
    pub fn error_messages(&self) -> Vec<String> {
        self.outcomes
            .iter()
            .filter_map(|o| {
                let err = o.result.as_ref().err()?;
                Some(format!("{}: {err}", o.input.display()))
            })
            .collect()
    }

    pub fn summary(&self) -> String {
        if self.is_success() {
            "All conversions successful".to_string()
        } else {
            format!(
                "{} of {} conversions successful",
                self.successes(),
                self.total()
            )
        }
    }
}

/// Converts every input in order. Each file gets its own outcome.
pub fn convert_batch<P: AsRef<Path>>(
    inputs: &[P],
    output_dir: &Path,
    config: &Config,
) -> BatchReport {
    let mut report = BatchReport::default();
    for input in inputs {
        let input = input.as_ref();
        let result = convert_file(input, output_dir, config);
        if let Err(err) = &result {
            warn!(?input, %err, "conversion failed");
        }
        report.outcomes.push(FileOutcome {
            input: input.to_path_buf(),
            result,
        });
    }
    report
}
