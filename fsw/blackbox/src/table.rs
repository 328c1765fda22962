//! Sparse CSV tables.
//!
//! Every sensor owns a contiguous block of columns after the `time` column. A
//! data row only carries the block of the sensor that produced it: blocks of
//! earlier sensors are left as empty cells and blocks of later sensors are
//! omitted entirely, so rows are shorter than the header.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::decode::DecodedRow;
use crate::error::{Error, IoError};
use crate::schema::SensorDescriptor;

pub const TIME_GROUP: &str = "time";
pub const TIME_LABEL: &str = "time [ms]";

/// A CSV file held in memory: two header rows followed by sparse data rows.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Table {
    /// Sensor group names, each placed above the first column of its block.
    pub groups: Vec<String>,
    /// Per-column `label [unit]` strings.
    pub labels: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// Reads a table written by [`Table::write`]. Missing header rows read as
    /// empty.
    pub fn read<R: Read>(reader: R, separator: u8) -> csv::Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(separator)
            .from_reader(reader);
        let mut records = reader.records();
        let mut next_row = || -> csv::Result<Option<Vec<String>>> {
            records
                .next()
                .transpose()
                .map(|record| record.map(|r| r.iter().map(str::to_string).collect()))
        };
        let groups = next_row()?.unwrap_or_default();
        let labels = next_row()?.unwrap_or_default();
        let mut rows = Vec::new();
        while let Some(row) = next_row()? {
            rows.push(row);
        }
        Ok(Self {
            groups,
            labels,
            rows,
        })
    }

    pub fn write<W: Write>(&self, writer: W, separator: u8) -> csv::Result<()> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(separator)
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(writer);
        writer.write_record(&self.groups)?;
        writer.write_record(&self.labels)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Reads the CSV file at `path`.
    pub fn load(path: &Path, separator: u8) -> Result<Self, Error> {
        let file = File::open(path).map_err(|err| IoError::open(path, err))?;
        Self::read(BufReader::new(file), separator).map_err(|err| {
            IoError::ReadFailed {
                path: path.to_path_buf(),
                source: err.into(),
            }
            .into()
        })
    }

    /// Writes the table to `path`, creating or truncating it.
    pub fn save(&self, path: &Path, separator: u8) -> Result<(), Error> {
        let file = File::create(path).map_err(|source| IoError::CreateFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let mut writer = BufWriter::new(file);
        let written = self
            .write(&mut writer, separator)
            .map_err(io::Error::from)
            .and_then(|()| writer.flush());
        written.map_err(|source| IoError::WriteFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(())
    }
}

/// Column layout derived from the sensor list of one log.
#[derive(Clone, Debug)]
pub struct CsvLayout {
    /// Number of empty cells that precede each sensor's block.
    offsets: Vec<usize>,
    groups: Vec<String>,
    labels: Vec<String>,
}

impl CsvLayout {
    pub fn new(sensors: &[SensorDescriptor]) -> Self {
        let mut offsets = Vec::with_capacity(sensors.len());
        let mut groups = vec![TIME_GROUP.to_string()];
        let mut labels = vec![TIME_LABEL.to_string()];
        for sensor in sensors {
            offsets.push(labels.len() - 1);
            for (i, field) in sensor.fields.iter().enumerate() {
                groups.push(if i == 0 {
                    sensor.name.clone()
                } else {
                    String::new()
                });
                labels.push(field.column_label());
            }
        }
        Self {
            offsets,
            groups,
            labels,
        }
    }

    pub fn groups(&self) -> &[String] {
        &self.groups
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Builds the sparse row for one decoded packet.
    pub fn row(&self, row: &DecodedRow) -> Vec<String> {
        let skip = self.offsets.get(row.sensor_index).copied().unwrap_or(0);
        let mut cells = Vec::with_capacity(1 + skip + row.values.len());
        cells.push(row.timestamp_ms.to_string());
        cells.extend(std::iter::repeat_n(String::new(), skip));
        cells.extend(row.values.iter().map(|v| v.to_string()));
        cells
    }

    /// An empty table carrying this layout's header rows.
    pub fn table(&self) -> Table {
        Table {
            groups: self.groups.clone(),
            labels: self.labels.clone(),
            rows: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Value, parse_sensor_line};

    fn sensors() -> Vec<SensorDescriptor> {
        vec![
            parse_sensor_line("S1;1;a,V,uint8_t").unwrap(),
            parse_sensor_line("S2;2;b,m,float;c,s,int32_t").unwrap(),
        ]
    }

    #[test]
    fn test_header_rows() {
        let layout = CsvLayout::new(&sensors());
        assert_eq!(layout.groups(), ["time", "S1", "S2", ""]);
        assert_eq!(layout.labels(), ["time [ms]", "a [V]", "b [m]", "c [s]"]);
    }

    #[test]
    fn test_row_pads_earlier_sensors_only() {
        let layout = CsvLayout::new(&sensors());
        let row = layout.row(&DecodedRow {
            timestamp_ms: 42,
            sensor_index: 1,
            values: vec![Value::F32(0.5), Value::I32(-3)],
        });
        assert_eq!(row, ["42", "", "0.5", "-3"]);

        let row = layout.row(&DecodedRow {
            timestamp_ms: 43,
            sensor_index: 0,
            values: vec![Value::U8(7)],
        });
        assert_eq!(row, ["43", "7"]);
    }

    #[test]
    fn test_write_sparse_table() {
        let layout = CsvLayout::new(&sensors());
        let mut table = layout.table();
        table.rows.push(layout.row(&DecodedRow {
            timestamp_ms: 1,
            sensor_index: 1,
            values: vec![Value::F32(1.25), Value::I32(9)],
        }));
        table.rows.push(layout.row(&DecodedRow {
            timestamp_ms: 2,
            sensor_index: 0,
            values: vec![Value::U8(3)],
        }));
        let mut out = Vec::new();
        table.write(&mut out, b';').unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "time;S1;S2;\ntime [ms];a [V];b [m];c [s]\n1;;1.25;9\n2;3\n"
        );
    }

    #[test]
    fn test_read_back() {
        let input = "time,IMU,\ntime [ms],q1 [NED],q2 [NED]\n1,0.5,0.25\n2\n";
        let table = Table::read(input.as_bytes(), b',').unwrap();
        assert_eq!(table.groups, ["time", "IMU", ""]);
        assert_eq!(table.labels, ["time [ms]", "q1 [NED]", "q2 [NED]"]);
        assert_eq!(table.rows, vec![vec!["1", "0.5", "0.25"], vec!["2"]]);

        let mut out = Vec::new();
        table.write(&mut out, b',').unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), input);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("table.csv");
        let layout = CsvLayout::new(&sensors());
        let mut table = layout.table();
        table.rows.push(layout.row(&DecodedRow {
            timestamp_ms: 5,
            sensor_index: 0,
            values: vec![Value::U8(1)],
        }));
        table.save(&path, b'\t').unwrap();
        assert_eq!(Table::load(&path, b'\t').unwrap(), table);

        let missing = dir.path().join("missing").join("table.csv");
        assert!(matches!(
            table.save(&missing, b';'),
            Err(Error::Io(IoError::CreateFailed { .. }))
        ));
        assert!(matches!(
            Table::load(&missing, b';'),
            Err(Error::Io(IoError::FileNotFound { .. }))
        ));
    }
}
