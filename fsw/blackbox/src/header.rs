//! Header region scanning.
//!
//! A log starts with a text region bracketed by a line containing `HEADER`
//! and a line containing `ENDHEADER`. Every line in between declares one
//! sensor. The binary packet stream starts right after the end marker, so the
//! reader is left positioned on the first payload byte.

use std::io::BufRead;

use crate::error::{Error, HeaderError};
use crate::schema::{SensorDescriptor, parse_sensor_line};

pub const HEADER_START: &str = "HEADER";
pub const HEADER_END: &str = "ENDHEADER";

/// Separator that terminates every header record and is not part of the data.
const RECORD_SEPARATOR: char = ';';

/// Reads the header region from `reader` and parses every sensor line.
///
/// Any malformed sensor line rejects the whole header; no partial sensor list
/// is ever returned.
pub fn read_header<R: BufRead>(reader: &mut R) -> Result<Vec<SensorDescriptor>, Error> {
    let mut lines = Vec::new();
    let mut started = false;
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            let err = if started {
                HeaderError::UnterminatedHeader
            } else {
                HeaderError::NoHeaderFound
            };
            return Err(err.into());
        }
        let line = String::from_utf8_lossy(&buf);
        if !started {
            started = line.contains(HEADER_START);
            continue;
        }
        if line.contains(HEADER_END) {
            break;
        }
        lines.push(strip_record(&line).to_string());
    }

    if lines.is_empty() {
        return Err(HeaderError::EmptyHeader.into());
    }

    lines
        .iter()
        .map(|line| parse_sensor_line(line).map_err(Error::from))
        .collect()
}

/// Removes the line terminator and the trailing record separator.
fn strip_record(line: &str) -> &str {
    let line = line.trim_end_matches(['\n', '\r']);
    line.strip_suffix(RECORD_SEPARATOR).unwrap_or(line)
}
