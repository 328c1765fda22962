//! Packet stream decoding.
//!
//! The payload after the header is a sequence of packets laid out as
//!
//! ```text
//! ┌──────────────┬─────────┬──────────────────────┬────────────┐
//! │ ts (u32, LE) │ id (u8) │ fields, schema order │ terminator │
//! │ 4 bytes      │ 1 byte  │ packet_size - 6      │ 1 byte     │
//! └──────────────┴─────────┴──────────────────────┴────────────┘
//! ```
//!
//! The stream is consumed one physical line (everything up to and including
//! the next `\n`) at a time. A payload may itself contain `\n`, so lines are
//! concatenated until the buffer reaches the size declared for the sensor.
//! Packets with an unknown id or a buffer that overshoots the declared size are
//! dropped and decoding resumes at the next line boundary. Dropping is never an
//! error; it is counted in [`DecodeStats`].

use std::io::{self, BufRead};

use tracing::debug;
use zerocopy::byteorder::little_endian::U32;

use crate::schema::{PAYLOAD_OFFSET, SensorDescriptor, Value};

pub const LINE_TERMINATOR: u8 = b'\n';

/// Timestamp and sensor id at the front of every packet.
#[derive(zerocopy::FromBytes, zerocopy::IntoBytes, zerocopy::Immutable, zerocopy::KnownLayout)]
#[repr(C)]
pub struct PacketPrefix {
    pub ts: U32, // in milliseconds
    pub id: u8,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DecodedRow {
    pub timestamp_ms: u32,
    /// Index into the descriptor list, not the on-wire id.
    pub sensor_index: usize,
    pub values: Vec<Value>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DecodeStats {
    pub emitted: usize,
    pub dropped_unknown_id: usize,
    pub dropped_size_mismatch: usize,
    /// A partial packet was pending when the input ended.
    pub truncated_tail: usize,
}

impl DecodeStats {
    pub fn dropped(&self) -> usize {
        self.dropped_unknown_id + self.dropped_size_mismatch + self.truncated_tail
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    /// Accumulating until the id byte is buffered.
    SeekId,
    /// Accumulating until the buffer reaches the packet size of this sensor.
    SeekLength(usize),
    Done,
}

/// Iterator over the packets of a log body.
///
/// When several sensors share an id only the first one in declaration order
/// is ever matched.
pub struct PacketDecoder<'a, R> {
    reader: R,
    sensors: &'a [SensorDescriptor],
    buf: Vec<u8>,
    state: State,
    stats: DecodeStats,
}

impl<'a, R: BufRead> PacketDecoder<'a, R> {
    pub fn new(reader: R, sensors: &'a [SensorDescriptor]) -> Self {
        Self {
            reader,
            sensors,
            buf: Vec::new(),
            state: State::SeekId,
            stats: DecodeStats::default(),
        }
    }

    pub fn stats(&self) -> DecodeStats {
        self.stats
    }

    /// Appends the next physical line to the buffer. Returns `false` at end of
    /// input.
    fn pull_line(&mut self) -> io::Result<bool> {
        let n = self.reader.read_until(LINE_TERMINATOR, &mut self.buf)?;
        if n == 0 {
            if !self.buf.is_empty() {
                debug!(buffered = self.buf.len(), "input ended inside a packet");
                self.stats.truncated_tail += 1;
                self.buf.clear();
            }
            self.state = State::Done;
            return Ok(false);
        }
        Ok(true)
    }

    fn reset(&mut self) {
        self.buf.clear();
        self.state = State::SeekId;
    }
}

impl<R: BufRead> Iterator for PacketDecoder<'_, R> {
    type Item = io::Result<DecodedRow>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.state {
                State::Done => return None,
                State::SeekId if self.buf.len() < PAYLOAD_OFFSET => {}
                State::SeekId => {
                    let id = self.buf[PAYLOAD_OFFSET - 1];
                    match self.sensors.iter().position(|s| s.id == id) {
                        Some(index) => self.state = State::SeekLength(index),
                        None => {
                            debug!(
                                id,
                                buffered = self.buf.len(),
                                "dropping packet with unknown id"
                            );
                            self.stats.dropped_unknown_id += 1;
                            self.reset();
                        }
                    }
                    continue;
                }
                State::SeekLength(index) => {
                    let packet_size = self.sensors[index].packet_size;
                    if self.buf.len() >= packet_size {
                        let row = (self.buf.len() == packet_size)
                            .then(|| decode_packet(&self.buf, index, self.sensors))
                            .flatten();
                        self.reset();
                        match row {
                            Some(row) => {
                                self.stats.emitted += 1;
                                return Some(Ok(row));
                            }
                            None => {
                                debug!(
                                    sensor = %self.sensors[index].name,
                                    expected = packet_size,
                                    "dropping packet that overshoots its declared size"
                                );
                                self.stats.dropped_size_mismatch += 1;
                                continue;
                            }
                        }
                    }
                }
            }

            match self.pull_line() {
                Ok(_) => {}
                Err(err) => {
                    self.state = State::Done;
                    return Some(Err(err));
                }
            }
        }
    }
}

/// Decodes a complete packet of `sensors[sensor_index]`.
///
/// Returns `None` if `packet` is not exactly as long as the sensor's packet.
pub fn decode_packet(
    packet: &[u8],
    sensor_index: usize,
    sensors: &[SensorDescriptor],
) -> Option<DecodedRow> {
    let sensor = sensors.get(sensor_index)?;
    if packet.len() != sensor.packet_size {
        return None;
    }
    let (prefix, _) = <PacketPrefix as zerocopy::FromBytes>::read_from_prefix(packet).ok()?;
    let values = sensor
        .field_offsets()
        .map(|(offset, field)| field.ty.decode(&packet[offset..]))
        .collect::<Option<Vec<_>>>()?;
    Some(DecodedRow {
        timestamp_ms: prefix.ts.get(),
        sensor_index,
        values,
    })
}
