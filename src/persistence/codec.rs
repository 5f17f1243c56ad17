//! Little-endian byte codec.
//!
//! Fixed-width integers are little-endian. Strings are a `u32` byte length
//! followed by UTF-8. Decimals use their 16-byte native encoding so scale is
//! preserved exactly. Options are a `u8` presence marker followed by the
//! value.

use rust_decimal::Decimal;

use crate::error::{ActivityError, Result};
use crate::models::{TimeSpan, Timestamp, TICKS_PER_DAY};

/// Append-only byte buffer.
#[derive(Debug, Default)]
pub struct ByteWriter {
    buf: Vec<u8>,
}

impl ByteWriter {
    /// Creates an empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Written bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Consumes the writer.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub fn write_bool(&mut self, v: bool) {
        self.write_u8(u8::from(v));
    }

    pub fn write_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_i32(&mut self, v: i32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_i64(&mut self, v: i64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_decimal(&mut self, v: Decimal) {
        self.buf.extend_from_slice(&v.serialize());
    }

    pub fn write_timestamp(&mut self, v: Timestamp) {
        self.write_i64(v.ticks());
    }

    pub fn write_span(&mut self, v: TimeSpan) {
        self.write_i64(v.ticks());
    }

    /// Writes a collection length.
    pub fn write_len(&mut self, len: usize) {
        // Collections are bounded by scenario size, far below u32::MAX.
        self.write_u32(u32::try_from(len).unwrap_or(u32::MAX));
    }

    pub fn write_str(&mut self, v: &str) {
        self.write_len(v.len());
        self.buf.extend_from_slice(v.as_bytes());
    }

    /// Writes a presence marker and, if present, the value.
    pub fn write_option<T>(&mut self, v: Option<T>, write: impl FnOnce(&mut Self, T)) {
        match v {
            Some(v) => {
                self.write_u8(1);
                write(self, v);
            }
            None => self.write_u8(0),
        }
    }
}

/// Cursor over a byte slice.
#[derive(Debug)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
    dst_fixup: bool,
    fixups: usize,
}

impl<'a> ByteReader<'a> {
    /// Creates a reader at offset 0.
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            dst_fixup: false,
            fixups: 0,
        }
    }

    /// Normalizes timestamps within one day of the minimum date to unset.
    ///
    /// Files written during the daylight-saving defect stored the "unset"
    /// sentinel shifted by a few hours.
    pub fn with_dst_fixup(mut self, enabled: bool) -> Self {
        self.dst_fixup = enabled;
        self
    }

    pub(crate) fn set_dst_fixup(&mut self, enabled: bool) {
        self.dst_fixup = enabled;
    }

    /// Number of timestamps the fixup rewrote.
    pub fn fixups(&self) -> usize {
        self.fixups
    }

    /// Current offset.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes left.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(ActivityError::Truncated {
                offset: self.pos,
                needed: n - self.remaining(),
            });
        }
        let bytes = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let bytes = self.take(N)?;
        bytes
            .try_into()
            .map_err(|_| ActivityError::Corrupt(format!("bad {N}-byte field")))
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take_array::<1>()?[0])
    }

    pub fn read_bool(&mut self) -> Result<bool> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            v => Err(ActivityError::Corrupt(format!(
                "bad bool {v} at offset {}",
                self.pos - 1
            ))),
        }
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.take_array()?))
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(i32::from_le_bytes(self.take_array()?))
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.take_array()?))
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        Ok(i64::from_le_bytes(self.take_array()?))
    }

    pub fn read_decimal(&mut self) -> Result<Decimal> {
        Ok(Decimal::deserialize(self.take_array()?))
    }

    pub fn read_timestamp(&mut self) -> Result<Timestamp> {
        let ticks = self.read_i64()?;
        if self.dst_fixup && ticks > 0 && ticks <= TICKS_PER_DAY {
            self.fixups += 1;
            return Ok(Timestamp::UNSET);
        }
        Ok(Timestamp::from_ticks(ticks))
    }

    pub fn read_span(&mut self) -> Result<TimeSpan> {
        Ok(TimeSpan::from_ticks(self.read_i64()?))
    }

    /// Reads a collection length, rejecting lengths the stream cannot hold.
    pub fn read_len(&mut self) -> Result<usize> {
        let len = self.read_u32()? as usize;
        if len > self.remaining() {
            return Err(ActivityError::Corrupt(format!(
                "length {len} at offset {} exceeds remaining {} bytes",
                self.pos - 4,
                self.remaining()
            )));
        }
        Ok(len)
    }

    pub fn read_string(&mut self) -> Result<String> {
        let len = self.read_len()?;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|e| ActivityError::Corrupt(format!("invalid utf-8: {e}")))
    }

    pub fn read_option<T>(
        &mut self,
        read: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<Option<T>> {
        if self.read_bool()? {
            Ok(Some(read(self)?))
        } else {
            Ok(None)
        }
    }
}
