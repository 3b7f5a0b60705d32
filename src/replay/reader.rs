use crate::foundation::error::{RenderError, RenderResult};

/// Marker byte that precedes a present (non-empty) replay string.
pub const STRING_PRESENT_MARKER: u8 = 0x0b;

/// Maximum number of encoded bytes accepted for a ULEB128 string length.
const MAX_ULEB128_BYTES: usize = 5;

/// Little-endian cursor over a replay buffer.
///
/// Every read is bounds-checked; running past the end is a
/// [`RenderError::MalformedInput`] and the cursor does not advance.
pub(crate) struct OsrReader<'a> {
    buf: &'a [u8],
    offset: usize,
}

impl<'a> OsrReader<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> Self {
        Self { buf, offset: 0 }
    }

    pub(crate) fn offset(&self) -> usize {
        self.offset
    }

    pub(crate) fn remaining(&self) -> usize {
        self.buf.len() - self.offset
    }

    fn take<const N: usize>(&mut self) -> RenderResult<[u8; N]> {
        let slice = self.bytes(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(slice);
        Ok(out)
    }

    pub(crate) fn bytes(&mut self, len: usize) -> RenderResult<&'a [u8]> {
        let end = self
            .offset
            .checked_add(len)
            .filter(|end| *end <= self.buf.len())
            .ok_or_else(|| {
                RenderError::malformed(format!(
                    "unexpected end of replay data at offset {} (needed {len} bytes, {} left)",
                    self.offset,
                    self.remaining()
                ))
            })?;
        let out = &self.buf[self.offset..end];
        self.offset = end;
        Ok(out)
    }

    pub(crate) fn u8(&mut self) -> RenderResult<u8> {
        Ok(self.take::<1>()?[0])
    }

    pub(crate) fn i16(&mut self) -> RenderResult<i16> {
        Ok(i16::from_le_bytes(self.take()?))
    }

    pub(crate) fn i32(&mut self) -> RenderResult<i32> {
        Ok(i32::from_le_bytes(self.take()?))
    }

    pub(crate) fn u32(&mut self) -> RenderResult<u32> {
        Ok(u32::from_le_bytes(self.take()?))
    }

    pub(crate) fn i64(&mut self) -> RenderResult<i64> {
        Ok(i64::from_le_bytes(self.take()?))
    }

    pub(crate) fn uleb128(&mut self) -> RenderResult<u64> {
        let mut result = 0u64;
        let mut shift = 0u32;
        for _ in 0..MAX_ULEB128_BYTES {
            let byte = self.u8()?;
            result |= u64::from(byte & 0x7f) << shift;
            if byte & 0x80 == 0 {
                return Ok(result);
            }
            shift += 7;
        }
        Err(RenderError::malformed(
            "invalid ULEB128 string length in replay data",
        ))
    }

    /// Read a marker-prefixed UTF-8 string (`0x00` = empty, `0x0b` = length + bytes).
    pub(crate) fn string(&mut self) -> RenderResult<String> {
        let at = self.offset;
        match self.u8()? {
            0x00 => Ok(String::new()),
            STRING_PRESENT_MARKER => {
                let len = usize::try_from(self.uleb128()?).map_err(|_| {
                    RenderError::malformed("replay string length does not fit in memory")
                })?;
                let bytes = self.bytes(len)?;
                Ok(String::from_utf8_lossy(bytes).into_owned())
            }
            other => Err(RenderError::malformed(format!(
                "invalid string marker 0x{other:02x} at offset {at}"
            ))),
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/replay/reader.rs"]
mod tests;
