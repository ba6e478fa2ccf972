//! Bounds-checked little-endian byte access (spec.md §4.1).
//!
//! Every higher layer is driven by numeric offsets pulled from a [`Variant`]
//! descriptor. A single wrong constant must fail loudly here rather than
//! silently read or write the wrong byte.
//!
//! [`Variant`]: crate::variant::Variant

use byteorder::{ByteOrder, LittleEndian};
use thiserror::Error;

/// Errors raised by the byte codec primitives.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecError {
    /// `offset + width` exceeded the buffer length.
    #[error("offset {offset} (width {width}) out of range for buffer of length {len}")]
    OutOfRange {
        offset: usize,
        width: usize,
        len: usize,
    },
}

fn check(len: usize, offset: usize, width: usize) -> Result<(), CodecError> {
    if offset.checked_add(width).map_or(true, |end| end > len) {
        return Err(CodecError::OutOfRange { offset, width, len });
    }
    Ok(())
}

/// Reads a little-endian `u8` at `offset`.
pub fn get_u8(buf: &[u8], offset: usize) -> Result<u8, CodecError> {
    check(buf.len(), offset, 1)?;
    Ok(buf[offset])
}

/// Reads a little-endian `u16` at `offset`.
pub fn get_u16(buf: &[u8], offset: usize) -> Result<u16, CodecError> {
    check(buf.len(), offset, 2)?;
    Ok(LittleEndian::read_u16(&buf[offset..offset + 2]))
}

/// Reads a little-endian `u32` at `offset`.
pub fn get_u32(buf: &[u8], offset: usize) -> Result<u32, CodecError> {
    check(buf.len(), offset, 4)?;
    Ok(LittleEndian::read_u32(&buf[offset..offset + 4]))
}

/// Returns a borrowed view of `len` bytes starting at `offset`.
pub fn bytes(buf: &[u8], offset: usize, len: usize) -> Result<&[u8], CodecError> {
    check(buf.len(), offset, len)?;
    Ok(&buf[offset..offset + len])
}

/// Writes a little-endian `u8` at `offset`.
pub fn set_u8(buf: &mut [u8], offset: usize, value: u8) -> Result<(), CodecError> {
    check(buf.len(), offset, 1)?;
    buf[offset] = value;
    Ok(())
}

/// Writes a little-endian `u16` at `offset`.
pub fn set_u16(buf: &mut [u8], offset: usize, value: u16) -> Result<(), CodecError> {
    check(buf.len(), offset, 2)?;
    LittleEndian::write_u16(&mut buf[offset..offset + 2], value);
    Ok(())
}

/// Writes a little-endian `u32` at `offset`.
pub fn set_u32(buf: &mut [u8], offset: usize, value: u32) -> Result<(), CodecError> {
    check(buf.len(), offset, 4)?;
    LittleEndian::write_u32(&mut buf[offset..offset + 4], value);
    Ok(())
}

/// Copies `data` into `buf` starting at `offset`.
pub fn copy_from(buf: &mut [u8], offset: usize, data: &[u8]) -> Result<(), CodecError> {
    check(buf.len(), offset, data.len())?;
    buf[offset..offset + data.len()].copy_from_slice(data);
    Ok(())
}
