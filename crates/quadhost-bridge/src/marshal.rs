//! Text and byte marshaling between guest linear memory and host values.
//!
//! ## Memory Convention
//!
//! Every payload crosses as an `(offset, length)` pair into the guest's
//! linear memory. The guest owns and sizes the memory; the host only reads
//! and writes the region it is given.
//!
//! - Offsets and lengths are `u32` (wasm32 address space)
//! - Text is UTF-8; reads stop at the first NUL. A NUL-terminated string
//!   may sit closer to the end of memory than the stated maximum length
//! - Writes never truncate: a payload longer than the supplied capacity is
//!   a [`BridgeError::BufferOverflow`] and traps the guest call

use crate::error::{BridgeError, Result};

/// Resolve `(offset, len)` to a range inside `mem`.
fn region(mem_len: usize, offset: u32, len: u32) -> Result<std::ops::Range<usize>> {
    let start = offset as usize;
    let end = start
        .checked_add(len as usize)
        .filter(|end| *end <= mem_len)
        .ok_or(BridgeError::OutOfBounds {
            offset,
            len,
            memory_size: mem_len,
        })?;
    Ok(start..end)
}

/// Decode up to `max_len` bytes at `offset` as UTF-8 text.
///
/// Stops at the first NUL. The scan is clamped to the end of memory, so
/// the region only has to fit when no NUL is found inside memory.
/// Invalid sequences are replaced with U+FFFD.
pub fn decode_text(mem: &[u8], offset: u32, max_len: u32) -> Result<String> {
    let out_of_bounds = BridgeError::OutOfBounds {
        offset,
        len: max_len,
        memory_size: mem.len(),
    };
    let start = offset as usize;
    let Some(tail) = mem.get(start..) else {
        return Err(out_of_bounds);
    };
    let available = &tail[..tail.len().min(max_len as usize)];
    let end = match available.iter().position(|&b| b == 0) {
        Some(nul) => nul,
        None if available.len() < max_len as usize => return Err(out_of_bounds),
        None => available.len(),
    };
    Ok(String::from_utf8_lossy(&available[..end]).into_owned())
}

/// Write the UTF-8 encoding of `text` at `offset`.
///
/// Returns the number of bytes written.
pub fn encode_text_into(mem: &mut [u8], text: &str, offset: u32, max_len: u32) -> Result<usize> {
    copy_bytes_into(mem, text.as_bytes(), offset, max_len)
}

/// Copy `bytes` into guest memory at `offset`.
///
/// Returns the number of bytes written.
pub fn copy_bytes_into(mem: &mut [u8], bytes: &[u8], offset: u32, max_len: u32) -> Result<usize> {
    if bytes.len() > max_len as usize {
        return Err(BridgeError::BufferOverflow {
            needed: bytes.len(),
            capacity: max_len,
        });
    }
    let dest = region(mem.len(), offset, max_len)?;
    mem[dest.start..dest.start + bytes.len()].copy_from_slice(bytes);
    Ok(bytes.len())
}

/// Copy `len` bytes out of guest memory into an owned buffer.
///
/// The copy is decoupled from the guest memory, which may grow or be
/// reused after the call returns.
pub fn clone_bytes_from(mem: &[u8], offset: u32, len: u32) -> Result<Vec<u8>> {
    Ok(mem[region(mem.len(), offset, len)?].to_vec())
}

/// Decode UTF-16 code units; unpaired surrogates become U+FFFD.
pub(crate) fn string_from_utf16(units: &[u16]) -> String {
    let mut text = String::with_capacity(utf8_len_of_utf16(units));
    text.extend(
        char::decode_utf16(units.iter().copied())
            .map(|r| r.unwrap_or(char::REPLACEMENT_CHARACTER)),
    );
    text
}

/// Encode text as UTF-16 code units.
pub(crate) fn string_to_utf16(text: &str) -> Vec<u16> {
    text.encode_utf16().collect()
}

/// UTF-8 byte length of a UTF-16 string, without allocating.
pub(crate) fn utf8_len_of_utf16(units: &[u16]) -> usize {
    char::decode_utf16(units.iter().copied())
        .map(|r| r.unwrap_or(char::REPLACEMENT_CHARACTER).len_utf8())
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn memory_with(offset: usize, bytes: &[u8]) -> Vec<u8> {
        let mut mem = vec![0u8; 64];
        mem[offset..offset + bytes.len()].copy_from_slice(bytes);
        mem
    }

    #[rstest]
    #[case::exact(b"hello".as_slice(), 5, "hello")]
    #[case::short_read(b"hello".as_slice(), 3, "hel")]
    #[case::stops_at_nul(b"hi\0there".as_slice(), 8, "hi")]
    #[case::multibyte("héllo".as_bytes(), 6, "héllo")]
    #[case::empty(b"".as_slice(), 0, "")]
    #[case::nul_before_end_of_memory(b"tail\0".as_slice(), 4096, "tail")]
    fn test_decode_text(#[case] bytes: &[u8], #[case] max_len: u32, #[case] expected: &str) {
        let mem = memory_with(8, bytes);
        assert_eq!(decode_text(&mem, 8, max_len).unwrap(), expected);
    }

    #[test]
    fn test_decode_text_lossy() {
        let mem = memory_with(0, &[b'a', 0xff, b'b']);
        assert_eq!(decode_text(&mem, 0, 3).unwrap(), "a\u{fffd}b");
    }

    #[test]
    fn test_decode_out_of_bounds() {
        // no NUL before the end of memory
        let mem = vec![b'x'; 16];
        let err = decode_text(&mem, 10, 10).unwrap_err();
        assert!(matches!(
            err,
            BridgeError::OutOfBounds { offset: 10, len: 10, memory_size: 16 }
        ));
        assert!(decode_text(&mem, 17, 0).is_err());
        assert!(decode_text(&mem, u32::MAX, 2).is_err());
    }

    #[test]
    fn test_decode_terminated_string_at_end_of_memory() {
        let mut mem = vec![b'x'; 32];
        mem[29..32].copy_from_slice(b"hi\0");
        assert_eq!(decode_text(&mem, 29, 16).unwrap(), "hi");

        // the terminator is past max_len, so the read is just max_len bytes
        assert_eq!(decode_text(&mem, 29, 1).unwrap(), "h");
        // an empty read at the very end is still in bounds
        assert_eq!(decode_text(&mem, 32, 0).unwrap(), "");
    }

    #[test]
    fn test_encode_text_into() {
        let mut mem = vec![0xaau8; 32];
        let written = encode_text_into(&mut mem, "€1", 4, 8).unwrap();

        assert_eq!(written, 4);
        assert_eq!(&mem[4..8], "€1".as_bytes());
        // bytes past the payload are untouched
        assert_eq!(mem[8], 0xaa);
    }

    #[test]
    fn test_encode_overflow_is_fault() {
        let mut mem = vec![0u8; 32];
        let err = encode_text_into(&mut mem, "too long", 0, 3).unwrap_err();
        assert!(matches!(err, BridgeError::BufferOverflow { needed: 8, capacity: 3 }));
        assert!(mem.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_copy_bytes_capacity_must_fit_memory() {
        let mut mem = vec![0u8; 8];
        let err = copy_bytes_into(&mut mem, &[1, 2], 4, 16).unwrap_err();
        assert!(matches!(err, BridgeError::OutOfBounds { .. }));
    }

    #[test]
    fn test_clone_bytes_from_is_detached() {
        let mut mem = memory_with(2, &[1, 2, 3]);
        let copy = clone_bytes_from(&mem, 2, 3).unwrap();
        mem[2] = 99;
        assert_eq!(copy, vec![1, 2, 3]);
    }

    #[rstest]
    #[case::ascii("abc", 3)]
    #[case::two_byte("é", 2)]
    #[case::three_byte("€", 3)]
    #[case::surrogate_pair("😀", 4)]
    fn test_utf8_len_of_utf16(#[case] text: &str, #[case] expected: usize) {
        let units = string_to_utf16(text);
        assert_eq!(utf8_len_of_utf16(&units), expected);
        assert_eq!(string_from_utf16(&units), text);
    }

    #[test]
    fn test_unpaired_surrogate_replaced() {
        let units = [0x0061, 0xd800, 0x0062];
        assert_eq!(string_from_utf16(&units), "a\u{fffd}b");
        assert_eq!(utf8_len_of_utf16(&units), 5);
    }
}
