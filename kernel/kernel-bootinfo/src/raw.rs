//! Little-endian field reads over raw handoff buffers.

pub(crate) fn read_u32(bytes: &[u8], offset: usize) -> Option<u32> {
    let end = offset.checked_add(4)?;
    let raw = bytes.get(offset..end)?;
    raw.try_into().ok().map(u32::from_le_bytes)
}

pub(crate) fn read_u64(bytes: &[u8], offset: usize) -> Option<u64> {
    let end = offset.checked_add(8)?;
    let raw = bytes.get(offset..end)?;
    raw.try_into().ok().map(u64::from_le_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_are_little_endian_and_bounds_checked() {
        let bytes = [0x78, 0x56, 0x34, 0x12, 0xff];
        assert_eq!(read_u32(&bytes, 0), Some(0x1234_5678));
        assert_eq!(read_u32(&bytes, 2), None);
        assert_eq!(read_u64(&bytes, 0), None);
        assert_eq!(read_u32(&bytes, usize::MAX), None);
    }
}
