//! Alignment helpers

/// Round `value` up to the next multiple of `alignment`.
///
/// Values already on a boundary are returned unchanged.
#[must_use]
pub const fn align_up(value: u64, alignment: u64) -> u64 {
    let rem = value % alignment;
    if rem == 0 { value } else { value + (alignment - rem) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_align_up() {
        assert_eq!(align_up(0, 16), 0);
        assert_eq!(align_up(1, 16), 16);
        assert_eq!(align_up(16, 16), 16);
        assert_eq!(align_up(0x41, 4), 0x44);
    }
}
