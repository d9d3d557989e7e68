use crate::constants::ALIGNMENT;

/// Round `value` up to the next multiple of `align` (a power of two).
pub const fn round_up(value: usize, align: usize) -> usize {
    (value + align - 1) & !(align - 1)
}

/// Round up to the chunk alignment.
pub const fn align16(value: usize) -> usize {
    round_up(value, ALIGNMENT)
}

/// Number of zero bytes needed to bring `len` up to the chunk alignment.
pub const fn padding_for(len: usize) -> usize {
    align16(len) - len
}
