/// Build a mask covering bits `h..=l` (inclusive, `h >= l`)
pub fn mask(h: u32, l: u32) -> u32 {
    debug_assert!(h >= l && h < 32);
    (((1u64 << (h - l + 1)) - 1) as u32) << l
}

/// Extract bits `h..=l` of `b`, shifted down to bit 0
pub fn bits(b: u8, h: u32, l: u32) -> u8 {
    debug_assert!(h >= l && h < 8);
    (b & mask(h, l) as u8) >> l
}
