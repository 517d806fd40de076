//! CRM descriptor encoder
//!
//! Turns the logical geometry of a register block (word width, up to three
//! dimension sizes and strides) into the shift-based record the CRM walks.
//! The hardware only understands power-of-two block sizes and strides, so a
//! non-power-of-two inner dimension is rounded up when doing so cannot pull
//! foreign registers into the scan.

use crate::error::{Result, SwitchError};
use fm10k_chip::crm::{command, register, CrmCommand, CrmMonitorConfig, SHIFT_UNUSED};

/// Logical shape of a monitored block
///
/// `sizes[0]` is the inner entry count and `strides[0]` the word delta between
/// inner entries; `strides[1]` and `strides[2]` step the outer dimensions. A
/// zero size marks an absent dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrmGeometry {
    /// 32-bit words per register
    pub word_count: u32,
    /// Entry counts, innermost first
    pub sizes: [u32; 3],
    /// Word strides, innermost first
    pub strides: [u32; 3],
}

impl CrmGeometry {
    /// `size` registers of `word_count` words, `stride` words apart
    pub const fn one_d(word_count: u32, size: u32, stride: u32) -> Self {
        Self {
            word_count,
            sizes: [size, 0, 0],
            strides: [stride, 0, 0],
        }
    }

    /// `sizes[1]` rows of `sizes[0]` registers
    pub const fn two_d(word_count: u32, sizes: [u32; 2], strides: [u32; 2]) -> Self {
        Self {
            word_count,
            sizes: [sizes[0], sizes[1], 0],
            strides: [strides[0], strides[1], 0],
        }
    }

    /// `sizes[2]` planes of `sizes[1]` rows of `sizes[0]` registers
    pub const fn three_d(word_count: u32, sizes: [u32; 3], strides: [u32; 3]) -> Self {
        Self {
            word_count,
            sizes,
            strides,
        }
    }
}

/// Encode `geometry` at word address `base` into a monitor slot record
///
/// The returned record has `reg_count = 1`, `param = 0` and `data_index = 0`;
/// the caller fills in the operand.
///
/// # Errors
///
/// - `InvalidArgument` for a zero base, word count, inner size or inner
///   stride, a third dimension without a second, or an outer stride that
///   overlaps the block it steps over.
/// - `Unsupported` for a non-contiguous inner dimension, a non-power-of-two
///   inner size that cannot be rounded without a gap, non-power-of-two outer
///   strides or sizes, or values wider than the record fields.
pub fn init_config(command: CrmCommand, base: u32, geometry: &CrmGeometry) -> Result<CrmMonitorConfig> {
    let CrmGeometry {
        word_count,
        sizes: [size1, size2, size3],
        strides: [stride0, stride1, stride2],
    } = *geometry;

    if base == 0 {
        return Err(SwitchError::invalid_argument("CRM base address must be non-zero"));
    }
    if word_count == 0 || size1 == 0 || stride0 == 0 {
        return Err(SwitchError::invalid_argument(format!(
            "degenerate geometry: {word_count} words, size {size1}, stride {stride0}"
        )));
    }
    if size2 == 0 && size3 != 0 {
        return Err(SwitchError::invalid_argument("third dimension given without a second"));
    }
    if u64::from(base) > register::BASE_ADDRESS.max() {
        return Err(SwitchError::unsupported(format!(
            "base address {base:#x} wider than 24 bits"
        )));
    }

    // Registers logically 3 words wide but padded to 4 scan as 4-word registers
    let words = match (word_count, stride0) {
        (w, s) if w == s => w,
        (3, 4) => 4,
        _ => {
            return Err(SwitchError::unsupported(format!(
                "inner stride {stride0} does not match {word_count}-word registers"
            )))
        }
    };
    if u64::from(words - 1) > register::SIZE.max() {
        return Err(SwitchError::unsupported(format!("{words}-word registers exceed the size field")));
    }
    #[allow(clippy::cast_possible_truncation)]
    let reg_size = (words - 1) as u8;

    let mut cfg = CrmMonitorConfig {
        command,
        reg_count: 1,
        base_address: base,
        reg_size,
        size1_shift: SHIFT_UNUSED,
        stride1_shift: SHIFT_UNUSED,
        size2_shift: SHIFT_UNUSED,
        stride2_shift: SHIFT_UNUSED,
        ..CrmMonitorConfig::CLEARED
    };

    let entry_count = if size2 == 0 {
        u64::from(size1)
    } else if size3 == 0 {
        let span = u64::from(size1) * u64::from(words);
        outer_stride("stride1", stride1, span)?;
        let mut size1_shift = floor_log2(size1);
        let mut count = u64::from(size1) * u64::from(size2);
        if !size1.is_power_of_two() {
            let adjust = 1u64 << (size1_shift + 1);
            if adjust * u64::from(words) != u64::from(stride1) {
                return Err(SwitchError::unsupported(format!(
                    "rounding {size1} entries up to {adjust} would leave a gap before stride {stride1}"
                )));
            }
            size1_shift += 1;
            // Full rounded blocks, then only the logical entries of the last one
            count = adjust * u64::from(size2 - 1) + u64::from(size1);
        }
        cfg.size1_shift = shift_field("size1", size1_shift)?;
        cfg.stride1_shift = stride_field("stride1", stride1)?;
        count
    } else {
        let span1 = u64::from(size1) * u64::from(words);
        outer_stride("stride1", stride1, span1)?;
        outer_stride("stride2", stride2, u64::from(size2) * u64::from(stride1))?;
        if !size2.is_power_of_two() {
            return Err(SwitchError::unsupported(format!(
                "second dimension size {size2} is not a power of two"
            )));
        }
        let mut size1_shift = floor_log2(size1);
        if !size1.is_power_of_two() {
            size1_shift += 1;
        }
        cfg.size1_shift = shift_field("size1", size1_shift)?;
        cfg.stride1_shift = stride_field("stride1", stride1)?;
        cfg.size2_shift = shift_field("size2", floor_log2(size2))?;
        cfg.stride2_shift = stride_field("stride2", stride2)?;
        u64::from(size1) * u64::from(size2) * u64::from(size3)
    };

    if entry_count > command::COUNT.max() {
        return Err(SwitchError::unsupported(format!(
            "{entry_count} registers exceed the count field"
        )));
    }
    #[allow(clippy::cast_possible_truncation)]
    let entry_count = entry_count as u32;
    cfg.entry_count = entry_count;
    Ok(cfg)
}

const fn floor_log2(v: u32) -> u32 {
    31 - v.leading_zeros()
}

fn outer_stride(name: &str, stride: u32, span: u64) -> Result<()> {
    if u64::from(stride) < span {
        return Err(SwitchError::invalid_argument(format!(
            "{name} {stride} overlaps the {span} words it steps over"
        )));
    }
    if !stride.is_power_of_two() {
        return Err(SwitchError::unsupported(format!("{name} {stride} is not a power of two")));
    }
    Ok(())
}

fn shift_field(name: &str, shift: u32) -> Result<u8> {
    u8::try_from(shift)
        .ok()
        .filter(|&s| s < SHIFT_UNUSED)
        .ok_or_else(|| SwitchError::unsupported(format!("{name} shift {shift} out of encodable range")))
}

/// Stored stride field: the shift of `stride` minus one
fn stride_field(name: &str, stride: u32) -> Result<u8> {
    let shift = floor_log2(stride);
    if shift == 0 {
        return Err(SwitchError::unsupported(format!("{name} of one word cannot be encoded")));
    }
    shift_field(name, shift - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checksum(base: u32, g: &CrmGeometry) -> Result<CrmMonitorConfig> {
        init_config(CrmCommand::Checksum, base, g)
    }

    #[test]
    fn contiguous_one_d_covers_every_entry() {
        for words in 1..=4 {
            for size in [1, 2, 7, 256, 1024] {
                let cfg = checksum(0x100, &CrmGeometry::one_d(words, size, words)).unwrap();
                assert_eq!(cfg.entry_count, size);
                assert_eq!(cfg.reg_count, 1);
                assert_eq!(u32::from(cfg.reg_size), words - 1);
                assert_eq!(cfg.size1_shift, SHIFT_UNUSED);
                assert_eq!(cfg.stride2_shift, SHIFT_UNUSED);
            }
        }
    }

    #[test]
    fn padded_three_word_registers_promote_to_four() {
        let cfg = checksum(0xD4_0000, &CrmGeometry::one_d(3, 4096, 4)).unwrap();
        assert_eq!(cfg.words_per_register(), 4);
        assert_eq!(cfg.entry_count, 4096);
    }

    #[test]
    fn non_contiguous_one_d_is_unsupported() {
        for (words, stride) in [(1, 2), (2, 4), (4, 8), (3, 8), (2, 1)] {
            let err = checksum(0x100, &CrmGeometry::one_d(words, 16, stride)).unwrap_err();
            assert!(matches!(err, SwitchError::Unsupported { .. }), "{words}/{stride}: {err}");
        }
    }

    #[test]
    fn preconditions_are_invalid_arguments() {
        let bad = [
            (0, CrmGeometry::one_d(1, 4, 1)),
            (0x100, CrmGeometry::one_d(0, 4, 1)),
            (0x100, CrmGeometry::one_d(1, 0, 1)),
            (0x100, CrmGeometry::one_d(1, 4, 0)),
            (0x100, CrmGeometry::three_d(1, [4, 0, 2], [1, 4, 16])),
        ];
        for (base, g) in bad {
            assert!(matches!(checksum(base, &g), Err(SwitchError::InvalidArgument { .. })), "{g:?}");
        }
    }

    #[test]
    fn rounds_non_power_of_two_rows_without_gap() {
        let g = CrmGeometry::two_d(4, [12, 1], [4, 64]);
        let cfg = checksum(0x200, &g).unwrap();
        assert_eq!(cfg.size1_shift, 4);
        assert_eq!(cfg.stride1_shift, 5);
        assert_eq!(cfg.entry_count, 12);
        assert_eq!(cfg.size2_shift, SHIFT_UNUSED);

        // Deterministic down to the packed words
        let again = checksum(0x200, &g).unwrap();
        assert_eq!(again.command_words(), cfg.command_words());
        assert_eq!(again.register_words(), cfg.register_words());
    }

    #[test]
    fn rounding_across_a_gap_is_unsupported() {
        // 12 entries of 2 words round to 16 x 2 = 32 words, stride 64 leaves a gap
        let err = checksum(0x200, &CrmGeometry::two_d(2, [12, 4], [2, 64])).unwrap_err();
        assert!(matches!(err, SwitchError::Unsupported { .. }));
    }

    #[test]
    fn power_of_two_rows_keep_exact_count() {
        let cfg = checksum(0x1000, &CrmGeometry::two_d(1, [8, 5], [1, 32])).unwrap();
        assert_eq!(cfg.size1_shift, 3);
        assert_eq!(cfg.stride1_shift, 4);
        assert_eq!(cfg.entry_count, 40);
    }

    #[test]
    fn outer_stride_checks() {
        let overlap = checksum(0x1000, &CrmGeometry::two_d(2, [8, 2], [2, 8])).unwrap_err();
        assert!(matches!(overlap, SwitchError::InvalidArgument { .. }));
        let odd = checksum(0x1000, &CrmGeometry::two_d(1, [8, 2], [1, 24])).unwrap_err();
        assert!(matches!(odd, SwitchError::Unsupported { .. }));
    }

    #[test]
    fn field_overflow_is_unsupported() {
        assert!(matches!(
            checksum(0x100_0000, &CrmGeometry::one_d(1, 4, 1)),
            Err(SwitchError::Unsupported { .. })
        ));
        assert!(matches!(
            checksum(0x100, &CrmGeometry::one_d(5, 4, 5)),
            Err(SwitchError::Unsupported { .. })
        ));
        assert!(matches!(
            checksum(0x100, &CrmGeometry::one_d(1, 1 << 24, 1)),
            Err(SwitchError::Unsupported { .. })
        ));
        // A 2^16-word stride would need the sentinel shift
        assert!(matches!(
            checksum(0x100, &CrmGeometry::two_d(1, [4, 2], [1, 1 << 16])),
            Err(SwitchError::Unsupported { .. })
        ));
    }

    #[test]
    fn three_d_rounds_inner_shift_unconditionally() {
        // 12 rows of 1 word in 16-word blocks: rounded even though stride is 32
        let g = CrmGeometry::three_d(1, [12, 4, 3], [1, 32, 256]);
        let cfg = checksum(0x4000, &g).unwrap();
        assert_eq!(cfg.size1_shift, 4);
        assert_eq!(cfg.stride1_shift, 4);
        assert_eq!(cfg.size2_shift, 2);
        assert_eq!(cfg.stride2_shift, 7);
        assert_eq!(cfg.entry_count, 12 * 4 * 3);
    }

    #[test]
    fn three_d_requires_power_of_two_middle_dimension() {
        let err = checksum(0x4000, &CrmGeometry::three_d(1, [4, 3, 2], [1, 4, 64])).unwrap_err();
        assert!(matches!(err, SwitchError::Unsupported { .. }));
    }

    /// Every accepted 1-D/2-D encoding scans exactly the logical footprint
    #[test]
    fn accepted_encodings_stay_inside_the_block() {
        let base = 0x8000;
        let mut accepted = 0;
        for words in 1..=4u32 {
            for size1 in 1..=20u32 {
                for size2 in 1..=4u32 {
                    for stride1 in (1..=9).map(|s| 1u32 << s) {
                        let g = CrmGeometry::two_d(words, [size1, size2], [words, stride1]);
                        let Ok(cfg) = checksum(base, &g) else { continue };
                        accepted += 1;

                        let last = base + (size2 - 1) * stride1 + size1 * words - 1;
                        assert_eq!(cfg.footprint(), Some((base, last)), "{g:?}");

                        // Scanned registers never straddle into the next row
                        for a in cfg.scan_addresses() {
                            let row = (a - base) / stride1;
                            let off = (a - base) % stride1;
                            assert!(row < size2, "{g:?} scanned {a:#x}");
                            assert!(off + words <= stride1, "{g:?} scanned {a:#x}");
                        }
                    }
                }
            }
        }
        assert!(accepted > 100);
    }
}
