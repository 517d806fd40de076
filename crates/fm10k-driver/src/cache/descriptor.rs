//! Register set descriptors
//!
//! A [`RegisterSet`] is the static description of one hardware table: where
//! it lives, how wide each register is, how its entries are indexed, and how
//! its shadow is seeded. Descriptors are `const` data shared by every switch
//! instance; the per-switch shadow storage lives in the cache.
//!
//! Index slices are **innermost first**: `[entry]` for a one-index set,
//! `[entry, outer]` for a two-index set.

use crate::error::{Result, SwitchError};

/// Reset-value generator, called with a word address
pub type DefaultValueFn = fn(addr: u32) -> u32;

/// One indexed dimension of a register set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dim {
    /// Entries along this dimension
    pub count: u32,
    /// Word-address delta between consecutive entries
    pub stride: u32,
}

impl Dim {
    /// Dimension of `count` entries, `stride` words apart
    pub const fn new(count: u32, stride: u32) -> Self {
        Self { count, stride }
    }
}

/// Indexing shape of a register set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimensions {
    /// A single register
    Scalar,
    /// A table indexed by one entry number
    OneIndex(Dim),
    /// A table of tables: `(inner, outer)`
    TwoIndices(Dim, Dim),
}

impl Dimensions {
    /// Number of indices an access must supply
    pub const fn count(&self) -> usize {
        match self {
            Self::Scalar => 0,
            Self::OneIndex(_) => 1,
            Self::TwoIndices(..) => 2,
        }
    }

    /// Dimension `i`, innermost first
    pub const fn dim(&self, i: usize) -> Option<Dim> {
        match (self, i) {
            (Self::OneIndex(d) | Self::TwoIndices(d, _), 0) | (Self::TwoIndices(_, d), 1) => {
                Some(*d)
            }
            _ => None,
        }
    }
}

/// Static description of one cached register table
#[derive(Debug)]
pub struct RegisterSet {
    /// Register name as in the datasheet
    pub name: &'static str,
    /// Word address of entry (0, 0)
    pub base: u32,
    /// 32-bit words per register
    pub width: u32,
    /// Indexing shape
    pub dims: Dimensions,
    /// Whether a CRM slot may checksum (part of) this set
    pub cacheable: bool,
    /// Entries hold meaningful data only once written (TCAM keys)
    pub tracks_validity: bool,
    /// Reset value per word address; `None` means the shadow must be read from hardware
    pub default_value: Option<DefaultValueFn>,
}

impl RegisterSet {
    /// Total entries
    pub const fn entry_count(&self) -> u32 {
        match self.dims {
            Dimensions::Scalar => 1,
            Dimensions::OneIndex(d) => d.count,
            Dimensions::TwoIndices(inner, outer) => inner.count * outer.count,
        }
    }

    /// Words of shadow storage
    pub const fn shadow_words(&self) -> usize {
        self.entry_count() as usize * self.width as usize
    }

    /// Check the descriptor is self-consistent
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for a zero width, an empty dimension, a
    /// stride narrower than the data it steps over, or an address range that
    /// overflows 32 bits.
    pub fn validate(&self) -> Result<()> {
        let bad = |reason: String| Err(SwitchError::invalid_argument(format!("{}: {reason}", self.name)));
        if self.width == 0 {
            return bad("zero register width".into());
        }
        let mut span = self.width;
        for i in 0..self.dims.count() {
            let Some(d) = self.dims.dim(i) else { break };
            if d.count == 0 {
                return bad(format!("dimension {i} has no entries"));
            }
            if d.stride < span {
                return bad(format!("dimension {i} stride {} overlaps {span} words", d.stride));
            }
            span = match (d.count - 1).checked_mul(d.stride).and_then(|s| s.checked_add(span)) {
                Some(s) => s,
                None => return bad("address range overflows".into()),
            };
        }
        if self.base.checked_add(span).is_none() {
            return bad("address range overflows".into());
        }
        Ok(())
    }

    /// Flat entry number of `idx` (inner index varies fastest)
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the index count is wrong and
    /// `InvalidRegisterSet` if an index is out of range.
    pub fn entry_index(&self, idx: &[u32]) -> Result<usize> {
        self.check_indices(idx)?;
        Ok(match self.dims {
            Dimensions::Scalar => 0,
            Dimensions::OneIndex(_) => idx[0] as usize,
            Dimensions::TwoIndices(inner, _) => {
                idx[1] as usize * inner.count as usize + idx[0] as usize
            }
        })
    }

    /// Word address of `idx`: `base + Σ idx[i] * stride[i]`
    ///
    /// # Errors
    ///
    /// Same as [`entry_index`](Self::entry_index), or `InvalidArgument` if the
    /// address overflows 32 bits (only possible for a descriptor that fails
    /// [`validate`](Self::validate)).
    pub fn address(&self, idx: &[u32]) -> Result<u32> {
        self.check_indices(idx)?;
        self.offset_address(idx).ok_or_else(|| {
            SwitchError::invalid_argument(format!("{}: address of {idx:?} overflows", self.name))
        })
    }

    /// Whether `other` describes the same storage (name aside)
    pub fn same_layout(&self, other: &RegisterSet) -> bool {
        self.base == other.base
            && self.width == other.width
            && self.dims == other.dims
            && self.tracks_validity == other.tracks_validity
    }

    /// Indices of flat entry `n` (inverse of [`entry_index`](Self::entry_index))
    pub fn indices_of(&self, n: usize) -> Vec<u32> {
        #[allow(clippy::cast_possible_truncation)]
        let n = n as u32;
        match self.dims {
            Dimensions::Scalar => vec![],
            Dimensions::OneIndex(_) => vec![n],
            Dimensions::TwoIndices(inner, _) => vec![n % inner.count, n / inner.count],
        }
    }

    /// Word address of every entry, in flat entry order
    ///
    /// Stops at the first entry whose address overflows; a validated
    /// descriptor has none.
    pub fn entry_addresses(&self) -> impl Iterator<Item = u32> + '_ {
        (0..self.entry_count() as usize).map_while(|n| self.offset_address(&self.indices_of(n)))
    }

    /// Every word address covered by the set (register words only, no padding)
    pub fn word_addresses(&self) -> impl Iterator<Item = u32> + '_ {
        self.entry_addresses().flat_map(|a| a..a + self.width)
    }

    fn offset_address(&self, idx: &[u32]) -> Option<u32> {
        (0..self.dims.count()).try_fold(self.base, |addr, i| {
            let d = self.dims.dim(i)?;
            idx.get(i)?.checked_mul(d.stride).and_then(|off| addr.checked_add(off))
        })
    }

    fn check_indices(&self, idx: &[u32]) -> Result<()> {
        let expected = self.dims.count();
        if idx.len() != expected {
            return Err(SwitchError::invalid_argument(format!(
                "{} takes {expected} indices, got {}",
                self.name,
                idx.len()
            )));
        }
        for (i, &v) in idx.iter().enumerate() {
            let Some(d) = self.dims.dim(i) else { continue };
            if v >= d.count {
                return Err(SwitchError::invalid_register_set(
                    self.name,
                    format!("index {i} = {v} out of range 0..{}", d.count),
                ));
            }
        }
        Ok(())
    }
}
