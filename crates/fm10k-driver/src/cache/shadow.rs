//! Shadow storage for one register set
//!
//! A flat word array (`width` words per entry, flat entry order) plus two
//! per-entry bitmaps: *valid* (only for sets that track validity) and
//! *dirty* (entries written while hardware writes were deferred).

/// Fixed-size bitmap
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    bits: Vec<u64>,
    len: usize,
}

impl Bitmap {
    /// All-clear bitmap of `len` bits
    pub fn new(len: usize) -> Self {
        Self {
            bits: vec![0; len.div_ceil(64)],
            len,
        }
    }

    /// Bit `i`
    pub fn get(&self, i: usize) -> bool {
        i < self.len && self.bits[i / 64] & (1 << (i % 64)) != 0
    }

    /// Set or clear bit `i`
    pub fn set(&mut self, i: usize, on: bool) {
        if i >= self.len {
            return;
        }
        if on {
            self.bits[i / 64] |= 1 << (i % 64);
        } else {
            self.bits[i / 64] &= !(1 << (i % 64));
        }
    }

    /// Clear every bit
    pub fn clear(&mut self) {
        self.bits.fill(0);
    }

    /// Indices of set bits, ascending
    pub fn ones(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.len).filter(|&i| self.get(i))
    }

    /// Number of set bits
    pub fn count_ones(&self) -> usize {
        self.bits.iter().map(|w| w.count_ones() as usize).sum()
    }
}

/// Host copy of one register set
#[derive(Debug, Clone)]
pub struct Shadow {
    words: Vec<u32>,
    width: usize,
    valid: Option<Bitmap>,
    dirty: Bitmap,
}

impl Shadow {
    /// Zeroed shadow of `entries` entries, `width` words each
    pub fn new(entries: usize, width: usize, tracks_validity: bool) -> Self {
        Self {
            words: vec![0; entries * width],
            width,
            valid: tracks_validity.then(|| Bitmap::new(entries)),
            dirty: Bitmap::new(entries),
        }
    }

    /// Words of entry `n`
    pub fn entry(&self, n: usize) -> &[u32] {
        &self.words[n * self.width..(n + 1) * self.width]
    }

    /// Replace entry `n`
    pub fn store(&mut self, n: usize, words: &[u32]) {
        self.words[n * self.width..(n + 1) * self.width].copy_from_slice(words);
    }

    /// Words of entries `range` concatenated
    pub fn entries(&self, range: std::ops::Range<usize>) -> &[u32] {
        &self.words[range.start * self.width..range.end * self.width]
    }

    /// All words, flat entry order
    pub fn words(&self) -> &[u32] {
        &self.words
    }

    /// Whether entry `n` holds meaningful data (always true without validity tracking)
    pub fn is_valid(&self, n: usize) -> bool {
        self.valid.as_ref().map_or(true, |v| v.get(n))
    }

    /// Mark entry `n` valid or invalid (no-op without validity tracking)
    pub fn set_valid(&mut self, n: usize, on: bool) {
        if let Some(v) = self.valid.as_mut() {
            v.set(n, on);
        }
    }

    /// Whether entry `n` awaits a deferred hardware write
    pub fn is_dirty(&self, n: usize) -> bool {
        self.dirty.get(n)
    }

    /// Mark entry `n` as awaiting (or no longer awaiting) a hardware write
    pub fn set_dirty(&mut self, n: usize, on: bool) {
        self.dirty.set(n, on);
    }

    /// Entries awaiting a hardware write, ascending
    pub fn dirty_entries(&self) -> Vec<usize> {
        self.dirty.ones().collect()
    }

    /// Number of entries awaiting a hardware write
    pub fn dirty_count(&self) -> usize {
        self.dirty.count_ones()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bitmap_spans_word_boundaries() {
        let mut b = Bitmap::new(130);
        b.set(0, true);
        b.set(64, true);
        b.set(129, true);
        b.set(130, true); // out of range, ignored
        assert_eq!(b.ones().collect::<Vec<_>>(), vec![0, 64, 129]);
        assert_eq!(b.count_ones(), 3);
        b.set(64, false);
        assert!(!b.get(64));
        b.clear();
        assert_eq!(b.count_ones(), 0);
    }

    #[test]
    fn entries_are_width_sized_slices() {
        let mut s = Shadow::new(4, 3, false);
        s.store(2, &[1, 2, 3]);
        assert_eq!(s.entry(2), &[1, 2, 3]);
        assert_eq!(s.entries(1..3), &[0, 0, 0, 1, 2, 3]);
    }

    #[test]
    fn validity_defaults_to_valid_without_tracking() {
        let untracked = Shadow::new(2, 1, false);
        assert!(untracked.is_valid(1));

        let mut tracked = Shadow::new(2, 1, true);
        assert!(!tracked.is_valid(1));
        tracked.set_valid(1, true);
        assert!(tracked.is_valid(1));
    }
}
