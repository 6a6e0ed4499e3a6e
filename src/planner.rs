//! Range planning for multipart transfers.
//!
//! A large file is split into `n = clamp(total / min_part_size, 1, max_parts)`
//! contiguous parts of `total / n` bytes each; the last part absorbs the
//! integer-division remainder. The result always partitions `[0, total)`
//! exactly, whatever the rounding.

/// Smallest part the storage service accepts (except for the last part).
pub const MINIMUM_PART_SIZE_BYTES: u64 = 100_000_000;

/// Largest number of parts a single large file may have.
pub const MAX_FILE_PARTS: u64 = 10_000;

/// Inclusive byte range `[start, end]` within a file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ByteRange {
    /// First byte offset
    pub start: u64,
    /// Last byte offset (inclusive)
    pub end: u64,
}

impl ByteRange {
    /// Create a range; `None` if `start > end`
    pub fn new(start: u64, end: u64) -> Option<Self> {
        (start <= end).then_some(Self { start, end })
    }

    /// Range over a whole object of `size` bytes; `None` for an empty object
    pub fn covering(size: u64) -> Option<Self> {
        size.checked_sub(1).map(|end| Self { start: 0, end })
    }

    /// Number of bytes in the range
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Value for an HTTP `Range` request header
    pub fn header_value(&self) -> String {
        format!("bytes={}-{}", self.start, self.end)
    }
}

impl std::fmt::Display for ByteRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end)
    }
}

/// Ordered, contiguous ranges partitioning a file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransferPlan {
    total_bytes: u64,
    ranges: Vec<ByteRange>,
}

impl TransferPlan {
    /// Size of the file being planned
    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    /// Ranges in part-index order
    pub fn ranges(&self) -> &[ByteRange] {
        &self.ranges
    }

    /// Number of parts
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    /// True only for a zero-byte file
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// `(index, range)` pairs in part-index order
    pub fn iter(&self) -> impl Iterator<Item = (usize, ByteRange)> + '_ {
        self.ranges.iter().copied().enumerate()
    }
}

/// Split `total_bytes` into at most `max_parts` contiguous ranges of at least
/// `min_part_size` bytes each (the last range may be larger).
///
/// Files under `2 * min_part_size` yield a single range; callers route those
/// through the unsplit transfer path instead. A zero-byte file yields an empty
/// plan.
pub fn choose_part_ranges(total_bytes: u64, min_part_size: u64, max_parts: u64) -> TransferPlan {
    let Some(last_byte) = total_bytes.checked_sub(1) else {
        return TransferPlan {
            total_bytes,
            ranges: Vec::new(),
        };
    };

    let n = (total_bytes / min_part_size.max(1)).clamp(1, max_parts.max(1));
    let part_bytes = total_bytes / n;

    let ranges = (0..n)
        .map(|i| {
            let start = i * part_bytes;
            let end = if i == n - 1 {
                last_byte
            } else {
                (i + 1) * part_bytes - 1
            };
            ByteRange { start, end }
        })
        .collect();

    TransferPlan {
        total_bytes,
        ranges,
    }
}
