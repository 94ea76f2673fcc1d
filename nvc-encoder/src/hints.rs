//! External motion estimation hints
//!
//! Converts per-macroblock motion vector records into the 32-bit hint words
//! the encoder accepts as external ME candidates. Each word holds:
//! - bits 0..12: x component in full pels
//! - bits 12..22: y component in full pels
//! - bits 28..32: partition step and last-candidate flags

use crate::mv::{MvRecord, PartitionType};

const LAST_OF_MB_MASK: u32 = 0x4000_0000;
const LAST_OF_PARTITION_MASK: u32 = 0xC000_0000;
const PARTITION_STEP: u32 = 0x1000_0000;

/// Candidate order within one macroblock
const PARTITION_ORDER: [PartitionType; 4] = [
    PartitionType::P16x16,
    PartitionType::P16x8,
    PartitionType::P8x16,
    PartitionType::P8x8,
];

/// Hint words per candidate of each partition in [`PARTITION_ORDER`]
const HINTS_PER_CANDIDATE: [usize; 4] = [1, 2, 2, 4];

/// Candidates per block type supplied for every macroblock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeHintCounts {
    pub candidates_16x16: u32,
    pub candidates_16x8: u32,
    pub candidates_8x16: u32,
    pub candidates_8x8: u32,
}

impl Default for MeHintCounts {
    fn default() -> Self {
        Self {
            candidates_16x16: 1,
            candidates_16x8: 1,
            candidates_8x16: 1,
            candidates_8x8: 1,
        }
    }
}

impl MeHintCounts {
    fn in_partition_order(&self) -> [usize; 4] {
        [
            self.candidates_16x16 as usize,
            self.candidates_16x8 as usize,
            self.candidates_8x16 as usize,
            self.candidates_8x8 as usize,
        ]
    }

    /// Hint words emitted per macroblock
    pub fn hints_per_macroblock(&self) -> usize {
        self.in_partition_order()
            .iter()
            .zip(HINTS_PER_CANDIDATE)
            .map(|(count, hints)| count * hints)
            .sum()
    }
}

/// Packed hint words for one picture, `counts.hints_per_macroblock()` per MB
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExternalMeHints {
    pub counts: MeHintCounts,
    pub words: Vec<u32>,
}

impl ExternalMeHints {
    pub fn macroblock_count(&self) -> usize {
        match self.counts.hints_per_macroblock() {
            0 => 0,
            per_mb => self.words.len() / per_mb,
        }
    }
}

fn hint_word(mask: u32, mv_x: i16, mv_y: i16) -> u32 {
    mask | (((mv_y as u32) & 0x3ff) << 12) | ((mv_x as u32) & 0xfff)
}

/// Pack motion vector records into external hint words
///
/// Candidates matching the record's partition carry its vectors, scaled from
/// quarter to full pels. All other candidates carry flags only.
pub fn pack_external_hints(records: &[MvRecord], counts: MeHintCounts) -> ExternalMeHints {
    let per_mb = counts.hints_per_macroblock();
    let per_partition: Vec<usize> = counts
        .in_partition_order()
        .iter()
        .zip(HINTS_PER_CANDIDATE)
        .map(|(count, hints)| count * hints)
        .collect();

    let mut words = Vec::with_capacity(records.len() * per_mb);

    for record in records {
        let mv = record.mv.map(|v| (v.mvx / 4, v.mvy / 4));

        let mut last_of_mb = LAST_OF_MB_MASK;
        let mut last_of_partition = LAST_OF_PARTITION_MASK;
        let mut partition = 0;
        let mut partition_end = per_partition[0];
        let mut mv_idx = 0;

        let mask_for = |k: usize, last_of_mb: u32, last_of_partition: u32| {
            if k + 1 == per_mb {
                last_of_partition
            } else {
                last_of_mb
            }
        };

        let mut k = 0;
        while k < per_mb {
            while k == partition_end && partition + 1 < PARTITION_ORDER.len() {
                last_of_mb += PARTITION_STEP;
                last_of_partition += PARTITION_STEP;
                partition += 1;
                partition_end += per_partition[partition];
            }

            let mask = mask_for(k, last_of_mb, last_of_partition);
            let current = PARTITION_ORDER[partition];

            if record.is_partition(current) {
                if current == PartitionType::P16x8 {
                    // Top and bottom halves carry vectors 0 and 2
                    words.push(hint_word(mask, mv[0].0, mv[0].1));
                    k += 1;
                    let mask = mask_for(k, last_of_mb, last_of_partition);
                    words.push(hint_word(mask, mv[2].0, mv[2].1));
                } else {
                    let (x, y) = mv[mv_idx.min(3)];
                    words.push(hint_word(mask, x, y));
                    mv_idx += 1;
                }
            } else {
                words.push(mask);
            }
            k += 1;
        }
    }

    ExternalMeHints { counts, words }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mv::MotionVector;

    fn record(partition: PartitionType, mv: [(i16, i16); 4]) -> MvRecord {
        MvRecord {
            mv: mv.map(|(x, y)| MotionVector::new(x, y)),
            partition_type: partition as u8,
            ..Default::default()
        }
    }

    #[test]
    fn test_hints_per_macroblock() {
        assert_eq!(MeHintCounts::default().hints_per_macroblock(), 9);
        let only_16x16 = MeHintCounts {
            candidates_16x16: 2,
            candidates_16x8: 0,
            candidates_8x16: 0,
            candidates_8x8: 0,
        };
        assert_eq!(only_16x16.hints_per_macroblock(), 2);
    }

    #[test]
    fn test_pack_16x16_record() {
        let hints = pack_external_hints(
            &[record(PartitionType::P16x16, [(8, -4), (0, 0), (0, 0), (0, 0)])],
            MeHintCounts::default(),
        );

        assert_eq!(hints.words.len(), 9);
        assert_eq!(hints.macroblock_count(), 1);
        // 16x16 candidate carries the vector in full pels
        assert_eq!(hints.words[0], 0x4000_0000 | (0x3ff << 12) | 2);
        // Remaining partitions are flags only, one step per partition
        assert_eq!(hints.words[1], 0x5000_0000);
        assert_eq!(hints.words[2], 0x5000_0000);
        assert_eq!(hints.words[3], 0x6000_0000);
        assert_eq!(hints.words[5], 0x7000_0000);
        // Last word of the macroblock
        assert_eq!(hints.words[8], 0xF000_0000);
    }

    #[test]
    fn test_pack_16x8_uses_top_and_bottom_vectors() {
        let hints = pack_external_hints(
            &[record(PartitionType::P16x8, [(4, 4), (40, 40), (-8, 12), (40, 40)])],
            MeHintCounts::default(),
        );

        assert_eq!(hints.words[0], 0x4000_0000);
        assert_eq!(hints.words[1], 0x5000_0000 | (1 << 12) | 1);
        assert_eq!(hints.words[2], 0x5000_0000 | (3 << 12) | 0xffe);
        assert_eq!(hints.words[3], 0x6000_0000);
    }

    #[test]
    fn test_pack_8x8_consumes_vectors_in_order() {
        let hints = pack_external_hints(
            &[record(PartitionType::P8x8, [(4, 0), (8, 0), (12, 0), (16, 0)])],
            MeHintCounts::default(),
        );

        let xs: Vec<u32> = hints.words[5..9].iter().map(|w| w & 0xfff).collect();
        assert_eq!(xs, vec![1, 2, 3, 4]);
        assert_eq!(hints.words[8] & 0xF000_0000, 0xF000_0000);
    }

    #[test]
    fn test_pack_multiple_macroblocks() {
        let records = vec![record(PartitionType::P8x16, [(0, 0); 4]); 5];
        let hints = pack_external_hints(&records, MeHintCounts::default());
        assert_eq!(hints.words.len(), 45);
        assert_eq!(hints.macroblock_count(), 5);
    }
}
