//! Per-macroblock motion vector records

use bytemuck::{Pod, Zeroable};

/// Quarter-pel motion vector
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct MotionVector {
    pub mvx: i16,
    pub mvy: i16,
}

impl MotionVector {
    pub fn new(mvx: i16, mvy: i16) -> Self {
        Self { mvx, mvy }
    }
}

/// Macroblock partition layout reported by the hardware
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionType {
    P16x16 = 0,
    P8x8 = 1,
    P16x8 = 2,
    P8x16 = 3,
}

/// H.264 motion estimation output for one macroblock
///
/// Layout matches the hardware record: one vector per 8x8 block, then the
/// macroblock type, partition type and cost.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct MvRecord {
    pub mv: [MotionVector; 4],
    pub mb_type: u8,
    pub partition_type: u8,
    pub reserved: u16,
    pub mb_cost: u32,
}

pub const MV_RECORD_SIZE: usize = std::mem::size_of::<MvRecord>();

impl MvRecord {
    pub fn is_partition(&self, partition: PartitionType) -> bool {
        self.partition_type == partition as u8
    }
}

/// Read up to `count` records from a locked motion vector buffer
///
/// The buffer has no alignment guarantee, so records are copied out.
pub fn parse_mv_records(data: &[u8], count: usize) -> Vec<MvRecord> {
    data.chunks_exact(MV_RECORD_SIZE)
        .take(count)
        .map(bytemuck::pod_read_unaligned)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_layout() {
        assert_eq!(MV_RECORD_SIZE, 24);
        assert_eq!(std::mem::align_of::<MvRecord>(), 4);
    }

    #[test]
    fn test_parse_unaligned() {
        let record = MvRecord {
            mv: [
                MotionVector::new(-4, 8),
                MotionVector::new(1, 2),
                MotionVector::new(3, 4),
                MotionVector::new(5, 6),
            ],
            mb_type: 1,
            partition_type: PartitionType::P16x8 as u8,
            reserved: 0,
            mb_cost: 1234,
        };

        // Offset by one byte so the records are misaligned
        let mut data = vec![0u8];
        data.extend_from_slice(bytemuck::bytes_of(&record));
        data.extend_from_slice(bytemuck::bytes_of(&MvRecord::default()));
        data.extend_from_slice(&[0xFF; 7]); // trailing partial record

        let records = parse_mv_records(&data[1..], 8);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0], record);
        assert!(records[0].is_partition(PartitionType::P16x8));
        assert_eq!(records[1], MvRecord::default());
    }
}
