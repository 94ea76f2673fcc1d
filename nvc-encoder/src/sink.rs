//! Output sinks for completed submissions

use crate::mv::MvRecord;
use crossbeam::channel::{self, Receiver, Sender};
use std::io::{self, Write};

/// Receives encoded access units in submission order
pub trait BitstreamSink {
    fn write_bitstream(&mut self, data: &[u8]) -> io::Result<()>;
}

/// Receives motion vector records for each completed frame pair
pub trait MotionVectorSink {
    fn write_motion_vectors(
        &mut self,
        input_frame: u32,
        reference_frame: u32,
        records: &[MvRecord],
    ) -> io::Result<()>;
}

/// Writes the raw elementary stream to any `Write`
pub struct WriterSink<W: Write> {
    writer: W,
    bytes_written: u64,
    packets: u64,
}

impl<W: Write> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            bytes_written: 0,
            packets: 0,
        }
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn packets(&self) -> u64 {
        self.packets
    }

    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> BitstreamSink for WriterSink<W> {
    fn write_bitstream(&mut self, data: &[u8]) -> io::Result<()> {
        self.writer.write_all(data)?;
        self.bytes_written += data.len() as u64;
        self.packets += 1;
        Ok(())
    }
}

/// Forwards each access unit to a consumer thread
pub struct ChannelSink {
    tx: Sender<Vec<u8>>,
}

impl ChannelSink {
    /// Bounded channel; the pipeline blocks when the consumer falls behind
    pub fn bounded(capacity: usize) -> (Self, Receiver<Vec<u8>>) {
        let (tx, rx) = channel::bounded(capacity);
        (ChannelSink { tx }, rx)
    }

    pub fn unbounded() -> (Self, Receiver<Vec<u8>>) {
        let (tx, rx) = channel::unbounded();
        (ChannelSink { tx }, rx)
    }
}

impl BitstreamSink for ChannelSink {
    fn write_bitstream(&mut self, data: &[u8]) -> io::Result<()> {
        self.tx
            .send(data.to_vec())
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "bitstream receiver dropped"))
    }
}

/// Writes motion vectors as comma-separated text, one block per frame pair
pub struct MvTextWriter<W: Write> {
    writer: W,
}

impl<W: Write> MvTextWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> MotionVectorSink for MvTextWriter<W> {
    fn write_motion_vectors(
        &mut self,
        input_frame: u32,
        reference_frame: u32,
        records: &[MvRecord],
    ) -> io::Result<()> {
        writeln!(
            self.writer,
            "Motion Vectors for input frame = {}, reference frame = {}",
            input_frame, reference_frame
        )?;
        writeln!(
            self.writer,
            "block, mb_type, partitionType, MV[0].x, MV[0].y, MV[1].x, MV[1].y, \
             MV[2].x, MV[2].y, MV[3].x, MV[3].y, cost"
        )?;
        for (block, record) in records.iter().enumerate() {
            let [mv0, mv1, mv2, mv3] = record.mv;
            writeln!(
                self.writer,
                "{}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}",
                block,
                record.mb_type,
                record.partition_type,
                mv0.mvx,
                mv0.mvy,
                mv1.mvx,
                mv1.mvy,
                mv2.mvx,
                mv2.mvy,
                mv3.mvx,
                mv3.mvy,
                record.mb_cost
            )?;
        }
        writeln!(self.writer)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mv::MotionVector;

    #[test]
    fn test_writer_sink_counts() {
        let mut sink = WriterSink::new(Vec::new());
        sink.write_bitstream(&[1, 2, 3]).unwrap();
        sink.write_bitstream(&[4]).unwrap();

        assert_eq!(sink.packets(), 2);
        assert_eq!(sink.bytes_written(), 4);
        assert_eq!(sink.into_inner(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_channel_sink_delivers_and_detects_hangup() {
        let (mut sink, rx) = ChannelSink::unbounded();
        sink.write_bitstream(b"abc").unwrap();
        assert_eq!(rx.recv().unwrap(), b"abc".to_vec());

        drop(rx);
        let err = sink.write_bitstream(b"x").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }

    #[test]
    fn test_mv_text_format() {
        let record = MvRecord {
            mv: [
                MotionVector::new(-4, 8),
                MotionVector::new(0, 0),
                MotionVector::new(1, -1),
                MotionVector::new(2, 2),
            ],
            mb_type: 1,
            partition_type: 3,
            reserved: 0,
            mb_cost: 77,
        };

        let mut writer = MvTextWriter::new(Vec::new());
        writer.write_motion_vectors(5, 4, &[record]).unwrap();
        let text = String::from_utf8(writer.into_inner()).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "Motion Vectors for input frame = 5, reference frame = 4");
        assert!(lines[1].starts_with("block, mb_type, partitionType, MV[0].x"));
        assert!(lines[1].ends_with("MV[3].y, cost"));
        assert_eq!(lines[2], "0, 1, 3, -4, 8, 0, 0, 1, -1, 2, 2, 77");
        assert_eq!(lines[3], "");
    }
}
