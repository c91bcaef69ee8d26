//! Single-slot, overwrite-on-full frame buffer.
//!
//! The capture unit publishes into the slot at its own cadence; the stream
//! unit takes whatever is newest when it is ready to send. Unread frames
//! are overwritten, never queued, so under load the consumer skips ahead
//! instead of falling behind.
//!
//! Built on `tokio::sync::watch`. Closing the sender marks the end of the
//! stream without discarding the last unread frame.

use tokio::sync::watch;

use crate::pipeline::types::Frame;

/// Create a connected writer/reader pair.
pub fn frame_slot() -> (SlotWriter, SlotReader) {
    let (tx, rx) = watch::channel(None);
    (SlotWriter { tx }, SlotReader { rx })
}

/// Producer half, owned by the capture unit.
#[derive(Debug)]
pub struct SlotWriter {
    tx: watch::Sender<Option<Frame>>,
}

impl SlotWriter {
    /// Store `frame`, replacing any unread predecessor.
    pub fn publish(&self, frame: Frame) {
        self.tx.send_replace(Some(frame));
    }

    /// Close the slot. A frame published but not yet taken stays
    /// readable; after it the reader sees end of stream.
    pub fn finish(self) {
        drop(self.tx);
    }
}

/// Consumer half, owned by the stream unit.
#[derive(Debug)]
pub struct SlotReader {
    rx: watch::Receiver<Option<Frame>>,
}

impl SlotReader {
    /// Wait for a frame this reader has not seen yet and take it.
    ///
    /// Returns `None` at end of stream, either because the writer called
    /// [`SlotWriter::finish`] or because it was dropped.
    pub async fn next_frame(&mut self) -> Option<Frame> {
        match self.rx.changed().await {
            Ok(()) => self.rx.borrow_and_update().clone(),
            Err(_) => None,
        }
    }

    /// Resolves once the writer has closed the slot, whether or not a last
    /// frame is still unread.
    pub async fn closed(&self) {
        let mut rx = self.rx.clone();
        while rx.changed().await.is_ok() {}
    }

    /// Whether a frame is waiting to be taken.
    pub fn has_unread(&self) -> bool {
        self.rx.has_changed().unwrap_or(false)
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::types::PixelFormat;
    use tokio_test::{assert_pending, assert_ready, task};

    fn frame(tag: u8) -> Frame {
        Frame::new(1, 1, PixelFormat::Rgb8, vec![tag, tag, tag]).unwrap()
    }

    #[tokio::test]
    async fn burst_yields_latest() {
        let (writer, mut reader) = frame_slot();
        for tag in 0..10 {
            writer.publish(frame(tag));
        }
        let got = reader.next_frame().await.unwrap();
        assert_eq!(got.pixel(0, 0), &[9, 9, 9]);
        assert!(!reader.has_unread());
    }

    #[test]
    fn each_frame_is_taken_once() {
        let (writer, mut reader) = frame_slot();
        writer.publish(frame(1));

        let mut first = task::spawn(reader.next_frame());
        let got = assert_ready!(first.poll()).unwrap();
        assert_eq!(got.pixel(0, 0)[0], 1);
        drop(first);

        let mut second = task::spawn(reader.next_frame());
        assert_pending!(second.poll());
        writer.publish(frame(2));
        assert!(second.is_woken());
        let got = assert_ready!(second.poll()).unwrap();
        assert_eq!(got.pixel(0, 0)[0], 2);
    }

    #[tokio::test]
    async fn finish_keeps_last_frame() {
        let (writer, mut reader) = frame_slot();
        writer.publish(frame(1));
        writer.publish(frame(2));
        writer.finish();
        assert_eq!(reader.next_frame().await.unwrap().pixel(0, 0)[0], 2);
        assert!(reader.next_frame().await.is_none());
    }

    #[test]
    fn closed_waits_for_the_writer() {
        let (writer, reader) = frame_slot();
        let mut closed = task::spawn(reader.closed());
        assert_pending!(closed.poll());

        writer.publish(frame(1));
        assert_pending!(closed.poll());

        writer.finish();
        assert!(closed.is_woken());
        assert_ready!(closed.poll());
    }

    #[tokio::test]
    async fn dropped_writer_reads_as_end_of_stream() {
        let (writer, mut reader) = frame_slot();
        drop(writer);
        assert!(reader.next_frame().await.is_none());
    }

    #[tokio::test]
    async fn unread_frame_survives_writer_drop() {
        let (writer, mut reader) = frame_slot();
        writer.publish(frame(7));
        drop(writer);
        assert_eq!(reader.next_frame().await.unwrap().pixel(0, 0)[0], 7);
        assert!(reader.next_frame().await.is_none());
    }
}
