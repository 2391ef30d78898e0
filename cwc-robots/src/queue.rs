//! Outbound frame queue of one session
//!
//! Every frame is stamped with the queue generation current at send time.
//! [`FrameSink::invalidate`] bumps the generation, which turns everything
//! still queued stale; the consumer skips stale frames. Frames sent after
//! the bump are never affected, however the writer's timing falls.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::trace;

use crate::buffer::Frame;

/// Producer side, shared by the connection and the polling tasks
#[derive(Debug, Clone)]
pub struct FrameSink {
    tx: mpsc::UnboundedSender<(u64, Frame)>,
    generation: Arc<AtomicU64>,
}

/// Consumer side, owned by the writer task
#[derive(Debug)]
pub struct FrameQueue {
    rx: mpsc::UnboundedReceiver<(u64, Frame)>,
    generation: Arc<AtomicU64>,
}

pub fn frame_queue() -> (FrameSink, FrameQueue) {
    let (tx, rx) = mpsc::unbounded_channel();
    let generation = Arc::new(AtomicU64::new(0));
    (
        FrameSink {
            tx,
            generation: generation.clone(),
        },
        FrameQueue { rx, generation },
    )
}

impl FrameSink {
    /// Queue a frame; gives it back when the consumer is gone
    pub fn send(&self, frame: Frame) -> Result<(), Frame> {
        let stamp = self.generation.load(Ordering::SeqCst);
        self.tx.send((stamp, frame)).map_err(|e| e.0 .1)
    }

    /// Mark everything queued so far as stale, returns the new generation
    pub fn invalidate(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl FrameQueue {
    /// Next current frame with its stamp, `None` once every sink is dropped
    pub async fn recv(&mut self) -> Option<(u64, Frame)> {
        loop {
            let (stamp, frame) = self.rx.recv().await?;
            if !self.is_stale(stamp) {
                return Some((stamp, frame));
            }
            trace!("Skipping stale {}", frame.to_hex());
        }
    }

    /// Next current frame without waiting
    pub fn try_recv(&mut self) -> Option<Frame> {
        loop {
            let (stamp, frame) = self.rx.try_recv().ok()?;
            if !self.is_stale(stamp) {
                return Some(frame);
            }
        }
    }

    pub fn is_stale(&self, stamp: u64) -> bool {
        stamp != self.generation.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalidate_skips_only_earlier_frames() {
        let (sink, mut queue) = frame_queue();
        sink.send(Frame::new(vec![1])).unwrap();
        sink.send(Frame::new(vec![2])).unwrap();
        assert_eq!(sink.invalidate(), 1);
        sink.send(Frame::new(vec![3])).unwrap();

        assert_eq!(queue.try_recv(), Some(Frame::new(vec![3])));
        assert_eq!(queue.try_recv(), None);
    }

    #[tokio::test]
    async fn test_recv_ends_when_sinks_drop() {
        let (sink, mut queue) = frame_queue();
        sink.send(Frame::new(vec![7])).unwrap();
        drop(sink);
        assert_eq!(queue.recv().await.map(|(_, f)| f), Some(Frame::new(vec![7])));
        assert_eq!(queue.recv().await, None);
    }

    #[test]
    fn test_send_after_consumer_dropped() {
        let (sink, queue) = frame_queue();
        drop(queue);
        assert!(sink.is_closed());
        assert_eq!(sink.send(Frame::new(vec![9])), Err(Frame::new(vec![9])));
    }
}
