//! Lock-free live display buffer
//!
//! The capture worker pushes every time-stamped sample it logs into a
//! single-producer, single-consumer ring from `ringbuf`. The display side
//! drains the ring into a fixed-size snapshot window whenever it repaints.
//!
//! The producer never waits. When the display falls behind and the ring is
//! full, new samples are dropped; the log on disk is unaffected.

use ringbuf::{
    traits::{Consumer, Producer, Split},
    HeapRb,
};
use std::collections::VecDeque;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex,
};

use crate::samples::SampleRecord;

/// Producer half (owned by the capture worker)
pub struct LevelProducer {
    producer: ringbuf::HeapProd<SampleRecord>,
    pushed: Arc<AtomicU64>,
    dropped: Arc<AtomicU64>,
}

impl LevelProducer {
    /// Push one sample, dropping it if the ring is full.
    #[inline]
    pub fn push(&mut self, record: SampleRecord) {
        if self.producer.try_push(record).is_err() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
        self.pushed.fetch_add(1, Ordering::Relaxed);
    }
}

/// Consumer half (owned by the display)
pub struct LevelMonitor {
    consumer: ringbuf::HeapCons<SampleRecord>,
    pushed: Arc<AtomicU64>,
    dropped: Arc<AtomicU64>,
    /// Most recent samples, oldest first
    window: VecDeque<SampleRecord>,
    capacity: usize,
}

impl LevelMonitor {
    /// Drain everything the producer has pushed into the snapshot window.
    ///
    /// Call this once per repaint before reading samples.
    pub fn update(&mut self) {
        while let Some(record) = self.consumer.try_pop() {
            if self.window.len() == self.capacity {
                self.window.pop_front();
            }
            self.window.push_back(record);
        }
    }

    /// Samples currently in the window in chronological order.
    pub fn samples(&self) -> Vec<SampleRecord> {
        self.window.iter().copied().collect()
    }

    /// Timestamp of the newest sample seen, if any.
    pub fn latest_timestamp(&self) -> Option<u64> {
        self.window.back().map(|r| r.timestamp)
    }

    /// Forget the window, e.g. when a new recording starts.
    pub fn clear(&mut self) {
        while self.consumer.try_pop().is_some() {}
        self.window.clear();
    }

    /// Total samples offered by the producer (statistics).
    pub fn samples_pushed(&self) -> u64 {
        self.pushed.load(Ordering::Relaxed)
    }

    /// Samples the producer had to drop because the ring was full.
    pub fn samples_dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Shared handle to a live display ring
///
/// Each half can be taken exactly once; the capture engine takes the
/// producer for each recording and hands it back when the recording ends.
#[derive(Clone)]
pub struct LevelBuffer {
    producer: Arc<Mutex<Option<LevelProducer>>>,
    consumer: Arc<Mutex<Option<LevelMonitor>>>,
}

impl LevelBuffer {
    /// Create a ring able to hold `capacity` samples between two repaints.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let rb = HeapRb::<SampleRecord>::new(capacity);
        let (prod, cons) = rb.split();

        let pushed = Arc::new(AtomicU64::new(0));
        let dropped = Arc::new(AtomicU64::new(0));

        let producer = LevelProducer {
            producer: prod,
            pushed: Arc::clone(&pushed),
            dropped: Arc::clone(&dropped),
        };

        let consumer = LevelMonitor {
            consumer: cons,
            pushed,
            dropped,
            window: VecDeque::with_capacity(capacity),
            capacity,
        };

        Self {
            producer: Arc::new(Mutex::new(Some(producer))),
            consumer: Arc::new(Mutex::new(Some(consumer))),
        }
    }

    /// Take the producer handle. Returns `None` while another session holds it.
    pub fn take_producer(&self) -> Option<LevelProducer> {
        self.producer.lock().ok()?.take()
    }

    /// Return the producer handle after a session ends.
    pub fn return_producer(&self, producer: LevelProducer) {
        if let Ok(mut guard) = self.producer.lock() {
            *guard = Some(producer);
        }
    }

    /// Take the consumer handle (the display should call this once).
    pub fn take_monitor(&self) -> Option<LevelMonitor> {
        self.consumer.lock().ok()?.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn producer_consumer() {
        let buffer = LevelBuffer::new(4);

        let mut producer = buffer.take_producer().unwrap();
        let mut monitor = buffer.take_monitor().unwrap();

        producer.push(SampleRecord::new(625, 1));
        producer.push(SampleRecord::new(1250, 2));
        producer.push(SampleRecord::new(1875, 3));

        monitor.update();
        let samples = monitor.samples();
        assert_eq!(samples.len(), 3);
        assert_eq!(samples[0], SampleRecord::new(625, 1));
        assert_eq!(monitor.latest_timestamp(), Some(1875));
    }

    #[test]
    fn full_ring_drops_newest() {
        let buffer = LevelBuffer::new(2);

        let mut producer = buffer.take_producer().unwrap();
        let mut monitor = buffer.take_monitor().unwrap();

        for i in 0..5 {
            producer.push(SampleRecord::new(i, i as i16));
        }

        monitor.update();
        let amplitudes: Vec<i16> = monitor.samples().iter().map(|r| r.amplitude).collect();
        assert_eq!(amplitudes, vec![0, 1]);
        assert_eq!(monitor.samples_pushed(), 5);
        assert_eq!(monitor.samples_dropped(), 3);
    }

    #[test]
    fn window_keeps_most_recent() {
        let buffer = LevelBuffer::new(3);

        let mut producer = buffer.take_producer().unwrap();
        let mut monitor = buffer.take_monitor().unwrap();

        for i in 0..3 {
            producer.push(SampleRecord::new(i, 0));
        }
        monitor.update();
        for i in 3..5 {
            producer.push(SampleRecord::new(i, 0));
        }
        monitor.update();

        let timestamps: Vec<u64> = monitor.samples().iter().map(|r| r.timestamp).collect();
        assert_eq!(timestamps, vec![2, 3, 4]);
    }

    #[test]
    fn producer_can_be_returned() {
        let buffer = LevelBuffer::new(2);
        let producer = buffer.take_producer().unwrap();
        assert!(buffer.take_producer().is_none());
        buffer.return_producer(producer);
        assert!(buffer.take_producer().is_some());
    }
}
