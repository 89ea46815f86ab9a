// Sample ring between a blocking producer and the device callback

use parking_lot::{Condvar, Mutex};
use std::time::Duration;

/// Upper bound on a single wait so a missed wakeup cannot stall a writer.
const WRITE_WAIT: Duration = Duration::from_millis(50);

struct RingState {
    samples: Vec<f32>,
    head: usize,
    len: usize,
    /// Bumped by every flush; writers started under an older value stop early.
    generation: u64,
    closed: bool,
}

impl RingState {
    fn capacity(&self) -> usize {
        self.samples.len()
    }

    fn push(&mut self, data: &[f32]) -> usize {
        let n = data.len().min(self.capacity() - self.len);
        if n == 0 {
            return 0;
        }
        let tail = (self.head + self.len) % self.capacity();
        let first = n.min(self.capacity() - tail);
        self.samples[tail..tail + first].copy_from_slice(&data[..first]);
        self.samples[..n - first].copy_from_slice(&data[first..n]);
        self.len += n;
        n
    }

    fn pop(&mut self, out: &mut [f32]) -> usize {
        let n = out.len().min(self.len);
        if n == 0 {
            return 0;
        }
        let first = n.min(self.capacity() - self.head);
        out[..first].copy_from_slice(&self.samples[self.head..self.head + first]);
        out[first..n].copy_from_slice(&self.samples[..n - first]);
        self.head = (self.head + n) % self.capacity();
        self.len -= n;
        n
    }
}

/// Bounded f32 ring whose writes block until space frees up.
pub struct PcmRing {
    state: Mutex<RingState>,
    space: Condvar,
}

impl PcmRing {
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(RingState {
                samples: vec![0.0; capacity.max(1)],
                head: 0,
                len: 0,
                generation: 0,
                closed: false,
            }),
            space: Condvar::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.state.lock().capacity()
    }

    pub fn len(&self) -> usize {
        self.state.lock().len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write all of `data`, waiting for the reader as needed.
    ///
    /// Returns early with a short count if the ring is flushed or closed meanwhile.
    pub fn write_blocking(&self, data: &[f32]) -> usize {
        let mut state = self.state.lock();
        let generation = state.generation;
        let mut written = 0;
        while written < data.len() {
            if state.closed || state.generation != generation {
                break;
            }
            written += state.push(&data[written..]);
            if written < data.len() {
                self.space.wait_for(&mut state, WRITE_WAIT);
            }
        }
        written
    }

    /// Non-blocking read for the device callback.
    pub fn read(&self, out: &mut [f32]) -> usize {
        let n = self.state.lock().pop(out);
        if n > 0 {
            self.space.notify_all();
        }
        n
    }

    /// Drop queued samples and release blocked writers.
    pub fn flush(&self) {
        let mut state = self.state.lock();
        state.head = 0;
        state.len = 0;
        state.generation = state.generation.wrapping_add(1);
        drop(state);
        self.space.notify_all();
    }

    /// Refuse writes until reopened.
    pub fn close(&self) {
        self.state.lock().closed = true;
        self.space.notify_all();
    }

    pub fn reopen(&self) {
        self.state.lock().closed = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_wraps_around() {
        let ring = PcmRing::new(4);
        assert_eq!(ring.write_blocking(&[1.0, 2.0, 3.0]), 3);
        let mut out = [0.0; 2];
        assert_eq!(ring.read(&mut out), 2);
        assert_eq!(out, [1.0, 2.0]);
        assert_eq!(ring.write_blocking(&[4.0, 5.0, 6.0]), 3);
        let mut out = [0.0; 8];
        assert_eq!(ring.read(&mut out), 4);
        assert_eq!(&out[..4], &[3.0, 4.0, 5.0, 6.0]);
        assert!(ring.is_empty());
    }

    #[test]
    fn test_blocked_writer_resumes_when_reader_drains() {
        let ring = Arc::new(PcmRing::new(8));
        let writer = {
            let ring = ring.clone();
            thread::spawn(move || ring.write_blocking(&[0.5; 32]))
        };

        let mut received = 0;
        let mut out = [0.0; 4];
        while received < 32 {
            received += ring.read(&mut out);
            thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(writer.join().unwrap(), 32);
    }

    #[test]
    fn test_flush_releases_blocked_writer() {
        let ring = Arc::new(PcmRing::new(4));
        let writer = {
            let ring = ring.clone();
            thread::spawn(move || ring.write_blocking(&[1.0; 16]))
        };
        while ring.len() < 4 {
            thread::sleep(Duration::from_millis(1));
        }
        ring.flush();
        let written = writer.join().unwrap();
        assert!(written < 16);
        assert!(ring.is_empty());
        // New writes after the flush proceed normally
        assert_eq!(ring.write_blocking(&[1.0, 1.0]), 2);
    }

    #[test]
    fn test_close_refuses_writes_until_reopened() {
        let ring = PcmRing::new(4);
        ring.close();
        assert_eq!(ring.write_blocking(&[1.0]), 0);
        ring.reopen();
        assert_eq!(ring.write_blocking(&[1.0]), 1);
    }
}
