//! Progress reporting for multi-file operations
//!
//! The per-file loop owns `[0, 90]`; the remainder covers writing the package
//! and the final call is always 100.

/// Receives a completion percentage in `0..=100`
pub type ProgressFn = Box<dyn Fn(u8) + Send + Sync>;

const LOOP_SHARE: u64 = 90;

/// Forwards percentages to an optional sink, never going backwards.
pub struct ProgressReporter<'a> {
    sink: Option<&'a ProgressFn>,
    last: Option<u8>,
}

impl<'a> ProgressReporter<'a> {
    pub fn new(sink: Option<&'a ProgressFn>) -> Self {
        Self { sink, last: None }
    }

    pub fn report(&mut self, percent: u8) {
        let percent = percent.min(100);
        if self.last.is_some_and(|last| percent <= last) {
            return;
        }
        self.last = Some(percent);
        if let Some(sink) = self.sink {
            sink(percent);
        }
    }

    /// `processed` of `total` files done
    pub fn file_done(&mut self, processed: usize, total: usize) {
        if total == 0 {
            return;
        }
        let scaled = (processed.min(total) as u64 * LOOP_SHARE) / total as u64;
        self.report(scaled as u8);
    }

    pub fn finish(&mut self) {
        self.report(100);
    }

    pub fn last(&self) -> Option<u8> {
        self.last
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn recording() -> (ProgressFn, Arc<Mutex<Vec<u8>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        (Box::new(move |p| sink.lock().unwrap().push(p)), seen)
    }

    #[test]
    fn test_scaled_to_ninety() {
        let (sink, seen) = recording();
        let mut r = ProgressReporter::new(Some(&sink));
        for i in 1..=3 {
            r.file_done(i, 3);
        }
        r.finish();
        assert_eq!(*seen.lock().unwrap(), vec![30, 60, 90, 100]);
    }

    #[test]
    fn test_never_decreases() {
        let (sink, seen) = recording();
        let mut r = ProgressReporter::new(Some(&sink));
        r.report(50);
        r.report(20);
        r.report(50);
        r.report(200);
        assert_eq!(*seen.lock().unwrap(), vec![50, 100]);
        assert_eq!(r.last(), Some(100));
    }

    #[test]
    fn test_no_sink() {
        let mut r = ProgressReporter::new(None);
        r.file_done(1, 2);
        r.finish();
        assert_eq!(r.last(), Some(100));
    }
}
