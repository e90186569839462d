/// Default flush threshold for valid records.
pub const RECORD_BATCH_SIZE: usize = 100;
/// Default flush threshold for rejected rows. Smaller so errors surface sooner.
pub const ERROR_BATCH_SIZE: usize = 10;
/// Largest record threshold whose bulk insert stays within the bind
/// parameter limits of the supported backends (8 parameters per row).
pub const MAX_RECORD_BATCH_SIZE: usize = 4000;

/// FIFO buffer that reports when it holds `threshold` items.
///
/// Single writer, single drainer. Items come out of [`drain`](Self::drain) in
/// the order they were added.
#[derive(Debug)]
pub struct Accumulator<T> {
    items: Vec<T>,
    threshold: usize,
}

impl<T> Accumulator<T> {
    pub fn with_threshold(threshold: usize) -> Self {
        let threshold = threshold.max(1);
        Self {
            items: Vec::with_capacity(threshold),
            threshold,
        }
    }

    /// Appends `item`; returns true once the buffer is at or over threshold.
    pub fn add(&mut self, item: T) -> bool {
        self.items.push(item);
        self.items.len() >= self.threshold
    }

    /// Takes everything buffered so far and leaves the buffer empty.
    pub fn drain(&mut self) -> Vec<T> {
        std::mem::replace(&mut self.items, Vec::with_capacity(self.threshold))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }
}
