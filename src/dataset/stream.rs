//! Restartable per-epoch batch streams with background prefetch.
//!
//! A stream owns a lazy dataset and hands out one full pass per `epoch`
//! call. Decoding runs on a worker thread feeding a bounded channel, so the
//! next batch is being prepared while the current one trains. A decode or
//! read error is delivered in-band and ends the pass.

use std::sync::mpsc;
use std::sync::Arc;
use std::thread;

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use super::{LeafImageDataset, LeafImageItem};
use crate::error::Result;

/// Number of decoded batches the worker may run ahead of the consumer.
const PREFETCH_DEPTH: usize = 2;

/// How a stream orders samples each epoch.
#[derive(Debug, Clone, Copy)]
enum SampleOrder {
    /// List order; used for validation.
    Sequential,
    /// Full seeded reshuffle each epoch.
    Shuffled { seed: u64 },
    /// Fixed-capacity shuffle buffer: decorrelates batches from list order
    /// without materializing a full permutation up front.
    Buffered { capacity: usize, seed: u64 },
}

/// A restartable source of labeled image batches.
pub struct LabeledImageStream {
    dataset: Arc<LeafImageDataset>,
    batch_size: usize,
    order: SampleOrder,
}

impl LabeledImageStream {
    /// Stream that keeps list order (validation).
    pub fn sequential(dataset: LeafImageDataset, batch_size: usize) -> Self {
        Self {
            dataset: Arc::new(dataset),
            batch_size,
            order: SampleOrder::Sequential,
        }
    }

    /// Stream with a full per-epoch reshuffle (directory training data).
    pub fn shuffled(dataset: LeafImageDataset, batch_size: usize, seed: u64) -> Self {
        Self {
            dataset: Arc::new(dataset),
            batch_size,
            order: SampleOrder::Shuffled { seed },
        }
    }

    /// Stream with a bounded shuffle buffer (catalog training data).
    pub fn with_shuffle_buffer(
        dataset: LeafImageDataset,
        batch_size: usize,
        capacity: usize,
        seed: u64,
    ) -> Self {
        Self {
            dataset: Arc::new(dataset),
            batch_size,
            order: SampleOrder::Buffered { capacity, seed },
        }
    }

    pub fn num_samples(&self) -> usize {
        self.dataset.len()
    }

    pub fn num_batches(&self) -> usize {
        self.dataset.len().div_ceil(self.batch_size)
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn image_size(&self) -> usize {
        self.dataset.image_size()
    }

    /// Start one pass over the data. Each call reorders (when configured)
    /// and spawns a fresh prefetch worker; epochs are independent.
    pub fn epoch(&self, epoch: usize) -> BatchIter {
        let order = self.epoch_order(epoch);
        let (tx, rx) = mpsc::sync_channel(PREFETCH_DEPTH);
        let dataset = Arc::clone(&self.dataset);
        let batch_size = self.batch_size;

        thread::spawn(move || {
            for chunk in order.chunks(batch_size) {
                let mut items = Vec::with_capacity(chunk.len());
                for &index in chunk {
                    match dataset.load(index) {
                        Ok(item) => items.push(item),
                        Err(err) => {
                            let _ = tx.send(Err(err));
                            return;
                        }
                    }
                }
                if tx.send(Ok(items)).is_err() {
                    // Consumer dropped the iterator; stop decoding.
                    return;
                }
            }
        });

        BatchIter { rx }
    }

    fn epoch_order(&self, epoch: usize) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.dataset.len()).collect();
        match self.order {
            SampleOrder::Sequential => order,
            SampleOrder::Shuffled { seed } => {
                let mut rng = ChaCha8Rng::seed_from_u64(seed.wrapping_add(epoch as u64));
                order.shuffle(&mut rng);
                order
            }
            SampleOrder::Buffered { capacity, seed } => {
                let mut rng = ChaCha8Rng::seed_from_u64(seed.wrapping_add(epoch as u64));
                shuffle_buffer(&order, capacity, &mut rng)
            }
        }
    }
}

/// Streaming shuffle with a bounded buffer: fill the buffer, then repeatedly
/// swap a random slot for the next incoming index; drain randomly at the end.
fn shuffle_buffer(order: &[usize], capacity: usize, rng: &mut ChaCha8Rng) -> Vec<usize> {
    let capacity = capacity.max(1);
    let mut buffer: Vec<usize> = Vec::with_capacity(capacity.min(order.len()));
    let mut out = Vec::with_capacity(order.len());
    for &index in order {
        if buffer.len() < capacity {
            buffer.push(index);
            continue;
        }
        let slot = rng.gen_range(0..buffer.len());
        out.push(std::mem::replace(&mut buffer[slot], index));
    }
    while !buffer.is_empty() {
        let slot = rng.gen_range(0..buffer.len());
        out.push(buffer.swap_remove(slot));
    }
    out
}

/// One epoch's worth of decoded batches.
pub struct BatchIter {
    rx: mpsc::Receiver<Result<Vec<LeafImageItem>>>,
}

impl Iterator for BatchIter {
    type Item = Result<Vec<LeafImageItem>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.rx.recv().ok()
    }
}
