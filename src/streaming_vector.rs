use std::sync::Mutex;

use rayon::prelude::*;

/// Vector that allows to insert values concurrently.
///
/// Internally one buffer is kept per worker thread; `stream` appends to the
/// buffer of the calling rayon worker (threads outside the pool share one
/// spare buffer). `copy_*` concatenates the buffers into a single contiguous
/// vector using a prefix sum over the buffer sizes; the parallel variant
/// copies the buffer segments concurrently. Order is preserved within each
/// buffer but not across buffers.
pub struct StreamingVector<T> {
    buffers: Vec<Mutex<Vec<T>>>,
}

impl<T: Copy + Default + Send + Sync> StreamingVector<T> {
    pub fn new() -> Self {
        let num_buffers = rayon::current_num_threads() + 1;
        Self {
            buffers: (0..num_buffers).map(|_| Mutex::new(Vec::new())).collect(),
        }
    }

    /// Append a value to the calling thread's buffer.
    pub fn stream(&self, value: T) {
        let buffer = rayon::current_thread_index().unwrap_or(self.buffers.len() - 1);
        self.buffers[buffer].lock().unwrap().push(value);
    }

    pub fn num_buffers(&self) -> usize {
        self.buffers.len()
    }

    pub fn buffer_len(&self, buffer: usize) -> usize {
        self.buffers[buffer].lock().unwrap().len()
    }

    /// The number of streamed values across all buffers.
    pub fn len(&self) -> usize {
        self.buffers.iter().map(|b| b.lock().unwrap().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn copy_sequential(&mut self) -> Vec<T> {
        let mut values = Vec::with_capacity(self.len());
        for buffer in self.buffers.iter_mut() {
            values.extend_from_slice(buffer.get_mut().unwrap());
        }
        values
    }

    pub fn copy_parallel(&mut self) -> Vec<T> {
        let buffers: Vec<&[T]> = self
            .buffers
            .iter_mut()
            .map(|b| b.get_mut().unwrap().as_slice())
            .collect();
        let total: usize = buffers.iter().map(|b| b.len()).sum();

        let mut values = vec![T::default(); total];
        let mut segments = Vec::with_capacity(buffers.len());
        let mut rest = values.as_mut_slice();
        for buffer in &buffers {
            let (segment, tail) = std::mem::take(&mut rest).split_at_mut(buffer.len());
            segments.push(segment);
            rest = tail;
        }

        segments
            .into_par_iter()
            .zip(buffers.into_par_iter())
            .for_each(|(segment, buffer)| segment.copy_from_slice(buffer));
        values
    }

    pub fn clear_sequential(&mut self) {
        for buffer in self.buffers.iter_mut() {
            *buffer.get_mut().unwrap() = Vec::new();
        }
    }

    pub fn clear_parallel(&mut self) {
        self.buffers
            .par_iter_mut()
            .for_each(|buffer| *buffer.get_mut().unwrap() = Vec::new());
    }
}

impl<T: Copy + Default + Send + Sync> Default for StreamingVector<T> {
    fn default() -> Self {
        Self::new()
    }
}
