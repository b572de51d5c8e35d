use std::collections::VecDeque;

use crate::error::StreamError;

enum WindowState {
    /// Row width is not known until the first batch arrives.
    Uninitialized,
    Ready {
        rows: VecDeque<Vec<f64>>,
        width: usize,
    },
}

/// Bounded history of multi-channel sample rows, oldest first. Capacity
/// covers the displayed window plus the filter lead-in margin; rows beyond
/// it are evicted on append, so the length never exceeds the capacity.
pub struct SlidingWindow {
    capacity: usize,
    state: WindowState,
}

impl SlidingWindow {
    pub fn new(capacity: usize) -> Result<Self, StreamError> {
        if capacity == 0 {
            return Err(StreamError::InvalidWindow);
        }
        Ok(Self {
            capacity,
            state: WindowState::Uninitialized,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, WindowState::Ready { .. })
    }

    pub fn len(&self) -> usize {
        match &self.state {
            WindowState::Uninitialized => 0,
            WindowState::Ready { rows, .. } => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Allocates the zero-filled history for rows of `width` values. A fresh
    /// session starts from silence rather than an underfull buffer.
    pub fn initialize(&mut self, width: usize) -> Result<(), StreamError> {
        if width == 0 {
            return Err(StreamError::ChannelMismatch {
                expected: 1,
                actual: 0,
            });
        }
        let mut rows = VecDeque::with_capacity(self.capacity);
        rows.extend(std::iter::repeat_with(|| vec![0.0; width]).take(self.capacity));
        self.state = WindowState::Ready { rows, width };
        Ok(())
    }

    /// Appends rows in arrival order, initializing lazily from the first
    /// row's width, and evicts the oldest rows beyond capacity.
    pub fn append(&mut self, batch: &[Vec<f64>]) -> Result<(), StreamError> {
        let Some(first) = batch.first() else {
            return Ok(());
        };
        if !self.is_ready() {
            self.initialize(first.len())?;
        }
        let capacity = self.capacity;
        let WindowState::Ready { rows, width } = &mut self.state else {
            return Err(StreamError::WindowUninitialized);
        };
        for row in batch {
            if row.len() != *width {
                return Err(StreamError::ChannelMismatch {
                    expected: *width,
                    actual: row.len(),
                });
            }
            if rows.len() == capacity {
                rows.pop_front();
            }
            rows.push_back(row.clone());
        }
        Ok(())
    }

    /// Chronological projection of one channel row across the whole window.
    pub fn channel_series(&self, channel: usize) -> Result<Vec<f64>, StreamError> {
        let WindowState::Ready { rows, width } = &self.state else {
            return Err(StreamError::WindowUninitialized);
        };
        if channel >= *width {
            return Err(StreamError::ChannelMismatch {
                expected: *width,
                actual: channel,
            });
        }
        Ok(rows.iter().map(|row| row[channel]).collect())
    }

    /// Discards all contents and the learned width. The next append sizes
    /// the window again.
    pub fn clear(&mut self) {
        self.state = WindowState::Uninitialized;
    }
}
