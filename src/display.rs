//! Bounded window of recent positions for visualization

use nalgebra::Vector3;
use std::collections::VecDeque;

/// Fixed-capacity ring buffer of positions, oldest first.
///
/// Once full, each push evicts the oldest position. The buffer is owned by a
/// single driver; readers only ever see copies taken with [`snapshot`](Self::snapshot).
///
/// # Example
/// ```
/// use nalgebra::Vector3;
/// use fusion_trail::DisplayBuffer;
///
/// let mut buffer = DisplayBuffer::new(2);
/// buffer.push(Vector3::new(1.0, 0.0, 0.0));
/// buffer.push(Vector3::new(2.0, 0.0, 0.0));
/// buffer.push(Vector3::new(3.0, 0.0, 0.0));
///
/// let window = buffer.snapshot();
/// assert_eq!(window.len(), 2);
/// assert_eq!(window.positions()[0].x, 2.0);
/// ```
#[derive(Debug, Clone)]
pub struct DisplayBuffer {
    positions: VecDeque<Vector3<f32>>,
    capacity: usize,
}

impl DisplayBuffer {
    /// Create an empty buffer. A zero capacity is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            positions: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a position, evicting the oldest when full
    pub fn push(&mut self, position: Vector3<f32>) {
        if self.positions.len() == self.capacity {
            self.positions.pop_front();
        }
        self.positions.push_back(position);
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Most recent position
    pub fn latest(&self) -> Option<Vector3<f32>> {
        self.positions.back().copied()
    }

    /// Copy of the current contents, oldest first
    pub fn snapshot(&self) -> DisplayWindow {
        DisplayWindow {
            positions: self.positions.iter().copied().collect(),
        }
    }

    pub fn clear(&mut self) {
        self.positions.clear();
    }
}

/// Immutable copy of a [`DisplayBuffer`], oldest position first
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DisplayWindow {
    positions: Vec<Vector3<f32>>,
}

impl DisplayWindow {
    pub fn positions(&self) -> &[Vector3<f32>] {
        &self.positions
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn latest(&self) -> Option<Vector3<f32>> {
        self.positions.last().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Vector3<f32>> {
        self.positions.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(x: f32) -> Vector3<f32> {
        Vector3::new(x, 0.0, 0.0)
    }

    #[test]
    fn test_never_exceeds_capacity() {
        let mut buffer = DisplayBuffer::new(100);
        for i in 0..250 {
            buffer.push(point(i as f32));
            assert!(buffer.len() <= 100);
        }
        assert_eq!(buffer.len(), 100);

        let window = buffer.snapshot();
        let xs: Vec<f32> = window.iter().map(|p| p.x).collect();
        let expected: Vec<f32> = (150..250).map(|i| i as f32).collect();
        assert_eq!(xs, expected);
        assert_eq!(window.latest(), Some(point(249.0)));
    }

    #[test]
    fn test_snapshot_is_detached() {
        let mut buffer = DisplayBuffer::new(3);
        buffer.push(point(1.0));
        let window = buffer.snapshot();

        buffer.push(point(2.0));
        buffer.clear();

        assert_eq!(window.positions(), &[point(1.0)]);
        assert!(buffer.is_empty());
        assert_eq!(buffer.latest(), None);
    }

    #[test]
    fn test_zero_capacity_is_raised() {
        let mut buffer = DisplayBuffer::new(0);
        assert_eq!(buffer.capacity(), 1);
        buffer.push(point(1.0));
        buffer.push(point(2.0));
        assert_eq!(buffer.snapshot().positions(), &[point(2.0)]);
    }
}
