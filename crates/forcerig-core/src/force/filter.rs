//! Moving average filter

use std::ops::{Add, Sub};

/// A value that can be averaged
pub trait Sample: Copy + Add<Output = Self> + Sub<Output = Self> {
    /// Multiply every component by `factor`
    fn scale(self, factor: f64) -> Self;
}

impl Sample for f64 {
    fn scale(self, factor: f64) -> Self {
        self * factor
    }
}

/// Fixed-size sample vector, e.g. per-channel forces
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Channels<const N: usize>(pub [f64; N]);

impl<const N: usize> Add for Channels<N> {
    type Output = Self;

    fn add(mut self, rhs: Self) -> Self {
        self.0.iter_mut().zip(rhs.0).for_each(|(a, b)| *a += b);
        self
    }
}

impl<const N: usize> Sub for Channels<N> {
    type Output = Self;

    fn sub(mut self, rhs: Self) -> Self {
        self.0.iter_mut().zip(rhs.0).for_each(|(a, b)| *a -= b);
        self
    }
}

impl<const N: usize> Sample for Channels<N> {
    fn scale(mut self, factor: f64) -> Self {
        self.0.iter_mut().for_each(|a| *a *= factor);
        self
    }
}

/// Moving average over the last `depth` samples.
///
/// The window starts filled with the initial value, so the first outputs
/// ramp from it towards the input.
#[derive(Debug, Clone)]
pub struct MovingAverage<T: Sample> {
    values: Vec<T>,
    sum: T,
    index: usize,
}

impl<T: Sample> MovingAverage<T> {
    /// Create a filter of `depth` samples (at least one)
    pub fn new(depth: usize, initial: T) -> Self {
        let values = vec![initial; depth.max(1)];
        let sum = values[1..].iter().fold(initial, |acc, &v| acc + v);
        Self {
            values,
            sum,
            index: 0,
        }
    }

    /// Window depth
    pub fn depth(&self) -> usize {
        self.values.len()
    }

    /// Push a sample and return the current average
    pub fn update(&mut self, value: T) -> T {
        self.sum = self.sum - self.values[self.index] + value;
        self.values[self.index] = value;
        self.index = (self.index + 1) % self.values.len();
        self.sum.scale(1.0 / self.values.len() as f64)
    }
}
