//! Signal path and channel identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Index, IndexMut};

/// Direction of a signal path through the transceiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Receive path
    Rx,
    /// Transmit path
    Tx,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Rx => write!(f, "Rx"),
            Direction::Tx => write!(f, "Tx"),
        }
    }
}

/// One of the two transceiver channels.
///
/// Channels are addressed by index (0, 1) in device calls and by letter
/// (A, B) in low-level settings and reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Channel {
    /// Channel A (index 0)
    A,
    /// Channel B (index 1)
    B,
}

impl Channel {
    /// Both channels in index order.
    pub const ALL: [Channel; 2] = [Channel::A, Channel::B];

    /// Zero-based channel index used by device calls.
    pub fn index(self) -> usize {
        match self {
            Channel::A => 0,
            Channel::B => 1,
        }
    }

    /// Single-letter label ("A" or "B").
    pub fn letter(self) -> &'static str {
        match self {
            Channel::A => "A",
            Channel::B => "B",
        }
    }

    /// The opposite channel.
    pub fn other(self) -> Self {
        match self {
            Channel::A => Channel::B,
            Channel::B => Channel::A,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ch{}", self.letter())
    }
}

/// A value held for each of the two channels.
///
/// # Example
///
/// ```
/// use cal_core::types::{Channel, PerChannel};
///
/// let mut levels = PerChannel::splat(f64::INFINITY);
/// levels[Channel::B] = -42.0;
/// assert_eq!(levels[Channel::A], f64::INFINITY);
/// assert_eq!(levels[Channel::B], -42.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PerChannel<T>(pub [T; 2]);

impl<T> PerChannel<T> {
    /// Create from per-channel values in index order.
    pub fn new(a: T, b: T) -> Self {
        Self([a, b])
    }

    /// Apply `f` to each channel's value.
    pub fn map<U, F>(self, mut f: F) -> PerChannel<U>
    where
        F: FnMut(T) -> U,
    {
        let [a, b] = self.0;
        PerChannel([f(a), f(b)])
    }

    /// Build from a function of the channel.
    pub fn from_fn<F>(mut f: F) -> Self
    where
        F: FnMut(Channel) -> T,
    {
        PerChannel([f(Channel::A), f(Channel::B)])
    }

    /// Iterate `(channel, value)` pairs in index order.
    pub fn iter(&self) -> impl Iterator<Item = (Channel, &T)> {
        Channel::ALL.into_iter().zip(self.0.iter())
    }
}

impl<T: Clone> PerChannel<T> {
    /// Same value on both channels.
    pub fn splat(value: T) -> Self {
        Self([value.clone(), value])
    }
}

impl<T> Index<Channel> for PerChannel<T> {
    type Output = T;

    fn index(&self, ch: Channel) -> &T {
        &self.0[ch.index()]
    }
}

impl<T> IndexMut<Channel> for PerChannel<T> {
    fn index_mut(&mut self, ch: Channel) -> &mut T {
        &mut self.0[ch.index()]
    }
}
