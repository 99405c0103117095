//! Link addressing
//!
//! A terminal link carries traffic for exactly two endpoints, addressed on
//! the wire as `1` and `2`. Chains, queues and outstanding-command state are
//! all tracked per endpoint, so the closed address set is also used as the
//! key of the fixed-size [`PerLink`] map.

use std::fmt;

use crate::error::{Error, Result};

/// One of the two fixed endpoints a frame is addressed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum LinkAddress {
    /// The terminal unit itself
    Primary = 1,

    /// An attached unit such as a PIN pad
    Secondary = 2,
}

impl LinkAddress {
    /// Both link addresses, in wire order
    pub const ALL: [LinkAddress; 2] = [LinkAddress::Primary, LinkAddress::Secondary];

    /// Parse a wire address byte
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] for any byte other than `1` or `2`.
    pub fn from_wire(byte: u8) -> Result<Self> {
        match byte {
            1 => Ok(LinkAddress::Primary),
            2 => Ok(LinkAddress::Secondary),
            other => Err(Error::InvalidAddress(other)),
        }
    }

    /// Wire representation of this address
    pub fn to_wire(self) -> u8 {
        self as u8
    }

    fn index(self) -> usize {
        match self {
            LinkAddress::Primary => 0,
            LinkAddress::Secondary => 1,
        }
    }
}

impl fmt::Display for LinkAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkAddress::Primary => write!(f, "primary"),
            LinkAddress::Secondary => write!(f, "secondary"),
        }
    }
}

/// Fixed two-slot map keyed by [`LinkAddress`]
///
/// # Examples
///
/// ```
/// use termlink_core::{LinkAddress, PerLink};
///
/// let mut counts: PerLink<u32> = PerLink::default();
/// *counts.get_mut(LinkAddress::Primary) += 1;
/// assert_eq!(*counts.get(LinkAddress::Primary), 1);
/// assert_eq!(*counts.get(LinkAddress::Secondary), 0);
/// ```
#[derive(Debug, Clone)]
pub struct PerLink<T> {
    slots: [T; 2],
}

impl<T> PerLink<T> {
    /// Build a map by calling `init` once per link address
    pub fn new(mut init: impl FnMut(LinkAddress) -> T) -> Self {
        Self {
            slots: [init(LinkAddress::Primary), init(LinkAddress::Secondary)],
        }
    }

    /// Borrow the slot for `link`
    pub fn get(&self, link: LinkAddress) -> &T {
        &self.slots[link.index()]
    }

    /// Mutably borrow the slot for `link`
    pub fn get_mut(&mut self, link: LinkAddress) -> &mut T {
        &mut self.slots[link.index()]
    }

    /// Iterate over `(address, slot)` pairs in wire order
    pub fn iter(&self) -> impl Iterator<Item = (LinkAddress, &T)> {
        LinkAddress::ALL.iter().map(|&link| (link, self.get(link)))
    }
}

impl<T: Default> Default for PerLink<T> {
    fn default() -> Self {
        Self::new(|_| T::default())
    }
}
