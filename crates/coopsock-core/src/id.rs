//! Socket handle and creation id types

use core::fmt;

/// Handle for a socket in the table
///
/// A handle is the index of the socket's slot. The TCP region comes first,
/// followed by the UDP region. `u32::MAX` is reserved as "no socket".
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct SocketHandle(u32);

impl SocketHandle {
    /// Sentinel value for "no socket"
    pub const NONE: SocketHandle = SocketHandle(u32::MAX);

    #[inline]
    pub const fn new(index: u32) -> Self {
        SocketHandle(index)
    }

    #[inline]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    /// Slot index for table lookups
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    #[inline]
    pub const fn is_none(self) -> bool {
        self.0 == u32::MAX
    }

    /// Convert to Option, mapping the sentinel to `None`
    #[inline]
    pub const fn to_option(self) -> Option<SocketHandle> {
        if self.is_none() {
            None
        } else {
            Some(self)
        }
    }

    /// Raw descriptor value for the POSIX-flavored surface
    #[inline]
    pub const fn as_fd(self) -> i32 {
        if self.is_none() {
            -1
        } else {
            self.0 as i32
        }
    }

    /// Build a handle from a POSIX descriptor; negative values are `None`
    #[inline]
    pub const fn from_fd(fd: i32) -> Option<SocketHandle> {
        if fd < 0 {
            None
        } else {
            Some(SocketHandle(fd as u32))
        }
    }
}

impl From<u32> for SocketHandle {
    #[inline]
    fn from(index: u32) -> Self {
        SocketHandle(index)
    }
}

impl fmt::Debug for SocketHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            write!(f, "SocketHandle(NONE)")
        } else {
            write!(f, "SocketHandle({})", self.0)
        }
    }
}

impl fmt::Display for SocketHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            write!(f, "none")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl Default for SocketHandle {
    fn default() -> Self {
        SocketHandle::NONE
    }
}

/// Allocation tag of a slot
///
/// Drawn from one layer-wide counter every time a slot is handed out, so two
/// incarnations of the same slot never share a value. A waiter that captured
/// an old value knows its socket is gone once the slot's tag differs.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct CreationId(u64);

impl CreationId {
    /// Tag of a slot that has never been allocated
    pub const UNSET: CreationId = CreationId(0);

    #[inline]
    pub const fn new(raw: u64) -> Self {
        CreationId(raw)
    }

    #[inline]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// The tag that follows this one
    #[inline]
    pub const fn next(self) -> CreationId {
        CreationId(self.0 + 1)
    }
}

impl fmt::Debug for CreationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CreationId({})", self.0)
    }
}

impl fmt::Display for CreationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_basics() {
        let h = SocketHandle::new(7);
        assert_eq!(h.as_u32(), 7);
        assert_eq!(h.index(), 7);
        assert_eq!(h.as_fd(), 7);
        assert!(!h.is_none());
        assert_eq!(h.to_option(), Some(h));
    }

    #[test]
    fn test_handle_none() {
        assert!(SocketHandle::NONE.is_none());
        assert_eq!(SocketHandle::NONE.as_fd(), -1);
        assert_eq!(SocketHandle::NONE.to_option(), None);
        assert_eq!(SocketHandle::default(), SocketHandle::NONE);
    }

    #[test]
    fn test_handle_from_fd() {
        assert_eq!(SocketHandle::from_fd(-1), None);
        assert_eq!(SocketHandle::from_fd(3), Some(SocketHandle::new(3)));
    }

    #[test]
    fn test_creation_id_ordering() {
        let a = CreationId::new(1);
        let b = a.next();
        assert!(b > a);
        assert_eq!(b.as_u64(), 2);
        assert_eq!(CreationId::default(), CreationId::UNSET);
    }
}
