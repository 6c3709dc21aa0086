// Handle registry - external owner of OS descriptors referenced by index

use crate::error::HandleError;

/// A handle that can produce an independent duplicate of itself.
///
/// Resolving an index hands out a duplicate, never the registry's own copy,
/// so the caller's handle outlives nothing but itself.
pub trait DuplicateHandle: Sized {
    fn duplicate(&self) -> Result<Self, HandleError>;
}

/// Registry owning the descriptors that accompany a message out-of-band.
///
/// Values refer to entries by index only; the registry must stay alive for
/// those indices to resolve. Synchronization, if the registry is shared, is
/// the caller's concern.
#[derive(Debug)]
pub struct HandleRegistry<H> {
    handles: Vec<H>,
}

impl<H: DuplicateHandle> HandleRegistry<H> {
    pub fn new() -> Self {
        HandleRegistry {
            handles: Vec::new(),
        }
    }

    /// Take ownership of a handle and return its index.
    pub fn register(&mut self, handle: H) -> u32 {
        self.handles.push(handle);
        (self.handles.len() - 1) as u32
    }

    /// Duplicate the handle at `index`.
    pub fn resolve(&self, index: u32) -> Result<H, HandleError> {
        let handle = self
            .handles
            .get(index as usize)
            .ok_or(HandleError::UnknownIndex {
                index,
                len: self.handles.len(),
            })?;
        handle.duplicate()
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

impl<H: DuplicateHandle> Default for HandleRegistry<H> {
    fn default() -> Self {
        Self::new()
    }
}

/// A raw, non-owning handle value.
///
/// Used when the registry carries descriptor numbers it does not own;
/// duplication is a plain value copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawHandle(pub i64);

impl DuplicateHandle for RawHandle {
    fn duplicate(&self) -> Result<Self, HandleError> {
        Ok(*self)
    }
}

#[cfg(unix)]
impl DuplicateHandle for std::os::fd::OwnedFd {
    fn duplicate(&self) -> Result<Self, HandleError> {
        self.try_clone().map_err(HandleError::Duplicate)
    }
}
