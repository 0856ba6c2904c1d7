/*!
 * Shared Memory Segment
 * Named POSIX shared memory mapped into the address space
 */

use crate::core::config::validate_segment_name;
use crate::core::errors::{ResourceError, ResourceResult};
use nix::fcntl::OFlag;
use nix::sys::mman::{mmap, munmap, shm_open, shm_unlink, MapFlags, ProtFlags};
use nix::sys::stat::Mode;
use std::ffi::c_void;
use std::fs::File;
use std::num::NonZeroUsize;
use std::ptr::NonNull;
use tracing::{debug, warn};

/// A `MAP_SHARED` mapping of a named segment
///
/// The mapping is inherited by every process forked while it is alive.
/// Dropping the segment unmaps it; removing the name is a separate step
/// reserved for the owner.
pub(crate) struct ShmSegment {
    name: String,
    base: NonNull<c_void>,
    len: NonZeroUsize,
}

impl ShmSegment {
    /// Create (or reuse) the named segment, sized to exactly `len` bytes
    pub fn create(name: &str, len: usize) -> ResourceResult<Self> {
        validate_segment_name(name)?;
        let len = NonZeroUsize::new(len).ok_or(ResourceError::InvalidCapacity)?;

        let fd = shm_open(
            name,
            OFlag::O_CREAT | OFlag::O_RDWR,
            Mode::S_IRUSR | Mode::S_IWUSR,
        )
        .map_err(|e| unavailable(name, e))?;
        let file = File::from(fd);

        // Truncate to zero first so a stale segment comes back zero-filled
        file.set_len(0)
            .and_then(|_| file.set_len(len.get() as u64))
            .map_err(|e| unavailable(name, e))?;

        Self::map(name, &file, len)
    }

    /// Attach to an existing segment of at least `len` bytes
    pub fn open(name: &str, len: usize) -> ResourceResult<Self> {
        validate_segment_name(name)?;
        let len = NonZeroUsize::new(len).ok_or(ResourceError::InvalidCapacity)?;

        let fd = shm_open(name, OFlag::O_RDWR, Mode::empty()).map_err(|e| unavailable(name, e))?;
        let file = File::from(fd);

        let actual = file.metadata().map_err(|e| unavailable(name, e))?.len();
        if actual < len.get() as u64 {
            return Err(ResourceError::SegmentUnavailable {
                name: name.to_string(),
                reason: format!("segment holds {} bytes, table needs {}", actual, len),
            });
        }

        Self::map(name, &file, len)
    }

    fn map(name: &str, file: &File, len: NonZeroUsize) -> ResourceResult<Self> {
        // SAFETY: fresh mapping chosen by the kernel, backed by a file of at
        // least `len` bytes. The descriptor may close afterwards.
        let base = unsafe {
            mmap(
                None,
                len,
                ProtFlags::PROT_READ | ProtFlags::PROT_WRITE,
                MapFlags::MAP_SHARED,
                file,
                0,
            )
        }
        .map_err(|e| ResourceError::MapFailed {
            name: name.to_string(),
            reason: e.to_string(),
        })?;

        debug!(segment = name, bytes = len.get(), "Mapped shared segment");

        Ok(Self {
            name: name.to_string(),
            base,
            len,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base(&self) -> NonNull<c_void> {
        self.base
    }

    /// Remove the name so no later run can attach to this segment
    pub fn unlink(&self) -> ResourceResult<()> {
        shm_unlink(self.name.as_str()).map_err(|e| ResourceError::UnlinkFailed {
            name: self.name.clone(),
            reason: e.to_string(),
        })
    }
}

impl Drop for ShmSegment {
    fn drop(&mut self) {
        // SAFETY: base/len describe the mapping created in `map`, and every
        // pointer derived from it is owned by the table that owns us.
        if let Err(e) = unsafe { munmap(self.base, self.len.get()) } {
            warn!(segment = %self.name, error = %e, "Failed to unmap shared segment");
        }
    }
}

fn unavailable(name: &str, err: impl ToString) -> ResourceError {
    ResourceError::SegmentUnavailable {
        name: name.to_string(),
        reason: err.to_string(),
    }
}
