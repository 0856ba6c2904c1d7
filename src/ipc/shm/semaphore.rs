/*!
 * Process-Shared Semaphore
 * Binary guard living inside a shared segment
 */

use crate::core::errors::{ResourceError, ResourceResult};
use nix::errno::Errno;
use nix::libc;
use std::ptr::NonNull;

/// Unnamed POSIX semaphore initialised with `pshared = 1`
///
/// Waiters block in the kernel; there is no spinning. Ordering among
/// waiters is whatever the platform provides.
pub(crate) struct Semaphore {
    raw: NonNull<libc::sem_t>,
}

impl Semaphore {
    /// Initialise a semaphore in place
    ///
    /// # Safety
    /// `raw` must point into a shared mapping that outlives the returned value.
    pub unsafe fn init(raw: NonNull<libc::sem_t>, value: u32) -> ResourceResult<Self> {
        if libc::sem_init(raw.as_ptr(), 1, value) != 0 {
            return Err(ResourceError::GuardFailed(format!(
                "sem_init: {}",
                Errno::last()
            )));
        }
        Ok(Self { raw })
    }

    /// Use a semaphore already initialised by another process
    ///
    /// # Safety
    /// `raw` must point at an initialised semaphore inside a shared mapping
    /// that outlives the returned value.
    pub unsafe fn attach(raw: NonNull<libc::sem_t>) -> Self {
        Self { raw }
    }

    /// Block until the guard is available
    pub fn acquire(&self) -> ResourceResult<SemaphoreGuard<'_>> {
        loop {
            // SAFETY: `raw` is valid for the lifetime of `self`
            if unsafe { libc::sem_wait(self.raw.as_ptr()) } == 0 {
                return Ok(SemaphoreGuard { semaphore: self });
            }
            match Errno::last() {
                Errno::EINTR => continue,
                errno => {
                    return Err(ResourceError::GuardFailed(format!("sem_wait: {}", errno)));
                }
            }
        }
    }

    /// Destroy the semaphore
    ///
    /// # Safety
    /// No process may be blocked on or later use this semaphore.
    pub unsafe fn destroy(&self) -> ResourceResult<()> {
        if libc::sem_destroy(self.raw.as_ptr()) != 0 {
            return Err(ResourceError::GuardFailed(format!(
                "sem_destroy: {}",
                Errno::last()
            )));
        }
        Ok(())
    }

    fn post(&self) {
        // SAFETY: only reached from a guard obtained through `acquire`.
        // sem_post can only fail with EOVERFLOW, impossible for a binary guard.
        unsafe {
            libc::sem_post(self.raw.as_ptr());
        }
    }
}

/// Proof that the caller holds the semaphore; posts on drop
pub(crate) struct SemaphoreGuard<'a> {
    semaphore: &'a Semaphore,
}

impl Drop for SemaphoreGuard<'_> {
    fn drop(&mut self) {
        self.semaphore.post();
    }
}
