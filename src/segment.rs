//! Named POSIX shared-memory segment handle (C1).
//!
//! Supports create-or-attach semantics: either peer may be the first to run,
//! and a later peer attaches to whatever the first peer already created.

use std::ffi::CString;
use std::io;
use std::ptr;

/// Whether this process created the segment or attached to one that already
/// existed. The creator is responsible for zero-initializing the control
/// block and, later, for unlinking the name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentOrigin {
    Created,
    Attached,
}

/// An owned `mmap`-ed region backed by a named `shm_open` object.
///
/// Dropping a `ShmSegment` only unmaps the region; it never unlinks the
/// name, so other processes that still hold the mapping are unaffected.
/// Unlinking is a separate, explicit operation (see [`unlink`]).
pub struct ShmSegment {
    ptr: *mut u8,
    len: usize,
}

// SAFETY: the mapped region is shared memory intended for concurrent access
// from multiple processes/threads; all access through it is mediated by the
// atomics in `layout`/`queue`.
unsafe impl Send for ShmSegment {}
unsafe impl Sync for ShmSegment {}

impl ShmSegment {
    /// Creates the named segment if it does not exist, or attaches to it if
    /// it does. `len` is the total mapped size in bytes (control block plus
    /// user region) to use *only when creating*; an attaching peer never
    /// resizes the segment, and instead maps it at its existing on-disk
    /// size. This matters because an attaching peer's locally-derived `len`
    /// may not agree with the creator's geometry at all — truncating to it
    /// before that geometry has been validated could shrink (and corrupt) a
    /// segment a live sender is still writing to. Geometry validation (and
    /// therefore the decision to treat a mismatch as fatal without having
    /// touched the segment) happens one layer up, in [`crate::queue`], once
    /// the control block is safely mapped read/write at its real size.
    pub fn acquire(name: &str, len: usize) -> io::Result<(Self, SegmentOrigin)> {
        let cname = validate_name(name)?;

        // Try an exclusive create first; either peer may win this race.
        let create_fd = unsafe {
            libc::shm_open(
                cname.as_ptr(),
                libc::O_CREAT | libc::O_EXCL | libc::O_RDWR,
                0o600,
            )
        };

        if create_fd >= 0 {
            return Self::finish_create(&cname, name, create_fd, len);
        }

        let err = io::Error::last_os_error();
        if err.raw_os_error() != Some(libc::EEXIST) {
            return Err(err);
        }
        Self::finish_attach(&cname, name)
    }

    /// Truncates a freshly `O_CREAT|O_EXCL`-opened fd to `len`, maps it, and
    /// zero-fills it. Only the winner of the exclusive-create race reaches
    /// this path, so truncating to the caller's requested size is safe.
    fn finish_create(
        cname: &CString,
        name: &str,
        fd: libc::c_int,
        len: usize,
    ) -> io::Result<(Self, SegmentOrigin)> {
        if unsafe { libc::ftruncate(fd, len as libc::off_t) } != 0 {
            let err = io::Error::last_os_error();
            unsafe { libc::close(fd) };
            unsafe { libc::shm_unlink(cname.as_ptr()) };
            return Err(err);
        }

        let mapped = unsafe {
            libc::mmap(
                ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                fd,
                0,
            )
        };
        unsafe { libc::close(fd) };

        if mapped == libc::MAP_FAILED {
            let err = io::Error::last_os_error();
            unsafe { libc::shm_unlink(cname.as_ptr()) };
            return Err(err);
        }

        // POSIX guarantees a newly `ftruncate`d shm object reads as zero,
        // but we zero explicitly for clarity and to not depend on that
        // guarantee holding on every platform this ever runs on.
        unsafe { ptr::write_bytes(mapped as *mut u8, 0, len) };
        log::debug!("created shared memory segment {name} ({len} bytes)");

        Ok((
            ShmSegment {
                ptr: mapped as *mut u8,
                len,
            },
            SegmentOrigin::Created,
        ))
    }

    /// Opens an existing segment and maps it at its *actual* on-disk size,
    /// read from `fstat` rather than taken from the caller's requested
    /// `len`. Never truncates: the segment may already hold live data a
    /// sender is writing to, and this crate's own geometry has not been
    /// validated against the segment's recorded geometry yet.
    fn finish_attach(cname: &CString, name: &str) -> io::Result<(Self, SegmentOrigin)> {
        let fd = unsafe { libc::shm_open(cname.as_ptr(), libc::O_RDWR, 0) };
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }

        let mut stat: libc::stat = unsafe { std::mem::zeroed() };
        if unsafe { libc::fstat(fd, &mut stat) } != 0 {
            let err = io::Error::last_os_error();
            unsafe { libc::close(fd) };
            return Err(err);
        }
        let actual_len = stat.st_size as usize;
        if actual_len < crate::layout::ControlBlock::SIZE {
            unsafe { libc::close(fd) };
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "segment {name} is {actual_len} bytes, too small to hold a control block"
                ),
            ));
        }

        let mapped = unsafe {
            libc::mmap(
                ptr::null_mut(),
                actual_len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                fd,
                0,
            )
        };
        unsafe { libc::close(fd) };

        if mapped == libc::MAP_FAILED {
            return Err(io::Error::last_os_error());
        }

        log::debug!("attached to shared memory segment {name} ({actual_len} bytes)");

        Ok((
            ShmSegment {
                ptr: mapped as *mut u8,
                len: actual_len,
            },
            SegmentOrigin::Attached,
        ))
    }

    pub fn as_ptr(&self) -> *mut u8 {
        self.ptr
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Drop for ShmSegment {
    fn drop(&mut self) {
        if !self.ptr.is_null() {
            unsafe { libc::munmap(self.ptr as *mut libc::c_void, self.len) };
        }
    }
}

fn validate_name(name: &str) -> io::Result<CString> {
    if !name.starts_with('/') || name[1..].contains('/') || name.len() > 255 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("invalid shared memory name: {name:?} (must start with '/', contain no further '/', and be <= 255 bytes)"),
        ));
    }
    CString::new(name)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "name contains a NUL byte"))
}

/// Unlinks the name from the shared-memory namespace. Idempotent: a missing
/// segment is not an error.
pub fn unlink(name: &str) -> io::Result<()> {
    let cname = validate_name(name)?;
    let ret = unsafe { libc::shm_unlink(cname.as_ptr()) };
    if ret != 0 {
        let err = io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::ENOENT) {
            return Ok(());
        }
        return Err(err);
    }
    log::debug!("unlinked shared memory segment {name}");
    Ok(())
}

/// Probes whether a named segment currently exists, without creating or
/// mutating anything.
pub fn exists(name: &str) -> io::Result<bool> {
    let cname = validate_name(name)?;
    let fd = unsafe { libc::shm_open(cname.as_ptr(), libc::O_RDONLY, 0) };
    if fd >= 0 {
        unsafe { libc::close(fd) };
        Ok(true)
    } else {
        let err = io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::ENOENT) {
            Ok(false)
        } else {
            Err(err)
        }
    }
}

/// Scans `/dev/shm` for segments whose name starts with `prefix` and removes
/// any whose contents fail to look like a valid control block for a queue of
/// the expected geometry. This is an opt-in operational helper, not used by
/// `Sender`/`Receiver` themselves: the crash-recovery hazard of abandoned
/// segments lingering in the namespace is otherwise left to the operator.
///
/// The control block carries no magic number (the layout is intentionally
/// minimal), so "looks valid" here means: the recorded geometry is
/// internally consistent (non-zero power-of-two region size, stride
/// dividing it evenly).
pub fn cleanup_stale_segments(prefix: &str) -> io::Result<Vec<String>> {
    use crate::layout::ControlBlock;
    use std::fs;

    let mut removed = Vec::new();
    let dir = match fs::read_dir("/dev/shm") {
        Ok(dir) => dir,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(removed),
        Err(err) => return Err(err),
    };

    for entry in dir {
        let entry = entry?;
        let file_name = entry.file_name();
        let Some(file_name) = file_name.to_str() else {
            continue;
        };
        if !file_name.starts_with(prefix.trim_start_matches('/')) {
            continue;
        }
        let name = format!("/{file_name}");
        if segment_looks_stale(&name)? {
            unlink(&name)?;
            log::debug!("removed stale shared memory segment {name}");
            removed.push(name);
        }
    }
    Ok(removed)
}

/// Reads a segment read-only, without ever truncating it, to decide whether
/// it looks like a live queue's control block. Deliberately avoids
/// `ShmSegment::acquire`: that path truncates on create/attach, which would
/// shrink (and corrupt) a live segment larger than one control block.
fn segment_looks_stale(name: &str) -> io::Result<bool> {
    use crate::layout::ControlBlock;

    let cname = validate_name(name)?;
    let fd = unsafe { libc::shm_open(cname.as_ptr(), libc::O_RDONLY, 0) };
    if fd < 0 {
        let err = io::Error::last_os_error();
        return if err.raw_os_error() == Some(libc::ENOENT) {
            Ok(false)
        } else {
            Err(err)
        };
    }

    let mut stat: libc::stat = unsafe { std::mem::zeroed() };
    if unsafe { libc::fstat(fd, &mut stat) } != 0 {
        let err = io::Error::last_os_error();
        unsafe { libc::close(fd) };
        return Err(err);
    }
    let actual_len = stat.st_size as usize;
    if actual_len < ControlBlock::SIZE {
        unsafe { libc::close(fd) };
        return Ok(true);
    }

    let mapped = unsafe {
        libc::mmap(
            ptr::null_mut(),
            ControlBlock::SIZE,
            libc::PROT_READ,
            libc::MAP_SHARED,
            fd,
            0,
        )
    };
    unsafe { libc::close(fd) };
    if mapped == libc::MAP_FAILED {
        return Err(io::Error::last_os_error());
    }

    let control = unsafe { &*(mapped as *const ControlBlock) };
    let geometry = control.recorded_geometry();
    let consistent = geometry.user_region_bytes != 0
        && geometry.user_region_bytes.is_power_of_two()
        && geometry.slot_stride_bytes != 0
        && geometry.user_region_bytes % geometry.slot_stride_bytes == 0
        && actual_len >= ControlBlock::SIZE + geometry.user_region_bytes;

    unsafe { libc::munmap(mapped, ControlBlock::SIZE) };
    Ok(!consistent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn unique_name(tag: &str) -> String {
        format!("/spsc-shm-queue-segment-test-{tag}-{}", fastrand::u64(..))
    }

    #[test]
    #[serial]
    fn first_acquire_creates_second_attaches() {
        let name = unique_name("create-attach");
        let (first, origin) = ShmSegment::acquire(&name, 4096).unwrap();
        assert_eq!(origin, SegmentOrigin::Created);

        let (second, origin) = ShmSegment::acquire(&name, 4096).unwrap();
        assert_eq!(origin, SegmentOrigin::Attached);

        drop(first);
        drop(second);
        unlink(&name).unwrap();
    }

    #[test]
    #[serial]
    fn unlink_is_idempotent_on_a_missing_segment() {
        let name = unique_name("missing");
        assert!(!exists(&name).unwrap());
        unlink(&name).unwrap();
        unlink(&name).unwrap();
    }

    #[test]
    #[serial]
    fn exists_reflects_create_and_unlink() {
        let name = unique_name("exists");
        assert!(!exists(&name).unwrap());
        let (segment, _) = ShmSegment::acquire(&name, 4096).unwrap();
        assert!(exists(&name).unwrap());
        drop(segment);
        unlink(&name).unwrap();
        assert!(!exists(&name).unwrap());
    }

    #[test]
    fn validate_name_rejects_malformed_names() {
        assert!(validate_name("no-leading-slash").is_err());
        assert!(validate_name("/nested/slash").is_err());
        assert!(validate_name(&"/".repeat(300)).is_err());
        assert!(validate_name("/ok-name").is_ok());
    }

    #[test]
    #[serial]
    fn created_segment_is_zero_filled() {
        let name = unique_name("zero-filled");
        let (segment, origin) = ShmSegment::acquire(&name, 4096).unwrap();
        assert_eq!(origin, SegmentOrigin::Created);
        let bytes = unsafe { std::slice::from_raw_parts(segment.as_ptr(), segment.len()) };
        assert!(bytes.iter().all(|&b| b == 0));
        drop(segment);
        unlink(&name).unwrap();
    }
}
