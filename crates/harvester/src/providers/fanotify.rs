//! Linux `fanotify(7)`-backed stream provider. Watches a set of marked paths
//! for write/create/delete/rename activity without the polling cost of
//! `inotify` on deep trees (fanotify supports filesystem-wide marks).
//!
//! Non-Linux builds compile to a provider that reports itself unavailable
//! and always returns an empty batch, the same pattern the detection
//! pipeline uses for its optional NER stage.

use crate::providers::StreamProvider;
use crate::types::{AccessAction, RawAccessEvent};
use async_trait::async_trait;
use openlabels_core::error::Result;

pub const FAN_ACCESS: u64 = 0x0000_0001;
pub const FAN_MODIFY: u64 = 0x0000_0002;
pub const FAN_CLOSE_WRITE: u64 = 0x0000_0008;
pub const FAN_MOVED_FROM: u64 = 0x0000_0040;
pub const FAN_MOVED_TO: u64 = 0x0000_0080;
pub const FAN_CREATE: u64 = 0x0000_0100;
pub const FAN_DELETE: u64 = 0x0000_0200;
pub const FAN_DELETE_SELF: u64 = 0x0000_0400;
pub const FAN_ONDIR: u64 = 0x4000_0000;
pub const FAN_EVENT_ON_CHILD: u64 = 0x0800_0000;

/// `struct fanotify_event_metadata` is a fixed 24 bytes on every supported
/// ABI (4 + 1 + 1 + 2 + 8 + 4 + 4).
pub const _FANOTIFY_EVENT_SIZE: usize = 24;

/// Maps a fanotify event mask to the coarse `AccessAction` this system
/// reports. Delete and rename bits take precedence over write/modify bits
/// since a single event can carry several flags at once.
pub fn _mask_to_action(mask: u64) -> &'static str {
    if mask & (FAN_DELETE | FAN_DELETE_SELF) != 0 {
        "delete"
    } else if mask & (FAN_MOVED_FROM | FAN_MOVED_TO) != 0 {
        "rename"
    } else if mask & (FAN_MODIFY | FAN_CLOSE_WRITE | FAN_CREATE) != 0 {
        "write"
    } else if mask & FAN_ACCESS != 0 {
        "read"
    } else {
        "write"
    }
}

fn mask_to_access_action(mask: u64) -> AccessAction {
    match _mask_to_action(mask) {
        "delete" => AccessAction::Delete,
        "rename" => AccessAction::Rename,
        "read" => AccessAction::Read,
        _ => AccessAction::Write,
    }
}

#[cfg(target_os = "linux")]
mod linux_impl {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex;

    /// Resolves a PID to the username of its owning process via `/proc`,
    /// since that avoids an extra crate dependency for what is a one-line
    /// `/proc/<pid>/status` read plus a passwd lookup.
    pub fn _resolve_pid_user(pid: i32) -> Option<String> {
        if pid <= 0 {
            return None;
        }
        let status_path = format!("/proc/{pid}/status");
        let contents = std::fs::read_to_string(status_path).ok()?;
        let uid_line = contents.lines().find(|l| l.starts_with("Uid:"))?;
        let uid: u32 = uid_line.split_whitespace().nth(1)?.parse().ok()?;

        // SAFETY: getpwuid is thread-safe to call here; we copy the name out
        // before the static buffer it returns can be reused.
        unsafe {
            let passwd = libc::getpwuid(uid);
            if passwd.is_null() {
                return None;
            }
            let name = std::ffi::CStr::from_ptr((*passwd).pw_name).to_string_lossy().into_owned();
            if name.is_empty() {
                None
            } else {
                Some(name)
            }
        }
    }

    pub struct FanotifyProvider {
        pub(super) fan_fd: i32,
        pub(super) marked_paths: Mutex<HashSet<String>>,
        pub(super) event_mask: u64,
    }

    impl FanotifyProvider {
        pub fn new() -> Option<Self> {
            let mask = FAN_MODIFY | FAN_CLOSE_WRITE | FAN_CREATE | FAN_DELETE
                | FAN_DELETE_SELF | FAN_MOVED_FROM | FAN_MOVED_TO;

            // SAFETY: fanotify_init has no preconditions beyond CAP_SYS_ADMIN;
            // a negative return means the kernel refused (unprivileged,
            // unsupported), and we fall back to reporting unavailable.
            let fd = unsafe { libc::syscall(libc::SYS_fanotify_init, 0u32, libc::O_RDONLY) };
            if fd < 0 {
                return None;
            }

            Some(Self {
                fan_fd: fd as i32,
                marked_paths: Mutex::new(HashSet::new()),
                event_mask: mask,
            })
        }

        pub fn update_watched_paths(&self, paths: &[impl AsRef<str>]) {
            if self.fan_fd < 0 {
                return;
            }
            let mut marked = self.marked_paths.lock().unwrap();
            for path in paths {
                let path = path.as_ref();
                if marked.contains(path) {
                    continue;
                }
                let c_path = match std::ffi::CString::new(path) {
                    Ok(p) => p,
                    Err(_) => continue,
                };
                // SAFETY: fd is a valid fanotify descriptor owned by self;
                // c_path is a valid nul-terminated string for the syscall's
                // duration.
                let rc = unsafe {
                    libc::syscall(
                        libc::SYS_fanotify_mark,
                        self.fan_fd,
                        libc::FAN_MARK_ADD,
                        self.event_mask,
                        libc::AT_FDCWD,
                        c_path.as_ptr(),
                    )
                };
                if rc == 0 {
                    marked.insert(path.to_string());
                }
            }
        }

        pub fn close(&mut self) {
            if self.fan_fd >= 0 {
                unsafe {
                    libc::close(self.fan_fd);
                }
            }
            self.fan_fd = -1;
            self.marked_paths.lock().unwrap().clear();
        }

        fn read_raw_events(&self) -> Vec<(u64, i32)> {
            if self.fan_fd < 0 {
                return Vec::new();
            }
            let mut buf = [0u8; 4096];
            // SAFETY: fd is valid, buf is sized and owned locally for the
            // duration of the call.
            let n = unsafe { libc::read(self.fan_fd, buf.as_mut_ptr() as *mut libc::c_void, buf.len()) };
            if n <= 0 {
                return Vec::new();
            }
            let mut events = Vec::new();
            let mut offset = 0usize;
            while offset + _FANOTIFY_EVENT_SIZE <= n as usize {
                let event_len = u32::from_ne_bytes(buf[offset..offset + 4].try_into().unwrap()) as usize;
                let mask = u64::from_ne_bytes(buf[offset + 8..offset + 16].try_into().unwrap());
                let fd = i32::from_ne_bytes(buf[offset + 16..offset + 20].try_into().unwrap());
                events.push((mask, fd));
                if fd >= 0 {
                    unsafe {
                        libc::close(fd);
                    }
                }
                if event_len == 0 {
                    break;
                }
                offset += event_len;
            }
            events
        }

        pub async fn collect_impl(&self) -> Vec<RawAccessEvent> {
            if self.fan_fd < 0 {
                return Vec::new();
            }
            self.read_raw_events()
                .into_iter()
                .map(|(mask, fd)| {
                    let path = fd_path(fd).unwrap_or_else(|| "<unknown>".to_string());
                    RawAccessEvent::new(path, mask_to_access_action(mask), "fanotify")
                })
                .collect()
        }
    }

    fn fd_path(fd: i32) -> Option<String> {
        if fd < 0 {
            return None;
        }
        std::fs::read_link(format!("/proc/self/fd/{fd}")).ok().map(|p| p.to_string_lossy().into_owned())
    }

    impl Drop for FanotifyProvider {
        fn drop(&mut self) {
            self.close();
        }
    }
}

#[cfg(target_os = "linux")]
pub use linux_impl::FanotifyProvider;

#[cfg(not(target_os = "linux"))]
pub struct FanotifyProvider;

#[cfg(not(target_os = "linux"))]
impl FanotifyProvider {
    pub fn new() -> Option<Self> {
        None
    }
}

impl FanotifyProvider {
    pub fn is_available() -> bool {
        cfg!(target_os = "linux")
    }
}

#[async_trait]
impl StreamProvider for FanotifyProvider {
    fn name(&self) -> &'static str {
        "fanotify"
    }

    async fn collect(&self) -> Result<Vec<RawAccessEvent>> {
        #[cfg(target_os = "linux")]
        {
            Ok(self.collect_impl().await)
        }
        #[cfg(not(target_os = "linux"))]
        {
            Ok(Vec::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modify_is_write() {
        assert_eq!(_mask_to_action(FAN_MODIFY), "write");
    }

    #[test]
    fn close_write_is_write() {
        assert_eq!(_mask_to_action(FAN_CLOSE_WRITE), "write");
    }

    #[test]
    fn create_is_write() {
        assert_eq!(_mask_to_action(FAN_CREATE), "write");
    }

    #[test]
    fn delete_is_delete() {
        assert_eq!(_mask_to_action(FAN_DELETE), "delete");
    }

    #[test]
    fn delete_self_is_delete() {
        assert_eq!(_mask_to_action(FAN_DELETE_SELF), "delete");
    }

    #[test]
    fn moved_from_is_rename() {
        assert_eq!(_mask_to_action(FAN_MOVED_FROM), "rename");
    }

    #[test]
    fn moved_to_is_rename() {
        assert_eq!(_mask_to_action(FAN_MOVED_TO), "rename");
    }

    #[test]
    fn access_is_read() {
        assert_eq!(_mask_to_action(FAN_ACCESS), "read");
    }

    #[test]
    fn delete_takes_precedence_over_write() {
        assert_eq!(_mask_to_action(FAN_DELETE | FAN_MODIFY), "delete");
    }

    #[test]
    fn rename_takes_precedence_over_write() {
        assert_eq!(_mask_to_action(FAN_MOVED_TO | FAN_MODIFY), "rename");
    }

    #[test]
    fn event_metadata_size_is_24_bytes() {
        assert_eq!(_FANOTIFY_EVENT_SIZE, 24);
    }

    #[test]
    fn mask_combinations_are_independent_bits() {
        let combined = FAN_CREATE | FAN_MODIFY | FAN_CLOSE_WRITE;
        assert_ne!(combined & FAN_CREATE, 0);
        assert_ne!(combined & FAN_MODIFY, 0);
        assert_ne!(combined & FAN_CLOSE_WRITE, 0);
        assert_eq!(combined & FAN_DELETE, 0);
    }
}
