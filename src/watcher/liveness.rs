//! Liveness probe for the supervised process.

use sysinfo::{Pid, ProcessRefreshKind, System};

use super::error::WatchError;

/// Verify that `pid` refers to a running process.
///
/// Advisory by nature: the process can die the instant after the check. The
/// engine runs this once as a startup gate, before any subscription work.
/// The probe has no side effects on the target process.
pub fn ensure_alive(pid: u32) -> Result<(), WatchError> {
    let target = Pid::from_u32(pid);
    let mut sys = System::new();
    sys.refresh_processes_specifics(
        sysinfo::ProcessesToUpdate::Some(&[target]),
        true,
        ProcessRefreshKind::nothing(),
    );

    if sys.process(target).is_some() {
        Ok(())
    } else {
        Err(WatchError::ProcessNotFound { pid })
    }
}
