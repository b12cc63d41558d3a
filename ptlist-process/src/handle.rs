use crate::error::{ProcessError, Result};
use crate::memory::MemoryReader;
use crate::registers::Registers;
use nix::sys::ptrace;
use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::Pid;
use std::fs::File;
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};

/// A process held stopped under ptrace.
///
/// The thread group leader is attached on construction and detached (and
/// thereby resumed) on drop.
#[derive(Debug)]
pub struct ProcessHandle {
    pid: Pid,
    mem: File,
    attached: bool,
}

impl ProcessHandle {
    /// Attach to `pid` and wait until it stops
    pub fn attach(pid: u32) -> Result<Self> {
        let proc_dir = PathBuf::from(format!("/proc/{pid}"));
        if !proc_dir.exists() {
            return Err(ProcessError::ProcessNotFound { pid });
        }
        let mem = File::open(proc_dir.join("mem"))?;
        let nix_pid = Pid::from_raw(pid as i32);
        ptrace::attach(nix_pid).map_err(|source| ProcessError::Attach { pid, source })?;
        tracing::info!("Attached to process {}", pid);

        let mut handle = Self {
            pid: nix_pid,
            mem,
            attached: true,
        };
        handle.wait_for_stop()?;
        Ok(handle)
    }

    fn wait_for_stop(&mut self) -> Result<()> {
        let pid = self.pid();
        match waitpid(self.pid, None) {
            Ok(WaitStatus::Stopped(_, sig)) => {
                tracing::debug!("Process {} stopped with {:?}", pid, sig);
                Ok(())
            }
            Ok(status) => {
                self.attached = false;
                Err(ProcessError::NotStopped {
                    pid,
                    status: format!("{status:?}"),
                })
            }
            Err(source) => Err(ProcessError::Attach { pid, source }),
        }
    }

    pub fn pid(&self) -> u32 {
        self.pid.as_raw() as u32
    }

    /// Path of the executable image (`/proc/<pid>/exe`)
    pub fn exe_link(&self) -> PathBuf {
        Path::new("/proc").join(self.pid().to_string()).join("exe")
    }

    /// Resolved path of the executable as it appears in the mappings
    pub fn exe_path(&self) -> Result<PathBuf> {
        Ok(std::fs::read_link(self.exe_link())?)
    }

    /// Register snapshot of the stopped thread
    #[cfg(target_arch = "x86_64")]
    pub fn registers(&self) -> Result<Registers> {
        let regs = ptrace::getregs(self.pid).map_err(|source| ProcessError::Registers {
            pid: self.pid(),
            source,
        })?;
        Ok(Registers::from_user_regs(&regs))
    }

    #[cfg(not(target_arch = "x86_64"))]
    pub fn registers(&self) -> Result<Registers> {
        Err(ProcessError::UnsupportedArch)
    }
}

impl MemoryReader for ProcessHandle {
    fn read_memory(&self, addr: u64, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.mem
            .read_exact_at(&mut buf, addr)
            .map_err(|source| ProcessError::MemoryRead { addr, len, source })?;
        Ok(buf)
    }
}

impl Drop for ProcessHandle {
    fn drop(&mut self) {
        if !self.attached {
            return;
        }
        match ptrace::detach(self.pid, None) {
            Ok(()) => tracing::info!("Detached from process {}", self.pid()),
            Err(e) => tracing::warn!("Failed to detach from process {}: {}", self.pid(), e),
        }
    }
}
