/*
 * Copyright 2020 Nikhil Marathe <nsm.nikhil@gmail.com>
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

use std::{
    fs::File,
    io::{self, Read},
    os::unix::{
        io::{AsRawFd, FromRawFd, RawFd},
        process::CommandExt,
    },
    process::{Child, Command, Stdio},
};

use tracing::{trace, warn};

use crate::{ExecError, ExitStatus};

const SHELL: &str = "/bin/sh";

/// Both ends close on exec; the child gets the write end only through its stdio.
#[cfg(any(target_os = "linux", target_os = "android"))]
fn cloexec_pipe() -> io::Result<(File, File)> {
    let mut fds = [0 as RawFd; 2];
    unsafe {
        if libc::pipe2(fds.as_mut_ptr(), libc::O_CLOEXEC) == -1 {
            return Err(io::Error::last_os_error());
        }
        Ok((File::from_raw_fd(fds[0]), File::from_raw_fd(fds[1])))
    }
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
fn cloexec_pipe() -> io::Result<(File, File)> {
    let mut fds = [0 as RawFd; 2];
    unsafe {
        if libc::pipe(fds.as_mut_ptr()) == -1 {
            return Err(io::Error::last_os_error());
        }
        let read = File::from_raw_fd(fds[0]);
        let write = File::from_raw_fd(fds[1]);
        for fd in fds {
            if libc::fcntl(fd, libc::F_SETFD, libc::FD_CLOEXEC) == -1 {
                return Err(io::Error::last_os_error());
            }
        }
        Ok((read, write))
    }
}

/// A running or finished shell command and the output captured so far.
#[derive(Debug)]
pub struct Subprocess {
    child: Child,
    pipe: Option<File>,
    buf: Vec<u8>,
    console: bool,
}

impl Subprocess {
    /// Starts `command` under `/bin/sh -c`.
    ///
    /// Console commands share the terminal and our process group. Everything else reads
    /// `/dev/null`, writes stdout and stderr into one pipe, and leads its own process group so a
    /// terminal interrupt only reaches us.
    pub(crate) fn start(command: &str, console: bool) -> Result<Subprocess, ExecError> {
        let (read, write) = cloexec_pipe().map_err(ExecError::Pipe)?;
        let mut cmd = Command::new(SHELL);
        cmd.arg("-c").arg(command);
        if console {
            // Keep the write end open in the child so its exit still closes the pipe.
            let fd = write.as_raw_fd();
            unsafe {
                cmd.pre_exec(move || {
                    if libc::fcntl(fd, libc::F_SETFD, 0) == -1 {
                        return Err(io::Error::last_os_error());
                    }
                    Ok(())
                });
            }
        } else {
            let stderr = write.try_clone().map_err(ExecError::Pipe)?;
            cmd.stdin(Stdio::null())
                .stdout(Stdio::from(write.try_clone().map_err(ExecError::Pipe)?))
                .stderr(Stdio::from(stderr))
                .process_group(0);
        }
        let child = cmd.spawn().map_err(|source| ExecError::Spawn {
            command: command.to_owned(),
            source,
        })?;
        // Only the children may hold write ends now, or the pipe never reports EOF.
        drop(cmd);
        drop(write);
        trace!(pid = child.id(), console, "spawned");
        Ok(Subprocess {
            child,
            pipe: Some(read),
            buf: Vec::new(),
            console,
        })
    }

    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    pub fn is_console(&self) -> bool {
        self.console
    }

    pub(crate) fn fd(&self) -> Option<RawFd> {
        self.pipe.as_ref().map(|p| p.as_raw_fd())
    }

    /// The pipe has been closed by the child.
    pub fn done(&self) -> bool {
        self.pipe.is_none()
    }

    pub fn output(&self) -> String {
        String::from_utf8_lossy(&self.buf).into_owned()
    }

    /// Reads what is available. Returns true once the child has closed its end.
    pub(crate) fn on_pipe_ready(&mut self) -> bool {
        let pipe = match self.pipe.as_mut() {
            Some(p) => p,
            None => return true,
        };
        let mut chunk = [0u8; 4096];
        match pipe.read(&mut chunk) {
            Ok(0) => {
                self.pipe = None;
                true
            }
            Ok(n) => {
                self.buf.extend_from_slice(&chunk[..n]);
                false
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => false,
            Err(e) => {
                warn!(pid = self.child.id(), "reading subprocess output: {}", e);
                self.pipe = None;
                true
            }
        }
    }

    pub(crate) fn signal_group(&self, sig: libc::c_int) {
        unsafe {
            libc::kill(-(self.child.id() as libc::pid_t), sig);
        }
    }

    /// Blocks until the child exits.
    pub(crate) fn finish(&mut self) -> Result<ExitStatus, ExecError> {
        self.pipe = None;
        let status = self.child.wait().map_err(|source| ExecError::Wait {
            pid: self.child.id(),
            source,
        })?;
        Ok(status.into())
    }
}
