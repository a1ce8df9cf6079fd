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

use std::{collections::VecDeque, io, time::Duration};

use libc::c_int;
use ninja_metrics::scoped_metric;
use tracing::{debug, trace};

use crate::{
    ref_table::RefTable, signals::SignalGuard, subprocess::Subprocess, ExecError, ExitStatus,
};

#[derive(Debug, Clone)]
pub struct ProcessSetConfig {
    /// Descriptors handed to one `poll` call.
    pub poll_batch_size: usize,
    /// How long each batch may block.
    pub poll_timeout: Duration,
}

impl Default for ProcessSetConfig {
    fn default() -> Self {
        ProcessSetConfig {
            poll_batch_size: 8,
            poll_timeout: Duration::from_millis(32),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubprocessHandle(usize);

impl SubprocessHandle {
    pub fn index(self) -> usize {
        self.0
    }
}

/// What a reaped subprocess left behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub status: ExitStatus,
    pub output: String,
}

/// Runs shell commands concurrently on one thread and reports them as they finish.
///
/// Only one thread may own a process set. It blocks SIGINT, SIGTERM and SIGHUP on that thread for
/// its lifetime so that they are noticed between polls instead of killing the build.
pub struct ProcessSet {
    config: ProcessSetConfig,
    table: RefTable<Subprocess>,
    running: Vec<usize>,
    finished: VecDeque<usize>,
    interrupted: c_int,
    signals: SignalGuard,
}

impl ProcessSet {
    pub fn new(config: ProcessSetConfig) -> Result<ProcessSet, ExecError> {
        let signals = SignalGuard::install()?;
        Ok(ProcessSet {
            config,
            table: RefTable::new(),
            running: Vec::new(),
            finished: VecDeque::new(),
            interrupted: 0,
            signals,
        })
    }

    pub fn run(&mut self, command: &str, console: bool) -> Result<SubprocessHandle, ExecError> {
        scoped_metric!("spawn");
        let subprocess = Subprocess::start(command, console)?;
        debug!(pid = subprocess.pid(), command, "started");
        let key = self.table.insert(subprocess);
        self.running.push(key);
        Ok(SubprocessHandle(key))
    }

    pub fn running_count(&self) -> usize {
        self.running.len()
    }

    pub fn finished_count(&self) -> usize {
        self.finished.len()
    }

    /// The signal that interrupted the last wait, if any.
    pub fn interrupted_by(&self) -> Option<c_int> {
        match self.interrupted {
            0 => None,
            sig => Some(sig),
        }
    }

    pub fn get(&self, handle: SubprocessHandle) -> Option<&Subprocess> {
        self.table.get(handle.0)
    }

    /// Blocks until some running subprocess has output or has closed its pipe, or a tracked signal
    /// arrives. Returns `true` when interrupted; nothing is drained in that case.
    pub fn wait_for_readiness(&mut self) -> Result<bool, ExecError> {
        scoped_metric!("wait for readiness");
        self.interrupted = 0;

        let mut fds: Vec<libc::pollfd> = self
            .running
            .iter()
            .filter_map(|&key| self.table.get(key).and_then(Subprocess::fd))
            .map(|fd| libc::pollfd {
                fd,
                events: libc::POLLIN | libc::POLLPRI,
                revents: 0,
            })
            .collect();
        let timeout = c_int::try_from(self.config.poll_timeout.as_millis()).unwrap_or(c_int::MAX);
        let batch = self.config.poll_batch_size.max(1);
        for chunk in fds.chunks_mut(batch) {
            let ret = unsafe { libc::poll(chunk.as_mut_ptr(), chunk.len() as libc::nfds_t, timeout) };
            if ret == -1 {
                let err = io::Error::last_os_error();
                if err.kind() == io::ErrorKind::Interrupted {
                    break;
                }
                return Err(ExecError::Poll(err));
            }
            if ret > 0 {
                break;
            }
        }

        if let Some(sig) = self.signals.take_interruption()? {
            debug!(signal = sig, "interrupted");
            self.interrupted = sig;
            return Ok(true);
        }

        // Pipes were collected in `running` order and every running subprocess has one.
        let mut still_running = Vec::with_capacity(self.running.len());
        for (key, pfd) in self.running.iter().zip(fds.iter()) {
            if pfd.revents != 0 {
                if let Some(sub) = self.table.get_mut(*key) {
                    if sub.on_pipe_ready() {
                        trace!(pid = sub.pid(), "output closed");
                        self.finished.push_back(*key);
                        continue;
                    }
                }
            }
            still_running.push(*key);
        }
        self.running = still_running;
        Ok(false)
    }

    /// The oldest subprocess whose output has closed and that has not been finished yet.
    pub fn next_finished(&mut self) -> Option<SubprocessHandle> {
        self.finished.pop_front().map(SubprocessHandle)
    }

    /// Reaps the subprocess, classifying how it exited. The handle is invalid afterwards.
    ///
    /// Blocks until the process exits, so call it on handles from [`next_finished`].
    ///
    /// [`next_finished`]: ProcessSet::next_finished
    pub fn finish(&mut self, handle: SubprocessHandle) -> Result<Completion, ExecError> {
        let mut sub = self
            .table
            .remove(handle.0)
            .ok_or(ExecError::UnknownHandle(handle.0))?;
        self.running.retain(|k| *k != handle.0);
        self.finished.retain(|k| *k != handle.0);
        let status = sub.finish()?;
        trace!(pid = sub.pid(), ?status, "reaped");
        Ok(Completion {
            status,
            output: sub.output(),
        })
    }

    /// Stops everything still running. Background process groups get the signal that
    /// interrupted us, or SIGTERM when nothing did. Console children already got it from the
    /// terminal.
    pub fn clear(&mut self) {
        let sig = match self.interrupted {
            0 => libc::SIGTERM,
            sig => sig,
        };
        for key in &self.running {
            if let Some(sub) = self.table.get(*key) {
                if !sub.is_console() {
                    sub.signal_group(sig);
                }
            }
        }
        for key in std::mem::take(&mut self.running) {
            if let Some(mut sub) = self.table.remove(key) {
                if let Err(e) = sub.finish() {
                    debug!("while clearing: {}", e);
                }
            }
        }
    }
}

impl Drop for ProcessSet {
    fn drop(&mut self) {
        self.clear();
        for key in std::mem::take(&mut self.finished) {
            if let Some(mut sub) = self.table.remove(key) {
                let _ = sub.finish();
            }
        }
    }
}
