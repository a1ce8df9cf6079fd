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

//! Interruption signals.
//!
//! SIGINT, SIGTERM and SIGHUP are blocked on the thread that owns the process set. A signal sent
//! to that thread stays pending and is consumed with `sigwait` after each poll sweep. One that
//! lands on another thread runs the handler, which only records it; the record stays until a
//! wait takes it.

use std::{
    io, mem,
    sync::atomic::{AtomicI32, Ordering},
};

use libc::c_int;

use crate::ExecError;

pub(crate) const TRACKED: [c_int; 3] = [libc::SIGINT, libc::SIGTERM, libc::SIGHUP];

static INTERRUPTED: AtomicI32 = AtomicI32::new(0);

extern "C" fn set_interrupted_flag(signum: c_int) {
    INTERRUPTED.store(signum, Ordering::SeqCst);
}

pub(crate) fn is_tracked(sig: c_int) -> bool {
    TRACKED.contains(&sig)
}

fn tracked_set() -> libc::sigset_t {
    unsafe {
        let mut set: libc::sigset_t = mem::zeroed();
        libc::sigemptyset(&mut set);
        for sig in TRACKED {
            libc::sigaddset(&mut set, sig);
        }
        set
    }
}

/// Installs the handlers and mask on creation and restores the previous ones on drop.
pub(crate) struct SignalGuard {
    old_mask: libc::sigset_t,
    old_actions: [libc::sigaction; 3],
}

impl SignalGuard {
    pub(crate) fn install() -> Result<SignalGuard, ExecError> {
        unsafe {
            let set = tracked_set();
            let mut old_mask: libc::sigset_t = mem::zeroed();
            let rc = libc::pthread_sigmask(libc::SIG_BLOCK, &set, &mut old_mask);
            if rc != 0 {
                return Err(ExecError::Signals(io::Error::from_raw_os_error(rc)));
            }

            let mut action: libc::sigaction = mem::zeroed();
            action.sa_sigaction = set_interrupted_flag as extern "C" fn(c_int) as libc::sighandler_t;
            libc::sigemptyset(&mut action.sa_mask);
            let mut old_actions: [libc::sigaction; 3] = mem::zeroed();
            for (i, sig) in TRACKED.iter().enumerate() {
                if libc::sigaction(*sig, &action, &mut old_actions[i]) != 0 {
                    let err = io::Error::last_os_error();
                    for (j, prev) in TRACKED.iter().enumerate().take(i) {
                        libc::sigaction(*prev, &old_actions[j], std::ptr::null_mut());
                    }
                    libc::pthread_sigmask(libc::SIG_SETMASK, &old_mask, std::ptr::null_mut());
                    return Err(ExecError::Signals(err));
                }
            }
            Ok(SignalGuard {
                old_mask,
                old_actions,
            })
        }
    }

    /// Consumes a pending tracked signal, or failing that reports one the handler saw.
    pub(crate) fn take_interruption(&self) -> Result<Option<c_int>, ExecError> {
        unsafe {
            let mut pending: libc::sigset_t = mem::zeroed();
            libc::sigemptyset(&mut pending);
            if libc::sigpending(&mut pending) == -1 {
                return Err(ExecError::Signals(io::Error::last_os_error()));
            }
            for sig in TRACKED {
                if libc::sigismember(&pending, sig) == 1 {
                    let mut only: libc::sigset_t = mem::zeroed();
                    libc::sigemptyset(&mut only);
                    libc::sigaddset(&mut only, sig);
                    let mut received: c_int = 0;
                    let rc = libc::sigwait(&only, &mut received);
                    if rc != 0 {
                        return Err(ExecError::Signals(io::Error::from_raw_os_error(rc)));
                    }
                    return Ok(Some(received));
                }
            }
        }
        match INTERRUPTED.swap(0, Ordering::SeqCst) {
            0 => Ok(None),
            sig => Ok(Some(sig)),
        }
    }
}

impl Drop for SignalGuard {
    fn drop(&mut self) {
        unsafe {
            for (i, sig) in TRACKED.iter().enumerate() {
                libc::sigaction(*sig, &self.old_actions[i], std::ptr::null_mut());
            }
            libc::pthread_sigmask(libc::SIG_SETMASK, &self.old_mask, std::ptr::null_mut());
        }
    }
}
