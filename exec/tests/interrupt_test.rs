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


// Kept in its own test binary: the handler's record is process-wide, so a concurrent test's wait
// could take it.

use std::{mem, ptr, thread};

use ninja_exec::{ProcessSet, ProcessSetConfig};

#[test]
fn signal_handled_on_another_thread_survives_until_the_next_wait() {
    let mut set = ProcessSet::new(ProcessSetConfig::default()).unwrap();
    let h = set.run("sleep 10", false).unwrap();
    assert!(!set.wait_for_readiness().unwrap());

    // A thread with SIGHUP unblocked runs the handler instead of leaving the signal pending.
    thread::spawn(|| unsafe {
        let mut mask: libc::sigset_t = mem::zeroed();
        libc::sigemptyset(&mut mask);
        libc::sigaddset(&mut mask, libc::SIGHUP);
        libc::pthread_sigmask(libc::SIG_UNBLOCK, &mask, ptr::null_mut());
        libc::raise(libc::SIGHUP);
    })
    .join()
    .unwrap();

    assert!(set.wait_for_readiness().unwrap());
    assert_eq!(set.interrupted_by(), Some(libc::SIGHUP));
    assert!(set.get(h).is_some());
    set.clear();
    assert!(!set.wait_for_readiness().unwrap());
}
