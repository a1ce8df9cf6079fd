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

use std::os::unix::process::ExitStatusExt;

use crate::signals::is_tracked;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    Success,
    Failure,
    /// Killed by SIGINT, SIGTERM or SIGHUP.
    Interrupted,
}

impl ExitStatus {
    pub fn is_success(self) -> bool {
        self == ExitStatus::Success
    }
}

impl From<std::process::ExitStatus> for ExitStatus {
    fn from(status: std::process::ExitStatus) -> Self {
        match (status.code(), status.signal()) {
            (Some(0), _) => ExitStatus::Success,
            (_, Some(sig)) if is_tracked(sig) => ExitStatus::Interrupted,
            _ => ExitStatus::Failure,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn raw(status: i32) -> ExitStatus {
        std::process::ExitStatus::from_raw(status).into()
    }

    #[test]
    fn classify() {
        // Wait status encoding: exit code in the high byte, signal in the low bits.
        assert_eq!(raw(0), ExitStatus::Success);
        assert_eq!(raw(1 << 8), ExitStatus::Failure);
        assert_eq!(raw(libc::SIGINT), ExitStatus::Interrupted);
        assert_eq!(raw(libc::SIGTERM), ExitStatus::Interrupted);
        assert_eq!(raw(libc::SIGHUP), ExitStatus::Interrupted);
        assert_eq!(raw(libc::SIGKILL), ExitStatus::Failure);
        assert_eq!(raw(libc::SIGSEGV), ExitStatus::Failure);
    }
}
