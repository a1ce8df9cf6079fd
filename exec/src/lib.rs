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

//! Concurrent subprocess execution for a single-threaded build loop.
//!
//! A [`ProcessSet`] starts shell commands, multiplexes their output pipes with `poll`, and hands
//! back completed commands in the order their output closed. It knows nothing about the build
//! graph; the caller decides what to run next.

#![cfg(unix)]

mod error;
mod process_set;
mod ref_table;
mod signals;
mod status;
mod subprocess;

pub use error::ExecError;
pub use process_set::{Completion, ProcessSet, ProcessSetConfig, SubprocessHandle};
pub use ref_table::RefTable;
pub use status::ExitStatus;
pub use subprocess::Subprocess;
