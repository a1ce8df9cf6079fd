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

//! A reference driver on top of the graph and process set.
//!
//! [`Builder`] decides which edges need to run, admits them through their pools, and runs them on a
//! [`ninja_exec::ProcessSet`]. Incremental state and filesystem access go through the
//! [`BuildLog`] and [`DiskInterface`] traits.

mod build_log;
mod builder;
mod clean;
mod config;
mod disk_interface;
mod error;
mod interface;
pub mod logging;
mod status;

pub use build_log::{LogEntry, MemoryBuildLog};
pub use builder::{BuildSummary, Builder};
pub use clean::clean;
pub use config::{BuildConfig, PARALLELISM_ENV};
pub use disk_interface::SystemDiskInterface;
pub use error::BuildError;
pub use interface::{BuildLog, BuildRecord, DiskInterface};
pub use status::{progress_line, StatusPrinter};
