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

use std::{fs, io, path::Path, time::SystemTime};

use crate::interface::DiskInterface;

/// The real filesystem, relative to the current directory.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemDiskInterface;

impl DiskInterface for SystemDiskInterface {
    fn mtime(&self, path: &str) -> io::Result<Option<SystemTime>> {
        match fs::metadata(path) {
            Ok(meta) => Ok(Some(meta.modified()?)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn make_dirs(&self, path: &str) -> io::Result<()> {
        if path.is_empty() || Path::new(path).is_dir() {
            return Ok(());
        }
        fs::create_dir_all(path)
    }

    fn remove_file(&self, path: &str) -> io::Result<bool> {
        match fs::remove_file(path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn missing_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope");
        let path = path.to_str().unwrap();
        let disk = SystemDiskInterface;
        assert_eq!(disk.mtime(path).unwrap(), None);
        assert!(!disk.exists(path).unwrap());
        assert!(!disk.remove_file(path).unwrap());
    }

    #[test]
    fn dirs_and_files() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a/b/c");
        let nested = nested.to_str().unwrap();
        let disk = SystemDiskInterface;
        disk.make_dirs(nested).unwrap();
        disk.make_dirs(nested).unwrap();

        let file = format!("{}/f.txt", nested);
        fs::write(&file, "x").unwrap();
        assert!(disk.mtime(&file).unwrap().is_some());
        assert!(disk.remove_file(&file).unwrap());
        assert!(!disk.exists(&file).unwrap());
    }
}
