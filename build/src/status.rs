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

use console::{style, Term};
use ninja_exec::{Completion, ExitStatus};

/// `[finished/total] what`
pub fn progress_line(finished: usize, total: usize, what: &str) -> String {
    format!("[{}/{}] {}", finished, total, what)
}

/// Prints build progress to stderr.
pub struct StatusPrinter {
    term: Term,
    verbose: bool,
    total: usize,
    finished: usize,
}

impl StatusPrinter {
    pub fn new(verbose: bool) -> StatusPrinter {
        StatusPrinter {
            term: Term::stderr(),
            verbose,
            total: 0,
            finished: 0,
        }
    }

    pub fn plan(&mut self, total: usize) {
        self.total = total;
    }

    pub fn finished(&self) -> usize {
        self.finished
    }

    fn what<'a>(&self, description: &'a str, command: &'a str) -> &'a str {
        if self.verbose || description.is_empty() {
            command
        } else {
            description
        }
    }

    pub fn edge_started(&mut self, description: &str, command: &str) {
        let line = progress_line(self.finished, self.total, self.what(description, command));
        let _ = self.term.write_line(&line);
    }

    /// Counts an edge that needed no command.
    pub fn edge_skipped(&mut self) {
        self.finished += 1;
    }

    pub fn edge_finished(&mut self, outputs: &str, command: &str, completion: &Completion) {
        self.finished += 1;
        let out = &completion.output;
        match completion.status {
            ExitStatus::Success => {}
            ExitStatus::Failure => {
                let _ = self.term.write_line(&format!(
                    "{} {}\n{}",
                    style("FAILED:").for_stderr().red().bold(),
                    outputs,
                    command
                ));
            }
            ExitStatus::Interrupted => {
                let _ = self
                    .term
                    .write_line(&format!("{} {}", style("INTERRUPTED:").for_stderr().yellow(), outputs));
            }
        }
        if !out.is_empty() {
            let _ = self.term.write_str(out);
        }
    }

    pub fn build_finished(&mut self) {
        let _ = self.term.flush();
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn progress() {
        assert_eq!(progress_line(2, 10, "CC a.o"), "[2/10] CC a.o");
    }

    #[test]
    fn verbose_prefers_command() {
        let quiet = StatusPrinter::new(false);
        assert_eq!(quiet.what("CC a.o", "cc -c a.c"), "CC a.o");
        assert_eq!(quiet.what("", "cc -c a.c"), "cc -c a.c");
        let verbose = StatusPrinter::new(true);
        assert_eq!(verbose.what("CC a.o", "cc -c a.c"), "cc -c a.c");
    }
}
