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

use ninja_exec::ProcessSetConfig;

use crate::BuildError;

pub const PARALLELISM_ENV: &str = "NINJA_PARALLELISM";

#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Commands running at once.
    pub parallelism: usize,
    /// Stop starting new commands after this many failures. 0 never stops.
    pub failures_allowed: usize,
    /// Pretend every dirty command succeeded without running it.
    pub dry_run: bool,
    /// Print full commands instead of descriptions.
    pub verbose: bool,
    pub process: ProcessSetConfig,
}

impl Default for BuildConfig {
    fn default() -> Self {
        BuildConfig {
            parallelism: num_cpus::get(),
            failures_allowed: 1,
            dry_run: false,
            verbose: false,
            process: ProcessSetConfig::default(),
        }
    }
}

impl BuildConfig {
    pub fn from_env() -> Result<BuildConfig, BuildError> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Defaults overridden by whatever `var` returns.
    pub fn from_vars<F>(var: F) -> Result<BuildConfig, BuildError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = BuildConfig::default();
        if let Some(value) = var(PARALLELISM_ENV) {
            config.parallelism = match value.trim().parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(BuildError::InvalidEnv {
                        name: PARALLELISM_ENV,
                        value,
                    })
                }
            };
        }
        Ok(config)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parallelism_from_vars() {
        let config = BuildConfig::from_vars(|_| None).unwrap();
        assert_eq!(config.parallelism, num_cpus::get());
        assert_eq!(config.failures_allowed, 1);

        let config = BuildConfig::from_vars(|n| (n == PARALLELISM_ENV).then(|| " 3".to_owned())).unwrap();
        assert_eq!(config.parallelism, 3);

        for bad in ["0", "-1", "many"] {
            let err = BuildConfig::from_vars(|_| Some(bad.to_owned())).unwrap_err();
            assert!(matches!(err, BuildError::InvalidEnv { ref value, .. } if value == bad));
        }
    }
}
