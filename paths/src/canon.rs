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

//! Lexical path canonicalization. Never touches the disk.
//!
//! `.` components and empty components are dropped, `..` folds into the preceding component when
//! there is one, and separators are normalized to `/`. On Windows `\` is also a separator; which
//! separators were originally backslashes is remembered in a bitmask so the declared spelling can
//! be reproduced in commands.

use super::PathError;

const MAX_SEPARATORS: usize = 64;

/// A canonical path and the bitmask of separators that were spelled `\`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Canonical {
    pub path: String,
    pub slash_bits: u64,
}

pub fn canonicalize_path(path: &str) -> Result<Canonical, PathError> {
    canonicalize_path_with(path, cfg!(windows))
}

pub fn canonicalize_path_with(
    path: &str,
    backslash_is_separator: bool,
) -> Result<Canonical, PathError> {
    if path.is_empty() {
        return Err(PathError::Empty);
    }
    let is_sep = |c: char| c == '/' || (backslash_is_separator && c == '\\');

    let mut chars = path.char_indices();
    let root = match chars.next() {
        Some((_, c)) if is_sep(c) => Some(c),
        _ => None,
    };
    let body = if root.is_some() { &path[1..] } else { path };

    // Each kept component remembers the separator that preceded it.
    let mut kept: Vec<(&str, char)> = Vec::new();
    let mut preceding = '/';
    let mut rest = body;
    loop {
        let (component, next_sep, remainder) = match rest.find(is_sep) {
            Some(i) => {
                let sep = rest[i..].chars().next().unwrap_or('/');
                (&rest[..i], Some(sep), &rest[i + sep.len_utf8()..])
            }
            None => (rest, None, ""),
        };
        match component {
            "" | "." => {}
            ".." => match kept.last() {
                Some((last, _)) if *last != ".." => {
                    kept.pop();
                }
                // Nothing above the root.
                _ if root.is_some() => {}
                _ => kept.push(("..", preceding)),
            },
            other => kept.push((other, preceding)),
        }
        match next_sep {
            Some(sep) => {
                preceding = sep;
                rest = remainder;
            }
            None => break,
        }
    }

    let mut out = String::with_capacity(path.len());
    if let Some(root) = root {
        out.push(root);
    }
    for (i, (component, sep)) in kept.iter().enumerate() {
        if i > 0 {
            out.push(*sep);
        }
        out.push_str(component);
    }
    if out.is_empty() {
        out.push('.');
    }

    let mut slash_bits = 0u64;
    let mut seen = 0usize;
    let mut canonical = String::with_capacity(out.len());
    for c in out.chars() {
        if is_sep(c) {
            if seen == MAX_SEPARATORS {
                return Err(PathError::TooManyComponents(path.to_owned()));
            }
            if c == '\\' {
                slash_bits |= 1 << seen;
            }
            seen += 1;
            canonical.push('/');
        } else {
            canonical.push(c);
        }
    }

    Ok(Canonical {
        path: canonical,
        slash_bits,
    })
}

/// Reverses the separator normalization of a canonical path using its slash bits.
pub fn decanonicalize(path: &str, slash_bits: u64) -> String {
    if slash_bits == 0 {
        return path.to_owned();
    }
    let mut seen = 0;
    path.chars()
        .map(|c| {
            if c != '/' {
                return c;
            }
            let bit = seen;
            seen += 1;
            if bit < MAX_SEPARATORS && slash_bits & (1 << bit) != 0 {
                '\\'
            } else {
                '/'
            }
        })
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use proptest::prelude::*;

    fn canon(p: &str) -> String {
        canonicalize_path_with(p, false).expect("valid path").path
    }

    #[test]
    fn folds_components() {
        let table = &[
            ("foo.h", "foo.h"),
            ("./foo.h", "foo.h"),
            ("./foo/./bar.h", "foo/bar.h"),
            ("./x/foo/../bar.h", "x/bar.h"),
            ("./x/foo/../../bar.h", "bar.h"),
            ("foo//bar", "foo/bar"),
            ("foo//.//..///bar", "bar"),
            ("./x/../foo/../../bar.h", "../bar.h"),
            ("foo/./.", "foo"),
            ("foo/bar/..", "foo"),
            ("foo/.hidden_bar", "foo/.hidden_bar"),
            ("/foo", "/foo"),
            ("//foo", "/foo"),
            ("/..", "/"),
            ("/", "/"),
            ("..", ".."),
            ("../..", "../.."),
            ("./", "."),
            ("foo/..", "."),
            ("out/", "out"),
        ];
        for (input, expected) in table {
            assert_eq!(&canon(input), expected, "canonicalizing {:?}", input);
        }
    }

    #[test]
    fn empty_is_an_error() {
        assert_eq!(canonicalize_path_with("", false), Err(PathError::Empty));
    }

    #[test]
    fn too_many_components() {
        let long = vec!["a"; 70].join("/");
        assert!(matches!(
            canonicalize_path_with(&long, false),
            Err(PathError::TooManyComponents(_))
        ));
    }

    #[test]
    fn backslashes_are_recorded() {
        let c = canonicalize_path_with("a\\b/c\\d", true).unwrap();
        assert_eq!(c.path, "a/b/c/d");
        assert_eq!(c.slash_bits, 0b101);
        assert_eq!(decanonicalize(&c.path, c.slash_bits), "a\\b/c\\d");

        let c = canonicalize_path_with("a\\.\\b", true).unwrap();
        assert_eq!(c.path, "a/b");
        assert_eq!(c.slash_bits, 0b1);
    }

    #[test]
    fn backslash_is_plain_without_separator_mode() {
        let c = canonicalize_path_with("a\\b", false).unwrap();
        assert_eq!(c.path, "a\\b");
        assert_eq!(c.slash_bits, 0);
    }

    proptest! {
        #[test]
        fn canonical_is_fixed_point(path in "[ab./\\\\]{1,24}", backslash in any::<bool>()) {
            let once = canonicalize_path_with(&path, backslash).unwrap();
            let twice = canonicalize_path_with(&once.path, backslash).unwrap();
            prop_assert_eq!(&twice.path, &once.path);
            prop_assert_eq!(twice.slash_bits, 0);
        }
    }
}
