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

use std::fmt;

use ninja_metrics::scoped_metric;

use super::{Env, ExprError};

/// Where a string ends when it is compiled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Ends at the first unescaped space, tab or line break.
    Path,
    /// Ends at the first unescaped line break. Other whitespace is literal.
    Text,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Variable(String),
}

/// A compiled string. Evaluating it never fails; undefined variables expand to nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Expression {
    segments: Vec<Segment>,
}

fn is_simple_var_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'-'
}

fn is_braced_var_char(b: u8) -> bool {
    is_simple_var_char(b) || b == b'.'
}

struct Compiler<'a> {
    input: &'a str,
    data: &'a [u8],
    mode: Mode,
    offset: usize,
    run_start: usize,
    segments: Vec<Segment>,
}

impl<'a> Compiler<'a> {
    fn new(input: &'a str, mode: Mode) -> Compiler<'a> {
        Compiler {
            input,
            data: input.as_bytes(),
            mode,
            offset: 0,
            run_start: 0,
            segments: Vec::new(),
        }
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.data.get(offset).copied()
    }

    fn push_literal(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        if let Some(Segment::Literal(last)) = self.segments.last_mut() {
            last.push_str(text);
        } else {
            self.segments.push(Segment::Literal(text.to_owned()));
        }
    }

    // Everything between run_start and offset is plain text.
    fn flush_run(&mut self) {
        let input = self.input;
        self.push_literal(&input[self.run_start..self.offset]);
        self.run_start = self.offset;
    }

    fn skip_to(&mut self, offset: usize) {
        self.offset = offset;
        self.run_start = offset;
    }

    fn skip_indent(&mut self) {
        let mut end = self.offset;
        while self.peek_at(end) == Some(b' ') {
            end += 1;
        }
        self.skip_to(end);
    }

    fn read_identifier(&self, start: usize, accept: fn(u8) -> bool) -> usize {
        let mut end = start;
        while self.peek_at(end).map_or(false, accept) {
            end += 1;
        }
        end
    }

    fn read_escape(&mut self) -> Result<(), ExprError> {
        let dollar = self.offset;
        match self.peek_at(dollar + 1) {
            Some(b'$') => {
                self.push_literal("$");
                self.skip_to(dollar + 2);
            }
            Some(b' ') | Some(b'\t') => {
                self.push_literal(" ");
                self.skip_to(dollar + 2);
            }
            Some(b':') => {
                self.push_literal(":");
                self.skip_to(dollar + 2);
            }
            Some(b'\n') => {
                self.skip_to(dollar + 2);
                self.skip_indent();
            }
            Some(b'\r') => {
                if self.peek_at(dollar + 2) != Some(b'\n') {
                    return Err(ExprError::BadEscape(dollar));
                }
                self.skip_to(dollar + 3);
                self.skip_indent();
            }
            Some(b'{') => {
                let start = dollar + 2;
                let end = self.read_identifier(start, is_braced_var_char);
                if end == start {
                    return Err(if end >= self.data.len() {
                        ExprError::MissingBrace(dollar)
                    } else {
                        ExprError::BadEscape(dollar)
                    });
                }
                if self.peek_at(end) != Some(b'}') {
                    return Err(ExprError::MissingBrace(dollar));
                }
                self.segments
                    .push(Segment::Variable(self.input[start..end].to_owned()));
                self.skip_to(end + 1);
            }
            Some(b) if is_simple_var_char(b) => {
                let start = dollar + 1;
                let end = self.read_identifier(start, is_simple_var_char);
                self.segments
                    .push(Segment::Variable(self.input[start..end].to_owned()));
                self.skip_to(end);
            }
            _ => return Err(ExprError::BadEscape(dollar)),
        }
        Ok(())
    }

    // Returns how many bytes of input belong to the string.
    fn compile(&mut self) -> Result<usize, ExprError> {
        while let Some(b) = self.peek_at(self.offset) {
            match b {
                b'$' => {
                    self.flush_run();
                    self.read_escape()?;
                }
                b'\n' => {
                    self.flush_run();
                    return Ok(match self.mode {
                        Mode::Path => self.offset,
                        Mode::Text => self.offset + 1,
                    });
                }
                b'\r' => {
                    if self.peek_at(self.offset + 1) != Some(b'\n') {
                        return Err(ExprError::BareCarriageReturn(self.offset));
                    }
                    self.flush_run();
                    return Ok(match self.mode {
                        Mode::Path => self.offset,
                        Mode::Text => self.offset + 2,
                    });
                }
                b' ' | b'\t' if self.mode == Mode::Path => {
                    self.flush_run();
                    return Ok(self.offset);
                }
                _ => self.offset += 1,
            }
        }
        self.flush_run();
        Ok(self.offset)
    }
}

impl Expression {
    /// Compiles the leading string of `input` in `mode`.
    ///
    /// Returns the expression and the number of bytes it covers. In path mode the terminating
    /// whitespace is not consumed; in text mode the terminating line break is.
    pub fn parse(input: &str, mode: Mode) -> Result<(Expression, usize), ExprError> {
        scoped_metric!("compile expression");
        let mut compiler = Compiler::new(input, mode);
        let consumed = compiler.compile()?;
        Ok((
            Expression {
                segments: compiler.segments,
            },
            consumed,
        ))
    }

    fn parse_whole(input: &str, mode: Mode) -> Result<Expression, ExprError> {
        let (expr, consumed) = Expression::parse(input, mode)?;
        let rest = &input[consumed..];
        if let Some(pos) = rest.find(|c: char| !c.is_ascii_whitespace()) {
            return Err(ExprError::TrailingText(consumed + pos));
        }
        Ok(expr)
    }

    /// Compiles a command-like string. Only whitespace may follow its terminating line break.
    pub fn compile_text(input: &str) -> Result<Expression, ExprError> {
        Expression::parse_whole(input, Mode::Text)
    }

    /// Compiles a single path. Only whitespace may follow it.
    pub fn compile_path(input: &str) -> Result<Expression, ExprError> {
        Expression::parse_whole(input, Mode::Path)
    }

    /// An expression that evaluates to `text` verbatim.
    pub fn literal<S: Into<String>>(text: S) -> Expression {
        let text = text.into();
        let segments = if text.is_empty() {
            vec![]
        } else {
            vec![Segment::Literal(text)]
        };
        Expression { segments }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn evaluate(&self, env: &dyn Env) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Variable(name) => {
                    if let Some(value) = env.lookup_variable(name) {
                        out.push_str(&value);
                    }
                }
            }
        }
        out
    }
}

// Writes the expression back out in source form.
impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => {
                    for c in text.chars() {
                        match c {
                            '$' => f.write_str("$$")?,
                            c => write!(f, "{}", c)?,
                        }
                    }
                }
                Segment::Variable(name) => write!(f, "${{{}}}", name)?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashMap;

    struct MapEnv(HashMap<&'static str, &'static str>);

    impl Env for MapEnv {
        fn lookup_variable(&self, name: &str) -> Option<String> {
            self.0.get(name).map(|v| v.to_string())
        }
    }

    fn env(pairs: &[(&'static str, &'static str)]) -> MapEnv {
        MapEnv(pairs.iter().cloned().collect())
    }

    fn eval_text(input: &str, env: &MapEnv) -> String {
        Expression::compile_text(input)
            .expect("valid expression")
            .evaluate(env)
    }

    #[test]
    fn escapes() {
        let empty = env(&[]);
        let table = &[
            ("$ ", " "),
            ("$$", "$"),
            ("a$\n  b", "ab"),
            ("a$\r\n  b", "ab"),
            ("a$:b", "a:b"),
            ("plain text with spaces", "plain text with spaces"),
            ("tabs\tstay", "tabs\tstay"),
            ("unknown $nothing here", "unknown  here"),
        ];
        for (input, expected) in table {
            assert_eq!(&eval_text(input, &empty), expected, "evaluating {:?}", input);
        }
    }

    #[test]
    fn variables() {
        let e = env(&[("out", "x.o"), ("in", "x.c"), ("a.b", "dotted")]);
        assert_eq!(eval_text("${out}", &e), "x.o");
        assert_eq!(eval_text("cc $in -o $out", &e), "cc x.c -o x.o");
        assert_eq!(eval_text("$in.d", &e), "x.c.d");
        assert_eq!(eval_text("${a.b}", &e), "dotted");
        assert_eq!(eval_text("$out$in", &e), "x.ox.c");
    }

    #[test]
    fn segments_merge_literals() {
        let expr = Expression::compile_text("a$$b$ c$out").unwrap();
        assert_eq!(
            expr.segments(),
            &[
                Segment::Literal("a$b c".to_owned()),
                Segment::Variable("out".to_owned())
            ]
        );
    }

    #[test]
    fn malformed() {
        assert_eq!(
            Expression::compile_text("${out"),
            Err(ExprError::MissingBrace(0))
        );
        assert_eq!(
            Expression::compile_text("x ${out y}"),
            Err(ExprError::MissingBrace(2))
        );
        assert_eq!(Expression::compile_text("${"), Err(ExprError::MissingBrace(0)));
        assert_eq!(Expression::compile_text("${!}"), Err(ExprError::BadEscape(0)));
        assert_eq!(Expression::compile_text("50$%"), Err(ExprError::BadEscape(2)));
        assert_eq!(Expression::compile_text("end$"), Err(ExprError::BadEscape(3)));
        assert_eq!(Expression::compile_text("a$\rb"), Err(ExprError::BadEscape(1)));
        assert_eq!(
            Expression::compile_text("a\rb"),
            Err(ExprError::BareCarriageReturn(1))
        );
    }

    #[test]
    fn text_mode_ends_at_newline() {
        let (expr, consumed) = Expression::parse("echo hi\nnext", Mode::Text).unwrap();
        assert_eq!(consumed, 8);
        assert_eq!(expr.evaluate(&env(&[])), "echo hi");
        assert_eq!(
            Expression::compile_text("echo hi\nnext"),
            Err(ExprError::TrailingText(8))
        );
        assert!(Expression::compile_text("echo hi\n").is_ok());
    }

    #[test]
    fn path_mode_ends_at_whitespace() {
        let (expr, consumed) = Expression::parse("foo$ bar.c baz", Mode::Path).unwrap();
        assert_eq!(consumed, 10);
        assert_eq!(expr.evaluate(&env(&[])), "foo bar.c");

        let (expr, consumed) = Expression::parse("a:b|c\nrest", Mode::Path).unwrap();
        assert_eq!(consumed, 5);
        assert_eq!(expr.evaluate(&env(&[])), "a:b|c");

        assert_eq!(
            Expression::compile_path("two paths"),
            Err(ExprError::TrailingText(4))
        );
        assert!(Expression::compile_path("one.c  ").is_ok());
    }

    #[test]
    fn display_round_trips_source() {
        let expr = Expression::compile_text("cc $$HOME ${in} -o$out").unwrap();
        assert_eq!(expr.to_string(), "cc $$HOME ${in} -o${out}");
        assert_eq!(Expression::compile_text(&expr.to_string()).unwrap(), expr);
    }

    #[test]
    fn literal_is_verbatim() {
        let expr = Expression::literal("$not a var");
        assert_eq!(expr.evaluate(&env(&[("not", "x")])), "$not a var");
        assert!(Expression::literal("").is_empty());
    }

    proptest! {
        #[test]
        fn evaluation_is_deterministic(input in "([a-z ]|\\$\\$|\\$ |\\$[ab]|\\$\\{[ab]\\})*") {
            let e = env(&[("a", "AA"), ("b", "$b")]);
            let expr = Expression::compile_text(&input).unwrap();
            let first = expr.evaluate(&e);
            let second = expr.evaluate(&e);
            prop_assert_eq!(first, second);
        }
    }
}
