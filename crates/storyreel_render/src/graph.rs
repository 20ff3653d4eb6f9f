//! Typed filter-graph nodes and their serialization to `-filter_complex` syntax.
//!
//! Builders assemble [`FilterChain`]s out of [`Filter`]s; nothing outside this
//! module writes filter syntax by hand. User-controlled values (page text, file
//! paths, colours) are carried as [`Value::Text`] and escaped here.
//!
//! ffmpeg unescapes a filter argument twice: once while splitting the graph
//! into filters (`[ ] , ;` are special) and once while splitting the filter's
//! option list (`:` and `=` are special). Text values are escaped for the
//! option level first, and that result is escaped again for the graph level.

use std::fmt;
use storyreel_core::text::escape_for_filter_syntax;

/// A stream label such as `[canvas]` or `[2:v]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Pad(String);

impl Pad {
    pub fn named(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn video_input(index: usize) -> Self {
        Self(format!("{index}:v"))
    }

    pub fn audio_input(index: usize) -> Self {
        Self(format!("{index}:a"))
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Pad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Numbers and option keywords, written verbatim.
    Raw(String),
    /// Untrusted text, escaped for both parsing levels.
    Text(String),
    /// An expression, single-quoted.
    Expr(String),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Raw(s) => f.write_str(s),
            Value::Text(s) => f.write_str(&escape_graph_level(&escape_for_filter_syntax(s))),
            Value::Expr(s) => write!(f, "'{s}'"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Positional(Value),
    Named(&'static str, Value),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    name: &'static str,
    args: Vec<Arg>,
}

impl Filter {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            args: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        self.name
    }

    pub fn arg(mut self, value: impl fmt::Display) -> Self {
        self.args
            .push(Arg::Positional(Value::Raw(value.to_string())));
        self
    }

    pub fn opt(mut self, key: &'static str, value: impl fmt::Display) -> Self {
        self.args.push(Arg::Named(key, Value::Raw(value.to_string())));
        self
    }

    pub fn text(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.args.push(Arg::Named(key, Value::Text(value.into())));
        self
    }

    pub fn expr(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.args.push(Arg::Named(key, Value::Expr(value.into())));
        self
    }

    /// Gate the filter to the half-open window `[start, end)`, in seconds.
    pub fn enable_between(self, start: f64, end: f64) -> Self {
        let expr = format!("gte(t,{})*lt(t,{})", num(start), num(end));
        self.expr("enable", expr)
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)?;
        for (i, arg) in self.args.iter().enumerate() {
            f.write_str(if i == 0 { "=" } else { ":" })?;
            match arg {
                Arg::Positional(v) => write!(f, "{v}")?,
                Arg::Named(k, v) => write!(f, "{k}={v}")?,
            }
        }
        Ok(())
    }
}

/// `[in]...filter,filter...[out]`
#[derive(Debug, Clone, PartialEq)]
pub struct FilterChain {
    pub inputs: Vec<Pad>,
    pub filters: Vec<Filter>,
    pub outputs: Vec<Pad>,
}

impl FilterChain {
    pub fn new(inputs: Vec<Pad>, filters: Vec<Filter>, output: Pad) -> Self {
        Self {
            inputs,
            filters,
            outputs: vec![output],
        }
    }

    /// A source chain with no input pads.
    pub fn source(filters: Vec<Filter>, output: Pad) -> Self {
        Self::new(Vec::new(), filters, output)
    }
}

impl fmt::Display for FilterChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for pad in &self.inputs {
            write!(f, "{pad}")?;
        }
        for (i, filter) in self.filters.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{filter}")?;
        }
        for pad in &self.outputs {
            write!(f, "{pad}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterGraph {
    pub chains: Vec<FilterChain>,
}

impl FilterGraph {
    pub fn push(&mut self, chain: FilterChain) {
        self.chains.push(chain);
    }

    pub fn len(&self) -> usize {
        self.chains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }

    /// Chains containing a filter named `name`.
    pub fn chains_with(&self, name: &str) -> impl Iterator<Item = &FilterChain> + '_ {
        let name = name.to_string();
        self.chains
            .iter()
            .filter(move |c| c.filters.iter().any(|f| f.name() == name))
    }
}

impl fmt::Display for FilterGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, chain) in self.chains.iter().enumerate() {
            if i > 0 {
                f.write_str(";")?;
            }
            write!(f, "{chain}")?;
        }
        Ok(())
    }
}

/// Protect an already option-escaped value from the graph-level split.
fn escape_graph_level(value: &str) -> String {
    let mut out = String::with_capacity(value.len() * 2);
    for ch in value.chars() {
        if matches!(ch, '\\' | '\'' | '[' | ']' | ',' | ';') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// Decimal with at most three places and no trailing zeros.
pub fn num(value: f64) -> String {
    let s = format!("{value:.3}");
    let s = s.trim_end_matches('0').trim_end_matches('.');
    match s {
        "" | "-0" => "0".to_string(),
        other => other.to_string(),
    }
}

/// Whole pixels.
pub fn px(value: f64) -> i64 {
    value.round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_serialization() {
        assert_eq!(Filter::new("null").to_string(), "null");
        assert_eq!(Filter::new("scale").arg(640).arg(360).to_string(), "scale=640:360");
        assert_eq!(
            Filter::new("color").opt("c", "black").opt("s", "1920x1080").to_string(),
            "color=c=black:s=1920x1080"
        );
    }

    /// One pass of ffmpeg's token reader: `\\x` yields `x`, `'...'` is taken
    /// verbatim, and an unescaped, unquoted terminator ends the token.
    fn read_token<'a>(input: &'a str, terminators: &str) -> (String, &'a str) {
        let mut out = String::new();
        let mut chars = input.char_indices();
        while let Some((i, ch)) = chars.next() {
            match ch {
                '\\' => {
                    if let Some((_, next)) = chars.next() {
                        out.push(next);
                    }
                }
                '\'' => {
                    for (_, quoted) in chars.by_ref() {
                        if quoted == '\'' {
                            break;
                        }
                        out.push(quoted);
                    }
                }
                c if terminators.contains(c) => return (out, &input[i..]),
                c => out.push(c),
            }
        }
        (out, "")
    }

    /// Undo both parsing levels for the single option of `filter`.
    fn parsed_option(filter: &Filter) -> (String, String) {
        let rendered = filter.to_string();
        let args = rendered
            .split_once('=')
            .map(|(_, a)| a)
            .unwrap();
        let (args, rest) = read_token(args, "[],;");
        assert!(rest.is_empty(), "graph split early at {rest:?}");
        let (key, after_key) = read_token(&args, "=:");
        let (value, rest) = read_token(&after_key[1..], ":");
        assert!(rest.is_empty(), "option list split early at {rest:?}");
        (key, value)
    }

    #[test]
    fn text_values_are_escaped_for_both_levels() {
        let f = Filter::new("drawtext").text("text", "a\nb's:c,d");
        assert_eq!(f.to_string(), "drawtext=text=a\\\\\nb\\\\\\'s\\\\:c\\\\\\,d");
        assert_eq!(
            parsed_option(&f),
            ("text".to_string(), "a\nb's:c,d".to_string())
        );
    }

    #[test]
    fn every_special_character_survives_both_levels() {
        for text in [
            "Hello\nWorld",
            "it's 50% [done]; a=b, c:d # e",
            "C:\\Users\\me\\bg.png",
            "line one\r\nline two",
        ] {
            let f = Filter::new("drawtext").text("text", text);
            let expected = text.replace("\r\n", "\n");
            assert_eq!(parsed_option(&f).1, expected, "{f}");
        }
    }

    #[test]
    fn enable_window_is_half_open() {
        let f = Filter::new("overlay").opt("x", 0).opt("y", 0).enable_between(4.0, 9.5);
        assert_eq!(f.to_string(), "overlay=x=0:y=0:enable='gte(t,4)*lt(t,9.5)'");
    }

    #[test]
    fn chain_and_graph_serialization() {
        let mut graph = FilterGraph::default();
        graph.push(FilterChain::source(
            vec![Filter::new("anullsrc").opt("r", 48000)],
            Pad::named("aout"),
        ));
        graph.push(FilterChain::new(
            vec![Pad::named("canvas"), Pad::video_input(0)],
            vec![Filter::new("overlay"), Filter::new("format").opt("pix_fmts", "yuv420p")],
            Pad::named("v0"),
        ));
        assert_eq!(
            graph.to_string(),
            "anullsrc=r=48000[aout];[canvas][0:v]overlay,format=pix_fmts=yuv420p[v0]"
        );
        assert_eq!(graph.chains_with("overlay").count(), 1);
    }

    #[test]
    fn number_formatting() {
        assert_eq!(num(4.0), "4");
        assert_eq!(num(2.5), "2.5");
        assert_eq!(num(1.0 / 3.0), "0.333");
        assert_eq!(num(0.0), "0");
        assert_eq!(px(359.6), 360);
    }
}
