use std::path::{Path, PathBuf};
use storyreel_core::timing::format_seconds;
use storyreel_core::types::TimeUs;

/// One `-i` input and the options that precede it.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaInput {
    pub index: usize,
    pub options: Vec<String>,
    pub source: String,
}

/// An ffmpeg invocation under construction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EncodeCommand {
    inputs: Vec<MediaInput>,
    filter_graph: Option<String>,
    output_args: Vec<String>,
    duration: Option<TimeUs>,
}

impl EncodeCommand {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an input file; returns its input index.
    pub fn add_input(&mut self, path: &Path, options: &[&str]) -> usize {
        self.push_input(options, path.to_string_lossy().into_owned())
    }

    /// Append a lavfi source such as `color=c=black:s=2x2`; returns its input index.
    pub fn add_lavfi(&mut self, source: &str) -> usize {
        self.push_input(&["-f", "lavfi"], source.to_string())
    }

    fn push_input(&mut self, options: &[&str], source: String) -> usize {
        let index = self.inputs.len();
        self.inputs.push(MediaInput {
            index,
            options: options.iter().map(|s| s.to_string()).collect(),
            source,
        });
        index
    }

    pub fn inputs(&self) -> &[MediaInput] {
        &self.inputs
    }

    pub fn set_filter_graph(&mut self, graph: impl Into<String>) {
        self.filter_graph = Some(graph.into());
    }

    pub fn filter_graph(&self) -> Option<&str> {
        self.filter_graph.as_deref()
    }

    pub fn output_arg(&mut self, arg: impl Into<String>) -> &mut Self {
        self.output_args.push(arg.into());
        self
    }

    pub fn output_args(&self) -> &[String] {
        &self.output_args
    }

    /// Bound the output to `duration`.
    pub fn limit_duration(&mut self, duration: TimeUs) {
        self.duration = Some(duration);
    }

    /// Full argument vector writing to `output`, with machine-readable
    /// progress on stdout.
    pub fn args(&self, output: &Path) -> Vec<String> {
        let mut args = vec![
            "-y".to_string(),
            "-hide_banner".to_string(),
            "-nostdin".to_string(),
            "-progress".to_string(),
            "pipe:1".to_string(),
            "-nostats".to_string(),
        ];

        for input in &self.inputs {
            args.extend(input.options.iter().cloned());
            args.push("-i".to_string());
            args.push(input.source.clone());
        }

        if let Some(graph) = &self.filter_graph {
            args.push("-filter_complex".to_string());
            args.push(graph.clone());
        }

        args.extend(self.output_args.iter().cloned());

        if let Some(duration) = self.duration {
            args.push("-t".to_string());
            args.push(format_seconds(duration));
        }

        args.push(PathBuf::from(output).to_string_lossy().into_owned());
        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_order() {
        let mut cmd = EncodeCommand::new();
        assert_eq!(cmd.add_input(Path::new("/m/p1.png"), &["-loop", "1"]), 0);
        assert_eq!(cmd.add_input(Path::new("/m/p1.mp3"), &[]), 1);
        cmd.set_filter_graph("[0:v]null[v]");
        cmd.output_arg("-map").output_arg("[v]");
        cmd.limit_duration(TimeUs::from_seconds(9.0));

        let args = cmd.args(Path::new("/out/v.mp4"));
        let joined = args.join(" ");
        assert!(joined.starts_with("-y -hide_banner -nostdin -progress pipe:1 -nostats"));
        assert!(joined.contains("-loop 1 -i /m/p1.png -i /m/p1.mp3 -filter_complex [0:v]null[v]"));
        assert!(joined.ends_with("-map [v] -t 9 /out/v.mp4"));
    }

    #[test]
    fn lavfi_input() {
        let mut cmd = EncodeCommand::new();
        let idx = cmd.add_lavfi("color=c=black:s=2x2:r=1:d=1");
        assert_eq!(idx, 0);
        assert_eq!(cmd.inputs()[0].options, vec!["-f", "lavfi"]);
    }
}
