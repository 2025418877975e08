//! Two-stage shader source files.
//!
//! Format:
//! - a line containing `#shader` starts a section; `vertex` or `fragment` on
//!   the same line selects which one
//! - every other line belongs to the most recent section
//! - lines before the first section are dropped
//!
//! Each kept line is re-emitted with a `" \n"` terminator.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use super::api::ShaderStage;

const DIRECTIVE: &str = "#shader";
const LINE_END: &str = " \n";

/// Vertex and fragment source text split out of one file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShaderSource {
    pub vertex: String,
    pub fragment: String,
}

impl ShaderSource {
    /// Reads and splits the file at `path`.
    ///
    /// A file that cannot be opened yields empty sources and a warning; the
    /// program built from them will fail to compile and report why.
    pub fn from_file(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match File::open(path) {
            Ok(file) => Self::from_reader(BufReader::new(file)),
            Err(e) => {
                log::warn!("cannot open shader source {}: {e}; using empty sources", path.display());
                Self::default()
            }
        }
    }

    /// Splits an in-memory source.
    pub fn parse(text: &str) -> Self {
        Self::from_reader(text.as_bytes())
    }

    /// Splits line by line. Bytes that are not UTF-8 are replaced, not
    /// dropped. A read error ends the scan with a warning and keeps what was
    /// read so far.
    pub fn from_reader(mut reader: impl BufRead) -> Self {
        let mut out = Self::default();
        let mut section: Option<ShaderStage> = None;
        let mut buf = Vec::new();

        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) => {
                    log::warn!("shader source read failed: {e}; keeping partial sources");
                    break;
                }
            }

            let line = String::from_utf8_lossy(&buf);
            let line = line.strip_suffix('\n').unwrap_or(&line);
            let line = line.strip_suffix('\r').unwrap_or(line);

            if line.contains(DIRECTIVE) {
                if line.contains("vertex") {
                    section = Some(ShaderStage::Vertex);
                } else if line.contains("fragment") {
                    section = Some(ShaderStage::Fragment);
                }
                continue;
            }

            let Some(stage) = section else { continue };
            let target = out.stage_mut(stage);
            target.push_str(line);
            target.push_str(LINE_END);
        }

        out
    }

    pub fn stage(&self, stage: ShaderStage) -> &str {
        match stage {
            ShaderStage::Vertex => &self.vertex,
            ShaderStage::Fragment => &self.fragment,
        }
    }

    fn stage_mut(&mut self, stage: ShaderStage) -> &mut String {
        match stage {
            ShaderStage::Vertex => &mut self.vertex,
            ShaderStage::Fragment => &mut self.fragment,
        }
    }
}
