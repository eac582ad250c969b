//! Drives the external HLSL cross-compiler once per pipeline stage and hands
//! back the generated source as normalised text.
//!
//! Types:
//!
//! - `Stage` selects the entry point macro and stage flag for one invocation.
//! - `OutputFormat`, `Transform`, and `BuildFlag` mirror the compiler's `-f`,
//!   `-x`, and `-f<flag>` options.
//! - `InvocationOptions` holds the parameters shared by both stages and
//!   `InvocationSpec` the ordered argument list derived for one stage.
//! - `StageCompiler` is the seam the template assembler depends on;
//!   `ProcessCompiler` implements it by spawning the real tool.
//!
//! Functions:
//!
//! - `normalize_line_endings` folds CRLF into LF so generated pages stay
//!   identical across platforms.
mod invocation;
mod options;
mod process;

pub use invocation::{InvocationOptions, InvocationSpec};
pub use options::{BuildFlag, OutputFormat, ParseOptionError, Transform};
pub use process::{CompileError, ProcessCompiler, StageCompiler};

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Vertex,
    Pixel,
}

impl Stage {
    /// Compilation order used by sequential runs.
    pub const ALL: [Stage; 2] = [Stage::Vertex, Stage::Pixel];

    /// Preprocessor define that enables this stage's entry point in the shared source.
    pub fn macro_define(self) -> &'static str {
        match self {
            Self::Vertex => "VS=1",
            Self::Pixel => "PS=1",
        }
    }

    /// Value passed to the compiler's `-s` option.
    pub fn flag(self) -> &'static str {
        match self {
            Self::Vertex => "vertex",
            Self::Pixel => "pixel",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.flag())
    }
}

pub fn normalize_line_endings(text: &str) -> String {
    text.replace("\r\n", "\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_maps_to_macro_and_flag() {
        assert_eq!(Stage::Vertex.macro_define(), "VS=1");
        assert_eq!(Stage::Vertex.flag(), "vertex");
        assert_eq!(Stage::Pixel.macro_define(), "PS=1");
        assert_eq!(Stage::Pixel.flag(), "pixel");
        assert_eq!(Stage::ALL, [Stage::Vertex, Stage::Pixel]);
    }

    #[test]
    fn folds_crlf_only() {
        assert_eq!(normalize_line_endings("A\r\nB\r\n"), "A\nB\n");
        assert_eq!(normalize_line_endings("lone\rcr\n"), "lone\rcr\n");
        assert_eq!(normalize_line_endings("\r\r\n"), "\r\n");
    }
}
