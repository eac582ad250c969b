use std::fmt;
use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} '{value}'; expected one of {expected}")]
pub struct ParseOptionError {
    pub kind: &'static str,
    pub value: String,
    pub expected: &'static str,
}

/// Target language profile (`-f`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    HlslSm3,
    HlslSm4,
    Glsl140,
    #[default]
    GlslEs100,
}

impl OutputFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::HlslSm3 => "hlsl_sm3",
            Self::HlslSm4 => "hlsl_sm4",
            Self::Glsl140 => "glsl_140",
            Self::GlslEs100 => "glsl_es_100",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = ParseOptionError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "hlsl_sm3" => Ok(Self::HlslSm3),
            "hlsl_sm4" => Ok(Self::HlslSm4),
            "glsl_140" => Ok(Self::Glsl140),
            "glsl_es_100" => Ok(Self::GlslEs100),
            _ => Err(ParseOptionError {
                kind: "output format",
                value: value.to_string(),
                expected: "hlsl_sm3, hlsl_sm4, glsl_140, glsl_es_100",
            }),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Post-processing applied to the generated code (`-x`).
///
/// `JsStr` emits a JavaScript string literal whose lines are joined with `+`,
/// which is what lets the page template embed the output verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Transform {
    CStr,
    #[default]
    JsStr,
}

impl Transform {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CStr => "cstr",
            Self::JsStr => "jsstr",
        }
    }
}

impl FromStr for Transform {
    type Err = ParseOptionError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "cstr" => Ok(Self::CStr),
            "jsstr" => Ok(Self::JsStr),
            _ => Err(ParseOptionError {
                kind: "transform",
                value: value.to_string(),
                expected: "cstr, jsstr",
            }),
        }
    }
}

impl fmt::Display for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BuildFlag {
    SpecifyRegisters,
    Hlsl3BufferSlots,
    GlslRenamePsOutput,
    GlslRenameSamplers,
    GlslRenameCbuffers,
}

impl BuildFlag {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SpecifyRegisters => "specify-registers",
            Self::Hlsl3BufferSlots => "hlsl3-buffer-slots",
            Self::GlslRenamePsOutput => "glsl-rename-psoutput",
            Self::GlslRenameSamplers => "glsl-rename-samplers",
            Self::GlslRenameCbuffers => "glsl-rename-cbuffers",
        }
    }

    /// Renders the flag as `-f<name>` or `-fno-<name>`.
    pub fn to_arg(self, enabled: bool) -> String {
        if enabled {
            format!("-f{}", self.as_str())
        } else {
            format!("-fno-{}", self.as_str())
        }
    }
}

impl FromStr for BuildFlag {
    type Err = ParseOptionError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "specify-registers" => Ok(Self::SpecifyRegisters),
            "hlsl3-buffer-slots" => Ok(Self::Hlsl3BufferSlots),
            "glsl-rename-psoutput" => Ok(Self::GlslRenamePsOutput),
            "glsl-rename-samplers" => Ok(Self::GlslRenameSamplers),
            "glsl-rename-cbuffers" => Ok(Self::GlslRenameCbuffers),
            _ => Err(ParseOptionError {
                kind: "build flag",
                value: value.to_string(),
                expected: "specify-registers, hlsl3-buffer-slots, glsl-rename-psoutput, \
                           glsl-rename-samplers, glsl-rename-cbuffers",
            }),
        }
    }
}

impl fmt::Display for BuildFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
