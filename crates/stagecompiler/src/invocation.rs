use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::PathBuf;

use crate::options::{BuildFlag, OutputFormat, Transform};
use crate::Stage;

/// Parameters shared by every stage of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationOptions {
    pub source: PathBuf,
    pub format: OutputFormat,
    pub transform: Transform,
    pub entry_point: Option<String>,
    /// Extra `-D` defines appended after the stage macro.
    pub defines: Vec<String>,
    pub build_flags: BTreeMap<BuildFlag, bool>,
}

impl InvocationOptions {
    pub fn new(source: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            format: OutputFormat::default(),
            transform: Transform::default(),
            entry_point: None,
            defines: Vec::new(),
            build_flags: BTreeMap::new(),
        }
    }
}

/// Ordered compiler arguments for a single stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationSpec {
    stage: Stage,
    args: Vec<OsString>,
}

impl InvocationSpec {
    pub fn new(stage: Stage, options: &InvocationOptions) -> Self {
        let mut args: Vec<OsString> = vec![
            "-P".into(),
            format!("-D{}", stage.macro_define()).into(),
        ];
        args.extend(options.defines.iter().map(|define| format!("-D{define}").into()));
        args.push("-f".into());
        args.push(options.format.as_str().into());
        args.push("-s".into());
        args.push(stage.flag().into());
        args.push("-x".into());
        args.push(options.transform.as_str().into());
        if let Some(entry) = &options.entry_point {
            args.push("-e".into());
            args.push(entry.into());
        }
        args.extend(
            options
                .build_flags
                .iter()
                .map(|(flag, enabled)| flag.to_arg(*enabled).into()),
        );
        args.push(options.source.clone().into_os_string());

        Self { stage, args }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn args(&self) -> &[OsString] {
        &self.args
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rendered(spec: &InvocationSpec) -> Vec<String> {
        spec.args()
            .iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn default_vertex_arguments() {
        let options = InvocationOptions::new("html5-shader.hlsl");
        let spec = InvocationSpec::new(Stage::Vertex, &options);
        assert_eq!(spec.stage(), Stage::Vertex);
        assert_eq!(
            rendered(&spec),
            [
                "-P",
                "-DVS=1",
                "-f",
                "glsl_es_100",
                "-s",
                "vertex",
                "-x",
                "jsstr",
                "html5-shader.hlsl"
            ]
        );
    }

    #[test]
    fn default_pixel_arguments() {
        let options = InvocationOptions::new("html5-shader.hlsl");
        let spec = InvocationSpec::new(Stage::Pixel, &options);
        assert_eq!(
            rendered(&spec),
            [
                "-P",
                "-DPS=1",
                "-f",
                "glsl_es_100",
                "-s",
                "pixel",
                "-x",
                "jsstr",
                "html5-shader.hlsl"
            ]
        );
    }

    #[test]
    fn optional_arguments_keep_source_last() {
        let mut options = InvocationOptions::new("shaders/demo.hlsl");
        options.format = OutputFormat::Glsl140;
        options.transform = Transform::CStr;
        options.entry_point = Some("mainPS".into());
        options.defines = vec!["USE_FOG=1".into()];
        options.build_flags.insert(BuildFlag::GlslRenameSamplers, false);
        options.build_flags.insert(BuildFlag::SpecifyRegisters, true);

        let spec = InvocationSpec::new(Stage::Pixel, &options);
        assert_eq!(
            rendered(&spec),
            [
                "-P",
                "-DPS=1",
                "-DUSE_FOG=1",
                "-f",
                "glsl_140",
                "-s",
                "pixel",
                "-x",
                "cstr",
                "-e",
                "mainPS",
                "-fspecify-registers",
                "-fno-glsl-rename-samplers",
                "shaders/demo.hlsl"
            ]
        );
    }
}
