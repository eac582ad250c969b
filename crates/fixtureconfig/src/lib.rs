use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::de::{self, Deserializer};
use serde::Deserialize;
use stagecompiler::{BuildFlag, InvocationOptions, OutputFormat, Transform};

pub const DEFAULT_COMPILER: &str = "../hlsloptconv";
pub const DEFAULT_SHADER: &str = "html5-shader.hlsl";
pub const DEFAULT_TEMPLATE: &str = "html5-stub.htm";
pub const DEFAULT_OUTPUT: &str = "gen-html5.htm";
pub const DEFAULT_VERTEX_PLACEHOLDER: &str = "VERTEX_SHADER_STRING_POS";
pub const DEFAULT_PIXEL_PLACEHOLDER: &str = "PIXEL_SHADER_STRING_POS";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read configuration at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FixtureConfig {
    pub version: u32,
    #[serde(deserialize_with = "deserialize_duration_opt")]
    pub timeout: Option<Duration>,
    pub compiler: CompilerSection,
    pub paths: PathsSection,
    pub placeholders: PlaceholderSection,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompilerSection {
    pub program: PathBuf,
    /// Command (and leading arguments) the compiler is run through, if any.
    pub launcher: Vec<String>,
    #[serde(deserialize_with = "deserialize_from_str")]
    pub format: OutputFormat,
    #[serde(deserialize_with = "deserialize_from_str")]
    pub transform: Transform,
    pub entry_point: Option<String>,
    pub defines: Vec<String>,
    #[serde(deserialize_with = "deserialize_build_flags")]
    pub build_flags: BTreeMap<BuildFlag, bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PathsSection {
    pub shader: PathBuf,
    pub template: PathBuf,
    pub output: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlaceholderSection {
    pub vertex: String,
    pub pixel: String,
}

impl Default for FixtureConfig {
    fn default() -> Self {
        Self {
            version: 1,
            timeout: None,
            compiler: CompilerSection::default(),
            paths: PathsSection::default(),
            placeholders: PlaceholderSection::default(),
        }
    }
}

impl Default for CompilerSection {
    fn default() -> Self {
        Self {
            program: PathBuf::from(DEFAULT_COMPILER),
            launcher: Vec::new(),
            format: OutputFormat::default(),
            transform: Transform::default(),
            entry_point: None,
            defines: Vec::new(),
            build_flags: BTreeMap::new(),
        }
    }
}

impl Default for PathsSection {
    fn default() -> Self {
        Self {
            shader: PathBuf::from(DEFAULT_SHADER),
            template: PathBuf::from(DEFAULT_TEMPLATE),
            output: PathBuf::from(DEFAULT_OUTPUT),
        }
    }
}

impl Default for PlaceholderSection {
    fn default() -> Self {
        Self {
            vertex: DEFAULT_VERTEX_PLACEHOLDER.to_string(),
            pixel: DEFAULT_PIXEL_PLACEHOLDER.to_string(),
        }
    }
}

fn deserialize_from_str<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: fmt::Display,
{
    let raw = String::deserialize(deserializer)?;
    raw.parse().map_err(de::Error::custom)
}

fn deserialize_build_flags<'de, D>(deserializer: D) -> Result<BTreeMap<BuildFlag, bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = BTreeMap::<String, bool>::deserialize(deserializer)?;
    raw.into_iter()
        .map(|(name, enabled)| {
            name.parse::<BuildFlag>()
                .map(|flag| (flag, enabled))
                .map_err(de::Error::custom)
        })
        .collect()
}

fn deserialize_duration_opt<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    struct Visitor;
    impl<'de> de::Visitor<'de> for Visitor {
        type Value = Option<Duration>;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a duration as number of seconds or human-readable string")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            humantime::parse_duration(v)
                .map(Some)
                .map_err(|err| E::custom(format!("invalid duration '{v}': {err}")))
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Some(Duration::from_secs(v)))
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v < 0 {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Some(Duration::from_secs(v as u64)))
        }

        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if !v.is_finite() || v < 0.0 {
                return Err(E::custom("duration must be a non-negative number of seconds"));
            }
            Ok(Some(Duration::from_secs_f64(v)))
        }
    }

    deserializer.deserialize_any(Visitor)
}

impl FixtureConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: FixtureConfig = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Loads `path` if it exists, otherwise falls back to the built-in defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn invocation_options(&self) -> InvocationOptions {
        InvocationOptions {
            source: self.paths.shader.clone(),
            format: self.compiler.format,
            transform: self.compiler.transform,
            entry_point: self.compiler.entry_point.clone(),
            defines: self.compiler.defines.clone(),
            build_flags: self.compiler.build_flags.clone(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != 1 {
            return Err(ConfigError::Invalid(format!(
                "unsupported config version {}; expected 1",
                self.version
            )));
        }

        if let Some(timeout) = self.timeout {
            if timeout.is_zero() {
                return Err(ConfigError::Invalid(
                    "timeout must be greater than zero".into(),
                ));
            }
        }

        if self.compiler.program.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("compiler program must not be empty".into()));
        }

        if self.compiler.launcher.iter().any(|part| part.is_empty()) {
            return Err(ConfigError::Invalid(
                "compiler launcher must not contain empty entries".into(),
            ));
        }

        if let Some(entry) = &self.compiler.entry_point {
            if entry.trim().is_empty() {
                return Err(ConfigError::Invalid("entry_point must not be empty".into()));
            }
        }

        for define in &self.compiler.defines {
            if define.is_empty() || define.chars().any(char::is_whitespace) {
                return Err(ConfigError::Invalid(format!(
                    "define '{define}' must be non-empty and contain no whitespace"
                )));
            }
        }

        for (label, path) in [
            ("shader", &self.paths.shader),
            ("template", &self.paths.template),
            ("output", &self.paths.output),
        ] {
            if path.as_os_str().is_empty() {
                return Err(ConfigError::Invalid(format!("{label} path must not be empty")));
            }
        }

        self.placeholders.validate()
    }
}

impl PlaceholderSection {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.vertex.is_empty() || self.pixel.is_empty() {
            return Err(ConfigError::Invalid(
                "placeholder tokens must not be empty".into(),
            ));
        }

        if self.vertex.contains(&self.pixel) || self.pixel.contains(&self.vertex) {
            return Err(ConfigError::Invalid(format!(
                "placeholder tokens '{}' and '{}' must be distinct and must not contain each other",
                self.vertex, self.pixel
            )));
        }

        Ok(())
    }
}
