use std::fs;
use std::path::{Path, PathBuf};

use stagecompiler::Stage;

use crate::{AssembleError, Placeholders};

/// Page template text, held unmodified.
#[derive(Debug, Clone)]
pub struct Template {
    path: PathBuf,
    text: String,
}

impl Template {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, AssembleError> {
        let path = path.as_ref().to_path_buf();
        let text = fs::read_to_string(&path).map_err(|source| AssembleError::Read {
            path: path.clone(),
            source,
        })?;
        Ok(Self { path, text })
    }

    pub fn from_text(path: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            text: text.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn occurrences(&self, token: &str) -> usize {
        if token.is_empty() {
            return 0;
        }
        self.text.matches(token).count()
    }

    /// Fails on the first stage whose token never appears in the template.
    pub fn check_placeholders(&self, placeholders: &Placeholders) -> Result<(), AssembleError> {
        for stage in Stage::ALL {
            let token = placeholders.token(stage);
            if self.occurrences(token) == 0 {
                return Err(AssembleError::MissingPlaceholder {
                    path: self.path.clone(),
                    stage,
                    token: token.to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn render(&self, placeholders: &Placeholders, vertex: &str, pixel: &str) -> String {
        substitute(
            &self.text,
            &[
                (placeholders.token(Stage::Vertex), vertex),
                (placeholders.token(Stage::Pixel), pixel),
            ],
        )
    }
}

/// Replaces every occurrence of each token in one left-to-right pass.
///
/// Inserted text is never rescanned, so the result does not depend on the
/// order of `replacements` even when a value contains another token. This
/// differs from chaining `str::replace` once per token, where a vertex output
/// that mentions the pixel token would have it replaced by the second pass;
/// here that token is kept verbatim.
pub fn substitute(template: &str, replacements: &[(&str, &str)]) -> String {
    let mut output = String::with_capacity(template.len());
    let mut rest = template;

    loop {
        let next = replacements
            .iter()
            .filter(|(token, _)| !token.is_empty())
            .filter_map(|&(token, value)| rest.find(token).map(|index| (index, token, value)))
            .min_by_key(|(index, _, _)| *index);

        match next {
            Some((index, token, value)) => {
                output.push_str(&rest[..index]);
                output.push_str(value);
                rest = &rest[index + token.len()..];
            }
            None => {
                output.push_str(rest);
                return output;
            }
        }
    }
}
