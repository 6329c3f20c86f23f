use crate::config::VocabularySettings;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur while loading a vocabulary list
#[derive(Debug, Error)]
pub enum VocabularyError {
    #[error("failed to read vocabulary file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("vocabulary file {0} contains no entries")]
    Empty(PathBuf),
}

/// A searchable token and the way it is shown to people
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Term {
    pub token: String,
    pub display: String,
}

/// Ordered list of known tokens for one attribute (instruments or genres)
#[derive(Debug, Clone, Default)]
pub struct TermList {
    terms: Vec<Term>,
}

impl TermList {
    /// Build a list from raw lines: trimmed, blanks skipped, first occurrence wins
    pub fn from_tokens<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let terms = tokens
            .into_iter()
            .filter_map(|raw| {
                let token = raw.as_ref().trim();
                if token.is_empty() || !seen.insert(token.to_string()) {
                    return None;
                }
                Some(Term {
                    token: token.to_string(),
                    display: title_case(token),
                })
            })
            .collect();

        Self { terms }
    }

    /// Load a list from a text file with one token per line
    pub fn load(path: &Path) -> Result<Self, VocabularyError> {
        let contents = std::fs::read_to_string(path).map_err(|source| VocabularyError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let list = Self::from_tokens(contents.lines());
        if list.is_empty() {
            return Err(VocabularyError::Empty(path.to_path_buf()));
        }

        tracing::debug!("Loaded {} vocabulary terms from {}", list.len(), path.display());
        Ok(list)
    }

    /// Case-sensitive membership against the stored tokens
    pub fn contains(&self, token: &str) -> bool {
        self.terms.iter().any(|t| t.token == token)
    }

    pub fn display(&self, token: &str) -> Option<&str> {
        self.terms
            .iter()
            .find(|t| t.token == token)
            .map(|t| t.display.as_str())
    }

    pub fn terms(&self) -> &[Term] {
        &self.terms
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

/// The fixed instrument and genre lists offered by the search form
#[derive(Debug, Clone, Default)]
pub struct Vocabulary {
    pub instruments: TermList,
    pub genres: TermList,
}

impl Vocabulary {
    pub fn new(instruments: TermList, genres: TermList) -> Self {
        Self { instruments, genres }
    }

    pub fn load(settings: &VocabularySettings) -> Result<Self, VocabularyError> {
        Ok(Self {
            instruments: TermList::load(Path::new(&settings.instruments_path))?,
            genres: TermList::load(Path::new(&settings.genres_path))?,
        })
    }
}

/// Title-case a token the way the form labels do ("alt metal" -> "Alt Metal")
pub fn title_case(token: &str) -> String {
    let mut out = String::with_capacity(token.len());
    let mut previous_is_letter = false;

    for c in token.chars() {
        if c.is_alphabetic() {
            if previous_is_letter {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            previous_is_letter = true;
        } else {
            out.push(c);
            previous_is_letter = false;
        }
    }

    out
}
