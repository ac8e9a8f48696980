// Conditional rules that derive display tags from a song's metadata.
//
// A preset holds one flat rule list per display tag. Each list is grouped
// into blocks: a rule with `AND` logic extends the current block, anything
// else starts a new one. The first block whose rules all hold renders its
// last rule's template; a blank render falls through to the next block.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::{Captures, Regex};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

use crate::descriptor::value_to_string;
use crate::metadata::SongMetadata;
use crate::utils::hjson::parse_document;

#[derive(Debug, Error)]
pub enum PresetError {
    #[error("cannot read preset {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid preset {path}: {reason}")]
    Parse { path: PathBuf, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Operator {
    Is,
    Contains,
    StartsWith,
    EndsWith,
    IsEmpty,
    IsNotEmpty,
    IsLatestVersion,
    IsNotLatestVersion,
    /// Never matches
    Unknown(String),
}

impl Operator {
    pub fn as_str(&self) -> &str {
        match self {
            Operator::Is => "is",
            Operator::Contains => "contains",
            Operator::StartsWith => "starts with",
            Operator::EndsWith => "ends with",
            Operator::IsEmpty => "is empty",
            Operator::IsNotEmpty => "is not empty",
            Operator::IsLatestVersion => "is latest version",
            Operator::IsNotLatestVersion => "is not latest version",
            Operator::Unknown(s) => s,
        }
    }
}

impl Default for Operator {
    fn default() -> Self {
        Operator::Unknown(String::new())
    }
}

impl From<String> for Operator {
    fn from(s: String) -> Self {
        match s.as_str() {
            "is" => Operator::Is,
            "contains" => Operator::Contains,
            "starts with" => Operator::StartsWith,
            "ends with" => Operator::EndsWith,
            "is empty" => Operator::IsEmpty,
            "is not empty" => Operator::IsNotEmpty,
            "is latest version" => Operator::IsLatestVersion,
            "is not latest version" => Operator::IsNotLatestVersion,
            _ => Operator::Unknown(s),
        }
    }
}

impl From<Operator> for String {
    fn from(op: Operator) -> Self {
        op.as_str().to_string()
    }
}

/// How a rule joins the rule before it
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Logic {
    #[default]
    And,
    Or,
}

impl From<String> for Logic {
    fn from(s: String) -> Self {
        if s == "AND" {
            Logic::And
        } else {
            Logic::Or
        }
    }
}

impl From<Logic> for String {
    fn from(logic: Logic) -> Self {
        match logic {
            Logic::And => "AND".to_string(),
            Logic::Or => "OR".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    #[serde(rename = "if_field", default)]
    pub field: String,
    #[serde(rename = "if_operator", default)]
    pub operator: Operator,
    #[serde(rename = "if_value", default, deserialize_with = "scalar_string")]
    pub value: String,
    #[serde(default)]
    pub logic: Logic,
    #[serde(rename = "then_template", default, deserialize_with = "scalar_string")]
    pub template: String,
}

/// Quoteless numbers are valid rule values; read them back as text
fn scalar_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Value::deserialize(deserializer).map(|value| value_to_string(&value))
}

impl Rule {
    pub fn new(field: &str, operator: Operator, value: &str, template: &str) -> Self {
        Self {
            field: field.to_string(),
            operator,
            value: value.to_string(),
            logic: Logic::And,
            template: template.to_string(),
        }
    }

    pub fn or(mut self) -> Self {
        self.logic = Logic::Or;
        self
    }

    pub fn matches(&self, meta: &SongMetadata) -> bool {
        let actual = meta.get(&self.field);
        match &self.operator {
            Operator::Is => actual == self.value,
            Operator::Contains => actual.contains(&self.value),
            Operator::StartsWith => actual.starts_with(&self.value),
            Operator::EndsWith => actual.ends_with(&self.value),
            Operator::IsEmpty => actual.is_empty(),
            Operator::IsNotEmpty => !actual.is_empty(),
            Operator::IsLatestVersion => meta.is_latest(),
            Operator::IsNotLatestVersion => !meta.is_latest(),
            Operator::Unknown(op) => {
                debug!("unknown rule operator {:?}", op);
                false
            }
        }
    }
}

/// Rules grouped into AND-blocks, evaluated in order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleSet {
    blocks: Vec<Vec<Rule>>,
}

impl RuleSet {
    pub fn new(rules: &[Rule]) -> Self {
        let mut blocks: Vec<Vec<Rule>> = Vec::new();
        for (i, rule) in rules.iter().enumerate() {
            if i > 0 && rule.logic == Logic::And {
                if let Some(block) = blocks.last_mut() {
                    block.push(rule.clone());
                    continue;
                }
            }
            blocks.push(vec![rule.clone()]);
        }
        Self { blocks }
    }

    pub fn blocks(&self) -> &[Vec<Rule>] {
        &self.blocks
    }

    /// Render the first matching block with a non-blank result, else ""
    pub fn apply(&self, meta: &SongMetadata) -> String {
        for block in &self.blocks {
            let Some(last) = block.last() else {
                continue;
            };
            if !block.iter().all(|rule| rule.matches(meta)) {
                continue;
            }
            let rendered = render_template(&last.template, meta);
            if !rendered.trim().is_empty() {
                return rendered;
            }
        }
        String::new()
    }
}

/// Substitute every `{field}` with the metadata value for that field
pub fn render_template(template: &str, meta: &SongMetadata) -> String {
    static PLACEHOLDER: OnceLock<Option<Regex>> = OnceLock::new();
    if template.is_empty() {
        return String::new();
    }
    let Some(re) = PLACEHOLDER
        .get_or_init(|| Regex::new(r"\{([^}]+)\}").ok())
        .as_ref()
    else {
        return String::new();
    };
    re.replace_all(template, |caps: &Captures| meta.get(&caps[1]))
        .into_owned()
}

/// Derived display tags; `None` leaves the tag as it is
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisplayTags {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
}

/// Rule lists for the three display tags
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preset {
    #[serde(default)]
    pub title: Vec<Rule>,
    #[serde(default)]
    pub artist: Vec<Rule>,
    #[serde(default)]
    pub album: Vec<Rule>,
}

impl Preset {
    /// Title and artist copied from the descriptor, album untouched
    pub fn standard() -> Self {
        Self {
            title: vec![Rule::new("title", Operator::IsNotEmpty, "", "{title}")],
            artist: vec![Rule::new("artist", Operator::IsNotEmpty, "", "{artist}")],
            album: Vec::new(),
        }
    }

    pub fn parse(text: &str) -> Result<Self, String> {
        let value: Value = parse_document(text).map_err(|e| e.to_string())?;
        serde_json::from_value(value).map_err(|e| e.to_string())
    }

    pub fn load(path: &Path) -> Result<Self, PresetError> {
        let text = fs::read_to_string(path).map_err(|source| PresetError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let preset = Self::parse(&text).map_err(|reason| PresetError::Parse {
            path: path.to_path_buf(),
            reason,
        })?;
        info!("{} loaded", path.display());
        Ok(preset)
    }

    /// Whether any rule compares a song against the rest of the library
    pub fn needs_versions(&self) -> bool {
        [&self.title, &self.artist, &self.album]
            .into_iter()
            .flatten()
            .any(|rule| {
                matches!(
                    rule.operator,
                    Operator::IsLatestVersion | Operator::IsNotLatestVersion
                )
            })
    }

    pub fn derive(&self, meta: &SongMetadata) -> DisplayTags {
        let pick = |rules: &[Rule]| {
            let out = RuleSet::new(rules).apply(meta);
            (!out.is_empty()).then_some(out)
        };
        DisplayTags {
            title: pick(&self.title),
            artist: pick(&self.artist),
            album: pick(&self.album),
        }
    }
}

/// First `*.json` under `dir`, searched recursively
pub fn find_preset(dir: &Path) -> Option<PathBuf> {
    let pattern = format!("{}/**/*.json", glob::Pattern::escape(&dir.to_string_lossy()));
    let mut found: Vec<PathBuf> = glob::glob(&pattern)
        .ok()?
        .filter_map(Result::ok)
        .filter(|p| p.is_file())
        .collect();
    found.sort();
    found.into_iter().next()
}
