use anyhow::{Context, Result};
use minijinja::{Environment, context};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const FILENAME: &str = "promptrace.toml";
const DB_FILENAME: &str = "provenance.db";

pub const DEFAULT_VERBOSE_THRESHOLD: usize = 5;

/// The per-user data directory holding the database and settings file.
/// `PROMPTRACE_HOME` overrides the default `~/.promptrace` (used by tests).
pub fn data_dir() -> Result<PathBuf> {
    if let Some(dir) = env::var_os("PROMPTRACE_HOME") {
        return Ok(PathBuf::from(dir));
    }
    let home = dirs::home_dir().context("cannot determine home directory")?;
    Ok(home.join(".promptrace"))
}

pub fn db_path() -> Result<PathBuf> {
    Ok(data_dir()?.join(DB_FILENAME))
}

pub fn settings_path() -> Result<PathBuf> {
    Ok(data_dir()?.join(FILENAME))
}

/// PR body template: either an inline Jinja2 string or a path to a template
/// file (relative to the data directory).
///
/// In TOML this looks like one of:
///
/// ```toml
/// [pr_template]
/// inline = "{{ provenance }}"
///
/// # — or —
///
/// [pr_template]
/// file = "pr-body.tmpl"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum PrTemplate {
    Inline(String),
    File(String),
}

impl Default for PrTemplate {
    fn default() -> Self {
        PrTemplate::Inline("{{ provenance }}".into())
    }
}

/// User-facing settings stored in `~/.promptrace/promptrace.toml`.
#[derive(Debug, Serialize, Deserialize)]
pub struct Settings {
    /// Up to this many uncommitted prompts the commit block shows every
    /// prompt verbatim; above it the block is condensed.
    #[serde(default = "default_verbose_threshold")]
    pub verbose_threshold: usize,

    /// PR body template (inline or file reference). Rendered with
    /// `provenance`, `repo` and `base` variables.
    #[serde(default)]
    pub pr_template: PrTemplate,
}

fn default_verbose_threshold() -> usize {
    DEFAULT_VERBOSE_THRESHOLD
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            verbose_threshold: default_verbose_threshold(),
            pr_template: PrTemplate::default(),
        }
    }
}

impl Settings {
    /// Load settings from the data directory.
    ///
    /// If the file doesn't exist it is created with defaults. Missing keys
    /// in an existing file are filled in with defaults via serde.
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(FILENAME);
        match fs::read_to_string(&path) {
            Ok(contents) => {
                let settings: Settings = toml::from_str(&contents)
                    .with_context(|| format!("parsing {}", path.display()))?;
                Ok(settings)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                let settings = Settings::default();
                settings.save(dir)?;
                Ok(settings)
            }
            Err(e) => Err(e).with_context(|| format!("reading {}", path.display())),
        }
    }

    pub fn save(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
        let path = dir.join(FILENAME);
        let toml_str = toml::to_string_pretty(self).context("serializing settings")?;
        fs::write(&path, &toml_str).with_context(|| format!("writing {}", path.display()))
    }

    /// Resolve the PR template to a string.
    fn load_pr_template(&self, dir: &Path) -> Result<String> {
        match &self.pr_template {
            PrTemplate::Inline(s) => Ok(s.clone()),
            PrTemplate::File(filename) => {
                let path = dir.join(filename);
                fs::read_to_string(&path)
                    .with_context(|| format!("reading template {}", path.display()))
            }
        }
    }

    /// Render the PR body through the configured template.
    pub fn render_pr_body(
        &self,
        dir: &Path,
        provenance: &str,
        repo: &str,
        base: &str,
    ) -> Result<String> {
        let template = self.load_pr_template(dir)?;
        let env = Environment::new();
        let tmpl = env
            .template_from_str(&template)
            .context("parsing PR body template")?;
        tmpl.render(context! { provenance, repo, base })
            .context("rendering PR body template")
    }
}
