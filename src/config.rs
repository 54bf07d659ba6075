//! Saved defaults and engine options.
//!
//! Defaults are stored as command-line tokens, one or more per line, in a
//! global rc file and an optional local `.tablessrc`. Later sources win.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

/// How input text is interpreted.
#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InputFormat {
    /// Detect table structure from the text.
    #[default]
    Auto,
    /// Never detect structure.
    Plain,
    Csv,
    Tsv,
    /// Whitespace separated fields.
    Matrix,
}

impl InputFormat {
    /// Format implied by a file name suffix.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        if ext.eq_ignore_ascii_case("csv") {
            Some(Self::Csv)
        } else if ext.eq_ignore_ascii_case("tsv") {
            Some(Self::Tsv)
        } else {
            None
        }
    }

    const fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Plain => "plain",
            Self::Csv => "csv",
            Self::Tsv => "tsv",
            Self::Matrix => "matrix",
        }
    }
}

/// Which footer candidate wins for tables with only an outer frame.
#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FooterPolicy {
    /// The first text after the bottom border.
    #[default]
    Bordered,
    /// A row-count summary printed inside the frame.
    Borderless,
}

impl FooterPolicy {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Bordered => "bordered",
            Self::Borderless => "borderless",
        }
    }
}

/// Case handling for searches.
#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CaseMode {
    /// Case sensitive only when the pattern has an upper-case letter.
    #[default]
    Smart,
    Ignore,
    Sensitive,
}

impl CaseMode {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Smart => "smart",
            Self::Ignore => "ignore",
            Self::Sensitive => "sensitive",
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConfigFlags {
    pub watch: bool,
    pub perf: bool,
    pub ignore_file_suffix: bool,
    pub format: Option<InputFormat>,
    pub footer_policy: Option<FooterPolicy>,
    pub case_mode: Option<CaseMode>,
    pub debug_log: Option<PathBuf>,
}

impl ConfigFlags {
    pub fn union(&self, other: &Self) -> Self {
        Self {
            watch: self.watch || other.watch,
            perf: self.perf || other.perf,
            ignore_file_suffix: self.ignore_file_suffix || other.ignore_file_suffix,
            format: other.format.or(self.format),
            footer_policy: other.footer_policy.or(self.footer_policy),
            case_mode: other.case_mode.or(self.case_mode),
            debug_log: other.debug_log.clone().or_else(|| self.debug_log.clone()),
        }
    }

    /// Input format for `path`: explicit setting, then file suffix, then
    /// detection.
    pub fn input_format(&self, path: Option<&Path>) -> InputFormat {
        self.format
            .or_else(|| {
                path.filter(|_| !self.ignore_file_suffix)
                    .and_then(InputFormat::from_path)
            })
            .unwrap_or_default()
    }
}

pub fn global_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        if let Some(appdata) = std::env::var_os("APPDATA") {
            return PathBuf::from(appdata).join("tabless").join("config");
        }
    }

    #[cfg(target_os = "macos")]
    {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home)
                .join("Library")
                .join("Application Support")
                .join("tabless")
                .join("config");
        }
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME") {
            return PathBuf::from(xdg).join("tabless").join("config");
        }
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home)
                .join(".config")
                .join("tabless")
                .join("config");
        }
    }

    PathBuf::from(".tablessrc")
}

pub fn local_override_path() -> PathBuf {
    PathBuf::from(".tablessrc")
}

pub fn load_config_flags(path: &Path) -> Result<ConfigFlags> {
    if !path.exists() {
        return Ok(ConfigFlags::default());
    }
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    let tokens = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .flat_map(|line| line.split_whitespace().map(ToOwned::to_owned))
        .collect::<Vec<_>>();
    Ok(parse_flag_tokens(&tokens))
}

pub fn save_config_flags(path: &Path, flags: &ConfigFlags) -> Result<()> {
    let mut lines = vec!["# tabless defaults (saved with --save)".to_string()];
    if flags.watch {
        lines.push("--watch".to_string());
    }
    if flags.perf {
        lines.push("--perf".to_string());
    }
    if flags.ignore_file_suffix {
        lines.push("--ignore-file-suffix".to_string());
    }
    if let Some(format) = flags.format {
        lines.push(format!("--format {}", format.as_str()));
    }
    if let Some(policy) = flags.footer_policy {
        lines.push(format!("--footer-policy {}", policy.as_str()));
    }
    if let Some(case_mode) = flags.case_mode {
        lines.push(format!("--case {}", case_mode.as_str()));
    }
    if let Some(path) = &flags.debug_log {
        lines.push(format!("--debug-log {}", path.display()));
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config dir {}", parent.display()))?;
    }
    fs::write(path, format!("{}\n", lines.join("\n")))
        .with_context(|| format!("Failed to write config {}", path.display()))
}

pub fn clear_config_flags(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_file(path).with_context(|| format!("Failed to remove {}", path.display()))?;
    }
    Ok(())
}

/// Pick the saved-default flags out of a token list (a command line or the
/// contents of an rc file). Unknown tokens are ignored.
pub fn parse_flag_tokens(tokens: &[String]) -> ConfigFlags {
    let mut flags = ConfigFlags::default();
    let mut i = 0;
    while i < tokens.len() {
        let token = tokens[i].as_str();
        let (name, inline) = match token.split_once('=') {
            Some((name, value)) if name.starts_with("--") => (name, Some(value)),
            _ => (token, None),
        };
        let mut value = || {
            inline.map(ToOwned::to_owned).or_else(|| {
                let next = tokens.get(i + 1).cloned();
                if next.is_some() {
                    i += 1;
                }
                next
            })
        };
        match name {
            "--watch" | "-w" => flags.watch = true,
            "--perf" => flags.perf = true,
            "--ignore-file-suffix" => flags.ignore_file_suffix = true,
            "--format" => flags.format = value().as_deref().and_then(parse_format),
            "--footer-policy" => {
                flags.footer_policy = value().as_deref().and_then(parse_footer_policy);
            }
            "--case" => flags.case_mode = value().as_deref().and_then(parse_case_mode),
            "--debug-log" => flags.debug_log = value().map(PathBuf::from),
            _ => {}
        }
        i += 1;
    }
    flags
}

fn parse_format(s: &str) -> Option<InputFormat> {
    match s {
        "auto" => Some(InputFormat::Auto),
        "plain" => Some(InputFormat::Plain),
        "csv" => Some(InputFormat::Csv),
        "tsv" => Some(InputFormat::Tsv),
        "matrix" => Some(InputFormat::Matrix),
        _ => None,
    }
}

fn parse_footer_policy(s: &str) -> Option<FooterPolicy> {
    match s {
        "bordered" => Some(FooterPolicy::Bordered),
        "borderless" => Some(FooterPolicy::Borderless),
        _ => None,
    }
}

fn parse_case_mode(s: &str) -> Option<CaseMode> {
    match s {
        "smart" => Some(CaseMode::Smart),
        "ignore" => Some(CaseMode::Ignore),
        "sensitive" => Some(CaseMode::Sensitive),
        _ => None,
    }
}
