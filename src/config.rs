use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::markdown::ToMarkdownOptions;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConfigFlags {
    pub watch: bool,
    pub check: bool,
    pub write: bool,
    pub no_html: bool,
    pub width: Option<usize>,
    pub bullet: Option<char>,
    pub emphasis: Option<char>,
    pub strong: Option<char>,
    pub rule: Option<char>,
    pub fence: Option<char>,
}

impl ConfigFlags {
    /// Merge `other` (the command line) over `self` (the file).
    pub fn union(&self, other: &Self) -> Self {
        Self {
            watch: self.watch || other.watch,
            check: self.check || other.check,
            write: self.write || other.write,
            no_html: self.no_html || other.no_html,
            width: other.width.or(self.width),
            bullet: other.bullet.or(self.bullet),
            emphasis: other.emphasis.or(self.emphasis),
            strong: other.strong.or(self.strong),
            rule: other.rule.or(self.rule),
            fence: other.fence.or(self.fence),
        }
    }

    /// Serializer options with every marker flag applied.
    pub fn to_markdown_options(&self) -> ToMarkdownOptions {
        let defaults = ToMarkdownOptions::default();
        ToMarkdownOptions {
            bullet: self.bullet.unwrap_or(defaults.bullet),
            emphasis: self.emphasis.unwrap_or(defaults.emphasis),
            strong: self.strong.unwrap_or(defaults.strong),
            rule: self.rule.unwrap_or(defaults.rule),
            fence: self.fence.unwrap_or(defaults.fence),
            line_width: self.width.or(defaults.line_width),
            ..defaults
        }
    }
}

pub fn global_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        if let Some(appdata) = std::env::var_os("APPDATA") {
            return PathBuf::from(appdata).join("mdsync").join("config");
        }
    }

    #[cfg(target_os = "macos")]
    {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home)
                .join("Library")
                .join("Application Support")
                .join("mdsync")
                .join("config");
        }
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME") {
            return PathBuf::from(xdg).join("mdsync").join("config");
        }
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(".config").join("mdsync").join("config");
        }
    }

    PathBuf::from(".mdsyncrc")
}

pub fn local_override_path() -> PathBuf {
    PathBuf::from(".mdsyncrc")
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
    let mut lines = vec!["# mdsync defaults (saved with --save)".to_string()];
    for (on, flag) in [
        (flags.watch, "--watch"),
        (flags.check, "--check"),
        (flags.write, "--write"),
        (flags.no_html, "--no-html"),
    ] {
        if on {
            lines.push(flag.to_string());
        }
    }
    if let Some(width) = flags.width {
        lines.push(format!("--width {width}"));
    }
    for (value, flag) in [
        (flags.bullet, "--bullet"),
        (flags.emphasis, "--emphasis"),
        (flags.strong, "--strong"),
        (flags.rule, "--rule"),
        (flags.fence, "--fence"),
    ] {
        if let Some(marker) = value {
            lines.push(format!("{flag} {marker}"));
        }
    }
    if let Some(parent) = path.parent() {
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

/// Pick the known flags out of a token list. Unknown tokens (the file
/// argument, flags only the command line understands) are skipped.
pub fn parse_flag_tokens(tokens: &[String]) -> ConfigFlags {
    let mut flags = ConfigFlags::default();
    let mut i = 0;
    while i < tokens.len() {
        let token = tokens[i].as_str();
        let (name, inline) = match token.split_once('=') {
            Some((name, value)) => (name, Some(value)),
            None => (token, None),
        };
        let mut value = || {
            inline.or_else(|| {
                let next = tokens.get(i + 1).map(String::as_str);
                if next.is_some() {
                    i += 1;
                }
                next
            })
        };
        match name {
            "--watch" => flags.watch = true,
            "--check" => flags.check = true,
            "--write" => flags.write = true,
            "--no-html" => flags.no_html = true,
            "--width" => flags.width = value().and_then(|v| v.parse().ok()),
            "--bullet" => flags.bullet = value().and_then(parse_marker),
            "--emphasis" => flags.emphasis = value().and_then(parse_marker),
            "--strong" => flags.strong = value().and_then(parse_marker),
            "--rule" => flags.rule = value().and_then(parse_marker),
            "--fence" => flags.fence = value().and_then(parse_marker),
            _ => {}
        }
        i += 1;
    }
    flags
}

fn parse_marker(s: &str) -> Option<char> {
    let mut chars = s.chars();
    let marker = chars.next()?;
    chars.next().is_none().then_some(marker)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn tokens(args: &[&str]) -> Vec<String> {
        args.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_parse_flag_tokens_extracts_known_flags() {
        let flags = parse_flag_tokens(&tokens(&[
            "mdsync",
            "--watch",
            "--no-html",
            "--width",
            "72",
            "--bullet=-",
            "--fence",
            "~",
            "README.md",
        ]));
        assert!(flags.watch);
        assert!(flags.no_html);
        assert_eq!(flags.width, Some(72));
        assert_eq!(flags.bullet, Some('-'));
        assert_eq!(flags.fence, Some('~'));
        assert!(!flags.check);
    }

    #[test]
    fn test_multi_char_marker_is_ignored() {
        let flags = parse_flag_tokens(&tokens(&["--emphasis", "**"]));
        assert_eq!(flags.emphasis, None);
    }

    #[test]
    fn test_config_union_merges_cli_over_file_for_options() {
        let file = ConfigFlags {
            watch: true,
            bullet: Some('-'),
            width: Some(80),
            ..ConfigFlags::default()
        };
        let cli = ConfigFlags {
            check: true,
            bullet: Some('+'),
            ..ConfigFlags::default()
        };
        let merged = file.union(&cli);
        assert!(merged.watch);
        assert!(merged.check);
        assert_eq!(merged.bullet, Some('+'));
        assert_eq!(merged.width, Some(80));
    }

    #[test]
    fn test_flags_map_to_markdown_options() {
        let flags = ConfigFlags {
            emphasis: Some('_'),
            width: Some(60),
            ..ConfigFlags::default()
        };
        let options = flags.to_markdown_options();
        assert_eq!(options.emphasis, '_');
        assert_eq!(options.line_width, Some(60));
        assert_eq!(options.bullet, ToMarkdownOptions::default().bullet);
    }

    #[test]
    fn test_save_load_and_clear_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".mdsyncrc");
        let flags = ConfigFlags {
            watch: true,
            no_html: true,
            width: Some(100),
            strong: Some('_'),
            rule: Some('-'),
            ..ConfigFlags::default()
        };

        save_config_flags(&path, &flags).unwrap();
        assert_eq!(load_config_flags(&path).unwrap(), flags);

        clear_config_flags(&path).unwrap();
        assert!(!path.exists());
    }
}
