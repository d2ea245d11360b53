//! Named AWS profile discovery, for diagnosing a misconfigured profile.
//!
//! Profile names come from the section headers of the shared config file
//! (`[default]`, `[profile name]`) and the credentials file (`[name]`).
//! The usual `AWS_CONFIG_FILE` / `AWS_SHARED_CREDENTIALS_FILE` overrides
//! are honoured.

use std::collections::BTreeSet;
use std::path::PathBuf;

/// Profile names defined in the shared AWS config and credentials files.
pub fn available_profiles() -> BTreeSet<String> {
    let aws_dir = dirs::home_dir().map(|h| h.join(".aws"));
    let config = file_from_env("AWS_CONFIG_FILE").or_else(|| aws_dir.as_ref().map(|d| d.join("config")));
    let credentials = file_from_env("AWS_SHARED_CREDENTIALS_FILE")
        .or_else(|| aws_dir.as_ref().map(|d| d.join("credentials")));

    let mut profiles = BTreeSet::new();
    if let Some(contents) = config.and_then(|p| std::fs::read_to_string(p).ok()) {
        profiles.extend(profile_names(&contents, true));
    }
    if let Some(contents) = credentials.and_then(|p| std::fs::read_to_string(p).ok()) {
        profiles.extend(profile_names(&contents, false));
    }
    profiles
}

fn file_from_env(var: &str) -> Option<PathBuf> {
    std::env::var_os(var)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

/// Extract profile names from an INI-style AWS file.
///
/// In the config file profiles other than `default` are written as
/// `[profile name]`; other section kinds (`sso-session`, `services`) are
/// skipped.
fn profile_names(contents: &str, is_config_file: bool) -> Vec<String> {
    contents
        .lines()
        .map(str::trim)
        .filter_map(|line| line.strip_prefix('[')?.strip_suffix(']'))
        .map(str::trim)
        .filter_map(|header| {
            if !is_config_file || header == "default" {
                return Some(header.to_string());
            }
            header
                .strip_prefix("profile")
                .filter(|rest| rest.starts_with(char::is_whitespace))
                .map(|rest| rest.trim().to_string())
        })
        .filter(|name| !name.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_file_profiles() {
        let contents = "\
[default]
region = us-east-1

[profile music]
region = eu-west-1

[sso-session corp]
sso_region = us-east-1

[services local]
";
        assert_eq!(profile_names(contents, true), vec!["default", "music"]);
    }

    #[test]
    fn test_credentials_file_profiles() {
        let contents = "\
[default]
aws_access_key_id = x

[archive]
aws_access_key_id = y
";
        assert_eq!(profile_names(contents, false), vec!["default", "archive"]);
    }

    #[test]
    fn test_ignores_non_header_lines() {
        assert!(profile_names("region = [us]\n# [comment\n", false).is_empty());
    }
}
