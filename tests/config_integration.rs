use mdsync::config::{ConfigFlags, load_config_flags, parse_flag_tokens};

#[test]
fn test_config_file_parsing_ignores_comments_and_blank_lines() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(".mdsyncrc");
    let content = r#"
# comment
--watch

--bullet -

--width=72
"#;
    std::fs::write(&path, content).unwrap();

    let flags = load_config_flags(&path).unwrap();
    assert!(flags.watch);
    assert_eq!(flags.bullet, Some('-'));
    assert_eq!(flags.width, Some(72));
}

#[test]
fn test_cli_flags_override_file_flags() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(".mdsyncrc");
    std::fs::write(&path, "--watch\n--emphasis _\n--fence ~\n").unwrap();

    let file_flags = load_config_flags(&path).unwrap();
    let cli_args = vec![
        "mdsync".to_string(),
        "--emphasis".to_string(),
        "*".to_string(),
        "--no-html".to_string(),
    ];
    let cli_flags = parse_flag_tokens(&cli_args);

    let effective = file_flags.union(&cli_flags);
    assert!(effective.watch, "file flags should remain enabled");
    assert!(effective.no_html, "cli flags should be applied");
    assert_eq!(effective.emphasis, Some('*'), "cli should override emphasis");
    assert_eq!(
        effective.fence,
        Some('~'),
        "file config should be preserved when CLI does not override"
    );
}

#[test]
fn test_missing_config_file_yields_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let flags = load_config_flags(&dir.path().join("absent")).unwrap();
    assert_eq!(flags, ConfigFlags::default());
}

#[test]
fn test_file_options_reach_serializer() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(".mdsyncrc");
    std::fs::write(&path, "--bullet=+\n--strong _\n").unwrap();

    let options = load_config_flags(&path).unwrap().to_markdown_options();
    assert_eq!(options.bullet, '+');
    assert_eq!(options.strong, '_');
    assert!(options.validate().is_ok());
}
