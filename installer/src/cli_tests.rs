//! Tests for CLI parsing.

use super::*;
use rstest::rstest;

const URL: &str = "https://example.test/tool.tar.gz";
const SUM: &str = "sha256:e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

fn install(extra: &[&str]) -> InstallArgs {
    let mut args = vec![
        "nori-install",
        "install",
        "tool",
        "1.0.0",
        "--url",
        URL,
        "--checksum",
        SUM,
        "--bin",
        "bin/tool",
    ];
    args.extend_from_slice(extra);
    match Cli::parse_from(args).command {
        Command::Install(args) => args,
        other => panic!("expected Install command, got {other:?}"),
    }
}

#[test]
fn install_defaults() {
    let args = install(&[]);
    assert_eq!(args.name, "tool");
    assert_eq!(args.version, "1.0.0");
    assert_eq!(args.url, URL);
    assert_eq!(args.kind, ArchiveKind::Tar);
    assert_eq!(args.bins, vec!["bin/tool".to_owned()]);
    assert!(args.platform.is_none());
    assert!(!args.no_activate);
    assert!(!args.json);
}

#[test]
fn install_accepts_repeated_bins_and_flags() {
    let args = install(&[
        "--bin",
        "bin/helper",
        "--kind",
        "zip",
        "--platform",
        "darwin-arm64",
        "--no-activate",
        "--json",
    ]);
    assert_eq!(args.bins.len(), 2);
    assert_eq!(args.kind, ArchiveKind::Zip);
    assert_eq!(args.platform.as_deref(), Some("darwin-arm64"));
    assert!(args.no_activate);
    assert!(args.json);
}

#[test]
fn install_requires_a_binary() {
    let result = Cli::try_parse_from([
        "nori-install",
        "install",
        "tool",
        "1.0.0",
        "--url",
        URL,
        "--checksum",
        SUM,
    ]);
    assert!(result.is_err());
}

#[rstest]
#[case("tar.xz")]
#[case("rar")]
fn install_rejects_unknown_kinds(#[case] kind: &str) {
    let result = Cli::try_parse_from([
        "nori-install",
        "install",
        "tool",
        "1.0.0",
        "--url",
        URL,
        "--checksum",
        SUM,
        "--bin",
        "tool",
        "--kind",
        kind,
    ]);
    assert!(result.is_err());
}

#[test]
fn verify_parses_file_and_checksum() {
    let cli = Cli::parse_from(["nori-install", "verify", "./tool.tar.gz", "--checksum", SUM]);
    match cli.command {
        Command::Verify(args) => {
            assert_eq!(args.file, Utf8PathBuf::from("./tool.tar.gz"));
            assert_eq!(args.checksum, SUM);
        }
        other => panic!("expected Verify command, got {other:?}"),
    }
}

#[test]
fn use_parses_version_and_bins() {
    let cli = Cli::parse_from([
        "nori-install",
        "use",
        "tool",
        "1.0.0",
        "--bin",
        "bin/tool",
        "--platform",
        "linux-arm64",
    ]);
    match cli.command {
        Command::Use(args) => {
            assert_eq!(args.name, "tool");
            assert_eq!(args.version, "1.0.0");
            assert_eq!(args.bins, vec!["bin/tool".to_owned()]);
            assert_eq!(args.platform.as_deref(), Some("linux-arm64"));
        }
        other => panic!("expected Use command, got {other:?}"),
    }
}

#[test]
fn deactivate_parses_name_and_bins() {
    let cli = Cli::parse_from(["nori-install", "deactivate", "tool", "--bin", "bin/tool"]);
    match cli.command {
        Command::Deactivate(args) => {
            assert_eq!(args.name, "tool");
            assert_eq!(args.bins, vec!["bin/tool".to_owned()]);
        }
        other => panic!("expected Deactivate command, got {other:?}"),
    }
}

#[test]
fn use_requires_a_binary() {
    assert!(Cli::try_parse_from(["nori-install", "use", "tool", "1.0.0"]).is_err());
}

#[rstest]
#[case(&["nori-install", "list"], None)]
#[case(&["nori-install", "list", "tool"], Some("tool"))]
fn list_takes_optional_package(#[case] argv: &[&str], #[case] expected: Option<&str>) {
    match Cli::parse_from(argv).command {
        Command::List(args) => assert_eq!(args.name.as_deref(), expected),
        other => panic!("expected List command, got {other:?}"),
    }
}

#[rstest]
#[case(&["nori-install", "--root", "/opt/nori", "verify", "f", "--checksum", "x"])]
#[case(&["nori-install", "verify", "f", "--checksum", "x", "--root", "/opt/nori"])]
fn root_is_global(#[case] argv: &[&str]) {
    let cli = Cli::parse_from(argv);
    assert_eq!(cli.root, Some(Utf8PathBuf::from("/opt/nori")));
}

#[rstest]
#[case(&["nori-install", "verify", "f", "--checksum", "x"], 0)]
#[case(&["nori-install", "-v", "verify", "f", "--checksum", "x"], 1)]
#[case(&["nori-install", "-vvv", "verify", "f", "--checksum", "x"], 3)]
fn verbose_counts_repetitions(#[case] argv: &[&str], #[case] expected: u8) {
    assert_eq!(Cli::parse_from(argv).verbose, expected);
}

#[test]
fn quiet_conflicts_with_verbose() {
    let result = Cli::try_parse_from(["nori-install", "-q", "-v", "verify", "f", "--checksum", "x"]);
    assert!(result.is_err());
}
