//! `nori-install` CLI entrypoint.
//!
//! Resolves the nori root, loads settings and runs the install pipeline
//! over HTTP. Also switches and lists installed versions, and checks a
//! local file against a checksum. Ctrl-C cancels the pipeline so its
//! temporary state is cleaned up before exit.

use camino::Utf8Path;
use clap::Parser;
use log::warn;
use nori_installer::artefact::cancel::{CancellationToken, SystemClock};
use nori_installer::artefact::checksum;
use nori_installer::artefact::descriptor::AssetDescriptor;
use nori_installer::artefact::digest::Digest;
use nori_installer::artefact::download::UreqTransport;
use nori_installer::cli::{
    Cli, Command, DeactivateArgs, InstallArgs, ListArgs, UseArgs, VerifyArgs,
};
use nori_installer::config::Settings;
use nori_installer::dirs::SystemBaseDirs;
use nori_installer::error::{PipelineError, Result};
use nori_installer::layout::{Layout, PackageKey};
use nori_installer::output::{
    InstallSummary, activated_message, path_hint, success_message, version_line,
    write_stderr_line,
};
use nori_installer::pipeline::{InstallRequest, Pipeline};
use nori_installer::platform::PlatformTag;
use nori_installer::versions;
use std::io::Write;

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let mut stderr = std::io::stderr();
    let cancel = interrupt_token();
    let run_result = run(&cli, &cancel, &mut stderr);
    let exit_code = exit_code_for_run_result(run_result, &mut stderr);
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}

/// Installs `env_logger`; `RUST_LOG` wins over `-v`.
fn init_logging(verbose: u8) {
    let env = env_logger::Env::default().default_filter_or(level_for_verbosity(verbose));
    env_logger::Builder::from_env(env)
        .format_timestamp(None)
        .init();
}

const fn level_for_verbosity(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// A token cancelled by the first Ctrl-C.
fn interrupt_token() -> CancellationToken {
    let token = CancellationToken::new();
    let handle = token.clone();
    if let Err(err) = ctrlc::set_handler(move || handle.cancel()) {
        warn!("interrupts will not clean up temporary files: {err}");
    }
    token
}

fn run(cli: &Cli, cancel: &CancellationToken, stderr: &mut dyn Write) -> Result<()> {
    match &cli.command {
        Command::Install(args) => run_install(cli, args, cancel, stderr),
        Command::Use(args) => run_use(cli, args, stderr),
        Command::Deactivate(args) => run_deactivate(cli, args, stderr),
        Command::List(args) => run_list(cli, args),
        Command::Verify(args) => run_verify(cli, args, stderr),
    }
}

fn run_install(
    cli: &Cli,
    args: &InstallArgs,
    cancel: &CancellationToken,
    stderr: &mut dyn Write,
) -> Result<()> {
    let layout = Layout::resolve(cli.root.clone(), &SystemBaseDirs)?;
    let settings = Settings::load(&layout.settings_path())?;
    let request = build_request(args)?;

    let transport = UreqTransport::new();
    let clock = SystemClock;
    let pipeline = Pipeline::new(layout, &transport, &clock)
        .with_settings(settings)
        .with_cancellation(cancel.clone())
        .quiet(cli.quiet);
    let outcome = pipeline.run(&request, stderr)?;

    if args.json {
        write_json_summary(&InstallSummary::from(&outcome))?;
    }
    if !cli.quiet {
        write_stderr_line(stderr, success_message(&outcome));
        let shims_dir = pipeline.layout().shims_dir();
        if !is_on_path(&shims_dir) {
            write_stderr_line(stderr, path_hint(&shims_dir));
        }
    }
    Ok(())
}

fn platform_or_host(tag: Option<&str>) -> Result<PlatformTag> {
    Ok(tag
        .map(str::parse::<PlatformTag>)
        .transpose()?
        .unwrap_or_else(PlatformTag::host))
}

fn build_request(args: &InstallArgs) -> Result<InstallRequest> {
    let platform = platform_or_host(args.platform.as_deref())?;
    let checksum: Digest = args.checksum.parse()?;
    Ok(InstallRequest {
        key: PackageKey::new(&args.name, &args.version, platform)?,
        asset: AssetDescriptor::new(args.kind, args.url.clone(), checksum),
        binaries: args.bins.clone(),
        activate: !args.no_activate,
    })
}

fn run_use(cli: &Cli, args: &UseArgs, stderr: &mut dyn Write) -> Result<()> {
    let layout = Layout::resolve(cli.root.clone(), &SystemBaseDirs)?;
    let platform = platform_or_host(args.platform.as_deref())?;
    let key = PackageKey::new(&args.name, &args.version, platform)?;
    let shims = versions::activate(&layout, &key, &args.bins)?;
    if !cli.quiet {
        write_stderr_line(stderr, activated_message(&key, &shims));
    }
    Ok(())
}

fn run_deactivate(cli: &Cli, args: &DeactivateArgs, stderr: &mut dyn Write) -> Result<()> {
    let layout = Layout::resolve(cli.root.clone(), &SystemBaseDirs)?;
    let previous = versions::deactivate(&layout, &args.name, &args.bins)?;
    if !cli.quiet {
        let message = previous.map_or_else(
            || format!("{} had no active version", args.name),
            |version| format!("Deactivated {}@{version}", args.name),
        );
        write_stderr_line(stderr, message);
    }
    Ok(())
}

fn run_list(cli: &Cli, args: &ListArgs) -> Result<()> {
    let layout = Layout::resolve(cli.root.clone(), &SystemBaseDirs)?;
    let lines = args.name.as_deref().map_or_else(
        || versions::installed_packages(&layout),
        |name| {
            let platform = platform_or_host(args.platform.as_deref())?;
            Ok(versions::installed_versions(&layout, name, &platform)?
                .iter()
                .map(version_line)
                .collect())
        },
    )?;
    write_stdout_lines(&lines)
}

fn write_stdout_lines(lines: &[String]) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    for line in lines {
        writeln!(stdout, "{line}").map_err(|source| PipelineError::WriteFailed { source })?;
    }
    Ok(())
}

fn write_json_summary(summary: &InstallSummary) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, summary)
        .map_err(|err| PipelineError::WriteFailed { source: err.into() })?;
    writeln!(stdout).map_err(|source| PipelineError::WriteFailed { source })
}

fn is_on_path(dir: &Utf8Path) -> bool {
    std::env::var_os("PATH")
        .is_some_and(|path| std::env::split_paths(&path).any(|entry| entry == dir.as_std_path()))
}

fn run_verify(cli: &Cli, args: &VerifyArgs, stderr: &mut dyn Write) -> Result<()> {
    let content = std::fs::read(&args.file).map_err(|source| PipelineError::ReadFile {
        path: args.file.clone().into_std_path_buf(),
        source,
    })?;
    checksum::verify(&content, &args.checksum)?;
    if !cli.quiet {
        write_stderr_line(stderr, format!("{}: OK", args.file));
    }
    Ok(())
}

fn exit_code_for_run_result(result: Result<()>, stderr: &mut dyn Write) -> i32 {
    match result {
        Ok(()) => 0,
        Err(err) => {
            write_stderr_line(stderr, format!("error: {err}"));
            if let Some(hint) = err.hint() {
                write_stderr_line(stderr, format!("hint: {hint}"));
            }
            1
        }
    }
}
