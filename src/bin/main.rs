use std::{
    fs,
    path::{Path, PathBuf},
    process::ExitCode,
    time::Instant,
};

use clap::Parser;
use kc::{
    driver::{self, Options},
    transpiler,
    util::fmt::{
        diagnostic::{render_all, summary},
        Context,
    },
};
use tracing::info;

/// Compiles a K module into a C header.
#[derive(Parser)]
#[command(name = "kc", version)]
struct Cli {
    /// The source file to compile
    #[arg(default_value = "main.k")]
    input: PathBuf,

    /// Where to write the generated C
    #[arg(short, long, default_value = "out.c")]
    output: PathBuf,

    /// Write the token stream to FILE
    #[arg(long, value_name = "FILE")]
    dump_tokens: Option<PathBuf>,

    /// Write the syntax tree to FILE
    #[arg(long, value_name = "FILE")]
    dump_ast: Option<PathBuf>,

    /// Skip the style checks
    #[arg(long)]
    no_lint: bool,

    /// Prefix every emitted name with `k_`
    #[arg(long)]
    mangle: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn options(&self) -> Options {
        Options {
            lint: !self.no_lint,
            dump_tokens: self.dump_tokens.is_some(),
            dump_ast: self.dump_ast.is_some(),
            transpiler: transpiler::Config { mangle: self.mangle },
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    setup_tracing(cli.verbose);

    match run(&cli) {
        Ok(code) => code,
        Err(error) => {
            eprintln!("internal compiler error: {error}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<ExitCode, driver::Error> {
    let start = Instant::now();
    info!(input = %cli.input.display(), "compiling");

    let (src, compilation) = driver::compile_file(&cli.input, &cli.options())?;

    write_dump(cli.dump_tokens.as_deref(), compilation.tokens.as_deref())?;
    write_dump(cli.dump_ast.as_deref(), compilation.ast.as_deref())?;

    let file_name = cli.input.display().to_string();
    let ctx = Context::new(&file_name, &src);
    if !compilation.diagnostics.is_empty() {
        eprintln!("{}", render_all(&compilation.diagnostics, &ctx));
    }

    let Some(output) = compilation.output else {
        eprintln!("{}", summary(&compilation.diagnostics));
        return Ok(ExitCode::FAILURE);
    };

    fs::write(&cli.output, output)?;
    info!(output = %cli.output.display(), "wrote C output");
    println!(
        "compiled {} to {} in {:.2?}",
        cli.input.display(),
        cli.output.display(),
        start.elapsed()
    );
    Ok(ExitCode::SUCCESS)
}

fn write_dump(path: Option<&Path>, contents: Option<&str>) -> Result<(), driver::Error> {
    if let (Some(path), Some(contents)) = (path, contents) {
        fs::write(path, contents)?;
    }
    Ok(())
}

fn setup_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("kc=debug")
        } else {
            EnvFilter::new("kc=info")
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
