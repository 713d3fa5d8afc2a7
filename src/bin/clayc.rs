//! CLI driver for the Clay compiler core (§6). Since the lexer/parser is out
//! of scope for this core, source modules are supplied as JSON-serialized
//! `clayc::ast::item::Module` values — the embedding path `driver::Context`
//! documents for callers without a parser crate of their own.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::{Parser, ValueEnum};
use inkwell::targets::{CodeModel, FileType, InitializationConfig, RelocMode, Target, TargetMachine};

use clayc::ast::item::Module;
use clayc::driver::Context;

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum EmitKind {
    Exe,
    Lib,
    Ir,
}

/// Compiles a set of pre-parsed Clay modules into an object file, a shared
/// library object, or textual LLVM IR.
#[derive(Parser, Debug)]
#[command(name = "clayc", version, about)]
struct Cli {
    /// JSON-serialized `ast::item::Module` files, one per source module.
    #[arg(required = true)]
    modules: Vec<PathBuf>,

    /// Additional search paths (accepted for CLI-shape parity with the
    /// external-driver contract in §6; this core resolves modules already
    /// supplied on the command line rather than reading a filesystem tree).
    #[arg(short = 'I', long = "include")]
    include: Vec<PathBuf>,

    /// Dotted name of the module to compile as the program/library root.
    #[arg(long)]
    entry: String,

    #[arg(long, value_enum, default_value_t = EmitKind::Exe)]
    emit: EmitKind,

    #[arg(short, long)]
    output: PathBuf,

    #[arg(long, default_value = "linux")]
    target_os: String,

    #[arg(long, default_value_t = 64)]
    target_bits: u8,

    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { log::LevelFilter::Debug } else { log::LevelFilter::Info };
    simple_logger::SimpleLogger::new().with_level(level).init().context("failed to initialize logger")?;

    if !cli.include.is_empty() {
        log::debug!("ignoring {} -I search path(s); modules are supplied directly", cli.include.len());
    }

    if let Err(err) = run(&cli) {
        log::error!("{err}");
        std::process::exit(1);
    }
    Ok(())
}

fn run(cli: &Cli) -> Result<()> {
    let mut modules = Vec::with_capacity(cli.modules.len());
    for path in &cli.modules {
        let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        let module: Module =
            serde_json::from_str(&text).with_context(|| format!("parsing {} as a Clay module", path.display()))?;
        modules.push(module);
    }

    let ctx = Context::new(modules, cli.target_os.clone(), cli.target_bits)
        .map_err(|e| anyhow::anyhow!("{e}"))
        .context("setting up the compilation context")?;
    let entry = ctx
        .load_program(&cli.entry)
        .map_err(|e| anyhow::anyhow!("{e}"))
        .context("loading the program")?;

    let llvm = inkwell::context::Context::create();
    let llvm_module = match cli.emit {
        EmitKind::Exe => ctx
            .codegen_exe(&llvm, &entry, &cli.entry)
            .map_err(|e| anyhow::anyhow!("{e}"))
            .context("codegen (exe)")?,
        EmitKind::Lib | EmitKind::Ir => ctx
            .codegen_shared_lib(&llvm, &entry, &cli.entry)
            .map_err(|e| anyhow::anyhow!("{e}"))
            .context("codegen (lib)")?,
    };

    if let Err(errors) = llvm_module.verify() {
        anyhow::bail!("generated module failed verification:\n{}", errors.to_string());
    }

    match cli.emit {
        EmitKind::Ir => {
            fs::write(&cli.output, llvm_module.print_to_string().to_string())
                .with_context(|| format!("writing {}", cli.output.display()))?;
        }
        EmitKind::Exe | EmitKind::Lib => {
            Target::initialize_native(&InitializationConfig::default())
                .map_err(|e| anyhow::anyhow!(e))
                .context("initializing the native LLVM target")?;
            let triple = TargetMachine::get_default_triple();
            let target = Target::from_triple(&triple).map_err(|e| anyhow::anyhow!(e.to_string()))?;
            let machine = target
                .create_target_machine(
                    &triple,
                    &TargetMachine::get_host_cpu_name().to_string(),
                    &TargetMachine::get_host_cpu_features().to_string(),
                    inkwell::OptimizationLevel::Default,
                    RelocMode::PIC,
                    CodeModel::Default,
                )
                .ok_or_else(|| anyhow::anyhow!("failed to create a target machine for `{}`", triple))?;
            machine
                .write_to_file(&llvm_module, FileType::Object, &cli.output)
                .map_err(|e| anyhow::anyhow!(e.to_string()))
                .with_context(|| format!("writing {}", cli.output.display()))?;
        }
    }

    log::info!("wrote {}", cli.output.display());
    Ok(())
}
