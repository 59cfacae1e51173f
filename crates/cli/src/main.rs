use alloy_primitives::hex;
use clap::Parser;
use cobra::{CompiledContract, CompilerConfig, highlight_location};
use std::{
    fs,
    io::{self, Read},
    path::PathBuf,
    process::ExitCode,
};

#[derive(Parser)]
#[command(name = "cobra")]
#[command(about = "Python-flavoured contract to EVM bytecode compiler", long_about = None)]
#[command(version)]
struct Cli {
    /// Input file (use '-' or omit for stdin)
    input: Option<PathBuf>,

    /// Print the runtime code instead of the deployment code
    #[arg(long)]
    runtime: bool,

    /// Print the ABI as JSON
    #[arg(long, conflicts_with_all = ["artifact", "ir"])]
    abi: bool,

    /// Print the full artifact (ABI, both bytecodes, storage layout) as JSON
    #[arg(long, conflicts_with = "ir")]
    artifact: bool,

    /// Print the analyzed contract instead of compiling it
    #[arg(long)]
    ir: bool,
}

fn read_input(input: Option<&PathBuf>) -> io::Result<String> {
    match input {
        Some(path) if path.to_str() != Some("-") => fs::read_to_string(path),
        _ => {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            Ok(buffer)
        }
    }
}

fn render(cli: &Cli, compiled: &CompiledContract) -> serde_json::Result<String> {
    if cli.abi {
        return serde_json::to_string_pretty(&compiled.to_abi_json());
    }
    if cli.artifact {
        return serde_json::to_string_pretty(&compiled.to_artifact_json());
    }
    let code = if cli.runtime { &compiled.runtime_bytecode } else { &compiled.bytecode };
    Ok(hex::encode(code))
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    let source = match read_input(cli.input.as_ref()) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("error: failed to read input: {err}");
            return ExitCode::FAILURE;
        }
    };

    let config = CompilerConfig::default();
    let result = if cli.ir {
        cobra::analyze(&source, &config.analyzer).map(|contract| contract.to_string())
    } else {
        cobra::compile_with_config(&source, &config).and_then(|compiled| {
            render(&cli, &compiled)
                .map_err(|err| cobra::CompileError::new(cobra::ErrorKind::Internal, err.to_string()))
        })
    };

    match result {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("error: {err}");
            if let Some(location) = err.location {
                let mut snippet = String::new();
                if highlight_location(&mut snippet, &source, location, 2).is_ok() {
                    eprint!("{snippet}");
                }
            }
            log::debug!("compilation failed with {:?}", err.kind);
            ExitCode::FAILURE
        }
    }
}
