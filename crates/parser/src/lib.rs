//! Front end of the contract compiler: tokenizes the Python-flavoured source, parses it and
//! lowers the single contract class into a typed [`ContractDefinition`].

pub mod ast;
mod config;
mod error;
mod lexer;
mod lower;
mod parser;

#[cfg(test)]
mod tests;

pub use config::AnalyzerConfig;
pub use error::{AnalysisError, Result};
pub use lower::resolve_type;

use cobra_data::{ContractDefinition, SourceLocation};

/// Analyzes one compilation unit.
pub fn analyze(source: &str, config: &AnalyzerConfig) -> Result<ContractDefinition> {
    let class = parse(source, config)?;
    lower::lower_contract(&class, config)
}

/// Parses without lowering, for tools that want the surface syntax.
pub fn parse(source: &str, config: &AnalyzerConfig) -> Result<ast::ClassDef> {
    let tokens = lexer::tokenize(source, config.max_depth)?;
    log::trace!("lexed {} tokens", tokens.len());
    parser::parse_contract(source, tokens)
}

/// Renders the lines around `location` with a caret under the reported column.
pub fn highlight_location(
    out: &mut impl std::fmt::Write,
    source: &str,
    location: SourceLocation,
    line_range: usize,
) -> std::fmt::Result {
    let lines: Vec<&str> = source.lines().collect();
    if lines.is_empty() || location.line == 0 {
        return Ok(());
    }
    let line = (location.line as usize - 1).min(lines.len() - 1);
    let show_start = line.saturating_sub(line_range);
    let show_end = (line + line_range).min(lines.len() - 1);
    let dig_width = (show_end + 1).ilog10() as usize + 1;

    for (i, text) in lines.iter().enumerate().take(show_end + 1).skip(show_start) {
        writeln!(out, "{:>dig_width$} | {text}", i + 1)?;
        if i == line {
            let column = (location.column as usize).saturating_sub(1);
            writeln!(out, "{:>dig_width$} | {:column$}^", "", "")?;
        }
    }
    Ok(())
}
