use log::info;

use crate::common::error::CompileError;
use crate::common::source::SourceManager;
use crate::dot;
use crate::frontend::Parser;
use crate::ir::Cfg;

use super::cli::Cli;

/// Orchestrates one compilation run: read the file, parse it straight into
/// SSA form, report diagnostics, and emit the CFG visualization.
pub struct Driver {
    pub cli: Cli,
}

impl Driver {
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    pub fn run(&self) -> Result<(), CompileError> {
        let path = &self.cli.input;
        let source = std::fs::read_to_string(path)?;

        let mut source_manager = SourceManager::new();
        let file_id = source_manager.add_file(path.display().to_string(), source.clone());

        info!("parsing {}", path.display());
        let cfg = self.parse(&source, file_id, &source_manager)?;

        info!(
            "built {} blocks, {} instructions",
            cfg.block_count(),
            cfg.pool().len()
        );

        let rendered = dot::render(&cfg);
        match &self.cli.dot {
            Some(out_path) => {
                std::fs::write(out_path, rendered)?;
                info!("wrote CFG graph to {}", out_path.display());
            }
            None => println!("{rendered}"),
        }

        Ok(())
    }

    fn parse(
        &self,
        source: &str,
        file_id: u32,
        source_manager: &SourceManager,
    ) -> Result<Cfg, CompileError> {
        let parser = Parser::new(source, file_id);
        let (cfg, diagnostics, had_error) = parser.parse();
        diagnostics.print_all(source_manager);

        if had_error {
            return Err(CompileError::AggregateFailure(diagnostics.error_count()));
        }
        Ok(cfg)
    }
}
