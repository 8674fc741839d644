//! Command: list registered handlers.
use anyhow::Result;

use crate::context::Context;
use crate::formatters::registry::PatternRegistry;

/// Log every handler in registration order with its mode, rules, and the
/// resolved executable (or `not installed`).
///
/// # Errors
///
/// Returns an error if the handler registry cannot be built.
pub fn run(ctx: &Context) -> Result<()> {
    let registry = PatternRegistry::from_specs(&ctx.config.handlers)?;
    ctx.log.stage("Handlers");

    if registry.is_empty() {
        ctx.log.warn("no handlers registered");
        return Ok(());
    }

    let mut missing = 0usize;
    for (idx, handler) in registry.handlers().iter().enumerate() {
        let location = match ctx.executor.resolve(&handler.program) {
            Some(path) => path.display().to_string(),
            None => {
                missing += 1;
                "not installed".to_string()
            }
        };
        ctx.log.info(&format!(
            "{} [{}] {} ({location})",
            handler.name,
            handler.mode,
            handler.command_line()
        ));
        for rule in registry.rules_for(idx) {
            ctx.log.info(&format!("  {}", rule.as_str()));
        }
    }

    if missing > 0 {
        ctx.log.warn(&format!(
            "{missing} of {} handler(s) not installed",
            registry.handlers().len()
        ));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::exec::MockExecutor;
    use crate::logging::{Level, MemoryLog};
    use std::path::{Path, PathBuf};
    use std::sync::Arc;

    fn ctx(exec: MockExecutor) -> (Context, Arc<MemoryLog>) {
        let log = Arc::new(MemoryLog::new());
        let ctx = Context::new(Config::defaults(Path::new("/repo"), Path::new("/home/u")), log.clone())
            .with_executor(Arc::new(exec));
        (ctx, log)
    }

    #[test]
    fn lists_builtins_with_rules_and_availability() {
        let mut exec = MockExecutor::new();
        exec.expect_resolve()
            .returning(|p| (p == "jq").then(|| PathBuf::from("/usr/bin/jq")));
        let (ctx, log) = ctx(exec);
        run(&ctx).unwrap();

        let info = log.messages(Level::Info);
        assert_eq!(info[0], "JSON [rewrite] jq . (/usr/bin/jq)");
        assert_eq!(info[1], r"  .*\.json$");
        assert!(info.iter().any(|l| l == "Lua [batch] stylua (not installed)"));
        assert_eq!(
            log.messages(Level::Warn),
            vec!["6 of 7 handler(s) not installed".to_string()]
        );
    }

    #[test]
    fn empty_table_warns() {
        let (mut ctx, log) = ctx(MockExecutor::new());
        ctx.config.handlers.clear();
        run(&ctx).unwrap();
        assert!(log.contains("no handlers registered"));
    }
}
