mod includes;
mod index;
mod plan;
mod stats;

use super::domain::CommandOutcome;
use super::{CommandAction, CommandContext};
use anyhow::{bail, Result};
use srcgraph_indexer::RefreshMode;
use srcgraph_store::PersistentSymbolStore;

pub fn route(action: CommandAction, ctx: &CommandContext) -> Result<CommandOutcome> {
    match action {
        CommandAction::Plan { mode } => plan::run(ctx, mode),
        CommandAction::Index(request) => index::run(ctx, &request),
        CommandAction::ValidateIncludes => includes::validate(ctx),
        CommandAction::DetectSearchPaths { roots } => includes::detect_search_paths(ctx, &roots),
        CommandAction::Stats => stats::run(ctx),
    }
}

/// The requested mode, or the cheapest one the store supports.
fn resolve_mode(store: &PersistentSymbolStore, requested: Option<RefreshMode>) -> Result<RefreshMode> {
    let available = RefreshMode::available_for(store.has_files()?);
    match requested {
        None => Ok(available[0]),
        Some(mode) if available.contains(&mode) => Ok(mode),
        Some(mode) => bail!("refresh mode '{mode}' needs an indexed store"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use srcgraph_store::{ParserClient, StoreMode};
    use std::path::Path;

    #[test]
    fn empty_store_only_offers_a_full_refresh() {
        let store = PersistentSymbolStore::in_memory();
        assert_eq!(resolve_mode(&store, None).unwrap(), RefreshMode::AllFiles);
        let err = resolve_mode(&store, Some(RefreshMode::UpdatedFiles)).unwrap_err();
        assert!(err.to_string().contains("needs an indexed store"));
    }

    #[test]
    fn indexed_store_defaults_to_updated_files() {
        let mut store = PersistentSymbolStore::in_memory();
        store.set_mode(StoreMode::Write).unwrap();
        store.record_file(Path::new("/p/a.c"), true).unwrap();
        store.set_mode(StoreMode::Read).unwrap();

        assert_eq!(resolve_mode(&store, None).unwrap(), RefreshMode::UpdatedFiles);
        assert_eq!(
            resolve_mode(&store, Some(RefreshMode::UpdatedAndIncompleteFiles)).unwrap(),
            RefreshMode::UpdatedAndIncompleteFiles
        );
    }
}
