use anyhow::Result;
use std::path::{Path, PathBuf};

use releasability::exceptions::{ExceptionEntry, ExceptionKind, ExceptionManager};
use releasability::output::format_exceptions_table;

use super::load_effective_config;
use crate::cli::ExceptionAction;

pub fn handle_exceptions(
    repository_root: Option<PathBuf>,
    action: ExceptionAction,
    config_path: Option<&Path>,
    quiet: bool,
) -> Result<()> {
    let config = load_effective_config(config_path)?;
    let root = repository_root.unwrap_or_else(|| config.licenses.repository_root.clone());

    match action {
        ExceptionAction::Add { kind, name, comment } => {
            let kind = ExceptionKind::from(kind);
            let mut manager = ExceptionManager::load(&root, None);
            manager.add(kind, &name, &comment)?;
            if !quiet {
                println!("✅ Added {} {} to {}", kind, name, manager.path(kind).display());
            }
        }
        ExceptionAction::Init => {
            let manager = ExceptionManager::load(&root, None);
            let created = manager.create_template_files()?;
            if !quiet {
                if created.is_empty() {
                    println!("Exception files already exist");
                }
                for path in created {
                    println!("✅ Created {}", path.display());
                }
            }
        }
        ExceptionAction::List { kind } => {
            let remote = config.licenses.remote_exceptions.as_ref().map(|remote| remote.to_remote());
            let manager = ExceptionManager::load(&root, remote.as_ref());
            let kinds = match kind {
                Some(kind) => vec![ExceptionKind::from(kind)],
                None => ExceptionKind::ALL.to_vec(),
            };
            for kind in kinds {
                let local = manager.local_entries(kind);
                let mut entries = local.clone();
                // Remote names carry no comment locally
                for name in manager.names(kind) {
                    if !local.iter().any(|entry| entry.name == name) {
                        entries.push(ExceptionEntry::new(name, "(remote)"));
                    }
                }
                entries.sort();
                if !quiet {
                    println!("{}", format_exceptions_table(kind, &entries));
                }
            }
        }
    }

    Ok(())
}
