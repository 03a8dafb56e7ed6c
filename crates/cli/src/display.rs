//! Terminal rendering of patches

use owo_colors::OwoColorize;
use reconciler::InstanceMap;
use treesync_core::{LiveTree, PatchSet, Removal};

/// Print an Added/Removed/Updated summary of `patch`
pub fn print_patch<T: LiveTree + ?Sized>(patch: &PatchSet, tree: &T, instances: &InstanceMap) {
    if patch.is_empty() {
        println!("{}", "Live tree is up to date".dimmed());
        return;
    }

    if patch.has_additions() {
        println!("{} Added ({} nodes)", "A".green().bold(), patch.added.len());
        for (id, node) in &patch.added {
            println!(
                "  {} {} {} {}",
                "+".green(),
                node.name,
                format!("({})", node.class_name).dimmed(),
                id.dimmed()
            );
        }
        println!();
    }

    if patch.has_removes() {
        println!("{} Removed ({} nodes)", "D".red().bold(), patch.removed.len());
        for removal in &patch.removed {
            let handle = match removal {
                Removal::Id(id) => instances.get_handle(id),
                Removal::Handle(handle) => Some(*handle),
            };
            let name = handle.and_then(|handle| tree.name(handle)).unwrap_or("<gone>");
            let class_name = handle
                .and_then(|handle| tree.class_name(handle))
                .unwrap_or("?");
            let label = match removal {
                Removal::Id(id) => id.clone(),
                Removal::Handle(handle) => handle.to_string(),
            };
            println!(
                "  {} {} {} {}",
                "-".red(),
                name,
                format!("({})", class_name).dimmed(),
                label.dimmed()
            );
        }
        println!();
    }

    if patch.has_updates() {
        println!("{} Updated ({} nodes)", "M".yellow().bold(), patch.updated.len());
        for update in &patch.updated {
            println!("  {} {}", "~".yellow(), update.id);
            if let Some(class_name) = &update.changed_class_name {
                println!("      class -> {}", class_name);
            }
            if let Some(name) = &update.changed_name {
                println!("      name -> {}", name);
            }
            for (property, value) in &update.changed_properties {
                let rendered =
                    serde_json::to_string(value).unwrap_or_else(|_| value.type_name().to_string());
                println!("      {} = {}", property.cyan(), rendered);
            }
            if update.changed_metadata.is_some() {
                println!("      {}", "metadata changed".dimmed());
            }
        }
        println!();
    }

    println!(
        "{}",
        format!(
            "Total: {} added, {} removed, {} updated ({} changes)",
            patch.added.len().to_string().green(),
            patch.removed.len().to_string().red(),
            patch.updated.len().to_string().yellow(),
            patch.count_changes()
        )
        .dimmed()
    );
}

/// Print what an apply left behind
pub fn print_residual<T: LiveTree + ?Sized>(
    residual: &PatchSet,
    tree: &T,
    instances: &InstanceMap,
) {
    if residual.is_empty() {
        println!("{} All changes applied", "✓".green());
        return;
    }

    println!(
        "{} {} changes could not be applied:",
        "!".yellow().bold(),
        residual.count_changes()
    );
    print_patch(residual, tree, instances);
}
