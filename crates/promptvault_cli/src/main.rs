//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `promptvault_core` linkage from a standalone executable.
//! - Print the project/prompt tree under the configured root.
//!
//! Usage: `promptvault [root]`. Without `root`, `PROMPTVAULT_ROOT` or
//! `./prompts` is used.

use log::info;
use promptvault_core::{core_version, PromptManager, VaultConfig};
use std::process::ExitCode;

fn main() -> ExitCode {
    let mut config = VaultConfig::from_env();
    if let Some(root) = std::env::args().nth(1) {
        config = config.with_root(root);
    }
    if let Err(err) = config.init_logging() {
        eprintln!("logging disabled: {err}");
    }

    println!("promptvault_core version={}", core_version());
    println!("root={}", config.root.display());
    info!(
        "event=cli_probe module=cli status=start root={}",
        config.root.display()
    );

    let manager = PromptManager::from_config(&config);
    let projects = match manager.list_projects() {
        Ok(projects) => projects,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    };

    for project in projects {
        println!("{project}/");
        let prompts = match manager.get_project(&project).and_then(|p| p.list_prompts()) {
            Ok(prompts) => prompts,
            Err(err) => {
                eprintln!("  error: {err}");
                continue;
            }
        };
        for name in prompts {
            let mut prompt = match manager.get_prompt((project.as_str(), name.as_str())) {
                Ok(prompt) => prompt,
                Err(err) => {
                    eprintln!("  {name}: {err}");
                    continue;
                }
            };
            match prompt.version_labels() {
                Ok(labels) => println!("  {name} [{}]", labels.join(", ")),
                Err(err) => eprintln!("  {name}: {err}"),
            }
        }
    }
    ExitCode::SUCCESS
}
