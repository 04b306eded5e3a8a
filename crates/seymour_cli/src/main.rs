//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `seymour_core` linkage with deterministic output.
//! - `check <file>`: run load/merge on a project file and report the result.

use std::path::Path;
use std::process::ExitCode;

fn main() -> ExitCode {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    match args.as_slice() {
        [] => {
            println!("seymour_core ping={}", seymour_core::ping());
            println!("seymour_core version={}", seymour_core::core_version());
            ExitCode::SUCCESS
        }
        [command, file] if command == "check" => check(Path::new(file)),
        _ => {
            eprintln!("usage: seymour_cli [check <project-file>]");
            ExitCode::from(2)
        }
    }
}

fn check(path: &Path) -> ExitCode {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) => {
            eprintln!("{}: cannot read: {err}", path.display());
            return ExitCode::FAILURE;
        }
    };

    match seymour_core::parse_project(&bytes) {
        Ok(document) => {
            println!("title={}", document.title);
            println!("chapters={}", document.manuscript.len());
            println!("words={}", document.word_count());
            println!("lore_folders={}", document.lore.folders.len());
            println!("lore_entities={}", document.lore.entities.len());
            println!("maps={}", document.maps.len());
            println!("timeline_events={}", document.timeline.len());
            println!("relationship_graphs={}", document.relationships.len());
            if !document.extra.is_empty() {
                let keys = document.extra.keys().cloned().collect::<Vec<_>>();
                println!("unmodeled_fields={}", keys.join(","));
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("{}: {err}", path.display());
            ExitCode::FAILURE
        }
    }
}
