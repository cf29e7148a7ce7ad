//! Read-only conflict status for a repository.

use std::path::Path;

use anyhow::{Context, Result};
use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};
use serde::Serialize;

use mergeflow_core::conflict::classify;
use mergeflow_core::git::{inspect_operation, GitStatusReader, OperationContext};
use mergeflow_core::workflow::{FileState, FileView};
use mergeflow_core::ManualResolutions;

use crate::style;

#[derive(Serialize)]
struct StatusReport {
    operation: Option<OperationContext>,
    conflicted: usize,
    files: Vec<FileView>,
}

/// Print the in-progress operation and its unmerged files.
pub fn run_status(repo: &Path, json: bool) -> Result<()> {
    let reader = GitStatusReader::new(repo).context("failed to open repository")?;
    let operation =
        inspect_operation(reader.repo_path()).context("failed to inspect repository state")?;
    let snapshot = reader.snapshot().context("failed to read working directory")?;

    // Outside a session there are no manual choices, so only edits count.
    let set = classify(&snapshot, &ManualResolutions::new());
    let files: Vec<FileView> = set
        .unmerged
        .iter()
        .map(|file| FileView {
            path: file.path.clone(),
            kind: file.kind.clone(),
            state: if set.conflicted.iter().any(|c| c.path == file.path) {
                FileState::Conflicted
            } else {
                FileState::ResolvedByEdit
            },
        })
        .collect();

    let report = StatusReport {
        operation,
        conflicted: set.conflicted.len(),
        files,
    };

    if json {
        let out = serde_json::to_string_pretty(&report).context("failed to encode status")?;
        println!("{}", out);
        return Ok(());
    }

    println!();
    let Some(ref context) = report.operation else {
        println!("{}", style::success("No merge, rebase or cherry-pick in progress"));
        println!();
        return Ok(());
    };

    let title = style::operation_title(
        context.kind,
        &context.our_branch,
        context.their_branch.as_deref(),
    );
    println!("{}", style::header(&title));
    println!();

    if report.files.is_empty() {
        println!("{}", style::dim("No unmerged files."));
    } else {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_content_arrangement(ContentArrangement::Dynamic);
        table.set_header(vec!["File", "Status", "State"]);
        for file in &report.files {
            table.add_row(vec![
                Cell::new(&file.path),
                Cell::new(file.kind.to_string()),
                Cell::new(style::file_state(&file.state)),
            ]);
        }
        println!("{}", table);
    }

    println!();
    if report.conflicted == 0 {
        println!(
            "{}",
            style::success(&format!("Ready to continue the {}", context.kind))
        );
    } else {
        println!(
            "{}",
            style::warn(&format!(
                "{} conflicted file(s) remain. Run 'mergeflow resolve' to work through them.",
                report.conflicted
            ))
        );
    }
    println!();
    Ok(())
}
