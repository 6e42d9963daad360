use std::path::Path;

use inkpad_core::export::render_notes_export;
use inkpad_core::gateway::RemoteGateway;
use inkpad_core::NoteStore;

use crate::cli::ExportFormat;
use crate::error::CliError;

pub async fn run_export<G: RemoteGateway>(
    store: &NoteStore<G>,
    format: ExportFormat,
    output_path: Option<&Path>,
) -> Result<(), CliError> {
    let state = store.snapshot().await;
    let rendered = render_notes_export(&state.notes, &state.groups, format.into())?;

    if let Some(path) = output_path {
        std::fs::write(path, rendered)?;
        println!("{}", path.display());
    } else {
        println!("{rendered}");
    }

    Ok(())
}
