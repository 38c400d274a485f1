//! Operation reports.

use comfy_table::presets::ASCII_FULL;
use comfy_table::{ContentArrangement, Table};
use kvsync_protocol::{decode_value, Batch, Operation, OperationType};

/// Receives the operations of a run for display.
pub trait Reporter: Send + Sync {
    /// Called once per batch, numbered from 1. `committed` is false for a
    /// dry run, where the batch is only planned.
    fn batch(&self, number: usize, batch: &Batch, committed: bool);

    /// Called with the deletes that made the delete policy abort the run.
    fn blocked_deletes(&self, deletes: &[Operation]);
}

/// Prints ASCII tables to stdout.
#[derive(Debug, Clone, Default)]
pub struct TableReporter {
    show_values: bool,
}

impl TableReporter {
    /// Creates a reporter; with `show_values` a column of decoded values
    /// is added.
    pub fn new(show_values: bool) -> Self {
        Self { show_values }
    }

    pub(crate) fn table<'a>(
        &self,
        batch_number: Option<usize>,
        operations: impl IntoIterator<Item = &'a Operation>,
    ) -> Table {
        let mut header = vec!["BATCH", "", "OPERATION NAME", "CONSUL VERB", "PATH"];
        if self.show_values {
            header.push("VALUE");
        }

        let mut table = Table::new();
        table
            .load_preset(ASCII_FULL)
            .set_content_arrangement(ContentArrangement::Disabled)
            .set_header(header);

        let batch = batch_number.map(|n| n.to_string()).unwrap_or_default();
        for op in operations {
            let marker = if op.is_delete() { "!!" } else { "" };
            let mut row = vec![
                batch.clone(),
                marker.to_string(),
                op.op_type().name().to_string(),
                op.verb().to_string(),
                op.path().to_string(),
            ];
            if self.show_values {
                row.push(
                    op.value()
                        .and_then(decode_value)
                        .unwrap_or_default(),
                );
            }
            table.add_row(row);
        }
        table
    }
}

impl Reporter for TableReporter {
    fn batch(&self, number: usize, batch: &Batch, committed: bool) {
        let state = if committed { "committed" } else { "planned" };
        println!();
        println!(
            "Batch {} ({}): {} inserts, {} updates, {} deletes, {} bytes",
            number,
            state,
            batch.count(OperationType::Insert),
            batch.count(OperationType::Update),
            batch.count(OperationType::Delete),
            batch.payload_size()
        );
        println!("{}", self.table(Some(number), batch.operations()));
    }

    fn blocked_deletes(&self, deletes: &[Operation]) {
        println!();
        println!("{}", self.table(None, deletes));
    }
}

/// Discards every report. Used where a table cannot be rendered.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentReporter;

impl Reporter for SilentReporter {
    fn batch(&self, _number: usize, _batch: &Batch, _committed: bool) {}

    fn blocked_deletes(&self, _deletes: &[Operation]) {}
}
