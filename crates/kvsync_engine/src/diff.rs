//! Classification of local and live datasets into operations.

use crate::error::{SyncError, SyncResult};
use crate::template::render;
use kvsync_protocol::{
    encode_value, DeletePolicy, LiveDataset, LocalDataset, Operation, OperationSet,
};
use kvsync_source::SecretsMap;

/// Computes the operations that converge `live` onto `local`.
///
/// - Local entries with an empty value are skipped; the store cannot tell
///   an empty value from an absent key.
/// - Values are rendered against `secrets` (when given) and base64-encoded.
/// - A path in both datasets is an update only if the encoded values differ.
/// - A live path absent from `local` is a delete unless `policy` is
///   [`DeletePolicy::Skip`]. A local path with an empty value still counts
///   as present and is never deleted.
///
/// Inserts and updates come first in path order, followed by deletes in
/// path order.
pub fn diff(
    live: &LiveDataset,
    local: &LocalDataset,
    policy: DeletePolicy,
    secrets: Option<&SecretsMap>,
) -> SyncResult<OperationSet> {
    let mut builder = OperationSet::builder();

    for (path, raw) in local {
        if raw.is_empty() {
            continue;
        }

        let encoded = match secrets {
            Some(secrets) => {
                let rendered = render(raw, secrets).map_err(|e| SyncError::TemplateFailure {
                    path: path.clone(),
                    message: e.to_string(),
                })?;
                encode_value(&rendered)
            }
            None => encode_value(raw),
        };

        match live.get(path) {
            Some(current) if *current == encoded => {}
            Some(_) => {
                builder.push(Operation::update(path.clone(), encoded));
            }
            None => {
                builder.push(Operation::insert(path.clone(), encoded));
            }
        }
    }

    if policy.computes_deletes() {
        for path in live.keys() {
            if !local.contains_key(path) {
                builder.push(Operation::delete(path.clone()));
            }
        }
    }

    Ok(builder.build())
}
