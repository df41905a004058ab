//! Execution policy selection.
//!
//! The selector only chooses a disposition. Whether an execution already exists under the identity
//! is decided by the workflow engine when it applies the disposition's reuse and conflict policies.

use wfgate_types::Disposition;

pub fn select_disposition(force_rerun: bool) -> Disposition {
    if force_rerun { Disposition::ForceNew } else { Disposition::AttachOrStart }
}
