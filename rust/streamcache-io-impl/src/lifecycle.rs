//! Binding of spool files to the unit of work that owns them.

use std::sync::Arc;

use log::{debug, warn};
use streamcache_io::UnitOfWork;

use crate::spool_file::SpoolFile;

/// Registers deletion of `file` on completion of `unit_of_work`.
///
/// The file is deleted whatever the outcome. Failures cannot be reported to
/// anyone from inside the callback, so they are logged.
pub fn bind(unit_of_work: &dyn UnitOfWork, file: Arc<SpoolFile>) {
    debug!(
        "spool file '{}' bound to unit of work",
        file.path().display()
    );
    unit_of_work.on_completion(Box::new(move |outcome| match file.delete() {
        Ok(true) => debug!(
            "unit of work completed ({outcome:?}), removed spool file '{}'",
            file.path().display()
        ),
        Ok(false) => (),
        Err(e) => warn!("failed to remove spool file on completion: {e}"),
    }));
}
