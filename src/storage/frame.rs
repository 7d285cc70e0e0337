use crate::storage::error::StorageError;
use polars::prelude::*;
use std::fs::File;
use std::path::Path;

/// Loads one or more yearly archive files into a single `LazyFrame`, in the order
/// given. Columns are the archive's field names (`fecha`, `tmed`, `prec`, ...).
///
/// An empty `paths` slice yields an empty frame.
pub fn load_archive_frame<P: AsRef<Path>>(paths: &[P]) -> Result<LazyFrame, StorageError> {
    let mut frames = Vec::with_capacity(paths.len());
    for path in paths {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| StorageError::Read(path.to_path_buf(), e))?;
        let df = JsonReader::new(file)
            .finish()
            .map_err(|e| StorageError::Frame(path.to_path_buf(), e))?;
        frames.push(df.lazy());
    }

    match frames.len() {
        0 => Ok(DataFrame::empty().lazy()),
        1 => Ok(frames.remove(0)),
        _ => {
            let first = paths[0].as_ref().to_path_buf();
            concat(
                frames,
                UnionArgs {
                    to_supertypes: true,
                    ..Default::default()
                },
            )
            .map_err(|e| StorageError::Frame(first, e))
        }
    }
}
