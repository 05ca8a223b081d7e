use ndarray::{Array, ArrayBase, Data, Dimension};
use ndarray_npy::{
    NpzReader, NpzWriter, ReadNpyError, ReadNpyExt, ReadNpzError, ReadableElement,
    WritableElement, WriteNpyError, WriteNpyExt, WriteNpzError,
};
use std::fs::File;
use std::io::{self, BufReader, BufWriter};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArrayIoError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Failed to write .npy array: {0}")]
    WriteNpy(#[from] WriteNpyError),
    #[error("Failed to read .npy array: {0}")]
    ReadNpy(#[from] ReadNpyError),
    #[error("Failed to write .npz archive: {0}")]
    WriteNpz(#[from] WriteNpzError),
    #[error("Failed to read .npz archive: {0}")]
    ReadNpz(#[from] ReadNpzError),
}

/// Name of the `index`-th positional array in an archive, as `numpy.savez` assigns it.
pub fn archive_entry_name(index: usize) -> String {
    format!("arr_{index}")
}

fn entry_index(name: &str) -> Option<usize> {
    name.trim_end_matches(".npy")
        .strip_prefix("arr_")
        .and_then(|n| n.parse().ok())
}

pub fn write_npy<S, D>(path: &Path, array: &ArrayBase<S, D>) -> Result<(), ArrayIoError>
where
    S: Data,
    S::Elem: WritableElement,
    D: Dimension,
{
    let writer = BufWriter::new(File::create(path)?);
    array.write_npy(writer)?;
    Ok(())
}

pub fn read_npy<T, D>(path: &Path) -> Result<Array<T, D>, ArrayIoError>
where
    T: ReadableElement,
    D: Dimension,
{
    let reader = BufReader::new(File::open(path)?);
    Ok(Array::<T, D>::read_npy(reader)?)
}

/// Writes a sequence of arrays as positional entries `arr_0`, `arr_1`, ... of an
/// uncompressed `.npz` archive.
pub fn write_npz<'a, T, D, I>(path: &Path, arrays: I) -> Result<(), ArrayIoError>
where
    I: IntoIterator<Item = &'a Array<T, D>>,
    T: WritableElement + 'a,
    D: Dimension + 'a,
{
    let mut npz = NpzWriter::new(BufWriter::new(File::create(path)?));
    for (index, array) in arrays.into_iter().enumerate() {
        npz.add_array(archive_entry_name(index), array)?;
    }
    npz.finish()?;
    Ok(())
}

/// Reads the positional entries of an `.npz` archive in index order.
///
/// Entries that do not follow the `arr_<index>` convention are ignored.
pub fn read_npz<T, D>(path: &Path) -> Result<Vec<Array<T, D>>, ArrayIoError>
where
    T: ReadableElement,
    D: Dimension,
{
    let mut npz = NpzReader::new(BufReader::new(File::open(path)?))?;
    let mut entries: Vec<(usize, String)> = npz
        .names()?
        .into_iter()
        .filter_map(|name| entry_index(&name).map(|index| (index, name)))
        .collect();
    entries.sort_unstable_by_key(|(index, _)| *index);

    let mut arrays = Vec::with_capacity(entries.len());
    for (_, name) in entries {
        arrays.push(npz.by_name(&name)?);
    }
    Ok(arrays)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array1, Array2, Ix1, Ix2, array};
    use tempfile::tempdir;

    #[test]
    fn npy_file_holds_the_written_matrix() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("centers.npy");
        let centers = array![[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]];

        write_npy(&path, &centers).unwrap();
        let loaded: Array2<f64> = read_npy(&path).unwrap();
        assert_eq!(loaded, centers);
    }

    #[test]
    fn npz_entries_keep_their_positional_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dtrajs.npz");
        let dtrajs: Vec<Array1<i32>> = (0..12)
            .map(|i| Array1::from_elem(i + 1, i as i32))
            .collect();

        write_npz(&path, &dtrajs).unwrap();
        let loaded: Vec<Array<i32, Ix1>> = read_npz(&path).unwrap();
        assert_eq!(loaded.len(), 12);
        assert_eq!(loaded[10].len(), 11);
        assert!(loaded[10].iter().all(|&s| s == 10));
    }

    #[test]
    fn npz_with_ragged_matrices() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("features.npz");
        let features = vec![Array2::<f64>::zeros((5, 3)), Array2::<f64>::ones((2, 3))];

        write_npz(&path, &features).unwrap();
        let loaded: Vec<Array<f64, Ix2>> = read_npz(&path).unwrap();
        assert_eq!(loaded[0].dim(), (5, 3));
        assert_eq!(loaded[1].dim(), (2, 3));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempdir().unwrap();
        let result: Result<Array2<f64>, _> = read_npy(&dir.path().join("missing.npy"));
        assert!(matches!(result, Err(ArrayIoError::Io(_))));
    }

    #[test]
    fn entry_names_follow_numpy_convention() {
        assert_eq!(archive_entry_name(3), "arr_3");
        assert_eq!(entry_index("arr_12.npy"), Some(12));
        assert_eq!(entry_index("features"), None);
    }
}
