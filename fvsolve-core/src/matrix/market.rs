//! Matrix Market coordinate export.

use super::{SparseBackend, SparseMatrix};
use crate::error::Result;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

const HEADER: &str = "%%MatrixMarket matrix coordinate real general";

impl<B: SparseBackend> SparseMatrix<B> {
    /// Write the assembled matrix in Matrix Market coordinate format,
    /// 1-indexed, row-major.
    pub fn write_matrix_market<W: Write>(&mut self, mut writer: W) -> Result<()> {
        let csr = self.to_csr()?;
        writeln!(writer, "{HEADER}")?;
        writeln!(writer, "{} {} {}", csr.nrows(), csr.ncols(), csr.nnz())?;
        for (row, col, value) in csr.triplet_iter() {
            writeln!(writer, "{} {} {}", row + 1, col + 1, value)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Write the matrix to a `.mtx` file at `path`.
    pub fn export_matrix_market(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        log::debug!("exporting {:?} matrix to {}", self.shape(), path.display());
        let file = File::create(path)?;
        self.write_matrix_market(BufWriter::new(file))
    }
}

#[cfg(test)]
mod tests {
    use crate::matrix::{CooStore, MatrixConfig, SparseMatrix};

    #[test]
    fn test_coordinate_lines_are_one_indexed() {
        let mut m = SparseMatrix::<CooStore>::new(2, 3, &MatrixConfig::default());
        m.put(&[1.5, -2.0], &[1, 0], &[2, 0]).unwrap();

        let mut out = Vec::new();
        m.write_matrix_market(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert_eq!(
            text,
            "%%MatrixMarket matrix coordinate real general\n2 3 2\n1 1 -2\n2 3 1.5\n"
        );
    }

    #[test]
    fn test_export_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("identity.mtx");

        let mut eye = SparseMatrix::<CooStore>::identity(3, &MatrixConfig::default()).unwrap();
        eye.export_matrix_market(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[1], "3 3 3");
        assert_eq!(&lines[2..], &["1 1 1", "2 2 1", "3 3 1"]);
    }
}
