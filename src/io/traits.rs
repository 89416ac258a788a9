//! `ReadWrite` trait
use super::read_write_hdf5::{read_from_hdf5, write_to_hdf5};
use crate::error::{Error, Result};
use ndarray::{ArrayBase, Data, DataMut, Dimension};
use tracing::{error, info};

/// Read and write arrays (hdf5)
pub trait ReadWrite {
    /// Read data from hdf5 file
    ///
    /// # Errors
    /// Can't read file or shape differs
    fn read(&mut self, filename: &str, varname: &str) -> Result<()>;
    /// Read data from hdf5 file and handle result
    fn read_unwrap(&mut self, filename: &str, varname: &str);
    /// Write data to hdf5 file
    ///
    /// # Errors
    /// Can't write file
    fn write(&self, filename: &str, varname: &str) -> Result<()>;
    /// Write data to hdf5 file and handle result
    fn write_unwrap(&self, filename: &str, varname: &str);
}

impl<S, D> ReadWrite for ArrayBase<S, D>
where
    S: Data<Elem = f64> + DataMut,
    D: Dimension,
{
    fn read(&mut self, filename: &str, varname: &str) -> Result<()> {
        let data = read_from_hdf5::<f64, D>(filename, varname)?;
        if data.shape() == self.shape() {
            self.assign(&data);
            Ok(())
        } else {
            Err(Error::SizeMismatch {
                expected: self.len(),
                found: data.len(),
            })
        }
    }

    fn read_unwrap(&mut self, filename: &str, varname: &str) {
        match self.read(filename, varname) {
            Ok(_) => info!("read {} from {}", varname, filename),
            Err(e) => error!("while reading {} from {}: {}", varname, filename, e),
        }
    }

    fn write(&self, filename: &str, varname: &str) -> Result<()> {
        write_to_hdf5(filename, varname, self)
    }

    fn write_unwrap(&self, filename: &str, varname: &str) {
        if let Err(e) = self.write(filename, varname) {
            error!("while writing {} to {}: {}", varname, filename, e);
        }
    }
}
