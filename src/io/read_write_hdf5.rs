//! `Hdf5` functions to write ndarrays
use crate::error::Result;
use hdf5::H5Type;
use ndarray::{Array, Array1, ArrayBase, ArrayD, Dimension};
use std::path::Path;

/// Open file for appending, create it if it does not exist
fn open_or_create(filename: &str) -> hdf5::Result<hdf5::File> {
    if Path::new(filename).exists() {
        hdf5::File::append(filename)
    } else {
        hdf5::File::create(filename)
    }
}

/// Read scalar from hdf5
///
/// # Errors
/// When file or variable does not exists, or the variable
/// is not a single value.
pub fn read_scalar_from_hdf5<T>(filename: &str, name: &str) -> Result<T>
where
    T: H5Type + Clone + Copy,
{
    let file = hdf5::File::open(filename)?;
    let dset = file.dataset(name)?;
    let scalar: Array1<T> = dset.read()?;
    scalar
        .first()
        .copied()
        .ok_or_else(|| hdf5::Error::Internal(format!("{} is empty", name)).into())
}

/// Interface to write scalar to hdf5 file
///
/// # Errors
/// When file can not be opened.
pub fn write_scalar_to_hdf5<T>(filename: &str, name: &str, scalar: T) -> Result<()>
where
    T: H5Type + Copy,
{
    let x = Array1::<T>::from_elem(1, scalar);
    write_to_hdf5(filename, name, &x)
}

/// Read ndarray from hdf5 file
///
/// # Errors
/// Errors when file/variable does not exist or
/// when the stored array has another dimensionality.
pub fn read_from_hdf5<A, D>(filename: &str, varname: &str) -> Result<Array<A, D>>
where
    A: H5Type,
    D: Dimension,
{
    // Open file
    let file = hdf5::File::open(filename)?;

    //Read dataset
    let data = file.dataset(varname)?;
    let y: ArrayD<A> = data.read_dyn::<A>()?;

    // Dyn to static
    let x = y
        .into_dimensionality::<D>()
        .map_err(|e| hdf5::Error::Internal(e.to_string()))?;
    Ok(x)
}

/// Write ndarray to hdf5 file
///
/// # Errors
/// When file can not be opened or when file and
/// variable exists, but variable has different
/// shape than input array (assign new value will fail).
pub fn write_to_hdf5<A, S, D>(filename: &str, varname: &str, array: &ArrayBase<S, D>) -> Result<()>
where
    A: H5Type,
    S: ndarray::Data<Elem = A>,
    D: ndarray::Dimension,
{
    let file = open_or_create(filename)?;

    //Write dataset
    let dset = match file.dataset(varname) {
        // Overwrite
        Ok(dset) => dset,
        // Create new dataset
        Err(..) => file
            .new_dataset::<A>()
            .no_chunk()
            .shape(array.shape())
            .create(varname)?,
    };
    dset.write(&array.view())?;
    Ok(())
}

/// Attach a scalar attribute to an existing dataset
///
/// # Errors
/// File or dataset does not exist
pub fn write_attribute(filename: &str, varname: &str, attr: &str, value: f64) -> Result<()> {
    let file = open_or_create(filename)?;
    let dset = file.dataset(varname)?;
    let a = match dset.attr(attr) {
        Ok(a) => a,
        Err(..) => dset.new_attr::<f64>().shape(()).create(attr)?,
    };
    a.write_scalar(&value)?;
    Ok(())
}

/// Read a scalar attribute of a dataset
///
/// # Errors
/// File, dataset or attribute does not exist
pub fn read_attribute(filename: &str, varname: &str, attr: &str) -> Result<f64> {
    let file = hdf5::File::open(filename)?;
    let value = file.dataset(varname)?.attr(attr)?.read_scalar::<f64>()?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    #[test]
    fn test_hdf5_array_and_attribute() {
        let path = std::env::temp_dir().join("rustibm_test_io.h5");
        let filename = path.to_str().unwrap();
        let _ = std::fs::remove_file(&path);
        let p = Array2::from_shape_fn((3, 4), |(i, j)| (i * 4 + j) as f64);
        write_to_hdf5(filename, "p", &p).unwrap();
        write_attribute(filename, "p", "time", 1.25).unwrap();
        write_scalar_to_hdf5(filename, "step", 7_usize).unwrap();
        let q: Array2<f64> = read_from_hdf5(filename, "p").unwrap();
        assert_eq!(p, q);
        assert_eq!(read_attribute(filename, "p", "time").unwrap(), 1.25);
        assert_eq!(read_scalar_from_hdf5::<usize>(filename, "step").unwrap(), 7);
        std::fs::remove_file(&path).unwrap();
    }
}
