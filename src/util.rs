//! Small helpers: bincode file persistence for configs and simulation
//! records.

use std::{fs, io, path::Path};

use bincode::{Decode, Encode};

pub fn save<T: Encode>(path: &Path, data: &T) -> io::Result<()> {
    let encoded = bincode::encode_to_vec(data, bincode::config::standard())
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    fs::write(path, encoded)
}

pub fn load<T: Decode<()>>(path: &Path) -> io::Result<T> {
    let bytes = fs::read(path)?;
    let (decoded, _len) = bincode::decode_from_slice(&bytes, bincode::config::standard())
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    Ok(decoded)
}
