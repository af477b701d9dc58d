use std::ffi::OsStr;
use std::fs;
use std::io;
use std::io::{BufReader, Read};
use std::path::Path;

use log::trace;
use rust_embed::RustEmbed;
use serde::de::DeserializeOwned;

mod macros;

#[derive(RustEmbed)]
#[folder = "resources/"]
pub struct Resources;

pub fn toml_from_reader<R, T>(reader: R) -> anyhow::Result<T>
where
    R: Read,
    T: DeserializeOwned,
{
    let mut reader = BufReader::new(reader);
    let mut data = String::with_capacity(16 * 1024);
    reader.read_to_string(&mut data)?;
    Ok(toml::from_str(&data)?)
}

pub fn read(path: impl AsRef<Path>) -> io::Result<Vec<u8>> {
    trace!("reading from: {}", path.as_ref().display());
    fs::read(path)
}

pub fn write(path: impl AsRef<Path>, contents: impl AsRef<[u8]>) -> io::Result<()> {
    trace!("writing to: {}", path.as_ref().display());
    fs::write(path, contents)
}

pub fn create_dir_all(path: impl AsRef<Path>) -> io::Result<()> {
    trace!("creating directory: {}", path.as_ref().display());
    fs::create_dir_all(path)
}

pub trait PathExt {
    #[must_use]
    fn has_extension<E>(&self, extension: E) -> bool
    where
        for<'a> &'a OsStr: PartialEq<E>;

    /// Returns the file name as a `str`, if it has one that is valid unicode.
    #[must_use]
    fn file_name_str(&self) -> Option<&str>;
}

impl PathExt for Path {
    fn has_extension<E>(&self, extension: E) -> bool
    where
        for<'a> &'a OsStr: PartialEq<E>,
    {
        self.extension().map_or(false, |ext| ext == extension)
    }

    fn file_name_str(&self) -> Option<&str> {
        self.file_name().and_then(OsStr::to_str)
    }
}

pub trait ArrayExt<T, const N: usize> {
    #[must_use]
    fn init_with(f: impl FnMut(usize) -> T) -> [T; N];
}

impl<T, const N: usize> ArrayExt<T, N> for [T; N] {
    fn init_with(mut f: impl FnMut(usize) -> T) -> [T; N] {
        let mut i = 0;
        [(); N].map(|_| {
            let value = f(i);
            i += 1;
            value
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::path::PathBuf;

    use pretty_assertions::assert_eq;

    #[test]
    fn test_init_with() {
        assert_eq!(<[usize; 4]>::init_with(|i| i * 2), [0, 2, 4, 6]);
    }

    #[test]
    fn test_has_extension() {
        assert!(PathBuf::from("clients/Doe Jane.xlsx").has_extension("xlsx"));
        assert!(!PathBuf::from("clients/Doe Jane.xlsx").has_extension("ods"));
        assert!(!PathBuf::from("clients/README").has_extension("xlsx"));
    }

    #[test]
    fn test_default_logo_is_embedded() {
        assert!(Resources::get("logo.png").is_some());
    }
}
