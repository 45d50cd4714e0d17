use std::{
    fs::{self, create_dir_all, File},
    io::{Error, ErrorKind, Write},
    path::{Path, PathBuf},
};

use burn::data::network::downloader;

/// Download pretrained weights for an encoder family into `~/.cache/<family>-burn`,
/// returning the cached file when it already exists.
pub(crate) fn download(family: &'static str, url: &str) -> Result<PathBuf, Error> {
    let cache_dir = dirs::home_dir()
        .ok_or_else(|| Error::new(ErrorKind::NotFound, "home directory is not available"))?
        .join(".cache")
        .join(format!("{family}-burn"));

    if !cache_dir.exists() {
        create_dir_all(&cache_dir)?;
    }

    let file_base_name = url
        .rsplit_once('/')
        .map(|(_, name)| name)
        .ok_or_else(|| Error::new(ErrorKind::InvalidInput, format!("invalid url: {url}")))?;
    let file_name = cache_dir.join(file_base_name);

    if file_name.exists() {
        log::debug!("Using cached weights {}", file_name.display());
        return Ok(file_name);
    }

    log::info!("Downloading {url}");
    let bytes = downloader::download_file_as_bytes(url, file_base_name);

    store(&file_name, &bytes)?;

    Ok(file_name)
}

/// Write `bytes` to `<file_name>.part` and rename it into place, so an interrupted
/// write never leaves a truncated file at the cache path.
fn store(file_name: &Path, bytes: &[u8]) -> Result<(), Error> {
    let mut partial = file_name.as_os_str().to_owned();
    partial.push(".part");
    let partial = PathBuf::from(partial);

    let written = File::create(&partial)
        .and_then(|mut file| {
            file.write_all(bytes)?;
            file.sync_all()
        })
        .and_then(|()| fs::rename(&partial, file_name));

    if written.is_err() {
        let _ = fs::remove_file(&partial);
    }
    written
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("segmentation-factory-burn-{name}"));
        let _ = fs::remove_dir_all(&dir);
        create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn store_leaves_only_the_complete_file() {
        let dir = scratch_dir("store");
        let file_name = dir.join("weights.pth");

        store(&file_name, b"weights").unwrap();

        assert_eq!(fs::read(&file_name).unwrap(), b"weights");
        assert!(!dir.join("weights.pth.part").exists());
    }

    #[test]
    fn failed_store_leaves_no_cache_entry() {
        let dir = scratch_dir("failed-store");
        // Renaming a file onto a non-empty directory fails.
        let file_name = dir.join("weights.pth");
        create_dir_all(file_name.join("occupied")).unwrap();

        assert!(store(&file_name, b"weights").is_err());
        assert!(!dir.join("weights.pth.part").exists());
        assert!(file_name.is_dir());
    }
}
