//! Zip extraction and creation.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::domain::Result;
use crate::tree::remove_path;

/// Extract `archive` into `dest`, deleting `dest` first.
pub fn extract_zip(archive: &Path, dest: &Path) -> Result<()> {
    remove_path(dest)?;
    fs::create_dir_all(dest)?;
    let mut zip = ZipArchive::new(File::open(archive)?)?;
    zip.extract(dest)?;
    Ok(())
}

/// Zip the contents of `src_dir` into `archive`; entry names are
/// relative to `src_dir`. Entries are written in sorted order and unix
/// permissions are kept so start scripts stay executable.
pub fn zip_dir(src_dir: &Path, archive: &Path) -> Result<()> {
    let mut writer = ZipWriter::new(File::create(archive)?);
    let base = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for path in walk_sorted(src_dir)? {
        let rel = path
            .strip_prefix(src_dir)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        let name = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        let options = with_mode(base, &path)?;

        if path.is_dir() {
            writer.add_directory(format!("{name}/"), options)?;
        } else {
            writer.start_file(name, options)?;
            let mut file = File::open(&path)?;
            io::copy(&mut file, &mut writer)?;
        }
    }

    writer.finish()?;
    Ok(())
}

#[cfg(unix)]
fn with_mode(options: SimpleFileOptions, path: &Path) -> io::Result<SimpleFileOptions> {
    use std::os::unix::fs::PermissionsExt;
    let mode = fs::metadata(path)?.permissions().mode();
    Ok(options.unix_permissions(mode & 0o7777))
}

#[cfg(not(unix))]
fn with_mode(options: SimpleFileOptions, _path: &Path) -> io::Result<SimpleFileOptions> {
    Ok(options)
}

/// All files and directories under `dir` (excluding `dir`), sorted.
fn walk_sorted(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut entries: Vec<PathBuf> = fs::read_dir(dir)?
        .map(|e| e.map(|e| e.path()))
        .collect::<io::Result<_>>()?;
    entries.sort();

    let mut out = Vec::new();
    for path in entries {
        let is_dir = path.is_dir();
        out.push(path.clone());
        if is_dir {
            out.extend(walk_sorted(&path)?);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zip_then_extract_restores_layout() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("tree");
        fs::create_dir_all(src.join("mods")).unwrap();
        fs::create_dir_all(src.join("config/empty")).unwrap();
        fs::write(src.join("mods/C.jar"), b"jar").unwrap();
        fs::write(src.join("server.properties"), b"motd=hi").unwrap();

        let archive = dir.path().join("tree.zip");
        zip_dir(&src, &archive).unwrap();

        let out = dir.path().join("out");
        fs::create_dir_all(&out).unwrap();
        fs::write(out.join("leftover.txt"), b"x").unwrap();
        extract_zip(&archive, &out).unwrap();

        assert_eq!(fs::read(out.join("mods/C.jar")).unwrap(), b"jar");
        assert_eq!(fs::read(out.join("server.properties")).unwrap(), b"motd=hi");
        assert!(out.join("config/empty").is_dir());
        assert!(!out.join("leftover.txt").exists());
    }

    #[test]
    fn entry_names_are_relative() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("tree");
        fs::create_dir_all(src.join("mods")).unwrap();
        fs::write(src.join("mods/A.jar"), b"a").unwrap();

        let archive = dir.path().join("tree.zip");
        zip_dir(&src, &archive).unwrap();

        let zip = ZipArchive::new(File::open(&archive).unwrap()).unwrap();
        let names: Vec<_> = zip.file_names().map(str::to_string).collect();
        assert!(names.contains(&"mods/".to_string()));
        assert!(names.contains(&"mods/A.jar".to_string()));
        assert!(names.iter().all(|n| !n.starts_with('/') && !n.contains("tree")));
    }

    #[cfg(unix)]
    #[test]
    fn executable_bit_survives() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("tree");
        fs::create_dir_all(&src).unwrap();
        let script = src.join("ServerStart.sh");
        fs::write(&script, b"#!/bin/sh\n").unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();

        let archive = dir.path().join("tree.zip");
        zip_dir(&src, &archive).unwrap();

        let mut zip = ZipArchive::new(File::open(&archive).unwrap()).unwrap();
        let entry = zip.by_name("ServerStart.sh").unwrap();
        assert_eq!(entry.unix_mode().map(|m| m & 0o777), Some(0o755));
    }
}
