//! Tar encoding for transfers into and out of an environment.
//!
//! Pushes produce an archive whose entries are named relative to the
//! destination directory. Pulls receive an archive rooted at the source
//! directory's basename and strip that single top-level component.

use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};

use tar::{Archive, Builder, EntryType, Header};

/// One regular file read out of an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveFile {
    pub path: String,
    pub mode: u32,
    pub data: Vec<u8>,
}

/// Archive a single host file under `name`, preserving its mode bits.
pub fn encode_file(host_path: &Path, name: &str) -> io::Result<Vec<u8>> {
    let mut builder = Builder::new(Vec::new());
    builder.append_path_with_name(host_path, name)?;
    builder.into_inner()
}

/// Archive a host directory tree with every entry under `root_name/`.
pub fn encode_directory(host_dir: &Path, root_name: &str) -> io::Result<Vec<u8>> {
    let mut builder = Builder::new(Vec::new());
    builder.follow_symlinks(false);
    builder.append_dir_all(root_name, host_dir)?;
    builder.into_inner()
}

/// Archive in-memory files; paths are used verbatim as entry names.
pub fn encode_files(files: &[ArchiveFile]) -> io::Result<Vec<u8>> {
    let mut builder = Builder::new(Vec::new());
    for file in files {
        let mut header = Header::new_gnu();
        header.set_entry_type(EntryType::Regular);
        header.set_size(file.data.len() as u64);
        header.set_mode(file.mode);
        header.set_cksum();
        builder.append_data(&mut header, &file.path, file.data.as_slice())?;
    }
    builder.into_inner()
}

/// Read every regular file of an archive into memory.
pub fn read_files(bytes: &[u8]) -> io::Result<Vec<ArchiveFile>> {
    let mut archive = Archive::new(bytes);
    let mut files = Vec::new();
    for entry in archive.entries()? {
        let mut entry = entry?;
        if !entry.header().entry_type().is_file() {
            continue;
        }
        let path = normalize(&entry.path()?);
        let mode = entry.header().mode()?;
        let mut data = Vec::new();
        entry.read_to_end(&mut data)?;
        files.push(ArchiveFile {
            path: path.to_string_lossy().into_owned(),
            mode,
            data,
        });
    }
    Ok(files)
}

/// Unpack into `dest`, dropping the first path component of every entry.
///
/// Entries that would escape `dest` are skipped. Returns the number of
/// regular files written.
pub fn unpack_stripped(bytes: &[u8], dest: &Path) -> io::Result<usize> {
    std::fs::create_dir_all(dest)?;
    let mut archive = Archive::new(bytes);
    let mut written = 0;

    for entry in archive.entries()? {
        let mut entry = entry?;
        let relative: PathBuf = normalize(&entry.path()?).components().skip(1).collect();
        if relative.as_os_str().is_empty() || !is_contained(&relative) {
            continue;
        }

        let target = dest.join(&relative);
        let kind = entry.header().entry_type();
        if kind.is_dir() {
            std::fs::create_dir_all(&target)?;
        } else if kind.is_file() {
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            entry.unpack(&target)?;
            written += 1;
        }
    }
    Ok(written)
}

fn normalize(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

fn is_contained(path: &Path) -> bool {
    path.components().all(|c| matches!(c, Component::Normal(_)))
}
