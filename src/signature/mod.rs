//! Dataset content signatures.
//!
//! After a dataset directory validates, its contents can be signed: a SHA-256
//! digest over every file is written to [`VALIDATOR_LOG_FILE`] at the dataset
//! root. [`verify_signature`] later recomputes the digest and compares, so
//! any change made after validation is detected.

use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use crate::error::AnnoguardError;

/// Log file holding the signature. Excluded from the digest.
pub const VALIDATOR_LOG_FILE: &str = "dataset_validator_log.txt";

const SIGNED_PREFIX: &str = "Validation passed and signed: ";

/// Computes the content digest of a dataset directory.
///
/// Files are visited in sorted relative-path order. For each file the
/// aggregate absorbs the `/`-separated relative path, a zero byte and the
/// file's own SHA-256 digest.
pub fn hash_dataset(root: &Path) -> Result<String, AnnoguardError> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(true) {
        let entry = entry.map_err(io::Error::from)?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }

    let mut files: Vec<(String, PathBuf)> = files
        .into_iter()
        .map(|path| (rel_string(root, &path), path))
        .filter(|(rel, _)| rel != VALIDATOR_LOG_FILE)
        .collect();
    files.sort();

    let mut aggregate = Sha256::new();
    for (rel, path) in &files {
        let digest = file_sha256(path)?;
        aggregate.update(rel.as_bytes());
        aggregate.update([0u8]);
        aggregate.update(&digest);
    }

    let digest = hex::encode(aggregate.finalize());
    tracing::debug!(root = %root.display(), files = files.len(), %digest, "dataset hashed");
    Ok(digest)
}

fn file_sha256(path: &Path) -> Result<Vec<u8>, AnnoguardError> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut hasher = Sha256::new();
    io::copy(&mut reader, &mut hasher)?;
    Ok(hasher.finalize().to_vec())
}

fn rel_string(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Writes the validator log carrying `digest`.
pub fn sign_dataset(root: &Path, digest: &str) -> Result<(), AnnoguardError> {
    let path = root.join(VALIDATOR_LOG_FILE);
    let body = format!(
        "annoguard {}\n{}{}\n",
        env!("CARGO_PKG_VERSION"),
        SIGNED_PREFIX,
        digest
    );
    fs::write(&path, body)?;
    tracing::info!(path = %path.display(), "dataset signed");
    Ok(())
}

/// Finds the signature in a validator log: the 64 lowercase hex characters
/// following the first `Validation passed and signed: ` marker.
pub fn extract_signature(text: &str) -> Option<&str> {
    text.lines().find_map(|line| {
        let (_, rest) = line.split_once(SIGNED_PREFIX)?;
        let candidate = rest.get(..64)?;
        let is_digest = candidate
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        let terminated = !rest[64..].starts_with(|c: char| c.is_ascii_alphanumeric());
        (is_digest && terminated).then_some(candidate)
    })
}

/// Checks that the dataset still matches its signature.
///
/// Returns the verified digest.
///
/// # Errors
/// [`AnnoguardError::SignatureMissing`] if there is no log or it carries no
/// signature; [`AnnoguardError::SignatureMismatch`] if the contents changed.
pub fn verify_signature(root: &Path) -> Result<String, AnnoguardError> {
    let path = root.join(VALIDATOR_LOG_FILE);
    let text = match fs::read_to_string(&path) {
        Ok(text) => text,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            return Err(AnnoguardError::SignatureMissing { path })
        }
        Err(err) => return Err(AnnoguardError::Io(err)),
    };
    let Some(found) = extract_signature(&text) else {
        return Err(AnnoguardError::SignatureMissing { path });
    };

    let expected = hash_dataset(root)?;
    tracing::info!(signature = found, computed = %expected, "verifying dataset signature");
    if expected != found {
        return Err(AnnoguardError::SignatureMismatch {
            expected,
            found: found.to_string(),
        });
    }
    Ok(expected)
}
