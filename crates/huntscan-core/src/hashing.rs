use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use blake2::Blake2b512;
use digest::Digest;
use md5::Md5;
use sha1::Sha1;
use sha2::Sha256;
use sha3::Sha3_256;

use crate::types::HashAlgorithm;

const READ_BUFFER_SIZE: usize = 64 * 1024;

/// One streaming pass over `path`, computing every algorithm in `algorithms`
/// at once (§4.3 step 3: "compute all requested hashes in a single
/// streaming pass (64 KiB buffer) over the file"). An empty `algorithms`
/// never opens the file (§8 boundary property).
pub fn compute_hashes(
    path: &Path,
    algorithms: &[HashAlgorithm],
) -> io::Result<BTreeMap<String, String>> {
    if algorithms.is_empty() {
        return Ok(BTreeMap::new());
    }

    let mut file = File::open(path)?;
    let mut md5 = algorithms.contains(&HashAlgorithm::Md5).then(Md5::new);
    let mut sha1 = algorithms.contains(&HashAlgorithm::Sha1).then(Sha1::new);
    let mut sha256 = algorithms
        .contains(&HashAlgorithm::Sha256)
        .then(Sha256::new);
    let mut sha3_256 = algorithms
        .contains(&HashAlgorithm::Sha3_256)
        .then(Sha3_256::new);
    let mut blake2b = algorithms
        .contains(&HashAlgorithm::Blake2b)
        .then(Blake2b512::new);

    let mut buf = vec![0u8; READ_BUFFER_SIZE];
    loop {
        let read = file.read(&mut buf)?;
        if read == 0 {
            break;
        }
        let chunk = &buf[..read];
        if let Some(h) = md5.as_mut() {
            h.update(chunk);
        }
        if let Some(h) = sha1.as_mut() {
            h.update(chunk);
        }
        if let Some(h) = sha256.as_mut() {
            h.update(chunk);
        }
        if let Some(h) = sha3_256.as_mut() {
            h.update(chunk);
        }
        if let Some(h) = blake2b.as_mut() {
            h.update(chunk);
        }
    }

    let mut out = BTreeMap::new();
    if let Some(h) = md5 {
        out.insert(HashAlgorithm::Md5.label().to_string(), hex_digest(h.finalize()));
    }
    if let Some(h) = sha1 {
        out.insert(HashAlgorithm::Sha1.label().to_string(), hex_digest(h.finalize()));
    }
    if let Some(h) = sha256 {
        out.insert(
            HashAlgorithm::Sha256.label().to_string(),
            hex_digest(h.finalize()),
        );
    }
    if let Some(h) = sha3_256 {
        out.insert(
            HashAlgorithm::Sha3_256.label().to_string(),
            hex_digest(h.finalize()),
        );
    }
    if let Some(h) = blake2b {
        out.insert(
            HashAlgorithm::Blake2b.label().to_string(),
            hex_digest(h.finalize()),
        );
    }
    Ok(out)
}

fn hex_digest(bytes: impl AsRef<[u8]>) -> String {
    bytes.as_ref().iter().map(|b| format!("{b:02x}")).collect()
}
