use sha2::{Digest, Sha256};
use std::path::Path;

const RUN_ID_LEN: usize = 22;

/// Stable identifier for a report file, derived from its bare file name.
///
/// Hex only, so it never contains the `_` that separates the batch id in
/// artifact names.
pub fn run_id_for(source: &Path) -> String {
    let name = source
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| source.to_string_lossy().to_string());

    let mut hasher = Sha256::new();
    hasher.update(name.as_bytes());
    let digest = hex::encode(hasher.finalize());

    digest[..RUN_ID_LEN].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_name_same_id_regardless_of_directory() {
        let a = run_id_for(Path::new("./data/flashflood_LSRs.csv"));
        let b = run_id_for(Path::new("/archive/2023/flashflood_LSRs.csv"));
        assert_eq!(a, b);
        assert_eq!(a.len(), RUN_ID_LEN);
        assert!(!a.contains('_'));
    }

    #[test]
    fn different_names_differ() {
        let a = run_id_for(Path::new("lsrs_2022.csv"));
        let b = run_id_for(Path::new("lsrs_2023.csv"));
        assert_ne!(a, b);
    }
}
