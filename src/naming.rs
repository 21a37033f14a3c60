//! Logical id generation: construct path -> template-safe identifier.

use sha2::{Digest, Sha256};

const HASH_LEN: usize = 8;

/// Keep ASCII alphanumerics only. e.g. "polygone-function" -> "polygonefunction"
pub fn sanitize(s: &str) -> String {
    s.chars().filter(char::is_ascii_alphanumeric).collect()
}

/// Upper-case the first character. e.g. "lambdaDatasource" -> "LambdaDatasource"
pub fn to_pascal_case(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Short uppercase hex digest of the `/`-joined path.
pub fn path_hash(path: &[&str]) -> String {
    let digest = Sha256::digest(path.join("/").as_bytes());
    let mut hex = format!("{:X}", digest);
    hex.truncate(HASH_LEN);
    hex
}

/// Logical id for a construct path: sanitized components concatenated, plus a path hash
/// so that `["a-b"]` and `["ab"]` never collide.
/// e.g. ["AuroraPolygoneCluster", "Secret"] -> "AuroraPolygoneClusterSecret3F0A12BC"
pub fn logical_id(path: &[&str]) -> String {
    let human: String = path.iter().map(|p| to_pascal_case(&sanitize(p))).collect();
    format!("{}{}", human, path_hash(path))
}

/// Display path of a construct within a stack. e.g. "PolygoneAppStack/Api/Schema"
pub fn construct_path(stack: &str, path: &[&str]) -> String {
    std::iter::once(stack)
        .chain(path.iter().copied())
        .collect::<Vec<_>>()
        .join("/")
}
