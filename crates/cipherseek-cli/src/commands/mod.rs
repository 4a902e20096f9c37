pub mod cat;
pub mod decrypt;
pub mod encrypt;
pub mod info;
pub mod keygen;

use std::path::Path;

/// Whether a path argument names stdin/stdout (`-`).
pub fn is_stdio(path: &Path) -> bool {
    path.as_os_str() == "-"
}
