// Content addressing for incoming files

pub mod digest;

pub use digest::{hash_bytes, hash_file, hash_reader, FileDigest};
