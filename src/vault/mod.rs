pub mod builtin;

pub use builtin::{SealedToken, VaultCrypto};
