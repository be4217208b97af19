use aes_gcm::{
    aead::{Aead, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use rand::RngCore;
use zeroize::{Zeroize, Zeroizing};

/// A token sealed with envelope encryption: a random data key encrypts the
/// token, the master key encrypts the data key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedToken {
    pub encrypted_dek: Vec<u8>,
    pub dek_nonce: Vec<u8>,
    pub encrypted_token: Vec<u8>,
    pub token_nonce: Vec<u8>,
}

/// AES-256-GCM envelope encryption under a 32-byte master key.
pub struct VaultCrypto {
    kek: Zeroizing<[u8; 32]>,
}

impl VaultCrypto {
    pub fn new(master_key_hex: &str) -> anyhow::Result<Self> {
        let kek = parse_master_key(master_key_hex)?;
        Ok(Self {
            kek: Zeroizing::new(kek),
        })
    }

    pub fn seal(&self, plaintext: &str) -> anyhow::Result<SealedToken> {
        let mut dek = [0u8; 32];
        OsRng.fill_bytes(&mut dek);

        let token_cipher = Aes256Gcm::new_from_slice(&dek)
            .map_err(|e| anyhow::anyhow!("invalid key length: {:?}", e))?;
        let token_nonce = generate_nonce();
        let encrypted_token = token_cipher
            .encrypt(Nonce::from_slice(&token_nonce), plaintext.as_bytes())
            .map_err(|e| anyhow::anyhow!("token encryption failed: {}", e))?;

        let kek_cipher = Aes256Gcm::new_from_slice(&self.kek[..])
            .map_err(|e| anyhow::anyhow!("invalid key length: {:?}", e))?;
        let dek_nonce = generate_nonce();
        let encrypted_dek = kek_cipher
            .encrypt(Nonce::from_slice(&dek_nonce), dek.as_ref())
            .map_err(|e| anyhow::anyhow!("DEK encryption failed: {}", e))?;

        dek.zeroize();

        Ok(SealedToken {
            encrypted_dek,
            dek_nonce: dek_nonce.to_vec(),
            encrypted_token,
            token_nonce: token_nonce.to_vec(),
        })
    }

    pub fn open(&self, sealed: &SealedToken) -> anyhow::Result<String> {
        if sealed.dek_nonce.len() != 12 || sealed.token_nonce.len() != 12 {
            anyhow::bail!("sealed token has a malformed nonce");
        }

        let kek_cipher = Aes256Gcm::new_from_slice(&self.kek[..])
            .map_err(|e| anyhow::anyhow!("invalid key length: {:?}", e))?;
        let dek = Zeroizing::new(
            kek_cipher
                .decrypt(Nonce::from_slice(&sealed.dek_nonce), sealed.encrypted_dek.as_ref())
                .map_err(|e| anyhow::anyhow!("DEK decryption failed: {}", e))?,
        );

        let token_cipher = Aes256Gcm::new_from_slice(&dek)
            .map_err(|e| anyhow::anyhow!("invalid key length: {:?}", e))?;
        let plaintext = token_cipher
            .decrypt(
                Nonce::from_slice(&sealed.token_nonce),
                sealed.encrypted_token.as_ref(),
            )
            .map_err(|e| anyhow::anyhow!("token decryption failed: {}", e))?;

        Ok(String::from_utf8(plaintext)?)
    }
}

fn generate_nonce() -> [u8; 12] {
    let mut nonce = [0u8; 12];
    OsRng.fill_bytes(&mut nonce);
    nonce
}

pub fn parse_master_key(hex: &str) -> anyhow::Result<[u8; 32]> {
    if hex.len() != 64 {
        anyhow::bail!(
            "HUBRELAY_MASTER_KEY must be 64 hex chars (32 bytes), got {} chars",
            hex.len()
        );
    }
    let bytes = hex::decode(hex)?;
    let mut key = [0u8; 32];
    key.copy_from_slice(&bytes);
    Ok(key)
}
