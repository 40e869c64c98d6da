use rand::Rng;

/// Credentials for a freshly configured websocket server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReverbCredentials {
    pub app_id: u32,
    pub app_key: String,
    pub app_secret: String,
}

impl ReverbCredentials {
    pub fn generate() -> Self {
        Self::generate_with(&mut rand::thread_rng())
    }

    pub fn generate_with<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self {
            app_id: rng.gen_range(100_000..=999_999),
            app_key: random_hex(rng),
            app_secret: random_hex(rng),
        }
    }
}

/// 20 random bytes, hex encoded.
fn random_hex<R: Rng + ?Sized>(rng: &mut R) -> String {
    let mut bytes = [0u8; 20];
    rng.fill(&mut bytes[..]);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_credentials_shape() {
        let creds = ReverbCredentials::generate();
        assert!((100_000..=999_999).contains(&creds.app_id));
        assert_eq!(creds.app_key.len(), 40);
        assert!(creds.app_secret.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(creds.app_key, creds.app_secret);
    }

    #[test]
    fn test_seeded_generation_is_deterministic() {
        let a = ReverbCredentials::generate_with(&mut StdRng::seed_from_u64(7));
        let b = ReverbCredentials::generate_with(&mut StdRng::seed_from_u64(7));
        assert_eq!(a, b);
    }
}
