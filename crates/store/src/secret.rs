use hex::ToHex;
use sha2::Digest;

/// One-way transform applied to secret fields before they reach storage.
pub trait SecretHasher {
    fn hash(&self, secret: &str) -> String;
}

/// Salted, iterated SHA-256 encoded as `sha256$<rounds>$<salt>$<hex digest>`.
#[derive(Debug, Clone, Copy)]
pub struct Sha256SecretHasher {
    rounds: u32,
}

impl Sha256SecretHasher {
    pub const SCHEME: &'static str = "sha256";

    pub fn new(rounds: u32) -> Self {
        Self {
            rounds: rounds.max(1),
        }
    }

    pub fn verify(&self, candidate: &str, encoded: &str) -> bool {
        let mut parts = encoded.splitn(4, '$');
        let (Some(scheme), Some(rounds), Some(salt), Some(expected)) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return false;
        };
        if scheme != Self::SCHEME {
            return false;
        }
        let Ok(rounds) = rounds.parse::<u32>() else {
            return false;
        };

        let actual = stretch(salt, candidate, rounds.max(1));
        constant_time_eq(actual.as_bytes(), expected.as_bytes())
    }
}

impl Default for Sha256SecretHasher {
    fn default() -> Self {
        Self::new(10_000)
    }
}

impl SecretHasher for Sha256SecretHasher {
    fn hash(&self, secret: &str) -> String {
        let salt = ulid::Ulid::new().to_string();
        let digest = stretch(&salt, secret, self.rounds);
        format!("{}${}${}${}", Self::SCHEME, self.rounds, salt, digest)
    }
}

fn stretch(salt: &str, secret: &str, rounds: u32) -> String {
    let mut hasher = sha2::Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(secret.as_bytes());
    let mut digest = hasher.finalize();

    for _ in 1..rounds {
        let mut hasher = sha2::Sha256::new();
        hasher.update(salt.as_bytes());
        hasher.update(digest);
        digest = hasher.finalize();
    }

    digest.encode_hex::<String>()
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
