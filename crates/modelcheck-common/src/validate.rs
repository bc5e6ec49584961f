use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rand::Rng;

const ID_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

pub fn is_uuid(s: &str) -> bool {
    uuid::Uuid::parse_str(s).is_ok()
}

fn owner_id(name: &str, kinds: &[&str]) -> bool {
    match name.split_once('/') {
        Some((kind, id)) => kinds.contains(&kind) && !id.is_empty() && !id.contains('/'),
        None => false,
    }
}

/// `users/{id}` or `organizations/{id}`.
pub fn is_valid_owner(name: &str) -> bool {
    owner_id(name, &["users", "organizations"])
}

/// Creators are always users.
pub fn is_valid_creator(name: &str) -> bool {
    owner_id(name, &["users"])
}

/// Standard base64 of an image, as sent in `image_base64` inputs.
pub fn base64_image(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Lowercase alphanumeric id of length `len`, valid as a model id.
pub fn random_id(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| ID_CHARSET[rng.gen_range(0..ID_CHARSET.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_uuid() {
        assert!(is_uuid("8f1b2d8e-0c3c-4c9e-9d6e-3b8f2a1c0d4e"));
        assert!(!is_uuid("not-a-uuid"));
        assert!(!is_uuid(""));
    }

    #[test]
    fn test_owner_and_creator() {
        assert!(is_valid_owner("users/admin"));
        assert!(is_valid_owner("organizations/instill"));
        assert!(!is_valid_owner("users/"));
        assert!(!is_valid_owner("users/a/b"));
        assert!(!is_valid_owner("teams/x"));
        assert!(is_valid_creator("users/admin"));
        assert!(!is_valid_creator("organizations/instill"));
    }

    #[test]
    fn test_random_id() {
        let id = random_id(10);
        assert_eq!(id.len(), 10);
        assert!(id.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
        assert_ne!(random_id(16), random_id(16));
    }

    #[test]
    fn test_base64_image() {
        assert_eq!(base64_image(b"hi"), "aGk=");
    }
}
