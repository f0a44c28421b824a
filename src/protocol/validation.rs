//! Room code generation and input validation shared by the connection
//! gateway and command router.

use rand::Rng;

/// Alphabet for room codes: A-Z and 0-9 minus ambiguous glyphs I, O, 0, 1.
const ROOM_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const ROOM_CODE_LENGTH: usize = 6;

pub fn generate_room_code() -> String {
    let mut rng = rand::rng();
    (0..ROOM_CODE_LENGTH)
        .map(|_| {
            let idx = rng.random_range(0..ROOM_CODE_ALPHABET.len());
            ROOM_CODE_ALPHABET[idx] as char
        })
        .collect()
}

pub fn is_valid_room_code(code: &str) -> bool {
    code.len() == ROOM_CODE_LENGTH
        && code
            .bytes()
            .all(|b| ROOM_CODE_ALPHABET.contains(&b.to_ascii_uppercase()))
}

pub fn validate_display_name(name: &str) -> Result<(), String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err("Display name must not be empty".to_string());
    }
    if trimmed.chars().count() > 32 {
        return Err("Display name must be 32 characters or fewer".to_string());
    }
    Ok(())
}

pub fn validate_chat_content(content: &str) -> Result<(), String> {
    if content.trim().is_empty() {
        return Err("Message must not be empty".to_string());
    }
    if content.chars().count() > 500 {
        return Err("Message must be 500 characters or fewer".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_codes_have_the_right_shape() {
        for _ in 0..200 {
            let code = generate_room_code();
            assert!(is_valid_room_code(&code), "{code} should be a valid room code");
            assert!(!code.contains(['I', 'O', '0', '1']));
        }
    }

    #[test]
    fn rejects_wrong_length() {
        assert!(!is_valid_room_code("ABC"));
        assert!(!is_valid_room_code("ABCDEFG"));
    }

    #[test]
    fn chat_content_length_is_bounded() {
        assert!(validate_chat_content(&"a".repeat(500)).is_ok());
        assert!(validate_chat_content(&"a".repeat(501)).is_err());
        assert!(validate_chat_content("").is_err());
    }
}
