use std::fmt;

/// A metadata token referencing one record anywhere in a database.
///
/// Tokens are 32-bit values where:
/// - The high byte (bits 24-31) is the table tag
/// - The low 24 bits (bits 0-23) are the 1-based row id (RID)
///
/// A token whose RID is 0 is "nil": it denotes an absent reference and
/// round-trips through every API unchanged.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Token(pub u32);

impl Token {
    /// Creates a new token from a raw 32-bit value
    #[must_use]
    pub fn new(value: u32) -> Self {
        Token(value)
    }

    /// Returns the raw token value
    #[must_use]
    pub fn value(&self) -> u32 {
        self.0
    }

    /// Extracts the table tag from the token (high byte)
    #[must_use]
    pub fn table(&self) -> u8 {
        (self.0 >> 24) as u8
    }

    /// Extracts the row index from the token (low 24 bits)
    #[must_use]
    pub fn rid(&self) -> u32 {
        self.0 & 0x00FF_FFFF
    }

    /// Returns true if the RID is 0, i.e. the token denotes "absent"
    #[must_use]
    pub fn is_nil(&self) -> bool {
        self.0 & 0x00FF_FFFF == 0
    }
}

impl From<u32> for Token {
    fn from(value: u32) -> Self {
        Token(value)
    }
}

impl From<Token> for u32 {
    fn from(token: Token) -> Self {
        token.0
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Token(0x{:08x}, table: 0x{:02x}, rid: {})",
            self.0,
            self.table(),
            self.rid()
        )
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parts() {
        let token = Token::new(0x0600_0001);
        assert_eq!(token.value(), 0x0600_0001);
        assert_eq!(token.table(), 0x06);
        assert_eq!(token.rid(), 1);
        assert!(!token.is_nil());
    }

    #[test]
    fn nil() {
        // RID 0 is nil regardless of the table tag
        assert!(Token::new(0).is_nil());
        assert!(Token::new(0x0200_0000).is_nil());
        assert!(!Token::new(0x0200_0001).is_nil());
    }

    #[test]
    fn boundary_values() {
        let max = Token::new(0xFFFF_FFFF);
        assert_eq!(max.table(), 0xFF);
        assert_eq!(max.rid(), 0x00FF_FFFF);

        let boundary = Token::new(0x0100_0000);
        assert_eq!(boundary.table(), 0x01);
        assert_eq!(boundary.rid(), 0);
    }

    #[test]
    fn conversions_and_display() {
        let token: Token = 0x0A00_0003u32.into();
        let raw: u32 = token.into();
        assert_eq!(raw, 0x0A00_0003);
        assert_eq!(format!("{token}"), "0x0a000003");
    }

    #[test]
    fn ordering() {
        assert!(Token::new(0x0600_0001) < Token::new(0x0600_0002));
        assert!(Token::new(0x0600_0002) < Token::new(0x0700_0001));
    }
}
