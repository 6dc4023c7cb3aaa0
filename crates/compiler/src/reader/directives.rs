//! Leading `distinct`/`expose` directives (§3, unit-identity protocol).
//!
//! Both take a dotted path of words terminated by `;`. `distinct` may
//! appear at most once per unit; `expose` may repeat.

use super::Reader;
use ven_core::VenError;

impl Reader {
    pub(super) fn directives(&mut self) -> Result<(), VenError> {
        loop {
            if self.word("distinct") {
                self.advance();
                let path = self.dotted_path()?;
                self.expect_symbol(";")?;
                if self.distinct.is_some() {
                    return self.err("a unit may declare at most one `distinct` path");
                }
                self.distinct = Some(path);
            } else if self.word("expose") {
                self.advance();
                let path = self.dotted_path()?;
                self.expect_symbol(";")?;
                self.exposes.push(path);
            } else {
                break;
            }
        }
        Ok(())
    }

    fn dotted_path(&mut self) -> Result<Vec<String>, VenError> {
        let mut segments = Vec::new();
        segments.push(self.expect_word_any()?);
        while self.consume_symbol(".") {
            segments.push(self.expect_word_any()?);
        }
        Ok(segments)
    }

    fn expect_word_any(&mut self) -> Result<String, VenError> {
        match &self.peek().kind {
            crate::token::TokenKind::Word(w) => {
                let s = w.to_string();
                self.advance();
                Ok(s)
            }
            _ => self.err("expected an identifier"),
        }
    }
}
