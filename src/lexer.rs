use std::iter;
use std::iter::{from_fn, Peekable};
use std::path::Path;
use std::str::Chars;

use crate::error::SyntaxError;
use crate::token::{Kind, Token};

pub struct Lexer<'a> {
    source_code: &'a str,
    file_name: &'a Path,
    line: usize,
    position: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str, file_name: &'a Path) -> Self {
        Self {
            source_code: input,
            file_name,
            line: 0,
            position: 0,
        }
    }

    fn create_token(&self, kind: Kind, value: String, position: usize) -> Token {
        Token {
            line: self.line,
            position,
            kind,
            value,
        }
    }

    fn error(&self, message: String, line: usize, position: usize) -> SyntaxError {
        SyntaxError::new(self.file_name.to_path_buf(), message, line, position)
    }

    pub fn tokenize(&mut self) -> Result<Vec<Token>, SyntaxError> {
        let mut tokens = Vec::new();
        let mut iter = self.source_code.chars().peekable();

        while let Some(ch) = iter.next() {
            let start = self.position;
            self.position += 1;

            match ch {
                '\n' => {
                    let token = self.create_token(Kind::Newline, String::new(), start);
                    tokens.push(token);
                    self.line += 1;
                    self.position = 0;
                }
                ch if ch.is_whitespace() => continue,
                '#' => {
                    // Comment runs to the end of the line; the newline itself is kept.
                    while iter.next_if(|&c| c != '\n').is_some() {
                        self.position += 1;
                    }
                }
                ':' => {
                    let token = self.create_token(Kind::Colon, ch.to_string(), start);
                    tokens.push(token);
                }
                '=' => {
                    if iter.next_if_eq(&'=').is_some() {
                        self.position += 1;
                        let token = self.create_token(Kind::ComparisonOperator, "==".to_string(), start);
                        tokens.push(token);
                    } else {
                        let token = self.create_token(Kind::Equals, ch.to_string(), start);
                        tokens.push(token);
                    }
                }
                '!' => {
                    if iter.next_if_eq(&'=').is_none() {
                        return Err(self.error("Expected `=` after `!`".to_string(), self.line, start));
                    }
                    self.position += 1;
                    let token = self.create_token(Kind::ComparisonOperator, "!=".to_string(), start);
                    tokens.push(token);
                }
                '"' => {
                    let line = self.line;
                    let text = self.string_literal(&mut iter, line, start)?;
                    tokens.push(Token {
                        line,
                        position: start,
                        kind: Kind::StringLiteral,
                        value: text,
                    });
                }
                c if c.is_ascii_digit() || (c == '-' && iter.peek().is_some_and(|n| n.is_ascii_digit())) => {
                    let number: String = iter::once(ch)
                        .chain(from_fn(|| iter.next_if(|s| s.is_ascii_digit())))
                        .collect();

                    self.position += number.len() - 1;
                    let token = self.create_token(Kind::Number, number, start);
                    tokens.push(token);
                }
                c if c.is_alphabetic() || c == '_' => {
                    let ident: String = iter::once(ch)
                        .chain(from_fn(|| iter.next_if(|s| s.is_alphanumeric() || *s == '_')))
                        .collect();

                    self.position += ident.chars().count() - 1;
                    let kind = Self::get_keyword_token(&ident);
                    let token = self.create_token(kind, ident, start);
                    tokens.push(token);
                }
                _ => {
                    return Err(self.error(
                        format!("Unrecognized character {:?}", ch),
                        self.line,
                        start,
                    ));
                }
            }
        }

        let eof_token = self.create_token(Kind::EOF, "EndOfFile".to_string(), self.position);
        tokens.push(eof_token);

        Ok(tokens)
    }

    /// Reads a quoted literal whose opening quote was already consumed. A literal
    /// spanning several lines is folded into one, each line trimmed and joined
    /// by a single space.
    fn string_literal(
        &mut self,
        iter: &mut Peekable<Chars<'_>>,
        line: usize,
        start: usize,
    ) -> Result<String, SyntaxError> {
        let mut text = String::new();
        let mut multiline = false;

        loop {
            let Some(c) = iter.next() else {
                return Err(self.error("Unterminated string literal".to_string(), line, start));
            };
            self.position += 1;

            match c {
                '"' => break,
                '\\' => match iter.next() {
                    Some(escaped @ ('"' | '\\')) => {
                        self.position += 1;
                        text.push(escaped);
                    }
                    Some('\n') | None => {
                        return Err(self.error("Unterminated string literal".to_string(), line, start));
                    }
                    Some(other) => {
                        self.position += 1;
                        text.push('\\');
                        text.push(other);
                    }
                },
                '\n' => {
                    multiline = true;
                    self.line += 1;
                    self.position = 0;
                    text.push('\n');
                }
                c => text.push(c),
            }
        }

        if multiline {
            text = text
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .collect::<Vec<_>>()
                .join(" ");
        }

        Ok(text)
    }

    pub fn get_keyword_token(ident: &str) -> Kind {
        match ident {
            "scene" => Kind::Scene,
            "goto" => Kind::Goto,
            "set" => Kind::Set,
            "if" => Kind::If,
            "else" => Kind::Else,
            "endif" => Kind::EndIf,
            "choice" => Kind::Choice,
            "option" => Kind::Option,
            "endchoice" => Kind::EndChoice,
            "bg" => Kind::Background,
            "audio" => Kind::Audio,
            "avatar" => Kind::Avatar,
            _ => Kind::Identifier,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn kinds(source: &str) -> Vec<Kind> {
        Lexer::new(source, Path::new("test.scn"))
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn speaker_line() {
        assert_eq!(
            kinds("Floyd: \"Alright, now we're talking.\"\n"),
            vec![Kind::Identifier, Kind::Colon, Kind::StringLiteral, Kind::Newline, Kind::EOF]
        );
    }

    #[test]
    fn keywords_and_operators() {
        assert_eq!(
            kinds("if count != -3 # trailing comment"),
            vec![Kind::If, Kind::Identifier, Kind::ComparisonOperator, Kind::Number, Kind::EOF]
        );
        assert_eq!(
            kinds("set name = \"bla\""),
            vec![Kind::Set, Kind::Identifier, Kind::Equals, Kind::StringLiteral, Kind::EOF]
        );
    }

    #[test]
    fn multiline_string_is_folded() {
        let source = "\"Unlike the previous lines,\n    this will display\n  as a single line.\"\nnext";
        let tokens = Lexer::new(source, Path::new("test.scn")).tokenize().unwrap();
        assert_eq!(tokens[0].value, "Unlike the previous lines, this will display as a single line.");
        assert_eq!(tokens[0].line, 0);
        assert_eq!(tokens[1].kind, Kind::Newline);
        assert_eq!(tokens[2].line, 3);
    }

    #[test]
    fn escaped_quotes() {
        let tokens = Lexer::new(r#""She said \"hi\" \\o/""#, Path::new("test.scn"))
            .tokenize()
            .unwrap();
        assert_eq!(tokens[0].value, r#"She said "hi" \o/"#);
    }

    #[test]
    fn unterminated_string_reports_opening_line() {
        let err = Lexer::new("\n\n  \"never closed\nstill open", Path::new("test.scn"))
            .tokenize()
            .unwrap_err();
        assert_eq!(err.line(), 3);
        assert_eq!(err.message(), "Unterminated string literal");
    }

    #[test]
    fn unrecognized_character() {
        let err = Lexer::new("bg @", Path::new("test.scn")).tokenize().unwrap_err();
        assert!(err.message().contains("Unrecognized character"));
        assert_eq!(err.position, 3);
    }
}
