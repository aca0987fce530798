#[derive(Debug, PartialEq, Clone)]
pub struct Token {
    pub(crate) line: usize,
    pub(crate) position: usize,
    pub(crate) kind: Kind,
    pub(crate) value: String,
}

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum Kind {
    // Delimiters
    Colon,       // :
    Equals,      // =
    ComparisonOperator, // ==, !=
    Newline,

    // Keywords
    Scene,       // scene
    Goto,        // goto
    Set,         // set
    If,          // if
    Else,        // else
    EndIf,       // endif
    Choice,      // choice
    Option,      // option
    EndChoice,   // endchoice
    Background,  // bg
    Audio,       // audio
    Avatar,      // avatar

    // Identifiers and literals
    Identifier,
    StringLiteral,
    Number,

    EOF
}

impl Kind {
    /// Keywords that open a directive line.
    pub fn is_directive(self) -> bool {
        matches!(
            self,
            Kind::Scene
                | Kind::Goto
                | Kind::Set
                | Kind::If
                | Kind::Else
                | Kind::EndIf
                | Kind::Choice
                | Kind::Option
                | Kind::EndChoice
                | Kind::Background
                | Kind::Audio
                | Kind::Avatar
        )
    }
}
