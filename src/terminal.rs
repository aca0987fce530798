use std::io::{self, BufRead, Write};

use nmfe::View;

/// Renders a playthrough as plain text on stdout.
#[derive(Debug, Default)]
pub struct TerminalView {
    speaker: Option<String>,
}

impl View for TerminalView {
    fn display_dialogue(&mut self, text: &str) {
        match &self.speaker {
            Some(speaker) => println!("{}: {}", speaker, text),
            None => println!("{}", text),
        }
    }

    fn set_speaker(&mut self, speaker: Option<&str>) {
        self.speaker = speaker.map(str::to_string);
    }

    fn set_background(&mut self, path: &str) {
        println!("[background: {}]", path);
    }

    fn clear_background(&mut self) {
        println!("[background cleared]");
    }

    fn play_audio(&mut self, path: &str) {
        println!("[audio: {}]", path);
    }

    fn stop_audio(&mut self) {
        println!("[audio stopped]");
    }

    fn display_choices(&mut self, labels: &[String]) {
        for (number, label) in labels.iter().enumerate() {
            println!("  {}) {}", number + 1, label);
        }
    }

    fn set_avatar(&mut self, name: &str, path: &str) {
        println!("[{} enters: {}]", name, path);
    }

    fn set_avatar_pos(&mut self, name: &str, pos: &str) {
        println!("[{} moves to {}]", name, pos);
    }

    fn exit_avatar(&mut self, name: &str) {
        println!("[{} exits]", name);
    }
}

/// Reads one trimmed line from stdin after printing `prompt`. `None` on EOF.
pub fn prompt(prompt: &str) -> io::Result<Option<String>> {
    print!("{}", prompt);
    io::stdout().flush()?;

    let mut line = String::new();
    if io::stdin().lock().read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

/// Reads a typed answer to a choice prompt as a 1-based number.
pub fn parse_selection(answer: &str, count: usize) -> Result<usize, String> {
    answer
        .parse::<usize>()
        .map_err(|_| format!("`{}` is not a number; enter 1 to {}", answer, count))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn number_is_accepted() {
        assert_eq!(parse_selection("2", 3), Ok(2));
    }

    #[test]
    fn text_is_reported_as_not_a_number() {
        assert_eq!(
            parse_selection("left", 3),
            Err("`left` is not a number; enter 1 to 3".to_string())
        );
    }

    #[test]
    fn range_is_left_to_select() {
        // Out-of-range numbers parse; the runtime rejects them.
        assert_eq!(parse_selection("0", 3), Ok(0));
    }
}
