//! Slash command parsing.

/// Supported slash commands in the input box.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlashCommand {
    Help,
    Models,
    Model(String),
    Search(String),
    History,
    Clear,
    Export,
}

/// Text shown by `/help`.
pub const HELP_TEXT: &str = "Available commands:
  /help            Show this help
  /models          List models installed on the server
  /model <name>    Switch the chat model
  /search <query>  Search past conversations
  /history         List recent conversations
  /clear           Start a new conversation
  /export          Export the conversation to markdown

Shortcuts:
  Enter            Send message
  Esc              Stop the reply being generated, or quit
  Ctrl+N           New conversation
  Ctrl+L           Load last conversation
  Ctrl+E           Export conversation
  Ctrl+C           Quit
  Up/Down PgUp/PgDn  Scroll";

/// Parse a slash command from the input line.
///
/// Returns `Ok(None)` for input that is not a command.
pub fn parse_slash_command(input: &str) -> Result<Option<SlashCommand>, String> {
    let trimmed = input.trim();
    let Some(rest) = trimmed.strip_prefix('/') else {
        return Ok(None);
    };
    let mut parts = rest.split_whitespace();
    let Some(command) = parts.next() else {
        return Ok(None);
    };
    let args: Vec<&str> = parts.collect();
    match command.to_lowercase().as_str() {
        "help" | "?" => Ok(Some(SlashCommand::Help)),
        "models" => Ok(Some(SlashCommand::Models)),
        "model" => match args.as_slice() {
            [] => Ok(Some(SlashCommand::Models)),
            [name] => Ok(Some(SlashCommand::Model(name.to_string()))),
            _ => Err("usage: /model <name>".to_string()),
        },
        "search" => {
            if args.is_empty() {
                return Err("usage: /search <query>".to_string());
            }
            Ok(Some(SlashCommand::Search(args.join(" "))))
        }
        "history" => Ok(Some(SlashCommand::History)),
        "clear" | "new" => Ok(Some(SlashCommand::Clear)),
        "export" => Ok(Some(SlashCommand::Export)),
        _ => Err(format!(
            "unknown command: /{command}. Type /help for available commands."
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::{SlashCommand, parse_slash_command};
    use pretty_assertions::assert_eq;

    #[test]
    fn plain_text_is_not_a_command() {
        assert_eq!(parse_slash_command("hello /world"), Ok(None));
        assert_eq!(parse_slash_command("/"), Ok(None));
    }

    #[test]
    fn parses_commands_case_insensitively() {
        assert_eq!(parse_slash_command("/HELP"), Ok(Some(SlashCommand::Help)));
        assert_eq!(parse_slash_command(" /models "), Ok(Some(SlashCommand::Models)));
        assert_eq!(parse_slash_command("/model"), Ok(Some(SlashCommand::Models)));
        assert_eq!(
            parse_slash_command("/model llama3.2"),
            Ok(Some(SlashCommand::Model("llama3.2".to_string())))
        );
        assert_eq!(parse_slash_command("/clear"), Ok(Some(SlashCommand::Clear)));
        assert_eq!(parse_slash_command("/new"), Ok(Some(SlashCommand::Clear)));
        assert_eq!(parse_slash_command("/export"), Ok(Some(SlashCommand::Export)));
        assert_eq!(parse_slash_command("/history"), Ok(Some(SlashCommand::History)));
    }

    #[test]
    fn search_joins_the_query() {
        assert_eq!(
            parse_slash_command("/search   rust   lifetimes "),
            Ok(Some(SlashCommand::Search("rust lifetimes".to_string())))
        );
        assert!(parse_slash_command("/search").is_err());
    }

    #[test]
    fn rejects_unknown_commands_and_bad_arity() {
        let err = parse_slash_command("/frobnicate").unwrap_err();
        assert!(err.contains("/frobnicate"));
        assert!(parse_slash_command("/model a b").is_err());
    }
}
