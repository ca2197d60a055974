/// A line of user input.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Connect,
    Disconnect,
    Select(usize),
    Amount(Option<f64>),
    Book(usize),
    Bet,
    Refresh,
    Show,
    Help,
    Quit,
}

pub const HELP: &str = "\
Commands:
  connect          connect wallet
  disconnect       disconnect wallet
  select <n>       choose an option to bet on
  amount <x>       set bet amount in SOL
  preset <x>       quick-set bet amount
  book <n>         show order book for an outcome
  bet              place the bet
  refresh          reload market data
  show             redraw the page
  help             this message
  quit             exit";

impl Command {
    /// Parse one input line. Blank lines yield `Ok(None)`.
    pub fn parse(line: &str) -> Result<Option<Command>, String> {
        let mut parts = line.split_whitespace();
        let Some(word) = parts.next() else {
            return Ok(None);
        };
        let arg = parts.next();

        let command = match word.to_ascii_lowercase().as_str() {
            "connect" => Command::Connect,
            "disconnect" => Command::Disconnect,
            "select" => Command::Select(index(word, arg)?),
            "book" => Command::Book(index(word, arg)?),
            "amount" | "preset" => Command::Amount(amount(arg)?),
            "bet" => Command::Bet,
            "refresh" => Command::Refresh,
            "show" => Command::Show,
            "help" | "?" => Command::Help,
            "quit" | "exit" | "q" => Command::Quit,
            other => return Err(format!("Unknown command: {}", other)),
        };
        Ok(Some(command))
    }
}

fn index(command: &str, arg: Option<&str>) -> Result<usize, String> {
    let arg = arg.ok_or_else(|| format!("Usage: {} <n>", command))?;
    arg.parse()
        .map_err(|_| format!("Not an option number: {}", arg))
}

/// An empty amount clears the field. NaN and infinities are refused.
fn amount(arg: Option<&str>) -> Result<Option<f64>, String> {
    match arg {
        None => Ok(None),
        Some(raw) => raw
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .map(Some)
            .ok_or_else(|| format!("Not a number: {}", raw)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse("connect"), Ok(Some(Command::Connect)));
        assert_eq!(Command::parse("  select 2 "), Ok(Some(Command::Select(2))));
        assert_eq!(Command::parse("BOOK 1"), Ok(Some(Command::Book(1))));
        assert_eq!(Command::parse("amount 0.5"), Ok(Some(Command::Amount(Some(0.5)))));
        assert_eq!(Command::parse("preset 1"), Ok(Some(Command::Amount(Some(1.0)))));
        assert_eq!(Command::parse("amount"), Ok(Some(Command::Amount(None))));
        assert_eq!(Command::parse("q"), Ok(Some(Command::Quit)));
        assert_eq!(Command::parse("   "), Ok(None));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(Command::parse("select"), Err("Usage: select <n>".to_string()));
        assert_eq!(Command::parse("select x"), Err("Not an option number: x".to_string()));
        assert_eq!(Command::parse("amount lots"), Err("Not a number: lots".to_string()));
        assert_eq!(Command::parse("amount nan"), Err("Not a number: nan".to_string()));
        assert_eq!(Command::parse("amount inf"), Err("Not a number: inf".to_string()));
        assert_eq!(Command::parse("amount -infinity"), Err("Not a number: -infinity".to_string()));
        assert!(Command::parse("dance").is_err());
    }
}
