//! Line-oriented commands for the interactive transfer console.

use std::str::FromStr;

use thiserror::Error;

pub const HELP: &str = "\
commands:
  recipient <address>   set the recipient address
  amount <value>        set the amount to send
  memo [text]           set (or clear) the memo
  planet <id>           pick the destination planet
  planets               list selectable planets
  send                  submit the transfer
  detail                open the last transaction in the explorer
  close                 dismiss the result dialog
  ack                   acknowledge a pending alert
  show                  print the current form state
  balance               print the wallet balance
  help                  print this message
  quit                  leave the console";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Recipient(String),
    Amount(String),
    Memo(String),
    Planet(String),
    Planets,
    Send,
    Detail,
    Close,
    Ack,
    Show,
    Balance,
    Help,
    Quit,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConsoleError {
    #[error("empty command")]
    Empty,
    #[error("unknown command '{0}', try 'help'")]
    Unknown(String),
    #[error("'{0}' needs an argument")]
    MissingArgument(&'static str),
}

impl FromStr for ConsoleCommand {
    type Err = ConsoleError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (verb, rest) = match line.split_once(char::is_whitespace) {
            Some((verb, rest)) => (verb, rest.trim()),
            None => (line, ""),
        };

        let required = |name: &'static str| {
            if rest.is_empty() {
                Err(ConsoleError::MissingArgument(name))
            } else {
                Ok(rest.to_string())
            }
        };

        match verb.to_ascii_lowercase().as_str() {
            "" => Err(ConsoleError::Empty),
            "recipient" | "to" => required("recipient").map(Self::Recipient),
            "amount" => required("amount").map(Self::Amount),
            // Memo keeps inner whitespace and may be blank.
            "memo" => Ok(Self::Memo(rest.to_string())),
            "planet" => required("planet").map(Self::Planet),
            "planets" => Ok(Self::Planets),
            "send" | "submit" => Ok(Self::Send),
            "detail" => Ok(Self::Detail),
            "close" | "dismiss" => Ok(Self::Close),
            "ack" => Ok(Self::Ack),
            "show" => Ok(Self::Show),
            "balance" => Ok(Self::Balance),
            "help" | "?" => Ok(Self::Help),
            "quit" | "exit" => Ok(Self::Quit),
            other => Err(ConsoleError::Unknown(other.to_string())),
        }
    }
}

#[cfg(test)]
#[path = "tests/console_tests.rs"]
mod tests;
