use nextspot_core::{ModelTier, Persona, TacticalPhase};
use std::path::PathBuf;

/// One line of REPL input
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Plain text: becomes the draft and is sent
    Send(String),
    Attach(Vec<PathBuf>),
    /// 1-based index as shown by `/status`
    Detach(usize),
    Clear,
    Model(ModelTier),
    Persona(Persona),
    Phase(TacticalPhase),
    Search(bool),
    Presets,
    Preset(String),
    Upgrade,
    Status,
    Help,
    Quit,
    Empty,
}

pub const HELP: &str = "\
Commands:
  <text>               send a message (pending attachments go with it)
  /attach <paths...>   queue files for the next message
  /detach <n>          drop pending attachment n
  /clear               clear the conversation
  /model <tier>        fast | advanced
  /persona <name>      general | red-team | exploit-dev | blue-team | bug-bounty
  /phase <name>        recon | access | execution | persistence | lateral | exfil
  /search on|off       toggle search grounding
  /presets             list preset prompts
  /preset <id>         send a preset prompt
  /upgrade             activate the subscription
  /status              show session state
  /help                show this help
  /quit                exit
Ctrl-C while a reply is streaming abandons it.";

pub fn parse(line: &str) -> Result<Command, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(Command::Empty);
    }

    let Some(rest) = line.strip_prefix('/') else {
        return Ok(Command::Send(line.to_string()));
    };

    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (rest, ""),
    };

    let require = |what: &str| required(name, arg, what);

    match name.to_ascii_lowercase().as_str() {
        "attach" => Ok(Command::Attach(
            require("at least one path")?
                .split_whitespace()
                .map(PathBuf::from)
                .collect(),
        )),
        "detach" => {
            let index: usize = require("an attachment number")?
                .parse()
                .map_err(|_| format!("not a number: {arg}"))?;
            if index == 0 {
                return Err("attachment numbers start at 1".to_string());
            }
            Ok(Command::Detach(index))
        }
        "clear" => Ok(Command::Clear),
        "model" => require("a tier")?.parse().map(Command::Model),
        "persona" => require("a persona")?.parse().map(Command::Persona),
        "phase" => require("a phase")?.parse().map(Command::Phase),
        "search" => match require("on or off")?.to_ascii_lowercase().as_str() {
            "on" | "true" | "yes" => Ok(Command::Search(true)),
            "off" | "false" | "no" => Ok(Command::Search(false)),
            other => Err(format!("expected on or off, got '{other}'")),
        },
        "presets" => Ok(Command::Presets),
        "preset" => Ok(Command::Preset(require("a preset id")?.to_string())),
        "upgrade" => Ok(Command::Upgrade),
        "status" => Ok(Command::Status),
        "help" | "?" => Ok(Command::Help),
        "quit" | "exit" | "q" => Ok(Command::Quit),
        other => Err(format!("unknown command /{other} (try /help)")),
    }
}

fn required<'a>(name: &str, arg: &'a str, what: &str) -> Result<&'a str, String> {
    if arg.is_empty() {
        Err(format!("/{name} needs {what}"))
    } else {
        Ok(arg)
    }
}

/// A yes/no answer to a confirmation prompt. Anything but yes is a no.
pub fn is_confirmation(line: &str) -> bool {
    matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_a_send() {
        assert_eq!(
            parse("  what does this log mean?  "),
            Ok(Command::Send("what does this log mean?".into()))
        );
        assert_eq!(parse("   "), Ok(Command::Empty));
    }

    #[test]
    fn test_config_commands() {
        assert_eq!(parse("/model advanced"), Ok(Command::Model(ModelTier::Advanced)));
        assert_eq!(parse("/persona blue-team"), Ok(Command::Persona(Persona::BlueTeam)));
        assert_eq!(
            parse("/phase Lateral Movement"),
            Ok(Command::Phase(TacticalPhase::Lateral))
        );
        assert_eq!(parse("/search OFF"), Ok(Command::Search(false)));
        assert!(parse("/model turbo").is_err());
        assert!(parse("/search maybe").is_err());
    }

    #[test]
    fn test_attach_and_detach() {
        assert_eq!(
            parse("/attach a.png  notes.txt"),
            Ok(Command::Attach(vec!["a.png".into(), "notes.txt".into()]))
        );
        assert_eq!(parse("/detach 2"), Ok(Command::Detach(2)));
        assert!(parse("/detach 0").is_err());
        assert!(parse("/detach two").is_err());
        assert!(parse("/attach").is_err());
    }

    #[test]
    fn test_misc_commands() {
        assert_eq!(parse("/preset summarize"), Ok(Command::Preset("summarize".into())));
        assert_eq!(parse("/QUIT"), Ok(Command::Quit));
        assert_eq!(parse("/?"), Ok(Command::Help));
        assert!(parse("/frobnicate").unwrap_err().contains("/frobnicate"));
    }

    #[test]
    fn test_confirmation() {
        assert!(is_confirmation("Y\n"));
        assert!(is_confirmation("yes"));
        assert!(!is_confirmation(""));
        assert!(!is_confirmation("nope"));
    }
}
