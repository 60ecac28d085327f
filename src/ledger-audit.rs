//! A simple CLI tool for auditing election ledgers offline.
//! This uses the server's own replay check, and is by definition compatible
//! with the output of our API endpoints.

use std::fmt::{Display, Formatter};
use std::fs::File;
use std::io::BufReader;

use clap::{Arg, ArgAction, ArgMatches, Command};
use rocket::serde::json::{serde_json, Value};

use election_ledger::model::{
    api::Envelope,
    ledger::{AuditError, LedgerDump},
};

const PROGRAM_NAME: &str = "ledger-audit";

const ABOUT_TEXT: &str = "Audit the integrity of an election ledger dump.

EXIT CODES:
     0: Audit succeeded.
   255: Ran successfully, but the audit failed.
 Other: Error.";

const DUMP_PATH: &str = "DUMP_PATH";

const DUMP_PATH_HELP: &str = "The path to a JSON dump of a ledger, as returned by\n\
`GET /ledgers/<ledger_id>/dump` (with or without the response envelope)";

/// Construct the CLI configuration.
fn cli() -> Command {
    // Make the build dirty when the toml changes.
    include_str!("../Cargo.toml");

    clap::command!(PROGRAM_NAME).about(ABOUT_TEXT).arg(
        Arg::new(DUMP_PATH)
            .help(DUMP_PATH_HELP)
            .action(ArgAction::Set)
            .required(true),
    )
}

/// Errors that this program may produce.
#[derive(Debug, Eq, PartialEq)]
enum Error {
    /// IO error described by the inner message.
    IO(String),
    /// Failed to decode the JSON dump.
    Format(String),
    /// The audit failed for the contained reason.
    Audit(AuditError),
}

/// The final figures of an audited ledger.
#[derive(Debug, Eq, PartialEq)]
struct Summary {
    /// Candidate names and tallies, highest tally first.
    tallies: Vec<(String, u64)>,
    voters: usize,
    balance: u64,
    deposited: u64,
    withdrawn: u64,
}

impl Display for Summary {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for (name, tally) in &self.tallies {
            writeln!(
                f,
                "{name}: {tally} vote{}",
                if *tally != 1 { "s" } else { "" }
            )?;
        }
        writeln!(
            f,
            "{} address{} voted.",
            self.voters,
            if self.voters != 1 { "es" } else { "" }
        )?;
        write!(
            f,
            "Treasury balance: {} ({} deposited, {} withdrawn)",
            self.balance, self.deposited, self.withdrawn
        )
    }
}

/// Load a dump, accepting either the bare dump or a full response envelope.
fn load(path: &str) -> Result<LedgerDump, Error> {
    let file = BufReader::new(File::open(path).map_err(|e| Error::IO(e.to_string()))?);
    let value: Value = serde_json::from_reader(file).map_err(|e| Error::Format(e.to_string()))?;

    if value.get("ok").is_some() {
        let envelope: Envelope<LedgerDump> =
            serde_json::from_value(value).map_err(|e| Error::Format(e.to_string()))?;
        envelope
            .result
            .ok_or_else(|| Error::Format(envelope.message.unwrap_or_default()))
    } else {
        serde_json::from_value(value).map_err(|e| Error::Format(e.to_string()))
    }
}

/// Run the audit.
fn audit(path: &str) -> Result<Summary, Error> {
    let dump = load(path)?;
    dump.audit().map_err(Error::Audit)?;

    // Order by tally, then name.
    let mut tallies = dump
        .candidates
        .iter()
        .map(|c| (c.name.clone(), c.vote_count))
        .collect::<Vec<_>>();
    tallies.sort_unstable_by(|a, b| a.0.cmp(&b.0));
    tallies.sort_by(|a, b| b.1.cmp(&a.1));

    Ok(Summary {
        tallies,
        voters: dump.voters.len(),
        balance: dump.treasury.balance(),
        deposited: dump.treasury.total_deposited(),
        withdrawn: dump.treasury.total_withdrawn(),
    })
}

/// Run the audit, report the result, and return the exit code.
fn run(args: &ArgMatches) -> u8 {
    // Required argument is guaranteed to be present.
    let Some(path) = args.get_one::<String>(DUMP_PATH) else {
        return 1;
    };
    match audit(path) {
        Ok(summary) => {
            println!("Audit succeeded.");
            println!("{summary}");
            0
        }
        Err(Error::IO(msg)) => {
            println!("IO error: {msg}");
            1
        }
        Err(Error::Format(msg)) => {
            println!("Invalid JSON: {msg}");
            1
        }
        Err(Error::Audit(err)) => {
            println!("Audit failed: {err}.");
            255
        }
    }
}

fn main() {
    let args = cli().get_matches();
    let exit_code = run(&args);
    std::process::exit(exit_code.into())
}

#[cfg(test)]
mod tests {
    use election_ledger::model::address::Address;

    use super::*;

    #[test]
    fn audit_dumps() {
        let expected = Summary {
            tallies: vec![("Alice".to_string(), 2), ("Bob".to_string(), 1)],
            voters: 3,
            balance: 60,
            deposited: 100,
            withdrawn: 40,
        };
        assert_eq!(audit("example_dumps/ledger.json"), Ok(expected));

        assert_eq!(
            audit("example_dumps/ledger_invalid_tally.json"),
            Err(Error::Audit(AuditError::VoteTotal {
                tallies: 4,
                voters: 3
            }))
        );
        let stranger: Address = "0x0000000000000000000000000000000000001009"
            .parse()
            .unwrap();
        assert_eq!(
            audit("example_dumps/ledger_invalid_withdrawal.json"),
            Err(Error::Audit(AuditError::NonOwnerWithdrawal {
                seq: 6,
                to: stranger
            }))
        );
        assert!(matches!(
            audit("example_dumps/ledger_malformed.json"),
            Err(Error::Format(_))
        ));
    }

    #[test]
    fn audit_enveloped_dump() {
        // Saved straight from `GET /ledgers/<ledger_id>/dump`.
        let summary = audit("example_dumps/ledger_envelope.json").unwrap();
        assert_eq!(summary.voters, 3);
        assert_eq!(summary.balance, 60);
        assert_eq!(
            summary.tallies,
            vec![("Alice".to_string(), 2), ("Bob".to_string(), 1)]
        );
    }

    #[test]
    fn summary_reads_naturally() {
        let summary = Summary {
            tallies: vec![("Bob".to_string(), 1), ("Alice".to_string(), 0)],
            voters: 1,
            balance: 0,
            deposited: 0,
            withdrawn: 0,
        };
        assert_eq!(
            summary.to_string(),
            "Bob: 1 vote\nAlice: 0 votes\n1 address voted.\nTreasury balance: 0 (0 deposited, 0 withdrawn)"
        );
    }

    #[test]
    fn correct_cli_usage() {
        let command_line = [PROGRAM_NAME, "example_dumps/ledger.json"];
        let args = cli().try_get_matches_from(command_line).unwrap();
        assert_eq!(run(&args), 0);

        let command_line = [PROGRAM_NAME, "example_dumps/ledger_invalid_tally.json"];
        let args = cli().try_get_matches_from(command_line).unwrap();
        assert_eq!(run(&args), 255);

        let command_line = [PROGRAM_NAME, "example_dumps/ledger_malformed.json"];
        let args = cli().try_get_matches_from(command_line).unwrap();
        assert_eq!(run(&args), 1);

        let command_line = [PROGRAM_NAME, "not a real file"];
        let args = cli().try_get_matches_from(command_line).unwrap();
        assert_eq!(run(&args), 1);
    }

    #[test]
    fn bad_cli_usage() {
        // Something very wrong.
        let command_line = [PROGRAM_NAME, "this", "invocation", "is", "incorrect"];
        cli().try_get_matches_from(command_line).unwrap_err();

        // No options at all.
        let command_line = [PROGRAM_NAME];
        cli().try_get_matches_from(command_line).unwrap_err();
    }
}
