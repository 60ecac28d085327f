use anyhow::anyhow;
use clap::{Parser, ValueEnum};
use const_format::concatcp;
use rand::Rng;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::StatusCode;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Value};
use std::env;
use std::fs::File;
use std::io::Write;
use std::ops::{AddAssign, Div};
use std::process::{self, Child, Command, Stdio};
use std::thread;
use std::time::{Duration as StdDuration, Instant};
use tempfile::NamedTempFile;

const LOCAL_PORT: u32 = 8374;
const LOCAL_URL: &str = concatcp!("http://127.0.0.1:", LOCAL_PORT);

#[rustfmt::skip]
const ROCKET_ENV: &[(&str, &str)] = &[
    ("ROCKET_PORT", concatcp!(LOCAL_PORT)),
    ("ROCKET_MAX_LEDGERS", "16"),
];

const CALLER_HEADER: &str = "X-Caller-Address";

/// The first account of a local development chain.
const OWNER: &str = "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266";

#[rustfmt::skip]
const CANDIDATES: &[&str] = &[
    "Alice",
    "Bob",
    "Carol",
    "Dave",
    "Eve",
    "Fred",
    "Grace",
    "Henry",
    "Irene",
    "Joe",
];

#[derive(Parser)]
struct Args {
    /// Silence local server logging.
    #[arg(short, long)]
    quiet: bool,

    /// Send local server logging to this file; takes precedence over --quiet.
    #[arg(long)]
    logfile: Option<String>,

    /// Connect to a remote server at this URL instead of running a local one.
    #[arg(long)]
    remote: Option<String>,

    /// How many threads to use. Defaults to the number of logical CPUs.
    #[arg(long, default_value_t = num_cpus::get())]
    threads: usize,

    /// How many distinct addresses each thread votes from.
    #[arg(long, default_value_t = 100)]
    voters_per_thread: usize,

    /// How often voters also fund the treasury.
    #[arg(long, value_enum, default_value_t)]
    deposit_mode: DepositMode,

    /// Audit the ledger dump with `ledger-audit` after completion.
    #[arg(long)]
    audit: bool,
}

/// How often voters also fund the treasury.
#[derive(Debug, Copy, Clone, Default, ValueEnum)]
enum DepositMode {
    /// Never deposit.
    Never,
    /// Every voter deposits.
    Always,
    /// Deposit with even odds.
    Random,
    /// Attempt to model real behaviour: deposit with 10% probability.
    #[default]
    Realistic,
}

impl DepositMode {
    /// Return `true` if this voter should deposit.
    fn should_deposit(&self) -> bool {
        match self {
            Self::Never => false,
            Self::Always => true,
            Self::Random => rand::random(),
            Self::Realistic => rand::random::<f32>() < 0.1,
        }
    }
}

/// Construct a URL from segments.
macro_rules! url {
    ($($segment:expr),+) => {{
        std::path::PathBuf::from_iter([$($segment),+]).to_str().unwrap()
    }}
}

/// A distinct address for every voter.
fn voter_address(voter_id: usize) -> String {
    format!("0x{:040x}", 0x10_0000 + voter_id)
}

/// Attach the caller header to a request.
fn as_caller(request: RequestBuilder, address: &str) -> RequestBuilder {
    request.header(CALLER_HEADER, address)
}

/// Unwrap the `result` of a successful response envelope.
fn result<T: DeserializeOwned>(response: Response) -> anyhow::Result<T> {
    #[derive(Deserialize)]
    struct Envelope<T> {
        ok: bool,
        result: Option<T>,
        message: Option<String>,
    }

    let status = response.status();
    let envelope: Envelope<T> = response.json()?;
    match envelope {
        Envelope {
            ok: true,
            result: Some(result),
            ..
        } => Ok(result),
        Envelope { message, .. } => Err(anyhow!("{status}: {}", message.unwrap_or_default())),
    }
}

/// Set up everything we need before starting the server.
fn setup_deps() -> anyhow::Result<()> {
    // Ensure the optimised build is up-to-date.
    Command::new("cargo")
        .args(["build", "--release", "--bin", "election-ledger"])
        .status()?
        .success()
        .then_some(())
        .ok_or_else(|| anyhow!("server build exited nonzero"))?;

    for (var, val) in ROCKET_ENV {
        env::set_var(var, val);
    }

    Ok(())
}

/// Terminate the given child process. This is a SIGTERM on unix and a hard-kill on other
/// platforms.
fn terminate_child(child: &mut Child) -> anyhow::Result<()> {
    #[cfg(unix)]
    {
        let pid = nix::unistd::Pid::from_raw(child.id() as i32);
        nix::sys::signal::kill(pid, nix::sys::signal::Signal::SIGTERM)?;
    }
    #[cfg(not(unix))]
    {
        child.kill()?;
    }
    Ok(())
}

/// Start a local server and wait until it answers.
fn launch_server(logfile: Stdio) -> anyhow::Result<Child> {
    let mut proc = Command::new("./target/release/election-ledger")
        .stdout(logfile)
        .spawn()?;

    // Wait for the server to be reachable.
    let client = Client::new();
    loop {
        if let Ok(resp) = client.get(url!(LOCAL_URL, "ledgers")).send() {
            if resp.status() == StatusCode::OK {
                break;
            } else {
                let status = resp.status();
                terminate_child(&mut proc)?;
                proc.wait()?;
                return Err(anyhow!("Bad response: {status}"));
            }
        }

        // Check the server didn't exit.
        if let Some(retcode) = proc.try_wait()? {
            return Err(anyhow!("Server exited prematurely with code {}", retcode));
        }
        thread::sleep(StdDuration::from_millis(50));
    }

    Ok(proc)
}

/// Create a ledger with a long window and register the candidates.
/// Returns the ledger ID.
fn setup_ledger(url: &str) -> anyhow::Result<String> {
    let client = Client::new();

    #[derive(Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Created {
        ledger_id: u32,
    }
    let resp = as_caller(client.post(url!(url, "ledgers")), OWNER)
        .json(&json!({ "durationSeconds": 86_400 }))
        .send()?;
    let Created { ledger_id } = result(resp)?;
    let id_str = ledger_id.to_string();

    for name in CANDIDATES {
        let resp = as_caller(client.post(url!(url, "ledgers", &id_str, "candidates")), OWNER)
            .json(&json!({ "name": name }))
            .send()?;
        result::<Value>(resp)?;
    }

    Ok(id_str)
}

/// Durations of each part of one voter's interaction.
#[derive(Debug, Default)]
struct VoteTimings {
    vote: StdDuration,
    deposit: StdDuration,
    retry: StdDuration,
}

impl AddAssign for VoteTimings {
    fn add_assign(&mut self, rhs: Self) {
        self.vote += rhs.vote;
        self.deposit += rhs.deposit;
        self.retry += rhs.retry;
    }
}

impl Div<u32> for VoteTimings {
    type Output = Self;

    fn div(self, rhs: u32) -> Self {
        Self {
            vote: self.vote / rhs,
            deposit: self.deposit / rhs,
            retry: self.retry / rhs,
        }
    }
}

/// Vote once from `voter`, maybe deposit, then check that a second vote is
/// refused. Returns the timings and the amount deposited.
fn cast_vote(
    url: &str,
    lid: &str,
    client: &Client,
    voter: &str,
    deposit_mode: DepositMode,
) -> anyhow::Result<(VoteTimings, u64)> {
    let candidate_id = rand::thread_rng().gen_range(0..CANDIDATES.len());
    let ballot = json!({ "candidateId": candidate_id });

    // Vote.
    let pre_vote = Instant::now();
    as_caller(client.post(url!(url, "ledgers", lid, "votes")), voter)
        .json(&ballot)
        .send()
        .and_then(Response::error_for_status)?;
    let post_vote = Instant::now();

    // Maybe fund the treasury.
    let mut deposited = 0;
    let pre_deposit = Instant::now();
    if deposit_mode.should_deposit() {
        let amount: u64 = rand::thread_rng().gen_range(1..=1_000);
        as_caller(client.post(url!(url, "ledgers", lid, "treasury/deposit")), voter)
            .json(&json!({ "amount": amount }))
            .send()
            .and_then(Response::error_for_status)?;
        deposited = amount;
    }
    let post_deposit = Instant::now();

    // Retry; this must be refused.
    let pre_retry = Instant::now();
    let resp = as_caller(client.post(url!(url, "ledgers", lid, "votes")), voter)
        .json(&ballot)
        .send()?;
    if resp.status() != StatusCode::CONFLICT {
        return Err(anyhow!(
            "second vote from {voter} answered {} instead of 409",
            resp.status()
        ));
    }
    let post_retry = Instant::now();

    Ok((
        VoteTimings {
            vote: post_vote.duration_since(pre_vote),
            deposit: post_deposit.duration_since(pre_deposit),
            retry: post_retry.duration_since(pre_retry),
        },
        deposited,
    ))
}

/// Run the benchmark. Returns the total number of voters and the total deposited.
fn benchmark(
    url: &str,
    lid: &str,
    num_threads: usize,
    voters_per_thread: usize,
    deposit_mode: DepositMode,
) -> anyhow::Result<(usize, u64)> {
    let end_val: usize = num_threads * voters_per_thread;

    let start = Instant::now();
    thread::scope(|s| {
        let mut threads = Vec::with_capacity(num_threads);

        for start in (0..end_val).step_by(voters_per_thread) {
            let t = s.spawn(move || {
                let client = Client::new();
                let mut vote_duration = VoteTimings::default();
                let mut deposited = 0;

                for voter_id in start..(start + voters_per_thread) {
                    let (vote_dur, amount) =
                        cast_vote(url, lid, &client, &voter_address(voter_id), deposit_mode)?;
                    vote_duration += vote_dur;
                    deposited += amount;
                }

                let avg_vote_dur = vote_duration / voters_per_thread as u32;
                Ok::<_, anyhow::Error>((avg_vote_dur, deposited))
            });
            threads.push(t);
        }

        let mut vote_duration = VoteTimings::default();
        let mut deposited = 0;
        for t in threads {
            let (vote_dur, amount) = t
                .join()
                .map_err(|_| anyhow!("benchmark thread panicked"))??;
            vote_duration += vote_dur;
            deposited += amount;
        }
        let total_duration = start.elapsed();

        let avg_vote_duration = vote_duration / num_threads as u32;
        let avg_total_duration =
            avg_vote_duration.vote + avg_vote_duration.deposit + avg_vote_duration.retry;

        // Theoretical voters per sec is 1/avg_duration * num_threads.
        let voters_per_sec = num_threads as f64 / avg_total_duration.as_secs_f64();
        // Actual voters per sec is total_voters / total_time.
        let actual_voters_per_sec = end_val as f64 / total_duration.as_secs_f64();

        println!("vote:    {:?}", avg_vote_duration.vote);
        println!("deposit: {:?}", avg_vote_duration.deposit);
        println!("retry:   {:?}", avg_vote_duration.retry);

        println!("\ntotal: {:?} ({:.2}/s)", avg_total_duration, voters_per_sec);
        println!(
            "actual duration: {} voters in {:?} ({:.2}/s)",
            end_val, total_duration, actual_voters_per_sec
        );

        Ok((end_val, deposited))
    })
}

/// Withdraw half of the treasury to the owner. Returns the amount withdrawn.
fn withdraw_half(url: &str, lid: &str, deposited: u64) -> anyhow::Result<u64> {
    let amount = deposited / 2;
    as_caller(Client::new().post(url!(url, "ledgers", lid, "treasury/withdraw")), OWNER)
        .json(&json!({ "amount": amount }))
        .send()
        .and_then(Response::error_for_status)?;
    Ok(amount)
}

/// Fetch the dump and check that tallies and funds add up. Returns the raw dump.
fn check_invariants(
    url: &str,
    lid: &str,
    voters: usize,
    deposited: u64,
    withdrawn: u64,
) -> anyhow::Result<Value> {
    let resp = Client::new().get(url!(url, "ledgers", lid, "dump")).send()?;
    let dump: Value = result(resp)?;

    let tallies: u64 = dump["candidates"]
        .as_array()
        .ok_or_else(|| anyhow!("dump has no candidates"))?
        .iter()
        .filter_map(|c| c["voteCount"].as_u64())
        .sum();
    let recorded_voters = dump["voters"].as_array().map_or(0, Vec::len);
    if tallies != voters as u64 || recorded_voters != voters {
        return Err(anyhow!(
            "expected {voters} votes, found {tallies} tallied from {recorded_voters} voters"
        ));
    }

    let balance = dump["treasury"]["balance"].as_u64();
    if balance != Some(deposited - withdrawn) {
        return Err(anyhow!(
            "expected balance {}, found {balance:?}",
            deposited - withdrawn
        ));
    }

    println!("invariants hold: {voters} votes, balance {}", deposited - withdrawn);
    Ok(dump)
}

/// Ensure that the audit tool is built.
fn setup_auditor() -> anyhow::Result<()> {
    Command::new("cargo")
        .args([
            "build",
            "--release",
            "--bin",
            "ledger-audit",
            "--features",
            "audit",
        ])
        .status()?
        .success()
        .then_some(())
        .ok_or_else(|| anyhow!("ledger-audit build exited nonzero"))?;

    Ok(())
}

/// Return `Ok(())` if the dump passes an offline audit.
fn audit(dump: &Value) -> anyhow::Result<()> {
    let mut f = NamedTempFile::new()?;
    serde_json::to_writer(&mut f, dump)?;
    f.flush()?;

    Command::new("./target/release/ledger-audit")
        .arg(f.path())
        .status()?
        .success()
        .then_some(())
        .ok_or_else(|| anyhow!("audit failed"))?;

    Ok(())
}

fn run() -> anyhow::Result<()> {
    let args = Args::parse();
    let url = args.remote.as_deref().unwrap_or(LOCAL_URL);

    // Pre-build the audit tool if requested.
    if args.audit {
        setup_auditor()?;
    }

    // If we're not connecting remotely, bring up a local server.
    let mut proc: Option<Child> = None;
    if args.remote.is_none() {
        setup_deps()?;
        let logfile = match args.logfile {
            Some(path) => Stdio::from(File::create(path)?),
            None => {
                if args.quiet {
                    Stdio::null()
                } else {
                    Stdio::inherit()
                }
            }
        };
        proc = Some(launch_server(logfile)?);
    }

    // Use a closure to ensure the cleanup below runs.
    let result = (|| {
        let lid = setup_ledger(url)?;
        let (voters, deposited) = benchmark(
            url,
            &lid,
            args.threads,
            args.voters_per_thread,
            args.deposit_mode,
        )?;
        let withdrawn = withdraw_half(url, &lid, deposited)?;
        let dump = check_invariants(url, &lid, voters, deposited, withdrawn)?;

        if args.audit {
            audit(&dump)?;
        }

        Ok(())
    })();

    // Kill the server.
    if let Some(p) = proc.as_mut() {
        terminate_child(p)?;
        p.wait()?;
    }

    result
}

fn main() {
    if let Err(e) = run() {
        eprintln!("FATAL: {}", e);
        process::exit(1);
    }
}
