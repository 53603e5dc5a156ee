//! Administrative key tool: provision a key file, mint codes from it, or
//! check a code against it. Operates on a single key file; the verification
//! service never needs to be running.

use anyhow::{bail, Context, Result};
use clap::{Arg, Command};
use modotp::otp::{TokenRecord, RECORD_LEN};
use std::{
    fs::OpenOptions,
    io::{Read, Seek, SeekFrom, Write},
};

fn command() -> Command {
    Command::new("otpkey")
        .about("Modhex OTP key administration")
        .version(env!("CARGO_PKG_VERSION"))
        .arg(
            Arg::new("key-file")
                .short('f')
                .long("key-file")
                .help("Key file to operate on")
                .required(true),
        )
        .arg(
            Arg::new("input")
                .short('i')
                .long("input")
                .help("Code to verify against the key file"),
        )
        .arg(
            Arg::new("id")
                .long("id")
                .help("Create a new key with this id")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
}

fn main() -> Result<()> {
    let matches = command().get_matches();

    let key_file = matches
        .get_one::<String>("key-file")
        .context("missing required argument: --key-file")?;

    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(key_file)
        .with_context(|| format!("failed to open key file {key_file}"))?;

    // Create mode: provision a fresh record, emit its first code.
    if let Some(&id) = matches.get_one::<u64>("id") {
        let mut record = TokenRecord::new(id)?;
        let code = record.generate_code()?;
        file.write_all(&record.as_bytes())
            .with_context(|| format!("failed to write key file {key_file}"))?;
        println!("{code}");
        return Ok(());
    }

    let mut buf = [0u8; RECORD_LEN];
    file.read_exact(&mut buf)
        .with_context(|| format!("{key_file} is not a valid key file"))?;
    let mut record = TokenRecord::from_bytes(&buf)?;

    if let Some(input) = matches.get_one::<String>("input") {
        // Verify mode: nothing is persisted on rejection.
        match record.verify_code(input) {
            Ok(accepted) => {
                record = accepted;
                println!("verified, counter {}", record.counter());
            }
            Err(err) => bail!("verification failed: {err}"),
        }
    } else {
        // Generate mode.
        let code = record.generate_code()?;
        println!("{code}");
    }

    file.seek(SeekFrom::Start(0))?;
    file.write_all(&record.as_bytes())
        .with_context(|| format!("failed to write key file {key_file}"))?;

    Ok(())
}
