//! # CLI - SiltKV Interactive Shell
//!
//! A REPL-style command-line interface for the SiltKV storage engine.
//! Reads commands from stdin, executes them against the engine, and prints
//! results to stdout. Designed for both interactive use and scripted
//! testing (pipe commands via stdin).
//!
//! ## Commands
//!
//! ```text
//! PUT key value            Insert or update a key-value pair
//! GET key                  Look up a key (prints value or "(nil)")
//! DELETE key               Delete a key (writes a tombstone)
//! RANGESCAN lo hi page n   One page of the range scan, n records per page
//! PREFIXSCAN p page n      One page of the prefix scan
//! RANGEITER lo hi          Interactive iterator; then NEXT / STOP
//! PREFIXITER p             Interactive iterator; then NEXT / STOP
//! EXIT / QUIT              Shut down
//! ```
//!
//! Iterators answer each `NEXT` with one record and print `END` once
//! exhausted. Keys under the reserved prefixes (`bf `, `cms `, `hll `,
//! `fingerprint `, `tokenLog `) belong to the probabilistic-structure
//! commands and are rejected here.
//!
//! ## Configuration
//!
//! `conf/config.json` under the data root (created with defaults on first
//! start). The data root is the working directory, or `SILTKV_ROOT` when
//! set. Logging is controlled by `RUST_LOG`.

use anyhow::Result;
use engine::{is_reserved_key, Engine, MergeIterator};
use std::io::{self, BufRead, Write};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let root = std::env::var("SILTKV_ROOT").unwrap_or_else(|_| ".".to_string());
    let mut engine = Engine::open(&root)?;

    println!("SiltKV started (root={root})");
    println!("Commands: PUT key value | GET key | DELETE key");
    println!("          RANGESCAN lo hi page size | PREFIXSCAN p page size");
    println!("          RANGEITER lo hi | PREFIXITER p | EXIT");
    print!("> ");
    io::stdout().flush().ok();

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    while let Some(line) = lines.next() {
        let line = line?;
        let mut parts = line.split_whitespace();
        let Some(cmd) = parts.next() else {
            prompt();
            continue;
        };

        match cmd.to_uppercase().as_str() {
            "PUT" => {
                let key = parts.next();
                let value: Vec<&str> = parts.collect();
                match (key, value.is_empty()) {
                    (Some(k), false) if reserved_cli_key(k) => {
                        println!("ERR reserved key prefix")
                    }
                    (Some(k), false) => {
                        match engine.put(k.as_bytes().to_vec(), value.join(" ").into_bytes()) {
                            Ok(()) => println!("OK"),
                            Err(e) => println!("ERR put failed: {e}"),
                        }
                    }
                    _ => println!("ERR usage: PUT key value"),
                }
            }
            "GET" => match parts.next() {
                Some(k) => match engine.get(k.as_bytes()) {
                    Ok(Some(v)) => println!("{}", String::from_utf8_lossy(&v)),
                    Ok(None) => println!("(nil)"),
                    Err(e) => println!("ERR read failed: {e}"),
                },
                None => println!("ERR usage: GET key"),
            },
            "DELETE" => match parts.next() {
                Some(k) if reserved_cli_key(k) => println!("ERR reserved key prefix"),
                Some(k) => match engine.delete(k.as_bytes().to_vec()) {
                    Ok(()) => println!("OK"),
                    Err(e) => println!("ERR delete failed: {e}"),
                },
                None => println!("ERR usage: DELETE key"),
            },
            "RANGESCAN" => {
                let args: Vec<&str> = parts.collect();
                if args.len() != 4 {
                    println!("ERR usage: RANGESCAN lo hi page size");
                } else {
                    match (args[2].parse(), args[3].parse()) {
                        (Ok(page), Ok(size)) => {
                            match engine.range_scan(args[0].as_bytes(), args[1].as_bytes(), page, size)
                            {
                                Ok(records) => print_page(&records),
                                Err(e) => println!("ERR scan failed: {e}"),
                            }
                        }
                        _ => println!("ERR page and size must be numbers"),
                    }
                }
            }
            "PREFIXSCAN" => {
                let args: Vec<&str> = parts.collect();
                if args.len() != 3 {
                    println!("ERR usage: PREFIXSCAN prefix page size");
                } else {
                    match (args[1].parse(), args[2].parse()) {
                        (Ok(page), Ok(size)) => {
                            match engine.prefix_scan(args[0].as_bytes(), page, size) {
                                Ok(records) => print_page(&records),
                                Err(e) => println!("ERR scan failed: {e}"),
                            }
                        }
                        _ => println!("ERR page and size must be numbers"),
                    }
                }
            }
            "RANGEITER" => {
                let args: Vec<&str> = parts.collect();
                if args.len() != 2 {
                    println!("ERR usage: RANGEITER lo hi");
                } else {
                    match engine.range_iterate(args[0].as_bytes(), args[1].as_bytes()) {
                        Ok(iter) => drive_iterator(iter, &mut lines)?,
                        Err(e) => println!("ERR iterate failed: {e}"),
                    }
                }
            }
            "PREFIXITER" => match parts.next() {
                Some(p) => match engine.prefix_iterate(p.as_bytes()) {
                    Ok(iter) => drive_iterator(iter, &mut lines)?,
                    Err(e) => println!("ERR iterate failed: {e}"),
                },
                None => println!("ERR usage: PREFIXITER prefix"),
            },
            "EXIT" | "QUIT" => {
                println!("bye");
                return Ok(());
            }
            other => println!("ERR unknown command: {other}"),
        }
        prompt();
    }

    Ok(())
}

fn prompt() {
    print!("> ");
    io::stdout().flush().ok();
}

/// The shell splits on whitespace, so a reserved key arrives here as its
/// bare namespace word (`bf`, `cms`, …); pad it back to the stored form
/// before asking the engine.
fn reserved_cli_key(key: &str) -> bool {
    let mut padded = key.as_bytes().to_vec();
    padded.push(b' ');
    is_reserved_key(key.as_bytes()) || is_reserved_key(&padded)
}

fn print_page(records: &[record::Record]) {
    for (i, rec) in records.iter().enumerate() {
        println!(
            "{}. key: {}\tvalue: {}",
            i + 1,
            String::from_utf8_lossy(rec.key()),
            String::from_utf8_lossy(rec.value())
        );
    }
    println!("({} entries)", records.len());
}

/// Answers `NEXT` with one record at a time until `STOP` or exhaustion.
fn drive_iterator(
    mut iter: MergeIterator,
    lines: &mut impl Iterator<Item = io::Result<String>>,
) -> Result<()> {
    loop {
        prompt();
        let Some(line) = lines.next() else {
            return Ok(());
        };
        match line?.trim().to_uppercase().as_str() {
            "NEXT" => match iter.next() {
                Ok(Some(rec)) => println!(
                    "key: {}\tvalue: {}",
                    String::from_utf8_lossy(rec.key()),
                    String::from_utf8_lossy(rec.value())
                ),
                Ok(None) => {
                    println!("END");
                    return Ok(());
                }
                Err(e) => {
                    println!("ERR iterator failed: {e}");
                    return Ok(());
                }
            },
            "STOP" => return Ok(()),
            _ => println!("ERR iterator commands: NEXT | STOP"),
        }
    }
}
