// Copyright (C) 2024 rk8s authors
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Drives the loopback filesystem service against a host directory, one verb per
// invocation. Handy for poking at the service contract without a kernel mount.

use std::ffi::{OsStr, OsString};

use anyhow::Context;
use clap::{Parser, Subcommand};
use futures::StreamExt;
use libloopback_fs::api::{FileHandle, HeapBufferPool, PathFilesystem};
use libloopback_fs::loopback::READDIR_BATCH;
use libloopback_fs::new_loopback_fs;

#[derive(Parser, Debug)]
#[command(author, version, about = "Loopback filesystem service driver")]
struct Args {
    /// Host directory served as the filesystem root
    #[arg(long)]
    rootdir: String,
    /// Directory entries fetched from the host per batch
    #[arg(long, default_value_t = READDIR_BATCH)]
    batch: usize,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the attributes of a path
    Stat { path: OsString },
    /// List a directory
    Ls {
        #[arg(default_value = "")]
        path: OsString,
    },
    /// Print a file's contents
    Cat { path: OsString },
    /// Create or overwrite a file with the given text
    Put { path: OsString, text: String },
    /// Create a directory
    Mkdir {
        path: OsString,
        #[arg(long, default_value_t = 0o755)]
        mode: u32,
    },
    /// Remove a file
    Rm { path: OsString },
    /// Remove an empty directory
    Rmdir { path: OsString },
    /// Rename a path
    Mv { old: OsString, new: OsString },
    /// List extended attributes with their values
    Xattrs { path: OsString },
    /// Print statistics of the host filesystem
    Statfs,
}

const CHUNK: u32 = 128 * 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let fs = new_loopback_fs(&args.rootdir)
        .with_context(|| format!("cannot serve {}", args.rootdir))?
        .with_readdir_batch(args.batch);

    match args.command {
        Command::Stat { path } => {
            let attr = fs.getattr(&path).await?;
            println!("{attr:#?}");
        }
        Command::Ls { path } => {
            let mut entries = fs.opendir(&path).await?;
            while let Some(entry) = entries.next().await {
                let entry = entry?;
                println!(
                    "{:>10} {:?} {}",
                    entry.ino,
                    entry.kind(),
                    entry.name.to_string_lossy()
                );
            }
        }
        Command::Cat { path } => {
            let file = fs.open(&path, libc::O_RDONLY as u32).await?;
            let mut offset = 0u64;
            loop {
                let chunk = file.read(offset, CHUNK, &HeapBufferPool).await.into_result()?;
                if chunk.is_empty() {
                    break;
                }
                print!("{}", String::from_utf8_lossy(&chunk));
                offset += chunk.len() as u64;
            }
            file.release().await?;
        }
        Command::Put { path, text } => {
            let flags = (libc::O_WRONLY | libc::O_TRUNC) as u32;
            let file = fs.create(&path, flags, 0o644).await?;
            let written = file.write(0, text.as_bytes()).await.into_result()?;
            file.release().await?;
            println!("wrote {written} bytes");
        }
        Command::Mkdir { path, mode } => fs.mkdir(&path, mode).await?,
        Command::Rm { path } => fs.unlink(&path).await?,
        Command::Rmdir { path } => fs.rmdir(&path).await?,
        Command::Mv { old, new } => fs.rename(&old, &new).await?,
        Command::Xattrs { path } => {
            for name in fs.listxattr(&path).await? {
                let value = fs.getxattr(&path, &name).await?;
                println!(
                    "{}={}",
                    name.to_string_lossy(),
                    String::from_utf8_lossy(&value)
                );
            }
        }
        Command::Statfs => {
            let st = fs.statfs(OsStr::new("")).await?;
            println!("{st:#?}");
        }
    }
    Ok(())
}
